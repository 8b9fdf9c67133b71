//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Command Dispatcher (C3): sits on top of [`crate::transport::Transport`]
//! and turns a raw reply into either the payload bytes following the `=`
//! or a typed [`MountError`]. Not re-entrant: one exchange must finish
//! before the next begins, matching the mount's own single-command-at-a-time
//! wire behaviour.
//!

use crate::codec;
use crate::config::DriverConfig;
use crate::error::{MountError, Result};
use crate::model::Axis;
use crate::opcode::Opcode;
use crate::transport::{self, PortOps, Transport};

pub struct Dispatcher<P: PortOps = Box<dyn serialport::SerialPort>> {
    transport: Transport<P>,
}

impl Dispatcher<Box<dyn serialport::SerialPort>> {
    pub fn new(port: Box<dyn serialport::SerialPort>, config: DriverConfig) -> Self {
        Dispatcher { transport: Transport::new(port, config) }
    }
}

impl<P: PortOps> Dispatcher<P> {
    #[cfg(test)]
    pub(crate) fn from_transport(transport: Transport<P>) -> Dispatcher<P> {
        Dispatcher { transport }
    }

    pub fn config(&self) -> DriverConfig { self.transport.config() }

    /// Sends `opcode axis arg` and returns the reply payload (bytes after
    /// the leading `=`, upper-case hex already validated). `GetFeature`
    /// passes `no_retry_on_reply_error = true` (§4.2 exception); everything
    /// else retries on both I/O and reply-level errors.
    pub fn exchange(&mut self, opcode: Opcode, axis: Axis, arg: &str) -> Result<Vec<u8>> {
        let no_retry_on_reply_error = opcode == Opcode::GetFeature;
        let reply = self.transport.exchange(opcode, axis, arg, no_retry_on_reply_error)?;
        self.classify(opcode, reply)
    }

    fn classify(&self, opcode: Opcode, reply: Vec<u8>) -> Result<Vec<u8>> {
        if transport::is_success(&reply) {
            let payload = &reply[1..];
            codec::validate_uppercase_hex(payload)?;
            Ok(payload.to_vec())
        } else if transport::is_failure(&reply) {
            let code = *reply.get(1).unwrap_or(&0);
            Err(MountError::CmdFailed { cmd: opcode.as_char(), code })
        } else {
            Err(MountError::invalid_cmd(format!(
                "reply to '{}' did not start with '=' or '!': {:?}", opcode.as_char(), reply
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Axis;
    use crate::transport::test_support::{MockPort, MockSerial};
    use std::sync::{Arc, Mutex};

    fn make_dispatcher(mock: Arc<Mutex<MockSerial>>) -> Dispatcher<MockPort> {
        let port = MockPort::new(mock);
        Dispatcher { transport: Transport::from_io(port, DriverConfig::default()) }
    }

    #[test]
    fn success_reply_strips_leading_equals_and_validates_hex() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        mock.lock().unwrap().push_reply("=0102AB");
        let mut d = make_dispatcher(mock);
        let payload = d.exchange(Opcode::GetAxisStatus, Axis::Ra, "").unwrap();
        assert_eq!(payload, b"0102AB");
    }

    #[test]
    fn failure_reply_becomes_cmd_failed() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        {
            // Non-GetFeature commands retry on a reply-level error
            // (transport.rs), so a mount that keeps rejecting the command
            // needs a queued "!8" for every attempt (max_retries + 1).
            let mut m = mock.lock().unwrap();
            for _ in 0..=DriverConfig::default().max_retries {
                m.push_reply("!8");
            }
        }
        let mut d = make_dispatcher(mock);
        let err = d.exchange(Opcode::SetFeature, Axis::De, "0010").unwrap_err();
        match err {
            MountError::CmdFailed { cmd, code } => {
                assert_eq!(cmd, 'W');
                assert_eq!(code, b'8');
            },
            other => panic!("expected CmdFailed, got {:?}", other),
        }
    }

    #[test]
    fn garbled_reply_becomes_invalid_cmd() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        mock.lock().unwrap().push_reply("XYZ");
        let mut d = make_dispatcher(mock);
        let err = d.exchange(Opcode::GetAxisPosition, Axis::Ra, "").unwrap_err();
        assert!(matches!(err, MountError::InvalidCmd(_)));
    }

    #[test]
    fn get_feature_does_not_retry_on_reply_error() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        {
            let mut m = mock.lock().unwrap();
            m.push_reply("!2");
            // A second reply is queued but must never be consumed, proving
            // no retry happened for GetFeature.
            m.push_reply("=00");
        }
        let mut d = make_dispatcher(mock.clone());
        let err = d.exchange(Opcode::GetFeature, Axis::Ra, "00").unwrap_err();
        assert!(matches!(err, MountError::CmdFailed { cmd: 'q', code: b'2' }));
        assert_eq!(mock.lock().unwrap().written.len(), 1);
    }

    #[test]
    fn other_commands_retry_on_reply_error_then_succeed() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        {
            let mut m = mock.lock().unwrap();
            m.push_reply("!2");
            m.push_reply("=010203");
        }
        let mut d = make_dispatcher(mock.clone());
        let payload = d.exchange(Opcode::GetAxisPosition, Axis::Ra, "").unwrap();
        assert_eq!(payload, b"010203");
        assert_eq!(mock.lock().unwrap().written.len(), 2);
    }
}
