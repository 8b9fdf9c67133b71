//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Frame Transport (C2): writes a framed command and reads a framed reply
//! over a serial file descriptor, with timeout and retry.
//!

use std::io::{Read, Write};
use std::time::Instant;
use crate::config::DriverConfig;
use crate::error::{MountError, Result};
use crate::model::Axis;
use crate::opcode::Opcode;

const START_CHAR_OUT: u8 = b':';
const END_CHAR: u8 = 0x0D;
const START_CHAR_IN: u8 = b'=';
const ERROR_CHAR: u8 = b'!';

const MAX_FRAME_SIZE: usize = 16;

/// Raised by a single Transport exchange attempt.
enum AttemptOutcome {
    Ok(Vec<u8>),
    /// I/O-level failure (write or read), worth retrying.
    IoFailure(String),
}

/// I/O handle a `Transport` can drive: read/write the wire, and best-effort
/// drop stale buffered bytes between exchanges. Implemented for a real
/// `serialport::SerialPort` and (test-only) for the `test_support` mock, so
/// `Transport`'s retry/timeout logic can be exercised without hardware.
pub(crate) trait PortOps: Read + Write {
    fn clear_buffers(&self) {}
}

impl PortOps for Box<dyn serialport::SerialPort> {
    fn clear_buffers(&self) {
        let _ = serialport::SerialPort::clear(self.as_ref(), serialport::ClearBuffer::All);
    }
}

#[cfg(test)]
impl PortOps for test_support::MockPort {}

/// Writes framed commands and reads framed replies over a serial-like
/// handle, applying the retry/timeout policy of §4.2.
pub struct Transport<P: PortOps = Box<dyn serialport::SerialPort>> {
    port: P,
    config: DriverConfig,
}

impl Transport<Box<dyn serialport::SerialPort>> {
    pub fn new(port: Box<dyn serialport::SerialPort>, config: DriverConfig) -> Self {
        Transport { port, config }
    }
}

impl<P: PortOps> Transport<P> {
    #[cfg(test)]
    pub(crate) fn from_io(port: P, config: DriverConfig) -> Transport<P> {
        Transport { port, config }
    }

    pub fn config(&self) -> DriverConfig { self.config }

    /// Composes `:<cmd><axis>[arg]\r`, writes it, and returns the raw
    /// reply bytes including the leading `=`/`!` and excluding the
    /// trailing `\r`. Does not interpret a reply that was read in full
    /// (success/failure/invalid classification is
    /// [`crate::dispatcher::Dispatcher::exchange`]'s job) — it only retries
    /// attempts that never produced a complete frame, or (outside the
    /// `no_retry_on_reply_error` exception) attempts whose complete frame
    /// was a `'!'`/invalid reply, mirroring the original driver's
    /// `dispatch_command` loop.
    ///
    /// `no_retry_on_reply_error` implements the `GetFeatures` exception of
    /// §4.2: some mounts legitimately reject it, and retrying would just
    /// waste time before the caller falls back to "unsupported".
    pub fn exchange(&mut self, opcode: Opcode, axis: Axis, arg: &str, no_retry_on_reply_error: bool) -> Result<Vec<u8>> {
        let frame = Self::build_frame(opcode, axis, arg);
        debug_assert!(frame.len() <= MAX_FRAME_SIZE);

        let attempts = self.config.max_retries + 1;
        let mut last_io_err: Option<String> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                std::thread::sleep(self.config.retry_delay);
            }

            let is_last_attempt = attempt == attempts - 1;

            match self.try_once(&frame) {
                AttemptOutcome::Ok(reply) => {
                    let reply_ok = is_success(&reply);
                    if reply_ok || no_retry_on_reply_error || is_last_attempt {
                        if attempt > 0 {
                            log::warn!(
                                "exchange for '{}{}' settled after {} retr{} ({} ms total delay)",
                                opcode.as_char(), axis.as_wire_char(), attempt,
                                if attempt == 1 { "y" } else { "ies" },
                                attempt as u128 * self.config.retry_delay.as_millis()
                            );
                        }
                        return Ok(reply);
                    }
                    // Reply-level error (mount replied '!' or garbage) and
                    // this command is allowed to retry: loop again.
                },
                AttemptOutcome::IoFailure(msg) => {
                    last_io_err = Some(msg);
                    if no_retry_on_reply_error || is_last_attempt {
                        break;
                    }
                }
            }
        }

        Err(MountError::disconnect(last_io_err.unwrap_or_else(|| "serial I/O failed".to_string())))
    }

    fn build_frame(opcode: Opcode, axis: Axis, arg: &str) -> Vec<u8> {
        let mut frame = Vec::with_capacity(4 + arg.len());
        frame.push(START_CHAR_OUT);
        frame.push(opcode.as_char() as u8);
        frame.push(axis.as_wire_char() as u8);
        frame.extend_from_slice(arg.as_bytes());
        frame.push(END_CHAR);
        frame
    }

    fn try_once(&mut self, frame: &[u8]) -> AttemptOutcome {
        // Drop stale bytes left over from a previous aborted exchange.
        self.port.clear_buffers();

        if let Err(e) = self.port.write_all(frame) {
            return AttemptOutcome::IoFailure(format!("write failed: {}", e));
        }

        let deadline = Instant::now() + self.config.command_timeout;
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if Instant::now() >= deadline {
                return AttemptOutcome::IoFailure("read timed out".to_string());
            }
            match self.port.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    if byte[0] == END_CHAR {
                        break;
                    }
                    buf.push(byte[0]);
                    if buf.len() > MAX_FRAME_SIZE {
                        return AttemptOutcome::IoFailure("reply exceeded max frame size".to_string());
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return AttemptOutcome::IoFailure("read timed out".to_string());
                },
                Err(e) => return AttemptOutcome::IoFailure(format!("read failed: {}", e)),
            }
        }

        AttemptOutcome::Ok(buf)
    }
}

pub(crate) fn is_success(reply: &[u8]) -> bool { reply.first() == Some(&START_CHAR_IN) }
pub(crate) fn is_failure(reply: &[u8]) -> bool { reply.first() == Some(&ERROR_CHAR) }

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::io;

    /// In-memory stand-in for a `serialport::SerialPort` (C12): answers
    /// pre-programmed replies to whatever is written, so Transport/
    /// Dispatcher/Executor logic can be exercised without hardware.
    pub struct MockSerial {
        pub written: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
        fail_reads: VecDeque<bool>,
    }

    impl MockSerial {
        pub fn new() -> MockSerial {
            MockSerial { written: Vec::new(), replies: VecDeque::new(), fail_reads: VecDeque::new() }
        }

        /// Queues a reply (without the trailing `\r`, added automatically).
        pub fn push_reply(&mut self, reply: &str) {
            self.fail_reads.push_back(false);
            let mut bytes = reply.as_bytes().to_vec();
            bytes.push(0x0D);
            self.replies.push_back(bytes);
        }

        /// Queues a read failure (simulates a dropped/garbled byte).
        pub fn push_read_failure(&mut self) {
            self.fail_reads.push_back(true);
            self.replies.push_back(Vec::new());
        }

        pub fn pending_read(&mut self) -> Option<(Vec<u8>, bool)> {
            let fail = self.fail_reads.pop_front()?;
            let reply = self.replies.pop_front().unwrap_or_default();
            Some((reply, fail))
        }
    }

    pub struct MockPort {
        pub mock: std::sync::Arc<std::sync::Mutex<MockSerial>>,
        pending: VecDeque<u8>,
    }

    impl MockPort {
        pub fn new(mock: std::sync::Arc<std::sync::Mutex<MockSerial>>) -> MockPort {
            MockPort { mock, pending: VecDeque::new() }
        }
    }

    impl io::Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                let (reply, fail) = self.mock.lock().unwrap().pending_read()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no reply queued"))?;
                if fail {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "simulated read failure"));
                }
                self.pending = reply.into_iter().collect();
            }
            match self.pending.pop_front() {
                Some(b) => { buf[0] = b; Ok(1) },
                None => Ok(0),
            }
        }
    }

    impl io::Write for MockPort {
        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.mock.lock().unwrap().written.push(buf.to_vec());
            Ok(())
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_all(buf)?;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }
}
