//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Driver error types.
//!

use std::fmt;

/// Error raised by any protocol-engine operation.
#[derive(Debug)]
pub enum MountError {
    /// Serial I/O failed after retries, the mount returned garbage, or a
    /// blocked mount code was found at handshake. Fatal to the session.
    Disconnect(String),

    /// The mount replied `!<code>`. `code` is the raw error-code byte.
    CmdFailed { cmd: char, code: u8 },

    /// A reply did not start with `=` or `!`, or contained non-hex payload
    /// bytes (including lowercase hex digits).
    InvalidCmd(String),

    /// A local precondition was violated (rate out of range, illegal state
    /// transition, unsupported feature). Never retried.
    InvalidParameter(String),
}

impl MountError {
    pub(crate) fn disconnect(msg: impl Into<String>) -> MountError {
        MountError::Disconnect(msg.into())
    }

    pub(crate) fn invalid_cmd(msg: impl Into<String>) -> MountError {
        MountError::InvalidCmd(msg.into())
    }

    pub(crate) fn invalid_parameter(msg: impl Into<String>) -> MountError {
        MountError::InvalidParameter(msg.into())
    }
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MountError::Disconnect(msg) => write!(f, "mount disconnected: {}", msg),
            MountError::CmdFailed { cmd, code } =>
                write!(f, "command '{}' failed, mount error code '{}'", cmd, *code as char),
            MountError::InvalidCmd(msg) => write!(f, "invalid command/reply: {}", msg),
            MountError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for MountError {}

pub type Result<T> = std::result::Result<T, MountError>;
