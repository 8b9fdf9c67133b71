//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Protocol engine and motion controller for Sky-Watcher serial
//! motor-controller mounts.
//!
//! A [`transport::Transport`] frames commands and replies over a serial
//! port with timeout and retry; a [`dispatcher::Dispatcher`] classifies a
//! reply into a payload or a [`error::MountError`]; [`capability::handshake`]
//! discovers the mount's identity, gear ratios and feature register into a
//! [`model::MountModel`]; [`executor::Executor`] drives axis motion —
//! continuous slew, relative/absolute goto, tracking and initialization —
//! on top of all of the above.
//!
//! ```no_run
//! use skywatcher_mount::{config::DriverConfig, executor::Executor};
//!
//! # fn connect() -> skywatcher_mount::error::Result<()> {
//! let port = serialport::new("/dev/ttyUSB0", 9600).open()
//!     .map_err(|e| skywatcher_mount::MountError::Disconnect(e.to_string()))?;
//! let mut mount = Executor::new(port, DriverConfig::default());
//! mount.handshake()?;
//! mount.init()?;
//! mount.start_tracking(skywatcher_mount::model::Axis::Ra, 15.041)?;
//! # Ok(())
//! # }
//! ```
//!

pub mod capability;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod model;
pub mod mount_table;
pub mod opcode;
pub mod persistence;
pub mod planner;
pub mod transport;

pub use error::{MountError, Result};
pub use executor::Executor;
