//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Driver tunables (C11). Plain struct with the spec's defaults; persisting
//! it is the owning application's job (configuration persistence is an
//! explicit Non-goal of the protocol engine, §1).
//!

use std::time::Duration;

#[derive(Copy, Clone, Debug)]
pub struct DriverConfig {
    /// Per-read timeout for a single Transport exchange attempt (§4.2).
    pub command_timeout: Duration,
    /// Extra attempts after the first failed write/read (§4.2).
    pub max_retries: u32,
    /// Sleep between retries (§4.2).
    pub retry_delay: Duration,
    /// How long `status`/`running` stay valid without a refresh (§3 invariant 4).
    pub status_freshness_window: Duration,
    /// Poll interval used by `StopWaitMotor` and the backlash preamble (§4.7).
    pub stop_wait_poll_interval: Duration,
    /// Upper bound on `StopWaitMotor`'s poll loop before giving up (§9).
    pub stop_wait_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            command_timeout: Duration::from_millis(500),
            max_retries: 2,
            retry_delay: Duration::from_millis(100),
            status_freshness_window: Duration::from_millis(250),
            stop_wait_poll_interval: Duration::from_millis(100),
            stop_wait_timeout: Duration::from_secs(10),
        }
    }
}
