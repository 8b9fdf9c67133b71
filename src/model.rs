//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Mount model (C4): per-axis kinematic constants, runtime state and feature
//! register. Pure data; no I/O happens here.
//!

use std::time::Instant;
use strum_macros::EnumIter;

/// Nominal encoder value at cold start (before any `Init`).
pub const DEFAULT_STEP_INIT: u32 = 0x800000;

/// Smallest legal period counter absent a mount-specific override.
pub const DEFAULT_MIN_PERIOD: u32 = 6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum Axis {
    /// Right ascension / azimuth. Wire tag `'1'`.
    Ra,
    /// Declination / altitude. Wire tag `'2'`.
    De,
}

impl Axis {
    pub fn as_wire_char(self) -> char {
        match self {
            Axis::Ra => '1',
            Axis::De => '2',
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Axis::Ra => 0,
            Axis::De => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlewMode { Slew, Goto }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction { Forward, Backward }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpeedMode { LowSpeed, HighSpeed }

/// Decoded `GetAxisStatus` ('f') reply: motion mode / direction / speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AxisStatus {
    pub slew_mode: SlewMode,
    pub direction: Direction,
    pub speed_mode: SpeedMode,
}

impl Default for AxisStatus {
    fn default() -> Self {
        AxisStatus { slew_mode: SlewMode::Slew, direction: Direction::Forward, speed_mode: SpeedMode::LowSpeed }
    }
}

/// Immutable (after discovery) per-axis kinematic constants.
#[derive(Copy, Clone, Debug, Default)]
pub struct AxisConstants {
    pub steps_360: u32,
    pub steps_worm: u32,
    pub highspeed_ratio: u32,
    pub step_init: u32,
    pub step_home: u32,
    pub min_period: u32,
    pub backlash_period: u32,
}

/// Feature register decoded from the `q`/`GET_FEATURES` reply (§3).
#[derive(Copy, Clone, Debug, Default)]
pub struct Features {
    pub has_encoder: bool,
    pub has_ppec: bool,
    pub in_ppec: bool,
    pub in_ppec_training: bool,
    pub has_home_indexer: bool,
    pub is_azeq: bool,
    pub has_polar_led: bool,
    pub has_common_slew_start: bool,
    pub has_half_current_tracking: bool,
    pub has_wifi: bool,
}

/// Per-axis runtime (mutable) state.
pub struct AxisState {
    pub initialized: bool,
    pub running: bool,
    pub status: AxisStatus,
    pub encoder_step: u32,
    pub period: u32,
    pub target: u32,
    pub target_breaks: u32,
    pub last_running_status: AxisStatus,
    pub new_status: AxisStatus,
    pub use_backlash: bool,
    pub backlash_steps: u32,
    pub snap_port_on: bool,
    pub last_indexer: u32,
    pub last_read_status_time: Option<Instant>,
    pub last_read_position_time: Option<Instant>,
}

impl Default for AxisState {
    fn default() -> Self {
        AxisState {
            initialized: false,
            running: false,
            status: AxisStatus::default(),
            encoder_step: DEFAULT_STEP_INIT,
            period: 0,
            target: 0,
            target_breaks: 0,
            last_running_status: AxisStatus::default(),
            new_status: AxisStatus::default(),
            use_backlash: false,
            backlash_steps: 0,
            snap_port_on: false,
            last_indexer: 0,
            last_read_status_time: None,
            last_read_position_time: None,
        }
    }
}

/// Mount identity discovered at `Handshake`.
#[derive(Clone, Debug, Default)]
pub struct MountIdentity {
    /// 24-bit version, outer bytes swapped relative to the raw wire value
    /// (see §4.5 step 1).
    pub mc_version: u32,
    pub mount_code: u8,
    pub name: String,
}

/// Holds everything Capability Discovery writes once and the Executor reads
/// and mutates thereafter. Keyed by [`Axis`]; performs no I/O.
pub struct MountModel {
    pub identity: MountIdentity,
    constants: [AxisConstants; 2],
    state: [AxisState; 2],
    features: [Features; 2],
}

impl MountModel {
    pub fn new() -> MountModel {
        MountModel {
            identity: MountIdentity::default(),
            constants: [AxisConstants::default(), AxisConstants::default()],
            state: [AxisState::default(), AxisState::default()],
            features: [Features::default(), Features::default()],
        }
    }

    pub fn constants(&self, axis: Axis) -> &AxisConstants { &self.constants[axis.index()] }
    pub fn constants_mut(&mut self, axis: Axis) -> &mut AxisConstants { &mut self.constants[axis.index()] }

    pub fn state(&self, axis: Axis) -> &AxisState { &self.state[axis.index()] }
    pub fn state_mut(&mut self, axis: Axis) -> &mut AxisState { &mut self.state[axis.index()] }

    pub fn features(&self, axis: Axis) -> &Features { &self.features[axis.index()] }
    pub fn features_mut(&mut self, axis: Axis) -> &mut Features { &mut self.features[axis.index()] }

    pub fn mc_version(&self) -> u32 { self.identity.mc_version }
    pub fn mount_code(&self) -> u8 { self.identity.mount_code }
    pub fn mount_name(&self) -> &str { &self.identity.name }

    /// `RA: step_init`, `DE: step_init + steps_360/4` (non-EXT home math, §4.7 Init).
    pub fn step_home(&self, axis: Axis) -> u32 { self.constants(axis).step_home }
}

impl Default for MountModel {
    fn default() -> Self { MountModel::new() }
}
