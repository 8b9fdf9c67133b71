//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Motion Executor (C8): issues the command sequences for continuous slew,
//! relative/absolute goto, tracking, stop and initialization, including the
//! backlash compensation preamble. Built on top of the Dispatcher (C3),
//! Mount Model (C4) and Motion Planner (C7).
//!

use crate::capability::{self, STELLAR_DAY_SECONDS};
use crate::codec;
use crate::config::DriverConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{MountError, Result};
use crate::model::{Axis, AxisStatus, Direction, MountModel, SlewMode, SpeedMode};
use crate::opcode::{Opcode, Subcommand};
use crate::persistence::{NullParkPersistence, ParkPersistence};
use crate::planner::{self, GotoPlan, RatePlan};
use crate::transport::PortOps;
use std::time::Instant;

/// Arcseconds per second at 1x sidereal rate.
pub const STELLAR_ARCSEC_PER_SEC: f64 = 360.0 * 3600.0 / STELLAR_DAY_SECONDS;

/// ST4 guide rate code for 0.5x (the value `Init` resets both axes to).
const ST4_GUIDE_RATE_HALF: char = '2';

fn motion_mode_char(slew_mode: SlewMode, speed_mode: SpeedMode) -> char {
    match (slew_mode, speed_mode) {
        (SlewMode::Slew, SpeedMode::LowSpeed) => '1',
        (SlewMode::Slew, SpeedMode::HighSpeed) => '3',
        (SlewMode::Goto, SpeedMode::LowSpeed) => '2',
        (SlewMode::Goto, SpeedMode::HighSpeed) => '0',
    }
}

fn direction_char(direction: Direction) -> char {
    match direction {
        Direction::Forward => '0',
        Direction::Backward => '1',
    }
}

/// Issues commands against a mount and owns the in-memory model that tracks
/// its state. Not `Sync`: a caller sharing one across threads must serialize
/// access itself (§5).
pub struct Executor<P: PortOps = Box<dyn serialport::SerialPort>, Park: ParkPersistence = NullParkPersistence> {
    dispatcher: Dispatcher<P>,
    model: MountModel,
    park: Park,
}

impl Executor<Box<dyn serialport::SerialPort>, NullParkPersistence> {
    pub fn new(port: Box<dyn serialport::SerialPort>, config: DriverConfig) -> Self {
        Executor {
            dispatcher: Dispatcher::new(port, config),
            model: MountModel::new(),
            park: NullParkPersistence,
        }
    }
}

impl<P: PortOps, Park: ParkPersistence> Executor<P, Park> {
    #[cfg(test)]
    pub(crate) fn from_parts(dispatcher: Dispatcher<P>, park: Park) -> Self {
        Executor { dispatcher, model: MountModel::new(), park }
    }

    pub fn model(&self) -> &MountModel { &self.model }

    /// Runs Capability Discovery (§4.5) once, at connection time.
    pub fn handshake(&mut self) -> Result<()> {
        capability::handshake(&mut self.dispatcher, &mut self.model)
    }

    // ---- Axis state machine (§4.6) ----

    /// Decodes a `GetAxisStatus` reply and updates `running`/`initialized`/
    /// `status`, unconditionally (no freshness check).
    pub fn read_motor_status(&mut self, axis: Axis) -> Result<()> {
        let payload = self.dispatcher.exchange(Opcode::GetAxisStatus, axis, "")?;
        if payload.len() < 3 {
            return Err(MountError::invalid_cmd(format!(
                "GetAxisStatus reply too short for axis {:?}: {:?}", axis, payload
            )));
        }

        let mode_dir_speed = codec_nibble(payload[0])?;
        let running_nibble = codec_nibble(payload[1])?;
        let init_nibble = codec_nibble(payload[2])?;

        let status = AxisStatus {
            slew_mode: if mode_dir_speed & 0x01 != 0 { SlewMode::Slew } else { SlewMode::Goto },
            direction: if mode_dir_speed & 0x02 != 0 { Direction::Backward } else { Direction::Forward },
            speed_mode: if mode_dir_speed & 0x04 != 0 { SpeedMode::HighSpeed } else { SpeedMode::LowSpeed },
        };
        let running = running_nibble & 0x01 != 0;

        let state = self.model.state_mut(axis);
        if state.running && !running {
            state.last_running_status = state.status;
        }
        state.status = status;
        state.running = running;
        state.initialized = init_nibble & 0x01 != 0;
        state.last_read_status_time = Some(Instant::now());

        Ok(())
    }

    /// Refreshes status only if the cached copy is stale (§3 invariant 4,
    /// §4.6 "Freshness").
    pub fn check_motor_status(&mut self, axis: Axis) -> Result<()> {
        let freshness_window = self.dispatcher.config().status_freshness_window;
        let is_fresh = self.model.state(axis).last_read_status_time
            .map(|t| t.elapsed() < freshness_window)
            .unwrap_or(false);
        if !is_fresh {
            self.read_motor_status(axis)?;
        }
        Ok(())
    }

    pub fn get_axis_position(&mut self, axis: Axis) -> Result<u32> {
        let payload = self.dispatcher.exchange(Opcode::GetAxisPosition, axis, "")?;
        let position = codec::decode_revu24(&payload)?;
        let state = self.model.state_mut(axis);
        state.encoder_step = position;
        state.last_read_position_time = Some(Instant::now());
        Ok(position)
    }

    /// Issues the mode-setting command if direction/speed/slew-mode would
    /// change, stopping the axis first (§4.6 "SetMotion").
    fn set_motion(&mut self, axis: Axis, new_status: AxisStatus) -> Result<()> {
        self.check_motor_status(axis)?;
        let current = self.model.state(axis).status;

        if new_status != current {
            self.stop_wait_motor(axis)?;
            let arg = format!("{}{}",
                motion_mode_char(new_status.slew_mode, new_status.speed_mode),
                direction_char(new_status.direction));
            self.dispatcher.exchange(Opcode::SetMotionMode, axis, &arg)?;
        }

        self.model.state_mut(axis).new_status = new_status;
        Ok(())
    }

    fn set_speed(&mut self, axis: Axis, period: u32) -> Result<()> {
        self.dispatcher.exchange(Opcode::SetStepPeriod, axis, &codec::encode_revu24(period))?;
        self.model.state_mut(axis).period = period;
        Ok(())
    }

    /// Non-instant stop, polled until the axis reports idle (§4.7
    /// "StopWaitMotor").
    pub fn stop_wait_motor(&mut self, axis: Axis) -> Result<()> {
        self.read_motor_status(axis)?;
        self.dispatcher.exchange(Opcode::NotInstantAxisStop, axis, "")?;

        let config = self.dispatcher.config();
        let deadline = Instant::now() + config.stop_wait_timeout;
        self.read_motor_status(axis)?;
        while self.model.state(axis).running {
            if Instant::now() >= deadline {
                return Err(MountError::disconnect(format!(
                    "axis {:?} did not stop within {:?}", axis, config.stop_wait_timeout
                )));
            }
            std::thread::sleep(config.stop_wait_poll_interval);
            self.read_motor_status(axis)?;
        }
        Ok(())
    }

    pub fn instant_stop_motor(&mut self, axis: Axis) -> Result<()> {
        self.read_motor_status(axis)?;
        self.dispatcher.exchange(Opcode::InstantAxisStop, axis, "")?;
        self.read_motor_status(axis)
    }

    /// Starts motion, running the backlash compensation preamble first if
    /// the axis is reversing direction and `use_backlash` is set (§4.7).
    fn start_motor(&mut self, axis: Axis) -> Result<()> {
        let state = self.model.state(axis);
        let use_backlash = state.use_backlash;
        let reversing = state.new_status.direction != state.last_running_status.direction;

        if use_backlash && reversing {
            self.run_backlash_preamble(axis)?;
        }

        self.dispatcher.exchange(Opcode::StartMotion, axis, "")?;
        self.model.state_mut(axis).running = true;
        Ok(())
    }

    fn run_backlash_preamble(&mut self, axis: Axis) -> Result<()> {
        log::info!("performing backlash compensation for axis {:?}", axis);

        let current_position = self.get_axis_position(axis)?;

        let (new_status, backlash_period, backlash_steps, saved_period, saved_target, saved_breaks) = {
            let state = self.model.state(axis);
            (state.new_status, self.model.constants(axis).backlash_period,
             state.backlash_steps, state.period, state.target, state.target_breaks)
        };

        self.dispatcher.exchange(Opcode::SetStepPeriod, axis, &codec::encode_revu24(backlash_period))?;
        let backlash_mode = format!("2{}", direction_char(new_status.direction));
        self.dispatcher.exchange(Opcode::SetMotionMode, axis, &backlash_mode)?;
        self.dispatcher.exchange(Opcode::SetGotoTargetIncrement, axis, &codec::encode_revu24(backlash_steps))?;
        self.dispatcher.exchange(Opcode::SetBreakPointIncrement, axis, &codec::encode_revu24(backlash_steps / 10))?;
        self.dispatcher.exchange(Opcode::StartMotion, axis, "")?;

        let config = self.dispatcher.config();
        self.read_motor_status(axis)?;
        while self.model.state(axis).running {
            std::thread::sleep(config.stop_wait_poll_interval);
            self.read_motor_status(axis)?;
        }

        self.dispatcher.exchange(Opcode::SetAxisPosition, axis, &codec::encode_revu24(current_position))?;
        self.model.state_mut(axis).encoder_step = current_position;

        self.dispatcher.exchange(Opcode::SetStepPeriod, axis, &codec::encode_revu24(saved_period))?;
        let restore_mode = format!("{}{}", motion_mode_char(new_status.slew_mode, new_status.speed_mode), direction_char(new_status.direction));
        self.dispatcher.exchange(Opcode::SetMotionMode, axis, &restore_mode)?;
        self.dispatcher.exchange(Opcode::SetGotoTargetIncrement, axis, &codec::encode_revu24(saved_target))?;
        self.dispatcher.exchange(Opcode::SetBreakPointIncrement, axis, &codec::encode_revu24(saved_breaks))?;

        Ok(())
    }

    // ---- Motion Planner-driven operations (§4.7) ----

    /// Continuous slew at a signed rate (multiples of sidereal).
    pub fn slew_axis(&mut self, axis: Axis, rate: f64) -> Result<()> {
        self.check_motor_status(axis)?;
        let state = self.model.state(axis);
        if state.running && state.status.slew_mode == SlewMode::Goto {
            return Err(MountError::invalid_parameter(format!(
                "cannot slew axis {:?} while a goto is in progress", axis
            )));
        }

        let plan = planner::plan_rate(self.model.constants(axis), rate)?;
        let new_status = AxisStatus { slew_mode: SlewMode::Slew, direction: plan.direction, speed_mode: plan.speed_mode };

        self.set_motion(axis, new_status)?;
        self.set_speed(axis, plan.period)?;

        if !self.model.state(axis).running {
            self.start_motor(axis)?;
        }
        Ok(())
    }

    /// Changes rate on a running axis without restarting it, refusing the
    /// change if it would require a direction or speed-mode switch.
    pub fn set_rate(&mut self, axis: Axis, rate: f64) -> Result<()> {
        let plan: RatePlan = planner::plan_rate(self.model.constants(axis), rate)?;
        let new_status = AxisStatus { slew_mode: SlewMode::Slew, direction: plan.direction, speed_mode: plan.speed_mode };

        self.read_motor_status(axis)?;
        let state = self.model.state(axis);
        if state.running {
            if new_status.speed_mode != state.status.speed_mode {
                return Err(MountError::invalid_parameter(
                    "cannot change rate while motor is running (speed mode differs)"));
            }
            if new_status.direction != state.status.direction {
                return Err(MountError::invalid_parameter(
                    "cannot change rate while motor is running (direction differs)"));
            }
        }

        self.set_motion(axis, new_status)?;
        self.set_speed(axis, plan.period)
    }

    fn apply_goto_plan(&mut self, axis: Axis, slew_mode: SlewMode, plan: &GotoPlan, absolute: Option<u32>) -> Result<()> {
        let new_status = AxisStatus { slew_mode, direction: plan.direction, speed_mode: plan.speed_mode };
        self.set_motion(axis, new_status)?;
        self.set_speed(axis, plan.period)?;

        match absolute {
            None => {
                self.dispatcher.exchange(Opcode::SetGotoTargetIncrement, axis, &codec::encode_revu24(plan.target))?;
                self.dispatcher.exchange(Opcode::SetBreakPointIncrement, axis, &codec::encode_revu24(plan.breaks))?;
            },
            Some(_) => {
                self.dispatcher.exchange(Opcode::SetGotoTarget, axis, &codec::encode_revu24(plan.target))?;
                let break_step = planner::absolute_break_step(plan);
                self.dispatcher.exchange(Opcode::SetBreakStep, axis, &codec::encode_revu24(break_step))?;
            }
        }

        self.model.state_mut(axis).target = plan.target;
        self.model.state_mut(axis).target_breaks = plan.breaks;

        self.start_motor(axis)
    }

    /// Relative goto: moves each axis by the given signed encoder delta.
    /// An axis with a zero delta is left untouched.
    pub fn slew_to(&mut self, delta_ra: i64, delta_de: i64) -> Result<()> {
        for (axis, delta) in [(Axis::Ra, delta_ra), (Axis::De, delta_de)] {
            if delta == 0 {
                continue;
            }
            let plan = planner::plan_goto(self.model.constants(axis), delta, None);
            self.apply_goto_plan(axis, SlewMode::Goto, &plan, None)?;
        }
        Ok(())
    }

    /// Absolute goto: moves each axis to the given absolute encoder target.
    pub fn abs_slew_to(&mut self, ra_encoder: u32, de_encoder: u32, ra_up: bool, de_up: bool) -> Result<()> {
        for (axis, target, up) in [(Axis::Ra, ra_encoder, ra_up), (Axis::De, de_encoder, de_up)] {
            let current = self.model.state(axis).encoder_step;
            let delta = target as i64 - current as i64;
            if delta == 0 {
                continue;
            }
            let signed_delta = if up { delta.abs() } else { -delta.abs() };
            let plan = planner::plan_goto(self.model.constants(axis), signed_delta, Some(target));
            self.apply_goto_plan(axis, SlewMode::Goto, &plan, Some(target))?;
        }
        Ok(())
    }

    /// Starts or stops sidereal-relative tracking on one axis.
    pub fn start_tracking(&mut self, axis: Axis, trackspeed_arcsec: f64) -> Result<()> {
        let rate = if trackspeed_arcsec != 0.0 { trackspeed_arcsec / STELLAR_ARCSEC_PER_SEC } else { 0.0 };

        if rate != 0.0 {
            self.set_rate(axis, rate)?;
            if !self.model.state(axis).running {
                self.start_motor(axis)?;
            }
        } else {
            self.stop_wait_motor(axis)?;
        }
        Ok(())
    }

    // ---- Initialization (§4.7 "Init") ----

    pub fn init(&mut self) -> Result<()> {
        self.read_motor_status(Axis::Ra)?;
        self.read_motor_status(Axis::De)?;

        let both_uninitialized = !self.model.state(Axis::Ra).initialized && !self.model.state(Axis::De).initialized;

        if both_uninitialized {
            let ra_init = self.get_axis_position(Axis::Ra)?;
            let de_init = self.get_axis_position(Axis::De)?;

            self.dispatcher.exchange(Opcode::Initialize, Axis::Ra, "")?;
            self.dispatcher.exchange(Opcode::Initialize, Axis::De, "")?;

            self.model.constants_mut(Axis::Ra).step_init = ra_init;
            self.model.constants_mut(Axis::De).step_init = de_init;
            self.model.constants_mut(Axis::Ra).step_home = ra_init;
            self.model.constants_mut(Axis::De).step_home = de_init + self.model.constants(Axis::De).steps_360 / 4;
        } else {
            log::warn!("motors already initialized by another host; using default init steps");
            let default_init = crate::model::DEFAULT_STEP_INIT;
            self.model.constants_mut(Axis::Ra).step_init = default_init;
            self.model.constants_mut(Axis::De).step_init = default_init;
            self.model.constants_mut(Axis::Ra).step_home = default_init;
            self.model.constants_mut(Axis::De).step_home = default_init + self.model.constants(Axis::De).steps_360 / 4;
        }

        self.set_st4_guide_rate(Axis::Ra, ST4_GUIDE_RATE_HALF)?;
        self.set_st4_guide_rate(Axis::De, ST4_GUIDE_RATE_HALF)?;

        // Snap ports are per-mount, not per-axis; reset is attempted
        // unconditionally and swallows an unsupported-feature reply.
        let _ = self.set_snap_port(false);

        let ra_home = self.model.step_home(Axis::Ra);
        let de_home = self.model.step_home(Axis::De);

        if !self.park.init_park() {
            self.park.set_axis_park(Axis::Ra, ra_home);
            self.park.set_axis_park_default(Axis::Ra, ra_home);
            self.park.set_axis_park(Axis::De, de_home);
            self.park.set_axis_park_default(Axis::De, de_home);
            log::warn!("loading parking data failed; defaulting park position to home (RA={}, DE={})", ra_home, de_home);
            self.park.save_initial_park_position(ra_home, de_home);
        } else {
            self.park.set_axis_park_default(Axis::Ra, ra_home);
            self.park.set_axis_park_default(Axis::De, de_home);
        }

        if self.park.is_parked() {
            let ra_park = self.park.axis_park_position(Axis::Ra);
            let de_park = self.park.axis_park_position(Axis::De);
            log::debug!("mount was parked; writing encoders RA={}, DE={}", ra_park, de_park);
            self.dispatcher.exchange(Opcode::SetAxisPosition, Axis::Ra, &codec::encode_revu24(ra_park))?;
            self.dispatcher.exchange(Opcode::SetAxisPosition, Axis::De, &codec::encode_revu24(de_park))?;
        } else if both_uninitialized {
            log::debug!("mount was not parked; setting DE encoder to home position {}", de_home);
            self.dispatcher.exchange(Opcode::SetAxisPosition, Axis::De, &codec::encode_revu24(de_home))?;
        }

        Ok(())
    }

    // ---- Single-command feature wrappers (§4.7) ----

    pub fn set_snap_port(&mut self, on: bool) -> Result<()> {
        self.dispatcher.exchange(Opcode::SetSnapPort, Axis::Ra, if on { "1" } else { "0" }).map(|_| ())
    }

    pub fn enable_ppec(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_ppec, "PPEC") { return Ok(()); }
        self.set_feature(axis, Subcommand::TurnPpecOn)
    }

    pub fn disable_ppec(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_ppec, "PPEC") { return Ok(()); }
        self.set_feature(axis, Subcommand::TurnPpecOff)
    }

    pub fn start_ppec_training(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_ppec, "PPEC") { return Ok(()); }
        self.set_feature(axis, Subcommand::StartPpecTraining)
    }

    pub fn stop_ppec_training(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_ppec, "PPEC") { return Ok(()); }
        self.set_feature(axis, Subcommand::StopPpecTraining)
    }

    /// Attempts to set polar-scope LED brightness; swallows any mount error
    /// (§4.7, §7 — "LED brightness which attempts and swallows failure").
    pub fn set_led_brightness(&mut self, axis: Axis, brightness: u8) {
        if let Err(e) = self.dispatcher.exchange(Opcode::SetPolarScopeLED, axis, &codec::encode_hiu8(brightness)) {
            log::warn!("setting polar-scope LED brightness failed, ignoring: {}", e);
        }
    }

    pub fn set_st4_guide_rate(&mut self, axis: Axis, rate_code: char) -> Result<()> {
        self.dispatcher.exchange(Opcode::SetST4GuideRate, axis, &rate_code.to_string()).map(|_| ())
    }

    pub fn read_home_indexer(&mut self, axis: Axis) -> Result<u32> {
        self.require_feature(axis, self.model.features(axis).has_home_indexer, "home indexer")?;
        let payload = self.dispatcher.exchange(
            Opcode::GetFeature, axis, &codec::encode_hiu8(Subcommand::GetIndexer.code()))?;
        let value = codec::decode_revu24(&payload)?;
        self.model.state_mut(axis).last_indexer = value;
        Ok(value)
    }

    pub fn reset_home_indexer(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_home_indexer, "home indexer") { return Ok(()); }
        self.set_feature(axis, Subcommand::ResetHomeIndexer)
    }

    pub fn enable_aux_encoder(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_encoder, "auxiliary encoder") { return Ok(()); }
        self.set_feature(axis, Subcommand::EncoderOn)
    }

    pub fn disable_aux_encoder(&mut self, axis: Axis) -> Result<()> {
        if !self.warn_if_missing(axis, self.model.features(axis).has_encoder, "auxiliary encoder") { return Ok(()); }
        self.set_feature(axis, Subcommand::EncoderOff)
    }

    /// Reads the mount's built-in high-resolution auxiliary encoder (§3
    /// invariant 6: legal only if `has_encoder`), distinct from the stepper
    /// position returned by `GetAxisPosition`.
    pub fn read_aux_encoder(&mut self, axis: Axis) -> Result<u32> {
        self.require_feature(axis, self.model.features(axis).has_encoder, "auxiliary encoder")?;
        let payload = self.dispatcher.exchange(
            Opcode::GetFeature, axis, &codec::encode_hiu8(Subcommand::GetAuxEncoder.code()))?;
        codec::decode_revu24(&payload)
    }

    /// Used by read operations (`read_home_indexer`, `read_aux_encoder`):
    /// there is no sensible value to silently return in place of hardware
    /// data, so these still raise `InvalidParameter` on an unsupported axis
    /// (§3 invariant 6).
    fn require_feature(&self, axis: Axis, present: bool, name: &str) -> Result<()> {
        if present {
            Ok(())
        } else {
            log::warn!("axis {:?} does not support {}, ignoring request", axis, name);
            Err(MountError::invalid_parameter(format!("axis {:?} does not support {}", axis, name)))
        }
    }

    /// Used by single-command feature toggles (PEC, home indexer, aux
    /// encoder enable/disable): per §4.7, these MUST silently no-op (after
    /// logging a warning) rather than error when the hardware lacks the
    /// capability. Returns whether the caller should proceed.
    fn warn_if_missing(&self, axis: Axis, present: bool, name: &str) -> bool {
        if !present {
            log::warn!("axis {:?} does not support {}, ignoring request", axis, name);
        }
        present
    }

    fn set_feature(&mut self, axis: Axis, subcommand: Subcommand) -> Result<()> {
        self.dispatcher.exchange(Opcode::SetFeature, axis, &codec::encode_hiu8(subcommand.code())).map(|_| ())
    }
}

fn codec_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(MountError::invalid_cmd(format!("non-hex status nibble 0x{:02X}", c))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::model::AxisConstants;
    use crate::transport::test_support::{MockPort, MockSerial};
    use std::sync::{Arc, Mutex};

    fn make_executor(mock: Arc<Mutex<MockSerial>>) -> Executor<MockPort, NullParkPersistence> {
        let dispatcher = Dispatcher::from_transport(
            crate::transport::Transport::from_io(MockPort::new(mock), DriverConfig::default()));
        Executor::from_parts(dispatcher, NullParkPersistence)
    }

    fn with_constants(executor: &mut Executor<MockPort, NullParkPersistence>) {
        let constants = AxisConstants {
            steps_360: 9_024_000,
            steps_worm: 64_935,
            highspeed_ratio: 16,
            step_init: 0x800000,
            step_home: 0x800000,
            min_period: 6,
            backlash_period: 1000,
        };
        *executor.model.constants_mut(Axis::Ra) = constants;
        *executor.model.constants_mut(Axis::De) = constants;
    }

    #[test]
    fn read_motor_status_decodes_nibbles() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        // mode/dir/speed nibble 0x01 = slew/forward/lowspeed, running=1, init=1
        mock.lock().unwrap().push_reply("=111");
        let mut e = make_executor(mock);
        e.read_motor_status(Axis::Ra).unwrap();
        let state = e.model.state(Axis::Ra);
        assert_eq!(state.status.slew_mode, SlewMode::Slew);
        assert_eq!(state.status.direction, Direction::Forward);
        assert_eq!(state.status.speed_mode, SpeedMode::LowSpeed);
        assert!(state.running);
        assert!(state.initialized);
    }

    #[test]
    fn slew_while_goto_running_is_rejected() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        // GetAxisStatus: goto(0) running(1) -> nibble0=0 (goto/fwd/low), nibble1=1 (running)
        mock.lock().unwrap().push_reply("=011");
        let mut e = make_executor(mock);
        with_constants(&mut e);
        let err = e.slew_axis(Axis::Ra, 1.0).unwrap_err();
        assert!(matches!(err, MountError::InvalidParameter(_)));
    }

    #[test]
    fn stop_wait_motor_polls_until_idle() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        {
            let mut m = mock.lock().unwrap();
            m.push_reply("=111"); // initial ReadMotorStatus: running
            m.push_reply("=110"); // NotInstantAxisStop has no reply payload read separately in this mock model
            m.push_reply("=111"); // post-stop-command status read: still running
            m.push_reply("=110"); // now idle
        }
        let mut e = make_executor(mock);
        e.stop_wait_motor(Axis::Ra).unwrap();
        assert!(!e.model.state(Axis::Ra).running);
    }

    #[test]
    fn set_rate_while_running_rejects_speed_mode_change() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        // running, lowspeed (nibble0 bit2=0)
        mock.lock().unwrap().push_reply("=111");
        let mut e = make_executor(mock);
        with_constants(&mut e);
        let err = e.set_rate(Axis::Ra, 200.0).unwrap_err();
        assert!(matches!(err, MountError::InvalidParameter(_)));
    }

    #[test]
    fn motion_mode_chars_match_protocol_table() {
        assert_eq!(motion_mode_char(SlewMode::Slew, SpeedMode::LowSpeed), '1');
        assert_eq!(motion_mode_char(SlewMode::Slew, SpeedMode::HighSpeed), '3');
        assert_eq!(motion_mode_char(SlewMode::Goto, SpeedMode::LowSpeed), '2');
        assert_eq!(motion_mode_char(SlewMode::Goto, SpeedMode::HighSpeed), '0');
        assert_eq!(direction_char(Direction::Forward), '0');
        assert_eq!(direction_char(Direction::Backward), '1');
    }

    #[test]
    fn unsupported_feature_toggle_silently_no_ops_with_warning() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        let mut e = make_executor(mock.clone());
        e.enable_ppec(Axis::Ra).unwrap();
        assert!(mock.lock().unwrap().written.is_empty(), "no wire command should be sent for an unsupported feature");
    }

    #[test]
    fn read_aux_encoder_requires_feature_and_decodes_reply() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        let mut e = make_executor(mock);
        let err = e.read_aux_encoder(Axis::Ra).unwrap_err();
        assert!(matches!(err, MountError::InvalidParameter(_)));

        let mock = Arc::new(Mutex::new(MockSerial::new()));
        mock.lock().unwrap().push_reply("=00C350");
        let mut e = make_executor(mock);
        e.model.features_mut(Axis::Ra).has_encoder = true;
        let value = e.read_aux_encoder(Axis::Ra).unwrap();
        assert_eq!(value, 0x00C350);
    }

    /// In-memory `ParkPersistence` that reports a previously-saved park at a
    /// fixed encoder position, to exercise `Init`'s parked-restore branch.
    struct FakeParkPersistence {
        ra_park: u32,
        de_park: u32,
    }

    impl ParkPersistence for FakeParkPersistence {
        fn init_park(&mut self) -> bool { true }
        fn is_parked(&self) -> bool { true }
        fn axis_park_position(&self, axis: Axis) -> u32 {
            match axis { Axis::Ra => self.ra_park, Axis::De => self.de_park }
        }
        fn set_axis_park(&mut self, _axis: Axis, _position: u32) {}
        fn set_axis_park_default(&mut self, _axis: Axis, _position: u32) {}
        fn save_initial_park_position(&mut self, _ra_position: u32, _de_position: u32) {}
    }

    #[test]
    fn init_restores_saved_park_position_not_home() {
        let mock = Arc::new(Mutex::new(MockSerial::new()));
        {
            let mut m = mock.lock().unwrap();
            m.push_reply("=000"); // read_motor_status Ra: uninitialized
            m.push_reply("=000"); // read_motor_status De: uninitialized
            m.push_reply("=800000"); // get_axis_position Ra
            m.push_reply("=810000"); // get_axis_position De
            m.push_reply("="); // Initialize Ra
            m.push_reply("="); // Initialize De
            m.push_reply("="); // SetST4GuideRate Ra
            m.push_reply("="); // SetST4GuideRate De
            m.push_reply("="); // SetSnapPort
            m.push_reply("="); // SetAxisPosition Ra (restore park)
            m.push_reply("="); // SetAxisPosition De (restore park)
        }
        let dispatcher = Dispatcher::from_transport(
            crate::transport::Transport::from_io(MockPort::new(mock.clone()), DriverConfig::default()));
        let mut e = Executor::from_parts(dispatcher, FakeParkPersistence { ra_park: 0x700001, de_park: 0x700002 });
        let constants = AxisConstants {
            steps_360: 9_024_000, steps_worm: 64_935, highspeed_ratio: 16,
            step_init: 0x800000, step_home: 0x800000, min_period: 6, backlash_period: 1000,
        };
        *e.model.constants_mut(Axis::Ra) = constants;
        *e.model.constants_mut(Axis::De) = constants;

        e.init().unwrap();

        let written = mock.lock().unwrap().written.clone();
        let last_two: Vec<String> = written[written.len() - 2..]
            .iter().map(|f| String::from_utf8_lossy(f).to_string()).collect();
        assert_eq!(last_two[0], format!(":E1{}\r", codec::encode_revu24(0x700001)));
        assert_eq!(last_two[1], format!(":E2{}\r", codec::encode_revu24(0x700002)));
    }
}
