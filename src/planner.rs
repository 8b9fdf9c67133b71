//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Motion Planner (C7): turns a signed rate or an encoder delta into the
//! numeric parameters (period, direction, speed mode, target, break-point)
//! the Executor programs into the mount. Pure computation; no I/O.
//!

use crate::capability::STELLAR_DAY_SECONDS;
use crate::error::{MountError, Result};
use crate::model::{AxisConstants, Direction, SpeedMode};

/// One sidereal revolution per stellar day, in radians/second.
pub const SIDEREAL_RATE: f64 = 2.0 * std::f64::consts::PI / STELLAR_DAY_SECONDS;

/// Smallest admissible |rate|, in multiples of sidereal. The original
/// driver's `MIN_RATE` is a header constant not present in
/// `original_source/skywatcher.cpp` (only `get_min_rate()`'s pass-through is
/// retained); `0.0` would make the lower-bound check dead and divide by zero
/// in [`plan_rate`], so a small positive placeholder is used instead until
/// the real firmware-specific value is recovered (see DESIGN.md).
pub const MIN_RATE: f64 = 1.0e-6;
/// Largest admissible |rate|, in multiples of sidereal.
pub const MAX_RATE: f64 = 800.0;
/// Rate above which the controller switches to high-speed mode.
pub const LOWSPEED_THRESHOLD: f64 = 128.0;

/// Fixed low-speed goto period, used when a relative/absolute goto chooses
/// `SpeedMode::LowSpeed`.
pub const LOWSPEED_GOTO_PERIOD: u32 = 18;
/// |delta| above which a goto selects high-speed mode.
pub const LOWSPEED_MARGIN: u32 = 20000;
/// Upper bound on the break-point countdown in high-speed mode.
pub const MAX_HIGHSPEED_BREAKS: u32 = 3200;
/// Upper bound on the break-point countdown in low-speed mode.
pub const MAX_LOWSPEED_BREAKS: u32 = 200;

/// The numeric parameters for a continuous slew or a rate change.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RatePlan {
    pub period: u32,
    pub direction: Direction,
    pub speed_mode: SpeedMode,
}

/// The numeric parameters for a relative or absolute goto on one axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GotoPlan {
    pub period: u32,
    pub direction: Direction,
    pub speed_mode: SpeedMode,
    pub target: u32,
    pub breaks: u32,
}

/// Converts a signed rate (multiples of sidereal) into a period/direction/
/// speed-mode triple (§4.7 "Rate-to-period").
pub fn plan_rate(constants: &AxisConstants, rate: f64) -> Result<RatePlan> {
    let magnitude = rate.abs();
    if magnitude < MIN_RATE || magnitude > MAX_RATE {
        return Err(MountError::invalid_parameter(format!(
            "rate {} (x sidereal) out of range [{}, {}]", rate, MIN_RATE, MAX_RATE
        )));
    }

    let direction = if rate >= 0.0 { Direction::Forward } else { Direction::Backward };

    let (speed_mode, adjusted_magnitude) = if magnitude > LOWSPEED_THRESHOLD {
        (SpeedMode::HighSpeed, magnitude / constants.highspeed_ratio as f64)
    } else {
        (SpeedMode::LowSpeed, magnitude)
    };

    let mut period = (STELLAR_DAY_SECONDS * constants.steps_worm as f64
        / constants.steps_360 as f64
        / adjusted_magnitude).round() as u32;

    if speed_mode == SpeedMode::HighSpeed && period < constants.min_period {
        period = constants.min_period;
    }

    Ok(RatePlan { period, direction, speed_mode })
}

/// Converts an encoder delta into a goto plan (§4.7 "Relative goto").
/// `delta` is signed (positive = forward); `absolute` selects between the
/// relative-increment shape and the absolute-target shape used by
/// `AbsSlewTo` (break-point computed from `target ∓ breaks` rather than
/// the increment countdown).
pub fn plan_goto(constants: &AxisConstants, delta: i64, absolute_target: Option<u32>) -> GotoPlan {
    let magnitude = delta.unsigned_abs() as u32;
    let direction = if delta >= 0 { Direction::Forward } else { Direction::Backward };

    let speed_mode = if magnitude > LOWSPEED_MARGIN { SpeedMode::HighSpeed } else { SpeedMode::LowSpeed };

    let period = if speed_mode == SpeedMode::HighSpeed { constants.min_period } else { LOWSPEED_GOTO_PERIOD };

    let breaks = if speed_mode == SpeedMode::HighSpeed {
        std::cmp::min(MAX_HIGHSPEED_BREAKS, magnitude / 10)
    } else {
        std::cmp::min(MAX_LOWSPEED_BREAKS, magnitude / 10)
    };

    let target = match absolute_target {
        Some(abs) => abs,
        None => magnitude,
    };

    GotoPlan { period, direction, speed_mode, target, breaks }
}

/// Absolute break-step value for `SetBreakStep` (§4.7 "Absolute goto"):
/// `target - breaks` moving forward, `target + breaks` moving backward.
pub fn absolute_break_step(plan: &GotoPlan) -> u32 {
    match plan.direction {
        Direction::Forward => plan.target.saturating_sub(plan.breaks),
        Direction::Backward => plan.target.saturating_add(plan.breaks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_constants() -> AxisConstants {
        AxisConstants {
            steps_360: 9_024_000,
            steps_worm: 64_935,
            highspeed_ratio: 16,
            step_init: 0x800000,
            step_home: 0x800000,
            min_period: 6,
            backlash_period: 1000,
        }
    }

    #[test]
    fn sidereal_rate_plan_matches_spec_example() {
        let c = test_constants();
        let plan = plan_rate(&c, 1.0).unwrap();
        let expected = (STELLAR_DAY_SECONDS * c.steps_worm as f64 / c.steps_360 as f64 / 1.0).round() as u32;
        assert_eq!(plan.period, expected);
        assert_eq!(plan.speed_mode, SpeedMode::LowSpeed);
        assert_eq!(plan.direction, Direction::Forward);
    }

    #[test]
    fn highspeed_switchover_divides_by_ratio_and_clamps_min_period() {
        let c = test_constants();
        let plan = plan_rate(&c, 800.0).unwrap();
        assert_eq!(plan.speed_mode, SpeedMode::HighSpeed);
        assert!(plan.period >= c.min_period);
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let c = test_constants();
        assert!(plan_rate(&c, 900.0).is_err());
    }

    #[test]
    fn zero_rate_is_rejected_not_divided_by() {
        let c = test_constants();
        assert!(plan_rate(&c, 0.0).is_err());
    }

    #[test]
    fn negative_rate_yields_backward_direction() {
        let c = test_constants();
        let plan = plan_rate(&c, -1.0).unwrap();
        assert_eq!(plan.direction, Direction::Backward);
    }

    #[test]
    fn highspeed_goto_matches_spec_example() {
        let c = test_constants();
        let plan = plan_goto(&c, 100_000, None);
        assert_eq!(plan.speed_mode, SpeedMode::HighSpeed);
        assert_eq!(plan.period, c.min_period);
        assert_eq!(plan.target, 100_000);
        assert_eq!(plan.breaks, 3200);
        assert_eq!(plan.direction, Direction::Forward);
    }

    #[test]
    fn lowspeed_goto_below_margin() {
        let c = test_constants();
        let plan = plan_goto(&c, 5_000, None);
        assert_eq!(plan.speed_mode, SpeedMode::LowSpeed);
        assert_eq!(plan.period, LOWSPEED_GOTO_PERIOD);
        assert_eq!(plan.breaks, 200);
    }

    #[test]
    fn absolute_break_step_forward_and_backward() {
        let mut plan = GotoPlan { period: 6, direction: Direction::Forward, speed_mode: SpeedMode::HighSpeed, target: 100_000, breaks: 3200 };
        assert_eq!(absolute_break_step(&plan), 96_800);
        plan.direction = Direction::Backward;
        assert_eq!(absolute_break_step(&plan), 103_200);
    }
}
