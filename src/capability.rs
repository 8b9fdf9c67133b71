//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Capability Discovery (C5): board version, gear constants and feature
//! register, run once at Handshake/Init.
//!

use crate::codec;
use crate::dispatcher::Dispatcher;
use crate::error::{MountError, Result};
use crate::model::{Axis, Features, MountModel};
use crate::mount_table;
use crate::opcode::{Opcode, Subcommand};
use crate::transport::PortOps;
use strum::IntoEnumIterator;

/// Stellar day, in seconds (one sidereal revolution).
pub const STELLAR_DAY_SECONDS: f64 = 86164.0905;

/// Placeholder for the firmware's actual backlash-speed build constant
/// (see DESIGN.md); used for both axes until real per-axis values are
/// recovered.
pub const DEFAULT_BACKLASH_RATE_MULTIPLIER: f64 = 64.0;

/// Runs the full discovery sequence (§4.5) and populates `model`.
pub fn handshake<P: PortOps>(dispatcher: &mut Dispatcher<P>, model: &mut MountModel) -> Result<()> {
    inquire_mount_identity(dispatcher, model)?;

    for axis in Axis::iter() {
        inquire_gear_constants(dispatcher, model, axis)?;
    }

    apply_steps_worm_overrides(model);

    for axis in Axis::iter() {
        let backlash_period = compute_backlash_period(model, axis);
        model.constants_mut(axis).backlash_period = backlash_period;
    }

    inquire_features(dispatcher, model)?;

    Ok(())
}

fn inquire_mount_identity<P: PortOps>(dispatcher: &mut Dispatcher<P>, model: &mut MountModel) -> Result<()> {
    let payload = dispatcher.exchange(Opcode::InquireMotorBoardVersion, Axis::Ra, "")?;
    let raw = codec::decode_revu24(&payload)?;

    // The wire value's outer bytes are swapped relative to the canonical
    // version the rest of the driver (and the mount-code table) expects.
    let mc_version = ((raw & 0xFF) << 16) | (raw & 0xFF00) | ((raw >> 16) & 0xFF);
    let mount_code = (mc_version & 0xFF) as u8;

    if mount_table::REJECTED_MOUNT_CODES.contains(&mount_code) {
        return Err(MountError::disconnect(format!(
            "mount code 0x{:02X} is not supported by this driver", mount_code
        )));
    }

    model.identity.mc_version = mc_version;
    model.identity.mount_code = mount_code;
    model.identity.name = mount_table::mount_name(mount_code).to_string();

    if let Some((ra_min, de_min)) = mount_table::min_period_override(mount_code) {
        model.constants_mut(Axis::Ra).min_period = ra_min;
        model.constants_mut(Axis::De).min_period = de_min;
    }

    Ok(())
}

fn inquire_gear_constants<P: PortOps>(
    dispatcher: &mut Dispatcher<P>, model: &mut MountModel, axis: Axis
) -> Result<()> {
    let steps_360 = codec::decode_revu24(&dispatcher.exchange(Opcode::InquireGridPerRevolution, axis, "")?)?;
    let steps_worm = codec::decode_revu24(&dispatcher.exchange(Opcode::InquireTimerInterruptFreq, axis, "")?)?;
    let highspeed_ratio = codec::decode_hiu8(&dispatcher.exchange(Opcode::InquireHighSpeedRatio, axis, "")?)? as u32;

    let constants = model.constants_mut(axis);
    constants.steps_360 = steps_360;
    constants.steps_worm = steps_worm;
    constants.highspeed_ratio = highspeed_ratio;
    if constants.min_period == 0 {
        constants.min_period = crate::model::DEFAULT_MIN_PERIOD;
    }
    constants.step_init = crate::model::DEFAULT_STEP_INIT;

    Ok(())
}

fn apply_steps_worm_overrides(model: &mut MountModel) {
    let mc_version = model.mc_version();
    let low_byte = (mc_version & 0xFF) as u8;

    let override_value = if low_byte == 0x80 {
        Some(0x162B97)
    } else if low_byte == 0x82 {
        Some(0x205318)
    } else if mc_version == 0x10601 {
        Some(0xFC80)
    } else {
        None
    };

    if let Some(steps_worm) = override_value {
        for axis in Axis::iter() {
            model.constants_mut(axis).steps_worm = steps_worm;
        }
    }
}

fn compute_backlash_period(model: &MountModel, axis: Axis) -> u32 {
    let constants = model.constants(axis);
    (STELLAR_DAY_SECONDS * constants.steps_worm as f64
        / constants.steps_360 as f64
        / DEFAULT_BACKLASH_RATE_MULTIPLIER).round() as u32
}

fn inquire_features<P: PortOps>(dispatcher: &mut Dispatcher<P>, model: &mut MountModel) -> Result<()> {
    let mut decoded = [Features::default(); 2];
    let mut raw_register = [0u32; 2];
    let mut ok = [false; 2];

    for axis in Axis::iter() {
        match dispatcher.exchange(Opcode::GetFeature, axis, &codec::encode_hiu8(Subcommand::GetFeatures.code())) {
            Ok(payload) => {
                let raw = codec::decode_revu24(&payload)?;
                raw_register[axis.index()] = raw;
                decoded[axis.index()] = decode_feature_register(raw);
                ok[axis.index()] = true;
            },
            Err(e) => {
                log::warn!("GetFeatures failed on axis {:?}: {} — defaulting all feature bits to false", axis, e);
            }
        }
    }

    if ok[Axis::Ra.index()] && ok[Axis::De.index()] {
        // Encoder/PPEC nibble (hasEncoder, hasPPEC, hasHomeIndexer, isAZEQ).
        if raw_register[Axis::Ra.index()] & 0x000000F0 != raw_register[Axis::De.index()] & 0x000000F0 {
            log::warn!("feature masks differ between RA and DE axes in the encoder/PPEC nibble");
        }
    }

    for axis in Axis::iter() {
        *model.features_mut(axis) = decoded[axis.index()];
    }

    Ok(())
}

/// Decodes the Get-Features reply's 24-bit register into named flags.
/// Bit layout taken directly from `original_source/skywatcher.cpp`'s
/// `InquireFeatures` (`AxisFeatures[...].hasEncoder = ... & 0x01`, etc.).
fn decode_feature_register(raw: u32) -> Features {
    Features {
        has_encoder: raw & 0x00000001 != 0,
        has_ppec: raw & 0x00000002 != 0,
        has_home_indexer: raw & 0x00000004 != 0,
        is_azeq: raw & 0x00000008 != 0,
        in_ppec_training: raw & 0x00000010 != 0,
        in_ppec: raw & 0x00000020 != 0,
        has_polar_led: raw & 0x00001000 != 0,
        has_common_slew_start: raw & 0x00002000 != 0,
        has_half_current_tracking: raw & 0x00004000 != 0,
        has_wifi: raw & 0x00008000 != 0,
    }
}
