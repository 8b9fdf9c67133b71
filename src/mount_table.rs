//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Mount-code -> human-readable name table (§6), grounded directly on
//! `original_source/skywatcher.cpp::InquireBoardVersion`'s `switch (MountCode)`.
//!

/// Mount codes the driver refuses to operate (§3 invariant 5, §9 open question).
pub const REJECTED_MOUNT_CODES: [u8; 3] = [0x80, 0x81, 0x90];

pub fn mount_name(mount_code: u8) -> &'static str {
    match mount_code {
        0x00 => "EQ6",
        0x01 => "HEQ5",
        0x02 => "EQ5",
        0x03 => "EQ3",
        0x04 => "EQ8",
        0x05 => "AZEQ6",
        0x06 => "AZEQ5",
        0x0A => "Star Adventurer",
        0x0C => "Star Adventurer GTi",
        0x20 => "EQ8-R Pro",
        0x22 => "AZEQ6 Pro",
        0x23 => "EQ6-R Pro",
        0x25 => "CQ350 Pro",
        0x31 => "EQ5 Pro",
        0x45 => "Wave 150i",
        0x80 => "GT",
        0x81 => "MF",
        0x82 => "114GT",
        0x90 => "DOB",
        0xA5 => "AZ-GTi",
        0xF0 => "GEEHALEL",
        _ => "CUSTOM",
    }
}

/// Per-mount `min_period` override (§4.5 step 2); `None` means use the
/// codec-wide default ([`crate::model::DEFAULT_MIN_PERIOD`]).
pub fn min_period_override(mount_code: u8) -> Option<(u32, u32)> {
    match mount_code {
        // GEEHALEL custom firmware.
        0xF0 => Some((13, 16)),
        _ => None,
    }
}
