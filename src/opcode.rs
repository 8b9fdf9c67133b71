//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Wire opcode table (§6).
//!

/// Single-character command opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    InquireMotorBoardVersion,
    InquireGridPerRevolution,
    InquireTimerInterruptFreq,
    InquireHighSpeedRatio,
    GetAxisPosition,
    GetAxisStatus,
    Initialize,
    SetMotionMode,
    SetStepPeriod,
    SetGotoTargetIncrement,
    SetBreakPointIncrement,
    SetGotoTarget,
    SetBreakStep,
    SetAxisPosition,
    StartMotion,
    NotInstantAxisStop,
    InstantAxisStop,
    SetST4GuideRate,
    GetFeature,
    SetFeature,
    SetSnapPort,
    SetPolarScopeLED,
}

impl Opcode {
    pub fn as_char(self) -> char {
        use Opcode::*;
        match self {
            InquireMotorBoardVersion => 'e',
            InquireGridPerRevolution => 'a',
            InquireTimerInterruptFreq => 'b',
            InquireHighSpeedRatio => 'g',
            GetAxisPosition => 'j',
            GetAxisStatus => 'f',
            Initialize => 'F',
            SetMotionMode => 'G',
            SetStepPeriod => 'I',
            SetGotoTargetIncrement => 'H',
            SetBreakPointIncrement => 'M',
            SetGotoTarget => 'S',
            SetBreakStep => 'U',
            SetAxisPosition => 'E',
            StartMotion => 'J',
            NotInstantAxisStop => 'K',
            InstantAxisStop => 'L',
            SetST4GuideRate => 'P',
            GetFeature => 'q',
            SetFeature => 'W',
            SetSnapPort => 'O',
            SetPolarScopeLED => 'V',
        }
    }
}

/// Hi-u8 subcommand codes for the `q` (`GetFeature`) / `W` (`SetFeature`)
/// opcodes. The retained original source (`original_source/skywatcher.cpp`)
/// only names these symbols via header constants that were not kept with
/// the file; see DESIGN.md for how the numeric values below were chosen and
/// why they are isolated to this one table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Subcommand {
    GetFeatures,
    GetIndexer,
    ResetHomeIndexer,
    GetAuxEncoder,
    EncoderOn,
    EncoderOff,
    StartPpecTraining,
    StopPpecTraining,
    TurnPpecOn,
    TurnPpecOff,
}

impl Subcommand {
    pub fn code(self) -> u8 {
        use Subcommand::*;
        match self {
            GetFeatures => 0x00,
            GetIndexer => 0x01,
            ResetHomeIndexer => 0x02,
            GetAuxEncoder => 0x03,
            EncoderOn => 0x10,
            EncoderOff => 0x11,
            StartPpecTraining => 0x20,
            StopPpecTraining => 0x21,
            TurnPpecOn => 0x22,
            TurnPpecOff => 0x23,
        }
    }
}

/// Reply error code for "insufficient data" (e.g. enabling PEC with no
/// trained data yet).
pub const ERR_PEC_NOT_TRAINED: u8 = b'8';
