//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Park-state collaborator (§4.8). `Init` reads/writes parking state through
//! this trait instead of owning a persistence backend itself.
//!

use crate::model::Axis;

/// Supplies and accepts parked-position state across `Init`. Implemented by
/// the owning application; persistence itself is out of scope here.
pub trait ParkPersistence {
    /// Loads persisted park position/flag for both axes. Returns `false` if
    /// nothing was ever saved (first run).
    fn init_park(&mut self) -> bool;

    /// Whether the mount is currently considered parked.
    fn is_parked(&self) -> bool;

    /// The encoder position `axis` was parked at. Only meaningful when
    /// [`ParkPersistence::is_parked`] is `true`.
    fn axis_park_position(&self, axis: Axis) -> u32;

    /// Records the park position for `axis` (used when no prior park data
    /// exists, so the freshly-computed home position becomes the park
    /// position too).
    fn set_axis_park(&mut self, axis: Axis, position: u32);

    /// Records a default park position for `axis`, used as the fallback a
    /// UI would offer if the user asks to re-park without having moved yet.
    fn set_axis_park_default(&mut self, axis: Axis, position: u32);

    /// Persists the axes' current encoder positions as the initial park
    /// position, run once after a first-ever `Init` finds no saved park data.
    fn save_initial_park_position(&mut self, ra_position: u32, de_position: u32);
}

/// A `ParkPersistence` that has never seen a park and discards writes.
/// Lets `Init` run and be tested without a real persistence backend wired in.
#[derive(Default)]
pub struct NullParkPersistence;

impl ParkPersistence for NullParkPersistence {
    fn init_park(&mut self) -> bool { false }
    fn is_parked(&self) -> bool { false }
    fn axis_park_position(&self, _axis: Axis) -> u32 { 0 }
    fn set_axis_park(&mut self, _axis: Axis, _position: u32) {}
    fn set_axis_park_default(&mut self, _axis: Axis, _position: u32) {}
    fn save_initial_park_position(&mut self, _ra_position: u32, _de_position: u32) {}
}
