#![warn(missing_docs)]
//! Core records and primitives shared across the kitting workspace.

pub mod clock;
pub mod ids;
pub mod records;

use serde::{Deserialize, Serialize};

pub use clock::{Clock, SystemClock};
pub use ids::{AnchorKey, CloudHandle, MarkerId, ObjectId, PlaneId};
pub use records::{
    format_timestamp, parse_timestamp, AnchorHistoryCollection, AnchorRecord,
    AttachedObjectRecord, Euler3, PieceInfo, BOX_KIND, TIMESTAMP_FORMAT,
};

/// Fixed tick counter driving the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick of any session.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }

    /// Ticks elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn since(self, earlier: SimTick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Convert a duration in seconds into a whole number of ticks at `tick_rate` Hz.
///
/// Rounds up so that a delay never fires early; a zero or negative delay maps to
/// zero ticks.
pub fn seconds_to_ticks(seconds: f32, tick_rate: u32) -> u64 {
    if seconds <= 0.0 || tick_rate == 0 {
        return 0;
    }
    (seconds * tick_rate as f32 - 1e-4).ceil().max(0.0) as u64
}
