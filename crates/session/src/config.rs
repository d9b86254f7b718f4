use kitting_anchors::HOSTING_LIFETIME_DAYS;
use kitting_core::seconds_to_ticks;
use serde::{Deserialize, Serialize};

/// Session timing and sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Lifetime requested when hosting an anchor.
    pub hosting_days: u32,
    /// Delay between quality convergence and the first object appearing.
    pub convergence_delay_secs: f32,
    /// Delay between kit completion and returning to scanning.
    pub kit_complete_delay_secs: f32,
    /// Half size of the anchor marker cube.
    pub marker_half_extent: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            hosting_days: HOSTING_LIFETIME_DAYS,
            convergence_delay_secs: 1.5,
            kit_complete_delay_secs: 1.0,
            marker_half_extent: 0.1,
        }
    }
}

impl SessionConfig {
    /// Convergence delay in ticks.
    pub fn convergence_delay_ticks(&self) -> u64 {
        seconds_to_ticks(self.convergence_delay_secs, self.tick_rate)
    }

    /// Kit-complete delay in ticks.
    pub fn kit_complete_delay_ticks(&self) -> u64 {
        seconds_to_ticks(self.kit_complete_delay_secs, self.tick_rate)
    }
}
