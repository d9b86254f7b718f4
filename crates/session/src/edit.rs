//! Editing modes for placed objects.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// What a twist/pinch gesture changes on the selected objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditMode {
    /// Twist rotates about the current [`RotationAxis`].
    #[default]
    Rotate,
    /// Pinch scales.
    Scale,
}

/// Axis a twist gesture rotates about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationAxis {
    /// Pitch.
    X,
    /// Yaw.
    #[default]
    Y,
    /// Roll.
    Z,
}

impl RotationAxis {
    /// Unit vector of the axis.
    pub fn unit(self) -> Vec3 {
        match self {
            Self::X => Vec3::X,
            Self::Y => Vec3::Y,
            Self::Z => Vec3::Z,
        }
    }

    /// Axis recorded for a positive twist; clockwise twists rotate negatively.
    pub fn twist_axis(self) -> Vec3 {
        -self.unit()
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// World axes a drag is allowed to move an object along.
    pub struct AxisMask: u8 {
        const X = 0b0000_0001;
        const Y = 0b0000_0010;
        const Z = 0b0000_0100;
    }
}

impl Default for AxisMask {
    fn default() -> Self {
        AxisMask::all()
    }
}

impl AxisMask {
    /// Zero the components of `delta` outside the mask.
    pub fn apply(self, delta: Vec3) -> Vec3 {
        Vec3::new(
            if self.contains(Self::X) { delta.x } else { 0.0 },
            if self.contains(Self::Y) { delta.y } else { 0.0 },
            if self.contains(Self::Z) { delta.z } else { 0.0 },
        )
    }
}
