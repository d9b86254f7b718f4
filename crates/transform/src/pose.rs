use glam::{EulerRot, Quat, Vec3};
use kitting_core::Euler3;

/// Position + orientation in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation.
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// Origin with no rotation.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose from position and rotation.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a pose from a position and Euler angles in degrees.
    pub fn from_euler_degrees(position: Vec3, euler: Euler3) -> Self {
        Self::new(position, quat_from_euler_degrees(euler))
    }

    /// Orientation as Euler angles in degrees, each wrapped to `[0, 360)`.
    pub fn euler_degrees(&self) -> Euler3 {
        euler_degrees(self.rotation)
    }

    /// Local +Z axis in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Local +Y axis in world space.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Move by `offset` expressed in this pose's local frame.
    pub fn translate_local(&mut self, offset: Vec3) {
        self.position += self.rotation * offset;
    }
}

/// Build a rotation from Euler degrees applied roll, then pitch, then yaw.
pub fn quat_from_euler_degrees(euler: Euler3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    )
}

/// Decompose a rotation into Euler degrees in `[0, 360)`.
///
/// Near ±90° pitch the decomposition is not unique; any returned triple still
/// recomposes to the same rotation.
pub fn euler_degrees(rotation: Quat) -> Euler3 {
    let (yaw, pitch, roll) = rotation.normalize().to_euler(EulerRot::YXZ);
    Euler3::new(
        wrap_degrees(pitch.to_degrees()),
        wrap_degrees(yaw.to_degrees()),
        wrap_degrees(roll.to_degrees()),
    )
}

/// Wrap an angle into `[0, 360)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
