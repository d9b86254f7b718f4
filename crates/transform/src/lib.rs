#![warn(missing_docs)]
//! Anchor-local coordinate transforms.
//!
//! Object poses are persisted relative to the anchor they were placed under so
//! that they can be replayed against wherever that anchor resolves later. All
//! angles crossing this API are Euler angles in degrees, composed as
//! yaw (Y) · pitch (X) · roll (Z).

mod local;
mod pose;
mod rotation;

pub use local::{inverse_rotation_matrix, rot_x, rot_y, rot_z, to_local, to_world, world_offset};
pub use pose::{euler_degrees, quat_from_euler_degrees, wrap_degrees, Pose};
pub use rotation::{replay_rotations, rotate_self, RotationHistory};
