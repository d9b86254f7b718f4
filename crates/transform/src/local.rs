use glam::{Mat3, Vec3};
use kitting_core::Euler3;

use crate::pose::Pose;

/// Rotation about X by `angle` radians.
pub fn rot_x(angle: f32) -> Mat3 {
    let (s, c) = angle.sin_cos();
    //  1  0  0
    //  0  c -s
    //  0  s  c
    Mat3::from_cols(Vec3::X, Vec3::new(0.0, c, s), Vec3::new(0.0, -s, c))
}

/// Rotation about Y by `angle` radians.
pub fn rot_y(angle: f32) -> Mat3 {
    let (s, c) = angle.sin_cos();
    //  c  0  s
    //  0  1  0
    // -s  0  c
    Mat3::from_cols(Vec3::new(c, 0.0, -s), Vec3::Y, Vec3::new(s, 0.0, c))
}

/// Rotation about Z by `angle` radians.
pub fn rot_z(angle: f32) -> Mat3 {
    let (s, c) = angle.sin_cos();
    //  c -s  0
    //  s  c  0
    //  0  0  1
    Mat3::from_cols(Vec3::new(c, s, 0.0), Vec3::new(-s, c, 0.0), Vec3::Z)
}

/// `Rz(-z) · Rx(-x) · Ry(-y)` for Euler angles in degrees.
///
/// This undoes a yaw · pitch · roll orientation, taking world-space offsets into
/// the un-rotated frame of whatever carries `euler`.
pub fn inverse_rotation_matrix(euler: Euler3) -> Mat3 {
    rot_z(-euler.z.to_radians()) * rot_x(-euler.x.to_radians()) * rot_y(-euler.y.to_radians())
}

/// Express `object_world` in the local frame of `anchor`.
///
/// Euler composition is kept on purpose: stored records were produced this way
/// and pitch near ±90° suffers the usual gimbal-lock precision loss.
pub fn to_local(anchor: &Pose, object_world: Vec3) -> Vec3 {
    let r = inverse_rotation_matrix(anchor.euler_degrees());
    r * (object_world - anchor.position)
}

/// World-space offset from the anchor's live position for a stored local position.
pub fn world_offset(anchor: &Pose, local: Vec3) -> Vec3 {
    anchor.rotation * local
}

/// Rebuild a world position from a stored local position.
///
/// Equivalent to creating the object at the anchor's live pose and translating
/// it by `local` in that pose's own frame.
pub fn to_world(anchor: &Pose, local: Vec3) -> Vec3 {
    let mut placed = *anchor;
    placed.translate_local(local);
    placed.position
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn axis_matrices_match_glam() {
        let angle = 0.7;
        let v = Vec3::new(0.3, -1.2, 2.5);
        assert!(approx(rot_x(angle) * v, Mat3::from_rotation_x(angle) * v));
        assert!(approx(rot_y(angle) * v, Mat3::from_rotation_y(angle) * v));
        assert!(approx(rot_z(angle) * v, Mat3::from_rotation_z(angle) * v));
    }

    #[test]
    fn identity_anchor_only_subtracts_position() {
        let anchor = Pose::new(Vec3::new(1.0, 2.0, 3.0), glam::Quat::IDENTITY);
        let local = to_local(&anchor, Vec3::new(2.0, 2.0, 5.0));
        assert!(approx(local, Vec3::new(1.0, 0.0, 2.0)));
    }

    #[test]
    fn yawed_anchor_rotates_offset_into_local_frame() {
        // Anchor facing +X: a point one unit along +X is one unit "forward" (+Z) locally.
        let anchor = Pose::from_euler_degrees(Vec3::ZERO, Euler3::new(0.0, 90.0, 0.0));
        let local = to_local(&anchor, Vec3::X);
        assert!(approx(local, Vec3::Z));
        assert!(approx(to_world(&anchor, local), Vec3::X));
    }

    #[test]
    fn local_record_follows_moved_anchor() {
        let hosted = Pose::from_euler_degrees(Vec3::new(4.0, 0.0, -2.0), Euler3::new(0.0, 30.0, 0.0));
        let object = Vec3::new(5.0, 1.0, -1.0);
        let local = to_local(&hosted, object);

        // The same physical anchor resolves at a different world pose in a new session.
        let resolved = Pose::from_euler_degrees(Vec3::new(-10.0, 2.0, 7.0), Euler3::new(0.0, 120.0, 0.0));
        let replayed = to_world(&resolved, local);

        assert!(((replayed - resolved.position).length() - (object - hosted.position).length()).abs() < 1e-4);
        assert!(approx(to_local(&resolved, replayed), local));
    }

    #[test]
    fn world_offset_plus_anchor_is_world_position() {
        let anchor = Pose::from_euler_degrees(Vec3::new(1.0, 1.0, 1.0), Euler3::new(10.0, 20.0, 30.0));
        let local = Vec3::new(0.5, -0.25, 2.0);
        assert!(approx(anchor.position + world_offset(&anchor, local), to_world(&anchor, local)));
    }
}
