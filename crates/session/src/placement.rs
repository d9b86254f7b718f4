//! Where the anchor cube goes and which walls get sampled.

use glam::{Quat, Vec3};
use kitting_anchors::{PlaneAlignment, PlaneHit, QualityMarker};
use kitting_core::{Euler3, MarkerId};
use kitting_transform::{wrap_degrees, Pose};

/// Whether anchors may be placed on a plane with `alignment`.
pub fn is_placeable(alignment: PlaneAlignment) -> bool {
    matches!(alignment, PlaneAlignment::HorizontalUp | PlaneAlignment::Vertical)
}

/// Yaw of a cube on a vertical plane: the plane yaw turned 90° towards the camera.
pub fn closest_to_camera(placement_yaw: f32, camera_yaw: f32) -> f32 {
    let plus = placement_yaw + 90.0;
    let minus = placement_yaw - 90.0;
    if angular_distance(plus, camera_yaw) < angular_distance(minus, camera_yaw) {
        plus
    } else {
        minus
    }
}

fn angular_distance(a: f32, b: f32) -> f32 {
    let d = wrap_degrees(a - b);
    d.min(360.0 - d)
}

/// Pose of the marker cube for a plane hit seen from a camera with `camera_yaw`.
///
/// Returns `None` for planes anchors cannot be placed on.
pub fn marker_cube_pose(hit: &PlaneHit, camera_yaw: f32) -> Option<Pose> {
    let euler = hit.pose.euler_degrees();
    let cube = match hit.alignment {
        PlaneAlignment::HorizontalUp => Euler3::new(0.0, euler.y, euler.z),
        PlaneAlignment::Vertical => Euler3::new(0.0, closest_to_camera(euler.y, camera_yaw), 0.0),
        _ => return None,
    };
    Some(Pose::from_euler_degrees(hit.pose.position, cube))
}

/// The four side walls of a cube of half size `half_extent` resting on `cube`.
///
/// Wall `k` faces a camera looking along the cube yaw plus `k * 90°`.
pub fn cube_markers(cube: &Pose, half_extent: f32) -> Vec<QualityMarker> {
    let yaw = cube.euler_degrees().y;
    let center = cube.position + Vec3::Y * half_extent;
    (0..4u32)
        .map(|k| {
            let wall_yaw = wrap_degrees(yaw + 90.0 * k as f32);
            let facing = Quat::from_rotation_y(wall_yaw.to_radians()) * Vec3::Z;
            QualityMarker {
                id: MarkerId(k),
                position: center - facing * half_extent,
                yaw_degrees: wall_yaw,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitting_core::PlaneId;

    fn hit(alignment: PlaneAlignment, euler: Euler3) -> PlaneHit {
        PlaneHit {
            plane: PlaneId(1),
            pose: Pose::from_euler_degrees(Vec3::new(0.0, 0.0, 2.0), euler),
            alignment,
        }
    }

    #[test]
    fn closest_to_camera_picks_nearer_side() {
        assert_eq!(closest_to_camera(0.0, 80.0), 90.0);
        assert_eq!(closest_to_camera(0.0, 280.0), -90.0);
        assert_eq!(closest_to_camera(350.0, 70.0), 440.0);
        assert_eq!(closest_to_camera(10.0, 270.0), -80.0);
    }

    #[test]
    fn only_upward_and_vertical_planes_place() {
        assert!(is_placeable(PlaneAlignment::HorizontalUp));
        assert!(is_placeable(PlaneAlignment::Vertical));
        assert!(!is_placeable(PlaneAlignment::HorizontalDown));
        assert!(marker_cube_pose(&hit(PlaneAlignment::NotAxisAligned, Euler3::ZERO), 0.0).is_none());
    }

    #[test]
    fn horizontal_plane_drops_pitch() {
        let pose = marker_cube_pose(&hit(PlaneAlignment::HorizontalUp, Euler3::new(20.0, 45.0, 0.0)), 0.0)
            .expect("placeable");
        let euler = pose.euler_degrees();
        assert!(euler.x.abs() < 1e-3 || (euler.x - 360.0).abs() < 1e-3);
        assert!((euler.y - 45.0).abs() < 1e-3);
    }

    #[test]
    fn walls_surround_the_cube() {
        let markers = cube_markers(&Pose::IDENTITY, 0.1);
        assert_eq!(markers.len(), 4);
        // Wall 0 is seen by a camera looking down +Z, so it sits on the -Z side.
        assert!((markers[0].position - Vec3::new(0.0, 0.1, -0.1)).length() < 1e-5);
        assert!((markers[1].yaw_degrees - 90.0).abs() < 1e-4);
        assert!((markers[1].position - Vec3::new(-0.1, 0.1, 0.0)).length() < 1e-5);
    }
}
