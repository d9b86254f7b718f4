#![warn(missing_docs)]
//! Device camera model used for viewpoint checks.
//!
//! Conventions follow the AR session: left-handed, +Y up, the camera looks
//! along its local +Z axis. Viewport coordinates run from (0, 0) at the
//! bottom-left to (1, 1) at the top-right.

use glam::{Mat4, Quat, Vec3};
use kitting_transform::Pose;

/// Tracked device camera with position, orientation and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArCamera {
    /// Camera pose in world space.
    pub pose: Pose,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect: f32,
    /// Near clipping plane distance.
    pub near: f32,
    /// Far clipping plane distance.
    pub far: f32,
}

impl Default for ArCamera {
    fn default() -> Self {
        Self {
            pose: Pose::IDENTITY,
            fov: std::f32::consts::FRAC_PI_3, // 60 degrees
            // Handheld portrait screen.
            aspect: 9.0 / 16.0,
            near: 0.05,
            far: 100.0,
        }
    }
}

impl ArCamera {
    /// Camera at `position` with the given orientation and default optics.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            pose: Pose::new(position, rotation),
            ..Default::default()
        }
    }

    /// Camera at `eye` looking at `target`, keeping world up.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let dir = (target - eye).normalize_or_zero();
        let rotation = if dir == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            let yaw = dir.x.atan2(dir.z);
            let pitch = -dir.y.clamp(-1.0, 1.0).asin();
            Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch)
        };
        Self::new(eye, rotation)
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Viewing direction.
    pub fn forward(&self) -> Vec3 {
        self.pose.forward()
    }

    /// Camera's local +Y axis in world space.
    pub fn up(&self) -> Vec3 {
        self.pose.up()
    }

    /// World space -> camera space.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.pose.rotation, self.pose.position).inverse()
    }

    /// Camera space -> clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov, self.aspect, self.near, self.far)
    }

    /// Combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project `point` into viewport space.
    ///
    /// `x` and `y` are normalized screen coordinates; `z` is the depth in front
    /// of the camera (negative when the point is behind it).
    pub fn world_to_viewport(&self, point: Vec3) -> Vec3 {
        let depth = self.view_matrix().transform_point3(point).z;
        let clip = self.view_projection_matrix() * point.extend(1.0);
        if clip.w.abs() <= f32::EPSILON {
            return Vec3::new(0.5, 0.5, depth);
        }
        let ndc = clip.truncate() / clip.w;
        Vec3::new((ndc.x + 1.0) * 0.5, (ndc.y + 1.0) * 0.5, depth)
    }

    /// Whether `point` lies strictly inside the viewport and in front of the camera.
    pub fn is_in_view(&self, point: Vec3) -> bool {
        let v = self.world_to_viewport(point);
        v.z > 0.0 && v.x > 0.0 && v.x < 1.0 && v.y > 0.0 && v.y < 1.0
    }

    /// Update the aspect ratio (call when the screen rotates).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_along_z() {
        let camera = ArCamera::default();
        assert!((camera.forward() - Vec3::Z).length() < 1e-5);
        assert!((camera.up() - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn point_ahead_projects_to_center() {
        let camera = ArCamera::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        let v = camera.world_to_viewport(Vec3::new(1.0, 2.0, 5.0));
        assert!((v.x - 0.5).abs() < 1e-4);
        assert!((v.y - 0.5).abs() < 1e-4);
        assert!((v.z - 2.0).abs() < 1e-4);
        assert!(camera.is_in_view(Vec3::new(1.0, 2.0, 5.0)));
    }

    #[test]
    fn viewport_axes_point_right_and_up() {
        let camera = ArCamera::default();
        let right = camera.world_to_viewport(Vec3::new(0.1, 0.0, 2.0));
        let above = camera.world_to_viewport(Vec3::new(0.0, 0.1, 2.0));
        assert!(right.x > 0.5);
        assert!(above.y > 0.5);
    }

    #[test]
    fn point_behind_is_not_in_view() {
        let camera = ArCamera::default();
        let v = camera.world_to_viewport(Vec3::new(0.0, 0.0, -2.0));
        assert!(v.z < 0.0);
        assert!(!camera.is_in_view(Vec3::new(0.0, 0.0, -2.0)));
    }

    #[test]
    fn point_far_to_the_side_is_not_in_view() {
        let camera = ArCamera::default();
        assert!(!camera.is_in_view(Vec3::new(10.0, 0.0, 1.0)));
    }

    #[test]
    fn looking_at_centers_target() {
        let target = Vec3::new(3.0, -1.0, 4.0);
        let camera = ArCamera::looking_at(Vec3::new(0.0, 1.0, 0.0), target);
        let v = camera.world_to_viewport(target);
        assert!((v.x - 0.5).abs() < 1e-3);
        assert!((v.y - 0.5).abs() < 1e-3);
        assert!(camera.is_in_view(target));
    }

    #[test]
    fn camera_matrices_are_finite() {
        let camera = ArCamera::looking_at(Vec3::new(2.0, 1.5, -3.0), Vec3::ZERO);
        for m in [camera.view_matrix(), camera.projection_matrix(), camera.view_projection_matrix()] {
            assert!(m.to_cols_array().iter().all(|x| x.is_finite()));
            assert!(!m.to_cols_array().iter().all(|&x| x == 0.0));
        }
    }
}
