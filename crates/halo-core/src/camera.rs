//! The viewing camera handed to the picker and the renderer.

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec3};

/// Keeps orbiting away from the poles, where the up vector degenerates.
const POLE_MARGIN: f32 = 0.01;
const MIN_DISTANCE: f32 = 0.1;

/// How view space is mapped to clip space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

/// A look-at camera.
///
/// The camera is owned by the caller; the pipeline only reads it, except for
/// the aspect ratio which follows the viewport on resize.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Width over height.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub projection_mode: ProjectionMode,
    /// Half height of the view volume in orthographic mode.
    pub ortho_scale: f32,
}

impl Camera {
    /// A 45° perspective camera three units in front of the origin.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: PI / 4.0,
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection_mode: ProjectionMode::Perspective,
            ortho_scale: 1.0,
        }
    }

    /// A perspective camera with a vertical field of view in degrees.
    #[must_use]
    pub fn perspective(fov_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        let near = near.max(0.001);
        Self {
            fov: fov_degrees.to_radians().clamp(0.1, PI - 0.1),
            near,
            far: far.max(near + 0.1),
            ..Self::new(aspect_ratio)
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection with wgpu's `[0, 1]` depth range.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let h = self.ortho_scale;
                let w = h * self.aspect_ratio;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        }
    }

    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Unit vector from the position towards the target.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Turns the camera around its target: `yaw` about the up axis, then
    /// `pitch` towards the up axis, both in radians. The distance to the
    /// target is preserved and the camera never passes over a pole.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let offset = self.position - self.target;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }
        let up = self.up.normalize();

        let elevation = offset.angle_between(up);
        let pitch = -pitch.clamp(elevation - (PI - POLE_MARGIN), elevation - POLE_MARGIN);
        let offset = Quat::from_axis_angle(up, -yaw) * offset;
        let side = up.cross(offset).normalize_or_zero();
        let offset = if side == Vec3::ZERO {
            offset
        } else {
            Quat::from_axis_angle(side, pitch) * offset
        };

        self.position = self.target + offset.normalize() * distance;
    }

    /// Moves towards the target by `delta` in perspective mode, or narrows
    /// the view volume in orthographic mode. Positive values zoom in.
    pub fn zoom(&mut self, delta: f32) {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                let distance = (self.position.distance(self.target) - delta).max(MIN_DISTANCE);
                self.position = self.target - self.forward() * distance;
            }
            ProjectionMode::Orthographic => {
                self.ortho_scale = (self.ortho_scale * (1.0 - delta * 0.4)).clamp(0.01, 1000.0);
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perspective_projection() {
        let camera = Camera::perspective(60.0, 2.0, 0.1, 1000.0);
        assert!((camera.fov.to_degrees() - 60.0).abs() < 1e-3);
        assert_eq!(camera.near, 0.1);
        // Perspective divides by view depth
        assert_eq!(camera.projection_matrix().w_axis.w, 0.0);
    }

    #[test]
    fn test_perspective_clamps_fov_and_planes() {
        let camera = Camera::perspective(0.0, 1.0, 0.0, 0.0);
        assert!(camera.fov >= 0.1);
        assert!(camera.near > 0.0);
        assert!(camera.far > camera.near);
    }

    #[test]
    fn test_orthographic_projection() {
        let mut camera = Camera::new(2.0);
        camera.projection_mode = ProjectionMode::Orthographic;
        camera.ortho_scale = 5.0;
        let proj = camera.projection_matrix();
        assert!((proj.w_axis.w - 1.0).abs() < 1e-6);
        // x spans twice the height at aspect 2
        assert!((proj.x_axis.x - 1.0 / 10.0).abs() < 1e-6);
        assert!((proj.y_axis.y - 1.0 / 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::new(1.0).with_position(Vec3::new(0.0, 0.0, 5.0));
        camera.orbit(0.3, 0.2);
        assert!((camera.position.distance(camera.target) - 5.0).abs() < 1e-4);
        assert!(camera.position.x < 0.0);
        assert!(camera.position.y > 0.0);
    }

    #[test]
    fn test_orbit_stops_short_of_pole() {
        let mut camera = Camera::new(1.0).with_position(Vec3::new(0.0, 0.0, 5.0));
        camera.orbit(0.0, 10.0);
        let offset = camera.position - camera.target;
        assert!(offset.y > 4.9);
        // Still off the up axis, about 5 * sin(POLE_MARGIN) away
        assert!(offset.x.hypot(offset.z) > 0.02);
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn test_zoom_perspective() {
        let mut camera = Camera::new(1.0).with_position(Vec3::new(0.0, 0.0, 5.0));
        camera.zoom(1.0);
        assert!((camera.position.z - 4.0).abs() < 1e-5);
        camera.zoom(100.0);
        assert!((camera.position.distance(camera.target) - MIN_DISTANCE).abs() < 1e-5);
    }

    #[test]
    fn test_zoom_orthographic() {
        let mut camera = Camera::new(1.0);
        camera.projection_mode = ProjectionMode::Orthographic;
        camera.zoom(1.0);
        assert!(camera.ortho_scale < 1.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 3.0));
    }
}
