use glam::{Mat4, Quat, Vec3};
use std::f32::consts::PI;

use crate::config::CameraConfig;

/// Polar angle margin that keeps the camera off the poles.
const POLE_EPSILON: f32 = 1e-3;

/// Damped orbit camera around a target point.
///
/// Drag and scroll input accumulate pending deltas; `update` moves the camera
/// by the damped fraction of them once per frame. The camera position may be
/// nudged directly between updates and is re-read on the next one.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Fraction of the pending rotation applied per update
    pub damping: f32,
    /// Radians per dragged pixel
    pub rotate_speed: f32,
    /// Zoom exponent per scrolled point
    pub zoom_speed: f32,
    /// Roll about the view axis, in radians
    pub roll: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

impl OrbitCamera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            position: Vec3::from(config.position),
            target: Vec3::from(config.target),
            fov: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            damping: config.damping,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            roll: 0.0,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
        }
    }

    /// Queue an orbit by a drag of `dx`, `dy` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_theta -= dx * self.rotate_speed;
        self.pending_phi -= dy * self.rotate_speed;
    }

    /// Queue a dolly; positive scroll moves closer.
    pub fn zoom(&mut self, scroll: f32) {
        self.pending_scale *= (-scroll * self.zoom_speed).exp();
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Apply one damped step of the pending input.
    pub fn update(&mut self) {
        let offset = self.position - self.target;
        let mut radius = offset.length();
        if radius <= f32::EPSILON {
            radius = self.min_distance;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.pending_theta * self.damping;
        phi += self.pending_phi * self.damping;
        phi = phi.clamp(POLE_EPSILON, PI - POLE_EPSILON);

        radius = (radius * self.pending_scale).clamp(self.min_distance, self.max_distance);

        let sin_phi = phi.sin();
        self.position = self.target
            + Vec3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );

        self.pending_theta *= 1.0 - self.damping;
        self.pending_phi *= 1.0 - self.damping;
        self.pending_scale = 1.0;
    }

    /// Whether queued rotation is still being applied.
    pub fn is_settling(&self) -> bool {
        self.pending_theta.abs() > 1e-5 || self.pending_phi.abs() > 1e-5
    }

    pub fn view_matrix(&self) -> Mat4 {
        let look = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
        if self.roll == 0.0 {
            return look;
        }
        Mat4::from_quat(Quat::from_rotation_z(-self.roll)) * look
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect.max(1e-4), self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let cam = OrbitCamera::default();
        assert_eq!(cam.position, Vec3::new(0.8, 0.6, 1.6));
        assert_eq!(cam.target, Vec3::new(0.0, 0.35, 0.0));
        assert!((cam.fov - 45.0_f32.to_radians()).abs() < 1e-6);
        let vp = cam.view_projection(16.0 / 9.0);
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn test_update_without_input_keeps_position() {
        let mut cam = OrbitCamera::default();
        let start = cam.position;
        cam.update();
        assert!((cam.position - start).length() < 1e-5);
    }

    #[test]
    fn test_zoom_respects_distance_limits() {
        let mut cam = OrbitCamera::default();
        cam.zoom(5_000.0);
        cam.update();
        assert!((cam.distance() - 0.6).abs() < 1e-4);

        cam.zoom(-5_000.0);
        cam.update();
        assert!((cam.distance() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_damping_converges() {
        let mut cam = OrbitCamera::default();
        let distance = cam.distance();
        cam.rotate(200.0, 0.0);
        assert!(cam.is_settling());

        let mut previous = cam.position;
        let first = {
            cam.update();
            (cam.position - previous).length()
        };
        for _ in 0..400 {
            previous = cam.position;
            cam.update();
        }
        let last = (cam.position - previous).length();

        assert!(first > 0.0);
        assert!(last < first * 0.01);
        assert!(!cam.is_settling());
        assert!((cam.distance() - distance).abs() < 1e-3);
    }

    #[test]
    fn test_polar_angle_stays_off_poles() {
        let mut cam = OrbitCamera::default();
        cam.rotate(0.0, 100_000.0);
        for _ in 0..50 {
            cam.update();
        }
        let offset = cam.position - cam.target;
        assert!(offset.x.is_finite() && offset.y.is_finite() && offset.z.is_finite());
        assert!(offset.y / offset.length() > -1.0);
    }

    #[test]
    fn test_roll_changes_view() {
        let mut cam = OrbitCamera::default();
        let flat = cam.view_matrix();
        cam.roll = 0.004;
        assert_ne!(cam.view_matrix(), flat);
        cam.roll = 0.0;
        assert_eq!(cam.view_matrix(), flat);
    }
}
