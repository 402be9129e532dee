//! Damped orbit camera around the avatar.
//!
//! Interactive input sets desired orbit angles; each render tick advances the
//! actual angles toward them with exponential damping, the same feel as the
//! damped orbit controls in typical viewers.

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

pub struct OrbitCamera {
    target: Vec3,
    // actual spherical coordinates around the target
    yaw: f32,
    pitch: f32,
    distance: f32,
    // where the damping is heading
    desired_yaw: f32,
    desired_pitch: f32,
    desired_distance: f32,
    damping: f32,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl OrbitCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let target = Vec3::from_array(config.target);
        let offset = Vec3::from_array(config.position) - target;
        let distance = offset.length().max(1e-3);
        let pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();
        let yaw = offset.x.atan2(offset.z);

        Self {
            target,
            yaw,
            pitch,
            distance,
            desired_yaw: yaw,
            desired_pitch: pitch,
            desired_distance: distance,
            damping: config.damping,
            fov_y: config.fov_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Request an orbit by the given angle deltas (radians).
    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        self.desired_yaw += d_yaw;
        // keep the camera from flipping over the poles
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.desired_pitch = (self.desired_pitch + d_pitch).clamp(-limit, limit);
    }

    /// Request a dolly toward/away from the target.
    pub fn zoom(&mut self, factor: f32) {
        self.desired_distance = (self.desired_distance * factor).clamp(0.5, 20.0);
    }

    /// Advance damping by `dt` seconds. Idempotent once settled.
    pub fn update(&mut self, dt: f32) {
        let t = 1.0 - (-self.damping * dt).exp();
        self.yaw += (self.desired_yaw - self.yaw) * t;
        self.pitch += (self.desired_pitch - self.pitch) * t;
        self.distance += (self.desired_distance - self.distance) * t;
    }

    /// Update the projection aspect ratio on viewport resize.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_y, cos_y) = self.yaw.sin_cos();
        let (sin_p, cos_p) = self.pitch.sin_cos();
        self.target + self.distance * Vec3::new(cos_p * sin_y, sin_p, cos_p * cos_y)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::from_config(&CameraConfig::default(), 800.0 / 600.0)
    }

    #[test]
    fn test_initial_eye_matches_config_position() {
        let cam = camera();
        let eye = cam.eye();
        assert!((eye - Vec3::new(0.0, 1.4, 3.0)).length() < 1e-4);
    }

    #[test]
    fn test_resize_sets_exact_aspect() {
        let mut cam = camera();
        cam.set_aspect(400.0 / 300.0);
        assert_eq!(cam.aspect(), 400.0 / 300.0);

        // degenerate aspects are ignored
        cam.set_aspect(0.0);
        cam.set_aspect(f32::NAN);
        assert_eq!(cam.aspect(), 400.0 / 300.0);
    }

    #[test]
    fn test_damping_converges_to_desired_orbit() {
        let mut cam = camera();
        cam.orbit(1.0, 0.3);
        for _ in 0..600 {
            cam.update(1.0 / 60.0);
        }
        // settled within a small tolerance after 10 simulated seconds
        let eye = cam.eye();
        cam.update(1.0 / 60.0);
        assert!((cam.eye() - eye).length() < 1e-4);
    }

    #[test]
    fn test_zoom_dollies_toward_target_with_clamp() {
        let mut cam = camera();
        let target = Vec3::new(0.0, 1.4, 0.0);
        let start = (cam.eye() - target).length();

        cam.zoom(0.5);
        for _ in 0..600 {
            cam.update(1.0 / 60.0);
        }
        let dist = (cam.eye() - target).length();
        assert!((dist - start * 0.5).abs() < 1e-3);

        // repeated dolly-in bottoms out at the minimum distance
        for _ in 0..20 {
            cam.zoom(0.1);
        }
        for _ in 0..600 {
            cam.update(1.0 / 60.0);
        }
        assert!(((cam.eye() - target).length() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_update_is_stable_at_rest() {
        let mut cam = camera();
        let before = cam.eye();
        for _ in 0..120 {
            cam.update(1.0 / 60.0);
        }
        assert!((cam.eye() - before).length() < 1e-5);
    }

    #[test]
    fn test_pitch_clamped_below_pole() {
        let mut cam = camera();
        cam.orbit(0.0, 10.0);
        for _ in 0..600 {
            cam.update(1.0 / 60.0);
        }
        // pitch stays below the pole, so the view matrix never degenerates
        let up_component = (cam.eye().y - 1.4) / 3.0;
        assert!(up_component < 1.0);
        assert!(cam.view_projection().is_finite());
    }
}
