//! # Camera
//!
//! Mouse-look state for the sky. The camera has no position, only two rotation angles
//! that accumulate cursor movement without clamping or wrapping.

use nalgebra_glm::Mat4;

use crate::transform::{rotation, Axis};

/// Radians of rotation per pixel of cursor travel.
pub const DEFAULT_MOUSE_SENSITIVITY: f32 = 2e-3;

#[derive(Debug, Clone)]
pub struct CameraState {
    /// Yaw-like angle, rotates about Y.
    pub r: f32,
    /// Pitch-like angle, rotates about X.
    pub r2: f32,
    sensitivity: f32,
    last_cursor: Option<(f64, f64)>,
}

impl CameraState {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            r: 0.0,
            r2: 0.0,
            sensitivity,
            last_cursor: None,
        }
    }

    /// Feeds an absolute cursor position. The delta from the previous position is applied
    /// to the angles; the very first position only seeds the sample.
    pub fn observe_cursor(&mut self, x: f64, y: f64) {
        if let Some((px, py)) = self.last_cursor {
            self.apply_delta((x - px) as f32, (y - py) as f32);
        }
        self.last_cursor = Some((x, y));
    }

    /// Feeds relative mouse motion from a captured pointer. Any absolute sample seen
    /// before is forgotten, so switching back to absolute positions seeds again.
    pub fn observe_motion(&mut self, dx: f64, dy: f64) {
        self.last_cursor = None;
        self.apply_delta(dx as f32, dy as f32);
    }

    /// Applies a raw cursor delta.
    pub fn apply_delta(&mut self, dx: f32, dy: f32) {
        self.r -= -dx * self.sensitivity;
        self.r2 -= dy * self.sensitivity;
    }

    /// `RX`, the rotation about X driven by `r2`.
    pub fn rotation_x(&self) -> Mat4 {
        rotation(Axis::X, self.r2)
    }

    /// `RY`, the rotation about Y driven by `r`.
    pub fn rotation_y(&self) -> Mat4 {
        rotation(Axis::Y, self.r)
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(DEFAULT_MOUSE_SENSITIVITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_motion_only_turns_yaw() {
        let mut camera = CameraState::default();
        camera.observe_cursor(400.0, 300.0);
        camera.observe_cursor(500.0, 300.0);
        assert!((camera.r - 0.2).abs() < 1e-6);
        assert_eq!(camera.r2, 0.0);
    }

    #[test]
    fn vertical_motion_lowers_pitch() {
        let mut camera = CameraState::default();
        camera.apply_delta(0.0, 50.0);
        assert_eq!(camera.r, 0.0);
        assert!((camera.r2 + 0.1).abs() < 1e-6);
    }

    #[test]
    fn first_sample_seeds_without_moving() {
        let mut camera = CameraState::default();
        camera.observe_cursor(1234.0, 987.0);
        assert_eq!((camera.r, camera.r2), (0.0, 0.0));
    }

    #[test]
    fn captured_motion_is_not_limited_by_window_width() {
        let mut camera = CameraState::default();
        camera.observe_cursor(0.0, 360.0);
        camera.observe_cursor(1279.0, 360.0);
        let one_sweep = camera.r;

        for _ in 0..3 {
            camera.observe_motion(1279.0, 0.0);
        }
        assert!((camera.r - 4.0 * one_sweep).abs() < 1e-4);
        assert!(camera.r > std::f32::consts::TAU);
    }

    #[test]
    fn absolute_samples_seed_again_after_motion() {
        let mut camera = CameraState::default();
        camera.observe_cursor(100.0, 100.0);
        camera.observe_motion(0.0, 10.0);
        let pitch = camera.r2;

        camera.observe_cursor(900.0, 900.0);
        assert_eq!(camera.r2, pitch);
        assert_eq!(camera.r, 0.0);
    }

    #[test]
    fn angles_are_unbounded() {
        let mut camera = CameraState::default();
        for _ in 0..100 {
            camera.apply_delta(1000.0, -1000.0);
        }
        assert!(camera.r > std::f32::consts::TAU * 10.0);
        assert!(camera.r2 > std::f32::consts::TAU * 10.0);
    }
}
