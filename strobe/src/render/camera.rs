//! Orbit camera over the timeline volume
//!
//! World space is the unit cube: x is time (1 = live edge, 0 = one visible
//! window earlier), y is call depth and z is the thread lane. Calls arrive
//! in seconds relative to the live edge, so the time window is folded into
//! the view-projection as a scale and shift on x.

use glam::{Mat4, Quat, Vec3};
use std::time::Duration;

const MIN_WINDOW_SECS: f32 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    target: Vec3,
    /// Eye position relative to `target`
    eye_offset: Vec3,
    fov_y: f32,
    window_secs: f32,
    max_window_secs: f32,
}

impl Camera {
    /// Camera showing the whole `max_window` of history
    #[must_use]
    pub fn new(max_window: Duration) -> Self {
        let max_window_secs = max_window.as_secs_f32().max(MIN_WINDOW_SECS);
        Self {
            target: Vec3::splat(0.5),
            eye_offset: Vec3::new(-1.5, 0.5, 1.5),
            fov_y: std::f32::consts::FRAC_PI_4,
            window_secs: max_window_secs,
            max_window_secs,
        }
    }

    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.target + self.eye_offset
    }

    /// Seconds of history across the x axis
    #[must_use]
    pub fn window_secs(&self) -> f32 {
        self.window_secs
    }

    /// Rotate the eye around the vertical axis through the target
    pub fn orbit(&mut self, radians: f32) {
        self.eye_offset = Quat::from_rotation_y(radians) * self.eye_offset;
    }

    /// Scale the visible time window; `factor < 1` zooms in
    pub fn zoom_time(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.window_secs = (self.window_secs * factor).clamp(MIN_WINDOW_SECS, self.max_window_secs);
        }
    }

    /// Map seconds-relative-to-live-edge onto world x
    #[must_use]
    pub fn time_fit(&self) -> Mat4 {
        Mat4::from_translation(Vec3::X) * Mat4::from_scale(Vec3::new(1.0 / self.window_secs, 1.0, 1.0))
    }

    #[must_use]
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye(), self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), 0.1, 100.0);
        proj * view * self.time_fit()
    }
}
