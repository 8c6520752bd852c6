use std::f32::consts::PI;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Movement and look tunables read from the scene manifest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub start: Vec3,
    pub start_yaw: f32,
    pub speed: f32,
    /// Outer radius of the walkable platform around the origin.
    pub boundary_radius: f32,
    /// Inner radius; non-zero turns the walkable disk into an annulus.
    pub inner_radius: f32,
    pub pitch_limit: f32,
    pub look_sensitivity: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            start: Vec3::new(0.0, 2.0, 12.0),
            start_yaw: 0.0,
            speed: 5.0,
            boundary_radius: 28.0,
            inner_radius: 0.0,
            pitch_limit: PI / 2.2,
            look_sensitivity: 0.002,
        }
    }
}

/// Directional movement requested for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

/// First-person camera pose of the player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl PlayerPose {
    pub fn new(settings: &PlayerSettings) -> Self {
        let mut pose = Self {
            position: settings.start,
            yaw: settings.start_yaw,
            pitch: 0.0,
        };
        pose.clamp_to_bounds(settings);
        pose
    }

    /// Unit view direction. Yaw 0 looks down -Z.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    /// Horizontal walking direction.
    pub fn walk_forward(&self) -> Vec3 {
        Vec3::new(-self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    pub fn walk_right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    /// Applies a pointer delta in pixels. Pitch is clamped, yaw is left unbounded.
    pub fn look(&mut self, dx: f32, dy: f32, settings: &PlayerSettings) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let limit = settings.pitch_limit.abs().min(PI / 2.0 - 1e-3);
        self.yaw -= dx * settings.look_sensitivity;
        self.pitch = (self.pitch - dy * settings.look_sensitivity).clamp(-limit, limit);
    }

    /// Walks for `delta` seconds, then clamps to the platform.
    pub fn walk(&mut self, intent: MoveIntent, delta: f32, settings: &PlayerSettings) {
        let mut direction = Vec3::ZERO;
        if intent.forward {
            direction += self.walk_forward();
        }
        if intent.back {
            direction -= self.walk_forward();
        }
        if intent.right {
            direction += self.walk_right();
        }
        if intent.left {
            direction -= self.walk_right();
        }
        let step = direction.normalize_or_zero() * settings.speed * delta.max(0.0);
        if step.is_finite() {
            self.position += step;
        }
        self.clamp_to_bounds(settings);
    }

    /// Projects the horizontal position back onto the walkable disk or annulus.
    pub fn clamp_to_bounds(&mut self, settings: &PlayerSettings) {
        let outer = settings.boundary_radius.abs();
        let inner = settings.inner_radius.abs().min(outer);
        let horizontal = Vec3::new(self.position.x, 0.0, self.position.z);
        let distance = horizontal.length();
        let clamped = if distance > outer {
            horizontal * (outer / distance)
        } else if distance < inner {
            let direction = if distance > f32::EPSILON {
                horizontal / distance
            } else {
                Vec3::Z
            };
            direction * inner
        } else {
            return;
        };
        self.position.x = clamped.x;
        self.position.z = clamped.z;
    }

    pub fn horizontal_distance(&self) -> f32 {
        (self.position.x * self.position.x + self.position.z * self.position.z).sqrt()
    }
}
