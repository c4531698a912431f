//! Posture Responder: coarse posture metrics onto the root transform.

use crate::inputs::{Lean, PostureSnapshot};
use crate::rig::EulerRotation;
use crate::utils::{approach, finite_or, frame_factor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Root pitch (radians) at full confidence and full alignment.
    #[serde(default = "default_tilt_gain")]
    pub tilt_gain: f32,
    /// Root roll (radians) for a confident lean.
    #[serde(default = "default_lean_angle")]
    pub lean_angle: f32,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_enabled() -> bool {
    true
}
fn default_tilt_gain() -> f32 {
    0.06
}
fn default_lean_angle() -> f32 {
    0.08
}
fn default_smoothing() -> f32 {
    0.1
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tilt_gain: default_tilt_gain(),
            lean_angle: default_lean_angle(),
            smoothing: default_smoothing(),
        }
    }
}

impl PostureConfig {
    pub fn sanitized(mut self) -> Self {
        self.tilt_gain = finite_or(self.tilt_gain, default_tilt_gain()).clamp(0.0, 0.2);
        self.lean_angle = finite_or(self.lean_angle, default_lean_angle()).clamp(0.0, 0.2);
        self.smoothing = finite_or(self.smoothing, default_smoothing()).clamp(0.02, 0.8);
        self
    }
}

pub const SCALE_MIN: f32 = 0.95;
pub const SCALE_MAX: f32 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootTransform {
    pub rotation: EulerRotation,
    pub scale: f32,
}

impl RootTransform {
    pub const IDENTITY: Self = Self {
        rotation: EulerRotation::IDENTITY,
        scale: 1.0,
    };
}

impl Default for RootTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 0–100 metric to [0,1]; NaN counts as 0.
fn unit(v: f32) -> f32 {
    (finite_or(v, 0.0) / 100.0).clamp(0.0, 1.0)
}

/// Target root transform for one posture snapshot.
pub fn posture_target(p: &PostureSnapshot, config: &PostureConfig) -> RootTransform {
    let confidence = unit(p.confidence_score);
    let alignment = unit(p.shoulder_alignment);
    let lean = match p.leaning {
        Lean::Left => config.lean_angle * confidence,
        Lean::Right => -config.lean_angle * confidence,
        Lean::None => 0.0,
    };
    RootTransform {
        rotation: EulerRotation::new(config.tilt_gain * confidence * alignment, 0.0, lean),
        scale: SCALE_MIN + (SCALE_MAX - SCALE_MIN) * unit(p.openness),
    }
}

pub struct PostureResponder {
    config: PostureConfig,
    current: RootTransform,
}

impl PostureResponder {
    pub fn new(config: PostureConfig) -> Self {
        Self {
            config: config.sanitized(),
            current: RootTransform::IDENTITY,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Move toward the snapshot's target, or back to identity without one.
    pub fn update(&mut self, posture: Option<&PostureSnapshot>, dt: f32) -> RootTransform {
        let target = match posture.filter(|_| self.config.enabled) {
            Some(p) => posture_target(p, &self.config),
            None => RootTransform::IDENTITY,
        };
        let k = frame_factor(self.config.smoothing, dt);
        let c = self.current;
        let next = RootTransform {
            rotation: EulerRotation::new(
                approach(c.rotation.x, target.rotation.x, k),
                approach(c.rotation.y, target.rotation.y, k),
                approach(c.rotation.z, target.rotation.z, k),
            ),
            scale: approach(c.scale, target.scale, k).clamp(SCALE_MIN, SCALE_MAX),
        };
        self.current = next;
        next
    }

    pub fn current(&self) -> RootTransform {
        self.current
    }
}
