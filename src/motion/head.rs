//! Head/Neck Rotation Solver.
//!
//! Tracked avatars follow the webcam head pose: clamp per axis, smooth,
//! then split the offset between head and neck (optionally spine) on top
//! of the neutral pose captured at load. Coach avatars have no tracker and
//! get a slow synthetic sway instead. With no input everything relaxes back
//! to neutral, not to zero.

use crate::inputs::HeadRotation;
use crate::rig::{AvatarKind, EulerRotation, NeutralPose};
use crate::utils::{approach, finite_or, frame_factor, sanitize_dt};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl AxisRange {
    pub const fn symmetric(limit: f32) -> Self {
        Self {
            min: -limit,
            max: limit,
        }
    }

    /// NaN maps to 0 before clamping.
    pub fn clamp(&self, v: f32) -> f32 {
        finite_or(v, 0.0).clamp(self.min, self.max)
    }

    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }

    fn repaired(self, default: AxisRange) -> Self {
        if self.min.is_finite() && self.max.is_finite() && self.min <= 0.0 && self.max >= 0.0 {
            self
        } else {
            default
        }
    }

    fn scaled(&self, k: f32) -> Self {
        Self {
            min: self.min * k,
            max: self.max * k,
        }
    }
}

/// Slow sinusoidal sway for avatars without a tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleSway {
    /// Peak yaw in radians; pitch and roll use fractions of it.
    #[serde(default = "default_sway_amplitude")]
    pub amplitude: f32,
    #[serde(default = "default_sway_period")]
    pub period_secs: f32,
}

fn default_sway_amplitude() -> f32 {
    0.04
}
fn default_sway_period() -> f32 {
    6.0
}

impl Default for IdleSway {
    fn default() -> Self {
        Self {
            amplitude: default_sway_amplitude(),
            period_secs: default_sway_period(),
        }
    }
}

impl IdleSway {
    pub fn sample(&self, t: f32) -> HeadRotation {
        let w = TAU / self.period_secs.max(0.5);
        HeadRotation {
            pitch: 0.5 * self.amplitude * (w * 0.77 * t).sin(),
            yaw: self.amplitude * (w * t).sin(),
            roll: 0.3 * self.amplitude * (w * 1.3 * t + 1.0).sin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadSolverConfig {
    #[serde(default = "default_pitch")]
    pub pitch: AxisRange,
    #[serde(default = "default_yaw")]
    pub yaw: AxisRange,
    #[serde(default = "default_roll")]
    pub roll: AxisRange,
    /// Approach factor per 60 Hz frame while tracking.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Approach factor toward neutral when the tracker is silent.
    #[serde(default = "default_relax")]
    pub relax: f32,
    #[serde(default = "default_head_share")]
    pub head_share: f32,
    #[serde(default = "default_neck_share")]
    pub neck_share: f32,
    #[serde(default)]
    pub spine_share: f32,
    #[serde(default)]
    pub mirror_yaw: bool,
    #[serde(default)]
    pub invert_pitch: bool,
    #[serde(default)]
    pub mirror_roll: bool,
    #[serde(default)]
    pub sway: IdleSway,
}

fn default_pitch() -> AxisRange {
    AxisRange::symmetric(0.6)
}
fn default_yaw() -> AxisRange {
    AxisRange::symmetric(0.75)
}
fn default_roll() -> AxisRange {
    AxisRange::symmetric(0.35)
}
fn default_smoothing() -> f32 {
    0.3
}
fn default_relax() -> f32 {
    0.08
}
fn default_head_share() -> f32 {
    0.75
}
fn default_neck_share() -> f32 {
    0.25
}

impl Default for HeadSolverConfig {
    fn default() -> Self {
        Self {
            pitch: default_pitch(),
            yaw: default_yaw(),
            roll: default_roll(),
            smoothing: default_smoothing(),
            relax: default_relax(),
            head_share: default_head_share(),
            neck_share: default_neck_share(),
            spine_share: 0.0,
            mirror_yaw: false,
            invert_pitch: false,
            mirror_roll: false,
            sway: IdleSway::default(),
        }
    }
}

impl HeadSolverConfig {
    pub fn sanitized(mut self) -> Self {
        self.pitch = self.pitch.repaired(default_pitch());
        self.yaw = self.yaw.repaired(default_yaw());
        self.roll = self.roll.repaired(default_roll());
        self.smoothing = finite_or(self.smoothing, default_smoothing()).clamp(0.1, 0.8);
        self.relax = finite_or(self.relax, default_relax()).clamp(0.02, 0.5);
        self.head_share = finite_or(self.head_share, default_head_share()).clamp(0.7, 0.8);
        self.neck_share = finite_or(self.neck_share, default_neck_share()).clamp(0.2, 0.3);
        self.spine_share = finite_or(self.spine_share, 0.0).clamp(0.0, 0.3);
        self
    }

    fn clamp(&self, r: EulerRotation) -> EulerRotation {
        EulerRotation::new(self.pitch.clamp(r.x), self.yaw.clamp(r.y), self.roll.clamp(r.z))
    }

    /// Rotation offset limits for a bone taking `share` of the motion.
    pub fn bone_limits(&self, share: f32) -> [AxisRange; 3] {
        [
            self.pitch.scaled(share),
            self.yaw.scaled(share),
            self.roll.scaled(share),
        ]
    }
}

/// Absolute local rotations to write this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HeadPose {
    pub head: EulerRotation,
    pub neck: EulerRotation,
    pub spine: EulerRotation,
    /// The clamped, smoothed tracker-space rotation before distribution.
    pub offset: EulerRotation,
    /// Input had non-finite axes that were replaced.
    pub sanitized: bool,
}

pub struct HeadRotationSolver {
    config: HeadSolverConfig,
    kind: AvatarKind,
    neutral: NeutralPose,
    offset: EulerRotation,
    clock: f32,
}

impl HeadRotationSolver {
    pub fn new(config: HeadSolverConfig, kind: AvatarKind, neutral: NeutralPose) -> Self {
        Self {
            config: config.sanitized(),
            kind,
            neutral,
            offset: EulerRotation::IDENTITY,
            clock: 0.0,
        }
    }

    pub fn config(&self) -> &HeadSolverConfig {
        &self.config
    }

    pub fn neutral(&self) -> NeutralPose {
        self.neutral
    }

    /// Solve one frame. `input` is the tracker head pose if fresh; coach
    /// avatars ignore it and sway.
    pub fn solve(&mut self, input: Option<HeadRotation>, dt: f32) -> HeadPose {
        let dt = sanitize_dt(dt);
        self.clock += dt;

        let (target, factor, sanitized) = match self.kind {
            AvatarKind::Coach => {
                let s = self.config.sway.sample(self.clock);
                (self.to_euler(s), self.config.smoothing, false)
            }
            AvatarKind::Tracked => match input {
                Some(raw) => {
                    let (clean, fixed) = raw.sanitized();
                    (self.to_euler(clean), self.config.smoothing, fixed)
                }
                None => (EulerRotation::IDENTITY, self.config.relax, false),
            },
        };

        let target = self.config.clamp(target);
        let k = frame_factor(factor, dt);
        let o = self.offset;
        self.offset = self.config.clamp(EulerRotation::new(
            approach(o.x, target.x, k),
            approach(o.y, target.y, k),
            approach(o.z, target.z, k),
        ));

        HeadPose {
            head: self.distribute(self.config.head_share, self.neutral.head),
            neck: self.distribute(self.config.neck_share, self.neutral.neck),
            spine: self.distribute(self.config.spine_share, self.neutral.spine),
            offset: self.offset,
            sanitized,
        }
    }

    fn to_euler(&self, r: HeadRotation) -> EulerRotation {
        let sign = |flip: bool| if flip { -1.0 } else { 1.0 };
        EulerRotation::new(
            r.pitch * sign(self.config.invert_pitch),
            r.yaw * sign(self.config.mirror_yaw),
            r.roll * sign(self.config.mirror_roll),
        )
    }

    fn distribute(&self, share: f32, neutral: EulerRotation) -> EulerRotation {
        let [p, y, r] = self.config.bone_limits(share);
        let part = self.offset.scale(share);
        neutral.add(EulerRotation::new(p.clamp(part.x), y.clamp(part.y), r.clamp(part.z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn neutral() -> NeutralPose {
        NeutralPose {
            head: EulerRotation::new(0.05, 0.0, 0.0),
            neck: EulerRotation::new(-0.02, 0.01, 0.0),
            spine: EulerRotation::IDENTITY,
        }
    }

    fn tracked() -> HeadRotationSolver {
        HeadRotationSolver::new(HeadSolverConfig::default(), AvatarKind::Tracked, neutral())
    }

    #[test]
    fn extreme_input_is_clamped() {
        let mut s = tracked();
        let mut pose = HeadPose::default();
        for _ in 0..300 {
            pose = s.solve(Some(HeadRotation::new(5.0, -5.0, 5.0)), DT);
        }
        assert!((pose.offset.x - 0.6).abs() < 1e-4);
        assert!((pose.offset.y + 0.75).abs() < 1e-4);
        assert!((pose.offset.z - 0.35).abs() < 1e-4);
        let head = pose.head.sub(neutral().head);
        assert!(head.x <= 0.6 * 0.75 + 1e-5, "head pitch {}", head.x);
    }

    #[test]
    fn head_takes_most_of_the_rotation() {
        let mut s = tracked();
        let mut pose = HeadPose::default();
        for _ in 0..300 {
            pose = s.solve(Some(HeadRotation::new(0.0, 0.4, 0.0)), DT);
        }
        let head = pose.head.sub(neutral().head).y;
        let neck = pose.neck.sub(neutral().neck).y;
        assert!((head - 0.3).abs() < 1e-3, "head yaw {}", head);
        assert!((neck - 0.1).abs() < 1e-3, "neck yaw {}", neck);
        assert_eq!(pose.spine, EulerRotation::IDENTITY);
    }

    #[test]
    fn silence_relaxes_to_captured_neutral() {
        let mut s = tracked();
        for _ in 0..120 {
            s.solve(Some(HeadRotation::new(0.4, 0.6, -0.3)), DT);
        }
        let mut pose = HeadPose::default();
        for _ in 0..120 {
            pose = s.solve(None, DT);
        }
        assert!(pose.head.max_abs_diff(neutral().head) < 1e-3, "head {:?}", pose.head);
        assert!(pose.neck.max_abs_diff(neutral().neck) < 1e-3, "neck {:?}", pose.neck);
    }

    #[test]
    fn nan_axes_are_zeroed_and_flagged() {
        let mut s = tracked();
        let pose = s.solve(Some(HeadRotation::new(f32::NAN, 0.2, f32::INFINITY)), DT);
        assert!(pose.sanitized);
        assert!(pose.head.is_finite() && pose.neck.is_finite());
    }

    #[test]
    fn mirror_flips_yaw() {
        let config = HeadSolverConfig {
            mirror_yaw: true,
            ..HeadSolverConfig::default()
        };
        let mut s = HeadRotationSolver::new(config, AvatarKind::Tracked, NeutralPose::default());
        let pose = s.solve(Some(HeadRotation::new(0.0, 0.5, 0.0)), DT);
        assert!(pose.offset.y < 0.0);
    }

    #[test]
    fn coach_sways_without_input() {
        let mut s = HeadRotationSolver::new(
            HeadSolverConfig::default(),
            AvatarKind::Coach,
            NeutralPose::default(),
        );
        let mut max_yaw = 0.0f32;
        for _ in 0..(6 * 60) {
            let pose = s.solve(None, DT);
            max_yaw = max_yaw.max(pose.offset.y.abs());
            assert!(pose.offset.y.abs() <= 0.04 + 1e-6);
        }
        assert!(max_yaw > 0.02, "sway too small: {}", max_yaw);
    }

    #[test]
    fn spine_share_routes_some_rotation() {
        let config = HeadSolverConfig {
            spine_share: 0.15,
            ..HeadSolverConfig::default()
        };
        let mut s = HeadRotationSolver::new(config, AvatarKind::Tracked, NeutralPose::default());
        let mut pose = HeadPose::default();
        for _ in 0..200 {
            pose = s.solve(Some(HeadRotation::new(0.0, 0.4, 0.0)), DT);
        }
        assert!((pose.spine.y - 0.06).abs() < 1e-3, "spine yaw {}", pose.spine.y);
    }

    #[test]
    fn broken_ranges_are_repaired() {
        let c = HeadSolverConfig {
            pitch: AxisRange {
                min: 1.0,
                max: f32::NAN,
            },
            smoothing: 5.0,
            ..HeadSolverConfig::default()
        }
        .sanitized();
        assert_eq!(c.pitch, AxisRange::symmetric(0.6));
        assert_eq!(c.smoothing, 0.8);
    }
}
