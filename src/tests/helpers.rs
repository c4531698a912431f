use crate::inputs::{EmotionFrame, EmotionScore, HeadRotation, TrackingFrame};
use crate::orchestrator::{FrameOrchestrator, FrameReport};
use crate::rig::{AvatarProfile, EulerRotation, Gender, MemoryRig};
use std::collections::HashMap;

pub const DT: f32 = 1.0 / 60.0;

pub const HEAD: &str = "mixamorig:Head";
pub const NECK: &str = "mixamorig:Neck";

// ── Avatar setup ─────────────────────────────────────────────

pub fn tracked_avatar(seed: u64) -> FrameOrchestrator<MemoryRig> {
    FrameOrchestrator::new_seeded(
        MemoryRig::standard_avatar(),
        AvatarProfile::tracked(Gender::Male),
        seed,
    )
    .expect("standard avatar has clips")
}

pub fn avatar_with(profile: AvatarProfile, seed: u64) -> FrameOrchestrator<MemoryRig> {
    FrameOrchestrator::new_seeded(MemoryRig::standard_avatar(), profile, seed)
        .expect("standard avatar has clips")
}

/// Rest rotations of [`MemoryRig::standard_avatar`].
pub fn neutral_head() -> EulerRotation {
    EulerRotation::new(-0.05, 0.01, 0.0)
}

pub fn neutral_neck() -> EulerRotation {
    EulerRotation::new(0.08, 0.0, 0.0)
}

/// Advance `n` frames, returning the last report.
pub fn run(o: &mut FrameOrchestrator<MemoryRig>, n: usize) -> FrameReport {
    let mut last = FrameReport::default();
    for _ in 0..n {
        last = o.advance(DT);
    }
    last
}

// ── Input builders ───────────────────────────────────────────

pub fn emotions(pairs: &[(&str, f32)]) -> EmotionFrame {
    EmotionFrame::from_scores(pairs.iter().map(|(n, s)| EmotionScore::new(n, *s)))
}

pub fn tracking(pairs: &[(&str, f32)], head: Option<(f32, f32, f32)>) -> TrackingFrame {
    let expressions: HashMap<String, f32> =
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    TrackingFrame::new(
        expressions,
        head.map(|(p, y, r)| HeadRotation::new(p, y, r)),
    )
}

/// The `[200, 180, 190, ...]` speech-like magnitude buffer.
pub fn speech_buffer(len: usize) -> Vec<u8> {
    let pattern = [200u8, 180, 190];
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

pub fn all_in_unit_range(o: &FrameOrchestrator<MemoryRig>) -> bool {
    o.rig()
        .influences()
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
}
