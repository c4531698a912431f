//! Channel Blender — reconciles lip sync, emotion and tracking into one
//! value per morph channel.
//!
//! Per frame, in order:
//! 1. lip sync writes its channels directly and reserves them
//! 2. emotion scores (or, failing that, tracked expressions) produce targets,
//!    overlapping contributions combined by max
//! 3. targeted channels approach their target
//! 4. untouched channels relax toward zero
//!
//! Eyelids are never in this bank; the blink synthesizer owns them.

use super::channels::{clamp_unit, ChannelBank};
use crate::audio::{AudioEnergyConfig, AudioEnergyExtractor, LipSyncTargets, LIP_SYNC_CHANNELS};
use crate::inputs::{EmotionFrame, TrackingFrame};
use crate::mapping::{ChannelTables, ResolvedTable};
use crate::utils::{approach, frame_decay, frame_factor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Distinct unmapped keys remembered for reporting; later ones go uncounted.
const MAX_UNKNOWN_KEYS: usize = 256;

/// How emotion and tracking share the face when both are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceArbitration {
    /// Tracking is consulted only when no emotion frame is present.
    #[default]
    EmotionFirst,
    /// Both contribute; overlapping channels take the max.
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlenderTuning {
    /// Reported for completeness; lip sync is smoothed by the extractor's attack.
    #[serde(default = "default_lip_sync_factor")]
    pub lip_sync_factor: f32,
    #[serde(default = "default_emotion_factor")]
    pub emotion_factor: f32,
    #[serde(default = "default_tracked_factor")]
    pub tracked_factor: f32,
    /// Multiplier per 60 Hz frame for channels nobody wrote.
    #[serde(default = "default_idle_decay")]
    pub idle_decay: f32,
    #[serde(default)]
    pub arbitration: SourceArbitration,
}

fn default_lip_sync_factor() -> f32 {
    0.7
}
fn default_emotion_factor() -> f32 {
    0.3
}
fn default_tracked_factor() -> f32 {
    0.5
}
fn default_idle_decay() -> f32 {
    0.97
}

impl Default for BlenderTuning {
    fn default() -> Self {
        Self {
            lip_sync_factor: default_lip_sync_factor(),
            emotion_factor: default_emotion_factor(),
            tracked_factor: default_tracked_factor(),
            idle_decay: default_idle_decay(),
            arbitration: SourceArbitration::default(),
        }
    }
}

impl BlenderTuning {
    /// Smoothing factors live in [0.3, 0.7]; idle decay must actually decay.
    pub fn sanitized(mut self) -> Self {
        let fix = |v: f32, d: f32, lo: f32, hi: f32| {
            if v.is_finite() {
                v.clamp(lo, hi)
            } else {
                d
            }
        };
        self.lip_sync_factor = fix(self.lip_sync_factor, default_lip_sync_factor(), 0.3, 0.7);
        self.emotion_factor = fix(self.emotion_factor, default_emotion_factor(), 0.3, 0.7);
        self.tracked_factor = fix(self.tracked_factor, default_tracked_factor(), 0.3, 0.7);
        self.idle_decay = fix(self.idle_decay, default_idle_decay(), 0.5, 0.995);
        self
    }
}

/// Inputs visible to the blender this frame. Stale sources are already `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendInputs<'a> {
    pub talking: bool,
    pub audio: Option<&'a [u8]>,
    pub emotion: Option<&'a EmotionFrame>,
    pub tracking: Option<&'a TrackingFrame>,
}

/// Which sources shaped this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendSource {
    #[default]
    None,
    Emotion,
    Tracking,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BlendReport {
    pub source: BlendSource,
    pub lip_sync: LipSyncTargets,
    pub lip_sync_reserved: bool,
    pub channels_targeted: u32,
    /// Non-finite or out-of-range scores clamped this frame.
    pub sanitized_inputs: u32,
    /// Keys seen for the first time with no mapping.
    pub new_unknown_keys: u32,
}

#[derive(Debug, Clone, Copy)]
struct Target {
    value: f32,
    factor: f32,
}

pub struct ChannelBlender {
    bank: ChannelBank,
    emotion_table: ResolvedTable,
    tracked_table: ResolvedTable,
    lip_slots: [Option<usize>; 5],
    extractor: AudioEnergyExtractor,
    tuning: BlenderTuning,
    targets: Vec<Option<Target>>,
    unknown_keys: HashSet<String>,
    frame: u64,
}

impl ChannelBlender {
    pub fn new(
        tables: &ChannelTables,
        mesh_names: &[String],
        tuning: BlenderTuning,
        audio: AudioEnergyConfig,
    ) -> Self {
        let mut wanted = tables.all_targets();
        for name in LIP_SYNC_CHANNELS {
            if !wanted.iter().any(|w| w == name) {
                wanted.push(name.to_string());
            }
        }
        let bank = ChannelBank::resolve(&wanted, mesh_names);
        let emotion_table = ResolvedTable::resolve(&tables.emotion, &bank);
        let tracked_table =
            ResolvedTable::resolve(&tables.tracked, &bank).with_direct(&tables.direct, &bank);

        let mut lip_slots = [None; 5];
        for (slot, name) in lip_slots.iter_mut().zip(LIP_SYNC_CHANNELS) {
            *slot = bank.slot(name);
        }

        tracing::debug!(
            "[Blender] Resolved {} of {} channels ({} emotion keys, {} tracker keys)",
            bank.len(),
            wanted.len(),
            emotion_table.len(),
            tracked_table.len()
        );

        Self {
            targets: vec![None; bank.len()],
            bank,
            emotion_table,
            tracked_table,
            lip_slots,
            extractor: AudioEnergyExtractor::new(audio),
            tuning: tuning.sanitized(),
            unknown_keys: HashSet::new(),
            frame: 0,
        }
    }

    pub fn bank(&self) -> &ChannelBank {
        &self.bank
    }

    pub fn tuning(&self) -> &BlenderTuning {
        &self.tuning
    }

    pub fn value_of(&self, name: &str) -> Option<f32> {
        self.bank.value_of(name)
    }

    /// Run one frame. Never fails; bad numbers are clamped and counted.
    pub fn blend(&mut self, inputs: &BlendInputs<'_>, dt: f32) -> BlendReport {
        self.frame += 1;
        let mut report = BlendReport::default();
        self.targets.iter_mut().for_each(|t| *t = None);

        // 1. Lip sync
        let was_active = self.extractor.is_active();
        let lip = match (inputs.talking, inputs.audio) {
            (true, Some(bins)) if !bins.is_empty() => {
                report.lip_sync_reserved = true;
                self.extractor.process(bins, dt)
            }
            _ => {
                report.lip_sync_reserved = was_active;
                self.extractor.release(dt)
            }
        };
        report.lip_sync = lip;
        let mut reserved = [None; 5];
        if report.lip_sync_reserved {
            for (i, (_, value)) in lip.channels().iter().enumerate() {
                if let Some(slot) = self.lip_slots[i] {
                    self.bank.write(slot, *value, self.frame);
                    reserved[i] = Some(slot);
                }
            }
        }

        // 2./3. Emotion, then tracking
        let emotion = inputs.emotion.filter(|e| !e.is_empty());
        let tracking = inputs.tracking.filter(|t| t.has_expressions());
        let use_tracking = match self.tuning.arbitration {
            SourceArbitration::EmotionFirst => emotion.is_none(),
            SourceArbitration::Merge => true,
        };

        if let Some(frame) = emotion {
            let factor = self.tuning.emotion_factor;
            for (key, &score) in &frame.scores {
                self.contribute(true, key, score, factor, &reserved, &mut report);
            }
            report.source = BlendSource::Emotion;
        }
        if let Some(frame) = tracking.filter(|_| use_tracking) {
            let factor = self.tuning.tracked_factor;
            for (key, &score) in &frame.expressions {
                self.contribute(false, key, score, factor, &reserved, &mut report);
            }
            report.source = match report.source {
                BlendSource::Emotion => BlendSource::Both,
                _ => BlendSource::Tracking,
            };
        }

        // 4./5. Smoothing and idle relaxation
        let decay = frame_decay(self.tuning.idle_decay, dt);
        for slot in 0..self.bank.len() {
            if reserved.contains(&Some(slot)) {
                continue;
            }
            let current = self.bank.value(slot);
            match self.targets[slot] {
                Some(t) => {
                    report.channels_targeted += 1;
                    let k = frame_factor(t.factor, dt);
                    self.bank.write(slot, approach(current, t.value, k), self.frame);
                }
                None if current > 0.0 => {
                    let next = current * decay;
                    self.bank.relax(slot, if next < 1e-4 { 0.0 } else { next });
                }
                None => {}
            }
        }

        report
    }

    fn contribute(
        &mut self,
        emotion: bool,
        key: &str,
        score: f32,
        factor: f32,
        reserved: &[Option<usize>; 5],
        report: &mut BlendReport,
    ) {
        let table = if emotion {
            &self.emotion_table
        } else {
            &self.tracked_table
        };
        let Some(mapping) = table.lookup(key) else {
            if self.unknown_keys.len() < MAX_UNKNOWN_KEYS && !self.unknown_keys.contains(key) {
                self.unknown_keys.insert(key.to_string());
                report.new_unknown_keys += 1;
                tracing::debug!("[Blender] No mapping for '{}', ignoring", key);
                if self.unknown_keys.len() == MAX_UNKNOWN_KEYS {
                    tracing::warn!(
                        "[Blender] {} unmapped keys seen, no longer reporting new ones",
                        MAX_UNKNOWN_KEYS
                    );
                }
            }
            return;
        };

        let clean = clamp_unit(score);
        if clean != score {
            report.sanitized_inputs += 1;
        }
        let value = clamp_unit(clean * mapping.amplify);
        for &slot in &mapping.slots {
            if reserved.contains(&Some(slot)) {
                continue;
            }
            let entry = &mut self.targets[slot];
            match entry {
                Some(t) if t.value >= value => {}
                _ => *entry = Some(Target { value, factor }),
            }
        }
    }
}
