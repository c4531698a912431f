//! Snapshot types delivered by the collaborators.
//!
//! Every snapshot is a value: a newer one replaces the older one wholesale,
//! fields are never merged across updates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Head pose in radians, tracker convention (pitch = nod, yaw = turn, roll = tilt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadRotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl HeadRotation {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// NaN/Inf axes become 0. Returns whether anything was replaced.
    pub fn sanitized(self) -> (Self, bool) {
        let fix = |v: f32| if v.is_finite() { (v, false) } else { (0.0, true) };
        let (pitch, a) = fix(self.pitch);
        let (yaw, b) = fix(self.yaw);
        let (roll, c) = fix(self.roll);
        (Self { pitch, yaw, roll }, a || b || c)
    }
}

/// One webcam tracker snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingFrame {
    #[serde(default)]
    pub expressions: HashMap<String, f32>,
    #[serde(default)]
    pub head_rotation: Option<HeadRotation>,
    /// Producer wall-clock time, Unix milliseconds.
    #[serde(default = "now_millis")]
    pub timestamp: i64,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl TrackingFrame {
    pub fn new(expressions: HashMap<String, f32>, head_rotation: Option<HeadRotation>) -> Self {
        Self {
            expressions,
            head_rotation,
            timestamp: now_millis(),
        }
        .normalized()
    }

    /// Lowercase expression keys so per-frame lookups never allocate.
    /// Keys that collide after folding keep the larger score.
    pub fn normalized(mut self) -> Self {
        if self
            .expressions
            .keys()
            .any(|k| k.bytes().any(|b| b.is_ascii_uppercase()))
        {
            let mut folded = HashMap::with_capacity(self.expressions.len());
            for (key, score) in self.expressions.drain() {
                folded
                    .entry(key.to_ascii_lowercase())
                    .and_modify(|v: &mut f32| *v = v.max(score))
                    .or_insert(score);
            }
            self.expressions = folded;
        }
        self
    }

    pub fn has_expressions(&self) -> bool {
        !self.expressions.is_empty()
    }
}

/// Wire shape of one voice-service emotion score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub name: String,
    pub score: f32,
}

impl EmotionScore {
    pub fn new(name: &str, score: f32) -> Self {
        Self {
            name: name.to_string(),
            score,
        }
    }
}

/// Latest emotion scores, keyed by lowercased name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionFrame {
    pub scores: HashMap<String, f32>,
}

impl EmotionFrame {
    /// Build from the service's `{name, score}[]` list. Names are trimmed and
    /// lowercased; a repeated name keeps its highest finite score.
    pub fn from_scores<I: IntoIterator<Item = EmotionScore>>(scores: I) -> Self {
        let mut map: HashMap<String, f32> = HashMap::new();
        for s in scores {
            let key = s.name.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let entry = map.entry(key).or_insert(f32::NAN);
            // Non-finite scores only stand in until a finite one arrives.
            if !entry.is_finite() || (s.score.is_finite() && s.score > *entry) {
                *entry = s.score;
            }
        }
        Self { scores: map }
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl From<Vec<EmotionScore>> for EmotionFrame {
    fn from(scores: Vec<EmotionScore>) -> Self {
        Self::from_scores(scores)
    }
}

/// Posture analyzer lean classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Left,
    Right,
    #[default]
    None,
}

/// Coarse posture metrics, 0–100 scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureSnapshot {
    pub openness: f32,
    pub confidence_score: f32,
    pub shoulder_alignment: f32,
    #[serde(default)]
    pub leaning: Lean,
}

/// Raw analyser bins, 0–255 per bin.
pub type MagnitudeBuffer = Vec<u8>;

/// Discrete speech boundary from the voice pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechEvent {
    Started,
    Ended,
}
