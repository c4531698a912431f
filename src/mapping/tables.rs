//! Channel Mapping Tables — which morph channels each source signal drives.
//!
//! Three tables, all plain data:
//! - emotion name (voice service vocabulary) → channel set
//! - tracker expression key (webcam vocabulary) → channel set, amplified
//! - direct pass-through names, already in canonical channel vocabulary
//!
//! Unknown keys are never an error; avatar assets and services disagree on
//! vocabulary, so anything unmapped is dropped at lookup time.

use serde::{Deserialize, Serialize};

/// Eyelid channels. Owned by the blink synthesizer, never by the blender.
pub const EYELID_CHANNELS: &[&str] = &["eyeBlinkLeft", "eyeBlinkRight", "eyesClosed"];

/// One source key fanned out to one or more canonical channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMapping {
    pub source_key: String,
    pub target_channels: Vec<String>,
    #[serde(default = "default_amplify")]
    pub amplify: f32,
}

fn default_amplify() -> f32 {
    1.0
}

impl ChannelMapping {
    pub fn new(source_key: &str, targets: &[&str], amplify: f32) -> Self {
        Self {
            source_key: source_key.to_string(),
            target_channels: targets.iter().map(|t| t.to_string()).collect(),
            amplify,
        }
    }

    /// Amplification with hand-edited garbage (NaN, negative) replaced by 1.0.
    pub fn effective_amplify(&self) -> f32 {
        if self.amplify.is_finite() && self.amplify >= 0.0 {
            self.amplify
        } else {
            1.0
        }
    }
}

// ── Built-in tables ────────────────────────────────────────

// (emotion, channels, amplify)
const EMOTION_TABLE: &[(&str, &[&str], f32)] = &[
    (
        "joy",
        &[
            "mouthSmileLeft",
            "mouthSmileRight",
            "cheekSquintLeft",
            "cheekSquintRight",
        ],
        1.0,
    ),
    (
        "sadness",
        &["mouthFrownLeft", "mouthFrownRight", "browInnerUp"],
        1.0,
    ),
    (
        "anger",
        &[
            "browDownLeft",
            "browDownRight",
            "noseSneerLeft",
            "noseSneerRight",
            "mouthPressLeft",
        ],
        1.0,
    ),
    (
        "fear",
        &[
            "browInnerUp",
            "eyeWideLeft",
            "eyeWideRight",
            "mouthStretchLeft",
            "mouthStretchRight",
        ],
        0.9,
    ),
    (
        "surprise",
        &[
            "browInnerUp",
            "browOuterUpLeft",
            "browOuterUpRight",
            "eyeWideLeft",
            "eyeWideRight",
        ],
        1.0,
    ),
    (
        "disgust",
        &[
            "noseSneerLeft",
            "noseSneerRight",
            "mouthUpperUpLeft",
            "mouthUpperUpRight",
        ],
        1.0,
    ),
    ("contempt", &["mouthDimpleLeft", "mouthSmileLeft"], 0.8),
];

// Tracker estimates are timid, hence the larger gains on subtle shapes.
const TRACKED_TABLE: &[(&str, &[&str], f32)] = &[
    ("mouthSmile", &["mouthSmileLeft", "mouthSmileRight"], 1.5),
    ("mouthFrown", &["mouthFrownLeft", "mouthFrownRight"], 2.0),
    ("mouthOpen", &["jawOpen"], 1.2),
    ("mouthPucker", &["mouthPucker"], 2.0),
    ("mouthFunnel", &["mouthFunnel"], 2.0),
    ("mouthLeft", &["mouthLeft"], 3.0),
    ("mouthRight", &["mouthRight"], 3.0),
    ("mouthPress", &["mouthPressLeft", "mouthPressRight"], 2.5),
    ("mouthStretch", &["mouthStretchLeft", "mouthStretchRight"], 2.5),
    ("mouthRollLower", &["mouthRollLower"], 3.0),
    ("mouthRollUpper", &["mouthRollUpper"], 3.0),
    ("mouthShrugLower", &["mouthShrugLower"], 3.0),
    ("mouthShrugUpper", &["mouthShrugUpper"], 3.0),
    ("mouthDimple", &["mouthDimpleLeft", "mouthDimpleRight"], 4.0),
    ("mouthUpperUp", &["mouthUpperUpLeft", "mouthUpperUpRight"], 3.0),
    ("mouthLowerDown", &["mouthLowerDownLeft", "mouthLowerDownRight"], 3.0),
    ("jawForward", &["jawForward"], 5.0),
    ("jawLeft", &["jawLeft"], 5.0),
    ("jawRight", &["jawRight"], 5.0),
    ("browRaise", &["browOuterUpLeft", "browOuterUpRight"], 2.0),
    ("browInnerUp", &["browInnerUp"], 2.0),
    ("browFurrow", &["browDownLeft", "browDownRight"], 3.0),
    ("cheekPuff", &["cheekPuff"], 4.0),
    ("cheekSquint", &["cheekSquintLeft", "cheekSquintRight"], 3.0),
    ("noseSneer", &["noseSneerLeft", "noseSneerRight"], 4.0),
    ("eyeWide", &["eyeWideLeft", "eyeWideRight"], 2.5),
    ("eyeSquint", &["eyeSquintLeft", "eyeSquintRight"], 3.0),
    ("lookLeft", &["eyeLookOutLeft", "eyeLookInRight"], 1.5),
    ("lookRight", &["eyeLookInLeft", "eyeLookOutRight"], 1.5),
    ("lookUp", &["eyeLookUpLeft", "eyeLookUpRight"], 1.5),
    ("lookDown", &["eyeLookDownLeft", "eyeLookDownRight"], 1.5),
    ("tongueOut", &["tongueOut"], 7.0),
];

// ARKit-style canonical names, minus the eyelids.
const DIRECT_CHANNELS: &[&str] = &[
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeLookDownLeft",
    "eyeLookDownRight",
    "eyeLookInLeft",
    "eyeLookInRight",
    "eyeLookOutLeft",
    "eyeLookOutRight",
    "eyeLookUpLeft",
    "eyeLookUpRight",
    "eyeSquintLeft",
    "eyeSquintRight",
    "eyeWideLeft",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawOpen",
    "jawRight",
    "mouthClose",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthFunnel",
    "mouthLeft",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthPucker",
    "mouthRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "noseSneerLeft",
    "noseSneerRight",
    "tongueOut",
];

fn build(table: &[(&str, &[&str], f32)]) -> Vec<ChannelMapping> {
    table
        .iter()
        .map(|(key, targets, amp)| ChannelMapping::new(key, targets, *amp))
        .collect()
}

/// `EmotionToChannels`.
pub fn emotion_to_channels() -> Vec<ChannelMapping> {
    build(EMOTION_TABLE)
}

/// `TrackedExpressionToChannels`.
pub fn tracked_expression_to_channels() -> Vec<ChannelMapping> {
    build(TRACKED_TABLE)
}

/// `DirectChannels`.
pub fn direct_channels() -> Vec<String> {
    DIRECT_CHANNELS.iter().map(|s| s.to_string()).collect()
}

/// The full table set for one avatar. Profiles may override any table;
/// omitted tables fall back to the built-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTables {
    #[serde(default = "emotion_to_channels")]
    pub emotion: Vec<ChannelMapping>,
    #[serde(default = "tracked_expression_to_channels")]
    pub tracked: Vec<ChannelMapping>,
    #[serde(default = "direct_channels")]
    pub direct: Vec<String>,
}

impl Default for ChannelTables {
    fn default() -> Self {
        Self {
            emotion: emotion_to_channels(),
            tracked: tracked_expression_to_channels(),
            direct: direct_channels(),
        }
    }
}

impl ChannelTables {
    /// Every canonical channel any table can write. Eyelids are filtered out.
    pub fn all_targets(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let candidates = self
            .emotion
            .iter()
            .chain(self.tracked.iter())
            .flat_map(|m| m.target_channels.iter())
            .chain(self.direct.iter());
        for name in candidates {
            if is_eyelid(name) || out.iter().any(|n| n == name) {
                continue;
            }
            out.push(name.clone());
        }
        out
    }
}

pub fn is_eyelid(name: &str) -> bool {
    EYELID_CHANNELS.iter().any(|e| e.eq_ignore_ascii_case(name))
}
