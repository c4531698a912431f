//! Avatar profile: everything that makes one character instance behave
//! differently from another, persisted as JSON next to the engine's other
//! config files.

use super::interface::RigError;
use super::skeleton::BonePatterns;
use crate::audio::AudioEnergyConfig;
use crate::config::{app_data_dir, load_json_config, save_json_config};
use crate::face::{BlenderTuning, BlinkConfig};
use crate::inputs::HoldConfig;
use crate::mapping::ChannelTables;
use crate::motion::{AnimationConfig, HeadSolverConfig, PostureConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const PROFILE_FILE: &str = "avatar_profile.json";

/// Tracked avatars mirror the user's webcam; coach avatars are driven by
/// the voice pipeline only and sway on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarKind {
    #[default]
    Tracked,
    Coach,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Gender {
    pub fn clip_prefix(&self) -> Option<&'static str> {
        match self {
            Gender::Male => Some("M_"),
            Gender::Female => Some("F_"),
            Gender::Unspecified => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarProfile {
    #[serde(default)]
    pub kind: AvatarKind,
    #[serde(default)]
    pub gender: Gender,
    /// Overrides the gender prefix when set.
    #[serde(default)]
    pub clip_prefix: Option<String>,
    #[serde(default)]
    pub blender: BlenderTuning,
    #[serde(default)]
    pub audio: AudioEnergyConfig,
    #[serde(default)]
    pub blink: BlinkConfig,
    #[serde(default)]
    pub head: HeadSolverConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub posture: PostureConfig,
    #[serde(default)]
    pub hold: HoldConfig,
    #[serde(default)]
    pub bones: BonePatterns,
    /// Replaces the built-in mapping tables when present.
    #[serde(default)]
    pub tables: Option<ChannelTables>,
    /// Frames between rate-limited summary logs.
    #[serde(default = "default_summary_every")]
    pub summary_every_frames: u64,
}

fn default_summary_every() -> u64 {
    300
}

impl Default for AvatarProfile {
    fn default() -> Self {
        Self {
            kind: AvatarKind::default(),
            gender: Gender::default(),
            clip_prefix: None,
            blender: BlenderTuning::default(),
            audio: AudioEnergyConfig::default(),
            blink: BlinkConfig::default(),
            head: HeadSolverConfig::default(),
            animation: AnimationConfig::default(),
            posture: PostureConfig::default(),
            hold: HoldConfig::default(),
            bones: BonePatterns::default(),
            tables: None,
            summary_every_frames: default_summary_every(),
        }
    }
}

impl AvatarProfile {
    pub fn coach(gender: Gender) -> Self {
        Self {
            kind: AvatarKind::Coach,
            gender,
            ..Self::default()
        }
    }

    pub fn tracked(gender: Gender) -> Self {
        Self {
            kind: AvatarKind::Tracked,
            gender,
            ..Self::default()
        }
    }

    pub fn clip_prefix(&self) -> Option<&str> {
        match self.clip_prefix.as_deref() {
            Some(p) => Some(p),
            None => self.gender.clip_prefix(),
        }
    }

    pub fn channel_tables(&self) -> ChannelTables {
        self.tables.clone().unwrap_or_default()
    }

    /// Pull every tuning value back into its documented range.
    pub fn sanitized(mut self) -> Self {
        self.blender = self.blender.sanitized();
        self.audio = self.audio.sanitized();
        self.blink = self.blink.sanitized();
        self.head = self.head.sanitized();
        self.animation = self.animation.sanitized();
        self.posture = self.posture.sanitized();
        self.hold = self.hold.sanitized();
        self.summary_every_frames = self.summary_every_frames.max(1);
        self
    }
}

pub fn default_profile_path() -> PathBuf {
    app_data_dir().join(PROFILE_FILE)
}

/// Load a profile, falling back to defaults on a missing or broken file.
pub fn load_profile(path: &Path) -> AvatarProfile {
    load_json_config::<AvatarProfile>(path, "Avatar").sanitized()
}

pub fn save_profile(path: &Path, profile: &AvatarProfile) -> Result<(), RigError> {
    save_json_config(path, profile, "Avatar")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn gender_picks_prefix() {
        assert_eq!(AvatarProfile::coach(Gender::Female).clip_prefix(), Some("F_"));
        assert_eq!(AvatarProfile::default().clip_prefix(), None);
        let custom = AvatarProfile {
            clip_prefix: Some("Coach_".into()),
            gender: Gender::Male,
            ..AvatarProfile::default()
        };
        assert_eq!(custom.clip_prefix(), Some("Coach_"));
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join(PROFILE_FILE);
        let mut profile = AvatarProfile::coach(Gender::Male);
        profile.head.mirror_yaw = true;
        profile.animation.talking_rate = 0.7;
        save_profile(&path, &profile).unwrap();

        let loaded = load_profile(&path);
        assert_eq!(loaded.kind, AvatarKind::Coach);
        assert!(loaded.head.mirror_yaw);
        assert_eq!(loaded.animation.talking_rate, 0.7);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(PROFILE_FILE);
        std::fs::write(&path, r#"{ "kind": "coach", "animation": { "idle_rate": 3.0 } }"#).unwrap();
        let loaded = load_profile(&path);
        assert_eq!(loaded.kind, AvatarKind::Coach);
        assert_eq!(loaded.animation.idle_rate, 0.8, "rate must be clamped");
        assert_eq!(loaded.hold.emotion_hold_secs, 4.0);
        assert_eq!(loaded.blink.channels.len(), 3);
    }

    #[test]
    fn garbage_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(PROFILE_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let loaded = load_profile(&path);
        assert_eq!(loaded.kind, AvatarKind::Tracked);
        assert!(loaded.tables.is_none());
    }

    #[test]
    fn table_override_round_trips() {
        let mut profile = AvatarProfile::default();
        let mut tables = ChannelTables::default();
        tables.emotion.truncate(2);
        profile.tables = Some(tables);
        let json = serde_json::to_string(&profile).unwrap();
        let back: AvatarProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channel_tables().emotion.len(), 2);
    }

    #[test]
    fn default_path_lives_under_app_dir() {
        let p = default_profile_path();
        assert!(p.ends_with(PROFILE_FILE));
        assert!(p.to_string_lossy().contains("com.chyin.kokoro"));
    }
}
