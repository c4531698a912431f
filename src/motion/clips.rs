//! Clip library: the model's named clips sorted into Idle and Talking.
//!
//! Models ship clips for both body variants, prefixed `M_` / `F_`
//! (`M_Idle`, `F_Talking_1`, ...). Category comes from the name.

use crate::rig::RigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipCategory {
    #[default]
    Idle,
    Talking,
}

/// A clip as the asset loader reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipAsset {
    pub name: String,
    /// Seconds; non-positive or non-finite when unknown.
    pub duration: f32,
}

impl ClipAsset {
    pub fn new(name: &str, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    pub category: ClipCategory,
    /// `None` when the asset did not report a usable length.
    pub duration_hint: Option<f32>,
    pub looping: bool,
    /// Position in the rig's `clip_assets()` list.
    pub asset_index: usize,
}

impl AnimationClip {
    /// A non-looping clip of known length is done once `time` reaches its end.
    pub fn is_finished_at(&self, time: f32) -> bool {
        !self.looping && self.duration_hint.map_or(false, |d| time >= d)
    }
}

fn categorize(name: &str) -> Option<ClipCategory> {
    let lower = name.to_lowercase();
    if lower.contains("talk") {
        Some(ClipCategory::Talking)
    } else if lower.contains("idle") {
        Some(ClipCategory::Idle)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ClipLibrary {
    clips: Vec<AnimationClip>,
    idle: usize,
    talking: Vec<usize>,
}

impl ClipLibrary {
    /// Build from the model's clip list. With a prefix, only matching clips
    /// are kept (falling back to all clips when none match). Errors only when
    /// nothing is left to play.
    pub fn from_assets(
        assets: &[ClipAsset],
        prefix: Option<&str>,
        talking_loops: bool,
    ) -> Result<Self, RigError> {
        let prefix = prefix.filter(|p| !p.is_empty());
        let matches = |a: &ClipAsset| {
            prefix.map_or(true, |p| {
                a.name
                    .get(..p.len())
                    .map_or(false, |head| head.eq_ignore_ascii_case(p))
            })
        };
        let mut picked: Vec<(usize, &ClipAsset)> =
            assets.iter().enumerate().filter(|(_, a)| matches(a)).collect();
        if picked.is_empty() && !assets.is_empty() {
            tracing::warn!(
                "[Clips] No clips match prefix {:?}, using all {} clips",
                prefix,
                assets.len()
            );
            picked = assets.iter().enumerate().collect();
        }
        if picked.is_empty() {
            return Err(RigError::NoClips(prefix.unwrap_or("").to_string()));
        }

        let clips: Vec<AnimationClip> = picked
            .into_iter()
            .map(|(asset_index, a)| {
                let category = categorize(&a.name).unwrap_or(ClipCategory::Idle);
                let duration_hint = Some(a.duration).filter(|d| d.is_finite() && *d > 0.0);
                AnimationClip {
                    name: a.name.clone(),
                    category,
                    duration_hint,
                    looping: category == ClipCategory::Idle || talking_loops,
                    asset_index,
                }
            })
            .collect();

        let named: Vec<Option<ClipCategory>> = clips.iter().map(|c| categorize(&c.name)).collect();
        let idle = named
            .iter()
            .position(|c| *c == Some(ClipCategory::Idle))
            .unwrap_or(0);
        let talking: Vec<usize> = named
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Some(ClipCategory::Talking))
            .map(|(i, _)| i)
            .collect();

        tracing::debug!(
            "[Clips] {} clips: idle='{}', {} talking variants",
            clips.len(),
            clips[idle].name,
            talking.len()
        );

        Ok(Self {
            clips,
            idle,
            talking,
        })
    }

    pub fn get(&self, index: usize) -> Option<&AnimationClip> {
        self.clips.get(index)
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn idle_index(&self) -> usize {
        self.idle
    }

    /// Talking clip indices; empty when the model has none.
    pub fn talking_variants(&self) -> &[usize] {
        &self.talking
    }

    pub fn has_talking(&self) -> bool {
        !self.talking.is_empty()
    }
}
