//! Bone lookup by name pattern. Runs once at load; the frame loop only
//! ever sees the cached handles and the neutral pose captured here.

use super::interface::{AvatarRig, BoneHandle, EulerRotation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonePatterns {
    /// Substrings tried in order; first match wins.
    #[serde(default = "default_head")]
    pub head: Vec<String>,
    #[serde(default = "default_neck")]
    pub neck: Vec<String>,
    #[serde(default = "default_spine")]
    pub spine: Vec<String>,
    /// Names containing any of these are never picked (end nubs, eyes, jaw).
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
fn default_head() -> Vec<String> {
    strings(&["head"])
}
fn default_neck() -> Vec<String> {
    strings(&["neck"])
}
fn default_spine() -> Vec<String> {
    strings(&["spine2", "upperchest", "chest", "spine1", "spine"])
}
fn default_exclude() -> Vec<String> {
    strings(&["end", "top", "nub", "eye", "jaw", "tongue"])
}

impl Default for BonePatterns {
    fn default() -> Self {
        Self {
            head: default_head(),
            neck: default_neck(),
            spine: default_spine(),
            exclude: default_exclude(),
        }
    }
}

impl BonePatterns {
    fn find(&self, names: &[String], patterns: &[String]) -> Option<BoneHandle> {
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        for pattern in patterns {
            let pattern = pattern.to_lowercase();
            let hit = lowered.iter().position(|name| {
                name.contains(&pattern)
                    && !self
                        .exclude
                        .iter()
                        .any(|x| name.contains(&x.to_lowercase()))
            });
            if let Some(i) = hit {
                return Some(BoneHandle(i));
            }
        }
        None
    }
}

/// Rest rotations captured before anything writes to the bones.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeutralPose {
    pub head: EulerRotation,
    pub neck: EulerRotation,
    pub spine: EulerRotation,
}

#[derive(Debug, Clone, Default)]
pub struct BoneMap {
    pub head: Option<BoneHandle>,
    pub neck: Option<BoneHandle>,
    pub spine: Option<BoneHandle>,
    pub neutral: NeutralPose,
    pub bone_count: usize,
}

impl BoneMap {
    pub fn resolve<R: AvatarRig + ?Sized>(rig: &R, patterns: &BonePatterns) -> Self {
        let names = rig.bone_names();
        let head = patterns.find(&names, &patterns.head);
        let neck = patterns.find(&names, &patterns.neck);
        let spine = patterns.find(&names, &patterns.spine);

        let capture = |h: Option<BoneHandle>| {
            h.and_then(|h| rig.bone_rotation(h))
                .filter(|r| r.is_finite())
                .unwrap_or_default()
        };
        let neutral = NeutralPose {
            head: capture(head),
            neck: capture(neck),
            spine: capture(spine),
        };

        let name = |h: Option<BoneHandle>| {
            h.map(|h| names[h.0].as_str()).unwrap_or("-").to_string()
        };
        tracing::debug!(
            "[Skeleton] head={} neck={} spine={} ({} bones)",
            name(head),
            name(neck),
            name(spine),
            names.len()
        );

        Self {
            head,
            neck,
            spine,
            neutral,
            bone_count: names.len(),
        }
    }

    pub fn has_head_chain(&self) -> bool {
        self.head.is_some() && self.neck.is_some()
    }
}
