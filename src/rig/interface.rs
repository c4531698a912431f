use crate::motion::{ClipAsset, ClipLayer, RootTransform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fatal errors for one avatar instance. Per-frame code never returns these.
#[derive(Debug, thiserror::Error)]
pub enum RigError {
    #[error("no animation clips available (clip prefix {0:?})")]
    NoClips(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Structural problems found at load. Reported once; the frame loop keeps
/// running with whatever parts still work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RigIssue {
    NoMorphTargets,
    NoSkeleton,
    MissingHeadBones { head: bool, neck: bool },
    NoTalkingClips,
    NoEyelids,
}

impl fmt::Display for RigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RigIssue::NoMorphTargets => write!(f, "mesh has no morph targets, face stays static"),
            RigIssue::NoSkeleton => write!(f, "model has no skeleton, head and clips disabled"),
            RigIssue::MissingHeadBones { head, neck } => write!(
                f,
                "head bones missing (head: {}, neck: {})",
                if *head { "found" } else { "missing" },
                if *neck { "found" } else { "missing" }
            ),
            RigIssue::NoTalkingClips => write!(f, "no talking clips, idle clip used while talking"),
            RigIssue::NoEyelids => write!(f, "mesh has no eyelid channels, blink disabled"),
        }
    }
}

/// Euler angles in radians, XYZ order. x = pitch, y = yaw, z = roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl EulerRotation {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    pub fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Largest absolute component difference.
    pub fn max_abs_diff(self, o: Self) -> f32 {
        let d = self.sub(o);
        d.x.abs().max(d.y.abs()).max(d.z.abs())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Opaque joint reference, resolved once at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoneHandle(pub usize);

/// The loaded character as seen by the driver. Implemented by the host's
/// scene graph binding (or [`crate::rig::MemoryRig`] headless).
pub trait AvatarRig {
    /// Morph target names, indexed as the mesh stores them.
    fn morph_target_names(&self) -> Vec<String>;
    fn set_morph_influence(&mut self, index: usize, value: f32);

    fn bone_names(&self) -> Vec<String>;
    /// Current local rotation; `None` for an unknown handle.
    fn bone_rotation(&self, bone: BoneHandle) -> Option<EulerRotation>;
    fn set_bone_rotation(&mut self, bone: BoneHandle, rotation: EulerRotation);

    fn set_root_transform(&mut self, transform: &RootTransform);

    /// Named clips shipped with the model.
    fn clip_assets(&self) -> Vec<ClipAsset>;
    /// Pose the skeleton from the mixer's layers (at most two).
    fn apply_clip_layers(&mut self, layers: &[ClipLayer]);
}
