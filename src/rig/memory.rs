//! Headless rig that records every write. Backs the replay binary and the
//! scenario tests.

use super::interface::{AvatarRig, BoneHandle, EulerRotation};
use crate::motion::{ClipAsset, ClipLayer, RootTransform};

#[derive(Debug, Clone, Default)]
pub struct MemoryRig {
    morph_names: Vec<String>,
    influences: Vec<f32>,
    bone_names: Vec<String>,
    rotations: Vec<EulerRotation>,
    clips: Vec<ClipAsset>,
    root: RootTransform,
    layers: Vec<ClipLayer>,
    morph_writes: u64,
    bone_writes: u64,
}

impl MemoryRig {
    pub fn new(morphs: &[&str], bones: &[(&str, EulerRotation)], clips: Vec<ClipAsset>) -> Self {
        Self {
            morph_names: morphs.iter().map(|s| s.to_string()).collect(),
            influences: vec![0.0; morphs.len()],
            bone_names: bones.iter().map(|(n, _)| n.to_string()).collect(),
            rotations: bones.iter().map(|(_, r)| *r).collect(),
            clips,
            ..Self::default()
        }
    }

    /// ARKit-style face, Mixamo-style skeleton with a slightly tilted rest
    /// pose, and both body variants' clips.
    pub fn standard_avatar() -> Self {
        Self::new(
            STANDARD_MORPHS,
            &[
                ("mixamorig:Hips", EulerRotation::IDENTITY),
                ("mixamorig:Spine", EulerRotation::IDENTITY),
                ("mixamorig:Spine1", EulerRotation::IDENTITY),
                ("mixamorig:Spine2", EulerRotation::new(0.02, 0.0, 0.0)),
                ("mixamorig:Neck", EulerRotation::new(0.08, 0.0, 0.0)),
                ("mixamorig:Head", EulerRotation::new(-0.05, 0.01, 0.0)),
                ("mixamorig:HeadTop_End", EulerRotation::IDENTITY),
                ("mixamorig:LeftEye", EulerRotation::IDENTITY),
            ],
            vec![
                ClipAsset::new("M_Standing_Idle_001", 6.0),
                ClipAsset::new("M_Talking_Variations_001", 3.5),
                ClipAsset::new("M_Talking_Variations_002", 4.0),
                ClipAsset::new("M_Talking_Variations_003", 2.8),
                ClipAsset::new("F_Standing_Idle_001", 6.5),
                ClipAsset::new("F_Talking_Variations_001", 3.2),
                ClipAsset::new("F_Talking_Variations_002", 3.9),
            ],
        )
    }

    /// A model with a face but no skeleton or clips beyond one pose.
    pub fn face_only() -> Self {
        Self::new(STANDARD_MORPHS, &[], vec![ClipAsset::new("Pose", 1.0)])
    }

    pub fn influence(&self, name: &str) -> Option<f32> {
        self.morph_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.influences[i])
    }

    pub fn influences(&self) -> &[f32] {
        &self.influences
    }

    pub fn rotation_of(&self, name: &str) -> Option<EulerRotation> {
        self.bone_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.rotations[i])
    }

    pub fn root(&self) -> RootTransform {
        self.root
    }

    pub fn last_layers(&self) -> &[ClipLayer] {
        &self.layers
    }

    pub fn morph_writes(&self) -> u64 {
        self.morph_writes
    }

    pub fn bone_writes(&self) -> u64 {
        self.bone_writes
    }
}

impl AvatarRig for MemoryRig {
    fn morph_target_names(&self) -> Vec<String> {
        self.morph_names.clone()
    }

    fn set_morph_influence(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.influences.get_mut(index) {
            *slot = value;
            self.morph_writes += 1;
        }
    }

    fn bone_names(&self) -> Vec<String> {
        self.bone_names.clone()
    }

    fn bone_rotation(&self, bone: BoneHandle) -> Option<EulerRotation> {
        self.rotations.get(bone.0).copied()
    }

    fn set_bone_rotation(&mut self, bone: BoneHandle, rotation: EulerRotation) {
        if let Some(slot) = self.rotations.get_mut(bone.0) {
            *slot = rotation;
            self.bone_writes += 1;
        }
    }

    fn set_root_transform(&mut self, transform: &RootTransform) {
        self.root = *transform;
    }

    fn clip_assets(&self) -> Vec<ClipAsset> {
        self.clips.clone()
    }

    fn apply_clip_layers(&mut self, layers: &[ClipLayer]) {
        self.layers.clear();
        self.layers.extend_from_slice(layers);
    }
}

const STANDARD_MORPHS: &[&str] = &[
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeBlinkLeft",
    "eyeBlinkRight",
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
    "mouthOpen",
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
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "noseSneerLeft",
    "noseSneerRight",
    "tongueOut",
];
