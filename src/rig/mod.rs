pub mod interface;
pub mod memory;
pub mod profile;
pub mod skeleton;

pub use interface::{AvatarRig, BoneHandle, EulerRotation, RigError, RigIssue};
pub use memory::MemoryRig;
pub use profile::{
    default_profile_path, load_profile, save_profile, AvatarKind, AvatarProfile, Gender,
};
pub use skeleton::{BoneMap, BonePatterns, NeutralPose};
