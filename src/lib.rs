pub mod audio;
pub mod config;
pub mod face;
pub mod inputs;
pub mod mapping;
pub mod motion;
pub mod observability;
pub mod orchestrator;
pub mod rig;
pub mod utils;

#[cfg(test)]
mod tests;

pub use orchestrator::{FrameOrchestrator, FrameReport};
pub use rig::{AvatarProfile, AvatarRig, RigError, RigIssue};
