pub mod clips;
pub mod head;
pub mod posture;
pub mod state_machine;

pub use clips::{AnimationClip, ClipAsset, ClipCategory, ClipLibrary};
pub use head::{AxisRange, HeadPose, HeadRotationSolver, HeadSolverConfig, IdleSway};
pub use posture::{posture_target, PostureConfig, PostureResponder, RootTransform};
pub use state_machine::{AnimationConfig, AnimationState, AnimationStateMachine, ClipLayer};
