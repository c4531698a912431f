pub mod hub;
pub mod snapshot;
pub mod source;

pub use hub::{input_channel, HoldConfig, InputPublishers, InputReceivers, SignalInbox};
pub use snapshot::{
    EmotionFrame, EmotionScore, HeadRotation, Lean, MagnitudeBuffer, PostureSnapshot,
    SpeechEvent, TrackingFrame,
};
pub use source::{spawn_pump, ChannelSource, ScriptedSource, SignalSource};
