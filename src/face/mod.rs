pub mod blender;
pub mod blink;
pub mod channels;

pub use blender::{
    BlendInputs, BlendReport, BlendSource, BlenderTuning, ChannelBlender, SourceArbitration,
};
pub use blink::{step as blink_step, BlinkConfig, BlinkState, BlinkSynthesizer};
pub use channels::{clamp_unit, ChannelBank, MorphChannel};
