pub mod resolve;
pub mod tables;

pub use resolve::{ResolvedMapping, ResolvedTable};
pub use tables::{
    direct_channels, emotion_to_channels, is_eyelid, tracked_expression_to_channels,
    ChannelMapping, ChannelTables, EYELID_CHANNELS,
};
