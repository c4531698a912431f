pub mod analyser;
pub mod energy;

pub use analyser::{load_wav_mono, SpectrumAnalyser};
pub use energy::{
    AudioEnergyConfig, AudioEnergyExtractor, AudioEnergyFrame, LipSyncTargets, LIP_SYNC_CHANNELS,
};
