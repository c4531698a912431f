//! Audio Energy Extractor — frequency magnitudes to lip-sync targets.
//!
//! The voice pipeline hands us one analyser snapshot per frame (bins of
//! 0–255 magnitude). We reduce it to a few scalar features, blend them with a
//! peak-heavy mix (consonant transients matter more to the mouth than
//! loudness), and turn the result into capped mouth targets.

use crate::utils::{approach, frame_decay, frame_factor, finite_or};
use serde::{Deserialize, Serialize};

/// Channels written by lip sync, in [`LipSyncTargets::channels`] order.
pub const LIP_SYNC_CHANNELS: &[&str] = &[
    "mouthOpen",
    "jawOpen",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthPucker",
];

/// Below this the output is snapped to exactly zero.
const SNAP_EPSILON: f32 = 0.005;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEnergyConfig {
    /// Sample rate of the analysed audio, used to place the speech band.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f32,
    #[serde(default = "default_band_low")]
    pub speech_band_low_hz: f32,
    #[serde(default = "default_band_high")]
    pub speech_band_high_hz: f32,
    /// Combined energy below which the mouth releases.
    #[serde(default = "default_silence")]
    pub silence_threshold: f32,
    #[serde(default = "default_open_gain")]
    pub mouth_open_gain: f32,
    #[serde(default = "default_open_cap")]
    pub mouth_open_cap: f32,
    #[serde(default = "default_jaw_gain")]
    pub jaw_gain: f32,
    #[serde(default = "default_jaw_cap")]
    pub jaw_cap: f32,
    #[serde(default = "default_wide_gain")]
    pub wide_gain: f32,
    #[serde(default = "default_secondary_cap")]
    pub wide_cap: f32,
    #[serde(default = "default_pucker_gain")]
    pub pucker_gain: f32,
    #[serde(default = "default_secondary_cap")]
    pub pucker_cap: f32,
    /// Rise factor per 60 Hz frame.
    #[serde(default = "default_attack")]
    pub attack: f32,
    /// Multiplicative decay per 60 Hz frame while silent.
    #[serde(default = "default_release")]
    pub release: f32,
}

fn default_sample_rate() -> f32 {
    48_000.0
}
fn default_band_low() -> f32 {
    100.0
}
fn default_band_high() -> f32 {
    1_000.0
}
fn default_silence() -> f32 {
    0.03
}
fn default_open_gain() -> f32 {
    1.2
}
fn default_open_cap() -> f32 {
    0.4
}
fn default_jaw_gain() -> f32 {
    0.8
}
fn default_jaw_cap() -> f32 {
    0.3
}
fn default_wide_gain() -> f32 {
    1.5
}
fn default_pucker_gain() -> f32 {
    2.0
}
fn default_secondary_cap() -> f32 {
    0.25
}
fn default_attack() -> f32 {
    0.7
}
fn default_release() -> f32 {
    0.85
}

impl Default for AudioEnergyConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            speech_band_low_hz: default_band_low(),
            speech_band_high_hz: default_band_high(),
            silence_threshold: default_silence(),
            mouth_open_gain: default_open_gain(),
            mouth_open_cap: default_open_cap(),
            jaw_gain: default_jaw_gain(),
            jaw_cap: default_jaw_cap(),
            wide_gain: default_wide_gain(),
            wide_cap: default_secondary_cap(),
            pucker_gain: default_pucker_gain(),
            pucker_cap: default_secondary_cap(),
            attack: default_attack(),
            release: default_release(),
        }
    }
}

impl AudioEnergyConfig {
    /// Keep caps well below a fully open mouth and factors inside (0,1).
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        self.sample_rate = finite_or(self.sample_rate, d.sample_rate).max(8_000.0);
        self.silence_threshold = finite_or(self.silence_threshold, d.silence_threshold).clamp(0.0, 0.5);
        self.mouth_open_cap = finite_or(self.mouth_open_cap, d.mouth_open_cap).clamp(0.0, 0.6);
        self.jaw_cap = finite_or(self.jaw_cap, d.jaw_cap).clamp(0.0, 0.4);
        self.wide_cap = finite_or(self.wide_cap, d.wide_cap).clamp(0.0, 0.4);
        self.pucker_cap = finite_or(self.pucker_cap, d.pucker_cap).clamp(0.0, 0.4);
        self.mouth_open_gain = finite_or(self.mouth_open_gain, d.mouth_open_gain).max(0.0);
        self.jaw_gain = finite_or(self.jaw_gain, d.jaw_gain).max(0.0);
        self.wide_gain = finite_or(self.wide_gain, d.wide_gain).max(0.0);
        self.pucker_gain = finite_or(self.pucker_gain, d.pucker_gain).max(0.0);
        self.attack = finite_or(self.attack, d.attack).clamp(0.05, 1.0);
        self.release = finite_or(self.release, d.release).clamp(0.0, 0.95);
        if self.speech_band_high_hz <= self.speech_band_low_hz {
            self.speech_band_low_hz = d.speech_band_low_hz;
            self.speech_band_high_hz = d.speech_band_high_hz;
        }
        self
    }
}

/// Scalar features of one magnitude buffer, each in [0,1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AudioEnergyFrame {
    pub average: f32,
    pub peak: f32,
    /// Weighted average with speech-band bins counted twice.
    pub speech_band: f32,
    /// `0.2 * average + 0.6 * peak + 0.2 * speech_band`.
    pub combined: f32,
}

impl AudioEnergyFrame {
    /// Bins are assumed to span 0..Nyquist evenly (analyser layout).
    pub fn from_magnitudes(bins: &[u8], config: &AudioEnergyConfig) -> Self {
        if bins.is_empty() {
            return Self::default();
        }
        let bin_hz = config.sample_rate / (2.0 * bins.len() as f32);

        let mut sum = 0u32;
        let mut peak = 0u8;
        let mut weighted = 0.0f32;
        let mut weight_total = 0.0f32;
        for (i, &b) in bins.iter().enumerate() {
            sum += b as u32;
            peak = peak.max(b);
            let centre = (i as f32 + 0.5) * bin_hz;
            let w = if centre >= config.speech_band_low_hz && centre <= config.speech_band_high_hz {
                2.0
            } else {
                1.0
            };
            weighted += b as f32 * w;
            weight_total += w;
        }

        let average = sum as f32 / bins.len() as f32 / 255.0;
        let peak = peak as f32 / 255.0;
        let speech_band = weighted / weight_total / 255.0;
        let combined = (0.2 * average + 0.6 * peak + 0.2 * speech_band).clamp(0.0, 1.0);

        Self {
            average,
            peak,
            speech_band,
            combined,
        }
    }
}

/// Lip-sync channel values for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LipSyncTargets {
    pub mouth_open: f32,
    pub jaw_open: f32,
    pub wide: f32,
    pub pucker: f32,
}

impl LipSyncTargets {
    /// Channel/value pairs in [`LIP_SYNC_CHANNELS`] order. Wide drives both corners.
    pub fn channels(&self) -> [(&'static str, f32); 5] {
        [
            (LIP_SYNC_CHANNELS[0], self.mouth_open),
            (LIP_SYNC_CHANNELS[1], self.jaw_open),
            (LIP_SYNC_CHANNELS[2], self.wide),
            (LIP_SYNC_CHANNELS[3], self.wide),
            (LIP_SYNC_CHANNELS[4], self.pucker),
        ]
    }

    pub fn is_silent(&self) -> bool {
        self.mouth_open == 0.0 && self.jaw_open == 0.0 && self.wide == 0.0 && self.pucker == 0.0
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            mouth_open: f(self.mouth_open),
            jaw_open: f(self.jaw_open),
            wide: f(self.wide),
            pucker: f(self.pucker),
        }
    }
}

/// Stateful extractor. Carries one smoothed output for frame-to-frame continuity.
#[derive(Debug, Clone)]
pub struct AudioEnergyExtractor {
    config: AudioEnergyConfig,
    output: LipSyncTargets,
    last_energy: AudioEnergyFrame,
}

impl AudioEnergyExtractor {
    pub fn new(config: AudioEnergyConfig) -> Self {
        Self {
            config: config.sanitized(),
            output: LipSyncTargets::default(),
            last_energy: AudioEnergyFrame::default(),
        }
    }

    /// Consume this frame's magnitude buffer.
    pub fn process(&mut self, bins: &[u8], dt: f32) -> LipSyncTargets {
        let energy = AudioEnergyFrame::from_magnitudes(bins, &self.config);
        self.last_energy = energy;
        if energy.combined < self.config.silence_threshold {
            return self.release(dt);
        }

        let c = &self.config;
        let target = LipSyncTargets {
            mouth_open: (energy.combined * c.mouth_open_gain).min(c.mouth_open_cap),
            jaw_open: (energy.combined * c.jaw_gain).min(c.jaw_cap),
            wide: ((energy.peak - energy.average).max(0.0) * c.wide_gain).min(c.wide_cap),
            pucker: ((energy.speech_band - energy.average).max(0.0) * c.pucker_gain)
                .min(c.pucker_cap),
        };

        let k = frame_factor(c.attack, dt);
        let prev = self.output;
        self.output = LipSyncTargets {
            mouth_open: approach(prev.mouth_open, target.mouth_open, k),
            jaw_open: approach(prev.jaw_open, target.jaw_open, k),
            wide: approach(prev.wide, target.wide, k),
            pucker: approach(prev.pucker, target.pucker, k),
        };
        self.output
    }

    /// No audio this frame: decay multiplicatively, snapping the tail to zero.
    pub fn release(&mut self, dt: f32) -> LipSyncTargets {
        self.last_energy = AudioEnergyFrame::default();
        let m = frame_decay(self.config.release, dt);
        self.output = self
            .output
            .map(|v| if v * m < SNAP_EPSILON { 0.0 } else { v * m });
        self.output
    }

    /// True while any lip-sync channel is still above zero.
    pub fn is_active(&self) -> bool {
        !self.output.is_silent()
    }

    pub fn output(&self) -> LipSyncTargets {
        self.output
    }

    pub fn last_energy(&self) -> AudioEnergyFrame {
        self.last_energy
    }
}
