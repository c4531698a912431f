//! Blink Synthesizer.
//!
//! Independent of every input: waits a random 2–7 s, closes and reopens the
//! lids along a half-sine over 0.1–0.3 s, repeats. The state is a plain value
//! and [`step`] is a pure function of (state, dt, rng), so tests can drive it
//! with a seeded generator.

use super::channels::ChannelBank;
use crate::mapping::EYELID_CHANNELS;
use crate::utils::{finite_or, sanitize_dt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f32,
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: f32,
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f32,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f32,
    /// Eyelid channel names to look for on the mesh.
    #[serde(default = "default_eyelids")]
    pub channels: Vec<String>,
}

fn default_min_interval() -> f32 {
    2.0
}
fn default_max_interval() -> f32 {
    7.0
}
fn default_min_duration() -> f32 {
    0.1
}
fn default_max_duration() -> f32 {
    0.3
}
fn default_eyelids() -> Vec<String> {
    EYELID_CHANNELS.iter().map(|s| s.to_string()).collect()
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            channels: default_eyelids(),
        }
    }
}

impl BlinkConfig {
    pub fn sanitized(mut self) -> Self {
        self.min_interval_secs = finite_or(self.min_interval_secs, 2.0).clamp(0.5, 30.0);
        self.max_interval_secs =
            finite_or(self.max_interval_secs, 7.0).clamp(self.min_interval_secs, 30.0);
        self.min_duration_secs = finite_or(self.min_duration_secs, 0.1).clamp(0.05, 1.0);
        self.max_duration_secs =
            finite_or(self.max_duration_secs, 0.3).clamp(self.min_duration_secs, 1.0);
        self
    }

    fn next_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        sample(rng, self.min_interval_secs, self.max_interval_secs)
    }

    fn next_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        sample(rng, self.min_duration_secs, self.max_duration_secs)
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BlinkState {
    Waiting { elapsed: f32, threshold: f32 },
    Blinking { progress: f32, duration: f32 },
}

impl BlinkState {
    pub fn initial<R: Rng + ?Sized>(config: &BlinkConfig, rng: &mut R) -> Self {
        BlinkState::Waiting {
            elapsed: 0.0,
            threshold: config.next_interval(rng),
        }
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self, BlinkState::Blinking { .. })
    }
}

/// Advance the blink timers by `dt`, returning the new state and lid closure in [0,1].
pub fn step<R: Rng + ?Sized>(
    state: BlinkState,
    dt: f32,
    config: &BlinkConfig,
    rng: &mut R,
) -> (BlinkState, f32) {
    let dt = sanitize_dt(dt);
    match state {
        BlinkState::Waiting { elapsed, threshold } => {
            let elapsed = elapsed + dt;
            if elapsed < threshold {
                return (BlinkState::Waiting { elapsed, threshold }, 0.0);
            }
            let duration = config.next_duration(rng);
            let progress = (elapsed - threshold).min(duration);
            let next = BlinkState::Blinking { progress, duration };
            (next, closure(progress, duration))
        }
        BlinkState::Blinking { progress, duration } => {
            let progress = progress + dt;
            if progress >= duration {
                let next = BlinkState::Waiting {
                    elapsed: 0.0,
                    threshold: config.next_interval(rng),
                };
                return (next, 0.0);
            }
            (BlinkState::Blinking { progress, duration }, closure(progress, duration))
        }
    }
}

fn closure(progress: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    (PI * (progress / duration).clamp(0.0, 1.0)).sin().max(0.0)
}

/// Owns the eyelid channels. Runs every frame regardless of other inputs.
pub struct BlinkSynthesizer<R: Rng> {
    config: BlinkConfig,
    state: BlinkState,
    bank: ChannelBank,
    rng: R,
    frame: u64,
    blinks: u64,
}

impl<R: Rng> BlinkSynthesizer<R> {
    pub fn new(config: BlinkConfig, mesh_names: &[String], mut rng: R) -> Self {
        let config = config.sanitized();
        let bank = ChannelBank::resolve(&config.channels, mesh_names);
        if bank.is_empty() {
            tracing::debug!("[Blink] Mesh has no eyelid channels, blink runs silent");
        }
        let state = BlinkState::initial(&config, &mut rng);
        Self {
            config,
            state,
            bank,
            rng,
            frame: 0,
            blinks: 0,
        }
    }

    /// Advance and write the lids. Returns the closure amount.
    pub fn update(&mut self, dt: f32) -> f32 {
        self.frame += 1;
        let was_blinking = self.state.is_blinking();
        let (state, value) = step(self.state, dt, &self.config, &mut self.rng);
        if state.is_blinking() && !was_blinking {
            self.blinks += 1;
        }
        self.state = state;
        for slot in 0..self.bank.len() {
            self.bank.write(slot, value, self.frame);
        }
        value
    }

    pub fn state(&self) -> BlinkState {
        self.state
    }

    pub fn bank(&self) -> &ChannelBank {
        &self.bank
    }

    pub fn blink_count(&self) -> u64 {
        self.blinks
    }
}
