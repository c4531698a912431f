//! Morph channel storage, resolved once against the loaded mesh.

use serde::Serialize;
use std::collections::HashMap;

/// One canonical blend-shape channel and the mesh slot it writes to.
#[derive(Debug, Clone, Serialize)]
pub struct MorphChannel {
    pub name: String,
    pub current_value: f32,
    pub last_write_frame: u64,
    /// Index into the mesh's morph-target influence array.
    pub mesh_index: usize,
}

/// The channels one owner (blender or blink synthesizer) manages.
///
/// Only channels present on the mesh are kept; everything else was
/// dropped at resolve time, so per-frame code never looks a name up twice.
#[derive(Debug, Clone, Default)]
pub struct ChannelBank {
    channels: Vec<MorphChannel>,
    by_name: HashMap<String, usize>,
}

impl ChannelBank {
    /// Keep every wanted name that the mesh exposes (case-insensitive).
    pub fn resolve<S: AsRef<str>>(wanted: &[S], mesh_names: &[String]) -> Self {
        let mut bank = Self::default();
        for name in wanted {
            let name = name.as_ref();
            if bank.slot(name).is_some() {
                continue;
            }
            let found = mesh_names
                .iter()
                .position(|m| m == name)
                .or_else(|| mesh_names.iter().position(|m| m.eq_ignore_ascii_case(name)));
            match found {
                Some(mesh_index) => {
                    bank.by_name
                        .insert(name.to_ascii_lowercase(), bank.channels.len());
                    bank.channels.push(MorphChannel {
                        name: name.to_string(),
                        current_value: 0.0,
                        last_write_frame: 0,
                        mesh_index,
                    });
                }
                None => tracing::debug!("[Morph] Mesh has no channel '{}', skipping", name),
            }
        }
        bank
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[MorphChannel] {
        &self.channels
    }

    pub fn value(&self, slot: usize) -> f32 {
        self.channels[slot].current_value
    }

    /// Current value by name; `None` when the mesh lacks the channel.
    pub fn value_of(&self, name: &str) -> Option<f32> {
        self.slot(name).map(|s| self.channels[s].current_value)
    }

    /// Store a value, clamped into [0,1]. NaN becomes 0.
    pub fn write(&mut self, slot: usize, value: f32, frame: u64) {
        let ch = &mut self.channels[slot];
        ch.current_value = clamp_unit(value);
        ch.last_write_frame = frame;
    }

    /// Store without stamping the frame (idle relaxation).
    pub fn relax(&mut self, slot: usize, value: f32) {
        self.channels[slot].current_value = clamp_unit(value);
    }
}

/// Clamp into [0,1], mapping NaN to 0.
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
