//! Mapping tables resolved into bank slots at load time.

use super::tables::{is_eyelid, ChannelMapping};
use crate::face::ChannelBank;
use std::collections::HashMap;

/// A source key's targets as bank slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMapping {
    pub slots: Vec<usize>,
    pub amplify: f32,
}

/// Lookup table from lowercased source key to resolved targets.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTable {
    entries: HashMap<String, ResolvedMapping>,
}

impl ResolvedTable {
    /// Resolve a table against a bank. Targets the mesh lacks are dropped;
    /// a key whose targets are all missing stays known (with no slots) so
    /// it is not reported as an unknown key every frame.
    pub fn resolve(mappings: &[ChannelMapping], bank: &ChannelBank) -> Self {
        let mut entries = HashMap::with_capacity(mappings.len());
        for m in mappings {
            let slots = m
                .target_channels
                .iter()
                .filter(|name| !is_eyelid(name))
                .filter_map(|name| bank.slot(name))
                .collect();
            entries.insert(
                m.source_key.to_ascii_lowercase(),
                ResolvedMapping {
                    slots,
                    amplify: m.effective_amplify(),
                },
            );
        }
        Self { entries }
    }

    /// Add identity mappings for names already in canonical vocabulary.
    /// Explicit table entries win over pass-through.
    pub fn with_direct(mut self, direct: &[String], bank: &ChannelBank) -> Self {
        for name in direct {
            if is_eyelid(name) {
                continue;
            }
            let key = name.to_ascii_lowercase();
            if self.entries.contains_key(&key) {
                continue;
            }
            let slots = bank.slot(name).into_iter().collect();
            self.entries.insert(key, ResolvedMapping { slots, amplify: 1.0 });
        }
        self
    }

    /// Keys are stored lowercase; only mixed-case input pays for folding.
    pub fn lookup(&self, key: &str) -> Option<&ResolvedMapping> {
        if key.bytes().any(|b| b.is_ascii_uppercase()) {
            self.entries.get(&key.to_ascii_lowercase())
        } else {
            self.entries.get(key)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
