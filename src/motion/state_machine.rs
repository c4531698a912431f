//! Animation Clip State Machine — Idle/Talking with crossfades.
//!
//! At most two clips play at once, and only inside a fade window. The
//! transition and advance logic lives in pure functions over
//! [`AnimationState`]; [`AnimationStateMachine`] just owns the state, the
//! library and the RNG used for variant choice.

use super::clips::{ClipCategory, ClipLibrary};
use crate::utils::{finite_or, sanitize_dt};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_fade")]
    pub fade_secs: f32,
    #[serde(default = "default_idle_rate")]
    pub idle_rate: f32,
    #[serde(default = "default_talking_rate")]
    pub talking_rate: f32,
    /// Talking clips loop instead of being re-picked when they end.
    #[serde(default)]
    pub talking_loops: bool,
}

fn default_fade() -> f32 {
    0.4
}
fn default_idle_rate() -> f32 {
    0.5
}
fn default_talking_rate() -> f32 {
    0.6
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fade_secs: default_fade(),
            idle_rate: default_idle_rate(),
            talking_rate: default_talking_rate(),
            talking_loops: false,
        }
    }
}

impl AnimationConfig {
    /// Fade within 0.3–0.5 s, playback rate within 0.3–0.8x.
    pub fn sanitized(mut self) -> Self {
        self.fade_secs = finite_or(self.fade_secs, default_fade()).clamp(0.3, 0.5);
        self.idle_rate = finite_or(self.idle_rate, default_idle_rate()).clamp(0.3, 0.8);
        self.talking_rate = finite_or(self.talking_rate, default_talking_rate()).clamp(0.3, 0.8);
        self
    }

    fn rate(&self, category: ClipCategory) -> f32 {
        match category {
            ClipCategory::Idle => self.idle_rate,
            ClipCategory::Talking => self.talking_rate,
        }
    }
}

/// One clip being played by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClipLayer {
    /// Index into the [`ClipLibrary`].
    pub clip: usize,
    /// Index into the rig's clip asset list.
    pub asset_index: usize,
    pub weight: f32,
    /// Local clip time in seconds.
    pub time: f32,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationState {
    pub category: ClipCategory,
    pub active: ClipLayer,
    pub previous: Option<ClipLayer>,
    /// Weights the two layers had when the fade began. They sum to 1, so
    /// the blend stays at full weight throughout.
    pub active_start_weight: f32,
    pub previous_start_weight: f32,
    pub fade_elapsed: f32,
    pub fade_duration: f32,
}

impl AnimationState {
    pub fn is_settled(&self) -> bool {
        self.previous.is_none()
    }

    /// Layers with non-zero weight, active first.
    pub fn layers(&self) -> impl Iterator<Item = &ClipLayer> {
        std::iter::once(&self.active).chain(self.previous.iter())
    }
}

/// Pick the clip for `category`. Talking never repeats `last` when there is a choice.
pub fn choose_clip<R: Rng + ?Sized>(
    library: &ClipLibrary,
    category: ClipCategory,
    last: Option<usize>,
    rng: &mut R,
) -> usize {
    match category {
        ClipCategory::Idle => library.idle_index(),
        ClipCategory::Talking => {
            let variants = library.talking_variants();
            match variants.len() {
                0 => library.idle_index(),
                1 => variants[0],
                n => {
                    let pool: Vec<usize> = variants
                        .iter()
                        .copied()
                        .filter(|&v| Some(v) != last)
                        .collect();
                    if pool.is_empty() {
                        variants[rng.gen_range(0..n)]
                    } else {
                        pool[rng.gen_range(0..pool.len())]
                    }
                }
            }
        }
    }
}

/// True when `clip` is what `category` would play.
fn plays_for(library: &ClipLibrary, category: ClipCategory, clip: usize) -> bool {
    match category {
        ClipCategory::Idle => clip == library.idle_index(),
        ClipCategory::Talking if library.has_talking() => library.talking_variants().contains(&clip),
        ClipCategory::Talking => clip == library.idle_index(),
    }
}

/// Start a crossfade from whatever is playing to `clip`.
///
/// Mid-fade, the stronger of the two current layers becomes the outgoing
/// one and `clip` takes over the weaker layer's weight, so nothing pops.
pub fn begin_transition(
    state: AnimationState,
    library: &ClipLibrary,
    category: ClipCategory,
    clip: usize,
    config: &AnimationConfig,
) -> AnimationState {
    let asset_index = library.get(clip).map_or(0, |c| c.asset_index);
    let (outgoing, incoming_weight) = match state.previous {
        Some(prev) if prev.weight > state.active.weight => (prev, state.active.weight),
        Some(prev) => (state.active, prev.weight),
        None => (state.active, 0.0),
    };
    AnimationState {
        category,
        active: ClipLayer {
            clip,
            asset_index,
            weight: incoming_weight,
            time: 0.0,
            rate: config.rate(category),
        },
        previous: Some(outgoing),
        active_start_weight: incoming_weight,
        previous_start_weight: outgoing.weight,
        fade_elapsed: 0.0,
        fade_duration: config.fade_secs,
    }
}

/// Turn a fade around: the layer that was fading out comes back with its
/// weight and clip time, and the layer that was fading in leaves.
pub fn reverse_transition(state: AnimationState, category: ClipCategory) -> AnimationState {
    let Some(returning) = state.previous else {
        return state;
    };
    AnimationState {
        category,
        active: returning,
        previous: Some(state.active),
        active_start_weight: returning.weight,
        previous_start_weight: state.active.weight,
        fade_elapsed: 0.0,
        fade_duration: state.fade_duration,
    }
}

/// Advance clip time and fade weights by `dt`.
pub fn advance_state(state: AnimationState, library: &ClipLibrary, dt: f32) -> AnimationState {
    let dt = sanitize_dt(dt);
    let step_layer = |mut layer: ClipLayer| {
        layer.time += dt * layer.rate;
        if let Some(clip) = library.get(layer.clip) {
            if let Some(d) = clip.duration_hint {
                layer.time = if clip.looping {
                    layer.time % d
                } else {
                    layer.time.min(d)
                };
            }
        }
        layer
    };

    let mut next = state;
    next.active = step_layer(state.active);
    next.previous = state.previous.map(step_layer);

    if next.previous.is_some() {
        next.fade_elapsed += dt;
        let w = if next.fade_duration > 0.0 {
            (next.fade_elapsed / next.fade_duration).min(1.0)
        } else {
            1.0
        };
        if w >= 1.0 {
            next.active.weight = 1.0;
            next.previous = None;
            next.active_start_weight = 1.0;
            next.previous_start_weight = 0.0;
        } else {
            next.active.weight = next.active_start_weight + (1.0 - next.active_start_weight) * w;
            if let Some(prev) = next.previous.as_mut() {
                prev.weight = next.previous_start_weight * (1.0 - w);
            }
        }
    } else {
        next.active.weight = 1.0;
    }
    next
}

pub struct AnimationStateMachine<R: Rng> {
    library: ClipLibrary,
    config: AnimationConfig,
    state: AnimationState,
    last_talking: Option<usize>,
    rng: R,
    transitions: u64,
}

impl<R: Rng> AnimationStateMachine<R> {
    /// Starts settled on the idle clip at full weight.
    pub fn new(library: ClipLibrary, config: AnimationConfig, rng: R) -> Self {
        let config = config.sanitized();
        let idle = library.idle_index();
        let asset_index = library.get(idle).map_or(0, |c| c.asset_index);
        let state = AnimationState {
            category: ClipCategory::Idle,
            active: ClipLayer {
                clip: idle,
                asset_index,
                weight: 1.0,
                time: 0.0,
                rate: config.idle_rate,
            },
            previous: None,
            active_start_weight: 1.0,
            previous_start_weight: 0.0,
            fade_elapsed: 0.0,
            fade_duration: config.fade_secs,
        };
        Self {
            library,
            config,
            state,
            last_talking: None,
            rng,
            transitions: 0,
        }
    }

    /// Ask for a category. Re-requesting the current one is a no-op unless
    /// the active clip has run out. Asking for the category that is still
    /// fading out reverses the fade. Returns whether a transition started.
    pub fn request(&mut self, category: ClipCategory) -> bool {
        if category == self.state.category && !self.active_finished() {
            return false;
        }
        if let Some(prev) = self.state.previous {
            if category != self.state.category && plays_for(&self.library, category, prev.clip) {
                tracing::debug!(
                    "[Anim] {:?} -> {:?} (resuming {})",
                    self.state.category,
                    category,
                    self.library.get(prev.clip).map_or("?", |c| c.name.as_str())
                );
                self.state = reverse_transition(self.state, category);
                self.transitions += 1;
                return true;
            }
        }
        let clip = choose_clip(&self.library, category, self.last_talking, &mut self.rng);
        if category == ClipCategory::Talking && self.library.has_talking() {
            self.last_talking = Some(clip);
        }
        tracing::debug!(
            "[Anim] {:?} -> {:?} ({})",
            self.state.category,
            category,
            self.library.get(clip).map_or("?", |c| c.name.as_str())
        );
        self.state = begin_transition(self.state, &self.library, category, clip, &self.config);
        self.transitions += 1;
        true
    }

    pub fn advance(&mut self, dt: f32) -> &AnimationState {
        self.state = advance_state(self.state, &self.library, dt);
        &self.state
    }

    pub fn active_finished(&self) -> bool {
        self.library
            .get(self.state.active.clip)
            .map_or(false, |c| c.is_finished_at(self.state.active.time))
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn category(&self) -> ClipCategory {
        self.state.category
    }

    pub fn layers(&self) -> Vec<ClipLayer> {
        self.state.layers().copied().collect()
    }

    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::clips::ClipAsset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn library(talking: usize) -> ClipLibrary {
        let mut assets = vec![ClipAsset::new("M_Idle", 4.0)];
        for i in 0..talking {
            assets.push(ClipAsset::new(&format!("M_Talking_{}", i), 3.0));
        }
        ClipLibrary::from_assets(&assets, Some("M_"), false).unwrap()
    }

    fn machine(talking: usize, seed: u64) -> AnimationStateMachine<StdRng> {
        AnimationStateMachine::new(
            library(talking),
            AnimationConfig::default(),
            StdRng::seed_from_u64(seed),
        )
    }

    fn full_weight_layers(m: &AnimationStateMachine<StdRng>) -> usize {
        m.layers().iter().filter(|l| l.weight >= 1.0).count()
    }

    #[test]
    fn starts_settled_on_idle() {
        let m = machine(3, 1);
        assert!(m.state().is_settled());
        assert_eq!(m.category(), ClipCategory::Idle);
        assert_eq!(full_weight_layers(&m), 1);
    }

    #[test]
    fn idle_talking_idle_settles_with_one_full_clip() {
        let mut m = machine(3, 2);
        assert!(m.request(ClipCategory::Talking));
        let mut frames_in_fade = 0;
        for _ in 0..60 {
            let s = m.advance(DT);
            if !s.is_settled() {
                frames_in_fade += 1;
                let both_full = s.layers().filter(|l| l.weight >= 1.0).count();
                assert_eq!(both_full, 0, "two clips at full weight mid-fade");
            }
        }
        // 0.4 s fade at 60 Hz
        assert!((23..=25).contains(&frames_in_fade), "fade took {} frames", frames_in_fade);
        assert!(m.request(ClipCategory::Idle));
        for _ in 0..60 {
            m.advance(DT);
        }
        assert!(m.state().is_settled());
        assert_eq!(m.layers().len(), 1);
        assert_eq!(full_weight_layers(&m), 1);
    }

    #[test]
    fn reentering_same_state_is_noop() {
        let mut m = machine(2, 3);
        assert!(!m.request(ClipCategory::Idle));
        assert!(m.request(ClipCategory::Talking));
        assert!(!m.request(ClipCategory::Talking));
        assert_eq!(m.transitions(), 1);
    }

    #[test]
    fn finished_talking_clip_is_repicked() {
        let mut m = machine(2, 4);
        m.request(ClipCategory::Talking);
        let first = m.state().active.clip;
        // 3 s clip at 0.6x runs 5 s.
        for _ in 0..(5 * 60 + 10) {
            m.advance(DT);
        }
        assert!(m.active_finished());
        assert!(m.request(ClipCategory::Talking));
        assert_ne!(m.state().active.clip, first);
    }

    #[test]
    fn consecutive_talking_never_repeats() {
        for seed in 0..20 {
            let mut m = machine(3, seed);
            let mut last = None;
            for _ in 0..30 {
                m.request(ClipCategory::Talking);
                let clip = m.state().active.clip;
                assert_ne!(Some(clip), last, "seed {} repeated variant {}", seed, clip);
                last = Some(clip);
                m.request(ClipCategory::Idle);
                for _ in 0..30 {
                    m.advance(DT);
                }
            }
        }
    }

    #[test]
    fn single_variant_is_allowed_to_repeat() {
        let mut m = machine(1, 5);
        m.request(ClipCategory::Talking);
        let a = m.state().active.clip;
        m.request(ClipCategory::Idle);
        m.request(ClipCategory::Talking);
        assert_eq!(m.state().active.clip, a);
    }

    #[test]
    fn no_talking_clips_falls_back_to_idle() {
        let mut m = machine(0, 6);
        m.request(ClipCategory::Talking);
        assert_eq!(m.state().active.clip, m.library().idle_index());
        assert_eq!(m.category(), ClipCategory::Talking);
    }

    fn total_weight(s: &AnimationState) -> f32 {
        s.layers().map(|l| l.weight).sum()
    }

    #[test]
    fn interrupted_fade_reverses_without_a_pop() {
        let mut m = machine(2, 7);
        m.request(ClipCategory::Talking);
        for _ in 0..10 {
            m.advance(DT);
        }
        let before = *m.state();
        let idle_before = before.previous.unwrap();
        assert!((total_weight(&before) - 1.0).abs() < 1e-4);

        assert!(m.request(ClipCategory::Idle));
        let s = *m.advance(DT);
        assert_eq!(s.layers().count(), 2);
        assert!(
            (total_weight(&s) - 1.0).abs() < 0.1,
            "blend weight jumped from {} to {}",
            total_weight(&before),
            total_weight(&s)
        );
        // The idle clip resumes where it was, not from zero.
        assert_eq!(s.active.clip, idle_before.clip);
        assert!(s.active.weight >= idle_before.weight, "{} < {}", s.active.weight, idle_before.weight);
        assert!(s.active.time > idle_before.time);
        assert_eq!(s.previous.unwrap().clip, before.active.clip);

        for _ in 0..60 {
            let s = *m.advance(DT);
            assert!((total_weight(&s) - 1.0).abs() < 1e-4, "sum {}", total_weight(&s));
        }
        assert!(m.state().is_settled());
        assert_eq!(m.state().active.clip, m.library().idle_index());
    }

    #[test]
    fn interrupt_to_a_new_clip_keeps_total_weight() {
        let lib = library(3);
        let config = AnimationConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        let idle = lib.idle_index();
        let start =
            *AnimationStateMachine::new(lib.clone(), config.clone(), StdRng::seed_from_u64(1)).state();
        let talk_a = choose_clip(&lib, ClipCategory::Talking, None, &mut rng);
        let mut s = begin_transition(start, &lib, ClipCategory::Talking, talk_a, &config);
        for _ in 0..15 {
            s = advance_state(s, &lib, DT);
        }
        let talk_b = choose_clip(&lib, ClipCategory::Talking, Some(talk_a), &mut rng);
        let stronger = if s.active.weight > s.previous.unwrap().weight {
            s.active.clip
        } else {
            idle
        };
        let s = begin_transition(s, &lib, ClipCategory::Talking, talk_b, &config);
        assert!((total_weight(&s) - 1.0).abs() < 1e-4, "sum {}", total_weight(&s));
        assert_eq!(s.previous.unwrap().clip, stronger);
        let s = advance_state(s, &lib, DT);
        assert!((total_weight(&s) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn idle_loops_forever() {
        let mut m = machine(1, 8);
        for _ in 0..(20 * 60) {
            m.advance(DT);
        }
        assert!(!m.active_finished());
        assert!(m.state().active.time < 4.0);
    }

    #[test]
    fn rates_are_clamped() {
        let c = AnimationConfig {
            idle_rate: 2.0,
            talking_rate: 0.0,
            fade_secs: 3.0,
            ..AnimationConfig::default()
        }
        .sanitized();
        assert_eq!(c.idle_rate, 0.8);
        assert_eq!(c.talking_rate, 0.3);
        assert_eq!(c.fade_secs, 0.5);
    }
}
