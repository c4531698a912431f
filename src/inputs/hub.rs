//! Latest-value input hub.
//!
//! Producers (voice service, tracker, posture analyzer, audio thread) run on
//! their own schedules. Each gets a `watch` sender: publishing overwrites the
//! previous snapshot, nothing queues, and the frame loop reads whatever is
//! newest without ever waiting. Intermediate snapshots between two frames are
//! dropped by construction.

use super::snapshot::{
    EmotionFrame, EmotionScore, MagnitudeBuffer, PostureSnapshot, SpeechEvent, TrackingFrame,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

type Slot<T> = Option<Arc<T>>;

/// Producer side. Cheap to clone; hand one to each collaborator task.
#[derive(Clone)]
pub struct InputPublishers {
    emotion: Arc<watch::Sender<Slot<EmotionFrame>>>,
    tracking: Arc<watch::Sender<Slot<TrackingFrame>>>,
    audio: Arc<watch::Sender<Slot<MagnitudeBuffer>>>,
    posture: Arc<watch::Sender<Slot<PostureSnapshot>>>,
    speaking: Arc<watch::Sender<bool>>,
}

/// Consumer side, owned by the frame orchestrator.
pub struct InputReceivers {
    emotion: watch::Receiver<Slot<EmotionFrame>>,
    tracking: watch::Receiver<Slot<TrackingFrame>>,
    audio: watch::Receiver<Slot<MagnitudeBuffer>>,
    posture: watch::Receiver<Slot<PostureSnapshot>>,
    speaking: watch::Receiver<bool>,
}

/// Create a connected publisher/receiver pair with every slot empty.
pub fn input_channel() -> (InputPublishers, InputReceivers) {
    let (emotion_tx, emotion_rx) = watch::channel(None);
    let (tracking_tx, tracking_rx) = watch::channel(None);
    let (audio_tx, audio_rx) = watch::channel(None);
    let (posture_tx, posture_rx) = watch::channel(None);
    let (speaking_tx, speaking_rx) = watch::channel(false);
    (
        InputPublishers {
            emotion: Arc::new(emotion_tx),
            tracking: Arc::new(tracking_tx),
            audio: Arc::new(audio_tx),
            posture: Arc::new(posture_tx),
            speaking: Arc::new(speaking_tx),
        },
        InputReceivers {
            emotion: emotion_rx,
            tracking: tracking_rx,
            audio: audio_rx,
            posture: posture_rx,
            speaking: speaking_rx,
        },
    )
}

impl InputPublishers {
    /// Each `publish_*` returns `false` once the orchestrator is gone.
    pub fn publish_emotions(&self, scores: Vec<EmotionScore>) -> bool {
        self.publish_emotion_frame(EmotionFrame::from_scores(scores))
    }

    pub fn publish_emotion_frame(&self, frame: EmotionFrame) -> bool {
        self.emotion.send_replace(Some(Arc::new(frame)));
        !self.emotion.is_closed()
    }

    pub fn clear_emotions(&self) {
        self.emotion.send_replace(None);
    }

    pub fn publish_tracking(&self, frame: TrackingFrame) -> bool {
        self.tracking.send_replace(Some(Arc::new(frame.normalized())));
        !self.tracking.is_closed()
    }

    /// Tracker lost the face.
    pub fn clear_tracking(&self) {
        self.tracking.send_replace(None);
    }

    pub fn publish_audio(&self, bins: MagnitudeBuffer) -> bool {
        self.audio.send_replace(Some(Arc::new(bins)));
        !self.audio.is_closed()
    }

    pub fn clear_audio(&self) {
        self.audio.send_replace(None);
    }

    pub fn publish_posture(&self, posture: PostureSnapshot) -> bool {
        self.posture.send_replace(Some(Arc::new(posture)));
        !self.posture.is_closed()
    }

    pub fn publish_speech(&self, event: SpeechEvent) -> bool {
        self.speaking.send_replace(event == SpeechEvent::Started);
        !self.speaking.is_closed()
    }
}

/// Staleness limits, in seconds of frame time since the snapshot arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldConfig {
    #[serde(default = "default_emotion_hold")]
    pub emotion_hold_secs: f32,
    #[serde(default = "default_tracking_hold")]
    pub tracking_hold_secs: f32,
    #[serde(default = "default_audio_hold")]
    pub audio_hold_secs: f32,
    #[serde(default = "default_posture_hold")]
    pub posture_hold_secs: f32,
}

fn default_emotion_hold() -> f32 {
    4.0
}
fn default_tracking_hold() -> f32 {
    0.5
}
fn default_audio_hold() -> f32 {
    0.25
}
fn default_posture_hold() -> f32 {
    5.0
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            emotion_hold_secs: default_emotion_hold(),
            tracking_hold_secs: default_tracking_hold(),
            audio_hold_secs: default_audio_hold(),
            posture_hold_secs: default_posture_hold(),
        }
    }
}

impl HoldConfig {
    pub fn sanitized(mut self) -> Self {
        let fix = |v: f32, d: f32| if v.is_finite() && v > 0.0 { v } else { d };
        self.emotion_hold_secs = fix(self.emotion_hold_secs, default_emotion_hold());
        self.tracking_hold_secs = fix(self.tracking_hold_secs, default_tracking_hold());
        self.audio_hold_secs = fix(self.audio_hold_secs, default_audio_hold());
        self.posture_hold_secs = fix(self.posture_hold_secs, default_posture_hold());
        self
    }
}

#[derive(Debug)]
struct Held<T> {
    value: Slot<T>,
    age: f32,
    limit: f32,
    label: &'static str,
}

impl<T> Held<T> {
    fn new(limit: f32, label: &'static str) -> Self {
        Self {
            value: None,
            age: 0.0,
            limit,
            label,
        }
    }

    fn replace(&mut self, value: Slot<T>) {
        self.value = value;
        self.age = 0.0;
    }

    /// Advance age; true on the frame the snapshot crosses its hold limit.
    fn tick(&mut self, dt: f32) -> bool {
        let was_fresh = self.age <= self.limit;
        self.age += dt;
        let expired = self.value.is_some() && was_fresh && self.age > self.limit;
        if expired {
            tracing::debug!(
                "[Inputs] {} snapshot stale after {:.2}s, decaying to neutral",
                self.label,
                self.age
            );
        }
        expired
    }

    fn get(&self) -> Option<&T> {
        if self.age > self.limit {
            return None;
        }
        self.value.as_deref()
    }
}

/// The orchestrator's view of the latest inputs, with per-source staleness.
#[derive(Debug)]
pub struct SignalInbox {
    emotion: Held<EmotionFrame>,
    tracking: Held<TrackingFrame>,
    audio: Held<MagnitudeBuffer>,
    posture: Held<PostureSnapshot>,
    speaking: bool,
}

impl SignalInbox {
    pub fn new(hold: &HoldConfig) -> Self {
        Self {
            emotion: Held::new(hold.emotion_hold_secs, "Emotion"),
            tracking: Held::new(hold.tracking_hold_secs, "Tracking"),
            audio: Held::new(hold.audio_hold_secs, "Audio"),
            posture: Held::new(hold.posture_hold_secs, "Posture"),
            speaking: false,
        }
    }

    /// Copy in whatever the producers published since the last pull.
    /// Returns how many slots changed.
    pub fn pull(&mut self, rx: &mut InputReceivers) -> usize {
        let mut changed = 0;
        if rx.emotion.has_changed().unwrap_or(false) {
            self.emotion.replace(rx.emotion.borrow_and_update().clone());
            changed += 1;
        }
        if rx.tracking.has_changed().unwrap_or(false) {
            self.tracking.replace(rx.tracking.borrow_and_update().clone());
            changed += 1;
        }
        if rx.audio.has_changed().unwrap_or(false) {
            self.audio.replace(rx.audio.borrow_and_update().clone());
            changed += 1;
        }
        if rx.posture.has_changed().unwrap_or(false) {
            self.posture.replace(rx.posture.borrow_and_update().clone());
            changed += 1;
        }
        if rx.speaking.has_changed().unwrap_or(false) {
            self.speaking = *rx.speaking.borrow_and_update();
            changed += 1;
        }
        changed
    }

    /// Age every snapshot by `dt`. Returns how many went stale this frame.
    pub fn tick(&mut self, dt: f32) -> u32 {
        [
            self.emotion.tick(dt),
            self.tracking.tick(dt),
            self.audio.tick(dt),
            self.posture.tick(dt),
        ]
        .iter()
        .filter(|&&s| s)
        .count() as u32
    }

    pub fn set_emotion(&mut self, frame: Option<EmotionFrame>) {
        self.emotion.replace(frame.map(Arc::new));
    }

    pub fn set_tracking(&mut self, frame: Option<TrackingFrame>) {
        self.tracking.replace(frame.map(|f| Arc::new(f.normalized())));
    }

    pub fn set_audio(&mut self, bins: Option<MagnitudeBuffer>) {
        self.audio.replace(bins.map(Arc::new));
    }

    pub fn set_posture(&mut self, posture: Option<PostureSnapshot>) {
        self.posture.replace(posture.map(Arc::new));
    }

    pub fn set_speaking(&mut self, speaking: bool) {
        self.speaking = speaking;
    }

    pub fn emotion(&self) -> Option<&EmotionFrame> {
        self.emotion.get()
    }

    pub fn tracking(&self) -> Option<&TrackingFrame> {
        self.tracking.get()
    }

    /// Present only while fresh and non-empty.
    pub fn audio(&self) -> Option<&[u8]> {
        self.audio
            .get()
            .map(|b| b.as_slice())
            .filter(|b| !b.is_empty())
    }

    pub fn posture(&self) -> Option<&PostureSnapshot> {
        self.posture.get()
    }

    pub fn speaking(&self) -> bool {
        self.speaking
    }
}
