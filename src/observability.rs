//! Frame observers: the one place the driver talks to the outside world
//! about what it is doing.

use crate::face::BlendSource;
use crate::orchestrator::FrameReport;
use crate::rig::RigIssue;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait FrameObserver: Send {
    fn on_frame(&mut self, _report: &FrameReport) {}
    fn on_issue(&mut self, _issue: &RigIssue) {}
}

/// Logs a summary every `every` frames plus clip transitions; each
/// structural issue is warned about once.
pub struct TracingObserver {
    every: u64,
    warned: HashSet<RigIssue>,
    last_source: BlendSource,
}

impl TracingObserver {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            warned: HashSet::new(),
            last_source: BlendSource::None,
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(300)
    }
}

impl FrameObserver for TracingObserver {
    fn on_frame(&mut self, r: &FrameReport) {
        if r.transitioned {
            tracing::debug!("[Avatar] frame {} clip transition to {:?}", r.frame, r.category);
        }
        if r.blend.source != self.last_source {
            tracing::trace!(
                "[Avatar] face source {:?} -> {:?}",
                self.last_source,
                r.blend.source
            );
            self.last_source = r.blend.source;
        }
        if r.frame % self.every == 0 {
            tracing::debug!(
                "[Avatar] frame {}: {:?} ({} layers), source {:?}, mouth {:.2}, blink {:.2}, stale {}, sanitized {}",
                r.frame,
                r.category,
                r.layers,
                r.blend.source,
                r.blend.lip_sync.mouth_open,
                r.blink,
                r.stale_sources,
                r.sanitized_inputs
            );
        }
    }

    fn on_issue(&mut self, issue: &RigIssue) {
        if self.warned.insert(issue.clone()) {
            tracing::warn!("[Avatar] {}", issue);
        }
    }
}

/// Counters a host can poll from another thread.
#[derive(Debug, Default)]
pub struct FrameMetrics {
    pub frames: AtomicU64,
    pub sanitized_inputs: AtomicU64,
    pub unknown_keys: AtomicU64,
    pub stale_drops: AtomicU64,
    pub clip_transitions: AtomicU64,
    pub issues: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub sanitized_inputs: u64,
    pub unknown_keys: u64,
    pub stale_drops: u64,
    pub clip_transitions: u64,
    pub issues: u64,
}

impl FrameMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, r: &FrameReport) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.sanitized_inputs
            .fetch_add(r.sanitized_inputs as u64, Ordering::Relaxed);
        self.unknown_keys
            .fetch_add(r.blend.new_unknown_keys as u64, Ordering::Relaxed);
        self.stale_drops
            .fetch_add(r.stale_sources as u64, Ordering::Relaxed);
        if r.transitioned {
            self.clip_transitions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            sanitized_inputs: self.sanitized_inputs.load(Ordering::Relaxed),
            unknown_keys: self.unknown_keys.load(Ordering::Relaxed),
            stale_drops: self.stale_drops.load(Ordering::Relaxed),
            clip_transitions: self.clip_transitions.load(Ordering::Relaxed),
            issues: self.issues.load(Ordering::Relaxed),
        }
    }
}

impl FrameObserver for Arc<FrameMetrics> {
    fn on_frame(&mut self, report: &FrameReport) {
        self.record(report);
    }

    fn on_issue(&mut self, _issue: &RigIssue) {
        self.issues.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forward to several observers in order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn FrameObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl FrameObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

impl FrameObserver for ObserverSet {
    fn on_frame(&mut self, report: &FrameReport) {
        for o in &mut self.observers {
            o.on_frame(report);
        }
    }

    fn on_issue(&mut self, issue: &RigIssue) {
        for o in &mut self.observers {
            o.on_issue(issue);
        }
    }
}
