//! Async collaborator sources.
//!
//! A collaborator (voice service socket, tracker worker, posture analyzer)
//! is wrapped as a [`SignalSource`] and pumped into the hub on its own tokio
//! task. The frame loop never awaits anything; only pumps do.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[async_trait]
pub trait SignalSource: Send + 'static {
    type Item: Send + 'static;

    /// Next snapshot, or `None` when the collaborator is finished.
    async fn next(&mut self) -> Option<Self::Item>;

    fn name(&self) -> &str {
        "source"
    }
}

/// Forward every item from `source` into `publish` until the source ends or
/// `publish` reports nobody is listening. Resolves to the number forwarded.
pub fn spawn_pump<S, F>(mut source: S, mut publish: F) -> JoinHandle<u64>
where
    S: SignalSource,
    F: FnMut(S::Item) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut forwarded = 0u64;
        while let Some(item) = source.next().await {
            forwarded += 1;
            if !publish(item) {
                tracing::debug!(
                    "[Inputs] {} pump stopping, orchestrator gone after {} items",
                    source.name(),
                    forwarded
                );
                return forwarded;
            }
        }
        tracing::debug!("[Inputs] {} exhausted after {} items", source.name(), forwarded);
        forwarded
    })
}

/// Source backed by an mpsc channel, for collaborators that already push.
pub struct ChannelSource<T> {
    name: String,
    rx: mpsc::Receiver<T>,
}

impl<T> ChannelSource<T> {
    pub fn new(name: &str, rx: mpsc::Receiver<T>) -> Self {
        Self {
            name: name.to_string(),
            rx,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> SignalSource for ChannelSource<T> {
    type Item = T;

    async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Plays back a fixed script: each item is emitted after its delay.
pub struct ScriptedSource<T> {
    name: String,
    steps: VecDeque<(Duration, T)>,
}

impl<T> ScriptedSource<T> {
    pub fn new(name: &str, steps: impl IntoIterator<Item = (Duration, T)>) -> Self {
        Self {
            name: name.to_string(),
            steps: steps.into_iter().collect(),
        }
    }

    /// Same item repeated `count` times at a fixed period.
    pub fn periodic(name: &str, period: Duration, count: usize, make: impl Fn(usize) -> T) -> Self {
        Self::new(name, (0..count).map(|i| (period, make(i))))
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl<T: Send + 'static> SignalSource for ScriptedSource<T> {
    type Item = T;

    async fn next(&mut self) -> Option<T> {
        let (delay, item) = self.steps.pop_front()?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Some(item)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::hub::{input_channel, HoldConfig, SignalInbox};
    use crate::inputs::snapshot::EmotionScore;

    #[tokio::test]
    async fn pump_forwards_until_exhausted() {
        let (tx, mut rx) = input_channel();
        let source = ScriptedSource::new(
            "emotion",
            vec![
                (Duration::ZERO, vec![EmotionScore::new("joy", 0.3)]),
                (Duration::ZERO, vec![EmotionScore::new("joy", 0.9)]),
            ],
        );
        let handle = spawn_pump(source, move |scores| tx.publish_emotions(scores));
        assert_eq!(handle.await.unwrap(), 2);

        let mut inbox = SignalInbox::new(&HoldConfig::default());
        inbox.pull(&mut rx);
        assert_eq!(inbox.emotion().unwrap().scores["joy"], 0.9);
    }

    #[tokio::test]
    async fn pump_stops_when_receivers_drop() {
        let (tx, rx) = input_channel();
        drop(rx);
        let source = ScriptedSource::periodic("audio", Duration::ZERO, 50, |_| vec![128u8; 16]);
        let handle = spawn_pump(source, move |bins| tx.publish_audio(bins));
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn channel_source_ends_with_sender() {
        let (tx, rx) = mpsc::channel(4);
        let mut source = ChannelSource::new("speech", rx);
        tx.send(1u32).await.unwrap();
        drop(tx);
        assert_eq!(source.next().await, Some(1));
        assert_eq!(source.next().await, None);
        assert_eq!(source.name(), "speech");
    }

    #[tokio::test]
    async fn scripted_source_respects_delays() {
        let mut source = ScriptedSource::new("t", vec![(Duration::from_millis(20), 'a')]);
        let start = tokio::time::Instant::now();
        assert_eq!(source.next().await, Some('a'));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(source.remaining(), 0);
    }
}
