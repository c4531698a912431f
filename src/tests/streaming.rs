use super::helpers::*;
use crate::inputs::{
    input_channel, spawn_pump, ChannelSource, EmotionScore, ScriptedSource, SpeechEvent,
};
use crate::motion::ClipCategory;
use crate::observability::FrameMetrics;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn pumped_emotions_reach_the_face() {
    let (tx, rx) = input_channel();
    let mut o = tracked_avatar(30).with_inputs(rx);

    let source = ScriptedSource::new(
        "emotion",
        vec![
            (Duration::ZERO, vec![EmotionScore::new("sadness", 0.8)]),
            (Duration::ZERO, vec![EmotionScore::new("joy", 0.6)]),
        ],
    );
    let pump = spawn_pump(source, move |scores| tx.publish_emotions(scores));
    assert_eq!(pump.await.unwrap(), 2);

    run(&mut o, 180);
    let smile = o.rig().influence("mouthSmileLeft").unwrap();
    assert!((smile - 0.6).abs() < 1e-2, "smile {}", smile);
    // The sadness snapshot was overwritten before any frame ran.
    assert_eq!(o.rig().influence("mouthFrownLeft"), Some(0.0));
}

#[tokio::test]
async fn speech_events_switch_clip_category() {
    let (tx, rx) = input_channel();
    let mut o = tracked_avatar(31).with_inputs(rx);
    let (event_tx, event_rx) = mpsc::channel(8);
    let pump = spawn_pump(ChannelSource::new("speech", event_rx), move |e: SpeechEvent| {
        tx.publish_speech(e)
    });

    event_tx.send(SpeechEvent::Started).await.unwrap();
    tokio::task::yield_now().await;
    let mut report = o.advance(DT);
    for _ in 0..10 {
        if report.category == ClipCategory::Talking {
            break;
        }
        tokio::task::yield_now().await;
        report = o.advance(DT);
    }
    assert_eq!(report.category, ClipCategory::Talking);

    event_tx.send(SpeechEvent::Ended).await.unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
        report = o.advance(DT);
        if report.category == ClipCategory::Idle {
            break;
        }
    }
    assert_eq!(report.category, ClipCategory::Idle);

    drop(event_tx);
    assert_eq!(pump.await.unwrap(), 2);
}

#[tokio::test]
async fn streamed_audio_moves_mouth_then_clears() {
    let (tx, rx) = input_channel();
    let mut o = tracked_avatar(32).with_inputs(rx);
    tx.publish_speech(SpeechEvent::Started);

    for _ in 0..10 {
        assert!(tx.publish_audio(speech_buffer(128)));
        o.advance(DT);
    }
    let open = o.rig().influence("mouthOpen").unwrap();
    assert!(open > 0.3 && open <= 0.4 + 1e-6, "mouthOpen {}", open);

    tx.clear_audio();
    run(&mut o, 30);
    assert!(o.rig().influence("mouthOpen").unwrap() < 0.01);
}

#[tokio::test]
async fn pumps_wind_down_once_the_orchestrator_stops() {
    let (tx, rx) = input_channel();
    let metrics = FrameMetrics::new();
    let mut o = tracked_avatar(33)
        .with_inputs(rx)
        .with_observer(metrics.clone());

    let source = ScriptedSource::periodic("tracking", Duration::from_millis(1), 10_000, |i| {
        tracking(&[("mouthSmile", (i % 10) as f32 / 10.0)], None)
    });
    let pump = spawn_pump(source, move |frame| tx.publish_tracking(frame));

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        o.advance(DT);
    }
    assert_eq!(metrics.snapshot().frames, 5);

    let rig = o.stop();
    assert!(rig.morph_writes() > 0);
    let forwarded = pump.await.unwrap();
    assert!(forwarded < 10_000, "pump kept running after stop: {}", forwarded);
}
