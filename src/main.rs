//! Headless replay: drives one avatar on an in-memory rig at a fixed frame
//! rate from synthetic (or WAV-derived) producers, logging what happens.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin kokoro-avatar-replay -- --seconds 12 --wav hello.wav
//! ```

use clap::{Parser, ValueEnum};
use kokoro_avatar_rig_lib::audio::{load_wav_mono, SpectrumAnalyser};
use kokoro_avatar_rig_lib::inputs::{
    input_channel, spawn_pump, EmotionScore, HeadRotation, Lean, PostureSnapshot, ScriptedSource,
    SpeechEvent, TrackingFrame,
};
use kokoro_avatar_rig_lib::observability::{FrameMetrics, ObserverSet, TracingObserver};
use kokoro_avatar_rig_lib::orchestrator::FrameOrchestrator;
use kokoro_avatar_rig_lib::rig::{
    default_profile_path, load_profile, AvatarKind, Gender, MemoryRig,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Tracked,
    Coach,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GenderArg {
    Male,
    Female,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// How long to run, in seconds
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Frame rate of the simulated renderer
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Avatar profile JSON (defaults to the per-user profile)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Override the profile's avatar kind
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Override the profile's body variant
    #[arg(long, value_enum)]
    gender: Option<GenderArg>,

    /// Drive lip sync from this WAV file instead of synthetic bins
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Seed blink timing and clip choice
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kokoro_avatar_rig_lib=debug".into()),
        )
        .init();

    let args = Args::parse();
    let fps = args.fps.clamp(10, 240);
    let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
    let total_frames = (args.seconds.max(0.0) * fps as f32) as u64;

    let mut profile = load_profile(&args.profile.clone().unwrap_or_else(default_profile_path));
    if let Some(kind) = args.kind {
        profile.kind = match kind {
            KindArg::Tracked => AvatarKind::Tracked,
            KindArg::Coach => AvatarKind::Coach,
        };
    }
    if let Some(gender) = args.gender {
        profile.gender = match gender {
            GenderArg::Male => Gender::Male,
            GenderArg::Female => Gender::Female,
        };
    }
    let every = profile.summary_every_frames;
    let kind = profile.kind;

    let metrics = FrameMetrics::new();
    let (tx, rx) = input_channel();
    let rig = MemoryRig::standard_avatar();
    let orchestrator = match args.seed {
        Some(seed) => FrameOrchestrator::new_seeded(rig, profile, seed)?,
        None => FrameOrchestrator::new(rig, profile)?,
    };
    let mut orchestrator = orchestrator.with_inputs(rx).with_observer(
        ObserverSet::new()
            .with(TracingObserver::new(every))
            .with(metrics.clone()),
    );

    let mut pumps = Vec::new();

    // Speech windows and the audio that goes with them.
    let (speech, audio) = match &args.wav {
        Some(path) => {
            let (samples, rate) = load_wav_mono(path)?;
            tracing::info!(
                "[Replay] {} samples at {} Hz from {}",
                samples.len(),
                rate,
                path.display()
            );
            wav_script(&samples, rate, frame_dt)
        }
        None => synthetic_script(args.seconds, frame_dt),
    };
    let speech_tx = tx.clone();
    pumps.push(spawn_pump(ScriptedSource::new("speech", speech), move |e| {
        speech_tx.publish_speech(e)
    }));
    let audio_tx = tx.clone();
    pumps.push(spawn_pump(ScriptedSource::new("audio", audio), move |bins| {
        audio_tx.publish_audio(bins)
    }));

    let emotion_tx = tx.clone();
    let moods = [("joy", 0.8), ("surprise", 0.6), ("sadness", 0.5), ("joy", 0.4)];
    let emotion_count = (args.seconds / 2.5).ceil() as usize;
    pumps.push(spawn_pump(
        ScriptedSource::periodic("emotion", Duration::from_millis(2500), emotion_count, |i| {
            let (name, score) = moods[i % moods.len()];
            vec![EmotionScore::new(name, score)]
        }),
        move |scores| emotion_tx.publish_emotions(scores),
    ));

    if kind == AvatarKind::Tracked {
        let tracking_tx = tx.clone();
        let period = Duration::from_millis(33);
        let count = (args.seconds / 0.033) as usize;
        pumps.push(spawn_pump(
            ScriptedSource::periodic("tracking", period, count, |i| {
                let t = i as f32 * 0.033;
                let mut expressions = HashMap::new();
                expressions.insert("mouthSmile".to_string(), 0.3 + 0.2 * (t * 0.7).sin());
                expressions.insert("browInnerUp".to_string(), 0.2);
                TrackingFrame::new(
                    expressions,
                    Some(HeadRotation::new(0.1 * (t * 0.9).sin(), 0.3 * (t * 0.5).sin(), 0.0)),
                )
            }),
            move |frame| tracking_tx.publish_tracking(frame),
        ));
    }

    let posture_tx = tx.clone();
    pumps.push(spawn_pump(
        ScriptedSource::new(
            "posture",
            vec![(
                Duration::from_millis(500),
                PostureSnapshot {
                    openness: 70.0,
                    confidence_score: 65.0,
                    shoulder_alignment: 85.0,
                    leaning: Lean::Left,
                },
            )],
        ),
        move |p| posture_tx.publish_posture(p),
    ));
    drop(tx);

    let mut interval = tokio::time::interval(frame_dt);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last = Instant::now();
    for _ in 0..total_frames {
        interval.tick().await;
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;
        orchestrator.advance(dt);
    }

    let id = orchestrator.id();
    let rig = orchestrator.stop();
    let forwarded: u64 = futures::future::join_all(pumps)
        .await
        .into_iter()
        .filter_map(Result::ok)
        .sum();

    let m = metrics.snapshot();
    tracing::info!(
        "[Replay] {} done: {} frames, {} snapshots forwarded, {} transitions, {} stale drops, {} sanitized, {} unknown keys",
        id,
        m.frames,
        forwarded,
        m.clip_transitions,
        m.stale_drops,
        m.sanitized_inputs,
        m.unknown_keys
    );
    tracing::info!(
        "[Replay] final: jawOpen={:.3} mouthSmileLeft={:.3} head={:?} root={:?}",
        rig.influence("jawOpen").unwrap_or(0.0),
        rig.influence("mouthSmileLeft").unwrap_or(0.0),
        rig.rotation_of("mixamorig:Head"),
        rig.root()
    );
    Ok(())
}

type SpeechScript = Vec<(Duration, SpeechEvent)>;
type AudioScript = Vec<(Duration, Vec<u8>)>;

/// Talk for the whole file, one analyser frame per render frame.
fn wav_script(samples: &[f32], rate: u32, frame_dt: Duration) -> (SpeechScript, AudioScript) {
    let mut analyser = SpectrumAnalyser::new(512);
    let hop = ((rate as f32 * frame_dt.as_secs_f32()) as usize).max(1);
    let mut audio = Vec::new();
    let mut end = hop;
    while end <= samples.len() {
        audio.push((frame_dt, analyser.process(&samples[..end])));
        end += hop;
    }
    let length = Duration::from_secs_f32(samples.len() as f32 / rate.max(1) as f32);
    let speech = vec![
        (Duration::ZERO, SpeechEvent::Started),
        (length, SpeechEvent::Ended),
    ];
    (speech, audio)
}

/// Two utterances with a syllable-rate envelope over a speech-like spectrum.
fn synthetic_script(seconds: f32, frame_dt: Duration) -> (SpeechScript, AudioScript) {
    let windows = [(1.0f32, 3.5f32), (5.5, 8.0)];
    let mut speech = Vec::new();
    let mut cursor = 0.0f32;
    for &(start, end) in windows.iter().filter(|(s, _)| *s < seconds) {
        speech.push((Duration::from_secs_f32(start - cursor), SpeechEvent::Started));
        speech.push((Duration::from_secs_f32(end - start), SpeechEvent::Ended));
        cursor = end;
    }

    let step = frame_dt.as_secs_f32();
    let frames = (seconds / step) as usize;
    let audio = (0..frames)
        .map(|i| {
            let t = i as f32 * step;
            let speaking = windows.iter().any(|&(s, e)| t >= s && t < e);
            let envelope = if speaking {
                (0.5 + 0.5 * (t * 2.0 * std::f32::consts::PI * 4.0).sin()).max(0.0)
            } else {
                0.0
            };
            let bins = (0..256)
                .map(|b| {
                    let shape = if b < 12 { 1.0 } else { 12.0 / b as f32 };
                    (220.0 * envelope * shape) as u8
                })
                .collect();
            (frame_dt, bins)
        })
        .collect();
    (speech, audio)
}
