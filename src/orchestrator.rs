//! Frame Orchestrator — one avatar instance, advanced once per rendered frame.
//!
//! Fixed order every frame: inputs, mixer, blink, blender, head, posture,
//! then all writes to the rig. Nothing here blocks, awaits or spawns; the
//! host's frame callback drives it. Producers publish through the input hub
//! (or the direct setters) and are read as latest-value snapshots.

use crate::face::{BlendInputs, BlendReport, ChannelBlender, BlinkSynthesizer};
use crate::inputs::{
    EmotionFrame, InputReceivers, MagnitudeBuffer, PostureSnapshot, SignalInbox, TrackingFrame,
};
use crate::motion::{
    AnimationStateMachine, ClipCategory, ClipLibrary, HeadPose, HeadRotationSolver,
    PostureResponder, RootTransform,
};
use crate::observability::{FrameObserver, TracingObserver};
use crate::rig::{AvatarProfile, AvatarRig, BoneMap, RigError, RigIssue};
use crate::utils::sanitize_dt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use uuid::Uuid;

/// Everything that happened in one frame, handed to the observer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub dt: f32,
    pub category: ClipCategory,
    pub transitioned: bool,
    pub settled: bool,
    pub layers: usize,
    pub blink: f32,
    pub blend: BlendReport,
    pub head: Option<HeadPose>,
    pub root: RootTransform,
    /// Sources that crossed their hold limit this frame.
    pub stale_sources: u32,
    /// Blend scores plus head axes that had to be clamped or zeroed.
    pub sanitized_inputs: u32,
}

pub struct FrameOrchestrator<R: AvatarRig> {
    id: Uuid,
    rig: R,
    profile: AvatarProfile,
    inbox: SignalInbox,
    receivers: Option<InputReceivers>,
    blender: ChannelBlender,
    blink: BlinkSynthesizer<StdRng>,
    mixer: AnimationStateMachine<StdRng>,
    head: HeadRotationSolver,
    bones: BoneMap,
    posture: PostureResponder,
    observer: Box<dyn FrameObserver>,
    issues: Vec<RigIssue>,
    desired: ClipCategory,
    last_speaking: bool,
    frame: u64,
}

impl<R: AvatarRig> FrameOrchestrator<R> {
    /// Bind to a loaded rig. Fails only when the model has no clips at all.
    pub fn new(rig: R, profile: AvatarProfile) -> Result<Self, RigError> {
        Self::build(rig, profile, StdRng::from_entropy())
    }

    /// Deterministic blink timing and variant choice, for tests and replays.
    pub fn new_seeded(rig: R, profile: AvatarProfile, seed: u64) -> Result<Self, RigError> {
        Self::build(rig, profile, StdRng::seed_from_u64(seed))
    }

    fn build(rig: R, profile: AvatarProfile, mut rng: StdRng) -> Result<Self, RigError> {
        let profile = profile.sanitized();
        let id = Uuid::new_v4();

        let library = ClipLibrary::from_assets(
            &rig.clip_assets(),
            profile.clip_prefix(),
            profile.animation.talking_loops,
        )?;

        let morphs = rig.morph_target_names();
        let tables = profile.channel_tables();
        let blender = ChannelBlender::new(
            &tables,
            &morphs,
            profile.blender.clone(),
            profile.audio.clone(),
        );
        let blink = BlinkSynthesizer::new(
            profile.blink.clone(),
            &morphs,
            StdRng::seed_from_u64(rand::Rng::gen(&mut rng)),
        );

        let bones = BoneMap::resolve(&rig, &profile.bones);
        let head = HeadRotationSolver::new(profile.head.clone(), profile.kind, bones.neutral);

        let mut issues = Vec::new();
        if morphs.is_empty() {
            issues.push(RigIssue::NoMorphTargets);
        } else if blink.bank().is_empty() {
            issues.push(RigIssue::NoEyelids);
        }
        if bones.bone_count == 0 {
            issues.push(RigIssue::NoSkeleton);
        } else if !bones.has_head_chain() {
            issues.push(RigIssue::MissingHeadBones {
                head: bones.head.is_some(),
                neck: bones.neck.is_some(),
            });
        }
        if !library.has_talking() {
            issues.push(RigIssue::NoTalkingClips);
        }

        let mixer = AnimationStateMachine::new(library, profile.animation.clone(), rng);

        tracing::info!(
            "[Avatar] {} ready: {:?}, {} face channels, {} eyelids, {} clips",
            id,
            profile.kind,
            blender.bank().len(),
            blink.bank().len(),
            mixer.library().len()
        );

        let mut observer: Box<dyn FrameObserver> =
            Box::new(TracingObserver::new(profile.summary_every_frames));
        for issue in &issues {
            observer.on_issue(issue);
        }

        Ok(Self {
            id,
            inbox: SignalInbox::new(&profile.hold),
            posture: PostureResponder::new(profile.posture.clone()),
            rig,
            profile,
            receivers: None,
            blender,
            blink,
            mixer,
            head,
            bones,
            observer,
            issues,
            desired: ClipCategory::Idle,
            last_speaking: false,
            frame: 0,
        })
    }

    /// Read producers from the hub at the start of every frame.
    pub fn with_inputs(mut self, receivers: InputReceivers) -> Self {
        self.receivers = Some(receivers);
        self
    }

    /// Replace the observer; load-time issues are replayed to it.
    pub fn with_observer(mut self, observer: impl FrameObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        for issue in &self.issues {
            self.observer.on_issue(issue);
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn issues(&self) -> &[RigIssue] {
        &self.issues
    }

    pub fn rig(&self) -> &R {
        &self.rig
    }

    pub fn profile(&self) -> &AvatarProfile {
        &self.profile
    }

    pub fn blender(&self) -> &ChannelBlender {
        &self.blender
    }

    pub fn mixer(&self) -> &AnimationStateMachine<StdRng> {
        &self.mixer
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ── Setters: latest value wins ─────────────────────────

    pub fn set_emotion_frame(&mut self, frame: Option<EmotionFrame>) {
        self.inbox.set_emotion(frame);
    }

    pub fn set_tracking_frame(&mut self, frame: Option<TrackingFrame>) {
        self.inbox.set_tracking(frame);
    }

    pub fn set_audio_buffer(&mut self, bins: Option<MagnitudeBuffer>) {
        self.inbox.set_audio(bins);
    }

    pub fn set_posture(&mut self, posture: Option<PostureSnapshot>) {
        self.inbox.set_posture(posture);
    }

    pub fn set_active_category(&mut self, category: ClipCategory) {
        self.desired = category;
        let speaking = category == ClipCategory::Talking;
        self.inbox.set_speaking(speaking);
        self.last_speaking = speaking;
    }

    /// Run one frame.
    pub fn advance(&mut self, dt: f32) -> FrameReport {
        let dt = sanitize_dt(dt);
        self.frame += 1;
        let span = tracing::trace_span!("avatar_frame", id = %self.id, frame = self.frame);
        let _enter = span.enter();

        if let Some(rx) = self.receivers.as_mut() {
            self.inbox.pull(rx);
        }
        if self.inbox.speaking() != self.last_speaking {
            self.last_speaking = self.inbox.speaking();
            self.desired = if self.last_speaking {
                ClipCategory::Talking
            } else {
                ClipCategory::Idle
            };
        }
        let stale_sources = self.inbox.tick(dt);

        // 1. Mixer
        let transitioned = self.mixer.request(self.desired);
        let state = *self.mixer.advance(dt);
        let layers = self.mixer.layers();

        // 2. Blink
        let blink = self.blink.update(dt);

        // 3. Blender
        let tracking = self.inbox.tracking();
        let blend = self.blender.blend(
            &BlendInputs {
                talking: state.category == ClipCategory::Talking,
                audio: self.inbox.audio(),
                emotion: self.inbox.emotion(),
                tracking,
            },
            dt,
        );

        // 4. Head, from the tracker pose only
        let head_input = tracking.and_then(|t| t.head_rotation);
        let head = if self.bones.head.is_some() || self.bones.neck.is_some() {
            Some(self.head.solve(head_input, dt))
        } else {
            None
        };

        // 5. Posture
        let root = self.posture.update(self.inbox.posture(), dt);

        // 6. Writes
        if self.bones.bone_count > 0 {
            self.rig.apply_clip_layers(&layers);
        }
        for ch in self.blender.bank().channels() {
            self.rig.set_morph_influence(ch.mesh_index, ch.current_value);
        }
        for ch in self.blink.bank().channels() {
            self.rig.set_morph_influence(ch.mesh_index, ch.current_value);
        }
        if let Some(pose) = head {
            if let Some(h) = self.bones.head {
                self.rig.set_bone_rotation(h, pose.head);
            }
            if let Some(n) = self.bones.neck {
                self.rig.set_bone_rotation(n, pose.neck);
            }
            if let Some(s) = self.bones.spine.filter(|_| self.head.config().spine_share > 0.0) {
                self.rig.set_bone_rotation(s, pose.spine);
            }
        }
        if self.posture.is_enabled() {
            self.rig.set_root_transform(&root);
        }

        let report = FrameReport {
            frame: self.frame,
            dt,
            category: state.category,
            transitioned,
            settled: state.is_settled(),
            layers: layers.len(),
            blink,
            blend,
            head,
            root,
            stale_sources,
            sanitized_inputs: blend.sanitized_inputs
                + head.map_or(0, |h| u32::from(h.sanitized)),
        };
        self.observer.on_frame(&report);
        report
    }

    /// Stop between frames and hand the rig back.
    pub fn stop(self) -> R {
        tracing::debug!("[Avatar] {} stopped after {} frames", self.id, self.frame);
        self.rig
    }
}
