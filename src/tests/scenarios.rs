use super::helpers::*;
use crate::face::SourceArbitration;
use crate::mapping::{ChannelMapping, ChannelTables};
use crate::motion::ClipCategory;
use crate::rig::{AvatarProfile, Gender};

// ── Channel blending ─────────────────────────────────────────

#[test]
fn joy_plus_tracked_smile_converges_to_max_not_sum() {
    for arbitration in [SourceArbitration::EmotionFirst, SourceArbitration::Merge] {
        let mut profile = AvatarProfile::tracked(Gender::Male);
        profile.blender.arbitration = arbitration;
        let mut o = avatar_with(profile, 1);
        for i in 0..300 {
            // The voice service repeats its verdict every second; the
            // tracker publishes every frame. Neither goes stale.
            if i % 60 == 0 {
                o.set_emotion_frame(Some(emotions(&[("joy", 0.9)])));
            }
            o.set_tracking_frame(Some(tracking(&[("mouthSmile", 0.5)], None)));
            o.advance(DT);
        }
        let v = o.rig().influence("mouthSmileLeft").unwrap();
        assert!(
            (v - 0.9).abs() < 1e-3,
            "{:?}: expected 0.9 (max), got {}",
            arbitration,
            v
        );
    }
}

#[test]
fn repeated_emotion_frame_converges_without_oscillation() {
    let mut o = tracked_avatar(2);
    let frame = emotions(&[("anger", 0.7)]);
    let mut prev = 0.0f32;
    for i in 0..240 {
        o.set_emotion_frame(Some(frame.clone()));
        o.advance(DT);
        let v = o.rig().influence("browDownLeft").unwrap();
        assert!(v + 1e-6 >= prev, "frame {}: dropped from {} to {}", i, prev, v);
        assert!(v <= 0.7 + 1e-6, "frame {}: overshot to {}", i, v);
        prev = v;
    }
    assert!((prev - 0.7).abs() < 1e-3, "settled at {}", prev);
}

#[test]
fn stale_emotion_decays_to_neutral() {
    let mut o = tracked_avatar(3);
    o.set_emotion_frame(Some(emotions(&[("joy", 1.0)])));
    run(&mut o, 120);
    assert!(o.rig().influence("mouthSmileLeft").unwrap() > 0.9);
    // 4 s hold, then idle relaxation
    let report = run(&mut o, 60 * 12);
    assert!(
        o.rig().influence("mouthSmileLeft").unwrap() < 0.05,
        "still smiling at {}",
        o.rig().influence("mouthSmileLeft").unwrap()
    );
    assert_eq!(report.stale_sources, 0, "staleness is reported on one frame only");
}

// ── Head ─────────────────────────────────────────────────────

#[test]
fn two_seconds_without_tracking_returns_head_to_neutral() {
    let mut o = tracked_avatar(4);
    for _ in 0..90 {
        o.set_tracking_frame(Some(tracking(&[], Some((0.4, -0.6, 0.25)))));
        o.advance(DT);
    }
    let turned = o.rig().rotation_of(HEAD).unwrap();
    assert!(turned.max_abs_diff(neutral_head()) > 0.2);

    // Tracker goes quiet; the last frame ages out after its hold.
    run(&mut o, 120);
    let head = o.rig().rotation_of(HEAD).unwrap();
    let neck = o.rig().rotation_of(NECK).unwrap();
    assert!(head.max_abs_diff(neutral_head()) < 1e-3, "head {:?}", head);
    assert!(neck.max_abs_diff(neutral_neck()) < 1e-3, "neck {:?}", neck);
}

#[test]
fn head_solver_ignores_morph_activity() {
    let mut quiet = tracked_avatar(5);
    let mut busy = tracked_avatar(5);
    busy.set_active_category(ClipCategory::Talking);
    for i in 0..200 {
        let yaw = 0.5 * (i as f32 * 0.05).sin();
        let pose = Some((0.1, yaw, -0.05));
        quiet.set_tracking_frame(Some(tracking(&[], pose)));
        busy.set_tracking_frame(Some(tracking(&[("mouthSmile", 0.8), ("jawOpen", 0.6)], pose)));
        busy.set_emotion_frame(Some(emotions(&[("surprise", 1.0)])));
        busy.set_audio_buffer(Some(speech_buffer(128)));
        quiet.advance(DT);
        busy.advance(DT);
        assert_eq!(
            quiet.rig().rotation_of(HEAD),
            busy.rig().rotation_of(HEAD),
            "frame {}",
            i
        );
        assert_eq!(quiet.rig().rotation_of(NECK), busy.rig().rotation_of(NECK));
    }
}

#[test]
fn coach_ignores_tracker_head_pose() {
    let mut o = avatar_with(AvatarProfile::coach(Gender::Female), 6);
    for _ in 0..300 {
        o.set_tracking_frame(Some(tracking(&[], Some((0.6, 0.7, 0.3)))));
        let r = o.advance(DT);
        let offset = r.head.unwrap().offset;
        assert!(offset.y.abs() < 0.05, "coach followed the tracker: {:?}", offset);
    }
}

// ── Blink ────────────────────────────────────────────────────

#[test]
fn blender_never_writes_eyelids() {
    let mut tables = ChannelTables::default();
    tables.emotion.push(ChannelMapping::new(
        "sleepy",
        &["eyeBlinkLeft", "eyeBlinkRight", "browInnerUp"],
        1.0,
    ));
    let mut profile = AvatarProfile::tracked(Gender::Male);
    profile.tables = Some(tables);
    let mut o = avatar_with(profile, 7);
    let mut blinked = false;
    for i in 0..(60 * 10) {
        if i % 60 == 0 {
            o.set_emotion_frame(Some(emotions(&[("sleepy", 1.0)])));
        }
        let r = o.advance(DT);
        let lid = o.rig().influence("eyeBlinkLeft").unwrap();
        assert_eq!(lid, r.blink, "eyelid must follow blink only");
        blinked |= r.blink > 0.5;
    }
    assert!(blinked, "no blink in 10 s");
    assert!(o.rig().influence("browInnerUp").unwrap() > 0.9);
}

// ── Clips ────────────────────────────────────────────────────

#[test]
fn idle_talking_idle_settles_with_exactly_one_full_clip() {
    let mut o = tracked_avatar(8);
    o.set_active_category(ClipCategory::Talking);
    run(&mut o, 45);
    o.set_active_category(ClipCategory::Idle);
    let report = run(&mut o, 45);
    assert!(report.settled);
    assert_eq!(report.category, ClipCategory::Idle);
    let layers = o.rig().last_layers();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].weight, 1.0);
    assert_eq!(layers[0].clip, o.mixer().library().idle_index());
}

#[test]
fn never_two_full_weight_clips_outside_a_fade() {
    let mut o = tracked_avatar(9);
    for cycle in 0..10 {
        let category = if cycle % 2 == 0 {
            ClipCategory::Talking
        } else {
            ClipCategory::Idle
        };
        o.set_active_category(category);
        for _ in 0..40 {
            let r = o.advance(DT);
            let full = o
                .rig()
                .last_layers()
                .iter()
                .filter(|l| l.weight >= 1.0)
                .count();
            if r.settled {
                assert_eq!(full, 1);
            } else {
                assert_eq!(full, 0, "two clips at full weight mid-fade");
            }
        }
    }
}

#[test]
fn consecutive_talking_entries_pick_different_variants() {
    let mut o = tracked_avatar(10);
    let mut last = None;
    for _ in 0..25 {
        o.set_active_category(ClipCategory::Talking);
        o.advance(DT);
        let clip = o.mixer().state().active.clip;
        assert_ne!(Some(clip), last);
        last = Some(clip);
        o.set_active_category(ClipCategory::Idle);
        run(&mut o, 30);
    }
}

#[test]
fn female_profile_plays_female_clips() {
    let o = avatar_with(AvatarProfile::tracked(Gender::Female), 11);
    for clip in o.mixer().library().clips() {
        assert!(clip.name.starts_with("F_"), "{}", clip.name);
    }
}

// ── Posture ──────────────────────────────────────────────────

#[test]
fn root_stays_identity_without_posture() {
    let mut o = tracked_avatar(12);
    run(&mut o, 120);
    assert_eq!(o.rig().root(), crate::motion::RootTransform::IDENTITY);
}

#[test]
fn posture_moves_root_within_scale_band() {
    let mut o = tracked_avatar(13);
    o.set_posture(Some(crate::inputs::PostureSnapshot {
        openness: 100.0,
        confidence_score: 80.0,
        shoulder_alignment: 90.0,
        leaning: crate::inputs::Lean::Right,
    }));
    run(&mut o, 120);
    let root = o.rig().root();
    assert!(root.scale > 1.0 && root.scale <= 1.05, "scale {}", root.scale);
    assert!(root.rotation.z < 0.0);
    assert!(root.rotation.x > 0.0);
}

#[test]
fn all_channels_in_range_under_normal_play() {
    let mut o = tracked_avatar(14);
    o.set_active_category(ClipCategory::Talking);
    for i in 0..600 {
        if i % 30 == 0 {
            o.set_emotion_frame(Some(emotions(&[("joy", 1.0), ("surprise", 1.0)])));
        }
        o.set_tracking_frame(Some(tracking(&[("tongueOut", 1.0), ("mouthSmile", 1.0)], None)));
        o.set_audio_buffer(Some(vec![255; 128]));
        o.advance(DT);
        assert!(all_in_unit_range(&o));
    }
}
