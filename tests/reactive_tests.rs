//! Integration tests for the CPU side of the pipeline.
//!
//! These run the audio adapter, beat detector, force synthesis, and
//! pointer tracking together through the public API, the way a frame
//! would, without touching a GPU device.

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use inkflow::audio::{AudioAdapter, AudioBands, AudioSource, Silence};
use inkflow::config::{grid_dims, particle_count, Params, RenderMode};
use inkflow::forces::audio_forces;
use inkflow::pointer::PointerTracker;

const VIEWPORT: Vec2 = Vec2::new(1920.0, 1080.0);

/// Adapter at the default sensitivity and impact gains.
fn adapter() -> AudioAdapter {
    AudioAdapter::new(8.0, AudioBands::new(2.5, 1.5, 1.0))
}

// ============================================================================
// Audio adapter -> force synthesis
// ============================================================================

#[test]
fn test_silence_source_drives_no_forces() {
    let mut source = Silence;
    let mut adapter = adapter();
    assert!(adapter.ingest(source.sample(), Instant::now()).is_none());
}

#[test]
fn test_loud_bass_eventually_beats_and_bursts() {
    let mut adapter = adapter();
    let mut rng = StdRng::seed_from_u64(3);
    let t0 = Instant::now();

    // Feed a sustained loud bass signal; smoothing needs a few frames to
    // ramp the processed level past the beat floor.
    let mut saw_beat = false;
    for frame in 0..30 {
        let now = t0 + Duration::from_millis(frame * 16);
        let levels = adapter
            .ingest(Some(AudioBands::new(0.8, 0.0, 0.0)), now)
            .unwrap();
        if levels.beat {
            saw_beat = true;
            let events = audio_forces(&levels, frame as f64 * 16.0, VIEWPORT, &mut rng);
            // 8 radial burst points plus the ambient rotor.
            assert_eq!(events.len(), 9);
            let center = VIEWPORT * 0.5;
            for ev in &events[..8] {
                let outward = (ev.p1 - center).normalize();
                assert!((ev.vector.normalize() - outward).length() < 1e-4);
            }
            break;
        }
    }
    assert!(saw_beat);
}

#[test]
fn test_beats_respect_refractory_across_frames() {
    let mut adapter = adapter();
    let t0 = Instant::now();

    // Warm the smoother up past the beat floor.
    for frame in 0..30 {
        adapter.ingest(
            Some(AudioBands::new(0.8, 0.0, 0.0)),
            t0 + Duration::from_millis(frame * 16),
        );
    }

    let base = t0 + Duration::from_secs(1);
    let at = |ms: u64| base + Duration::from_millis(ms);
    let mut beat_at = |ms: u64| {
        adapter
            .ingest(Some(AudioBands::new(0.8, 0.0, 0.0)), at(ms))
            .unwrap()
            .beat
    };

    assert!(beat_at(0));
    assert!(!beat_at(16));
    assert!(!beat_at(96));
    assert!(beat_at(112));
}

#[test]
fn test_subthreshold_audio_is_inert() {
    let mut adapter = adapter();
    let mut rng = StdRng::seed_from_u64(3);
    // Quiet enough that even after the sensitivity and impact gains the
    // bands stay under their noise floors.
    let quiet = AudioBands::new(0.0002, 0.0004, 0.0004);
    for frame in 0..20 {
        let levels = adapter
            .ingest(Some(quiet), Instant::now() + Duration::from_millis(frame * 16))
            .unwrap();
        let events = audio_forces(&levels, frame as f64 * 16.0, VIEWPORT, &mut rng);
        assert!(events.is_empty());
    }
}

#[test]
fn test_mid_heavy_signal_never_beats() {
    // Loud bass that does not dominate the mids must not register a
    // beat, no matter how large the gained bass level gets.
    let mut adapter = adapter();
    let t0 = Instant::now();
    for frame in 0..60 {
        let levels = adapter
            .ingest(
                Some(AudioBands::new(0.5, 0.45, 0.0)),
                t0 + Duration::from_millis(frame * 16),
            )
            .unwrap();
        assert!(!levels.beat);
        if frame > 30 {
            // The gained band is well past the beat floor; the detector
            // still sees the raw signal where 0.5 < 1.5 * 0.45.
            assert!(levels.bands.bass > 5.0);
        }
    }
}

// ============================================================================
// Pointer -> force events
// ============================================================================

#[test]
fn test_drag_produces_sequential_segments() {
    let mut tracker = PointerTracker::new();
    let height = VIEWPORT.y;

    assert!(tracker.moved(0, Vec2::new(100.0, 100.0), height).is_none());
    let a = tracker.moved(0, Vec2::new(110.0, 100.0), height).unwrap();
    let b = tracker.moved(0, Vec2::new(120.0, 90.0), height).unwrap();

    // Segments chain: one event's end is the next one's start.
    assert_eq!(a.p2, b.p1);
    // Screen-up motion comes out as positive field-y velocity.
    assert_eq!(b.vector, Vec2::new(10.0, 10.0));
}

#[test]
fn test_mouse_and_touch_drags_coexist() {
    let mut tracker = PointerTracker::new();
    let height = VIEWPORT.y;
    let mouse = u64::MAX;

    tracker.moved(mouse, Vec2::new(0.0, 0.0), height);
    tracker.moved(1, Vec2::new(500.0, 500.0), height);
    tracker.moved(2, Vec2::new(700.0, 700.0), height);

    let m = tracker.moved(mouse, Vec2::new(10.0, 0.0), height).unwrap();
    let t = tracker.moved(2, Vec2::new(700.0, 710.0), height).unwrap();
    assert_eq!(m.vector, Vec2::new(10.0, 0.0));
    assert_eq!(t.vector, Vec2::new(0.0, -10.0));
    assert_eq!(tracker.active_count(), 3);

    tracker.released(1);
    assert_eq!(tracker.active_count(), 2);
}

// ============================================================================
// Resize math
// ============================================================================

#[test]
fn test_resize_math_tracks_viewport() {
    assert_eq!(grid_dims(1920, 1080), (240, 135));
    assert_eq!(particle_count(1920, 1080), 10_000);

    // Shrinking the window shrinks both, never to zero.
    assert_eq!(grid_dims(100, 60), (13, 8));
    assert_eq!(particle_count(100, 60), 600);
    assert_eq!(grid_dims(0, 0), (1, 1));
    assert_eq!(particle_count(1, 1), 1);
}

#[test]
fn test_trail_fade_reaches_paper_within_trail_length() {
    let params = Params {
        trail_length: 15.0,
        render_mode: RenderMode::Fluid,
        mic_enabled: false,
        ..Params::default()
    };
    let mut trail = 1.0f32;
    for _ in 0..15 {
        trail = (trail - params.fade_increment()).max(0.0);
    }
    // Allow one extra step for f32 rounding in the decrement.
    assert!(trail < 1e-5);
    trail = (trail - params.fade_increment()).max(0.0);
    assert_eq!(trail, 0.0);
}
