//! Force events and audio-driven force synthesis.
//!
//! A [`ForceEvent`] is a capsule (or open rectangle) of velocity injected
//! into the fluid. Pointer drags produce one per motion segment; audio
//! produces a small choreography per frame: bass bursts and pulses, a
//! rotating ring of mid-band jets, scattered treble pokes, and a slow
//! ambient rotor that keeps the ink moving while anything is audible.
//!
//! Positions and thickness are in viewport pixels, y-up.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use crate::audio::AudioLevels;

/// One velocity injection along a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceEvent {
    /// Segment start, viewport px.
    pub p1: Vec2,
    /// Segment end. Equal to `p1` for a point impulse.
    pub p2: Vec2,
    /// Velocity added at full blend strength.
    pub vector: Vec2,
    /// Influence radius around the segment, viewport px.
    pub thickness: f32,
    /// Rounded ends (capsule) vs. hard cut at the segment ends.
    pub end_caps: bool,
    /// Extra multiplier on top of the blend falloff.
    pub scale: f32,
}

impl ForceEvent {
    /// Point impulse.
    pub fn point(p: Vec2, vector: Vec2, thickness: f32) -> Self {
        Self {
            p1: p,
            p2: p,
            vector,
            thickness,
            end_caps: true,
            scale: 1.0,
        }
    }
}

const BASS_BURST_POINTS: u32 = 8;
const BASS_BURST_RADIUS: f32 = 0.2;
const BASS_BURST_FORCE: f32 = 25.0;
const BASS_PULSE_FORCE: f32 = 15.0;
const MID_RING_POINTS: u32 = 6;
const MID_RING_RADIUS: f32 = 0.35;
const MID_RING_FORCE: f32 = 12.0;
const MID_RING_SPIN: f64 = 0.0005;
const TREBLE_FORCE: f32 = 8.0;
const TREBLE_EDGE_FORCE: f32 = 10.0;
const TREBLE_EDGE_CHANCE: f32 = 0.3;
const ROTOR_SPIN: f64 = 0.001;
const ROTOR_THICKNESS: f32 = 25.0;
const AUDIBLE_FLOOR: f32 = 0.01;

/// Synthesize this frame's audio forces.
///
/// `elapsed_ms` drives the rotating patterns, so they keep turning at the
/// same rate regardless of frame timing.
pub fn audio_forces<R: Rng>(
    levels: &AudioLevels,
    elapsed_ms: f64,
    viewport: Vec2,
    rng: &mut R,
) -> Vec<ForceEvent> {
    let mut events = Vec::new();
    let bands = levels.bands;
    let thresholds = levels.thresholds;
    let center = viewport * 0.5;
    let min_dim = viewport.x.min(viewport.y);

    // Bass: radial burst on a beat, downward pulse otherwise.
    if bands.bass > thresholds.bass {
        if levels.beat {
            for i in 0..BASS_BURST_POINTS {
                let dir = unit(i as f32 / BASS_BURST_POINTS as f32 * TAU);
                events.push(ForceEvent::point(
                    center + dir * BASS_BURST_RADIUS * min_dim,
                    dir * bands.bass * BASS_BURST_FORCE,
                    50.0 + bands.bass * 60.0,
                ));
            }
        } else {
            events.push(ForceEvent::point(
                center,
                Vec2::new(0.0, -bands.bass * BASS_PULSE_FORCE),
                40.0 + bands.bass * 40.0,
            ));
        }
    }

    // Mid: ring of outward jets, the ring itself slowly rotating.
    if bands.mid > thresholds.mid {
        let spin = (elapsed_ms * MID_RING_SPIN) as f32;
        for i in 0..MID_RING_POINTS {
            let angle = spin + i as f32 / MID_RING_POINTS as f32 * TAU;
            let dir = unit(angle);
            events.push(ForceEvent::point(
                center + dir * MID_RING_RADIUS * min_dim,
                dir * bands.mid * MID_RING_FORCE,
                25.0 + bands.mid * 30.0,
            ));
        }
    }

    // Treble: scattered pokes, mostly interior, sometimes from an edge.
    if bands.treble > thresholds.treble {
        let count = (bands.treble * 15.0) as u32 + 1;
        for _ in 0..count {
            let thickness = 15.0 + bands.treble * 20.0;
            if rng.gen::<f32>() < TREBLE_EDGE_CHANCE {
                let (pos, inward) = random_edge_point(viewport, rng);
                events.push(ForceEvent::point(
                    pos,
                    inward * bands.treble * TREBLE_EDGE_FORCE,
                    thickness,
                ));
            } else {
                let pos = Vec2::new(
                    rng.gen::<f32>() * viewport.x,
                    rng.gen::<f32>() * viewport.y,
                );
                let dir = unit(rng.gen::<f32>() * TAU);
                events.push(ForceEvent::point(
                    pos,
                    dir * bands.treble * TREBLE_FORCE,
                    thickness,
                ));
            }
        }
    }

    // Ambient rotor: a gentle turning push at the center while audible.
    // Gated on the raw total energy, not the gained bands.
    if levels.total > AUDIBLE_FLOOR {
        let dir = unit((elapsed_ms * ROTOR_SPIN) as f32);
        events.push(ForceEvent::point(
            center,
            dir * (0.3 + levels.total * 0.5),
            ROTOR_THICKNESS,
        ));
    }

    events
}

fn unit(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Random point on the viewport boundary plus its inward normal.
fn random_edge_point<R: Rng>(viewport: Vec2, rng: &mut R) -> (Vec2, Vec2) {
    let t = rng.gen::<f32>();
    match rng.gen_range(0u32..4) {
        0 => (Vec2::new(t * viewport.x, 0.0), Vec2::Y),
        1 => (Vec2::new(t * viewport.x, viewport.y), -Vec2::Y),
        2 => (Vec2::new(0.0, t * viewport.y), Vec2::X),
        _ => (Vec2::new(viewport.x, t * viewport.y), -Vec2::X),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBands, BandThresholds};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn levels(bass: f32, mid: f32, treble: f32, total: f32, beat: bool) -> AudioLevels {
        AudioLevels {
            bands: AudioBands::new(bass, mid, treble),
            total,
            beat,
            thresholds: BandThresholds::default(),
        }
    }

    fn viewport() -> Vec2 {
        Vec2::new(800.0, 600.0)
    }

    #[test]
    fn test_silence_produces_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let events = audio_forces(&levels(0.0, 0.0, 0.0, 0.0, false), 0.0, viewport(), &mut rng);
        assert!(events.is_empty());
    }

    #[test]
    fn test_band_gates_use_thresholds() {
        let mut rng = StdRng::seed_from_u64(1);
        // Bands exactly at their thresholds stay silent.
        let at = audio_forces(
            &levels(0.005, 0.01, 0.01, 0.0, false),
            0.0,
            viewport(),
            &mut rng,
        );
        assert!(at.is_empty());
        // Just above the bass threshold fires the pulse alone.
        let above = audio_forces(
            &levels(0.006, 0.0, 0.0, 0.0, false),
            0.0,
            viewport(),
            &mut rng,
        );
        assert_eq!(above.len(), 1);
    }

    #[test]
    fn test_beat_burst_is_radial() {
        let mut rng = StdRng::seed_from_u64(1);
        let events = audio_forces(&levels(1.0, 0.0, 0.0, 0.4, true), 0.0, viewport(), &mut rng);
        // 8 burst points plus the ambient rotor.
        assert_eq!(events.len(), 9);
        let center = viewport() * 0.5;
        for ev in &events[..8] {
            let radial = (ev.p1 - center).normalize();
            // Force points straight out from the center.
            assert!((ev.vector.normalize() - radial).length() < 1e-4);
            assert!((ev.vector.length() - 25.0).abs() < 1e-3);
            assert!(((ev.p1 - center).length() - 0.2 * 600.0).abs() < 1e-2);
            assert_eq!(ev.thickness, 110.0);
        }
    }

    #[test]
    fn test_bass_pulse_points_down() {
        let mut rng = StdRng::seed_from_u64(1);
        let events = audio_forces(&levels(0.5, 0.0, 0.0, 0.02, false), 0.0, viewport(), &mut rng);
        assert_eq!(events.len(), 2);
        let pulse = &events[0];
        assert_eq!(pulse.p1, viewport() * 0.5);
        assert_eq!(pulse.vector, Vec2::new(0.0, -7.5));
        assert_eq!(pulse.thickness, 60.0);
    }

    #[test]
    fn test_mid_ring_is_radial_and_rotates() {
        let mut rng = StdRng::seed_from_u64(1);
        let center = viewport() * 0.5;
        let events = audio_forces(&levels(0.0, 1.0, 0.0, 0.2, false), 0.0, viewport(), &mut rng);
        assert_eq!(events.len(), 7);
        for ev in &events[..6] {
            let radial = (ev.p1 - center).normalize();
            // Jets push straight out from the center.
            assert!((ev.vector.normalize() - radial).length() < 1e-4);
            assert!((ev.vector.length() - 12.0).abs() < 1e-3);
        }
        // Advancing time rotates the ring.
        let later = audio_forces(&levels(0.0, 1.0, 0.0, 0.2, false), 1000.0, viewport(), &mut rng);
        assert!((later[0].p1 - events[0].p1).length() > 1.0);
    }

    #[test]
    fn test_treble_event_count_scales() {
        let mut rng = StdRng::seed_from_u64(1);
        let quiet = audio_forces(&levels(0.0, 0.0, 0.05, 0.02, false), 0.0, viewport(), &mut rng);
        // 1 poke + rotor.
        assert_eq!(quiet.len(), 2);
        let loud = audio_forces(&levels(0.0, 0.0, 1.0, 0.3, false), 0.0, viewport(), &mut rng);
        // floor(15) + 1 pokes + rotor.
        assert_eq!(loud.len(), 17);
    }

    #[test]
    fn test_treble_pokes_stay_in_viewport() {
        let mut rng = StdRng::seed_from_u64(42);
        let events = audio_forces(&levels(0.0, 0.0, 1.0, 0.3, false), 0.0, viewport(), &mut rng);
        for ev in events {
            assert!(ev.p1.x >= 0.0 && ev.p1.x <= 800.0);
            assert!(ev.p1.y >= 0.0 && ev.p1.y <= 600.0);
        }
    }

    #[test]
    fn test_rotor_gates_on_raw_total() {
        let mut rng = StdRng::seed_from_u64(1);
        // Gained bass fires the pulse, but the raw total sits under the
        // floor, so the rotor stays off.
        let events = audio_forces(&levels(0.5, 0.0, 0.0, 0.009, false), 0.0, viewport(), &mut rng);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].thickness, 60.0);

        // Rotor alone when the bands are below their thresholds but the
        // room is audibly live.
        let events = audio_forces(&levels(0.004, 0.0, 0.0, 0.02, false), 0.0, viewport(), &mut rng);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].thickness, ROTOR_THICKNESS);
        assert!((events[0].vector.length() - (0.3 + 0.02 * 0.5)).abs() < 1e-5);
    }

    #[test]
    fn test_rotor_turns_with_time() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = audio_forces(&levels(0.0, 0.0, 0.0, 0.02, false), 0.0, viewport(), &mut rng);
        let b = audio_forces(&levels(0.0, 0.0, 0.0, 0.02, false), 1570.8, viewport(), &mut rng);
        let rot_a = a.last().unwrap().vector.normalize();
        let rot_b = b.last().unwrap().vector.normalize();
        // ~1.5708 rad later the rotor has turned a quarter circle.
        assert!(rot_a.dot(rot_b).abs() < 1e-3);
    }
}
