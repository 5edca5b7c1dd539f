//! Audio input adapter.
//!
//! Raw band magnitudes come from an [`AudioSource`]. The adapter smooths
//! them, runs beat detection on the smoothed signal, then applies the
//! sensitivity and per-band impact gain. Force synthesis compares the
//! gained levels against the noise thresholds; the total is passed
//! through in the raw 0..1 range.
//!
//! Capturing audio from a real device is outside this crate; [`Silence`]
//! is the default source and keeps the binary runnable without one.

use std::time::{Duration, Instant};

/// Raw or processed magnitudes for the three frequency bands.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioBands {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl AudioBands {
    pub fn new(bass: f32, mid: f32, treble: f32) -> Self {
        Self { bass, mid, treble }
    }

    /// Combined energy across all bands.
    pub fn total(&self) -> f32 {
        self.bass + self.mid + self.treble
    }
}

/// Provider of raw band magnitudes, one sample per frame.
///
/// Returning `None` means no audio is available this frame; the adapter
/// stays inactive and no audio forces are produced.
pub trait AudioSource {
    fn sample(&mut self) -> Option<AudioBands>;
}

/// Source that never produces audio.
pub struct Silence;

impl AudioSource for Silence {
    fn sample(&mut self) -> Option<AudioBands> {
        None
    }
}

/// Per-band noise floors. Gained levels at or below these fire no force
/// pattern.
#[derive(Clone, Copy, Debug)]
pub struct BandThresholds {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            bass: 0.005,
            mid: 0.01,
            treble: 0.01,
        }
    }
}

/// Smoothing weight kept from the previous frame.
const SMOOTHING: f32 = 0.8;

/// Beat detector over the smoothed raw bass/mid levels, before any gain.
///
/// A beat fires when bass is loud in absolute terms, clearly dominates
/// the mids, and the refractory window since the last beat has passed.
#[derive(Debug, Default)]
pub struct BeatDetector {
    last_beat: Option<Instant>,
}

impl BeatDetector {
    const REFRACTORY: Duration = Duration::from_millis(100);
    const BASS_FLOOR: f32 = 0.15;
    const BASS_OVER_MID: f32 = 1.5;

    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame of processed levels. Returns true on a beat.
    pub fn update(&mut self, bass: f32, mid: f32, now: Instant) -> bool {
        let ready = self
            .last_beat
            .is_none_or(|t| now.duration_since(t) >= Self::REFRACTORY);
        let beat = ready && bass > Self::BASS_FLOOR && bass > mid * Self::BASS_OVER_MID;
        if beat {
            self.last_beat = Some(now);
        }
        beat
    }
}

/// Processed audio state for one frame.
///
/// `bands` carry the gained levels force synthesis works with; `total`
/// is the raw smoothed energy, still in the source's 0..1 range.
#[derive(Clone, Copy, Debug)]
pub struct AudioLevels {
    pub bands: AudioBands,
    pub total: f32,
    pub beat: bool,
    pub thresholds: BandThresholds,
}

/// Smooths raw samples and turns them into force-ready levels.
pub struct AudioAdapter {
    smoothed: AudioBands,
    thresholds: BandThresholds,
    sensitivity: f32,
    impacts: AudioBands,
    beat: BeatDetector,
}

impl AudioAdapter {
    pub fn new(sensitivity: f32, impacts: AudioBands) -> Self {
        Self {
            smoothed: AudioBands::default(),
            thresholds: BandThresholds::default(),
            sensitivity,
            impacts,
            beat: BeatDetector::new(),
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }

    pub fn set_impacts(&mut self, impacts: AudioBands) {
        self.impacts = impacts;
    }

    /// Process one raw sample. `None` input leaves the adapter inactive.
    pub fn ingest(&mut self, raw: Option<AudioBands>, now: Instant) -> Option<AudioLevels> {
        let raw = raw?;

        self.smoothed = AudioBands::new(
            self.smoothed.bass * SMOOTHING + raw.bass * (1.0 - SMOOTHING),
            self.smoothed.mid * SMOOTHING + raw.mid * (1.0 - SMOOTHING),
            self.smoothed.treble * SMOOTHING + raw.treble * (1.0 - SMOOTHING),
        );

        // Beats look at the signal itself, not the gained levels.
        let beat = self
            .beat
            .update(self.smoothed.bass, self.smoothed.mid, now);

        let bands = AudioBands::new(
            self.smoothed.bass * self.impacts.bass * self.sensitivity,
            self.smoothed.mid * self.impacts.mid * self.sensitivity,
            self.smoothed.treble * self.impacts.treble * self.sensitivity,
        );

        Some(AudioLevels {
            bands,
            total: self.smoothed.total(),
            beat,
            thresholds: self.thresholds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_source() {
        let mut src = Silence;
        assert!(src.sample().is_none());
    }

    fn impacts() -> AudioBands {
        AudioBands::new(2.5, 1.5, 1.0)
    }

    #[test]
    fn test_adapter_inactive_without_input() {
        let mut adapter = AudioAdapter::new(8.0, impacts());
        assert!(adapter.ingest(None, Instant::now()).is_none());
    }

    #[test]
    fn test_smoothing_converges() {
        let mut adapter = AudioAdapter::new(1.0, impacts());
        let now = Instant::now();
        let raw = AudioBands::new(1.0, 0.0, 0.0);
        // First sample only takes 20% of the raw value.
        adapter.ingest(Some(raw), now);
        assert!((adapter.smoothed.bass - 0.2).abs() < 1e-6);
        // Repeated samples approach the raw value from below.
        for _ in 0..50 {
            adapter.ingest(Some(raw), now);
        }
        assert!(adapter.smoothed.bass > 0.99);
        assert!(adapter.smoothed.bass <= 1.0);
    }

    #[test]
    fn test_sensitivity_and_impact_scaling() {
        let mut adapter = AudioAdapter::new(2.0, impacts());
        adapter.smoothed = AudioBands::new(0.1, 0.1, 0.1);
        let levels = adapter
            .ingest(Some(adapter.smoothed), Instant::now())
            .unwrap();
        // Smoothed values are already at the raw values, so they stay put.
        assert!((levels.bands.bass - 0.1 * 2.5 * 2.0).abs() < 1e-5);
        assert!((levels.bands.mid - 0.1 * 1.5 * 2.0).abs() < 1e-5);
        assert!((levels.bands.treble - 0.1 * 1.0 * 2.0).abs() < 1e-5);
        // Total stays in the raw domain, unscaled.
        assert!((levels.total - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_impacts_adjust_at_runtime() {
        let mut adapter = AudioAdapter::new(1.0, impacts());
        adapter.smoothed = AudioBands::new(0.2, 0.0, 0.0);
        let before = adapter
            .ingest(Some(adapter.smoothed), Instant::now())
            .unwrap();
        assert!((before.bands.bass - 0.5).abs() < 1e-5);

        adapter.set_impacts(AudioBands::new(5.0, 1.5, 1.0));
        let after = adapter
            .ingest(Some(adapter.smoothed), Instant::now())
            .unwrap();
        assert!((after.bands.bass - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gain_does_not_reach_beat_detection() {
        // Gained bass far above the beat floor, raw bass below it.
        let mut adapter = AudioAdapter::new(100.0, impacts());
        let now = Instant::now();
        let mut levels = None;
        for _ in 0..50 {
            levels = adapter.ingest(Some(AudioBands::new(0.1, 0.0, 0.0)), now);
        }
        let levels = levels.unwrap();
        assert!(levels.bands.bass > 20.0);
        assert!(!levels.beat);
    }

    #[test]
    fn test_thresholds_passed_through() {
        let mut adapter = AudioAdapter::new(8.0, impacts());
        let levels = adapter
            .ingest(Some(AudioBands::default()), Instant::now())
            .unwrap();
        assert_eq!(levels.thresholds.bass, 0.005);
        assert_eq!(levels.thresholds.mid, 0.01);
        assert_eq!(levels.thresholds.treble, 0.01);
    }

    #[test]
    fn test_beat_requires_loud_bass() {
        let mut det = BeatDetector::new();
        let now = Instant::now();
        assert!(!det.update(0.1, 0.0, now));
        assert!(det.update(0.2, 0.0, now));
    }

    #[test]
    fn test_beat_requires_bass_over_mid() {
        let mut det = BeatDetector::new();
        let now = Instant::now();
        // Bass loud but mids just as loud: no beat.
        assert!(!det.update(0.5, 0.4, now));
        assert!(det.update(0.5, 0.3, now));
    }

    #[test]
    fn test_beat_refractory_window() {
        let mut det = BeatDetector::new();
        let t0 = Instant::now();
        assert!(det.update(1.0, 0.0, t0));
        // 50ms later: still refractory.
        assert!(!det.update(1.0, 0.0, t0 + Duration::from_millis(50)));
        // 100ms later: fires again.
        assert!(det.update(1.0, 0.0, t0 + Duration::from_millis(100)));
    }
}
