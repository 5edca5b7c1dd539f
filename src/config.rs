//! Tuning constants and runtime parameters.
//!
//! The constants here define the feel of the simulation. They were tuned
//! against a 1080p viewport and scale with window size where noted.

/// One velocity cell covers this many viewport pixels on each axis.
pub const VELOCITY_SCALE_FACTOR: u32 = 8;

/// Speed cap for the velocity field, in viewport pixels per frame.
pub const MAX_VELOCITY: f32 = 30.0;

/// Multiplier applied to pointer drag deltas when splatted into the field.
pub const TOUCH_FORCE_SCALE: f32 = 2.0;

/// Radius of the pointer force splat, in viewport pixels.
pub const TOUCH_THICKNESS: f32 = 30.0;

/// Particles per viewport pixel.
pub const PARTICLE_DENSITY: f32 = 0.1;

/// Hard cap on the particle count regardless of viewport size.
pub const MAX_NUM_PARTICLES: u32 = 10_000;

/// Frames a particle lives before respawning at its seed position.
pub const PARTICLE_LIFETIME: u32 = 1000;

/// Jacobi relaxation iterations per frame.
pub const NUM_JACOBI_STEPS: u32 = 3;

/// Jacobi alpha for the pressure Poisson stencil.
pub const PRESSURE_ALPHA: f32 = -1.0;

/// Jacobi inverse-beta weight (1/4 neighbors).
pub const PRESSURE_BETA: f32 = 0.25;

/// Particle integration sub-steps per rendered frame.
pub const NUM_RENDER_STEPS: u32 = 3;

/// Squared displacement at which a particle folds its offset into the
/// absolute position. Keeps f32 positions precise over long lifetimes.
pub const POSITION_FOLD_THRESHOLD: f32 = 20.0;

/// Paper color behind the ink.
pub const BACKGROUND_COLOR: [f32; 3] = [0.98, 0.922, 0.843];

/// Ink color at full trail opacity.
pub const INK_COLOR: [f32; 3] = [0.0, 0.0, 0.2];

/// Spacing between velocity glyphs in the vector-field view, viewport px.
pub const GLYPH_SPACING: f32 = 10.0;

/// Length multiplier for velocity glyphs.
pub const GLYPH_SCALE: f32 = 2.5;

/// Amplitude scale for the pressure view.
pub const PRESSURE_RENDER_SCALE: f32 = 0.5;

/// Which field the frame presents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Ink trails composited over the paper color.
    #[default]
    Fluid,
    /// Signed pressure amplitude.
    Pressure,
    /// Velocity vector glyphs.
    Velocity,
}

/// Runtime-adjustable parameters.
#[derive(Clone, Debug)]
pub struct Params {
    /// Frames a trail pixel takes to fade from full ink back to paper.
    pub trail_length: f32,
    /// Presented field.
    pub render_mode: RenderMode,
    /// Whether audio forces are applied.
    pub mic_enabled: bool,
    /// Gain applied to the smoothed band levels.
    pub mic_sensitivity: f32,
    /// Extra gain on the bass band, on top of the sensitivity.
    pub bass_impact: f32,
    /// Extra gain on the mid band.
    pub mid_impact: f32,
    /// Extra gain on the treble band.
    pub treble_impact: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            trail_length: 15.0,
            render_mode: RenderMode::Fluid,
            mic_enabled: true,
            mic_sensitivity: 8.0,
            bass_impact: 2.5,
            mid_impact: 1.5,
            treble_impact: 1.0,
        }
    }
}

impl Params {
    /// Per-frame trail decrement derived from the trail length.
    pub fn fade_increment(&self) -> f32 {
        1.0 / self.trail_length.max(1.0)
    }
}

/// Velocity grid dimensions for a viewport, one cell per 8x8 pixel block.
/// Never collapses below 1x1.
pub fn grid_dims(width: u32, height: u32) -> (u32, u32) {
    (
        width.div_ceil(VELOCITY_SCALE_FACTOR).max(1),
        height.div_ceil(VELOCITY_SCALE_FACTOR).max(1),
    )
}

/// Particle count for a viewport: density-scaled, capped.
pub fn particle_count(width: u32, height: u32) -> u32 {
    let wanted = ((width as f64 * height as f64) * PARTICLE_DENSITY as f64).ceil() as u32;
    wanted.min(MAX_NUM_PARTICLES).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let p = Params::default();
        assert_eq!(p.trail_length, 15.0);
        assert_eq!(p.render_mode, RenderMode::Fluid);
        assert!(p.mic_enabled);
        assert_eq!(p.mic_sensitivity, 8.0);
        assert_eq!(p.bass_impact, 2.5);
        assert_eq!(p.mid_impact, 1.5);
        assert_eq!(p.treble_impact, 1.0);
    }

    #[test]
    fn test_fade_increment() {
        let p = Params::default();
        assert!((p.fade_increment() - 1.0 / 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_fade_increment_clamps_short_trails() {
        let p = Params {
            trail_length: 0.25,
            ..Params::default()
        };
        assert_eq!(p.fade_increment(), 1.0);
    }

    #[test]
    fn test_grid_dims_rounds_up() {
        assert_eq!(grid_dims(1920, 1080), (240, 135));
        assert_eq!(grid_dims(1921, 1081), (241, 136));
        assert_eq!(grid_dims(7, 7), (1, 1));
    }

    #[test]
    fn test_grid_dims_never_zero() {
        assert_eq!(grid_dims(0, 0), (1, 1));
        assert_eq!(grid_dims(1, 0), (1, 1));
    }

    #[test]
    fn test_particle_count_density() {
        // 100x100 px at 0.1 density = 1000 particles
        assert_eq!(particle_count(100, 100), 1000);
    }

    #[test]
    fn test_particle_count_cap() {
        assert_eq!(particle_count(1920, 1080), MAX_NUM_PARTICLES);
    }

    #[test]
    fn test_particle_count_floor() {
        assert_eq!(particle_count(1, 1), 1);
    }
}
