//! Frame orchestration.
//!
//! [`FluidSim`] owns the GPU context and every subsystem, and drives the
//! per-frame sequence: drain queued forces into the velocity field, run
//! the solver, advance particles and trails (fluid mode only), then
//! present. It also coordinates the hard reset on resize and one-shot
//! PNG capture of the fluid view.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::window::Window;

use crate::audio::{AudioAdapter, AudioBands, AudioSource};
use crate::config::{grid_dims, Params, RenderMode, NUM_RENDER_STEPS};
use crate::config::{BACKGROUND_COLOR, INK_COLOR};
use crate::error::{CaptureError, GpuError, SimulationError};
use crate::forces::{audio_forces, ForceEvent};
use crate::gpu::GpuContext;
use crate::particles::ParticleSystem;
use crate::pointer::PointerTracker;
use crate::render::Renderer;
use crate::solver::VelocitySolver;
use crate::trails::TrailAccumulator;

pub struct FluidSim {
    ctx: GpuContext,
    solver: VelocitySolver,
    particles: ParticleSystem,
    trails: TrailAccumulator,
    renderer: Renderer,
    pointer: PointerTracker,
    audio: AudioAdapter,
    source: Box<dyn AudioSource>,
    params: Params,
    pending: Vec<ForceEvent>,
    rng: StdRng,
    start: Instant,
}

impl FluidSim {
    pub async fn new(
        window: Arc<Window>,
        source: Box<dyn AudioSource>,
    ) -> Result<Self, SimulationError> {
        let ctx = GpuContext::new(window).await?;
        let (width, height) = (ctx.config.width, ctx.config.height);
        let (gw, gh) = grid_dims(width, height);
        let params = Params::default();
        let mut rng = StdRng::from_entropy();

        let solver = VelocitySolver::new(&ctx, gw, gh);
        let particles = ParticleSystem::new(&ctx, width, height, &mut rng);
        particles.set_grid(&ctx.queue, (gw, gh));
        let trails = TrailAccumulator::new(
            &ctx,
            width,
            height,
            (gw, gh),
            particles.count(),
            params.fade_increment(),
        );
        let renderer = Renderer::new(&ctx, (width, height), (gw, gh));

        Ok(Self {
            ctx,
            solver,
            particles,
            trails,
            renderer,
            pointer: PointerTracker::new(),
            audio: AudioAdapter::new(
                params.mic_sensitivity,
                AudioBands::new(params.bass_impact, params.mid_impact, params.treble_impact),
            ),
            source,
            params,
            pending: Vec::new(),
            rng,
            start: Instant::now(),
        })
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.ctx.config.width, self.ctx.config.height)
    }

    pub fn render_mode(&self) -> RenderMode {
        self.params.render_mode
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.params.render_mode = mode;
    }

    pub fn mic_enabled(&self) -> bool {
        self.params.mic_enabled
    }

    pub fn toggle_mic(&mut self) {
        self.params.mic_enabled = !self.params.mic_enabled;
    }

    pub fn trail_length(&self) -> f32 {
        self.params.trail_length
    }

    /// Adjust how long ink lingers. Takes effect next frame.
    pub fn set_trail_length(&mut self, length: f32) {
        self.params.trail_length = length.clamp(1.0, 100.0);
        self.trails
            .set_fade(&self.ctx.queue, self.params.fade_increment());
    }

    /// Update the audio gain parameters. Takes effect next frame.
    pub fn set_audio_gains(&mut self, sensitivity: f32, impacts: AudioBands) {
        self.params.mic_sensitivity = sensitivity;
        self.params.bass_impact = impacts.bass;
        self.params.mid_impact = impacts.mid;
        self.params.treble_impact = impacts.treble;
        self.audio.set_sensitivity(sensitivity);
        self.audio.set_impacts(impacts);
    }

    /// Route a pointer position, in window coordinates.
    pub fn pointer_moved(&mut self, id: u64, pos: Vec2) {
        let height = self.ctx.config.height as f32;
        if let Some(event) = self.pointer.moved(id, pos, height) {
            self.pending.push(event);
        }
    }

    pub fn pointer_released(&mut self, id: u64) {
        self.pointer.released(id);
    }

    /// Simulate and present one frame.
    pub fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        if self.params.mic_enabled {
            let raw = self.source.sample();
            if let Some(levels) = self.audio.ingest(raw, Instant::now()) {
                let viewport = Vec2::new(self.ctx.config.width as f32, self.ctx.config.height as f32);
                let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
                self.pending
                    .extend(audio_forces(&levels, elapsed_ms, viewport, &mut self.rng));
            }
        }

        let frame = self.ctx.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for event in std::mem::take(&mut self.pending) {
            self.solver.apply_force(&self.ctx.device, &mut encoder, &event);
        }
        self.solver.step(&self.ctx.device, &mut encoder);

        if self.params.render_mode == RenderMode::Fluid {
            self.particles.age(&self.ctx.device, &mut encoder);
            self.trails.fade(&self.ctx.device, &mut encoder);
            for _ in 0..NUM_RENDER_STEPS {
                self.particles
                    .advect(&self.ctx.device, &mut encoder, self.solver.velocity());
                self.trails.splat(
                    &self.ctx.device,
                    &mut encoder,
                    &self.particles,
                    self.solver.velocity(),
                );
            }
            self.trails.resolve(&self.ctx.device, &mut encoder);
        }

        self.renderer.render(
            &self.ctx,
            &mut encoder,
            &view,
            self.params.render_mode,
            self.trails.trail(),
            self.solver.velocity(),
            self.solver.pressure(),
        );

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Hard reset for a new window size: reconfigure the surface, drop
    /// all field state, reseed particles, clear trails.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        let (width, height) = (self.ctx.config.width, self.ctx.config.height);
        let grid = grid_dims(width, height);

        self.solver.resize(&self.ctx, grid.0, grid.1);
        self.particles.resize(&self.ctx, width, height, &mut self.rng);
        self.particles.set_grid(&self.ctx.queue, grid);
        self.trails.resize(
            &self.ctx,
            width,
            height,
            grid,
            self.particles.count(),
            self.params.fade_increment(),
        );
        self.renderer.update(&self.ctx.queue, (width, height), grid);
        self.pointer.clear();
        self.pending.clear();
    }

    /// Save the fluid view as a PNG, regardless of the current mode.
    pub fn capture_png(&self, path: &Path) -> Result<(), CaptureError> {
        let (width, height) = self.viewport();

        let trail_bytes =
            self.read_buffer(self.trails.trail().front(), self.trails.trail().size_bytes())?;
        let trail: &[f32] = bytemuck::cast_slice(&trail_bytes);

        let pixels = composite_rgba(trail, width, height);
        image::save_buffer(
            path,
            &pixels,
            width,
            height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }

    /// Copy a storage buffer back to the CPU. Blocks on the device.
    fn read_buffer(&self, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>, GpuError> {
        let staging = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = std::sync::mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        self.ctx
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;
        rx.recv()
            .map_err(|_| GpuError::BufferMapping("map callback dropped".into()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let data = staging.slice(..).get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}

/// CPU mirror of the fluid composite: ink over paper, flipped from field
/// space (y-up) to image space (y-down). Velocity tint is already baked
/// into the trail values at deposit time.
fn composite_rgba(trail: &[f32], width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for image_y in 0..height {
        let field_y = height - 1 - image_y;
        for x in 0..width {
            let t = trail[(field_y * width + x) as usize].clamp(0.0, 1.0);
            for c in 0..3 {
                let value = BACKGROUND_COLOR[c] + (INK_COLOR[c] - BACKGROUND_COLOR[c]) * t;
                pixels.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
            pixels.push(255);
        }
    }
    pixels
}
