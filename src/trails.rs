//! Ink trail accumulation.
//!
//! The trail field is a full-resolution scalar layer. Each frame it fades
//! by a fixed decrement, then every particle sub-step deposits opacity at
//! the particle's pixel, tinted down where the fluid is slow. Deposits
//! from thousands of particles race, so they go through a fixed-point
//! `atomic<i32>` scratch buffer and a resolve pass folds them into the
//! float field, clamped to full ink.

use bytemuck::{Pod, Zeroable};

use crate::config::{PARTICLE_LIFETIME, VELOCITY_SCALE_FACTOR};
use crate::gpu::{workgroups_1d, workgroups_2d, GpuContext, Kernel, Layer};
use crate::particles::ParticleSystem;
use crate::shader_utils::{WGSL_SAMPLE_VELOCITY, WGSL_WRAP_INDEX};

/// Fixed-point scale for atomic deposits, 16.16.
const FIELD_SCALE: f32 = 65536.0;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FadeParams {
    dims: [i32; 2],
    fade: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SplatParams {
    viewport: [f32; 2],
    grid: [i32; 2],
    count: u32,
    lifetime: i32,
    cell_size: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ResolveParams {
    dims: [i32; 2],
    _pad: [i32; 2],
}

pub struct TrailAccumulator {
    trail: Layer,
    deposits: Layer,
    fade_kernel: Kernel,
    splat_kernel: Kernel,
    resolve_kernel: Kernel,
    particle_capacity: u32,
    grid: (u32, u32),
}

impl TrailAccumulator {
    pub fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        grid: (u32, u32),
        particle_capacity: u32,
        fade_increment: f32,
    ) -> Self {
        let device = &ctx.device;
        let trails = Self {
            trail: Layer::new(device, "Trail", width, height, 1, 1),
            deposits: Layer::new(device, "Trail Deposits", width, height, 1, 1),
            fade_kernel: Kernel::new(device, "Fade Trails", &fade_shader(), 0, 1, 16),
            splat_kernel: Kernel::new(device, "Splat Particles", &splat_shader(), 3, 1, 32),
            resolve_kernel: Kernel::new(device, "Resolve Deposits", &resolve_shader(), 0, 2, 16),
            particle_capacity,
            grid,
        };
        trails.upload_params(&ctx.queue, fade_increment);
        trails
    }

    pub fn trail(&self) -> &Layer {
        &self.trail
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.trail.width(), self.trail.height())
    }

    fn upload_params(&self, queue: &wgpu::Queue, fade_increment: f32) {
        let dims = [self.trail.width() as i32, self.trail.height() as i32];
        self.fade_kernel.set_params(
            queue,
            &FadeParams {
                dims,
                fade: fade_increment,
                _pad: 0.0,
            },
        );
        self.splat_kernel.set_params(
            queue,
            &SplatParams {
                viewport: [self.trail.width() as f32, self.trail.height() as f32],
                grid: [self.grid.0 as i32, self.grid.1 as i32],
                count: self.particle_capacity,
                lifetime: PARTICLE_LIFETIME as i32,
                cell_size: VELOCITY_SCALE_FACTOR as f32,
                _pad: 0.0,
            },
        );
        self.resolve_kernel
            .set_params(queue, &ResolveParams { dims, _pad: [0; 2] });
    }

    /// Trail length changed at runtime.
    pub fn set_fade(&self, queue: &wgpu::Queue, fade_increment: f32) {
        self.fade_kernel.set_params(
            queue,
            &FadeParams {
                dims: [self.trail.width() as i32, self.trail.height() as i32],
                fade: fade_increment,
                _pad: 0.0,
            },
        );
    }

    /// Per-frame decay toward paper.
    pub fn fade(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        self.fade_kernel.dispatch(
            device,
            encoder,
            &[self.trail.front()],
            workgroups_2d(self.trail.width(), self.trail.height()),
        );
    }

    /// Deposit one sub-step of particle ink into the scratch buffer,
    /// tinted by the local fluid speed.
    pub fn splat(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        particles: &ParticleSystem,
        velocity: &Layer,
    ) {
        self.splat_kernel.dispatch(
            device,
            encoder,
            &[
                particles.positions().front(),
                particles.ages().front(),
                velocity.front(),
                self.deposits.front(),
            ],
            workgroups_1d(particles.count()),
        );
    }

    /// Fold accumulated deposits into the trail field and clear scratch.
    pub fn resolve(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        self.resolve_kernel.dispatch(
            device,
            encoder,
            &[self.deposits.front(), self.trail.front()],
            workgroups_2d(self.trail.width(), self.trail.height()),
        );
    }

    /// Hard reset for a new viewport. Trails clear to paper.
    pub fn resize(
        &mut self,
        ctx: &GpuContext,
        width: u32,
        height: u32,
        grid: (u32, u32),
        particle_capacity: u32,
        fade_increment: f32,
    ) {
        self.trail.resize(&ctx.device, width, height);
        self.deposits.resize(&ctx.device, width, height);
        self.grid = grid;
        self.particle_capacity = particle_capacity;
        self.upload_params(&ctx.queue, fade_increment);
    }
}

fn fade_shader() -> String {
    r#"
struct FadeParams {
    dims: vec2<i32>,
    fade: f32,
}

@group(0) @binding(0) var<storage, read_write> trail: array<f32>;
@group(0) @binding(1) var<uniform> params: FadeParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let cell = vec2<i32>(gid.xy);
    if (cell.x >= params.dims.x || cell.y >= params.dims.y) {
        return;
    }
    let idx = u32(cell.y * params.dims.x + cell.x);
    trail[idx] = max(trail[idx] - params.fade, 0.0);
}
"#
    .to_string()
}

fn splat_shader() -> String {
    format!(
        r#"
struct SplatParams {{
    viewport: vec2<f32>,
    grid: vec2<i32>,
    count: u32,
    lifetime: i32,
    cell_size: f32,
    _pad: f32,
}}

@group(0) @binding(0) var<storage, read> positions: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read> ages: array<i32>;
@group(0) @binding(2) var<storage, read> src: array<vec2<f32>>;
@group(0) @binding(3) var<storage, read_write> deposits: array<atomic<i32>>;
@group(0) @binding(4) var<uniform> params: SplatParams;
{WGSL_WRAP_INDEX}
{WGSL_SAMPLE_VELOCITY}
@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let i = gid.x;
    if (i >= params.count) {{
        return;
    }}

    // Fade in fast at the start of life, fade out near the end.
    let age_fraction = f32(ages[i]) / f32(params.lifetime);
    let opacity = min(age_fraction * 10.0, 1.0)
        * (1.0 - clamp((age_fraction - 0.9) * 10.0, 0.0, 1.0));
    if (opacity <= 0.0) {{
        return;
    }}

    var p = positions[i].xy + positions[i].zw;
    p -= params.viewport * floor(p / params.viewport);

    // Ink reads darker where the fluid moves fast.
    let v = sample_velocity(p / params.cell_size, params.grid);
    let tint = clamp(dot(v, v) * 0.05 + 0.7, 0.0, 1.0);

    let px = vec2<i32>(floor(p));
    let dims = vec2<i32>(params.viewport);
    let cx = clamp(px.x, 0, dims.x - 1);
    let cy = clamp(px.y, 0, dims.y - 1);
    let idx = u32(cy * dims.x + cx);
    atomicAdd(&deposits[idx], i32(opacity * tint * {field_scale}));
}}
"#,
        field_scale = format_args!("{:?}", FIELD_SCALE)
    )
}

fn resolve_shader() -> String {
    format!(
        r#"
struct ResolveParams {{
    dims: vec2<i32>,
    _pad: vec2<i32>,
}}

@group(0) @binding(0) var<storage, read_write> deposits: array<atomic<i32>>;
@group(0) @binding(1) var<storage, read_write> trail: array<f32>;
@group(0) @binding(2) var<uniform> params: ResolveParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let cell = vec2<i32>(gid.xy);
    if (cell.x >= params.dims.x || cell.y >= params.dims.y) {{
        return;
    }}
    let idx = u32(cell.y * params.dims.x + cell.x);
    let deposited = f32(atomicExchange(&deposits[idx], 0)) / {field_scale};
    trail[idx] = clamp(trail[idx] + deposited, 0.0, 1.0);
}}
"#,
        field_scale = format_args!("{:?}", FIELD_SCALE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_utils::validate_wgsl;

    #[test]
    fn test_fade_shader_validates() {
        validate_wgsl(&fade_shader()).expect("fade WGSL should be valid");
    }

    #[test]
    fn test_splat_shader_validates() {
        validate_wgsl(&splat_shader()).expect("splat WGSL should be valid");
    }

    #[test]
    fn test_resolve_shader_validates() {
        validate_wgsl(&resolve_shader()).expect("resolve WGSL should be valid");
    }

    #[test]
    fn test_opacity_envelope() {
        // CPU mirror of the splat kernel's opacity curve.
        let opacity = |age: i32| -> f32 {
            let af = age as f32 / PARTICLE_LIFETIME as f32;
            (af * 10.0).min(1.0) * (1.0 - ((af - 0.9) * 10.0).clamp(0.0, 1.0))
        };
        // Respawn frame deposits nothing.
        assert_eq!(opacity(0), 0.0);
        // Ramps in over the first 10% of life.
        assert!((opacity(50) - 0.5).abs() < 1e-6);
        assert_eq!(opacity(100), 1.0);
        // Full ink through the middle of life.
        assert_eq!(opacity(500), 1.0);
        assert_eq!(opacity(900), 1.0);
        // Fades back out over the last 10%.
        assert!((opacity(950) - 0.5).abs() < 1e-5);
        assert!(opacity(999) < 0.02);
    }
}
