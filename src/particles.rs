//! Tracer particles.
//!
//! Each particle stores its position as an absolute anchor plus a small
//! displacement (`vec4`: anchor.xy, offset.zw). Integration only touches
//! the offset; once it grows past a threshold it is folded back into the
//! anchor. This keeps f32 precision stable over thousand-frame lifetimes
//! on large viewports.
//!
//! Ages run 0..lifetime and roll over to 0; the advection kernel treats
//! age 0 as "respawn at seed position this frame". Seed positions and
//! starting ages come from the CPU so respawns land uniformly across the
//! viewport and lifetimes stay staggered.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;

use crate::config::{
    particle_count, NUM_RENDER_STEPS, PARTICLE_LIFETIME, POSITION_FOLD_THRESHOLD,
    VELOCITY_SCALE_FACTOR,
};
use crate::gpu::{workgroups_1d, GpuContext, Kernel, Layer};
use crate::shader_utils::{WGSL_SAMPLE_VELOCITY, WGSL_WRAP_INDEX};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct AdvectParams {
    grid_dims: [i32; 2],
    viewport: [f32; 2],
    count: u32,
    dt: f32,
    cell_size: f32,
    fold_threshold: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct AgeParams {
    count: u32,
    lifetime: i32,
    _pad: [u32; 2],
}

pub struct ParticleSystem {
    positions: Layer,
    initials: Layer,
    ages: Layer,
    advect: Kernel,
    age_kernel: Kernel,
    count: u32,
    viewport: Vec2,
}

impl ParticleSystem {
    pub fn new<R: Rng>(ctx: &GpuContext, width: u32, height: u32, rng: &mut R) -> Self {
        let count = particle_count(width, height);
        let device = &ctx.device;
        let mut system = Self {
            positions: Layer::new(device, "Particle Positions", count, 1, 4, 2),
            initials: Layer::new(device, "Particle Seeds", count, 1, 2, 1),
            ages: Layer::new(device, "Particle Ages", count, 1, 1, 1),
            advect: Kernel::new(device, "Advect Particles", &advect_shader(), 4, 1, 32),
            age_kernel: Kernel::new(device, "Age Particles", &age_shader(), 0, 1, 16),
            count,
            viewport: Vec2::new(width as f32, height as f32),
        };
        system.seed(ctx, rng);
        system
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn positions(&self) -> &Layer {
        &self.positions
    }

    pub fn ages(&self) -> &Layer {
        &self.ages
    }

    /// Reseed every particle uniformly across the viewport with staggered
    /// ages.
    fn seed<R: Rng>(&mut self, ctx: &GpuContext, rng: &mut R) {
        let (positions, initials, ages) =
            seed_data(self.count, self.viewport.x, self.viewport.y, rng);
        self.positions.write(&ctx.queue, bytemuck::cast_slice(&positions));
        self.initials.write(&ctx.queue, bytemuck::cast_slice(&initials));
        self.ages.write(&ctx.queue, bytemuck::cast_slice(&ages));

        self.age_kernel.set_params(
            &ctx.queue,
            &AgeParams {
                count: self.count,
                lifetime: PARTICLE_LIFETIME as i32,
                _pad: [0; 2],
            },
        );
    }

    /// Upload advect params with the solver's grid dims. Must be called
    /// after construction and after every resize; the rounded-up solver
    /// grid is not derivable from the viewport alone here.
    pub fn set_grid(&self, queue: &wgpu::Queue, grid: (u32, u32)) {
        self.advect.set_params(
            queue,
            &AdvectParams {
                grid_dims: [grid.0 as i32, grid.1 as i32],
                viewport: self.viewport.to_array(),
                count: self.count,
                dt: 1.0 / NUM_RENDER_STEPS as f32,
                cell_size: VELOCITY_SCALE_FACTOR as f32,
                fold_threshold: POSITION_FOLD_THRESHOLD,
            },
        );
    }

    /// Advance every age by one frame, rolling over at the lifetime.
    pub fn age(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        self.age_kernel
            .dispatch(device, encoder, &[self.ages.front()], workgroups_1d(self.count));
    }

    /// One RK2 sub-step through the velocity field.
    pub fn advect(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        velocity: &Layer,
    ) {
        self.advect.dispatch(
            device,
            encoder,
            &[
                velocity.front(),
                self.positions.front(),
                self.initials.front(),
                self.ages.front(),
                self.positions.back(),
            ],
            workgroups_1d(self.count),
        );
        self.positions.swap();
    }

    /// Hard reset for a new viewport: new count, new seeds, new ages.
    pub fn resize<R: Rng>(&mut self, ctx: &GpuContext, width: u32, height: u32, rng: &mut R) {
        self.count = particle_count(width, height);
        self.viewport = Vec2::new(width as f32, height as f32);
        self.positions.resize(&ctx.device, self.count, 1);
        self.initials.resize(&ctx.device, self.count, 1);
        self.ages.resize(&ctx.device, self.count, 1);
        self.seed(ctx, rng);
    }
}

/// CPU-side seed data: positions (anchor + zero offset), seed positions,
/// staggered ages.
fn seed_data<R: Rng>(
    count: u32,
    width: f32,
    height: f32,
    rng: &mut R,
) -> (Vec<[f32; 4]>, Vec<[f32; 2]>, Vec<i32>) {
    let mut positions = Vec::with_capacity(count as usize);
    let mut initials = Vec::with_capacity(count as usize);
    let mut ages = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let x = rng.gen::<f32>() * width;
        let y = rng.gen::<f32>() * height;
        positions.push([x, y, 0.0, 0.0]);
        initials.push([x, y]);
        ages.push(rng.gen_range(0..PARTICLE_LIFETIME as i32));
    }
    (positions, initials, ages)
}

fn advect_shader() -> String {
    format!(
        r#"
struct AdvectParams {{
    grid_dims: vec2<i32>,
    viewport: vec2<f32>,
    count: u32,
    dt: f32,
    cell_size: f32,
    fold_threshold: f32,
}}

@group(0) @binding(0) var<storage, read> src: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read> positions_in: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> seeds: array<vec2<f32>>;
@group(0) @binding(3) var<storage, read> ages: array<i32>;
@group(0) @binding(4) var<storage, read_write> positions_out: array<vec4<f32>>;
@group(0) @binding(5) var<uniform> params: AdvectParams;
{WGSL_WRAP_INDEX}
{WGSL_SAMPLE_VELOCITY}
@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let i = gid.x;
    if (i >= params.count) {{
        return;
    }}

    // Age 0 means this particle respawns at its seed this frame.
    if (ages[i] < 1) {{
        positions_out[i] = vec4<f32>(seeds[i], 0.0, 0.0);
        return;
    }}

    var anchor = positions_in[i].xy;
    var offset = positions_in[i].zw;
    let p1 = anchor + offset;

    // RK2: sample at the midpoint of the step.
    let v1 = sample_velocity(p1 / params.cell_size, params.grid_dims);
    let mid = p1 + v1 * (0.5 * params.dt);
    let v2 = sample_velocity(mid / params.cell_size, params.grid_dims);
    offset += v2 * params.dt;

    if (dot(offset, offset) > params.fold_threshold) {{
        anchor += offset;
        anchor -= params.viewport * floor(anchor / params.viewport);
        offset = vec2<f32>(0.0);
    }}
    positions_out[i] = vec4<f32>(anchor, offset);
}}
"#
    )
}

fn age_shader() -> String {
    r#"
struct AgeParams {
    count: u32,
    lifetime: i32,
}

@group(0) @binding(0) var<storage, read_write> ages: array<i32>;
@group(0) @binding(1) var<uniform> params: AgeParams;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.count) {
        return;
    }
    var age = ages[i] + 1;
    if (age >= params.lifetime) {
        age = 0;
    }
    ages[i] = age;
}
"#
    .to_string()
}
