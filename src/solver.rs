//! Incompressible velocity solver.
//!
//! Classic stable-fluids pipeline on the coarse grid, one cell per 8x8
//! viewport pixels, all fields toroidal:
//!
//! 1. semi-Lagrangian self-advection of velocity
//! 2. divergence of the advected field
//! 3. a few Jacobi iterations on the pressure Poisson equation, warm
//!    started from last frame's pressure
//! 4. pressure-gradient subtraction
//!
//! Forces are splatted before the solve so the projection cleans up the
//! divergence they introduce in the same frame.

use bytemuck::{Pod, Zeroable};

use crate::config::{
    MAX_VELOCITY, NUM_JACOBI_STEPS, PRESSURE_ALPHA, PRESSURE_BETA, VELOCITY_SCALE_FACTOR,
};
use crate::forces::ForceEvent;
use crate::gpu::{workgroups_2d, GpuContext, Kernel, Layer};
use crate::shader_utils::{WGSL_SAMPLE_VELOCITY, WGSL_WRAP_INDEX};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GridParams {
    dims: [i32; 2],
    cell_size: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct JacobiParams {
    dims: [i32; 2],
    alpha: f32,
    beta: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ForceParams {
    p1: [f32; 2],
    p2: [f32; 2],
    vector: [f32; 2],
    dims: [i32; 2],
    thickness: f32,
    end_caps: u32,
    scale: f32,
    cell_size: f32,
}

impl ForceParams {
    fn new(event: &ForceEvent, dims: (u32, u32)) -> Self {
        Self {
            p1: event.p1.to_array(),
            p2: event.p2.to_array(),
            vector: event.vector.to_array(),
            dims: [dims.0 as i32, dims.1 as i32],
            thickness: event.thickness,
            end_caps: event.end_caps as u32,
            scale: event.scale,
            cell_size: VELOCITY_SCALE_FACTOR as f32,
        }
    }
}

pub struct VelocitySolver {
    velocity: Layer,
    divergence: Layer,
    pressure: Layer,
    advect: Kernel,
    divergence_kernel: Kernel,
    jacobi: Kernel,
    gradient: Kernel,
    splat: Kernel,
}

impl VelocitySolver {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let device = &ctx.device;
        let solver = Self {
            velocity: Layer::new(device, "Velocity", width, height, 2, 2),
            divergence: Layer::new(device, "Divergence", width, height, 1, 1),
            pressure: Layer::new(device, "Pressure", width, height, 1, 2),
            advect: Kernel::new(device, "Advect Velocity", &advect_shader(), 1, 1, 16),
            divergence_kernel: Kernel::new(device, "Divergence", &divergence_shader(), 1, 1, 16),
            jacobi: Kernel::new(device, "Jacobi Pressure", &jacobi_shader(), 2, 1, 16),
            gradient: Kernel::new(device, "Subtract Gradient", &gradient_shader(), 2, 1, 16),
            splat: Kernel::new(device, "Force Splat", &splat_shader(), 1, 1, 48),
        };
        solver.upload_params(&ctx.queue);
        solver
    }

    pub fn grid(&self) -> (u32, u32) {
        (self.velocity.width(), self.velocity.height())
    }

    pub fn velocity(&self) -> &Layer {
        &self.velocity
    }

    pub fn pressure(&self) -> &Layer {
        &self.pressure
    }

    fn upload_params(&self, queue: &wgpu::Queue) {
        let dims = [self.velocity.width() as i32, self.velocity.height() as i32];
        let grid = GridParams {
            dims,
            cell_size: VELOCITY_SCALE_FACTOR as f32,
            _pad: 0.0,
        };
        self.advect.set_params(queue, &grid);
        self.divergence_kernel.set_params(queue, &grid);
        self.gradient.set_params(queue, &grid);
        self.jacobi.set_params(
            queue,
            &JacobiParams {
                dims,
                alpha: PRESSURE_ALPHA,
                beta: PRESSURE_BETA,
            },
        );
    }

    /// Splat one force into the velocity field.
    pub fn apply_force(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        event: &ForceEvent,
    ) {
        let wg = workgroups_2d(self.velocity.width(), self.velocity.height());
        self.splat.dispatch_with(
            device,
            encoder,
            &[self.velocity.front(), self.velocity.back()],
            &ForceParams::new(event, self.grid()),
            wg,
        );
        self.velocity.swap();
    }

    /// One frame of advection and pressure projection.
    pub fn step(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        let wg = workgroups_2d(self.velocity.width(), self.velocity.height());

        self.advect.dispatch(
            device,
            encoder,
            &[self.velocity.front(), self.velocity.back()],
            wg,
        );
        self.velocity.swap();

        self.divergence_kernel.dispatch(
            device,
            encoder,
            &[self.velocity.front(), self.divergence.front()],
            wg,
        );

        // Warm start: pressure keeps last frame's solution.
        for _ in 0..NUM_JACOBI_STEPS {
            self.jacobi.dispatch(
                device,
                encoder,
                &[
                    self.pressure.front(),
                    self.divergence.front(),
                    self.pressure.back(),
                ],
                wg,
            );
            self.pressure.swap();
        }

        self.gradient.dispatch(
            device,
            encoder,
            &[
                self.pressure.front(),
                self.velocity.front(),
                self.velocity.back(),
            ],
            wg,
        );
        self.velocity.swap();
    }

    /// Drop all field state and reallocate for a new grid.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        self.velocity.resize(&ctx.device, width, height);
        self.divergence.resize(&ctx.device, width, height);
        self.pressure.resize(&ctx.device, width, height);
        self.upload_params(&ctx.queue);
    }
}

fn advect_shader() -> String {
    format!(
        r#"
struct GridParams {{
    dims: vec2<i32>,
    cell_size: f32,
    _pad: f32,
}}

@group(0) @binding(0) var<storage, read> src: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read_write> dst: array<vec2<f32>>;
@group(0) @binding(2) var<uniform> params: GridParams;
{WGSL_WRAP_INDEX}
{WGSL_SAMPLE_VELOCITY}
@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let cell = vec2<i32>(gid.xy);
    let dims = params.dims;
    if (cell.x >= dims.x || cell.y >= dims.y) {{
        return;
    }}
    let idx = u32(cell.y * dims.x + cell.x);
    let pos = vec2<f32>(cell) + 0.5;
    let vel = src[idx];
    dst[idx] = sample_velocity(pos - vel / params.cell_size, dims);
}}
"#
    )
}

fn divergence_shader() -> String {
    format!(
        r#"
struct GridParams {{
    dims: vec2<i32>,
    cell_size: f32,
    _pad: f32,
}}

@group(0) @binding(0) var<storage, read> velocity: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read_write> divergence: array<f32>;
@group(0) @binding(2) var<uniform> params: GridParams;
{WGSL_WRAP_INDEX}
@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let cell = vec2<i32>(gid.xy);
    let dims = params.dims;
    if (cell.x >= dims.x || cell.y >= dims.y) {{
        return;
    }}
    let e = velocity[wrap_index(cell + vec2<i32>(1, 0), dims)].x;
    let w = velocity[wrap_index(cell - vec2<i32>(1, 0), dims)].x;
    let n = velocity[wrap_index(cell + vec2<i32>(0, 1), dims)].y;
    let s = velocity[wrap_index(cell - vec2<i32>(0, 1), dims)].y;
    divergence[u32(cell.y * dims.x + cell.x)] = 0.5 * ((e - w) + (n - s));
}}
"#
    )
}

fn jacobi_shader() -> String {
    format!(
        r#"
struct JacobiParams {{
    dims: vec2<i32>,
    alpha: f32,
    beta: f32,
}}

@group(0) @binding(0) var<storage, read> pressure: array<f32>;
@group(0) @binding(1) var<storage, read> divergence: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<f32>;
@group(0) @binding(3) var<uniform> params: JacobiParams;
{WGSL_WRAP_INDEX}
@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let cell = vec2<i32>(gid.xy);
    let dims = params.dims;
    if (cell.x >= dims.x || cell.y >= dims.y) {{
        return;
    }}
    let idx = u32(cell.y * dims.x + cell.x);
    let e = pressure[wrap_index(cell + vec2<i32>(1, 0), dims)];
    let w = pressure[wrap_index(cell - vec2<i32>(1, 0), dims)];
    let n = pressure[wrap_index(cell + vec2<i32>(0, 1), dims)];
    let s = pressure[wrap_index(cell - vec2<i32>(0, 1), dims)];
    dst[idx] = (e + w + n + s + params.alpha * divergence[idx]) * params.beta;
}}
"#
    )
}

fn gradient_shader() -> String {
    format!(
        r#"
struct GridParams {{
    dims: vec2<i32>,
    cell_size: f32,
    _pad: f32,
}}

@group(0) @binding(0) var<storage, read> pressure: array<f32>;
@group(0) @binding(1) var<storage, read> velocity: array<vec2<f32>>;
@group(0) @binding(2) var<storage, read_write> dst: array<vec2<f32>>;
@group(0) @binding(3) var<uniform> params: GridParams;
{WGSL_WRAP_INDEX}
@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let cell = vec2<i32>(gid.xy);
    let dims = params.dims;
    if (cell.x >= dims.x || cell.y >= dims.y) {{
        return;
    }}
    let idx = u32(cell.y * dims.x + cell.x);
    let e = pressure[wrap_index(cell + vec2<i32>(1, 0), dims)];
    let w = pressure[wrap_index(cell - vec2<i32>(1, 0), dims)];
    let n = pressure[wrap_index(cell + vec2<i32>(0, 1), dims)];
    let s = pressure[wrap_index(cell - vec2<i32>(0, 1), dims)];
    dst[idx] = velocity[idx] - 0.5 * vec2<f32>(e - w, n - s);
}}
"#
    )
}

fn splat_shader() -> String {
    format!(
        r#"
struct ForceParams {{
    p1: vec2<f32>,
    p2: vec2<f32>,
    vector: vec2<f32>,
    dims: vec2<i32>,
    thickness: f32,
    end_caps: u32,
    scale: f32,
    cell_size: f32,
}}

@group(0) @binding(0) var<storage, read> src: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read_write> dst: array<vec2<f32>>;
@group(0) @binding(2) var<uniform> params: ForceParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let cell = vec2<i32>(gid.xy);
    let dims = params.dims;
    if (cell.x >= dims.x || cell.y >= dims.y) {{
        return;
    }}
    let idx = u32(cell.y * dims.x + cell.x);
    var v = src[idx];

    // Cell center in viewport pixels, where the segment lives.
    let px = (vec2<f32>(cell) + 0.5) * params.cell_size;
    let seg = params.p2 - params.p1;
    let len2 = dot(seg, seg);
    var t = 0.0;
    if (len2 > 0.0) {{
        t = dot(px - params.p1, seg) / len2;
    }}

    var dist = 1e10;
    if (params.end_caps != 0u) {{
        let on_seg = params.p1 + seg * clamp(t, 0.0, 1.0);
        dist = length(px - on_seg);
    }} else if (t >= 0.0 && t <= 1.0) {{
        dist = length(px - (params.p1 + seg * t));
    }}

    if (dist < params.thickness) {{
        let r = dist / params.thickness;
        v += params.vector * params.scale * (1.0 - r * r);
        let speed = length(v);
        if (speed > {max_velocity}) {{
            v *= {max_velocity} / speed;
        }}
    }}
    dst[idx] = v;
}}
"#,
        max_velocity = format_args!("{:?}", MAX_VELOCITY)
    )
}
