//! Present the simulation to the surface.
//!
//! Three ways to look at the same state:
//! - Fluid: the trail field composited as ink over paper. Velocity tint
//!   is already baked into the trail values at deposit time.
//! - Pressure: signed amplitude, warm for positive and cool for negative.
//! - Velocity: a grid of line glyphs, one per 10 px, scaled by the local
//!   velocity.
//!
//! Fields stay in storage buffers; fragment and vertex shaders index them
//! directly. Surface fragment coordinates are y-down while the fields are
//! y-up, so the fullscreen passes flip y when fetching.

use bytemuck::{Pod, Zeroable};

use crate::config::{
    RenderMode, BACKGROUND_COLOR, GLYPH_SCALE, GLYPH_SPACING, INK_COLOR, PRESSURE_RENDER_SCALE,
    VELOCITY_SCALE_FACTOR,
};
use crate::gpu::{GpuContext, Layer};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CompositeUniforms {
    viewport: [f32; 2],
    _pad: [f32; 2],
    background: [f32; 4],
    ink: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PressureUniforms {
    viewport: [f32; 2],
    grid: [i32; 2],
    cell_size: f32,
    amplitude_scale: f32,
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GlyphUniforms {
    viewport: [f32; 2],
    grid: [i32; 2],
    glyphs: [i32; 2],
    spacing: f32,
    scale: f32,
    cell_size: f32,
    _pad: [f32; 3],
}

struct Pipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
}

pub struct Renderer {
    composite: Pipeline,
    pressure: Pipeline,
    glyph: Pipeline,
    glyph_count: u32,
}

impl Renderer {
    pub fn new(ctx: &GpuContext, viewport: (u32, u32), grid: (u32, u32)) -> Self {
        let format = ctx.config.format;
        let mut renderer = Self {
            composite: create_pipeline(
                &ctx.device,
                "Composite",
                &composite_shader(),
                format,
                1,
                std::mem::size_of::<CompositeUniforms>() as u64,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            pressure: create_pipeline(
                &ctx.device,
                "Pressure View",
                &pressure_shader(),
                format,
                1,
                std::mem::size_of::<PressureUniforms>() as u64,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            glyph: create_pipeline(
                &ctx.device,
                "Velocity Glyphs",
                &glyph_shader(),
                format,
                1,
                std::mem::size_of::<GlyphUniforms>() as u64,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            glyph_count: 0,
        };
        renderer.update(&ctx.queue, viewport, grid);
        renderer
    }

    /// Refresh uniforms after a resize.
    pub fn update(&mut self, queue: &wgpu::Queue, viewport: (u32, u32), grid: (u32, u32)) {
        let vp = [viewport.0 as f32, viewport.1 as f32];
        let grid = [grid.0 as i32, grid.1 as i32];
        let cell_size = VELOCITY_SCALE_FACTOR as f32;
        let glyphs = [
            (vp[0] / GLYPH_SPACING).ceil() as i32,
            (vp[1] / GLYPH_SPACING).ceil() as i32,
        ];
        self.glyph_count = (glyphs[0] * glyphs[1]).max(0) as u32;

        queue.write_buffer(
            &self.composite.uniforms,
            0,
            bytemuck::bytes_of(&CompositeUniforms {
                viewport: vp,
                _pad: [0.0; 2],
                background: [
                    BACKGROUND_COLOR[0],
                    BACKGROUND_COLOR[1],
                    BACKGROUND_COLOR[2],
                    1.0,
                ],
                ink: [INK_COLOR[0], INK_COLOR[1], INK_COLOR[2], 1.0],
            }),
        );
        queue.write_buffer(
            &self.pressure.uniforms,
            0,
            bytemuck::bytes_of(&PressureUniforms {
                viewport: vp,
                grid,
                cell_size,
                amplitude_scale: PRESSURE_RENDER_SCALE,
                _pad: [0.0; 2],
            }),
        );
        queue.write_buffer(
            &self.glyph.uniforms,
            0,
            bytemuck::bytes_of(&GlyphUniforms {
                viewport: vp,
                grid,
                glyphs,
                spacing: GLYPH_SPACING,
                scale: GLYPH_SCALE,
                cell_size,
                _pad: [0.0; 3],
            }),
        );
    }

    /// Draw one frame into `view`.
    pub fn render(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        mode: RenderMode,
        trail: &Layer,
        velocity: &Layer,
        pressure: &Layer,
    ) {
        let clear = wgpu::Color {
            r: BACKGROUND_COLOR[0] as f64,
            g: BACKGROUND_COLOR[1] as f64,
            b: BACKGROUND_COLOR[2] as f64,
            a: 1.0,
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Present"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        match mode {
            RenderMode::Fluid => {
                let bind_group = bind(&ctx.device, &self.composite, &[trail.front()]);
                pass.set_pipeline(&self.composite.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            RenderMode::Pressure => {
                let bind_group = bind(&ctx.device, &self.pressure, &[pressure.front()]);
                pass.set_pipeline(&self.pressure.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            RenderMode::Velocity => {
                let bind_group = bind(&ctx.device, &self.glyph, &[velocity.front()]);
                pass.set_pipeline(&self.glyph.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..6, 0..self.glyph_count);
            }
        }
    }
}

fn bind(device: &wgpu::Device, pipeline: &Pipeline, buffers: &[&wgpu::Buffer]) -> wgpu::BindGroup {
    let mut entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .enumerate()
        .map(|(i, buffer)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    entries.push(wgpu::BindGroupEntry {
        binding: buffers.len() as u32,
        resource: pipeline.uniforms.as_entire_binding(),
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout: &pipeline.layout,
        entries: &entries,
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    format: wgpu::TextureFormat,
    num_storage: u32,
    uniform_size: u64,
    topology: wgpu::PrimitiveTopology,
) -> Pipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} Shader", label)),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let mut entries = Vec::new();
    for binding in 0..num_storage {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: num_storage,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{} Bind Group Layout", label)),
        entries: &entries,
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Pipeline Layout", label)),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{} Pipeline", label)),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{} Uniforms", label)),
        size: uniform_size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    Pipeline {
        pipeline,
        layout,
        uniforms,
    }
}

const FULLSCREEN_VS: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
    var corners = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    return vec4<f32>(corners[vi], 0.0, 1.0);
}
"#;

fn composite_shader() -> String {
    format!(
        r#"
struct Uniforms {{
    viewport: vec2<f32>,
    _pad: vec2<f32>,
    background: vec4<f32>,
    ink: vec4<f32>,
}}

@group(0) @binding(0) var<storage, read> trail: array<f32>;
@group(0) @binding(1) var<uniform> params: Uniforms;
{FULLSCREEN_VS}
@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {{
    // Surface coordinates are y-down; the field is y-up.
    let p = vec2<f32>(frag.x, params.viewport.y - frag.y);
    let dims = vec2<i32>(params.viewport);
    let px = clamp(vec2<i32>(floor(p)), vec2<i32>(0), dims - 1);
    let t = clamp(trail[u32(px.y * dims.x + px.x)], 0.0, 1.0);
    return vec4<f32>(mix(params.background.rgb, params.ink.rgb, t), 1.0);
}}
"#
    )
}

fn pressure_shader() -> String {
    format!(
        r#"
struct Uniforms {{
    viewport: vec2<f32>,
    grid: vec2<i32>,
    cell_size: f32,
    amplitude_scale: f32,
}}

@group(0) @binding(0) var<storage, read> pressure: array<f32>;
@group(0) @binding(1) var<uniform> params: Uniforms;
{FULLSCREEN_VS}
@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {{
    let p = vec2<f32>(frag.x, params.viewport.y - frag.y);
    let cell = clamp(vec2<i32>(p / params.cell_size), vec2<i32>(0), params.grid - 1);
    let value = pressure[u32(cell.y * params.grid.x + cell.x)] * params.amplitude_scale;

    let amp = clamp(abs(value), 0.0, 1.0);
    var tint = vec3<f32>(0.92, 0.26, 0.21);
    if (value < 0.0) {{
        tint = vec3<f32>(0.18, 0.36, 0.84);
    }}
    return vec4<f32>(mix(vec3<f32>(1.0), tint, amp), 1.0);
}}
"#
    )
}

fn glyph_shader() -> String {
    r#"
struct Uniforms {
    viewport: vec2<f32>,
    grid: vec2<i32>,
    glyphs: vec2<i32>,
    spacing: f32,
    scale: f32,
    cell_size: f32,
}

@group(0) @binding(0) var<storage, read> velocity: array<vec2<f32>>;
@group(0) @binding(1) var<uniform> params: Uniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) fade: f32,
}

@vertex
fn vs_main(
    @builtin(vertex_index) vi: u32,
    @builtin(instance_index) instance: u32,
) -> VertexOutput {
    let gi = vec2<i32>(
        i32(instance) % params.glyphs.x,
        i32(instance) / params.glyphs.x,
    );
    let origin = (vec2<f32>(gi) + 0.5) * params.spacing;

    let cell = clamp(
        vec2<i32>(origin / params.cell_size),
        vec2<i32>(0),
        params.grid - 1,
    );
    let v = velocity[u32(cell.y * params.grid.x + cell.x)];
    let tip = origin + v * params.scale;

    // Thin quad from origin to tip, half a pixel wide.
    var along = tip - origin;
    let len = length(along);
    if (len < 1e-5) {
        along = vec2<f32>(1e-5, 0.0);
    }
    let side = normalize(vec2<f32>(-along.y, along.x)) * 0.5;

    var corners = array<vec2<f32>, 6>(
        origin - side,
        tip - side,
        origin + side,
        origin + side,
        tip - side,
        tip + side,
    );
    let p = corners[vi];

    var out: VertexOutput;
    out.clip_position = vec4<f32>(p / params.viewport * 2.0 - 1.0, 0.0, 1.0);
    out.fade = clamp(len / params.spacing, 0.15, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, in.fade);
}
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_utils::validate_wgsl;

    #[test]
    fn test_composite_shader_validates() {
        validate_wgsl(&composite_shader()).expect("composite WGSL should be valid");
    }

    #[test]
    fn test_pressure_shader_validates() {
        validate_wgsl(&pressure_shader()).expect("pressure WGSL should be valid");
    }

    #[test]
    fn test_glyph_shader_validates() {
        validate_wgsl(&glyph_shader()).expect("glyph WGSL should be valid");
    }
}
