//! Shared WGSL snippets.
//!
//! The fields wrap toroidally and live in storage buffers, so every
//! kernel that touches neighbors needs the same wrapped-index helper, and
//! anything sampling velocity at a continuous position needs the manual
//! bilinear fetch. Kernels splice these in with `format!`.

/// Wrapped 2D cell coordinate to linear buffer index.
pub const WGSL_WRAP_INDEX: &str = r#"
fn wrap_index(cell: vec2<i32>, dims: vec2<i32>) -> u32 {
    let w = ((cell % dims) + dims) % dims;
    return u32(w.y * dims.x + w.x);
}
"#;

/// Bilinear velocity fetch with wrap, in cell-center coordinates.
/// Expects a `src: array<vec2<f32>>` binding in scope.
pub const WGSL_SAMPLE_VELOCITY: &str = r#"
fn sample_velocity(pos: vec2<f32>, dims: vec2<i32>) -> vec2<f32> {
    let p = pos - 0.5;
    let base = vec2<i32>(floor(p));
    let f = fract(p);
    let v00 = src[wrap_index(base, dims)];
    let v10 = src[wrap_index(base + vec2<i32>(1, 0), dims)];
    let v01 = src[wrap_index(base + vec2<i32>(0, 1), dims)];
    let v11 = src[wrap_index(base + vec2<i32>(1, 1), dims)];
    return mix(mix(v00, v10, f.x), mix(v01, v11, f.x), f.y);
}
"#;

/// Validates WGSL code using naga. Test builds only.
#[cfg(test)]
pub fn validate_wgsl(code: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(code)
        .map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(code)))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map(|_| ())
        .map_err(|e| format!("WGSL validation error: {:?}", e))
}
