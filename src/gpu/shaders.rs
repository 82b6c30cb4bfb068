//! WGSL compute shaders for the training kernels.
//!
//! Every buffer is column-major: element `(r, c)` of a matrix with `rows`
//! rows is at `c * rows + r`. Element-wise kernels run one invocation per
//! output element, dispatched over a 2D grid of 64-wide workgroups so that
//! large matrices stay under the per-dimension dispatch limit.
//!
//! Shaders other than [`ADAM_SHADER`] are concatenated after [`COMMON`].

/// Shared uniform layout, index helper and activation functions.
///
/// Field meaning per kernel:
///
/// | Kernel | rows | cols | inner | mode | scale | reg |
/// |--------|------|------|-------|------|-------|-----|
/// | forward | out rows | examples | in rows | activation | - | - |
/// | back_activation | dz rows | examples | next rows | activation | - | - |
/// | set_dw | dw rows | dw cols | examples | - | coefficiant | reg |
/// | set_db | dz rows | examples | - | - | coefficiant | - |
/// | update | - | - | - | - | learn_mult | - |
/// | reduce | - | - | - | 0 = loss, 1 = squares | - | - |
/// | draw_pixels | out rows | - | - | 1 = discrete | - | - |
pub const COMMON: &str = r#"
struct Dims {
    rows: u32,
    cols: u32,
    inner: u32,
    mode: u32,
    scale: f32,
    reg: f32,
    count: u32,
    slot: u32,
}

const WORKGROUP: u32 = 64u;

fn flat_index(gid: vec3<u32>, groups: vec3<u32>) -> u32 {
    return gid.x + gid.y * groups.x * WORKGROUP;
}

fn activate(x: f32, mode: u32) -> f32 {
    var y = x;
    switch mode {
        case 0u: { y = 1.0 / (1.0 + exp(-x)); }
        case 1u: { y = tanh(x); }
        case 2u: { y = max(x, 0.0); }
        case 3u: { y = select(0.01 * x, x, x > 0.0); }
        case 4u: { y = sin(x); }
        default: {}
    }
    return y;
}

fn derivative(a: f32, mode: u32) -> f32 {
    var d = 1.0;
    switch mode {
        case 0u: { d = a * (1.0 - a); }
        case 1u: { d = 1.0 - a * a; }
        case 2u: { d = select(0.0, 1.0, a > 0.0); }
        case 3u: { d = select(0.01, 1.0, a > 0.0); }
        case 4u: { d = sqrt(max(1.0 - a * a, 0.0)); }
        default: {}
    }
    return d;
}
"#;

/// `dst = activate(w · input + bias)`.
pub const FORWARD_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> w: array<f32>;
@group(0) @binding(1) var<storage, read> input: array<f32>;
@group(0) @binding(2) var<storage, read> bias: array<f32>;
@group(0) @binding(3) var<storage, read_write> dst: array<f32>;
@group(0) @binding(4) var<uniform> dims: Dims;

@compute @workgroup_size(64, 1, 1)
fn forward_layer(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = flat_index(gid, groups);
    if (idx >= dims.count) {
        return;
    }
    let r = idx % dims.rows;
    let c = idx / dims.rows;
    var sum = bias[r];
    for (var k = 0u; k < dims.inner; k++) {
        sum += w[k * dims.rows + r] * input[c * dims.inner + k];
    }
    dst[idx] = activate(sum, dims.mode);
}
"#;

/// `dst = lhs - rhs`.
pub const SUBTRACT_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> lhs: array<f32>;
@group(0) @binding(1) var<storage, read> rhs: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<f32>;
@group(0) @binding(3) var<uniform> dims: Dims;

@compute @workgroup_size(64, 1, 1)
fn subtract(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = flat_index(gid, groups);
    if (idx >= dims.count) {
        return;
    }
    dst[idx] = lhs[idx] - rhs[idx];
}
"#;

/// `dst = (w_nextᵀ · dz_next) ⊙ derivative(act)`.
pub const BACK_ACTIVATION_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> w_next: array<f32>;
@group(0) @binding(1) var<storage, read> dz_next: array<f32>;
@group(0) @binding(2) var<storage, read> act: array<f32>;
@group(0) @binding(3) var<storage, read_write> dst: array<f32>;
@group(0) @binding(4) var<uniform> dims: Dims;

@compute @workgroup_size(64, 1, 1)
fn back_activation(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = flat_index(gid, groups);
    if (idx >= dims.count) {
        return;
    }
    let r = idx % dims.rows;
    let c = idx / dims.rows;
    var sum = 0.0;
    for (var k = 0u; k < dims.inner; k++) {
        sum += w_next[r * dims.inner + k] * dz_next[c * dims.inner + k];
    }
    dst[idx] = sum * derivative(act[idx], dims.mode);
}
"#;

/// `dst = scale · dz · a_prevᵀ + reg · w`.
pub const SET_DW_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> dz: array<f32>;
@group(0) @binding(1) var<storage, read> a_prev: array<f32>;
@group(0) @binding(2) var<storage, read> w: array<f32>;
@group(0) @binding(3) var<storage, read_write> dst: array<f32>;
@group(0) @binding(4) var<uniform> dims: Dims;

@compute @workgroup_size(64, 1, 1)
fn set_dw(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = flat_index(gid, groups);
    if (idx >= dims.count) {
        return;
    }
    let r = idx % dims.rows;
    let k = idx / dims.rows;
    var sum = 0.0;
    for (var c = 0u; c < dims.inner; c++) {
        sum += dz[c * dims.rows + r] * a_prev[c * dims.cols + k];
    }
    dst[idx] = dims.scale * sum + dims.reg * w[idx];
}
"#;

/// `dst = scale · rowSum(dz)`.
pub const SET_DB_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> dz: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> dims: Dims;

@compute @workgroup_size(64, 1, 1)
fn set_db(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let r = flat_index(gid, groups);
    if (r >= dims.count) {
        return;
    }
    var sum = 0.0;
    for (var c = 0u; c < dims.cols; c++) {
        sum += dz[c * dims.rows + r];
    }
    dst[r] = dims.scale * sum;
}
"#;

/// `params -= scale · grads`.
pub const UPDATE_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> grads: array<f32>;
@group(0) @binding(1) var<storage, read_write> params: array<f32>;
@group(0) @binding(2) var<uniform> dims: Dims;

@compute @workgroup_size(64, 1, 1)
fn update_parameter(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = flat_index(gid, groups);
    if (idx >= dims.count) {
        return;
    }
    params[idx] -= dims.scale * grads[idx];
}
"#;

/// One workgroup reduces a whole buffer into `sums[dims.slot]`.
///
/// Mode 0 sums `-ln(max(1 - |v|, 1e-7))`, mode 1 sums `v²`.
pub const REDUCE_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> sums: array<f32>;
@group(0) @binding(2) var<uniform> dims: Dims;

var<workgroup> partial: array<f32, 256>;

@compute @workgroup_size(256, 1, 1)
fn reduce_sum(@builtin(local_invocation_id) lid: vec3<u32>) {
    var acc = 0.0;
    for (var i = lid.x; i < dims.count; i += 256u) {
        let v = src[i];
        if (dims.mode == 0u) {
            acc += -log(max(1.0 - abs(v), 1e-7));
        } else {
            acc += v * v;
        }
    }
    partial[lid.x] = acc;
    workgroupBarrier();

    for (var stride = 128u; stride > 0u; stride = stride / 2u) {
        if (lid.x < stride) {
            partial[lid.x] += partial[lid.x + stride];
        }
        workgroupBarrier();
    }

    if (lid.x == 0u) {
        sums[dims.slot] = partial[0];
    }
}
"#;

/// Maps column `p` of the output activations to packed ARGB pixel `p`.
pub const DRAW_PIXELS_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> pixels: array<i32>;
@group(0) @binding(2) var<uniform> dims: Dims;

var<private> palette: array<vec3<f32>, 6> = array<vec3<f32>, 6>(
    vec3<f32>(32.0, 64.0, 160.0),
    vec3<f32>(224.0, 96.0, 32.0),
    vec3<f32>(48.0, 176.0, 80.0),
    vec3<f32>(200.0, 40.0, 120.0),
    vec3<f32>(230.0, 210.0, 60.0),
    vec3<f32>(90.0, 200.0, 220.0),
);

fn pack_argb(c: vec3<f32>) -> i32 {
    let q = vec3<u32>(clamp(round(c), vec3<f32>(0.0), vec3<f32>(255.0)));
    return bitcast<i32>((255u << 24u) | (q.x << 16u) | (q.y << 8u) | q.z);
}

@compute @workgroup_size(64, 1, 1)
fn draw_pixels(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let p = flat_index(gid, groups);
    if (p >= dims.count) {
        return;
    }
    let base = p * dims.rows;
    var color = vec3<f32>(0.0);

    if (dims.rows == 1u) {
        var t = clamp(src[base], 0.0, 1.0);
        if (dims.mode == 1u) {
            t = select(0.0, 1.0, t > 0.5);
        }
        color = palette[0] + round((palette[1] - palette[0]) * t);
    } else if (dims.mode == 1u) {
        var best = 0u;
        var best_v = src[base];
        for (var r = 1u; r < dims.rows; r++) {
            if (src[base + r] > best_v) {
                best = r;
                best_v = src[base + r];
            }
        }
        color = palette[best % 6u];
    } else {
        var acc = vec3<f32>(0.0);
        var total = 0.0;
        for (var r = 0u; r < dims.rows; r++) {
            let wgt = clamp(src[base + r], 0.0, 1.0);
            acc += wgt * palette[r % 6u];
            total += wgt;
        }
        if (total > 0.0) {
            color = acc / total;
        }
    }
    pixels[p] = pack_argb(color);
}
"#;

/// ADAM update with bias correction. Standalone: uses its own uniform.
pub const ADAM_SHADER: &str = r#"
struct AdamParams {
    learn_mult: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    bias1: f32,
    bias2: f32,
    count: u32,
    padding: u32,
}

@group(0) @binding(0) var<storage, read> grads: array<f32>;
@group(0) @binding(1) var<storage, read_write> params: array<f32>;
@group(0) @binding(2) var<storage, read_write> m1: array<f32>;
@group(0) @binding(3) var<storage, read_write> m2: array<f32>;
@group(0) @binding(4) var<uniform> cfg: AdamParams;

@compute @workgroup_size(64, 1, 1)
fn update_parameter_adam(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = gid.x + gid.y * groups.x * 64u;
    if (idx >= cfg.count) {
        return;
    }
    let g = grads[idx];
    let m = cfg.beta1 * m1[idx] + (1.0 - cfg.beta1) * g;
    let v = cfg.beta2 * m2[idx] + (1.0 - cfg.beta2) * g * g;
    m1[idx] = m;
    m2[idx] = v;
    let m_hat = m / cfg.bias1;
    let v_hat = v / cfg.bias2;
    params[idx] -= cfg.learn_mult * m_hat / (sqrt(v_hat) + cfg.epsilon);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_sources_not_empty() {
        for src in [
            COMMON,
            FORWARD_SHADER,
            SUBTRACT_SHADER,
            BACK_ACTIVATION_SHADER,
            SET_DW_SHADER,
            SET_DB_SHADER,
            UPDATE_SHADER,
            REDUCE_SHADER,
            DRAW_PIXELS_SHADER,
            ADAM_SHADER,
        ] {
            assert!(!src.trim().is_empty());
        }
    }

    #[test]
    fn test_shader_contains_entry_points() {
        assert!(FORWARD_SHADER.contains("fn forward_layer"));
        assert!(BACK_ACTIVATION_SHADER.contains("fn back_activation"));
        assert!(SET_DW_SHADER.contains("fn set_dw"));
        assert!(SET_DB_SHADER.contains("fn set_db"));
        assert!(UPDATE_SHADER.contains("fn update_parameter"));
        assert!(ADAM_SHADER.contains("fn update_parameter_adam"));
        assert!(REDUCE_SHADER.contains("fn reduce_sum"));
        assert!(DRAW_PIXELS_SHADER.contains("fn draw_pixels"));
    }

    #[test]
    fn test_palette_matches_host_colors() {
        for c in crate::color::PALETTE {
            let literal = format!("vec3<f32>({}.0, {}.0, {}.0)", c.r, c.g, c.b);
            assert!(DRAW_PIXELS_SHADER.contains(&literal), "missing {literal}");
        }
    }
}
