//! Stochastic order-independent transparency.
//!
//! Each fragment of a transparent point survives with probability equal to
//! its alpha: a per-pixel, per-point, per-frame hash is turned into a uniform
//! float and compared against the (optionally Fresnel-biased) alpha. Averaged
//! over accumulated frames with different seeds this converges to blending
//! without sorting.
//!
//! The functions below are the CPU reference of the generated WGSL, which is
//! emitted from the same constants by [`wgsl_helpers`] and [`wgsl_discard`].

use glam::UVec2;

/// Golden-ratio constant of the hash combinator.
pub const HASH_COMBINE_CONSTANT: u32 = 0x9e37_79b9;
/// Row stride used to fold a pixel position into one word.
pub const PIXEL_STRIDE: u32 = 4096;
/// Spreads neighbouring point indices apart before combining.
pub const VERTEX_ID_SCALE: u32 = 17;

/// Thomas Wang's 32-bit integer avalanche.
pub fn wang_hash(seed: u32) -> u32 {
    let mut s = (seed ^ 61) ^ (seed >> 16);
    s = s.wrapping_mul(9);
    s ^= s >> 4;
    s = s.wrapping_mul(0x27d4_eb2d);
    s ^= s >> 15;
    s
}

pub fn hash_combine(seed: u32, value: u32) -> u32 {
    seed ^ value
        .wrapping_add(HASH_COMBINE_CONSTANT)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Top 24 bits of `h` as a float in `[0, 1)`.
pub fn wang_float(h: u32) -> f32 {
    (h >> 8) as f32 / 16_777_216.0
}

/// Final coverage hash of one fragment.
pub fn coverage_hash(pixel: UVec2, seed: u32, vertex_id: u32) -> u32 {
    let mut h = pixel.x.wrapping_mul(PIXEL_STRIDE).wrapping_add(pixel.y);
    h = hash_combine(h, seed);
    h = hash_combine(h, vertex_id.wrapping_mul(VERTEX_ID_SCALE));
    wang_hash(h)
}

/// Pulls `alpha` towards one at grazing angles.
pub fn fresnel_alpha(alpha: f32, n_dot_v: f32) -> f32 {
    let t = 1.0 - n_dot_v.abs();
    let t = (t * t) * (t * t) * t;
    alpha + (1.0 - alpha) * t
}

/// Whether the fragment at `pixel` of point `vertex_id` survives frame `seed`.
///
/// `n_dot_v` enables the Fresnel bias.
pub fn stochastic_keep(
    pixel: UVec2,
    seed: u32,
    vertex_id: u32,
    alpha: f32,
    n_dot_v: Option<f32>,
) -> bool {
    let threshold = match n_dot_v {
        Some(n_dot_v) => fresnel_alpha(alpha, n_dot_v),
        None => alpha,
    };
    wang_float(coverage_hash(pixel, seed, vertex_id)) <= threshold
}

/// WGSL definitions of the hash functions.
pub fn wgsl_helpers() -> String {
    format!(
        r"
fn wang_hash(seed_in: u32) -> u32 {{
    var s = (seed_in ^ 61u) ^ (seed_in >> 16u);
    s = s * 9u;
    s = s ^ (s >> 4u);
    s = s * 0x27d4eb2du;
    s = s ^ (s >> 15u);
    return s;
}}

fn hash_combine(seed: u32, v: u32) -> u32 {{
    return seed ^ (v + {HASH_COMBINE_CONSTANT:#x}u + (seed << 6u) + (seed >> 2u));
}}

fn wang_float(h: u32) -> f32 {{
    return f32(h >> 8u) / 16777216.0;
}}
"
    )
}

/// Fragment code discarding by coverage hash.
///
/// Expects `alpha` and `normal` to be in scope as WGSL expressions, the
/// `VertexID` and `fragPosWS` passthroughs, and the `uIsTransparent`,
/// `uFresnel`, `uSeed` and `uCamPos` uniforms.
pub fn wgsl_discard(alpha: &str, normal: &str) -> String {
    format!(
        r"
if (u.uIsTransparent != 0u) {{
    var h = u32(vIn.position.x) * {PIXEL_STRIDE}u + u32(vIn.position.y);
    h = hash_combine(h, u.uSeed);
    h = hash_combine(h, vIn.VertexID * {VERTEX_ID_SCALE}u);
    h = wang_hash(h);

    var a = {alpha};
    if (u.uFresnel != 0u) {{
        let V = normalize(u.uCamPos - vIn.fragPosWS);
        var t = 1.0 - abs(dot({normal}, V));
        t = (t * t) * (t * t) * t;
        a = mix({alpha}, 1.0, t);
    }}

    if (wang_float(h) > a) {{
        discard;
    }}
}}
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wang_hash_reference_values() {
        assert_eq!(wang_hash(0), 0xc0a9_496a);
        assert_eq!(wang_hash(1), 0x2792_2c9d);
        assert_eq!(wang_hash(12345), 0x0dde_ec13);
    }

    #[test]
    fn wang_float_is_unit_interval() {
        assert_eq!(wang_float(0), 0.0);
        assert!(wang_float(u32::MAX) < 1.0);
    }

    #[test]
    fn decision_is_deterministic() {
        let pixel = UVec2::new(640, 360);
        for seed in 0..64 {
            let first = stochastic_keep(pixel, seed, 7, 0.5, None);
            assert_eq!(first, stochastic_keep(pixel, seed, 7, 0.5, None));
        }
    }

    #[test]
    fn opaque_is_always_kept() {
        for seed in 0..1000 {
            assert!(stochastic_keep(UVec2::new(3, 4), seed, 1, 1.0, None));
        }
    }

    #[test]
    fn survivors_converge_to_alpha() {
        let pixel = UVec2::new(10, 20);
        let samples = 20_000u32;
        let kept = (0..samples)
            .filter(|&seed| stochastic_keep(pixel, seed, 3, 0.3, None))
            .count();
        let fraction = kept as f64 / samples as f64;
        assert!((fraction - 0.3).abs() < 0.02, "fraction {fraction}");
    }

    #[test]
    fn fresnel_bias_reaches_one_at_grazing() {
        assert_eq!(fresnel_alpha(0.3, 1.0), 0.3);
        assert!((fresnel_alpha(0.3, 0.0) - 1.0).abs() < 1e-6);
        assert!(stochastic_keep(UVec2::new(1, 1), 5, 9, 0.0, Some(0.0)));
    }

    #[test]
    fn wgsl_shares_constants() {
        assert!(wgsl_helpers().contains("0x9e3779b9u"));
        let discard = wgsl_discard("color.a", "fOut.fNormal");
        assert!(discard.contains("* 4096u"));
        assert!(discard.contains("vIn.VertexID * 17u"));
        assert!(discard.contains("var a = color.a;"));
    }
}
