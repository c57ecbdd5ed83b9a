//! WGSL generation for point renderables.
//!
//! Every program shares the same vertex stage; the forward program adds
//! color, shading and stochastic transparency, the shadow program only
//! coverage.

use crate::attribute::passthrough_name;
use crate::render::builder::{Facing, PointShape, RenderMode};
use crate::shader::{ShaderBuilder, ShaderType};
use crate::transparency;

use super::ResolvedPoints;

const DISTANCE2: &str = r"
fn distance2(a: vec3<f32>, b: vec3<f32>) -> f32 {
    let d = a - b;
    return dot(d, d);
}
";

/// Window depth is `(ndc.z - DEPTH_NEAR) / DEPTH_DIFF`. wgpu clip space is
/// already `[0, 1]` in z for both depth directions; reverse Z lives in the
/// projection and the target's depth compare.
const DEPTH_NEAR: f32 = 0.0;
const DEPTH_DIFF: f32 = 1.0;

fn depth_range_decl() -> String {
    format!("const DEPTH_RANGE_NEAR: f32 = {DEPTH_NEAR:?};\nconst DEPTH_RANGE_DIFF: f32 = {DEPTH_DIFF:?};\n")
}

/// Camera-aligned tangent frame around `vpos` (view space), then the quad is
/// pushed towards the camera by the radius `r` so it covers the silhouette.
const SPHERE_EXPAND: &str = r"
var vpos = u.uView * vec4<f32>(center, 1.0);
let fwd = normalize(vpos.xyz);
var seed = vec3<f32>(0.0, 1.0, 0.0);
if (abs(fwd.y) > 0.999) {
    seed = vec3<f32>(1.0, 0.0, 0.0);
}
let left = normalize(cross(seed, fwd));
let up = cross(fwd, left);
let qp = aQuadPos * 2.0 - 1.0;
vpos = vec4<f32>(vpos.xyz - left * qp.x * r + up * qp.y * r - fwd * r, 1.0);

let modelPos = u.uInvModel * u.uInvView * vpos;
vOut.SphereRadius = r;
vOut.SphereCenter = center;
vOut.Normal = vec3<f32>(0.0);
vOut.fragPosWS = (u.uModel * modelPos).xyz;
vOut.position = u.uProj * u.uView * u.uModel * modelPos;
";

const SPHERE_WORLD_SIZE: &str = r"
let center = (u.uModel * vec4<f32>(aPosition, 1.0)).xyz;
let r = aPointSize * 0.5;
";

const SPHERE_SCREEN_SIZE: &str = r"
let center = (u.uModel * vec4<f32>(aPosition, 1.0)).xyz;
let r = 2.0 * distance(center, u.uCamPos) * u.uTanFov2 * aPointSize / u.uScreenHeight;
";

const CAMERA_FACING_SCREEN_SIZE: &str = r"
var spos = u.uProj * u.uView * u.uModel * vec4<f32>(aPosition, 1.0);
spos = spos / spos.w;
let qp = aQuadPos * 2.0 - 1.0;
spos = vec4<f32>(spos.xy + qp * aPointSize / u.uScreenSize, spos.z, 1.0);

var vpos = u.uInvProj * spos;
vpos = vpos / vpos.w;
let modelPos = u.uInvModel * u.uInvView * vpos;
vOut.Normal = vec3<f32>(0.0);
vOut.fragPosWS = (u.uModel * modelPos).xyz;
vOut.position = u.uProj * u.uView * u.uModel * modelPos;
";

const CAMERA_FACING_WORLD_SIZE: &str = r"
let vpos = u.uView * u.uModel * vec4<f32>(aPosition, 1.0);
let qp = aQuadPos * 2.0 - 1.0;
let offset = qp * aPointSize * 0.5;
let modelPos = u.uInvModel * u.uInvView * vec4<f32>(vpos.xy + offset, vpos.z, vpos.w);
vOut.Normal = vec3<f32>(0.0);
vOut.fragPosWS = (u.uModel * modelPos).xyz;
vOut.position = u.uProj * u.uView * u.uModel * modelPos;
";

/// The least-aligned world axis seeds the basis.
const NORMAL_ALIGNED: &str = r"
let pos = (u.uModel * vec4<f32>(aPosition, 1.0)).xyz;
let invModel3 = mat3x3<f32>(u.uInvModel[0].xyz, u.uInvModel[1].xyz, u.uInvModel[2].xyz);
let dir = normalize(transpose(invModel3) * aNormal);
let ad = abs(dir);
var axis = vec3<f32>(0.0, 0.0, 1.0);
if (ad.x <= ad.y && ad.x <= ad.z) {
    axis = vec3<f32>(1.0, 0.0, 0.0);
} else if (ad.y <= ad.z) {
    axis = vec3<f32>(0.0, 1.0, 0.0);
}
let left = normalize(cross(dir, axis));
let up = normalize(cross(dir, left));
let qp = aQuadPos * 2.0 - 1.0;
vOut.fragPosWS = pos + aPointSize * 0.5 * (left * qp.x + up * qp.y);
vOut.Normal = dir;
vOut.position = u.uProj * u.uView * vec4<f32>(vOut.fragPosWS, 1.0);
";

const SPHERE_HIT: &str = r"
let rayOrigin = u.uCamPos;
let rayDir = normalize(vIn.fragPosWS - u.uCamPos);
let closestP = rayOrigin + rayDir * dot(rayDir, vIn.SphereCenter - rayOrigin);
let sphereDis2 = distance2(closestP, vIn.SphereCenter);
if (sphereDis2 > vIn.SphereRadius * vIn.SphereRadius) {
    discard;
}
";

const SPHERE_SURFACE: &str = r"
let spherePos = closestP - rayDir * sqrt(vIn.SphereRadius * vIn.SphereRadius - sphereDis2);
let sphereN = normalize(spherePos - vIn.SphereCenter);
let spherePosCS = u.uProj * u.uView * vec4<f32>(spherePos, 1.0);
let depthNDC = spherePosCS.z / spherePosCS.w;
fOut.fDepth = (depthNDC - DEPTH_RANGE_NEAR) / DEPTH_RANGE_DIFF;
fOut.fColor = vec4<f32>(color.rgb * (sphereN.y * 0.5 + 0.5), 1.0);
fOut.fNormal = vec4<f32>(sphereN, 0.0);
";

const ROUND_CUTOUT: &str = "if (distance(vIn.QuadPos, vec2<f32>(0.5)) > 0.5) { discard; }";

const QUAD_NORMAL: &str = r"
var n = vIn.Normal;
if (dot(n, n) > 0.0) {
    n = normalize(n);
}
fOut.fNormal = vec4<f32>(n, 0.0);
";

const RESERVED_INPUTS: &[&str] = &["aQuadPos"];

const RESERVED_PASSTHROUGHS: &[&str] =
    &["QuadPos", "fragPosWS", "SphereCenter", "SphereRadius", "VertexID"];

const RESERVED_UNIFORMS: &[&str] = &[
    "uModel",
    "uInvModel",
    "uView",
    "uInvView",
    "uProj",
    "uInvProj",
    "uCamPos",
    "uClipPlane",
    "uScreenSize",
    "uViewTranspose",
    "uTanFov2",
    "uScreenHeight",
    "uIsTransparent",
    "uFresnel",
    "uSeed",
    "uColorMapLow",
    "uColorMapHigh",
    "uColorMapMin",
    "uColorMapMax",
    "uMaskThreshold",
];

/// Pipeline identifier an attribute named `attribute` would collide with.
///
/// Only `aNormal` may feed the `Normal` passthrough.
pub(super) fn reserved_identifier(attribute: &str) -> Option<&'static str> {
    let pass = passthrough_name(attribute);
    RESERVED_INPUTS
        .iter()
        .chain(RESERVED_UNIFORMS)
        .find(|r| **r == attribute)
        .or_else(|| RESERVED_PASSTHROUGHS.iter().find(|r| **r == pass))
        .copied()
        .or_else(|| (pass == "Normal" && attribute != "aNormal").then_some("Normal"))
}

/// Vertex stage and declarations shared by the forward and shadow programs.
fn shared_parts(points: &ResolvedPoints, sb: &mut ShaderBuilder) {
    sb.add_uniform(ShaderType::Mat4, "uModel")
        .add_uniform(ShaderType::Mat4, "uInvModel")
        .add_uniform(ShaderType::Mat4, "uView")
        .add_uniform(ShaderType::Mat4, "uInvView")
        .add_uniform(ShaderType::Mat4, "uProj")
        .add_uniform(ShaderType::Mat4, "uInvProj")
        .add_uniform(ShaderType::Vec3, "uCamPos")
        .add_uniform(ShaderType::Vec4, "uClipPlane")
        .add_uniform(ShaderType::Vec2, "uScreenSize");
    if points.is_sphere() {
        sb.add_uniform(ShaderType::Mat4, "uViewTranspose")
            .add_uniform(ShaderType::Float, "uTanFov2")
            .add_uniform(ShaderType::Float, "uScreenHeight");
    }

    sb.add_vertex_input(ShaderType::Vec2, "aQuadPos")
        .add_passthrough(ShaderType::Vec2, "QuadPos")
        .add_passthrough(ShaderType::Vec3, "Normal")
        .add_vertex_code("vOut.QuadPos = aQuadPos;");

    for attribute in points.attributes() {
        attribute.declare_in_shader(sb);
    }

    sb.add_passthrough(ShaderType::Vec3, "fragPosWS");
    match (points.shape(), points.facing()) {
        (PointShape::Sphere, _) => {
            sb.add_passthrough(ShaderType::Vec3, "SphereCenter")
                .add_passthrough(ShaderType::Float, "SphereRadius");
            if points.world_sized() {
                sb.add_vertex_code(SPHERE_WORLD_SIZE);
            } else {
                sb.add_vertex_code(SPHERE_SCREEN_SIZE);
            }
            sb.add_vertex_code(SPHERE_EXPAND);
        }
        (_, Facing::Camera) if points.world_sized() => {
            sb.add_vertex_code(CAMERA_FACING_WORLD_SIZE);
        }
        (_, Facing::Camera) => {
            sb.add_vertex_code(CAMERA_FACING_SCREEN_SIZE);
        }
        (_, Facing::OwnNormals) => {
            sb.add_vertex_code(NORMAL_ALIGNED);
        }
    }
}

/// WGSL expression of the unshaded point color.
fn color_source(points: &ResolvedPoints) -> String {
    if let Some(texturing) = points.texturing() {
        return texturing.color_expr();
    }
    if let Some(mapping) = points.color_mapping() {
        return mapping.color_expr();
    }
    match points.attribute("aColor").map(|a| (a.passthrough(), a.ty())) {
        Some((pass, ShaderType::Vec3)) => format!("vec4<f32>(vIn.{pass}, 1.0)"),
        Some((pass, _)) => format!("vIn.{pass}"),
        None => "vec4<f32>(1.0)".to_owned(),
    }
}

pub(crate) fn forward_program(points: &ResolvedPoints) -> ShaderBuilder {
    let mut sb = ShaderBuilder::new("points forward");
    shared_parts(points, &mut sb);

    sb.add_fragment_output(ShaderType::Vec4, "fColor")
        .add_fragment_output(ShaderType::Vec4, "fNormal")
        .add_uniform(ShaderType::Bool, "uIsTransparent")
        .add_uniform(ShaderType::Bool, "uFresnel")
        .add_uniform(ShaderType::Uint, "uSeed")
        .add_passthrough(ShaderType::Uint, "VertexID")
        .add_vertex_code("vOut.VertexID = instanceIndex;");

    // Sampling has to happen before any discard.
    sb.add_fragment_code(format!("let color = {};", color_source(points)));

    if let Some(mapping) = points.color_mapping() {
        mapping.build_shader(&mut sb);
    }
    if let Some(texturing) = points.texturing() {
        texturing.build_shader(&mut sb);
    }
    if let Some(masking) = points.masking() {
        masking.build_shader(&mut sb);
    }

    if points.is_sphere() {
        sb.enable_depth_write()
            .add_fragment_decl(DISTANCE2)
            .add_fragment_decl(depth_range_decl())
            .add_fragment_code(
                "if (dot(u.uClipPlane.xyz, vIn.SphereCenter) > u.uClipPlane.w) { discard; }",
            )
            .add_fragment_code(SPHERE_HIT)
            .add_fragment_code(SPHERE_SURFACE);
    } else {
        if points.shape() == PointShape::Round {
            sb.add_fragment_code(ROUND_CUTOUT);
        }
        sb.add_fragment_code(
            "if (dot(u.uClipPlane.xyz, vIn.fragPosWS) > u.uClipPlane.w) { discard; }",
        )
        .add_fragment_code(QUAD_NORMAL);
        if points.shading_enabled() {
            sb.add_fragment_code(
                "fOut.fColor = vec4<f32>(color.rgb * (fOut.fNormal.y * 0.5 + 0.5), 1.0);",
            );
        } else {
            sb.add_fragment_code("fOut.fColor = vec4<f32>(color.rgb, 1.0);");
        }
    }

    if points.render_mode() == RenderMode::Transparent {
        sb.add_fragment_decl(transparency::wgsl_helpers())
            .add_fragment_code(transparency::wgsl_discard("color.a", "fOut.fNormal.xyz"));
    }

    sb
}

pub(crate) fn shadow_program(points: &ResolvedPoints) -> ShaderBuilder {
    let mut sb = ShaderBuilder::new("points shadow");
    shared_parts(points, &mut sb);

    if let Some(masking) = points.masking() {
        masking.build_shader(&mut sb);
    }

    if points.is_sphere() {
        sb.add_fragment_decl(DISTANCE2).add_fragment_code(SPHERE_HIT);
    } else if points.shape() == PointShape::Round {
        sb.add_fragment_code(ROUND_CUTOUT);
    }

    sb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::MeshAttribute;
    use crate::device::validate_wgsl;
    use crate::render::{
        ColorMapping, GeometricBuilder, Masking, PointBuilder, RenderInfo, Texturing,
    };
    use glam::{UVec2, Vec2, Vec3};
    use rstest::rstest;

    fn cloud() -> PointBuilder {
        PointBuilder::from_positions(vec![Vec3::ZERO, Vec3::X])
    }

    fn vertex(points: &ResolvedPoints) -> String {
        forward_program(points).assemble().vertex
    }

    #[test]
    fn sphere_screen_size_uses_fov() {
        let src = vertex(&cloud().spheres().resolve());
        assert!(src.contains("u.uTanFov2 * aPointSize / u.uScreenHeight"));
        assert!(src.contains("uViewTranspose: mat4x4<f32>,"));
        assert!(src.contains("vOut.SphereCenter = center;"));
    }

    #[test]
    fn sphere_world_size_uses_radius() {
        let src = vertex(&cloud().spheres().world_space_size().resolve());
        assert!(src.contains("let r = aPointSize * 0.5;"));
        assert!(!src.contains("uTanFov2 * aPointSize"));
    }

    #[test]
    fn camera_facing_screen_offsets_in_ndc() {
        let src = vertex(&cloud().square().resolve());
        assert!(src.contains("qp * aPointSize / u.uScreenSize"));
        assert!(!src.contains("uTanFov2"));
    }

    #[test]
    fn camera_facing_world_offsets_in_view_space() {
        let src = vertex(&cloud().square().world_space_size().resolve());
        assert!(src.contains("let offset = qp * aPointSize * 0.5;"));
    }

    #[test]
    fn normal_aligned_builds_basis() {
        let src = vertex(&cloud().round().own_normals().resolve());
        assert!(src.contains("transpose(invModel3) * aNormal"));
        assert!(src.contains("vOut.Normal = dir;"));
    }

    #[test]
    fn every_branch_writes_world_position() {
        for b in [
            cloud().spheres(),
            cloud().spheres().world_space_size(),
            cloud().square(),
            cloud().square().world_space_size(),
            cloud().round().own_normals(),
        ] {
            let points = b.resolve();
            assert!(vertex(&points).contains("vOut.fragPosWS ="));
            assert!(shadow_program(&points).assemble().vertex.contains("vOut.fragPosWS ="));
        }
    }

    #[test]
    fn sphere_forward_writes_depth() {
        let src = forward_program(&cloud().spheres().resolve()).assemble().fragment;
        assert!(src.contains("@builtin(frag_depth) fDepth: f32,"));
        assert!(src.contains("const DEPTH_RANGE_NEAR: f32 = 0.0;"));
        assert!(src.contains("const DEPTH_RANGE_DIFF: f32 = 1.0;"));
        assert!(src.contains("fOut.fDepth = (depthNDC - DEPTH_RANGE_NEAR) / DEPTH_RANGE_DIFF;"));
        assert!(!src.contains("depthNDC * 0.5"));
        assert!(!src.contains("uIsReverseZEnabled"));
    }

    #[test]
    fn sphere_depth_matches_rasterized_depth() {
        let info = RenderInfo::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            90f32.to_radians(),
            UVec2::new(800, 600),
        );
        let ndc_z = |p: Vec3| info.proj.project_point3(info.view.transform_point3(p)).z;
        let written = |p: Vec3| (ndc_z(p) - DEPTH_NEAR) / DEPTH_DIFF;

        let pole = Vec3::new(0.0, 0.0, 0.5);
        assert!((written(pole) - ndc_z(pole)).abs() < 1e-7);
        // a quad just behind the sphere stays behind it
        assert!(written(pole) < ndc_z(Vec3::new(0.0, 0.0, 0.2)));
    }

    #[test]
    fn sphere_shadow_tests_coverage_only() {
        let src = shadow_program(&cloud().spheres().resolve()).assemble().fragment;
        assert!(src.contains("sphereDis2 > vIn.SphereRadius * vIn.SphereRadius"));
        assert!(!src.contains("fDepth"));
        assert!(!src.contains("FragmentOutput"));
    }

    #[test]
    fn round_quads_cut_disc() {
        let points = cloud().round().resolve();
        assert!(forward_program(&points).assemble().fragment.contains(ROUND_CUTOUT));
        assert!(shadow_program(&points).assemble().fragment.contains(ROUND_CUTOUT));
        let square = cloud().square().resolve();
        assert!(!forward_program(&square).assemble().fragment.contains(ROUND_CUTOUT));
    }

    #[test]
    fn shading_toggle() {
        let shaded = forward_program(&cloud().square().resolve()).assemble().fragment;
        assert!(shaded.contains("fOut.fNormal.y * 0.5 + 0.5"));
        let flat = forward_program(&cloud().square().shading(false).resolve())
            .assemble()
            .fragment;
        assert!(flat.contains("fOut.fColor = vec4<f32>(color.rgb, 1.0);"));
    }

    #[test]
    fn transparency_only_in_transparent_mode() {
        let opaque = forward_program(&cloud().resolve()).assemble().fragment;
        assert!(!opaque.contains("wang_hash"));
        let transparent = forward_program(&cloud().transparent().resolve()).assemble().fragment;
        assert!(transparent.contains("fn wang_hash"));
        assert!(transparent.contains("if (wang_float(h) > a)"));
        let shadow = shadow_program(&cloud().transparent().resolve()).assemble().fragment;
        assert!(!shadow.contains("wang_hash"));
    }

    #[test]
    fn default_color_is_constant_uniform() {
        let sb = forward_program(&cloud().resolve());
        assert!(sb.has_uniform("aColor"));
        assert!(sb.assemble().fragment.contains("let color = vIn.Color;"));
    }

    #[test]
    fn color_before_discards() {
        let src = forward_program(&cloud().round().resolve()).assemble().fragment;
        let color = src.find("let color =").unwrap();
        let cut = src.find(ROUND_CUTOUT).unwrap();
        assert!(color < cut);
    }

    fn assert_valid(sb: ShaderBuilder) {
        let src = sb.assemble();
        if let Err(diagnostic) = validate_wgsl(&src.vertex) {
            panic!("{} vertex stage:\n{diagnostic}\n{}", sb.label(), src.vertex);
        }
        if let Err(diagnostic) = validate_wgsl(&src.fragment) {
            panic!("{} fragment stage:\n{diagnostic}\n{}", sb.label(), src.fragment);
        }
    }

    #[rstest]
    fn generated_programs_validate(
        #[values(PointShape::Square, PointShape::Round, PointShape::Sphere)] shape: PointShape,
        #[values(false, true)] world: bool,
        #[values(false, true)] own_normals: bool,
        #[values(false, true)] transparent: bool,
    ) {
        let mut b = match shape {
            PointShape::Square => cloud().square(),
            PointShape::Round => cloud().round(),
            PointShape::Sphere => cloud().spheres(),
        };
        if world {
            b = b.world_space_size();
        }
        if own_normals {
            b = b.own_normals();
        }
        if transparent {
            b = b.transparent();
        }
        let points = b.resolve();
        assert_valid(forward_program(&points));
        assert_valid(shadow_program(&points));
    }

    #[test]
    fn decorated_programs_validate() {
        let mapped = cloud()
            .point_sizes(vec![2.0, 4.0])
            .mapped_colors(ColorMapping::new(MeshAttribute::data("aValue", vec![0.0f32, 1.0])))
            .masked(Masking::new(MeshAttribute::data("aMask", vec![1.0f32, 0.0]), 0.5))
            .shading(false)
            .transparent()
            .resolve();
        assert_valid(forward_program(&mapped));
        assert_valid(shadow_program(&mapped));

        let textured = cloud()
            .spheres()
            .textured(Texturing::new(
                MeshAttribute::data("aTexCoord", vec![Vec2::ZERO, Vec2::ONE]),
                1,
                1,
                vec![255u8; 4],
            ))
            .transparent()
            .resolve();
        assert_valid(forward_program(&textured));
        assert_valid(shadow_program(&textured));
    }

    #[test]
    fn reserved_identifiers_cover_generated_declarations() {
        let points = cloud().spheres().transparent().resolve();
        let sb = forward_program(&points);
        let decorated = |n: &&&str| n.starts_with("uColorMap") || **n == "uMaskThreshold";
        for name in RESERVED_UNIFORMS.iter().filter(|n| !decorated(n)) {
            assert!(sb.has_uniform(name), "{name}");
        }
        for name in RESERVED_PASSTHROUGHS {
            assert!(sb.has_passthrough(name), "{name}");
        }
        assert!(sb.vertex_inputs().iter().any(|d| d.name == RESERVED_INPUTS[0]));
    }

    #[test]
    fn reserved_identifier_lookup() {
        assert_eq!(reserved_identifier("aQuadPos"), Some("aQuadPos"));
        assert_eq!(reserved_identifier("QuadPos"), Some("QuadPos"));
        assert_eq!(reserved_identifier("aVertexID"), Some("VertexID"));
        assert_eq!(reserved_identifier("uModel"), Some("uModel"));
        assert_eq!(reserved_identifier("Normal"), Some("Normal"));
        assert_eq!(reserved_identifier("aNormal"), None);
        assert_eq!(reserved_identifier("aWeight"), None);
    }
}
