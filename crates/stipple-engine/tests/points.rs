use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use rstest::rstest;

use stipple_engine::device::{RecordedCommand, RecordingBackend, UniformValue};
use stipple_engine::render::{
    ColorMapping, GeometricBuilder, Masking, PointBuilder, PointRenderable, RenderInfo, Renderable,
    Texturing,
};
use stipple_engine::transparency::stochastic_keep;
use stipple_engine::{MeshAttribute, RenderError};

fn positions() -> Vec<Vec3> {
    vec![
        Vec3::new(-1.0, 0.0, 2.0),
        Vec3::new(3.0, -2.0, 0.5),
        Vec3::new(0.0, 4.0, -1.0),
    ]
}

fn camera() -> RenderInfo {
    RenderInfo::look_at(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        90f32.to_radians(),
        UVec2::new(800, 600),
    )
}

fn build(builder: PointBuilder) -> (PointRenderable, RecordingBackend) {
    let mut backend = RecordingBackend::new();
    let renderable = builder.build(&mut backend).unwrap();
    (renderable, backend)
}

fn hash_of(builder: PointBuilder) -> u64 {
    build(builder).0.compute_hash()
}

// ── hashing ────────────────────────────────────────────────────────────────

#[rstest]
#[case::sphere_screen(|b: PointBuilder| b.spheres())]
#[case::sphere_world(|b: PointBuilder| b.spheres().world_space_size())]
#[case::square_camera(|b: PointBuilder| b.square())]
#[case::round_normals(|b: PointBuilder| b.round().own_normals())]
#[case::transparent(|b: PointBuilder| b.square().world_space_size().transparent())]
fn identical_configurations_hash_equal(#[case] configure: fn(PointBuilder) -> PointBuilder) {
    let a = configure(PointBuilder::from_positions(positions()).point_size(2.0));
    let b = configure(PointBuilder::from_positions(positions()).point_size(2.0));
    assert_eq!(hash_of(a), hash_of(b));
}

#[rstest]
#[case::shape(|b: PointBuilder| b.round())]
#[case::size_space(|b: PointBuilder| b.world_space_size())]
#[case::facing(|b: PointBuilder| b.own_normals())]
#[case::transform(|b: PointBuilder| b.translate(Vec3::X))]
#[case::size(|b: PointBuilder| b.point_size(3.0))]
#[case::color(|b: PointBuilder| b.color(Vec4::new(1.0, 0.0, 0.0, 1.0)))]
#[case::mode(|b: PointBuilder| b.transparent())]
#[case::per_point_sizes(|b: PointBuilder| b.point_sizes(vec![1.0, 2.0, 3.0]))]
fn any_changed_field_changes_hash(#[case] change: fn(PointBuilder) -> PointBuilder) {
    let base = || PointBuilder::from_positions(positions()).square().point_size(2.0);
    assert_ne!(hash_of(base()), hash_of(change(base())));
}

#[test]
fn hash_depends_on_point_positions() {
    let mut moved = positions();
    moved[1].z += 0.25;
    assert_ne!(
        hash_of(PointBuilder::from_positions(positions())),
        hash_of(PointBuilder::from_positions(moved))
    );
}

// ── bounds ─────────────────────────────────────────────────────────────────

#[rstest]
fn world_sized_bounds_contain_every_footprint(
    #[values(false, true)] spheres: bool,
    #[values(Mat4::IDENTITY, Mat4::from_translation(Vec3::new(2.0, -1.0, 0.0)), Mat4::from_scale(Vec3::splat(2.0)))]
    transform: Mat4,
) {
    let sizes = vec![0.5, 3.0, 1.25];
    let mut builder = PointBuilder::from_positions(positions())
        .world_space_size()
        .point_sizes(sizes.clone())
        .transform(transform);
    builder = if spheres { builder.spheres() } else { builder.square() };
    let (r, _) = build(builder);
    let aabb = r.compute_aabb();

    for (p, s) in positions().into_iter().zip(sizes) {
        let p = transform.transform_point3(p);
        let half = Vec3::splat(s / 2.0);
        assert!(aabb.contains(p - half), "{aabb:?} misses {:?}", p - half);
        assert!(aabb.contains(p + half), "{aabb:?} misses {:?}", p + half);
    }
}

#[test]
fn bounding_box_round_trip() {
    let single = || {
        PointBuilder::from_positions(vec![Vec3::ZERO])
            .square()
            .camera_facing()
            .point_size(10.0)
    };
    let info = camera();

    let (world, mut backend) = build(single().world_space_size());
    world.render_forward(&mut backend, &info);
    let aabb = world.compute_aabb();
    assert_eq!(aabb.min.truncate(), Vec2::splat(-5.0));
    assert_eq!(aabb.max.truncate(), Vec2::splat(5.0));

    let (screen, mut backend) = build(single().screen_space_size());
    screen.render_forward(&mut backend, &info);
    let aabb = screen.compute_aabb();
    assert_eq!(aabb.min, Vec3::ZERO);
    assert_eq!(aabb.max, Vec3::ZERO);
}

// ── configuration errors ───────────────────────────────────────────────────

#[test]
fn duplicate_attribute_is_rejected() {
    let err = PointBuilder::from_positions(positions())
        .attribute(MeshAttribute::constant("aWeight", 1.0f32))
        .and_then(|b| b.attribute(MeshAttribute::constant("aWeight", 2.0f32)))
        .err();
    assert_eq!(err, Some(RenderError::DuplicateAttribute("aWeight".to_owned())));
}

#[test]
fn distinct_attributes_are_all_retrievable() {
    let names = ["aWeight", "aTemperature", "aAge", "aId"];
    let mut builder = PointBuilder::from_positions(positions());
    for (i, name) in names.iter().enumerate() {
        builder = builder
            .attribute(MeshAttribute::data(*name, vec![i as f32; 3]))
            .unwrap();
    }
    for name in names {
        assert!(builder.base().find_attribute(name).is_some(), "{name}");
    }
    let (r, _) = build(builder);
    for name in names {
        assert!(r.points().attribute(name).is_some(), "{name}");
    }
}

#[test]
fn mismatched_attribute_length_fails_before_any_resource() {
    let mut backend = RecordingBackend::new();
    let result = PointBuilder::from_positions(positions())
        .point_sizes(vec![1.0, 2.0])
        .build(&mut backend);
    assert!(matches!(result, Err(RenderError::AttributeLength { .. })));
    assert!(backend.commands().is_empty());
}

#[test]
fn short_texture_fails_before_any_resource() {
    let mut backend = RecordingBackend::new();
    let coords = MeshAttribute::data("aUv", vec![Vec2::ZERO; 3]);
    let result = PointBuilder::from_positions(positions())
        .textured(Texturing::new(coords, 4, 4, vec![0u8; 16]))
        .build(&mut backend);
    assert!(matches!(result, Err(RenderError::TextureSize { expected: 64, actual: 16, .. })));
    assert!(backend.commands().is_empty());
}

#[rstest]
#[case("aQuadPos", "aQuadPos")]
#[case("aSphereCenter", "SphereCenter")]
#[case("uCamPos", "uCamPos")]
fn pipeline_names_are_not_attributes(#[case] name: &str, #[case] reserved: &str) {
    let mut backend = RecordingBackend::new();
    let result = PointBuilder::from_positions(positions())
        .attribute(MeshAttribute::data(name, vec![Vec2::ONE; 3]))
        .and_then(|b| b.build(&mut backend));
    assert_eq!(
        result.err(),
        Some(RenderError::ReservedAttribute { name: name.to_owned(), reserved: reserved.to_owned() })
    );
    assert!(backend.commands().is_empty());
}

#[test]
fn normal_attribute_feeds_normal_passthrough() {
    let builder = PointBuilder::from_positions(positions())
        .attribute(MeshAttribute::data("aNormal", vec![Vec3::Z; 3]))
        .unwrap();
    let (_, backend) = build(builder);
    assert!(backend.program_count() > 0);
}

#[test]
fn compile_error_surfaces_driver_diagnostic() {
    let mut backend = RecordingBackend::rejecting_programs("error: unknown identifier `aFoo`");
    let result = PointBuilder::from_positions(positions()).build(&mut backend);
    match result {
        Err(RenderError::ShaderCompile { program, diagnostic }) => {
            assert_eq!(program, "points forward");
            assert_eq!(diagnostic, "error: unknown identifier `aFoo`");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert_eq!(backend.program_count(), 0);
}

// ── drawing ────────────────────────────────────────────────────────────────

#[rstest]
fn zero_points_draw_nothing(#[values(false, true)] transparent: bool) {
    let mut builder = PointBuilder::from_positions(Vec::new());
    if transparent {
        builder = builder.transparent();
    }
    let (r, mut backend) = build(builder);
    let info = camera();
    r.render_forward(&mut backend, &info);
    r.render_transparent(&mut backend, &info);
    r.render_shadow(&mut backend, &info);
    assert_eq!(backend.draw_count(), 0);
}

#[test]
fn passes_follow_render_mode() {
    let info = camera();

    let (opaque, mut backend) = build(PointBuilder::from_positions(positions()));
    opaque.render_forward(&mut backend, &info);
    opaque.render_transparent(&mut backend, &info);
    assert_eq!(backend.draw_count(), 1);

    let (transparent, mut backend) = build(PointBuilder::from_positions(positions()).transparent());
    transparent.render_forward(&mut backend, &info);
    transparent.render_transparent(&mut backend, &info);
    transparent.render_shadow(&mut backend, &info);
    assert_eq!(backend.draw_count(), 2);
}

#[test]
fn draw_uses_six_vertices_per_point() {
    let (r, mut backend) = build(PointBuilder::from_positions(positions()));
    r.render_forward(&mut backend, &camera());
    let draw = backend.draw_calls().next().cloned();
    assert_eq!(
        draw,
        Some(RecordedCommand::Draw {
            program: Some(r.forward_program().handle()),
            vertex_array: r.vertex_array(),
            vertex_count: 6,
            instance_count: 3,
        })
    );
}

#[test]
fn forward_uniforms_upload_in_order() {
    let (r, mut backend) = build(
        PointBuilder::from_positions(positions())
            .spheres()
            .mapped_colors(ColorMapping::new(MeshAttribute::data("aValue", vec![0.0f32, 0.5, 1.0])))
            .masked(Masking::new(MeshAttribute::data("aMask", vec![1.0f32; 3]), 0.5)),
    );
    backend.clear_commands();
    r.render_forward(&mut backend, &camera().with_accumulation_count(7));

    let names = backend.uniform_names();
    let expected = [
        "uModel",
        "uView",
        "uProj",
        "uCamPos",
        "uFresnel",
        "uIsTransparent",
        "uSeed",
        "uScreenSize",
        "uInvModel",
        "uInvView",
        "uInvProj",
        "uClipPlane",
        "uViewTranspose",
        "uTanFov2",
        "uScreenHeight",
        "uColorMapLow",
        "uColorMapHigh",
        "uColorMapMin",
        "uColorMapMax",
        "uMaskThreshold",
    ];
    assert_eq!(&names[..expected.len()], &expected);
    assert_eq!(backend.last_uniform("uSeed"), Some(UniformValue::Uint(7)));
    assert!(names.contains(&"aPointSize"));
    assert!(names.contains(&"aNormal"));
}

#[test]
fn sphere_tan_half_fov_matches_camera() {
    let (r, mut backend) = build(PointBuilder::from_positions(positions()).spheres());
    r.render_forward(&mut backend, &camera());
    let Some(UniformValue::Float(tan)) = backend.last_uniform("uTanFov2") else {
        panic!("uTanFov2 not uploaded");
    };
    assert!((tan - 1.0).abs() < 1e-5, "{tan}");
    assert_eq!(backend.last_uniform("uScreenHeight"), Some(UniformValue::Float(600.0)));
}

// ── generated programs ─────────────────────────────────────────────────────

#[rstest]
#[case::sphere_screen(PointBuilder::from_positions(positions()).spheres(), "uTanFov2 * aPointSize")]
#[case::sphere_world(PointBuilder::from_positions(positions()).spheres().world_space_size(), "let r = aPointSize * 0.5;")]
#[case::quad_screen(PointBuilder::from_positions(positions()).square(), "qp * aPointSize / u.uScreenSize")]
#[case::quad_world(PointBuilder::from_positions(positions()).square().world_space_size(), "let offset = qp * aPointSize * 0.5;")]
#[case::quad_normals(PointBuilder::from_positions(positions()).round().own_normals(), "transpose(invModel3) * aNormal")]
fn vertex_stage_follows_branch(#[case] builder: PointBuilder, #[case] marker: &str) {
    let (r, _) = build(builder);
    assert!(r.forward_program().source().vertex.contains(marker));
    assert!(r.shadow_program().source().vertex.contains(marker));
}

#[test]
fn shadow_program_has_no_color_outputs() {
    let (r, _) = build(PointBuilder::from_positions(positions()).spheres().transparent());
    let shadow = r.shadow_program().source();
    assert!(shadow.fragment_outputs.is_empty());
    assert!(!shadow.writes_depth);
    assert!(!shadow.fragment.contains("wang_hash"));
    assert!(r.forward_program().source().writes_depth);
}

// ── stochastic transparency ────────────────────────────────────────────────

#[test]
fn discard_decision_is_deterministic() {
    let pixel = UVec2::new(123, 45);
    for seed in 0..64 {
        let first = stochastic_keep(pixel, seed, 9, 0.3, None);
        for _ in 0..4 {
            assert_eq!(stochastic_keep(pixel, seed, 9, 0.3, None), first);
        }
    }
}

#[test]
fn kept_fraction_converges_to_alpha() {
    let samples = 20_000;
    let kept = (0..samples)
        .filter(|&seed| stochastic_keep(UVec2::new(10, 20), seed, 3, 0.3, None))
        .count();
    let fraction = kept as f32 / samples as f32;
    assert!((fraction - 0.3).abs() < 0.02, "{fraction}");
}
