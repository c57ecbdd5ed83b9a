use glam::Vec2;

use crate::device::{
    GraphicsBackend, StepMode, TextureHandle, VertexArrayDesc, VertexArrayHandle, VertexBinding,
    VertexFormat,
};
use crate::error::RenderResult;
use crate::geometry::Aabb;
use crate::render::builder::{PointBuilder, RenderMode};
use crate::render::{RenderInfo, Renderable};
use crate::shader::CompiledProgram;

use super::{ResolvedPoints, codegen};

/// Two triangles covering `[0, 1]²`.
pub const QUAD_POSITIONS: [Vec2; 6] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
];

pub const QUAD_VERTEX_COUNT: u32 = QUAD_POSITIONS.len() as u32;

/// A point cloud with its GPU resources.
///
/// Immutable after [`init`](Self::init); a changed configuration needs a new
/// renderable.
#[derive(Debug)]
pub struct PointRenderable {
    points: ResolvedPoints,
    vertex_array: VertexArrayHandle,
    forward: CompiledProgram,
    shadow: CompiledProgram,
    texture: Option<TextureHandle>,
    hash: u64,
}

impl PointRenderable {
    /// Resolves the builder, uploads buffers and compiles both programs.
    ///
    /// Configuration errors are reported before any resource is created. A
    /// rejected program fails the whole construction.
    pub fn init(builder: &PointBuilder, backend: &mut dyn GraphicsBackend) -> RenderResult<Self> {
        let points = builder.resolve();
        points.validate()?;

        let mut bindings = Vec::with_capacity(points.attributes().len() + 1);
        for attribute in points.attributes() {
            if let Some(binding) = attribute.create_buffer(points.mesh(), backend)? {
                bindings.push(binding);
            }
        }

        let quad = backend.create_vertex_buffer("aQuadPos", bytemuck::cast_slice(&QUAD_POSITIONS))?;
        bindings.push(VertexBinding {
            name: "aQuadPos".to_owned(),
            buffer: quad,
            format: VertexFormat::Float32x2,
            step_mode: StepMode::Vertex,
        });

        let vertex_array = backend.create_vertex_array(&VertexArrayDesc {
            label: "points".to_owned(),
            bindings,
        })?;

        let forward = codegen::forward_program(&points).build(backend)?;
        let shadow = codegen::shadow_program(&points).build(backend)?;

        let texture = match points.texturing() {
            Some(texturing) => Some(texturing.upload(backend)?),
            None => None,
        };

        let hash = points.compute_hash();
        log::debug!(
            "points: {} points, {:?}/{:?}/{:?}, hash {hash:016x}",
            points.point_count(),
            points.shape(),
            points.size_space(),
            points.facing()
        );

        Ok(Self {
            points,
            vertex_array,
            forward,
            shadow,
            texture,
            hash,
        })
    }

    pub fn points(&self) -> &ResolvedPoints {
        &self.points
    }

    pub fn forward_program(&self) -> &CompiledProgram {
        &self.forward
    }

    pub fn shadow_program(&self) -> &CompiledProgram {
        &self.shadow
    }

    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array
    }

    fn instance_count(&self) -> u32 {
        u32::try_from(self.points.point_count()).unwrap_or(u32::MAX)
    }

    // ── uniform upload ─────────────────────────────────────────────────────

    fn upload_camera(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo) {
        let model = self.points.transform();
        backend.set_uniform("uModel", model.into());
        backend.set_uniform("uView", info.view.into());
        backend.set_uniform("uProj", info.proj.into());
        backend.set_uniform("uCamPos", info.cam_pos.into());
    }

    fn upload_sphere(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo) {
        if !self.points.is_sphere() {
            return;
        }
        backend.set_uniform("uViewTranspose", info.view.transpose().into());
        backend.set_uniform("uTanFov2", info.tan_half_fov_y().into());
        backend.set_uniform("uScreenHeight", (info.resolution.y as f32).into());
    }

    fn render_points(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo) {
        if self.points.point_count() == 0 {
            return;
        }

        let model = self.points.transform();
        backend.use_program(self.forward.handle());
        self.upload_camera(backend, info);
        backend.set_uniform("uFresnel", self.points.fresnel_enabled().into());
        backend.set_uniform(
            "uIsTransparent",
            (self.points.render_mode() == RenderMode::Transparent).into(),
        );
        backend.set_uniform("uSeed", info.accumulation_count.into());
        backend.set_uniform("uScreenSize", info.screen_size().into());
        backend.set_uniform("uInvModel", model.inverse().into());
        backend.set_uniform("uInvView", info.view.inverse().into());
        backend.set_uniform("uInvProj", info.proj.inverse().into());
        backend.set_uniform("uClipPlane", info.clip_plane.into());
        self.upload_sphere(backend, info);

        if let Some(mapping) = self.points.color_mapping() {
            mapping.prepare_shader(backend);
        }
        if let (Some(texturing), Some(texture)) = (self.points.texturing(), self.texture) {
            texturing.prepare_shader(backend, texture);
        }
        if let Some(masking) = self.points.masking() {
            masking.prepare_shader(backend);
        }
        for attribute in self.points.attributes() {
            attribute.prepare_shader(backend);
        }

        backend.draw_instanced(self.vertex_array, QUAD_VERTEX_COUNT, self.instance_count());
    }
}

impl Renderable for PointRenderable {
    fn compute_aabb(&self) -> Aabb {
        self.points.compute_aabb()
    }

    fn compute_hash(&self) -> u64 {
        self.hash
    }

    fn render_forward(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo) {
        if self.points.render_mode() != RenderMode::Opaque {
            return;
        }
        self.render_points(backend, info);
    }

    fn render_transparent(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo) {
        if self.points.render_mode() != RenderMode::Transparent {
            return;
        }
        self.render_points(backend, info);
    }

    /// Shadows are cast in either render mode.
    fn render_shadow(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo) {
        if self.points.point_count() == 0 {
            return;
        }

        let model = self.points.transform();
        backend.use_program(self.shadow.handle());
        self.upload_camera(backend, info);
        backend.set_uniform("uInvModel", model.inverse().into());
        backend.set_uniform("uInvView", info.view.inverse().into());
        backend.set_uniform("uInvProj", info.proj.inverse().into());
        backend.set_uniform("uScreenSize", info.screen_size().into());
        backend.set_uniform("uClipPlane", info.clip_plane.into());
        self.upload_sphere(backend, info);

        for attribute in self.points.attributes() {
            attribute.prepare_shader(backend);
        }
        if let Some(masking) = self.points.masking() {
            masking.prepare_shader(backend);
        }

        backend.draw_instanced(self.vertex_array, QUAD_VERTEX_COUNT, self.instance_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{RecordedCommand, RecordingBackend, UniformValue};
    use crate::render::GeometricBuilder as _;
    use glam::{UVec2, Vec3};

    fn info() -> RenderInfo {
        RenderInfo::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0, UVec2::new(640, 480))
    }

    fn build(builder: PointBuilder) -> (PointRenderable, RecordingBackend) {
        let mut backend = RecordingBackend::new();
        let r = builder.build(&mut backend).unwrap();
        (r, backend)
    }

    #[test]
    fn quad_is_vertex_rate_attributes_instance_rate() {
        let (r, backend) =
            build(PointBuilder::from_positions(vec![Vec3::ZERO; 3]).point_sizes(vec![1.0; 3]));
        let desc = backend.vertex_array(r.vertex_array()).unwrap();
        assert_eq!(desc.binding("aQuadPos").unwrap().step_mode, StepMode::Vertex);
        assert_eq!(desc.binding("aPosition").unwrap().step_mode, StepMode::Instance);
        assert_eq!(desc.binding("aPointSize").unwrap().step_mode, StepMode::Instance);
        // constants have no buffer
        assert!(desc.binding("aColor").is_none());
        let quad = backend.buffer_contents(desc.binding("aQuadPos").unwrap().buffer).unwrap();
        assert_eq!(quad, bytemuck::cast_slice::<Vec2, u8>(&QUAD_POSITIONS));
    }

    #[test]
    fn draws_one_quad_per_point() {
        let (r, mut backend) = build(PointBuilder::from_positions(vec![Vec3::ZERO; 4]));
        backend.clear_commands();
        r.render_forward(&mut backend, &info());
        let draws: Vec<_> = backend.draw_calls().cloned().collect();
        assert_eq!(
            draws,
            vec![RecordedCommand::Draw {
                program: Some(r.forward_program().handle()),
                vertex_array: r.vertex_array(),
                vertex_count: 6,
                instance_count: 4,
            }]
        );
    }

    #[test]
    fn render_mode_gates_forward_passes() {
        let (opaque, mut backend) = build(PointBuilder::from_positions(vec![Vec3::ZERO]));
        backend.clear_commands();
        opaque.render_transparent(&mut backend, &info());
        assert_eq!(backend.draw_count(), 0);
        opaque.render_forward(&mut backend, &info());
        assert_eq!(backend.draw_count(), 1);

        let (transparent, mut backend) =
            build(PointBuilder::from_positions(vec![Vec3::ZERO]).transparent());
        backend.clear_commands();
        transparent.render_forward(&mut backend, &info());
        assert_eq!(backend.draw_count(), 0);
        transparent.render_transparent(&mut backend, &info());
        assert_eq!(backend.draw_count(), 1);
        assert_eq!(backend.last_uniform("uIsTransparent"), Some(UniformValue::Bool(true)));
    }

    #[test]
    fn shadow_ignores_render_mode() {
        let (r, mut backend) = build(PointBuilder::from_positions(vec![Vec3::ZERO]).transparent());
        backend.clear_commands();
        r.render_shadow(&mut backend, &info());
        assert_eq!(backend.draw_count(), 1);
        assert!(matches!(
            backend.commands().first(),
            Some(RecordedCommand::UseProgram(p)) if *p == r.shadow_program().handle()
        ));
    }

    #[test]
    fn sphere_uniforms_only_for_spheres() {
        let (sphere, mut backend) = build(PointBuilder::from_positions(vec![Vec3::ZERO]).spheres());
        sphere.render_forward(&mut backend, &info());
        assert!(backend.uniform_names().contains(&"uTanFov2"));

        let (quad, mut backend) = build(PointBuilder::from_positions(vec![Vec3::ZERO]).square());
        quad.render_forward(&mut backend, &info());
        assert!(!backend.uniform_names().contains(&"uTanFov2"));
    }
}
