use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::attribute::{AttributeData, MeshAttribute};
use crate::device::GraphicsBackend;
use crate::error::{RenderError, RenderResult};
use crate::mesh::{MeshChannel, MeshDefinition};

use super::coloring::{ColorMapping, Masking, Texturing};
use super::points::{PointRenderable, ResolvedPoints};

/// Which forward pass draws a renderable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    #[default]
    Opaque,
    Transparent,
}

/// State shared by every geometric renderable builder.
///
/// Pure CPU-side accumulation: nothing here touches the graphics driver.
#[derive(Debug, Clone)]
pub struct RenderableBuilder {
    mesh: Arc<MeshDefinition>,
    transform: Mat4,
    attributes: Vec<MeshAttribute>,

    render_mode: RenderMode,
    shading: bool,
    fresnel: bool,

    color_mapping: Option<ColorMapping>,
    texturing: Option<Texturing>,
    masking: Option<Masking>,
}

impl RenderableBuilder {
    pub fn new(mesh: impl Into<Arc<MeshDefinition>>) -> Self {
        Self {
            mesh: mesh.into(),
            transform: Mat4::IDENTITY,
            attributes: Vec::new(),
            render_mode: RenderMode::Opaque,
            shading: true,
            fresnel: true,
            color_mapping: None,
            texturing: None,
            masking: None,
        }
    }

    pub fn mesh(&self) -> &Arc<MeshDefinition> {
        &self.mesh
    }

    pub fn transform_matrix(&self) -> Mat4 {
        self.transform
    }

    pub fn attributes(&self) -> &[MeshAttribute] {
        &self.attributes
    }

    pub fn find_attribute(&self, name: &str) -> Option<&MeshAttribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.find_attribute(name).is_some()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn shading_enabled(&self) -> bool {
        self.shading
    }

    pub fn fresnel_enabled(&self) -> bool {
        self.fresnel
    }

    pub fn color_mapping(&self) -> Option<&ColorMapping> {
        self.color_mapping.as_ref()
    }

    pub fn texturing(&self) -> Option<&Texturing> {
        self.texturing.as_ref()
    }

    pub fn masking(&self) -> Option<&Masking> {
        self.masking.as_ref()
    }

    fn push_attribute(&mut self, attribute: MeshAttribute) -> RenderResult<()> {
        if self.has_attribute(attribute.name()) {
            return Err(RenderError::DuplicateAttribute(attribute.name().to_owned()));
        }
        self.attributes.push(attribute);
        Ok(())
    }

    fn replace_attribute(&mut self, attribute: MeshAttribute) {
        match self.attributes.iter_mut().find(|a| a.name() == attribute.name()) {
            Some(slot) => *slot = attribute,
            None => self.attributes.push(attribute),
        }
    }
}

/// Fluent operations of all geometric builders.
///
/// Transform calls post-multiply: later calls act in the local frame
/// established by earlier ones.
pub trait GeometricBuilder: Sized {
    fn base(&self) -> &RenderableBuilder;
    fn base_mut(&mut self) -> &mut RenderableBuilder;

    fn transform(mut self, m: Mat4) -> Self {
        let base = self.base_mut();
        base.transform *= m;
        self
    }

    fn translate(self, v: Vec3) -> Self {
        self.transform(Mat4::from_translation(v))
    }

    fn scale(self, v: Vec3) -> Self {
        self.transform(Mat4::from_scale(v))
    }

    /// Rotation by `angle` radians around `axis`.
    fn rotate(self, angle: f32, axis: Vec3) -> Self {
        self.transform(Mat4::from_axis_angle(axis.normalize_or(Vec3::Y), angle))
    }

    fn rotate_x(self, angle: f32) -> Self {
        self.transform(Mat4::from_rotation_x(angle))
    }

    fn rotate_y(self, angle: f32) -> Self {
        self.transform(Mat4::from_rotation_y(angle))
    }

    fn rotate_z(self, angle: f32) -> Self {
        self.transform(Mat4::from_rotation_z(angle))
    }

    /// Adds a named attribute. Fails if the name is already taken.
    fn attribute(mut self, attribute: MeshAttribute) -> RenderResult<Self> {
        self.base_mut().push_attribute(attribute)?;
        Ok(self)
    }

    fn mode(mut self, mode: RenderMode) -> Self {
        self.base_mut().render_mode = mode;
        self
    }

    fn transparent(self) -> Self {
        self.mode(RenderMode::Transparent)
    }

    fn shading(mut self, enabled: bool) -> Self {
        self.base_mut().shading = enabled;
        self
    }

    fn fresnel(mut self, enabled: bool) -> Self {
        self.base_mut().fresnel = enabled;
        self
    }

    fn mapped_colors(mut self, mapping: ColorMapping) -> Self {
        self.base_mut().color_mapping = Some(mapping);
        self
    }

    fn textured(mut self, texturing: Texturing) -> Self {
        self.base_mut().texturing = Some(texturing);
        self
    }

    fn masked(mut self, masking: Masking) -> Self {
        self.base_mut().masking = Some(masking);
        self
    }
}

impl GeometricBuilder for RenderableBuilder {
    fn base(&self) -> &RenderableBuilder {
        self
    }

    fn base_mut(&mut self) -> &mut RenderableBuilder {
        self
    }
}

/// Point primitive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PointShape {
    /// Flat square quad.
    Square,
    /// Flat quad cut to a disc.
    Round,
    /// Ray-traced sphere impostor with exact depth.
    #[default]
    Sphere,
}

/// Unit of `aPointSize`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum SizeSpace {
    /// World units; the point diameter.
    World,
    /// Pixels.
    #[default]
    Screen,
}

/// Orientation of flat point quads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    #[default]
    Camera,
    /// Quad lies in the plane orthogonal to `aNormal`.
    OwnNormals,
}

/// Builder for point clouds.
///
/// `aPosition` is bound to the mesh positions; `aNormal` and `aColor` are
/// bound to the mesh normals and first color channel when the mesh has them.
#[derive(Debug, Clone)]
pub struct PointBuilder {
    base: RenderableBuilder,
    pub(crate) shape: Option<PointShape>,
    pub(crate) size_space: Option<SizeSpace>,
    pub(crate) facing: Option<Facing>,
}

impl GeometricBuilder for PointBuilder {
    fn base(&self) -> &RenderableBuilder {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RenderableBuilder {
        &mut self.base
    }
}

impl PointBuilder {
    pub fn new(mesh: impl Into<Arc<MeshDefinition>>) -> Self {
        let mut base = RenderableBuilder::new(mesh);
        base.replace_attribute(MeshAttribute::mesh("aPosition", MeshChannel::Position));
        if base.mesh.has_channel(MeshChannel::Normal) {
            base.replace_attribute(MeshAttribute::mesh("aNormal", MeshChannel::Normal));
        }
        if base.mesh.has_channel(MeshChannel::Color(0)) {
            base.replace_attribute(MeshAttribute::mesh("aColor", MeshChannel::Color(0)));
        }
        Self {
            base,
            shape: None,
            size_space: None,
            facing: None,
        }
    }

    /// Points at `positions`, without further data.
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self::new(MeshDefinition::from_positions(positions))
    }

    pub fn square(mut self) -> Self {
        self.shape = Some(PointShape::Square);
        self
    }

    pub fn round(mut self) -> Self {
        self.shape = Some(PointShape::Round);
        self
    }

    pub fn spheres(mut self) -> Self {
        self.shape = Some(PointShape::Sphere);
        self
    }

    pub fn world_space_size(mut self) -> Self {
        self.size_space = Some(SizeSpace::World);
        self
    }

    pub fn screen_space_size(mut self) -> Self {
        self.size_space = Some(SizeSpace::Screen);
        self
    }

    pub fn camera_facing(mut self) -> Self {
        self.facing = Some(Facing::Camera);
        self
    }

    pub fn own_normals(mut self) -> Self {
        self.facing = Some(Facing::OwnNormals);
        self
    }

    /// Same size for every point, replacing any previous `aPointSize`.
    pub fn point_size(mut self, size: f32) -> Self {
        self.base.replace_attribute(MeshAttribute::constant("aPointSize", size));
        self
    }

    pub fn point_sizes(mut self, sizes: Vec<f32>) -> Self {
        self.base.replace_attribute(MeshAttribute::data("aPointSize", sizes));
        self
    }

    pub fn color(mut self, color: Vec4) -> Self {
        self.base.replace_attribute(MeshAttribute::constant("aColor", color));
        self
    }

    pub fn colors(mut self, colors: Vec<Vec4>) -> Self {
        self.base.replace_attribute(MeshAttribute::data("aColor", colors));
        self
    }

    pub fn normals(mut self, normals: Vec<Vec3>) -> Self {
        self.base
            .replace_attribute(MeshAttribute::data("aNormal", AttributeData::from(normals)));
        self
    }

    /// Resolves flags and default attributes without touching the driver.
    pub fn resolve(&self) -> ResolvedPoints {
        ResolvedPoints::resolve(self)
    }

    /// Uploads buffers and compiles programs.
    pub fn build(self, backend: &mut dyn GraphicsBackend) -> RenderResult<PointRenderable> {
        PointRenderable::init(&self, backend)
    }
}
