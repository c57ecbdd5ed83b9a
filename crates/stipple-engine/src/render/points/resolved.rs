use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::attribute::MeshAttribute;
use crate::error::{RenderError, RenderResult};
use crate::geometry::{Aabb, ContentHasher};
use crate::mesh::MeshDefinition;
use crate::render::builder::{Facing, GeometricBuilder, PointBuilder, PointShape, RenderMode, SizeSpace};
use crate::render::coloring::{ColorMapping, Masking, Texturing};
use crate::shader::ShaderType;

use super::codegen;

/// Values injected for attributes the builder did not provide.
#[derive(Debug, Copy, Clone)]
pub struct PointDefaults;

impl PointDefaults {
    pub const SIZE: f32 = 10.0;
    pub const NORMAL: Vec3 = Vec3::Y;
    /// Gray level of flat camera-facing quads.
    pub const FLAT_GRAY: f32 = 0.2;
    /// Gray level of spheres and normal-aligned quads.
    pub const LIT_GRAY: f32 = 0.7;

    pub fn color(shape: PointShape, facing: Facing) -> Vec4 {
        let gray = if facing == Facing::Camera && shape != PointShape::Sphere {
            Self::FLAT_GRAY
        } else {
            Self::LIT_GRAY
        };
        Vec3::splat(gray).extend(1.0)
    }
}

/// A point configuration with every flag decided and every required
/// attribute present.
///
/// Computing this needs no graphics driver, so the content hash and bounds
/// are available before any GPU work.
#[derive(Debug, Clone)]
pub struct ResolvedPoints {
    mesh: Arc<MeshDefinition>,
    transform: Mat4,
    attributes: Vec<MeshAttribute>,

    shape: PointShape,
    size_space: SizeSpace,
    facing: Facing,

    render_mode: RenderMode,
    shading: bool,
    fresnel: bool,

    color_mapping: Option<ColorMapping>,
    texturing: Option<Texturing>,
    masking: Option<Masking>,
}

fn add_missing(attributes: &mut Vec<MeshAttribute>, attribute: MeshAttribute) {
    if attributes.iter().any(|a| a.name() == attribute.name()) {
        return;
    }
    log::debug!("points: injecting default attribute `{}`", attribute.name());
    attributes.push(attribute);
}

fn expect_type(
    attribute: Option<&MeshAttribute>,
    allowed: &[ShaderType],
) -> RenderResult<()> {
    let Some(attribute) = attribute else {
        return Ok(());
    };
    if allowed.contains(&attribute.ty()) {
        return Ok(());
    }
    Err(RenderError::AttributeType {
        name: attribute.name().to_owned(),
        expected: allowed[0],
        actual: attribute.ty(),
    })
}

impl ResolvedPoints {
    pub(crate) fn resolve(builder: &PointBuilder) -> Self {
        let base = builder.base();

        let shape = builder.shape.unwrap_or_default();
        let size_space = builder.size_space.unwrap_or_default();
        let facing = builder.facing.unwrap_or_default();

        let mut shading = base.shading_enabled();
        if !shading && shape == PointShape::Sphere {
            log::warn!("sphere points are always shaded; enabling shading");
            shading = true;
        }

        let texturing = base.texturing().cloned();
        let color_mapping = if texturing.is_some() {
            None
        } else {
            base.color_mapping().cloned()
        };
        let masking = base.masking().cloned();

        let mut attributes = base.attributes().to_vec();
        add_missing(&mut attributes, MeshAttribute::constant("aPointSize", PointDefaults::SIZE));
        add_missing(&mut attributes, MeshAttribute::constant("aNormal", PointDefaults::NORMAL));

        if let Some(masking) = &masking {
            add_missing(&mut attributes, masking.data_attribute().clone());
        }
        if let Some(texturing) = &texturing {
            add_missing(&mut attributes, texturing.coords_attribute().clone());
        } else if let Some(mapping) = &color_mapping {
            add_missing(&mut attributes, mapping.data_attribute().clone());
        } else {
            add_missing(
                &mut attributes,
                MeshAttribute::constant("aColor", PointDefaults::color(shape, facing)),
            );
        }

        Self {
            mesh: Arc::clone(base.mesh()),
            transform: base.transform_matrix(),
            attributes,
            shape,
            size_space,
            facing,
            render_mode: base.render_mode(),
            shading,
            fresnel: base.fresnel_enabled(),
            color_mapping,
            texturing,
            masking,
        }
    }

    /// Configuration errors, reported before any GPU resource is created.
    pub fn validate(&self) -> RenderResult<()> {
        self.mesh.validate()?;
        for attribute in &self.attributes {
            if let Some(reserved) = codegen::reserved_identifier(attribute.name()) {
                return Err(RenderError::ReservedAttribute {
                    name: attribute.name().to_owned(),
                    reserved: reserved.to_owned(),
                });
            }
            attribute.validate(&self.mesh)?;
        }

        expect_type(self.attribute("aPosition"), &[ShaderType::Vec3])?;
        expect_type(self.attribute("aPointSize"), &[ShaderType::Float])?;
        expect_type(self.attribute("aNormal"), &[ShaderType::Vec3])?;
        expect_type(self.attribute("aColor"), &[ShaderType::Vec4, ShaderType::Vec3])?;

        if let Some(mapping) = &self.color_mapping {
            mapping.validate()?;
        }
        if let Some(texturing) = &self.texturing {
            texturing.validate()?;
        }
        if let Some(masking) = &self.masking {
            masking.validate()?;
        }
        Ok(())
    }

    pub fn mesh(&self) -> &MeshDefinition {
        &self.mesh
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn attributes(&self) -> &[MeshAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&MeshAttribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn shape(&self) -> PointShape {
        self.shape
    }

    pub fn size_space(&self) -> SizeSpace {
        self.size_space
    }

    pub fn facing(&self) -> Facing {
        self.facing
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

    /// Effective color mapping; texturing takes precedence.
    pub fn color_mapping(&self) -> Option<&ColorMapping> {
        self.color_mapping.as_ref()
    }

    pub fn texturing(&self) -> Option<&Texturing> {
        self.texturing.as_ref()
    }

    pub fn masking(&self) -> Option<&Masking> {
        self.masking.as_ref()
    }

    #[inline]
    pub fn is_sphere(&self) -> bool {
        self.shape == PointShape::Sphere
    }

    /// Whether `aPointSize` is a world-space extent.
    ///
    /// Normal-aligned quads lie in the scene and are always world-sized.
    pub fn world_sized(&self) -> bool {
        self.size_space == SizeSpace::World
            || (self.facing == Facing::OwnNormals && !self.is_sphere())
    }

    pub fn compute_hash(&self) -> u64 {
        let mut h = ContentHasher::new();
        h.write_slice(self.transform.to_cols_array().as_slice());

        for attribute in &self.attributes {
            attribute.hash_into(&mut h, &self.mesh);
        }

        match &self.color_mapping {
            Some(mapping) => {
                h.write_u8(1);
                mapping.hash_into(&mut h, &self.mesh);
            }
            None => {
                h.write_u8(0);
            }
        }
        match &self.texturing {
            Some(texturing) => {
                h.write_u8(1);
                texturing.hash_into(&mut h, &self.mesh);
            }
            None => {
                h.write_u8(0);
            }
        }
        match &self.masking {
            Some(masking) => {
                h.write_u8(1);
                masking.hash_into(&mut h, &self.mesh);
            }
            None => {
                h.write_u8(0);
            }
        }

        h.write_u8(self.render_mode as u8)
            .write_u8(self.shape as u8)
            .write_u8(self.facing as u8)
            .write_u8(self.size_space as u8)
            .write_u8(u8::from(self.shading))
            .write_u8(u8::from(self.fresnel));
        h.finish()
    }

    /// Transformed mesh bounds, grown by the largest point radius when
    /// points have a world-space extent.
    pub fn compute_aabb(&self) -> Aabb {
        let aabb = self.mesh.aabb.transformed(&self.transform);
        if !self.world_sized() {
            return aabb;
        }
        let max_size = self
            .attribute("aPointSize")
            .and_then(|a| a.compute_max_scalar(&self.mesh))
            .unwrap_or(0.0);
        aabb.inflated(max_size / 2.0)
    }
}
