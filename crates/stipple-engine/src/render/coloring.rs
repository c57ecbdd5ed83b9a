//! Per-fragment color sources other than a plain `aColor` attribute.

use std::sync::Arc;

use glam::Vec4;

use crate::attribute::MeshAttribute;
use crate::device::{GraphicsBackend, TextureHandle};
use crate::error::{RenderError, RenderResult};
use crate::geometry::ContentHasher;
use crate::mesh::MeshDefinition;
use crate::shader::{ShaderBuilder, ShaderType};

/// Texture binding used by [`Texturing`].
pub const COLOR_TEXTURE: &str = "tColor";

fn expect_type(attribute: &MeshAttribute, expected: ShaderType) -> RenderResult<()> {
    if attribute.ty() == expected {
        Ok(())
    } else {
        Err(RenderError::AttributeType {
            name: attribute.name().to_owned(),
            expected,
            actual: attribute.ty(),
        })
    }
}

/// Maps a float attribute linearly onto a color ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMapping {
    data: MeshAttribute,
    low: Vec4,
    high: Vec4,
    min: f32,
    max: f32,
}

impl ColorMapping {
    /// Black-to-white ramp over `[0, 1]`.
    pub fn new(data: MeshAttribute) -> Self {
        Self {
            data,
            low: Vec4::new(0.0, 0.0, 0.0, 1.0),
            high: Vec4::ONE,
            min: 0.0,
            max: 1.0,
        }
    }

    pub fn colors(mut self, low: Vec4, high: Vec4) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn data_attribute(&self) -> &MeshAttribute {
        &self.data
    }

    pub(crate) fn validate(&self) -> RenderResult<()> {
        expect_type(&self.data, ShaderType::Float)
    }

    pub(crate) fn build_shader(&self, sb: &mut ShaderBuilder) {
        sb.add_uniform(ShaderType::Vec4, "uColorMapLow")
            .add_uniform(ShaderType::Vec4, "uColorMapHigh")
            .add_uniform(ShaderType::Float, "uColorMapMin")
            .add_uniform(ShaderType::Float, "uColorMapMax");
    }

    /// WGSL expression of the mapped color.
    pub(crate) fn color_expr(&self) -> String {
        format!(
            "mix(u.uColorMapLow, u.uColorMapHigh, clamp((vIn.{} - u.uColorMapMin) / max(u.uColorMapMax - u.uColorMapMin, 1e-8), 0.0, 1.0))",
            self.data.passthrough()
        )
    }

    pub(crate) fn prepare_shader(&self, backend: &mut dyn GraphicsBackend) {
        backend.set_uniform("uColorMapLow", self.low.into());
        backend.set_uniform("uColorMapHigh", self.high.into());
        backend.set_uniform("uColorMapMin", self.min.into());
        backend.set_uniform("uColorMapMax", self.max.into());
    }

    pub(crate) fn hash_into(&self, hasher: &mut ContentHasher, mesh: &MeshDefinition) {
        self.data.hash_into(hasher, mesh);
        hasher
            .write_pod(&self.low)
            .write_pod(&self.high)
            .write_pod(&self.min)
            .write_pod(&self.max);
    }
}

/// Samples an RGBA8 image at a per-point coordinate attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Texturing {
    coords: MeshAttribute,
    width: u32,
    height: u32,
    texels: Arc<[u8]>,
}

impl Texturing {
    /// `texels` holds `width * height` tightly packed RGBA8 texels, row-major.
    pub fn new(coords: MeshAttribute, width: u32, height: u32, texels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            coords,
            width,
            height,
            texels: texels.into(),
        }
    }

    pub fn coords_attribute(&self) -> &MeshAttribute {
        &self.coords
    }

    pub(crate) fn validate(&self) -> RenderResult<()> {
        expect_type(&self.coords, ShaderType::Vec2)?;
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.texels.len() != expected {
            return Err(RenderError::TextureSize {
                width: self.width,
                height: self.height,
                expected,
                actual: self.texels.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn build_shader(&self, sb: &mut ShaderBuilder) {
        sb.add_texture(COLOR_TEXTURE);
    }

    pub(crate) fn color_expr(&self) -> String {
        format!(
            "textureSample({COLOR_TEXTURE}, {COLOR_TEXTURE}_sampler, vIn.{})",
            self.coords.passthrough()
        )
    }

    pub(crate) fn upload(&self, backend: &mut dyn GraphicsBackend) -> RenderResult<TextureHandle> {
        Ok(backend.create_texture_rgba8(COLOR_TEXTURE, self.width, self.height, &self.texels)?)
    }

    pub(crate) fn prepare_shader(&self, backend: &mut dyn GraphicsBackend, texture: TextureHandle) {
        backend.bind_texture(COLOR_TEXTURE, texture);
    }

    pub(crate) fn hash_into(&self, hasher: &mut ContentHasher, mesh: &MeshDefinition) {
        self.coords.hash_into(hasher, mesh);
        hasher
            .write_pod(&self.width)
            .write_pod(&self.height)
            .write(&self.texels);
    }
}

/// Discards fragments whose mask value is below a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Masking {
    data: MeshAttribute,
    threshold: f32,
}

impl Masking {
    pub fn new(data: MeshAttribute, threshold: f32) -> Self {
        Self { data, threshold }
    }

    pub fn data_attribute(&self) -> &MeshAttribute {
        &self.data
    }

    pub(crate) fn validate(&self) -> RenderResult<()> {
        expect_type(&self.data, ShaderType::Float)
    }

    pub(crate) fn build_shader(&self, sb: &mut ShaderBuilder) {
        sb.add_uniform(ShaderType::Float, "uMaskThreshold");
        sb.add_fragment_code(format!(
            "if (vIn.{} < u.uMaskThreshold) {{ discard; }}",
            self.data.passthrough()
        ));
    }

    pub(crate) fn prepare_shader(&self, backend: &mut dyn GraphicsBackend) {
        backend.set_uniform("uMaskThreshold", self.threshold.into());
    }

    pub(crate) fn hash_into(&self, hasher: &mut ContentHasher, mesh: &MeshDefinition) {
        self.data.hash_into(hasher, mesh);
        hasher.write_pod(&self.threshold);
    }
}
