use glam::Vec3;

use crate::device::{BackendError, GraphicsBackend, StepMode, VertexBinding};
use crate::error::{RenderError, RenderResult};
use crate::geometry::ContentHasher;
use crate::mesh::{MeshChannel, MeshDefinition};
use crate::shader::{ShaderBuilder, ShaderType};

use super::{AttributeData, AttributeValue};

/// Where an attribute's values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSource {
    /// Same value for every point, uploaded as a uniform.
    Constant(AttributeValue),
    /// One value per point.
    Data(AttributeData),
    /// A per-vertex stream of the mesh.
    Mesh(MeshChannel),
}

/// Typed, named per-point data source.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAttribute {
    name: String,
    source: AttributeSource,
}

/// Name under which an attribute reaches the fragment stage: `aColor` → `Color`.
pub fn passthrough_name(attribute: &str) -> &str {
    match attribute.strip_prefix('a') {
        Some(rest) if !rest.is_empty() => rest,
        _ => attribute,
    }
}

fn channel_type(channel: MeshChannel) -> ShaderType {
    match channel {
        MeshChannel::Position | MeshChannel::Normal | MeshChannel::Tangent => ShaderType::Vec3,
        MeshChannel::Uv(_) => ShaderType::Vec2,
        MeshChannel::Color(_) => ShaderType::Vec4,
    }
}

fn channel_bytes(mesh: &MeshDefinition, channel: MeshChannel) -> Option<&[u8]> {
    if !mesh.has_channel(channel) {
        return None;
    }
    let bytes: &[u8] = match channel {
        MeshChannel::Position => bytemuck::cast_slice(&mesh.positions),
        MeshChannel::Normal => bytemuck::cast_slice(&mesh.normals),
        MeshChannel::Tangent => bytemuck::cast_slice(&mesh.tangents),
        MeshChannel::Uv(i) => bytemuck::cast_slice(mesh.uv_channels.get(i)?),
        MeshChannel::Color(i) => bytemuck::cast_slice(mesh.color_channels.get(i)?),
    };
    Some(bytes)
}

fn channel_max(mesh: &MeshDefinition, channel: MeshChannel) -> Option<f32> {
    let vec3_max = |v: &[Vec3]| v.iter().map(|e| e.max_element()).reduce(f32::max);
    match channel {
        MeshChannel::Position => vec3_max(&mesh.positions),
        MeshChannel::Normal => vec3_max(&mesh.normals),
        MeshChannel::Tangent => vec3_max(&mesh.tangents),
        MeshChannel::Uv(i) => mesh
            .uv_channels
            .get(i)?
            .iter()
            .map(|e| e.max_element())
            .reduce(f32::max),
        MeshChannel::Color(i) => mesh
            .color_channels
            .get(i)?
            .iter()
            .map(|e| e.max_element())
            .reduce(f32::max),
    }
}

impl MeshAttribute {
    pub fn constant(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            source: AttributeSource::Constant(value.into()),
        }
    }

    pub fn data(name: impl Into<String>, data: impl Into<AttributeData>) -> Self {
        Self {
            name: name.into(),
            source: AttributeSource::Data(data.into()),
        }
    }

    pub fn mesh(name: impl Into<String>, channel: MeshChannel) -> Self {
        Self {
            name: name.into(),
            source: AttributeSource::Mesh(channel),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn source(&self) -> &AttributeSource {
        &self.source
    }

    pub fn ty(&self) -> ShaderType {
        match &self.source {
            AttributeSource::Constant(v) => v.ty(),
            AttributeSource::Data(d) => d.ty(),
            AttributeSource::Mesh(c) => channel_type(*c),
        }
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self.source, AttributeSource::Constant(_))
    }

    /// Name of the `VertexOutput` field carrying this attribute.
    pub fn passthrough(&self) -> &str {
        passthrough_name(&self.name)
    }

    /// Checks that the attribute supplies exactly one value per point.
    pub fn validate(&self, mesh: &MeshDefinition) -> RenderResult<()> {
        let points = mesh.vertex_count();
        match &self.source {
            AttributeSource::Constant(_) => Ok(()),
            AttributeSource::Data(data) if data.len() != points => Err(RenderError::AttributeLength {
                name: self.name.clone(),
                expected: points,
                actual: data.len(),
            }),
            AttributeSource::Data(_) => Ok(()),
            AttributeSource::Mesh(channel) if !mesh.has_channel(*channel) => {
                Err(RenderError::MissingMeshChannel {
                    name: self.name.clone(),
                    channel: format!("{channel:?}"),
                })
            }
            AttributeSource::Mesh(_) => Ok(()),
        }
    }

    /// Raw per-point bytes, `None` for constants.
    pub fn bytes<'a>(&'a self, mesh: &'a MeshDefinition) -> Option<&'a [u8]> {
        match &self.source {
            AttributeSource::Constant(_) => None,
            AttributeSource::Data(data) => Some(data.as_bytes()),
            AttributeSource::Mesh(channel) => channel_bytes(mesh, *channel),
        }
    }

    /// Uploads the per-point values as an instance-rate vertex buffer.
    ///
    /// Constants have nothing to upload and yield `None`.
    pub fn create_buffer(
        &self,
        mesh: &MeshDefinition,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderResult<Option<VertexBinding>> {
        self.validate(mesh)?;
        let Some(bytes) = self.bytes(mesh) else {
            return Ok(None);
        };

        let format = self.ty().vertex_format().ok_or_else(|| {
            BackendError::ResourceCreation(format!(
                "attribute `{}` of type {:?} cannot be a vertex input",
                self.name,
                self.ty()
            ))
        })?;

        let buffer = backend.create_vertex_buffer(&self.name, bytes)?;
        Ok(Some(VertexBinding {
            name: self.name.clone(),
            buffer,
            format,
            step_mode: StepMode::Instance,
        }))
    }

    /// Declares the attribute and forwards it to the fragment stage.
    ///
    /// The vertex stage can read the value as a local named like the
    /// attribute; the fragment stage reads `vIn.<passthrough>`.
    pub fn declare_in_shader(&self, sb: &mut ShaderBuilder) {
        let ty = self.ty();
        let name = self.name.as_str();
        if self.is_constant() {
            sb.add_uniform(ty, name);
            sb.add_vertex_code(format!("let {name} = u.{name};"));
        } else {
            sb.add_vertex_input(ty, name);
        }

        let pass = self.passthrough();
        sb.add_passthrough(ty, pass);
        sb.add_vertex_code(format!("vOut.{pass} = {name};"));
    }

    /// Pushes the attribute's uniforms into the bound program.
    pub fn prepare_shader(&self, backend: &mut dyn GraphicsBackend) {
        if let AttributeSource::Constant(value) = &self.source {
            backend.set_uniform(&self.name, value.to_uniform());
        }
    }

    /// Largest scalar over all points (the constant itself when uniform).
    pub fn compute_max_scalar(&self, mesh: &MeshDefinition) -> Option<f32> {
        match &self.source {
            AttributeSource::Constant(v) => Some(v.max_scalar()),
            AttributeSource::Data(d) => d.max_scalar(),
            AttributeSource::Mesh(c) => channel_max(mesh, *c),
        }
    }

    /// Folds name, type and contents into `hasher`.
    pub fn hash_into(&self, hasher: &mut ContentHasher, mesh: &MeshDefinition) {
        hasher.write_str(&self.name).write_u8(self.ty().tag());
        match &self.source {
            AttributeSource::Constant(v) => {
                hasher.write_u8(0).write(v.as_bytes());
            }
            AttributeSource::Data(d) => {
                hasher.write_u8(1).write(d.as_bytes());
            }
            AttributeSource::Mesh(c) => {
                hasher
                    .write_u8(2)
                    .write(&c.tag())
                    .write(channel_bytes(mesh, *c).unwrap_or_default());
            }
        }
    }
}
