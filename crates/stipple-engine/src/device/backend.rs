//! Graphics-driver seam.
//!
//! Renderables only ever talk to the driver through [`GraphicsBackend`]:
//! they create buffers/vertex arrays/programs once at init and then bind a
//! program, upload uniforms by name and issue instanced draws every frame.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::shader::{Declaration, ShaderType, UniformLayout};

use super::BackendError;

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to an RGBA8 texture (with its sampler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a vertex-array binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub(crate) u64);

/// Handle to a compiled vertex + fragment program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Element format of a single-attribute vertex buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Sint32,
}

impl VertexFormat {
    pub fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// Read cadence of a vertex buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StepMode {
    /// One element per vertex of the drawn primitive.
    Vertex,
    /// One element per drawn instance (divisor 1).
    Instance,
}

/// One buffer bound to one named shader input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBinding {
    pub name: String,
    pub buffer: BufferHandle,
    pub format: VertexFormat,
    pub step_mode: StepMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexArrayDesc {
    pub label: String,
    pub bindings: Vec<VertexBinding>,
}

impl VertexArrayDesc {
    pub fn binding(&self, name: &str) -> Option<&VertexBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

/// Everything a backend needs to compile and later feed a program.
///
/// Vertex inputs and fragment outputs are listed in location order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
    pub uniforms: UniformLayout,
    pub vertex_inputs: Vec<Declaration>,
    pub fragment_outputs: Vec<Declaration>,
    /// Texture names in binding order; each occupies a texture and a sampler slot.
    pub textures: Vec<String>,
    pub writes_depth: bool,
}

/// Value uploaded to a named uniform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Uint(u32),
    Int(i32),
    Bool(bool),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> ShaderType {
        match self {
            UniformValue::Float(_) => ShaderType::Float,
            UniformValue::Vec2(_) => ShaderType::Vec2,
            UniformValue::Vec3(_) => ShaderType::Vec3,
            UniformValue::Vec4(_) => ShaderType::Vec4,
            UniformValue::Uint(_) => ShaderType::Uint,
            UniformValue::Int(_) => ShaderType::Int,
            UniformValue::Bool(_) => ShaderType::Bool,
            UniformValue::Mat4(_) => ShaderType::Mat4,
        }
    }

    /// Native-endian bytes as laid out in a uniform block (column-major matrices).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Uint(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Bool(v) => bytemuck::bytes_of(&u32::from(*v)).to_vec(),
            UniformValue::Mat4(m) => bytemuck::cast_slice(&m.to_cols_array()).to_vec(),
        }
    }
}

macro_rules! impl_uniform_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for UniformValue {
            #[inline]
            fn from(v: $t) -> Self {
                UniformValue::$variant(v)
            }
        })*
    };
}

impl_uniform_from!(
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    u32 => Uint,
    i32 => Int,
    bool => Bool,
    Mat4 => Mat4,
);

/// Minimal driver interface used by renderables.
///
/// All calls happen on the thread that owns the graphics context. Program,
/// uniform and texture state set through `use_program` / `set_uniform` /
/// `bind_texture` applies to the next `draw_instanced`.
pub trait GraphicsBackend {
    fn name(&self) -> &'static str;

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BackendResult<BufferHandle>;

    fn create_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> BackendResult<TextureHandle>;

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> BackendResult<VertexArrayHandle>;

    /// Compiles and links both stages. On rejection the error carries the
    /// driver's diagnostic text unchanged.
    fn compile_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramHandle>;

    fn use_program(&mut self, program: ProgramHandle);

    /// Uploads a uniform of the bound program. Names the program does not
    /// declare are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn bind_texture(&mut self, name: &str, texture: TextureHandle);

    fn draw_instanced(
        &mut self,
        vertex_array: VertexArrayHandle,
        vertex_count: u32,
        instance_count: u32,
    );
}
