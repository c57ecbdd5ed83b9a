use thiserror::Error;

use crate::device::BackendError;
use crate::shader::ShaderType;

/// Errors surfaced while assembling or drawing renderables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("attribute `{0}` was added twice")]
    DuplicateAttribute(String),

    #[error("attribute `{name}` has {actual} elements, expected {expected}")]
    AttributeLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("attribute `{name}` reads mesh channel {channel} which the mesh does not provide")]
    MissingMeshChannel { name: String, channel: String },

    #[error("attribute `{name}` must be {expected:?}, found {actual:?}")]
    AttributeType {
        name: String,
        expected: ShaderType,
        actual: ShaderType,
    },

    /// The name, or the passthrough it derives, is generated by the pipeline.
    #[error("attribute `{name}` collides with the pipeline's own `{reserved}`")]
    ReservedAttribute { name: String, reserved: String },

    #[error("texture is {width}x{height} but has {actual} bytes, expected {expected}")]
    TextureSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("program `{program}` failed to compile:\n{diagnostic}")]
    ShaderCompile { program: String, diagnostic: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RenderResult<T> = Result<T, RenderError>;
