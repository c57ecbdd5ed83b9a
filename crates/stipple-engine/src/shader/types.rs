use crate::device::VertexFormat;

/// Value types that can cross the CPU/shader boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Uint,
    Int,
    /// Stored as `u32` inside uniform blocks.
    Bool,
    Mat4,
}

impl ShaderType {
    /// WGSL spelling of the type as it appears in declarations.
    pub fn wgsl(self) -> &'static str {
        match self {
            ShaderType::Float => "f32",
            ShaderType::Vec2 => "vec2<f32>",
            ShaderType::Vec3 => "vec3<f32>",
            ShaderType::Vec4 => "vec4<f32>",
            ShaderType::Uint => "u32",
            ShaderType::Int => "i32",
            ShaderType::Bool => "u32",
            ShaderType::Mat4 => "mat4x4<f32>",
        }
    }

    /// `(align, size)` in bytes under the WGSL uniform address space.
    pub fn uniform_layout(self) -> (usize, usize) {
        match self {
            ShaderType::Float | ShaderType::Uint | ShaderType::Int | ShaderType::Bool => (4, 4),
            ShaderType::Vec2 => (8, 8),
            ShaderType::Vec3 => (16, 12),
            ShaderType::Vec4 => (16, 16),
            ShaderType::Mat4 => (16, 64),
        }
    }

    /// Integer values must not be interpolated between stages.
    pub fn is_integer(self) -> bool {
        matches!(self, ShaderType::Uint | ShaderType::Int | ShaderType::Bool)
    }

    /// Vertex fetch format, if the type can be a per-vertex input.
    pub fn vertex_format(self) -> Option<VertexFormat> {
        match self {
            ShaderType::Float => Some(VertexFormat::Float32),
            ShaderType::Vec2 => Some(VertexFormat::Float32x2),
            ShaderType::Vec3 => Some(VertexFormat::Float32x3),
            ShaderType::Vec4 => Some(VertexFormat::Float32x4),
            ShaderType::Uint => Some(VertexFormat::Uint32),
            ShaderType::Int => Some(VertexFormat::Sint32),
            ShaderType::Bool | ShaderType::Mat4 => None,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_is_stored_as_u32() {
        assert_eq!(ShaderType::Bool.wgsl(), "u32");
        assert_eq!(ShaderType::Bool.uniform_layout(), (4, 4));
    }

    #[test]
    fn vec3_aligns_like_vec4() {
        assert_eq!(ShaderType::Vec3.uniform_layout(), (16, 12));
    }

    #[test]
    fn matrices_are_not_vertex_inputs() {
        assert!(ShaderType::Mat4.vertex_format().is_none());
        assert_eq!(ShaderType::Vec2.vertex_format(), Some(VertexFormat::Float32x2));
    }
}
