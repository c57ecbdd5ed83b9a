use glam::{Vec2, Vec3, Vec4};

use crate::device::UniformValue;
use crate::shader::ShaderType;

/// A single attribute element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Uint(u32),
    Int(i32),
}

impl AttributeValue {
    pub fn ty(&self) -> ShaderType {
        match self {
            AttributeValue::Float(_) => ShaderType::Float,
            AttributeValue::Vec2(_) => ShaderType::Vec2,
            AttributeValue::Vec3(_) => ShaderType::Vec3,
            AttributeValue::Vec4(_) => ShaderType::Vec4,
            AttributeValue::Uint(_) => ShaderType::Uint,
            AttributeValue::Int(_) => ShaderType::Int,
        }
    }

    /// Largest scalar component.
    pub fn max_scalar(&self) -> f32 {
        match *self {
            AttributeValue::Float(v) => v,
            AttributeValue::Vec2(v) => v.max_element(),
            AttributeValue::Vec3(v) => v.max_element(),
            AttributeValue::Vec4(v) => v.max_element(),
            AttributeValue::Uint(v) => v as f32,
            AttributeValue::Int(v) => v as f32,
        }
    }

    pub fn to_uniform(&self) -> UniformValue {
        match *self {
            AttributeValue::Float(v) => UniformValue::Float(v),
            AttributeValue::Vec2(v) => UniformValue::Vec2(v),
            AttributeValue::Vec3(v) => UniformValue::Vec3(v),
            AttributeValue::Vec4(v) => UniformValue::Vec4(v),
            AttributeValue::Uint(v) => UniformValue::Uint(v),
            AttributeValue::Int(v) => UniformValue::Int(v),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttributeValue::Float(v) => bytemuck::bytes_of(v),
            AttributeValue::Vec2(v) => bytemuck::bytes_of(v),
            AttributeValue::Vec3(v) => bytemuck::bytes_of(v),
            AttributeValue::Vec4(v) => bytemuck::bytes_of(v),
            AttributeValue::Uint(v) => bytemuck::bytes_of(v),
            AttributeValue::Int(v) => bytemuck::bytes_of(v),
        }
    }
}

/// One attribute element per point.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    Float(Vec<f32>),
    Vec2(Vec<Vec2>),
    Vec3(Vec<Vec3>),
    Vec4(Vec<Vec4>),
    Uint(Vec<u32>),
    Int(Vec<i32>),
}

fn fold_max(values: impl Iterator<Item = f32>) -> Option<f32> {
    values.reduce(f32::max)
}

impl AttributeData {
    pub fn ty(&self) -> ShaderType {
        match self {
            AttributeData::Float(_) => ShaderType::Float,
            AttributeData::Vec2(_) => ShaderType::Vec2,
            AttributeData::Vec3(_) => ShaderType::Vec3,
            AttributeData::Vec4(_) => ShaderType::Vec4,
            AttributeData::Uint(_) => ShaderType::Uint,
            AttributeData::Int(_) => ShaderType::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AttributeData::Float(v) => v.len(),
            AttributeData::Vec2(v) => v.len(),
            AttributeData::Vec3(v) => v.len(),
            AttributeData::Vec4(v) => v.len(),
            AttributeData::Uint(v) => v.len(),
            AttributeData::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tightly packed element bytes, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttributeData::Float(v) => bytemuck::cast_slice(v),
            AttributeData::Vec2(v) => bytemuck::cast_slice(v),
            AttributeData::Vec3(v) => bytemuck::cast_slice(v),
            AttributeData::Vec4(v) => bytemuck::cast_slice(v),
            AttributeData::Uint(v) => bytemuck::cast_slice(v),
            AttributeData::Int(v) => bytemuck::cast_slice(v),
        }
    }

    /// Largest scalar component over all elements, `None` when empty.
    pub fn max_scalar(&self) -> Option<f32> {
        match self {
            AttributeData::Float(v) => fold_max(v.iter().copied()),
            AttributeData::Vec2(v) => fold_max(v.iter().map(|e| e.max_element())),
            AttributeData::Vec3(v) => fold_max(v.iter().map(|e| e.max_element())),
            AttributeData::Vec4(v) => fold_max(v.iter().map(|e| e.max_element())),
            AttributeData::Uint(v) => v.iter().max().map(|&m| m as f32),
            AttributeData::Int(v) => v.iter().max().map(|&m| m as f32),
        }
    }
}

macro_rules! impl_attribute_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for AttributeValue {
                #[inline]
                fn from(v: $t) -> Self {
                    AttributeValue::$variant(v)
                }
            }

            impl From<Vec<$t>> for AttributeData {
                #[inline]
                fn from(v: Vec<$t>) -> Self {
                    AttributeData::$variant(v)
                }
            }
        )*
    };
}

impl_attribute_from!(
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    u32 => Uint,
    i32 => Int,
);
