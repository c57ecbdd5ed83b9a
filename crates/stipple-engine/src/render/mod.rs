//! Renderables and the per-frame data they consume.
//!
//! Flow: a builder accumulates transform, attributes and flags; `build`
//! resolves defaults, uploads buffers and compiles programs once; the
//! `render_*` entry points then draw once per pass per frame.

mod builder;
mod coloring;
mod info;
mod points;
mod renderable;

pub use builder::{
    Facing, GeometricBuilder, PointBuilder, PointShape, RenderMode, RenderableBuilder, SizeSpace,
};
pub use coloring::{COLOR_TEXTURE, ColorMapping, Masking, Texturing};
pub use info::{NO_CLIP_PLANE, RenderInfo};
pub use points::{
    PointDefaults, PointRenderable, QUAD_POSITIONS, QUAD_VERTEX_COUNT, ResolvedPoints,
};
pub use renderable::Renderable;
