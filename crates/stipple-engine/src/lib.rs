//! Stipple engine crate.
//!
//! Declarative assembly of point-cloud render pipelines: squares, discs and
//! ray-cast sphere impostors, sized in screen or world space, facing the
//! camera or their own normals. A [`render::PointBuilder`] collects geometry
//! and per-point attributes, and building it generates the WGSL programs and
//! vertex bindings for a [`device::GraphicsBackend`].

pub mod attribute;
pub mod device;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod mesh;
pub mod render;
pub mod shader;
pub mod transparency;

pub use attribute::MeshAttribute;
pub use error::{RenderError, RenderResult};
pub use render::{GeometricBuilder, PointBuilder, PointRenderable, RenderInfo, Renderable};
