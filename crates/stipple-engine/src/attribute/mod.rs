//! Named per-point data sources.
//!
//! An attribute is either a constant (uploaded as a uniform, no buffer), an
//! owned data array (one element per point) or a reference to a channel of the
//! renderable's [`MeshDefinition`](crate::mesh::MeshDefinition).

mod mesh_attribute;
mod value;

pub use mesh_attribute::{AttributeSource, MeshAttribute, passthrough_name};
pub use value::{AttributeData, AttributeValue};
