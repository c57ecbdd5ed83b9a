//! Point clouds drawn as instanced quads.
//!
//! Every point is one instance of a fixed six-vertex unit quad; per-point
//! attributes are bound at instance rate and the vertex stage expands the
//! quad according to shape, size space and facing.

mod codegen;
mod renderable;
mod resolved;

pub use renderable::{PointRenderable, QUAD_POSITIONS, QUAD_VERTEX_COUNT};
pub use resolved::{PointDefaults, ResolvedPoints};
