//! Finished mesh data handed over by the geometry provider.

mod definition;

pub use definition::{MeshChannel, MeshDefinition};
