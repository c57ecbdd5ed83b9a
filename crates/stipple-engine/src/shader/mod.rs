//! Run-time WGSL assembly.
//!
//! A [`ShaderBuilder`] collects typed declarations (uniforms, vertex inputs,
//! passthroughs, fragment outputs, textures) and opaque code fragments per
//! stage, then assembles one WGSL text per stage and hands both to the
//! graphics backend as a single program.
//!
//! Conventions inside generated code:
//! - uniforms are fields of the module-scope `u` (`u.uModel`)
//! - vertex inputs are bound to locals of the same name (`aPosition`)
//! - passthroughs are written as `vOut.Name` and read as `vIn.Name`
//! - fragment outputs are written as `fOut.name`

mod builder;
mod types;
mod uniforms;

pub use builder::{
    CompiledProgram, Declaration, FRAGMENT_ENTRY, ShaderBuilder, ShaderSources, VERTEX_ENTRY,
};
pub use types::ShaderType;
pub use uniforms::{UniformField, UniformLayout};
