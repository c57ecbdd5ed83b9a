//! GPU device management and the graphics-driver seam.
//!
//! This module is responsible for:
//! - the [`GraphicsBackend`] trait renderables draw through
//! - a recording backend used by tests and tooling
//! - the wgpu backend, headless device bootstrap and offscreen targets

mod backend;
mod error;
mod gpu;
mod init;
mod recording;
mod targets;
mod wgpu_backend;

pub use backend::{
    BackendResult, BufferHandle, GraphicsBackend, ProgramHandle, ProgramSource, StepMode,
    TextureHandle, UniformValue, VertexArrayDesc, VertexArrayHandle, VertexBinding, VertexFormat,
};
pub use error::BackendError;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use recording::{RecordedCommand, RecordingBackend};
pub use targets::{FrameTargets, OffscreenTargets, TargetFormats};
pub use wgpu_backend::{WgpuBackend, validate_wgsl};
