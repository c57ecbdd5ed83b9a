use thiserror::Error;

/// Errors reported by a [`GraphicsBackend`](super::GraphicsBackend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The driver rejected a program; `diagnostic` is its message verbatim.
    #[error("shader compilation failed for `{label}`:\n{diagnostic}")]
    ShaderCompilation { label: String, diagnostic: String },
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u64 },
    #[error("failed to create resource: {0}")]
    ResourceCreation(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}
