use thiserror::Error;

/// Errors raised by the render engine.
///
/// Device and backend failures arrive as [`anyhow::Error`] and are carried unchanged in
/// [`RenderError::Device`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// Render settings or frame geometry that cannot be rendered.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A host-side layout does not match the stride the kernel declares for it.
    #[error("layout mismatch for {name}: host stride is {host} bytes, kernel expects {kernel} bytes")]
    LayoutMismatch {
        name: &'static str,
        host: usize,
        kernel: usize,
    },

    /// Something the engine needs to render was not provided.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// A scene object was rejected at registration.
    #[error("invalid scene object '{name}': {reason}")]
    InvalidObject { name: String, reason: String },

    #[error(transparent)]
    Device(#[from] anyhow::Error),
}
