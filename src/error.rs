//! Error types for configuration loading and shadow computation.

/// Errors that can occur when loading, saving, or parsing a shadow configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),
}

/// Errors raised by a terrain shadow invocation.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    /// Grid resolution must be positive in both directions.
    #[error("grid dimensions must be positive, got {rows}x{cols}")]
    InvalidGrid { rows: usize, cols: usize },

    #[error("invalid shadow configuration: {0}")]
    InvalidConfig(String),

    /// A triangle references a vertex index outside the vertex array.
    #[error("face {face} references vertex {vertex} but the mesh has {vertex_count} vertices")]
    InvalidFace {
        face: usize,
        vertex: usize,
        vertex_count: usize,
    },

    /// Vertex array is not `n x 3`.
    #[error("vertex array must have 3 columns, got {0}")]
    InvalidVertexShape(usize),

    /// A face vertex reached restoration without having been rotated.
    #[error("vertex {vertex} has no sun-frame state; rotation did not run")]
    MissingVertexState { vertex: usize },

    /// A face reached the result writer without shadow state.
    #[error("face {face} has no shadow state; occlusion did not run")]
    MissingFaceState { face: usize },

    #[error("terrain shadow computation cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(feature = "python")]
impl From<ShadowError> for pyo3::PyErr {
    fn from(err: ShadowError) -> Self {
        match err {
            ShadowError::Cancelled => {
                pyo3::exceptions::PyInterruptedError::new_err(err.to_string())
            }
            ShadowError::MissingVertexState { .. } | ShadowError::MissingFaceState { .. } => {
                pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
            }
            _ => pyo3::exceptions::PyValueError::new_err(err.to_string()),
        }
    }
}
