//! Error types for halo-rs.

use thiserror::Error;

/// The main error type for halo-rs operations.
#[derive(Error, Debug)]
pub enum HaloError {
    /// A viewport with a zero dimension was requested.
    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    /// A vertex index points past the end of the vertex list.
    #[error("index {index} out of bounds for {len} vertices")]
    IndexOutOfBounds { index: u32, len: usize },

    /// Geometry data is inconsistent.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The pass graph is not in a valid order.
    #[error("invalid pass order: {0}")]
    InvalidPassOrder(String),

    /// A pass referenced a render target from a previous viewport size.
    #[error("stale render target: expected generation {expected}, got {actual}")]
    StaleTarget { expected: u64, actual: u64 },

    /// Rendering backend error.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for halo-rs operations.
pub type Result<T> = std::result::Result<T, HaloError>;
