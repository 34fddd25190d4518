//! Error types for the simulflow dataflow runtime.

/// Top-level error type for the processor-and-frame substrate.
#[derive(Debug, thiserror::Error)]
pub enum SimulflowError {
    /// A processor's `init` rejected its params: missing required key or a
    /// value that failed validation. The graph does not start.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A frame payload failed its type's schema (only raised when
    /// `schema-checking` is enabled).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// An upstream channel closed mid-read. Not fatal: the owning worker
    /// exits its loop and the processor remains ready for `stop`.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// A vendor/network/codec failure inside an init-owned worker.
    #[error("external error: {0}")]
    External(String),

    /// A tool call referenced a name absent from the context's tool catalogue.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// A tool's handler raised while executing.
    #[error("tool handler error: {0}")]
    ToolHandler(String),

    /// Channel send/receive failure at the runtime level.
    #[error("channel error: {0}")]
    Channel(String),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SimulflowError>;
