//! Error handling for the reporting engine.

/// Specialized error type for reporting operations
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Construction-time argument error (fatal for the caller)
    #[error("Argument error: {0}")]
    Argument(String),

    /// Recoverable validation failure (uniqueness, missing attributes, bad reparent)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Traversal requested across an invalid region-type direction.
    /// Signals a caller bug, not a data problem.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Region lookup failure
    #[error("Unknown region: {0}")]
    RegionNotFound(String),

    /// Cache store failure. Never masked by silent direct computation.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Period parsing or arithmetic failure
    #[error("Period error: {0}")]
    Period(String),
}

/// Result type for reporting operations
pub type Result<T> = std::result::Result<T, ReportError>;
