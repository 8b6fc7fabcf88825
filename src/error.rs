//! Error types for the instrumentation layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for backends and the observation layer.
///
/// The proxy never constructs errors of its own for delegated calls; every
/// failure it returns originates in the wrapped backend and is propagated
/// unchanged.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found where the operation requires it (incr/decr)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Stored value cannot be used for the requested operation
    #[error("Invalid value for key {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Backend-specific failure (connection lost, storage error, ...)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Context-hint resolution failed; always suppressed by the proxy
    #[error("Context resolution failed: {0}")]
    Context(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
