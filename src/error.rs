//! Error types for the cache clock
//!
//! Provides unified error handling using thiserror. Cache misses and
//! expirations are not errors: lookups report absence with `Option`.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache clock.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No scheduler was injected and no Tokio runtime is available
    #[error("No Tokio runtime available to drive the expiration clock")]
    NoRuntime,

    /// A structured key could not be stringified
    #[error("Unable to encode cache key: {0}")]
    KeyEncoding(#[source] serde_json::Error),

    /// Exporting the cache contents failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache clock.
pub type Result<T> = std::result::Result<T, CacheError>;
