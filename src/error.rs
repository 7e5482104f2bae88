//! Error types for Trellis.

use thiserror::Error;

/// Trellis error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Path expression parse error
    #[error("Path error: {0}")]
    Path(#[from] crate::query::path::PathError),

    /// Registry storage error
    #[error("Registry error: {0}")]
    Registry(#[from] crate::registry::node::RegistryError),

    /// Synchronisation error
    #[error("Sync error: {0}")]
    Sync(#[from] crate::sync::handler::SyncError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expression matched nothing where exactly one match was required
    #[error("no entry matches '{expr}'")]
    NoMatch {
        /// The expression that matched nothing
        expr: String,
    },

    /// Expression matched several entries where exactly one was required
    #[error("'{expr}' is ambiguous: {count} entries match")]
    AmbiguousPath {
        /// The expression that fanned out
        expr: String,
        /// How many entries matched
        count: usize,
    },
}

/// Result type alias for Trellis operations.
pub type Result<T> = std::result::Result<T, Error>;
