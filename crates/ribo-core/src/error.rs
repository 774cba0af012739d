//! Error types for Ribo retrieval operations.

use thiserror::Error;

/// Result type for Ribo operations.
pub type Result<T> = std::result::Result<T, RiboError>;

/// Errors that can occur across the retrieval core.
///
/// The taxonomy distinguishes configuration errors (rejected at the
/// call boundary, never coerced), subsystem failures (logged by
/// callers and degraded to empty results at the fusion/orchestration
/// layers) and resource errors. Empty results are *not* errors and
/// never appear here.
#[derive(Debug, Error)]
pub enum RiboError {
    /// Query string was empty or whitespace-only. Signals programmer
    /// error at the call boundary, not a runtime condition.
    #[error("query string is empty")]
    EmptyQuery,

    /// A configuration value failed validation.
    #[error("invalid config for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A strategy name did not resolve against the registry.
    #[error("unknown traversal strategy: {0}")]
    UnknownStrategy(String),

    /// Steiner-tree traversal requires at least two seeds resolvable
    /// in the graph.
    #[error("traversal requires at least {required} seed ids, found {found}")]
    InsufficientSeeds { required: usize, found: usize },

    /// The graph engine failed to execute a query. Callers need to
    /// distinguish this from an empty result set.
    #[error("graph query execution failed: {0}")]
    QueryFailed(String),

    /// The graph backend does not understand the submitted query text.
    #[error("unsupported graph query: {0}")]
    UnsupportedQuery(String),

    /// A record field was missing or had the wrong type.
    #[error("malformed graph record: {0}")]
    MalformedRecord(String),

    /// Embedding a text failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A lexical or vector index was not (or could not be) built.
    #[error("index not ready: {0}")]
    IndexNotReady(String),

    /// Loading the on-disk corpus snapshot failed.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// Operation attempted on a client that was already closed.
    #[error("client closed: {0}")]
    ClientClosed(String),

    /// I/O errors (wrapped).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RiboError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RiboError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
