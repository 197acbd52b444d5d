//! Error types shared by the cache, its persistence layer, and lookup adapters.

/// Errors surfaced to callers of the cache and its persistence helpers.
#[derive(Debug, thiserror::Error)]
pub enum InfoDbError {
    /// SQLite failure while opening, reading, or syncing the store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem failure (creating directories, reading or writing files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML config file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The TOML config could not be serialized.
    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// The reconciliation state document could not be parsed or written.
    #[error("state store error: {0}")]
    State(String),

    /// A persisted field list could not be encoded or decoded.
    #[error("field encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by an [`crate::lookup::InfoLookup`] implementation.
///
/// An empty result is not an error; lookups return `Ok(None)` for that.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("lookup failed: {0}")]
    Failed(String),

    #[error("lookup rate limited: {0}")]
    RateLimited(String),
}

pub type InfoDbResult<T> = Result<T, InfoDbError>;
