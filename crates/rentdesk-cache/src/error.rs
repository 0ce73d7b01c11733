// ── Cache error types ──
//
// Only two things can fail: a caller's fetch (when no stale copy exists to
// fall back on) and the persistence store. Store failures are logged and
// swallowed inside the cache; they surface only from `KvStore` itself.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed fetch failure, shared between every caller joined on one fetch.
pub type FetchError = Arc<dyn StdError + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("fetch for '{key}' failed: {source}")]
    Fetch {
        key: String,
        #[source]
        source: FetchError,
    },

    #[error("cache store error for '{key}': {message}")]
    Store { key: String, message: String },
}

impl CacheError {
    /// The caller's original error when this is a fetch failure.
    pub fn fetch_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source.as_ref()),
            Self::Store { .. } => None,
        }
    }
}
