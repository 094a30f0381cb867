//! Error types for cachestream

use thiserror::Error;

/// Result type alias for bridge construction
pub type Result<T> = std::result::Result<T, Error>;

/// Invalid bridge configuration
#[derive(Debug, Error)]
pub enum Error {
    /// The persistence backend could not be opened or resolved
    #[error("persistence backend error: {0}")]
    Store(#[from] cachestore::Error),

    /// A persistence backend was configured without a key to store under
    #[error("persistence configured without a persistence key")]
    MissingPersistenceKey,
}
