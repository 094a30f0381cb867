//! Error types for cachestore

use std::io;

use thiserror::Error;

/// Result type alias for cachestore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for persistence backend operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or foreign record
    #[error("Parse error: {0}")]
    Parse(String),

    /// Key contains characters a backend cannot store
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// Payload does not fit the record length field
    #[error("Value too large: {0} bytes (max {max} bytes)", max = u32::MAX)]
    ValueTooLarge(usize),

    /// No backend is registered under the given name
    #[error("Unknown persistence backend: {0:?}")]
    UnknownBackend(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        Error::Parse(format!("{:?}", err.map_input(|input| input.len())))
    }
}
