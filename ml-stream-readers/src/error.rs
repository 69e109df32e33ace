//! Error types for byte sources

use thiserror::Error;

use crate::remote::Unavailable;

/// Error type for byte sources
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] ml_stream_core::error::Error),

    /// The transport could not complete a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP error
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote resource could not be fetched
    #[error("Unavailable: {0}")]
    Unavailable(#[from] Unavailable),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for byte sources
pub type Result<T> = std::result::Result<T, Error>;
