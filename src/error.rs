//! Error types for the Ember co-host engine

use thiserror::Error;

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Ember co-host engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio handling error (decode, WAV scratch file)
    #[error("audio error: {0}")]
    Audio(String),

    /// Recognition engine error (subprocess invocation, output parsing)
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speaker attribution error
    #[error("attribution error: {0}")]
    Attribution(String),

    /// Reaction generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Voice profile store error
    #[error("profile store error: {0}")]
    ProfileStore(String),

    /// Visual analysis error
    #[error("visual error: {0}")]
    Visual(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
