//! Error types for the freshness checker

use thiserror::Error;

/// Result type alias for checker operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Main error type for checker operations
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Failed to read project metadata: {0}")]
    ManifestError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cargo metadata error: {0}")]
    CargoMetadataError(#[from] cargo_metadata::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Rate limited by {service}")]
    RateLimited { service: String },
}

impl PulseError {
    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::ManifestError(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a rate-limit error for a named service
    pub fn rate_limited(service: impl Into<String>) -> Self {
        Self::RateLimited {
            service: service.into(),
        }
    }
}
