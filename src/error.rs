//! Error types for the dimconf resolution engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Content loader errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} file {}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },
}

impl LoadError {
    pub fn parse(
        path: impl Into<PathBuf>,
        format: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            format: format.into(),
            message: message.into(),
        }
    }

    /// Path of the file that failed to load
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::UnsupportedFormat { path } => path,
        }
    }
}

/// Errors raised by a dimensional resolver backend
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid dimensions document: {0}")]
    InvalidDimensions(String),

    #[error("Invalid section bundle: {0}")]
    InvalidBundle(String),
}

/// Engine-level errors surfaced by [`crate::engine::ConfigEngine`]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown bundle: {bundle}")]
    UnknownBundle { bundle: String },

    #[error("Unknown config \"{config}\" in bundle \"{bundle}\"")]
    UnknownConfig { bundle: String, config: String },

    /// Internal cache signal; never returned from the engine facade.
    #[error("No cache data for config \"{config}\" in bundle \"{bundle}\"")]
    UnknownCacheData { bundle: String, config: String },

    #[error("No dimensions document has been registered")]
    MissingDimensions,

    #[error(transparent)]
    Parse(#[from] LoadError),

    #[error("Failed to resolve config \"{config}\" in bundle \"{bundle}\": {source}")]
    Resolve {
        bundle: String,
        config: String,
        #[source]
        source: ResolveError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
