//! Content loading
//!
//! The engine never parses files itself; it asks a [`ContentLoader`] for parsed contents.
//! [`FileLoader`] is the default and reads JSON and YAML through `tokio::fs`.

use crate::error::LoadError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Loads and parses a config file into a JSON value
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Value, LoadError>;
}

/// Supported on-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(FileFormat::Json),
            "yaml" | "yml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Yaml => "YAML",
        }
    }

    /// Parse source text in this format
    pub fn parse(self, path: &Path, source: &str) -> Result<Value, LoadError> {
        match self {
            FileFormat::Json => serde_json::from_str(source)
                .map_err(|e| LoadError::parse(path, self.name(), e.to_string())),
            FileFormat::Yaml => {
                let yaml: serde_yaml::Value = serde_yaml::from_str(source)
                    .map_err(|e| LoadError::parse(path, self.name(), e.to_string()))?;
                serde_json::to_value(yaml)
                    .map_err(|e| LoadError::parse(path, self.name(), e.to_string()))
            }
        }
    }
}

/// Filesystem loader for `.json`, `.yaml` and `.yml` files
#[derive(Debug, Default, Clone)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Value, LoadError> {
        let format = FileFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), format = format.name(), "Parsing config file");
        format.parse(path, &source)
    }
}
