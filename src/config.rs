//! Engine Options
//!
//! Construction-time settings for [`crate::engine::ConfigEngine`]: the base context,
//! dimensions selection overrides, and resolution cache sizing. Options are layered
//! with the `config` crate; see [`OptionsLoader`].

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::context::Context;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::OptionsLoader;

/// Root options structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineOptions {
    /// Context merged under every read; per-call keys win
    #[serde(default)]
    pub base_context: Context,

    /// Only a `dimensions` config from this bundle may become authoritative
    #[serde(default)]
    pub dimensions_bundle: Option<String>,

    /// Authoritative dimensions file; disables automatic selection
    #[serde(default)]
    pub dimensions_path: Option<PathBuf>,

    /// Resolution cache settings
    #[serde(default)]
    pub cache: CacheOptions,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolution cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheOptions {
    /// Disable to resolve on every read
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Capacity of each (bundle, config, mode) store
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_entries: default_max_entries(),
        }
    }
}

impl EngineOptions {
    /// Validate option values
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err("cache.max_entries must be greater than zero".to_string());
        }
        if let Some(bundle) = &self.dimensions_bundle {
            if bundle.trim().is_empty() {
                return Err("dimensions_bundle cannot be empty".to_string());
            }
        }
        if let Some(path) = &self.dimensions_path {
            if path.as_os_str().is_empty() {
                return Err("dimensions_path cannot be empty".to_string());
            }
        }
        Ok(())
    }

    pub fn with_base_context(mut self, base_context: Context) -> Self {
        self.base_context = base_context;
        self
    }

    pub fn with_dimensions_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.dimensions_bundle = Some(bundle.into());
        self
    }

    pub fn with_dimensions_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dimensions_path = Some(path.into());
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }
}
