//! Options loading facade

use super::merge::merge_policy;
use super::sources::{environment, explicit_file, global_file};
use super::EngineOptions;
use crate::error::EngineError;
use std::path::Path;
use tracing::debug;

/// Loads [`EngineOptions`] from layered sources.
///
/// Precedence, lowest to highest: built-in defaults, the global options file, an
/// explicit options file, and `DIMCONF__*` environment variables.
pub struct OptionsLoader;

impl OptionsLoader {
    /// Load from the global file (if present), an optional explicit file, and the environment
    pub fn load(explicit: Option<&Path>) -> Result<EngineOptions, EngineError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = explicit_file::add_to_builder(builder, path)?;
        }
        builder = environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Load from a single file plus environment overrides, skipping the global file
    pub fn load_from_file(path: &Path) -> Result<EngineOptions, EngineError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = explicit_file::add_to_builder(builder, path)?;
        Self::finish(environment::add_to_builder(builder))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<EngineOptions, EngineError> {
        let options: EngineOptions = builder.build()?.try_deserialize()?;
        options
            .validate()
            .map_err(|e| EngineError::Config(format!("Invalid engine options: {}", e)))?;
        debug!(
            max_entries = options.cache.max_entries,
            cache_enabled = options.cache.enabled,
            base_keys = options.base_context.len(),
            "Loaded engine options"
        );
        Ok(options)
    }
}
