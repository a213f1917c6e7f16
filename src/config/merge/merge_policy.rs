//! Merge rules: defaults, override order, conflict handling.

use crate::cache::DEFAULT_MAX_ENTRIES;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("cache.enabled", true)?
        .set_default("cache.max_entries", DEFAULT_MAX_ENTRIES as i64)
}
