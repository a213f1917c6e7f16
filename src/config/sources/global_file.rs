//! Global options file source: $XDG_CONFIG_HOME/dimconf/config.* or ~/.config/dimconf/config.*

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::PathBuf;
use tracing::debug;

/// Directory holding the global options file.
/// Uses XDG_CONFIG_HOME when set, otherwise ~/.config/dimconf.
pub fn global_config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("dimconf"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("dimconf"))
}

/// Add the global options file to the builder if one exists.
/// Any extension the `config` crate understands is accepted (toml, yaml, json, ...).
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(dir) = global_config_dir() else {
        return Ok(builder);
    };
    let stem = dir.join("config");
    let Some(stem_str) = stem.to_str() else {
        debug!(path = %stem.display(), "Skipping non UTF-8 global options path");
        return Ok(builder);
    };
    Ok(builder.add_source(File::with_name(stem_str).required(false)))
}
