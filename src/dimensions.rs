//! Dimensions document selection
//!
//! Many bundles may ship a config named `dimensions`; exactly one of them is
//! authoritative for an engine. [`DimensionSelector`] applies the selection rules as
//! configs are registered.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Config name that marks a dimensions document
pub const DIMENSIONS_CONFIG: &str = "dimensions";

/// Shared, immutable dimension hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionsDocument(Arc<Value>);

impl DimensionsDocument {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// Extract the dimension list from a loaded dimensions file.
    ///
    /// Accepts `[{"dimensions": [...]}]`, `{"dimensions": [...]}`, or the bare list.
    pub fn from_contents(contents: &Value) -> Self {
        let dimensions = match contents {
            Value::Array(items) => items
                .first()
                .and_then(|first| first.get("dimensions"))
                .unwrap_or(contents),
            Value::Object(map) => map.get("dimensions").unwrap_or(contents),
            _ => contents,
        };
        Self::new(dimensions.clone())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn shared(&self) -> Arc<Value> {
        Arc::clone(&self.0)
    }
}

/// Picks the authoritative dimensions path
#[derive(Debug, Default, Clone)]
pub struct DimensionSelector {
    explicit_path: Option<PathBuf>,
    bundle: Option<String>,
    selected: Option<PathBuf>,
}

impl DimensionSelector {
    /// `explicit_path` overrides all selection; `bundle` restricts candidates to one
    /// bundle's `dimensions` config.
    pub fn new(explicit_path: Option<PathBuf>, bundle: Option<String>) -> Self {
        Self {
            selected: explicit_path.clone(),
            explicit_path,
            bundle,
        }
    }

    /// Offer a newly registered config. Returns true when the authoritative path changed.
    pub fn consider(&mut self, bundle: &str, config: &str, path: &Path) -> bool {
        if config != DIMENSIONS_CONFIG || self.explicit_path.is_some() {
            return false;
        }

        let accept = match (&self.bundle, &self.selected) {
            (Some(wanted), _) => wanted == bundle,
            (None, None) => true,
            (None, Some(current)) => path.as_os_str().len() < current.as_os_str().len(),
        };

        if !accept {
            debug!(bundle, path = %path.display(), "Dimensions candidate ignored");
            return false;
        }
        if self.selected.as_deref() == Some(path) {
            return false;
        }

        info!(bundle, path = %path.display(), "Selected dimensions path");
        self.selected = Some(path.to_path_buf());
        true
    }

    /// Authoritative path, if one has been established
    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }
}
