//! Shape-based classification of loaded config contents.

use serde_json::Value;
use std::sync::Arc;

/// Contents tagged by shape
#[derive(Debug, Clone)]
pub enum Classified {
    /// Ordered sections, each carrying a `settings` list
    Sectioned(Arc<Value>),
    /// Context-insensitive document
    Flat(Arc<Value>),
}

impl Classified {
    pub fn is_sectioned(&self) -> bool {
        matches!(self, Classified::Sectioned(_))
    }

    pub fn contents(&self) -> &Arc<Value> {
        match self {
            Classified::Sectioned(v) | Classified::Flat(v) => v,
        }
    }
}

/// True when `contents` is a non-empty array whose every element is an object with an
/// array-valued `settings` field. The `settings` array may be empty.
pub fn is_sectioned(contents: &Value) -> bool {
    match contents {
        Value::Array(sections) if !sections.is_empty() => sections.iter().all(|section| {
            section
                .get("settings")
                .map(Value::is_array)
                .unwrap_or(false)
        }),
        _ => false,
    }
}

/// Classify loaded contents
pub fn classify(contents: Arc<Value>) -> Classified {
    if is_sectioned(&contents) {
        Classified::Sectioned(contents)
    } else {
        Classified::Flat(contents)
    }
}
