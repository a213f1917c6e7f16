//! Resolution contexts
//!
//! A context is a flat map of dimension names to scalar values. This module owns the
//! canonical fingerprint used as a cache key and the base-context merge applied before
//! every resolver call.

use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;

/// Flat key/value context supplied with every read
pub type Context = HashMap<String, Value>;

/// Build a context from string pairs.
pub fn context_from_pairs<K, V, I>(pairs: I) -> Context
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect()
}

/// Canonical fingerprint of a context, independent of key order.
///
/// Each entry becomes a `"key":"value"` token; tokens are sorted and joined with commas
/// inside braces. Values are stringified, so the number `1` and the string `"1"` share a
/// fingerprint.
pub fn fingerprint(context: &Context) -> String {
    let mut tokens: Vec<String> = context
        .iter()
        .map(|(key, value)| format!("\"{}\":\"{}\"", key, scalar_string(value)))
        .collect();
    tokens.sort();
    format!("{{{}}}", tokens.join(","))
}

/// String form of a context value
pub fn scalar_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed("null"),
        other => Cow::Owned(other.to_string()),
    }
}

/// Merge `overrides` on top of `base`.
///
/// Keys present in `overrides` win; base keys absent from `overrides` still apply.
/// Neither input is mutated. An empty base borrows `overrides` unchanged.
pub fn merge_base<'a>(base: &Context, overrides: &'a Context) -> Cow<'a, Context> {
    if base.is_empty() {
        return Cow::Borrowed(overrides);
    }
    let mut expanded = base.clone();
    for (key, value) in overrides {
        expanded.insert(key.clone(), value.clone());
    }
    Cow::Owned(expanded)
}
