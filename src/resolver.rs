//! Resolver adapters
//!
//! A [`Resolver`] answers merged and ranked reads for one config path. Sectioned
//! configs go through [`BaseContextResolver`], which wraps a [`DimensionalResolver`]
//! backend and applies the engine's base context on every call. Flat configs use
//! [`FlatResolver`], which ignores the context.

use crate::context::{merge_base, Context};
use crate::dimensions::DimensionsDocument;
use crate::error::ResolveError;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Options forwarded to a dimensional backend on each read
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {}

/// Dimension-based priority-merge engine.
///
/// Built from a bundle whose first element is `{"dimensions": D}` followed by the
/// config's sections. Implementations may consume or rewrite the bundle they are given.
pub trait DimensionalResolver: Send + Sync {
    /// Merge all matching sections, least specific first
    fn read(&self, context: &Context, options: &ReadOptions) -> Result<Value, ResolveError>;

    /// Matching section bodies, most specific first
    fn read_no_merge(
        &self,
        context: &Context,
        options: &ReadOptions,
    ) -> Result<Vec<Value>, ResolveError>;

    /// The dimensions this resolver was built with
    fn dimensions(&self) -> &Value;

    /// Visit every section's settings and body in declaration order. Returning
    /// `false` from `visit` stops the walk.
    fn walk_settings(&self, visit: &mut dyn FnMut(&[String], &Value) -> bool);
}

/// Constructs [`DimensionalResolver`]s from section bundles
pub trait ResolverFactory: Send + Sync {
    fn build(&self, bundle: Vec<Value>) -> Result<Box<dyn DimensionalResolver>, ResolveError>;
}

/// Uniform read contract over dimensional and flat configs
pub trait Resolver: Send + Sync {
    fn resolve_merged(&self, context: &Context) -> Result<Arc<Value>, ResolveError>;

    fn resolve_ranked(&self, context: &Context) -> Result<Arc<Vec<Value>>, ResolveError>;

    fn walk_settings(&self, visit: &mut dyn FnMut(&[String], &Value) -> bool);
}

/// Dimensional resolver decorated with base-context merging
pub struct BaseContextResolver {
    inner: Box<dyn DimensionalResolver>,
    base: Arc<Context>,
    options: ReadOptions,
}

impl BaseContextResolver {
    /// Build a backend over `dimensions` plus a deep copy of `sections`.
    pub fn build(
        factory: &dyn ResolverFactory,
        dimensions: &DimensionsDocument,
        sections: &Value,
        base: Arc<Context>,
    ) -> Result<Self, ResolveError> {
        let sections = match sections {
            Value::Array(items) => items.clone(),
            other => {
                return Err(ResolveError::InvalidBundle(format!(
                    "expected a list of sections, found {}",
                    type_name(other)
                )))
            }
        };

        let mut bundle = Vec::with_capacity(sections.len() + 1);
        bundle.push(json!({ "dimensions": dimensions.as_value().clone() }));
        bundle.extend(sections);

        debug!(sections = bundle.len() - 1, "Building dimensional resolver");
        let inner = factory.build(bundle)?;
        Ok(Self::new(inner, base))
    }

    /// Wrap an already constructed backend
    pub fn new(inner: Box<dyn DimensionalResolver>, base: Arc<Context>) -> Self {
        Self {
            inner,
            base,
            options: ReadOptions::default(),
        }
    }

    pub fn dimensions(&self) -> &Value {
        self.inner.dimensions()
    }
}

impl Resolver for BaseContextResolver {
    fn resolve_merged(&self, context: &Context) -> Result<Arc<Value>, ResolveError> {
        let expanded = merge_base(&self.base, context);
        self.inner.read(&expanded, &self.options).map(Arc::new)
    }

    fn resolve_ranked(&self, context: &Context) -> Result<Arc<Vec<Value>>, ResolveError> {
        let expanded = merge_base(&self.base, context);
        self.inner.read_no_merge(&expanded, &self.options).map(Arc::new)
    }

    fn walk_settings(&self, visit: &mut dyn FnMut(&[String], &Value) -> bool) {
        self.inner.walk_settings(visit)
    }
}

/// Passthrough for context-insensitive documents
pub struct FlatResolver {
    document: Arc<Value>,
}

impl FlatResolver {
    pub fn new(document: Arc<Value>) -> Self {
        Self { document }
    }
}

impl Resolver for FlatResolver {
    fn resolve_merged(&self, _context: &Context) -> Result<Arc<Value>, ResolveError> {
        Ok(Arc::clone(&self.document))
    }

    fn resolve_ranked(&self, _context: &Context) -> Result<Arc<Vec<Value>>, ResolveError> {
        Ok(Arc::new(vec![self.document.as_ref().clone()]))
    }

    fn walk_settings(&self, visit: &mut dyn FnMut(&[String], &Value) -> bool) {
        visit(&[], &self.document);
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
