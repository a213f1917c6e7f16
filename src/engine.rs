//! Engine facade
//!
//! [`ConfigEngine`] ties the registry, dimensions selection, resolver adapters and the
//! resolution cache together. All methods take `&self`; locks are never held across an
//! `.await`.
//!
//! Lock order is registry, then cache, then selector.

use crate::cache::{BoundedCache, CacheKey, MergeMode, NoopCache, ResolutionCache, Resolved};
use crate::config::EngineOptions;
use crate::context::Context;
use crate::dimensions::{DimensionSelector, DimensionsDocument, DIMENSIONS_CONFIG};
use crate::error::{EngineError, ResolveError, Result};
use crate::format::{classify, Classified};
use crate::loader::{ContentLoader, FileLoader};
use crate::registry::Registry;
use crate::resolver::{BaseContextResolver, FlatResolver, Resolver, ResolverFactory};
use crate::ycb::SectionResolverFactory;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Result of [`ConfigEngine::add_config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The registration committed; `replaced` is the previous path, if any
    Registered { replaced: Option<PathBuf> },
    /// A later registration (or deletion) for the same key was issued while this one
    /// was loading; nothing was changed
    Superseded,
}

/// Context-sensitive config resolution engine
pub struct ConfigEngine {
    base_context: Arc<Context>,
    loader: Arc<dyn ContentLoader>,
    factory: Arc<dyn ResolverFactory>,
    cache: Arc<dyn ResolutionCache>,
    registry: RwLock<Registry>,
    selector: Mutex<DimensionSelector>,
    dimensions: OnceCell<DimensionsDocument>,
}

impl ConfigEngine {
    /// Engine with the filesystem loader, the section resolver and the cache described
    /// by `options`
    pub fn new(options: EngineOptions) -> Self {
        let cache: Arc<dyn ResolutionCache> = if options.cache.enabled {
            Arc::new(BoundedCache::new(options.cache.max_entries))
        } else {
            Arc::new(NoopCache)
        };
        Self {
            base_context: Arc::new(options.base_context),
            loader: Arc::new(FileLoader::new()),
            factory: Arc::new(SectionResolverFactory),
            cache,
            registry: RwLock::new(Registry::new()),
            selector: Mutex::new(DimensionSelector::new(
                options.dimensions_path,
                options.dimensions_bundle,
            )),
            dimensions: OnceCell::new(),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ContentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_resolver_factory(mut self, factory: Arc<dyn ResolverFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResolutionCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Register or re-register a config file.
    ///
    /// The file is loaded before anything changes; a failed load leaves any previous
    /// registration in place. If another registration or deletion for the same key is
    /// issued while this one loads, this one is discarded.
    pub async fn add_config(
        &self,
        bundle: &str,
        config: &str,
        path: impl AsRef<Path>,
    ) -> Result<RegisterOutcome> {
        let path = path.as_ref();
        let ticket = self.registry.write().issue_ticket(bundle, config);
        debug!(bundle, config, path = %path.display(), ticket, "Registering config");

        let contents = match self.loader.load(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(bundle, config, path = %path.display(), error = %e, "Config load failed");
                return Err(EngineError::Parse(e));
            }
        };

        Ok(self.commit(bundle, config, path, contents, ticket))
    }

    /// Register contents that were already parsed by the caller
    pub fn add_config_contents(
        &self,
        bundle: &str,
        config: &str,
        path: impl AsRef<Path>,
        contents: Value,
    ) -> RegisterOutcome {
        let ticket = self.registry.write().issue_ticket(bundle, config);
        self.commit(bundle, config, path.as_ref(), contents, ticket)
    }

    fn commit(
        &self,
        bundle: &str,
        config: &str,
        path: &Path,
        contents: Value,
        ticket: u64,
    ) -> RegisterOutcome {
        let mut registry = self.registry.write();
        if !registry.is_current(bundle, config, ticket) {
            info!(bundle, config, path = %path.display(), "Registration superseded");
            return RegisterOutcome::Superseded;
        }

        let classified = classify(Arc::new(contents));
        let sectioned = classified.is_sectioned();
        let committed = registry.register(bundle, config, path.to_path_buf(), classified, ticket);
        for (stale_bundle, stale_config) in &committed.stale {
            self.cache.invalidate(stale_bundle, stale_config);
        }
        drop(registry);

        if config == DIMENSIONS_CONFIG {
            self.selector.lock().consider(bundle, config, path);
        }

        info!(
            bundle,
            config,
            path = %path.display(),
            sectioned,
            replaced = committed.replaced.is_some(),
            shared_with = committed.stale.len() - 1,
            "Registered config"
        );
        RegisterOutcome::Registered {
            replaced: committed.replaced,
        }
    }

    /// Unregister a config. Never fails; unknown keys are ignored.
    ///
    /// The path argument is accepted for symmetry with [`ConfigEngine::add_config`];
    /// the current registration is removed whatever path it points at.
    pub fn delete_config(&self, bundle: &str, config: &str, path: impl AsRef<Path>) {
        let mut registry = self.registry.write();
        // an in-flight registration must not resurrect the entry
        registry.issue_ticket(bundle, config);
        let removed = registry.unregister(bundle, config);
        self.cache.invalidate(bundle, config);
        let remaining = removed
            .as_deref()
            .map(|current| registry.keys_for_path(current).len())
            .unwrap_or(0);
        drop(registry);

        match removed {
            Some(current) => info!(
                bundle,
                config,
                path = %current.display(),
                requested = %path.as_ref().display(),
                remaining,
                "Deleted config"
            ),
            None => debug!(bundle, config, "Delete ignored for unknown config"),
        }
    }

    /// Merged config for `context`. The returned value is shared with the cache and
    /// other callers.
    pub async fn read(&self, bundle: &str, config: &str, context: &Context) -> Result<Arc<Value>> {
        match self.resolve(bundle, config, MergeMode::Merged, context).await? {
            Resolved::Merged(value) => Ok(value),
            Resolved::Ranked(_) => unreachable!("merged read produced a ranked value"),
        }
    }

    /// Matching sections for `context`, most specific first
    pub async fn read_no_merge(
        &self,
        bundle: &str,
        config: &str,
        context: &Context,
    ) -> Result<Arc<Vec<Value>>> {
        match self.resolve(bundle, config, MergeMode::Ranked, context).await? {
            Resolved::Ranked(values) => Ok(values),
            Resolved::Merged(_) => unreachable!("ranked read produced a merged value"),
        }
    }

    /// The authoritative dimensions document, loaded once
    pub async fn read_dimensions(&self) -> Result<DimensionsDocument> {
        self.dimensions
            .get_or_try_init(|| self.load_dimensions())
            .await
            .cloned()
    }

    /// Visit each section of a config in declaration order. Flat configs produce a
    /// single visit with empty settings.
    pub async fn walk_settings<F>(&self, bundle: &str, config: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&[String], &Value) -> bool,
    {
        let (resolver, _) = self.resolver_for(bundle, config).await?;
        resolver.walk_settings(&mut visit);
        Ok(())
    }

    /// Known bundle names
    pub fn bundles(&self) -> Vec<String> {
        self.registry.read().bundles()
    }

    /// Config names registered under `bundle`
    pub fn configs(&self, bundle: &str) -> Result<Vec<String>> {
        self.registry.read().configs(bundle)
    }

    /// Current backing path of a config
    pub fn config_path(&self, bundle: &str, config: &str) -> Result<PathBuf> {
        self.registry
            .read()
            .lookup_path(bundle, config)
            .map(Path::to_path_buf)
    }

    /// Authoritative dimensions path, if established
    pub fn dimensions_path(&self) -> Option<PathBuf> {
        self.selector.lock().selected().map(Path::to_path_buf)
    }

    /// Number of cached resolutions
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    async fn resolve(
        &self,
        bundle: &str,
        config: &str,
        mode: MergeMode,
        context: &Context,
    ) -> Result<Resolved> {
        let key = CacheKey::new(bundle, config, mode, context);

        {
            let registry = self.registry.read();
            registry.lookup(bundle, config)?;
            match self.cache.get(&key) {
                Ok(Some(hit)) if hit.mode() == mode => {
                    debug!(bundle, config, mode = mode.as_str(), fingerprint = %key.fingerprint, "Cache hit");
                    return Ok(hit);
                }
                Ok(Some(_)) => {
                    warn!(bundle, config, mode = mode.as_str(), "Cache returned a value for another mode; ignoring");
                }
                Ok(None) => {
                    debug!(bundle, config, mode = mode.as_str(), fingerprint = %key.fingerprint, "Cache miss");
                }
                Err(reason) => {
                    debug!(bundle, config, mode = mode.as_str(), reason = %reason, "Cache miss");
                }
            }
        }

        let (resolver, basis) = self.resolver_for(bundle, config).await?;
        let resolved = match mode {
            MergeMode::Merged => resolver.resolve_merged(context).map(Resolved::Merged),
            MergeMode::Ranked => resolver.resolve_ranked(context).map(Resolved::Ranked),
        }
        .map_err(|source| resolve_error(bundle, config, source))?;

        let registry = self.registry.read();
        if registry.is_fresh(bundle, config, basis.revision, &basis.contents) {
            self.cache.put(key, resolved.clone());
        } else {
            debug!(bundle, config, "Config changed during resolution; result not cached");
        }
        Ok(resolved)
    }

    /// Resolver for the config's current path, built on first use. Also returns the
    /// registry state it was built from.
    async fn resolver_for(&self, bundle: &str, config: &str) -> Result<(Arc<dyn Resolver>, Basis)> {
        let (path, revision, contents) = {
            let registry = self.registry.read();
            let entry = registry.lookup(bundle, config)?;
            if let (Some(resolver), Some(contents)) =
                (registry.resolver(&entry.path), registry.contents(&entry.path))
            {
                let basis = Basis {
                    revision: entry.revision,
                    contents: Arc::clone(contents.contents()),
                };
                return Ok((resolver, basis));
            }
            (
                entry.path.clone(),
                entry.revision,
                registry.contents(&entry.path).cloned(),
            )
        };

        let contents = match contents {
            Some(contents) => contents,
            None => {
                debug!(bundle, config, path = %path.display(), "Reloading evicted contents");
                let loaded = classify(Arc::new(self.loader.load(&path).await?));
                let mut registry = self.registry.write();
                if registry.is_revision(bundle, config, revision) && registry.contents(&path).is_none() {
                    registry.insert_contents(path.clone(), loaded.clone());
                }
                loaded
            }
        };

        let resolver: Arc<dyn Resolver> = match &contents {
            Classified::Sectioned(sections) => {
                let dimensions = self.read_dimensions().await?;
                let resolver = BaseContextResolver::build(
                    self.factory.as_ref(),
                    &dimensions,
                    sections,
                    Arc::clone(&self.base_context),
                )
                .map_err(|source| resolve_error(bundle, config, source))?;
                debug!(bundle, config, path = %path.display(), "Built dimensional resolver");
                Arc::new(resolver)
            }
            Classified::Flat(document) => Arc::new(FlatResolver::new(Arc::clone(document))),
        };

        let basis = Basis {
            revision,
            contents: Arc::clone(contents.contents()),
        };
        let mut registry = self.registry.write();
        if registry.is_fresh(bundle, config, basis.revision, &basis.contents) {
            registry.insert_resolver(path, Arc::clone(&resolver));
        }
        Ok((resolver, basis))
    }

    async fn load_dimensions(&self) -> Result<DimensionsDocument> {
        let path = self
            .selector
            .lock()
            .selected()
            .map(Path::to_path_buf)
            .ok_or(EngineError::MissingDimensions)?;

        let cached = self
            .registry
            .read()
            .contents(&path)
            .map(|c| Arc::clone(c.contents()));
        let contents = match cached {
            Some(contents) => contents,
            None => Arc::new(self.loader.load(&path).await?),
        };

        info!(path = %path.display(), "Loaded dimensions document");
        Ok(DimensionsDocument::from_contents(&contents))
    }
}

/// Registry state a resolver was built from
struct Basis {
    revision: u64,
    contents: Arc<Value>,
}

fn resolve_error(bundle: &str, config: &str, source: ResolveError) -> EngineError {
    EngineError::Resolve {
        bundle: bundle.to_string(),
        config: config.to_string(),
        source,
    }
}
