//! Config registry: bundle/config names to backing paths, plus per-path loaded
//! contents and resolvers.

use crate::error::EngineError;
use crate::format::Classified;
use crate::resolver::Resolver;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Current registration of one (bundle, config) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub path: PathBuf,
    /// Ticket of the registration that committed this entry
    pub revision: u64,
}

/// (bundle, config) pair
pub type ConfigKey = (String, String);

/// Result of [`Registry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Path the key pointed at before, if any
    pub replaced: Option<PathBuf>,
    /// Every key backed by the newly committed path, the registered key included.
    /// Their resolved output may have changed.
    pub stale: Vec<ConfigKey>,
}

/// In-memory aggregate of registered configs.
///
/// Registration is two-phase: [`Registry::issue_ticket`] before loading, then
/// [`Registry::register`] once the load finished. Only the most recently issued
/// ticket for a key may commit.
///
/// Several keys may share one backing path. Contents and resolvers are held per path
/// and dropped only once no key references the path.
#[derive(Default)]
pub struct Registry {
    bundles: BTreeMap<String, BTreeMap<String, ConfigEntry>>,
    contents: HashMap<PathBuf, Classified>,
    resolvers: HashMap<PathBuf, Arc<dyn Resolver>>,
    path_keys: HashMap<PathBuf, BTreeSet<ConfigKey>>,
    tickets: HashMap<(String, String), u64>,
    next_ticket: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a registration slot for a key, superseding earlier tickets
    pub fn issue_ticket(&mut self, bundle: &str, config: &str) -> u64 {
        self.next_ticket += 1;
        self.tickets
            .insert((bundle.to_string(), config.to_string()), self.next_ticket);
        self.next_ticket
    }

    /// Whether `ticket` is still the latest issued for the key
    pub fn is_current(&self, bundle: &str, config: &str, ticket: u64) -> bool {
        self.tickets
            .get(&(bundle.to_string(), config.to_string()))
            .map(|latest| *latest == ticket)
            .unwrap_or(false)
    }

    /// Commit a registration.
    ///
    /// The new path's derived state is rebuilt from `contents`. The old path keeps its
    /// state while other keys still reference it.
    pub fn register(
        &mut self,
        bundle: &str,
        config: &str,
        path: PathBuf,
        contents: Classified,
        ticket: u64,
    ) -> Committed {
        let key: ConfigKey = (bundle.to_string(), config.to_string());
        let previous = self
            .bundles
            .entry(bundle.to_string())
            .or_default()
            .insert(
                config.to_string(),
                ConfigEntry {
                    path: path.clone(),
                    revision: ticket,
                },
            );

        if let Some(old) = &previous {
            self.unlink(&key, &old.path);
        }
        self.forget_path(&path);
        self.contents.insert(path.clone(), contents);

        let users = self.path_keys.entry(path).or_default();
        users.insert(key);

        Committed {
            replaced: previous.map(|entry| entry.path),
            stale: users.iter().cloned().collect(),
        }
    }

    /// Remove a registration. The bundle itself stays known. No-op for unknown keys.
    pub fn unregister(&mut self, bundle: &str, config: &str) -> Option<PathBuf> {
        let removed = self.bundles.get_mut(bundle)?.remove(config)?;
        self.unlink(&(bundle.to_string(), config.to_string()), &removed.path);
        Some(removed.path)
    }

    /// Resolve a key to its current entry
    pub fn lookup(&self, bundle: &str, config: &str) -> Result<&ConfigEntry, EngineError> {
        let configs = self
            .bundles
            .get(bundle)
            .ok_or_else(|| EngineError::UnknownBundle {
                bundle: bundle.to_string(),
            })?;
        configs
            .get(config)
            .ok_or_else(|| EngineError::UnknownConfig {
                bundle: bundle.to_string(),
                config: config.to_string(),
            })
    }

    /// Resolve a key to its backing path
    pub fn lookup_path(&self, bundle: &str, config: &str) -> Result<&Path, EngineError> {
        self.lookup(bundle, config).map(|entry| entry.path.as_path())
    }

    /// True when `revision` is still the committed revision for the key
    pub fn is_revision(&self, bundle: &str, config: &str, revision: u64) -> bool {
        self.lookup(bundle, config)
            .map(|entry| entry.revision == revision)
            .unwrap_or(false)
    }

    /// True when the key is still at `revision` and its path still holds `contents`
    pub fn is_fresh(&self, bundle: &str, config: &str, revision: u64, contents: &Arc<Value>) -> bool {
        self.lookup(bundle, config)
            .map(|entry| {
                entry.revision == revision
                    && self
                        .contents
                        .get(&entry.path)
                        .map(|current| Arc::ptr_eq(current.contents(), contents))
                        .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Keys currently backed by `path`
    pub fn keys_for_path(&self, path: &Path) -> Vec<ConfigKey> {
        self.path_keys
            .get(path)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contents(&self, path: &Path) -> Option<&Classified> {
        self.contents.get(path)
    }

    pub fn insert_contents(&mut self, path: PathBuf, contents: Classified) {
        self.contents.insert(path, contents);
    }

    pub fn resolver(&self, path: &Path) -> Option<Arc<dyn Resolver>> {
        self.resolvers.get(path).cloned()
    }

    pub fn insert_resolver(&mut self, path: PathBuf, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(path, resolver);
    }

    /// Known bundle names, sorted
    pub fn bundles(&self) -> Vec<String> {
        self.bundles.keys().cloned().collect()
    }

    /// Config names registered under a bundle, sorted
    pub fn configs(&self, bundle: &str) -> Result<Vec<String>, EngineError> {
        self.bundles
            .get(bundle)
            .map(|configs| configs.keys().cloned().collect())
            .ok_or_else(|| EngineError::UnknownBundle {
                bundle: bundle.to_string(),
            })
    }

    /// Detach a key from a path, dropping the path's state once nothing uses it
    fn unlink(&mut self, key: &ConfigKey, path: &Path) {
        let orphaned = match self.path_keys.get_mut(path) {
            Some(keys) => {
                keys.remove(key);
                keys.is_empty()
            }
            None => true,
        };
        if orphaned {
            self.path_keys.remove(path);
            self.forget_path(path);
        }
    }

    fn forget_path(&mut self, path: &Path) {
        self.contents.remove(path);
        self.resolvers.remove(path);
    }
}
