use std::any::Any;
use std::sync::Arc;

use bluecollar_registry::{ResolveError, Resolved};
use dashmap::DashMap;

/// Caches resolver outcomes by dotted path, including negative entries so a
/// repeated request for an unknown method fails fast instead of re-walking
/// the registry (§4.3 "Resolve").
#[derive(Default)]
pub struct ExecutableCache {
    entries: DashMap<String, Result<Resolved, ResolveError>>,
}

impl ExecutableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached resolution for `path`, resolving and caching it
    /// (positively or negatively) on first sight.
    pub fn resolve(
        &self,
        registry: &bluecollar_registry::Registry,
        path: &str,
    ) -> Result<Resolved, ResolveError> {
        if let Some(entry) = self.entries.get(path) {
            return entry.clone();
        }
        let outcome = registry.resolve(path);
        self.entries.insert(path.to_string(), outcome.clone());
        outcome
    }
}

/// Caches live instances for types declared `Singleton`, keyed by type path.
/// `PerCall` types never touch this cache — the worker constructs a fresh
/// instance for each invocation instead.
#[derive(Default)]
pub struct InstanceCache {
    instances: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached singleton instance for `type_path`, constructing and
    /// caching it on first use.
    pub fn get_or_construct(
        &self,
        type_path: &str,
        construct: impl FnOnce() -> Arc<dyn Any + Send + Sync>,
    ) -> Arc<dyn Any + Send + Sync> {
        if let Some(instance) = self.instances.get(type_path) {
            return instance.clone();
        }
        let instance = construct();
        self.instances
            .entry(type_path.to_string())
            .or_insert(instance)
            .clone()
    }
}
