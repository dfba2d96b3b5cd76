//! In-memory engine registry with reputation-group accounting.

use crate::engine::SearchProvider;
use gridrank_core::EngineId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// The reputation group shared by Google Search, Google Maps and Google
/// Local Finder.
pub const GOOGLE_GROUP: &str = "google";

/// Registry of the engines available to the scan pipeline.
///
/// Read-mostly after construction; registration normally happens once at
/// startup.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Arc<RwLock<HashMap<EngineId, Arc<dyn SearchProvider>>>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an engine.
    pub fn register(&self, provider: Arc<dyn SearchProvider>) {
        let engine_id = provider.engine_id().clone();
        let mut engines = self.engines.write().expect("acquire registry write lock");
        engines.insert(engine_id.clone(), provider);
        info!(engine_id = %engine_id, "registered engine");
    }

    /// Get an engine by ID.
    #[must_use]
    pub fn get(&self, engine_id: &EngineId) -> Option<Arc<dyn SearchProvider>> {
        self.engines
            .read()
            .expect("acquire registry read lock")
            .get(engine_id)
            .cloned()
    }

    /// All registered engines.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn SearchProvider>> {
        self.engines
            .read()
            .expect("acquire registry read lock")
            .values()
            .cloned()
            .collect()
    }

    /// All registered engine IDs.
    #[must_use]
    pub fn ids(&self) -> Vec<EngineId> {
        self.engines
            .read()
            .expect("acquire registry read lock")
            .keys()
            .cloned()
            .collect()
    }

    /// Whether an engine is registered.
    #[must_use]
    pub fn contains(&self, engine_id: &EngineId) -> bool {
        self.engines
            .read()
            .expect("acquire registry read lock")
            .contains_key(engine_id)
    }

    /// Number of registered engines.
    #[must_use]
    pub fn count(&self) -> usize {
        self.engines
            .read()
            .expect("acquire registry read lock")
            .len()
    }

    /// Engines belonging to a reputation group.
    #[must_use]
    pub fn group_members(&self, group: &str) -> Vec<Arc<dyn SearchProvider>> {
        self.engines
            .read()
            .expect("acquire registry read lock")
            .values()
            .filter(|e| e.reputation_group() == Some(group))
            .cloned()
            .collect()
    }

    /// Combined requests made today across a reputation group.
    ///
    /// The queue consults this before dispatching to any engine in the
    /// group so the shared daily cap applies to combined traffic.
    #[must_use]
    pub fn group_requests_today(&self, group: &str) -> u32 {
        self.group_members(group)
            .iter()
            .map(|e| e.requests_today())
            .sum()
    }
}
