use std::any::{Any, TypeId};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::api::operations::SchemaStateOperations;
use crate::api::statement::StatementState;
use crate::error::Result;

/// Monotonic counter bumped whenever cached schema state is invalidated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SchemaGeneration(pub u64);

/// Hit/miss counters for the schema-state cache.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SchemaStateStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the creator.
    pub misses: u64,
}

type Slot = Arc<dyn Any + Send + Sync>;

/// Memoisation table for values derived from the current schema.
///
/// Entries are grouped by key type, so callers pick their own key shapes as long
/// as they are hashable. A creator runs at most once per key per generation in
/// the absence of races; concurrent misses on the same key may both run their
/// creator, in which case the first inserted value wins.
pub struct SchemaStateCache {
    generation: AtomicU64,
    capacity: usize,
    tables: RwLock<FxHashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaStateCache {
    /// Creates an empty cache whose per-key-type tables start with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            generation: AtomicU64::new(0),
            capacity,
            tables: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current cache generation.
    pub fn generation(&self) -> SchemaGeneration {
        SchemaGeneration(self.generation.load(Ordering::SeqCst))
    }

    /// Returns the cached value for `key`, running `creator` on a miss.
    ///
    /// A value cached under the same key with a different value type counts as a
    /// miss and is replaced.
    pub fn get_or_create<K, V, F>(&self, key: K, creator: F) -> V
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.lookup::<K, V>(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let observed = self.generation();
        let value = creator(&key);
        let mut tables = self.tables.write();
        if self.generation() != observed {
            // invalidated while the creator ran; the value may be stale
            return value;
        }
        let capacity = self.capacity;
        let table = tables.entry(TypeId::of::<K>()).or_insert_with(|| {
            Box::new(FxHashMap::<K, Slot>::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )) as Box<dyn Any + Send + Sync>
        });
        let Some(table) = table.downcast_mut::<FxHashMap<K, Slot>>() else {
            return value;
        };
        let slot = table
            .entry(key)
            .or_insert_with(|| Arc::new(value.clone()) as Slot);
        match slot.downcast_ref::<V>() {
            Some(existing) => existing.clone(),
            None => {
                *slot = Arc::new(value.clone());
                value
            }
        }
    }

    /// Returns `true` when a value is cached for `key`.
    pub fn contains<K>(&self, key: &K) -> bool
    where
        K: Hash + Eq + Send + Sync + 'static,
    {
        self.tables
            .read()
            .get(&TypeId::of::<K>())
            .and_then(|table| table.downcast_ref::<FxHashMap<K, Slot>>())
            .is_some_and(|table| table.contains_key(key))
    }

    /// Drops every cached value and starts a new generation.
    pub fn flush(&self) -> SchemaGeneration {
        let mut tables = self.tables.write();
        tables.clear();
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation = next, "schema state flushed");
        SchemaGeneration(next)
    }

    /// Returns the counters accumulated since the previous call and resets them.
    pub fn take_stats(&self) -> SchemaStateStats {
        SchemaStateStats {
            hits: self.hits.swap(0, Ordering::Relaxed),
            misses: self.misses.swap(0, Ordering::Relaxed),
        }
    }

    fn lookup<K, V>(&self, key: &K) -> Option<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let tables = self.tables.read();
        let table = tables
            .get(&TypeId::of::<K>())?
            .downcast_ref::<FxHashMap<K, Slot>>()?;
        table.get(key)?.downcast_ref::<V>().cloned()
    }
}

impl Default for SchemaStateCache {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SchemaStateOperations for SchemaStateCache {
    fn schema_state_get_or_create<K, V, F>(
        &self,
        _state: &StatementState,
        key: K,
        creator: F,
    ) -> Result<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce(&K) -> V,
    {
        Ok(self.get_or_create(key, creator))
    }

    fn schema_state_contains<K>(&self, _state: &StatementState, key: &K) -> Result<bool>
    where
        K: Hash + Eq + Send + Sync + 'static,
    {
        Ok(self.contains(key))
    }
}
