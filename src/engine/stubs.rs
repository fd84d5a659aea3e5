//! In-memory backend implementations
//!
//! These implementations are intended for:
//! - **Unit and integration testing** without a running Redis or cold store
//! - **Local runs** (`HOT_BACKEND=memory`)
//!
//! # Warning
//!
//! Both backends lose all data on restart. [`InMemoryWideColumnStore`] keeps
//! TTL values but never expires items.
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::engine::stubs::{InMemoryHashStore, InMemoryWideColumnStore};
//! use kuba_graphite::engine::traits::{HashStore, WideColumnStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hot = InMemoryHashStore::new();
//! hot.hset_multiple("1m:a.b", &[("60".into(), "1.5".into())]).await?;
//! assert_eq!(hot.hlen("1m:a.b").await?, 1);
//!
//! let cold = InMemoryWideColumnStore::new();
//! cold.ensure_table("metrics", 5, 5).await?;
//! # Ok(())
//! # }
//! ```

use crate::engine::traits::{ColdItem, HashStore, ItemKey, WideColumnStore};
use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// In-Memory Hash Store
// =============================================================================

/// Hash store backed by a `HashMap`
#[derive(Debug)]
pub struct InMemoryHashStore {
    data: RwLock<HashMap<String, HashMap<String, String>>>,
    available: AtomicBool,
    commands: AtomicU64,
}

impl Default for InMemoryHashStore {
    fn default() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            commands: AtomicU64::new(0),
        }
    }
}

impl InMemoryHashStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while unavailable every call fails with an I/O error
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of calls served, batched reads count once
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> Result<(), StorageError> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::io("in-memory hash store is unavailable"))
        }
    }
}

#[async_trait]
impl HashStore for InMemoryHashStore {
    fn backend_id(&self) -> &str {
        "in-memory-hash-v1"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        self.check()?;
        Ok(self.data.read().get(key).cloned().unwrap_or_default())
    }

    async fn hgetall_batch(
        &self,
        keys: &[String],
    ) -> Result<Vec<HashMap<String, String>>, StorageError> {
        self.check()?;
        let data = self.data.read();
        Ok(keys
            .iter()
            .map(|k| data.get(k).cloned().unwrap_or_default())
            .collect())
    }

    async fn hlen(&self, key: &str) -> Result<usize, StorageError> {
        self.check()?;
        Ok(self.data.read().get(key).map_or(0, HashMap::len))
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StorageError> {
        self.check()?;
        if fields.is_empty() {
            return Ok(());
        }
        let mut data = self.data.write();
        let hash = data.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.data.write().remove(key);
        Ok(())
    }
}

// =============================================================================
// In-Memory Wide-Column Store
// =============================================================================

#[derive(Debug, Default, Clone)]
struct StoredItem {
    values: BTreeSet<Vec<u8>>,
    ttl: Option<i64>,
}

type Table = HashMap<ItemKey, StoredItem>;

/// Wide-column store backed by nested `HashMap`s
///
/// Tables must be created with [`WideColumnStore::ensure_table`] first;
/// calls against a missing table fail with `NotFound`.
#[derive(Debug, Default)]
pub struct InMemoryWideColumnStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryWideColumnStore {
    /// No tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one item, if present
    pub fn item(&self, table: &str, key: &ItemKey) -> Option<ColdItem> {
        let tables = self.tables.read();
        let stored = tables.get(table)?.get(key)?;
        Some(ColdItem {
            key: key.clone(),
            values: stored.values.iter().cloned().collect(),
            ttl: stored.ttl,
        })
    }

    /// Number of items in `table`
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, HashMap::len)
    }
}

fn missing_table(table: &str) -> StorageError {
    StorageError::not_found(format!("table {table} does not exist"))
}

#[async_trait]
impl WideColumnStore for InMemoryWideColumnStore {
    fn backend_id(&self) -> &str {
        "in-memory-wide-column-v1"
    }

    async fn ensure_table(
        &self,
        table: &str,
        _read_capacity: u64,
        _write_capacity: u64,
    ) -> Result<(), StorageError> {
        self.tables.write().entry(table.to_string()).or_default();
        Ok(())
    }

    async fn batch_get(
        &self,
        table: &str,
        keys: &[ItemKey],
    ) -> Result<Vec<ColdItem>, StorageError> {
        let tables = self.tables.read();
        let items = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                items.get(key).map(|stored| ColdItem {
                    key: key.clone(),
                    values: stored.values.iter().cloned().collect(),
                    ttl: stored.ttl,
                })
            })
            .collect())
    }

    async fn update_item(
        &self,
        table: &str,
        key: &ItemKey,
        values: Vec<Vec<u8>>,
        ttl: Option<i64>,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let items = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let stored = items.entry(key.clone()).or_default();
        stored.values.extend(values);
        if ttl.is_some() {
            stored.ttl = ttl;
        }
        Ok(())
    }
}
