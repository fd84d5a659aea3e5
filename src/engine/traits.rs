//! Core trait definitions for pluggable backends

use crate::error::{Result, StorageError};
use crate::series::SeriesSlice;
use crate::types::Timestamp;
use async_trait::async_trait;
use std::collections::HashMap;

// =============================================================================
// HashStore Trait
// =============================================================================

/// Field-keyed hash storage, the shape of the hot tier
///
/// Every key maps to a hash of string fields to string values. Operations
/// on a single key are atomic; nothing spans keys.
#[async_trait]
pub trait HashStore: Send + Sync + 'static {
    /// Unique identifier for this backend
    fn backend_id(&self) -> &str;

    /// Round-trip check
    async fn ping(&self) -> std::result::Result<(), StorageError>;

    /// Whole hash at `key`; empty when the key does not exist
    async fn hgetall(&self, key: &str)
        -> std::result::Result<HashMap<String, String>, StorageError>;

    /// Whole hashes for several keys in one round trip, in key order
    async fn hgetall_batch(
        &self,
        keys: &[String],
    ) -> std::result::Result<Vec<HashMap<String, String>>, StorageError>;

    /// Number of fields at `key`
    async fn hlen(&self, key: &str) -> std::result::Result<usize, StorageError>;

    /// Set several fields at once
    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> std::result::Result<(), StorageError>;

    /// Remove `key`
    async fn del(&self, key: &str) -> std::result::Result<(), StorageError>;
}

// =============================================================================
// WideColumnStore Trait
// =============================================================================

/// Primary key of a cold item
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ItemKey {
    /// Hash key, the metric name
    pub name: String,
    /// Range key, `"{item_epoch}:{step}"`
    pub range: String,
}

impl ItemKey {
    /// Build a key
    pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
        }
    }
}

/// A cold item as returned by a batch read
#[derive(Clone, Debug, PartialEq)]
pub struct ColdItem {
    /// Item key
    pub key: ItemKey,
    /// Binary set of encoded points
    pub values: Vec<Vec<u8>>,
    /// Expiry in unix seconds, if set
    pub ttl: Option<i64>,
}

/// Wide-column storage, the shape of the cold tier
///
/// Items live in named tables under a composite `(name, range)` key and
/// carry a binary set attribute plus an optional TTL.
#[async_trait]
pub trait WideColumnStore: Send + Sync + 'static {
    /// Unique identifier for this backend
    fn backend_id(&self) -> &str;

    /// Make sure `table` exists with the given provisioned capacity
    async fn ensure_table(
        &self,
        table: &str,
        read_capacity: u64,
        write_capacity: u64,
    ) -> std::result::Result<(), StorageError>;

    /// Read the items present among `keys`; missing keys are skipped
    ///
    /// Fails with `StorageErrorKind::NotFound` when the table is missing.
    async fn batch_get(
        &self,
        table: &str,
        keys: &[ItemKey],
    ) -> std::result::Result<Vec<ColdItem>, StorageError>;

    /// Upsert: add `values` to the item's set and replace its TTL
    async fn update_item(
        &self,
        table: &str,
        key: &ItemKey,
        values: Vec<Vec<u8>>,
        ttl: Option<i64>,
    ) -> std::result::Result<(), StorageError>;
}

// =============================================================================
// SeriesReader Trait
// =============================================================================

/// What the evaluator needs from storage
#[async_trait]
pub trait SeriesReader: Send + Sync + 'static {
    /// Series for a fetch name (comma list and brace groups allowed),
    /// bounded to `[from, until]`
    async fn fetch(&self, name: &str, from: Timestamp, until: Timestamp) -> Result<SeriesSlice>;
}
