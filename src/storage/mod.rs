//! Storage layer over the hot and cold tiers
//!
//! # Architecture
//!
//! ```text
//! Read:   fetch ─┬─ HotStore::fetch  ─┐
//!                └─ ColdStore::fetch ─┴─ cold.merge_points_to_slice(hot)
//!
//! Write:  insert ─→ hot 1m ─→ rollup 1m→5m→1h→1d (mean per bucket)
//!                          └→ flush full buffers to cold, drop hot key
//! ```
//!
//! Hot is always the right-hand operand of the merge, so a fresh write
//! overrides a historical aggregate at the same timestamp.
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::engine::stubs::{InMemoryHashStore, InMemoryWideColumnStore};
//! use kuba_graphite::storage::StorageBuilder;
//! use kuba_graphite::types::{DataPoint, Metric};
//! use std::sync::Arc;
//!
//! # async fn example() -> kuba_graphite::error::Result<()> {
//! let storage = StorageBuilder::new()
//!     .with_hot_store(Arc::new(InMemoryHashStore::new()))
//!     .with_cold_store(Arc::new(InMemoryWideColumnStore::new()))
//!     .build()
//!     .await?;
//!
//! storage
//!     .insert_metric(&Metric::new("web.requests", vec![DataPoint::new(60, 3.0)]))
//!     .await?;
//! let slice = storage.fetch("web.requests", 0, 120).await?;
//! assert_eq!(slice[0].values(), &[3.0]);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod cold;
pub mod hot;

pub use cold::ColdStore;
pub use hot::HotStore;

use crate::engine::traits::{HashStore, SeriesReader, WideColumnStore};
use crate::error::{Error, Result};
use crate::numeric;
use crate::retention::{self, Retention, LADDER};
use crate::series::SeriesSlice;
use crate::types::{DataPoint, Metric, Timestamp};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Tunables for the storage layer
#[derive(Clone, Debug)]
pub struct StorageOptions {
    /// Cold table name
    pub table: String,
    /// Provisioned read capacity for table creation
    pub read_capacity: u64,
    /// Provisioned write capacity for table creation
    pub write_capacity: u64,
    /// Whether cold items carry a TTL
    pub ttl_enabled: bool,
    /// Names per hot pipelined read
    pub hot_batch_limit: usize,
    /// Names per cold batched read
    pub cold_batch_limit: usize,
    /// Per-attempt cold call timeout
    pub cold_call_timeout: Duration,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            table: "metrics".to_string(),
            read_capacity: 5,
            write_capacity: 5,
            ttl_enabled: false,
            hot_batch_limit: hot::DEFAULT_BATCH_LIMIT,
            cold_batch_limit: cold::DEFAULT_BATCH_LIMIT,
            cold_call_timeout: cold::DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Builder wiring backends into a [`Storage`]
#[derive(Default)]
pub struct StorageBuilder {
    hot: Option<Arc<dyn HashStore>>,
    cold: Option<Arc<dyn WideColumnStore>>,
    options: StorageOptions,
}

impl StorageBuilder {
    /// Builder with default options and no backends
    pub fn new() -> Self {
        Self::default()
    }

    /// Hot tier backend
    pub fn with_hot_store(mut self, backend: Arc<dyn HashStore>) -> Self {
        self.hot = Some(backend);
        self
    }

    /// Cold tier backend
    pub fn with_cold_store(mut self, backend: Arc<dyn WideColumnStore>) -> Self {
        self.cold = Some(backend);
        self
    }

    /// Replace the options
    pub fn with_options(mut self, options: StorageOptions) -> Self {
        self.options = options;
        self
    }

    /// Create the cold table if needed and return the storage
    pub async fn build(self) -> Result<Storage> {
        let hot = self
            .hot
            .ok_or_else(|| Error::Configuration("No hot store configured".to_string()))?;
        let cold = self
            .cold
            .ok_or_else(|| Error::Configuration("No cold store configured".to_string()))?;
        let options = self.options;

        let hot = HotStore::new(hot).with_batch_limit(options.hot_batch_limit);
        let cold = ColdStore::new(cold, options.table.clone())
            .with_ttl(options.ttl_enabled)
            .with_capacity(options.read_capacity, options.write_capacity)
            .with_batch_limit(options.cold_batch_limit)
            .with_call_timeout(options.cold_call_timeout);

        cold.ensure_table().await?;

        info!(
            hot = hot.backend_id(),
            cold = cold.backend_id(),
            table = cold.table(),
            "storage initialized"
        );
        Ok(Storage { hot, cold })
    }
}

/// Hot and cold tiers behind one read/write surface
#[derive(Clone)]
pub struct Storage {
    hot: HotStore,
    cold: ColdStore,
}

impl Storage {
    /// Assemble from adapters that are already set up
    pub fn new(hot: HotStore, cold: ColdStore) -> Self {
        Self { hot, cold }
    }

    /// Hot adapter
    pub fn hot(&self) -> &HotStore {
        &self.hot
    }

    /// Cold adapter
    pub fn cold(&self) -> &ColdStore {
        &self.cold
    }

    /// Read both tiers concurrently and merge, hot winning on overlap
    pub async fn fetch(&self, name: &str, from: Timestamp, until: Timestamp) -> Result<SeriesSlice> {
        retention::check_window(from, until)?;
        let (hot, cold) = tokio::join!(
            self.hot.fetch(name, from, until),
            self.cold.fetch(name, from, until)
        );
        Ok(cold?.merge_points_to_slice(hot?))
    }

    /// Write every datapoint of `metric`, in order
    ///
    /// Each point goes to the finest slot; after it, every slot whose
    /// buffer reached its rollup size is averaged into the next slot, and
    /// every slot whose buffer reached its flush size is moved to the cold
    /// tier. The first failure stops the remaining points.
    pub async fn insert_metric(&self, metric: &Metric) -> Result<()> {
        let finest = retention::finest();
        for point in &metric.datapoints {
            let aligned = DataPoint::new(finest.align(point.timestamp), point.value);
            self.hot.put(finest.slot, &metric.name, aligned).await?;

            for (index, current) in LADDER.iter().enumerate() {
                let len = self.hot.len(current.slot, &metric.name).await?;
                if len == 0 {
                    continue;
                }
                if let (Some(threshold), Some(next)) = (current.number_of_points, LADDER.get(index + 1)) {
                    if len >= threshold {
                        self.rollup(&metric.name, current, next).await?;
                    }
                }
                if len >= current.flush_points {
                    self.flush(&metric.name, current).await?;
                }
            }
        }
        Ok(())
    }

    /// Average the buffer at `from` into `to`, one mean per aligned bucket
    pub async fn rollup(&self, name: &str, from: &Retention, to: &Retention) -> Result<()> {
        let points = self.hot.get(from.slot, name).await?;
        let mut buckets: BTreeMap<Timestamp, Vec<f64>> = BTreeMap::new();
        for point in points.iter() {
            buckets
                .entry(to.align(point.timestamp))
                .or_default()
                .push(point.value);
        }
        let rolled: Vec<DataPoint> = buckets
            .into_iter()
            .map(|(ts, values)| DataPoint::new(ts, numeric::avg(&values)))
            .collect();

        debug!(name, from = from.slot, to = to.slot, buckets = rolled.len(), "rollup");
        self.hot.mput(to.slot, name, &rolled).await
    }

    /// Move the buffer at `retention` into cold items and drop the hot key
    pub async fn flush(&self, name: &str, retention: &Retention) -> Result<()> {
        let points = self.hot.get(retention.slot, name).await?;
        let mut items: BTreeMap<Timestamp, Vec<DataPoint>> = BTreeMap::new();
        for point in points.iter() {
            items
                .entry(retention.item_epoch(point.timestamp))
                .or_default()
                .push(*point);
        }

        debug!(name, slot = retention.slot, items = items.len(), "flush");
        for (item_epoch, group) in &items {
            self.cold.put(name, retention, *item_epoch, group).await?;
        }
        self.hot.delete(retention.slot, name).await
    }

    /// Hot backend reachability
    pub async fn ping(&self) -> Result<()> {
        self.hot.ping().await
    }
}

#[async_trait]
impl SeriesReader for Storage {
    async fn fetch(&self, name: &str, from: Timestamp, until: Timestamp) -> Result<SeriesSlice> {
        Storage::fetch(self, name, from, until).await
    }
}
