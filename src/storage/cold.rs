//! Cold-store adapter
//!
//! Long-term points live in a wide-column table, one item per
//! `(name, "{item_epoch}:{step}")`. Each item carries a set of 16-byte
//! encoded points and, when enabled, a TTL of `item_epoch + history`.
//!
//! Every backend call runs under a per-attempt timeout and is retried with
//! exponential backoff while the error is retriable.

use super::codec::{decode_point, encode_points};
use crate::engine::fanout::fan_out;
use crate::engine::retry::RetryPolicy;
use crate::engine::traits::{ItemKey, WideColumnStore};
use crate::error::{Result, StorageErrorKind};
use crate::expand::{batches, expand_names};
use crate::retention::{select_time_slots, Retention, TimeSlot};
use crate::series::{PointSeries, SeriesMap};
use crate::types::{DataPoint, DataPoints, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Names per batched read
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Per-attempt timeout for backend calls
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Cold tier adapter
#[derive(Clone)]
pub struct ColdStore {
    backend: Arc<dyn WideColumnStore>,
    table: Arc<str>,
    ttl_enabled: bool,
    read_capacity: u64,
    write_capacity: u64,
    batch_limit: usize,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl ColdStore {
    /// Adapter writing to `table`
    pub fn new(backend: Arc<dyn WideColumnStore>, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: Arc::from(table.into()),
            ttl_enabled: false,
            read_capacity: 5,
            write_capacity: 5,
            batch_limit: DEFAULT_BATCH_LIMIT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Set a TTL on every written item
    pub fn with_ttl(mut self, enabled: bool) -> Self {
        self.ttl_enabled = enabled;
        self
    }

    /// Provisioned capacity used when the table is created
    pub fn with_capacity(mut self, read: u64, write: u64) -> Self {
        self.read_capacity = read;
        self.write_capacity = write;
        self
    }

    /// Names per batched read
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    /// Per-attempt timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Retry policy for retriable failures
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether writes carry a TTL
    pub fn ttl_enabled(&self) -> bool {
        self.ttl_enabled
    }

    /// Backend identifier
    pub fn backend_id(&self) -> &str {
        self.backend.backend_id()
    }

    /// Create the table if it does not exist yet
    pub async fn ensure_table(&self) -> Result<()> {
        let (rcu, wcu) = (self.read_capacity, self.write_capacity);
        self.retry
            .run("ensure_table", self.call_timeout, || {
                self.backend.ensure_table(&self.table, rcu, wcu)
            })
            .await?;
        Ok(())
    }

    /// Series for every name `name` expands to, bounded to `[from, until]`
    ///
    /// One worker per `(time slot, name batch)`. A missing table reads as
    /// empty.
    pub async fn fetch(&self, name: &str, from: Timestamp, until: Timestamp) -> Result<SeriesMap> {
        let slots = select_time_slots(from, until)?;
        let groups = batches(expand_names(name), self.batch_limit);
        debug!(
            name,
            slots = slots.len(),
            batches = groups.len(),
            "cold fetch"
        );

        let mut tasks = Vec::with_capacity(slots.len() * groups.len());
        for slot in &slots {
            for batch in &groups {
                tasks.push(self.clone().fetch_batch(*slot, batch.clone(), from, until));
            }
        }

        Ok(fan_out(tasks)
            .await?
            .into_iter()
            .fold(SeriesMap::new(), SeriesMap::merge_points_to_map))
    }

    async fn fetch_batch(
        self,
        slot: TimeSlot,
        names: Vec<String>,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<SeriesMap> {
        let range = slot.range_key();
        let keys: Vec<ItemKey> = names.iter().map(|n| ItemKey::new(n.as_str(), range.as_str())).collect();

        let items = match self
            .retry
            .run("batch_get", self.call_timeout, || {
                self.backend.batch_get(&self.table, &keys)
            })
            .await
        {
            Ok(items) => items,
            Err(e) if e.kind == StorageErrorKind::NotFound => {
                warn!(table = %self.table, "cold table missing, reading as empty");
                return Ok(SeriesMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut by_name: BTreeMap<String, DataPoints> = BTreeMap::new();
        for item in items {
            let points = by_name.entry(item.key.name).or_default();
            for blob in &item.values {
                let point = decode_point(blob)?;
                if point.timestamp >= from && point.timestamp <= until {
                    points.push(point);
                }
            }
        }

        Ok(by_name
            .into_iter()
            .filter(|(_, points)| !points.is_empty())
            .map(|(name, points)| PointSeries::new(name, points, slot.step))
            .collect())
    }

    /// Add `points` to the item for `name` at `retention` starting at
    /// `item_epoch`, refreshing its TTL
    pub async fn put(
        &self,
        name: &str,
        retention: &Retention,
        item_epoch: Timestamp,
        points: &[DataPoint],
    ) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let key = ItemKey::new(
            name,
            TimeSlot {
                item_epoch,
                step: retention.timestamp_step,
            }
            .range_key(),
        );
        let ttl = self
            .ttl_enabled
            .then_some(item_epoch + retention.history_secs);
        let values = encode_points(points);

        debug!(name, range = %key.range, points = points.len(), "cold put");
        self.retry
            .run("update_item", self.call_timeout, || {
                self.backend
                    .update_item(&self.table, &key, values.clone(), ttl)
            })
            .await?;
        Ok(())
    }
}
