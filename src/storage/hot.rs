//! Hot-store adapter
//!
//! Wraps a [`HashStore`] backend with the key layout and point encoding of
//! the hot tier. Every `(slot, name)` pair is one hash whose fields are
//! decimal unix seconds and whose values are decimal floats.

use crate::engine::fanout::fan_out;
use crate::engine::traits::HashStore;
use crate::error::{Result, StorageError};
use crate::expand::{batches, expand_names};
use crate::retention::{select_retention, Retention};
use crate::series::{PointSeries, SeriesMap};
use crate::types::{DataPoint, DataPoints, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of names per pipelined read
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Hash key for `name` at `slot`
pub fn hot_key(slot: &str, name: &str) -> String {
    format!("{slot}:{name}")
}

/// Hot tier adapter
#[derive(Clone)]
pub struct HotStore {
    backend: Arc<dyn HashStore>,
    batch_limit: usize,
}

impl HotStore {
    /// Adapter over `backend` with the default batch limit
    pub fn new(backend: Arc<dyn HashStore>) -> Self {
        Self {
            backend,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    /// Change the number of names read per worker
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    /// Backend identifier
    pub fn backend_id(&self) -> &str {
        self.backend.backend_id()
    }

    /// Round-trip check against the backend
    pub async fn ping(&self) -> Result<()> {
        Ok(self.backend.ping().await?)
    }

    /// Every point stored for `name` at `slot`, sorted by timestamp
    pub async fn get(&self, slot: &str, name: &str) -> Result<DataPoints> {
        let key = hot_key(slot, name);
        let hash = self.backend.hgetall(&key).await?;
        let mut points = decode_hash(&key, &hash);
        points.sort();
        Ok(points)
    }

    /// Number of points stored for `name` at `slot`
    pub async fn len(&self, slot: &str, name: &str) -> Result<usize> {
        Ok(self.backend.hlen(&hot_key(slot, name)).await?)
    }

    /// Store one point; an existing point at the same timestamp is replaced
    pub async fn put(&self, slot: &str, name: &str, point: DataPoint) -> Result<()> {
        self.mput(slot, name, &[point]).await
    }

    /// Store several points in one call
    pub async fn mput(&self, slot: &str, name: &str, points: &[DataPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let fields: Vec<(String, String)> = points
            .iter()
            .map(|p| (p.timestamp.to_string(), p.value.to_string()))
            .collect();
        self.backend
            .hset_multiple(&hot_key(slot, name), &fields)
            .await?;
        Ok(())
    }

    /// Drop everything stored for `name` at `slot`
    pub async fn delete(&self, slot: &str, name: &str) -> Result<()> {
        Ok(self.backend.del(&hot_key(slot, name)).await?)
    }

    /// Series for every name `name` expands to, bounded to `[from, until]`
    ///
    /// The slot is chosen from the range width. Names are read in batches,
    /// one worker per batch; names without points in range are omitted.
    pub async fn fetch(&self, name: &str, from: Timestamp, until: Timestamp) -> Result<SeriesMap> {
        let retention = select_retention(from, until);
        let names = expand_names(name);
        let groups = batches(names, self.batch_limit);
        debug!(
            name,
            slot = retention.slot,
            batches = groups.len(),
            "hot fetch"
        );

        let tasks: Vec<_> = groups
            .into_iter()
            .map(|batch| {
                let backend = Arc::clone(&self.backend);
                fetch_batch(backend, retention, batch, from, until)
            })
            .collect();

        Ok(fan_out(tasks)
            .await?
            .into_iter()
            .fold(SeriesMap::new(), SeriesMap::merge))
    }
}

async fn fetch_batch(
    backend: Arc<dyn HashStore>,
    retention: &'static Retention,
    names: Vec<String>,
    from: Timestamp,
    until: Timestamp,
) -> Result<SeriesMap> {
    let keys: Vec<String> = names.iter().map(|n| hot_key(retention.slot, n)).collect();
    let hashes = backend.hgetall_batch(&keys).await?;
    if hashes.len() != keys.len() {
        return Err(StorageError::decode(format!(
            "batched read returned {} hashes for {} keys",
            hashes.len(),
            keys.len()
        ))
        .into());
    }

    let mut map = SeriesMap::new();
    for ((name, key), hash) in names.into_iter().zip(&keys).zip(hashes) {
        let points: DataPoints = decode_hash(key, &hash)
            .into_iter()
            .filter(|p| p.timestamp >= from && p.timestamp <= until)
            .collect();
        if !points.is_empty() {
            map.insert(PointSeries::new(name, points, retention.timestamp_step));
        }
    }
    Ok(map)
}

/// Parse a hot hash; malformed fields are skipped
fn decode_hash(key: &str, hash: &HashMap<String, String>) -> DataPoints {
    hash.iter()
        .filter_map(|(field, value)| {
            match (field.parse::<Timestamp>(), value.parse::<f64>()) {
                (Ok(ts), Ok(v)) => Some(DataPoint::new(ts, v)),
                _ => {
                    warn!(key, field = %field, value = %value, "skipping malformed hot field");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stubs::InMemoryHashStore;

    fn store() -> (Arc<InMemoryHashStore>, HotStore) {
        let backend = Arc::new(InMemoryHashStore::new());
        let hot = HotStore::new(backend.clone());
        (backend, hot)
    }

    #[tokio::test]
    async fn test_put_get_len_delete() {
        let (_, hot) = store();
        hot.put("1m", "a.b", DataPoint::new(120, 1.5)).await.unwrap();
        hot.put("1m", "a.b", DataPoint::new(60, 0.5)).await.unwrap();
        hot.put("1m", "a.b", DataPoint::new(120, 2.5)).await.unwrap();

        assert_eq!(hot.len("1m", "a.b").await.unwrap(), 2);
        let points = hot.get("1m", "a.b").await.unwrap();
        assert_eq!(
            points.into_inner(),
            vec![DataPoint::new(60, 0.5), DataPoint::new(120, 2.5)]
        );

        hot.delete("1m", "a.b").await.unwrap();
        assert_eq!(hot.len("1m", "a.b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_key_layout() {
        let (backend, hot) = store();
        hot.mput("5m", "x.y", &[DataPoint::new(300, 1.0)]).await.unwrap();
        assert_eq!(backend.keys(), vec!["5m:x.y".to_string()]);
        let hash = backend.hgetall("5m:x.y").await.unwrap();
        assert_eq!(hash.get("300").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_fetch_filters_range_and_expands() {
        let (_, hot) = store();
        for name in ["s.a", "s.b"] {
            hot.mput(
                "1m",
                name,
                &[
                    DataPoint::new(0, 1.0),
                    DataPoint::new(60, 2.0),
                    DataPoint::new(120, 3.0),
                    DataPoint::new(600, 9.0),
                ],
            )
            .await
            .unwrap();
        }

        let map = hot.fetch("s.{a,b,c}", 60, 300).await.unwrap();
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["s.a", "s.b"]);
        let a = map.get("s.a").unwrap();
        assert_eq!(a.step(), 60);
        assert_eq!(a.values(), vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_fetch_batches_by_limit() {
        let (backend, hot) = store();
        let hot = hot.with_batch_limit(2);
        let names: Vec<String> = (0..5).map(|i| format!("m.{i}")).collect();
        for name in &names {
            hot.put("1m", name, DataPoint::new(60, 1.0)).await.unwrap();
        }
        let before = backend.command_count();

        let map = hot.fetch(&names.join(","), 0, 120).await.unwrap();
        assert_eq!(map.len(), 5);
        // three batches of at most two names
        assert_eq!(backend.command_count() - before, 3);
    }

    #[tokio::test]
    async fn test_malformed_fields_are_skipped() {
        let (backend, hot) = store();
        backend
            .hset_multiple(
                "1m:bad",
                &[
                    ("60".into(), "1.0".into()),
                    ("abc".into(), "2.0".into()),
                    ("120".into(), "x".into()),
                ],
            )
            .await
            .unwrap();
        let points = hot.get("1m", "bad").await.unwrap();
        assert_eq!(points.into_inner(), vec![DataPoint::new(60, 1.0)]);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let (backend, hot) = store();
        backend.set_available(false);
        assert!(hot.fetch("a", 0, 60).await.is_err());
        assert!(hot.ping().await.is_err());
    }
}
