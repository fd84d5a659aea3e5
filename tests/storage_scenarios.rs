//! End-to-end scenarios: targets evaluated over real storage adapters
//! backed by the in-memory stores.

use async_trait::async_trait;
use kuba_graphite::{
    engine::stubs::{InMemoryHashStore, InMemoryWideColumnStore},
    engine::traits::{HashStore, SeriesReader},
    query::{eval_targets, EvalContext},
    retention::LADDER,
    series::{SeriesSlice, ValueSeries},
    DataPoint, Metric, Result, Storage, StorageBuilder, Timestamp,
};
use std::sync::Arc;

async fn storage() -> (Arc<InMemoryHashStore>, Storage) {
    let hot = Arc::new(InMemoryHashStore::new());
    let storage = StorageBuilder::new()
        .with_hot_store(hot.clone())
        .with_cold_store(Arc::new(InMemoryWideColumnStore::new()))
        .build()
        .await
        .unwrap();
    (hot, storage)
}

async fn render(
    reader: Arc<dyn SeriesReader>,
    target: &str,
    from: Timestamp,
    until: Timestamp,
) -> SeriesSlice {
    let mut results = eval_targets(reader, &[target.to_string()], EvalContext::new(from, until))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    results.remove(0)
}

fn assert_values(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        if e.is_nan() {
            assert!(a.is_nan(), "{actual:?} vs {expected:?}");
        } else {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }
}

#[tokio::test]
async fn test_alias_over_cold_tier() {
    let (_, storage) = storage().await;
    storage
        .cold()
        .put(
            "Sales.widgets.largeBlue",
            &LADDER[0],
            0,
            &[DataPoint::new(60, 10.0)],
        )
        .await
        .unwrap();

    let out = render(
        Arc::new(storage),
        "alias(Sales.widgets.largeBlue,\"Large Blue Widgets\")",
        0,
        120,
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].alias(), "Large Blue Widgets");
    assert_eq!(
        out[0].points().map(|p| (p.timestamp, p.value)).collect::<Vec<_>>(),
        vec![(60, 10.0)]
    );
}

#[tokio::test]
async fn test_brace_expansion_and_sum() {
    let (_, storage) = storage().await;
    let hot = storage.hot();
    hot.mput(
        "1m",
        "server1.loadavg5",
        &[
            DataPoint::new(100, 10.0),
            DataPoint::new(160, 10.2),
            DataPoint::new(220, 11.0),
        ],
    )
    .await
    .unwrap();
    hot.mput(
        "1m",
        "server2.loadavg5",
        &[
            DataPoint::new(100, 8.0),
            DataPoint::new(160, 5.0),
            DataPoint::new(220, 6.0),
        ],
    )
    .await
    .unwrap();

    let out = render(Arc::new(storage), "sumSeries(server{1,2}.loadavg5)", 100, 300).await;
    assert_eq!(out.len(), 1);
    let series = &out[0];
    assert_eq!(series.name(), "sumSeries(server1.loadavg5,server2.loadavg5)");
    // stored timestamps fall onto the minute grid
    assert_eq!(series.start(), 60);
    assert_eq!(series.step(), 60);
    assert_values(series.values(), &[18.0, 15.2, 17.0]);
}

/// Reader serving one fixed ramp at one-second resolution
struct RampReader;

#[async_trait]
impl SeriesReader for RampReader {
    async fn fetch(&self, name: &str, _from: Timestamp, _until: Timestamp) -> Result<SeriesSlice> {
        let values = (1..=100).map(f64::from).collect();
        Ok(vec![ValueSeries::new(name, values, 0, 1)].into())
    }
}

#[tokio::test]
async fn test_summarize_buckets() {
    let out = render(
        Arc::new(RampReader),
        "summarize(server1.loadavg5,\"20s\",\"sum\")",
        0,
        100,
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].start(), 0);
    assert_eq!(out[0].step(), 20);
    assert_values(
        out[0].values(),
        &[210.0, 610.0, 1010.0, 1410.0, 1810.0, f64::NAN],
    );
}

#[tokio::test]
async fn test_rollup_on_insert() {
    let (hot, storage) = storage().await;
    storage
        .hot()
        .mput(
            "1m",
            "m",
            &[
                DataPoint::new(0, 0.1),
                DataPoint::new(60, 0.2),
                DataPoint::new(120, 0.3),
                DataPoint::new(180, 0.4),
                DataPoint::new(240, 0.5),
            ],
        )
        .await
        .unwrap();

    storage
        .insert_metric(&Metric::new("m", vec![DataPoint::new(240, 0.5)]))
        .await
        .unwrap();

    let rolled = storage.hot().get("5m", "m").await.unwrap().into_inner();
    assert_eq!(rolled.len(), 1);
    assert_eq!(rolled[0].timestamp, 0);
    assert!((rolled[0].value - 0.3).abs() < 1e-9);
    // below the flush size the finest buffer stays in place
    assert_eq!(hot.hlen("1m:m").await.unwrap(), 5);
}

#[tokio::test]
async fn test_hot_wins_over_cold() {
    let (_, storage) = storage().await;
    storage
        .cold()
        .put("m", &LADDER[0], 0, &[DataPoint::new(120, 10.0)])
        .await
        .unwrap();
    storage
        .hot()
        .put("1m", "m", DataPoint::new(120, 11.0))
        .await
        .unwrap();

    let out = storage.fetch("m", 60, 180).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].start(), 120);
    assert_eq!(out[0].values(), &[11.0]);
}

#[tokio::test]
async fn test_write_flush_then_read_back() {
    let (_, storage) = storage().await;
    let points: Vec<DataPoint> = (0..61).map(|i| DataPoint::new(i * 60, i as f64)).collect();
    storage.insert_metric(&Metric::new("m", points)).await.unwrap();

    // first hour lives in the cold tier, the last point is still hot
    let out = storage.fetch("m", 0, 3600).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].start(), 0);
    let expected: Vec<f64> = (0..61).map(f64::from).collect();
    assert_values(out[0].values(), &expected);
}

#[tokio::test]
async fn test_fetch_rejects_window_beyond_cold_item_cap() {
    let (_, storage) = storage().await;
    let err = storage.fetch("m", 0, 100_000_000_000_000).await.unwrap_err();
    assert!(err.is_client_error());

    let err = eval_targets(
        Arc::new(storage),
        &["sumSeries(m)".to_string()],
        EvalContext::new(0, i64::MAX),
    )
    .await
    .unwrap_err();
    assert!(err.is_client_error());
}
