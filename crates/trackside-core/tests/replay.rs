use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use trackside_core::catalog::Catalog;
use trackside_core::config::{PipelineConfig, SourceConfig};
use trackside_core::datalog::{list_sessions, DurableLogger};
use trackside_core::decode::{rules, RecordDecoder};
use trackside_core::error::{PipelineError, SourceError};
use trackside_core::pipeline::Pipeline;
use trackside_core::record::RawRecord;
use trackside_core::store::Retention;

fn raw(i: i64) -> RawRecord {
    let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_micro_opt(10, 0, i as u32, 250_000)
        .unwrap();
    RawRecord::at(ts)
        .with("Left_Engine_Temp", 200 + i)
        .with("Car_Speed", 40.5 + i as f64)
        .with("GSPSpeed", 41.0 + i as f64)
        .with("Raw_Direction", 2400 + i * 50)
        .with("GPSCoords", format!("46.2{} 7.6{}", i, i))
        .with("Flag", i / 2)
}

/// Log `count` records the way a live session would
fn write_session(dir: &std::path::Path, count: i64) -> std::path::PathBuf {
    let catalog = Arc::new(Catalog::full());
    let decoder = RecordDecoder::new(Arc::clone(&catalog));
    let started = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let mut logger = DurableLogger::create(dir, catalog, started).unwrap();
    for i in 0..count {
        let raw = raw(i);
        logger.append(&decoder.decode(&raw), &raw).unwrap();
    }
    assert_eq!(logger.rows(), count as u64);
    logger.path().to_path_buf()
}

fn replay_config(path: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        source: SourceConfig::replay(path),
        flag_retention: Retention::Unbounded,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_replay_reproduces_logged_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_session(dir.path(), 5);

    let pipeline = Pipeline::from_config(&replay_config(&path)).await.unwrap();
    assert!(pipeline.listen_addr().is_none());
    assert!(pipeline.log_path().is_none());
    let store = pipeline.store();

    let summary = pipeline.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.records, 5);
    assert_eq!(summary.logged, 0);
    assert!(!summary.cancelled);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.records, 5);
    assert_eq!(
        snapshot.values("Left_Engine_Temp"),
        vec![20.0, 20.1, 20.2, 20.3, 20.4]
    );
    assert_eq!(
        snapshot.values("Car_Speed"),
        vec![40.5, 41.5, 42.5, 43.5, 44.5]
    );
    let expected_steering: Vec<f64> = (0..5).map(|i| rules::steering_angle(2400 + i * 50)).collect();
    assert_eq!(snapshot.values("Raw_Direction"), expected_steering);

    for (i, lat) in snapshot.values("lat").into_iter().enumerate() {
        let expected: f64 = format!("46.2{}", i).parse().unwrap();
        assert!((lat - expected).abs() < 1e-9);
    }
    assert_eq!(snapshot.len("lon"), 5);

    assert_eq!(
        snapshot.flag_events.iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![0, 2, 4]
    );
}

#[tokio::test]
async fn test_replay_never_writes_a_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_session(dir.path(), 3);

    let config = PipelineConfig {
        log_dir: dir.path().to_path_buf(),
        ..replay_config(&path)
    };
    let summary = Pipeline::from_config(&config)
        .await
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(list_sessions(dir.path()).unwrap(), vec![path]);
}

#[tokio::test]
async fn test_replay_header_only_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_session(dir.path(), 0);

    let pipeline = Pipeline::from_config(&replay_config(&path)).await.unwrap();
    let store = pipeline.store();
    let summary = pipeline.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.records, 0);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_replay_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Pipeline::from_config(&replay_config(&dir.path().join("nope.csv"))).await;

    assert!(matches!(
        result,
        Err(PipelineError::Source(SourceError::Open { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_replay_pacing_can_be_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_session(dir.path(), 5);

    let config = PipelineConfig {
        source: SourceConfig::Replay {
            path,
            pacing_ms: Some(1000),
        },
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::from_config(&config).await.unwrap();
    let store = pipeline.store();
    let shutdown = CancellationToken::new();
    let handle = pipeline.spawn(shutdown.clone());

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    shutdown.cancel();
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.records, 2);
    assert_eq!(store.records(), 2);
}
