//! Tests for the expired-object sweep.

use chrono::Utc;
use filedrop_store::{
    backends::{LocalfsBackend, MetaStorageBackend, PutOptions, StorageBackend},
    models::{Expiry, Limits},
    services::sweeper::{SweepReport, sweep_expired},
};
use std::io::Cursor;
use tempfile::TempDir;

async fn store(backend: &LocalfsBackend, key: &str, expiry: Expiry) {
    let options = PutOptions {
        delete_key: "d".into(),
        ..PutOptions::default()
    };
    let mut meta = backend
        .put(key, Box::new(Cursor::new(key.as_bytes().to_vec())), options)
        .await
        .unwrap();
    meta.expiry = expiry;
    backend.put_metadata(key, &meta).await.unwrap();
}

#[tokio::test]
async fn test_sweep_deletes_only_expired_objects() {
    let temp_dir = TempDir::new().unwrap();
    let backend = LocalfsBackend::new(
        temp_dir.path().join("meta"),
        temp_dir.path().join("files"),
        Limits::default(),
    );
    backend.ensure_dirs().await.unwrap();

    let now = Utc::now();
    store(&backend, "stale", Expiry::from_unix(now.timestamp() - 60)).await;
    store(&backend, "fresh", Expiry::from_unix(now.timestamp() + 3600)).await;
    store(&backend, "forever", Expiry::Never).await;
    std::fs::write(backend.files_dir().join("orphan"), b"no metadata").unwrap();

    let report = sweep_expired(&backend, now).await.unwrap();

    assert_eq!(
        report,
        SweepReport {
            scanned: 4,
            deleted: 1,
            skipped: 1,
        }
    );
    assert!(!backend.exists("stale").await.unwrap());
    assert!(!backend.meta_dir().join("stale").exists());
    assert_eq!(backend.list().await.unwrap(), vec!["forever", "fresh", "orphan"]);
}

#[tokio::test]
async fn test_sweep_of_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let backend = LocalfsBackend::new(
        temp_dir.path().join("meta"),
        temp_dir.path().join("files"),
        Limits::default(),
    );
    backend.ensure_dirs().await.unwrap();

    let report = sweep_expired(&backend, Utc::now()).await.unwrap();
    assert_eq!(report, SweepReport::default());
}
