//! Tests for the local filesystem backend.

use filedrop_store::{
    backends::{
        LocalfsBackend, MetaStorageBackend, ObjectReader, PutOptions, StorageBackend, StorageError,
    },
    models::{Expiry, Limits, Metadata},
};
use sha2::{Digest, Sha256};
use std::{
    io::{self, Cursor, Write},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

async fn backend_with(limits: Limits) -> (TempDir, LocalfsBackend) {
    let temp_dir = TempDir::new().unwrap();
    let backend = LocalfsBackend::new(
        temp_dir.path().join("meta"),
        temp_dir.path().join("files"),
        limits,
    );
    backend.ensure_dirs().await.unwrap();
    (temp_dir, backend)
}

async fn backend() -> (TempDir, LocalfsBackend) {
    backend_with(Limits {
        max_size: 1024 * 1024,
        max_expiry: Duration::from_secs(3600),
        max_duration_size: 1000,
    })
    .await
}

fn reader(content: &[u8]) -> ObjectReader {
    Box::new(Cursor::new(content.to_vec()))
}

fn options() -> PutOptions {
    PutOptions {
        delete_key: "delete-me".into(),
        ..PutOptions::default()
    }
}

/// A body that breaks off mid-transfer.
struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::other("connection reset")))
    }
}

fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

fn residue(backend: &LocalfsBackend, key: &str) -> (bool, bool) {
    (
        backend.files_dir().join(key).exists(),
        backend.meta_dir().join(key).exists(),
    )
}

#[tokio::test]
async fn test_put_records_hash_and_size() {
    let (_dir, backend) = backend().await;
    let content = b"Hello, world!";

    let put = backend.put("hello", reader(content), options()).await.unwrap();
    let head = backend.head("hello").await.unwrap();

    assert_eq!(put, head);
    assert_eq!(head.sha256sum, sha256_hex(content));
    assert_eq!(head.size, content.len() as u64);
    assert_eq!(head.mimetype, "text/plain; charset=utf-8");
    assert_eq!(head.delete_key, "delete-me");
    assert_eq!(head.expiry, Expiry::Never);
    assert!(head.archive_files.is_empty());
}

#[tokio::test]
async fn test_put_keeps_caller_fields() {
    let (_dir, backend) = backend().await;
    let opts = PutOptions {
        expiry: Duration::from_secs(600),
        delete_key: "d".into(),
        access_key: "a".into(),
        src_ip: "192.0.2.7".into(),
        original_name: "notes.txt".into(),
    };

    let before = chrono::Utc::now().timestamp();
    backend.put("notes", reader(b"some notes"), opts).await.unwrap();
    let head = backend.head("notes").await.unwrap();

    assert_eq!(head.access_key, "a");
    assert_eq!(head.src_ip, "192.0.2.7");
    assert_eq!(head.original_name, "notes.txt");
    let expires = head.expiry.to_unix();
    assert!(expires >= before + 600 && expires <= before + 602);
}

#[tokio::test]
async fn test_large_upload_gets_capped_expiry() {
    let (_dir, backend) = backend().await;
    let content = vec![b'x'; 2000];
    let opts = PutOptions {
        expiry: Duration::from_secs(7200),
        ..options()
    };

    let before = chrono::Utc::now().timestamp();
    let meta = backend.put("big", reader(&content), opts).await.unwrap();

    let expires = meta.expiry.to_unix();
    assert!(expires >= before + 3600 && expires <= before + 3602);
}

#[tokio::test]
async fn test_empty_upload_leaves_nothing_behind() {
    let (_dir, backend) = backend().await;

    let err = backend.put("empty", reader(b""), options()).await.unwrap_err();

    assert!(matches!(err, StorageError::FileEmpty));
    assert_eq!(residue(&backend, "empty"), (false, false));
    assert!(!backend.exists("empty").await.unwrap());
}

#[tokio::test]
async fn test_oversized_upload_leaves_nothing_behind() {
    let (_dir, backend) = backend_with(Limits {
        max_size: 100,
        ..Limits::default()
    })
    .await;

    let exact = backend.put("exact", reader(&[7u8; 100]), options()).await;
    assert!(matches!(exact, Err(StorageError::FileTooLarge { max_size: 100 })));
    assert_eq!(residue(&backend, "exact"), (false, false));

    let huge = backend.put("huge", reader(&vec![7u8; 100_000]), options()).await;
    assert!(matches!(huge, Err(StorageError::FileTooLarge { .. })));
    assert_eq!(residue(&backend, "huge"), (false, false));

    let fits = backend.put("fits", reader(&[7u8; 99]), options()).await.unwrap();
    assert_eq!(fits.size, 99);
}

#[tokio::test]
async fn test_put_requires_delete_key() {
    let (_dir, backend) = backend().await;

    let err = backend
        .put("nokey", reader(b"data"), PutOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::MissingDeleteKey));
    assert_eq!(residue(&backend, "nokey"), (false, false));
}

#[tokio::test]
async fn test_put_refuses_existing_key() {
    let (_dir, backend) = backend().await;
    backend.put("taken", reader(b"first"), options()).await.unwrap();

    let err = backend.put("taken", reader(b"second"), options()).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));

    // The original object is untouched.
    let (meta, mut data) = backend.get("taken").await.unwrap();
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"first");
    assert_eq!(meta.sha256sum, sha256_hex(b"first"));
}

#[tokio::test]
async fn test_invalid_keys_are_rejected() {
    let (_dir, backend) = backend().await;

    let err = backend.put("../escape", reader(b"data"), options()).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey));
    assert!(matches!(backend.head("a/b").await, Err(StorageError::InvalidKey)));
}

#[tokio::test]
async fn test_get_streams_content_from_start() {
    let (_dir, backend) = backend().await;
    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    backend.put("blob", reader(&content), options()).await.unwrap();

    let (meta, mut data) = backend.get("blob").await.unwrap();
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();

    assert_eq!(body, content);
    assert_eq!(meta.mimetype, "application/octet-stream");
    assert_eq!(meta.sha256sum, sha256_hex(&content));
}

#[tokio::test]
async fn test_get_missing_key_is_not_found() {
    let (_dir, backend) = backend().await;

    let result = backend.get("missing").await;
    assert!(matches!(result, Err(StorageError::NotFound(ref key)) if key == "missing"));
    assert!(matches!(backend.head("missing").await, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_corrupt_metadata_is_bad_metadata() {
    let (_dir, backend) = backend().await;
    backend.put("corrupt", reader(b"data"), options()).await.unwrap();
    std::fs::write(backend.meta_dir().join("corrupt"), b"{not json").unwrap();

    assert!(matches!(
        backend.head("corrupt").await,
        Err(StorageError::BadMetadata { .. })
    ));
    assert!(matches!(
        backend.get("corrupt").await,
        Err(StorageError::BadMetadata { .. })
    ));
}

#[tokio::test]
async fn test_unreadable_metadata_is_bad_metadata() {
    let (_dir, backend) = backend().await;
    std::fs::write(backend.files_dir().join("dir"), b"data").unwrap();
    std::fs::create_dir(backend.meta_dir().join("dir")).unwrap();

    assert!(matches!(
        backend.head("dir").await,
        Err(StorageError::BadMetadata { ref key, .. }) if key == "dir"
    ));
    assert!(matches!(
        backend.get("dir").await,
        Err(StorageError::BadMetadata { .. })
    ));
}

#[tokio::test]
async fn test_put_propagates_read_error_and_cleans_up() {
    let (_dir, backend) = backend().await;
    let body: ObjectReader = Box::new(Cursor::new(b"partial".to_vec()).chain(BrokenReader));

    let err = backend.put("cut", body, options()).await.unwrap_err();

    assert!(matches!(err, StorageError::Io(ref e) if e.to_string() == "connection reset"));
    assert_eq!(residue(&backend, "cut"), (false, false));
}

#[tokio::test]
async fn test_put_removes_data_when_metadata_write_fails() {
    let (_dir, backend) = backend().await;
    let blocked = backend.meta_dir().join("blocked");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("occupant"), b"x").unwrap();

    let err = backend.put("blocked", reader(b"data"), options()).await.unwrap_err();

    assert!(matches!(err, StorageError::Io(_)));
    assert!(!backend.files_dir().join("blocked").exists());
    let leftovers: Vec<_> = std::fs::read_dir(backend.meta_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(leftovers, vec!["blocked"]);
}

#[tokio::test]
async fn test_get_with_missing_data_is_io_error() {
    let (_dir, backend) = backend().await;
    backend.put("gone", reader(b"data"), options()).await.unwrap();
    std::fs::remove_file(backend.files_dir().join("gone")).unwrap();

    assert!(matches!(backend.get("gone").await, Err(StorageError::Io(_))));
}

#[tokio::test]
async fn test_put_metadata_round_trips() {
    let (_dir, backend) = backend().await;
    backend.put("meta", reader(b"content"), options()).await.unwrap();

    let updated = Metadata {
        delete_key: "new-delete".into(),
        access_key: String::new(),
        sha256sum: "ffff".into(),
        mimetype: "application/zip".into(),
        size: 12345,
        expiry: Expiry::from_unix(2_000_000_000),
        src_ip: "198.51.100.1".into(),
        original_name: "archive.zip".into(),
        archive_files: vec!["one".into(), "two".into()],
    };
    backend.put_metadata("meta", &updated).await.unwrap();

    assert_eq!(backend.head("meta").await.unwrap(), updated);
    // Data is untouched and size comes from the filesystem.
    assert_eq!(backend.size("meta").await.unwrap(), 7);
}

#[tokio::test]
async fn test_delete_removes_both_files() {
    let (_dir, backend) = backend().await;
    backend.put("doomed", reader(b"bye"), options()).await.unwrap();
    assert!(backend.exists("doomed").await.unwrap());

    backend.delete("doomed").await.unwrap();

    assert!(!backend.exists("doomed").await.unwrap());
    assert_eq!(residue(&backend, "doomed"), (false, false));
    assert!(matches!(
        backend.delete("doomed").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_keeps_metadata_when_data_removal_fails() {
    let (_dir, backend) = backend().await;
    backend.put("orphan", reader(b"data"), options()).await.unwrap();
    std::fs::remove_file(backend.files_dir().join("orphan")).unwrap();

    assert!(backend.delete("orphan").await.is_err());
    assert_eq!(residue(&backend, "orphan"), (false, true));
}

#[tokio::test]
async fn test_size_reads_filesystem() {
    let (_dir, backend) = backend().await;
    backend.put("sized", reader(b"12345"), options()).await.unwrap();

    assert_eq!(backend.size("sized").await.unwrap(), 5);
    assert!(matches!(
        backend.size("nope").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_returns_stored_keys() {
    let (_dir, backend) = backend().await;
    for key in ["one", "two", "three"] {
        backend.put(key, reader(key.as_bytes()), options()).await.unwrap();
    }

    let mut keys = backend.list().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["one", "three", "two"]);
}

#[tokio::test]
async fn test_list_includes_data_without_metadata() {
    let (_dir, backend) = backend().await;
    backend.put("kept", reader(b"data"), options()).await.unwrap();
    std::fs::write(backend.files_dir().join("stray"), b"no sidecar").unwrap();

    let keys = backend.list().await.unwrap();
    assert_eq!(keys, vec!["kept", "stray"]);
}

#[tokio::test]
async fn test_zip_upload_lists_archive_files() {
    let (_dir, backend) = backend().await;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let zip_options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for name in ["readme.md", "bin/tool"] {
        writer.start_file(name, zip_options).unwrap();
        writer.write_all(b"contents").unwrap();
    }
    let archive = writer.finish().unwrap().into_inner();

    let meta = backend.put("bundle", reader(&archive), options()).await.unwrap();

    assert_eq!(meta.mimetype, "application/zip");
    assert_eq!(meta.archive_files, vec!["bin/tool", "readme.md"]);
    assert_eq!(backend.head("bundle").await.unwrap().archive_files, meta.archive_files);
}

#[tokio::test]
async fn test_unreadable_archive_still_uploads() {
    let (_dir, backend) = backend().await;
    let content = b"PK\x03\x04 looks like a zip but is not one";

    let meta = backend.put("fake", reader(content), options()).await.unwrap();

    assert_eq!(meta.mimetype, "application/zip");
    assert!(meta.archive_files.is_empty());
    assert_eq!(meta.size, content.len() as u64);
    assert!(backend.exists("fake").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_puts_do_not_interfere() {
    let (_dir, backend) = backend().await;
    let backend = Arc::new(backend);

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            let content = vec![i; 10_000 + usize::from(i) * 37];
            let key = format!("obj-{i}");
            let meta = backend.put(&key, reader(&content), options()).await.unwrap();
            (key, content, meta)
        }));
    }

    for handle in handles {
        let (key, content, meta) = handle.await.unwrap();
        let head = backend.head(&key).await.unwrap();
        assert_eq!(head, meta);
        assert_eq!(head.size, content.len() as u64);
        assert_eq!(head.sha256sum, sha256_hex(&content));
    }
    assert_eq!(backend.list().await.unwrap().len(), 16);
}
