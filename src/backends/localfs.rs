//! LocalfsBackend: object bytes in `files_dir/{key}`, a JSON metadata
//! sidecar in `meta_dir/{key}`.
//!
//! The filesystem is the only source of truth. Nothing is cached in memory,
//! so any number of tasks may share one backend.

use super::{
    MetaStorageBackend, ObjectReader, PutOptions, StorageBackend, StorageError, StorageResult,
};
use crate::{
    models::{Limits, Metadata, MetadataRecord},
    services::{expiry::compute_expiry, inspect},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::Response,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::{
    io::{self, ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_KEY_LEN: usize = 255;
const COPY_BUF_LEN: usize = 32 * 1024;

#[derive(Clone, Debug)]
pub struct LocalfsBackend {
    meta_dir: PathBuf,
    files_dir: PathBuf,
    limits: Limits,
}

impl LocalfsBackend {
    pub fn new(meta_dir: impl Into<PathBuf>, files_dir: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            meta_dir: meta_dir.into(),
            files_dir: files_dir.into(),
            limits,
        }
    }

    /// Create both storage directories if they are missing.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.files_dir).await?;
        fs::create_dir_all(&self.meta_dir).await
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn file_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.files_dir.join(key))
    }

    fn meta_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.meta_dir.join(key))
    }

    async fn read_metadata(&self, key: &str) -> StorageResult<Metadata> {
        let raw = fs::read(self.meta_path(key)?).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::BadMetadata {
                    key: key.to_string(),
                    reason: err.to_string(),
                }
            }
        })?;

        let record: MetadataRecord =
            serde_json::from_slice(&raw).map_err(|err| StorageError::BadMetadata {
                key: key.to_string(),
                reason: err.to_string(),
            })?;

        Ok(record.into())
    }

    /// Write the sidecar through a temporary file so readers only ever see
    /// a complete record.
    async fn write_metadata(&self, key: &str, metadata: &Metadata) -> StorageResult<()> {
        let meta_path = self.meta_path(key)?;
        let body = serde_json::to_vec(&MetadataRecord::from(metadata)).map_err(io::Error::from)?;

        let tmp_path = self.meta_dir.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = write_synced(&tmp_path, &body).await {
            discard(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, &meta_path).await {
            discard(&tmp_path).await;
            return Err(err.into());
        }

        Ok(())
    }

    /// Everything `put` does once the data file exists. The caller removes
    /// the data file if this fails.
    async fn store(
        &self,
        key: &str,
        mut dst: File,
        mut reader: ObjectReader,
        options: PutOptions,
    ) -> StorageResult<Metadata> {
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let copied = copy_hashed(
            reader.as_mut(),
            &mut dst,
            &mut hasher,
            self.limits.max_size,
            &mut size,
        )
        .await;

        if size == 0 {
            return Err(StorageError::FileEmpty);
        }
        copied?;
        if size >= self.limits.max_size {
            return Err(StorageError::FileTooLarge {
                max_size: self.limits.max_size,
            });
        }

        dst.flush().await?;
        dst.sync_all().await?;

        let expiry = compute_expiry(Utc::now(), options.expiry, size, &self.limits);

        dst.seek(SeekFrom::Start(0)).await?;
        let mut prefix = Vec::with_capacity(inspect::SNIFF_LEN);
        (&mut dst)
            .take(inspect::SNIFF_LEN as u64)
            .read_to_end(&mut prefix)
            .await?;
        let mimetype = inspect::detect_mimetype(&prefix);

        let archive_files = if inspect::is_archive(&mimetype) {
            match list_archive(dst, &mimetype, size).await {
                Ok(names) => names,
                Err(err) => {
                    warn!(key = %key, error = %err, "archive listing failed, storing without file list");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let metadata = Metadata {
            delete_key: options.delete_key,
            access_key: options.access_key,
            sha256sum: hex::encode(hasher.finalize()),
            mimetype,
            size,
            expiry,
            src_ip: options.src_ip,
            original_name: options.original_name,
            archive_files,
        };

        self.write_metadata(key, &metadata).await?;
        Ok(metadata)
    }
}

#[async_trait]
impl StorageBackend for LocalfsBackend {
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let file_path = self.file_path(key)?;
        fs::remove_file(&file_path)
            .await
            .map_err(|err| not_found_or_io(err, key))?;

        fs::remove_file(self.meta_path(key)?)
            .await
            .map_err(|err| not_found_or_io(err, key))?;

        debug!("removed object {}", file_path.display());
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(fs::try_exists(self.file_path(key)?).await?)
    }

    async fn head(&self, key: &str) -> StorageResult<Metadata> {
        self.read_metadata(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<(Metadata, ObjectReader)> {
        let metadata = self.head(key).await?;
        let file = File::open(self.file_path(key)?).await?;
        Ok((metadata, Box::new(file)))
    }

    async fn put(
        &self,
        key: &str,
        reader: ObjectReader,
        options: PutOptions,
    ) -> StorageResult<Metadata> {
        let file_path = self.file_path(key)?;
        if options.delete_key.is_empty() {
            return Err(StorageError::MissingDeleteKey);
        }

        let dst = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        match self.store(key, dst, reader, options).await {
            Ok(metadata) => {
                info!(
                    key = %key,
                    size = metadata.size,
                    mimetype = %metadata.mimetype,
                    "Stored object"
                );
                Ok(metadata)
            }
            Err(err) => {
                discard(&file_path).await;
                Err(err)
            }
        }
    }

    async fn put_metadata(&self, key: &str, metadata: &Metadata) -> StorageResult<()> {
        self.write_metadata(key, metadata).await
    }

    async fn serve_file(&self, key: &str, request: Request<Body>) -> StorageResult<Response> {
        let metadata = self.head(key).await?;
        let content_type = metadata
            .mimetype
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);

        let response = ServeFile::new_with_mime(self.file_path(key)?, &content_type)
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});

        Ok(response.map(Body::new))
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let stat = fs::metadata(self.file_path(key)?)
            .await
            .map_err(|err| not_found_or_io(err, key))?;
        Ok(stat.len())
    }
}

#[async_trait]
impl MetaStorageBackend for LocalfsBackend {
    /// Keys with a data file. Metadata is not consulted, so a key listed
    /// here may still fail `head`.
    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.files_dir).await?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                // Dot-files are probes or temporaries, never keys.
                Ok(name) if name.starts_with('.') => {}
                Ok(name) => keys.push(name),
                Err(name) => debug!("skipping non-utf8 entry {:?}", name),
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Keys become file names, so anything that could escape the storage
/// directories or collide with temporary files is refused.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey);
    }
    if key.starts_with('.') || key.contains("..") {
        return Err(StorageError::InvalidKey);
    }
    if key
        .chars()
        .any(|c| c.is_control() || c == '/' || c == '\\')
    {
        return Err(StorageError::InvalidKey);
    }
    Ok(())
}

fn not_found_or_io(err: io::Error, key: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(err)
    }
}

/// Copy `reader` into `dst`, hashing every byte. Stops once `limit` bytes
/// have been copied. `copied` is kept current even when an error cuts the
/// copy short.
async fn copy_hashed(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    dst: &mut File,
    hasher: &mut Sha256,
    limit: u64,
    copied: &mut u64,
) -> io::Result<()> {
    let mut buf = vec![0u8; COPY_BUF_LEN];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buf[..n]);
        dst.write_all(&buf[..n]).await?;
        *copied += n as u64;
        if *copied >= limit {
            return Ok(());
        }
    }
}

/// Archive parsing is synchronous, so it runs on the blocking pool.
async fn list_archive(mut file: File, mimetype: &str, size: u64) -> io::Result<Vec<String>> {
    file.seek(SeekFrom::Start(0)).await?;
    let file = file.into_std().await;
    let mimetype = mimetype.to_string();

    tokio::task::spawn_blocking(move || {
        inspect::list_archive_files(&mimetype, size, std::io::BufReader::new(file))
    })
    .await
    .map_err(io::Error::other)?
}

async fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(body).await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            warn!("failed to remove {}: {}", path.display(), err);
        }
    }
}
