//! Describes a stored object and the JSON sidecar it is persisted as.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// When an object stops being served.
///
/// Instants carry whole-second resolution because the sidecar persists them
/// as unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The object never expires on its own.
    Never,
    /// The object expires once this instant has passed.
    At(DateTime<Utc>),
}

impl Expiry {
    /// Build an expiry from persisted unix seconds. `0` is the never sentinel.
    pub fn from_unix(secs: i64) -> Self {
        if secs == 0 {
            return Expiry::Never;
        }
        DateTime::from_timestamp(secs, 0).map_or(Expiry::Never, Expiry::At)
    }

    /// Unix seconds as written to the sidecar.
    pub fn to_unix(self) -> i64 {
        match self {
            Expiry::Never => 0,
            Expiry::At(at) => at.timestamp(),
        }
    }

    pub fn is_expired(self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => now > at,
        }
    }
}

/// Descriptive fields kept alongside every stored object.
///
/// The key itself is not part of the record; it addresses both the data and
/// this metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Secret authorizing deletion.
    pub delete_key: String,
    /// Secret required to read the object. Empty means public.
    pub access_key: String,
    /// Hex SHA-256 of the stored bytes.
    pub sha256sum: String,
    pub mimetype: String,
    /// Byte length of the stored content.
    pub size: u64,
    pub expiry: Expiry,
    /// Address of the uploading client, audit only.
    pub src_ip: String,
    pub original_name: String,
    /// Entry names when the object is a recognized archive.
    pub archive_files: Vec<String>,
}

/// On-disk sidecar layout. Optional fields are omitted when empty and
/// default to empty when absent from older records.
#[derive(Serialize, Deserialize, Debug)]
pub struct MetadataRecord {
    pub delete_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,
    pub sha256sum: String,
    pub mimetype: String,
    pub size: u64,
    pub expiry: i64,
    #[serde(rename = "srcip", default, skip_serializing_if = "String::is_empty")]
    pub src_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archive_files: Vec<String>,
}

impl From<&Metadata> for MetadataRecord {
    fn from(m: &Metadata) -> Self {
        Self {
            delete_key: m.delete_key.clone(),
            access_key: m.access_key.clone(),
            sha256sum: m.sha256sum.clone(),
            mimetype: m.mimetype.clone(),
            size: m.size,
            expiry: m.expiry.to_unix(),
            src_ip: m.src_ip.clone(),
            original_name: m.original_name.clone(),
            archive_files: m.archive_files.clone(),
        }
    }
}

impl From<MetadataRecord> for Metadata {
    fn from(r: MetadataRecord) -> Self {
        Self {
            delete_key: r.delete_key,
            access_key: r.access_key,
            sha256sum: r.sha256sum,
            mimetype: r.mimetype,
            size: r.size,
            expiry: Expiry::from_unix(r.expiry),
            src_ip: r.src_ip,
            original_name: r.original_name,
            archive_files: r.archive_files,
        }
    }
}
