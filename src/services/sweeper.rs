//! Removes objects whose expiry has passed.

use crate::backends::{MetaStorageBackend, StorageResult};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Outcome of a single sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    /// Keys left alone because their metadata was unreadable or the delete
    /// failed.
    pub skipped: usize,
}

/// Delete every object that has expired as of `now`.
///
/// Only a failure to list keys aborts the sweep. Keys without readable
/// metadata are never deleted blindly.
pub async fn sweep_expired(
    backend: &dyn MetaStorageBackend,
    now: DateTime<Utc>,
) -> StorageResult<SweepReport> {
    let mut report = SweepReport::default();

    for key in backend.list().await? {
        report.scanned += 1;

        let metadata = match backend.head(&key).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(key = %key, error = %err, "skipping object without readable metadata");
                report.skipped += 1;
                continue;
            }
        };

        if !metadata.expiry.is_expired(now) {
            continue;
        }

        match backend.delete(&key).await {
            Ok(()) => {
                info!(key = %key, "deleted expired object");
                report.deleted += 1;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "failed to delete expired object");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}
