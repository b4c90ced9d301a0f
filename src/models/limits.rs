//! Upload limits consulted by every put.

use std::time::Duration;

/// Size and lifetime limits applied to uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Uploads of this many bytes or more are rejected.
    pub max_size: u64,

    /// Longest lifetime granted to objects above `max_duration_size`.
    /// Zero disables the cap.
    pub max_expiry: Duration,

    /// Objects strictly larger than this are subject to `max_expiry`.
    pub max_duration_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_size: 4 * 1024 * 1024 * 1024,
            max_expiry: Duration::ZERO,
            max_duration_size: 4 * 1024 * 1024 * 1024,
        }
    }
}
