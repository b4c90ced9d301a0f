//! Expiry policy: how long an upload is allowed to live.
//!
//! Small objects may ask for any lifetime, including none at all. Objects
//! larger than `Limits::max_duration_size` are held to `Limits::max_expiry`
//! whether or not the caller asked for something longer.

use crate::models::{Expiry, Limits};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Compute the expiry for an object of `size` bytes uploaded at `now`.
///
/// A zero `requested` duration means the caller did not ask for one.
pub fn compute_expiry(now: DateTime<Utc>, requested: Duration, size: u64, limits: &Limits) -> Expiry {
    let oversized = size > limits.max_duration_size;
    let capped = !limits.max_expiry.is_zero();

    if requested.is_zero() {
        if oversized && capped {
            return after(now, limits.max_expiry);
        }
        return Expiry::Never;
    }

    if oversized && capped && requested > limits.max_expiry {
        after(now, limits.max_expiry)
    } else {
        after(now, requested)
    }
}

/// `now + duration`, truncated to whole seconds. Durations past the end of
/// the representable range never expire.
fn after(now: DateTime<Utc>, duration: Duration) -> Expiry {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .map_or(Expiry::Never, |at| Expiry::from_unix(at.timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits {
            max_size: 1 << 20,
            max_expiry: Duration::from_secs(3600),
            max_duration_size: 1000,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn at(offset: i64) -> Expiry {
        Expiry::from_unix(now().timestamp() + offset)
    }

    #[test]
    fn small_object_without_request_never_expires() {
        assert_eq!(compute_expiry(now(), Duration::ZERO, 500, &limits()), Expiry::Never);
    }

    #[test]
    fn large_object_without_request_gets_max_expiry() {
        assert_eq!(compute_expiry(now(), Duration::ZERO, 2000, &limits()), at(3600));
    }

    #[test]
    fn large_object_request_is_capped() {
        let expiry = compute_expiry(now(), Duration::from_secs(7200), 2000, &limits());
        assert_eq!(expiry, at(3600));
    }

    #[test]
    fn large_object_request_under_cap_is_honored() {
        let expiry = compute_expiry(now(), Duration::from_secs(1800), 2000, &limits());
        assert_eq!(expiry, at(1800));
    }

    #[test]
    fn small_object_may_exceed_max_expiry() {
        let expiry = compute_expiry(now(), Duration::from_secs(86_400), 500, &limits());
        assert_eq!(expiry, at(86_400));
    }

    #[test]
    fn zero_max_expiry_disables_the_cap() {
        let uncapped = Limits {
            max_expiry: Duration::ZERO,
            ..limits()
        };

        assert_eq!(compute_expiry(now(), Duration::ZERO, 2000, &uncapped), Expiry::Never);
        assert_eq!(
            compute_expiry(now(), Duration::from_secs(7200), 2000, &uncapped),
            at(7200)
        );
    }

    #[test]
    fn subsecond_requests_truncate() {
        let expiry = compute_expiry(now(), Duration::from_millis(1500), 10, &limits());
        assert_eq!(expiry, at(1));
    }

    #[test]
    fn absurd_request_never_expires() {
        let expiry = compute_expiry(now(), Duration::MAX, 10, &limits());
        assert_eq!(expiry, Expiry::Never);
    }
}
