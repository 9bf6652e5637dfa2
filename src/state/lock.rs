//! Advisory lock for the template store.
//!
//! Two runs writing records at the same time would race on the temp file,
//! so writers take a lock file first. A writer that crashes leaves a lock
//! behind; it stops counting once its TTL has passed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds a lock stays valid. Record writes take milliseconds.
pub const LOCK_TTL_SECS: i64 = 30;

/// Contents of the store lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// Unique per acquisition.
    pub lock_id: String,
    /// Process that took the lock.
    pub holder: String,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lock stops counting.
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Creates a fresh lock record for `holder`.
    #[must_use]
    pub fn acquire_for(holder: &str) -> Self {
        let acquired_at = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at,
            expires_at: acquired_at + Duration::seconds(LOCK_TTL_SECS),
        }
    }

    /// True once the TTL has passed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// True if `other` describes this same acquisition.
    #[must_use]
    pub fn is_same_acquisition(&self, other: &Self) -> bool {
        self.lock_id == other.lock_id
    }
}

/// Identifies the current process as `<host>:<pid>:<nonce>`.
#[must_use]
pub fn current_holder() -> String {
    let host = hostname::get().map_or_else(
        |_| String::from("unknown-host"),
        |h| h.to_string_lossy().into_owned(),
    );
    let nonce = Uuid::new_v4().simple().to_string();

    format!("{host}:{}:{}", std::process::id(), &nonce[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_lock_is_not_stale() {
        let lock = LockRecord::acquire_for("run-a");
        assert_eq!(lock.holder, "run-a");
        assert!(!lock.is_stale());
        assert_eq!(
            (lock.expires_at - lock.acquired_at).num_seconds(),
            LOCK_TTL_SECS
        );
    }

    #[test]
    fn test_lock_goes_stale_after_ttl() {
        let mut lock = LockRecord::acquire_for("run-a");
        lock.expires_at = Utc::now() - Duration::seconds(1);
        assert!(lock.is_stale());
    }

    #[test]
    fn test_each_acquisition_is_distinct() {
        let first = LockRecord::acquire_for("run-a");
        let second = LockRecord::acquire_for("run-a");
        assert!(first.is_same_acquisition(&first.clone()));
        assert!(!first.is_same_acquisition(&second));
    }

    #[test]
    fn test_holder_names_this_process() {
        let holder = current_holder();
        let pid = std::process::id().to_string();
        assert_eq!(holder.split(':').nth(1), Some(pid.as_str()));
        assert_ne!(holder, current_holder());
    }
}
