//! Cache entries and their expiry deadlines.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single cached value and the wall-clock instant it stops being valid.
///
/// The deadline is absolute so it survives the process: an entry written with
/// a one-hour TTL is stale an hour after the write, whether or not the
/// process restarted in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Opaque value bytes. The cache never interprets them.
    pub value: Vec<u8>,

    /// Instant at which the entry becomes stale.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` from now.
    ///
    /// The TTL is converted to an absolute deadline exactly once, here.
    /// A zero TTL yields an entry that is already stale on its next read;
    /// a TTL beyond the representable range saturates to the maximum
    /// timestamp instead of overflowing.
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self { value, expires_at }
    }

    /// Check if the entry's deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// All entries of one namespace, keyed by entry key.
///
/// Persistence backends load and save a namespace's entries as one unit.
pub type NamespaceStore = HashMap<String, CacheEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fresh_entry_not_expired() {
        let entry = CacheEntry::new(b"value".to_vec(), Duration::from_secs(60));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        let entry = CacheEntry::new(b"value".to_vec(), Duration::ZERO);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiration() {
        let entry = CacheEntry::new(b"value".to_vec(), Duration::from_millis(10));

        // Wait for expiration
        thread::sleep(Duration::from_millis(20));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new(b"value".to_vec(), Duration::from_secs(u64::MAX));
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_serialization() {
        let entry = CacheEntry::new(vec![0, 159, 146, 150], Duration::from_secs(60));

        let json = serde_json::to_string(&entry).unwrap();
        let restored: CacheEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, entry);
    }
}
