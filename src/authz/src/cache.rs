//! Credential cache of verified users

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::epoch_now;

/// Cached authorization record for one verified username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Identity string, unique within the cache
    pub username: String,

    /// Allowed topic pattern; `"#"` grants any topic, anything else is a
    /// literal prefix
    pub allowed_topic: String,

    /// Role name, resolved through the role table at decision time
    pub role: String,

    /// Expiry as epoch seconds from the verified claims; `None` when the
    /// token carried no expiry
    pub expires_at: Option<i64>,
}

impl CredentialRecord {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(exp) if now > exp)
    }
}

/// Cache policy knobs
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Treat records past their claim expiry as absent
    pub enforce_expiry: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enforce_expiry: true,
        }
    }
}

/// Concurrent map of verified users keyed by username.
///
/// Upsert, lookup, and remove are per-key atomic; no guard is ever held
/// across a verification exchange. One record exists per username at any
/// time: inserting an existing username replaces its fields in place.
pub struct CredentialCache {
    records: DashMap<String, CredentialRecord>,

    config: CacheConfig,

    /// Cache statistics
    stats: DashMap<String, usize>,
}

impl CredentialCache {
    /// Creates an empty cache with the given policy
    pub fn new(config: CacheConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
            stats: DashMap::new(),
        }
    }

    /// Inserts a record, replacing any existing record for the same
    /// username.
    pub fn upsert(&self, record: CredentialRecord) {
        debug!(
            username = %record.username,
            topic = %record.allowed_topic,
            role = %record.role,
            expires_at = ?record.expires_at,
            "caching credential record"
        );
        self.records.insert(record.username.clone(), record);
    }

    /// Record for `username`, by exact-username equality.
    ///
    /// With expiry enforcement on, a record past its claim expiry is
    /// dropped on the spot and reported absent, forcing re-verification.
    pub fn lookup(&self, username: &str) -> Option<CredentialRecord> {
        match self.records.get(username) {
            Some(entry) => {
                if self.config.enforce_expiry && entry.is_expired(epoch_now()) {
                    drop(entry);
                    self.records.remove(username);
                    self.increment_stat("expirations");
                    debug!(username, "cached record expired");
                    return None;
                }

                self.increment_stat("hits");
                Some(entry.value().clone())
            }
            None => {
                self.increment_stat("misses");
                None
            }
        }
    }

    /// Removes the record for `username`; reports whether one existed.
    /// Idempotent.
    pub fn remove(&self, username: &str) -> bool {
        let found = self.records.remove(username).is_some();
        if found {
            debug!(username, "evicted credential record");
        }
        found
    }

    /// Drops all records; used at teardown
    pub fn clear(&self) {
        self.records.clear();
        self.stats.clear();
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cache statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.records.len(),
        }
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of lookups that found a live record
    pub hits: usize,
    /// Number of lookups that found nothing
    pub misses: usize,
    /// Number of records dropped because their claims expired
    pub expirations: usize,
    /// Current record count
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
