//! Idempotent success cache and skip policy.
//!
//! The cache — not traversal order — is the source of idempotence across
//! runs. It is loaded once at start and flushed to disk after every
//! successful leaf, so a crash never loses more than the in-flight leaf.

use chrono::{DateTime, Utc};
use ctcrawl_common::model::{SuccessRecord, success_key};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Whether a cached leaf counts as fresh. Two observed variants of the
/// original tooling disagreed (always re-extract vs. a 2-day window), so
/// the policy is an explicit value rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Ignore the cache; every leaf is re-extracted.
    AlwaysRefresh,
    /// A record younger than this many days is fresh and skipped.
    TtlDays(u64),
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::TtlDays(2)
    }
}

pub struct SuccessCache {
    path: PathBuf,
    entries: HashMap<String, SuccessRecord>,
    policy: CachePolicy,
}

impl SuccessCache {
    /// Load the cache file if present; a missing or unreadable file starts
    /// an empty cache rather than failing the run.
    pub fn load(path: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, SuccessRecord>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!("success cache unreadable, starting empty: {}", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        info!("loaded success cache: {} records", entries.len());
        Self {
            path,
            entries,
            policy,
        }
    }

    #[cfg(test)]
    pub fn in_memory(policy: CachePolicy) -> Self {
        Self {
            path: PathBuf::new(),
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SuccessRecord> {
        self.entries.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &SuccessRecord> {
        self.entries.values()
    }

    /// Whether the leaf behind `key` needs extraction at `now`: absent from
    /// the cache, always-refresh policy, or older than the TTL window.
    pub fn should_extract(&self, key: &str, now: DateTime<Utc>) -> bool {
        let Some(record) = self.entries.get(key) else {
            return true;
        };
        match self.policy {
            CachePolicy::AlwaysRefresh => true,
            CachePolicy::TtlDays(days) => {
                let age = now.signed_duration_since(record.timestamp);
                age > chrono::Duration::days(days as i64)
            }
        }
    }

    /// Overwrite the entry for the leaf and flush the whole cache to disk
    /// synchronously.
    pub fn record(&mut self, record: SuccessRecord) -> std::io::Result<()> {
        self.entries.insert(record.key.clone(), record);
        self.flush()
    }

    pub fn record_success(
        &mut self,
        province: &str,
        pool: &str,
        zone: Option<&str>,
        cpu_options: Vec<String>,
        memory_options: Vec<String>,
        now: DateTime<Utc>,
    ) -> std::io::Result<()> {
        let key = success_key(province, pool, zone);
        self.record(SuccessRecord {
            key,
            province: province.to_string(),
            pool: pool.to_string(),
            zone: zone.map(str::to_string),
            cpu_options,
            memory_options,
            timestamp: now,
        })
    }

    fn flush(&self) -> std::io::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
    }

    /// All records sorted by province, then pool, then zone. Ordering is a
    /// stable Unicode codepoint sort.
    pub fn sorted_records(&self) -> Vec<&SuccessRecord> {
        let mut records: Vec<&SuccessRecord> = self.entries.values().collect();
        records.sort_by(|a, b| {
            a.province
                .cmp(&b.province)
                .then_with(|| a.pool.cmp(&b.pool))
                .then_with(|| a.zone.cmp(&b.zone))
        });
        records
    }
}

impl std::ops::Index<&str> for SuccessCache {
    type Output = SuccessRecord;

    fn index(&self, key: &str) -> &SuccessRecord {
        &self.entries[key]
    }
}
