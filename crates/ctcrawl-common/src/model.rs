//! Shared data model for the crawl hierarchy and its persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A selectable UI option plus enough information to re-locate it
/// deterministically later: the winning strategy source and the positional
/// index, never a live element handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    pub name: String,
    pub strategy_source: String,
    pub index: usize,
}

/// One point in the region → pool → zone hierarchy. Zone is optional:
/// some pools expose none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub province: String,
    pub pool: Option<String>,
    pub zone: Option<String>,
}

impl HierarchyNode {
    pub fn province(province: impl Into<String>) -> Self {
        Self {
            province: province.into(),
            pool: None,
            zone: None,
        }
    }

    pub fn path(&self) -> String {
        let mut out = self.province.clone();
        if let Some(pool) = &self.pool {
            out.push_str(" - ");
            out.push_str(pool);
        }
        if let Some(zone) = &self.zone {
            out.push_str(" - ");
            out.push_str(zone);
        }
        out
    }
}

/// Serialize the `(province, pool, zone-or-null)` triple as a stable string.
///
/// The unit separator keeps names that themselves contain `-` from
/// colliding; two extractions of the same leaf always produce the same key.
pub fn success_key(province: &str, pool: &str, zone: Option<&str>) -> String {
    format!(
        "{}\u{1f}{}\u{1f}{}",
        province,
        pool,
        zone.unwrap_or_default()
    )
}

/// The persisted outcome of one successful leaf extraction. These are the
/// only records that outlive a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub key: String,
    pub province: String,
    pub pool: String,
    pub zone: Option<String>,
    pub cpu_options: Vec<String>,
    pub memory_options: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// One append-only entry per failed leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub province: String,
    pub pool: Option<String>,
    pub zone: Option<String>,
    pub message: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable run accumulator, owned exclusively by the aggregator and
/// mutated once per leaf outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub total: u64,
    pub success: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunStats {
    pub fn record_success(&mut self) {
        self.total += 1;
        self.success += 1;
    }

    pub fn record_skip(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    /// Skipped leaves count as prior successes.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.success + self.skipped) as f64 / self.total as f64 * 100.0
    }
}
