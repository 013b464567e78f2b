//! Failure isolation side channel and run summary.

use chrono::Utc;
use ctcrawl_common::model::{ErrorRecord, RunStats};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::error;

/// Append-only error log, one block per failed leaf.
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one failure block. A log that cannot be written must not take
    /// the run down with it; the failure is reported on the tracing channel
    /// instead.
    pub fn append(&self, record: &ErrorRecord) {
        let zone_label = record
            .zone
            .as_deref()
            .map(|z| format!(" - {}", z))
            .unwrap_or_default();
        let pool_label = record.pool.as_deref().unwrap_or("-");
        let block = format!(
            "[{}] {} - {}{}: {}\n{}\n{}\n",
            record.timestamp.to_rfc3339(),
            record.province,
            pool_label,
            zone_label,
            record.message,
            record.detail,
            "=".repeat(80)
        );
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(block.as_bytes()));
        if let Err(e) = written {
            error!("error log write failed: {}", e);
        }
    }
}

/// Owns the run statistics and the error side channel; every leaf outcome
/// passes through here exactly once.
pub struct RunAggregator {
    pub stats: RunStats,
    errors: ErrorLog,
    started: Instant,
}

impl RunAggregator {
    pub fn new(errors: ErrorLog) -> Self {
        Self {
            stats: RunStats::default(),
            errors,
            started: Instant::now(),
        }
    }

    pub fn leaf_succeeded(&mut self) {
        self.stats.record_success();
    }

    pub fn leaf_skipped(&mut self) {
        self.stats.record_skip();
    }

    pub fn leaf_failed(
        &mut self,
        province: &str,
        pool: Option<&str>,
        zone: Option<&str>,
        message: &str,
        detail: &str,
    ) {
        self.stats.record_failure();
        self.errors.append(&ErrorRecord {
            province: province.to_string(),
            pool: pool.map(str::to_string),
            zone: zone.map(str::to_string),
            message: message.to_string(),
            detail: detail.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Subtree failures (zero pools, province selection dead after retries)
    /// are logged with full context but do not count as leaves.
    pub fn subtree_failed(&mut self, province: &str, message: &str, detail: &str) {
        self.errors.append(&ErrorRecord {
            province: province.to_string(),
            pool: None,
            zone: None,
            message: message.to_string(),
            detail: detail.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn summary(&self) -> String {
        let s = &self.stats;
        format!(
            "total: {} | success: {} | skipped: {} | failed: {} | success rate: {:.1}% | elapsed: {:.1}s",
            s.total,
            s.success,
            s.skipped,
            s.failed,
            s.success_rate(),
            self.elapsed_secs()
        )
    }
}
