//! Produced artifacts: per-leaf option files and snapshots, plus the
//! aggregated catalog documents.

use crate::cache::SuccessCache;
use crate::extract::sanitize_name;
use crate::targets::DEFAULT_ZONE_LABEL;
use ctcrawl_common::model::SuccessRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct OutputWriter {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct CatalogEntry<'a> {
    province: &'a str,
    pool: &'a str,
    zone: Option<&'a str>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn leaf_dir(&self, province: &str, pool: &str, zone: Option<&str>) -> PathBuf {
        let province_seg = sanitize_name(province);
        let pool_seg = sanitize_name(&format!("{}-{}", province, pool));
        let zone_seg = sanitize_name(zone.unwrap_or(DEFAULT_ZONE_LABEL));
        self.root.join(province_seg).join(pool_seg).join(zone_seg)
    }

    /// Write the CPU/memory option lists (one annotated entry per line) and
    /// the combined JSON snapshot for one leaf.
    pub fn write_leaf(&self, record: &SuccessRecord) -> std::io::Result<()> {
        let dir = self.leaf_dir(&record.province, &record.pool, record.zone.as_deref());
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("cpu-options.txt"), record.cpu_options.join("\n"))?;
        std::fs::write(
            dir.join("memory-options.txt"),
            record.memory_options.join("\n"),
        )?;
        std::fs::write(dir.join("leaf.json"), serde_json::to_string_pretty(record)?)?;
        info!(
            "saved leaf {} (cpu: {} / memory: {})",
            dir.display(),
            record.cpu_options.len(),
            record.memory_options.len()
        );
        Ok(())
    }

    /// Write the aggregated dataset: one document with every record in full
    /// detail and one reduced document with hierarchy identifiers only,
    /// both sorted by province name.
    pub fn write_catalog(&self, cache: &SuccessCache) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let records = cache.sorted_records();

        let full = serde_json::to_string_pretty(&records)?;
        std::fs::write(self.root.join("catalog-full.json"), full)?;

        let summary: Vec<CatalogEntry> = records
            .iter()
            .map(|r| CatalogEntry {
                province: &r.province,
                pool: &r.pool,
                zone: r.zone.as_deref(),
            })
            .collect();
        let reduced = serde_json::to_string_pretty(&summary)?;
        std::fs::write(self.root.join("catalog-summary.json"), reduced)?;
        info!("catalog written: {} records", records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use chrono::Utc;
    use ctcrawl_common::model::success_key;

    fn record(province: &str, pool: &str, zone: Option<&str>) -> SuccessRecord {
        SuccessRecord {
            key: success_key(province, pool, zone),
            province: province.into(),
            pool: pool.into(),
            zone: zone.map(str::to_string),
            cpu_options: vec!["4核 index:1".into()],
            memory_options: vec!["8G index:1".into()],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn leaf_files_land_under_sanitized_hierarchy_path() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        writer.write_leaf(&record("华东", "池/1", Some("可用区1"))).unwrap();

        let leaf = dir
            .path()
            .join("华东")
            .join("华东-池_1")
            .join("可用区1");
        assert!(leaf.join("cpu-options.txt").exists());
        assert!(leaf.join("memory-options.txt").exists());
        assert!(leaf.join("leaf.json").exists());
    }

    #[test]
    fn null_zone_uses_default_label_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        writer.write_leaf(&record("A", "B", None)).unwrap();
        assert!(dir.path().join("A").join("A-B").join("默认可用区").exists());
    }

    #[test]
    fn catalog_documents_are_sorted_and_reduced() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SuccessCache::in_memory(CachePolicy::default());
        let now = Utc::now();
        for (p, b, z) in [("b", "p", None), ("a", "p", Some("z"))] {
            cache
                .record_success(p, b, z, vec!["c".into()], vec!["m".into()], now)
                .unwrap();
        }
        let writer = OutputWriter::new(dir.path());
        writer.write_catalog(&cache).unwrap();

        let full: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("catalog-full.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(full[0]["province"], "a");
        assert_eq!(full[1]["province"], "b");
        assert!(full[0]["cpu_options"].is_array());

        let reduced: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("catalog-summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(reduced[0]["zone"], "z");
        assert!(reduced[0].get("cpu_options").is_none());
    }
}
