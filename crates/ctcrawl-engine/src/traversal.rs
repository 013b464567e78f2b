//! Hierarchical traversal state machine.
//!
//! `Idle → ProvinceSelected → PoolSelected → ZoneSelected? →
//! OptionsExtracted → Idle`, one leaf at a time against a single shared
//! session. Every leaf is wrapped in a failure boundary; errors escaping
//! province-level enumeration abort only that province's subtree. The only
//! fatal conditions are session launch failure and an empty province
//! enumeration.

use crate::cache::SuccessCache;
use crate::config::{CrawlConfig, ZonePolicy};
use crate::extract;
use crate::interact;
use crate::output::OutputWriter;
use crate::report::{ErrorLog, RunAggregator};
use crate::resolver;
use crate::session::Session;
use crate::targets::{TargetTable, ZONE_DENYLIST};
use chrono::Utc;
use ctcrawl_common::error::CrawlError;
use ctcrawl_common::locator::{LocatorStrategy, LogicalTarget};
use ctcrawl_common::model::{OptionDescriptor, RunStats, SuccessRecord, success_key};
use std::time::Duration;
use tracing::{info, warn};

const PROVINCE_ATTEMPTS: u32 = 3;
const ATTEMPT_BACKOFF: Duration = Duration::from_millis(250);

/// Drop zone-radio entries that are actually billing controls. Order is
/// preserved.
pub fn filter_valid_zones(zones: Vec<OptionDescriptor>) -> Vec<OptionDescriptor> {
    zones
        .into_iter()
        .filter(|zone| !ZONE_DENYLIST.iter().any(|term| zone.name.contains(term)))
        .collect()
}

pub struct Crawler<S: Session> {
    session: S,
    config: CrawlConfig,
    targets: TargetTable,
    cache: SuccessCache,
    aggregator: RunAggregator,
    output: OutputWriter,
}

impl<S: Session> Crawler<S> {
    pub fn new(session: S, config: CrawlConfig, targets: TargetTable) -> Self {
        let cache = SuccessCache::load(config.cache_path(), config.cache_policy);
        let aggregator = RunAggregator::new(ErrorLog::new(config.error_log_path()));
        let output = OutputWriter::new(&config.output_root);
        Self {
            session,
            config,
            targets,
            cache,
            aggregator,
            output,
        }
    }

    pub fn stats(&self) -> RunStats {
        self.aggregator.stats
    }

    pub fn cache(&self) -> &SuccessCache {
        &self.cache
    }

    /// Drive the whole run. Returns the end-of-run summary line; only the
    /// fatal error classes surface as `Err`.
    pub async fn run(&mut self) -> Result<String, CrawlError> {
        if let Err(e) = self.session.launch().await {
            return Err(CrawlError::SessionLaunch(e.to_string()));
        }
        let outcome = self.run_inner().await;
        if let Err(e) = self.session.close().await {
            warn!("session close failed: {}", e);
        }
        let summary = self.aggregator.summary();
        info!("run finished: {}", summary);
        outcome.map(|_| summary)
    }

    async fn run_inner(&mut self) -> Result<(), CrawlError> {
        info!("loading {}", self.config.target_url);
        self.session
            .navigate(&self.config.target_url, Duration::from_secs(60))
            .await
            .map_err(|e| CrawlError::SessionLaunch(format!("initial navigation: {}", e)))?;
        tokio::time::sleep(self.config.pacing.initial_wait).await;

        let provinces = match self.discover_provinces().await {
            Ok(list) if list.is_empty() => return Err(CrawlError::NoProvincesDiscovered),
            Ok(list) => list,
            Err(e) => {
                warn!("province discovery failed: {}", e);
                return Err(CrawlError::NoProvincesDiscovered);
            }
        };

        let provinces: Vec<String> = match self.config.province_limit {
            Some(limit) => provinces.into_iter().take(limit).collect(),
            None => provinces,
        };
        info!("crawling {} provinces", provinces.len());

        for (i, province) in provinces.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.pacing.province_gap).await;
            }
            self.crawl_province(province).await;
        }

        self.output.write_catalog(&self.cache)?;
        Ok(())
    }

    /// `Idle`: enumerate all provinces from the region dropdown,
    /// deduplicated by name. Order follows the source list.
    async fn discover_provinces(&mut self) -> Result<Vec<String>, CrawlError> {
        self.open_province_dropdown().await?;
        let resolved = resolver::resolve_first(
            &self.session,
            &self.targets.province_items,
            self.config.pacing.locate_timeout,
        )
        .await?;

        let count = self.session.count(&resolved.strategy).await?;
        let mut provinces: Vec<String> = Vec::new();
        for i in 0..count {
            if let Some(text) = self.session.text_content(&resolved.strategy, i).await? {
                let name = text.trim();
                if !name.is_empty() && !provinces.iter().any(|p| p == name) {
                    provinces.push(name.to_string());
                }
            }
        }

        let _ = self.session.press_key("Escape").await;
        tokio::time::sleep(self.config.pacing.click_wait).await;
        info!("discovered {} provinces", provinces.len());
        Ok(provinces)
    }

    async fn open_province_dropdown(&self) -> Result<(), CrawlError> {
        let opened = interact::click_with_fallback(
            &self.session,
            &self.targets.province_input,
            "province dropdown",
            self.config.pacing.province_control_timeout,
        )
        .await;
        if !opened {
            return Err(CrawlError::LocatorNotFound {
                target: "province dropdown".into(),
                waited_ms: self.config.pacing.province_control_timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(self.config.pacing.click_wait).await;
        Ok(())
    }

    /// `Idle → ProvinceSelected`. Up to three attempts; the dropdown-panel
    /// diagnostic dump happens once, on the final failure.
    async fn select_province(&self, name: &str) -> Result<(), CrawlError> {
        let mut attempt = 0;
        loop {
            match self.try_select_province(name).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= PROVINCE_ATTEMPTS {
                        if let Ok(panels) = self.session.dropdown_panel_debug().await {
                            warn!("province dropdown state: {}", panels);
                        }
                        return Err(e);
                    }
                    let _ = self.session.press_key("Escape").await;
                    tokio::time::sleep(ATTEMPT_BACKOFF).await;
                }
            }
        }
    }

    async fn try_select_province(&self, name: &str) -> Result<(), CrawlError> {
        self.open_province_dropdown().await?;
        let resolved = resolver::resolve_first(
            &self.session,
            &self.targets.province_items,
            self.config.pacing.locate_timeout,
        )
        .await?;

        let filtered = resolved.strategy.clone().with_text(name);
        let count = self.session.count(&filtered).await?;
        if count == 0 {
            return Err(CrawlError::LocatorNotFound {
                target: format!("province entry {}", name),
                waited_ms: self.config.pacing.locate_timeout.as_millis() as u64,
            });
        }

        // Stale duplicate nodes from prior renders sit earlier in the DOM;
        // the freshest match is the last visible one.
        for i in (0..count).rev() {
            if self.session.is_visible(&filtered, i).await.unwrap_or(false) {
                self.session
                    .click(&filtered, i, interact::CLICK_TIMEOUT)
                    .await?;
                tokio::time::sleep(self.config.pacing.operation_wait).await;
                info!("selected province: {}", name);
                return Ok(());
            }
        }
        Err(CrawlError::NotFoundTimeout {
            target: format!("visible province entry {}", name),
            waited_ms: self.config.pacing.locate_timeout.as_millis() as u64,
        })
    }

    /// Province subtree boundary: any error below is logged against the
    /// province and the run moves on.
    async fn crawl_province(&mut self, province: &str) {
        info!("========== {} ==========", province);
        match self.crawl_province_inner(province).await {
            Ok(()) => {}
            Err(e) => {
                warn!("province {} aborted: {}", province, e);
                self.aggregator
                    .subtree_failed(province, "province subtree aborted", &e.to_string());
            }
        }
    }

    async fn crawl_province_inner(&mut self, province: &str) -> Result<(), CrawlError> {
        self.select_province(province).await?;

        let pools = interact::collect_visible_options(
            &self.session,
            &self.targets.resource_pools,
            "resource pools",
        )
        .await;
        if pools.is_empty() {
            // Zero pools ends this subtree without contributing leaves.
            return Err(CrawlError::EmptySelection(format!(
                "no resource pools for {}",
                province
            )));
        }
        info!("{}: {} resource pools", province, pools.len());

        for (i, pool) in pools.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.pacing.province_gap).await;
            }
            self.crawl_pool(province, pool).await?;
        }
        Ok(())
    }

    /// `ProvinceSelected → PoolSelected`, then one leaf per selected zone.
    async fn crawl_pool(
        &mut self,
        province: &str,
        pool: &OptionDescriptor,
    ) -> Result<(), CrawlError> {
        self.click_option(pool, &format!("resource pool: {}", pool.name))
            .await?;
        tokio::time::sleep(self.config.pacing.after_select_wait).await;

        let zones = interact::collect_visible_options(
            &self.session,
            &self.targets.availability_zones,
            "availability zones",
        )
        .await;
        let valid = filter_valid_zones(zones);

        // `PoolSelected → ZoneSelected | skip`: a pool without zones still
        // yields one leaf with a null zone.
        let leaves: Vec<Option<OptionDescriptor>> = if valid.is_empty() {
            vec![None]
        } else {
            match self.config.zone_policy {
                ZonePolicy::FirstValid => vec![Some(valid[0].clone())],
                ZonePolicy::All => valid.into_iter().map(Some).collect(),
            }
        };

        for (i, zone) in leaves.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.pacing.leaf_gap).await;
            }
            self.crawl_leaf(province, &pool.name, zone.as_ref()).await;
        }
        Ok(())
    }

    /// Leaf failure boundary: extraction errors are recorded and the run
    /// continues with the next sibling.
    async fn crawl_leaf(
        &mut self,
        province: &str,
        pool: &str,
        zone: Option<&OptionDescriptor>,
    ) {
        let zone_name = zone.map(|z| z.name.as_str());
        let key = success_key(province, pool, zone_name);
        if !self.cache.should_extract(&key, Utc::now()) {
            info!("cache fresh, skipping {} - {} - {:?}", province, pool, zone_name);
            self.aggregator.leaf_skipped();
            return;
        }

        match self.extract_leaf(province, pool, zone).await {
            Ok(()) => self.aggregator.leaf_succeeded(),
            Err(e) => {
                warn!(
                    "leaf failed: {} - {} - {:?}: {}",
                    province, pool, zone_name, e
                );
                self.aggregator.leaf_failed(
                    province,
                    Some(pool),
                    zone_name,
                    &e.to_string(),
                    &format!("{:?}", e),
                );
            }
        }
    }

    /// `* → OptionsExtracted`: optional zone click, best-effort CPU
    /// architecture, then both option sets. Both must be non-empty.
    async fn extract_leaf(
        &mut self,
        province: &str,
        pool: &str,
        zone: Option<&OptionDescriptor>,
    ) -> Result<(), CrawlError> {
        if let Some(zone) = zone {
            self.click_option(zone, &format!("availability zone: {}", zone.name))
                .await?;
            tokio::time::sleep(self.config.pacing.operation_wait).await;
        }
        self.select_cpu_architecture().await;

        let cpu_options = self.extract_option_set(OptionSet::Cpu).await?;
        let memory_options = self.extract_option_set(OptionSet::Memory).await?;

        let record = SuccessRecord {
            key: success_key(province, pool, zone.map(|z| z.name.as_str())),
            province: province.to_string(),
            pool: pool.to_string(),
            zone: zone.map(|z| z.name.clone()),
            cpu_options,
            memory_options,
            timestamp: Utc::now(),
        };
        self.output.write_leaf(&record)?;
        self.cache.record(record)?;
        Ok(())
    }

    /// Best effort: absence of the architecture radio is not an error.
    async fn select_cpu_architecture(&self) {
        for strategy in &self.targets.cpu_architecture.strategies {
            let single = LogicalTarget::new("cpu architecture", vec![strategy.clone()]);
            if interact::click_with_fallback(
                &self.session,
                &single,
                "cpu architecture (x86)",
                self.config.pacing.arch_timeout,
            )
            .await
            {
                tokio::time::sleep(self.config.pacing.click_wait).await;
                return;
            }
        }
        info!("cpu architecture already selected or absent");
    }

    async fn extract_option_set(&self, set: OptionSet) -> Result<Vec<String>, CrawlError> {
        let (open_target, list_target, fallback, description) = match set {
            OptionSet::Cpu => (
                &self.targets.cpu_select,
                &self.targets.cpu_dropdown,
                &self.targets.cpu_dropdown_fallback,
                "cpu options",
            ),
            OptionSet::Memory => (
                &self.targets.memory_select,
                &self.targets.memory_dropdown,
                &self.targets.memory_dropdown_fallback,
                "memory options",
            ),
        };
        info!("extracting {}", description);

        // Return the form to a known-neutral state before interacting.
        let _ = self.session.press_key("Escape").await;
        tokio::time::sleep(self.config.pacing.click_wait).await;

        let outcome = self
            .open_and_extract(open_target, list_target, fallback, description)
            .await;

        let _ = self.session.press_key("Escape").await;
        tokio::time::sleep(self.config.pacing.click_wait).await;
        outcome
    }

    async fn open_and_extract(
        &self,
        open_target: &LogicalTarget,
        list_target: &LogicalTarget,
        fallback: &LocatorStrategy,
        description: &str,
    ) -> Result<Vec<String>, CrawlError> {
        let list = interact::open_dropdown_and_list(
            &self.session,
            open_target,
            list_target,
            fallback,
            description,
            self.config.pacing.open_control_timeout,
            self.config.pacing.locate_timeout,
            self.config.pacing.operation_wait,
        )
        .await?;
        extract::extract_options(&self.session, &list, description).await
    }

    async fn click_option(
        &self,
        descriptor: &OptionDescriptor,
        description: &str,
    ) -> Result<(), CrawlError> {
        let strategy =
            LocatorStrategy::parse(&descriptor.strategy_source).ok_or_else(|| {
                CrawlError::LocatorNotFound {
                    target: format!("unparseable source for {}", description),
                    waited_ms: 0,
                }
            })?;
        interact::click_descriptor(
            &self.session,
            &strategy,
            descriptor,
            description,
            self.config.pacing.locate_timeout,
        )
        .await
    }
}

enum OptionSet {
    Cpu,
    Memory,
}
