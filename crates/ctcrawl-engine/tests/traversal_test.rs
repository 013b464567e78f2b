use async_trait::async_trait;
use ctcrawl_common::error::SessionError;
use ctcrawl_common::locator::{LocatorStrategy, LogicalTarget};
use ctcrawl_common::model::success_key;
use ctcrawl_engine::config::{CrawlConfig, Pacing, ZonePolicy};
use ctcrawl_engine::session::Session;
use ctcrawl_engine::targets::TargetTable;
use ctcrawl_engine::traversal::Crawler;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy, PartialEq)]
enum Action {
    OpenRegion,
    Province,
    Pool,
    Zone,
    Arch,
    OpenCpu,
    OpenMemory,
    Inert,
}

#[derive(Clone)]
struct Entry {
    text: String,
    action: Action,
}

fn entry(text: &str, action: Action) -> Entry {
    Entry {
        text: text.to_string(),
        action,
    }
}

#[derive(Default)]
struct PageState {
    region_open: bool,
    cpu_open: bool,
    memory_open: bool,
    selected_province: Option<String>,
    selected_pool: Option<String>,
    selected_zones: Vec<String>,
    cpu_open_clicks: usize,
    memory_open_clicks: usize,
    cpu_open_failures_left: usize,
    province_click_attempts: usize,
    province_click_failures_left: usize,
    debug_calls: usize,
}

/// A scripted rendering of the pricing form. Province "A" exposes no
/// resource pools; province "B" has one pool with two real zones and one
/// billing radio rendered in the zone group.
struct MockPage {
    state: Arc<Mutex<PageState>>,
    cpu_items: Vec<String>,
    memory_items: Vec<String>,
}

impl MockPage {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState::default())),
            cpu_items: vec!["2核".into(), "4核".into()],
            memory_items: vec!["4G".into(), "8G".into()],
        }
    }

    fn with_empty_cpu_list(mut self) -> Self {
        self.cpu_items.clear();
        self
    }

    fn with_failing_cpu_opens(self, failures: usize) -> Self {
        self.state.lock().unwrap().cpu_open_failures_left = failures;
        self
    }

    fn with_failing_province_clicks(self, failures: usize) -> Self {
        self.state.lock().unwrap().province_click_failures_left = failures;
        self
    }

    fn entries(&self, selector: &str) -> Vec<Entry> {
        let state = self.state.lock().unwrap();
        match selector {
            "#region-input" => vec![entry("", Action::OpenRegion)],
            "#region-items" if state.region_open => {
                vec![entry("A", Action::Province), entry("B", Action::Province)]
            }
            "#pools" if state.selected_province.as_deref() == Some("B") => {
                vec![entry("pool-1", Action::Pool)]
            }
            "#zones" if state.selected_pool.is_some() => vec![
                entry("zone-1", Action::Zone),
                entry("按年付费", Action::Zone),
                entry("zone-2", Action::Zone),
            ],
            "#arch" => vec![entry("x86", Action::Arch)],
            "#cpu-select" => vec![entry("", Action::OpenCpu)],
            "#memory-select" => vec![entry("", Action::OpenMemory)],
            "#cpu-list" if state.cpu_open => vec![entry("", Action::Inert)],
            "#memory-list" if state.memory_open => vec![entry("", Action::Inert)],
            "#cpu-list li" if state.cpu_open => self
                .cpu_items
                .iter()
                .map(|t| entry(t, Action::Inert))
                .collect(),
            "#memory-list li" if state.memory_open => self
                .memory_items
                .iter()
                .map(|t| entry(t, Action::Inert))
                .collect(),
            _ => vec![],
        }
    }

    fn resolve(&self, strategy: &LocatorStrategy) -> Vec<Entry> {
        let mut entries = self.entries(&strategy.selector);
        if let Some(text) = &strategy.has_text {
            entries.retain(|e| e.text.contains(text.as_str()));
        }
        if let Some(nth) = strategy.nth {
            entries = entries.get(nth).cloned().into_iter().collect();
        }
        entries
    }

    fn cpu_open_clicks(&self) -> usize {
        self.state.lock().unwrap().cpu_open_clicks
    }

    fn selected_zones(&self) -> Vec<String> {
        self.state.lock().unwrap().selected_zones.clone()
    }
}

#[async_trait]
impl Session for MockPage {
    async fn launch(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), SessionError> {
        Ok(())
    }

    async fn count(&self, strategy: &LocatorStrategy) -> Result<usize, SessionError> {
        Ok(self.resolve(strategy).len())
    }

    async fn is_visible(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
    ) -> Result<bool, SessionError> {
        Ok(self.resolve(strategy).len() > index)
    }

    async fn text_content(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
    ) -> Result<Option<String>, SessionError> {
        Ok(self.resolve(strategy).get(index).map(|e| e.text.clone()))
    }

    async fn click(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        let Some(target) = self.resolve(strategy).get(index).cloned() else {
            return Err(SessionError::Interaction(format!(
                "nothing to click at {}[{}]",
                strategy.selector, index
            )));
        };
        let mut state = self.state.lock().unwrap();
        match target.action {
            Action::OpenRegion => state.region_open = true,
            Action::Province => {
                state.province_click_attempts += 1;
                if state.province_click_failures_left > 0 {
                    state.province_click_failures_left -= 1;
                    return Err(SessionError::Interaction("node detached mid-click".into()));
                }
                state.selected_province = Some(target.text.clone());
                state.region_open = false;
            }
            Action::Pool => state.selected_pool = Some(target.text.clone()),
            Action::Zone => state.selected_zones.push(target.text.clone()),
            Action::Arch => {}
            Action::OpenCpu => {
                state.cpu_open_clicks += 1;
                if state.cpu_open_failures_left > 0 {
                    state.cpu_open_failures_left -= 1;
                } else {
                    state.cpu_open = true;
                }
            }
            Action::OpenMemory => {
                state.memory_open_clicks += 1;
                state.memory_open = true;
            }
            Action::Inert => {}
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        if key == "Escape" {
            let mut state = self.state.lock().unwrap();
            state.region_open = false;
            state.cpu_open = false;
            state.memory_open = false;
        }
        Ok(())
    }

    async fn dropdown_panel_debug(&self) -> Result<serde_json::Value, SessionError> {
        self.state.lock().unwrap().debug_calls += 1;
        Ok(serde_json::Value::Null)
    }
}

fn single(name: &'static str, selector: &str) -> LogicalTarget {
    LogicalTarget::new(name, vec![LocatorStrategy::css(selector)])
}

fn mock_targets() -> TargetTable {
    TargetTable {
        province_input: single("province input", "#region-input"),
        province_items: single("province list", "#region-items"),
        resource_pools: single("resource pools", "#pools"),
        availability_zones: single("availability zones", "#zones"),
        cpu_select: single("cpu select", "#cpu-select"),
        memory_select: single("memory select", "#memory-select"),
        cpu_dropdown: single("cpu list", "#cpu-list"),
        memory_dropdown: single("memory list", "#memory-list"),
        cpu_dropdown_fallback: LocatorStrategy::css("#cpu-list"),
        memory_dropdown_fallback: LocatorStrategy::css("#memory-list"),
        cpu_architecture: single("cpu architecture", "#arch"),
    }
}

fn test_config(root: &Path) -> CrawlConfig {
    CrawlConfig {
        output_root: root.to_path_buf(),
        pacing: Pacing::immediate(),
        ..CrawlConfig::default()
    }
}

#[tokio::test]
async fn run_visits_one_leaf_for_pooled_province_and_none_for_empty_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut crawler = Crawler::new(MockPage::new(), test_config(dir.path()), mock_targets());

    let summary = crawler.run().await.unwrap();

    // Province A has zero pools: no leaves. Province B has one pool with
    // two real zones, but only the first valid zone becomes a leaf.
    let stats = crawler.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.failed, 0);
    assert!(summary.contains("total: 1"));

    let key = success_key("B", "pool-1", Some("zone-1"));
    let record = crawler.cache().get(&key).expect("leaf cached");
    assert_eq!(record.cpu_options.len(), 2);
    assert_eq!(record.memory_options.len(), 2);
    // Provenance markers carry the winning strategy and 1-based position.
    assert_eq!(record.cpu_options[0], "2核 css=#cpu-list >> li:nth-of-type(1)");

    let leaf_dir = dir.path().join("B").join("B-pool-1").join("zone-1");
    assert!(leaf_dir.join("cpu-options.txt").exists());
    assert!(leaf_dir.join("memory-options.txt").exists());
    assert!(leaf_dir.join("leaf.json").exists());
    assert!(dir.path().join("catalog-full.json").exists());
    assert!(dir.path().join("catalog-summary.json").exists());

    // Zero pools for A is recorded on the error side channel.
    let errors = std::fs::read_to_string(dir.path().join("error-log.txt")).unwrap();
    assert!(errors.contains("A"));
}

#[tokio::test]
async fn first_valid_zone_is_selected_skipping_billing_radios() {
    let dir = tempfile::tempdir().unwrap();
    let page = MockPage::new();
    let state = page.state.clone();
    let mut crawler = Crawler::new(page, test_config(dir.path()), mock_targets());

    crawler.run().await.unwrap();
    assert_eq!(state.lock().unwrap().selected_zones, vec!["zone-1"]);
}

#[tokio::test]
async fn all_zones_policy_visits_every_valid_zone() {
    let dir = tempfile::tempdir().unwrap();
    let page = MockPage::new();
    let state = page.state.clone();
    let mut config = test_config(dir.path());
    config.zone_policy = ZonePolicy::All;
    let mut crawler = Crawler::new(page, config, mock_targets());

    crawler.run().await.unwrap();

    assert_eq!(crawler.stats().total, 2);
    assert_eq!(crawler.stats().success, 2);
    assert_eq!(
        state.lock().unwrap().selected_zones,
        vec!["zone-1", "zone-2"]
    );
}

#[tokio::test]
async fn fresh_cache_skips_the_leaf_without_touching_its_widgets() {
    let dir = tempfile::tempdir().unwrap();

    let mut crawler = Crawler::new(MockPage::new(), test_config(dir.path()), mock_targets());
    crawler.run().await.unwrap();
    assert_eq!(crawler.stats().success, 1);

    // Second run within the staleness window: the leaf is skipped and the
    // CPU dropdown is never opened.
    let page = MockPage::new();
    let state = page.state.clone();
    let mut crawler = Crawler::new(page, test_config(dir.path()), mock_targets());
    crawler.run().await.unwrap();

    let stats = crawler.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.success, 0);
    let state = state.lock().unwrap();
    assert_eq!(state.cpu_open_clicks, 0);
    assert!(state.selected_zones.is_empty());
}

#[tokio::test]
async fn empty_option_set_marks_the_leaf_failed_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let page = MockPage::new().with_empty_cpu_list();
    let mut crawler = Crawler::new(page, test_config(dir.path()), mock_targets());

    crawler.run().await.unwrap();

    let stats = crawler.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success, 0);
    assert!(crawler.cache().is_empty());
    assert!(!dir.path().join("B").join("B-pool-1").exists());

    let errors = std::fs::read_to_string(dir.path().join("error-log.txt")).unwrap();
    assert!(errors.contains("empty option set"));
    // The detail line keeps the error's debug rendering, not just the
    // display message.
    assert!(errors.contains("EmptyOptionSet"));
}

#[tokio::test]
async fn province_selection_retries_after_transient_click_failures() {
    let dir = tempfile::tempdir().unwrap();
    // The first two selection clicks land on a detached node; the third
    // attempt must still go through, without any diagnostic dump.
    let page = MockPage::new().with_failing_province_clicks(2);
    let state = page.state.clone();
    let mut config = test_config(dir.path());
    config.province_limit = Some(1);
    let mut crawler = Crawler::new(page, config, mock_targets());

    crawler.run().await.unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.selected_province.as_deref(), Some("A"));
    assert_eq!(state.province_click_attempts, 3);
    assert_eq!(state.debug_calls, 0);
}

#[tokio::test]
async fn exhausted_province_retries_abort_the_subtree_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let page = MockPage::new().with_failing_province_clicks(usize::MAX);
    let state = page.state.clone();
    let mut config = test_config(dir.path());
    config.province_limit = Some(1);
    let mut crawler = Crawler::new(page, config, mock_targets());

    crawler.run().await.unwrap();

    // No leaf was ever reached; the dropdown-panel dump ran exactly once,
    // on the final failed attempt.
    assert_eq!(crawler.stats().total, 0);
    {
        let state = state.lock().unwrap();
        assert_eq!(state.province_click_attempts, 3);
        assert_eq!(state.debug_calls, 1);
        assert!(state.selected_province.is_none());
    }

    let errors = std::fs::read_to_string(dir.path().join("error-log.txt")).unwrap();
    assert!(errors.contains("province subtree aborted"));
}

#[tokio::test]
async fn dropdown_open_is_retried_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    // The first open click lands but the list stays closed; the retry
    // cycle's re-open succeeds.
    let page = MockPage::new().with_failing_cpu_opens(1);
    let state = page.state.clone();
    let mut crawler = Crawler::new(page, test_config(dir.path()), mock_targets());

    crawler.run().await.unwrap();

    assert_eq!(crawler.stats().success, 1);
    let state = state.lock().unwrap();
    assert!(state.cpu_open_clicks >= 2);
    // The memory dropdown never misbehaved, so it opens on the first try.
    assert_eq!(state.memory_open_clicks, 1);
}

#[tokio::test]
async fn province_limit_bounds_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let page = MockPage::new();
    let state = page.state.clone();
    let mut config = test_config(dir.path());
    config.province_limit = Some(1);
    let mut crawler = Crawler::new(page, config, mock_targets());

    crawler.run().await.unwrap();

    // Only province A (zero pools) is visited.
    assert_eq!(crawler.stats().total, 0);
    assert_eq!(state.lock().unwrap().selected_province.as_deref(), Some("A"));
}
