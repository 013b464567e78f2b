//! Environment-style configuration, read once at process start.
//!
//! CLI flags in the binary override these values after parsing.

use crate::cache::CachePolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str = "https://www.ctyun.cn/pricing/ecs";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";

/// Which zones of a pool become leaves. Selecting only the first valid
/// zone bounds crawl cost but under-covers pools with multiple real
/// zones, so the policy is explicit and overridable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZonePolicy {
    #[default]
    FirstValid,
    All,
}

impl ZonePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first" => Some(ZonePolicy::FirstValid),
            "all" => Some(ZonePolicy::All),
            _ => None,
        }
    }
}

/// Preferred color scheme emulated on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    pub fn as_media_value(self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
        }
    }
}

/// Fixed settle delays and timeouts. The production values mirror the
/// page's observed re-render latency; they are constants, not adaptive.
/// Tests shrink them to keep runs fast.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Settle after initial navigation.
    pub initial_wait: Duration,
    /// Settle after selecting a province or zone.
    pub operation_wait: Duration,
    /// Settle after selecting a resource pool (heaviest re-render).
    pub after_select_wait: Duration,
    /// Settle after small clicks (dropdown open/close, Escape).
    pub click_wait: Duration,
    /// Gap between leaves of the same pool.
    pub leaf_gap: Duration,
    /// Gap between provinces.
    pub province_gap: Duration,
    /// Visibility-wait deadline for dropdown lists and descriptors.
    pub locate_timeout: Duration,
    /// Deadline for opening the province control.
    pub province_control_timeout: Duration,
    /// Deadline for opening the CPU/memory select controls.
    pub open_control_timeout: Duration,
    /// Deadline for the best-effort CPU-architecture radio.
    pub arch_timeout: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(4000),
            operation_wait: Duration::from_millis(1200),
            after_select_wait: Duration::from_millis(1800),
            click_wait: Duration::from_millis(350),
            leaf_gap: Duration::from_millis(700),
            province_gap: Duration::from_millis(800),
            locate_timeout: Duration::from_secs(6),
            province_control_timeout: Duration::from_secs(8),
            open_control_timeout: Duration::from_secs(6),
            arch_timeout: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    /// Near-zero delays for tests against mock sessions.
    pub fn immediate() -> Self {
        let zero = Duration::ZERO;
        Self {
            initial_wait: zero,
            operation_wait: zero,
            after_select_wait: zero,
            click_wait: zero,
            leaf_gap: zero,
            province_gap: zero,
            locate_timeout: Duration::from_millis(50),
            province_control_timeout: Duration::from_millis(50),
            open_control_timeout: Duration::from_millis(50),
            arch_timeout: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub target_url: String,
    pub headless: bool,
    pub slow_mo: Duration,
    /// Preferred browser channel (e.g. `msedge`); the session falls back to
    /// the bundled engine when launching the channel fails.
    pub browser_channel: Option<String>,
    /// Network-capture replay file. Recognized for compatibility; the CDP
    /// session cannot replay captures and warns when it is set.
    pub replay_capture: Option<PathBuf>,
    pub user_agent: String,
    pub color_scheme: ColorScheme,
    pub province_limit: Option<usize>,
    pub cache_policy: CachePolicy,
    pub zone_policy: ZonePolicy,
    pub output_root: PathBuf,
    pub pacing: Pacing,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            headless: true,
            slow_mo: Duration::ZERO,
            browser_channel: Some("msedge".to_string()),
            replay_capture: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            color_scheme: ColorScheme::Light,
            province_limit: None,
            cache_policy: CachePolicy::default(),
            zone_policy: ZonePolicy::default(),
            output_root: PathBuf::from("output"),
            pacing: Pacing::default(),
        }
    }
}

impl CrawlConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup. Split out from [`Self::from_env`] so tests
    /// can feed values without touching process-global environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let debug_browser = lookup("DEBUG_BROWSER").is_some_and(|v| v.trim() == "1");
        if debug_browser {
            config.headless = false;
            config.slow_mo = Duration::from_millis(
                lookup("DEBUG_SLOWMO")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(50),
            );
        } else if lookup("HEADLESS").is_some_and(|v| v.trim() == "false") {
            config.headless = false;
        }

        if let Some(channel) = lookup("BROWSER_CHANNEL") {
            let channel = channel.trim().to_string();
            config.browser_channel = (!channel.is_empty()).then_some(channel);
        } else if lookup("PREFER_EDGE").is_some_and(|v| v.trim() == "0") {
            config.browser_channel = None;
        }

        if let Some(raw) = lookup("ROUTE_HAR") {
            let raw = raw.trim();
            if !raw.is_empty() {
                config.replay_capture = Some(PathBuf::from(raw));
            }
        }

        if let Some(ua) = lookup("USER_AGENT") {
            config.user_agent = ua;
        }

        if lookup("COLOR_SCHEME").is_some_and(|v| v.trim() == "dark") {
            config.color_scheme = ColorScheme::Dark;
        }

        config.province_limit = lookup("PROVINCE_LIMIT")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);

        if let Some(days) = lookup("CACHE_TTL_DAYS").and_then(|v| v.trim().parse::<u64>().ok()) {
            config.cache_policy = if days == 0 {
                CachePolicy::AlwaysRefresh
            } else {
                CachePolicy::TtlDays(days)
            };
        }

        if let Some(policy) = lookup("ZONE_POLICY").and_then(|v| ZonePolicy::parse(&v)) {
            config.zone_policy = policy;
        }

        if let Some(dir) = lookup("OUTPUT_DIR") {
            let dir = dir.trim();
            if !dir.is_empty() {
                config.output_root = PathBuf::from(dir);
            }
        }

        config
    }

    pub fn cache_path(&self) -> PathBuf {
        self.output_root.join("success-log.json")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.output_root.join("error-log.txt")
    }
}
