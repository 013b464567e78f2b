//! Chromium session plumbing: launch, page setup, network filters.

use chromiumoxide::cdp::browser_protocol::emulation::{MediaFeature, SetEmulatedMediaParams};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use ctcrawl_engine::config::CrawlConfig;
use futures::StreamExt;
use regex::Regex;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resource types that never affect the option widgets.
const BLOCKED_RESOURCE_TYPES: &[ResourceType] =
    &[ResourceType::Image, ResourceType::Media, ResourceType::Font];

/// Analytics and beacon endpoints, dropped to keep the page quiet.
pub const BLOCKED_URL_PATTERN: &str =
    "(?i)analytics|doubleclick|facebook|cnzz|baidu|umeng|beacon|fullstory|sentry";

const DEFAULT_BROWSER_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-renderer-backgrounding",
    "--disable-background-timer-throttling",
    "--disable-features=site-per-process",
    "--disable-gpu",
    "--window-size=1920,1080",
];

const DISABLE_ANIMATIONS_SCRIPT: &str = r#"
(() => {
  const style = document.createElement('style');
  style.innerHTML = '*,:after,:before{transition:none!important;animation:none!important;}';
  document.addEventListener('DOMContentLoaded', () => document.head.appendChild(style));
})();
"#;

const MASK_WEBDRIVER_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
"#;

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    user_data_dir: PathBuf,
}

impl CdpClient {
    /// Launch a browser and prepare one page: init scripts, user agent,
    /// media emulation, network filters. `executable` carries the resolved
    /// channel binary; `None` launches the bundled engine.
    pub async fn launch(
        config: &CrawlConfig,
        executable: Option<PathBuf>,
    ) -> Result<Self, BoxError> {
        let user_data_dir = temp_user_data_dir()?;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&user_data_dir)
            .args(DEFAULT_BROWSER_ARGS.to_vec());
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = executable {
            tracing::info!("using browser executable: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        let (browser, mut handler) = Browser::launch(
            builder
                .build()
                .map_err(|e| format!("failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::debug!("browser handler error (ignoring): {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("failed to create page: {}", e))?;

        for script in [DISABLE_ANIMATIONS_SCRIPT, MASK_WEBDRIVER_SCRIPT] {
            page.execute(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(script)
                    .build()
                    .map_err(|e| format!("failed to build init script: {}", e))?,
            )
            .await
            .map_err(|e| format!("failed to install init script: {}", e))?;
        }

        page.set_user_agent(config.user_agent.as_str())
            .await
            .map_err(|e| format!("failed to set user agent: {}", e))?;

        page.execute(
            SetEmulatedMediaParams::builder()
                .features(vec![
                    MediaFeature {
                        name: "prefers-reduced-motion".to_string(),
                        value: "reduce".to_string(),
                    },
                    MediaFeature {
                        name: "prefers-color-scheme".to_string(),
                        value: config.color_scheme.as_media_value().to_string(),
                    },
                ])
                .build(),
        )
        .await
        .map_err(|e| format!("failed to emulate media: {}", e))?;

        install_network_filters(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            user_data_dir,
        })
    }

    pub async fn close(mut self) -> Result<(), BoxError> {
        self.browser
            .close()
            .await
            .map_err(|e| format!("error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("error awaiting handler: {}", e))?;
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            tracing::debug!(
                "failed to clean up user-data-dir {}: {}",
                self.user_data_dir.display(),
                e
            );
        }
        Ok(())
    }
}

/// Pause every request and drop heavy resource types plus analytics
/// endpoints before they leave the browser.
async fn install_network_filters(page: &Page) -> Result<(), BoxError> {
    let blocked_urls = Regex::new(BLOCKED_URL_PATTERN)
        .map_err(|e| format!("bad blocked-url pattern: {}", e))?;

    let mut paused_events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| format!("failed to subscribe to request events: {}", e))?;

    page.execute(
        EnableParams::builder()
            .patterns(vec![
                RequestPattern::builder().url_pattern("*").build(),
            ])
            .build(),
    )
    .await
    .map_err(|e| format!("failed to enable request interception: {}", e))?;

    let page_clone = page.clone();
    tokio::spawn(async move {
        while let Some(event) = paused_events.next().await {
            let blocked = BLOCKED_RESOURCE_TYPES.contains(&event.resource_type)
                || blocked_urls.is_match(&event.request.url);
            let request_id = event.request_id.clone();
            let outcome = if blocked {
                page_clone
                    .execute(FailRequestParams::new(request_id, ErrorReason::Aborted))
                    .await
                    .map(|_| ())
            } else {
                page_clone
                    .execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            };
            if let Err(e) = outcome {
                tracing::debug!("request interception error (ignoring): {}", e);
            }
        }
    });
    Ok(())
}

/// Executable names to probe on PATH for a named browser channel.
pub fn channel_executables(channel: &str) -> Vec<&'static str> {
    match channel.to_ascii_lowercase().as_str() {
        "msedge" | "edge" => vec!["microsoft-edge", "microsoft-edge-stable", "msedge"],
        "chrome" => vec!["google-chrome", "google-chrome-stable", "chrome"],
        "chromium" => vec!["chromium", "chromium-browser"],
        _ => vec![],
    }
}

/// Resolve a channel to a concrete executable, if one is installed.
pub fn find_channel_executable(channel: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for name in channel_executables(channel) {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn temp_user_data_dir() -> Result<PathBuf, BoxError> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("system clock error: {}", e))?
        .as_nanos();
    let unique = format!("ctcrawl-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_endpoints_are_blocked() {
        let re = Regex::new(BLOCKED_URL_PATTERN).unwrap();
        assert!(re.is_match("https://hm.BAIDU.com/hm.js"));
        assert!(re.is_match("https://cdn.example.com/analytics.js"));
        assert!(re.is_match("https://o123.ingest.sentry.io/envelope"));
        assert!(!re.is_match("https://www.ctyun.cn/pricing/ecs"));
    }

    #[test]
    fn known_channels_map_to_executable_names() {
        assert!(channel_executables("msedge").contains(&"microsoft-edge"));
        assert!(channel_executables("CHROME").contains(&"google-chrome"));
        assert!(channel_executables("lynx").is_empty());
    }
}
