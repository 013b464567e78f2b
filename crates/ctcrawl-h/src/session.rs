//! `Session` implementation over CDP.
//!
//! Element queries go through a JS helper injected into the page; every
//! evaluation carries a hard timeout (dialogs block the JS thread) and is
//! retried when the execution context is torn down mid-navigation.

use crate::cdp::{CdpClient, find_channel_executable};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use ctcrawl_common::error::SessionError;
use ctcrawl_common::locator::{LocatorStrategy, StrategyKind};
use ctcrawl_engine::config::CrawlConfig;
use ctcrawl_engine::session::Session;
use serde_json::json;
use std::time::Duration;

const HELPER_JS: &str = include_str!("locator.js");

/// Hard ceiling per JS evaluation.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_CONTEXT_RETRIES: u32 = 10;
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

pub struct CdpSession {
    config: CrawlConfig,
    client: Option<CdpClient>,
}

impl CdpSession {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(SessionError::NotReady)
    }

    async fn eval(&self, expression: &str) -> Result<serde_json::Value, SessionError> {
        let page = self.page()?;
        for _attempt in 0..MAX_CONTEXT_RETRIES {
            ensure_helper(page).await?;
            let evaluated =
                tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;
            match evaluated {
                Err(_) => {
                    return Err(SessionError::Query(
                        "evaluation timed out, possibly blocked by a dialog".into(),
                    ));
                }
                Ok(Err(e)) => {
                    let err = e.to_string();
                    if is_context_error(&err) {
                        tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                        continue;
                    }
                    return Err(SessionError::Query(err));
                }
                Ok(Ok(remote)) => {
                    return remote
                        .into_value::<serde_json::Value>()
                        .map_err(|e| SessionError::Query(e.to_string()));
                }
            }
        }
        Err(SessionError::Query(
            "page context kept vanishing during evaluation".into(),
        ))
    }

    fn call(&self, method: &str, strategy: &LocatorStrategy, index: Option<usize>) -> String {
        let kind = match strategy.kind {
            StrategyKind::Css => "css",
            StrategyKind::XPath => "xpath",
        };
        let mut args = vec![
            json!(kind).to_string(),
            json!(&strategy.selector).to_string(),
            json!(&strategy.has_text).to_string(),
            json!(&strategy.nth).to_string(),
        ];
        if let Some(i) = index {
            args.push(i.to_string());
        }
        format!("window.__ctcrawl.{}({})", method, args.join(", "))
    }
}

async fn ensure_helper(page: &Page) -> Result<(), SessionError> {
    let loaded: bool = page
        .evaluate("typeof window.__ctcrawl !== 'undefined'")
        .await
        .map_err(|e| SessionError::Query(e.to_string()))?
        .into_value()
        .map_err(|e| SessionError::Query(e.to_string()))?;
    if !loaded {
        page.evaluate(HELPER_JS)
            .await
            .map_err(|e| SessionError::Query(format!("helper injection failed: {}", e)))?;
    }
    Ok(())
}

#[async_trait]
impl Session for CdpSession {
    async fn launch(&mut self) -> Result<(), SessionError> {
        if let Some(capture) = &self.config.replay_capture {
            tracing::warn!(
                "capture replay requested ({}) but is unavailable over CDP; using live network",
                capture.display()
            );
        }

        let channel_exe = self
            .config
            .browser_channel
            .as_deref()
            .and_then(find_channel_executable);
        let preferred = channel_exe.is_some();

        let client = match CdpClient::launch(&self.config, channel_exe).await {
            Ok(client) => client,
            Err(e) if preferred => {
                // One fallback to the bundled engine before giving up.
                tracing::warn!("channel launch failed ({}), falling back to default engine", e);
                CdpClient::launch(&self.config, None)
                    .await
                    .map_err(|e| SessionError::Launch(e.to_string()))?
            }
            Err(e) => return Err(SessionError::Launch(e.to_string())),
        };
        self.client = Some(client);
        tracing::info!(
            "browser ready (headless={}, slow_mo={:?})",
            self.config.headless,
            self.config.slow_mo
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| SessionError::Interaction(e.to_string()))?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        let page = self.page()?;
        tracing::info!("navigating to {}", url);
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| SessionError::Navigation(format!("navigation to {} timed out", url)))?
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn count(&self, strategy: &LocatorStrategy) -> Result<usize, SessionError> {
        let value = self.eval(&self.call("count", strategy, None)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
    ) -> Result<bool, SessionError> {
        let value = self
            .eval(&self.call("visible", strategy, Some(index)))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
    ) -> Result<Option<String>, SessionError> {
        let value = self.eval(&self.call("text", strategy, Some(index))).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        if !self.config.slow_mo.is_zero() {
            tokio::time::sleep(self.config.slow_mo).await;
        }
        let expression = self.call("click", strategy, Some(index));
        let value = tokio::time::timeout(timeout, self.eval(&expression))
            .await
            .map_err(|_| {
                SessionError::Interaction(format!("click timed out: {}", strategy.source()))
            })??;
        if value.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(SessionError::Interaction(format!(
                "nothing to click at {}[{}]",
                strategy.source(),
                index
            )))
        }
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        let page = self.page()?;
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let event = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key)
                .build()
                .map_err(|e| SessionError::Interaction(format!("bad key event: {:?}", e)))?;
            page.execute(event)
                .await
                .map_err(|e| SessionError::Interaction(e.to_string()))?;
        }
        Ok(())
    }

    async fn dropdown_panel_debug(&self) -> Result<serde_json::Value, SessionError> {
        self.eval("window.__ctcrawl.dropdownDebug()").await
    }
}
