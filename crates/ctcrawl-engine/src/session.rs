//! The rendering-session capability surface the engine is written against.
//!
//! The engine never talks to a browser directly: every query and interaction
//! goes through this trait, so backends (CDP, mocks in tests) are
//! interchangeable. Elements are addressed by `(strategy, index)` rather
//! than by live handles, which keeps descriptors reconstructible across
//! re-renders.

use async_trait::async_trait;
use ctcrawl_common::error::SessionError;
use ctcrawl_common::locator::LocatorStrategy;
use std::time::Duration;

#[async_trait]
pub trait Session: Send + Sync {
    /// Start the rendering session (launch browser, open page, install
    /// network filters).
    async fn launch(&mut self) -> Result<(), SessionError>;

    /// Close the session and release resources.
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Navigate the page and wait for the DOM to be ready.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError>;

    /// Number of elements currently matching the strategy.
    async fn count(&self, strategy: &LocatorStrategy) -> Result<usize, SessionError>;

    /// Visibility of the `index`-th match. Out-of-range indices are not
    /// an error; they report invisible.
    async fn is_visible(&self, strategy: &LocatorStrategy, index: usize)
    -> Result<bool, SessionError>;

    /// Text content of the `index`-th match, untrimmed.
    async fn text_content(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
    ) -> Result<Option<String>, SessionError>;

    /// Scroll the `index`-th match into view and click it, bounded by
    /// `timeout`.
    async fn click(
        &self,
        strategy: &LocatorStrategy,
        index: usize,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Dispatch a key press to the page (Escape dismisses open overlays).
    async fn press_key(&self, key: &str) -> Result<(), SessionError>;

    /// Diagnostic enumeration of currently open dropdown panels. Side
    /// channel only; never part of control flow.
    async fn dropdown_panel_debug(&self) -> Result<serde_json::Value, SessionError> {
        Ok(serde_json::Value::Null)
    }
}
