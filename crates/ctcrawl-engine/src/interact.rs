//! Interaction primitives built on the resolver and waiter.
//!
//! All of these return to the caller on failure instead of panicking or
//! looping; the caller decides whether a failed click is fatal for the
//! current node.

use crate::resolver::{self, Resolved};
use crate::session::Session;
use ctcrawl_common::error::CrawlError;
use ctcrawl_common::locator::{LocatorStrategy, LogicalTarget};
use ctcrawl_common::model::OptionDescriptor;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settle interval between scrolling an element into view and clicking it.
pub const CLICK_SETTLE: Duration = Duration::from_millis(150);

/// Inner per-attempt click timeout. Deliberately shorter than the outer
/// candidate iteration so a later candidate can still succeed after an
/// earlier one times out.
pub const CLICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Try each candidate strategy in order: wait for visibility, scroll into
/// view, settle, click. Returns whether any candidate was clicked.
pub async fn click_with_fallback<S: Session + ?Sized>(
    session: &S,
    target: &LogicalTarget,
    description: &str,
    timeout: Duration,
) -> bool {
    let mut last_error: Option<CrawlError> = None;
    for strategy in &target.strategies {
        let single = LogicalTarget::new(target.name, vec![strategy.clone()]);
        let visible = match resolver::wait_visible(session, &[&single], description, timeout).await
        {
            Ok(m) => m,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };
        tokio::time::sleep(CLICK_SETTLE).await;
        match session
            .click(&visible.resolved.strategy, visible.index, CLICK_TIMEOUT)
            .await
        {
            Ok(()) => {
                info!("clicked: {}", description);
                return true;
            }
            Err(e) => {
                last_error = Some(e.into());
            }
        }
    }
    warn!(
        "click failed for {}: {}",
        description,
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no candidates".into())
    );
    false
}

/// Enumerate the options of the first candidate target that yields a
/// non-empty result set. Only currently-visible elements with non-empty
/// trimmed text survive. First-success short-circuit, not a union.
pub async fn collect_visible_options<S: Session + ?Sized>(
    session: &S,
    target: &LogicalTarget,
    description: &str,
) -> Vec<OptionDescriptor> {
    for strategy in &target.strategies {
        let count = match session.count(strategy).await {
            Ok(n) => n,
            Err(e) => {
                debug!("{}: {} query failed: {}", description, strategy.source(), e);
                continue;
            }
        };
        if count == 0 {
            continue;
        }
        let source = strategy.source();
        let mut results = Vec::new();
        for i in 0..count {
            if !session.is_visible(strategy, i).await.unwrap_or(false) {
                continue;
            }
            let text = match session.text_content(strategy, i).await {
                Ok(Some(t)) => t,
                _ => continue,
            };
            let name = text.trim();
            if name.is_empty() {
                continue;
            }
            results.push(OptionDescriptor {
                name: name.to_string(),
                strategy_source: source.clone(),
                index: i,
            });
        }
        if !results.is_empty() {
            return results;
        }
    }
    warn!("no options found for {}", description);
    Vec::new()
}

/// Re-locate a previously collected option by its strategy source + index
/// and click it.
pub async fn click_descriptor<S: Session + ?Sized>(
    session: &S,
    strategy: &LocatorStrategy,
    descriptor: &OptionDescriptor,
    description: &str,
    timeout: Duration,
) -> Result<(), CrawlError> {
    let single = LogicalTarget::new("descriptor", vec![strategy.clone()]);
    resolver::wait_visible(session, &[&single], description, timeout).await?;
    session
        .click(strategy, descriptor.index, CLICK_TIMEOUT)
        .await?;
    info!("clicked: {}", description);
    Ok(())
}

/// Open a dropdown control and resolve its option list.
///
/// If the list does not appear after the control was clicked, performs
/// exactly one retry cycle (Escape, re-open, re-search). A second failure
/// propagates instead of looping.
pub async fn open_dropdown_and_list<S: Session + ?Sized>(
    session: &S,
    open_target: &LogicalTarget,
    list_target: &LogicalTarget,
    fallback: &LocatorStrategy,
    description: &str,
    open_timeout: Duration,
    list_timeout: Duration,
    settle: Duration,
) -> Result<Resolved, CrawlError> {
    open_control(session, open_target, description, open_timeout).await?;
    tokio::time::sleep(settle).await;

    match resolve_list(session, list_target, fallback, description, list_timeout).await {
        Ok(resolved) => Ok(resolved),
        Err(_) => {
            warn!("{} did not appear, retrying once", description);
            let _ = session.press_key("Escape").await;
            tokio::time::sleep(Duration::from_millis(600)).await;
            open_control(session, open_target, description, open_timeout).await?;
            tokio::time::sleep(settle).await;
            resolve_list(session, list_target, fallback, description, list_timeout).await
        }
    }
}

async fn open_control<S: Session + ?Sized>(
    session: &S,
    target: &LogicalTarget,
    description: &str,
    timeout: Duration,
) -> Result<(), CrawlError> {
    // Each candidate gets its own full attempt, matching the control's
    // markup variants across regions.
    for strategy in &target.strategies {
        let single = LogicalTarget::new(target.name, vec![strategy.clone()]);
        if click_with_fallback(session, &single, description, timeout).await {
            return Ok(());
        }
    }
    Err(CrawlError::LocatorNotFound {
        target: description.to_string(),
        waited_ms: timeout.as_millis() as u64,
    })
}

async fn resolve_list<S: Session + ?Sized>(
    session: &S,
    list_target: &LogicalTarget,
    fallback: &LocatorStrategy,
    description: &str,
    timeout: Duration,
) -> Result<Resolved, CrawlError> {
    match resolver::wait_visible(session, &[list_target], description, timeout).await {
        Ok(m) => Ok(m.resolved),
        Err(e) => {
            let single = LogicalTarget::new("fallback", vec![fallback.clone()]);
            match resolver::wait_visible(session, &[&single], description, timeout).await {
                Ok(m) => {
                    info!("using path fallback for {}", description);
                    Ok(m.resolved)
                }
                Err(_) => Err(e),
            }
        }
    }
}
