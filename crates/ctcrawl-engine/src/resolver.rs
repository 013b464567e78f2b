//! Strategy resolution and visibility polling.
//!
//! The page mutates asynchronously (open/close animations, lazy list
//! population), so a single resolution attempt is unreliable. Both entry
//! points here poll: strategies are tried strictly in declaration order on
//! every pass, and resolution stops at the first strategy producing at
//! least one match. Matches are never merged across strategies.

use crate::session::Session;
use ctcrawl_common::error::CrawlError;
use ctcrawl_common::locator::{LocatorStrategy, LogicalTarget};
use std::time::Duration;
use tokio::time::Instant;

pub const POLL_INTERVAL: Duration = Duration::from_millis(120);
pub const DEFAULT_WAIT: Duration = Duration::from_secs(6);

/// A strategy that produced at least one match, paired with its stable
/// source string.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub strategy: LocatorStrategy,
    pub source: String,
}

impl Resolved {
    fn new(strategy: &LocatorStrategy) -> Self {
        Self {
            strategy: strategy.clone(),
            source: strategy.source(),
        }
    }
}

/// Resolve the first strategy of `target` that yields at least one element.
///
/// Read-only: no side effects beyond element queries. Signals
/// [`CrawlError::LocatorNotFound`] once the deadline elapses.
pub async fn resolve_first<S: Session + ?Sized>(
    session: &S,
    target: &LogicalTarget,
    timeout: Duration,
) -> Result<Resolved, CrawlError> {
    let deadline = Instant::now() + timeout;
    loop {
        for strategy in &target.strategies {
            match session.count(strategy).await {
                Ok(n) if n > 0 => return Ok(Resolved::new(strategy)),
                Ok(_) => {}
                // A strategy the page rejects (bad selector variant) is
                // treated as a miss; later strategies still get their turn.
                Err(e) => tracing::debug!("{}: strategy {} failed: {}", target.name, strategy.source(), e),
            }
        }
        if Instant::now() >= deadline {
            return Err(CrawlError::LocatorNotFound {
                target: target.name.to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A visible element: the winning strategy plus the index of the first
/// visible match under it.
#[derive(Debug, Clone)]
pub struct VisibleMatch {
    pub resolved: Resolved,
    pub index: usize,
}

/// Poll a set of candidate targets until one yields a visible element or
/// the deadline elapses.
///
/// Candidates are re-resolved on every pass, which absorbs render latency
/// without fixed sleeps. Signals [`CrawlError::NotFoundTimeout`] on
/// deadline.
pub async fn wait_visible<S: Session + ?Sized>(
    session: &S,
    candidates: &[&LogicalTarget],
    description: &str,
    timeout: Duration,
) -> Result<VisibleMatch, CrawlError> {
    let deadline = Instant::now() + timeout;
    loop {
        for target in candidates {
            for strategy in &target.strategies {
                let count = match session.count(strategy).await {
                    Ok(n) => n,
                    Err(_) => continue,
                };
                if count == 0 {
                    continue;
                }
                for i in 0..count {
                    if session.is_visible(strategy, i).await.unwrap_or(false) {
                        return Ok(VisibleMatch {
                            resolved: Resolved::new(strategy),
                            index: i,
                        });
                    }
                }
                // First strategy with matches wins the pass even if none
                // are visible yet; the next pass re-checks from the top.
                break;
            }
        }
        if Instant::now() >= deadline {
            return Err(CrawlError::NotFoundTimeout {
                target: description.to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
