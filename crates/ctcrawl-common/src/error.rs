//! Error taxonomy for the crawl.
//!
//! Only two classes are fatal to a run: a session that cannot launch and an
//! empty top-level province enumeration. Everything else is caught at the
//! boundary that owns the corresponding hierarchy node, logged, counted,
//! and the run continues.

use thiserror::Error;

/// Errors crossing the rendering-session boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element query failed: {0}")]
    Query(String),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("session not ready")]
    NotReady,
}

#[derive(Debug, Error)]
pub enum CrawlError {
    /// No strategy of a logical target matched within the deadline.
    #[error("no strategy matched {target} within {waited_ms}ms")]
    LocatorNotFound { target: String, waited_ms: u64 },

    /// No candidate yielded a visible element before the deadline.
    #[error("no visible match for {target} within {waited_ms}ms")]
    NotFoundTimeout { target: String, waited_ms: u64 },

    /// An enumeration returned zero items where at least one was required.
    #[error("empty selection: {0}")]
    EmptySelection(String),

    /// A dropdown opened but contained no usable entries.
    #[error("empty option set: {0}")]
    EmptyOptionSet(String),

    /// The rendering engine could not start, even after falling back to the
    /// default engine. Fatal.
    #[error("session launch failed: {0}")]
    SessionLaunch(String),

    /// Top-level enumeration came back empty. Fatal.
    #[error("no provinces discovered")]
    NoProvincesDiscovered,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    /// Whether this error terminates the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CrawlError::SessionLaunch(_) | CrawlError::NoProvincesDiscovered
        )
    }
}
