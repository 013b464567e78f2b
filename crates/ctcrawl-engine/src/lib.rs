pub mod cache;
pub mod config;
pub mod extract;
pub mod interact;
pub mod output;
pub mod report;
pub mod resolver;
pub mod session;
pub mod targets;
pub mod traversal;

pub use ctcrawl_common::error::{CrawlError, SessionError};
pub use ctcrawl_common::locator;
pub use ctcrawl_common::model;
