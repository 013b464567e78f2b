//! Locator strategies: plain-data descriptions of how to find an element.
//!
//! A strategy is immutable and declared per logical target. Resolution is
//! first-match-wins over an ordered list, so adding a new strategy never
//! requires touching resolver logic.

use serde::{Deserialize, Serialize};

/// How the selector string should be interpreted by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// A structural CSS selector resolved via `querySelectorAll`.
    Css,
    /// An absolute or relative XPath resolved via `document.evaluate`.
    XPath,
}

/// One way of locating an element on the rendered page.
///
/// `has_text` narrows the match set to elements whose trimmed text contains
/// the given substring. `nth` pins the match to a single positional element,
/// which keeps the rendered strategy source reconstructible later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub kind: StrategyKind,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl LocatorStrategy {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Css,
            selector: selector.into(),
            has_text: None,
            nth: None,
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::XPath,
            selector: selector.into(),
            has_text: None,
            nth: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Stable strategy-source string used to reconstruct an element's
    /// position later (stored in [`crate::model::OptionDescriptor`]).
    pub fn source(&self) -> String {
        let prefix = match self.kind {
            StrategyKind::Css => "css",
            StrategyKind::XPath => "xpath",
        };
        let mut out = format!("{}={}", prefix, self.selector);
        if let Some(text) = &self.has_text {
            out.push_str(&format!("::has-text({})", text));
        }
        if let Some(nth) = self.nth {
            out.push_str(&format!("::nth({})", nth));
        }
        out
    }

    /// Rebuild a strategy from its rendered source string. Inverse of
    /// [`Self::source`]; descriptors are re-located this way instead of
    /// caching live handles.
    pub fn parse(source: &str) -> Option<Self> {
        let mut rest = source;
        let mut nth = None;
        let mut has_text = None;

        if let Some(pos) = rest.rfind("::nth(")
            && rest.ends_with(')')
        {
            let inner = &rest[pos + 6..rest.len() - 1];
            if let Ok(n) = inner.parse() {
                nth = Some(n);
                rest = &rest[..pos];
            }
        }
        if let Some(pos) = rest.rfind("::has-text(")
            && rest.ends_with(')')
        {
            has_text = Some(rest[pos + 11..rest.len() - 1].to_string());
            rest = &rest[..pos];
        }

        let (kind, selector) = if let Some(sel) = rest.strip_prefix("css=") {
            (StrategyKind::Css, sel)
        } else if let Some(sel) = rest.strip_prefix("xpath=") {
            (StrategyKind::XPath, sel)
        } else {
            return None;
        };

        Some(Self {
            kind,
            selector: selector.to_string(),
            has_text,
            nth,
        })
    }

    /// Strategy addressing the `li` entries of a resolved dropdown list.
    pub fn child_items(&self) -> LocatorStrategy {
        match self.kind {
            StrategyKind::Css => LocatorStrategy::css(format!("{} li", self.selector)),
            StrategyKind::XPath => LocatorStrategy::xpath(format!("{}/li", self.selector)),
        }
    }
}

/// A named UI concept with an ordered fallback list of location strategies,
/// most specific first, generic structural fallback last.
#[derive(Debug, Clone)]
pub struct LogicalTarget {
    pub name: &'static str,
    pub strategies: Vec<LocatorStrategy>,
}

impl LogicalTarget {
    pub fn new(name: &'static str, strategies: Vec<LocatorStrategy>) -> Self {
        Self { name, strategies }
    }
}
