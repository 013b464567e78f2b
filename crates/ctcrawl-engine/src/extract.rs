//! Option-list extraction and normalization.

use crate::resolver::Resolved;
use crate::session::Session;
use ctcrawl_common::error::CrawlError;

/// Provenance marker for one extracted entry: a reconstructible description
/// of where in the list it was found. 1-based positions; falls back to a
/// raw index when the strategy source carries no reconstructible path.
pub fn format_option_path(source: &str, index: usize) -> String {
    let position = index + 1;
    if source.is_empty() {
        return format!("index:{}", position);
    }
    if let Some(xpath) = source.strip_prefix("xpath=") {
        return format!("{}/li[{}]", xpath, position);
    }
    if source.starts_with("css=") {
        return format!("{} >> li:nth-of-type({})", source, position);
    }
    format!("{} -> li[{}]", source, position)
}

/// Enumerate the `li` children of a resolved dropdown list: trim, drop
/// empties, annotate each survivor with its provenance marker. Returned
/// order matches DOM order; no independent sorting.
///
/// An empty result after a successful dropdown open is an
/// [`CrawlError::EmptyOptionSet`], distinct from the locator failure of a
/// missing dropdown.
pub async fn extract_options<S: Session + ?Sized>(
    session: &S,
    list: &Resolved,
    description: &str,
) -> Result<Vec<String>, CrawlError> {
    let items = list.strategy.child_items();
    let count = session.count(&items).await?;
    let mut results = Vec::new();
    for i in 0..count {
        let text = match session.text_content(&items, i).await {
            Ok(Some(t)) => t,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("{}: entry {} unreadable: {}", description, i, e);
                continue;
            }
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        results.push(format!("{} {}", trimmed, format_option_path(&list.source, i)));
    }
    if results.is_empty() {
        return Err(CrawlError::EmptyOptionSet(description.to_string()));
    }
    tracing::info!("{}: {} entries", description, results.len());
    Ok(results)
}

/// Replace filesystem-reserved characters in a hierarchy name so it can be
/// used as a path segment.
pub fn sanitize_name(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "未命名".to_string()
    } else {
        trimmed.to_string()
    }
}
