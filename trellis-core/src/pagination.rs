//! Windowed list responses.
//!
//! List handlers return a [`Collection`]; the dispatcher slices it into one
//! window using the `start` and `max-results` query parameters and emits
//! `self`/`prev`/`next` links that preserve every other query parameter.
//!
//! ```
//! use trellis_core::pagination::PaginationWindow;
//!
//! let window = PaginationWindow::new(20, 10, 25, 200);
//! assert_eq!(window.item_count(), 5);
//! assert!(!window.has_next());
//! assert_eq!(window.prev_start(), Some(10));
//! ```

use crate::collection::{Collection, Object};
use crate::serializer::LinkEntry;
use crate::{Error, HttpMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Page size used when the request does not ask for one
pub const DEFAULT_MAX_RESULTS: usize = 25;

/// Largest page size a client may request
pub const MAX_RESULTS_CAP: usize = 200;

/// Query parameter holding the window offset
pub const START_PARAM: &str = "start";

/// Query parameter holding the window size
pub const MAX_RESULTS_PARAM: &str = "max-results";

/// Requested window, before the collection size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub start: usize,
    pub max_results: usize,
}

impl PageParams {
    /// Parse `start` and `max-results`.
    ///
    /// Unparseable or negative values fall back to `0` and `default_max`;
    /// the size is clamped to `cap`.
    pub fn from_query(params: &HashMap<String, String>, default_max: usize, cap: usize) -> Self {
        let start = params
            .get(START_PARAM)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let max_results = params
            .get(MAX_RESULTS_PARAM)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(default_max)
            .min(cap);

        Self { start, max_results }
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            start: 0,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// A clamped window over a collection of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationWindow {
    pub start: usize,
    pub max_results: usize,
    pub total_count: usize,
}

impl PaginationWindow {
    /// Clamp `start` to `[0, total]` and `max_results` to `[0, max_allowed]`.
    pub fn new(start: usize, max_results: usize, total_count: usize, max_allowed: usize) -> Self {
        Self {
            start: start.min(total_count),
            max_results: max_results.min(max_allowed),
            total_count,
        }
    }

    /// Exclusive end of the window.
    pub fn end(&self) -> usize {
        self.start
            .saturating_add(self.max_results)
            .min(self.total_count)
    }

    /// Number of items the window contains.
    pub fn item_count(&self) -> usize {
        self.end() - self.start
    }

    pub fn has_next(&self) -> bool {
        self.start + self.item_count() < self.total_count
    }

    pub fn has_prev(&self) -> bool {
        self.start > 0
    }

    pub fn next_start(&self) -> Option<usize> {
        self.has_next().then(|| self.end())
    }

    /// Never negative, even when the window size changed between requests.
    pub fn prev_start(&self) -> Option<usize> {
        self.has_prev()
            .then(|| self.start.saturating_sub(self.max_results))
    }
}

/// One window of a collection.
pub struct Page {
    pub items: Vec<Object>,
    pub total_count: usize,
    pub window: PaginationWindow,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("items", &self.items.len())
            .field("total_count", &self.total_count)
            .field("window", &self.window)
            .finish()
    }
}

/// Slice one window out of `collection`.
pub async fn paginate(
    collection: &dyn Collection,
    start: usize,
    max_results: usize,
    max_allowed: usize,
) -> Result<Page, Error> {
    let total_count = collection.count().await?;
    let window = PaginationWindow::new(start, max_results, total_count, max_allowed);

    let items = if window.item_count() == 0 {
        Vec::new()
    } else {
        let mut items = collection.slice(window.start, window.end()).await?;
        items.truncate(window.item_count());
        items
    };

    Ok(Page {
        items,
        total_count,
        window,
    })
}

/// Build the `self`, `prev` and `next` links of a list response.
///
/// `query` is the original request query; `start` and `max-results` are
/// rewritten and every other parameter is carried over in sorted order.
pub fn page_links(
    base_href: &str,
    query: &HashMap<String, String>,
    window: &PaginationWindow,
) -> Result<Map<String, Value>, Error> {
    let mut extra: Vec<(&str, &str)> = query
        .iter()
        .filter(|(k, _)| k.as_str() != START_PARAM && k.as_str() != MAX_RESULTS_PARAM)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    extra.sort_unstable();

    let href_for = |start: Option<usize>| -> Result<String, Error> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(start) = start {
            pairs.push((START_PARAM, start.to_string()));
            pairs.push((MAX_RESULTS_PARAM, window.max_results.to_string()));
        } else {
            for key in [START_PARAM, MAX_RESULTS_PARAM] {
                if let Some(value) = query.get(key) {
                    pairs.push((key, value.clone()));
                }
            }
        }
        pairs.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));

        if pairs.is_empty() {
            return Ok(base_href.to_string());
        }
        let qs = serde_urlencoded::to_string(&pairs)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(format!("{}?{}", base_href, qs))
    };

    let mut links = Map::new();
    links.insert(
        "self".to_string(),
        LinkEntry::new(href_for(None)?, HttpMethod::GET).to_value(),
    );
    if let Some(start) = window.prev_start() {
        links.insert(
            "prev".to_string(),
            LinkEntry::new(href_for(Some(start))?, HttpMethod::GET).to_value(),
        );
    }
    if let Some(start) = window.next_start() {
        links.insert(
            "next".to_string(),
            LinkEntry::new(href_for(Some(start))?, HttpMethod::GET).to_value(),
        );
    }
    Ok(links)
}
