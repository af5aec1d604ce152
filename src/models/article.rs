//! Article models returned by a content source.

use serde::{Deserialize, Serialize};

/// A single keyword-search hit, in upstream relevance order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Article title
    pub title: String,

    /// Upstream page identifier
    #[serde(rename = "pageid")]
    pub page_id: u64,

    /// Highlighted excerpt, may contain markup
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    /// Create a new search hit
    pub fn new(title: impl Into<String>, page_id: u64, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_id,
            snippet: snippet.into(),
        }
    }
}

/// The summary of a single article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Article title
    pub title: String,

    /// Plain-text lead extract. `None` when the upstream had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,

    /// Short description (e.g. "German-born theoretical physicist")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Canonical article URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Summary {
    /// Create a summary with only a title and an optional extract
    pub fn new(title: impl Into<String>, extract: Option<String>) -> Self {
        Self {
            title: title.into(),
            extract: extract.filter(|e| !e.trim().is_empty()),
            description: None,
            url: None,
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the canonical URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// The extract, or `fallback` when the article has none
    pub fn extract_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.extract.as_deref().unwrap_or(fallback)
    }
}
