//! Lookup result models.

use serde::{Deserialize, Serialize};

use super::{SearchHit, Summary};

/// Title and page id of the most relevant hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopHit {
    pub title: String,

    #[serde(rename = "pageid")]
    pub page_id: u64,
}

impl From<&SearchHit> for TopHit {
    fn from(hit: &SearchHit) -> Self {
        Self {
            title: hit.title.clone(),
            page_id: hit.page_id,
        }
    }
}

/// Machine-readable part of a successful lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupStructured {
    /// Language the lookup ran against
    pub lang: String,

    /// The query exactly as supplied
    pub query: String,

    /// Always the first entry of `hits`
    pub top_hit: TopHit,

    /// Truncated hits in upstream order
    pub hits: Vec<SearchHit>,

    /// Summary of the top hit
    pub summary: Summary,
}

/// Outcome of a search-then-summarize lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    /// Text shown or spoken to the user
    pub primary_text: String,

    /// Absent when nothing was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<LookupStructured>,
}

impl LookupResult {
    /// A result that carries only text
    pub fn text_only(primary_text: impl Into<String>) -> Self {
        Self {
            primary_text: primary_text.into(),
            structured: None,
        }
    }

    /// Whether the lookup found an article
    pub fn is_found(&self) -> bool {
        self.structured.is_some()
    }
}
