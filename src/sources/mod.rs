//! Content source plugins.
//!
//! This module defines the [`Source`] trait implemented by every encyclopedia
//! backend. The server ships with [`WikipediaSource`]; [`MockSource`] returns
//! canned data for tests.
//!
//! A source has no internal state beyond its HTTP client: every call is an
//! independent outbound request. Sources never retry and never cache.

mod mock;
mod wikipedia;

pub use mock::{make_hits, MockSource};
pub use wikipedia::WikipediaSource;

use async_trait::async_trait;

use crate::models::{SearchHit, Summary};

/// The Source trait defines the interface for all content sources.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Keyword search scoped to a language. Hits keep the upstream relevance
    /// order; no match yields an empty vector.
    async fn search(&self, query: &str, lang: &str) -> Result<Vec<SearchHit>, SourceError>;

    /// Fetch the summary of an article by its exact title
    async fn summarize(&self, title: &str, lang: &str) -> Result<Summary, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The upstream answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Upstream { status: u16, url: String },

    /// The upstream could not be reached
    #[error("Network error: {0}")]
    Transport(String),

    /// The upstream answered with a body we could not decode
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request could not be built (bad base URL or language code)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// Whether the failure happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Transport(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
