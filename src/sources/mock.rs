//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::models::{SearchHit, Summary};
use crate::sources::{Source, SourceError};

#[derive(Debug, Default)]
struct MockState {
    hits: HashMap<String, Vec<SearchHit>>,
    summaries: HashMap<String, Summary>,
    search_error: Option<SourceError>,
    summary_error: Option<SourceError>,
    delay: Option<Duration>,
    searches: Vec<(String, String)>,
    summarized: Vec<(String, String)>,
}

/// A mock source for testing that returns predefined responses.
///
/// Unknown queries return no hits; unknown titles return a summary without
/// an extract. Every call is recorded.
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<MockState>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the hits returned for a query.
    pub fn with_hits(self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.state().hits.insert(query.to_string(), hits);
        self
    }

    /// Set the summary returned for a title.
    pub fn with_summary(self, summary: Summary) -> Self {
        self.state().summaries.insert(summary.title.clone(), summary);
        self
    }

    /// Make every search fail with the given error.
    pub fn fail_search(self, error: SourceError) -> Self {
        self.state().search_error = Some(error);
        self
    }

    /// Make every summary fetch fail with the given error.
    pub fn fail_summary(self, error: SourceError) -> Self {
        self.state().summary_error = Some(error);
        self
    }

    /// Delay every call, to simulate a slow upstream.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state().delay = Some(delay);
        self
    }

    /// Recorded `(query, lang)` search calls.
    pub fn searches(&self) -> Vec<(String, String)> {
        self.state().searches.clone()
    }

    /// Recorded `(title, lang)` summary calls.
    pub fn summarized(&self) -> Vec<(String, String)> {
        self.state().summarized.clone()
    }

    fn delay(&self) -> Option<Duration> {
        self.state().delay
    }
}

#[async_trait]
impl Source for MockSource {
    async fn search(&self, query: &str, lang: &str) -> Result<Vec<SearchHit>, SourceError> {
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.searches.push((query.to_string(), lang.to_string()));

        if let Some(err) = &state.search_error {
            return Err(err.clone());
        }

        Ok(state.hits.get(query).cloned().unwrap_or_default())
    }

    async fn summarize(&self, title: &str, lang: &str) -> Result<Summary, SourceError> {
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.summarized.push((title.to_string(), lang.to_string()));

        if let Some(err) = &state.summary_error {
            return Err(err.clone());
        }

        Ok(state
            .summaries
            .get(title)
            .cloned()
            .unwrap_or_else(|| Summary::new(title, None)))
    }
}

/// Helper function to create numbered mock hits for testing.
///
/// The first hit is titled `first_title`; the rest are `"<first_title> (n)"`.
pub fn make_hits(first_title: &str, count: usize) -> Vec<SearchHit> {
    (0..count)
        .map(|i| {
            let title = if i == 0 {
                first_title.to_string()
            } else {
                format!("{} ({})", first_title, i)
            };
            SearchHit::new(title, 1000 + i as u64, format!("snippet {}", i))
        })
        .collect()
}
