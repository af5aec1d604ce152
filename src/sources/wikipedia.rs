//! Wikipedia content source.
//!
//! Keyword search uses the MediaWiki action API
//! (`/w/api.php?action=query&list=search`), summaries use the Wikimedia REST
//! API (`/api/rest_v1/page/summary/{title}`). Both live on the
//! language-coded subdomain, e.g. `https://de.wikipedia.org`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use crate::config::WikiConfig;
use crate::models::{SearchHit, Summary};
use crate::sources::{Source, SourceError};
use crate::utils::HttpClient;

/// Wikipedia search and summary source
#[derive(Debug, Clone)]
pub struct WikipediaSource {
    client: HttpClient,
    api_base: String,
}

impl WikipediaSource {
    /// Create a source from configuration
    pub fn new(config: &WikiConfig) -> Result<Self, SourceError> {
        let client = HttpClient::with_options(&config.user_agent, config.request_timeout())
            .map_err(|e| SourceError::InvalidRequest(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.api_base.clone()))
    }

    /// Create a source with an existing client and base URL template.
    ///
    /// `{lang}` in `api_base` is replaced with the language of each request;
    /// a base without the placeholder is used as-is.
    pub fn with_client(client: HttpClient, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    fn base_url(&self, lang: &str) -> Result<Url, SourceError> {
        if !is_valid_lang(lang) {
            return Err(SourceError::InvalidRequest(format!(
                "invalid language code '{}'",
                lang
            )));
        }

        let raw = self.api_base.replace("{lang}", lang);
        Url::parse(&raw).map_err(|e| SourceError::InvalidRequest(format!("{}: {}", raw, e)))
    }

    /// Build the keyword search URL
    fn search_url(&self, query: &str, lang: &str) -> Result<Url, SourceError> {
        let mut url = self.base_url(lang)?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidRequest("base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(["w", "api.php"]);
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("list", "search")
            .append_pair("srsearch", query)
            .append_pair("format", "json");
        Ok(url)
    }

    /// Build the summary URL; the title is percent-encoded as one segment
    fn summary_url(&self, title: &str, lang: &str) -> Result<Url, SourceError> {
        let mut url = self.base_url(lang)?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidRequest("base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(["api", "rest_v1", "page", "summary", title]);
        Ok(url)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        tracing::debug!(url = %url, "Fetching from Wikipedia");

        let response = self
            .client
            .client()
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Transport(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Upstream {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON from {}: {}", url, e)))
    }
}

#[async_trait]
impl Source for WikipediaSource {
    async fn search(&self, query: &str, lang: &str) -> Result<Vec<SearchHit>, SourceError> {
        let url = self.search_url(query, lang)?;
        let data: SearchApiResponse = self.fetch(url).await?;

        Ok(data.query.map(|q| q.search).unwrap_or_default())
    }

    async fn summarize(&self, title: &str, lang: &str) -> Result<Summary, SourceError> {
        let url = self.summary_url(title, lang)?;
        let data: SummaryApiResponse = self.fetch(url).await?;

        let mut summary = Summary::new(data.title.unwrap_or_else(|| title.to_string()), data.extract);
        if let Some(description) = data.description {
            summary = summary.description(description);
        }
        if let Some(page) = data
            .content_urls
            .and_then(|urls| urls.desktop)
            .and_then(|desktop| desktop.page)
        {
            summary = summary.url(page);
        }

        Ok(summary)
    }
}

/// Language codes are subdomains: ASCII letters, digits and dashes only
fn is_valid_lang(lang: &str) -> bool {
    !lang.is_empty()
        && lang.len() <= 32
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// ========== UPSTREAM RESPONSE TYPES ==========

#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    #[serde(default)]
    query: Option<SearchApiQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchApiQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SummaryApiResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    #[serde(default)]
    desktop: Option<PageUrls>,
}

#[derive(Debug, Deserialize)]
struct PageUrls {
    #[serde(default)]
    page: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const TEST_UA: &str = "wiki-lookup-test/1.0";

    fn source_for(base: String) -> WikipediaSource {
        WikipediaSource::with_client(HttpClient::with_user_agent(TEST_UA).unwrap(), base)
    }

    fn live_source() -> WikipediaSource {
        WikipediaSource::new(&WikiConfig::default()).unwrap()
    }

    #[test]
    fn test_search_url_uses_language_subdomain() {
        let source = live_source();
        let url = source.search_url("Albert Einstein", "de").unwrap();
        assert_eq!(url.host_str(), Some("de.wikipedia.org"));
        assert_eq!(url.path(), "/w/api.php");
        assert!(url.query().unwrap().contains("srsearch=Albert+Einstein"));
        assert!(url.query().unwrap().contains("list=search"));
    }

    #[test]
    fn test_summary_url_encodes_title() {
        let source = live_source();
        let url = source.summary_url("AC/DC Live", "en").unwrap();
        assert_eq!(url.host_str(), Some("en.wikipedia.org"));
        assert_eq!(url.path(), "/api/rest_v1/page/summary/AC%2FDC%20Live");
    }

    #[test]
    fn test_invalid_language_rejected() {
        let source = live_source();
        let err = source.search_url("x", "evil.com/").unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
        assert!(source.search_url("x", "").is_err());
        assert!(source.search_url("x", "zh-yue").is_ok());
    }

    #[tokio::test]
    async fn test_search_parses_hits_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "query".into()),
                Matcher::UrlEncoded("list".into(), "search".into()),
                Matcher::UrlEncoded("srsearch".into(), "Einstein".into()),
                Matcher::UrlEncoded("format".into(), "json".into()),
            ]))
            .match_header("user-agent", TEST_UA)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[
                    {"ns":0,"title":"Albert Einstein","pageid":1278360,"snippet":"<span class=\"searchmatch\">Einstein</span>"},
                    {"ns":0,"title":"Einstein-Gleichung","pageid":99,"snippet":"Feldgleichung"}
                ]}}"#,
            )
            .create_async()
            .await;

        let hits = source_for(server.url()).search("Einstein", "de").await.unwrap();

        mock.assert_async().await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Albert Einstein");
        assert_eq!(hits[0].page_id, 1278360);
        assert_eq!(hits[1].title, "Einstein-Gleichung");
    }

    #[tokio::test]
    async fn test_search_without_matches_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":0},"search":[]}}"#)
            .create_async()
            .await;

        let hits = source_for(server.url()).search("zzzxxxqqqnotreal", "de").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_missing_query_member_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":{"code":"nosrsearch"}}"#)
            .create_async()
            .await;

        let hits = source_for(server.url()).search("", "de").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_non_success_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = source_for(server.url()).search("x", "de").await.unwrap_err();
        assert!(matches!(err, SourceError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_summary_parses_extract_and_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                Matcher::Regex(r"^/api/rest_v1/page/summary/Albert%20Einstein$".to_string()),
            )
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(
                r#"{"type":"standard","title":"Albert Einstein",
                    "description":"theoretischer Physiker",
                    "extract":"Albert Einstein war ein Physiker.",
                    "content_urls":{"desktop":{"page":"https://de.wikipedia.org/wiki/Albert_Einstein"}}}"#,
            )
            .create_async()
            .await;

        let summary = source_for(server.url())
            .summarize("Albert Einstein", "de")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(summary.title, "Albert Einstein");
        assert_eq!(summary.extract.as_deref(), Some("Albert Einstein war ein Physiker."));
        assert_eq!(summary.description.as_deref(), Some("theoretischer Physiker"));
        assert_eq!(
            summary.url.as_deref(),
            Some("https://de.wikipedia.org/wiki/Albert_Einstein")
        );
    }

    #[tokio::test]
    async fn test_summary_without_extract() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/rest_v1/page/summary/".to_string()))
            .with_status(200)
            .with_body(r#"{"type":"no-extract"}"#)
            .create_async()
            .await;

        let summary = source_for(server.url()).summarize("Leer", "de").await.unwrap();
        assert_eq!(summary.title, "Leer");
        assert!(summary.extract.is_none());
    }

    #[tokio::test]
    async fn test_summary_not_found_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/rest_v1/page/summary/".to_string()))
            .with_status(404)
            .create_async()
            .await;

        let err = source_for(server.url()).summarize("Nope", "de").await.unwrap_err();
        assert!(matches!(err, SourceError::Upstream { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let source = source_for("http://127.0.0.1:1".to_string());
        let err = source.search("x", "de").await.unwrap_err();
        assert!(err.is_transport());
    }
}
