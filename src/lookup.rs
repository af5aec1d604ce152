//! Search-then-summarize lookup.
//!
//! [`LookupService::lookup`] runs a keyword search, keeps the first `topK`
//! hits in upstream order and summarizes the top one. Finding nothing is a
//! normal outcome with a fixed German message; upstream failures are returned
//! to the caller untouched.

use std::sync::Arc;

use crate::models::{LookupResult, LookupStructured, TopHit};
use crate::sources::{Source, SourceError};

/// Number of hits kept when the caller does not ask for a specific amount
pub const DEFAULT_TOP_K: usize = 5;

/// Smallest accepted `topK`
pub const MIN_TOP_K: usize = 1;

/// Largest accepted `topK`
pub const MAX_TOP_K: usize = 10;

/// Resolve a caller-supplied `topK` into `[MIN_TOP_K, MAX_TOP_K]`.
///
/// `None` (absent or not an integer) becomes [`DEFAULT_TOP_K`]; integers are
/// clamped to the nearest bound.
pub fn clamp_top_k(top_k: Option<i64>) -> usize {
    match top_k {
        None => DEFAULT_TOP_K,
        Some(k) => k.clamp(MIN_TOP_K as i64, MAX_TOP_K as i64) as usize,
    }
}

/// Text returned when the search has no hits
pub fn not_found_text(query: &str, lang: &str) -> String {
    format!("Kein Wikipedia-Artikel gefunden zu \"{}\" ({}).", query, lang)
}

/// Text returned when the top hit has no extract
pub fn no_summary_text(title: &str) -> String {
    format!("Keine Summary für {}.", title)
}

/// Runs lookups against a content source
#[derive(Debug, Clone)]
pub struct LookupService {
    source: Arc<dyn Source>,
    default_lang: String,
}

impl LookupService {
    /// Create a lookup service with a process-wide default language
    pub fn new(source: Arc<dyn Source>, default_lang: impl Into<String>) -> Self {
        Self {
            source,
            default_lang: default_lang.into(),
        }
    }

    /// The underlying content source
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// Trimmed caller language, or the default when absent or blank
    pub fn resolve_lang(&self, lang: Option<&str>) -> String {
        lang.map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_lang)
            .to_string()
    }

    /// Search for `query`, then summarize the most relevant hit.
    pub async fn lookup(
        &self,
        query: &str,
        top_k: Option<i64>,
        lang: Option<&str>,
    ) -> Result<LookupResult, SourceError> {
        let lang = self.resolve_lang(lang);
        let top_k = clamp_top_k(top_k);

        let mut hits = self.source.search(query, &lang).await?;
        hits.truncate(top_k);

        let Some(first) = hits.first() else {
            tracing::debug!(query, lang = %lang, "Lookup found no articles");
            return Ok(LookupResult::text_only(not_found_text(query, &lang)));
        };
        let top_hit = TopHit::from(first);

        let summary = self.source.summarize(&top_hit.title, &lang).await?;
        let primary_text = match &summary.extract {
            Some(extract) => extract.clone(),
            None => no_summary_text(&top_hit.title),
        };

        tracing::debug!(
            query,
            lang = %lang,
            hits = hits.len(),
            top_hit = %top_hit.title,
            "Lookup complete"
        );

        Ok(LookupResult {
            primary_text,
            structured: Some(LookupStructured {
                lang,
                query: query.to_string(),
                top_hit,
                hits,
                summary,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchHit, Summary};
    use crate::sources::{make_hits, MockSource};

    fn einstein_source() -> MockSource {
        MockSource::new()
            .with_hits("Albert Einstein", make_hits("Albert Einstein", 5))
            .with_summary(Summary::new(
                "Albert Einstein",
                Some("Albert Einstein war ein theoretischer Physiker.".to_string()),
            ))
    }

    #[test]
    fn test_clamp_top_k() {
        assert_eq!(clamp_top_k(None), 5);
        assert_eq!(clamp_top_k(Some(3)), 3);
        assert_eq!(clamp_top_k(Some(1)), 1);
        assert_eq!(clamp_top_k(Some(10)), 10);
        assert_eq!(clamp_top_k(Some(0)), 1);
        assert_eq!(clamp_top_k(Some(-7)), 1);
        assert_eq!(clamp_top_k(Some(11)), 10);
        assert_eq!(clamp_top_k(Some(i64::MAX)), 10);
        assert_eq!(clamp_top_k(Some(i64::MIN)), 1);
    }

    #[test]
    fn test_clamp_top_k_always_in_range() {
        for k in -50..=50 {
            let clamped = clamp_top_k(Some(k));
            assert!((MIN_TOP_K..=MAX_TOP_K).contains(&clamped), "k={}", k);
            if (1..=10).contains(&k) {
                assert_eq!(clamped, k as usize);
            }
        }
    }

    #[tokio::test]
    async fn test_lookup_truncates_and_summarizes_top_hit() {
        let source = Arc::new(einstein_source());
        let service = LookupService::new(source.clone(), "en");

        let result = service
            .lookup("Albert Einstein", Some(3), Some("de"))
            .await
            .unwrap();

        assert_eq!(
            result.primary_text,
            "Albert Einstein war ein theoretischer Physiker."
        );
        let structured = result.structured.unwrap();
        assert_eq!(structured.lang, "de");
        assert_eq!(structured.query, "Albert Einstein");
        assert_eq!(structured.hits.len(), 3);
        assert_eq!(structured.top_hit.title, "Albert Einstein");
        assert_eq!(structured.top_hit.page_id, structured.hits[0].page_id);
        assert_eq!(structured.summary.title, "Albert Einstein");

        assert_eq!(
            source.summarized(),
            vec![("Albert Einstein".to_string(), "de".to_string())]
        );
    }

    #[tokio::test]
    async fn test_lookup_keeps_upstream_order() {
        let hits = vec![
            SearchHit::new("Zebra", 3, ""),
            SearchHit::new("Affe", 1, ""),
            SearchHit::new("Maus", 2, ""),
        ];
        let source = Arc::new(MockSource::new().with_hits("tiere", hits.clone()));
        let service = LookupService::new(source, "de");

        let result = service.lookup("tiere", None, None).await.unwrap();
        let structured = result.structured.unwrap();
        assert_eq!(structured.hits, hits);
        assert_eq!(structured.top_hit.title, "Zebra");
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let source = Arc::new(MockSource::new());
        let service = LookupService::new(source.clone(), "de");

        let result = service
            .lookup("zzzxxxqqqnotreal", None, Some("de"))
            .await
            .unwrap();

        assert_eq!(
            result.primary_text,
            "Kein Wikipedia-Artikel gefunden zu \"zzzxxxqqqnotreal\" (de)."
        );
        assert!(result.structured.is_none());
        assert!(!result.is_found());
        assert!(source.summarized().is_empty());

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("structured").is_none());
    }

    #[tokio::test]
    async fn test_lookup_missing_extract_uses_fallback() {
        let source = Arc::new(MockSource::new().with_hits("Leer", make_hits("Leerseite", 2)));
        let service = LookupService::new(source, "de");

        let result = service.lookup("Leer", None, None).await.unwrap();
        assert_eq!(result.primary_text, "Keine Summary für Leerseite.");
        assert!(result.structured.unwrap().summary.extract.is_none());
    }

    #[tokio::test]
    async fn test_lookup_top_k_defaults_and_clamps() {
        let source = Arc::new(MockSource::new().with_hits("viel", make_hits("Viel", 20)));
        let service = LookupService::new(source, "de");

        let count = |r: LookupResult| r.structured.unwrap().hits.len();
        assert_eq!(count(service.lookup("viel", None, None).await.unwrap()), 5);
        assert_eq!(count(service.lookup("viel", Some(0), None).await.unwrap()), 1);
        assert_eq!(count(service.lookup("viel", Some(99), None).await.unwrap()), 10);
        assert_eq!(count(service.lookup("viel", Some(7), None).await.unwrap()), 7);
    }

    #[tokio::test]
    async fn test_lookup_language_resolution() {
        let source = Arc::new(MockSource::new());
        let service = LookupService::new(source.clone(), "de");

        service.lookup("a", None, None).await.unwrap();
        service.lookup("b", None, Some("  en ")).await.unwrap();
        service.lookup("c", None, Some("   ")).await.unwrap();

        let langs: Vec<String> = source.searches().into_iter().map(|(_, l)| l).collect();
        assert_eq!(langs, vec!["de", "en", "de"]);
    }

    #[tokio::test]
    async fn test_lookup_propagates_search_failure() {
        let source = Arc::new(MockSource::new().fail_search(SourceError::Upstream {
            status: 500,
            url: "http://upstream".to_string(),
        }));
        let service = LookupService::new(source, "de");

        let err = service.lookup("x", None, None).await.unwrap_err();
        assert!(matches!(err, SourceError::Upstream { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_lookup_propagates_summary_failure() {
        let source = Arc::new(
            einstein_source().fail_summary(SourceError::Transport("connection reset".into())),
        );
        let service = LookupService::new(source, "de");

        let err = service
            .lookup("Albert Einstein", None, None)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
