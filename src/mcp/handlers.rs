//! Tool handlers.
//!
//! Each handler turns typed arguments into a [`ToolOutput`]. Upstream and
//! transport failures never escape: they become an `isError` text result.

use serde::Serialize;
use serde_json::json;

use super::tools::{FetchSummaryArgs, LookupArgs, SearchTitlesArgs, ToolOutput};
use crate::lookup::LookupService;
use crate::sources::SourceError;
use crate::utils::strip_markup;

/// Most hits shown by `search-titles`
pub const SEARCH_DISPLAY_LIMIT: usize = 5;

/// Text shown when a summary has no extract
pub const NO_SUMMARY_DISPLAY: &str = "Keine Zusammenfassung gefunden.";

fn upstream_failure(tool: &str, err: &SourceError) -> ToolOutput {
    tracing::warn!(tool, error = %err, "Wikipedia request failed");
    ToolOutput::error(format!("Fehler bei der Wikipedia-Anfrage: {}", err))
}

fn structured_output<T: Serialize>(display: String, data: &T) -> ToolOutput {
    match serde_json::to_value(data) {
        Ok(value) => ToolOutput::with_structured(display, value),
        Err(e) => ToolOutput::error(format!("Fehler beim Serialisieren: {}", e)),
    }
}

pub async fn search_titles(lookup: &LookupService, args: SearchTitlesArgs) -> ToolOutput {
    let lang = lookup.resolve_lang(args.lang.as_deref());

    let mut hits = match lookup.source().search(&args.query, &lang).await {
        Ok(hits) => hits,
        Err(e) => return upstream_failure("search-titles", &e),
    };
    hits.truncate(SEARCH_DISPLAY_LIMIT);

    let display = if hits.is_empty() {
        format!("Keine Treffer für \"{}\" ({}).", args.query, lang)
    } else {
        let mut text = format!("Top {} Treffer für \"{}\" ({}):", hits.len(), args.query, lang);
        for hit in &hits {
            let snippet = strip_markup(&hit.snippet);
            if snippet.is_empty() {
                text.push_str(&format!("\n- {}", hit.title));
            } else {
                text.push_str(&format!("\n- {}: {}", hit.title, snippet));
            }
        }
        text
    };

    let structured = json!({
        "query": args.query,
        "lang": lang,
        "hits": hits,
    });
    ToolOutput::with_structured(display, structured)
}

pub async fn fetch_summary(lookup: &LookupService, args: FetchSummaryArgs) -> ToolOutput {
    let lang = lookup.resolve_lang(args.lang.as_deref());

    let summary = match lookup.source().summarize(&args.title, &lang).await {
        Ok(summary) => summary,
        Err(e) => return upstream_failure("fetch-summary", &e),
    };

    let display = summary.extract_or(NO_SUMMARY_DISPLAY).to_string();
    let structured = json!({
        "lang": lang,
        "title": args.title,
        "summary": summary,
    });
    ToolOutput::with_structured(display, structured)
}

pub async fn lookup(lookup: &LookupService, args: LookupArgs) -> ToolOutput {
    let result = match lookup
        .lookup(&args.query, args.top_k, args.lang.as_deref())
        .await
    {
        Ok(result) => result,
        Err(e) => return upstream_failure("lookup", &e),
    };

    match &result.structured {
        Some(structured) => structured_output(result.primary_text.clone(), structured),
        None => ToolOutput::text(result.primary_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchHit, Summary};
    use crate::sources::{make_hits, MockSource};
    use std::sync::Arc;

    fn service(source: MockSource) -> LookupService {
        LookupService::new(Arc::new(source), "de")
    }

    #[tokio::test]
    async fn test_search_titles_lists_at_most_five() {
        let source = MockSource::new().with_hits(
            "Berlin",
            vec![
                SearchHit::new("Berlin", 1, "<span class=\"searchmatch\">Berlin</span> ist die Hauptstadt"),
                SearchHit::new("Berlin-Mitte", 2, ""),
            ]
            .into_iter()
            .chain(make_hits("Berlin Wall", 6))
            .collect(),
        );

        let output = search_titles(
            &service(source),
            SearchTitlesArgs { query: "Berlin".into(), lang: None },
        )
        .await;

        assert!(!output.is_error);
        let text = output.display_text().unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Top 5 Treffer für \"Berlin\" (de):"));
        assert_eq!(lines.next(), Some("- Berlin: Berlin ist die Hauptstadt"));
        assert_eq!(lines.next(), Some("- Berlin-Mitte"));
        assert_eq!(text.lines().count(), 6);

        let structured = output.structured.unwrap();
        assert_eq!(structured["hits"].as_array().unwrap().len(), 5);
        assert_eq!(structured["lang"], "de");
        assert_eq!(structured["hits"][0]["pageid"], 1);
    }

    #[tokio::test]
    async fn test_search_titles_no_hits() {
        let output = search_titles(
            &service(MockSource::new()),
            SearchTitlesArgs { query: "qqq".into(), lang: Some("en".into()) },
        )
        .await;
        assert_eq!(output.display_text(), Some("Keine Treffer für \"qqq\" (en)."));
        assert_eq!(output.structured.unwrap()["hits"], json!([]));
    }

    #[tokio::test]
    async fn test_fetch_summary() {
        let source = MockSource::new().with_summary(
            Summary::new("Rust", Some("Rust ist eine Programmiersprache.".into())).url("https://de.wikipedia.org/wiki/Rust"),
        );
        let lookup = service(source);

        let output = fetch_summary(&lookup, FetchSummaryArgs { title: "Rust".into(), lang: None }).await;
        assert_eq!(output.display_text(), Some("Rust ist eine Programmiersprache."));
        let structured = output.structured.unwrap();
        assert_eq!(structured["title"], "Rust");
        assert_eq!(structured["summary"]["url"], "https://de.wikipedia.org/wiki/Rust");

        let empty = fetch_summary(&lookup, FetchSummaryArgs { title: "Leer".into(), lang: None }).await;
        assert_eq!(empty.display_text(), Some(NO_SUMMARY_DISPLAY));
    }

    #[tokio::test]
    async fn test_lookup_found_and_not_found() {
        let source = MockSource::new()
            .with_hits("Albert Einstein", make_hits("Albert Einstein", 5))
            .with_summary(Summary::new("Albert Einstein", Some("Physiker.".into())));
        let lookup_service = service(source);

        let found = lookup(
            &lookup_service,
            LookupArgs { query: "Albert Einstein".into(), top_k: Some(3), lang: Some("de".into()) },
        )
        .await;
        assert_eq!(found.display_text(), Some("Physiker."));
        assert_eq!(found.content.len(), 2);
        let structured = found.structured.unwrap();
        assert_eq!(structured["topHit"]["title"], "Albert Einstein");
        assert_eq!(structured["hits"].as_array().unwrap().len(), 3);

        let missing = lookup(
            &lookup_service,
            LookupArgs { query: "zzzxxxqqqnotreal".into(), top_k: None, lang: Some("de".into()) },
        )
        .await;
        assert!(!missing.is_error);
        assert_eq!(missing.content.len(), 1);
        assert!(missing.structured.is_none());
        assert_eq!(
            missing.display_text(),
            Some("Kein Wikipedia-Artikel gefunden zu \"zzzxxxqqqnotreal\" (de).")
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_error_text() {
        let source = MockSource::new().fail_search(SourceError::Upstream {
            status: 503,
            url: "https://de.wikipedia.org/w/api.php".into(),
        });
        let output = lookup(
            &service(source),
            LookupArgs { query: "x".into(), top_k: None, lang: None },
        )
        .await;

        assert!(output.is_error);
        assert_eq!(
            output.display_text(),
            Some("Fehler bei der Wikipedia-Anfrage: HTTP 503 for https://de.wikipedia.org/w/api.php")
        );
    }
}
