//! Text helpers for rendering upstream snippets.

use regex::Regex;
use std::sync::OnceLock;

static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static tag pattern is valid"))
}

/// Remove HTML tags from a search snippet and decode the handful of entities
/// the search API emits.
pub fn strip_markup(snippet: &str) -> String {
    let text = tag_regex().replace_all(snippet, "");

    text.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
