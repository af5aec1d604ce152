//! Tool registry for MCP tools.
//!
//! The server exposes a closed set of tools. [`ToolKind`] describes each one
//! for `tools/list`; [`ToolCall`] carries validated, typed arguments for
//! `tools/call` and is dispatched by [`ToolRegistry::execute`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::handlers;
use super::protocol::RpcError;
use crate::lookup::LookupService;

/// The tools this server provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SearchTitles,
    FetchSummary,
    Lookup,
}

impl ToolKind {
    /// Every tool, in `tools/list` order
    pub const ALL: [ToolKind; 3] = [ToolKind::SearchTitles, ToolKind::FetchSummary, ToolKind::Lookup];

    /// Wire name used in `tools/call`
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::SearchTitles => "search-titles",
            ToolKind::FetchSummary => "fetch-summary",
            ToolKind::Lookup => "lookup",
        }
    }

    /// Resolve a wire name. The older `wikipedia_*` names are accepted too.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "search-titles" | "wikipedia_search" => Some(ToolKind::SearchTitles),
            "fetch-summary" | "wikipedia_summary" => Some(ToolKind::FetchSummary),
            "lookup" | "wikipedia_lookup" => Some(ToolKind::Lookup),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ToolKind::SearchTitles => "Wikipedia-Suche",
            ToolKind::FetchSummary => "Wikipedia-Zusammenfassung",
            ToolKind::Lookup => "Wikipedia-Lookup",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::SearchTitles => {
                "Search Wikipedia for article titles matching a query (up to 5 hits)"
            }
            ToolKind::FetchSummary => "Fetch the summary of a Wikipedia article by its exact title",
            ToolKind::Lookup => {
                "Search Wikipedia and return the summary of the most relevant article"
            }
        }
    }

    /// JSON Schema for the tool arguments
    pub fn input_schema(self) -> Value {
        let lang = json!({
            "type": "string",
            "description": "Wikipedia language code (e.g. 'de', 'en'). Defaults to the server language."
        });

        match self {
            ToolKind::SearchTitles => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query string"
                    },
                    "lang": lang
                },
                "required": ["query"]
            }),
            ToolKind::FetchSummary => json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Exact article title"
                    },
                    "lang": lang
                },
                "required": ["title"]
            }),
            ToolKind::Lookup => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Question or keywords to look up"
                    },
                    "topK": {
                        "type": "integer",
                        "description": "Number of search hits to consider (1-10)",
                        "minimum": 1,
                        "maximum": 10,
                        "default": 5
                    },
                    "lang": lang
                },
                "required": ["query"]
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A tool as advertised by `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchTitlesArgs {
    pub query: String,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FetchSummaryArgs {
    pub title: String,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LookupArgs {
    pub query: String,
    #[serde(default, rename = "topK", alias = "top_k", deserialize_with = "lenient_integer")]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub lang: Option<String>,
}

/// Accept any JSON value for `topK`; only integral numbers survive.
fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if let Some(u) = n.as_u64() {
                Some(i64::try_from(u).unwrap_or(i64::MAX))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            }
        }
        _ => None,
    })
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SearchTitles(SearchTitlesArgs),
    FetchSummary(FetchSummaryArgs),
    Lookup(LookupArgs),
}

impl ToolCall {
    /// Validate raw `arguments` for a tool
    pub fn parse(kind: ToolKind, arguments: Value) -> Result<Self, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: kind.name(),
            message: e.to_string(),
        };

        Ok(match kind {
            ToolKind::SearchTitles => {
                ToolCall::SearchTitles(serde_json::from_value(arguments).map_err(invalid)?)
            }
            ToolKind::FetchSummary => {
                ToolCall::FetchSummary(serde_json::from_value(arguments).map_err(invalid)?)
            }
            ToolKind::Lookup => ToolCall::Lookup(serde_json::from_value(arguments).map_err(invalid)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::SearchTitles(_) => ToolKind::SearchTitles,
            ToolCall::FetchSummary(_) => ToolKind::FetchSummary,
            ToolCall::Lookup(_) => ToolKind::Lookup,
        }
    }
}

/// Errors raised before a tool runs
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: &'static str, message: String },
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        RpcError::invalid_params(err.to_string())
    }
}

/// A single content part of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
        }
    }
}

/// The result of a `tools/call`, identical on both bindings.
///
/// The first content part is always the display text. When structured data
/// is present it is repeated as a JSON string in a second text part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentPart>,

    #[serde(
        rename = "structuredContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structured: Option<Value>,

    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// Display text only
    pub fn text(display: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(display)],
            structured: None,
            is_error: false,
        }
    }

    /// Display text plus structured data
    pub fn with_structured(display: impl Into<String>, structured: Value) -> Self {
        Self {
            content: vec![
                ContentPart::text(display),
                ContentPart::text(structured.to_string()),
            ],
            structured: Some(structured),
            is_error: false,
        }
    }

    /// A failed call, reported in-band
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(message)],
            structured: None,
            is_error: true,
        }
    }

    /// The first text part
    pub fn display_text(&self) -> Option<&str> {
        self.content.first().and_then(ContentPart::as_text)
    }
}

/// Registry for all MCP tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    lookup: LookupService,
}

impl ToolRegistry {
    pub fn new(lookup: LookupService) -> Self {
        Self { lookup }
    }

    /// Definitions for `tools/list`
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL.iter().map(|k| k.definition()).collect()
    }

    /// Resolve a tool by name
    pub fn get(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name)
    }

    /// Resolve and validate a call
    pub fn parse_call(&self, name: &str, arguments: Value) -> Result<ToolCall, ToolError> {
        let kind = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        ToolCall::parse(kind, arguments)
    }

    /// Run a validated call. Upstream failures come back as `isError` output.
    pub async fn execute(&self, call: ToolCall) -> ToolOutput {
        match call {
            ToolCall::SearchTitles(args) => handlers::search_titles(&self.lookup, args).await,
            ToolCall::FetchSummary(args) => handlers::fetch_summary(&self.lookup, args).await,
            ToolCall::Lookup(args) => handlers::lookup(&self.lookup, args).await,
        }
    }

    /// Validate and run in one step
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let call = self.parse_call(name, arguments)?;
        Ok(self.execute(call).await)
    }
}
