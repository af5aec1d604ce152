//! Transcript relay backend.
//!
//! A small HTTP service for voice front-ends: `POST /api/ask` takes a
//! transcript, runs the `lookup` tool on a remote MCP server over streamable
//! HTTP and answers with the display text. Every tool-server failure maps to
//! one fixed German fallback message.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::mcp::protocol::{JsonRpcResponse, RequestId, LATEST_PROTOCOL_VERSION};
use crate::mcp::{ToolOutput, SESSION_HEADER};
use crate::utils::HttpClient;

/// Answer sent when the tool server fails
pub const FALLBACK_RESPONSE: &str = "Fehler bei der Anfrage an den MCP-Wikipedia-Server.";

/// Answer sent when the request carries no text
pub const EMPTY_INPUT_RESPONSE: &str = "Kein Text übermittelt.";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tool server answered HTTP {0}")]
    Status(u16),

    #[error("Tool server did not return a session id")]
    MissingSession,

    #[error("Tool server error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Tool reported an error: {0}")]
    ToolFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal MCP client over streamable HTTP
#[derive(Debug)]
pub struct McpHttpClient {
    http: HttpClient,
    endpoint: String,
    next_id: AtomicI64,
}

impl McpHttpClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RelayError> {
        Ok(Self {
            http: HttpClient::new()?,
            endpoint: endpoint.into(),
            next_id: AtomicI64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn post(
        &self,
        session_id: Option<&str>,
        body: &Value,
    ) -> Result<reqwest::Response, RelayError> {
        let mut request = self
            .http
            .client()
            .post(&self.endpoint)
            .header("accept", "application/json, text/event-stream")
            .json(body);
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RelayError::Status(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn request(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<(Option<String>, Value), RelayError> {
        let id = self.next_id();
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        let response = self.post(session_id, &body).await?;
        let returned_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let is_stream = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = response.text().await?;

        let reply = parse_reply(&text, is_stream, &RequestId::Number(id))?;
        if let Some(err) = reply.error {
            return Err(RelayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = reply
            .result
            .ok_or_else(|| RelayError::InvalidResponse("reply without result".into()))?;
        Ok((returned_session, result))
    }

    /// Open a session: `initialize` then `notifications/initialized`
    pub async fn connect(&self) -> Result<String, RelayError> {
        let (session_id, _) = self
            .request(
                None,
                "initialize",
                json!({
                    "protocolVersion": LATEST_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "wiki-lookup-relay", "version": crate::VERSION}
                }),
            )
            .await?;
        let session_id = session_id.ok_or(RelayError::MissingSession)?;

        self.post(
            Some(&session_id),
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await?;

        Ok(session_id)
    }

    /// Call a tool in an open session
    pub async fn call_tool(
        &self,
        session_id: &str,
        name: &str,
        arguments: Value,
    ) -> Result<ToolOutput, RelayError> {
        let (_, result) = self
            .request(
                Some(session_id),
                "tools/call",
                json!({"name": name, "arguments": arguments}),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| RelayError::InvalidResponse(e.to_string()))
    }

    /// Close a session
    pub async fn close(&self, session_id: &str) -> Result<(), RelayError> {
        let response = self
            .http
            .client()
            .delete(&self.endpoint)
            .header(SESSION_HEADER, session_id)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RelayError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Full round trip: open a session, run `lookup`, close the session.
    /// Returns the first text part, or the serialized result when there is none.
    pub async fn lookup(&self, query: &str, lang: &str) -> Result<String, RelayError> {
        let session_id = self.connect().await?;
        let outcome = self
            .call_tool(&session_id, "lookup", json!({"query": query, "lang": lang}))
            .await;

        if let Err(e) = self.close(&session_id).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to close tool-server session");
        }

        let output = outcome?;
        if output.is_error {
            return Err(RelayError::ToolFailed(
                output.display_text().unwrap_or_default().to_string(),
            ));
        }
        match output.display_text() {
            Some(text) => Ok(text.to_string()),
            None => serde_json::to_string(&output)
                .map_err(|e| RelayError::InvalidResponse(e.to_string())),
        }
    }
}

/// Decode a JSON-RPC reply from a plain JSON body or an event stream
fn parse_reply(body: &str, is_stream: bool, id: &RequestId) -> Result<JsonRpcResponse, RelayError> {
    if !is_stream {
        return serde_json::from_str(body).map_err(|e| RelayError::InvalidResponse(e.to_string()));
    }

    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .find(|reply| reply.id.as_ref() == Some(id))
        .ok_or_else(|| RelayError::InvalidResponse("no reply in event stream".into()))
}

/// Body of `POST /api/ask`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl AskRequest {
    /// The transcript, or the query when no transcript was sent
    pub fn text(&self) -> Option<&str> {
        [self.transcript.as_deref(), self.query.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

impl AskResponse {
    fn new(response: impl Into<String>) -> Json<Self> {
        Json(Self {
            response: response.into(),
        })
    }
}

struct RelayState {
    client: McpHttpClient,
    lang: String,
}

/// The relay HTTP service
#[derive(Clone)]
pub struct RelayServer {
    state: Arc<RelayState>,
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("tool_server", &self.state.client.endpoint())
            .field("lang", &self.state.lang)
            .finish()
    }
}

impl RelayServer {
    pub fn new(tool_server_url: impl Into<String>, lang: impl Into<String>) -> Result<Self, RelayError> {
        Ok(Self {
            state: Arc::new(RelayState {
                client: McpHttpClient::new(tool_server_url)?,
                lang: lang.into(),
            }),
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::new(config.tool_server_url.clone(), config.lang.clone())
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/ask", post(ask))
            .route("/healthz", get(healthz))
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background
    pub async fn run(&self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), RelayError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(
            "Relay listening on http://{}/api/ask (tool server {})",
            local_addr,
            self.state.client.endpoint()
        );

        let app = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Relay server error: {}", e);
            }
        });
        Ok((local_addr, handle))
    }
}

async fn ask(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> (StatusCode, Json<AskResponse>) {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let Some(text) = request.text() else {
        return (StatusCode::BAD_REQUEST, AskResponse::new(EMPTY_INPUT_RESPONSE));
    };

    tracing::info!(query = %text, "Relaying question");
    match state.client.lookup(text, &state.lang).await {
        Ok(answer) => (StatusCode::OK, AskResponse::new(answer)),
        Err(e) => {
            tracing::error!(error = %e, "Tool server request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, AskResponse::new(FALLBACK_RESPONSE))
        }
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_request_text() {
        let both = AskRequest {
            transcript: Some("Wer war Einstein?".into()),
            query: Some("ignored".into()),
        };
        assert_eq!(both.text(), Some("Wer war Einstein?"));

        let blank_transcript = AskRequest {
            transcript: Some("   ".into()),
            query: Some("Berlin".into()),
        };
        assert_eq!(blank_transcript.text(), Some("Berlin"));

        assert_eq!(AskRequest::default().text(), None);
    }

    #[test]
    fn test_parse_reply_plain_and_stream() {
        let id = RequestId::Number(3);
        let plain = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        let reply = parse_reply(plain, false, &id).unwrap();
        assert_eq!(reply.result, Some(json!({"ok": true})));

        let stream = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{}}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"n\":1}}\n\n",
        );
        let reply = parse_reply(stream, true, &id).unwrap();
        assert_eq!(reply.result, Some(json!({"n": 1})));

        assert!(parse_reply("data: {}\n", true, &id).is_err());
        assert!(parse_reply("<html>", false, &id).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_tool_server_returns_fallback() {
        let relay = RelayServer::new("http://127.0.0.1:1/mcp", "de").unwrap();
        let (status, Json(body)) = ask(
            State(relay.state.clone()),
            Ok(Json(AskRequest {
                transcript: Some("Berlin".into()),
                query: None,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.response, FALLBACK_RESPONSE);
    }
}
