//! Per-session MCP channel.
//!
//! A [`McpChannel`] holds the protocol state of one client (handshake,
//! negotiated version, last activity) and dispatches JSON-RPC messages to the
//! tool registry. The stdio binding drives exactly one channel; the HTTP
//! binding owns one per session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use super::protocol::{
    Incoming, JsonRpcNotification, JsonRpcResponse, RequestId, RpcError, LATEST_PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use super::tools::ToolRegistry;

/// Name announced in `serverInfo`
pub const SERVER_NAME: &str = "wikipedia";

const INSTRUCTIONS: &str = "Use `lookup` to answer a question with the summary of the best \
matching Wikipedia article. `search-titles` lists candidate articles and `fetch-summary` \
returns the summary of an exact title.";

const NOTIFICATION_BUFFER: usize = 64;

#[derive(Debug, Default)]
struct ChannelState {
    protocol_version: Option<String>,
    client_name: Option<String>,
    client_ready: bool,
}

/// Reply to a single message or a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelReply {
    Single(JsonRpcResponse),
    Batch(Vec<JsonRpcResponse>),
}

/// Protocol state and dispatch for one client
#[derive(Debug)]
pub struct McpChannel {
    registry: Arc<ToolRegistry>,
    state: Mutex<ChannelState>,
    last_activity: Mutex<Instant>,
    notifications: broadcast::Sender<JsonRpcNotification>,
    closed: watch::Sender<bool>,
    require_handshake: bool,
}

impl McpChannel {
    /// A channel that only serves tools after `initialize`
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::build(registry, true)
    }

    /// A channel that serves tools right away; `initialize` stays optional.
    /// Used by the stdio binding.
    pub fn implicit(registry: Arc<ToolRegistry>) -> Self {
        Self::build(registry, false)
    }

    fn build(registry: Arc<ToolRegistry>, require_handshake: bool) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        let (closed, _) = watch::channel(false);
        Self {
            registry,
            state: Mutex::new(ChannelState::default()),
            last_activity: Mutex::new(Instant::now()),
            notifications,
            closed,
            require_handshake,
        }
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Whether `initialize` has completed
    pub fn is_initialized(&self) -> bool {
        self.state().protocol_version.is_some()
    }

    /// Whether the client sent `notifications/initialized`
    pub fn is_client_ready(&self) -> bool {
        self.state().client_ready
    }

    /// Negotiated protocol version, once initialized
    pub fn protocol_version(&self) -> Option<String> {
        self.state().protocol_version.clone()
    }

    /// `clientInfo.name` from the handshake
    pub fn client_name(&self) -> Option<String> {
        self.state().client_name.clone()
    }

    /// Time since the last message
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Subscribe to server-initiated notifications
    pub fn subscribe(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.notifications.subscribe()
    }

    /// Push a notification to every subscriber; dropped when nobody listens
    pub fn notify(&self, method: &str, params: Value) {
        let _ = self
            .notifications
            .send(JsonRpcNotification::new(method, Some(params)));
    }

    /// Close the channel. Idempotent.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the channel is closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Handle one decoded payload (a message or a batch). Returns `None` when
    /// nothing needs to be sent back.
    pub async fn handle(&self, payload: Value) -> Option<ChannelReply> {
        self.touch();
        match payload {
            Value::Array(items) if items.is_empty() => Some(ChannelReply::Single(
                JsonRpcResponse::error(None, RpcError::invalid_request("empty batch")),
            )),
            Value::Array(items) => {
                let mut replies = Vec::new();
                for item in items {
                    if let Some(reply) = self.handle_message(item).await {
                        replies.push(reply);
                    }
                }
                (!replies.is_empty()).then_some(ChannelReply::Batch(replies))
            }
            message => self.handle_message(message).await.map(ChannelReply::Single),
        }
    }

    /// Handle a single message
    pub async fn handle_message(&self, message: Value) -> Option<JsonRpcResponse> {
        match Incoming::parse(message) {
            Ok(Incoming::Request { id, method, params }) => {
                Some(self.handle_request(id, &method, params).await)
            }
            Ok(Incoming::Notification { method, .. }) => {
                self.handle_notification(&method);
                None
            }
            Ok(Incoming::Response) => None,
            Err(reply) => Some(reply),
        }
    }

    async fn handle_request(
        &self,
        id: RequestId,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        tracing::debug!(%id, method, "Handling request");

        if self.require_handshake
            && method != "initialize"
            && method != "ping"
            && !self.is_initialized()
        {
            return JsonRpcResponse::error(Some(id), RpcError::not_initialized());
        }

        let result = match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list()),
            "tools/call" => self.tools_call(params).await,
            other => Err(RpcError::method_not_found(other)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::error(Some(id), err),
        }
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => {
                self.state().client_ready = true;
                tracing::debug!("Client initialized");
            }
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.unwrap_or(Value::Null);
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(LATEST_PROTOCOL_VERSION)
            .to_string();
        let client_name = params
            .pointer("/clientInfo/name")
            .and_then(Value::as_str)
            .map(str::to_string);

        {
            let mut state = self.state();
            if state.protocol_version.is_some() {
                return Err(RpcError::invalid_request("channel already initialized"));
            }
            state.protocol_version = Some(version.clone());
            state.client_name = client_name.clone();
        }

        tracing::info!(
            protocol_version = %version,
            client = client_name.as_deref().unwrap_or("unknown"),
            "Channel initialized"
        );

        Ok(json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": {"listChanged": false},
                "logging": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": crate::VERSION
            },
            "instructions": INSTRUCTIONS
        }))
    }

    fn tools_list(&self) -> Value {
        json!({ "tools": self.registry.definitions() })
    }

    async fn tools_call(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("Missing 'name' parameter"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let call = self.registry.parse_call(name, arguments)?;
        let tool = call.kind().name();

        // Runs detached so a vanished caller does not abort the upstream call.
        let registry = self.registry.clone();
        let output = tokio::spawn(async move { registry.execute(call).await })
            .await
            .map_err(|e| RpcError::internal(format!("Tool task failed: {}", e)))?;

        let level = if output.is_error { "warning" } else { "info" };
        self.notify(
            "notifications/message",
            json!({
                "level": level,
                "logger": SERVER_NAME,
                "data": { "tool": tool, "isError": output.is_error }
            }),
        );

        serde_json::to_value(&output).map_err(|e| RpcError::internal(e.to_string()))
    }
}
