//! JSON-RPC 2.0 message structures used by both channel bindings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Newest MCP protocol revision this server speaks
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol revisions accepted during `initialize`, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Message returned when a request carries no usable session id
pub const BAD_SESSION_MESSAGE: &str = "Bad Request: No valid session ID provided";

/// Request ID - a string or an integer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const BAD_SESSION: i32 = -32000;
    pub const NOT_INITIALIZED: i32 = -32002;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::new(Self::PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl fmt::Display) -> Self {
        Self::new(Self::INVALID_REQUEST, format!("Invalid Request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, detail)
    }

    pub fn not_initialized() -> Self {
        Self::new(Self::NOT_INITIALIZED, "Server not initialized")
    }

    /// The error sent for a missing or unknown session id
    pub fn bad_session() -> Self {
        Self::new(Self::BAD_SESSION, BAD_SESSION_MESSAGE)
    }
}

/// JSON-RPC 2.0 response. `id` serializes as `null` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    #[serde(default)]
    pub id: Option<RequestId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 notification (no `id`, no response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A classified incoming message
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Expects a response
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    /// Fire-and-forget
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// A client reply to a server request; this server never sends any
    Response,
}

impl Incoming {
    /// Classify a decoded JSON value. Malformed envelopes produce the error
    /// response to send back.
    pub fn parse(value: Value) -> Result<Self, JsonRpcResponse> {
        let Value::Object(mut obj) = value else {
            return Err(JsonRpcResponse::error(
                None,
                RpcError::invalid_request("message must be an object"),
            ));
        };

        let id = match obj.remove("id") {
            None => None,
            Some(raw) => Some(serde_json::from_value::<RequestId>(raw).map_err(|_| {
                JsonRpcResponse::error(
                    None,
                    RpcError::invalid_request("id must be a string or an integer"),
                )
            })?),
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(JsonRpcResponse::error(
                id,
                RpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let params = obj.remove("params");
        match obj.remove("method") {
            Some(Value::String(method)) => Ok(match id {
                Some(id) => Incoming::Request { id, method, params },
                None => Incoming::Notification { method, params },
            }),
            Some(_) => Err(JsonRpcResponse::error(
                id,
                RpcError::invalid_request("method must be a string"),
            )),
            None if obj.contains_key("result") || obj.contains_key("error") => {
                Ok(Incoming::Response)
            }
            None => Err(JsonRpcResponse::error(
                id,
                RpcError::invalid_request("missing method"),
            )),
        }
    }
}

/// Whether a POST body is (or, for a batch, contains) an `initialize` request
pub fn is_initialize_request(body: &Value) -> bool {
    match body {
        Value::Array(items) => items.iter().any(is_initialize_request),
        Value::Object(_) => matches!(
            Incoming::parse(body.clone()),
            Ok(Incoming::Request { ref method, .. }) if method == "initialize"
        ),
        _ => false,
    }
}
