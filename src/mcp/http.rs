//! Streamable HTTP binding.
//!
//! `POST /mcp` carries JSON-RPC messages, `GET /mcp` opens an event stream of
//! server notifications and `DELETE /mcp` closes the session named by the
//! `mcp-session-id` header. `GET /healthz` bypasses sessions entirely.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use super::protocol::{JsonRpcResponse, RpcError};
use super::session::{ProtocolError, Routed, SessionManager};

/// Header carrying the session id
pub const SESSION_HEADER: &str = "mcp-session-id";

struct AppState {
    sessions: Arc<SessionManager>,
}

/// Router with the MCP and health endpoints
pub fn router(sessions: Arc<SessionManager>) -> Router {
    let state = Arc::new(AppState { sessions });
    Router::new()
        .route(
            "/mcp",
            post(handle_post).get(handle_get).delete(handle_delete),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn with_session_header(mut response: Response, id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(id) {
        let headers = response.headers_mut();
        headers.insert(HeaderName::from_static(SESSION_HEADER), value);
        headers.insert(
            HeaderName::from_static("access-control-expose-headers"),
            HeaderValue::from_static(SESSION_HEADER),
        );
    }
    response
}

fn bad_session(err: &ProtocolError) -> Response {
    tracing::debug!(error = %err, "Rejecting request without a valid session");
    (
        StatusCode::BAD_REQUEST,
        Json(JsonRpcResponse::error(None, RpcError::bad_session())),
    )
        .into_response()
}

async fn handle_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(None, RpcError::parse_error(e))),
            )
                .into_response()
        }
    };

    let routed = match state.sessions.resolve(session_id(&headers), &payload).await {
        Ok(routed) => routed,
        Err(ProtocolError::Store(e)) => {
            tracing::error!(error = %e, "Failed to register session");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(JsonRpcResponse::error(None, RpcError::internal(e.to_string()))),
            )
                .into_response();
        }
        Err(e) => return bad_session(&e),
    };

    if let Routed::Created(session) = &routed {
        tracing::debug!(session_id = %session.id, "Routing initialize to new session");
    }
    let session = routed.session();

    let response = match session.channel.handle(payload).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    // A session only becomes active once its initialize succeeded.
    if matches!(routed, Routed::Created(_)) && !session.channel.is_initialized() {
        tracing::debug!(session_id = %session.id, "Initialize failed, discarding session");
        if let Err(e) = state.sessions.close(&session.id).await {
            tracing::warn!(error = %e, "Failed to discard session");
        }
        return response;
    }
    with_session_header(response, &session.id)
}

async fn handle_get(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(id) = session_id(&headers) else {
        return bad_session(&ProtocolError::MissingSession);
    };
    let session = match state.sessions.get(id).await {
        Ok(session) => session,
        Err(e) => return bad_session(&e),
    };

    let channel = session.channel.clone();
    let mut notifications = channel.subscribe();
    let stream = async_stream::stream! {
        loop {
            let next = tokio::select! {
                message = notifications.recv() => Some(message),
                _ = channel.closed() => None,
            };
            match next {
                Some(Ok(notification)) => match Event::default().event("message").json_data(&notification) {
                    Ok(event) => {
                        yield Ok::<Event, Infallible>(event);
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping unserializable notification"),
                },
                Some(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Notification stream lagged");
                }
                Some(Err(RecvError::Closed)) | None => break,
            }
        }
    };

    tracing::debug!(session_id = %session.id, "Opened notification stream");
    let response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    with_session_header(response, &session.id)
}

async fn handle_delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(id) = session_id(&headers) else {
        return bad_session(&ProtocolError::MissingSession);
    };
    match state.sessions.close(id).await {
        Ok(()) => with_session_header(StatusCode::OK.into_response(), id),
        Err(e) => bad_session(&e),
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}
