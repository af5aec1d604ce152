//! HTTP session management.
//!
//! Every HTTP client gets its own [`McpChannel`], keyed by a random session
//! id. Sessions move Unbound -> Active -> Closed; a closed id is never
//! routed again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::channel::McpChannel;
use super::protocol::is_initialize_request;
use super::tools::ToolRegistry;

/// A live session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub channel: Arc<McpChannel>,
    pub created_at: DateTime<Utc>,
}

/// Errors from a session store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session already exists: {0}")]
    AlreadyExists(String),
}

/// Reasons a request cannot be routed to a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("No session id provided")]
    MissingSession,

    #[error("Unknown session id: {0}")]
    UnknownSession(String),

    #[error("Session store error: {0}")]
    Store(#[from] SessionError),
}

/// Where a POST was routed
#[derive(Debug, Clone)]
pub enum Routed {
    Existing(Session),
    Created(Session),
}

impl Routed {
    pub fn session(&self) -> &Session {
        match self {
            Routed::Existing(s) | Routed::Created(s) => s,
        }
    }
}

/// Storage for live sessions
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &str) -> Option<Session>;

    /// Insert a session. Refuses to overwrite a live id.
    async fn put(&self, session: Session) -> Result<(), SessionError>;

    async fn delete(&self, id: &str) -> Option<Session>;

    async fn list(&self) -> Vec<Session>;

    async fn len(&self) -> usize;
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn put(&self, session: Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionError::AlreadyExists(session.id));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    async fn list(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Creates, routes and closes sessions
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    registry: Arc<ToolRegistry>,
}

impl SessionManager {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_store(registry, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_store(registry: Arc<ToolRegistry>, store: Arc<dyn SessionStore>) -> Self {
        Self { store, registry }
    }

    /// Route a POST body: known id, or a fresh session for an initialize
    /// request without id. Anything else is rejected without touching the map.
    pub async fn resolve(
        &self,
        session_id: Option<&str>,
        body: &Value,
    ) -> Result<Routed, ProtocolError> {
        match session_id {
            Some(id) => self.get(id).await.map(Routed::Existing),
            None if is_initialize_request(body) => {
                Ok(Routed::Created(self.create_session().await?))
            }
            None => Err(ProtocolError::MissingSession),
        }
    }

    /// Look up a live session
    pub async fn get(&self, id: &str) -> Result<Session, ProtocolError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| ProtocolError::UnknownSession(id.to_string()))
    }

    /// Create and register a new session with a random id.
    pub async fn create_session(&self) -> Result<Session, SessionError> {
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            channel: Arc::new(McpChannel::new(self.registry.clone())),
            created_at: Utc::now(),
        };
        self.store.put(session.clone()).await?;

        // Channel closure from any side removes the session.
        let store = self.store.clone();
        let id = session.id.clone();
        let channel = session.channel.clone();
        tokio::spawn(async move {
            channel.closed().await;
            if store.delete(&id).await.is_some() {
                tracing::info!(session_id = %id, "Session closed");
            }
        });

        tracing::info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Close a session explicitly
    pub async fn close(&self, id: &str) -> Result<(), ProtocolError> {
        let session = self
            .store
            .delete(id)
            .await
            .ok_or_else(|| ProtocolError::UnknownSession(id.to_string()))?;
        session.channel.close();
        tracing::info!(session_id = %id, "Session deleted by client");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Close every channel idle for longer than `max_idle`. Returns how many
    /// were closed; removal follows through the closure watcher.
    pub async fn close_idle(&self, max_idle: Duration) -> usize {
        let mut closed = 0;
        for session in self.store.list().await {
            if session.channel.idle_for() > max_idle {
                tracing::debug!(session_id = %session.id, "Closing idle session");
                session.channel.close();
                closed += 1;
            }
        }
        closed
    }

    /// Periodically close idle sessions
    pub fn spawn_reaper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let closed = manager.close_idle(max_idle).await;
                if closed > 0 {
                    tracing::info!(closed, "Reaped idle sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupService;
    use crate::sources::MockSource;
    use serde_json::json;

    fn manager() -> SessionManager {
        let lookup = LookupService::new(Arc::new(MockSource::new()), "de");
        SessionManager::new(Arc::new(ToolRegistry::new(lookup)))
    }

    fn init_body() -> Value {
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})
    }

    async fn wait_for_count(manager: &SessionManager, expected: usize) {
        for _ in 0..100 {
            if manager.session_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session count never reached {}", expected);
    }

    #[tokio::test]
    async fn test_initialize_creates_unique_sessions() {
        let manager = manager();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let routed = manager.resolve(None, &init_body()).await.unwrap();
            assert!(matches!(routed, Routed::Created(_)));
            assert!(ids.insert(routed.session().id.clone()));
        }
        assert_eq!(manager.session_count().await, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_creates_distinct_sessions() {
        let manager = Arc::new(manager());
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let routed = manager.resolve(None, &init_body()).await.unwrap();
                    routed.session().id.clone()
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap()));
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(manager.session_count().await, 32);
    }

    #[tokio::test]
    async fn test_malformed_initialize_is_rejected() {
        let manager = manager();
        let body = json!({"id": 1, "method": "initialize", "params": {}});
        assert_eq!(
            manager.resolve(None, &body).await.unwrap_err(),
            ProtocolError::MissingSession
        );
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_known_id_routes_to_same_channel() {
        let manager = manager();
        let created = manager.create_session().await.unwrap();

        let routed = manager
            .resolve(Some(&created.id), &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await
            .unwrap();
        match routed {
            Routed::Existing(s) => assert!(Arc::ptr_eq(&s.channel, &created.channel)),
            other => panic!("expected existing session, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejections_leave_map_unchanged() {
        let manager = manager();
        manager.create_session().await.unwrap();

        let err = manager
            .resolve(None, &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::MissingSession);

        let err = manager.resolve(Some("does-not-exist"), &init_body()).await.unwrap_err();
        assert_eq!(err, ProtocolError::UnknownSession("does-not-exist".to_string()));

        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let manager = manager();
        let session = manager.create_session().await.unwrap();

        manager.close(&session.id).await.unwrap();
        assert!(session.channel.is_closed());
        assert_eq!(
            manager.close(&session.id).await.unwrap_err(),
            ProtocolError::UnknownSession(session.id.clone())
        );
        assert!(manager.get(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_channel_closure_removes_session() {
        let manager = manager();
        let session = manager.create_session().await.unwrap();
        session.channel.close();
        wait_for_count(&manager, 0).await;
    }

    #[tokio::test]
    async fn test_store_refuses_overwrite() {
        let manager = manager();
        let session = manager.create_session().await.unwrap();
        let store = InMemorySessionStore::new();
        store.put(session.clone()).await.unwrap();
        assert_eq!(
            store.put(session.clone()).await.unwrap_err(),
            SessionError::AlreadyExists(session.id.clone())
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_idle() {
        let manager = manager();
        manager.create_session().await.unwrap();

        assert_eq!(manager.close_idle(Duration::from_secs(60)).await, 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(manager.close_idle(Duration::from_millis(10)).await, 1);
        wait_for_count(&manager, 0).await;
    }
}
