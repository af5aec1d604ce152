//! MCP server entry points.
//!
//! [`McpServer`] owns the tool registry and the session manager and runs
//! either binding: stdio for desktop clients, streamable HTTP for everything
//! else. Both share the same registry, so tool results look identical.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::channel::McpChannel;
use super::http;
use super::session::{SessionManager, SessionStore};
use super::stdio::{self, StdioTransport, TransportError};
use super::tools::ToolRegistry;
use crate::config::Config;
use crate::lookup::LookupService;
use crate::sources::{SourceError, WikipediaSource};

/// Errors starting or running a binding
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// The MCP server for Wikipedia lookups
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionManager>,
}

impl McpServer {
    /// Create a server around a lookup service, with in-memory sessions
    pub fn new(lookup: LookupService) -> Self {
        let registry = Arc::new(ToolRegistry::new(lookup));
        let sessions = Arc::new(SessionManager::new(registry.clone()));
        Self { registry, sessions }
    }

    /// Create a server with a custom session store
    pub fn with_store(lookup: LookupService, store: Arc<dyn SessionStore>) -> Self {
        let registry = Arc::new(ToolRegistry::new(lookup));
        let sessions = Arc::new(SessionManager::with_store(registry.clone(), store));
        Self { registry, sessions }
    }

    /// Create a server backed by Wikipedia as configured
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let source = WikipediaSource::new(&config.wiki)?;
        let lookup = LookupService::new(Arc::new(source), config.wiki.default_lang.clone());
        Ok(Self::new(lookup))
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The HTTP router, for embedding or tests
    pub fn router(&self) -> Router {
        http::router(self.sessions.clone())
    }

    /// Run the server in stdio mode until stdin closes
    pub async fn run(&self) -> Result<(), ServerError> {
        tracing::info!("Starting MCP server in stdio mode");

        let channel = McpChannel::implicit(self.registry.clone());
        let mut transport = StdioTransport::stdio();
        stdio::serve(&channel, &mut transport).await?;

        tracing::info!("Stdin closed, stopping");
        Ok(())
    }

    /// Run the server in streamable HTTP mode.
    ///
    /// Returns the bound address and the handle of the serving task. With
    /// `session_idle` set, idle sessions are closed in the background.
    pub async fn run_http(
        &self,
        addr: &str,
        session_idle: Option<Duration>,
    ) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidInput => {
                ServerError::InvalidAddress(format!("{}: {}", addr, e))
            }
            _ => ServerError::Io(e),
        })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("MCP server listening on http://{}/mcp", local_addr);

        let reaper = session_idle.map(|idle| {
            tracing::info!(idle_secs = idle.as_secs(), "Closing sessions after idle timeout");
            self.sessions.spawn_reaper(idle)
        });

        let app = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("HTTP server error: {}", e);
            }
            if let Some(reaper) = reaper {
                reaper.abort();
            }
        });

        Ok((local_addr, handle))
    }
}
