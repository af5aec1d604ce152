//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Default identifying user agent for outbound requests.
///
/// Wikimedia rejects traffic without a descriptive user agent, so every
/// request carries one.
pub const DEFAULT_USER_AGENT: &str = "mcp-wikipedia-demo/1.0 (mailto:you@example.com)";

/// Shared HTTP client that always identifies itself
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with a custom user agent and no request timeout
    pub fn with_user_agent(user_agent: &str) -> Result<Self, reqwest::Error> {
        Self::with_options(user_agent, None)
    }

    /// Create a new HTTP client with a custom user agent and an optional
    /// per-request timeout
    pub fn with_options(
        user_agent: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: Arc::new(builder.build()?),
            user_agent: user_agent.to_string(),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The user agent sent with every request
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
