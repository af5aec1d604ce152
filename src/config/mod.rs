//! Configuration management.
//!
//! Settings are layered: built-in defaults (some taken from the legacy
//! `WIKI_LANG`, `WIKI_UA`, `PORT` and `MCP_WIKIPEDIA_HTTP_URL` variables), then
//! an optional TOML file, then `WIKI_LOOKUP_*` environment variables with `__`
//! between section and key (e.g. `WIKI_LOOKUP_SERVER__PORT=8080`).

mod file_config;

pub use file_config::{default_config_path, find_config_file, save_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::DEFAULT_USER_AGENT;

/// Environment variable prefix for layered overrides
pub const ENV_PREFIX: &str = "WIKI_LOOKUP";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream encyclopedia settings
    #[serde(default)]
    pub wiki: WikiConfig,

    /// Tool server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Relay backend settings
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Upstream encyclopedia configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Language used when a caller does not pass one
    #[serde(default = "default_lang")]
    pub default_lang: String,

    /// Identifying user agent sent with every upstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Base URL template; `{lang}` is replaced by the language code
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Optional per-request timeout. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl WikiConfig {
    /// The configured request timeout, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            default_lang: default_lang(),
            user_agent: default_user_agent(),
            api_base: default_api_base(),
            request_timeout_secs: None,
        }
    }
}

fn default_lang() -> String {
    std::env::var("WIKI_LANG")
        .ok()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "de".to_string())
}

fn default_user_agent() -> String {
    std::env::var("WIKI_UA").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string())
}

fn default_api_base() -> String {
    "https://{lang}.wikipedia.org".to_string()
}

/// Tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind the HTTP binding to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP binding
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Close sessions idle for longer than this. Unset keeps them until closed.
    #[serde(default)]
    pub session_idle_secs: Option<u64>,
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured idle limit, if any
    pub fn session_idle(&self) -> Option<Duration> {
        self.session_idle_secs.map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
            session_idle_secs: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(7073)
}

/// Relay backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// MCP endpoint of the tool server
    #[serde(default = "default_tool_server_url")]
    pub tool_server_url: String,

    /// Language passed to every lookup
    #[serde(default = "default_relay_lang")]
    pub lang: String,
}

impl RelayConfig {
    /// `host:port` bind address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_relay_port(),
            tool_server_url: default_tool_server_url(),
            lang: default_relay_lang(),
        }
    }
}

fn default_relay_port() -> u16 {
    3002
}

fn default_tool_server_url() -> String {
    std::env::var("MCP_WIKIPEDIA_HTTP_URL")
        .unwrap_or_else(|_| "http://localhost:7073/mcp".to_string())
}

fn default_relay_lang() -> String {
    "de".to_string()
}

/// Load configuration from an optional file plus `WIKI_LOOKUP_*` overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.wiki.api_base, "https://{lang}.wikipedia.org");
        assert!(config.wiki.request_timeout().is_none());
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.session_idle().is_none());
        assert_eq!(config.relay.port, 3002);
        assert_eq!(config.relay.lang, "de");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
[wiki]
default_lang = "en"
api_base = "http://localhost:9999"
request_timeout_secs = 15

[server]
port = 8088
session_idle_secs = 600
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.wiki.default_lang, "en");
        assert_eq!(config.wiki.api_base, "http://localhost:9999");
        assert_eq!(config.wiki.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.addr(), "127.0.0.1:8088");
        assert_eq!(config.server.session_idle(), Some(Duration::from_secs(600)));
        // Untouched sections keep their defaults
        assert_eq!(config.relay.lang, "de");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Some(Path::new("/nonexistent/wiki-lookup.toml")));
        assert!(result.is_err());
    }
}
