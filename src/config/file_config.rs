//! Configuration file support for wiki-lookup.
//!
//! # Configuration File Format
//!
//! ```toml
//! [wiki]
//! default_lang = "de"
//! user_agent = "mcp-wikipedia-demo/1.0 (mailto:you@example.com)"
//! api_base = "https://{lang}.wikipedia.org"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 7073
//! session_idle_secs = 1800
//!
//! [relay]
//! host = "127.0.0.1"
//! port = 3002
//! tool_server_url = "http://localhost:7073/mcp"
//! lang = "de"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "wiki-lookup.toml";

/// Path of the per-user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wiki-lookup").join("config.toml"))
}

/// Find a configuration file in the working directory or the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|path| path.is_file())
}

/// Write a configuration as TOML, creating parent directories as needed
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
