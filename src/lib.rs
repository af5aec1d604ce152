//! # Wiki Lookup MCP
//!
//! A Model Context Protocol (MCP) server that answers questions by searching
//! Wikipedia and summarizing the best matching article.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (SearchHit, Summary, LookupResult)
//! - [`sources`]: Content source trait and the Wikipedia implementation
//! - [`lookup`]: The search-then-summarize orchestrator
//! - [`mcp`]: MCP protocol, tool registry, sessions, stdio and HTTP bindings
//! - [`relay`]: Transcript relay backend that forwards questions to the tool server
//! - [`utils`]: HTTP client and text helpers
//! - [`config`]: Configuration management

pub mod config;
pub mod lookup;
pub mod mcp;
pub mod models;
pub mod relay;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use lookup::LookupService;
pub use models::{LookupResult, SearchHit, Summary};
pub use sources::{Source, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
