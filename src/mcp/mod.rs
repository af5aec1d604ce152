//! MCP (Model Context Protocol) implementation.

pub mod channel;
mod handlers;
pub mod http;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stdio;
mod tools;

pub use channel::{ChannelReply, McpChannel};
pub use http::SESSION_HEADER;
pub use server::{McpServer, ServerError};
pub use session::{InMemorySessionStore, ProtocolError, Session, SessionManager, SessionStore};
pub use tools::{
    ContentPart, FetchSummaryArgs, LookupArgs, SearchTitlesArgs, ToolCall, ToolDefinition,
    ToolError, ToolKind, ToolOutput, ToolRegistry,
};
