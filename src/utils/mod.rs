//! Utility modules supporting lookup operations.
//!
//! - [`HttpClient`]: HTTP client that identifies itself on every request
//! - [`strip_markup`]: Turn highlighted search snippets into plain text

mod http;
mod text;

pub use http::{HttpClient, DEFAULT_USER_AGENT};
pub use text::strip_markup;
