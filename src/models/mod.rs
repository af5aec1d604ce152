//! Core data models for encyclopedia search and lookup operations.

mod article;
mod lookup;

pub use article::{SearchHit, Summary};
pub use lookup::{LookupResult, LookupStructured, TopHit};
