//! Canonical call-graph models and schema helpers for callgraph-mcp.
//!
//! This crate defines the fixed-shape method and call tables shared by the
//! parsers, the index builder, and the query surface.

pub mod models;
pub mod schema;

pub use models::*;
