//! MCP tool modules.
//!
//! Tools are grouped by domain: relationship queries, snapshot metadata,
//! and contextual help about the supported input formats.

pub mod data;
pub mod metadata;
mod context;
