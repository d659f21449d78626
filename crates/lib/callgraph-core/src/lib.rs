//! Core types and services for callgraph-mcp.
//!
//! This crate owns the parsers for call-graph snapshots, the normalizer that
//! turns them into canonical tables, the in-memory index with its query
//! algorithms, and the build-once loader that shares the index between
//! concurrent callers.

pub mod control;
pub mod parsers;
pub mod services;
pub mod store;
