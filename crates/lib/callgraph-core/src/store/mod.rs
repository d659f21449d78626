//! In-memory call-graph index.
//!
//! The index is built once from normalized tables and then shared read-only
//! across every query.

pub mod index;

pub use index::CallGraphIndex;
