//! Parsers for call-graph snapshot inputs.
//!
//! Each parser turns one external format into the canonical method and call
//! records: DOT exports line by line, relational CSV dumps row by row, and
//! Python source through a tree-sitter walk.

pub mod dot;
pub mod dot_label;
pub mod python_source;
pub mod relational;

pub use dot::{DotLine, graph_id_from_file_name, parse_line};
pub use dot_label::{NodeLabel, parse_node_label, unescape_label};
pub use python_source::{PythonExtract, PythonParseError, PythonSourceParser, RawCall};
pub use relational::{
    RelationalDumpParser,
    RelationalParseError,
    RelationalRow,
    parse_call_row,
    parse_method_row,
};
