use std::sync::LazyLock;

use regex::Regex;

use super::dot_label::{NodeLabel, parse_node_label, unescape_label};

static GRAPH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*digraph\s+"([^"]*)"\s*\{"#).expect("valid graph header pattern")
});

static QUOTED_NODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"([^"]+)"\s*\[label\s*=\s*<(.*?)>\s*\]"#).expect("valid quoted node pattern")
});

static QUOTED_EDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"([^"]+)"\s*->\s*"([^"]+)""#).expect("valid quoted edge pattern")
});

static NUMERIC_NODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\d+)\s*\[label="([^"]+)"\];"#).expect("valid numeric node pattern")
});

static NUMERIC_EDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*->\s*(\d+);").expect("valid numeric edge pattern")
});

/// A single recognized declaration from a DOT export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotLine {
    /// `digraph "name" {`
    Header { name: String },
    /// `"ID" [label = <LABEL>]`
    QuotedNode { id: String, label: NodeLabel },
    /// `"SRC" -> "TGT"`
    QuotedEdge { source: String, target: String },
    /// `N [label="TEXT"];`
    NumericNode { id: u64, label: String },
    /// `N -> M;`
    NumericEdge { source: u64, target: u64 },
}

/// Parses one line of a DOT export.
///
/// Returns `None` for lines that match no grammar (braces, attributes,
/// comments, truncated fragments); those are expected and not errors.
#[must_use]
pub fn parse_line(line: &str) -> Option<DotLine> {
    if let Some(captures) = QUOTED_NODE.captures(line) {
        return Some(DotLine::QuotedNode {
            id: captures[1].to_string(),
            label: parse_node_label(&captures[2]),
        });
    }
    if let Some(captures) = QUOTED_EDGE.captures(line) {
        return Some(DotLine::QuotedEdge {
            source: captures[1].to_string(),
            target: captures[2].to_string(),
        });
    }
    if let Some(captures) = NUMERIC_NODE.captures(line)
        && let Ok(id) = captures[1].parse::<u64>()
    {
        return Some(DotLine::NumericNode {
            id,
            label: unescape_label(&captures[2]),
        });
    }
    if let Some(captures) = NUMERIC_EDGE.captures(line)
        && let (Ok(source), Ok(target)) = (captures[1].parse::<u64>(), captures[2].parse::<u64>())
    {
        return Some(DotLine::NumericEdge { source, target });
    }
    GRAPH_HEADER.captures(line).map(|captures| DotLine::Header {
        name: captures[1].to_string(),
    })
}

/// Derives the graph id from a `<graph-id>-suffix.dot` file name.
///
/// Falls back to the file stem when the name has no `-`.
#[must_use]
pub fn graph_id_from_file_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem);
    match stem.split_once('-') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_node() {
        let line = r#"  "30064771072" [label = <METHOD, 1<BR/>&lt;module&gt;> ]"#;
        let Some(DotLine::QuotedNode { id, label }) = parse_line(line) else {
            panic!("expected quoted node");
        };
        assert_eq!(id, "30064771072");
        assert_eq!(label.operation_type, "METHOD");
        assert_eq!(label.line, 1);
        assert_eq!(label.snippet, "<module>");
    }

    #[test]
    fn parses_quoted_edge_with_attributes() {
        let line = r#"  "30064771072" -> "128849018880"  [ label = "CFG: "] "#;
        assert_eq!(
            parse_line(line),
            Some(DotLine::QuotedEdge {
                source: "30064771072".to_string(),
                target: "128849018880".to_string(),
            })
        );
    }

    #[test]
    fn parses_numeric_dialect() {
        assert_eq!(
            parse_line(r#"  1 [label="entry"];"#),
            Some(DotLine::NumericNode {
                id: 1,
                label: "entry".to_string(),
            })
        );
        assert_eq!(
            parse_line("  1 -> 2;"),
            Some(DotLine::NumericEdge { source: 1, target: 2 })
        );
    }

    #[test]
    fn parses_header() {
        assert_eq!(
            parse_line(r#"digraph "calculate_sum" {"#),
            Some(DotLine::Header {
                name: "calculate_sum".to_string(),
            })
        );
    }

    #[test]
    fn ignores_unrecognized_lines() {
        assert_eq!(parse_line("}"), None);
        assert_eq!(parse_line("node [shape=box];"), None);
        assert_eq!(parse_line(r#""broken" [label = <"#), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn graph_id_uses_file_name_prefix() {
        assert_eq!(graph_id_from_file_name("0-cfg.dot"), "0");
        assert_eq!(graph_id_from_file_name("12-cpg-ast.dot"), "12");
        assert_eq!(graph_id_from_file_name("callgraph.dot"), "callgraph");
        assert_eq!(graph_id_from_file_name("-odd.dot"), "-odd");
    }
}
