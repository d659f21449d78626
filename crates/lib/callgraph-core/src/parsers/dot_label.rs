use std::sync::LazyLock;

use callgraph_store::schema::UNKNOWN_OPERATION;
use regex::Regex;
use serde::{Deserialize, Serialize};

const BREAK_MARKER: &str = "<BR/>";

static OPERATOR_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&lt;([^&]+)&gt;\.([^,]+),\s*(\d+)").expect("valid operator label pattern")
});

static TAG_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Z_]+),\s*(\d+)<BR/>(.*)$").expect("valid tag label pattern")
});

/// Structured form of a CPG node label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeLabel {
    pub operation_type: String,
    pub line: u32,
    pub snippet: String,
}

impl NodeLabel {
    /// Returns true when none of the structured grammars matched.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.operation_type == UNKNOWN_OPERATION
    }
}

/// Parses the inner text of an HTML-like DOT label.
///
/// Grammars are tried most specific first: operator labels
/// (`&lt;operator&gt;.assignment, 5<BR/>x = 1`), then bare upper-case tags
/// (`METHOD, 3<BR/>main`). Anything else falls back to an `unknown` label
/// carrying the unescaped text.
#[must_use]
pub fn parse_node_label(label: &str) -> NodeLabel {
    parse_operator_label(label)
        .or_else(|| parse_tag_label(label))
        .unwrap_or_else(|| NodeLabel {
            operation_type: UNKNOWN_OPERATION.to_string(),
            line: 0,
            snippet: unescape_label(label),
        })
}

fn parse_operator_label(label: &str) -> Option<NodeLabel> {
    let captures = OPERATOR_LABEL.captures(label)?;
    let line = captures[3].parse::<u32>().ok()?;
    let operation_type = format!("<{}>.{}", &captures[1], &captures[2]);
    let snippet = label
        .split_once(BREAK_MARKER)
        .map(|(_, rest)| unescape_label(rest))
        .unwrap_or_default();
    Some(NodeLabel {
        operation_type,
        line,
        snippet,
    })
}

fn parse_tag_label(label: &str) -> Option<NodeLabel> {
    let captures = TAG_LABEL.captures(label)?;
    let line = captures[2].parse::<u32>().ok()?;
    Some(NodeLabel {
        operation_type: captures[1].to_string(),
        line,
        snippet: unescape_label(&captures[3]),
    })
}

/// Replaces break markers with spaces, then decodes `&lt;`, `&gt;` and `&quot;`.
///
/// Entities are decoded after the marker substitution so that source text
/// containing `&lt;BR/&gt;` is never read as a break.
#[must_use]
pub fn unescape_label(label: &str) -> String {
    label
        .replace(BREAK_MARKER, " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operator_label() {
        let label = parse_node_label(
            "&lt;operator&gt;.assignment, 5<BR/>__version__ = &quot;0.1.0&quot;",
        );
        assert_eq!(label.operation_type, "<operator>.assignment");
        assert_eq!(label.line, 5);
        assert_eq!(label.snippet, "__version__ = \"0.1.0\"");
    }

    #[test]
    fn operator_label_without_break_has_empty_snippet() {
        let label = parse_node_label("&lt;operator&gt;.fieldAccess, 12");
        assert_eq!(label.operation_type, "<operator>.fieldAccess");
        assert_eq!(label.line, 12);
        assert!(label.snippet.is_empty());
    }

    #[test]
    fn parses_bare_tag_label() {
        let label = parse_node_label("METHOD_RETURN, 14<BR/>RET");
        assert_eq!(label.operation_type, "METHOD_RETURN");
        assert_eq!(label.line, 14);
        assert_eq!(label.snippet, "RET");
    }

    #[test]
    fn falls_back_to_unknown() {
        let label = parse_node_label("calculate_sum(numbers)<BR/>&lt;empty&gt;");
        assert!(label.is_unknown());
        assert_eq!(label.line, 0);
        assert_eq!(label.snippet, "calculate_sum(numbers) <empty>");
    }

    #[test]
    fn oversized_line_number_falls_through() {
        let label = parse_node_label("METHOD, 99999999999<BR/>main");
        assert!(label.is_unknown());
    }

    #[test]
    fn escaped_break_marker_is_not_a_break() {
        assert_eq!(unescape_label("a &lt;BR/&gt; b<BR/>c"), "a <BR/> b c");
    }
}
