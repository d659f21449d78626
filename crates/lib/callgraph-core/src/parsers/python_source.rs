use std::{error::Error, fmt};

use callgraph_store::models::MethodRecord;
use callgraph_store::schema::{MODULE_SCOPE, make_full_name};
use tree_sitter::{Node, Parser};

/// Error type for Python source extraction failures.
#[derive(Debug)]
pub struct PythonParseError {
    message: String,
}

impl PythonParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PythonParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Python source parse error: {}", self.message)
    }
}

impl Error for PythonParseError {}

impl From<tree_sitter::LanguageError> for PythonParseError {
    fn from(err: tree_sitter::LanguageError) -> Self {
        Self::new(err.to_string())
    }
}

/// A call site whose callee has not been matched to a definition yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    pub caller_id: String,
    /// Callee expression as written, e.g. `helper`, `self.run`, `utils.load`.
    pub callee: String,
    pub line: u32,
}

/// Definitions and call sites extracted from one source file.
#[derive(Debug, Clone, Default)]
pub struct PythonExtract {
    pub methods: Vec<MethodRecord>,
    pub calls: Vec<RawCall>,
}

/// Enclosing scope passed down the tree walk.
#[derive(Debug, Clone)]
struct Scope<'a> {
    file: &'a str,
    class_path: Vec<String>,
    function_id: String,
}

impl Scope<'_> {
    fn qualify(&self, name: &str) -> String {
        if self.class_path.is_empty() {
            make_full_name(self.file, name)
        } else {
            make_full_name(self.file, &format!("{}.{name}", self.class_path.join(".")))
        }
    }
}

/// Tree-sitter based extractor for Python call relationships.
pub struct PythonSourceParser {
    parser: Parser,
}

impl PythonSourceParser {
    /// Creates a parser loaded with the Python grammar.
    ///
    /// # Errors
    /// Returns `PythonParseError` if the grammar is incompatible with the runtime.
    pub fn new() -> Result<Self, PythonParseError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    /// Extracts a `<module>` record, one record per function definition, and
    /// every call site in `source`.
    ///
    /// Functions are named `file:function` or `file:Class.method`; nested
    /// classes extend the class path. Calls are attributed to the innermost
    /// enclosing function, or to the module record at top level.
    ///
    /// # Errors
    /// Returns `PythonParseError` if tree-sitter produces no tree.
    pub fn parse(&mut self, source: &str, rel_path: &str) -> Result<PythonExtract, PythonParseError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| PythonParseError::new(format!("no syntax tree for {rel_path}")))?;

        let module_name = make_full_name(rel_path, MODULE_SCOPE);
        let mut output = PythonExtract::default();
        output.methods.push(
            MethodRecord::new(module_name.clone(), module_name.clone())
                .with_file(rel_path)
                .with_line(1),
        );

        let scope = Scope {
            file: rel_path,
            class_path: Vec::new(),
            function_id: module_name,
        };
        visit(tree.root_node(), source.as_bytes(), &scope, &mut output);
        Ok(output)
    }
}

fn visit(node: Node<'_>, source: &[u8], scope: &Scope<'_>, output: &mut PythonExtract) {
    match node.kind() {
        "function_definition" => {
            if let Some(name) = field_text(node, "name", source) {
                let full_name = scope.qualify(name);
                let line = line_of(node);
                let id = format!("{full_name}#{line}");
                let mut record = MethodRecord::new(id.clone(), full_name)
                    .with_file(scope.file)
                    .with_line(line);
                record.signature = signature_of(node, name, source);
                output.methods.push(record);

                let inner = Scope {
                    file: scope.file,
                    class_path: scope.class_path.clone(),
                    function_id: id,
                };
                visit_children(node, source, &inner, output);
                return;
            }
        }
        "class_definition" => {
            if let Some(name) = field_text(node, "name", source) {
                let mut inner = scope.clone();
                inner.class_path.push(name.to_string());
                visit_children(node, source, &inner, output);
                return;
            }
        }
        "call" => {
            if let Some(callee) = field_text(node, "function", source) {
                output.calls.push(RawCall {
                    caller_id: scope.function_id.clone(),
                    callee: callee.to_string(),
                    line: line_of(node),
                });
            }
        }
        _ => {}
    }
    visit_children(node, source, scope, output);
}

fn visit_children(node: Node<'_>, source: &[u8], scope: &Scope<'_>, output: &mut PythonExtract) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, scope, output);
    }
}

fn field_text<'s>(node: Node<'_>, field: &str, source: &'s [u8]) -> Option<&'s str> {
    let child = node.child_by_field_name(field)?;
    std::str::from_utf8(source.get(child.start_byte()..child.end_byte())?).ok()
}

fn signature_of(node: Node<'_>, name: &str, source: &[u8]) -> Option<String> {
    let params = field_text(node, "parameters", source)?;
    Some(format!("{name}{params}"))
}

fn line_of(node: Node<'_>) -> u32 {
    u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
import os

def helper(x):
    return x * 2

class Processor:
    def run(self, items):
        return [helper(item) for item in items]

    class Inner:
        def deep(self):
            os.path.join("a", "b")

print(helper(1))
"#;

    fn extract() -> PythonExtract {
        let mut parser = PythonSourceParser::new().expect("python grammar");
        parser.parse(SOURCE, "pkg/sample.py").expect("parse sample")
    }

    #[test]
    fn names_functions_with_file_and_class_scope() {
        let output = extract();
        let names: Vec<&str> = output
            .methods
            .iter()
            .map(|method| method.full_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "pkg/sample.py:<module>",
                "pkg/sample.py:helper",
                "pkg/sample.py:Processor.run",
                "pkg/sample.py:Processor.Inner.deep",
            ]
        );
        assert_eq!(output.methods[1].signature.as_deref(), Some("helper(x)"));
        assert_eq!(output.methods[1].line, Some(4));
    }

    #[test]
    fn attributes_calls_to_innermost_function() {
        let output = extract();
        let run_id = &output.methods[2].id;
        assert!(output
            .calls
            .iter()
            .any(|call| &call.caller_id == run_id && call.callee == "helper"));

        let module_calls: Vec<&str> = output
            .calls
            .iter()
            .filter(|call| call.caller_id == "pkg/sample.py:<module>")
            .map(|call| call.callee.as_str())
            .collect();
        assert_eq!(module_calls, vec!["print", "helper"]);

        let deep_id = &output.methods[3].id;
        assert!(output
            .calls
            .iter()
            .any(|call| &call.caller_id == deep_id && call.callee == "os.path.join"));
    }
}
