use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::{error::Error, fmt, fs};

use callgraph_store::models::{CallEdge, CallTarget, GraphTables, MethodRecord, SnapshotFormat};
use callgraph_store::schema::{
    CALLS_FILE,
    DOT_EXTENSION,
    METHODS_FILE,
    MODULE_SCOPE,
    PYTHON_EXTENSION,
    make_full_name,
    make_scoped_node_id,
    short_name,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::parsers::{
    DotLine,
    NodeLabel,
    PythonSourceParser,
    RelationalDumpParser,
    graph_id_from_file_name,
    parse_line,
};

static DEF_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bdef\s+([A-Za-z_]\w*)").expect("valid def pattern")
});

static CALL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][\w.]*)\s*\(").expect("valid call pattern")
});

static BARE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w<>.$]+$").expect("valid bare name pattern")
});

/// Fatal failure while building the index. Cached by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    MissingInput { root: PathBuf, expected: String },
    Io { path: PathBuf, message: String },
    Parser(String),
    Task(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput { root, expected } => {
                write!(f, "no usable input under {}: expected {expected}", root.display())
            }
            Self::Io { path, message } => write!(f, "failed to read {}: {message}", path.display()),
            Self::Parser(message) => write!(f, "parser unavailable: {message}"),
            Self::Task(message) => write!(f, "index build task failed: {message}"),
        }
    }
}

impl Error for LoadError {}

impl LoadError {
    fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Location and format of a snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSource {
    pub root: PathBuf,
    #[serde(default)]
    pub format: SnapshotFormat,
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: SnapshotFormat::Auto,
        }
    }

    #[must_use]
    pub const fn with_format(mut self, format: SnapshotFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn methods_path(&self) -> PathBuf {
        self.root.join(METHODS_FILE)
    }

    #[must_use]
    pub fn calls_path(&self) -> PathBuf {
        self.root.join(CALLS_FILE)
    }

    /// Resolves `Auto` against the files currently present.
    ///
    /// A relational dump wins over DOT exports when both are present.
    ///
    /// # Errors
    /// Returns `LoadError::MissingInput` if `Auto` finds neither format.
    pub fn resolve_format(&self) -> Result<SnapshotFormat, LoadError> {
        if self.format != SnapshotFormat::Auto {
            return Ok(self.format);
        }
        if self.methods_path().is_file() && self.calls_path().is_file() {
            return Ok(SnapshotFormat::Relational);
        }
        if self.root.is_dir() && !self.dot_files()?.is_empty() {
            return Ok(SnapshotFormat::Dot);
        }
        Err(LoadError::MissingInput {
            root: self.root.clone(),
            expected: format!("{METHODS_FILE} and {CALLS_FILE}, or *.{DOT_EXTENSION} files"),
        })
    }

    /// DOT files directly under the root, sorted by path.
    ///
    /// # Errors
    /// Returns `LoadError::Io` if the root cannot be listed.
    pub fn dot_files(&self) -> Result<Vec<PathBuf>, LoadError> {
        let entries = fs::read_dir(&self.root).map_err(|err| LoadError::io(&self.root, &err))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_extension(path, DOT_EXTENSION))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Python files anywhere under the root, skipping hidden directories.
    ///
    /// # Errors
    /// Returns `LoadError::Io` if the root cannot be listed.
    pub fn python_files(&self) -> Result<Vec<PathBuf>, LoadError> {
        let mut files = Vec::new();
        collect_python_files(&self.root, &mut files, true)?;
        files.sort();
        Ok(files)
    }

    /// Reads the snapshot into canonical tables.
    ///
    /// # Errors
    /// Returns `LoadError` if the input is missing or the root cannot be read.
    /// Individual unreadable or malformed files are skipped.
    pub fn load(&self) -> Result<GraphTables, LoadError> {
        load_snapshot(self)
    }
}

/// Normalizes a snapshot directory into canonical method and call tables.
///
/// # Errors
/// Returns `LoadError` if the input is missing or the root cannot be read.
pub fn load_snapshot(source: &SnapshotSource) -> Result<GraphTables, LoadError> {
    let format = source.resolve_format()?;
    let tables = match format {
        SnapshotFormat::Relational => load_relational(source)?,
        SnapshotFormat::PythonSource => load_python(source)?,
        SnapshotFormat::Dot | SnapshotFormat::Auto => load_dot(source)?,
    };
    info!(
        root = %source.root.display(),
        format = tables.format.as_str(),
        files = tables.sources.len(),
        methods = tables.methods.len(),
        calls = tables.calls.len(),
        "snapshot normalized"
    );
    Ok(tables)
}

fn load_relational(source: &SnapshotSource) -> Result<GraphTables, LoadError> {
    let methods_path = source.methods_path();
    let calls_path = source.calls_path();
    if !methods_path.is_file() || !calls_path.is_file() {
        return Err(LoadError::MissingInput {
            root: source.root.clone(),
            expected: format!("{METHODS_FILE} and {CALLS_FILE}"),
        });
    }

    let mut tables = GraphTables::new(SnapshotFormat::Relational);
    match RelationalDumpParser::parse_methods_file(&methods_path) {
        Ok(methods) => {
            tables.methods = methods;
            tables.sources.push(methods_path);
        }
        Err(err) => warn!(path = %methods_path.display(), error = %err, "skipping unreadable file"),
    }
    match RelationalDumpParser::parse_calls_file(&calls_path) {
        Ok(calls) => {
            tables.calls = calls;
            tables.sources.push(calls_path);
        }
        Err(err) => warn!(path = %calls_path.display(), error = %err, "skipping unreadable file"),
    }
    Ok(tables)
}

fn load_dot(source: &SnapshotSource) -> Result<GraphTables, LoadError> {
    let files = if source.root.is_dir() {
        source.dot_files()?
    } else {
        Vec::new()
    };
    if files.is_empty() {
        return Err(LoadError::MissingInput {
            root: source.root.clone(),
            expected: format!("*.{DOT_EXTENSION} files"),
        });
    }

    let mut tables = GraphTables::new(SnapshotFormat::Dot);
    for path in files {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let graph_id = graph_id_from_file_name(&file_name);
        normalize_dot_text(&text, &graph_id, &mut tables);
        tables.sources.push(path);
    }
    Ok(tables)
}

/// Appends the nodes and edges of one DOT export to `tables`.
///
/// Lines that match no grammar are skipped.
pub fn normalize_dot_text(text: &str, graph_id: &str, tables: &mut GraphTables) {
    let mut scope = graph_id.to_string();
    let mut skipped = 0usize;
    for line in text.lines() {
        match parse_line(line) {
            Some(DotLine::Header { name }) => {
                if !name.trim().is_empty() {
                    scope = name.trim().to_string();
                }
            }
            Some(DotLine::QuotedNode { id, label }) => {
                tables.methods.push(dot_record(id, &scope, graph_id, &label));
            }
            Some(DotLine::NumericNode { id, label }) => {
                let label = NodeLabel {
                    operation_type: String::new(),
                    line: 0,
                    snippet: label,
                };
                let id = make_scoped_node_id(graph_id, id);
                tables.methods.push(dot_record(id, &scope, graph_id, &label));
            }
            Some(DotLine::QuotedEdge { source, target }) => {
                tables
                    .calls
                    .push(CallEdge::resolved(source, target).with_graph_id(graph_id));
            }
            Some(DotLine::NumericEdge { source, target }) => {
                tables.calls.push(
                    CallEdge::resolved(
                        make_scoped_node_id(graph_id, source),
                        make_scoped_node_id(graph_id, target),
                    )
                    .with_graph_id(graph_id),
                );
            }
            None => {
                if !line.trim().is_empty() {
                    skipped += 1;
                }
            }
        }
    }
    if skipped > 0 {
        debug!(graph_id, skipped, "ignored unrecognized DOT lines");
    }
}

fn dot_record(id: String, scope: &str, graph_id: &str, label: &NodeLabel) -> MethodRecord {
    let local = node_name(label).unwrap_or_else(|| id.clone());
    let mut record = MethodRecord::new(id, make_full_name(scope, &local)).with_graph_id(graph_id);
    if label.line > 0 {
        record.line = Some(label.line);
    }
    if !label.snippet.is_empty() {
        record.snippet = Some(label.snippet.clone());
    }
    if !label.operation_type.is_empty() {
        record.operation_type = Some(label.operation_type.clone());
    }
    record
}

/// Picks a display name for a DOT node from its label.
///
/// Prefers a `def NAME` in the snippet, then the first called name, then a
/// snippet that is already a bare name, then the operation type.
fn node_name(label: &NodeLabel) -> Option<String> {
    let snippet = label.snippet.trim();
    if let Some(captures) = DEF_NAME.captures(snippet) {
        return Some(captures[1].to_string());
    }
    if let Some(captures) = CALL_NAME.captures(snippet) {
        return Some(captures[1].to_string());
    }
    if BARE_NAME.is_match(snippet) {
        return Some(snippet.to_string());
    }
    if !label.operation_type.is_empty() && !label.is_unknown() {
        return Some(label.operation_type.clone());
    }
    if snippet.is_empty() {
        None
    } else {
        Some(snippet.to_string())
    }
}

fn load_python(source: &SnapshotSource) -> Result<GraphTables, LoadError> {
    let files = if source.root.is_dir() {
        source.python_files()?
    } else {
        Vec::new()
    };
    if files.is_empty() {
        return Err(LoadError::MissingInput {
            root: source.root.clone(),
            expected: format!("*.{PYTHON_EXTENSION} files"),
        });
    }

    let mut parser = PythonSourceParser::new().map_err(|err| LoadError::Parser(err.to_string()))?;
    let mut tables = GraphTables::new(SnapshotFormat::PythonSource);
    let mut raw_calls = Vec::new();
    for path in files {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        let rel_path = relative_path(&source.root, &path);
        match parser.parse(&text, &rel_path) {
            Ok(extract) => {
                tables.methods.extend(extract.methods);
                raw_calls.extend(extract.calls);
                tables.sources.push(path);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unparsable file"),
        }
    }

    let resolver = DefinitionResolver::new(&tables.methods);
    tables.calls = raw_calls
        .into_iter()
        .map(|call| {
            let target = resolver.resolve(&call.caller_id, &call.callee);
            CallEdge::new(call.caller_id, target).with_line(call.line)
        })
        .collect();
    Ok(tables)
}

/// Short-name lookup over extracted definitions, used to bind raw call text.
struct DefinitionResolver<'a> {
    file_of: HashMap<&'a str, Option<&'a str>>,
    by_name: HashMap<&'a str, Vec<&'a MethodRecord>>,
}

impl<'a> DefinitionResolver<'a> {
    fn new(methods: &'a [MethodRecord]) -> Self {
        let mut by_name: HashMap<&str, Vec<&MethodRecord>> = HashMap::new();
        let mut file_of = HashMap::with_capacity(methods.len());
        for method in methods {
            file_of.insert(method.id.as_str(), method.file.as_deref());
            let name = short_name(&method.full_name);
            if name != MODULE_SCOPE {
                by_name.entry(name).or_default().push(method);
            }
        }
        Self { file_of, by_name }
    }

    /// Binds `callee` to a definition with the same short name, preferring one
    /// in the caller's own file, then the first seen anywhere.
    fn resolve(&self, caller_id: &str, callee: &str) -> CallTarget {
        let name = callee.rsplit('.').next().unwrap_or(callee);
        let Some(candidates) = self.by_name.get(name) else {
            return CallTarget::Unresolved(Some(callee.to_string()));
        };
        let caller_file = self.file_of.get(caller_id).copied().flatten();
        let chosen = candidates
            .iter()
            .find(|method| caller_file.is_some() && method.file.as_deref() == caller_file)
            .or_else(|| candidates.first());
        chosen.map_or_else(
            || CallTarget::Unresolved(Some(callee.to_string())),
            |method| CallTarget::Resolved(method.id.clone()),
        )
    }
}

fn collect_python_files(dir: &Path, files: &mut Vec<PathBuf>, is_root: bool) -> Result<(), LoadError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if is_root => return Err(LoadError::io(dir, &err)),
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
            return Ok(());
        }
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            if !is_hidden(&path) {
                collect_python_files(&path, files, false)?;
            }
        } else if has_extension(&path, PYTHON_EXTENSION) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') || name == "__pycache__")
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG_DOT: &str = r#"digraph "calculate_sum" {
"30064771072" [label = <METHOD, 1<BR/>calculate_sum> ]
"30064771073" [label = <&lt;operator&gt;.assignment, 2<BR/>total = 0> ]
"30064771074" [label = <CALL, 3<BR/>print(total)> ]
"broken" [label = <
"30064771072" -> "30064771073"  [ label = "CFG: "]
"30064771073" -> "30064771074"
}
"#;

    fn write(dir: &Path, name: &str, contents: &[u8]) {
        fs::write(dir.join(name), contents).expect("write fixture");
    }

    #[test]
    fn dot_normalization_tolerates_malformed_lines() {
        let mut tables = GraphTables::new(SnapshotFormat::Dot);
        normalize_dot_text(CFG_DOT, "0", &mut tables);

        let names: Vec<&str> = tables.methods.iter().map(|m| m.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "calculate_sum:calculate_sum",
                "calculate_sum:<operator>.assignment",
                "calculate_sum:print",
            ]
        );
        assert_eq!(tables.methods[1].line, Some(2));
        assert_eq!(tables.methods[1].snippet.as_deref(), Some("total = 0"));
        assert_eq!(tables.calls.len(), 2);
        assert!(tables.calls.iter().all(|call| call.graph_id.as_deref() == Some("0")));
    }

    #[test]
    fn garbage_line_yields_only_valid_records() {
        let mut tables = GraphTables::new(SnapshotFormat::Dot);
        normalize_dot_text(
            "\"1\" [label = <METHOD, 1<BR/>main> ]\n\"1\" -> \"2\"\n%% not a declaration %%\n",
            "0",
            &mut tables,
        );
        assert_eq!(tables.methods.len(), 1);
        assert_eq!(tables.calls.len(), 1);
    }

    #[test]
    fn numeric_ids_are_qualified_by_graph() {
        let mut tables = GraphTables::new(SnapshotFormat::Dot);
        normalize_dot_text(
            "digraph \"G\" {\n  1 [label=\"entry\"];\n  2 [label=\"exit\"];\n  1 -> 2;\n}\n",
            "4",
            &mut tables,
        );
        normalize_dot_text("  1 [label=\"entry\"];\n", "5", &mut tables);

        let ids: Vec<&str> = tables.methods.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["4:1", "4:2", "5:1"]);
        assert_eq!(tables.methods[0].full_name, "G:entry");
        assert_eq!(tables.methods[2].full_name, "5:entry");
        assert_eq!(tables.calls[0], CallEdge::resolved("4:1", "4:2").with_graph_id("4"));
    }

    #[test]
    fn auto_detects_relational_before_dot() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "0-cfg.dot", CFG_DOT.as_bytes());
        let source = SnapshotSource::new(dir.path());
        assert_eq!(source.resolve_format(), Ok(SnapshotFormat::Dot));

        write(dir.path(), METHODS_FILE, b"method_id,full_name\nm1,a.py:foo\n");
        assert_eq!(source.resolve_format(), Ok(SnapshotFormat::Dot));
        write(dir.path(), CALLS_FILE, b"caller_id,callee_id\n");
        assert_eq!(source.resolve_format(), Ok(SnapshotFormat::Relational));
    }

    #[test]
    fn empty_root_is_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = SnapshotSource::new(dir.path()).load().expect_err("no input");
        assert!(matches!(err, LoadError::MissingInput { .. }));

        let missing = SnapshotSource::new(dir.path().join("absent"));
        assert!(matches!(missing.load(), Err(LoadError::MissingInput { .. })));

        let relational = SnapshotSource::new(dir.path()).with_format(SnapshotFormat::Relational);
        assert!(matches!(relational.load(), Err(LoadError::MissingInput { .. })));
    }

    #[test]
    fn absent_root_with_explicit_format_is_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absent = dir.path().join("absent");
        for format in [
            SnapshotFormat::Relational,
            SnapshotFormat::Dot,
            SnapshotFormat::PythonSource,
        ] {
            let err = SnapshotSource::new(&absent)
                .with_format(format)
                .load()
                .expect_err("absent root");
            assert!(
                matches!(err, LoadError::MissingInput { ref root, .. } if *root == absent),
                "{format:?} -> {err:?}"
            );
        }
    }

    #[test]
    fn invalid_utf8_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "0-cfg.dot", CFG_DOT.as_bytes());
        write(dir.path(), "1-cfg.dot", &[0xff, 0xfe, 0x00, 0x81]);

        let tables = SnapshotSource::new(dir.path()).load().expect("load");
        assert_eq!(tables.format, SnapshotFormat::Dot);
        assert_eq!(tables.sources.len(), 1);
        assert_eq!(tables.methods.len(), 3);
    }

    #[test]
    fn python_calls_resolve_same_file_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("pkg")).expect("pkg dir");
        fs::create_dir_all(dir.path().join(".venv")).expect("hidden dir");
        write(dir.path(), "pkg/a.py", b"def helper():\n    pass\n\ndef main():\n    helper()\n    print('x')\n");
        write(dir.path(), "pkg/b.py", b"def helper():\n    pass\n\ndef run():\n    helper()\n");
        write(dir.path(), ".venv/skip.py", b"def hidden():\n    pass\n");

        let tables = SnapshotSource::new(dir.path())
            .with_format(SnapshotFormat::PythonSource)
            .load()
            .expect("load");
        assert_eq!(tables.sources.len(), 2);
        assert!(tables.methods.iter().all(|m| !m.full_name.contains("hidden")));

        let target_of = |caller: &str, raw: &str| {
            tables
                .calls
                .iter()
                .find(|call| call.caller_id.starts_with(caller) && {
                    match &call.target {
                        CallTarget::Resolved(id) => id.contains(raw),
                        CallTarget::Unresolved(name) => name.as_deref() == Some(raw),
                    }
                })
                .map(|call| call.target.clone())
        };
        assert_eq!(
            target_of("pkg/a.py:main", "helper"),
            Some(CallTarget::Resolved("pkg/a.py:helper#1".to_string()))
        );
        assert_eq!(
            target_of("pkg/b.py:run", "helper"),
            Some(CallTarget::Resolved("pkg/b.py:helper#1".to_string()))
        );
        assert_eq!(
            target_of("pkg/a.py:main", "print"),
            Some(CallTarget::Unresolved(Some("print".to_string())))
        );
    }
}
