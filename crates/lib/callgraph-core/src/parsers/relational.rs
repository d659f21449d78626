use std::{collections::HashMap, error::Error, fmt, io::Read, path::Path};

use callgraph_store::models::{CallEdge, CallTarget, MethodRecord};
use callgraph_store::schema::{
    COL_CALLEE_FULL_NAME,
    COL_CALLEE_ID,
    COL_CALLER_ID,
    COL_FILE,
    COL_FULL_NAME,
    COL_LINE,
    COL_LINE_NUMBER,
    COL_METHOD_ID,
    COL_SIGNATURE,
    UNKNOWN_FULL_NAME,
    UNRESOLVED_CALLEE_ID,
};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

/// Error type for relational dump failures.
#[derive(Debug)]
pub struct RelationalParseError {
    message: String,
}

impl RelationalParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RelationalParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relational dump parse error: {}", self.message)
    }
}

impl Error for RelationalParseError {}

impl From<csv::Error> for RelationalParseError {
    fn from(err: csv::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for RelationalParseError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// One data row viewed as a mapping from header name to value.
pub struct RelationalRow<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a StringRecord,
}

impl<'a> RelationalRow<'a> {
    #[must_use]
    pub const fn new(columns: &'a HashMap<String, usize>, record: &'a StringRecord) -> Self {
        Self { columns, record }
    }

    /// Returns the trimmed value of a column, or `None` when the column is
    /// absent or empty.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = *self.columns.get(column)?;
        let value = self.record.get(index)?.trim();
        if value.is_empty() { None } else { Some(value) }
    }

    /// Reads the line column (`line_number`, then `line`); missing or
    /// non-numeric values coerce to `0`.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.get(COL_LINE_NUMBER)
            .or_else(|| self.get(COL_LINE))
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0)
    }
}

/// Converts a `methods.csv` row into a record.
///
/// Rows without a method id or full name are rejected.
#[must_use]
pub fn parse_method_row(row: &RelationalRow<'_>) -> Option<MethodRecord> {
    let id = row.get(COL_METHOD_ID)?;
    let full_name = row.get(COL_FULL_NAME)?;
    Some(MethodRecord {
        id: id.to_string(),
        full_name: full_name.to_string(),
        signature: row.get(COL_SIGNATURE).map(str::to_string),
        file: row.get(COL_FILE).map(str::to_string),
        line: Some(row.line()),
        snippet: None,
        operation_type: None,
        graph_id: None,
    })
}

/// Converts a `calls.csv` row into an edge.
///
/// The exporter's `-1` callee id becomes [`CallTarget::Unresolved`], keeping
/// the callee name unless it is the `<unknownFullName>` placeholder.
#[must_use]
pub fn parse_call_row(row: &RelationalRow<'_>) -> Option<CallEdge> {
    let caller_id = row.get(COL_CALLER_ID)?;
    let target = match row.get(COL_CALLEE_ID) {
        Some(callee_id) if callee_id != UNRESOLVED_CALLEE_ID => {
            CallTarget::Resolved(callee_id.to_string())
        }
        _ => CallTarget::Unresolved(
            row.get(COL_CALLEE_FULL_NAME)
                .filter(|name| *name != UNKNOWN_FULL_NAME)
                .map(str::to_string),
        ),
    };
    Some(CallEdge {
        caller_id: caller_id.to_string(),
        target,
        line: Some(row.line()),
        graph_id: None,
    })
}

/// Reads every data row of a header-first CSV stream through `convert`.
///
/// Rows that fail to decode or convert are skipped.
///
/// # Errors
/// Returns `RelationalParseError` if the header cannot be read.
pub fn read_rows<R, T, F>(reader: R, convert: F) -> Result<Vec<T>, RelationalParseError>
where
    R: Read,
    F: Fn(&RelationalRow<'_>) -> Option<T>,
{
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, name)| (name.to_string(), index))
        .collect();

    let mut output = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                debug!(row = index + 1, error = %err, "skipping undecodable row");
                continue;
            }
        };
        match convert(&RelationalRow::new(&columns, &record)) {
            Some(value) => output.push(value),
            None => debug!(row = index + 1, "skipping row without required columns"),
        }
    }
    Ok(output)
}

/// Parser for the `methods.csv` / `calls.csv` relational dump.
pub struct RelationalDumpParser;

impl RelationalDumpParser {
    /// Reads method records from a `methods.csv` file.
    ///
    /// # Errors
    /// Returns `RelationalParseError` if the file cannot be opened or has no header.
    pub fn parse_methods_file(path: impl AsRef<Path>) -> Result<Vec<MethodRecord>, RelationalParseError> {
        let file = std::fs::File::open(path)?;
        read_rows(file, parse_method_row)
    }

    /// Reads call edges from a `calls.csv` file.
    ///
    /// # Errors
    /// Returns `RelationalParseError` if the file cannot be opened or has no header.
    pub fn parse_calls_file(path: impl AsRef<Path>) -> Result<Vec<CallEdge>, RelationalParseError> {
        let file = std::fs::File::open(path)?;
        read_rows(file, parse_call_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHODS: &str = "\
method_id,full_name,signature,file,line_number
m1,pkg/a.py:foo,\"foo(a, b)\",pkg/a.py,3
m2,pkg/b.py:bar,,pkg/b.py,not-a-number
,pkg/c.py:orphan,,pkg/c.py,1
";

    const CALLS: &str = "\
caller_id,callee_id,callee_full_name
m1,m2,pkg/b.py:bar
m1,-1,print
m2,-1,<unknownFullName>
";

    #[test]
    fn reads_method_rows() {
        let methods = read_rows(METHODS.as_bytes(), parse_method_row).expect("methods parse");
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].id, "m1");
        assert_eq!(methods[0].signature.as_deref(), Some("foo(a, b)"));
        assert_eq!(methods[0].line, Some(3));
        assert_eq!(methods[1].signature, None);
        assert_eq!(methods[1].line, Some(0));
    }

    #[test]
    fn maps_sentinel_callees_to_unresolved() {
        let calls = read_rows(CALLS.as_bytes(), parse_call_row).expect("calls parse");
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].target, CallTarget::Resolved("m2".to_string()));
        assert_eq!(calls[1].target, CallTarget::Unresolved(Some("print".to_string())));
        assert_eq!(calls[2].target, CallTarget::Unresolved(None));
        assert_eq!(calls[0].line, Some(0));
    }
}
