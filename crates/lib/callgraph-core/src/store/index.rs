use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use callgraph_store::models::{
    CallEdge,
    CallTarget,
    FunctionDetails,
    GraphSummary,
    GraphTables,
    IndexCounts,
    MethodRecord,
    SnapshotFormat,
};
use callgraph_store::schema::short_name;
use tracing::{info, warn};

/// Immutable in-memory index over one snapshot's method and call tables.
#[derive(Debug, Clone)]
pub struct CallGraphIndex {
    format: SnapshotFormat,
    sources: Vec<PathBuf>,
    methods: Vec<MethodRecord>,
    by_id: HashMap<String, usize>,
    by_short_name: BTreeMap<String, Vec<String>>,
    calls: Vec<CallEdge>,
    forward: HashMap<String, Vec<usize>>,
    reverse: HashMap<String, Vec<usize>>,
    unresolved_calls: usize,
    dangling_calls: usize,
}

impl CallGraphIndex {
    /// Builds the primary map, the short-name index and both adjacency
    /// directions from normalized tables.
    ///
    /// Records whose id was already seen are dropped. Calls that point at an
    /// unknown id are kept but never followed.
    #[must_use]
    pub fn build(tables: GraphTables) -> Self {
        let GraphTables {
            format,
            methods: raw_methods,
            calls,
            sources,
        } = tables;

        let mut methods = Vec::with_capacity(raw_methods.len());
        let mut by_id = HashMap::with_capacity(raw_methods.len());
        let mut by_short_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for method in raw_methods {
            if by_id.contains_key(&method.id) {
                warn!(id = %method.id, "dropping duplicate method id");
                continue;
            }
            by_id.insert(method.id.clone(), methods.len());
            by_short_name
                .entry(short_name(&method.full_name).to_string())
                .or_default()
                .push(method.id.clone());
            methods.push(method);
        }

        let mut forward: HashMap<String, Vec<usize>> = HashMap::new();
        let mut reverse: HashMap<String, Vec<usize>> = HashMap::new();
        let mut unresolved_calls = 0;
        let mut dangling_calls = 0;
        for (index, call) in calls.iter().enumerate() {
            forward.entry(call.caller_id.clone()).or_default().push(index);
            match &call.target {
                CallTarget::Resolved(target) => {
                    if !by_id.contains_key(target) {
                        dangling_calls += 1;
                    }
                    reverse.entry(target.clone()).or_default().push(index);
                }
                CallTarget::Unresolved(_) => unresolved_calls += 1,
            }
        }

        if dangling_calls > 0 {
            warn!(dangling_calls, "calls reference method ids missing from the method table");
        }
        info!(
            format = format.as_str(),
            methods = methods.len(),
            calls = calls.len(),
            unique_functions = by_short_name.len(),
            unresolved_calls,
            "call graph index built"
        );

        Self {
            format,
            sources,
            methods,
            by_id,
            by_short_name,
            calls,
            forward,
            reverse,
            unresolved_calls,
            dangling_calls,
        }
    }

    #[must_use]
    pub const fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Input files that contributed to this index.
    #[must_use]
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    #[must_use]
    pub fn methods(&self) -> &[MethodRecord] {
        &self.methods
    }

    #[must_use]
    pub fn calls(&self) -> &[CallEdge] {
        &self.calls
    }

    #[must_use]
    pub fn method(&self, id: &str) -> Option<&MethodRecord> {
        self.by_id.get(id).map(|&index| &self.methods[index])
    }

    /// Record ids sharing a short name, in first-seen order.
    #[must_use]
    pub fn candidates(&self, name: &str) -> &[String] {
        self.by_short_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Iterates the short-name index in lexicographic order.
    pub fn short_names(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.by_short_name
            .iter()
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
    }

    /// Full names of every known caller of any function named `name`.
    #[must_use]
    pub fn callers(&self, name: &str, graph: Option<&str>) -> Vec<String> {
        let mut callers = BTreeSet::new();
        for candidate in self.candidates(name) {
            for call in self.edges(&self.reverse, candidate, graph) {
                if let Some(caller) = self.method(&call.caller_id) {
                    callers.insert(caller.full_name.clone());
                }
            }
        }
        callers.into_iter().collect()
    }

    /// Full names of everything any function named `name` calls.
    ///
    /// Unresolved callees contribute their raw name when the exporter
    /// reported one.
    #[must_use]
    pub fn callees(&self, name: &str, graph: Option<&str>) -> Vec<String> {
        let mut callees = BTreeSet::new();
        for candidate in self.candidates(name) {
            for call in self.edges(&self.forward, candidate, graph) {
                match &call.target {
                    CallTarget::Resolved(target) => {
                        if let Some(callee) = self.method(target) {
                            callees.insert(callee.full_name.clone());
                        }
                    }
                    CallTarget::Unresolved(Some(raw_name)) => {
                        callees.insert(raw_name.clone());
                    }
                    CallTarget::Unresolved(None) => {}
                }
            }
        }
        callees.into_iter().collect()
    }

    /// Details for the first record registered under `name`.
    #[must_use]
    pub fn function_details(&self, name: &str) -> Option<FunctionDetails> {
        let candidates = self.candidates(name);
        let method = self.method(candidates.first()?)?;
        Some(FunctionDetails {
            method_id: method.id.clone(),
            full_name: method.full_name.clone(),
            signature: method.signature.clone().unwrap_or_default(),
            file: method.file.clone().unwrap_or_default(),
            line: method.line,
            graph_id: method.graph_id.clone(),
            candidate_count: candidates.len(),
        })
    }

    /// Short names containing `query`, case-insensitively, in sorted order.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<String> {
        let needle = query.to_lowercase();
        self.by_short_name
            .keys()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Depth-first pre-order walk over callees starting at the first record
    /// named `name`.
    ///
    /// Every record is emitted at most once per walk, so cycles terminate and
    /// the output never exceeds the record count. Depth `0` yields only the
    /// start record.
    #[must_use]
    pub fn call_chain(&self, name: &str, max_depth: usize) -> Vec<String> {
        let Some(start) = self.candidates(name).first() else {
            return Vec::new();
        };
        let mut visited: HashSet<&str> = HashSet::new();
        let mut chain = Vec::new();
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(method) = self.method(id) else {
                continue;
            };
            chain.push(method.full_name.clone());
            if depth >= max_depth {
                continue;
            }
            let children = self
                .forward
                .get(id)
                .into_iter()
                .flatten()
                .filter_map(|&index| self.calls[index].target.resolved_id())
                .filter(|target| self.by_id.contains_key(*target) && !visited.contains(*target));
            let children: Vec<&str> = children.collect();
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
        chain
    }

    /// Aggregate counts for statistics reporting.
    #[must_use]
    pub fn counts(&self) -> IndexCounts {
        IndexCounts {
            total_methods: self.methods.len(),
            total_calls: self.calls.len(),
            unique_functions: self.by_short_name.len(),
            unresolved_calls: self.unresolved_calls,
            dangling_calls: self.dangling_calls,
            graph_count: self.graph_ids().len(),
        }
    }

    /// Per-graph record and call counts, ordered by graph id.
    #[must_use]
    pub fn graphs(&self) -> Vec<GraphSummary> {
        let mut summaries: BTreeMap<&str, GraphSummary> = BTreeMap::new();
        for method in &self.methods {
            if let Some(graph_id) = method.graph_id.as_deref() {
                summary_entry(&mut summaries, graph_id).method_count += 1;
            }
        }
        for call in &self.calls {
            if let Some(graph_id) = call.graph_id.as_deref() {
                summary_entry(&mut summaries, graph_id).call_count += 1;
            }
        }
        summaries.into_values().collect()
    }

    fn graph_ids(&self) -> BTreeSet<&str> {
        self.methods
            .iter()
            .filter_map(|method| method.graph_id.as_deref())
            .chain(self.calls.iter().filter_map(|call| call.graph_id.as_deref()))
            .collect()
    }

    fn edges<'a>(
        &'a self,
        adjacency: &'a HashMap<String, Vec<usize>>,
        id: &str,
        graph: Option<&'a str>,
    ) -> impl Iterator<Item = &'a CallEdge> + 'a {
        adjacency
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.calls[index])
            .filter(move |call| graph.is_none_or(|graph| call.graph_id.as_deref() == Some(graph)))
    }
}

fn summary_entry<'a, 'b>(
    summaries: &'b mut BTreeMap<&'a str, GraphSummary>,
    graph_id: &'a str,
) -> &'b mut GraphSummary {
    summaries.entry(graph_id).or_insert_with(|| GraphSummary {
        graph_id: graph_id.to_string(),
        method_count: 0,
        call_count: 0,
    })
}
