use std::future::Future;
use std::pin::Pin;
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicUsize, Ordering},
};

use futures::future::{BoxFuture, FutureExt, Shared};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::control::ingest::{LoadError, SnapshotSource};
use crate::store::CallGraphIndex;

pub type BuildIndexFuture =
    Pin<Box<dyn Future<Output = Result<CallGraphIndex, LoadError>> + Send + 'static>>;
pub type BuildIndexFn = Arc<dyn Fn() -> BuildIndexFuture + Send + Sync + 'static>;

/// Configuration for the index loader and its build function.
#[derive(Clone)]
pub struct IndexLoaderConfig {
    pub source: SnapshotSource,
    pub build_index: BuildIndexFn,
}

impl IndexLoaderConfig {
    /// Uses the default build: normalize the snapshot and index it on the
    /// blocking pool.
    #[must_use]
    pub fn new(source: SnapshotSource) -> Self {
        let build_source = source.clone();
        let build_index: BuildIndexFn = Arc::new(move || -> BuildIndexFuture {
            let source = build_source.clone();
            Box::pin(async move { build_from_snapshot(source).await })
        });
        Self {
            source,
            build_index,
        }
    }

    #[must_use]
    pub fn with_build_index(mut self, build_index: BuildIndexFn) -> Self {
        self.build_index = build_index;
        self
    }
}

/// Normalizes and indexes a snapshot without blocking the async runtime.
///
/// # Errors
/// Returns `LoadError` if the snapshot cannot be read or the blocking task fails.
pub async fn build_from_snapshot(source: SnapshotSource) -> Result<CallGraphIndex, LoadError> {
    tokio::task::spawn_blocking(move || source.load().map(CallGraphIndex::build))
        .await
        .map_err(|err| LoadError::Task(err.to_string()))?
}

/// Observable lifecycle of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderState {
    Unloaded,
    Loaded,
    Failed,
}

impl LoaderState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }
}

/// Build-once handle to the shared call-graph index.
///
/// Clones share state. The first `ensure_loaded` spawns the build as its own
/// task; every caller, including later ones, awaits that task. Dropping a
/// caller does not cancel or restart the build. The outcome is kept for the
/// life of the loader, so a failed build is never retried.
#[derive(Clone)]
pub struct IndexLoader {
    inner: Arc<IndexLoaderInner>,
}

pub type LoadOutcome = Result<Arc<CallGraphIndex>, LoadError>;
type SharedBuild = Shared<BoxFuture<'static, LoadOutcome>>;

struct IndexLoaderInner {
    build: OnceLock<SharedBuild>,
    outcome: OnceLock<LoadOutcome>,
    builds: AtomicUsize,
    config: IndexLoaderConfig,
}

impl IndexLoader {
    #[must_use]
    pub fn new(config: IndexLoaderConfig) -> Self {
        Self {
            inner: Arc::new(IndexLoaderInner {
                build: OnceLock::new(),
                outcome: OnceLock::new(),
                builds: AtomicUsize::new(0),
                config,
            }),
        }
    }

    #[must_use]
    pub fn from_source(source: SnapshotSource) -> Self {
        Self::new(IndexLoaderConfig::new(source))
    }

    /// Returns the shared index, building it on first use.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns the cached `LoadError` when the one build attempt failed.
    pub async fn ensure_loaded(&self) -> LoadOutcome {
        if let Some(outcome) = self.inner.outcome.get() {
            return outcome.clone();
        }
        let build = self.inner.build.get_or_init(|| self.spawn_build()).clone();
        let outcome = build.await;
        self.inner.outcome.get_or_init(|| outcome).clone()
    }

    fn spawn_build(&self) -> SharedBuild {
        self.inner.builds.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let root = inner.config.source.root.display().to_string();
            let outcome = match (inner.config.build_index)().await {
                Ok(index) => {
                    info!(root = %root, methods = index.methods().len(), "call graph loaded");
                    Ok(Arc::new(index))
                }
                Err(err) => {
                    error!(root = %root, error = %err, "call graph load failed");
                    Err(err)
                }
            };
            inner.outcome.get_or_init(|| outcome).clone()
        });
        async move {
            task.await
                .unwrap_or_else(|err| Err(LoadError::Task(err.to_string())))
        }
        .boxed()
        .shared()
    }

    /// The loaded index, without triggering a build.
    #[must_use]
    pub fn get(&self) -> Option<Arc<CallGraphIndex>> {
        self.inner
            .outcome
            .get()
            .and_then(|outcome| outcome.as_ref().ok())
            .cloned()
    }

    #[must_use]
    pub fn state(&self) -> LoaderState {
        match self.inner.outcome.get() {
            None => LoaderState::Unloaded,
            Some(Ok(_)) => LoaderState::Loaded,
            Some(Err(_)) => LoaderState::Failed,
        }
    }

    /// Number of build attempts started by this loader.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.inner.builds.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn source(&self) -> &SnapshotSource {
        &self.inner.config.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use callgraph_store::models::{CallEdge, GraphTables, MethodRecord, SnapshotFormat};

    fn sample_tables() -> GraphTables {
        GraphTables {
            format: SnapshotFormat::Relational,
            methods: vec![
                MethodRecord::new("m1", "a.py:foo"),
                MethodRecord::new("m2", "b.py:bar"),
            ],
            calls: vec![CallEdge::resolved("m1", "m2")],
            sources: Vec::new(),
        }
    }

    fn counting_loader(outcome: Result<(), LoadError>) -> IndexLoader {
        slow_loader(outcome, Duration::from_millis(10))
    }

    fn slow_loader(outcome: Result<(), LoadError>, delay: Duration) -> IndexLoader {
        let build: BuildIndexFn = Arc::new(move || -> BuildIndexFuture {
            let outcome = outcome.clone();
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                outcome.map(|()| CallGraphIndex::build(sample_tables()))
            })
        });
        IndexLoader::new(
            IndexLoaderConfig::new(SnapshotSource::new("unused")).with_build_index(build),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_builds_once() {
        let loader = counting_loader(Ok(()));
        assert_eq!(loader.state(), LoaderState::Unloaded);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.ensure_loaded().await })
            })
            .collect();
        let results = futures::future::join_all(handles).await;

        let first = loader.get().expect("index loaded");
        for result in results {
            let index = result.expect("task").expect("load");
            assert!(Arc::ptr_eq(&index, &first));
        }
        assert_eq!(loader.build_count(), 1);
        assert_eq!(loader.state(), LoaderState::Loaded);
    }

    #[tokio::test]
    async fn cancelled_caller_does_not_restart_build() {
        let loader = slow_loader(Ok(()), Duration::from_millis(50));
        let first = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_loaded().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        first.abort();
        assert!(first.await.expect_err("aborted").is_cancelled());
        assert_eq!(loader.build_count(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(loader.state(), LoaderState::Loaded);

        let index = loader.ensure_loaded().await.expect("load");
        assert_eq!(index.methods().len(), 2);
        assert_eq!(loader.build_count(), 1);
    }

    #[tokio::test]
    async fn late_caller_joins_in_flight_build() {
        let loader = slow_loader(Ok(()), Duration::from_millis(50));
        let first = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_loaded().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        first.abort();

        let index = loader.ensure_loaded().await.expect("load");
        assert!(Arc::ptr_eq(&index, &loader.get().expect("index loaded")));
        assert_eq!(loader.build_count(), 1);
    }

    #[tokio::test]
    async fn failure_is_terminal() {
        let failure = LoadError::Task("boom".to_string());
        let loader = counting_loader(Err(failure.clone()));

        assert_eq!(loader.ensure_loaded().await.err(), Some(failure.clone()));
        assert_eq!(loader.ensure_loaded().await.err(), Some(failure));
        assert_eq!(loader.build_count(), 1);
        assert_eq!(loader.state(), LoaderState::Failed);
        assert!(loader.get().is_none());
    }

    #[tokio::test]
    async fn default_build_reports_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = IndexLoader::from_source(SnapshotSource::new(dir.path()));
        let err = loader.ensure_loaded().await.expect_err("empty snapshot");
        assert!(matches!(err, LoadError::MissingInput { .. }));
        assert_eq!(loader.state(), LoaderState::Failed);
    }
}
