use std::{error::Error, fmt, sync::Arc};

use crate::services::{IndexLoader, LoaderState};
use crate::store::CallGraphIndex;

pub mod data;
pub mod ingest;
pub mod metadata;

pub use data::{
    CallChainResponse,
    CalleesResponse,
    CallersResponse,
    DEFAULT_MAX_DEPTH,
    FunctionDetailsResponse,
    SearchResponse,
};
pub use ingest::{LoadError, SnapshotSource, load_snapshot};
pub use metadata::{GraphsResponse, SourceFile, StatsResponse};

#[derive(Debug)]
pub enum ControlError {
    Load(LoadError),
    InvalidInput(String),
    NotFound(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ControlError {}

impl From<LoadError> for ControlError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

/// Query surface over the lazily loaded call graph.
///
/// Every operation loads the index on first use and reports failures inside
/// its response instead of returning them.
#[derive(Clone)]
pub struct CallGraphControlPlane {
    loader: IndexLoader,
}

impl CallGraphControlPlane {
    #[must_use]
    pub const fn new(loader: IndexLoader) -> Self {
        Self { loader }
    }

    #[must_use]
    pub fn from_source(source: SnapshotSource) -> Self {
        Self::new(IndexLoader::from_source(source))
    }

    #[must_use]
    pub const fn loader(&self) -> &IndexLoader {
        &self.loader
    }

    #[must_use]
    pub fn loader_state(&self) -> LoaderState {
        self.loader.state()
    }

    async fn index(&self) -> Result<Arc<CallGraphIndex>, ControlError> {
        Ok(self.loader.ensure_loaded().await?)
    }
}
