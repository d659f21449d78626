use callgraph_store::models::FunctionDetails;
use serde::{Deserialize, Serialize};

use super::{CallGraphControlPlane, ControlError};

pub const DEFAULT_MAX_DEPTH: i64 = 3;

const FUNCTION_NOT_FOUND: &str = "Function not found";

/// Result of a callers lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallersResponse {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    pub callers: Vec<String>,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a callees lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalleesResponse {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    pub callees: Vec<String>,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDetailsResponse {
    pub function: String,
    pub details: Option<FunctionDetails>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<String>,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a bounded call-chain walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallChainResponse {
    pub function: String,
    pub max_depth: i64,
    pub chain: Vec<String>,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallGraphControlPlane {
    /// Lists the full names of functions that call `function`.
    pub async fn get_callers(&self, function: &str, graph: Option<&str>) -> CallersResponse {
        let outcome = self.callers(function, graph).await;
        let (callers, error) = split_outcome(outcome);
        CallersResponse {
            function: function.to_string(),
            graph: graph.map(str::to_string),
            count: callers.len(),
            callers,
            success: error.is_none(),
            error,
        }
    }

    /// Lists the full names of functions that `function` calls.
    pub async fn get_callees(&self, function: &str, graph: Option<&str>) -> CalleesResponse {
        let outcome = self.callees(function, graph).await;
        let (callees, error) = split_outcome(outcome);
        CalleesResponse {
            function: function.to_string(),
            graph: graph.map(str::to_string),
            count: callees.len(),
            callees,
            success: error.is_none(),
            error,
        }
    }

    /// Describes the first definition registered under `function`.
    pub async fn get_function_details(&self, function: &str) -> FunctionDetailsResponse {
        match self.function_details(function).await {
            Ok(details) => FunctionDetailsResponse {
                function: function.to_string(),
                details: Some(details),
                success: true,
                error: None,
            },
            Err(err) => FunctionDetailsResponse {
                function: function.to_string(),
                details: None,
                success: false,
                error: Some(err.to_string()),
            },
        }
    }

    pub async fn search_functions(&self, query: &str) -> SearchResponse {
        let outcome = self.search(query).await;
        let (results, error) = split_outcome(outcome);
        SearchResponse {
            query: query.to_string(),
            count: results.len(),
            results,
            success: error.is_none(),
            error,
        }
    }

    /// Walks callees from `function` up to `max_depth` levels.
    ///
    /// `None` uses [`DEFAULT_MAX_DEPTH`]; negative depths are rejected.
    pub async fn get_call_chain(&self, function: &str, max_depth: Option<i64>) -> CallChainResponse {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let outcome = self.call_chain(function, max_depth).await;
        let (chain, error) = split_outcome(outcome);
        CallChainResponse {
            function: function.to_string(),
            max_depth,
            count: chain.len(),
            chain,
            success: error.is_none(),
            error,
        }
    }

    /// # Errors
    /// Returns `ControlError::Load` if the index could not be built.
    pub async fn callers(&self, function: &str, graph: Option<&str>) -> Result<Vec<String>, ControlError> {
        Ok(self.index().await?.callers(function, graph))
    }

    /// # Errors
    /// Returns `ControlError::Load` if the index could not be built.
    pub async fn callees(&self, function: &str, graph: Option<&str>) -> Result<Vec<String>, ControlError> {
        Ok(self.index().await?.callees(function, graph))
    }

    /// # Errors
    /// Returns `ControlError::Load` if the index could not be built, or
    /// `ControlError::NotFound` if no definition has that short name.
    pub async fn function_details(&self, function: &str) -> Result<FunctionDetails, ControlError> {
        self.index()
            .await?
            .function_details(function)
            .ok_or_else(|| ControlError::NotFound(FUNCTION_NOT_FOUND.to_string()))
    }

    /// # Errors
    /// Returns `ControlError::Load` if the index could not be built.
    pub async fn search(&self, query: &str) -> Result<Vec<String>, ControlError> {
        Ok(self.index().await?.search(query))
    }

    /// # Errors
    /// Returns `ControlError::InvalidInput` for a negative depth, or
    /// `ControlError::Load` if the index could not be built.
    pub async fn call_chain(&self, function: &str, max_depth: i64) -> Result<Vec<String>, ControlError> {
        let depth = usize::try_from(max_depth).map_err(|_| {
            ControlError::InvalidInput(format!("max_depth must be non-negative, got {max_depth}"))
        })?;
        Ok(self.index().await?.call_chain(function, depth))
    }
}

fn split_outcome<T: Default>(outcome: Result<T, ControlError>) -> (T, Option<String>) {
    match outcome {
        Ok(value) => (value, None),
        Err(err) => (T::default(), Some(err.to_string())),
    }
}
