//! Natural-language query service.
//!
//! The service renders the graph's schema into a prompt, asks a
//! [`PlanComposer`] for a plan, decodes it and runs it. The composer is the
//! only external piece; no network client ships with this crate.

use crate::codec::parse_plan;
use crate::operation::{OperationPlan, OperationResult};
use crate::plan::{execute_plan, PlanError};
use crate::prompt::{describe_schema, render_prompt};
use async_trait::async_trait;
use draftgraph_graph::{Error, ErrorKind, PropertyGraph, Schema};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Everything a composer may use to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionRequest {
    pub schema_description: String,
    pub query: String,
    /// Ready-to-send prompt built from the two fields above.
    pub prompt: String,
}

impl CompositionRequest {
    pub fn new(schema: &Schema, query: &str) -> Self {
        Self {
            schema_description: describe_schema(schema),
            query: query.to_string(),
            prompt: render_prompt(schema, query),
        }
    }
}

/// Turns a query into plan text (usually JSON, possibly wrapped in prose).
#[async_trait]
pub trait PlanComposer: Send + Sync {
    async fn compose(&self, request: &CompositionRequest) -> Result<String, Error>;
}

/// Replays a fixed response, e.g. a plan saved to disk.
#[derive(Debug, Clone)]
pub struct CannedComposer {
    response: String,
}

impl CannedComposer {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl PlanComposer for CannedComposer {
    async fn compose(&self, _request: &CompositionRequest) -> Result<String, Error> {
        Ok(self.response.clone())
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("plan composer failed: {0}")]
    Compose(#[source] Error),

    #[error("composed plan rejected: {0}")]
    Plan(#[source] Error),

    #[error(transparent)]
    Execution(#[from] PlanError),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Compose(_) => ErrorKind::External,
            Self::Plan(err) => err.kind(),
            Self::Execution(err) => err.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub plan: OperationPlan,
    pub result: OperationResult,
    pub steps: Vec<OperationResult>,
    pub elapsed_ms: u64,
}

pub struct QueryService<C> {
    composer: C,
}

impl<C: PlanComposer> QueryService<C> {
    pub fn new(composer: C) -> Self {
        Self { composer }
    }

    pub fn composer(&self) -> &C {
        &self.composer
    }

    pub async fn answer(&self, graph: &PropertyGraph, query: &str) -> Result<QueryResponse, QueryError> {
        let started = Instant::now();
        let request = CompositionRequest::new(graph.schema(), query);

        let raw = self
            .composer
            .compose(&request)
            .await
            .map_err(QueryError::Compose)?;
        let plan = parse_plan(&raw, query).map_err(QueryError::Plan)?;
        tracing::debug!(steps = plan.len(), query, "composed plan");

        let execution = execute_plan(graph, &plan)?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(query, steps = plan.len(), elapsed_ms, "answered query");

        Ok(QueryResponse {
            plan,
            result: execution.result,
            steps: execution.steps,
            elapsed_ms,
        })
    }
}
