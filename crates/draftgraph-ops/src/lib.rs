//! Draftgraph operations
//!
//! Eight generic primitives over a property graph, composed into plans:
//!
//! | kind | answers |
//! |---|---|
//! | MATCH | the node with a given identifying value |
//! | FILTER | every node passing a string or numeric test |
//! | COMPARE | whether a property agrees across nodes |
//! | TRAVERSE | where edges of a type lead |
//! | AGGREGATE | counts, sums, means, extremes, or counts per group |
//! | GROUP_BY | node ids per property value |
//! | PROJECT | selected properties of each node |
//! | JOIN | edge-connected pairs between two node sets |
//!
//! Plans come from a [`PlanComposer`] (natural language to JSON) decoded by
//! [`parse_plan`], or are built directly.

pub mod codec;
pub mod engine;
pub mod operation;
pub mod plan;
pub mod prompt;
pub mod query;

pub use codec::parse_plan;
pub use engine::{AggregateFunction, FilterOperator, OperationExecutor, UNKNOWN_GROUP};
pub use operation::{Operation, OperationKind, OperationPlan, OperationResult};
pub use plan::{execute_plan, PlanError, PlanExecution};
pub use prompt::{describe_schema, render_prompt};
pub use query::{
    CannedComposer, CompositionRequest, PlanComposer, QueryError, QueryResponse, QueryService,
};
