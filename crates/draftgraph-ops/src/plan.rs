//! Plan runner.
//!
//! Steps run in order, each against the original graph. The only channel
//! between steps is an explicit reference: a parameter whose whole value is
//! `$step<N>` (1-based) is replaced by the comma-joined node ids of step N.

use crate::engine::OperationExecutor;
use crate::operation::{Operation, OperationKind, OperationPlan, OperationResult};
use draftgraph_graph::{Error, ErrorKind, PropertyGraph};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan has no operations")]
    Empty,

    #[error("plan step {step} ({operation}) failed: {source}")]
    Step {
        /// 1-based index of the failing step.
        step: usize,
        operation: OperationKind,
        #[source]
        source: Error,
        /// Results of the steps that finished before the failure.
        completed: Vec<OperationResult>,
    },
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty => ErrorKind::InvalidArgument,
            Self::Step { source, .. } => source.kind(),
        }
    }

    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::Step { step, .. } => Some(*step),
        }
    }

    pub fn completed(&self) -> &[OperationResult] {
        match self {
            Self::Empty => &[],
            Self::Step { completed, .. } => completed,
        }
    }
}

/// Outcome of a whole plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanExecution {
    /// The plan's answer: the last step's result.
    pub result: OperationResult,
    /// Every step's result in plan order, the last one included.
    pub steps: Vec<OperationResult>,
}

impl<'g> OperationExecutor<'g> {
    pub fn execute_plan(&self, plan: &OperationPlan) -> Result<PlanExecution, PlanError> {
        if plan.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut steps: Vec<OperationResult> = Vec::with_capacity(plan.len());
        for (index, op) in plan.operations.iter().enumerate() {
            let step = index + 1;
            let outcome = resolve_step_refs(op, &steps).and_then(|op| self.execute(&op));
            match outcome {
                Ok(result) => steps.push(result),
                Err(source) => {
                    tracing::warn!(step, operation = %op.kind, error = %source, "plan step failed");
                    return Err(PlanError::Step {
                        step,
                        operation: op.kind,
                        source,
                        completed: steps,
                    });
                }
            }
        }

        tracing::debug!(steps = steps.len(), query = %plan.query, "executed plan");
        let result = steps.last().cloned().unwrap_or_default();
        Ok(PlanExecution { result, steps })
    }
}

/// Run a plan against `graph`.
pub fn execute_plan(graph: &PropertyGraph, plan: &OperationPlan) -> Result<PlanExecution, PlanError> {
    OperationExecutor::new(graph).execute_plan(plan)
}

fn resolve_step_refs(op: &Operation, completed: &[OperationResult]) -> Result<Operation, Error> {
    let mut resolved = op.clone();
    for value in resolved.parameters.values_mut() {
        let Some(n) = value.trim().strip_prefix("$step") else {
            continue;
        };
        let n: usize = n
            .parse()
            .map_err(|_| Error::invalid(format!("malformed step reference {value:?}")))?;
        let earlier = n
            .checked_sub(1)
            .and_then(|i| completed.get(i))
            .ok_or_else(|| {
                Error::invalid(format!(
                    "step reference {value:?} points at a step that has not run"
                ))
            })?;
        *value = earlier.node_ids.join(",");
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftgraph_graph::{dxf_schema, Edge, Node};

    fn graph() -> PropertyGraph {
        let mut graph = PropertyGraph::new(dxf_schema(""));
        for (id, block, layer) in [("1", "A", "PARTS"), ("2", "B", "PARTS"), ("3", "A", "HIDDEN")] {
            let mut node = Node::new(id, "Entity");
            node.set_string("type", "INSERT");
            node.set_string("layer", layer);
            node.set_string("gc_2", block);
            graph.add_node(node);
            graph.add_edge(Edge::new(
                format!("edge_{id}_ref_{block}"),
                "REFERENCES",
                id,
                format!("block_{block}"),
            ));
        }
        graph
    }

    fn count_by_block() -> Operation {
        Operation::new(OperationKind::Aggregate)
            .on("Entity")
            .param("group_by", "gc_2")
    }

    #[test]
    fn last_step_is_the_answer_and_steps_are_independent() {
        let g = graph();
        let plan = OperationPlan::new(
            "count parts",
            vec![
                Operation::new(OperationKind::Filter)
                    .on("Entity")
                    .property("layer")
                    .param("value", "PARTS"),
                count_by_block(),
            ],
        );
        let run = execute_plan(&g, &plan).unwrap();
        assert_eq!(run.steps.len(), 2);
        // The FILTER does not narrow the AGGREGATE.
        assert_eq!(run.result.value("A"), Some("2"));
        assert_eq!(run.result, run.steps[1]);
    }

    #[test]
    fn step_references_pipe_node_ids_forward() {
        let g = graph();
        let plan = OperationPlan::new(
            "count parts on PARTS",
            vec![
                Operation::new(OperationKind::Filter)
                    .on("Entity")
                    .property("layer")
                    .param("value", "PARTS"),
                count_by_block().param("node_ids", "$step1"),
                Operation::new(OperationKind::Traverse)
                    .param("edge_type", "REFERENCES")
                    .param("start_node_ids", "$step1"),
            ],
        );
        let run = execute_plan(&g, &plan).unwrap();
        assert_eq!(run.steps[1].value("A"), Some("1"));
        assert_eq!(run.steps[1].value("B"), Some("1"));
        assert_eq!(run.result.node_ids, ["block_A", "block_B"]);
    }

    #[test]
    fn referencing_an_empty_step_stays_empty() {
        let g = graph();
        let plan = OperationPlan::new(
            "parts on a missing layer",
            vec![
                Operation::new(OperationKind::Filter)
                    .on("Entity")
                    .property("layer")
                    .param("value", "NOPE"),
                count_by_block().param("node_ids", "$step1"),
                Operation::new(OperationKind::Traverse)
                    .param("edge_type", "REFERENCES")
                    .param("start_node_ids", "$step1"),
            ],
        );
        let run = execute_plan(&g, &plan).unwrap();
        assert!(run.steps[0].node_ids.is_empty());
        assert!(run.steps[1].values.is_empty());
        assert_eq!(run.steps[1].processed, 0);
        assert!(run.result.node_ids.is_empty());
        assert_eq!(run.result.processed, 3);
    }

    #[test]
    fn failure_reports_step_and_keeps_completed_results() {
        let g = graph();
        let plan = OperationPlan::new(
            "broken",
            vec![
                count_by_block(),
                Operation::new(OperationKind::Match).on("Entity").property("handle"),
                count_by_block(),
            ],
        );
        let err = execute_plan(&g, &plan).unwrap_err();
        assert_eq!(err.step(), Some(2));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.completed().len(), 1);
        assert!(err.to_string().starts_with("plan step 2 (MATCH) failed"));
    }

    #[test]
    fn forward_references_and_empty_plans_are_rejected() {
        let g = graph();
        let plan = OperationPlan::new("ahead", vec![count_by_block().param("node_ids", "$step2")]);
        let err = execute_plan(&g, &plan).unwrap_err();
        assert_eq!(err.step(), Some(1));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let zero = OperationPlan::new("zero", vec![count_by_block().param("node_ids", "$step0")]);
        assert!(execute_plan(&g, &zero).is_err());

        let empty = execute_plan(&g, &OperationPlan::default()).unwrap_err();
        assert!(matches!(empty, PlanError::Empty));
        assert_eq!(empty.kind(), ErrorKind::InvalidArgument);
    }
}
