//! Operation execution engine.
//!
//! Every primitive is a pure function of `(graph, operation)`. Nodes are
//! visited in collection order, edges in declaration order, so results are
//! reproducible run to run.
//!
//! Parameters shared by several primitives:
//! - `node_ids`: comma list restricting AGGREGATE, GROUP_BY and PROJECT to
//!   those nodes (the way a plan feeds one step into the next)
//! - `value`: literal compared against a property (MATCH, FILTER)

use crate::operation::{split_list, Operation, OperationKind, OperationResult};
use draftgraph_graph::{format_number, Error, Node, PropertyGraph, PropertyValue, Result};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

/// Group key used when a node lacks the grouping property.
pub const UNKNOWN_GROUP: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    /// The property is set, whatever its value.
    Exists,
    /// The property is not set.
    NotExists,
}

impl FilterOperator {
    /// Presence tests take no `value`.
    pub fn needs_value(self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

impl FromStr for FilterOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQUALS" => Ok(Self::Equals),
            "CONTAINS" => Ok(Self::Contains),
            "GREATER_THAN" => Ok(Self::GreaterThan),
            "LESS_THAN" => Ok(Self::LessThan),
            "EXISTS" => Ok(Self::Exists),
            "NOT_EXISTS" => Ok(Self::NotExists),
            _ => Err(Error::invalid(format!("unknown FILTER operator {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Key under which the aggregate lands in the result values.
    pub fn value_key(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COUNT" => Ok(Self::Count),
            "SUM" => Ok(Self::Sum),
            "AVG" | "AVERAGE" | "MEAN" => Ok(Self::Avg),
            "MIN" => Ok(Self::Min),
            "MAX" => Ok(Self::Max),
            _ => Err(Error::invalid(format!("unknown AGGREGATE function {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Capability {
    Unique,
    Indexed,
    Comparable,
    Aggregable,
}

impl Capability {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Indexed => "indexed",
            Self::Comparable => "comparable",
            Self::Aggregable => "aggregable",
        }
    }
}

/// Runs operations against one read-only graph.
#[derive(Debug, Clone, Copy)]
pub struct OperationExecutor<'g> {
    graph: &'g PropertyGraph,
}

impl<'g> OperationExecutor<'g> {
    pub fn new(graph: &'g PropertyGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g PropertyGraph {
        self.graph
    }

    pub fn execute(&self, op: &Operation) -> Result<OperationResult> {
        let result = match op.kind {
            OperationKind::Match => self.match_node(op),
            OperationKind::Filter => self.filter(op),
            OperationKind::Compare => self.compare(op),
            OperationKind::Traverse => self.traverse(op),
            OperationKind::Aggregate => self.aggregate(op),
            OperationKind::GroupBy => self.group_by(op),
            OperationKind::Project => self.project(op),
            OperationKind::Join => self.join(op),
        }?;

        tracing::debug!(
            kind = %op.kind,
            target_type = %op.target_type,
            matched = result.node_ids.len(),
            processed = result.processed,
            "executed operation"
        );
        Ok(result)
    }

    /// Nodes of the target type (every type when empty), in collection order.
    fn nodes(&self, op: &Operation) -> Vec<&'g Node> {
        if op.target_type.is_empty() {
            self.graph.nodes().collect()
        } else {
            self.graph.nodes_of_type(&op.target_type).iter().collect()
        }
    }

    /// `nodes`, narrowed by an optional `node_ids` parameter. A present but
    /// empty `node_ids` selects nothing.
    fn scoped_nodes(&self, op: &Operation) -> Vec<&'g Node> {
        let nodes = self.nodes(op);
        match op.list("node_ids") {
            Some(ids) => {
                let wanted: HashSet<&str> = ids.into_iter().collect();
                nodes.into_iter().filter(|n| wanted.contains(n.id())).collect()
            }
            None => nodes,
        }
    }

    fn note_capability(&self, op: &Operation, property: &str, capability: Capability) {
        let declared = self
            .graph
            .schema()
            .property(&op.target_type, property)
            .is_some_and(|p| match capability {
                Capability::Unique => p.unique,
                Capability::Indexed => p.indexed,
                Capability::Comparable => p.comparable,
                Capability::Aggregable => p.aggregable,
            });
        if !declared {
            tracing::debug!(
                kind = %op.kind,
                node_type = %op.target_type,
                property,
                capability = capability.as_str(),
                "property not declared with the capability this operation uses"
            );
        }
    }

    fn match_node(&self, op: &Operation) -> Result<OperationResult> {
        let value = op.require_literal("value")?;
        let property = op.require_property()?;
        self.note_capability(op, property, Capability::Unique);

        let mut result = OperationResult::default();
        for node in self.nodes(op) {
            result.processed += 1;
            if node.string(property) == Some(value) {
                let id = node.id();
                result.node_ids.push(id.to_string());
                result.provenance.push(format!("{id}.{property} = {value}"));
                result.values.insert(format!("{id}.{property}"), value.to_string());
                break;
            }
        }
        Ok(result)
    }

    fn filter(&self, op: &Operation) -> Result<OperationResult> {
        let operator: FilterOperator = op.parameter("operator").unwrap_or("EQUALS").parse()?;
        let value = if operator.needs_value() {
            op.require_literal("value")?
        } else {
            ""
        };
        let property = op.require_property()?;
        self.note_capability(op, property, Capability::Indexed);

        let threshold = value.trim().parse::<f64>().ok();
        let mut result = OperationResult::default();

        for node in self.scoped_nodes(op) {
            result.processed += 1;
            let actual = node.value(property);
            let hit = match (operator, actual) {
                (FilterOperator::Exists, found) => found.is_some(),
                (FilterOperator::NotExists, found) => found.is_none(),
                (_, None) => false,
                (_, Some(PropertyValue::Text(s))) => match operator {
                    FilterOperator::Equals => s == value,
                    FilterOperator::Contains => s.contains(value),
                    _ => false,
                },
                (_, Some(numeric)) => match (actual_number(numeric), threshold) {
                    (Some(x), Some(t)) => match operator {
                        FilterOperator::Equals => x == t,
                        FilterOperator::GreaterThan => x > t,
                        FilterOperator::LessThan => x < t,
                        _ => false,
                    },
                    _ => false,
                },
            };
            if !hit {
                continue;
            }
            let id = node.id();
            result.node_ids.push(id.to_string());
            match actual {
                Some(actual) => {
                    result.provenance.push(format!("{id}.{property} = {actual}"));
                    result
                        .values
                        .insert(format!("{id}.{property}"), actual.to_string());
                }
                None => result.provenance.push(format!("{id}.{property} is not set")),
            }
        }
        Ok(result)
    }

    fn compare(&self, op: &Operation) -> Result<OperationResult> {
        let property = op.require_property()?;
        let ids = split_list(op.require("node_ids")?);
        if ids.len() < 2 {
            return Err(Error::invalid("COMPARE needs at least two node_ids"));
        }
        let tolerance = match op.parameter("tolerance") {
            Some(t) => t
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::invalid(format!("COMPARE tolerance {t:?} is not a number")))?
                .abs(),
            None => 0.0,
        };
        self.note_capability(op, property, Capability::Comparable);

        let mut observed: Vec<(&str, PropertyValue<'g>)> = Vec::with_capacity(ids.len());
        for id in &ids {
            let node = self.graph.find_node(&op.target_type, id).ok_or_else(|| {
                Error::not_found(format!("node {id} not found for COMPARE"))
            })?;
            let value = node
                .value(property)
                .ok_or_else(|| Error::not_found(format!("node {id} has no property {property}")))?;
            observed.push((id, value));
        }

        let (_, reference) = observed[0];
        let same = |v: &PropertyValue<'_>| match (actual_number(reference), actual_number(*v)) {
            (Some(a), Some(b)) => (a - b).abs() <= tolerance,
            _ => reference.to_string() == v.to_string(),
        };

        let mut result = OperationResult {
            processed: observed.len(),
            ..OperationResult::default()
        };
        let mut differing = Vec::new();
        for (id, value) in &observed {
            result.node_ids.push(id.to_string());
            result.provenance.push(format!("{id}.{property} = {value}"));
            result.values.insert(format!("{id}.{property}"), value.to_string());
            if !same(value) {
                differing.push(*id);
            }
        }
        let status = if differing.is_empty() { "EQUAL" } else { "DIFFERENT" };
        result.values.insert("status".to_string(), status.to_string());
        if !differing.is_empty() {
            result.values.insert("differing".to_string(), differing.join(","));
        }
        Ok(result)
    }

    fn traverse(&self, op: &Operation) -> Result<OperationResult> {
        let edge_type = op.require("edge_type")?;
        if self.graph.schema().edge_type(edge_type).is_none() {
            tracing::debug!(edge_type, "traversing an edge type the schema does not declare");
        }
        let starts: Option<HashSet<&str>> = op.list("start_node_ids").map(|ids| ids.into_iter().collect());

        let mut result = OperationResult::default();
        for edge in self.graph.edges_of_type(edge_type) {
            result.processed += 1;
            if starts.as_ref().is_some_and(|s| !s.contains(&*edge.source)) {
                continue;
            }
            let target = &*edge.target;
            result.node_ids.push(target.to_string());
            result.provenance.push(format!("{} -> {target}", edge.source));
            for (key, value) in &edge.properties {
                result
                    .values
                    .insert(format!("{target}.{key}"), value.to_string());
            }
        }
        Ok(result)
    }

    fn aggregate(&self, op: &Operation) -> Result<OperationResult> {
        let nodes = self.scoped_nodes(op);

        if let Some(group_key) = op.parameter("group_by") {
            self.note_capability(op, group_key, Capability::Indexed);
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            let mut result = OperationResult {
                processed: nodes.len(),
                ..OperationResult::default()
            };
            for node in &nodes {
                let group = group_of(node, group_key);
                result.node_ids.push(node.id().to_string());
                result.provenance.push(format!("{} -> {group}", node.id()));
                *counts.entry(group).or_default() += 1;
            }
            result.values = counts
                .into_iter()
                .map(|(group, n)| (group, n.to_string()))
                .collect();
            return Ok(result);
        }

        let function: AggregateFunction = op.require("function")?.parse()?;
        if function == AggregateFunction::Count {
            let mut result = OperationResult {
                processed: nodes.len(),
                node_ids: nodes.iter().map(|n| n.id().to_string()).collect(),
                ..OperationResult::default()
            };
            result
                .values
                .insert("count".to_string(), nodes.len().to_string());
            return Ok(result);
        }

        let property = op.require_property()?;
        self.note_capability(op, property, Capability::Aggregable);

        let mut result = OperationResult::default();
        let mut contributions = Vec::new();
        for node in &nodes {
            let Some(x) = node.value(property).and_then(actual_number) else {
                continue;
            };
            result.node_ids.push(node.id().to_string());
            result
                .provenance
                .push(format!("{}.{property} = {}", node.id(), format_number(x)));
            contributions.push(x);
        }
        result.processed = contributions.len();

        let sum: f64 = contributions.iter().sum();
        let aggregate = match function {
            AggregateFunction::Sum => Some(sum),
            AggregateFunction::Avg if contributions.is_empty() => Some(0.0),
            AggregateFunction::Avg => Some(sum / contributions.len() as f64),
            AggregateFunction::Min => contributions.iter().copied().reduce(f64::min),
            AggregateFunction::Max => contributions.iter().copied().reduce(f64::max),
            AggregateFunction::Count => None,
        };
        if let Some(value) = aggregate {
            result
                .values
                .insert(function.value_key().to_string(), format_number(value));
        }
        Ok(result)
    }

    fn group_by(&self, op: &Operation) -> Result<OperationResult> {
        let key = match op.parameter("group_by") {
            Some(key) => key,
            None => op.require_property()?,
        };
        self.note_capability(op, key, Capability::Indexed);

        let nodes = self.scoped_nodes(op);
        let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        let mut result = OperationResult {
            processed: nodes.len(),
            ..OperationResult::default()
        };
        for node in &nodes {
            let group = group_of(node, key);
            result.node_ids.push(node.id().to_string());
            result.provenance.push(format!("{} -> {group}", node.id()));
            groups.entry(group).or_default().push(node.id());
        }
        result.values = groups
            .into_iter()
            .map(|(group, ids)| (group, ids.join(",")))
            .collect();
        Ok(result)
    }

    fn project(&self, op: &Operation) -> Result<OperationResult> {
        let properties: Vec<&str> = match op.list("properties") {
            Some(list) if !list.is_empty() => list,
            _ => vec![op.require_property()?],
        };

        let nodes = self.scoped_nodes(op);
        let mut result = OperationResult {
            processed: nodes.len(),
            ..OperationResult::default()
        };
        for node in &nodes {
            let id = node.id();
            result.node_ids.push(id.to_string());
            result.provenance.push(format!("{}:{id}", node.node_type()));
            for property in &properties {
                if let Some(value) = node.value(property) {
                    result.values.insert(format!("{id}.{property}"), value.to_string());
                }
            }
        }
        Ok(result)
    }

    fn join(&self, op: &Operation) -> Result<OperationResult> {
        let edge_type = op.require("edge_type")?;
        let left: HashSet<&str> = op.require_list("left_node_ids")?.into_iter().collect();
        let right: HashSet<&str> = op.require_list("right_node_ids")?.into_iter().collect();

        let mut result = OperationResult::default();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut pairs: BTreeMap<String, Vec<&str>> = BTreeMap::new();

        for edge in self.graph.edges_of_type(edge_type) {
            result.processed += 1;
            let (source, target) = (&*edge.source, &*edge.target);
            if !left.contains(source) || !right.contains(target) {
                continue;
            }
            for id in [source, target] {
                if seen.insert(id) {
                    result.node_ids.push(id.to_string());
                }
            }
            result.provenance.push(format!("{source} -> {target}"));
            let targets = pairs.entry(source.to_string()).or_default();
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        result.values = pairs
            .into_iter()
            .map(|(source, targets)| (source, targets.join(",")))
            .collect();
        Ok(result)
    }
}

fn actual_number(value: PropertyValue<'_>) -> Option<f64> {
    value.as_f64()
}

fn group_of(node: &Node, key: &str) -> String {
    node.value(key)
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
}
