//! Property graph data model: nodes, edges, stats and the graph container.

use crate::interner::SharedStr;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Render a number the way every result map does: shortest round-trip form,
/// so `3.0` prints as `3` and `1.25` stays `1.25`.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

/// Borrowed view of a property value, whichever map it lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue<'a> {
    Text(&'a str),
    Number(f64),
    Count(i64),
}

impl<'a> PropertyValue<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric reading of the value. Counts widen to f64; text does not parse.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Text(_) => None,
            Self::Number(v) => Some(*v),
            Self::Count(v) => Some(*v as f64),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text(_))
    }
}

impl fmt::Display for PropertyValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(v) => f.write_str(&format_number(*v)),
            Self::Count(v) => write!(f, "{v}"),
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A graph node. A key lives in exactly one of the three property maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: SharedStr,
    #[serde(rename = "type")]
    node_type: SharedStr,
    #[serde(default)]
    string_props: BTreeMap<SharedStr, SharedStr>,
    #[serde(default)]
    numeric_props: BTreeMap<SharedStr, f64>,
    #[serde(default)]
    int_props: BTreeMap<SharedStr, i64>,
}

impl Node {
    pub fn new(id: impl Into<SharedStr>, node_type: impl Into<SharedStr>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            string_props: BTreeMap::new(),
            numeric_props: BTreeMap::new(),
            int_props: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn shared_id(&self) -> &SharedStr {
        &self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn set_string(&mut self, key: impl Into<SharedStr>, value: impl Into<SharedStr>) {
        let key = key.into();
        self.numeric_props.remove(&key);
        self.int_props.remove(&key);
        self.string_props.insert(key, value.into());
    }

    pub fn set_numeric(&mut self, key: impl Into<SharedStr>, value: f64) {
        let key = key.into();
        self.string_props.remove(&key);
        self.int_props.remove(&key);
        self.numeric_props.insert(key, value);
    }

    pub fn set_int(&mut self, key: impl Into<SharedStr>, value: i64) {
        let key = key.into();
        self.string_props.remove(&key);
        self.numeric_props.remove(&key);
        self.int_props.insert(key, value);
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.string_props.get(key).map(|v| &**v)
    }

    pub fn numeric(&self, key: &str) -> Option<f64> {
        self.numeric_props.get(key).copied()
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.int_props.get(key).copied()
    }

    pub fn value(&self, key: &str) -> Option<PropertyValue<'_>> {
        if let Some(s) = self.string(key) {
            return Some(PropertyValue::Text(s));
        }
        if let Some(v) = self.numeric(key) {
            return Some(PropertyValue::Number(v));
        }
        self.int(key).map(PropertyValue::Count)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.string_props.contains_key(key)
            || self.numeric_props.contains_key(key)
            || self.int_props.contains_key(key)
    }

    pub fn string_props(&self) -> impl Iterator<Item = (&str, &str)> {
        self.string_props.iter().map(|(k, v)| (&**k, &**v))
    }

    pub fn numeric_props(&self) -> impl Iterator<Item = (&str, f64)> {
        self.numeric_props.iter().map(|(k, v)| (&**k, *v))
    }

    pub fn int_props(&self) -> impl Iterator<Item = (&str, i64)> {
        self.int_props.iter().map(|(k, v)| (&**k, *v))
    }

    /// Every property in key order, regardless of which map holds it.
    pub fn properties(&self) -> Vec<(&str, PropertyValue<'_>)> {
        let mut all: Vec<(&str, PropertyValue<'_>)> = self
            .string_props()
            .map(|(k, v)| (k, PropertyValue::Text(v)))
            .chain(self.numeric_props().map(|(k, v)| (k, PropertyValue::Number(v))))
            .chain(self.int_props().map(|(k, v)| (k, PropertyValue::Count(v))))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn property_count(&self) -> usize {
        self.string_props.len() + self.numeric_props.len() + self.int_props.len()
    }
}

// ============================================================================
// Edges
// ============================================================================

/// A directed, typed edge. Endpoints are node ids; they are not required to
/// resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: SharedStr,
    #[serde(rename = "type")]
    pub edge_type: SharedStr,
    pub source: SharedStr,
    pub target: SharedStr,
    #[serde(default)]
    pub properties: BTreeMap<SharedStr, SharedStr>,
}

impl Edge {
    pub fn new(
        id: impl Into<SharedStr>,
        edge_type: impl Into<SharedStr>,
        source: impl Into<SharedStr>,
        target: impl Into<SharedStr>,
    ) -> Self {
        Self {
            id: id.into(),
            edge_type: edge_type.into(),
            source: source.into(),
            target: target.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<SharedStr>, value: impl Into<SharedStr>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|v| &**v)
    }
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_per_type: BTreeMap<String, usize>,
    pub edges_per_type: BTreeMap<String, usize>,
}

impl Stats {
    /// Element-wise sum, used to check merge results.
    pub fn combined(&self, other: &Stats) -> Stats {
        let mut out = self.clone();
        out.node_count += other.node_count;
        out.edge_count += other.edge_count;
        for (t, n) in &other.nodes_per_type {
            *out.nodes_per_type.entry(t.clone()).or_default() += n;
        }
        for (t, n) in &other.edges_per_type {
            *out.edges_per_type.entry(t.clone()).or_default() += n;
        }
        out
    }
}

// ============================================================================
// Graph
// ============================================================================

/// Nodes grouped by type (insertion order kept inside each group), a flat
/// edge list, the schema and free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGraph {
    nodes_by_type: BTreeMap<SharedStr, Vec<Node>>,
    edges: Vec<Edge>,
    schema: Schema,
    metadata: BTreeMap<String, String>,
    stats: Stats,
}

impl PropertyGraph {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.nodes_by_type.keys().map(|k| &**k)
    }

    /// Nodes of one type in insertion order; empty for unknown types.
    pub fn nodes_of_type(&self, node_type: &str) -> &[Node] {
        self.nodes_by_type
            .get(node_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes_by_type.values().flatten()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_of_type<'a>(&'a self, edge_type: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &*e.edge_type == edge_type)
    }

    /// First node with `id`, searched in `node_type` or, when the type is
    /// empty, across every type.
    pub fn find_node(&self, node_type: &str, id: &str) -> Option<&Node> {
        if node_type.is_empty() {
            self.nodes().find(|n| n.id() == id)
        } else {
            self.nodes_of_type(node_type).iter().find(|n| n.id() == id)
        }
    }

    pub fn node_count(&self) -> usize {
        self.stats.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.stats.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.stats.node_count == 0 && self.stats.edge_count == 0
    }

    /// Append a node to its type's collection. Stats follow incrementally.
    pub fn add_node(&mut self, node: Node) {
        self.stats.node_count += 1;
        *self
            .stats
            .nodes_per_type
            .entry(node.node_type().to_string())
            .or_default() += 1;
        self.nodes_by_type
            .entry(node.node_type.clone())
            .or_default()
            .push(node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.stats.edge_count += 1;
        *self
            .stats
            .edges_per_type
            .entry(edge.edge_type.to_string())
            .or_default() += 1;
        self.edges.push(edge);
    }

    /// Rebuild stats from the stored nodes and edges.
    pub fn recompute_stats(&mut self) {
        let mut stats = Stats::default();
        for (node_type, nodes) in &self.nodes_by_type {
            if nodes.is_empty() {
                continue;
            }
            stats.node_count += nodes.len();
            stats.nodes_per_type.insert(node_type.to_string(), nodes.len());
        }
        for edge in &self.edges {
            stats.edge_count += 1;
            *stats.edges_per_type.entry(edge.edge_type.to_string()).or_default() += 1;
        }
        self.stats = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_kinds_are_exclusive_per_key() {
        let mut node = Node::new("1A", "Entity");
        node.set_string("gc_40", "wide");
        node.set_numeric("gc_40", 2.5);
        assert_eq!(node.string("gc_40"), None);
        assert_eq!(node.numeric("gc_40"), Some(2.5));

        node.set_int("gc_40", 3);
        assert_eq!(node.numeric("gc_40"), None);
        assert_eq!(node.value("gc_40"), Some(PropertyValue::Count(3)));
        assert_eq!(node.property_count(), 1);
    }

    #[test]
    fn numbers_render_in_shortest_form() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(1.25), "1.25");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(PropertyValue::Number(10.0).to_string(), "10");
    }

    #[test]
    fn stats_track_incremental_adds_and_recompute() {
        let mut graph = PropertyGraph::default();
        graph.add_node(Node::new("a", "Entity"));
        graph.add_node(Node::new("b", "Entity"));
        graph.add_node(Node::new("block_A", "Block"));
        graph.add_edge(Edge::new("e1", "REFERENCES", "a", "block_A"));

        let incremental = graph.stats().clone();
        graph.recompute_stats();
        assert_eq!(&incremental, graph.stats());
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.stats().nodes_per_type["Entity"], 2);
        assert_eq!(graph.stats().edges_per_type["REFERENCES"], 1);
    }

    #[test]
    fn lookups_respect_type_and_order() {
        let mut graph = PropertyGraph::default();
        graph.add_node(Node::new("x", "Layer"));
        graph.add_node(Node::new("a", "Entity"));
        graph.add_node(Node::new("b", "Entity"));

        let ids: Vec<&str> = graph.nodes_of_type("Entity").iter().map(Node::id).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(graph.nodes_of_type("Missing").is_empty());
        assert!(graph.find_node("", "x").is_some());
        assert!(graph.find_node("Entity", "x").is_none());
    }
}
