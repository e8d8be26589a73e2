//! Merging several built graphs into one.

use crate::interner::SharedStr;
use crate::model::PropertyGraph;

const SOURCE_DRAWING: &str = "source_drawing";

impl PropertyGraph {
    /// Append every node and edge of `other`, stamping them with
    /// `source_drawing = drawing` unless they already carry one.
    ///
    /// Ids are kept as they are; two drawings may contribute the same id.
    /// The receiving graph keeps its schema unless it has none yet.
    pub fn absorb(&mut self, drawing: &str, other: &PropertyGraph) {
        if self.schema().node_types.is_empty() {
            self.set_schema(other.schema().clone());
        }

        let key: SharedStr = SharedStr::from(SOURCE_DRAWING);
        let label: SharedStr = SharedStr::from(drawing);

        for node in other.nodes() {
            let mut node = node.clone();
            if !node.has_property(SOURCE_DRAWING) {
                node.set_string(key.clone(), label.clone());
            }
            self.add_node(node);
        }
        for edge in other.edges() {
            let mut edge = edge.clone();
            edge.properties
                .entry(key.clone())
                .or_insert_with(|| label.clone());
            self.add_edge(edge);
        }

        for (k, v) in other.metadata() {
            if k == SOURCE_DRAWING || k == "drawings" || self.metadata().contains_key(k) {
                continue;
            }
            self.set_metadata(k.clone(), v.clone());
        }
        let drawings = match self.metadata_value("drawings") {
            Some(existing) if !existing.is_empty() => format!("{existing},{drawing}"),
            _ => drawing.to_string(),
        };
        self.set_metadata("drawings", drawings);
        self.recompute_stats();

        tracing::debug!(
            drawing,
            nodes = other.node_count(),
            edges = other.edge_count(),
            "absorbed drawing graph"
        );
    }
}

/// Merge labelled graphs in order. The first graph's schema wins.
pub fn merge_graphs<'a>(inputs: impl IntoIterator<Item = (&'a str, &'a PropertyGraph)>) -> PropertyGraph {
    let mut merged = PropertyGraph::default();
    for (drawing, graph) in inputs {
        merged.absorb(drawing, graph);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};
    use crate::schema::dxf_schema;

    fn small(prefix: &str) -> PropertyGraph {
        let mut graph = PropertyGraph::new(dxf_schema(prefix));
        graph.add_node(Node::new(format!("{prefix}1"), "Entity"));
        graph.add_node(Node::new("block_A", "Block"));
        graph.add_edge(Edge::new("e", "REFERENCES", format!("{prefix}1"), "block_A"));
        graph.set_metadata("source_format", "DXF");
        graph
    }

    #[test]
    fn merge_stamps_provenance_and_sums_stats() {
        let a = small("a");
        let b = small("b");
        let merged = merge_graphs([("a.dxf", &a), ("b.dxf", &b)]);

        assert_eq!(merged.stats(), &a.stats().combined(b.stats()));
        assert_eq!(merged.metadata_value("drawings"), Some("a.dxf,b.dxf"));
        assert_eq!(merged.metadata_value("source_format"), Some("DXF"));
        assert_eq!(merged.schema().format_version, "a");

        let blocks = merged.nodes_of_type("Block");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].string("source_drawing"), Some("a.dxf"));
        assert_eq!(blocks[1].string("source_drawing"), Some("b.dxf"));
        assert_eq!(merged.edges()[1].property("source_drawing"), Some("b.dxf"));
    }

    #[test]
    fn existing_provenance_is_kept() {
        let first = merge_graphs([("a.dxf", &small("a"))]);
        let again = merge_graphs([("outer", &first)]);
        assert_eq!(
            again.nodes_of_type("Entity")[0].string("source_drawing"),
            Some("a.dxf")
        );
    }

    #[test]
    fn merging_nothing_is_empty() {
        let merged = merge_graphs(std::iter::empty());
        assert!(merged.is_empty());
        assert!(merged.schema().node_types.is_empty());
    }
}
