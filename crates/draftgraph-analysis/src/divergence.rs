//! Block divergence analysis.
//!
//! Catches the "same block name, silently different content" defect across
//! drawing revisions: every Block node is fingerprinted, blocks are grouped
//! by name across drawings, and any name with more than one fingerprint is
//! reported together with the drawings that carry each variant.

use draftgraph_graph::{
    canonical_member, hash_members, BuildConfig, Error, GraphBuilder, MemberIndex, Node,
    PropertyGraph, Result, IDENTITY_KEYS,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A graph together with the label it is reported under (usually a path).
#[derive(Debug, Clone)]
pub struct DrawingGraph {
    pub label: String,
    pub graph: PropertyGraph,
}

impl DrawingGraph {
    pub fn new(label: impl Into<String>, graph: PropertyGraph) -> Self {
        Self {
            label: label.into(),
            graph,
        }
    }

    /// First Block node with this name.
    pub fn block(&self, name: &str) -> Option<&Node> {
        find_block(&self.graph, name)
    }
}

fn find_block<'g>(graph: &'g PropertyGraph, name: &str) -> Option<&'g Node> {
    graph
        .nodes_of_type("Block")
        .iter()
        .find(|n| n.string("name") == Some(name))
}

fn source_format(graph: &PropertyGraph) -> &str {
    let format = graph.schema().source_format.as_str();
    if format.is_empty() {
        graph.metadata_value("source_format").unwrap_or("DXF")
    } else {
        format
    }
}

/// Content fingerprint of a block, `sha256:<hex>`.
///
/// Members are the block's CONTAINS targets. A block built without member
/// linking falls back to the fingerprint recorded when it was built.
pub fn compute_block_hash(graph: &PropertyGraph, block: &Node) -> String {
    indexed_block_hash(graph, &MemberIndex::new(graph), block)
}

fn indexed_block_hash(graph: &PropertyGraph, index: &MemberIndex<'_>, block: &Node) -> String {
    let members = index.members(block);
    if members.is_empty() && block.int("entity_count").unwrap_or(0) > 0 {
        if let Some(recorded) = block.string("content_hash") {
            return recorded.to_string();
        }
    }
    hash_members(source_format(graph), members)
}

/// Names of blocks present in every graph, sorted.
pub fn find_shared_blocks(graphs: &[DrawingGraph]) -> Vec<String> {
    let mut graphs_iter = graphs.iter().map(|d| block_names(&d.graph));
    let Some(first) = graphs_iter.next() else {
        return Vec::new();
    };
    graphs_iter
        .fold(first, |acc, names| acc.intersection(&names).cloned().collect())
        .into_iter()
        .collect()
}

fn block_names(graph: &PropertyGraph) -> BTreeSet<String> {
    graph
        .nodes_of_type("Block")
        .iter()
        .filter_map(|n| n.string("name"))
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Pairwise comparison
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub drawing: String,
    /// `None` when the drawing's block lacks the attribute.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDifference {
    pub attribute: String,
    pub values: Vec<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDifference {
    pub left: String,
    pub right: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockComparison {
    pub block_name: String,
    pub drawings: Vec<String>,
    /// Fingerprint per drawing, aligned with `drawings`.
    pub hashes: Vec<String>,
    pub differences: Vec<AttributeDifference>,
    pub differing_pairs: Vec<PairDifference>,
}

impl BlockComparison {
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Dimensional attributes of a block: its numeric header values and member
/// count, then every descriptive attribute of each member, addressed as
/// `<position>:<TYPE>.<key>` with members ordered by handle.
fn block_attributes(index: &MemberIndex<'_>, block: &Node) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    for (key, value) in block.numeric_props() {
        if key.starts_with("gc_") && !IDENTITY_KEYS.contains(&key) {
            attrs.insert(key.to_string(), draftgraph_graph::format_number(value));
        }
    }
    if let Some(count) = block.int("entity_count") {
        attrs.insert("entity_count".to_string(), count.to_string());
    }

    let mut members: Vec<(&str, String, &Node)> = index
        .members(block)
        .into_iter()
        .map(|n| (n.string("handle").unwrap_or(""), canonical_member(n), n))
        .collect();
    members.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    for (position, (_, _, member)) in members.iter().enumerate() {
        let kind = member.string("type").unwrap_or("");
        for (key, value) in member.properties() {
            if key == "type" || IDENTITY_KEYS.contains(&key) {
                continue;
            }
            attrs.insert(format!("{position}:{kind}.{key}"), value.to_string());
        }
    }
    attrs
}

/// Compare the block named `block_name` across drawings.
pub fn compare_block_versions(block_name: &str, graphs: &[DrawingGraph]) -> Result<BlockComparison> {
    if graphs.is_empty() {
        return Err(Error::invalid("compare_block_versions needs at least one drawing"));
    }

    let mut hashes = Vec::with_capacity(graphs.len());
    let mut attributes = Vec::with_capacity(graphs.len());
    for drawing in graphs {
        let block = drawing.block(block_name).ok_or_else(|| {
            Error::not_found(format!("block {block_name} not found in {}", drawing.label))
        })?;
        let index = MemberIndex::new(&drawing.graph);
        hashes.push(indexed_block_hash(&drawing.graph, &index, block));
        attributes.push(block_attributes(&index, block));
    }

    let keys: BTreeSet<&String> = attributes.iter().flat_map(|a| a.keys()).collect();
    let mut differences = Vec::new();
    for key in keys {
        let values: Vec<Option<&String>> = attributes.iter().map(|a| a.get(key)).collect();
        if values.windows(2).all(|w| w[0] == w[1]) {
            continue;
        }
        differences.push(AttributeDifference {
            attribute: key.clone(),
            values: graphs
                .iter()
                .zip(&values)
                .map(|(d, v)| AttributeValue {
                    drawing: d.label.clone(),
                    value: v.cloned(),
                })
                .collect(),
        });
    }

    let mut differing_pairs = Vec::new();
    for i in 0..graphs.len() {
        for j in (i + 1)..graphs.len() {
            let attrs: Vec<String> = differences
                .iter()
                .filter(|d| d.values[i].value != d.values[j].value)
                .map(|d| d.attribute.clone())
                .collect();
            if !attrs.is_empty() {
                differing_pairs.push(PairDifference {
                    left: graphs[i].label.clone(),
                    right: graphs[j].label.clone(),
                    attributes: attrs,
                });
            }
        }
    }

    Ok(BlockComparison {
        block_name: block_name.to_string(),
        drawings: graphs.iter().map(|d| d.label.clone()).collect(),
        hashes,
        differences,
        differing_pairs,
    })
}

// ============================================================================
// Divergence report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVariant {
    pub hash: String,
    pub drawings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergentBlock {
    pub name: String,
    /// Distinct fingerprints in order of first appearance.
    pub variants: Vec<BlockVariant>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDivergenceReport {
    pub drawings: Vec<String>,
    /// Distinct block names seen across all drawings.
    pub blocks_analyzed: usize,
    pub divergent: Vec<DivergentBlock>,
}

impl BlockDivergenceReport {
    pub fn is_clean(&self) -> bool {
        self.divergent.is_empty()
    }

    pub fn block(&self, name: &str) -> Option<&DivergentBlock> {
        self.divergent.iter().find(|b| b.name == name)
    }
}

/// Group every block by name across `graphs` and report names with more
/// than one fingerprint.
pub fn analyze_graphs(graphs: &[DrawingGraph]) -> BlockDivergenceReport {
    let mut by_name: BTreeMap<String, Vec<BlockVariant>> = BTreeMap::new();

    for drawing in graphs {
        let index = MemberIndex::new(&drawing.graph);
        for block in drawing.graph.nodes_of_type("Block") {
            let Some(name) = block.string("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            let hash = indexed_block_hash(&drawing.graph, &index, block);
            let variants = by_name.entry(name.to_string()).or_default();
            match variants.iter_mut().find(|v| v.hash == hash) {
                Some(variant) => {
                    if !variant.drawings.contains(&drawing.label) {
                        variant.drawings.push(drawing.label.clone());
                    }
                }
                None => variants.push(BlockVariant {
                    hash,
                    drawings: vec![drawing.label.clone()],
                }),
            }
        }
    }

    let blocks_analyzed = by_name.len();
    let divergent: Vec<DivergentBlock> = by_name
        .into_iter()
        .filter(|(_, variants)| variants.len() > 1)
        .map(|(name, variants)| DivergentBlock { name, variants })
        .collect();

    for block in &divergent {
        tracing::info!(
            block = %block.name,
            variants = block.variants.len(),
            "block definition diverges across drawings"
        );
    }
    tracing::info!(
        drawings = graphs.len(),
        blocks = blocks_analyzed,
        divergent = divergent.len(),
        "block divergence analysis complete"
    );

    BlockDivergenceReport {
        drawings: graphs.iter().map(|d| d.label.clone()).collect(),
        blocks_analyzed,
        divergent,
    }
}

/// Parse and build each drawing (in parallel) with `config`.
pub fn load_drawings<P: AsRef<Path> + Sync>(paths: &[P], config: &BuildConfig) -> Result<Vec<DrawingGraph>> {
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let graph = GraphBuilder::new(config.clone()).build_from_file(path)?;
            Ok(DrawingGraph::new(path.display().to_string(), graph))
        })
        .collect()
}

/// Parse every drawing and report block divergence across them.
pub fn analyze_drawings<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<BlockDivergenceReport> {
    let graphs = load_drawings(paths, &BuildConfig::default())?;
    Ok(analyze_graphs(&graphs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftgraph_graph::{dxf_schema, Edge};

    fn drawing(label: &str, blocks: &[(&str, f64)]) -> DrawingGraph {
        let mut graph = PropertyGraph::new(dxf_schema(""));
        for (i, (name, radius)) in blocks.iter().enumerate() {
            let block_id = format!("block_{name}");
            let mut block = Node::new(block_id.clone(), "Block");
            block.set_string("name", *name);
            block.set_int("entity_count", 1);
            graph.add_node(block);

            let member_id = format!("{label}{i}");
            let mut member = Node::new(member_id.clone(), "Entity");
            member.set_string("handle", member_id.as_str());
            member.set_string("type", "CIRCLE");
            member.set_string("layer", "0");
            member.set_numeric("gc_40", *radius);
            graph.add_node(member);
            graph.add_edge(Edge::new(format!("c{i}"), "CONTAINS", block_id, member_id));
        }
        DrawingGraph::new(label, graph)
    }

    #[test]
    fn shared_blocks_are_the_sorted_intersection() {
        let graphs = [
            drawing("a", &[("Z", 1.0), ("A", 1.0), ("M", 1.0)]),
            drawing("b", &[("M", 1.0), ("Z", 1.0)]),
        ];
        assert_eq!(find_shared_blocks(&graphs), ["M", "Z"]);
        assert!(find_shared_blocks(&[]).is_empty());
    }

    #[test]
    fn variants_keep_first_appearance_order() {
        let graphs = [
            drawing("a", &[("U282", 2.0), ("BOLT", 1.0)]),
            drawing("b", &[("U282", 1.0), ("BOLT", 1.0)]),
            drawing("c", &[("U282", 2.0)]),
        ];
        let report = analyze_graphs(&graphs);
        assert_eq!(report.blocks_analyzed, 2);
        assert_eq!(report.divergent.len(), 1);

        let u282 = report.block("U282").unwrap();
        assert_eq!(u282.variants.len(), 2);
        assert_eq!(u282.variants[0].drawings, ["a", "c"]);
        assert_eq!(u282.variants[1].drawings, ["b"]);
        assert!(report.block("BOLT").is_none());
    }

    #[test]
    fn comparison_names_attribute_and_pairs() {
        let graphs = [
            drawing("a", &[("U282", 2.0)]),
            drawing("b", &[("U282", 2.0)]),
            drawing("c", &[("U282", 3.0)]),
        ];
        let cmp = compare_block_versions("U282", &graphs).unwrap();
        assert!(!cmp.is_identical());
        assert_eq!(cmp.differences.len(), 1);
        assert_eq!(cmp.differences[0].attribute, "0:CIRCLE.gc_40");
        assert_eq!(cmp.hashes[0], cmp.hashes[1]);
        assert_ne!(cmp.hashes[0], cmp.hashes[2]);

        let pairs: Vec<(&str, &str)> = cmp
            .differing_pairs
            .iter()
            .map(|p| (p.left.as_str(), p.right.as_str()))
            .collect();
        assert_eq!(pairs, [("a", "c"), ("b", "c")]);
    }

    #[test]
    fn comparison_fails_when_a_drawing_lacks_the_block() {
        let graphs = [drawing("a", &[("U282", 2.0)]), drawing("b", &[("BOLT", 2.0)])];
        let err = compare_block_versions("U282", &graphs).unwrap_err();
        assert_eq!(err.kind(), draftgraph_graph::ErrorKind::NotFound);
        assert!(err.to_string().contains(" b"));

        let err = compare_block_versions("U282", &[]).unwrap_err();
        assert_eq!(err.kind(), draftgraph_graph::ErrorKind::InvalidArgument);
    }

    #[test]
    fn one_index_serves_every_block_of_a_drawing() {
        let d = drawing("a", &[("U282", 2.0), ("BOLT", 1.0), ("NUT", 3.0)]);
        let index = MemberIndex::new(&d.graph);
        for block in d.graph.nodes_of_type("Block") {
            let direct = hash_members("DXF", draftgraph_graph::block_members(&d.graph, block));
            assert_eq!(indexed_block_hash(&d.graph, &index, block), direct);
            assert_eq!(index.members(block).len(), 1);
        }

        let other = drawing("b", &[("U282", 2.0), ("BOLT", 9.0), ("NUT", 3.0)]);
        let report = analyze_graphs(&[d, other]);
        let names: Vec<&str> = report.divergent.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["BOLT"]);
    }

    #[test]
    fn unlinked_blocks_use_the_recorded_fingerprint() {
        let mut graph = PropertyGraph::new(dxf_schema(""));
        let mut block = Node::new("block_X", "Block");
        block.set_string("name", "X");
        block.set_int("entity_count", 3);
        block.set_string("content_hash", "sha256:recorded");
        graph.add_node(block.clone());
        assert_eq!(compute_block_hash(&graph, &block), "sha256:recorded");
    }
}
