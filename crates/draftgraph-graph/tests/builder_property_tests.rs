//! Property tests for graph building and block fingerprints.
//!
//! Two properties matter downstream: a drawing always builds to the same ids
//! and stats, and a block fingerprint depends on content, never on the file
//! order of the block's entities.

use draftgraph_graph::{hash_members, GraphBuilder, Node};
use draftgraph_ingest_dxf::{DxfBlock, DxfEntity, DxfFile, DxfPair};
use proptest::prelude::*;

const TYPES: &[&str] = &["LINE", "CIRCLE", "ARC", "INSERT", "TEXT", "DIMENSION"];
const LAYERS: &[&str] = &["", "0", "OUTLINE", "HIDDEN", "PARTS"];
const BLOCKS: &[&str] = &["A", "B", "U282"];

fn entity_strategy() -> impl Strategy<Value = (usize, bool, usize, Vec<(i32, f64)>, usize)> {
    (
        0usize..TYPES.len(),
        any::<bool>(),
        0usize..LAYERS.len(),
        prop::collection::vec((10i32..60, -1.0e6f64..1.0e6), 0..=4),
        0usize..BLOCKS.len(),
    )
}

fn make_entity(
    index: usize,
    (type_idx, has_handle, layer_idx, values, block_idx): (usize, bool, usize, Vec<(i32, f64)>, usize),
) -> DxfEntity {
    let mut entity = DxfEntity::new(TYPES[type_idx]);
    if has_handle {
        entity.push(DxfPair::new(5, format!("{:X}", 0x100 + index)));
    }
    if !LAYERS[layer_idx].is_empty() {
        entity.push(DxfPair::new(8, LAYERS[layer_idx]));
    }
    if TYPES[type_idx] == "INSERT" {
        entity.push(DxfPair::new(2, BLOCKS[block_idx]));
    }
    for (code, value) in values {
        entity.push(DxfPair::new(code, value.to_string()));
    }
    entity
}

fn drawing_strategy() -> impl Strategy<Value = DxfFile> {
    (
        prop::collection::vec(entity_strategy(), 0..=12),
        prop::collection::vec(entity_strategy(), 0..=6),
    )
        .prop_map(|(top, members)| {
            let entities = top
                .into_iter()
                .enumerate()
                .map(|(i, spec)| make_entity(i, spec))
                .collect();
            let block = DxfBlock {
                name: "U282".to_string(),
                handle: "FF".to_string(),
                layer: "0".to_string(),
                header: vec![DxfPair::new(2, "U282"), DxfPair::new(10, "0.0")],
                entities: members
                    .into_iter()
                    .enumerate()
                    .map(|(i, spec)| make_entity(i + 1000, spec))
                    .collect(),
            };
            DxfFile {
                version: "AC1027".to_string(),
                entities,
                blocks: vec![block],
            }
        })
}

fn member(handle: &str, kind: &str, x: f64) -> Node {
    let mut node = Node::new(handle, "Entity");
    node.set_string("handle", handle);
    node.set_string("type", kind);
    node.set_string("layer", "OUTLINE");
    node.set_numeric("gc_10", x);
    node
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn build_is_deterministic(file in drawing_strategy()) {
        let a = GraphBuilder::default().build(&file).unwrap();
        let b = GraphBuilder::default().build(&file).unwrap();

        let ids = |g: &draftgraph_graph::PropertyGraph| {
            g.nodes().map(|n| n.id().to_string()).collect::<Vec<_>>()
        };
        let edge_ids = |g: &draftgraph_graph::PropertyGraph| {
            g.edges().iter().map(|e| e.id.to_string()).collect::<Vec<_>>()
        };
        prop_assert_eq!(ids(&a), ids(&b));
        prop_assert_eq!(edge_ids(&a), edge_ids(&b));
        prop_assert_eq!(a.stats(), b.stats());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn node_ids_are_unique(file in drawing_strategy()) {
        let graph = GraphBuilder::default().build(&file).unwrap();
        let mut ids: Vec<&str> = graph.nodes().map(|n| n.id()).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }

    #[test]
    fn stats_match_contents(file in drawing_strategy()) {
        let graph = GraphBuilder::default().build(&file).unwrap();
        prop_assert_eq!(graph.stats().node_count, graph.nodes().count());
        prop_assert_eq!(graph.stats().edge_count, graph.edges().len());
        let inserts = file
            .entities
            .iter()
            .chain(file.blocks.iter().flat_map(|b| &b.entities))
            .filter(|e| e.entity_type == "INSERT")
            .count();
        prop_assert_eq!(graph.edges_of_type("REFERENCES").count(), inserts);

        let count = |key: &str| -> usize {
            graph.metadata_value(key).and_then(|v| v.parse().ok()).unwrap_or(0)
        };
        prop_assert_eq!(
            count("entity_count") + count("member_count"),
            graph.nodes_of_type("Entity").len()
        );
    }

    #[test]
    fn member_order_does_not_change_the_hash(
        xs in prop::collection::vec(-1000.0f64..1000.0, 1..=8),
        rotate in 0usize..8,
    ) {
        let members: Vec<Node> = xs
            .iter()
            .enumerate()
            .map(|(i, x)| member(&format!("{:X}", 0x20 + i), "LINE", *x))
            .collect();
        let mut shuffled = members.clone();
        let len = shuffled.len();
        shuffled.rotate_left(rotate % len);
        shuffled.reverse();

        prop_assert_eq!(hash_members("DXF", &members), hash_members("DXF", &shuffled));
    }

    #[test]
    fn any_attribute_change_changes_the_hash(
        xs in prop::collection::vec(-1000.0f64..1000.0, 1..=8),
        pick in 0usize..8,
        delta in 0.001f64..10.0,
    ) {
        let members: Vec<Node> = xs
            .iter()
            .enumerate()
            .map(|(i, x)| member(&format!("{:X}", 0x20 + i), "LINE", *x))
            .collect();
        let mut changed = members.clone();
        let idx = pick % changed.len();
        let old = changed[idx].numeric("gc_10").unwrap();
        changed[idx].set_numeric("gc_10", old + delta);

        prop_assert_ne!(hash_members("DXF", &members), hash_members("DXF", &changed));
    }
}
