//! Building graphs from drawings on disk, merging them, and reading them back
//! through the schema.

use approx::assert_relative_eq;
use draftgraph_graph::{
    block_members, hash_members, merge_graphs, BuildConfig, ErrorKind, GraphBuilder,
    PropertyGraph,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn dxf(pairs: &[(i32, &str)]) -> String {
    let mut out = String::new();
    for (code, value) in pairs {
        out.push_str(&format!("{code:>3}\n{value}\n"));
    }
    out
}

fn bracket_drawing(radius: &str) -> String {
    dxf(&[
        (0, "SECTION"),
        (2, "HEADER"),
        (9, "$ACADVER"),
        (1, "AC1032"),
        (0, "ENDSEC"),
        (0, "SECTION"),
        (2, "BLOCKS"),
        (0, "BLOCK"),
        (5, "30"),
        (8, "0"),
        (2, "BRACKET"),
        (0, "LINE"),
        (5, "31"),
        (8, "OUTLINE"),
        (10, "0"),
        (20, "0"),
        (11, "40"),
        (21, "0"),
        (0, "CIRCLE"),
        (5, "32"),
        (8, "OUTLINE"),
        (10, "20"),
        (20, "10"),
        (40, radius),
        (0, "ENDBLK"),
        (0, "ENDSEC"),
        (0, "SECTION"),
        (2, "ENTITIES"),
        (0, "INSERT"),
        (5, "100"),
        (8, "PARTS"),
        (2, "BRACKET"),
        (10, "100"),
        (20, "50"),
        (0, "INSERT"),
        (5, "101"),
        (8, "PARTS"),
        (2, "BRACKET"),
        (10, "200"),
        (20, "50"),
        (0, "ENDSEC"),
        (0, "EOF"),
    ])
}

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn builds_from_disk_with_source_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bracket.dxf", &bracket_drawing("4.5"));

    let graph = GraphBuilder::default().build_from_file(&path).unwrap();
    assert_eq!(
        graph.metadata_value("source_drawing"),
        Some(path.display().to_string().as_str())
    );
    assert_eq!(graph.schema().format_version, "AC1032");

    let circle = graph.find_node("Entity", "32").unwrap();
    assert_relative_eq!(circle.numeric("gc_40").unwrap(), 4.5);
    assert_eq!(circle.string("owner_block"), Some("BRACKET"));

    let inserts: Vec<&str> = graph
        .edges_of_type("REFERENCES")
        .map(|e| &*e.source)
        .collect();
    assert_eq!(inserts, ["100", "101"]);
}

#[test]
fn missing_drawing_is_an_external_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GraphBuilder::default()
        .build_from_file(dir.path().join("absent.dxf"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
}

#[test]
fn stored_hash_matches_hash_of_linked_members() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bracket.dxf", &bracket_drawing("4.5"));
    let graph = GraphBuilder::default().build_from_file(&path).unwrap();

    let block = graph.find_node("Block", "block_BRACKET").unwrap();
    let members = block_members(&graph, block);
    assert_eq!(members.len(), 2);
    assert_eq!(
        block.string("content_hash"),
        Some(hash_members("DXF", members).as_str())
    );
}

#[test]
fn copies_in_separate_drawings_hash_alike_unless_content_differs() {
    let dir = tempfile::tempdir().unwrap();
    let a = GraphBuilder::default()
        .build_from_file(write(&dir, "a.dxf", &bracket_drawing("4.5")))
        .unwrap();
    let b = GraphBuilder::default()
        .build_from_file(write(&dir, "b.dxf", &bracket_drawing("4.5")))
        .unwrap();
    let c = GraphBuilder::default()
        .build_from_file(write(&dir, "c.dxf", &bracket_drawing("5")))
        .unwrap();

    let hash = |g: &PropertyGraph| {
        g.find_node("Block", "block_BRACKET")
            .and_then(|n| n.string("content_hash"))
            .map(str::to_string)
    };
    assert_eq!(hash(&a), hash(&b));
    assert_ne!(hash(&a), hash(&c));
}

#[test]
fn merged_graph_keeps_members_apart_per_drawing() {
    let a = GraphBuilder::default()
        .build(&draftgraph_ingest_dxf::parse_dxf(bracket_drawing("4.5").as_bytes()).unwrap())
        .unwrap();
    let c = GraphBuilder::default()
        .build(&draftgraph_ingest_dxf::parse_dxf(bracket_drawing("5").as_bytes()).unwrap())
        .unwrap();
    let merged = merge_graphs([("rev-a", &a), ("rev-c", &c)]);

    assert_eq!(merged.stats(), &a.stats().combined(c.stats()));

    let blocks = merged.nodes_of_type("Block");
    assert_eq!(blocks.len(), 2);
    for block in blocks {
        let members = block_members(&merged, block);
        assert_eq!(members.len(), 2);
        assert!(members
            .iter()
            .all(|m| m.string("source_drawing") == block.string("source_drawing")));
        assert_eq!(
            block.string("content_hash"),
            Some(hash_members("DXF", members).as_str())
        );
    }
}

#[test]
fn widened_numeric_ranges_apply_to_flags() {
    let config = BuildConfig {
        numeric_tag_ranges: vec![
            draftgraph_graph::TagRange::new(10, 59),
            draftgraph_graph::TagRange::new(70, 79),
        ],
        ..BuildConfig::default()
    };
    let file = draftgraph_ingest_dxf::parse_dxf(
        dxf(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "DIMENSION"),
            (5, "D1"),
            (70, "33"),
            (0, "ENDSEC"),
        ])
        .as_bytes(),
    )
    .unwrap();
    let graph = GraphBuilder::new(config).build(&file).unwrap();
    assert_relative_eq!(graph.find_node("Entity", "D1").unwrap().numeric("gc_70").unwrap(), 33.0);
}
