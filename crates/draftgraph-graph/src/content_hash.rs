//! Stable content fingerprints for block definitions.
//!
//! A block's fingerprint covers the source format and, per member entity, its
//! type, layer and every attribute except identity keys. Members are ordered
//! by handle (ties by canonical content) before hashing, so the file order of
//! a block's entities never matters.

use crate::model::{Node, PropertyGraph};
use ahash::AHashMap;
use sha2::{Digest, Sha256};

/// Properties that identify an entity rather than describe it.
pub const IDENTITY_KEYS: &[&str] = &[
    "handle",
    "gc_5",
    "gc_105",
    "gc_330",
    "gc_360",
    "owner_block",
    "source_drawing",
];

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Canonical text for one member: type, layer, then sorted `key=value` pairs.
pub fn canonical_member(node: &Node) -> String {
    let mut out = String::new();
    out.push_str(node.string("type").unwrap_or(""));
    out.push(FIELD_SEP);
    out.push_str(node.string("layer").unwrap_or(""));

    for (key, value) in node.properties() {
        if key == "type" || key == "layer" || IDENTITY_KEYS.contains(&key) {
            continue;
        }
        out.push(FIELD_SEP);
        out.push_str(key);
        out.push('=');
        out.push_str(&value.to_string());
    }
    out
}

/// Hash a block's members as `sha256:<hex>`.
pub fn hash_members<'a>(source_format: &str, members: impl IntoIterator<Item = &'a Node>) -> String {
    let mut keyed: Vec<(&str, String)> = members
        .into_iter()
        .map(|n| (n.string("handle").unwrap_or(""), canonical_member(n)))
        .collect();
    keyed.sort();

    let mut hasher = Sha256::new();
    hasher.update(source_format.as_bytes());
    for (_, canonical) in &keyed {
        hasher.update([RECORD_SEP as u8]);
        hasher.update(canonical.as_bytes());
    }
    format!("sha256:{:x}", hasher.finalize())
}

/// Member entities of `block`, found through its CONTAINS edges, in edge
/// order. In a merged graph only members from the block's own drawing count.
///
/// Builds a [`MemberIndex`] for the one lookup; callers visiting many blocks
/// of the same graph should build the index once and reuse it.
pub fn block_members<'g>(graph: &'g PropertyGraph, block: &Node) -> Vec<&'g Node> {
    MemberIndex::new(graph).members(block)
}

/// Entity nodes by id and CONTAINS targets by block id. Each entry keeps
/// its source drawing so copies merged from several drawings stay apart.
pub struct MemberIndex<'g> {
    entities: AHashMap<&'g str, Vec<&'g Node>>,
    contains: AHashMap<&'g str, Vec<(&'g str, Option<&'g str>)>>,
}

impl<'g> MemberIndex<'g> {
    pub fn new(graph: &'g PropertyGraph) -> Self {
        let mut entities: AHashMap<&'g str, Vec<&'g Node>> = AHashMap::new();
        for node in graph.nodes_of_type("Entity") {
            entities.entry(node.id()).or_default().push(node);
        }

        let mut contains: AHashMap<&'g str, Vec<(&'g str, Option<&'g str>)>> = AHashMap::new();
        for edge in graph.edges_of_type("CONTAINS") {
            contains
                .entry(&*edge.source)
                .or_default()
                .push((&*edge.target, edge.property("source_drawing")));
        }
        Self { entities, contains }
    }

    /// Members of `block` in edge order; targets that do not resolve to an
    /// Entity of the same drawing are skipped.
    pub fn members(&self, block: &Node) -> Vec<&'g Node> {
        let drawing = block.string("source_drawing");
        let Some(targets) = self.contains.get(block.id()) else {
            return Vec::new();
        };
        targets
            .iter()
            .filter(|(_, edge_drawing)| *edge_drawing == drawing)
            .filter_map(|(target, _)| {
                self.entities
                    .get(*target)?
                    .iter()
                    .find(|n| n.string("source_drawing") == drawing)
                    .copied()
            })
            .collect()
    }
}
