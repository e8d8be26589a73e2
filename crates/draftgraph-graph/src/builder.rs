//! Property graph builder: turns a parsed DXF drawing into a `PropertyGraph`.
//!
//! Node ids:
//! - top-level entity: its handle, or `entity_<index>` without one
//! - block definition: `block_<name>`
//! - block member: its handle, or `<block_id>_<index>` without one
//!
//! Edge ids:
//! - `edge_<handle>_ref_<block>` for INSERT references
//! - `edge_<block_id>_contains_<member_id>` for block membership
//! - `edge_<entity_id>_on_<layer>` for layer membership

use crate::config::BuildConfig;
use crate::content_hash::hash_members;
use crate::error::Result;
use crate::interner::{SharedStr, StringPool};
use crate::model::{Edge, Node, PropertyGraph};
use crate::schema::create_schema;
use ahash::{AHashMap, AHashSet};
use draftgraph_ingest_dxf::{parse_dxf_file, DxfBlock, DxfEntity, DxfFile, DxfPair, NAME_CODE};
use std::path::Path;

pub const ENTITY: &str = "Entity";
pub const BLOCK: &str = "Block";
pub const LAYER: &str = "Layer";
pub const REFERENCES: &str = "REFERENCES";
pub const CONTAINS: &str = "CONTAINS";
pub const BELONGS_TO: &str = "BELONGS_TO";

/// Id of the Block node for a block name.
pub fn block_node_id(name: &str) -> String {
    format!("block_{name}")
}

/// Id of the Layer node for a layer name.
pub fn layer_node_id(name: &str) -> String {
    format!("layer_{name}")
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    config: BuildConfig,
    pool: StringPool,
}

impl GraphBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            pool: StringPool::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    /// Parse a drawing from disk and build it. Records the path as the
    /// `source_drawing` metadata entry.
    pub fn build_from_file(&mut self, path: impl AsRef<Path>) -> Result<PropertyGraph> {
        let path = path.as_ref();
        let file = parse_dxf_file(path)?;
        let mut graph = self.build(&file)?;
        graph.set_metadata("source_drawing", path.display().to_string());
        Ok(graph)
    }

    pub fn build(&mut self, file: &DxfFile) -> Result<PropertyGraph> {
        let schema = create_schema(&self.config.source_format, &file.version)?;
        let source_format = schema.source_format.clone();
        let mut graph = PropertyGraph::new(schema);
        let mut ids = IdAllocator::default();
        let mut layered: Vec<(SharedStr, SharedStr)> = Vec::new();

        for (index, entity) in file.entities.iter().enumerate() {
            let preferred = if entity.handle.is_empty() {
                format!("entity_{index}")
            } else {
                entity.handle.clone()
            };
            let id = ids.claim(&mut self.pool, preferred);
            let node = self.entity_node(entity, id.clone());

            if let Some(edge) = self.reference_edge(&id, entity) {
                graph.add_edge(edge);
            }

            if !entity.layer.is_empty() {
                layered.push((id, self.pool.intern(&entity.layer)));
            }
            graph.add_node(node);
        }

        let mut member_count = 0;
        for block in &file.blocks {
            member_count += self.add_block(&mut graph, &mut ids, &mut layered, block, &source_format);
        }

        if self.config.link_layers {
            self.link_layers(&mut graph, &layered);
        }

        graph.set_metadata("source_format", source_format);
        graph.set_metadata("format_version", file.version.clone());
        graph.set_metadata("entity_count", file.entities.len().to_string());
        graph.set_metadata("block_count", file.blocks.len().to_string());
        graph.set_metadata("member_count", member_count.to_string());
        graph.recompute_stats();

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            interned = self.pool.len(),
            "built property graph"
        );
        Ok(graph)
    }

    fn add_block(
        &mut self,
        graph: &mut PropertyGraph,
        ids: &mut IdAllocator,
        layered: &mut Vec<(SharedStr, SharedStr)>,
        block: &DxfBlock,
        source_format: &str,
    ) -> usize {
        let block_id = ids.claim(&mut self.pool, block_node_id(&block.name));
        let mut node = Node::new(block_id.clone(), self.pool.intern(BLOCK));
        for pair in &block.header {
            self.publish_pair(&mut node, pair);
        }
        node.set_string(self.pool.intern("name"), self.pool.intern(&block.name));
        node.set_string(self.pool.intern("handle"), self.pool.intern(&block.handle));
        node.set_string(self.pool.intern("layer"), self.pool.intern(&block.layer));
        node.set_int(self.pool.intern("entity_count"), block.entities.len() as i64);

        let owner = self.pool.intern(&block.name);
        let mut members = Vec::with_capacity(block.entities.len());
        for (index, entity) in block.entities.iter().enumerate() {
            let preferred = if entity.handle.is_empty() {
                format!("{block_id}_{index}")
            } else {
                entity.handle.clone()
            };
            let id = if self.config.link_block_members {
                ids.claim(&mut self.pool, preferred)
            } else {
                self.pool.intern(&preferred)
            };
            let mut member = self.entity_node(entity, id);
            member.set_string(self.pool.intern("owner_block"), owner.clone());
            members.push(member);
        }

        let hash = hash_members(source_format, &members);
        node.set_string(self.pool.intern("content_hash"), self.pool.intern(&hash));
        graph.add_node(node);

        if !self.config.link_block_members {
            return 0;
        }
        let linked = members.len();
        for (member, entity) in members.into_iter().zip(&block.entities) {
            let member_id = member.shared_id().clone();
            if let Some(edge) = self.reference_edge(&member_id, entity) {
                graph.add_edge(edge);
            }
            graph.add_edge(Edge::new(
                self.pool.intern(&format!("edge_{block_id}_contains_{member_id}")),
                self.pool.intern(CONTAINS),
                block_id.clone(),
                member_id.clone(),
            ));
            if let Some(layer) = member.string("layer").filter(|l| !l.is_empty()) {
                layered.push((member_id, self.pool.intern(layer)));
            }
            graph.add_node(member);
        }
        linked
    }

    /// REFERENCES edge from an INSERT to the block it places. Nested INSERTs
    /// inside a block definition get one too.
    fn reference_edge(&mut self, id: &SharedStr, entity: &DxfEntity) -> Option<Edge> {
        if entity.entity_type != "INSERT" {
            return None;
        }
        let block_name = entity.string(NAME_CODE).filter(|n| !n.is_empty())?;
        Some(
            Edge::new(
                self.pool.intern(&format!("edge_{id}_ref_{block_name}")),
                self.pool.intern(REFERENCES),
                id.clone(),
                self.pool.intern(&block_node_id(block_name)),
            )
            .with_property(self.pool.intern("block_name"), self.pool.intern(block_name)),
        )
    }

    fn link_layers(&mut self, graph: &mut PropertyGraph, layered: &[(SharedStr, SharedStr)]) {
        let mut seen: AHashSet<SharedStr> = AHashSet::new();
        for (entity_id, layer) in layered {
            if seen.insert(layer.clone()) {
                let mut node = Node::new(self.pool.intern(&layer_node_id(layer)), self.pool.intern(LAYER));
                node.set_string(self.pool.intern("name"), layer.clone());
                graph.add_node(node);
            }
            graph.add_edge(Edge::new(
                self.pool.intern(&format!("edge_{entity_id}_on_{layer}")),
                self.pool.intern(BELONGS_TO),
                entity_id.clone(),
                self.pool.intern(&layer_node_id(layer)),
            ));
        }
    }

    fn entity_node(&mut self, entity: &DxfEntity, id: SharedStr) -> Node {
        let mut node = Node::new(id, self.pool.intern(ENTITY));
        for pair in &entity.data {
            self.publish_pair(&mut node, pair);
        }
        node.set_string(self.pool.intern("handle"), self.pool.intern(&entity.handle));
        node.set_string(self.pool.intern("type"), self.pool.intern(&entity.entity_type));
        node.set_string(self.pool.intern("layer"), self.pool.intern(&entity.layer));
        node
    }

    /// Republish a raw pair as `gc_<code>`. A repeated code keeps its last
    /// value.
    fn publish_pair(&mut self, node: &mut Node, pair: &DxfPair) {
        let key = self.pool.intern(&format!("gc_{}", pair.code));
        if self.config.is_numeric_tag(pair.code) {
            if let Some(value) = pair.value.trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
                node.set_numeric(key, value);
                return;
            }
        }
        node.set_string(key, self.pool.intern(&pair.value));
    }
}

/// Hands out node ids unique within one build.
#[derive(Debug, Default)]
struct IdAllocator {
    used: AHashMap<String, usize>,
}

impl IdAllocator {
    fn claim(&mut self, pool: &mut StringPool, preferred: String) -> SharedStr {
        let Some(&previous) = self.used.get(&preferred) else {
            let id = pool.intern(&preferred);
            self.used.insert(preferred, 0);
            return id;
        };
        let mut count = previous;
        let candidate = loop {
            count += 1;
            let candidate = format!("{preferred}_dup{count}");
            if !self.used.contains_key(&candidate) {
                break candidate;
            }
        };
        tracing::warn!(id = %preferred, renamed = %candidate, "duplicate node id in drawing");
        self.used.insert(preferred, count);
        let id = pool.intern(&candidate);
        self.used.insert(candidate, 0);
        id
    }
}
