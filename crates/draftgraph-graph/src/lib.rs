//! Draftgraph property graph
//!
//! Schema-described property graphs built from CAD drawings:
//! - **Model**: typed nodes with string / numeric / count properties, typed
//!   directed edges, drawing metadata and derived stats
//! - **Schema registry**: per node type, which properties are unique,
//!   indexed, comparable or aggregable, plus traversable edge types
//! - **Builder**: DXF drawing to graph, with a builder-owned string pool
//! - **Merge**: several drawings in one graph, each node stamped with its
//!   source drawing
//! - **Content hash**: stable block-definition fingerprints
//!
//! Graphs are immutable once built or merged; every query path takes
//! `&PropertyGraph`.

pub mod builder;
pub mod config;
pub mod content_hash;
pub mod error;
pub mod interner;
pub mod merge;
pub mod model;
pub mod schema;

pub use builder::{block_node_id, layer_node_id, GraphBuilder};
pub use config::{BuildConfig, TagRange};
pub use content_hash::{block_members, canonical_member, hash_members, MemberIndex, IDENTITY_KEYS};
pub use error::{Error, ErrorKind, Result};
pub use interner::{SharedStr, StringPool};
pub use merge::merge_graphs;
pub use model::{format_number, Edge, Node, PropertyGraph, PropertyValue, Stats};
pub use schema::{
    create_schema, dxf_schema, EdgeTypeSchema, NodeTypeSchema, PropertyDescriptor, Schema,
    ValueKind, SCHEMA_VERSION,
};
