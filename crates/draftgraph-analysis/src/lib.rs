//! Cross-drawing analysis over Draftgraph property graphs.
//!
//! - [`divergence`]: fingerprints block definitions and reports names whose
//!   content differs between drawings.
//! - [`bom`]: counts placed INSERTs into bill-of-materials entries and
//!   lifts DIMENSION entities into typed records.

#![allow(clippy::module_name_repetitions)]

pub mod bom;
pub mod divergence;

pub use bom::{
    bom_from_result, bom_plan, bom_table, bom_to_csv, dimensions_to_csv, extract_dimensions,
    BillOfMaterials, BomEntry, Dimension, DimensionKind,
};
pub use divergence::{
    analyze_drawings, analyze_graphs, compare_block_versions, compute_block_hash,
    find_shared_blocks, load_drawings, AttributeDifference, AttributeValue, BlockComparison,
    BlockDivergenceReport, BlockVariant, DivergentBlock, DrawingGraph, PairDifference,
};
