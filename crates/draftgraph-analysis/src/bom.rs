//! Bill of materials and dimension extraction.

use draftgraph_graph::{Error, Node, PropertyGraph, PropertyValue, Result};
use draftgraph_ops::{Operation, OperationKind, OperationPlan, OperationResult, UNKNOWN_GROUP};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    pub part_name: String,
    pub quantity: u64,
    #[serde(default)]
    pub source_drawings: Vec<String>,
    /// Numeric properties of the part's block definition.
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionKind {
    Linear,
    Aligned,
    Angular,
    Diameter,
    Radius,
    Other,
}

impl DimensionKind {
    /// Kind from a DIMENSION entity's type flags (group code 70). The low
    /// three bits select the kind; higher bits are display flags.
    pub fn from_flags(flags: i64) -> Self {
        match flags & 7 {
            0 => Self::Linear,
            1 => Self::Aligned,
            2 => Self::Angular,
            3 => Self::Diameter,
            4 => Self::Radius,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "LINEAR",
            Self::Aligned => "ALIGNED",
            Self::Angular => "ANGULAR",
            Self::Diameter => "DIAMETER",
            Self::Radius => "RADIUS",
            Self::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub handle: String,
    pub kind: DimensionKind,
    pub measured_value: f64,
    /// Display text override; empty when the measurement is shown as is.
    #[serde(default)]
    pub text_override: String,
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub source_drawing: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub entries: Vec<BomEntry>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

impl BillOfMaterials {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::External(format!("cannot encode bill of materials: {e}")))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::invalid(format!("malformed bill of materials: {e}")))
    }

    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| e.quantity).sum()
    }
}

fn node_drawing<'g>(graph: &'g PropertyGraph, node: &'g Node) -> Option<&'g str> {
    node.string("source_drawing")
        .or_else(|| graph.metadata_value("source_drawing"))
}

/// An entity placed in the drawing rather than held by a block definition.
fn is_placed(node: &Node) -> bool {
    !node.has_property("owner_block")
}

/// Counts placed INSERTs by block name: INSERT entities, narrowed to those
/// outside any block definition, grouped by `gc_2`.
pub fn bom_plan() -> OperationPlan {
    OperationPlan::new(
        "bill of materials",
        vec![
            Operation::new(OperationKind::Filter)
                .on("Entity")
                .property("type")
                .param("value", "INSERT"),
            Operation::new(OperationKind::Filter)
                .on("Entity")
                .property("owner_block")
                .param("operator", "NOT_EXISTS")
                .param("node_ids", "$step1"),
            Operation::new(OperationKind::Aggregate)
                .on("Entity")
                .param("function", "COUNT")
                .param("group_by", "gc_2")
                .param("node_ids", "$step2"),
        ],
    )
}

/// BOM entries from a grouped count (part name to quantity), typically an
/// AGGREGATE grouped by `gc_2` over INSERT entities. The `unknown` group is
/// skipped. Source drawings come from placed INSERTs only. Sorted by
/// quantity, largest first, then by name.
pub fn bom_from_result(result: &OperationResult, graph: &PropertyGraph) -> Result<Vec<BomEntry>> {
    let mut entries = Vec::with_capacity(result.values.len());

    for (part, count) in &result.values {
        if part == UNKNOWN_GROUP {
            continue;
        }
        let quantity: u64 = count.trim().parse().map_err(|_| {
            Error::invalid(format!("quantity {count:?} for part {part} is not a count"))
        })?;

        let mut source_drawings: Vec<String> = Vec::new();
        for insert in graph.nodes_of_type("Entity") {
            if insert.string("type") != Some("INSERT")
                || insert.string("gc_2") != Some(part.as_str())
                || !is_placed(insert)
            {
                continue;
            }
            if let Some(drawing) = node_drawing(graph, insert) {
                if !source_drawings.iter().any(|d| d == drawing) {
                    source_drawings.push(drawing.to_string());
                }
            }
        }

        let mut properties = BTreeMap::new();
        if let Some(block) = graph
            .nodes_of_type("Block")
            .iter()
            .find(|b| b.string("name") == Some(part.as_str()))
        {
            for (key, value) in block.properties() {
                if let PropertyValue::Number(_) | PropertyValue::Count(_) = value {
                    if let Some(v) = value.as_f64() {
                        properties.insert(key.to_string(), v);
                    }
                }
            }
        }

        entries.push(BomEntry {
            part_name: part.clone(),
            quantity,
            source_drawings,
            properties,
        });
    }

    entries.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| a.part_name.cmp(&b.part_name))
    });
    Ok(entries)
}

/// Every placed DIMENSION entity in the graph, in collection order.
/// Dimensions inside block definitions are skipped.
pub fn extract_dimensions(graph: &PropertyGraph) -> Vec<Dimension> {
    graph
        .nodes_of_type("Entity")
        .iter()
        .filter(|n| n.string("type") == Some("DIMENSION") && is_placed(n))
        .map(|n| {
            let flags = n
                .value("gc_70")
                .and_then(|v| match v {
                    PropertyValue::Text(s) => s.trim().parse::<i64>().ok(),
                    other => other.as_f64().map(|f| f as i64),
                })
                .unwrap_or(0);
            let measured_value = n
                .value("gc_42")
                .and_then(|v| match v {
                    PropertyValue::Text(s) => s.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                })
                .unwrap_or(0.0);
            Dimension {
                handle: n.string("handle").unwrap_or_default().to_string(),
                kind: DimensionKind::from_flags(flags),
                measured_value,
                text_override: n.string("gc_1").unwrap_or_default().to_string(),
                layer: n.string("layer").unwrap_or_default().to_string(),
                source_drawing: node_drawing(graph, n).unwrap_or_default().to_string(),
            }
        })
        .collect()
}

fn csv_field(out: &mut String, field: &str) {
    out.push('"');
    out.push_str(&field.replace('"', "\"\""));
    out.push('"');
}

fn csv_row(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        csv_field(out, field);
    }
    out.push('\n');
}

/// `part_name,quantity,source_drawings,properties`; lists are `;`-joined and
/// properties are `key=value`.
pub fn bom_to_csv(entries: &[BomEntry]) -> String {
    let mut out = String::new();
    csv_row(&mut out, &["part_name", "quantity", "source_drawings", "properties"]);
    for entry in entries {
        let properties: Vec<String> = entry
            .properties
            .iter()
            .map(|(k, v)| format!("{k}={}", draftgraph_graph::format_number(*v)))
            .collect();
        csv_row(
            &mut out,
            &[
                &entry.part_name,
                &entry.quantity.to_string(),
                &entry.source_drawings.join(";"),
                &properties.join(";"),
            ],
        );
    }
    out
}

pub fn dimensions_to_csv(dimensions: &[Dimension]) -> String {
    let mut out = String::new();
    csv_row(
        &mut out,
        &["handle", "kind", "measured_value", "text_override", "layer", "source_drawing"],
    );
    for d in dimensions {
        csv_row(
            &mut out,
            &[
                &d.handle,
                d.kind.as_str(),
                &draftgraph_graph::format_number(d.measured_value),
                &d.text_override,
                &d.layer,
                &d.source_drawing,
            ],
        );
    }
    out
}

/// Fixed-width table for terminals.
pub fn bom_table(entries: &[BomEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        out.push_str("No parts\n");
        return out;
    }
    let _ = writeln!(out, "{:<40}| {:>8}", "Block Name", "Quantity");
    let _ = writeln!(out, "{}", "-".repeat(51));
    for entry in entries {
        let name = if entry.part_name.chars().count() > 39 {
            let head: String = entry.part_name.chars().take(36).collect();
            format!("{head}...")
        } else {
            entry.part_name.clone()
        };
        let _ = writeln!(out, "{name:<40}| {:>8}", entry.quantity);
    }
    let _ = writeln!(out, "{}", "-".repeat(51));
    let total: u64 = entries.iter().map(|e| e.quantity).sum();
    let _ = writeln!(out, "{:<40}| {total:>8}", "Total");
    out
}
