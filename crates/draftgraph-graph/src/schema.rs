//! Schema registry and capability analysis.
//!
//! A schema states, per node type, which properties exist and what may be
//! done with them:
//! - `unique`: identifies a node within its type
//! - `indexed`: cheap to match and filter on
//! - `comparable`: meaningful to compare across nodes or drawings
//! - `aggregable`: numeric, safe to sum and average
//!
//! These flags are the only channel through which the engine and plan
//! composers learn what a query may legally touch.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Version stamped on every schema this registry produces.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Double,
    Int,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Double => "double",
            Self::Int => "int",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub comparable: bool,
    #[serde(default)]
    pub aggregable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            unique: false,
            indexed: false,
            comparable: false,
            aggregable: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::String)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Double)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Int)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn comparable(mut self) -> Self {
        self.comparable = true;
        self
    }

    pub fn aggregable(mut self) -> Self {
        self.aggregable = true;
        self
    }

    /// Capability flags as short labels, in declaration order.
    pub fn capability_labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.unique {
            labels.push("unique");
        }
        if self.indexed {
            labels.push("indexed");
        }
        if self.comparable {
            labels.push("comparable");
        }
        if self.aggregable {
            labels.push("aggregable");
        }
        labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeSchema {
    pub name: String,
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTypeSchema {
    pub name: String,
    pub source_type: String,
    pub target_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub source_format: String,
    pub format_version: String,
    pub schema_version: String,
    pub node_types: Vec<NodeTypeSchema>,
    pub edge_types: Vec<EdgeTypeSchema>,
}

impl Schema {
    pub fn node_type(&self, name: &str) -> Option<&NodeTypeSchema> {
        self.node_types.iter().find(|t| t.name == name)
    }

    pub fn edge_type(&self, name: &str) -> Option<&EdgeTypeSchema> {
        self.edge_types.iter().find(|t| t.name == name)
    }

    pub fn property(&self, node_type: &str, property: &str) -> Option<&PropertyDescriptor> {
        self.node_type(node_type)?
            .properties
            .iter()
            .find(|p| p.name == property)
    }

    fn names_where(&self, node_type: &str, pred: impl Fn(&PropertyDescriptor) -> bool) -> Vec<String> {
        self.node_type(node_type)
            .map(|t| {
                t.properties
                    .iter()
                    .filter(|p| pred(p))
                    .map(|p| p.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn unique_properties(&self, node_type: &str) -> Vec<String> {
        self.names_where(node_type, |p| p.unique)
    }

    pub fn comparable_properties(&self, node_type: &str) -> Vec<String> {
        self.names_where(node_type, |p| p.comparable)
    }

    pub fn indexed_properties(&self, node_type: &str) -> Vec<String> {
        self.names_where(node_type, |p| p.indexed)
    }

    pub fn aggregable_properties(&self, node_type: &str) -> Vec<String> {
        self.names_where(node_type, |p| p.aggregable)
    }

    /// Every declared edge type, in declaration order.
    pub fn traversable_edge_types(&self) -> Vec<String> {
        self.edge_types.iter().map(|e| e.name.clone()).collect()
    }

    /// Structural consistency: a source format, at least one node type, and
    /// edge endpoints that name declared node types.
    pub fn validate(&self) -> Result<()> {
        if self.source_format.trim().is_empty() {
            return Err(Error::invalid("schema has no source format"));
        }
        if self.node_types.is_empty() {
            return Err(Error::invalid("schema declares no node types"));
        }
        for edge in &self.edge_types {
            for endpoint in [&edge.source_type, &edge.target_type] {
                if self.node_type(endpoint).is_none() {
                    return Err(Error::invalid(format!(
                        "edge type {} references undeclared node type {endpoint}",
                        edge.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Schema for a source format. DXF is built in; DWG is recognised but has no
/// reader.
pub fn create_schema(format: &str, format_version: &str) -> Result<Schema> {
    match format.trim().to_ascii_uppercase().as_str() {
        "DXF" => Ok(dxf_schema(format_version)),
        "DWG" => Err(Error::Unimplemented(
            "DWG is a binary format; convert the drawing to DXF".to_string(),
        )),
        other => Err(Error::not_found(format!("no schema for source format {other:?}"))),
    }
}

pub fn dxf_schema(format_version: &str) -> Schema {
    let entity = NodeTypeSchema {
        name: "Entity".to_string(),
        properties: vec![
            PropertyDescriptor::string("handle").unique().indexed(),
            PropertyDescriptor::string("type").indexed(),
            PropertyDescriptor::string("layer").indexed(),
            PropertyDescriptor::string("gc_2").indexed(),
            PropertyDescriptor::string("owner_block").indexed(),
            PropertyDescriptor::double("gc_10").comparable().aggregable(),
            PropertyDescriptor::double("gc_20").comparable().aggregable(),
            PropertyDescriptor::double("gc_30").comparable().aggregable(),
            PropertyDescriptor::double("gc_40").comparable().aggregable(),
            PropertyDescriptor::double("gc_42").comparable().aggregable(),
            PropertyDescriptor::string("source_drawing").indexed(),
        ],
    };
    let block = NodeTypeSchema {
        name: "Block".to_string(),
        properties: vec![
            PropertyDescriptor::string("name").unique().indexed(),
            PropertyDescriptor::string("handle"),
            PropertyDescriptor::string("content_hash").comparable(),
            PropertyDescriptor::int("entity_count").aggregable(),
        ],
    };
    let layer = NodeTypeSchema {
        name: "Layer".to_string(),
        properties: vec![PropertyDescriptor::string("name").unique().indexed()],
    };

    let edge = |name: &str, source: &str, target: &str| EdgeTypeSchema {
        name: name.to_string(),
        source_type: source.to_string(),
        target_type: target.to_string(),
    };

    Schema {
        source_format: "DXF".to_string(),
        format_version: format_version.to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        node_types: vec![entity, block, layer],
        edge_types: vec![
            edge("BELONGS_TO", "Entity", "Layer"),
            edge("CONTAINS", "Block", "Entity"),
            edge("REFERENCES", "Entity", "Block"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn dxf_schema_is_consistent() {
        let schema = create_schema("dxf", "AC1027").unwrap();
        schema.validate().unwrap();
        assert_eq!(schema.schema_version, SCHEMA_VERSION);
        assert_eq!(schema.format_version, "AC1027");
        assert_eq!(
            schema.traversable_edge_types(),
            ["BELONGS_TO", "CONTAINS", "REFERENCES"]
        );
    }

    #[test]
    fn capability_queries_keep_declaration_order() {
        let schema = dxf_schema("");
        assert_eq!(schema.unique_properties("Entity"), ["handle"]);
        assert_eq!(
            schema.aggregable_properties("Entity"),
            ["gc_10", "gc_20", "gc_30", "gc_40", "gc_42"]
        );
        assert_eq!(schema.comparable_properties("Block"), ["content_hash"]);
        assert!(schema.indexed_properties("Nope").is_empty());
        assert_eq!(
            schema.property("Block", "entity_count").map(|p| p.kind),
            Some(ValueKind::Int)
        );
    }

    #[test]
    fn unsupported_formats_fail_with_distinct_kinds() {
        assert_eq!(create_schema("DWG", "").unwrap_err().kind(), ErrorKind::Unimplemented);
        assert_eq!(create_schema("IGES", "").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn validate_rejects_dangling_edge_endpoints() {
        let mut schema = dxf_schema("");
        schema.edge_types.push(EdgeTypeSchema {
            name: "ATTACHED".into(),
            source_type: "Entity".into(),
            target_type: "Viewport".into(),
        });
        let err = schema.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("Viewport"));

        assert!(Schema::default().validate().is_err());
    }
}
