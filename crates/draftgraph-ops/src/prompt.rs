//! Schema descriptions and plan-composition prompts.

use crate::operation::OperationKind;
use draftgraph_graph::Schema;
use std::fmt::Write;

/// Node types with capability-annotated properties, then edge types.
pub fn describe_schema(schema: &Schema) -> String {
    let mut out = String::new();
    let version = if schema.format_version.is_empty() {
        "unknown".to_string()
    } else {
        schema.format_version.clone()
    };
    let _ = writeln!(
        out,
        "Source format: {} (drawing version {version}, schema {})",
        schema.source_format, schema.schema_version
    );

    out.push_str("\nNode types:\n");
    for node_type in &schema.node_types {
        let props: Vec<String> = node_type
            .properties
            .iter()
            .map(|p| {
                let caps = p.capability_labels();
                if caps.is_empty() {
                    format!("{} ({})", p.name, p.kind.as_str())
                } else {
                    format!("{} ({}; {})", p.name, p.kind.as_str(), caps.join(", "))
                }
            })
            .collect();
        let _ = writeln!(out, "- {}: {}", node_type.name, props.join(", "));
    }

    out.push_str("\nEdge types:\n");
    for edge in &schema.edge_types {
        let _ = writeln!(out, "- {}: {} -> {}", edge.name, edge.source_type, edge.target_type);
    }
    out
}

fn operation_usage(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Match => "first node whose property_name equals parameters.value",
        OperationKind::Filter => {
            "nodes whose property_name passes parameters.operator (EQUALS, CONTAINS, GREATER_THAN, LESS_THAN) against parameters.value, or is set (EXISTS) or unset (NOT_EXISTS); optional parameters.node_ids"
        }
        OperationKind::Compare => {
            "compare property_name across parameters.node_ids (comma list, at least two); optional parameters.tolerance"
        }
        OperationKind::Traverse => {
            "follow parameters.edge_type edges, optionally only from parameters.start_node_ids"
        }
        OperationKind::Aggregate => {
            "parameters.function (COUNT, SUM, AVG, MIN, MAX) over property_name, or count per value of parameters.group_by"
        }
        OperationKind::GroupBy => "group nodes by property_name, listing node ids per group",
        OperationKind::Project => "copy parameters.properties (comma list) of each node into the result",
        OperationKind::Join => {
            "pairs from parameters.left_node_ids to parameters.right_node_ids over parameters.edge_type edges"
        }
    }
}

/// Full prompt for a plan composer: schema, vocabulary, guidance, query and
/// the expected response shape.
pub fn render_prompt(schema: &Schema, query: &str) -> String {
    let mut out = String::from(
        "You compose operation plans for engineering drawing analysis over a property graph.\n\
         Use only the node types, properties and edge types listed below.\n\n",
    );
    out.push_str(&describe_schema(schema));

    out.push_str("\nOperations:\n");
    for kind in OperationKind::ALL {
        let _ = writeln!(out, "- {kind}: {}", operation_usage(kind));
    }

    out.push_str(
        "\nGuidance:\n\
         - Block references are INSERT entities; the referenced block name is property gc_2.\n\
         - Entities with an owner_block property belong to a block definition; placed entities \
         have none. Counts of parts or dimensions use placed entities only.\n\
         - For a bill of materials, FILTER type EQUALS INSERT, then FILTER owner_block NOT_EXISTS \
         over those ids, then AGGREGATE Entity with parameters {\"group_by\": \"gc_2\"} \
         restricted with parameters.node_ids to the placed INSERTs.\n\
         - Steps run independently. To feed one step into another, set a parameter to \"$stepN\" \
         (1-based); it expands to the node ids of step N.\n\
         - Only properties marked aggregable can be summed or averaged.\n",
    );

    let _ = write!(out, "\nQuery: {query}\n");
    out.push_str(
        "\nRespond with JSON only:\n\
         {\n  \"query\": \"the query\",\n  \"reasoning\": \"one or two sentences\",\n  \
         \"operations\": [\n    {\"type\": \"FILTER\", \"target_type\": \"Entity\", \
         \"property_name\": \"type\", \"parameters\": {\"value\": \"INSERT\"}}\n  ]\n}\n",
    );
    out
}
