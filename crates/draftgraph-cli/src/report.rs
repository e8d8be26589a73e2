//! Terminal rendering for command results.

use colored::Colorize;
use draftgraph_analysis::{BlockComparison, BlockDivergenceReport};
use draftgraph_graph::Stats;
use draftgraph_ops::{OperationResult, QueryResponse};
use std::fmt::Write;

/// Longest list printed in full before eliding the rest.
const LIST_LIMIT: usize = 20;

pub fn stats(stats: &Stats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Nodes: {}", stats.node_count);
    for (node_type, count) in &stats.nodes_per_type {
        let _ = writeln!(out, "    {}: {count}", node_type.cyan());
    }
    let _ = writeln!(out, "  Edges: {}", stats.edge_count);
    for (edge_type, count) in &stats.edges_per_type {
        let _ = writeln!(out, "    {}: {count}", edge_type.cyan());
    }
    out
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {label} ({}):", items.len());
    for item in items.iter().take(LIST_LIMIT) {
        let _ = writeln!(out, "    {item}");
    }
    if items.len() > LIST_LIMIT {
        let _ = writeln!(out, "    ... {} more", items.len() - LIST_LIMIT);
    }
}

pub fn operation_result(result: &OperationResult) -> String {
    let mut out = String::new();
    if !result.values.is_empty() {
        let width = result.values.keys().map(|k| k.len()).max().unwrap_or(0);
        let _ = writeln!(out, "  Values:");
        for (key, value) in &result.values {
            let _ = writeln!(out, "    {:<width$}  {}", key.yellow(), value);
        }
    }
    list(&mut out, "Nodes", &result.node_ids);
    list(&mut out, "Provenance", &result.provenance);
    let _ = writeln!(out, "  Processed: {}", result.processed);
    out
}

pub fn query_response(response: &QueryResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Query".green().bold(), response.plan.query);
    if !response.plan.explanation.is_empty() {
        let _ = writeln!(out, "  {}", response.plan.explanation.dimmed());
    }
    for (i, op) in response.plan.operations.iter().enumerate() {
        let target = if op.target_type.is_empty() {
            String::new()
        } else {
            format!(" {}", op.target_type)
        };
        let property = if op.property_name.is_empty() {
            String::new()
        } else {
            format!(".{}", op.property_name)
        };
        let _ = writeln!(out, "  {}. {}{target}{property}", i + 1, op.kind.as_str().cyan());
    }
    out.push_str(&operation_result(&response.result));
    let _ = writeln!(out, "  Elapsed: {} ms", response.elapsed_ms);
    out
}

pub fn divergence(report: &BlockDivergenceReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} blocks across {} drawings",
        "Analyzed".green().bold(),
        report.blocks_analyzed,
        report.drawings.len()
    );
    if report.is_clean() {
        let _ = writeln!(out, "{}", "No divergent blocks.".green());
        return out;
    }
    let _ = writeln!(
        out,
        "{} {} divergent block(s)",
        "warning:".yellow().bold(),
        report.divergent.len()
    );
    for block in &report.divergent {
        let _ = writeln!(out, "  {}", block.name.red().bold());
        for variant in &block.variants {
            let _ = writeln!(out, "    {}", variant.hash.dimmed());
            for drawing in &variant.drawings {
                let _ = writeln!(out, "      {drawing}");
            }
        }
    }
    out
}

pub fn comparison(comparison: &BlockComparison) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Block".green().bold(), comparison.block_name.bold());
    for (drawing, hash) in comparison.drawings.iter().zip(&comparison.hashes) {
        let _ = writeln!(out, "  {drawing}: {}", hash.dimmed());
    }
    if comparison.is_identical() {
        let _ = writeln!(out, "{}", "Identical in every drawing.".green());
        return out;
    }
    let _ = writeln!(out, "  Differences:");
    for diff in &comparison.differences {
        let _ = writeln!(out, "    {}", diff.attribute.yellow());
        for value in &diff.values {
            let shown = value.value.as_deref().unwrap_or("(absent)");
            let _ = writeln!(out, "      {}: {shown}", value.drawing);
        }
    }
    for pair in &comparison.differing_pairs {
        let _ = writeln!(
            out,
            "  {} vs {}: {}",
            pair.left,
            pair.right,
            pair.attributes.join(", ")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftgraph_analysis::{BlockVariant, DivergentBlock};

    #[test]
    fn long_lists_are_elided() {
        colored::control::set_override(false);
        let result = OperationResult {
            node_ids: (0..25).map(|i| format!("E{i}")).collect(),
            processed: 25,
            ..OperationResult::default()
        };
        let text = operation_result(&result);
        assert!(text.contains("Nodes (25):"));
        assert!(text.contains("E19"));
        assert!(!text.contains("E20\n"));
        assert!(text.contains("... 5 more"));
    }

    #[test]
    fn divergence_lists_variants_with_drawings() {
        colored::control::set_override(false);
        let report = BlockDivergenceReport {
            drawings: vec!["a.dxf".into(), "b.dxf".into()],
            blocks_analyzed: 3,
            divergent: vec![DivergentBlock {
                name: "U282".into(),
                variants: vec![
                    BlockVariant {
                        hash: "sha256:aa".into(),
                        drawings: vec!["a.dxf".into()],
                    },
                    BlockVariant {
                        hash: "sha256:bb".into(),
                        drawings: vec!["b.dxf".into()],
                    },
                ],
            }],
        };
        let text = divergence(&report);
        assert!(text.contains("Analyzed 3 blocks across 2 drawings"));
        assert!(text.contains("1 divergent block(s)"));
        assert!(text.contains("    sha256:bb\n      b.dxf"));

        let clean = divergence(&BlockDivergenceReport::default());
        assert!(clean.contains("No divergent blocks."));
    }
}
