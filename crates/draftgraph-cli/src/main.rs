//! Draftgraph CLI
//!
//! Turns DXF drawings into property graphs and answers questions over them:
//! - `parse`, `graph` and `schema` show what the builder sees and produces
//! - `query` runs a composed operation plan against one or more drawings
//! - `divergence` and `compare` find blocks whose content drifted between drawings
//! - `bom` counts placed block instances into a bill of materials

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use draftgraph_analysis::{
    analyze_graphs, bom_from_result, bom_plan, bom_table, bom_to_csv, compare_block_versions,
    dimensions_to_csv, extract_dimensions, load_drawings, BillOfMaterials,
};
use draftgraph_graph::{
    create_schema, merge_graphs, BuildConfig, GraphBuilder, PropertyGraph,
};
use draftgraph_ingest_dxf::parse_dxf_file;
use draftgraph_ops::{
    describe_schema, execute_plan, render_prompt, CannedComposer, QueryService,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod report;

#[derive(Parser)]
#[command(name = "draftgraph")]
#[command(
    author,
    version,
    about = "Draftgraph: CAD drawings as queryable property graphs"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Graph builder configuration (JSON); defaults to DXF settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a drawing and summarize its entities and blocks.
    Parse {
        /// Input DXF file
        input: PathBuf,
    },

    /// Build the property graph for one or more drawings.
    ///
    /// Several inputs are merged into one graph, each element tagged with the
    /// drawing it came from.
    Graph {
        /// Input DXF files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write the graph as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the capability schema for a source format.
    Schema {
        /// Source format
        #[arg(long, default_value = "DXF")]
        format: String,
        /// Format version recorded in the schema
        #[arg(long, default_value = "")]
        format_version: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a question with a composed operation plan.
    ///
    /// The plan is the composer's JSON response (`--plan`). Use
    /// `--print-prompt` to get the prompt a composer should answer.
    Query {
        /// The question being answered
        query: String,
        /// Input DXF files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Composer response holding the operation plan
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Print the composition prompt and exit
        #[arg(long)]
        print_prompt: bool,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report blocks whose definition differs between drawings.
    Divergence {
        /// Input DXF files
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Exit with an error when any block diverges
        #[arg(long)]
        fail_on_divergence: bool,
    },

    /// Compare one block attribute by attribute across drawings.
    Compare {
        /// Block name
        block: String,
        /// Input DXF files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count block instances into a bill of materials.
    Bom {
        /// Input DXF files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = BomFormat::Table)]
        format: BomFormat,
        /// Include DIMENSION entities (JSON and CSV only)
        #[arg(long)]
        dimensions: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BomFormat {
    Table,
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => BuildConfig::from_json_file(path)?,
        None => BuildConfig::default(),
    };

    match cli.command {
        Commands::Parse { input } => cmd_parse(&input),
        Commands::Graph { inputs, out } => cmd_graph(&inputs, out.as_deref(), &config),
        Commands::Schema {
            format,
            format_version,
            json,
        } => cmd_schema(&format, &format_version, json),
        Commands::Query {
            query,
            inputs,
            plan,
            print_prompt,
            json,
        } => cmd_query(&query, &inputs, plan.as_deref(), print_prompt, json, &config),
        Commands::Divergence {
            inputs,
            json,
            fail_on_divergence,
        } => cmd_divergence(&inputs, json, fail_on_divergence, &config),
        Commands::Compare {
            block,
            inputs,
            json,
        } => cmd_compare(&block, &inputs, json, &config),
        Commands::Bom {
            inputs,
            format,
            dimensions,
            out,
        } => cmd_bom(&inputs, format, dimensions, out.as_deref(), &config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build one graph from `inputs`, merging when there are several.
fn load_graph(inputs: &[PathBuf], config: &BuildConfig) -> Result<PropertyGraph> {
    let graph = match inputs {
        [] => return Err(anyhow!("no input drawings")),
        [single] => GraphBuilder::new(config.clone()).build_from_file(single)?,
        _ => {
            let drawings = load_drawings(inputs, config)?;
            merge_graphs(drawings.iter().map(|d| (d.label.as_str(), &d.graph)))
        }
    };
    tracing::debug!(
        drawings = inputs.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "loaded graph"
    );
    Ok(graph)
}

fn write_or_print(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn cmd_parse(input: &Path) -> Result<()> {
    println!("{} {}", "Parsing".green().bold(), input.display());
    let file = parse_dxf_file(input)?;

    let version = if file.version.is_empty() {
        "(unspecified)"
    } else {
        file.version.as_str()
    };
    println!("  Version: {}", version.cyan());
    println!("  Entities: {}", file.entities.len());

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for entity in &file.entities {
        *by_type.entry(entity.entity_type.as_str()).or_default() += 1;
    }
    for (entity_type, count) in by_type {
        println!("    {}: {count}", entity_type.yellow());
    }

    println!("  Blocks: {}", file.blocks.len());
    for block in &file.blocks {
        println!(
            "    {}: {} entities",
            block.name.yellow(),
            block.entities.len()
        );
    }
    Ok(())
}

fn cmd_graph(inputs: &[PathBuf], out: Option<&Path>, config: &BuildConfig) -> Result<()> {
    let graph = load_graph(inputs, config)?;
    match out {
        Some(path) => {
            let json = serde_json::to_string_pretty(&graph)?;
            write_or_print(Some(path), &json)?;
        }
        None => {
            println!(
                "{} {} drawing(s)",
                "Built graph from".green().bold(),
                inputs.len()
            );
            print!("{}", report::stats(graph.stats()));
        }
    }
    Ok(())
}

fn cmd_schema(format: &str, format_version: &str, json: bool) -> Result<()> {
    let schema = create_schema(format, format_version)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        print!("{}", describe_schema(&schema));
    }
    Ok(())
}

fn cmd_query(
    query: &str,
    inputs: &[PathBuf],
    plan: Option<&Path>,
    print_prompt: bool,
    json: bool,
    config: &BuildConfig,
) -> Result<()> {
    let graph = load_graph(inputs, config)?;
    if print_prompt {
        println!("{}", render_prompt(graph.schema(), query));
        return Ok(());
    }

    let plan_path = plan.ok_or_else(|| {
        anyhow!("no plan composer is configured; pass --plan <file> (see --print-prompt)")
    })?;
    let composed = fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read {}", plan_path.display()))?;

    let service = QueryService::new(CannedComposer::new(composed));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let response = runtime.block_on(service.answer(&graph, query))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", report::query_response(&response));
    }
    Ok(())
}

fn cmd_divergence(
    inputs: &[PathBuf],
    json: bool,
    fail_on_divergence: bool,
    config: &BuildConfig,
) -> Result<()> {
    let drawings = load_drawings(inputs, config)?;
    let report = analyze_graphs(&drawings);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::divergence(&report));
    }

    if fail_on_divergence && !report.is_clean() {
        return Err(anyhow!(
            "{} block(s) diverge across drawings",
            report.divergent.len()
        ));
    }
    Ok(())
}

fn cmd_compare(block: &str, inputs: &[PathBuf], json: bool, config: &BuildConfig) -> Result<()> {
    let drawings = load_drawings(inputs, config)?;
    let comparison = compare_block_versions(block, &drawings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        print!("{}", report::comparison(&comparison));
    }
    Ok(())
}

/// INSERT entities, counted per referenced block name.
fn cmd_bom(
    inputs: &[PathBuf],
    format: BomFormat,
    dimensions: bool,
    out: Option<&Path>,
    config: &BuildConfig,
) -> Result<()> {
    let graph = load_graph(inputs, config)?;
    let run = execute_plan(&graph, &bom_plan())?;
    let entries = bom_from_result(&run.result, &graph)?;

    let text = match format {
        BomFormat::Table => bom_table(&entries),
        BomFormat::Csv => {
            let mut text = bom_to_csv(&entries);
            if dimensions {
                text.push('\n');
                text.push_str(&dimensions_to_csv(&extract_dimensions(&graph)));
            }
            text
        }
        BomFormat::Json => {
            let bom = BillOfMaterials {
                entries,
                dimensions: if dimensions {
                    extract_dimensions(&graph)
                } else {
                    Vec::new()
                },
            };
            let mut text = bom.to_json()?;
            text.push('\n');
            text
        }
    };
    write_or_print(out, &text)
}
