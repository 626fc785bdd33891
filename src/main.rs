//! wingstore MCP server
//!
//! Hierarchical knowledge store for AI agents, served over stdio JSON-RPC.
//!
//! Run with: cargo run
//! Or via MCP: add `wingstore --stdio` to your client config

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use wingstore::{
    mcp, AtomType, Config, ConsolidationLevel, ResearchSummary, WingEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = Config::from_env();
    init_tracing(&config);

    // COMMAND MODE
    if args.len() > 1 {
        match args[1].as_str() {
            "--tools" => {
                let tools = mcp::get_tools();
                println!("{}", serde_json::to_string_pretty(&tools)?);
                return Ok(());
            }
            "--structure" => {
                let engine = open_engine(&config)?;
                println!("{}", serde_json::to_string_pretty(&engine.wing_structure()?)?);
                return Ok(());
            }
            "--stats" => return run_stats(&config),
            "--verify" => return run_verify(&config),
            "store" => {
                // store <wing/path> <json> [--type=X]
                let positional = positional_args(&args[2..]);
                let (Some(path), Some(data)) = (positional.first(), positional.get(1)) else {
                    bail!("Usage: store <wing/path> <json> [--type=fact]");
                };
                let atom_type = flag_value(&args, "--type=").map(AtomType::from);
                return run_store(&config, path, data, atom_type);
            }
            "search" => {
                // search <query> [--wing=a/b]... [--limit=N]
                let query = positional_args(&args[2..]).join(" ");
                let wings: Vec<Vec<String>> = args
                    .iter()
                    .filter_map(|a| a.strip_prefix("--wing="))
                    .map(split_wing_path)
                    .collect();
                let limit = parse_flag::<usize>(&args, "--limit=")?;
                return run_search(&config, &query, wings, limit);
            }
            "research" => {
                // research <topic> [--max=N] [--level=brief|detailed|comprehensive]
                let topic = positional_args(&args[2..]).join(" ");
                let max_atoms = parse_flag::<usize>(&args, "--max=")?;
                let level = match flag_value(&args, "--level=") {
                    Some(level) => level.parse::<ConsolidationLevel>()?,
                    None => ConsolidationLevel::default(),
                };
                return run_research(&config, &topic, max_atoms, level);
            }
            "--stdio" => {}
            other => bail!("Unknown command: {} (try --tools, --stats, store, search, research)", other),
        }
    }

    // SERVER MODE: default
    let engine = Arc::new(open_engine(&config)?);
    run_stdio_server(engine).await
}

fn init_tracing(config: &Config) {
    // stdout carries protocol traffic; logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_engine(config: &Config) -> Result<WingEngine> {
    let path = config.snapshot_path();
    let engine = WingEngine::open_file(&path)
        .with_context(|| format!("Failed to open wing store at {:?}", path))?;
    tracing::info!("Wing store ready at {}", engine.location());
    Ok(engine)
}

fn positional_args(args: &[String]) -> Vec<String> {
    args.iter().filter(|a| !a.starts_with("--")).cloned().collect()
}

fn flag_value<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter().find_map(|a| a.strip_prefix(prefix))
}

fn parse_flag<T: std::str::FromStr>(args: &[String], prefix: &str) -> Result<Option<T>> {
    flag_value(args, prefix)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| anyhow::anyhow!("Invalid value for {}{}", prefix, v))
        })
        .transpose()
}

/// `coding/elixir` -> ["coding", "elixir"]
fn split_wing_path(raw: &str) -> Vec<String> {
    raw.split('/').map(str::to_string).collect()
}

fn run_store(config: &Config, path: &str, data: &str, atom_type: Option<AtomType>) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(data).context("atom data must be valid JSON")?;
    let engine = open_engine(config)?;
    let stored = engine.store_atom(&split_wing_path(path), &payload, atom_type)?;
    println!("{}", stored.atom_id);
    Ok(())
}

fn run_search(
    config: &Config,
    query: &str,
    wings: Vec<Vec<String>>,
    limit: Option<usize>,
) -> Result<()> {
    let engine = open_engine(config)?;
    let filters = (!wings.is_empty()).then_some(wings);
    let hits = engine.search_atoms(query, filters.as_deref(), limit)?;

    if hits.is_empty() {
        println!("No atoms matched \"{}\"", query);
        return Ok(());
    }
    for hit in &hits {
        println!(
            "{:.3}  {:<28} {}  {}",
            hit.relevance,
            hit.wing_path.join("/"),
            hit.atom_id,
            truncate(&hit.atom_data.to_string(), 60)
        );
    }
    // Access counts only reach disk on the next write
    engine.flush()?;
    Ok(())
}

fn run_research(
    config: &Config,
    topic: &str,
    max_atoms: Option<usize>,
    level: ConsolidationLevel,
) -> Result<()> {
    let engine = open_engine(config)?;
    let report = engine.deep_research(topic, max_atoms, level)?;

    println!("Research: {} ({} atoms, {}ms)", report.topic, report.atoms_analyzed, report.research_time_ms);
    match &report.summary {
        ResearchSummary::Brief(lines) => {
            for line in lines {
                println!("  - {}", line);
            }
        }
        ResearchSummary::Insights(insights) => {
            println!("{}", serde_json::to_string_pretty(insights)?);
        }
    }
    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let stats = engine.stats()?;

    println!("\nWINGSTORE STATISTICS");
    println!("====================\n");
    println!("Snapshot: {}", engine.location());
    println!("Atoms: {}", stats.total_atoms);
    println!("Wings: {}", stats.total_wings);
    println!("Searches: {}", stats.total_searches);
    println!("Research runs: {}", stats.total_research);
    match stats.last_updated {
        Some(ts) => println!("Last updated: {}", ts.to_rfc3339()),
        None => println!("Last updated: never"),
    }

    if !stats.atoms_by_type.is_empty() {
        println!("\nATOMS BY TYPE:");
        for (atom_type, count) in &stats.atoms_by_type {
            println!("  {:<12} {}", atom_type, count);
        }
    }

    println!("\nWINGS:");
    for wing in engine.list_wings(None)? {
        println!("  {:<32} {:>5} atoms  (specificity {:.1})", wing.path.join("/"), wing.atom_count, wing.specificity);
    }
    Ok(())
}

fn run_verify(config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let report = engine.verify_atoms()?;

    println!("Checked {} atoms", report.atoms_checked);
    println!("Duplicate content: {} atoms across {} hashes", report.duplicate_atoms, report.duplicate_hashes);
    if report.mismatched.is_empty() {
        println!("All hashes match");
        return Ok(());
    }
    for id in &report.mismatched {
        println!("  MISMATCH {}", id);
    }
    bail!("{} atoms failed hash verification", report.mismatched.len())
}

/// Line-delimited JSON-RPC over stdin/stdout
async fn run_stdio_server(engine: Arc<WingEngine>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!("Serving MCP over stdio");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let handler = Arc::clone(&engine);
        let response = tokio::task::spawn_blocking(move || mcp::handle_line(&handler, &line))
            .await
            .context("request handler panicked")?;

        if let Some(response) = response {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, flushing wing store");
    engine.flush()?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max.saturating_sub(3)).collect::<String>())
    }
}
