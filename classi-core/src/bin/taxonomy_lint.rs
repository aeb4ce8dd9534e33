/// Taxonomy Lint - Reports data-quality problems in a flat taxonomy export
///
/// Usage: cargo run --bin taxonomy_lint <categories|locations> <nodes.json>
///
/// Exit codes: 0 clean, 1 warnings found, 2 usage or input error.

use classi_core::{TaxonomyKind, TaxonomyNode, TaxonomyTree};
use std::fs;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: cargo run --bin taxonomy_lint <categories|locations> <nodes.json>");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin taxonomy_lint categories exports/categories.json");
        return ExitCode::from(2);
    }

    let kind: TaxonomyKind = match args[1].parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let path = &args[2];
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            return ExitCode::from(2);
        }
    };

    let nodes: Vec<TaxonomyNode> = match serde_json::from_str(&content) {
        Ok(nodes) => nodes,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", path, e);
            return ExitCode::from(2);
        }
    };

    let input_count = nodes.len();
    let tree = TaxonomyTree::build(kind, nodes);

    info!(
        taxonomy = %kind,
        input = input_count,
        attached = tree.len(),
        roots = tree.root_entries().count(),
        "taxonomy built"
    );

    println!("{} ({} levels max)", kind, kind.max_depth());
    println!("  input nodes:    {}", input_count);
    println!("  attached nodes: {}", tree.len());
    println!("  roots:          {}", tree.root_entries().count());
    println!("  warnings:       {}", tree.warnings().len());

    if tree.warnings().is_empty() {
        return ExitCode::SUCCESS;
    }

    println!();
    for warning in tree.warnings() {
        warn!(taxonomy = %kind, %warning, "taxonomy build warning");
        println!("  - {}", warning);
    }

    ExitCode::from(1)
}
