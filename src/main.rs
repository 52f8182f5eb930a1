//! `routeflow` developer CLI.
//!
//! # Architecture Overview
//!
//! ```text
//!   schema file (.toml / .json)
//!        │
//!        ▼
//!   config::loader ──▶ routing::builder ──▶ check:    node table
//!                              │
//!                              ├──────────▶ resolve:  matched entries (JSON)
//!                              │
//!                              ▼
//!                    navigation::router + MemoryHistory
//!                              │
//!                              └──────────▶ simulate: committed routes per step
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use routeflow::config::loader::{load_config, load_schema};
use routeflow::config::{RouterConfig, RouterOptions};
use routeflow::location::{strip_prefix, Location};
use routeflow::observability::logging;
use routeflow::routing::{resolve, MatchEntry, RouteTree};
use routeflow::{MemoryHistory, Router};

#[derive(Parser)]
#[command(name = "routeflow")]
#[command(about = "Inspect route schemas and simulate navigation", long_about = None)]
struct Cli {
    /// Router options file (`default`, `prefix`, `log_level`).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a schema and print its routes
    Check { schema: PathBuf },
    /// Match one location and print the entries as JSON
    Resolve { schema: PathBuf, location: String },
    /// Navigate through locations and print the committed routes after each
    Simulate {
        schema: PathBuf,
        #[arg(required = true)]
        locations: Vec<String>,
    },
}

/// One matched route in `resolve` output.
#[derive(Serialize)]
struct ResolvedRoute<'a> {
    route: &'a str,
    #[serde(flatten)]
    entry: &'a MatchEntry,
}

#[derive(Serialize)]
struct Resolution<'a> {
    location: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    outside_prefix: bool,
    routes: Vec<ResolvedRoute<'a>>,
    paths: BTreeMap<&'a str, &'a str>,
    query: BTreeMap<&'a str, &'a str>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    logging::init(&level)?;
    let options = RouterOptions::from_config(config);

    match cli.command {
        Commands::Check { schema } => {
            let schema = load_schema(&schema)?;
            let tree = RouteTree::build(&schema, &options)?;
            for node in tree.nodes() {
                println!(
                    "{:>4}  {:<32} {:<16} {:<10} {}",
                    node.id(),
                    node.key(),
                    node.pattern().to_string(),
                    node.group().unwrap_or("-"),
                    if node.is_exact_route() { "exact" } else { "" }
                );
            }
            tracing::info!(routes = tree.nodes().len(), "Schema is valid");
        }
        Commands::Resolve { schema, location } => {
            let schema = load_schema(&schema)?;
            let tree = RouteTree::build(&schema, &options)?;
            let location = Location::parse(&location);

            let Some(pathname) = strip_prefix(&location.pathname, options.config.prefix.as_deref()) else {
                let output = Resolution {
                    location: location.to_string(),
                    outside_prefix: true,
                    routes: Vec::new(),
                    paths: BTreeMap::new(),
                    query: BTreeMap::new(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            };
            let source = resolve(&tree, pathname, location.query())?;

            let routes = source
                .entries
                .iter()
                .filter_map(|(id, entry)| {
                    let node = tree.node(*id)?;
                    Some(ResolvedRoute { route: node.key(), entry })
                })
                .collect();
            let output = Resolution {
                location: location.to_string(),
                outside_prefix: false,
                routes,
                paths: source
                    .paths
                    .iter()
                    .map(|(slot, path)| (slot.as_deref().unwrap_or_default(), path.as_str()))
                    .collect(),
                query: source.query.iter().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Simulate { schema, locations } => {
            let schema = load_schema(&schema)?;
            let history = MemoryHistory::default();
            let router = Router::new(&schema, history.clone(), options)?;
            router.listen().await;

            for location in locations {
                router.navigate(Location::parse(&location)).await;
                let outcome = router
                    .last_outcome()
                    .map(|outcome| outcome.to_string())
                    .unwrap_or_default();
                println!(
                    "{:<24} {:<24} [{}]",
                    location,
                    outcome,
                    router.active().join(", ")
                );
            }

            router.teardown();
            tracing::info!(entries = history.entries().len(), "Simulation complete");
        }
    }

    Ok(())
}
