//! Schema Compatibility CLI
//!
//! Compares stored schema sets, resolves baselines and packages schema
//! sets into attribute maps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schema_evolution::codec::node::value_to_node;
use schema_evolution::{
    resolver, Attributes, EvolutionConfig, Mode, NamedSchemaSet, SchemaVersion, Strategy,
};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-compat")]
#[command(about = "Check schema evolution compatibility")]
struct Cli {
    /// Config file (defaults to schema-evolution.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a current attribute map against a baseline attribute map
    Check {
        /// Attribute map (JSON object) of the version being built
        #[arg(long)]
        current: PathBuf,
        /// Attribute map (JSON object) of the published baseline
        #[arg(long)]
        baseline: PathBuf,
        /// backward, forward or full (overrides config)
        #[arg(short, long)]
        mode: Option<Mode>,
        /// Print issues as JSON
        #[arg(long)]
        json: bool,
    },

    /// Select baseline versions for a release
    Resolve {
        /// Version being built
        #[arg(long)]
        current: String,
        /// Published versions
        #[arg(long, num_args = 1..)]
        known: Vec<String>,
        /// latest_minor, latest_patch, previous_major or all (overrides config)
        #[arg(short, long)]
        strategy: Option<Strategy>,
        /// Allow prerelease versions as baselines
        #[arg(long)]
        include_prereleases: bool,
    },

    /// Package a schema set document into an attribute map
    Encode {
        /// JSON object of {typeName: {schema, metadata}}
        #[arg(short, long)]
        input: PathBuf,
        /// Write the attribute map here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct SetDocumentEntry {
    schema: serde_json::Value,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// `Ok(false)` when the configured policy fails the check
fn run(cli: Cli) -> Result<bool> {
    let mut config = EvolutionConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Check {
            current,
            baseline,
            mode,
            json,
        } => {
            if let Some(mode) = mode {
                config.compatibility.mode = mode;
            }
            let codec = config.codec();
            let current_set = codec.decode_or_empty(&read_attributes(&current)?);
            let baseline_set = codec.decode_or_empty(&read_attributes(&baseline)?);
            info!(
                current = current_set.len(),
                baseline = baseline_set.len(),
                mode = %config.compatibility.mode,
                "Checking schema sets"
            );

            let report = config.checker().check_sets(&current_set, &baseline_set);
            if json {
                println!("{}", serde_json::to_string_pretty(&report.issues)?);
            } else {
                for issue in &report.issues {
                    println!("{}", issue);
                }
                println!(
                    "{} issue(s): {} error(s), {} warning(s)",
                    report.issues.len(),
                    report.errors(),
                    report.warnings()
                );
            }

            match report.enforce(&config.policy()) {
                Ok(()) => Ok(true),
                Err(violation) => {
                    eprintln!("{}", violation);
                    Ok(false)
                }
            }
        }

        Commands::Resolve {
            current,
            known,
            strategy,
            include_prereleases,
        } => {
            let strategy = strategy.unwrap_or(config.baseline.strategy);
            let include = include_prereleases || config.baseline.include_prereleases;
            for version in resolver::resolve_baselines_with(&current, &known[..], strategy, include) {
                println!("{}", version);
            }
            Ok(true)
        }

        Commands::Encode { input, output } => {
            let set = read_set_document(&input)?;
            let attributes = config
                .codec()
                .encode(&set)
                .with_context(|| format!("Schema set in {} is invalid", input.display()))?;
            let rendered = serde_json::to_string_pretty(&attributes)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), schemas = set.len(), "Wrote attribute map");
                }
                None => println!("{}", rendered),
            }
            Ok(true)
        }
    }
}

fn read_attributes(path: &Path) -> Result<Attributes> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a JSON object of strings", path.display()))
}

fn read_set_document(path: &Path) -> Result<NamedSchemaSet> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document: BTreeMap<String, SetDocumentEntry> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut set = NamedSchemaSet::new();
    for (type_name, entry) in document {
        let node = value_to_node(&entry.schema, "").with_context(|| format!("Invalid schema for {}", type_name))?;
        set.insert(SchemaVersion {
            type_name,
            node,
            metadata: entry.metadata,
        })?;
    }
    Ok(set)
}
