//! kitting - cloud anchor core for AR industrial kitting
//!
//! Headless driver: runs a scripted configure-then-visualize session against
//! the simulated platform, or lists what the anchor history holds.

mod config;
mod headless;

use anyhow::{Context, Result};
use clap::Parser;
use config::KittingConfig;
use headless::HeadlessConfig;
use kitting_core::{Clock, SystemClock};
use kitting_storage::{AnchorHistoryStore, JsonFileStore, KeyValueStore};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cloud anchor core for AR industrial kitting", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the anchor history; overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Scenario to configure and visualize
    #[arg(long, default_value = "Line1")]
    scenario: String,
    /// Write session events as JSON lines to this file
    #[arg(long)]
    event_log: Option<PathBuf>,
    /// Tick budget for each step of the scripted session
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Ticks a simulated cloud request stays in flight
    #[arg(long, default_value_t = 3)]
    latency: u32,
    /// Print the stored anchors per scenario and exit
    #[arg(long)]
    list: bool,
    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting kitting v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = match args.config.as_deref() {
        Some(path) => KittingConfig::load_from_path(path),
        None => KittingConfig::load(),
    };
    if let Some(dir) = args.data_dir.clone() {
        config.storage.data_dir = dir;
    }

    if let Some(path) = args.write_config.as_deref() {
        config.save_to_path(path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let store = AnchorHistoryStore::new(
        JsonFileStore::new(config.storage.data_dir.clone()),
        SystemClock,
        config.storage.store_config(),
    );

    if args.list {
        let mut store = store;
        return list_anchors(&mut store);
    }

    let summary = headless::run(
        HeadlessConfig {
            config,
            scenario: args.scenario.clone(),
            event_log: args.event_log,
            max_ticks: args.ticks,
            latency_ticks: args.latency,
        },
        store,
    )
    .with_context(|| format!("scripted session for '{}' failed", args.scenario))?;

    println!(
        "scenario {}: hosted {} | restored {} objects | fetched {} | {} ticks",
        args.scenario,
        summary.hosted.join(", "),
        summary.restored_objects,
        summary.fetched,
        summary.ticks
    );
    Ok(())
}

fn list_anchors<S: KeyValueStore, C: Clock>(store: &mut AnchorHistoryStore<S, C>) -> Result<()> {
    let scenarios = store.list_scenarios()?;
    if scenarios.is_empty() {
        println!("no scenarios stored");
    }
    for scenario in scenarios {
        let records = store.records_for_scenario(&scenario)?;
        println!("{scenario}: {} anchors", records.len());
        for record in records {
            println!(
                "  {} {} {} ({} objects)",
                record.name,
                record.cloud_anchor_id,
                record.serialized_time,
                record.objects.len()
            );
            for object in record.objects.iter().filter(|o| o.piece_info.is_configured()) {
                let piece = &object.piece_info;
                println!("    {} {} {}", piece.reference, piece.name, piece.localization);
            }
        }
    }
    Ok(())
}
