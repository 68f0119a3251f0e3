#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line dashboard for litter detections attributed to regions.
//!
//! `summary` prints the KPI block and ranking table, `export` writes the
//! dashboard snapshot and map layers to disk, and `interactive` (the
//! default) runs a `dialoguer` session over a single loaded dataset.
//!
//! Uses `indicatif-log-bridge` (via [`litter_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod report;

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use litter_map_attribution::export::{detections_geojson, regions_geojson};
use litter_map_attribution::session::DashboardLoader;
use litter_map_cli_utils::{IndicatifProgress, MultiProgress};
use litter_map_detection_models::{
    DEFAULT_CONFIDENCE_THRESHOLD, SessionFilterState, validate_threshold,
};
use litter_map_ingest::config::resolve_config;
use litter_map_ingest_models::DashboardConfig;

#[derive(Parser)]
#[command(name = "litter_map", about = "Litter detections ranked by region")]
struct Cli {
    /// Dashboard configuration TOML. Falls back to `LITTER_MAP_CONFIG`,
    /// then the built-in Goiânia configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the KPI block and the region ranking
    Summary {
        /// Minimum detection confidence (0.0-1.0)
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f64,
        /// Regions counted by the concentration KPI
        #[arg(long)]
        top: Option<usize>,
        /// Region-name property to use instead of the configured one
        #[arg(long)]
        region_column: Option<String>,
    },
    /// Write snapshot.json, detections.geojson and regions.geojson
    Export {
        /// Minimum detection confidence (0.0-1.0)
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f64,
        /// Output directory (created if missing)
        #[arg(long)]
        out: PathBuf,
        /// Region-name property to use instead of the configured one
        #[arg(long)]
        region_column: Option<String>,
    },
    /// Adjust filters interactively and reprint the summary
    Interactive,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = litter_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Summary {
            threshold,
            top,
            region_column,
        } => {
            if let Some(top) = top {
                config.top_n = top;
            }
            let state = filter_state(threshold, region_column)?;
            summary(&config, &state, &multi)?;
        }
        Commands::Export {
            threshold,
            out,
            region_column,
        } => {
            let state = filter_state(threshold, region_column)?;
            export(&config, &state, &out, &multi)?;
        }
        Commands::Interactive => interactive::run(&config, &multi)?,
    }

    Ok(())
}

fn filter_state(
    threshold: f64,
    region_column: Option<String>,
) -> Result<SessionFilterState, Box<dyn std::error::Error>> {
    Ok(SessionFilterState {
        confidence_threshold: validate_threshold(threshold)?,
        region_column_override: region_column,
        ..SessionFilterState::default()
    })
}

fn summary(
    config: &DashboardConfig,
    state: &SessionFilterState,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut loader = DashboardLoader::new();
    let progress = IndicatifProgress::records_bar(multi, "Reading detections");
    let dashboard = loader.load(config, state.region_column_override.as_deref(), &progress)?;

    let snapshot = dashboard.snapshot(state)?;
    report::print_snapshot(&snapshot);
    Ok(())
}

fn export(
    config: &DashboardConfig,
    state: &SessionFilterState,
    out: &Path,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut loader = DashboardLoader::new();
    let progress = IndicatifProgress::records_bar(multi, "Reading detections");
    let dashboard = loader.load(config, state.region_column_override.as_deref(), &progress)?;

    let snapshot = dashboard.snapshot(state)?;
    let detections = detections_geojson(&dashboard.summary(state.confidence_threshold)?.filtered);
    let regions = regions_geojson(dashboard.regions());

    std::fs::create_dir_all(out)?;
    write_json(&out.join("snapshot.json"), &serde_json::to_value(&snapshot)?)?;
    write_json(&out.join("detections.geojson"), &detections)?;
    write_json(&out.join("regions.geojson"), &regions)?;

    log::info!(
        "Exported {} detections and {} regions to {}",
        snapshot.kpis.filtered_detections,
        dashboard.regions().len(),
        out.display()
    );
    Ok(())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
