//! Interactive dashboard session.
//!
//! Provides a menu-driven loop using `dialoguer` that adjusts the filter
//! state and reprints the summary. The dataset is joined once; threshold,
//! layer, and basemap changes reuse the memoized join. A region column
//! override triggers a fresh load and resets the other filters, and so
//! does a change to the input files between views.

use dialoguer::{Input, MultiSelect, Select};
use litter_map_attribution::session::DashboardLoader;
use litter_map_cli_utils::{IndicatifProgress, MultiProgress};
use litter_map_detection_models::{Basemap, MapLayer, SessionFilterState};
use litter_map_ingest_models::DashboardConfig;

use crate::report;

/// Actions available in the session menu.
enum SessionAction {
    ShowSummary,
    SetThreshold,
    ToggleLayers,
    SwitchBasemap,
    RegionColumn,
    Quit,
}

impl SessionAction {
    const ALL: &[Self] = &[
        Self::ShowSummary,
        Self::SetThreshold,
        Self::ToggleLayers,
        Self::SwitchBasemap,
        Self::RegionColumn,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::ShowSummary => "Show summary",
            Self::SetThreshold => "Set confidence threshold",
            Self::ToggleLayers => "Toggle map layers",
            Self::SwitchBasemap => "Switch basemap",
            Self::RegionColumn => "Override region column",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the session loop until the user quits.
///
/// # Errors
///
/// Returns an error if the dataset cannot be loaded or a prompt fails.
/// An out-of-range threshold is reported and re-prompted rather than
/// returned.
pub fn run(config: &DashboardConfig, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let mut loader = DashboardLoader::new();
    let mut state = SessionFilterState::default();

    println!("{}", config.name);
    show(&mut loader, config, &mut state, multi)?;

    let labels: Vec<&str> = SessionAction::ALL.iter().map(SessionAction::label).collect();

    loop {
        println!();
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        match SessionAction::ALL[idx] {
            SessionAction::ShowSummary => {}
            SessionAction::SetThreshold => prompt_threshold(&mut state)?,
            SessionAction::ToggleLayers => prompt_layers(&mut state)?,
            SessionAction::SwitchBasemap => prompt_basemap(&mut state)?,
            SessionAction::RegionColumn => {
                let column = prompt_region_column(config, &state)?;
                if column != state.region_column_override {
                    // A different region column is a fresh load.
                    state = SessionFilterState {
                        region_column_override: column,
                        ..SessionFilterState::default()
                    };
                }
            }
            SessionAction::Quit => break,
        }

        if let Err(e) = show(&mut loader, config, &mut state, multi) {
            log::error!("{e}");
            if state.region_column_override.is_some() {
                println!("Reverting to the configured region column.");
                state = SessionFilterState::default();
                show(&mut loader, config, &mut state, multi)?;
            } else {
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Loads (or reuses) the dashboard and prints it. When the inputs changed
/// on disk since the last view, `state` is reset before printing.
fn show(
    loader: &mut DashboardLoader,
    config: &DashboardConfig,
    state: &mut SessionFilterState,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = IndicatifProgress::records_bar(multi, "Reading detections");
    let loads_before = loader.loads();
    if let Err(e) = loader.load(config, state.region_column_override.as_deref(), &progress) {
        progress.finish_and_clear();
        return Err(e.into());
    }

    if let Some(reset) = filters_after_load(state, loads_before, loader.loads()) {
        if reset != *state {
            println!("Inputs changed on disk; filters reset.");
        }
        *state = reset;
    }

    let Some(dashboard) = loader.current() else {
        return Err("no dashboard loaded".into());
    };
    let snapshot = dashboard.snapshot(state)?;
    report::print_snapshot(&snapshot);
    Ok(())
}

/// A reload after the first one means the inputs changed, which starts the
/// filters over. Only the region column choice survives, since it picked
/// the dataset that was loaded.
fn filters_after_load(
    state: &SessionFilterState,
    loads_before: usize,
    loads_after: usize,
) -> Option<SessionFilterState> {
    (loads_before > 0 && loads_after > loads_before).then(|| SessionFilterState {
        region_column_override: state.region_column_override.clone(),
        ..SessionFilterState::default()
    })
}

fn prompt_threshold(state: &mut SessionFilterState) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let input: String = Input::new()
            .with_prompt("Confidence threshold (0.0-1.0)")
            .default(format!("{:.2}", state.confidence_threshold))
            .interact_text()?;

        let Ok(value) = input.trim().parse::<f64>() else {
            println!("'{}' is not a number.", input.trim());
            continue;
        };
        match state.set_threshold(value) {
            Ok(()) => return Ok(()),
            Err(e) => println!("{e}"),
        }
    }
}

fn prompt_layers(state: &mut SessionFilterState) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<String> = MapLayer::all().iter().map(ToString::to_string).collect();
    let defaults: Vec<bool> = MapLayer::all()
        .iter()
        .map(|layer| state.layers.is_enabled(*layer))
        .collect();

    let selected = MultiSelect::new()
        .with_prompt("Visible layers (space=toggle, a=all, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    for (i, layer) in MapLayer::all().iter().enumerate() {
        state.layers.set(*layer, selected.contains(&i));
    }
    Ok(())
}

fn prompt_basemap(state: &mut SessionFilterState) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<String> = Basemap::all()
        .iter()
        .map(|basemap| format!("{basemap} ({})", basemap.tiles()))
        .collect();
    let current = Basemap::all()
        .iter()
        .position(|basemap| *basemap == state.basemap)
        .unwrap_or(0);

    let idx = Select::new()
        .with_prompt("Basemap")
        .items(&labels)
        .default(current)
        .interact()?;

    state.basemap = Basemap::all()[idx];
    Ok(())
}

/// Returns `None` to use the configured column.
fn prompt_region_column(
    config: &DashboardConfig,
    state: &SessionFilterState,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let current = state
        .region_column_override
        .as_deref()
        .unwrap_or(&config.regions.name_column);

    let input: String = Input::new()
        .with_prompt(format!(
            "Region name property (empty for '{}')",
            config.regions.name_column
        ))
        .with_initial_text(current)
        .allow_empty(true)
        .interact_text()?;

    let column = input.trim();
    if column.is_empty() || column == config.regions.name_column {
        Ok(None)
    } else {
        Ok(Some(column.to_string()))
    }
}
