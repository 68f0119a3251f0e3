#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration loading and input ingest for the litter map.
//!
//! Reads the detection table (CSV) and the region polygons (`GeoJSON`)
//! named by a [`DashboardConfig`], validates the configured columns, and
//! fingerprints the inputs so downstream caches can tell when a re-ingest
//! changed anything. Any failure here aborts the load; nothing partial is
//! handed on.

pub mod config;
pub mod detections;
pub mod fingerprint;
pub mod progress;
pub mod regions;

use std::path::PathBuf;
use std::sync::Arc;

use litter_map_detection_models::RawDetection;
use litter_map_ingest_models::DashboardConfig;
use litter_map_spatial::{CoordinateTransformError, RegionPolygon};
use thiserror::Error;

use crate::progress::ProgressCallback;

/// Errors that can occur while loading inputs.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A configured column or property is absent from the input.
    #[error("Missing column '{column}' in {table}")]
    MissingColumn {
        /// Column or property name.
        column: String,
        /// Which input was being read.
        table: String,
    },

    /// Coordinates could not be interpreted or transformed.
    #[error("Coordinate transform error: {0}")]
    CoordinateTransform(#[from] CoordinateTransformError),

    /// An input file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV syntax error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` syntax or structure error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Configuration TOML is invalid.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A record parsed but holds an unusable value.
    #[error("Malformed {table} record {record}: {message}")]
    Malformed {
        /// Which input was being read.
        table: String,
        /// 1-based record number.
        record: usize,
        /// What was wrong.
        message: String,
    },
}

/// Raw inputs of one dataset load.
pub struct DatasetInputs {
    /// Detections before coordinate normalization.
    pub detections: Vec<RawDetection>,
    /// Region polygons in WGS84, in file order.
    pub regions: Vec<RegionPolygon>,
}

/// Loads both inputs named by `config`, naming regions by
/// `region_column`.
///
/// # Errors
///
/// Returns [`IngestError`] if either input is missing, malformed, or lacks
/// a configured column.
pub fn load_inputs(
    config: &DashboardConfig,
    region_column: &str,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<DatasetInputs, IngestError> {
    progress.set_message(format!("Reading {}", config.detections.path.display()));
    let detections =
        detections::read_detections_file(&config.detections.path, &config.detections, progress)?;

    let regions = regions::read_regions_file(&config.regions.path, &config.regions, region_column)?;

    Ok(DatasetInputs {
        detections,
        regions,
    })
}
