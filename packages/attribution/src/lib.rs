#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Detection-to-region attribution.
//!
//! [`pipeline`] holds the pure operations (coordinate normalization,
//! spatial join, confidence filter, ranking, KPIs). [`session`] memoizes
//! them for an interactive session, [`snapshot`] shapes their output for
//! the presentation layer, and [`export`] writes it as `GeoJSON`.

pub mod export;
pub mod pipeline;
pub mod session;
pub mod snapshot;

use litter_map_detection_models::InvalidThresholdError;
use litter_map_ingest::IngestError;
use litter_map_spatial::CoordinateTransformError;
use thiserror::Error;

pub use pipeline::{
    PipelineOutput, PipelineParams, compute_area_total, filter_by_confidence, normalize_coordinates,
    rank_by_region, run_pipeline, spatial_join,
};

/// Errors that can occur while loading or attributing a dataset.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// Loading the inputs failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Coordinates or areas could not be transformed.
    #[error("Coordinate transform error: {0}")]
    Transform(#[from] CoordinateTransformError),

    /// A confidence threshold outside `[0, 1]` was requested.
    #[error(transparent)]
    InvalidThreshold(#[from] InvalidThresholdError),
}
