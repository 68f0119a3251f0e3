#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dashboard configuration schema.
//!
//! Defines the TOML layout describing where the detection table and the
//! region polygons live, which columns hold what, and which reference
//! systems the coordinates are in.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level dashboard configuration, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Human-readable dataset name shown as the dashboard title.
    pub name: String,
    /// Regions counted by the concentration KPI and top-N charts.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Rows shown by the ranking table.
    #[serde(default = "default_ranking_limit")]
    pub ranking_limit: usize,
    /// Map centre used when no detection passes the filter.
    #[serde(default)]
    pub default_center: CenterConfig,
    /// Initial map zoom level.
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Detection table settings.
    pub detections: DetectionTableConfig,
    /// Region polygon settings.
    pub regions: RegionLayerConfig,
}

impl DashboardConfig {
    /// Resolves relative input paths against `base_dir`.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: &Path) -> Self {
        self.detections.path = resolve(base_dir, &self.detections.path);
        self.regions.path = resolve(base_dir, &self.regions.path);
        self
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// A WGS84 map centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterConfig {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            lat: -16.6869,
            lon: -49.2648,
        }
    }
}

/// Where the detection table lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionTableConfig {
    /// CSV file path.
    pub path: PathBuf,
    /// Column holding the model confidence.
    #[serde(default = "default_confidence_column")]
    pub confidence_column: String,
    /// Column holding the class label. Rows are only filtered by class
    /// when the table actually has this column.
    #[serde(default = "default_class_column")]
    pub class_column: Option<String>,
    /// Class label of litter detections.
    #[serde(default = "default_litter_class_id")]
    pub litter_class_id: i64,
    /// How coordinates are stored.
    pub coordinates: CoordinateSource,
}

/// How detection coordinates are stored in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinateSource {
    /// WGS84 latitude/longitude columns.
    Geographic {
        /// Latitude column.
        #[serde(default = "default_lat_column")]
        lat_column: String,
        /// Longitude column.
        #[serde(default = "default_lon_column")]
        lon_column: String,
    },
    /// Easting/northing columns in a projected reference system.
    Projected {
        /// Reference system identifier (e.g., `"EPSG:31982"`).
        crs: String,
        /// Easting column.
        #[serde(default = "default_x_column")]
        x_column: String,
        /// Northing column.
        #[serde(default = "default_y_column")]
        y_column: String,
    },
    /// Tile-relative bounding boxes over a georeferenced mosaic.
    ///
    /// The detection sits at `(col + (x1 + x2) / 2, row + (y1 + y2) / 2)`
    /// in mosaic pixels, mapped through `transform` into `crs`.
    Raster {
        /// Reference system of the mosaic.
        crs: String,
        /// Mosaic affine transform in `a, b, c, d, e, f` order.
        transform: [f64; 6],
        /// Bounding-box and tile-offset columns.
        #[serde(default)]
        columns: RasterColumns,
    },
}

/// Column names for [`CoordinateSource::Raster`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterColumns {
    /// Box left edge within the tile.
    pub x1: String,
    /// Box top edge within the tile.
    pub y1: String,
    /// Box right edge within the tile.
    pub x2: String,
    /// Box bottom edge within the tile.
    pub y2: String,
    /// Tile row offset in the mosaic.
    pub row: String,
    /// Tile column offset in the mosaic.
    pub col: String,
}

impl Default for RasterColumns {
    fn default() -> Self {
        Self {
            x1: "x1".to_string(),
            y1: "y1".to_string(),
            x2: "x2".to_string(),
            y2: "y2".to_string(),
            row: "row".to_string(),
            col: "col".to_string(),
        }
    }
}

/// Where the region polygons live and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLayerConfig {
    /// `GeoJSON` `FeatureCollection` path.
    pub path: PathBuf,
    /// Feature property holding the region name.
    #[serde(default = "default_name_column")]
    pub name_column: String,
    /// Reference system of the polygon coordinates.
    #[serde(default = "default_geographic_crs")]
    pub crs: String,
    /// Planar reference system for area. Picked from the data's UTM zone
    /// when unset.
    #[serde(default)]
    pub area_crs: Option<String>,
}

const fn default_top_n() -> usize {
    5
}

const fn default_ranking_limit() -> usize {
    20
}

const fn default_zoom() -> u8 {
    12
}

const fn default_litter_class_id() -> i64 {
    1
}

fn default_confidence_column() -> String {
    "conf".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_class_column() -> Option<String> {
    Some("class".to_string())
}

fn default_lat_column() -> String {
    "lat".to_string()
}

fn default_lon_column() -> String {
    "lon".to_string()
}

fn default_x_column() -> String {
    "x".to_string()
}

fn default_y_column() -> String {
    "y".to_string()
}

fn default_name_column() -> String {
    "name_subdistrict".to_string()
}

fn default_geographic_crs() -> String {
    "EPSG:4326".to_string()
}
