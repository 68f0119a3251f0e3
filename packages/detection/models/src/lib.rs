#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Detection record, region ranking, and dashboard session types.
//!
//! This crate defines the shared data model for the litter-map system.
//! Ingest produces [`RawDetection`] rows, coordinate normalization turns
//! them into [`DetectionRecord`] values, and the spatial join wraps each
//! one in an [`AttributedDetection`] carrying its [`RegionAssignment`].
//! Ranking and KPI types are derived from the filtered set and are never
//! persisted.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Region label given to detections that fall outside every polygon.
pub const UNASSIGNED_REGION: &str = "unassigned";

/// Confidence threshold applied on a fresh load.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// A WGS84 longitude/latitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, east positive.
    pub lon: f64,
    /// Latitude in degrees, north positive.
    pub lat: f64,
}

impl GeoPoint {
    /// Creates a point from longitude and latitude.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A point in a projected (planar) reference system, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

/// Coordinates of a detection exactly as they appear in the source table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceCoordinates {
    /// Longitude/latitude already in the geographic datum.
    Geographic {
        /// Longitude in degrees.
        lon: f64,
        /// Latitude in degrees.
        lat: f64,
    },
    /// Easting/northing in the table's projected reference system.
    Projected {
        /// Easting in meters.
        x: f64,
        /// Northing in meters.
        y: f64,
    },
    /// Fractional pixel position in the source mosaic (bounding-box
    /// centre plus tile offset). Resolved through the raster transform.
    Pixel {
        /// Column (x) in pixels.
        col: f64,
        /// Row (y) in pixels.
        row: f64,
    },
}

/// A detection row as read from the source table, before its
/// coordinates are normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    /// Position among the retained rows of the table.
    pub id: usize,
    /// Producer-assigned confidence in `[0, 1]`.
    pub confidence: f64,
    /// Category label, when the table carries one.
    pub class_id: Option<i64>,
    /// Source coordinates.
    pub coordinates: SourceCoordinates,
}

/// A detection with normalized geographic coordinates.
///
/// Created once by coordinate normalization and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    /// Position among the retained rows of the table.
    pub id: usize,
    /// WGS84 location.
    pub location: GeoPoint,
    /// Projected location, when the source was projected or raster based.
    pub projected: Option<ProjectedPoint>,
    /// Producer-assigned confidence in `[0, 1]`.
    pub confidence: f64,
    /// Category label, when the table carries one.
    pub class_id: Option<i64>,
}

/// The region a detection was attributed to by the spatial join.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RegionAssignment {
    /// Contained by the named region polygon.
    Region(String),
    /// No polygon contains the point.
    Unassigned,
}

impl RegionAssignment {
    /// Returns the region name, or [`UNASSIGNED_REGION`].
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Region(name) => name,
            Self::Unassigned => UNASSIGNED_REGION,
        }
    }

    /// Returns `true` for the unassigned sentinel.
    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        matches!(self, Self::Unassigned)
    }
}

impl std::fmt::Display for RegionAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<RegionAssignment> for String {
    fn from(value: RegionAssignment) -> Self {
        match value {
            RegionAssignment::Region(name) => name,
            RegionAssignment::Unassigned => UNASSIGNED_REGION.to_string(),
        }
    }
}

impl From<String> for RegionAssignment {
    fn from(value: String) -> Self {
        if value == UNASSIGNED_REGION {
            Self::Unassigned
        } else {
            Self::Region(value)
        }
    }
}

/// A detection annotated with its containing region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributedDetection {
    /// The normalized detection.
    #[serde(flatten)]
    pub record: DetectionRecord,
    /// Region assigned by the spatial join.
    pub region: RegionAssignment,
}

impl AttributedDetection {
    /// Shorthand for the record's confidence.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.record.confidence
    }
}

/// Confidence band used to colour individual points on the map.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    /// Below 0.70.
    Low,
    /// 0.70 up to (not including) 0.85.
    Medium,
    /// 0.85 and above.
    High,
}

impl ConfidenceTier {
    /// Lower bound of [`Self::Medium`].
    pub const MEDIUM_MIN: f64 = 0.70;
    /// Lower bound of [`Self::High`].
    pub const HIGH_MIN: f64 = 0.85;

    /// Classifies a confidence score.
    #[must_use]
    pub fn for_confidence(confidence: f64) -> Self {
        if confidence >= Self::HIGH_MIN {
            Self::High
        } else if confidence >= Self::MEDIUM_MIN {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Marker colour for the tier.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::High => "#ffdd00",
            Self::Medium => "#00ffff",
            Self::Low => "#8888ff",
        }
    }
}

/// One row of the per-region ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    /// Region name, or [`UNASSIGNED_REGION`].
    pub region_name: String,
    /// Filtered detections attributed to the region.
    pub count: u64,
    /// 1-based position after sorting by count descending.
    pub rank: u32,
    /// Share of the filtered total, 0-100. Zero when nothing passed the
    /// filter.
    pub percent_of_filtered_total: f64,
}

/// Mean confidence of the filtered detections in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionConfidence {
    /// Region name, or [`UNASSIGNED_REGION`].
    pub region_name: String,
    /// Number of detections averaged.
    pub count: u64,
    /// Arithmetic mean of their confidence.
    pub mean_confidence: f64,
}

/// Headline numbers shown above the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    /// Detections in the loaded dataset.
    pub total_detections: u64,
    /// Detections at or above the confidence threshold.
    pub filtered_detections: u64,
    /// How many top regions the concentration covers.
    pub top_n: u32,
    /// Share of filtered detections in the top-N regions, 0-100.
    pub top_n_concentration_percent: f64,
    /// Sum of region polygon areas in a planar datum, in km².
    pub mapped_area_km2: f64,
}

/// Initial viewport for the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    /// Map centre.
    pub center: GeoPoint,
    /// Initial zoom level.
    pub zoom: u8,
}

/// Background tiles for the map.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Basemap {
    /// Dark vector-style tiles.
    #[default]
    Dark,
    /// Aerial imagery.
    Satellite,
}

impl Basemap {
    /// Tile provider identifier.
    #[must_use]
    pub const fn tiles(self) -> &'static str {
        match self {
            Self::Dark => "CartoDB dark_matter",
            Self::Satellite => "Esri.WorldImagery",
        }
    }

    /// Attribution text for the tile provider.
    #[must_use]
    pub const fn attribution(self) -> &'static str {
        match self {
            Self::Dark => "CartoDB",
            Self::Satellite => "Esri",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Dark, Self::Satellite]
    }
}

/// A toggleable map layer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MapLayer {
    /// Region outlines.
    Regions,
    /// Individual detection markers.
    Points,
    /// Detection density heatmap.
    Heatmap,
    /// Clustered markers.
    Clusters,
}

impl MapLayer {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Regions, Self::Points, Self::Heatmap, Self::Clusters]
    }
}

/// Visibility flags for each [`MapLayer`]. Everything is shown by default.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerToggles {
    /// Show region outlines.
    pub regions: bool,
    /// Show individual points.
    pub points: bool,
    /// Show the heatmap.
    pub heatmap: bool,
    /// Show marker clusters.
    pub clusters: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            regions: true,
            points: true,
            heatmap: true,
            clusters: true,
        }
    }
}

impl LayerToggles {
    /// Returns whether `layer` is visible.
    #[must_use]
    pub const fn is_enabled(&self, layer: MapLayer) -> bool {
        match layer {
            MapLayer::Regions => self.regions,
            MapLayer::Points => self.points,
            MapLayer::Heatmap => self.heatmap,
            MapLayer::Clusters => self.clusters,
        }
    }

    /// Sets the visibility of `layer`.
    pub const fn set(&mut self, layer: MapLayer, enabled: bool) {
        match layer {
            MapLayer::Regions => self.regions = enabled,
            MapLayer::Points => self.points = enabled,
            MapLayer::Heatmap => self.heatmap = enabled,
            MapLayer::Clusters => self.clusters = enabled,
        }
    }

    /// Visible layers in draw order.
    #[must_use]
    pub fn enabled(&self) -> Vec<MapLayer> {
        MapLayer::all()
            .iter()
            .copied()
            .filter(|layer| self.is_enabled(*layer))
            .collect()
    }
}

/// Error returned when a confidence threshold is outside `[0, 1]` or NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidThresholdError {
    /// The rejected threshold.
    pub value: f64,
}

impl std::fmt::Display for InvalidThresholdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid confidence threshold {}: expected 0.0-1.0",
            self.value
        )
    }
}

impl std::error::Error for InvalidThresholdError {}

/// Validates a confidence threshold.
///
/// # Errors
///
/// Returns an error if `value` is NaN or outside `[0, 1]`.
pub fn validate_threshold(value: f64) -> Result<f64, InvalidThresholdError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(InvalidThresholdError { value })
    }
}

/// Filter selections owned by one interactive session.
///
/// Reset to [`Default`] on every fresh load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilterState {
    /// Minimum confidence for the filtered views.
    pub confidence_threshold: f64,
    /// Layer visibility.
    pub layers: LayerToggles,
    /// Background tiles.
    pub basemap: Basemap,
    /// Region-name property to use instead of the configured one.
    pub region_column_override: Option<String>,
}

impl Default for SessionFilterState {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            layers: LayerToggles::default(),
            basemap: Basemap::default(),
            region_column_override: None,
        }
    }
}

impl SessionFilterState {
    /// Updates the confidence threshold.
    ///
    /// # Errors
    ///
    /// Returns an error (leaving the state untouched) if `value` is NaN or
    /// outside `[0, 1]`.
    pub fn set_threshold(&mut self, value: f64) -> Result<(), InvalidThresholdError> {
        self.confidence_threshold = validate_threshold(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(ConfidenceTier::for_confidence(0.85), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::for_confidence(0.849), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::for_confidence(0.70), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::for_confidence(0.69), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::for_confidence(0.0), ConfidenceTier::Low);
    }

    #[test]
    fn region_assignment_string_conversion() {
        let region = RegionAssignment::from("Setor A".to_string());
        assert_eq!(region, RegionAssignment::Region("Setor A".to_string()));
        assert_eq!(String::from(region), "Setor A");

        let unassigned = RegionAssignment::from(UNASSIGNED_REGION.to_string());
        assert!(unassigned.is_unassigned());
        assert_eq!(unassigned.to_string(), UNASSIGNED_REGION);
    }

    #[test]
    fn session_defaults_match_fresh_load() {
        let state = SessionFilterState::default();
        assert!((state.confidence_threshold - 0.70).abs() < f64::EPSILON);
        assert_eq!(state.basemap, Basemap::Dark);
        assert_eq!(state.layers.enabled(), MapLayer::all().to_vec());
        assert!(state.region_column_override.is_none());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut state = SessionFilterState::default();
        assert!(state.set_threshold(1.5).is_err());
        assert!(state.set_threshold(-0.1).is_err());
        assert!(state.set_threshold(f64::NAN).is_err());
        assert!((state.confidence_threshold - 0.70).abs() < f64::EPSILON);

        state.set_threshold(1.0).unwrap();
        assert!((state.confidence_threshold - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn layer_toggles_track_individual_layers() {
        let mut layers = LayerToggles::default();
        layers.set(MapLayer::Heatmap, false);
        assert!(!layers.is_enabled(MapLayer::Heatmap));
        assert_eq!(
            layers.enabled(),
            vec![MapLayer::Regions, MapLayer::Points, MapLayer::Clusters]
        );
    }

    #[test]
    fn basemap_parses_from_snake_case() {
        assert_eq!("satellite".parse::<Basemap>().unwrap(), Basemap::Satellite);
        assert_eq!(Basemap::Dark.as_ref(), "dark");
    }
}
