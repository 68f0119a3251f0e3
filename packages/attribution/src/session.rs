//! Memoized attribution for an interactive session.
//!
//! The spatial join is the expensive step and does not depend on the
//! confidence threshold, so a [`Dashboard`] joins once per dataset load
//! and keeps one [`AttributionSummary`] per distinct threshold.
//! [`DashboardLoader`] keeps the current dashboard and only reloads when
//! the dataset fingerprint, detection CRS, or region column changes.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use litter_map_detection_models::{
    AttributedDetection, DashboardKpis, GeoPoint, MapView, RankEntry, RegionConfidence,
    SessionFilterState, validate_threshold,
};
use litter_map_ingest::progress::ProgressCallback;
use litter_map_ingest::{DatasetInputs, fingerprint::fingerprint_dataset, load_inputs};
use litter_map_ingest_models::{CoordinateSource, DashboardConfig};
use litter_map_spatial::{Crs, RegionIndex, RegionPolygon};

use crate::AttributionError;
use crate::pipeline::{
    compute_area_total, compute_kpis, filter_by_confidence, map_view, mean_confidence_by_region,
    normalize_coordinates, rank_by_region, spatial_join,
};
use crate::snapshot::DashboardSnapshot;

/// Identity of one dataset load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetKey {
    /// MD5 of the input files and their interpretation parameters.
    pub fingerprint: String,
    /// Reference system the detection coordinates are stored in.
    pub detection_crs: String,
    /// Property naming the regions.
    pub region_column: String,
}

impl DatasetKey {
    /// Computes the key for `config` read with `region_column`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError::Ingest`] if an input file cannot be
    /// read.
    pub fn for_config(
        config: &DashboardConfig,
        region_column: &str,
    ) -> Result<Self, AttributionError> {
        Ok(Self {
            fingerprint: fingerprint_dataset(config, region_column)?,
            detection_crs: detection_crs(&config.detections.coordinates).to_string(),
            region_column: region_column.to_string(),
        })
    }
}

fn detection_crs(source: &CoordinateSource) -> &str {
    match source {
        CoordinateSource::Geographic { .. } => "EPSG:4326",
        CoordinateSource::Projected { crs, .. } | CoordinateSource::Raster { crs, .. } => crs,
    }
}

/// Everything derived from the attributed dataset at one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionSummary {
    /// Threshold the summary was computed at.
    pub threshold: f64,
    /// Detections at or above the threshold.
    pub filtered: Vec<AttributedDetection>,
    /// Per-region counts of `filtered`.
    pub ranking: Vec<RankEntry>,
    /// Headline numbers.
    pub kpis: DashboardKpis,
    /// Mean confidence of the top-N regions.
    pub top_confidence: Vec<RegionConfidence>,
    /// Map viewport for `filtered`.
    pub view: MapView,
}

/// A loaded, attributed dataset with per-threshold summaries.
pub struct Dashboard {
    key: DatasetKey,
    config: DashboardConfig,
    index: RegionIndex,
    attributed: Vec<AttributedDetection>,
    mapped_area_km2: f64,
    summaries: BTreeMap<u64, AttributionSummary>,
}

impl Dashboard {
    /// Normalizes and joins `inputs` once.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError::Transform`] if the detection coordinates
    /// cannot be normalized or the area CRS is unusable.
    pub fn build(
        key: DatasetKey,
        config: DashboardConfig,
        inputs: DatasetInputs,
    ) -> Result<Self, AttributionError> {
        let records = normalize_coordinates(&inputs.detections, &config.detections.coordinates)?;

        let area_crs = config
            .regions
            .area_crs
            .as_deref()
            .map(str::parse::<Crs>)
            .transpose()?;
        let mapped_area_km2 = compute_area_total(&inputs.regions, area_crs)?;

        let index = RegionIndex::new(inputs.regions);
        let attributed = spatial_join(records, &index);

        Ok(Self {
            key,
            config,
            index,
            attributed,
            mapped_area_km2,
            summaries: BTreeMap::new(),
        })
    }

    /// Identity of the loaded dataset.
    #[must_use]
    pub const fn key(&self) -> &DatasetKey {
        &self.key
    }

    /// Configuration the dataset was loaded with.
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Region polygons in input order.
    #[must_use]
    pub fn regions(&self) -> &[RegionPolygon] {
        self.index.regions()
    }

    /// Every detection with its region, unfiltered.
    #[must_use]
    pub fn attributed(&self) -> &[AttributedDetection] {
        &self.attributed
    }

    /// Number of thresholds with a memoized summary.
    #[must_use]
    pub fn cached_summaries(&self) -> usize {
        self.summaries.len()
    }

    /// Summary at `threshold`, computed on first request.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError::InvalidThreshold`] if `threshold` is NaN
    /// or outside `[0, 1]`.
    pub fn summary(&mut self, threshold: f64) -> Result<&AttributionSummary, AttributionError> {
        let threshold = validate_threshold(threshold)?;

        // -0.0 and 0.0 are the same threshold.
        let summary = match self.summaries.entry((threshold + 0.0).to_bits()) {
            Entry::Occupied(entry) => {
                log::debug!("Summary cache hit for threshold {threshold}");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                log::debug!("Summary cache miss for threshold {threshold}");
                entry.insert(summarize(
                    &self.attributed,
                    threshold,
                    &self.config,
                    self.mapped_area_km2,
                ))
            }
        };

        Ok(summary)
    }

    /// Presentation view for the session's current filter state.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError::InvalidThreshold`] if the state's
    /// threshold is out of range.
    pub fn snapshot(
        &mut self,
        state: &SessionFilterState,
    ) -> Result<DashboardSnapshot, AttributionError> {
        let region_count = self.index.len();
        let region_column = self.key.region_column.clone();
        let title = self.config.name.clone();
        let ranking_limit = self.config.ranking_limit;
        let top_n = self.config.top_n;

        let summary = self.summary(state.confidence_threshold)?;
        Ok(DashboardSnapshot::new(
            title,
            region_column,
            summary,
            state,
            region_count,
            ranking_limit,
            top_n,
        ))
    }
}

fn summarize(
    attributed: &[AttributedDetection],
    threshold: f64,
    config: &DashboardConfig,
    mapped_area_km2: f64,
) -> AttributionSummary {
    let filtered = filter_by_confidence(attributed, threshold);
    let ranking = rank_by_region(&filtered);
    let kpis = compute_kpis(
        attributed.len(),
        &ranking,
        filtered.len(),
        config.top_n,
        mapped_area_km2,
    );
    let top = &ranking[..ranking.len().min(config.top_n)];
    let top_confidence = mean_confidence_by_region(&filtered, top);
    let center = GeoPoint::new(config.default_center.lon, config.default_center.lat);
    let view = map_view(&filtered, center, config.zoom);

    AttributionSummary {
        threshold,
        filtered,
        ranking,
        kpis,
        top_confidence,
        view,
    }
}

/// Holds the current [`Dashboard`] and reloads it when its inputs change.
#[derive(Default)]
pub struct DashboardLoader {
    cached: Option<Dashboard>,
    loads: usize,
}

impl DashboardLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dashboard for `config`, naming regions by
    /// `region_column` (the configured column when `None`).
    ///
    /// Files are fingerprinted on every call; they are only parsed and
    /// joined again when the fingerprint differs from the cached one.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError`] if the inputs cannot be loaded or
    /// attributed. The previously cached dashboard is dropped in that
    /// case.
    pub fn load(
        &mut self,
        config: &DashboardConfig,
        region_column: Option<&str>,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<&mut Dashboard, AttributionError> {
        let region_column = region_column.unwrap_or(&config.regions.name_column);
        let key = DatasetKey::for_config(config, region_column)?;

        if self
            .cached
            .as_ref()
            .is_some_and(|dashboard| dashboard.key == key && dashboard.config == *config)
        {
            progress.finish_and_clear();
        }

        self.load_with(key, config, || {
            Ok(load_inputs(config, region_column, progress)?)
        })
    }

    /// Like [`Self::load`] with a precomputed key and a custom input
    /// source. `read` only runs on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns whatever `read` or [`Dashboard::build`] fails with.
    pub fn load_with(
        &mut self,
        key: DatasetKey,
        config: &DashboardConfig,
        read: impl FnOnce() -> Result<DatasetInputs, AttributionError>,
    ) -> Result<&mut Dashboard, AttributionError> {
        match self.cached.take() {
            Some(dashboard) if dashboard.key == key && dashboard.config == *config => {
                log::debug!("Reusing loaded dataset {}", key.fingerprint);
                Ok(self.cached.insert(dashboard))
            }
            _ => {
                log::info!(
                    "Loading dataset {} (regions by '{}')",
                    key.fingerprint,
                    key.region_column
                );
                let inputs = read()?;
                let dashboard = Dashboard::build(key, config.clone(), inputs)?;
                self.loads += 1;
                Ok(self.cached.insert(dashboard))
            }
        }
    }

    /// The most recently loaded dashboard, if the last load succeeded.
    pub const fn current(&mut self) -> Option<&mut Dashboard> {
        self.cached.as_mut()
    }

    /// Drops the cached dashboard so the next load re-reads the inputs.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Number of times inputs were actually read and joined.
    #[must_use]
    pub const fn loads(&self) -> usize {
        self.loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};
    use litter_map_detection_models::{RawDetection, SourceCoordinates};
    use litter_map_ingest::config::default_config;
    use litter_map_ingest::progress::null_progress;

    fn config() -> DashboardConfig {
        let mut config = default_config();
        config.detections.coordinates = CoordinateSource::Geographic {
            lat_column: "lat".to_string(),
            lon_column: "lon".to_string(),
        };
        config.regions.area_crs = Some("EPSG:31982".to_string());
        config
    }

    fn key(fingerprint: &str) -> DatasetKey {
        DatasetKey {
            fingerprint: fingerprint.to_string(),
            detection_crs: "EPSG:4326".to_string(),
            region_column: "name_subdistrict".to_string(),
        }
    }

    fn inputs() -> DatasetInputs {
        let setor_a = polygon![
            (x: -49.30, y: -16.70),
            (x: -49.28, y: -16.70),
            (x: -49.28, y: -16.68),
            (x: -49.30, y: -16.68),
            (x: -49.30, y: -16.70),
        ];
        let detections = [0.9, 0.6, 0.8]
            .iter()
            .enumerate()
            .map(|(id, &confidence)| RawDetection {
                id,
                confidence,
                class_id: Some(1),
                coordinates: SourceCoordinates::Geographic {
                    lon: -49.29,
                    lat: -16.69,
                },
            })
            .collect();
        DatasetInputs {
            detections,
            regions: vec![RegionPolygon::new("Setor A", MultiPolygon(vec![setor_a]))],
        }
    }

    #[test]
    fn summaries_are_memoized_per_threshold() {
        let mut dashboard = Dashboard::build(key("a"), config(), inputs()).unwrap();

        let first = dashboard.summary(0.7).unwrap().clone();
        assert_eq!(first.filtered.len(), 2);
        assert_eq!(first.ranking[0].region_name, "Setor A");
        assert_eq!(first.ranking[0].count, 2);
        assert_eq!(dashboard.cached_summaries(), 1);

        let again = dashboard.summary(0.7).unwrap().clone();
        assert_eq!(first, again);
        assert_eq!(dashboard.cached_summaries(), 1);

        let lower = dashboard.summary(0.5).unwrap();
        assert_eq!(lower.filtered.len(), 3);
        assert_eq!(dashboard.cached_summaries(), 2);
    }

    #[test]
    fn negative_zero_shares_the_zero_entry() {
        let mut dashboard = Dashboard::build(key("a"), config(), inputs()).unwrap();
        dashboard.summary(0.0).unwrap();
        dashboard.summary(-0.0).unwrap();
        assert_eq!(dashboard.cached_summaries(), 1);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let mut dashboard = Dashboard::build(key("a"), config(), inputs()).unwrap();
        assert!(matches!(
            dashboard.summary(1.5),
            Err(AttributionError::InvalidThreshold(_))
        ));
        assert!(matches!(
            dashboard.summary(f64::NAN),
            Err(AttributionError::InvalidThreshold(_))
        ));
        assert_eq!(dashboard.cached_summaries(), 0);
    }

    #[test]
    fn loader_reuses_join_until_key_changes() {
        let config = config();
        let mut loader = DashboardLoader::new();

        loader.load_with(key("a"), &config, || Ok(inputs())).unwrap();
        loader
            .load_with(key("a"), &config, || panic!("inputs re-read on a cache hit"))
            .unwrap();
        assert_eq!(loader.loads(), 1);

        loader.load_with(key("b"), &config, || Ok(inputs())).unwrap();
        assert_eq!(loader.loads(), 2);

        let mut other_column = key("b");
        other_column.region_column = "bairro".to_string();
        loader
            .load_with(other_column, &config, || Ok(inputs()))
            .unwrap();
        assert_eq!(loader.loads(), 3);
    }

    #[test]
    fn reload_resets_memoized_summaries() {
        let config = config();
        let mut loader = DashboardLoader::new();

        let dashboard = loader.load_with(key("a"), &config, || Ok(inputs())).unwrap();
        dashboard.summary(0.7).unwrap();
        assert_eq!(dashboard.cached_summaries(), 1);

        let dashboard = loader.load_with(key("b"), &config, || Ok(inputs())).unwrap();
        assert_eq!(dashboard.cached_summaries(), 0);
    }

    #[test]
    fn invalidate_forces_a_reload() {
        let config = config();
        let mut loader = DashboardLoader::new();
        loader.load_with(key("a"), &config, || Ok(inputs())).unwrap();
        loader.invalidate();
        loader.load_with(key("a"), &config, || Ok(inputs())).unwrap();
        assert_eq!(loader.loads(), 2);
    }

    #[test]
    fn failed_load_leaves_nothing_cached() {
        let config = config();
        let mut loader = DashboardLoader::new();
        loader.load_with(key("a"), &config, || Ok(inputs())).unwrap();

        let result = loader.load_with(key("b"), &config, || {
            Err(litter_map_ingest::IngestError::MissingColumn {
                column: "conf".to_string(),
                table: "detections".to_string(),
            }
            .into())
        });
        assert!(matches!(result, Err(AttributionError::Ingest(_))));
        assert!(loader.current().is_none());

        loader.load_with(key("a"), &config, || Ok(inputs())).unwrap();
        assert_eq!(loader.loads(), 2);
    }

    #[test]
    fn loader_rereads_files_only_when_their_content_changes() {
        let dir = std::env::temp_dir();
        let id = std::process::id();
        let detections_path = dir.join(format!("litter_map_loader_{id}.csv"));
        let regions_path = dir.join(format!("litter_map_loader_{id}.geojson"));

        let regions = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "name_subdistrict": "Setor A" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-49.30, -16.70], [-49.28, -16.70], [-49.28, -16.68],
                        [-49.30, -16.68], [-49.30, -16.70]
                    ]]
                }
            }]
        });
        std::fs::write(&regions_path, regions.to_string()).unwrap();
        std::fs::write(
            &detections_path,
            "lat,lon,conf,class\n-16.69,-49.29,0.9,1\n-16.69,-49.29,0.6,1\n",
        )
        .unwrap();

        let mut config = config();
        config.detections.path.clone_from(&detections_path);
        config.regions.path.clone_from(&regions_path);
        let progress = null_progress();
        let mut loader = DashboardLoader::new();

        let first = loader.load(&config, None, &progress).unwrap();
        assert_eq!(first.attributed().len(), 2);
        loader.load(&config, None, &progress).unwrap();
        assert_eq!(loader.loads(), 1);

        std::fs::write(
            &detections_path,
            "lat,lon,conf,class\n-16.69,-49.29,0.9,1\n-16.69,-49.29,0.6,1\n-16.69,-49.29,0.8,1\n",
        )
        .unwrap();
        let reloaded = loader.load(&config, None, &progress).unwrap();
        let filtered = reloaded.summary(0.7).unwrap().filtered.len();

        std::fs::remove_file(&detections_path).ok();
        std::fs::remove_file(&regions_path).ok();

        assert_eq!(loader.loads(), 2);
        assert_eq!(filtered, 2);
    }

    #[test]
    fn empty_dataset_summarizes_to_zeros() {
        let empty = DatasetInputs {
            detections: Vec::new(),
            regions: Vec::new(),
        };
        let mut dashboard = Dashboard::build(key("empty"), config(), empty).unwrap();
        let summary = dashboard.summary(0.7).unwrap();

        assert_eq!(summary.kpis.total_detections, 0);
        assert!(summary.ranking.is_empty());
        assert!(summary.kpis.mapped_area_km2.abs() < f64::EPSILON);
        assert!((summary.view.center.lat - -16.6869).abs() < 1e-9);
    }
}
