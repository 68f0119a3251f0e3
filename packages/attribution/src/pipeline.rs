//! The attribution pipeline.
//!
//! Raw detections and region polygons go through coordinate
//! normalization, a spatial join, the confidence filter, and a ranking by
//! region, ending in the KPI block. Every step is a pure function of its
//! inputs; the join is the only expensive one and does not depend on the
//! threshold, which is what [`crate::session::Dashboard`] exploits.

use std::collections::BTreeMap;

use litter_map_detection_models::{
    AttributedDetection, DashboardKpis, DetectionRecord, GeoPoint, MapView, ProjectedPoint,
    RankEntry, RawDetection, RegionAssignment, RegionConfidence, SourceCoordinates,
};
use litter_map_ingest_models::CoordinateSource;
use litter_map_spatial::{
    CoordinateTransformError, Crs, GeoTransform, RegionIndex, RegionPolygon, Transformer,
    planar_area_km2,
};

/// Converts source coordinates to WGS84 longitude/latitude.
///
/// Geographic rows are range-checked, projected rows go through the
/// inverse of `source`'s projection, and raster rows are first mapped to
/// the mosaic's projected system by its affine transform (sampled at the
/// pixel centre). The projected position is kept on the record when there
/// was one.
///
/// # Errors
///
/// Returns [`CoordinateTransformError`] if the configured CRS is unknown,
/// or a point lies outside the transform's domain.
pub fn normalize_coordinates(
    records: &[RawDetection],
    source: &CoordinateSource,
) -> Result<Vec<DetectionRecord>, CoordinateTransformError> {
    let (crs, transform) = match source {
        CoordinateSource::Geographic { .. } => (Crs::WGS84, None),
        CoordinateSource::Projected { crs, .. } => (crs.parse::<Crs>()?, None),
        CoordinateSource::Raster { crs, transform, .. } => {
            (crs.parse::<Crs>()?, Some(GeoTransform::new(*transform)))
        }
    };
    let to_wgs84 = Transformer::new(crs, Crs::WGS84)?;

    records
        .iter()
        .map(|raw| {
            let projected = match raw.coordinates {
                SourceCoordinates::Geographic { lon, lat } => {
                    let (lon, lat) = to_wgs84.convert(lon, lat)?;
                    return Ok(to_record(raw, GeoPoint::new(lon, lat), None));
                }
                SourceCoordinates::Projected { x, y } => (x, y),
                SourceCoordinates::Pixel { col, row } => {
                    let Some(transform) = transform.as_ref() else {
                        return Err(CoordinateTransformError::UndefinedTransform {
                            crs: "pixel (no raster transform configured)".to_string(),
                            x: col,
                            y: row,
                        });
                    };
                    transform.pixel_center(col, row)
                }
            };

            let (x, y) = projected;
            let (lon, lat) = to_wgs84.convert(x, y)?;
            Ok(to_record(
                raw,
                GeoPoint::new(lon, lat),
                Some(ProjectedPoint { x, y }),
            ))
        })
        .collect()
}

fn to_record(
    raw: &RawDetection,
    location: GeoPoint,
    projected: Option<ProjectedPoint>,
) -> DetectionRecord {
    DetectionRecord {
        id: raw.id,
        location,
        projected,
        confidence: raw.confidence,
        class_id: raw.class_id,
    }
}

/// Attaches to each record the region containing it.
///
/// Records outside every polygon get [`RegionAssignment::Unassigned`];
/// nothing is dropped. Overlaps resolve to the first polygon in input
/// order (see [`RegionIndex::locate`]).
#[must_use]
pub fn spatial_join(records: Vec<DetectionRecord>, index: &RegionIndex) -> Vec<AttributedDetection> {
    let attributed: Vec<AttributedDetection> = records
        .into_iter()
        .map(|record| {
            let region = index
                .locate(record.location.lon, record.location.lat)
                .map_or(RegionAssignment::Unassigned, |region| {
                    RegionAssignment::Region(region.name.clone())
                });
            AttributedDetection { record, region }
        })
        .collect();

    let unassigned = attributed.iter().filter(|d| d.region.is_unassigned()).count();
    log::info!(
        "Attributed {} detections to {} regions ({unassigned} unassigned)",
        attributed.len(),
        index.len()
    );

    attributed
}

/// Keeps the records with `confidence >= threshold`.
#[must_use]
pub fn filter_by_confidence(
    records: &[AttributedDetection],
    threshold: f64,
) -> Vec<AttributedDetection> {
    records
        .iter()
        .filter(|d| d.confidence() >= threshold)
        .cloned()
        .collect()
}

/// Counts filtered detections per region, sorted by count descending.
///
/// Ties keep the order in which each region first appears in
/// `filtered`. The unassigned sentinel is ranked like any other region.
/// Percentages are of `filtered.len()`, and zero when it is empty.
#[must_use]
pub fn rank_by_region(filtered: &[AttributedDetection]) -> Vec<RankEntry> {
    let mut counts: Vec<(&str, u64)> = Vec::new();
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();

    for detection in filtered {
        let name = detection.region.name();
        if let Some(&position) = positions.get(name) {
            counts[position].1 += 1;
        } else {
            positions.insert(name, counts.len());
            counts.push((name, 1));
        }
    }

    // `sort_by` is stable, so equal counts stay in first-appearance order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total = filtered.len();
    counts
        .into_iter()
        .enumerate()
        .map(|(i, (name, count))| RankEntry {
            region_name: name.to_string(),
            count,
            rank: u32::try_from(i + 1).unwrap_or(u32::MAX),
            percent_of_filtered_total: percent(count, total),
        })
        .collect()
}

/// Share of `total` held by the first `top_n` ranking entries, 0-100.
#[must_use]
pub fn concentration_percent(ranking: &[RankEntry], total: usize, top_n: usize) -> f64 {
    let top: u64 = ranking.iter().take(top_n).map(|entry| entry.count).sum();
    percent(top, total)
}

/// Sum of region areas in km², in a planar reference system.
///
/// Areas are summed per polygon; overlapping regions are counted twice.
/// No regions yields zero.
///
/// # Errors
///
/// Returns [`CoordinateTransformError`] if `area_crs` is not a projected
/// system or a vertex cannot be projected.
pub fn compute_area_total(
    regions: &[RegionPolygon],
    area_crs: Option<Crs>,
) -> Result<f64, CoordinateTransformError> {
    planar_area_km2(regions, area_crs)
}

/// Mean confidence per region for the given ranking entries, in ranking
/// order.
#[must_use]
pub fn mean_confidence_by_region(
    filtered: &[AttributedDetection],
    entries: &[RankEntry],
) -> Vec<RegionConfidence> {
    let mut sums: BTreeMap<&str, (f64, u64)> = entries
        .iter()
        .map(|entry| (entry.region_name.as_str(), (0.0, 0)))
        .collect();

    for detection in filtered {
        if let Some((sum, count)) = sums.get_mut(detection.region.name()) {
            *sum += detection.confidence();
            *count += 1;
        }
    }

    entries
        .iter()
        .filter_map(|entry| {
            let &(sum, count) = sums.get(entry.region_name.as_str())?;
            #[allow(clippy::cast_precision_loss)]
            let mean = if count == 0 { 0.0 } else { sum / count as f64 };
            Some(RegionConfidence {
                region_name: entry.region_name.clone(),
                count,
                mean_confidence: mean,
            })
        })
        .collect()
}

/// Map viewport centred on the median filtered location, or on
/// `default_center` when nothing passed the filter.
#[must_use]
pub fn map_view(filtered: &[AttributedDetection], default_center: GeoPoint, zoom: u8) -> MapView {
    let lons: Vec<f64> = filtered.iter().map(|d| d.record.location.lon).collect();
    let lats: Vec<f64> = filtered.iter().map(|d| d.record.location.lat).collect();

    let center = match (median(lons), median(lats)) {
        (Some(lon), Some(lat)) => GeoPoint::new(lon, lat),
        _ => default_center,
    };

    MapView { center, zoom }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(f64::midpoint(values[mid - 1], values[mid]))
    } else {
        Some(values[mid])
    }
}

/// Builds the KPI block.
#[must_use]
pub fn compute_kpis(
    total: usize,
    ranking: &[RankEntry],
    filtered: usize,
    top_n: usize,
    mapped_area_km2: f64,
) -> DashboardKpis {
    DashboardKpis {
        total_detections: total as u64,
        filtered_detections: filtered as u64,
        top_n: u32::try_from(top_n).unwrap_or(u32::MAX),
        top_n_concentration_percent: concentration_percent(ranking, filtered, top_n),
        mapped_area_km2,
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: u64, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Inputs that shape a pipeline run besides the data itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    /// Minimum confidence, inclusive.
    pub threshold: f64,
    /// Regions counted by the concentration KPI.
    pub top_n: usize,
    /// Planar system for the area KPI; automatic UTM zone when `None`.
    pub area_crs: Option<Crs>,
}

/// Everything the pipeline derives from one set of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Every record with its region.
    pub attributed: Vec<AttributedDetection>,
    /// Records at or above the threshold.
    pub filtered: Vec<AttributedDetection>,
    /// Per-region counts of `filtered`.
    pub ranking: Vec<RankEntry>,
    /// Headline numbers.
    pub kpis: DashboardKpis,
}

/// Runs join, filter, ranking, and KPIs in one pass.
///
/// # Errors
///
/// Returns [`CoordinateTransformError`] if the area cannot be computed in
/// `params.area_crs`.
pub fn run_pipeline(
    records: Vec<DetectionRecord>,
    regions: Vec<RegionPolygon>,
    params: &PipelineParams,
) -> Result<PipelineOutput, CoordinateTransformError> {
    let mapped_area_km2 = compute_area_total(&regions, params.area_crs)?;
    let index = RegionIndex::new(regions);

    let attributed = spatial_join(records, &index);
    let filtered = filter_by_confidence(&attributed, params.threshold);
    let ranking = rank_by_region(&filtered);
    let kpis = compute_kpis(
        attributed.len(),
        &ranking,
        filtered.len(),
        params.top_n,
        mapped_area_km2,
    );

    Ok(PipelineOutput {
        attributed,
        filtered,
        ranking,
        kpis,
    })
}
