//! Serializable dashboard view.
//!
//! A [`DashboardSnapshot`] is what a renderer needs for one filter state:
//! KPI cards, the ranking table, top-N chart data, map settings, and the
//! empty-state messages to show instead of charts when there is nothing to
//! draw.

use litter_map_detection_models::{
    Basemap, DashboardKpis, MapLayer, MapView, RankEntry, RegionConfidence, SessionFilterState,
};
use serde::Serialize;

use crate::session::AttributionSummary;

/// Shown when no detection passes the confidence filter.
pub const NO_DETECTIONS_MESSAGE: &str = "No detections at this confidence threshold.";

/// Shown when the ranking table would be empty.
pub const NO_RANKING_MESSAGE: &str = "No region ranking to show.";

/// Shown when the region layer has no usable polygons.
pub const NO_REGIONS_MESSAGE: &str =
    "No region polygons loaded; every detection is unassigned.";

/// Map settings for the current filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    /// Initial viewport.
    pub view: MapView,
    /// Selected background.
    pub basemap: Basemap,
    /// Tile provider for `basemap`.
    pub tiles: &'static str,
    /// Attribution text for `tiles`.
    pub attribution: &'static str,
    /// Layers to draw, in drawing order.
    pub layers: Vec<MapLayer>,
}

/// Everything the presentation layer renders for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub title: String,
    pub region_column: String,
    pub confidence_threshold: f64,
    pub kpis: DashboardKpis,
    /// Ranking rows, cut to the configured limit.
    pub ranking: Vec<RankEntry>,
    /// Whether rows were cut from `ranking`.
    pub ranking_truncated: bool,
    /// Bar/pie chart data.
    pub top_regions: Vec<RankEntry>,
    pub top_region_confidence: Vec<RegionConfidence>,
    pub map: MapSnapshot,
    /// Empty-state notices, in display order.
    pub messages: Vec<&'static str>,
}

impl DashboardSnapshot {
    /// Builds the snapshot for `summary` under `state`.
    #[must_use]
    pub fn new(
        title: String,
        region_column: String,
        summary: &AttributionSummary,
        state: &SessionFilterState,
        region_count: usize,
        ranking_limit: usize,
        top_n: usize,
    ) -> Self {
        let mut messages = Vec::new();
        if region_count == 0 {
            messages.push(NO_REGIONS_MESSAGE);
        }
        if summary.filtered.is_empty() {
            messages.push(NO_DETECTIONS_MESSAGE);
        }
        if summary.ranking.is_empty() {
            messages.push(NO_RANKING_MESSAGE);
        }

        let ranking: Vec<RankEntry> = summary.ranking.iter().take(ranking_limit).cloned().collect();

        Self {
            title,
            region_column,
            confidence_threshold: summary.threshold,
            kpis: summary.kpis.clone(),
            ranking_truncated: ranking.len() < summary.ranking.len(),
            ranking,
            top_regions: summary.ranking.iter().take(top_n).cloned().collect(),
            top_region_confidence: summary.top_confidence.clone(),
            map: MapSnapshot {
                view: summary.view,
                basemap: state.basemap,
                tiles: state.basemap.tiles(),
                attribution: state.basemap.attribution(),
                layers: state.layers.enabled(),
            },
            messages,
        }
    }

    /// Whether there is anything to chart.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kpis.filtered_detections == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litter_map_detection_models::{
        AttributedDetection, DetectionRecord, GeoPoint, RegionAssignment,
    };

    use crate::pipeline::{compute_kpis, rank_by_region};

    fn summary(regions: &[&str]) -> AttributionSummary {
        let filtered: Vec<AttributedDetection> = regions
            .iter()
            .enumerate()
            .map(|(id, name)| AttributedDetection {
                record: DetectionRecord {
                    id,
                    location: GeoPoint::new(-49.26, -16.68),
                    projected: None,
                    confidence: 0.9,
                    class_id: Some(1),
                },
                region: RegionAssignment::from((*name).to_string()),
            })
            .collect();
        let ranking = rank_by_region(&filtered);
        let kpis = compute_kpis(filtered.len(), &ranking, filtered.len(), 5, 12.5);
        AttributionSummary {
            threshold: 0.7,
            filtered,
            ranking,
            kpis,
            top_confidence: Vec::new(),
            view: MapView {
                center: GeoPoint::new(-49.26, -16.68),
                zoom: 12,
            },
        }
    }

    #[test]
    fn empty_summary_carries_messages() {
        let snapshot = DashboardSnapshot::new(
            "Goiânia".to_string(),
            "name_subdistrict".to_string(),
            &summary(&[]),
            &SessionFilterState::default(),
            3,
            20,
            5,
        );
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.messages, vec![NO_DETECTIONS_MESSAGE, NO_RANKING_MESSAGE]);
        assert!(snapshot.ranking.is_empty());
    }

    #[test]
    fn no_regions_is_reported() {
        let snapshot = DashboardSnapshot::new(
            "Goiânia".to_string(),
            "name_subdistrict".to_string(),
            &summary(&["unassigned"]),
            &SessionFilterState::default(),
            0,
            20,
            5,
        );
        assert_eq!(snapshot.messages, vec![NO_REGIONS_MESSAGE]);
    }

    #[test]
    fn ranking_is_cut_to_limit_and_top_n() {
        let snapshot = DashboardSnapshot::new(
            "Goiânia".to_string(),
            "name_subdistrict".to_string(),
            &summary(&["A", "B", "C", "D", "E", "F", "G", "A"]),
            &SessionFilterState::default(),
            7,
            3,
            5,
        );
        assert_eq!(snapshot.ranking.len(), 3);
        assert!(snapshot.ranking_truncated);
        assert_eq!(snapshot.top_regions.len(), 5);
        assert_eq!(snapshot.ranking[0].region_name, "A");
        assert!(snapshot.messages.is_empty());
    }

    #[test]
    fn map_follows_filter_state() {
        let mut state = SessionFilterState {
            basemap: Basemap::Satellite,
            ..SessionFilterState::default()
        };
        state.layers.set(MapLayer::Heatmap, false);

        let snapshot = DashboardSnapshot::new(
            "Goiânia".to_string(),
            "name_subdistrict".to_string(),
            &summary(&["A"]),
            &state,
            1,
            20,
            5,
        );
        assert_eq!(snapshot.map.tiles, Basemap::Satellite.tiles());
        assert_eq!(
            snapshot.map.layers,
            vec![MapLayer::Regions, MapLayer::Points, MapLayer::Clusters]
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["map"]["basemap"], "satellite");
        assert_eq!(json["ranking"][0]["regionName"], "A");
    }
}
