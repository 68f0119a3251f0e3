//! `GeoJSON` exports of the map layers.

use litter_map_detection_models::{AttributedDetection, ConfidenceTier};
use litter_map_spatial::RegionPolygon;

/// Filtered detections as a point `FeatureCollection`.
///
/// Each feature carries its region, confidence, confidence tier, and the
/// tier's marker colour.
#[must_use]
pub fn detections_geojson(filtered: &[AttributedDetection]) -> serde_json::Value {
    let features: Vec<serde_json::Value> = filtered
        .iter()
        .map(|detection| {
            let record = &detection.record;
            let tier = ConfidenceTier::for_confidence(record.confidence);
            serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [record.location.lon, record.location.lat]
                },
                "properties": {
                    "id": record.id,
                    "region": detection.region.name(),
                    "confidence": record.confidence,
                    "class": record.class_id,
                    "tier": tier.to_string(),
                    "color": tier.color(),
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Region outlines as a polygon `FeatureCollection`, in input order.
#[must_use]
pub fn regions_geojson(regions: &[RegionPolygon]) -> serde_json::Value {
    let features: Vec<serde_json::Value> = regions
        .iter()
        .map(|region| {
            let geometry = geojson::Geometry::new(geojson::Value::from(&region.boundary));
            serde_json::json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": { "name": region.name }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};
    use litter_map_detection_models::{DetectionRecord, GeoPoint, RegionAssignment};

    #[test]
    fn detections_carry_region_and_tier() {
        let filtered = vec![AttributedDetection {
            record: DetectionRecord {
                id: 7,
                location: GeoPoint::new(-49.26, -16.68),
                projected: None,
                confidence: 0.9,
                class_id: Some(1),
            },
            region: RegionAssignment::Region("Setor A".to_string()),
        }];
        let json = detections_geojson(&filtered);

        assert_eq!(json["type"], "FeatureCollection");
        let feature = &json["features"][0];
        assert_eq!(feature["geometry"]["coordinates"][0], -49.26);
        assert_eq!(feature["properties"]["region"], "Setor A");
        assert_eq!(feature["properties"]["tier"], "HIGH");
        assert_eq!(feature["properties"]["id"], 7);
    }

    #[test]
    fn regions_export_as_multipolygons() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let regions = vec![RegionPolygon::new("Setor A", MultiPolygon(vec![square]))];
        let json = regions_geojson(&regions);

        let feature = &json["features"][0];
        assert_eq!(feature["properties"]["name"], "Setor A");
        assert_eq!(feature["geometry"]["type"], "MultiPolygon");
    }

    #[test]
    fn empty_inputs_give_empty_collections() {
        assert_eq!(detections_geojson(&[])["features"], serde_json::json!([]));
        assert_eq!(regions_geojson(&[])["features"], serde_json::json!([]));
    }
}
