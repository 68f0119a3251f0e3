//! Region polygon ingest.
//!
//! Reads a `GeoJSON` `FeatureCollection`, takes each feature's name from
//! the configured property, and converts its geometry to a WGS84
//! [`MultiPolygon`](geo::MultiPolygon). Feature order is preserved because
//! it decides which region wins when polygons overlap.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use geojson::{Feature, GeoJson};
use litter_map_detection_models::UNASSIGNED_REGION;
use litter_map_ingest_models::RegionLayerConfig;
use litter_map_spatial::{Crs, RegionPolygon, geojson_to_multipolygon, transform_multipolygon};

use crate::IngestError;

const TABLE: &str = "regions";

/// Reads region polygons from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or parsed (see
/// [`read_regions`]).
pub fn read_regions_file(
    path: &Path,
    config: &RegionLayerConfig,
    name_column: &str,
) -> Result<Vec<RegionPolygon>, IngestError> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Reading regions from {}", path.display());
    read_regions(file, config, name_column)
}

/// Reads region polygons from `GeoJSON` data, naming each region by the
/// `name_column` property.
///
/// Features without a usable name or polygonal geometry are skipped.
/// Features sharing a name are merged into the first one's boundary so
/// names stay unique.
///
/// # Errors
///
/// A feature named [`UNASSIGNED_REGION`] is rejected as
/// [`IngestError::Malformed`], since its detections could not be told
/// apart from unattributed ones.
///
/// Returns [`IngestError::MissingColumn`] if no feature has the
/// `name_column` property, [`IngestError::GeoJson`] or
/// [`IngestError::Malformed`] for invalid input, and
/// [`IngestError::CoordinateTransform`] if the layer CRS is unknown or a
/// vertex cannot be transformed.
pub fn read_regions<R: Read>(
    mut reader: R,
    config: &RegionLayerConfig,
    name_column: &str,
) -> Result<Vec<RegionPolygon>, IngestError> {
    let crs: Crs = config.crs.parse()?;

    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|source| IngestError::Io {
            path: config.path.clone(),
            source,
        })?;

    let features = match content.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(IngestError::Malformed {
                table: TABLE.to_string(),
                record: 0,
                message: "expected a FeatureCollection, found a bare geometry".to_string(),
            });
        }
    };

    if !features.is_empty() && !features.iter().any(|f| f.contains_property(name_column)) {
        return Err(IngestError::MissingColumn {
            column: name_column.to_string(),
            table: TABLE.to_string(),
        });
    }

    let mut regions: Vec<RegionPolygon> = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for (index, feature) in features.into_iter().enumerate() {
        let Some(name) = feature_name(&feature, name_column) else {
            log::warn!("Skipping region feature {index}: no '{name_column}' value");
            continue;
        };
        if name == UNASSIGNED_REGION {
            return Err(IngestError::Malformed {
                table: TABLE.to_string(),
                record: index + 1,
                message: format!("region name '{name}' is reserved for unattributed detections"),
            });
        }

        let Some(boundary) = feature.geometry.and_then(geojson_to_multipolygon) else {
            log::warn!("Skipping region '{name}': missing or non-polygonal geometry");
            continue;
        };
        let boundary = transform_multipolygon(&boundary, crs, Crs::WGS84)?;

        if let Some(&position) = positions.get(&name) {
            log::warn!("Duplicate region '{name}', merging into the first occurrence");
            regions[position].boundary.0.extend(boundary.0);
        } else {
            positions.insert(name.clone(), regions.len());
            regions.push(RegionPolygon::new(name, boundary));
        }
    }

    log::info!("Read {} regions from '{name_column}'", regions.len());

    Ok(regions)
}

/// Region name from a string or numeric property, trimmed.
fn feature_name(feature: &Feature, name_column: &str) -> Option<String> {
    let name = match feature.property(name_column)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}
