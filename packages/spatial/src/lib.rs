#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for region attribution.
//!
//! Holds the region polygons of one dataset, builds an R-tree over their
//! bounding boxes, and answers point-in-polygon lookups. Also provides the
//! coordinate transforms and planar area math the attribution pipeline
//! needs.

pub mod crs;
pub mod raster;

use geo::{Area, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon, Rect};
use rstar::{AABB, RTree, RTreeObject};

pub use crs::{CoordinateTransformError, Crs, Transformer};
pub use raster::GeoTransform;

/// Square meters per square kilometer.
const M2_PER_KM2: f64 = 1_000_000.0;

/// A named region boundary in WGS84 longitude/latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPolygon {
    /// Unique region name.
    pub name: String,
    /// Region boundary.
    pub boundary: MultiPolygon<f64>,
}

impl RegionPolygon {
    /// Creates a region from a name and boundary.
    #[must_use]
    pub fn new(name: impl Into<String>, boundary: MultiPolygon<f64>) -> Self {
        Self {
            name: name.into(),
            boundary,
        }
    }
}

/// A region's bounding box stored in the R-tree, pointing back at its
/// position in the input order.
struct IndexedEnvelope {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Region polygons plus an R-tree over their envelopes.
///
/// Lookups follow a first-match policy: when several polygons contain a
/// point (overlaps, or a point on a shared edge), the one that came first
/// in the input wins. Points on a boundary count as inside.
pub struct RegionIndex {
    regions: Vec<RegionPolygon>,
    tree: RTree<IndexedEnvelope>,
}

impl RegionIndex {
    /// Builds the index. Input order is kept and defines the first-match
    /// tie-break.
    #[must_use]
    pub fn new(regions: Vec<RegionPolygon>) -> Self {
        let envelopes = regions
            .iter()
            .enumerate()
            .filter_map(|(position, region)| {
                let Some(envelope) = compute_envelope(&region.boundary) else {
                    log::warn!("Region '{}' has an empty boundary", region.name);
                    return None;
                };
                Some(IndexedEnvelope { position, envelope })
            })
            .collect();

        let tree = RTree::bulk_load(envelopes);
        log::info!("Loaded {} regions into spatial index", tree.size());

        Self { regions, tree }
    }

    /// Regions in input order.
    #[must_use]
    pub fn regions(&self) -> &[RegionPolygon] {
        &self.regions
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the index holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Look up the region containing a point.
    ///
    /// Bounding boxes narrow the candidates; among the polygons that
    /// actually contain the point the earliest in input order wins, which
    /// gives the same answer as [`Self::locate_linear`].
    #[must_use]
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&RegionPolygon> {
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| self.regions[entry.position].boundary.intersects(&point))
            .map(|entry| entry.position)
            .min()
            .map(|position| &self.regions[position])
    }

    /// Look up the region containing a point by testing every polygon in
    /// input order.
    #[must_use]
    pub fn locate_linear(&self, lon: f64, lat: f64) -> Option<&RegionPolygon> {
        let point = geo::Point::new(lon, lat);
        self.regions
            .iter()
            .find(|region| region.boundary.intersects(&point))
    }
}

/// Sum of the region areas in km², measured in a planar reference system.
///
/// Areas are summed per polygon, so overlapping regions are counted
/// twice. With `area_crs` unset, the UTM zone covering the centre of all
/// regions is used.
///
/// # Errors
///
/// Returns [`CoordinateTransformError`] if `area_crs` is geographic or any
/// vertex cannot be projected.
pub fn planar_area_km2(
    regions: &[RegionPolygon],
    area_crs: Option<Crs>,
) -> Result<f64, CoordinateTransformError> {
    let Some(bounds) = combined_bounds(regions) else {
        return Ok(0.0);
    };

    let crs = match area_crs {
        Some(crs) if crs.is_geographic() => {
            return Err(CoordinateTransformError::NotPlanar {
                crs: crs.to_string(),
            });
        }
        Some(crs) => crs,
        None => {
            let center = bounds.center();
            Crs::utm_for(center.x, center.y)?
        }
    };

    let mut total = 0.0;
    for region in regions {
        let projected = transform_multipolygon(&region.boundary, Crs::WGS84, crs)?;
        total += projected.unsigned_area();
    }

    Ok(total / M2_PER_KM2)
}

/// Transforms every vertex of a multipolygon between two reference
/// systems.
///
/// # Errors
///
/// Returns [`CoordinateTransformError`] if any vertex is outside the
/// domain of either transform.
pub fn transform_multipolygon(
    multi_polygon: &MultiPolygon<f64>,
    from: Crs,
    to: Crs,
) -> Result<MultiPolygon<f64>, CoordinateTransformError> {
    if from == to {
        return Ok(multi_polygon.clone());
    }

    let transformer = Transformer::new(from, to)?;
    let transform = |coord: Coord<f64>| -> Result<Coord<f64>, CoordinateTransformError> {
        let (x, y) = transformer.convert(coord.x, coord.y)?;
        Ok(Coord { x, y })
    };

    let mut polygons = Vec::with_capacity(multi_polygon.0.len());
    for polygon in &multi_polygon.0 {
        let exterior = transform_ring(polygon.exterior(), &transform)?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| transform_ring(ring, &transform))
            .collect::<Result<Vec<_>, _>>()?;
        polygons.push(Polygon::new(exterior, interiors));
    }

    Ok(MultiPolygon::new(polygons))
}

fn transform_ring<F>(
    ring: &LineString<f64>,
    transform: &F,
) -> Result<LineString<f64>, CoordinateTransformError>
where
    F: Fn(Coord<f64>) -> Result<Coord<f64>, CoordinateTransformError>,
{
    ring.coords()
        .map(|coord| transform(*coord))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn geojson_to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

/// Bounding rectangle around every region.
fn combined_bounds(regions: &[RegionPolygon]) -> Option<Rect<f64>> {
    regions
        .iter()
        .filter_map(|region| region.boundary.bounding_rect())
        .reduce(|acc, rect| {
            Rect::new(
                Coord {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                Coord {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(name: &str, min_x: f64, min_y: f64, size: f64) -> RegionPolygon {
        let poly = polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ];
        RegionPolygon::new(name, MultiPolygon(vec![poly]))
    }

    #[test]
    fn locates_containing_region() {
        let index = RegionIndex::new(vec![
            square("Setor A", -49.30, -16.70, 0.02),
            square("Setor B", -49.28, -16.70, 0.02),
        ]);
        assert_eq!(index.locate(-49.29, -16.69).unwrap().name, "Setor A");
        assert_eq!(index.locate(-49.27, -16.69).unwrap().name, "Setor B");
        assert!(index.locate(-49.0, -16.0).is_none());
    }

    #[test]
    fn shared_edge_goes_to_first_region() {
        let index = RegionIndex::new(vec![
            square("Setor B", -49.28, -16.70, 0.02),
            square("Setor A", -49.30, -16.70, 0.02),
        ]);
        let on_edge = index.locate(-49.28, -16.69).unwrap();
        assert_eq!(on_edge.name, "Setor B");
        assert_eq!(
            index.locate_linear(-49.28, -16.69).unwrap().name,
            on_edge.name
        );
    }

    #[test]
    fn overlap_resolves_by_input_order() {
        let index = RegionIndex::new(vec![
            square("Big", 0.0, 0.0, 10.0),
            square("Small", 4.0, 4.0, 2.0),
        ]);
        assert_eq!(index.locate(5.0, 5.0).unwrap().name, "Big");

        let reversed = RegionIndex::new(vec![
            square("Small", 4.0, 4.0, 2.0),
            square("Big", 0.0, 0.0, 10.0),
        ]);
        assert_eq!(reversed.locate(5.0, 5.0).unwrap().name, "Small");
    }

    #[test]
    fn indexed_lookup_matches_linear_scan() {
        let mut regions = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let size = if (i + j) % 3 == 0 { 1.5 } else { 1.0 };
                regions.push(square(
                    &format!("r{i}-{j}"),
                    f64::from(i),
                    f64::from(j),
                    size,
                ));
            }
        }
        let index = RegionIndex::new(regions);

        for step_x in 0..40 {
            for step_y in 0..40 {
                let lon = f64::from(step_x) * 0.17;
                let lat = f64::from(step_y) * 0.17;
                assert_eq!(
                    index.locate(lon, lat).map(|r| &r.name),
                    index.locate_linear(lon, lat).map(|r| &r.name),
                    "mismatch at ({lon}, {lat})"
                );
            }
        }
    }

    #[test]
    fn empty_index_assigns_nothing() {
        let index = RegionIndex::new(Vec::new());
        assert!(index.is_empty());
        assert!(index.locate(0.0, 0.0).is_none());
    }

    #[test]
    fn planar_area_of_small_square() {
        let crs: Crs = "EPSG:31982".parse().unwrap();
        let (x0, y0) = (685_000.0, 8_154_000.0);
        let projected = MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + 1_000.0, y: y0),
            (x: x0 + 1_000.0, y: y0 + 1_000.0),
            (x: x0, y: y0 + 1_000.0),
            (x: x0, y: y0),
        ]]);
        let geographic = transform_multipolygon(&projected, crs, Crs::WGS84).unwrap();
        let regions = vec![RegionPolygon::new("km", geographic)];

        let area = planar_area_km2(&regions, Some(crs)).unwrap();
        assert!((area - 1.0).abs() < 1e-6, "area {area}");

        let auto = planar_area_km2(&regions, None).unwrap();
        assert!((auto - 1.0).abs() < 1e-2, "auto area {auto}");
    }

    #[test]
    fn overlapping_areas_are_double_counted() {
        let crs: Crs = "EPSG:31982".parse().unwrap();
        let region = |name: &str| {
            let projected = MultiPolygon(vec![polygon![
                (x: 685_000.0, y: 8_154_000.0),
                (x: 686_000.0, y: 8_154_000.0),
                (x: 686_000.0, y: 8_155_000.0),
                (x: 685_000.0, y: 8_155_000.0),
                (x: 685_000.0, y: 8_154_000.0),
            ]]);
            RegionPolygon::new(
                name,
                transform_multipolygon(&projected, crs, Crs::WGS84).unwrap(),
            )
        };
        let area = planar_area_km2(&[region("a"), region("b")], Some(crs)).unwrap();
        assert!((area - 2.0).abs() < 1e-6, "area {area}");
    }

    #[test]
    fn transforms_legacy_datum_layers() {
        let sad69: Crs = "EPSG:29192".parse().unwrap();
        let projected = MultiPolygon(vec![polygon![
            (x: 685_000.0, y: 8_154_000.0),
            (x: 686_000.0, y: 8_154_000.0),
            (x: 686_000.0, y: 8_155_000.0),
            (x: 685_000.0, y: 8_155_000.0),
            (x: 685_000.0, y: 8_154_000.0),
        ]]);
        let geographic = transform_multipolygon(&projected, sad69, Crs::WGS84).unwrap();
        let bounds = compute_envelope(&geographic).unwrap();
        assert!(bounds.lower()[0] > -49.3 && bounds.upper()[0] < -49.2);
        assert!(bounds.lower()[1] > -16.7 && bounds.upper()[1] < -16.6);

        let regions = vec![RegionPolygon::new("legacy", geographic)];
        let area = planar_area_km2(&regions, Some(sad69)).unwrap();
        assert!((area - 1.0).abs() < 1e-6, "area {area}");
    }

    #[test]
    fn area_of_no_regions_is_zero() {
        assert!(planar_area_km2(&[], None).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_geographic_area_datum() {
        let regions = vec![square("a", 0.0, 0.0, 1.0)];
        assert!(matches!(
            planar_area_km2(&regions, Some(Crs::WGS84)),
            Err(CoordinateTransformError::NotPlanar { .. })
        ));
    }
}
