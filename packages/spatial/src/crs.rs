//! Coordinate reference systems and transforms between them.
//!
//! A [`Crs`] is an EPSG code that `crs-definitions` knows a PROJ.4
//! definition for. The math is done by `proj4rs`, which expects
//! geographic ordinates in radians; this module takes and returns degrees.

use std::str::FromStr;

use proj4rs::Proj;
use thiserror::Error;

/// Errors raised while parsing or applying a coordinate transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateTransformError {
    /// The reference system identifier is not one this crate understands.
    #[error("Unknown coordinate reference system: {crs}")]
    UnknownCrs {
        /// The identifier as given.
        crs: String,
    },

    /// The registry has a definition but it could not be turned into a
    /// projection.
    #[error("Unsupported definition for {crs}: {message}")]
    UnsupportedDefinition {
        /// Reference system being built.
        crs: String,
        /// Error reported by the projection library.
        message: String,
    },

    /// The transform is not defined for this input coordinate.
    #[error("Transform to/from {crs} undefined for ({x}, {y})")]
    UndefinedTransform {
        /// Reference system being transformed.
        crs: String,
        /// First input ordinate (longitude or easting).
        x: f64,
        /// Second input ordinate (latitude or northing).
        y: f64,
    },

    /// A planar system was required but a geographic one was given.
    #[error("{crs} is geographic; a projected reference system is required")]
    NotPlanar {
        /// The geographic reference system.
        crs: String,
    },
}

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u16,
    geographic: bool,
}

impl Crs {
    /// WGS84 geographic coordinates.
    pub const WGS84: Self = Self {
        epsg: 4326,
        geographic: true,
    };

    /// Looks up a CRS by EPSG code.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::UnknownCrs`] for codes missing
    /// from the registry.
    pub fn from_epsg(epsg: u32) -> Result<Self, CoordinateTransformError> {
        let code = u16::try_from(epsg).map_err(|_| unknown(epsg))?;
        let definition = crs_definitions::from_code(code).ok_or_else(|| unknown(epsg))?;

        Ok(Self {
            epsg: code,
            geographic: definition.proj4.contains("+proj=longlat"),
        })
    }

    /// WGS84 UTM zone covering a longitude/latitude.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::UndefinedTransform`] for
    /// non-finite or out-of-range input.
    pub fn utm_for(lon: f64, lat: f64) -> Result<Self, CoordinateTransformError> {
        if !lon.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateTransformError::UndefinedTransform {
                crs: "UTM".to_string(),
                x: lon,
                y: lat,
            });
        }
        let wrapped = (lon + 180.0).rem_euclid(360.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let zone = ((wrapped / 6.0).floor() as u32).min(59) + 1;
        if lat < 0.0 {
            Self::from_epsg(32700 + zone)
        } else {
            Self::from_epsg(32600 + zone)
        }
    }

    /// EPSG code of this CRS.
    #[must_use]
    pub fn epsg(&self) -> u32 {
        u32::from(self.epsg)
    }

    /// Whether coordinates are longitude/latitude degrees.
    #[must_use]
    pub const fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// Transforms a longitude/latitude into this CRS.
    ///
    /// Builds a one-off [`Transformer`]; reuse one when converting many
    /// points.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::UndefinedTransform`] for
    /// non-finite input or a latitude outside ±90°.
    pub fn from_geographic(&self, lon: f64, lat: f64) -> Result<(f64, f64), CoordinateTransformError> {
        Transformer::new(Self::WGS84, *self)?.convert(lon, lat)
    }

    /// Transforms coordinates in this CRS into longitude/latitude.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::UndefinedTransform`] for
    /// non-finite input or a result outside the valid latitude range.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), CoordinateTransformError> {
        Transformer::new(*self, Self::WGS84)?.convert(x, y)
    }

    fn projection(self) -> Result<Proj, CoordinateTransformError> {
        let definition = crs_definitions::from_code(self.epsg).ok_or_else(|| unknown(self.epsg()))?;
        Proj::from_proj_string(definition.proj4).map_err(|e| {
            CoordinateTransformError::UnsupportedDefinition {
                crs: self.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn undefined(self, x: f64, y: f64) -> CoordinateTransformError {
        CoordinateTransformError::UndefinedTransform {
            crs: self.to_string(),
            x,
            y,
        }
    }
}

fn unknown(epsg: u32) -> CoordinateTransformError {
    CoordinateTransformError::UnknownCrs {
        crs: format!("EPSG:{epsg}"),
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = CoordinateTransformError;

    /// Parses `EPSG:<code>` (case-insensitive) or a bare code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
            .map_or(trimmed, |_| &trimmed[5..]);

        code.trim()
            .parse::<u32>()
            .map_err(|_| CoordinateTransformError::UnknownCrs {
                crs: s.to_string(),
            })
            .and_then(Self::from_epsg)
    }
}

/// A prepared transform from one [`Crs`] to another.
///
/// Parsing the projection definitions is the costly part, so build one of
/// these per batch of points rather than per point.
pub struct Transformer {
    from: Crs,
    to: Crs,
    /// `None` when both ends are the same system.
    projections: Option<(Proj, Proj)>,
}

impl Transformer {
    /// Prepares a transform between two systems.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::UnsupportedDefinition`] if
    /// either definition cannot be built.
    pub fn new(from: Crs, to: Crs) -> Result<Self, CoordinateTransformError> {
        let projections = if from == to {
            None
        } else {
            Some((from.projection()?, to.projection()?))
        };
        Ok(Self {
            from,
            to,
            projections,
        })
    }

    /// Converts one point. Geographic ordinates are degrees.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::UndefinedTransform`] for
    /// non-finite input, a geographic latitude outside ±90°, or a point
    /// the projection cannot map.
    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64), CoordinateTransformError> {
        if !x.is_finite() || !y.is_finite() || (self.from.geographic && !(-90.0..=90.0).contains(&y)) {
            return Err(self.from.undefined(x, y));
        }
        let Some((source, target)) = &self.projections else {
            return Ok((x, y));
        };

        let mut point = if self.from.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(source, target, &mut point)
            .map_err(|_| self.from.undefined(x, y))?;

        let (out_x, out_y) = if self.to.geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !out_x.is_finite()
            || !out_y.is_finite()
            || (self.to.geographic && !(-90.0..=90.0).contains(&out_y))
        {
            return Err(self.from.undefined(x, y));
        }
        Ok((out_x, out_y))
    }
}
