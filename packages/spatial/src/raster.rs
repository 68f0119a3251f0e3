//! Affine pixel-to-map transform of a georeferenced raster.
//!
//! Detections produced by tiling an orthomosaic are stored as pixel
//! offsets. The mosaic's geotransform maps those back to projected
//! coordinates.

/// Six-coefficient affine transform in `a, b, c, d, e, f` order:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// `c`/`f` locate the upper-left corner of the upper-left pixel, `a`/`e`
/// are the pixel width and (negative) height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl GeoTransform {
    /// Builds a transform from its coefficients in `a..f` order.
    #[must_use]
    pub const fn new(coefficients: [f64; 6]) -> Self {
        let [a, b, c, d, e, f] = coefficients;
        Self { a, b, c, d, e, f }
    }

    /// Maps a fractional pixel position to map coordinates.
    #[must_use]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a.mul_add(col, self.b.mul_add(row, self.c)),
            self.d.mul_add(col, self.e.mul_add(row, self.f)),
        )
    }

    /// Map coordinates of `(col, row)` sampled at the pixel centre, i.e.
    /// shifted by half a pixel in both axes.
    #[must_use]
    pub fn pixel_center(&self, col: f64, row: f64) -> (f64, f64) {
        self.apply(col + 0.5, row + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_north_up_raster() {
        let transform = GeoTransform::new([0.1, 0.0, 680_000.0, 0.0, -0.1, 8_160_000.0]);
        let (x, y) = transform.apply(100.0, 200.0);
        assert!((x - 680_010.0).abs() < 1e-9);
        assert!((y - 8_159_980.0).abs() < 1e-9);
    }

    #[test]
    fn samples_pixel_centres() {
        let transform = GeoTransform::new([2.0, 0.0, 0.0, 0.0, -2.0, 100.0]);
        assert_eq!(transform.pixel_center(0.0, 0.0), (1.0, 99.0));
        let (x, y) = transform.pixel_center(3.7, 1.2);
        assert!((x - 8.4).abs() < 1e-9);
        assert!((y - 96.6).abs() < 1e-9);
    }
}
