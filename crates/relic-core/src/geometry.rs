// crates/relic-core/src/geometry.rs
//
// Site geometry helpers: polygon validation, point-buffer areas of interest,
// and the raster grid description shared by scenes and composites.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Contains, Coord, Line, LineString, Point, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::RelicError;

/// CRS identifier used for point-buffer sites.
pub const WGS84: &str = "EPSG:4326";

/// Mean kilometres per degree of latitude.
const KM_PER_DEGREE_LAT: f64 = 111.32;

/// Placement of a north-up raster grid in a projected or geographic CRS.
///
/// Pixel `(row, col)` covers
/// `[origin_x + col * pixel_width, origin_x + (col + 1) * pixel_width)` in x and
/// `(origin_y - (row + 1) * pixel_height, origin_y - row * pixel_height]` in y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    /// X coordinate of the top-left corner.
    pub origin_x: f64,
    /// Y coordinate of the top-left corner.
    pub origin_y: f64,
    /// Pixel size along x (positive).
    pub pixel_width: f64,
    /// Pixel size along y (positive; rows grow southwards).
    pub pixel_height: f64,
    /// CRS identifier, e.g. "EPSG:32635".
    pub crs: String,
}

impl GridSpec {
    /// Centre coordinate of a pixel.
    pub fn pixel_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            y: self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        }
    }

    /// Number of pixels in the grid.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that a raster shape matches this grid.
    pub fn check_shape(&self, shape: (usize, usize), what: &str) -> Result<(), RelicError> {
        if shape != (self.rows, self.cols) {
            return Err(RelicError::Pipeline(format!(
                "{} has shape {}x{}, grid is {}x{}",
                what, shape.0, shape.1, self.rows, self.cols
            )));
        }
        Ok(())
    }

    /// Whether two grids are co-registered (same CRS, shape and placement).
    ///
    /// Coordinates are compared with a tolerance of 1e-6 of a pixel.
    pub fn is_aligned_with(&self, other: &GridSpec) -> bool {
        let tol_x = self.pixel_width.abs() * 1e-6;
        let tol_y = self.pixel_height.abs() * 1e-6;
        self.crs == other.crs
            && self.rows == other.rows
            && self.cols == other.cols
            && (self.origin_x - other.origin_x).abs() <= tol_x
            && (self.origin_y - other.origin_y).abs() <= tol_y
            && (self.pixel_width - other.pixel_width).abs() <= tol_x
            && (self.pixel_height - other.pixel_height).abs() <= tol_y
    }

    /// Mask of pixels whose centre lies inside `polygon`.
    pub fn aoi_mask(&self, polygon: &Polygon<f64>) -> Array2<bool> {
        Array2::from_shape_fn((self.rows, self.cols), |(row, col)| {
            polygon.contains(&Point::from(self.pixel_center(row, col)))
        })
    }
}

/// Build a circular area of interest around a point, in WGS84 degrees.
///
/// The circle is approximated by `segments` vertices. Longitude spacing is
/// scaled by `cos(latitude)` so the buffer is roughly round on the ground.
pub fn buffered_point(lat: f64, lon: f64, buffer_km: f64, segments: usize) -> Result<Polygon<f64>, RelicError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(RelicError::Validation(format!(
            "Coordinates out of range: lat={}, lon={}",
            lat, lon
        )));
    }
    if !(buffer_km.is_finite() && buffer_km > 0.0) {
        return Err(RelicError::Validation(format!(
            "Buffer must be positive, got {} km",
            buffer_km
        )));
    }
    if segments < 8 {
        return Err(RelicError::Validation(format!(
            "Buffer needs at least 8 segments, got {}",
            segments
        )));
    }

    let dlat = buffer_km / KM_PER_DEGREE_LAT;
    let cos_lat = lat.to_radians().cos().max(1e-6);
    let dlon = buffer_km / (KM_PER_DEGREE_LAT * cos_lat);

    let mut coords: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let theta = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
            Coord {
                x: lon + dlon * theta.cos(),
                y: lat + dlat * theta.sin(),
            }
        })
        .collect();
    coords.push(coords[0]);

    Ok(Polygon::new(LineString::from(coords), vec![]))
}

/// Validate a site polygon.
///
/// Requirements: finite coordinates, closed rings with at least three
/// distinct vertices, non-zero area, and no self-intersections in any ring.
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), RelicError> {
    validate_ring(polygon.exterior(), "exterior")?;
    for (i, ring) in polygon.interiors().iter().enumerate() {
        validate_ring(ring, &format!("interior {}", i))?;
    }
    if !(polygon.unsigned_area() > 0.0) {
        return Err(RelicError::Validation("Polygon has zero area".to_string()));
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<(), RelicError> {
    let coords = &ring.0;
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(RelicError::Validation(format!(
            "Polygon {} ring has non-finite coordinates",
            label
        )));
    }
    if coords.len() < 4 || coords.first() != coords.last() {
        return Err(RelicError::Validation(format!(
            "Polygon {} ring must be closed with at least 3 vertices",
            label
        )));
    }

    let open = &coords[..coords.len() - 1];
    for i in 0..open.len() {
        for j in (i + 1)..open.len() {
            if open[i] == open[j] {
                return Err(RelicError::Validation(format!(
                    "Polygon {} ring repeats vertex ({}, {})",
                    label, open[i].x, open[i].y
                )));
            }
        }
    }

    let segments: Vec<Line<f64>> = ring.lines().collect();
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { is_proper, .. }) => {
                    // Adjacent edges always touch at their shared vertex.
                    if !adjacent || is_proper {
                        return Err(self_intersection(label, i, j));
                    }
                }
                Some(LineIntersection::Collinear { .. }) => {
                    return Err(self_intersection(label, i, j));
                }
            }
        }
    }
    Ok(())
}

fn self_intersection(label: &str, i: usize, j: usize) -> RelicError {
    RelicError::Validation(format!(
        "Polygon {} ring self-intersects (edges {} and {})",
        label, i, j
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ]
    }

    fn grid() -> GridSpec {
        GridSpec {
            rows: 10,
            cols: 10,
            origin_x: 0.0,
            origin_y: 10.0,
            pixel_width: 1.0,
            pixel_height: 1.0,
            crs: "EPSG:32635".to_string(),
        }
    }

    #[test]
    fn test_valid_square() {
        assert!(validate_polygon(&square()).is_ok());
    }

    #[test]
    fn test_bowtie_is_rejected() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let err = validate_polygon(&bowtie).unwrap_err();
        assert!(err.to_string().contains("self-intersects"), "got {}", err);
    }

    #[test]
    fn test_degenerate_ring_is_rejected() {
        let line = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        );
        assert!(validate_polygon(&line).is_err());
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let bad = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (f64::NAN, 1.0), (1.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        assert!(validate_polygon(&bad).is_err());
    }

    #[test]
    fn test_buffered_point_is_valid_and_sized() {
        let poly = buffered_point(46.0686, 23.5714, 2.0, 32).unwrap();
        assert!(validate_polygon(&poly).is_ok());
        assert_eq!(poly.exterior().0.len(), 33);
        let ys: Vec<f64> = poly.exterior().0.iter().map(|c| c.y).collect();
        let max_y = ys.iter().cloned().fold(f64::MIN, f64::max);
        assert!((max_y - 46.0686 - 2.0 / KM_PER_DEGREE_LAT).abs() < 1e-6);
    }

    #[test]
    fn test_buffered_point_rejects_bad_input() {
        assert!(buffered_point(95.0, 0.0, 1.0, 32).is_err());
        assert!(buffered_point(0.0, 0.0, 0.0, 32).is_err());
        assert!(buffered_point(0.0, 0.0, 1.0, 3).is_err());
    }

    #[test]
    fn test_aoi_mask_counts_pixel_centres() {
        let half = polygon![
            (x: 0.0, y: 0.0),
            (x: 5.0, y: 0.0),
            (x: 5.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let mask = grid().aoi_mask(&half);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 50);
        assert!(mask[[0, 0]]);
        assert!(!mask[[0, 9]]);
    }

    #[test]
    fn test_alignment() {
        let a = grid();
        let mut b = grid();
        assert!(a.is_aligned_with(&b));
        b.crs = "EPSG:4326".to_string();
        assert!(!a.is_aligned_with(&b));
        let mut c = grid();
        c.origin_x += 0.5;
        assert!(!a.is_aligned_with(&c));
    }
}
