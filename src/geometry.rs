//! Measurement math: distances, heights, floor areas and feet/inches text.
//!
//! Scene space is y-up. Areas are measured on the horizontal (x, z) plane
//! without any tilt correction, so area points are expected to be picked on
//! a floor-like surface.

use geo::{Area, Coord, LineString, Polygon};
use nalgebra::Point3;

/// A click this close (scene units) to the first area point closes the polygon.
pub const AREA_CLOSE_TOLERANCE: f64 = 0.3;

/// Euclidean distance between two scene points.
#[must_use]
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Vertical separation of two scene points; horizontal offset is ignored.
#[must_use]
pub fn height(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (b.y - a.y).abs()
}

/// Shoelace area of the ring `points` projected onto the (x, z) plane.
///
/// The ring wraps from the last point back to the first. Winding order does
/// not matter. Fewer than three points enclose nothing.
#[must_use]
pub fn floor_area(points: &[Point3<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let ring: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.x, y: p.z }).collect();
    Polygon::new(LineString::new(ring), Vec::new()).unsigned_area()
}

/// Mean of `points`, used to place area labels.
#[must_use]
pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
    #[allow(clippy::cast_precision_loss)]
    Some(Point3::from(sum / points.len() as f64))
}

/// Format a length in feet as `F' I"`.
///
/// Inches are rounded to the nearest whole inch; a value that rounds up to
/// twelve inches carries into the next foot (`5.99` is `6' 0"`).
#[must_use]
pub fn format_feet_inches(feet: f64) -> String {
    let feet = feet.max(0.0);
    let whole = feet.floor();
    let inches = ((feet - whole) * 12.0).round();
    #[allow(clippy::cast_possible_truncation)]
    let (mut whole, mut inches) = (whole as i64, inches as i64);
    if inches >= 12 {
        whole += 1;
        inches -= 12;
    }
    format!("{whole}' {inches}\"")
}

/// Format an area in square feet, two decimals.
#[must_use]
pub fn format_square_feet(square_feet: f64) -> String {
    format!("{:.2} sq ft", square_feet.max(0.0))
}
