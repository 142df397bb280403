//! Turns coordinate lists into `geo` geometries, rejecting shapes no spatial database would
//! accept.

use geo::{Area, Intersects};
use geo_types::{Coord, Line, LineString, Polygon, Rect};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("coordinate {index} is not finite")]
    NonFinite { index: usize },

    #[error("a line needs at least 2 coordinates, got {len}")]
    LineTooShort { len: usize },

    #[error("a ring needs at least 4 coordinates, got {len}")]
    RingTooShort { len: usize },

    #[error("ring is not closed")]
    RingNotClosed,

    #[error("ring encloses no area")]
    ZeroArea,

    #[error("ring self-intersects between segments {first} and {second}")]
    SelfIntersection { first: usize, second: usize },
}

fn check_finite(coords: &[Coord<f64>]) -> Result<(), ShapeError> {
    match coords.iter().position(|c| !c.x.is_finite() || !c.y.is_finite()) {
        Some(index) => Err(ShapeError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Open path through `coords` in order.
pub fn line(coords: Vec<Coord<f64>>) -> Result<LineString<f64>, ShapeError> {
    if coords.len() < 2 {
        return Err(ShapeError::LineTooShort { len: coords.len() });
    }
    check_finite(&coords)?;
    Ok(LineString::new(coords))
}

/// Polygon with `ring` as its only (exterior) boundary.
pub fn polygon(ring: Vec<Coord<f64>>) -> Result<Polygon<f64>, ShapeError> {
    if ring.len() < 4 {
        return Err(ShapeError::RingTooShort { len: ring.len() });
    }
    check_finite(&ring)?;
    if ring.first() != ring.last() {
        return Err(ShapeError::RingNotClosed);
    }
    check_simple(&ring)?;

    let polygon = Polygon::new(LineString::new(ring), vec![]);
    if polygon.unsigned_area() == 0.0 {
        return Err(ShapeError::ZeroArea);
    }
    Ok(polygon)
}

/// Every pair of non-neighbouring ring segments must be disjoint.
///
/// Segments are swept in order of their leftmost x, so only pairs whose bounding boxes overlap
/// are tested exactly.
fn check_simple(ring: &[Coord<f64>]) -> Result<(), ShapeError> {
    let mut vertices = ring.to_vec();
    // repeated vertices are zero-length segments, not crossings
    vertices.dedup();

    let segments: Vec<Line<f64>> = vertices.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let bounds: Vec<Rect<f64>> = segments.iter().map(|s| Rect::new(s.start, s.end)).collect();
    let count = segments.len();

    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| bounds[a].min().x.total_cmp(&bounds[b].min().x));

    for (position, &a) in order.iter().enumerate() {
        for &b in &order[position + 1..] {
            if bounds[b].min().x > bounds[a].max().x {
                break;
            }
            if bounds[b].min().y > bounds[a].max().y || bounds[a].min().y > bounds[b].max().y {
                continue;
            }

            let (first, second) = (a.min(b), a.max(b));
            // neighbours share a vertex, as do the first and last segment
            if second - first < 2 || (first == 0 && second + 1 == count) {
                continue;
            }
            if segments[first].intersects(&segments[second]) {
                return Err(ShapeError::SelfIntersection { first, second });
            }
        }
    }
    Ok(())
}
