//! Per-trail geometry simplification (Douglas–Peucker).
//!
//! Each trail is simplified on its own; the result may self-intersect or
//! cross other trails. That is fine for map overlays.
//!
//! Simplification selects vertices by index, so kept points retain their
//! original coordinates and elevation.

use geo::{Coord, LineString, SimplifyIdx};
use serde::{Deserialize, Serialize};

use crate::projection::project_track;
use crate::{TrackPoint, Trail, TrailCollection};

/// Tolerance unit for simplification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "tolerance")]
pub enum SimplifyMode {
    /// Perpendicular distance in degrees. Lightweight, latitude-dependent.
    Degrees(f64),
    /// Perpendicular distance in Web Mercator meters.
    Meters(f64),
}

impl Default for SimplifyMode {
    /// 10 m on the projected plane
    fn default() -> Self {
        SimplifyMode::Meters(10.0)
    }
}

impl SimplifyMode {
    pub fn tolerance(&self) -> f64 {
        match self {
            SimplifyMode::Degrees(t) | SimplifyMode::Meters(t) => *t,
        }
    }

    pub fn apply(&self, points: &[TrackPoint]) -> Vec<TrackPoint> {
        match *self {
            SimplifyMode::Degrees(t) => simplify(points, t),
            SimplifyMode::Meters(t) => simplify_metric(points, t),
        }
    }
}

/// Douglas–Peucker in degree space.
///
/// A non-positive tolerance returns the input unchanged.
///
/// # Example
/// ```rust
/// use trailmap::{simplify::simplify, TrackPoint};
///
/// let track = vec![
///     TrackPoint::new(-0.1278, 51.5074, None),
///     TrackPoint::new(-0.1280, 51.5080, None),
///     TrackPoint::new(-0.1300, 51.5090, None),
/// ];
/// let simplified = simplify(&track, 0.0001);
/// assert!(simplified.len() <= track.len());
/// ```
pub fn simplify(points: &[TrackPoint], tolerance: f64) -> Vec<TrackPoint> {
    if tolerance <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }
    let line = LineString::new(
        points
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect(),
    );
    select(points, &line, tolerance)
}

/// Douglas–Peucker on Web Mercator coordinates; `tolerance_m` is in meters.
pub fn simplify_metric(points: &[TrackPoint], tolerance_m: f64) -> Vec<TrackPoint> {
    if tolerance_m <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }
    select(points, &project_track(points), tolerance_m)
}

fn select(points: &[TrackPoint], line: &LineString<f64>, tolerance: f64) -> Vec<TrackPoint> {
    line.simplify_idx(&tolerance)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

/// Simplify every trail of a collection independently, segment by segment.
pub fn simplify_collection(collection: &TrailCollection, mode: SimplifyMode) -> TrailCollection {
    let trails = collection
        .trails
        .iter()
        .map(|trail| {
            let segments = trail
                .segments()
                .into_iter()
                .map(|segment| mode.apply(segment))
                .collect();
            Trail::from_segments(trail.id.clone(), segments, trail.metadata.clone())
        })
        .collect();
    TrailCollection { trails }
}
