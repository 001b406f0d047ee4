//! Spatial conflict graph.
//!
//! Two trails conflict when their polylines pass within a distance threshold
//! of each other. Conflicting trails must be drawn in different colors.
//!
//! ## Algorithm
//! 1. Project every trail to Web Mercator meters, one line per segment
//! 2. Bulk-load an R-tree of trail bounding boxes
//! 3. Broad phase: for trail i, find boxes intersecting i's box grown by the
//!    threshold
//! 4. Narrow phase: for each candidate j > i, compute the exact minimum
//!    distance between the polylines; conflict iff strictly below threshold.
//!    Gaps between the segments of a trail are not measured.

use geo::{Distance, Euclidean, LineString, Point};
use log::info;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::projection::project_track;
use crate::Trail;
use crate::TrailCollection;

/// Conflict detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Trails closer than this (Web Mercator meters) conflict.
    /// Default: 50.0
    pub threshold_m: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self { threshold_m: 50.0 }
    }
}

/// Undirected graph over trail indices, without self-loops.
///
/// Neighbour lists are kept sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConflictGraph {
    adjacency: Vec<Vec<usize>>,
}

impl ConflictGraph {
    /// Graph with `n` isolated nodes.
    pub fn new(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
        }
    }

    /// Build from an explicit edge list. Self-loops and duplicates are ignored.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut graph = Self::new(n);
        for &(a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    /// Insert an undirected edge. Returns false for self-loops, duplicates
    /// and out-of-range nodes.
    pub fn add_edge(&mut self, a: usize, b: usize) -> bool {
        let n = self.adjacency.len();
        if a == b || a >= n || b >= n {
            return false;
        }
        match self.adjacency[a].binary_search(&b) {
            Ok(_) => false,
            Err(pos) => {
                self.adjacency[a].insert(pos, b);
                if let Err(pos) = self.adjacency[b].binary_search(&a) {
                    self.adjacency[b].insert(pos, a);
                }
                true
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|adj| adj.binary_search(&b).is_ok())
    }

    /// Edges as `(i, j)` with `i < j`, in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(i, adj)| adj.iter().filter(move |&&j| j > i).map(move |&j| (i, j)))
    }
}

/// Projected bounding box of one trail, for R-tree indexing.
#[derive(Debug, Clone)]
struct TrailEnvelope {
    index: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for TrailEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

fn envelope_of(index: usize, parts: &[LineString<f64>]) -> Option<TrailEnvelope> {
    let mut coords = parts.iter().flat_map(|line| line.coords());
    let first = coords.next()?;
    let mut min = [first.x, first.y];
    let mut max = min;
    for c in coords {
        min[0] = min[0].min(c.x);
        min[1] = min[1].min(c.y);
        max[0] = max[0].max(c.x);
        max[1] = max[1].max(c.y);
    }
    Some(TrailEnvelope { index, min, max })
}

/// Project each segment of a trail.
fn project_segments(trail: &Trail) -> Vec<LineString<f64>> {
    trail.segments().into_iter().map(project_track).collect()
}

/// Minimum planar distance between two projected polylines.
///
/// Single-vertex trails are treated as points.
pub fn polyline_distance(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    match (a.0.len(), b.0.len()) {
        (0, _) | (_, 0) => f64::INFINITY,
        (1, 1) => Euclidean::distance(Point::from(a.0[0]), Point::from(b.0[0])),
        (1, _) => Euclidean::distance(&Point::from(a.0[0]), b),
        (_, 1) => Euclidean::distance(&Point::from(b.0[0]), a),
        _ => Euclidean::distance(a, b),
    }
}

/// Minimum distance between any segment of `a` and any segment of `b`.
fn trail_distance(a: &[LineString<f64>], b: &[LineString<f64>]) -> f64 {
    a.iter()
        .flat_map(|la| b.iter().map(move |lb| polyline_distance(la, lb)))
        .fold(f64::INFINITY, f64::min)
}

/// Build the conflict graph of a collection.
///
/// Node `i` is `collection.trails[i]`.
pub fn build_graph(collection: &TrailCollection, threshold_m: f64) -> ConflictGraph {
    let n = collection.trails.len();
    let mut graph = ConflictGraph::new(n);
    if n < 2 {
        return graph;
    }

    let start = std::time::Instant::now();
    let projected: Vec<Vec<LineString<f64>>> = collection
        .trails
        .iter()
        .map(project_segments)
        .collect();

    let envelopes: Vec<TrailEnvelope> = projected
        .iter()
        .enumerate()
        .filter_map(|(i, parts)| envelope_of(i, parts))
        .collect();
    let rtree = RTree::bulk_load(envelopes.clone());

    // Broad phase
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for env in &envelopes {
        let search = AABB::from_corners(
            [env.min[0] - threshold_m, env.min[1] - threshold_m],
            [env.max[0] + threshold_m, env.max[1] + threshold_m],
        );
        for other in rtree.locate_in_envelope_intersecting(&search) {
            if other.index > env.index {
                candidates.push((env.index, other.index));
            }
        }
    }
    candidates.sort_unstable();

    // Narrow phase
    let edges = narrow_phase(&projected, &candidates, threshold_m);
    for (i, j) in edges {
        graph.add_edge(i, j);
    }

    info!(
        "[Conflicts] {} trails, {} candidate pairs, {} conflicts in {}ms",
        n,
        candidates.len(),
        graph.edge_count(),
        start.elapsed().as_millis()
    );
    graph
}

#[cfg(not(feature = "parallel"))]
fn narrow_phase(
    projected: &[Vec<LineString<f64>>],
    candidates: &[(usize, usize)],
    threshold_m: f64,
) -> Vec<(usize, usize)> {
    candidates
        .iter()
        .copied()
        .filter(|&(i, j)| trail_distance(&projected[i], &projected[j]) < threshold_m)
        .collect()
}

#[cfg(feature = "parallel")]
fn narrow_phase(
    projected: &[Vec<LineString<f64>>],
    candidates: &[(usize, usize)],
    threshold_m: f64,
) -> Vec<(usize, usize)> {
    use rayon::prelude::*;

    candidates
        .par_iter()
        .copied()
        .filter(|&(i, j)| trail_distance(&projected[i], &projected[j]) < threshold_m)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrailMetadata;
    use crate::{TrackPoint, Trail};

    /// Meters per degree of latitude (spherical approximation)
    const M_PER_DEG_LAT: f64 = 111_320.0;

    /// East-west trail 1 km long at latitude `lat`
    fn trail(id: &str, lat: f64) -> Trail {
        let points = (0..=10)
            .map(|i| TrackPoint::new(20.0 + i as f64 * 0.0014, lat, None))
            .collect();
        Trail::new(id, points, TrailMetadata::default())
    }

    #[test]
    fn test_near_pair_conflicts_far_trail_isolated() {
        let base = 49.0;
        let collection = TrailCollection {
            trails: vec![
                trail("a", base),
                trail("b", base + 10.0 / M_PER_DEG_LAT),
                trail("c", base + 200.0 / M_PER_DEG_LAT),
            ],
        };

        let graph = build_graph(&collection, 50.0);
        assert!(graph.has_edge(0, 1));
        assert!(graph.has_edge(1, 0));
        assert_eq!(graph.degree(2), 0);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_crossing_trails_conflict() {
        let east_west = trail("ew", 49.0);
        let north_south = Trail::new(
            "ns",
            (0..=10)
                .map(|i| TrackPoint::new(20.007, 48.995 + i as f64 * 0.001, None))
                .collect(),
            TrailMetadata::default(),
        );
        let graph = build_graph(
            &TrailCollection {
                trails: vec![east_west, north_south],
            },
            50.0,
        );
        assert!(graph.has_edge(0, 1));
    }

    #[test]
    fn test_overlapping_boxes_but_distant_lines() {
        // L-shaped trails whose bounding boxes overlap while the lines stay
        // ~500 m apart: broad phase passes, narrow phase rejects.
        let l1 = Trail::new(
            "l1",
            vec![
                TrackPoint::new(20.000, 49.000, None),
                TrackPoint::new(20.020, 49.000, None),
                TrackPoint::new(20.020, 49.020, None),
            ],
            TrailMetadata::default(),
        );
        let l2 = Trail::new(
            "l2",
            vec![
                TrackPoint::new(20.000, 49.005, None),
                TrackPoint::new(20.000, 49.025, None),
                TrackPoint::new(20.014, 49.025, None),
            ],
            TrailMetadata::default(),
        );
        let graph = build_graph(&TrailCollection { trails: vec![l1, l2] }, 50.0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_single_point_trail() {
        let point_trail = Trail::new(
            "summit",
            vec![TrackPoint::new(20.007, 49.0 + 5.0 / M_PER_DEG_LAT, None)],
            TrailMetadata::default(),
        );
        let graph = build_graph(
            &TrailCollection {
                trails: vec![trail("a", 49.0), point_trail],
            },
            50.0,
        );
        assert!(graph.has_edge(0, 1));
    }

    #[test]
    fn test_gap_between_segments_is_not_measured() {
        // Two east-west segments 2.2 km apart; the other trail runs north-south
        // through the gap only.
        let segment = |lat: f64| -> Vec<TrackPoint> {
            (0..=10)
                .map(|i| TrackPoint::new(20.0 + i as f64 * 0.001, lat, None))
                .collect()
        };
        let paused = Trail::from_segments(
            "paused",
            vec![segment(49.0), segment(49.02)],
            TrailMetadata::default(),
        );
        let crossing = Trail::new(
            "crossing",
            (0..=10)
                .map(|i| TrackPoint::new(20.005, 49.005 + i as f64 * 0.001, None))
                .collect(),
            TrailMetadata::default(),
        );

        let graph = build_graph(
            &TrailCollection {
                trails: vec![paused.clone(), crossing.clone()],
            },
            50.0,
        );
        assert_eq!(graph.edge_count(), 0);

        // Joined into one line, the bridge across the gap would cross it
        let bridged = Trail::new("bridged", paused.points.clone(), TrailMetadata::default());
        let graph = build_graph(
            &TrailCollection {
                trails: vec![bridged, crossing],
            },
            50.0,
        );
        assert!(graph.has_edge(0, 1));
    }

    #[test]
    fn test_graph_has_no_self_loops_or_duplicates() {
        let mut graph = ConflictGraph::new(3);
        assert!(!graph.add_edge(1, 1));
        assert!(graph.add_edge(0, 2));
        assert!(!graph.add_edge(2, 0));
        assert!(!graph.add_edge(0, 7));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(0, 2)]);
    }

    #[test]
    fn test_empty_and_singleton_collections() {
        assert_eq!(build_graph(&TrailCollection::default(), 50.0).node_count(), 0);
        let one = TrailCollection {
            trails: vec![trail("a", 49.0)],
        };
        let graph = build_graph(&one, 50.0);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }
}
