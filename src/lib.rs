//! # Trailmap
//!
//! Builds the expedition trail map layer from GPX recordings and a trip ledger.
//!
//! This library provides:
//! - Tolerant matching of GPX files to ledger rows (dates, accents, separators)
//! - Idempotent per-track GeoJSON conversion and merging
//! - Douglas-Peucker simplification in degree or metric space
//! - Conflict-aware coloring: trails passing within a threshold of each other
//!   never share a color class
//!
//! ## Features
//!
//! - **`cli`** (default) - The `trailmap` command-line binary
//! - **`parallel`** - Parallel track conversion and distance checks with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trailmap::{TrackPoint, Trail, TrailCollection};
//! use trailmap::coloring::{greedy_color, Palette};
//! use trailmap::conflict::build_graph;
//! use trailmap::metadata::TrailMetadata;
//!
//! let line = |lat: f64| -> Vec<TrackPoint> {
//!     (0..10).map(|i| TrackPoint::new(20.0 + i as f64 * 0.001, lat, None)).collect()
//! };
//! let collection = TrailCollection {
//!     trails: vec![
//!         Trail::new("a", line(49.0), TrailMetadata::default()),
//!         Trail::new("b", line(49.0001), TrailMetadata::default()),
//!     ],
//! };
//!
//! let graph = build_graph(&collection, 50.0);
//! let coloring = greedy_color(&graph);
//! assert_ne!(coloring.class_of(0), coloring.class_of(1));
//! println!("a is drawn in {}", Palette::default().color_for(coloring.class_of(0)));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{IoResultExt, OptionExt, Result, TrailError};

// Identifier normalization
pub mod normalize;
pub use normalize::normalize;

// Ledger rows, column layout and sources
pub mod ledger;
pub use ledger::{CsvLedger, LedgerLayout, LedgerRow, LedgerSource};

// Per-trail metadata record and locale-tolerant coercions
pub mod metadata;
pub use metadata::TrailMetadata;

// File-to-ledger matching
pub mod matching;
pub use matching::{match_file, LedgerMatch, MatchConfig, MatchKind, MatcherContext};

// GPX reading and track-to-trail conversion
pub mod track;
pub mod convert;
pub use convert::convert;

// Web Mercator projection
pub mod projection;

// GeoJSON (de)serialization of trails
pub mod geojson_io;

// Collection merging and the incremental per-track batch
pub mod merge;
pub use merge::{build_trail_artifacts, load_artifacts, merge, BatchReport, MergeSource};

// Douglas-Peucker simplification
pub mod simplify;
pub use simplify::{simplify, simplify_metric, SimplifyMode};

// Spatial conflict graph
pub mod conflict;
pub use conflict::{build_graph, ConflictConfig, ConflictGraph};

// Greedy coloring and palette
pub mod coloring;
pub use coloring::{greedy_color, Coloring, Palette};

// Colored collection export
pub mod export;
pub use export::export;

// Run configuration
pub mod config;
pub use config::PipelineConfig;

// End-to-end pipeline
pub mod pipeline;
pub use pipeline::{Pipeline, RunSummary};

// ============================================================================
// Core Types
// ============================================================================

/// A recorded GPS position.
///
/// # Example
/// ```
/// use trailmap::TrackPoint;
/// let summit = TrackPoint::new(20.0881, 49.1794, Some(2499.0)); // Rysy
/// assert!(summit.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub longitude: f64,
    pub latitude: f64,
    /// Elevation in meters, when the recorder logged one
    pub elevation: Option<f64>,
}

impl TrackPoint {
    pub fn new(longitude: f64, latitude: f64, elevation: Option<f64>) -> Self {
        Self {
            longitude,
            latitude,
            elevation,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
            && self.elevation.map_or(true, f64::is_finite)
    }
}

/// One trail: a recorded track and its ledger metadata.
///
/// `id` is the source file stem, or the normalized `date-name` key for
/// trails without a file. `points` is never empty for trails built by
/// [`convert()`].
///
/// A recording can pause and resume. `breaks` holds the indices in `points`
/// where a new segment starts; the gap before each break is not part of the
/// trail and is never drawn or measured.
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    pub id: String,
    pub points: Vec<TrackPoint>,
    /// Strictly increasing, each in `1..points.len()`
    pub breaks: Vec<usize>,
    pub metadata: TrailMetadata,
}

impl Trail {
    /// Single continuous trail.
    pub fn new(id: impl Into<String>, points: Vec<TrackPoint>, metadata: TrailMetadata) -> Self {
        Self {
            id: id.into(),
            points,
            breaks: Vec::new(),
            metadata,
        }
    }

    /// Build from recorded segments, dropping empty ones.
    pub fn from_segments(
        id: impl Into<String>,
        segments: Vec<Vec<TrackPoint>>,
        metadata: TrailMetadata,
    ) -> Self {
        let mut points = Vec::new();
        let mut breaks = Vec::new();
        for segment in segments.into_iter().filter(|s| !s.is_empty()) {
            if !points.is_empty() {
                breaks.push(points.len());
            }
            points.extend(segment);
        }
        Self {
            id: id.into(),
            points,
            breaks,
            metadata,
        }
    }

    /// Continuous parts of the trail, in order.
    pub fn segments(&self) -> Vec<&[TrackPoint]> {
        let mut bounds = Vec::with_capacity(self.breaks.len() + 2);
        bounds.push(0);
        bounds.extend(
            self.breaks
                .iter()
                .copied()
                .filter(|&b| b > 0 && b < self.points.len()),
        );
        bounds.push(self.points.len());
        bounds
            .windows(2)
            .filter(|w| w[1] > w[0])
            .map(|w| &self.points[w[0]..w[1]])
            .collect()
    }
}

/// Ordered collection of trails.
///
/// Index `i` identifies the same trail in the conflict graph and the
/// coloring built from this collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrailCollection {
    pub trails: Vec<Trail>,
}

impl TrailCollection {
    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.trails.iter().map(|t| t.id.as_str())
    }

    /// Total number of vertices across all trails.
    pub fn vertex_count(&self) -> usize {
        self.trails.iter().map(|t| t.points.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_point_validation() {
        assert!(TrackPoint::new(-0.1278, 51.5074, None).is_valid());
        assert!(TrackPoint::new(20.0, 49.0, Some(1200.0)).is_valid());
        assert!(!TrackPoint::new(0.0, 91.0, None).is_valid());
        assert!(!TrackPoint::new(181.0, 0.0, None).is_valid());
        assert!(!TrackPoint::new(f64::NAN, 0.0, None).is_valid());
        assert!(!TrackPoint::new(0.0, 0.0, Some(f64::INFINITY)).is_valid());
    }

    #[test]
    fn test_collection_counts() {
        let trail = |id: &str, n: usize| {
            Trail::new(id, vec![TrackPoint::new(20.0, 49.0, None); n], TrailMetadata::default())
        };
        let collection = TrailCollection {
            trails: vec![trail("a", 3), trail("b", 4)],
        };
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.vertex_count(), 7);
        assert_eq!(collection.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_segments_split_at_breaks() {
        let p = |x: f64| TrackPoint::new(x, 49.0, None);
        let trail = Trail::from_segments(
            "paused",
            vec![vec![p(20.0), p(20.1)], vec![], vec![p(20.5)], vec![p(21.0), p(21.1)]],
            TrailMetadata::default(),
        );
        assert_eq!(trail.points.len(), 5);
        assert_eq!(trail.breaks, vec![2, 3]);

        let segments = trail.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], &[p(20.0), p(20.1)][..]);
        assert_eq!(segments[1], &[p(20.5)][..]);

        let single = Trail::new("one", vec![p(20.0), p(20.1)], TrailMetadata::default());
        assert_eq!(single.segments().len(), 1);
    }
}
