//! Run configuration.
//!
//! Every field has a default matching the usual repository layout, so a
//! config file only needs to name what differs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coloring::Palette;
use crate::conflict::ConflictConfig;
use crate::error::{Result, TrailError};
use crate::ledger::LedgerLayout;
use crate::matching::MatchConfig;
use crate::simplify::SimplifyMode;

/// Paths and tuning for one pipeline run.
///
/// # Example
/// ```
/// use trailmap::PipelineConfig;
///
/// let config: PipelineConfig =
///     serde_json::from_str(r#"{ "gpx_dir": "tracks", "conflict": { "threshold_m": 80.0 } }"#)
///         .unwrap();
/// assert_eq!(config.gpx_dir.to_str(), Some("tracks"));
/// assert_eq!(config.conflict.threshold_m, 80.0);
/// assert_eq!(config.palette.len(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of source GPX files.
    /// Default: "gpx"
    pub gpx_dir: PathBuf,

    /// Directory of per-track GeoJSON artifacts.
    /// Default: "geojson/trails"
    pub trails_dir: PathBuf,

    /// Merged collection, or None to skip writing it.
    /// Default: "geojson/all_trails.geojson"
    pub merged_file: Option<PathBuf>,

    /// Simplified collection, or None to skip writing it.
    /// Default: "geojson/simplified_trails.geojson"
    pub simplified_file: Option<PathBuf>,

    /// Colored output collection.
    /// Default: "geojson/expeditions.geojson"
    pub output_file: PathBuf,

    /// Where the colored output is copied for the website.
    /// Default: None
    pub publish_path: Option<PathBuf>,

    /// Ledger column positions.
    pub layout: LedgerLayout,

    pub matching: MatchConfig,

    /// Default: 10 m on the Web Mercator plane
    pub simplify: SimplifyMode,

    pub conflict: ConflictConfig,

    pub palette: Palette,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gpx_dir: PathBuf::from("gpx"),
            trails_dir: PathBuf::from("geojson/trails"),
            merged_file: Some(PathBuf::from("geojson/all_trails.geojson")),
            simplified_file: Some(PathBuf::from("geojson/simplified_trails.geojson")),
            output_file: PathBuf::from("geojson/expeditions.geojson"),
            publish_path: None,
            layout: LedgerLayout::default(),
            matching: MatchConfig::default(),
            simplify: SimplifyMode::default(),
            conflict: ConflictConfig::default(),
            palette: Palette::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            TrailError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            TrailError::config(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Check values that do not depend on the filesystem.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.conflict.threshold_m;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(TrailError::config(format!(
                "conflict threshold must be a positive number of meters, got {}",
                threshold
            )));
        }
        let tolerance = self.simplify.tolerance();
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(TrailError::config(format!(
                "simplification tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        self.palette.validate()
    }
}
