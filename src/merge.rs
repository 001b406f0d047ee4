//! Feature collection merging and the incremental per-track batch.
//!
//! Every GPX file becomes one GeoJSON artifact `<stem>.geojson` in the trails
//! directory. Existing artifacts are never rebuilt, so a batch can be re-run
//! after a partial failure and only new tracks are processed. The merged
//! collection is read back from the artifacts.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::convert::convert_segments;
use crate::error::{IoResultExt, Result, TrailError};
use crate::geojson_io::{read_trails, trail_to_feature, write_geojson};
use crate::matching::{match_file, MatcherContext};
use crate::metadata::TrailMetadata;
use crate::track::read_gpx_segments;
use crate::{Trail, TrailCollection};

/// Extension of per-track artifacts.
pub const ARTIFACT_EXTENSION: &str = "geojson";

/// Input to [`merge`]: a single trail or an already merged collection.
#[derive(Debug, Clone)]
pub enum MergeSource {
    Trail(Trail),
    Collection(TrailCollection),
}

impl From<Trail> for MergeSource {
    fn from(trail: Trail) -> Self {
        MergeSource::Trail(trail)
    }
}

impl From<TrailCollection> for MergeSource {
    fn from(collection: TrailCollection) -> Self {
        MergeSource::Collection(collection)
    }
}

/// Flatten sources into one collection, preserving order.
pub fn merge<I>(sources: I) -> TrailCollection
where
    I: IntoIterator<Item = MergeSource>,
{
    let mut trails = Vec::new();
    for source in sources {
        match source {
            MergeSource::Trail(trail) => trails.push(trail),
            MergeSource::Collection(collection) => trails.extend(collection.trails),
        }
    }
    TrailCollection { trails }
}

/// Outcome of one batch over the GPX directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Newly converted files
    pub processed: Vec<String>,
    /// Files whose artifact already existed
    pub skipped_existing: Vec<String>,
    /// Files without a ledger row
    pub unmatched: Vec<String>,
    /// Files matched by date only, with the number of same-date rows
    pub fuzzy_matched: Vec<(String, usize)>,
    /// Files that failed to parse, convert or write, with the reason
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped_existing.len() + self.unmatched.len() + self.failed.len()
    }
}

#[derive(Debug)]
enum FileOutcome {
    Processed { fuzzy_candidates: Option<usize> },
    SkippedExisting,
    Unmatched,
    Failed(String),
}

/// Path of the artifact for a GPX file.
pub fn artifact_path(trails_dir: &Path, gpx_file: &Path) -> PathBuf {
    let stem = gpx_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    trails_dir.join(format!("{}.{}", stem, ARTIFACT_EXTENSION))
}

/// Files in `dir` with the given extension (case-insensitive), sorted by name.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .at_path(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Convert every GPX file in `gpx_dir` that has no artifact yet.
///
/// Per-file problems are recorded in the report; only an unreadable
/// `gpx_dir` fails the call.
pub fn build_trail_artifacts(
    gpx_dir: &Path,
    trails_dir: &Path,
    ctx: &MatcherContext,
) -> Result<BatchReport> {
    let files = list_files(gpx_dir, "gpx").map_err(|e| {
        TrailError::config(format!("cannot list GPX directory: {}", e))
    })?;
    fs::create_dir_all(trails_dir).at_path(trails_dir)?;

    let start = std::time::Instant::now();
    let outcomes = process_all(&files, trails_dir, ctx);

    let mut report = BatchReport::default();
    for (path, outcome) in files.iter().zip(outcomes) {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match outcome {
            FileOutcome::Processed { fuzzy_candidates } => {
                if let Some(candidates) = fuzzy_candidates {
                    report.fuzzy_matched.push((name.clone(), candidates));
                }
                report.processed.push(name);
            }
            FileOutcome::SkippedExisting => report.skipped_existing.push(name),
            FileOutcome::Unmatched => report.unmatched.push(name),
            FileOutcome::Failed(reason) => {
                warn!("[Batch] {} failed: {}", name, reason);
                report.failed.push((name, reason));
            }
        }
    }

    info!(
        "[Batch] {} GPX files: {} processed, {} existing, {} unmatched, {} failed in {}ms",
        files.len(),
        report.processed.len(),
        report.skipped_existing.len(),
        report.unmatched.len(),
        report.failed.len(),
        start.elapsed().as_millis()
    );
    Ok(report)
}

#[cfg(not(feature = "parallel"))]
fn process_all(files: &[PathBuf], trails_dir: &Path, ctx: &MatcherContext) -> Vec<FileOutcome> {
    files
        .iter()
        .map(|path| process_track(path, trails_dir, ctx))
        .collect()
}

#[cfg(feature = "parallel")]
fn process_all(files: &[PathBuf], trails_dir: &Path, ctx: &MatcherContext) -> Vec<FileOutcome> {
    use rayon::prelude::*;

    files
        .par_iter()
        .map(|path| process_track(path, trails_dir, ctx))
        .collect()
}

fn process_track(gpx_path: &Path, trails_dir: &Path, ctx: &MatcherContext) -> FileOutcome {
    let output = artifact_path(trails_dir, gpx_path);
    if output.exists() {
        return FileOutcome::SkippedExisting;
    }

    let file_name = gpx_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(found) = match_file(&file_name, ctx) else {
        debug!("[Batch] No ledger row for {}", file_name);
        return FileOutcome::Unmatched;
    };

    let segments = match read_gpx_segments(gpx_path) {
        Ok(segments) => segments,
        Err(e) => return FileOutcome::Failed(e.to_string()),
    };

    let mut metadata = TrailMetadata::from_row(found.row, ctx.layout());
    if metadata.gpx.is_none() {
        metadata.gpx = Some(file_name.clone());
    }

    let id = gpx_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let trail = match convert_segments(&id, segments, metadata) {
        Ok(trail) => trail,
        Err(e) => return FileOutcome::Failed(e.to_string()),
    };

    match write_artifact(&output, &trail) {
        Ok(true) => FileOutcome::Processed {
            fuzzy_candidates: match found.kind {
                crate::MatchKind::DatePrefix { candidates } => Some(candidates),
                _ => None,
            },
        },
        // Another worker created it between the check and the write
        Ok(false) => FileOutcome::SkippedExisting,
        Err(e) => FileOutcome::Failed(e.to_string()),
    }
}

/// Write a single-trail artifact with exclusive creation.
///
/// Returns `Ok(false)` if the file already exists; it is left untouched.
pub fn write_artifact(path: &Path, trail: &Trail) -> Result<bool> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e).at_path(path),
    };

    let feature = trail_to_feature(trail, None);
    if let Err(e) = write_geojson(file, &feature) {
        // A truncated artifact would be skipped forever on later runs
        let _ = fs::remove_file(path);
        return Err(std::io::Error::from(e)).at_path(path);
    }
    Ok(true)
}

/// Read all artifacts of `trails_dir` into one collection.
///
/// Files are read in name order. Unreadable documents and undecodable
/// features are returned as `(label, reason)` failures. Trails whose id was
/// already loaded are dropped.
pub fn load_artifacts(trails_dir: &Path) -> Result<(TrailCollection, Vec<(String, String)>)> {
    let files = list_files(trails_dir, ARTIFACT_EXTENSION)?;

    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(files.len());
    let mut failures = Vec::new();

    for path in &files {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match read_trails(path) {
            Ok(read) => {
                failures.extend(read.skipped);
                let fresh: Vec<Trail> = read
                    .trails
                    .into_iter()
                    .filter(|t| {
                        let new = seen.insert(t.id.clone());
                        if !new {
                            warn!("[Merge] {}: duplicate trail '{}' ignored", name, t.id);
                        }
                        new
                    })
                    .collect();
                sources.push(MergeSource::Collection(TrailCollection { trails: fresh }));
            }
            Err(e) => {
                warn!("[Merge] {} unreadable: {}", name, e);
                failures.push((name, e.to_string()));
            }
        }
    }

    let collection = merge(sources);
    info!(
        "[Merge] {} trails from {} artifacts",
        collection.len(),
        files.len()
    );
    Ok((collection, failures))
}
