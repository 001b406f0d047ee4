//! End-to-end run: ledger and GPX directory in, colored GeoJSON out.
//!
//! Stages run in order and each hands its output to the next by value:
//! artifact batch, merge, simplification, conflict graph, coloring, export.
//! Only configuration problems abort a run; per-track failures end up in
//! the [`RunSummary`].

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Instant;

use log::info;

use crate::coloring::greedy_color;
use crate::config::PipelineConfig;
use crate::conflict::build_graph;
use crate::error::{Result, TrailError};
use crate::export::export;
use crate::geojson_io::{collection_to_geojson, write_collection};
use crate::ledger::LedgerSource;
use crate::matching::MatcherContext;
use crate::merge::{build_trail_artifacts, load_artifacts};
use crate::simplify::simplify_collection;

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub processed: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub unmatched: Vec<String>,
    /// Files matched by date only, with the number of same-date rows
    pub fuzzy_matched: Vec<(String, usize)>,
    /// Failed tracks and unreadable artifacts, with the reason
    pub failed: Vec<(String, String)>,
    pub trail_count: usize,
    pub conflict_count: usize,
    pub color_classes: usize,
    pub palette_size: usize,
}

impl RunSummary {
    /// More classes than palette colors: some conflicting trails share a color.
    pub fn palette_exhausted(&self) -> bool {
        self.color_classes > self.palette_size
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed:        {}", self.processed.len())?;
        writeln!(f, "Already existing: {}", self.skipped_existing.len())?;
        writeln!(f, "Unmatched:        {}", self.unmatched.len())?;
        for name in &self.unmatched {
            writeln!(f, "  - {}", name)?;
        }
        writeln!(f, "Matched by date:  {}", self.fuzzy_matched.len())?;
        for (name, candidates) in &self.fuzzy_matched {
            writeln!(f, "  - {} ({} candidate rows)", name, candidates)?;
        }
        writeln!(f, "Failed:           {}", self.failed.len())?;
        for (name, reason) in &self.failed {
            writeln!(f, "  - {}: {}", name, reason)?;
        }
        writeln!(f, "Trails:           {}", self.trail_count)?;
        writeln!(f, "Conflicts:        {}", self.conflict_count)?;
        write!(
            f,
            "Color classes:    {} (palette {})",
            self.color_classes, self.palette_size
        )?;
        if self.palette_exhausted() {
            write!(f, " - palette exhausted, some neighbours share a color")?;
        }
        Ok(())
    }
}

/// A configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Check the configuration against the filesystem and create output
    /// directories. Nothing is processed if this fails.
    pub fn prepare(&self) -> Result<()> {
        let config = &self.config;
        config.validate()?;

        if !config.gpx_dir.is_dir() {
            return Err(TrailError::config(format!(
                "GPX directory {} does not exist",
                config.gpx_dir.display()
            )));
        }

        ensure_dir(&config.trails_dir)?;
        let outputs = [
            config.merged_file.as_deref(),
            config.simplified_file.as_deref(),
            Some(config.output_file.as_path()),
            config.publish_path.as_deref(),
        ];
        for file in outputs.into_iter().flatten() {
            if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_dir(parent)?;
            }
        }
        Ok(())
    }

    /// Run every stage against `ledger`.
    pub fn run(&self, ledger: &dyn LedgerSource) -> Result<RunSummary> {
        let start = Instant::now();
        let config = &self.config;
        self.prepare()?;

        let rows = ledger.rows().map_err(|e| match e {
            TrailError::Config { .. } => e,
            other => TrailError::config(format!("cannot read ledger: {}", other)),
        })?;
        let ctx = MatcherContext::new(rows, config.layout.clone(), config.matching.clone());
        info!("[Pipeline] Ledger has {} rows", ctx.len());

        let report = build_trail_artifacts(&config.gpx_dir, &config.trails_dir, &ctx)?;

        let (merged, load_failures) = load_artifacts(&config.trails_dir)?;
        if let Some(path) = &config.merged_file {
            write_collection(path, &collection_to_geojson(&merged, None))?;
        }

        let simplified = simplify_collection(&merged, config.simplify);
        info!(
            "[Pipeline] Simplified {} -> {} vertices",
            merged.vertex_count(),
            simplified.vertex_count()
        );
        if let Some(path) = &config.simplified_file {
            write_collection(path, &collection_to_geojson(&simplified, None))?;
        }

        let graph = build_graph(&simplified, config.conflict.threshold_m);
        let coloring = greedy_color(&graph);
        export(
            &simplified,
            &coloring,
            &config.palette,
            &config.output_file,
            config.publish_path.as_deref(),
        )?;

        let mut failed = report.failed;
        failed.extend(load_failures);
        let summary = RunSummary {
            processed: report.processed,
            skipped_existing: report.skipped_existing,
            unmatched: report.unmatched,
            fuzzy_matched: report.fuzzy_matched,
            failed,
            trail_count: simplified.len(),
            conflict_count: graph.edge_count(),
            color_classes: coloring.class_count(),
            palette_size: config.palette.len(),
        };

        info!(
            "[Pipeline] {} trails, {} conflicts, {} classes in {}ms",
            summary.trail_count,
            summary.conflict_count,
            summary.color_classes,
            start.elapsed().as_millis()
        );
        Ok(summary)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        TrailError::config(format!("cannot create directory {}: {}", dir.display(), e))
    })
}
