//! Trip ledger access.
//!
//! The ledger is a spreadsheet of trips, one row per expedition day. The core
//! only sees rows of string cells; where they come from is a collaborator
//! concern behind [`LedgerSource`]. [`CsvLedger`] reads a CSV export.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrailError};

/// A single ledger row: fixed-width string cells.
///
/// Short rows are tolerated; missing trailing cells read as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerRow(pub Vec<String>);

impl LedgerRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(cells.into_iter().map(Into::into).collect())
    }

    /// Trimmed cell content, empty when the row is shorter than `idx`.
    pub fn cell(&self, idx: usize) -> &str {
        self.0.get(idx).map(|c| c.trim()).unwrap_or("")
    }

    /// Cell content, `None` when empty.
    pub fn non_empty(&self, idx: usize) -> Option<&str> {
        let cell = self.cell(idx);
        (!cell.is_empty()).then_some(cell)
    }
}

/// Column index of every metadata field in the ledger.
///
/// Defaults follow the 21-column trip sheet:
/// `nr, date, name, mountains, country, gpx_url, photo_album_url,
/// photo_stamp_url, distance_km, ascent_m, duration_h, got, got_total,
/// accomodation, trail_counter, exp_counter, lat, lon, only_mountain,
/// participants, gpx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerLayout {
    pub nr: usize,
    pub date: usize,
    pub name: usize,
    pub mountains: usize,
    pub country: usize,
    pub gpx_url: usize,
    pub photo_album_url: usize,
    pub photo_stamp_url: usize,
    pub distance_km: usize,
    pub ascent_m: usize,
    pub duration_h: usize,
    pub got: usize,
    pub got_total: usize,
    pub accomodation: usize,
    pub trail_counter: usize,
    pub exp_counter: usize,
    pub lat: usize,
    pub lon: usize,
    pub only_mountain: usize,
    pub participants: usize,
    /// Exact source filename of the GPX recording
    pub source_file: usize,
}

impl Default for LedgerLayout {
    fn default() -> Self {
        Self {
            nr: 0,
            date: 1,
            name: 2,
            mountains: 3,
            country: 4,
            gpx_url: 5,
            photo_album_url: 6,
            photo_stamp_url: 7,
            distance_km: 8,
            ascent_m: 9,
            duration_h: 10,
            got: 11,
            got_total: 12,
            accomodation: 13,
            trail_counter: 14,
            exp_counter: 15,
            lat: 16,
            lon: 17,
            only_mountain: 18,
            participants: 19,
            source_file: 20,
        }
    }
}

/// Anything that can hand over the ledger as ordered rows.
///
/// Row order matters: it is the tie-break for ambiguous matches.
pub trait LedgerSource {
    fn rows(&self) -> Result<Vec<LedgerRow>>;
}

impl LedgerSource for Vec<LedgerRow> {
    fn rows(&self) -> Result<Vec<LedgerRow>> {
        Ok(self.clone())
    }
}

/// Ledger exported as CSV. The first record is a header and is skipped.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    delimiter: u8,
}

impl CsvLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    /// Use a different field delimiter (spreadsheet exports often use `;`).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerSource for CsvLedger {
    fn rows(&self) -> Result<Vec<LedgerRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(&self.path)
            .map_err(|e| {
                TrailError::config(format!(
                    "cannot open ledger {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                TrailError::config(format!(
                    "malformed ledger {} at record {}: {}",
                    self.path.display(),
                    line + 1,
                    e
                ))
            })?;
            rows.push(LedgerRow::new(record.iter()));
        }

        log::info!(
            "[Ledger] Loaded {} rows from {}",
            rows.len(),
            self.path.display()
        );
        Ok(rows)
    }
}
