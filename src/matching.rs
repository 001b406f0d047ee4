//! Track-file to ledger-row matching.
//!
//! Recording apps name files `YYYY-MM-DD[-HH-MM]-trail-name.gpx`; the ledger
//! holds the date and a free-text display name. Matching tries, in order:
//! 1. the ledger's exact source-filename column
//! 2. the normalized `date-name` composite key, exact equality over all rows
//! 3. (optional) the first row whose key starts with the file's date
//!
//! The ledger is captured once in an immutable [`MatcherContext`].

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerLayout, LedgerRow};
use crate::normalize::normalize;

/// Matching behaviour switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Accept the first row sharing the file's date when no exact key matches.
    /// This can pick the wrong trail on multi-trail days; every such match is
    /// logged and reported. Default: true
    pub date_prefix_fallback: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            date_prefix_fallback: true,
        }
    }
}

/// How a file was associated with its ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// The row's source-filename column names the file
    SourceFile,
    /// Normalized `date-name` keys are equal
    Exact,
    /// Only the date matched; `candidates` rows share that date
    DatePrefix { candidates: usize },
}

impl MatchKind {
    pub fn is_fuzzy(&self) -> bool {
        matches!(self, MatchKind::DatePrefix { .. })
    }
}

/// A successful match: the ledger row plus how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerMatch<'a> {
    /// Index of the row in ledger order
    pub row_index: usize,
    pub row: &'a LedgerRow,
    pub kind: MatchKind,
}

/// Date and name tokens pulled out of a track filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKey {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Normalized trail name
    pub name: String,
}

impl FileKey {
    /// Normalized composite `date-name` key.
    pub fn composite(&self) -> String {
        normalize(&format!("{}-{}", self.date, self.name))
    }
}

/// Split a track filename into date and trail name.
///
/// Returns `None` when fewer than four hyphen-delimited segments remain after
/// normalization, or when the first three do not form a `YYYY-MM-DD` date. A time-of-day segment between date and name (`HHMM`,
/// `HHMMSS` or `HH-MM`) is skipped as long as a name is left afterwards.
///
/// # Example
/// ```
/// use trailmap::matching::parse_file_key;
///
/// let key = parse_file_key("2025-06-08-07-45-Wielki Kriváň.gpx").unwrap();
/// assert_eq!(key.date, "2025-06-08");
/// assert_eq!(key.name, "wielki-krivan");
/// ```
pub fn parse_file_key(filename: &str) -> Option<FileKey> {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let normalized = normalize(&stem);
    let parts: Vec<&str> = normalized.split('-').collect();
    if parts.len() < 4 {
        return None;
    }

    let date = parts[..3].join("-");
    let well_formed = parts[0].len() == 4 && parts[1].len() == 2 && parts[2].len() == 2;
    if !well_formed || NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return None;
    }
    let rest = &parts[3..];
    let skip = time_of_day_len(rest);

    Some(FileKey {
        date,
        name: rest[skip..].join("-"),
    })
}

/// Number of leading segments forming a time of day, keeping at least one
/// segment for the name.
fn time_of_day_len(parts: &[&str]) -> usize {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if parts.len() >= 2 && digits(parts[0]) && matches!(parts[0].len(), 4 | 6) {
        return 1;
    }
    if parts.len() >= 3
        && digits(parts[0])
        && digits(parts[1])
        && parts[0].len() <= 2
        && parts[1].len() <= 2
    {
        return 2;
    }
    0
}

/// Immutable lookup tables over the ledger, built once per run.
#[derive(Debug, Clone)]
pub struct MatcherContext {
    rows: Vec<LedgerRow>,
    layout: LedgerLayout,
    config: MatchConfig,
    /// Exact source filename -> first row index
    by_source_file: HashMap<String, usize>,
    /// Composite key -> first row index
    by_key: HashMap<String, usize>,
    /// Composite keys in ledger order, for prefix fallback
    ordered_keys: Vec<(String, usize)>,
}

impl MatcherContext {
    pub fn new(rows: Vec<LedgerRow>, layout: LedgerLayout, config: MatchConfig) -> Self {
        let mut by_source_file = HashMap::new();
        let mut by_key = HashMap::new();
        let mut ordered_keys = Vec::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            if let Some(file) = row.non_empty(layout.source_file) {
                by_source_file.entry(file.to_string()).or_insert(idx);
            }

            let (Some(date), Some(name)) = (row.non_empty(layout.date), row.non_empty(layout.name))
            else {
                continue;
            };
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                debug!("[Matcher] Row {} has non-ISO date '{}'", idx + 1, date);
            }

            let key = normalize(&format!("{}-{}", date, name));
            by_key.entry(key.clone()).or_insert(idx);
            ordered_keys.push((key, idx));
        }

        Self {
            rows,
            layout,
            config,
            by_source_file,
            by_key,
            ordered_keys,
        }
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn layout(&self) -> &LedgerLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Find the ledger row describing `filename`.
///
/// `None` is the expected outcome for tracks not yet entered in the ledger.
/// Deterministic: ties resolve to the earliest row.
pub fn match_file<'a>(filename: &str, ctx: &'a MatcherContext) -> Option<LedgerMatch<'a>> {
    let hit = move |row_index: usize, kind: MatchKind| LedgerMatch {
        row_index,
        row: &ctx.rows[row_index],
        kind,
    };

    let base = Path::new(filename)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    if let Some(&idx) = ctx.by_source_file.get(base.trim()) {
        return Some(hit(idx, MatchKind::SourceFile));
    }

    let file_key = parse_file_key(&base)?;
    if let Some(&idx) = ctx.by_key.get(&file_key.composite()) {
        return Some(hit(idx, MatchKind::Exact));
    }

    if !ctx.config.date_prefix_fallback {
        return None;
    }

    let date_prefix = format!("{}-", file_key.date);
    let mut same_date = ctx
        .ordered_keys
        .iter()
        .filter(|(key, _)| key.starts_with(&date_prefix));
    let &(_, first) = same_date.next()?;
    let candidates = 1 + same_date.count();

    warn!(
        "[Matcher] '{}' matched row {} by date only ({} candidate row(s) on {})",
        base,
        first + 1,
        candidates,
        file_key.date
    );
    Some(hit(first, MatchKind::DatePrefix { candidates }))
}
