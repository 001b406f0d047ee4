//! Identifier normalization for matching track files against ledger rows.
//!
//! Trail names are typed by hand in the ledger and by the recording app in
//! file names, so the same trail shows up as `Wielki Kriváň`, `wielki-krivan`
//! or `Wielki–Krivan`. [`normalize`] folds all of them onto one key.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonicalize free text into a `[a-z0-9-]` key.
///
/// Diacritics are stripped (NFKD, combining marks dropped), text is
/// lowercased, and any run of whitespace or dash-like characters becomes a
/// single `-`. Everything else outside `[a-z0-9-]` is removed. Leading and
/// trailing separators are trimmed.
///
/// The function is idempotent.
///
/// # Example
/// ```
/// use trailmap::normalize::normalize;
///
/// assert_eq!(normalize("Wielki Kriváň"), "wielki-krivan");
/// assert_eq!(normalize("wielki--krivan"), "wielki-krivan");
/// assert_eq!(normalize("Łomnica — Szczyt"), "lomnica-szczyt");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if is_separator(c) {
            pending_separator = true;
            continue;
        }
        for folded in fold_letter(c) {
            for lower in folded.to_lowercase() {
                if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
                    if pending_separator && !out.is_empty() {
                        out.push('-');
                    }
                    pending_separator = false;
                    out.push(lower);
                }
            }
        }
    }

    out
}

/// Whitespace, ASCII hyphen/underscore and the Unicode dash family.
fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '-' | '_' | '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}'
        )
}

/// Letters that carry no combining mark under NFKD but have an obvious
/// ASCII spelling.
fn fold_letter(c: char) -> Vec<char> {
    match c {
        'ł' | 'Ł' => vec!['l'],
        'ø' | 'Ø' => vec!['o'],
        'đ' | 'Đ' => vec!['d'],
        'ı' => vec!['i'],
        'ß' => vec!['s', 's'],
        'æ' | 'Æ' => vec!['a', 'e'],
        'œ' | 'Œ' => vec!['o', 'e'],
        'þ' | 'Þ' => vec!['t', 'h'],
        _ => vec![c],
    }
}
