//! Per-trail metadata assembled from a ledger row.
//!
//! Numeric cells are typed by hand and use either `,` or `.` as decimal
//! separator; durations are written as `H:MM`. A cell that cannot be coerced
//! becomes an absent field, never a failed record. The same rule applies
//! when metadata is read back from GeoJSON properties, where older
//! artifacts hold numbers as text and empty cells as `""`.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TrailError};
use crate::ledger::{LedgerLayout, LedgerRow};

/// Closed metadata record for one trail.
///
/// Serialized field names are the GeoJSON property keys the map renderer
/// reads. Properties not covered by the schema survive round-trips in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailMetadata {
    pub nr: Option<String>,
    pub date: Option<String>,
    pub name: Option<String>,
    pub mountains: Option<String>,
    pub country: Option<String>,
    pub gpx_url: Option<String>,
    pub photo_album_url: Option<String>,
    pub photo_stamp_url: Option<String>,
    /// Distance in km
    #[serde(deserialize_with = "decimal_property")]
    pub distance_km: Option<f64>,
    /// Total ascent in meters
    #[serde(deserialize_with = "integer_property")]
    pub ascent_m: Option<i64>,
    /// Duration in hours, two decimals
    #[serde(deserialize_with = "duration_property")]
    pub duration_h: Option<f64>,
    pub got: Option<String>,
    #[serde(deserialize_with = "decimal_property")]
    pub got_total: Option<f64>,
    pub accomodation: Option<String>,
    pub trail_counter: Option<String>,
    pub exp_counter: Option<String>,
    /// Centroid latitude
    #[serde(deserialize_with = "decimal_property")]
    pub lat: Option<f64>,
    /// Centroid longitude
    #[serde(deserialize_with = "decimal_property")]
    pub lon: Option<f64>,
    pub only_mountain: Option<String>,
    pub participants: Option<String>,
    /// Source GPX filename
    pub gpx: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TrailMetadata {
    /// Assemble metadata from a ledger row.
    ///
    /// Coercion failures are logged and leave the field absent.
    pub fn from_row(row: &LedgerRow, layout: &LedgerLayout) -> Self {
        let text = |idx: usize| row.non_empty(idx).map(str::to_string);

        Self {
            nr: text(layout.nr),
            date: text(layout.date),
            name: text(layout.name),
            mountains: text(layout.mountains),
            country: text(layout.country),
            gpx_url: text(layout.gpx_url),
            photo_album_url: text(layout.photo_album_url),
            photo_stamp_url: text(layout.photo_stamp_url),
            distance_km: lenient(parse_decimal("distance_km", row.cell(layout.distance_km))),
            ascent_m: lenient(parse_integer("ascent_m", row.cell(layout.ascent_m))),
            duration_h: lenient(parse_duration_hours("duration_h", row.cell(layout.duration_h))),
            got: text(layout.got),
            got_total: lenient(parse_decimal("got_total", row.cell(layout.got_total))),
            accomodation: text(layout.accomodation),
            trail_counter: text(layout.trail_counter),
            exp_counter: text(layout.exp_counter),
            lat: lenient(parse_decimal("lat", row.cell(layout.lat))),
            lon: lenient(parse_decimal("lon", row.cell(layout.lon))),
            only_mountain: text(layout.only_mountain),
            participants: text(layout.participants),
            gpx: text(layout.source_file),
            extra: BTreeMap::new(),
        }
    }
}

fn lenient<T>(value: Result<Option<T>>) -> Option<T> {
    match value {
        Ok(v) => v,
        Err(e) => {
            warn!("[Metadata] {}; field left empty", e);
            None
        }
    }
}

fn decimal_property<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => lenient(parse_decimal("property", &s)),
        Some(other) => non_numeric(other),
        None => None,
    })
}

fn integer_property<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|x| x.round() as i64)),
        Some(serde_json::Value::String(s)) => lenient(parse_integer("property", &s)),
        Some(other) => non_numeric(other),
        None => None,
    })
}

fn duration_property<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => lenient(parse_duration_hours("property", &s)),
        Some(other) => non_numeric(other),
        None => None,
    })
}

fn non_numeric<T>(value: serde_json::Value) -> Option<T> {
    warn!("[Metadata] Non-numeric property value {}; field left empty", value);
    None
}

/// Parse a number written with either `,` or `.` as decimal separator.
///
/// Empty input is `Ok(None)`.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<Option<f64>> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(TrailError::Coercion {
            field,
            value: raw.to_string(),
            expected: "decimal number",
        }),
    }
}

/// Parse a whole number, rounding locale-formatted decimals (`1234,0`).
pub fn parse_integer(field: &'static str, raw: &str) -> Result<Option<i64>> {
    parse_decimal(field, raw)
        .map(|v| v.map(|x| x.round() as i64))
        .map_err(|_| TrailError::Coercion {
            field,
            value: raw.to_string(),
            expected: "integer",
        })
}

/// Convert `H:MM` text to fractional hours rounded to two decimals.
///
/// A plain decimal is accepted as hours.
pub fn parse_duration_hours(field: &'static str, raw: &str) -> Result<Option<f64>> {
    let raw_trimmed = raw.trim();
    if raw_trimmed.is_empty() {
        return Ok(None);
    }

    let invalid = || TrailError::Coercion {
        field,
        value: raw.to_string(),
        expected: "H:MM duration",
    };

    let Some((h, m)) = raw_trimmed.split_once(':') else {
        return parse_decimal(field, raw_trimmed).map_err(|_| invalid());
    };

    let hours: u32 = h.trim().parse().map_err(|_| invalid())?;
    // Sheets sometimes export H:MM:SS; seconds are ignored.
    let minutes_part = m.split(':').next().unwrap_or("");
    let minutes: u32 = minutes_part.trim().parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }

    let value = hours as f64 + minutes as f64 / 60.0;
    Ok(Some((value * 100.0).round() / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row() -> LedgerRow {
        LedgerRow::new([
            "12",
            "2025-06-08",
            "Wielki Kriváň",
            "Malá Fatra",
            "Slovakia",
            "https://example.org/gpx",
            "https://example.org/album",
            "",
            "14,7",
            "1085",
            "6:45",
            "21",
            "123,5",
            "Chata pod Chlebom",
            "150",
            "44",
            "49,19",
            "19.03",
            "TAK",
            "Ania, Tomek",
            "2025-06-08-wielki-krivan.gpx",
        ])
    }

    #[test]
    fn test_from_row_coerces_numbers() {
        let meta = TrailMetadata::from_row(&full_row(), &LedgerLayout::default());
        assert_eq!(meta.name.as_deref(), Some("Wielki Kriváň"));
        assert_eq!(meta.distance_km, Some(14.7));
        assert_eq!(meta.ascent_m, Some(1085));
        assert_eq!(meta.duration_h, Some(6.75));
        assert_eq!(meta.got_total, Some(123.5));
        assert_eq!(meta.lat, Some(49.19));
        assert_eq!(meta.lon, Some(19.03));
        assert_eq!(meta.photo_stamp_url, None);
        assert_eq!(meta.gpx.as_deref(), Some("2025-06-08-wielki-krivan.gpx"));
    }

    #[test]
    fn test_bad_cells_become_absent() {
        let mut row = full_row();
        row.0[8] = "n/a".to_string();
        row.0[10] = "six hours".to_string();
        row.0.truncate(17);

        let meta = TrailMetadata::from_row(&row, &LedgerLayout::default());
        assert_eq!(meta.distance_km, None);
        assert_eq!(meta.duration_h, None);
        assert_eq!(meta.lat, Some(49.19));
        assert_eq!(meta.lon, None);
        assert_eq!(meta.gpx, None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("x", "3,5").unwrap(), Some(3.5));
        assert_eq!(parse_decimal("x", " 3.25 ").unwrap(), Some(3.25));
        assert_eq!(parse_decimal("x", "").unwrap(), None);
        assert!(parse_decimal("x", "abc").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_hours("d", "7:20").unwrap(), Some(7.33));
        assert_eq!(parse_duration_hours("d", "0:05").unwrap(), Some(0.08));
        assert_eq!(parse_duration_hours("d", "10:30:00").unwrap(), Some(10.5));
        assert_eq!(parse_duration_hours("d", "4,5").unwrap(), Some(4.5));
        assert_eq!(parse_duration_hours("d", "").unwrap(), None);
        assert!(parse_duration_hours("d", "5:75").is_err());
        assert!(parse_duration_hours("d", "x:10").is_err());
    }

    #[test]
    fn test_text_properties_read_leniently() {
        let meta: TrailMetadata = serde_json::from_value(serde_json::json!({
            "name": "Rysy",
            "lat": "",
            "lon": "20,0881",
            "distance_km": null,
            "ascent_m": "1 234",
            "duration_h": "3:45",
            "got_total": "n/a",
            "trail_counter": "7"
        }))
        .unwrap();
        assert_eq!(meta.name.as_deref(), Some("Rysy"));
        assert_eq!(meta.lat, None);
        assert_eq!(meta.lon, Some(20.0881));
        assert_eq!(meta.distance_km, None);
        assert_eq!(meta.ascent_m, Some(1234));
        assert_eq!(meta.duration_h, Some(3.75));
        assert_eq!(meta.got_total, None);
        assert!(meta.extra.is_empty());

        let numeric: TrailMetadata =
            serde_json::from_value(serde_json::json!({ "ascent_m": 650, "lat": 49.18, "duration_h": 2 }))
                .unwrap();
        assert_eq!(numeric.ascent_m, Some(650));
        assert_eq!(numeric.lat, Some(49.18));
        assert_eq!(numeric.duration_h, Some(2.0));
    }

    #[test]
    fn test_serde_keeps_unknown_properties() {
        let json = serde_json::json!({
            "name": "Rysy",
            "ascent_m": 1200,
            "wikiloc_url": "https://example.org/w",
        });
        let meta: TrailMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Rysy"));
        assert_eq!(meta.ascent_m, Some(1200));
        assert!(meta.extra.contains_key("wikiloc_url"));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["wikiloc_url"], "https://example.org/w");
    }
}
