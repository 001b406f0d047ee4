//! GeoJSON encoding of trails.
//!
//! A trail becomes a `Feature` with a `LineString` geometry (`[lon, lat]` or
//! `[lon, lat, ele]` positions), the trail id as feature id, and the metadata
//! record as properties. Trails recorded in several segments are written as
//! a `MultiLineString`, one part per segment. Reading accepts a bare
//! `Feature` or a `FeatureCollection`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use log::warn;

use crate::convert::composite_id;
use crate::error::{IoResultExt, Result, TrailError};
use crate::metadata::TrailMetadata;
use crate::{TrackPoint, Trail, TrailCollection};

/// Property key holding the display color.
pub const COLOR_PROPERTY: &str = "color";

/// Encode a trail as a GeoJSON feature, optionally with a display color.
pub fn trail_to_feature(trail: &Trail, color: Option<&str>) -> Feature {
    let position = |p: &TrackPoint| match p.elevation {
        Some(ele) => vec![p.longitude, p.latitude, ele],
        None => vec![p.longitude, p.latitude],
    };
    let mut parts: Vec<Vec<Vec<f64>>> = trail
        .segments()
        .into_iter()
        .map(|segment| segment.iter().map(position).collect())
        .collect();
    let geometry = if parts.len() == 1 {
        Value::LineString(parts.remove(0))
    } else {
        Value::MultiLineString(parts)
    };

    let mut properties = match serde_json::to_value(&trail.metadata) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => JsonObject::new(),
    };
    if let Some(color) = color {
        properties.insert(COLOR_PROPERTY.to_string(), color.into());
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: Some(Id::String(trail.id.clone())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Encode a collection; `colors[i]` is the display color of trail `i`.
pub fn collection_to_geojson(
    collection: &TrailCollection,
    colors: Option<&[&str]>,
) -> FeatureCollection {
    let features = collection
        .trails
        .iter()
        .enumerate()
        .map(|(i, trail)| trail_to_feature(trail, colors.and_then(|c| c.get(i).copied())))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Decode a feature.
///
/// Identity is the feature id, else the `gpx` property stem, else the
/// normalized `date-name` key, else `fallback_id`.
pub fn feature_to_trail(feature: &Feature, fallback_id: &str) -> std::result::Result<Trail, String> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| "feature has no geometry".to_string())?;

    let parts: Vec<&[Vec<f64>]> = match &geometry.value {
        Value::LineString(line) => vec![line.as_slice()],
        Value::MultiLineString(lines) => lines.iter().map(Vec::as_slice).collect(),
        Value::Point(p) => vec![std::slice::from_ref(p)],
        _ => return Err("unsupported geometry type, expected LineString".to_string()),
    };

    let segments: Vec<Vec<TrackPoint>> = parts
        .into_iter()
        .map(|part| {
            part.iter()
                .filter(|pos| pos.len() >= 2)
                .map(|pos| TrackPoint::new(pos[0], pos[1], pos.get(2).copied()))
                .filter(TrackPoint::is_valid)
                .collect()
        })
        .collect();

    let metadata: TrailMetadata = match &feature.properties {
        Some(props) => serde_json::from_value(serde_json::Value::Object(props.clone()))
            .map_err(|e| format!("invalid properties: {}", e))?,
        None => TrailMetadata::default(),
    };

    let id = match &feature.id {
        Some(Id::String(s)) if !s.is_empty() => s.clone(),
        _ => metadata
            .gpx
            .as_deref()
            .and_then(|f| Path::new(f).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .or_else(|| composite_id(&metadata))
            .unwrap_or_else(|| fallback_id.to_string()),
    };

    let trail = Trail::from_segments(id, segments, metadata);
    if trail.points.is_empty() {
        return Err("geometry has no valid positions".to_string());
    }
    Ok(trail)
}

/// Trails read from one document, plus the features that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadTrails {
    pub trails: Vec<Trail>,
    /// `(feature label, reason)`; the label is `file` or `file#k`
    pub skipped: Vec<(String, String)>,
}

/// Read every trail from a GeoJSON document on disk.
///
/// Features that cannot be turned into a trail are logged and returned in
/// [`ReadTrails::skipped`]; a document that is not GeoJSON, or holds a bare
/// geometry, is an error.
pub fn read_trails(path: &Path) -> Result<ReadTrails> {
    let text = fs::read_to_string(path).at_path(path)?;
    let doc: GeoJson = text.parse().map_err(|e: geojson::Error| TrailError::Document {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let features = match doc {
        GeoJson::Feature(f) => vec![f],
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Geometry(_) => {
            return Err(TrailError::Document {
                path: path.to_path_buf(),
                message: "expected Feature or FeatureCollection, found bare geometry".to_string(),
            })
        }
    };

    let mut read = ReadTrails {
        trails: Vec::with_capacity(features.len()),
        skipped: Vec::new(),
    };
    for (k, feature) in features.iter().enumerate() {
        let (fallback, label) = if k == 0 {
            (stem.clone(), file_name.clone())
        } else {
            (format!("{}#{}", stem, k), format!("{}#{}", file_name, k))
        };
        match feature_to_trail(feature, &fallback) {
            Ok(trail) => read.trails.push(trail),
            Err(message) => {
                warn!("[GeoJSON] {}: skipping feature {}: {}", path.display(), k, message);
                read.skipped.push((label, message));
            }
        }
    }
    Ok(read)
}

/// Serialize any GeoJSON value to `writer`, pretty-printed.
pub fn write_geojson<W: Write, T: serde::Serialize>(writer: W, value: &T) -> serde_json::Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(serde_json::Error::io)
}

/// Write a feature collection to `path`, creating parent directories.
pub fn write_collection(path: &Path, fc: &FeatureCollection) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    let file = File::create(path).at_path(path)?;
    write_geojson(file, fc)
        .map_err(std::io::Error::from)
        .at_path(path)
}
