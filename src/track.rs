//! GPX track reading.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::error::{IoResultExt, Result, TrailError};
use crate::TrackPoint;

/// Read every track point of a GPX file.
///
/// All tracks and segments are concatenated in document order. Points with
/// invalid coordinates are dropped. A file without any usable point is a
/// [`TrailError::Parse`].
pub fn read_gpx(path: &Path) -> Result<Vec<TrackPoint>> {
    Ok(read_gpx_segments(path)?.into_iter().flatten().collect())
}

/// Like [`read_gpx`], keeping each recorded segment separate.
pub fn read_gpx_segments(path: &Path) -> Result<Vec<Vec<TrackPoint>>> {
    let file = File::open(path).at_path(path)?;
    let label = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_gpx_segments(BufReader::new(file), &label)
}

/// Parse GPX from any reader. `label` names the source in errors.
pub fn parse_gpx<R: Read>(reader: R, label: &str) -> Result<Vec<TrackPoint>> {
    Ok(parse_gpx_segments(reader, label)?.into_iter().flatten().collect())
}

/// Parse GPX into its non-empty segments, across all tracks, in document order.
pub fn parse_gpx_segments<R: Read>(reader: R, label: &str) -> Result<Vec<Vec<TrackPoint>>> {
    let doc = gpx::read(reader).map_err(|e| TrailError::parse(label, e.to_string()))?;

    let mut segments = Vec::new();
    let mut dropped = 0usize;
    for track in &doc.tracks {
        for segment in &track.segments {
            let mut points = Vec::with_capacity(segment.points.len());
            for waypoint in &segment.points {
                let p = waypoint.point();
                let point = TrackPoint::new(p.x(), p.y(), waypoint.elevation);
                if point.is_valid() {
                    points.push(point);
                } else {
                    dropped += 1;
                }
            }
            if !points.is_empty() {
                segments.push(points);
            }
        }
    }

    if dropped > 0 {
        debug!("[Track] {}: dropped {} invalid points", label, dropped);
    }
    if segments.is_empty() {
        return Err(TrailError::parse(label, "no track points"));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SEGMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="trailmap-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Rysy</name>
    <trkseg>
      <trkpt lat="49.1794" lon="20.0881"><ele>1400.0</ele></trkpt>
      <trkpt lat="49.1800" lon="20.0890"><ele>1450.5</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="49.1810" lon="20.0900"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    const NO_TRACKS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="trailmap-tests" xmlns="http://www.topografix.com/GPX/1/1">
</gpx>"#;

    #[test]
    fn test_parse_concatenates_segments() {
        let points = parse_gpx(TWO_SEGMENTS.as_bytes(), "rysy.gpx").unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].longitude, 20.0881);
        assert_eq!(points[0].latitude, 49.1794);
        assert_eq!(points[1].elevation, Some(1450.5));
        assert_eq!(points[2].elevation, None);
    }

    #[test]
    fn test_segments_kept_apart() {
        let segments = parse_gpx_segments(TWO_SEGMENTS.as_bytes(), "rysy.gpx").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 2);
        assert_eq!(segments[1].len(), 1);
    }

    #[test]
    fn test_empty_track_is_parse_error() {
        let err = parse_gpx(NO_TRACKS.as_bytes(), "empty.gpx").unwrap_err();
        assert!(matches!(err, TrailError::Parse { .. }));
        assert!(err.to_string().contains("empty.gpx"));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = parse_gpx("not xml at all".as_bytes(), "junk.gpx").unwrap_err();
        assert!(matches!(err, TrailError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_gpx(Path::new("/nonexistent/track.gpx")).unwrap_err();
        assert!(matches!(err, TrailError::Io { .. }));
        assert!(err.is_recoverable());
    }
}
