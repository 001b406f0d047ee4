//! Track-to-feature conversion.

use crate::error::{Result, TrailError};
use crate::metadata::TrailMetadata;
use crate::normalize::normalize;
use crate::{TrackPoint, Trail};

/// Pair a parsed track with its metadata.
///
/// The geometry is kept in full; decimation happens later in
/// [`crate::simplify`]. An empty track is rejected.
///
/// # Example
/// ```
/// use trailmap::{convert::convert, metadata::TrailMetadata, TrackPoint};
///
/// let points = vec![
///     TrackPoint::new(20.0881, 49.1794, Some(1400.0)),
///     TrackPoint::new(20.0890, 49.1800, Some(1450.0)),
/// ];
/// let trail = convert("2025-06-08-rysy", points, TrailMetadata::default()).unwrap();
/// assert_eq!(trail.points.len(), 2);
/// ```
pub fn convert(id: &str, points: Vec<TrackPoint>, metadata: TrailMetadata) -> Result<Trail> {
    convert_segments(id, vec![points], metadata)
}

/// Like [`convert`] for a recording with several segments. Gaps between
/// segments stay gaps.
pub fn convert_segments(
    id: &str,
    segments: Vec<Vec<TrackPoint>>,
    metadata: TrailMetadata,
) -> Result<Trail> {
    let trail = Trail::from_segments(id, segments, metadata);
    if trail.points.is_empty() {
        return Err(TrailError::parse(id, "track has no points"));
    }
    Ok(trail)
}

/// Identity for a trail that has no source file: normalized `date-name`.
pub fn composite_id(metadata: &TrailMetadata) -> Option<String> {
    let date = metadata.date.as_deref()?;
    let name = metadata.name.as_deref()?;
    let id = normalize(&format!("{}-{}", date, name));
    (!id.is_empty()).then_some(id)
}
