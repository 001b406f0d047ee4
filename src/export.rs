//! Colored collection export.

use std::fs;
use std::path::Path;

use log::info;

use crate::coloring::{Coloring, Palette};
use crate::error::{IoResultExt, Result, TrailError};
use crate::geojson_io::{collection_to_geojson, write_collection};
use crate::TrailCollection;

/// Write `collection` with each trail's display color in its `color`
/// property, then copy the file to `publish` if given.
///
/// The coloring must cover every trail of the collection.
pub fn export(
    collection: &TrailCollection,
    coloring: &Coloring,
    palette: &Palette,
    output: &Path,
    publish: Option<&Path>,
) -> Result<()> {
    if coloring.classes().len() != collection.len() {
        return Err(TrailError::config(format!(
            "coloring covers {} trails but collection has {}",
            coloring.classes().len(),
            collection.len()
        )));
    }
    palette.validate()?;
    palette.check_capacity(coloring);

    let colors: Vec<&str> = coloring
        .classes()
        .iter()
        .map(|&class| palette.color_for(class))
        .collect();
    let fc = collection_to_geojson(collection, Some(&colors));
    write_collection(output, &fc)?;
    info!(
        "[Export] Wrote {} colored trails to {}",
        collection.len(),
        output.display()
    );

    if let Some(target) = publish {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).at_path(parent)?;
        }
        fs::copy(output, target).at_path(target)?;
        info!("[Export] Published to {}", target.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coloring::greedy_color;
    use crate::conflict::ConflictGraph;
    use crate::geojson_io::read_trails;
    use crate::metadata::TrailMetadata;
    use crate::{TrackPoint, Trail};

    fn collection(n: usize) -> TrailCollection {
        TrailCollection {
            trails: (0..n)
                .map(|i| {
                    Trail::new(
                        format!("t{}", i),
                        vec![
                            TrackPoint::new(20.0, 49.0 + i as f64 * 0.01, None),
                            TrackPoint::new(20.01, 49.0 + i as f64 * 0.01, None),
                        ],
                        TrailMetadata::default(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_export_writes_colors_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out/expeditions.geojson");
        let publish = dir.path().join("site/data/expeditions.geojson");

        let trails = collection(3);
        let graph = ConflictGraph::from_edges(3, &[(0, 1)]);
        let coloring = greedy_color(&graph);
        let palette = Palette::default();
        export(&trails, &coloring, &palette, &output, Some(&publish)).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        let color = |i: usize| json["features"][i]["properties"]["color"].as_str().unwrap().to_string();
        assert_ne!(color(0), color(1));
        for i in 0..3 {
            assert_eq!(color(i), palette.color_for(coloring.class_of(i)));
        }

        assert_eq!(
            fs::read_to_string(&publish).unwrap(),
            fs::read_to_string(&output).unwrap()
        );
        // Color is not part of the metadata model; it lands in `extra`
        let reread = read_trails(&output).unwrap().trails;
        assert_eq!(reread.len(), 3);
        assert!(reread[0].metadata.extra.contains_key("color"));
    }

    #[test]
    fn test_export_rejects_mismatched_coloring() {
        let dir = tempfile::tempdir().unwrap();
        let coloring = greedy_color(&ConflictGraph::new(2));
        let result = export(
            &collection(3),
            &coloring,
            &Palette::default(),
            &dir.path().join("x.geojson"),
            None,
        );
        assert!(matches!(result, Err(TrailError::Config { .. })));
    }
}
