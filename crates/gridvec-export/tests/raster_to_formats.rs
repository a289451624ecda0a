//! Integration test: vectorize and contour a small surface, then export
//! both to GeoJSON and SVG.

#![allow(clippy::unwrap_used)]

use gridvec_core::{
    ContourConfig, ContourLevels, GridSystem, Raster, Selection, Unbounded, VectorizeConfig,
    classes_to_polygons, grid_to_contours, rasterize_polygons,
};
use gridvec_export::{
    SvgMetadata, contours_to_geojson, contours_to_svg, shapes_from_geojson, shapes_to_geojson,
    shapes_to_svg,
};

/// A 6x6 surface with a plateau of 10 in the middle of a 0 plain.
fn plateau() -> Raster {
    let system = GridSystem::new(6, 6, 10.0, 1005.0, 2005.0).unwrap();
    Raster::from_fn(system, -99999.0, |x, y| {
        if (2..4).contains(&x) && (2..4).contains(&y) {
            10.0
        } else {
            0.0
        }
    })
}

#[test]
fn polygons_survive_a_geojson_round_trip() {
    let raster = plateau();
    let shapes =
        classes_to_polygons(&raster, &VectorizeConfig::default(), None, &mut Unbounded).unwrap();
    assert_eq!(shapes.len(), 2);

    let text = shapes_to_geojson(&shapes).to_string();
    let read = shapes_from_geojson(&text).unwrap();
    assert_eq!(read, shapes);

    // The plain has the plateau as a hole, so reading it back and burning
    // it in reproduces the classes.
    let grid = rasterize_polygons(&read, raster.system(), Selection::All, &mut Unbounded).unwrap();
    assert_eq!(grid.labelled_count(), 36);
    assert_eq!(grid.get(2, 2), Some(1));
    assert_eq!(grid.get(0, 0), Some(0));
}

#[test]
fn svg_preview_uses_grid_extent() {
    let raster = plateau();
    let shapes =
        classes_to_polygons(&raster, &VectorizeConfig::default(), None, &mut Unbounded).unwrap();
    let svg = shapes_to_svg(&shapes, &raster.system().extent(), &SvgMetadata::default());
    assert!(svg.contains(r#"viewBox="0 0 60 60""#));
    assert_eq!(svg.matches("<path").count(), 2);
    // The plateau is a hole in the plain: outer and hole subpaths.
    assert_eq!(svg.matches(" z").count(), 3);
}

#[test]
fn contours_export_to_both_formats() {
    let raster = plateau();
    let config = ContourConfig {
        levels: ContourLevels::Single(5.0),
        ..ContourConfig::default()
    };
    let lines = grid_to_contours(&raster, &config, &mut Unbounded).unwrap();
    assert_eq!(lines.len(), 1);

    let doc = contours_to_geojson(&lines);
    assert_eq!(doc["features"][0]["geometry"]["type"], "LineString");
    assert_eq!(doc["features"][0]["properties"]["value"], 5.0);

    let metadata = SvgMetadata {
        title: Some("plateau"),
        ..SvgMetadata::default()
    };
    let svg = contours_to_svg(&lines, &raster.system().extent(), &metadata);
    assert!(svg.contains("<title>plateau</title>"));
    assert_eq!(svg.matches("<path").count(), 1);
}
