//! gridvec-export: Pure format serializers (sans-IO)
//!
//! Converts shapes and contour lines into output formats: GeoJSON for
//! interchange and SVG for quick previews. GeoJSON polygons can also be
//! read back as input for rasterization.

pub mod geojson;
pub mod svg;

pub use geojson::{GeoJsonError, contours_to_geojson, shapes_from_geojson, shapes_to_geojson};
pub use svg::{SvgMetadata, build_path_data, contours_to_svg, shapes_to_svg};
