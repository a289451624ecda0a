//! gridvec-core: raster to vector conversion engine (sans-IO).
//!
//! Turns classified rasters into polygons and back:
//!
//! * [`classes_to_polygons`]: label cells by value, mark region
//!   boundaries on a half-cell lattice, walk each boundary into a ring
//!   and group rings into shapes (multipart or one shape per island).
//! * [`rasterize_polygons`]: burn polygons into a region-id grid with a
//!   scanline fill, the inverse of vectorization.
//! * [`grid_to_contours`]: isolines of a surface at chosen levels.
//! * [`clip_to_polygons`] and [`zonal_statistics`]: raster operations
//!   driven by a polygon mask.
//!
//! This crate performs no I/O. Rasters are built in memory (or decoded
//! from image bytes), and results are plain data for the serializers in
//! `gridvec-export`.

pub mod classify;
pub mod clip;
pub mod contour;
pub mod diagnostics;
pub mod direction;
pub mod geometry;
pub mod grid;
pub mod lattice;
pub mod progress;
pub mod rasterize;
pub mod rings;
pub mod types;
pub mod vectorize;
pub mod walk;
pub mod zonal;

pub use classify::{LookupEntry, LookupTable};
pub use clip::clip_to_polygons;
pub use contour::{ContourConfig, ContourError, ContourLevels, grid_to_contours};
pub use diagnostics::{Clock, VectorizeDiagnostics, classes_to_polygons_with_diagnostics};
pub use grid::{GridSystem, Raster, RasterError, RegionGrid};
pub use progress::{Progress, Unbounded};
pub use rasterize::{RasterizeError, Selection, rasterize_polygons};
pub use types::{
    ClassSelection, ContourLine, Extent, OutputMode, Point, Polyline, Ring, Shape,
    VectorizeConfig, VectorizeError,
};
pub use vectorize::{Vectorized, classes_to_polygons, vectorize_regions};
pub use zonal::{PolygonStatistics, StatisticFields, ZonalConfig, ZonalError, zonal_statistics};
