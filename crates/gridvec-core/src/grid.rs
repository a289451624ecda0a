//! Grid geometry and the two in-memory grid containers.
//!
//! A [`GridSystem`] places a regular lattice of square cells in world
//! coordinates. `x_min`/`y_min` are the coordinates of the *centre* of
//! cell `(0, 0)`; rows are stored bottom to top so that the row index
//! grows with northing.
//!
//! [`Raster`] holds one `f64` per cell with a NODATA sentinel,
//! [`RegionGrid`] holds one optional region id per cell.

use serde::{Deserialize, Serialize};

use crate::types::{Extent, Point};

/// NODATA sentinel used for rasters decoded from images.
pub const DEFAULT_NODATA: f64 = -99999.0;

/// Geometry of a regular grid.
///
/// Deserialization goes through [`GridSystem::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridSystemFields")]
pub struct GridSystem {
    /// Number of columns.
    pub nx: usize,
    /// Number of rows.
    pub ny: usize,
    /// Side length of a cell in world units.
    pub cellsize: f64,
    /// Easting of the centre of column 0.
    pub x_min: f64,
    /// Northing of the centre of row 0.
    pub y_min: f64,
}

#[derive(Deserialize)]
struct GridSystemFields {
    nx: usize,
    ny: usize,
    cellsize: f64,
    x_min: f64,
    y_min: f64,
}

impl TryFrom<GridSystemFields> for GridSystem {
    type Error = RasterError;

    fn try_from(f: GridSystemFields) -> Result<Self, Self::Error> {
        Self::new(f.nx, f.ny, f.cellsize, f.x_min, f.y_min)
    }
}

impl GridSystem {
    /// Create a validated grid system.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] for zero dimensions or a
    /// non-positive / non-finite cell size or origin.
    pub fn new(
        nx: usize,
        ny: usize,
        cellsize: f64,
        x_min: f64,
        y_min: f64,
    ) -> Result<Self, RasterError> {
        let system = Self {
            nx,
            ny,
            cellsize,
            x_min,
            y_min,
        };
        system.validate()?;
        Ok(system)
    }

    /// Check the invariants of a (possibly deserialized) grid system.
    ///
    /// # Errors
    ///
    /// See [`GridSystem::new`].
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.nx == 0 || self.ny == 0 {
            return Err(RasterError::InvalidGrid(format!(
                "grid dimensions must be positive, got {}x{}",
                self.nx, self.ny,
            )));
        }
        if !(self.cellsize.is_finite() && self.cellsize > 0.0) {
            return Err(RasterError::InvalidGrid(format!(
                "cell size must be positive and finite, got {}",
                self.cellsize,
            )));
        }
        if !(self.x_min.is_finite() && self.y_min.is_finite()) {
            return Err(RasterError::InvalidGrid(
                "grid origin must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Total number of cells.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.nx * self.ny
    }

    /// Easting of the centre of the last column.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn x_max(&self) -> f64 {
        ((self.nx - 1) as f64).mul_add(self.cellsize, self.x_min)
    }

    /// Northing of the centre of the last row.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn y_max(&self) -> f64 {
        ((self.ny - 1) as f64).mul_add(self.cellsize, self.y_min)
    }

    /// Outer extent measured at the cell edges.
    #[must_use]
    pub fn extent(&self) -> Extent {
        let half = self.cellsize / 2.0;
        Extent::new(
            self.x_min - half,
            self.y_min - half,
            self.x_max() + half,
            self.y_max() + half,
        )
    }

    /// Extent spanned by the cell centres.
    #[must_use]
    pub fn centre_extent(&self) -> Extent {
        Extent::new(self.x_min, self.y_min, self.x_max(), self.y_max())
    }

    /// World coordinates of the centre of cell `(x, y)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_centre(&self, x: usize, y: usize) -> Point {
        Point::new(
            (x as f64).mul_add(self.cellsize, self.x_min),
            (y as f64).mul_add(self.cellsize, self.y_min),
        )
    }

    /// Whether the signed cell coordinate lies inside the grid.
    #[must_use]
    pub fn is_in_grid(&self, x: isize, y: isize) -> bool {
        usize::try_from(x).is_ok_and(|x| x < self.nx)
            && usize::try_from(y).is_ok_and(|y| y < self.ny)
    }

    /// Row-major index of cell `(x, y)`.
    #[must_use]
    pub const fn index(&self, x: usize, y: usize) -> usize {
        y * self.nx + x
    }

    /// Column whose centre is nearest to easting `wx` (may be out of grid).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn nearest_column(&self, wx: f64) -> isize {
        (0.5 + (wx - self.x_min) / self.cellsize).floor() as isize
    }

    /// Row whose centre is nearest to northing `wy` (may be out of grid).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn nearest_row(&self, wy: f64) -> isize {
        (0.5 + (wy - self.y_min) / self.cellsize).floor() as isize
    }
}

/// A raster surface: one `f64` per cell.
///
/// Cells holding the `nodata` sentinel, or NaN, carry no value.
/// Deserialization goes through [`Raster::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RasterFields")]
pub struct Raster {
    system: GridSystem,
    values: Vec<f64>,
    nodata: f64,
}

#[derive(Deserialize)]
struct RasterFields {
    system: GridSystem,
    values: Vec<f64>,
    nodata: f64,
}

impl TryFrom<RasterFields> for Raster {
    type Error = RasterError;

    fn try_from(f: RasterFields) -> Result<Self, Self::Error> {
        Self::new(f.system, f.values, f.nodata)
    }
}

impl Raster {
    /// Wrap a row-major value buffer (row 0 is the southernmost row).
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] when the grid system is
    /// invalid or the buffer length does not match it.
    pub fn new(system: GridSystem, values: Vec<f64>, nodata: f64) -> Result<Self, RasterError> {
        system.validate()?;
        if values.len() != system.cell_count() {
            return Err(RasterError::InvalidGrid(format!(
                "expected {} values for a {}x{} grid, got {}",
                system.cell_count(),
                system.nx,
                system.ny,
                values.len(),
            )));
        }
        Ok(Self {
            system,
            values,
            nodata,
        })
    }

    /// A raster with every cell set to `value`.
    #[must_use]
    pub fn filled(system: GridSystem, value: f64, nodata: f64) -> Self {
        Self {
            system,
            values: vec![value; system.cell_count()],
            nodata,
        }
    }

    /// Build a raster by evaluating `f(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(
        system: GridSystem,
        nodata: f64,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> Self {
        let mut values = Vec::with_capacity(system.cell_count());
        for y in 0..system.ny {
            for x in 0..system.nx {
                values.push(f(x, y));
            }
        }
        Self {
            system,
            values,
            nodata,
        }
    }

    /// Decode image bytes into a raster of luminance values.
    ///
    /// Supports PNG, JPEG, BMP, and WebP. The top image row becomes the
    /// northernmost raster row. The grid has unit cells with its outer
    /// edge at the origin, so pixel `(col, row)` covers
    /// `[col, col + 1] x [h - row - 1, h - row]`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::EmptyInput`] if `bytes` is empty.
    /// Returns [`RasterError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, RasterError> {
        if bytes.is_empty() {
            return Err(RasterError::EmptyInput);
        }

        let gray = image::load_from_memory(bytes)?.to_luma8();
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let system = GridSystem::new(w, h, 1.0, 0.5, 0.5)?;
        Ok(Self::from_fn(system, DEFAULT_NODATA, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let (px, py) = (x as u32, (h - 1 - y) as u32);
            f64::from(gray.get_pixel(px, py).0[0])
        }))
    }

    /// Replace the grid placement, keeping the cell values.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] if the new placement is
    /// invalid.
    pub fn georeferenced(
        mut self,
        cellsize: f64,
        x_min: f64,
        y_min: f64,
    ) -> Result<Self, RasterError> {
        let system = GridSystem::new(self.system.nx, self.system.ny, cellsize, x_min, y_min)?;
        self.system = system;
        Ok(self)
    }

    /// Use a different NODATA sentinel for the existing values.
    #[must_use]
    pub const fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub const fn system(&self) -> &GridSystem {
        &self.system
    }

    #[must_use]
    pub const fn nodata(&self) -> f64 {
        self.nodata
    }

    /// Raw row-major values, NODATA included.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether `v` counts as NODATA for this raster.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_nodata_value(&self, v: f64) -> bool {
        v.is_nan() || v == self.nodata
    }

    /// Raw value of cell `(x, y)`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.values[self.system.index(x, y)]
    }

    /// Value of cell `(x, y)`, `None` for NODATA.
    #[must_use]
    pub fn value(&self, x: usize, y: usize) -> Option<f64> {
        let v = self.get(x, y);
        (!self.is_nodata_value(v)).then_some(v)
    }

    /// Value at signed coordinates, `None` outside the grid or for NODATA.
    #[must_use]
    pub fn value_checked(&self, x: isize, y: isize) -> Option<f64> {
        if !self.system.is_in_grid(x, y) {
            return None;
        }
        self.value(x.unsigned_abs(), y.unsigned_abs())
    }

    pub fn set(&mut self, x: usize, y: usize, v: f64) {
        let i = self.system.index(x, y);
        self.values[i] = v;
    }

    pub fn set_nodata(&mut self, x: usize, y: usize) {
        self.set(x, y, self.nodata);
    }

    /// Number of cells holding a value.
    #[must_use]
    pub fn data_count(&self) -> usize {
        self.values.iter().filter(|&&v| !self.is_nodata_value(v)).count()
    }

    /// Minimum and maximum over data cells, `None` if all are NODATA.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|&v| !self.is_nodata_value(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// NODATA sentinel used when a [`RegionGrid`] is turned into a [`Raster`].
pub const REGION_NODATA: f64 = -1.0;

impl From<&RegionGrid> for Raster {
    fn from(grid: &RegionGrid) -> Self {
        Self {
            system: grid.system,
            values: grid
                .cells
                .iter()
                .map(|c| c.map_or(REGION_NODATA, f64::from))
                .collect(),
            nodata: REGION_NODATA,
        }
    }
}

/// A grid of region ids; `None` marks NODATA (or "no polygon").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegionGridFields")]
pub struct RegionGrid {
    system: GridSystem,
    cells: Vec<Option<u32>>,
}

#[derive(Deserialize)]
struct RegionGridFields {
    system: GridSystem,
    cells: Vec<Option<u32>>,
}

impl TryFrom<RegionGridFields> for RegionGrid {
    type Error = RasterError;

    fn try_from(f: RegionGridFields) -> Result<Self, Self::Error> {
        Self::from_cells(f.system, f.cells)
    }
}

impl RegionGrid {
    /// A grid with every cell unlabelled.
    #[must_use]
    pub fn new(system: GridSystem) -> Self {
        Self {
            system,
            cells: vec![None; system.cell_count()],
        }
    }

    /// Wrap a row-major id buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] when the buffer length does
    /// not match the grid system.
    pub fn from_cells(system: GridSystem, cells: Vec<Option<u32>>) -> Result<Self, RasterError> {
        system.validate()?;
        if cells.len() != system.cell_count() {
            return Err(RasterError::InvalidGrid(format!(
                "expected {} cells, got {}",
                system.cell_count(),
                cells.len(),
            )));
        }
        Ok(Self { system, cells })
    }

    #[must_use]
    pub const fn system(&self) -> &GridSystem {
        &self.system
    }

    #[must_use]
    pub fn cells(&self) -> &[Option<u32>] {
        &self.cells
    }

    /// Region id of cell `(x, y)`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        self.cells[self.system.index(x, y)]
    }

    /// Region id at signed coordinates; out-of-grid reads as `None`.
    #[must_use]
    pub fn id_at(&self, x: isize, y: isize) -> Option<u32> {
        if self.system.is_in_grid(x, y) {
            self.get(x.unsigned_abs(), y.unsigned_abs())
        } else {
            None
        }
    }

    pub fn set(&mut self, x: usize, y: usize, id: Option<u32>) {
        let i = self.system.index(x, y);
        self.cells[i] = id;
    }

    /// Number of cells carrying an id.
    #[must_use]
    pub fn labelled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Errors raised while constructing or decoding grids.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input bytes were empty.
    #[error("input raster data is empty")]
    EmptyInput,

    /// Grid dimensions, placement or buffer size are inconsistent.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

/// Serde-compatible proxy for `RasterError`.
///
/// A deserialized `ImageDecode` comes back as `InvalidGrid` carrying the
/// decode message.
#[derive(Serialize, Deserialize)]
enum RasterErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidGrid(String),
}

impl Serialize for RasterError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => RasterErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => RasterErrorProxy::EmptyInput,
            Self::InvalidGrid(s) => RasterErrorProxy::InvalidGrid(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RasterError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = RasterErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            RasterErrorProxy::ImageDecode(msg) => {
                Self::InvalidGrid(format!("image decode error: {msg}"))
            }
            RasterErrorProxy::EmptyInput => Self::EmptyInput,
            RasterErrorProxy::InvalidGrid(s) => Self::InvalidGrid(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn system(nx: usize, ny: usize) -> GridSystem {
        GridSystem::new(nx, ny, 2.0, 10.0, 20.0).unwrap()
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            GridSystem::new(0, 3, 1.0, 0.0, 0.0),
            Err(RasterError::InvalidGrid(_)),
        ));
    }

    #[test]
    fn non_positive_cellsize_is_rejected() {
        assert!(GridSystem::new(2, 2, 0.0, 0.0, 0.0).is_err());
        assert!(GridSystem::new(2, 2, f64::NAN, 0.0, 0.0).is_err());
    }

    #[test]
    fn extent_is_measured_at_cell_edges() {
        let s = system(3, 2);
        assert_eq!(s.extent(), Extent::new(9.0, 19.0, 15.0, 23.0));
        assert_eq!(s.centre_extent(), Extent::new(10.0, 20.0, 14.0, 22.0));
    }

    #[test]
    fn cell_centre_and_nearest_index_agree() {
        let s = system(3, 2);
        let c = s.cell_centre(2, 1);
        assert_eq!(c, Point::new(14.0, 22.0));
        assert_eq!(s.nearest_column(c.x + 0.9), 2);
        assert_eq!(s.nearest_row(c.y - 0.9), 1);
        assert_eq!(s.nearest_column(8.0), -1);
    }

    #[test]
    fn in_grid_bounds() {
        let s = system(3, 2);
        assert!(s.is_in_grid(0, 0));
        assert!(s.is_in_grid(2, 1));
        assert!(!s.is_in_grid(3, 1));
        assert!(!s.is_in_grid(-1, 0));
        assert!(!s.is_in_grid(0, 2));
    }

    #[test]
    fn raster_length_mismatch_is_rejected() {
        assert!(Raster::new(system(2, 2), vec![0.0; 3], -1.0).is_err());
    }

    #[test]
    fn nan_and_sentinel_are_nodata() {
        let r = Raster::new(system(3, 1), vec![1.0, f64::NAN, -1.0], -1.0).unwrap();
        assert_eq!(r.value(0, 0), Some(1.0));
        assert_eq!(r.value(1, 0), None);
        assert_eq!(r.value(2, 0), None);
        assert_eq!(r.value_checked(5, 0), None);
        assert_eq!(r.data_count(), 1);
    }

    #[test]
    fn min_max_skips_nodata() {
        let r = Raster::new(system(2, 2), vec![3.0, -1.0, 7.0, 5.0], -1.0).unwrap();
        assert_eq!(r.min_max(), Some((3.0, 7.0)));
        let empty = Raster::filled(system(2, 2), -1.0, -1.0);
        assert_eq!(empty.min_max(), None);
    }

    #[test]
    fn region_grid_out_of_grid_reads_none() {
        let mut g = RegionGrid::new(system(2, 2));
        g.set(1, 1, Some(4));
        assert_eq!(g.id_at(1, 1), Some(4));
        assert_eq!(g.id_at(2, 1), None);
        assert_eq!(g.id_at(-1, 0), None);
        assert_eq!(g.labelled_count(), 1);
    }

    #[test]
    fn region_grid_converts_to_raster() {
        let mut g = RegionGrid::new(system(2, 1));
        g.set(0, 0, Some(3));
        let r = Raster::from(&g);
        assert_eq!(r.value(0, 0), Some(3.0));
        assert_eq!(r.value(1, 0), None);
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(Raster::from_image_bytes(&[]), Err(RasterError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        assert!(matches!(
            Raster::from_image_bytes(&[0, 1, 2, 3]),
            Err(RasterError::ImageDecode(_)),
        ));
    }

    #[test]
    fn decoded_image_is_flipped_to_y_up() {
        // 1x2 image: top pixel white, bottom pixel black.
        let img =
            image::GrayImage::from_fn(1, 2, |_, y| image::Luma([if y == 0 { 255 } else { 0 }]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();

        let raster = Raster::from_image_bytes(&buf).unwrap();
        assert_eq!(raster.system().nx, 1);
        assert_eq!(raster.system().ny, 2);
        assert_eq!(raster.value(0, 0), Some(0.0));
        assert_eq!(raster.value(0, 1), Some(255.0));
        assert_eq!(raster.system().extent(), Extent::new(0.0, 0.0, 1.0, 2.0));
    }

    #[test]
    fn image_decode_error_deserializes_as_invalid_grid() {
        let err = Raster::from_image_bytes(&[9, 9, 9]).unwrap_err();
        let json = serde_json::to_string(&err).unwrap();
        let back: RasterError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            RasterError::InvalidGrid(ref s) if s.starts_with("image decode error"),
        ));
    }

    #[test]
    fn deserializing_rejects_inconsistent_grids() {
        let short = r#"{
            "system": {"nx": 2, "ny": 2, "cellsize": 1.0, "x_min": 0.0, "y_min": 0.0},
            "values": [1.0, 2.0, 3.0],
            "nodata": -1.0
        }"#;
        let err = serde_json::from_str::<Raster>(short).unwrap_err();
        assert!(err.to_string().contains("expected 4 values"));

        let zero = r#"{"nx": 0, "ny": 2, "cellsize": 1.0, "x_min": 0.0, "y_min": 0.0}"#;
        assert!(serde_json::from_str::<GridSystem>(zero).is_err());

        let regions = r#"{
            "system": {"nx": 1, "ny": 1, "cellsize": -2.0, "x_min": 0.0, "y_min": 0.0},
            "cells": [null]
        }"#;
        assert!(serde_json::from_str::<RegionGrid>(regions).is_err());
    }

    #[test]
    fn serialized_raster_reads_back() {
        let raster = Raster::new(system(2, 1), vec![1.0, -1.0], -1.0).unwrap();
        let json = serde_json::to_string(&raster).unwrap();
        assert_eq!(serde_json::from_str::<Raster>(&json).unwrap(), raster);
    }
}
