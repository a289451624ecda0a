//! Scanline polygon rasterization into a region-id grid.
//!
//! Each cell whose centre lies inside a polygon (even-odd rule over all
//! of its parts) receives that polygon's index in the input slice.
//! Polygons are burnt in order, so where they overlap the last one wins.

use serde::{Deserialize, Serialize};

use crate::geometry::{crosses_scanline, line_crossing_x};
use crate::grid::{GridSystem, RegionGrid};
use crate::progress::Progress;
use crate::types::{Shape, shapes_extent};

/// Which polygons take part in rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selection {
    /// Every polygon.
    #[default]
    All,
    /// Only polygons flagged `selected`, if any are; otherwise all.
    OnlySelected,
}

/// Errors from polygon rasterization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RasterizeError {
    #[error("no polygons in input layer")]
    NoPolygons,

    #[error("no spatial intersection between grid and polygon layer")]
    NoIntersection,
}

/// Indices of the polygons `selection` admits.
pub(crate) fn selected_indices(shapes: &[Shape], selection: Selection) -> Vec<usize> {
    let any_selected = shapes.iter().any(|s| s.selected);
    shapes
        .iter()
        .enumerate()
        .filter(|(_, s)| selection == Selection::All || !any_selected || s.selected)
        .map(|(i, _)| i)
        .collect()
}

/// Burn one polygon into `grid` as `id`. Only columns within the
/// polygon's bounding box (widened by one on each side) are visited.
#[allow(clippy::cast_possible_wrap)]
fn burn(shape: &Shape, system: &GridSystem, id: u32, crossing: &mut [bool], grid: &mut RegionGrid) {
    let Some(extent) = shape.extent() else {
        return;
    };
    let last_col = system.nx as isize - 1;
    let x_start = (system.nearest_column(extent.x_min) - 1).clamp(0, last_col).unsigned_abs();
    let x_stop = (system.nearest_column(extent.x_max) + 1).clamp(0, last_col).unsigned_abs();

    for y in 0..system.ny {
        let y_pos = system.cell_centre(0, y).y;
        if y_pos < extent.y_min || y_pos > extent.y_max {
            continue;
        }

        crossing.fill(false);
        for ring in &shape.parts {
            for (a, b) in ring.edges() {
                if !crosses_scanline(a, b, y_pos) {
                    continue;
                }
                let Some(x) = line_crossing_x(a, b, y_pos) else {
                    continue;
                };
                #[allow(clippy::cast_possible_truncation)]
                let ix = ((x - system.x_min) / system.cellsize + 1.0).floor() as isize;
                let ix = ix.max(0).unsigned_abs();
                if ix >= system.nx {
                    continue;
                }
                crossing[ix] = !crossing[ix];
            }
        }

        let mut fill = false;
        for x in x_start..=x_stop {
            if crossing[x] {
                fill = !fill;
            }
            if fill {
                grid.set(x, y, Some(id));
            }
        }
    }
}

/// Burn `shapes` into a grid of polygon indices over `system`.
///
/// Progress is reported once per polygon; on cancellation the grid
/// burnt so far is returned.
///
/// # Errors
///
/// Returns [`RasterizeError::NoPolygons`] for an empty slice and
/// [`RasterizeError::NoIntersection`] when the polygons' extent does not
/// touch the grid.
pub fn rasterize_polygons<P: Progress + ?Sized>(
    shapes: &[Shape],
    system: &GridSystem,
    selection: Selection,
    progress: &mut P,
) -> Result<RegionGrid, RasterizeError> {
    if shapes.is_empty() {
        return Err(RasterizeError::NoPolygons);
    }
    let extent = shapes_extent(shapes).ok_or(RasterizeError::NoIntersection)?;
    if !system.extent().intersects(&extent) {
        return Err(RasterizeError::NoIntersection);
    }

    let indices = selected_indices(shapes, selection);
    let mut grid = RegionGrid::new(*system);
    let mut crossing = vec![false; system.nx];

    for (n, &i) in indices.iter().enumerate() {
        if !progress.update(n, indices.len()) {
            log::warn!("rasterization cancelled after {n} of {} polygons", indices.len());
            break;
        }
        let Ok(id) = u32::try_from(i) else {
            break;
        };
        burn(&shapes[i], system, id, &mut crossing, &mut grid);
    }

    log::debug!(
        "rasterized {} polygons into {} cells",
        indices.len(),
        grid.labelled_count(),
    );
    Ok(grid)
}
