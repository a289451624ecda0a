//! Clip a raster to a polygon set.

use crate::grid::{GridSystem, Raster};
use crate::progress::Progress;
use crate::rasterize::{RasterizeError, Selection, rasterize_polygons, selected_indices};
use crate::types::Shape;

/// Cut `raster` down to the extent of the selected polygons and blank
/// every cell whose centre lies outside them.
///
/// The polygons' extent is snapped to the nearest cell centres and
/// intersected with the grid, so the result shares the source's cell
/// size and alignment.
///
/// # Errors
///
/// Returns [`RasterizeError::NoPolygons`] for an empty polygon set and
/// [`RasterizeError::NoIntersection`] when the polygons miss the grid.
#[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub fn clip_to_polygons<P: Progress + ?Sized>(
    raster: &Raster,
    shapes: &[Shape],
    selection: Selection,
    progress: &mut P,
) -> Result<Raster, RasterizeError> {
    if shapes.is_empty() {
        return Err(RasterizeError::NoPolygons);
    }
    let system = raster.system();
    let extent = selected_indices(shapes, selection)
        .into_iter()
        .filter_map(|i| shapes[i].extent())
        .reduce(crate::types::Extent::union)
        .ok_or(RasterizeError::NoIntersection)?;

    let x0 = system.nearest_column(extent.x_min).max(0);
    let x1 = system.nearest_column(extent.x_max).min(system.nx as isize - 1);
    let y0 = system.nearest_row(extent.y_min).max(0);
    let y1 = system.nearest_row(extent.y_max).min(system.ny as isize - 1);
    if x0 > x1 || y0 > y1 {
        return Err(RasterizeError::NoIntersection);
    }
    let (x0, y0) = (x0.unsigned_abs(), y0.unsigned_abs());

    let clipped = GridSystem::new(
        x1.unsigned_abs() - x0 + 1,
        y1.unsigned_abs() - y0 + 1,
        system.cellsize,
        system.cellsize.mul_add(x0 as f64, system.x_min),
        system.cellsize.mul_add(y0 as f64, system.y_min),
    )
    .map_err(|_| RasterizeError::NoIntersection)?;

    let mask = rasterize_polygons(shapes, &clipped, selection, progress)?;
    let nodata = raster.nodata();
    let out = Raster::from_fn(clipped, nodata, |x, y| {
        if mask.get(x, y).is_some() {
            raster.get(x + x0, y + y0)
        } else {
            nodata
        }
    });

    log::debug!(
        "clipped {}x{} grid to {}x{} ({} data cells)",
        system.nx,
        system.ny,
        clipped.nx,
        clipped.ny,
        out.data_count(),
    );
    Ok(out)
}
