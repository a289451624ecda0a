//! Raster to polygon vectorization.
//!
//! Stages run in order: labelling ([`crate::classify`]), edge marking
//! ([`crate::lattice`]), ring tracing ([`crate::walk`]) and shape
//! assembly ([`crate::rings`]). Each stage is exposed on its own so
//! [`crate::diagnostics`] can time them individually.

use crate::classify::{ClassRecord, Labelled, LookupTable, label_regions};
use crate::grid::{Raster, RegionGrid};
use crate::lattice::EdgeLattice;
use crate::progress::{Progress, Tracked};
use crate::rings::{SplitStats, assemble_shapes};
use crate::types::{Shape, VectorizeConfig, VectorizeError};
use crate::walk::{TraceStats, TracedRing, trace_rings};

/// Shapes plus the counters gathered while producing them.
#[derive(Debug, Clone)]
pub struct Vectorized {
    pub shapes: Vec<Shape>,
    pub trace: TraceStats,
    pub split: SplitStats,
    /// Tracing stopped early; `shapes` covers only the rings found.
    pub cancelled: bool,
}

/// Labelling stage.
///
/// # Errors
///
/// See [`label_regions`]. A cancelled labelling is reported as
/// [`VectorizeError::NoShapes`], since no boundary has been traced yet.
pub fn label_stage<P: Progress + ?Sized>(
    raster: &Raster,
    config: &VectorizeConfig,
    lookup: Option<&LookupTable>,
    progress: &mut P,
) -> Result<Labelled, VectorizeError> {
    let labelled = label_regions(raster, &config.class_selection, lookup, progress)?;
    if labelled.cancelled {
        log::warn!("vectorization cancelled during labelling");
        return Err(VectorizeError::NoShapes);
    }
    Ok(labelled)
}

/// Ring tracing stage; returns the rings and whether it was cancelled.
pub fn trace_stage<P: Progress + ?Sized>(
    lattice: &EdgeLattice,
    config: &VectorizeConfig,
    progress: &mut P,
) -> (Vec<TracedRing>, TraceStats, bool) {
    let mut tracked = Tracked::new(progress);
    let (rings, stats) = trace_rings(lattice, config.keep_all_vertices, &mut tracked);
    (rings, stats, tracked.cancelled())
}

/// Trace and assemble shapes for an already labelled grid.
///
/// `classes` supplies the attributes of each region id; rings of ids
/// without a record are skipped.
///
/// # Errors
///
/// Returns [`VectorizeError::NoEdges`] when the grid holds no labelled
/// cell and [`VectorizeError::NoShapes`] when no ring survives.
pub fn vectorize_regions<P: Progress + ?Sized>(
    grid: &RegionGrid,
    classes: &[ClassRecord],
    config: &VectorizeConfig,
    progress: &mut P,
) -> Result<Vectorized, VectorizeError> {
    let lattice = EdgeLattice::build(grid, config.parallel)?;
    let (rings, trace, cancelled) = trace_stage(&lattice, config, progress);
    let (shapes, split) = assemble_shapes(classes, rings, config.output_mode);
    finish(shapes, trace, split, cancelled)
}

/// Check the assembled output and log the run summary.
pub(crate) fn finish(
    shapes: Vec<Shape>,
    trace: TraceStats,
    split: SplitStats,
    cancelled: bool,
) -> Result<Vectorized, VectorizeError> {
    if shapes.is_empty() {
        return Err(VectorizeError::NoShapes);
    }
    log::info!(
        "vectorized {} shapes from {} rings ({} abandoned, {} degenerate, {} orphan holes)",
        shapes.len(),
        trace.rings,
        trace.abandoned,
        trace.degenerate,
        split.orphan_holes,
    );
    Ok(Vectorized {
        shapes,
        trace,
        split,
        cancelled,
    })
}

/// Vectorize the classes of `raster` into polygon shapes.
///
/// Each shape carries the class value, its id and a display name taken
/// from `lookup` when given. On cancellation the shapes traced so far
/// are returned.
///
/// # Errors
///
/// Returns [`VectorizeError::NoClasses`] for a raster without data,
/// [`VectorizeError::NoEdges`] when no selected cell exists, and
/// [`VectorizeError::NoShapes`] when nothing could be traced.
pub fn classes_to_polygons<P: Progress + ?Sized>(
    raster: &Raster,
    config: &VectorizeConfig,
    lookup: Option<&LookupTable>,
    progress: &mut P,
) -> Result<Vec<Shape>, VectorizeError> {
    let labelled = label_stage(raster, config, lookup, progress)?;
    vectorize_regions(&labelled.grid, &labelled.classes, config, progress).map(|v| v.shapes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::GridSystem;
    use crate::progress::Unbounded;
    use crate::types::{ClassSelection, OutputMode};

    const NODATA: f64 = -1.0;

    /// Raster from rows listed north to south.
    fn raster(rows: &[&[f64]]) -> Raster {
        let ny = rows.len();
        let nx = rows[0].len();
        let system = GridSystem::new(nx, ny, 1.0, 0.5, 0.5).unwrap();
        Raster::from_fn(system, NODATA, |x, y| rows[ny - 1 - y][x])
    }

    #[test]
    fn two_values_give_two_shapes() {
        let r = raster(&[&[1.0, 1.0, 2.0], &[1.0, 2.0, 2.0]]);
        let shapes =
            classes_to_polygons(&r, &VectorizeConfig::default(), None, &mut Unbounded).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].value, 1.0);
        assert_eq!(shapes[1].value, 2.0);
        assert!((shapes[0].area() - 3.0).abs() < 1e-12);
        assert!((shapes[1].area() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn separate_patches_of_one_value_share_a_shape() {
        let r = raster(&[&[5.0, NODATA, 5.0]]);
        let shapes =
            classes_to_polygons(&r, &VectorizeConfig::default(), None, &mut Unbounded).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].parts.len(), 2);
    }

    #[test]
    fn split_mode_separates_islands() {
        let r = raster(&[&[5.0, NODATA, 5.0]]);
        let config = VectorizeConfig {
            output_mode: OutputMode::SplitIslands,
            ..VectorizeConfig::default()
        };
        let shapes = classes_to_polygons(&r, &config, None, &mut Unbounded).unwrap();
        assert_eq!(shapes.len(), 2);
        assert!(shapes.iter().all(|s| s.parts.len() == 1 && s.id == 0));
    }

    #[test]
    fn single_class_without_cells_has_no_edges() {
        let r = raster(&[&[1.0, 2.0]]);
        let config = VectorizeConfig {
            class_selection: ClassSelection::Single(3.0),
            ..VectorizeConfig::default()
        };
        assert_eq!(
            classes_to_polygons(&r, &config, None, &mut Unbounded),
            Err(VectorizeError::NoEdges),
        );
    }

    #[test]
    fn cancelled_tracing_returns_partial_shapes() {
        let r = raster(&[&[1.0], &[2.0], &[3.0]]);
        // Tracing reports once per row; let the first two rows through.
        let mut calls = 0;
        let mut budget = |_: usize, _: usize| {
            calls += 1;
            calls <= 2
        };
        let labelled = label_stage(&r, &VectorizeConfig::default(), None, &mut Unbounded).unwrap();
        let config = VectorizeConfig::default();
        let result =
            vectorize_regions(&labelled.grid, &labelled.classes, &config, &mut budget).unwrap();
        assert!(result.cancelled);
        assert!(!result.shapes.is_empty());
        assert!(result.shapes.len() < 3);
    }

    #[test]
    fn cancelled_labelling_has_no_shapes() {
        let r = raster(&[&[1.0, 2.0]]);
        let mut stop = |_: usize, _: usize| false;
        assert_eq!(
            classes_to_polygons(&r, &VectorizeConfig::default(), None, &mut stop),
            Err(VectorizeError::NoShapes),
        );
    }
}
