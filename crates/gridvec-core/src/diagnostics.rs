//! Vectorization diagnostics: timing, counts, and other metrics for each
//! stage.
//!
//! [`classes_to_polygons_with_diagnostics`] runs the same stages as
//! [`classes_to_polygons`](crate::classes_to_polygons) and records a
//! [`StageDiagnostics`] for each of them.
//!
//! Timestamps come from an injected [`Clock`] so the library itself
//! never reads the system time.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::LookupTable;
use crate::grid::Raster;
use crate::lattice::EdgeLattice;
use crate::progress::Progress;
use crate::rings::assemble_shapes;
use crate::types::{OutputMode, Shape, VectorizeConfig, VectorizeError};
use crate::vectorize::{finish, label_stage, trace_stage};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single vectorization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizeDiagnostics {
    /// Stage 1: value to region id labelling.
    pub labeling: StageDiagnostics,
    /// Stage 2: edge lattice marking.
    pub edge_detection: StageDiagnostics,
    /// Stage 3: boundary walking.
    pub tracing: StageDiagnostics,
    /// Stage 4: grouping rings into shapes.
    pub split: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: VectorizeSummary,
    /// Tracing was cut short by the progress callback.
    pub cancelled: bool,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    Labeling {
        /// Cells in the source grid.
        cell_count: usize,
        /// Cells that received a region id.
        labelled_cells: usize,
        /// Class records created.
        class_count: usize,
    },
    EdgeDetection {
        lattice_width: usize,
        lattice_height: usize,
        /// Boundary sides marked.
        edge_count: usize,
        /// Rows were filled on the rayon pool.
        parallel: bool,
    },
    Tracing {
        rings: usize,
        abandoned: usize,
        degenerate: usize,
        sides_traced: usize,
    },
    Split {
        mode: OutputMode,
        shape_count: usize,
        outer_rings: usize,
        holes: usize,
        orphan_holes: usize,
    },
}

/// High-level summary counts for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizeSummary {
    pub grid_width: usize,
    pub grid_height: usize,
    pub class_count: usize,
    pub ring_count: usize,
    pub shape_count: usize,
    /// Vertices across all output shapes.
    pub point_count: usize,
}

impl VectorizeDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Vectorization Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Grid: {}x{} ({} classes)",
            self.summary.grid_width, self.summary.grid_height, self.summary.class_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms{}",
            duration_ms(self.total_duration),
            if self.cancelled { " (cancelled)" } else { "" },
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Labeling", &self.labeling),
            ("Edge Detection", &self.edge_detection),
            ("Tracing", &self.tracing),
            ("Split", &self.split),
        ];
        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Rings: {}  |  Shapes: {}  |  Points: {}",
            self.summary.ring_count, self.summary.shape_count, self.summary.point_count,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Labeling {
            cell_count,
            labelled_cells,
            class_count,
        } => format!("{labelled_cells}/{cell_count} cells, {class_count} classes"),
        StageMetrics::EdgeDetection {
            lattice_width,
            lattice_height,
            edge_count,
            parallel,
        } => {
            let mode = if *parallel { " (parallel)" } else { "" };
            format!("{lattice_width}x{lattice_height} lattice, {edge_count} edges{mode}")
        }
        StageMetrics::Tracing {
            rings,
            abandoned,
            degenerate,
            sides_traced,
        } => format!(
            "{rings} rings, {sides_traced} sides (abandoned={abandoned} degenerate={degenerate})",
        ),
        StageMetrics::Split {
            mode,
            shape_count,
            outer_rings,
            holes,
            orphan_holes,
        } => match mode {
            OutputMode::Multipart => format!("multipart, {shape_count} shapes"),
            OutputMode::SplitIslands => format!(
                "islands, {shape_count} shapes \
                 ({outer_rings} outer, {holes} holes, {orphan_holes} orphaned)",
            ),
        },
    }
}

/// Run [`classes_to_polygons`](crate::classes_to_polygons) and collect
/// per-stage diagnostics.
///
/// # Errors
///
/// Same as [`classes_to_polygons`](crate::classes_to_polygons).
pub fn classes_to_polygons_with_diagnostics<C: Clock, P: Progress + ?Sized>(
    raster: &Raster,
    config: &VectorizeConfig,
    lookup: Option<&LookupTable>,
    clock: &C,
    progress: &mut P,
) -> Result<(Vec<Shape>, VectorizeDiagnostics), VectorizeError> {
    let run_start = clock.now();

    let start = clock.now();
    let labelled = label_stage(raster, config, lookup, progress)?;
    let labeling = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Labeling {
            cell_count: raster.system().cell_count(),
            labelled_cells: labelled.grid.labelled_count(),
            class_count: labelled.classes.len(),
        },
    };

    let start = clock.now();
    let lattice = EdgeLattice::build(&labelled.grid, config.parallel)?;
    let edge_detection = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::EdgeDetection {
            lattice_width: lattice.width(),
            lattice_height: lattice.height(),
            edge_count: lattice.edge_count(),
            parallel: config.parallel,
        },
    };

    let start = clock.now();
    let (rings, trace, cancelled) = trace_stage(&lattice, config, progress);
    let tracing = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Tracing {
            rings: trace.rings,
            abandoned: trace.abandoned,
            degenerate: trace.degenerate,
            sides_traced: trace.sides_traced,
        },
    };

    let start = clock.now();
    let (shapes, split_stats) = assemble_shapes(&labelled.classes, rings, config.output_mode);
    let split = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Split {
            mode: config.output_mode,
            shape_count: shapes.len(),
            outer_rings: split_stats.outer_rings,
            holes: split_stats.holes,
            orphan_holes: split_stats.orphan_holes,
        },
    };

    let vectorized = finish(shapes, trace, split_stats, cancelled)?;
    let system = raster.system();
    let diagnostics = VectorizeDiagnostics {
        labeling,
        edge_detection,
        tracing,
        split,
        total_duration: clock.elapsed(&run_start),
        summary: VectorizeSummary {
            grid_width: system.nx,
            grid_height: system.ny,
            class_count: labelled.classes.len(),
            ring_count: trace.rings,
            shape_count: vectorized.shapes.len(),
            point_count: vectorized.shapes.iter().map(Shape::point_count).sum(),
        },
        cancelled,
    };

    Ok((vectorized.shapes, diagnostics))
}
