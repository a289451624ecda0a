//! Contour lines (isolines) from a raster surface.
//!
//! For each level `z` every cell is flagged: cells below `z` get `-1`,
//! NODATA cells `0`, and cells at or above `z` the number of their
//! orthogonal data neighbours that lie below `z`. Each such neighbour
//! pair is one crossing. Tracing starts at a cell with crossings left,
//! emits a vertex interpolated between the two cell centres, consumes
//! the crossing and moves on counter-clockwise around the cells above
//! the level.
//!
//! Lines touching the grid border are traced first so they start and
//! end at the border rather than somewhere in the middle.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::grid::Raster;
use crate::progress::Progress;
use crate::types::{ContourLine, Point, Polyline};

/// Upper bound on the number of levels an interval definition may expand to.
pub const MAX_LEVELS: usize = 100_000;

/// Which contour values to trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ContourLevels {
    /// Ten-ish levels at a round interval covering the data range.
    #[default]
    Auto,
    /// One level.
    Single(f64),
    /// `min, min + step, ...` up to and including `max`.
    Equal { min: f64, max: f64, step: f64 },
    /// Explicit values.
    List(Vec<f64>),
}

/// Round to one significant figure.
fn round_to_one_figure(v: f64) -> f64 {
    if v == 0.0 || !v.is_finite() {
        return 0.0;
    }
    let magnitude = 10f64.powf(v.abs().log10().floor());
    (v / magnitude).round() * magnitude
}

impl ContourLevels {
    /// Equal intervals of a round step covering `[min, max]`, roughly ten
    /// levels. Flat ranges collapse to a single level at `min`.
    #[must_use]
    pub fn for_range(min: f64, max: f64) -> Self {
        let step = round_to_one_figure((max - min) / 10.0);
        if step > 0.0 {
            Self::Equal {
                min: step * (min / step).floor(),
                max: step * (max / step).ceil(),
                step,
            }
        } else {
            Self::Single(min)
        }
    }

    /// Expand into sorted values within `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidConfig`] when equal intervals would
    /// expand to more than [`MAX_LEVELS`] values.
    #[allow(clippy::cast_precision_loss)]
    pub fn resolve(&self, min: f64, max: f64) -> Result<Vec<f64>, ContourError> {
        let in_range = |v: &f64| (min..=max).contains(v);
        let mut values: Vec<f64> = match self {
            Self::Auto => return Self::for_range(min, max).resolve(min, max),
            Self::Single(v) => std::iter::once(*v).filter(in_range).collect(),
            Self::Equal {
                min: lo,
                max: hi,
                step,
            } => {
                if !(*step > 0.0) {
                    std::iter::once(*lo).filter(in_range).collect()
                } else {
                    let span = (hi - lo) / step;
                    if !span.is_finite() || span > MAX_LEVELS as f64 {
                        return Err(ContourError::InvalidConfig(format!(
                            "interval {step} over [{lo}, {hi}] yields too many levels",
                        )));
                    }
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let n = span.floor().max(0.0) as usize;
                    (0..=n)
                        .map(|i| (i as f64).mul_add(*step, *lo))
                        .filter(|v| *v <= *hi && in_range(v))
                        .collect()
                }
            }
            Self::List(list) => list.iter().copied().filter(in_range).collect(),
        };
        values.sort_by(f64::total_cmp);
        Ok(values)
    }
}

/// Configuration for [`grid_to_contours`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourConfig {
    pub levels: ContourLevels,

    /// Parts whose length is at most this many map units are dropped.
    pub min_length: f64,

    /// Emit every line part as its own record.
    pub split_parts: bool,

    /// Trace levels concurrently on the rayon pool. Progress is not
    /// reported in this mode.
    pub parallel: bool,
}

impl ContourConfig {
    pub const DEFAULT_MIN_LENGTH: f64 = 0.0;
    pub const DEFAULT_SPLIT_PARTS: bool = true;
    pub const DEFAULT_PARALLEL: bool = false;
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            levels: ContourLevels::default(),
            min_length: Self::DEFAULT_MIN_LENGTH,
            split_parts: Self::DEFAULT_SPLIT_PARTS,
            parallel: Self::DEFAULT_PARALLEL,
        }
    }
}

/// Errors from contour extraction.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ContourError {
    #[error("requested contour values are out of range")]
    NoLevels,

    #[error("invalid contour configuration: {0}")]
    InvalidConfig(String),

    #[error("no contour lines were produced")]
    NoContours,
}

/// Crossing bookkeeping for one level.
struct LevelTracer<'a> {
    raster: &'a Raster,
    z: f64,
    flags: Vec<i32>,
}

impl<'a> LevelTracer<'a> {
    #[allow(clippy::cast_possible_wrap)]
    fn new(raster: &'a Raster, z: f64) -> Self {
        let system = raster.system();
        let mut flags = Vec::with_capacity(system.cell_count());
        for y in 0..system.ny {
            for x in 0..system.nx {
                let flag = match raster.value(x, y) {
                    None => 0,
                    Some(v) if v < z => -1,
                    Some(_) => {
                        let below = Direction::SIDES
                            .iter()
                            .filter(|side| {
                                let (ix, iy) = side.step(x as isize, y as isize);
                                raster.value_checked(ix, iy).is_some_and(|v| v < z)
                            })
                            .count();
                        i32::try_from(below).unwrap_or(0)
                    }
                };
                flags.push(flag);
            }
        }
        Self { raster, z, flags }
    }

    /// Flag at `(x, y)`, `None` outside the grid.
    fn flag(&self, x: isize, y: isize) -> Option<i32> {
        let system = self.raster.system();
        system
            .is_in_grid(x, y)
            .then(|| self.flags[system.index(x.unsigned_abs(), y.unsigned_abs())])
    }

    fn decrement(&mut self, x: isize, y: isize) {
        let system = self.raster.system();
        let i = system.index(x.unsigned_abs(), y.unsigned_abs());
        self.flags[i] -= 1;
    }

    /// Whether any of the eight neighbours lies outside the grid.
    #[allow(clippy::cast_possible_wrap)]
    fn is_border(&self, x: isize, y: isize) -> bool {
        let system = self.raster.system();
        x == 0 || y == 0 || x == system.nx as isize - 1 || y == system.ny as isize - 1
    }

    /// First crossing of `(x, y)`, scanning N, W, S, E. Border starts
    /// additionally require the next direction clockwise to leave the grid.
    fn first_direction(&self, x: isize, y: isize, border: bool) -> Option<Direction> {
        if self.flag(x, y)? <= 0 {
            return None;
        }
        [Direction::N, Direction::W, Direction::S, Direction::E]
            .into_iter()
            .find(|dir| {
                let (ix, iy) = dir.step(x, y);
                self.flag(ix, iy).is_some_and(|f| f < 0) && {
                    let (jx, jy) = dir.right().step(x, y);
                    !border || self.flag(jx, jy).is_none()
                }
            })
    }

    /// Next position and crossing direction along the line.
    fn next(&self, x: isize, y: isize, dir: Direction) -> Option<(isize, isize, Direction)> {
        let here = self.flag(x, y).unwrap_or(0);
        let (ox, oy) = dir.rotate(6).step(x, y);
        let (dx, dy) = dir.rotate(7).step(x, y);
        let diagonal = self.flag(dx, dy);

        match self.flag(ox, oy) {
            Some(o) if o < 0 && here > 0 => return Some((x, y, dir.rotate(6))),
            Some(o) if o > 0 && diagonal.is_some_and(|d| d < 0) => return Some((ox, oy, dir)),
            _ => {}
        }
        diagonal
            .is_some_and(|d| d > 0)
            .then_some((dx, dy, dir.rotate(2)))
    }

    /// Interpolate the crossing between `(x, y)` and its neighbour along
    /// `dir`, consuming one crossing of `(x, y)`.
    #[allow(clippy::cast_precision_loss)]
    fn crossing(&mut self, x: isize, y: isize, dir: Direction) -> Option<Point> {
        if self.flag(x, y)? <= 0 {
            return None;
        }
        let (x1, y1) = dir.step(x, y);
        self.flag(x1, y1)?;
        let z0 = self.raster.get(x.unsigned_abs(), y.unsigned_abs());
        let z1 = self.raster.get(x1.unsigned_abs(), y1.unsigned_abs());
        let d = (z0 - self.z) / (z0 - z1);
        let system = self.raster.system();
        let (fx, fy) = (x as f64, y as f64);
        let p = Point::new(
            system.cellsize.mul_add(d.mul_add(x1 as f64 - fx, fx), system.x_min),
            system.cellsize.mul_add(d.mul_add(y1 as f64 - fy, fy), system.y_min),
        );
        self.decrement(x, y);
        Some(p)
    }

    /// Trace one line from `(x, y)`; `false` when the cell has no
    /// crossing to start from.
    fn trace_from(&mut self, x: isize, y: isize, border: bool, parts: &mut Vec<Polyline>) -> bool {
        let Some(mut dir) = self.first_direction(x, y, border) else {
            return false;
        };
        let (mut cx, mut cy) = (x, y);
        let mut line = Polyline::new(Vec::new());
        loop {
            if let Some(p) = self.crossing(cx, cy, dir) {
                line.push(p);
            }
            match self.next(cx, cy, dir) {
                Some((nx, ny, nd)) => (cx, cy, dir) = (nx, ny, nd),
                None => break,
            }
        }

        if line.len() >= 2 {
            if let (false, Some(&first), Some(&last)) = (border, line.first(), line.last())
                && first.distance(last) < std::f64::consts::SQRT_2 * self.raster.system().cellsize
            {
                line.push(first);
            }
            parts.push(line);
        }
        true
    }

    #[allow(clippy::cast_possible_wrap)]
    fn trace(mut self, min_length: f64) -> Vec<Polyline> {
        let system = *self.raster.system();
        let mut parts = Vec::new();

        for y in 0..system.ny as isize {
            for x in 0..system.nx as isize {
                if self.is_border(x, y) {
                    self.trace_from(x, y, true, &mut parts);
                }
            }
        }
        for y in 0..system.ny as isize {
            for x in 0..system.nx as isize {
                while self.trace_from(x, y, false, &mut parts) {}
            }
        }

        parts.retain(|part| part.length() > min_length);
        parts
    }
}

/// Trace contour lines of `raster` for the configured levels.
///
/// Returns one [`ContourLine`] per level that produced lines (`id` is one
/// plus the level's position in the sorted level list), or one record per
/// part with `split_parts`.
///
/// # Errors
///
/// Returns [`ContourError::NoLevels`] when no level lies within the data
/// range, [`ContourError::InvalidConfig`] for a negative minimum length or
/// an interval that expands too far, and [`ContourError::NoContours`]
/// when nothing was traced.
pub fn grid_to_contours<P: Progress + ?Sized>(
    raster: &Raster,
    config: &ContourConfig,
    progress: &mut P,
) -> Result<Vec<ContourLine>, ContourError> {
    if !(config.min_length >= 0.0) {
        return Err(ContourError::InvalidConfig(format!(
            "minimum length must be non-negative, got {}",
            config.min_length,
        )));
    }
    let (min, max) = raster.min_max().ok_or(ContourError::NoLevels)?;
    let levels = config.levels.resolve(min, max)?;
    if levels.is_empty() {
        return Err(ContourError::NoLevels);
    }

    // Duplicate values keep their slot (and hence the ids of later levels)
    // but are traced only once.
    #[allow(clippy::float_cmp)]
    let jobs: Vec<(u32, f64)> = levels
        .iter()
        .enumerate()
        .filter(|&(i, z)| i == 0 || levels[i - 1] != *z)
        .filter_map(|(i, &z)| Some((u32::try_from(i + 1).ok()?, z)))
        .collect();

    let trace = |&(id, z): &(u32, f64)| ContourLine {
        id,
        value: z,
        parts: LevelTracer::new(raster, z).trace(config.min_length),
    };

    let lines: Vec<ContourLine> = if config.parallel {
        jobs.par_iter().map(trace).collect()
    } else {
        let mut lines = Vec::with_capacity(jobs.len());
        for (n, job) in jobs.iter().enumerate() {
            if !progress.update(n, jobs.len()) {
                log::warn!("contouring cancelled after {n} of {} levels", jobs.len());
                break;
            }
            lines.push(trace(job));
        }
        lines
    };

    let mut lines: Vec<ContourLine> = lines.into_iter().filter(|l| !l.parts.is_empty()).collect();
    if config.split_parts {
        lines = lines
            .into_iter()
            .flat_map(|line| {
                let (id, value) = (line.id, line.value);
                line.parts.into_iter().map(move |part| ContourLine {
                    id,
                    value,
                    parts: vec![part],
                })
            })
            .collect();
    }

    if lines.is_empty() {
        return Err(ContourError::NoContours);
    }
    log::info!(
        "traced {} contour records over {} levels",
        lines.len(),
        jobs.len(),
    );
    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::GridSystem;
    use crate::progress::Unbounded;

    const NODATA: f64 = -9999.0;

    fn raster(nx: usize, ny: usize, f: impl FnMut(usize, usize) -> f64) -> Raster {
        Raster::from_fn(GridSystem::new(nx, ny, 1.0, 0.5, 0.5).unwrap(), NODATA, f)
    }

    fn config(levels: ContourLevels) -> ContourConfig {
        ContourConfig {
            levels,
            split_parts: false,
            ..ContourConfig::default()
        }
    }

    #[test]
    fn round_to_one_figure_examples() {
        assert!((round_to_one_figure(37.5) - 40.0).abs() < 1e-9);
        assert!((round_to_one_figure(0.123) - 0.1).abs() < 1e-12);
        assert!(round_to_one_figure(0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn auto_levels_cover_the_range() {
        let levels = ContourLevels::for_range(3.0, 97.0);
        assert_eq!(
            levels,
            ContourLevels::Equal {
                min: 0.0,
                max: 99.0,
                step: 9.0,
            },
        );
        let values = levels.resolve(3.0, 97.0).unwrap();
        assert_eq!(values.len(), 10);
        assert!((values[0] - 9.0).abs() < 1e-9);
        assert!((values[9] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn equal_levels_are_filtered_to_data_range() {
        let levels = ContourLevels::Equal {
            min: 0.0,
            max: 10.0,
            step: 2.5,
        };
        assert_eq!(levels.resolve(1.0, 9.0).unwrap(), vec![2.5, 5.0, 7.5]);
    }

    #[test]
    fn list_levels_are_sorted() {
        let levels = ContourLevels::List(vec![5.0, -3.0, 2.0, 50.0]);
        assert_eq!(levels.resolve(0.0, 10.0).unwrap(), vec![2.0, 5.0]);
    }

    #[test]
    fn too_many_levels_is_invalid() {
        let levels = ContourLevels::Equal {
            min: 0.0,
            max: 1.0,
            step: 1e-9,
        };
        assert!(matches!(
            levels.resolve(0.0, 1.0),
            Err(ContourError::InvalidConfig(_)),
        ));
    }

    #[test]
    fn peak_gives_closed_counter_clockwise_ring() {
        let r = raster(5, 5, |x, y| if x == 2 && y == 2 { 10.0 } else { 0.0 });
        let lines =
            grid_to_contours(&r, &config(ContourLevels::Single(5.0)), &mut Unbounded).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 1);
        assert_eq!(lines[0].parts.len(), 1);

        let part = &lines[0].parts[0];
        assert_eq!(part.len(), 5);
        assert_eq!(part.first(), part.last());
        // Crossings are halfway between the peak and its neighbours.
        assert_eq!(part.points()[0], Point::new(2.5, 3.0));
        assert_eq!(part.points()[1], Point::new(2.0, 2.5));
        assert!((part.length() - 4.0 * 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn ramp_gives_open_line_from_border_to_border() {
        #[allow(clippy::cast_precision_loss)]
        let r = raster(4, 3, |x, _| x as f64);
        let lines =
            grid_to_contours(&r, &config(ContourLevels::Single(1.5)), &mut Unbounded).unwrap();
        assert_eq!(lines.len(), 1);
        let part = &lines[0].parts[0];
        assert_eq!(part.len(), 3);
        assert!(part.points().iter().all(|p| (p.x - 2.0).abs() < 1e-12));
        assert!((part.first().unwrap().y - 2.5).abs() < 1e-12);
        assert!((part.last().unwrap().y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn duplicate_levels_are_traced_once_but_keep_ids() {
        let r = raster(5, 5, |x, y| if x == 2 && y == 2 { 10.0 } else { 0.0 });
        let lines = grid_to_contours(
            &r,
            &config(ContourLevels::List(vec![5.0, 5.0, 8.0])),
            &mut Unbounded,
        )
        .unwrap();
        let ids: Vec<u32> = lines.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn split_parts_emits_one_record_per_part() {
        // Two separate peaks.
        let r = raster(7, 3, |x, y| if y == 1 && (x == 1 || x == 5) { 10.0 } else { 0.0 });
        let joined =
            grid_to_contours(&r, &config(ContourLevels::Single(5.0)), &mut Unbounded).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].parts.len(), 2);

        let split_config = ContourConfig {
            split_parts: true,
            ..config(ContourLevels::Single(5.0))
        };
        let split = grid_to_contours(&r, &split_config, &mut Unbounded).unwrap();
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(|l| l.parts.len() == 1 && l.id == 1));
    }

    #[test]
    fn min_length_drops_short_parts() {
        let r = raster(5, 5, |x, y| if x == 2 && y == 2 { 10.0 } else { 0.0 });
        let c = ContourConfig {
            min_length: 3.0,
            ..config(ContourLevels::Single(5.0))
        };
        assert_eq!(grid_to_contours(&r, &c, &mut Unbounded), Err(ContourError::NoContours));
    }

    #[test]
    fn out_of_range_level_is_an_error() {
        let r = raster(3, 3, |_, _| 1.0);
        assert_eq!(
            grid_to_contours(&r, &config(ContourLevels::Single(5.0)), &mut Unbounded),
            Err(ContourError::NoLevels),
        );
    }

    #[test]
    fn nodata_stops_lines() {
        let r = raster(5, 5, |x, y| match (x, y) {
            (2, 2) => 10.0,
            (2, 3) => NODATA,
            _ => 0.0,
        });
        let lines =
            grid_to_contours(&r, &config(ContourLevels::Single(5.0)), &mut Unbounded).unwrap();
        let part = &lines[0].parts[0];
        // Three crossings remain (W, S, E) and nothing crosses into NODATA.
        assert_eq!(part.points().iter().filter(|p| p.y > 2.9).count(), 0);
    }

    #[test]
    fn parallel_matches_sequential() {
        #[allow(clippy::cast_precision_loss)]
        let r = raster(6, 6, |x, y| (x * y) as f64);
        let sequential = ContourConfig {
            levels: ContourLevels::List(vec![2.5, 6.5, 12.5]),
            ..ContourConfig::default()
        };
        let parallel = ContourConfig {
            parallel: true,
            ..sequential.clone()
        };
        assert_eq!(
            grid_to_contours(&r, &sequential, &mut Unbounded).unwrap(),
            grid_to_contours(&r, &parallel, &mut Unbounded).unwrap(),
        );
    }
}
