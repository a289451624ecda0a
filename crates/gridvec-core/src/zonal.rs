//! Per-polygon statistics of raster values.
//!
//! Polygons are burnt into an index grid with
//! [`rasterize_polygons`](crate::rasterize::rasterize_polygons), so a
//! cell counts toward a polygon when its centre lies inside it (the last
//! polygon wins where they overlap). NODATA cells are ignored.

use serde::{Deserialize, Serialize};

use crate::grid::Raster;
use crate::progress::{Progress, Tracked};
use crate::rasterize::{RasterizeError, Selection, rasterize_polygons};
use crate::types::Shape;

/// Which statistics to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct StatisticFields {
    pub count: bool,
    pub min: bool,
    pub max: bool,
    pub range: bool,
    pub sum: bool,
    pub mean: bool,
    pub variance: bool,
    pub stddev: bool,
}

impl StatisticFields {
    /// Every statistic.
    pub const ALL: Self = Self {
        count: true,
        min: true,
        max: true,
        range: true,
        sum: true,
        mean: true,
        variance: true,
        stddev: true,
    };

    /// No statistic.
    pub const NONE: Self = Self {
        count: false,
        min: false,
        max: false,
        range: false,
        sum: false,
        mean: false,
        variance: false,
        stddev: false,
    };

    #[must_use]
    pub const fn any(&self) -> bool {
        self.count
            || self.min
            || self.max
            || self.range
            || self.sum
            || self.mean
            || self.variance
            || self.stddev
    }
}

impl Default for StatisticFields {
    fn default() -> Self {
        Self::ALL
    }
}

/// Configuration for [`zonal_statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonalConfig {
    pub fields: StatisticFields,

    /// Report quantiles at every multiple of this many percent below 100.
    /// Zero disables quantiles.
    pub quantile_step: u32,
}

impl ZonalConfig {
    pub const DEFAULT_QUANTILE_STEP: u32 = 0;
}

impl Default for ZonalConfig {
    fn default() -> Self {
        Self {
            fields: StatisticFields::default(),
            quantile_step: Self::DEFAULT_QUANTILE_STEP,
        }
    }
}

/// Errors from zonal statistics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ZonalError {
    #[error("no polygons in input layer")]
    NoPolygons,

    #[error("no output parameter in selection")]
    NoFieldsSelected,

    #[error("no spatial intersection between grid and polygon layer")]
    NoIntersection,
}

impl From<RasterizeError> for ZonalError {
    fn from(e: RasterizeError) -> Self {
        match e {
            RasterizeError::NoPolygons => Self::NoPolygons,
            RasterizeError::NoIntersection => Self::NoIntersection,
        }
    }
}

/// Value at one percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantile {
    pub percent: u32,
    pub value: f64,
}

/// Statistics of one polygon. Fields not requested are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonStatistics {
    pub count: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub range: Option<f64>,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub stddev: Option<f64>,
    pub quantiles: Vec<Quantile>,
}

impl PolygonStatistics {
    /// Summarise `values`, which must not be empty. Sorts in place.
    #[allow(clippy::cast_precision_loss)]
    fn compute(values: &mut [f64], config: &ZonalConfig) -> Self {
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let min = values[0];
        let max = values[n - 1];
        let sum: f64 = values.iter().sum();
        let mean = sum / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        let quantiles = if config.quantile_step == 0 {
            Vec::new()
        } else {
            (1..)
                .map(|k| k * config.quantile_step)
                .take_while(|q| *q < 100)
                .map(|percent| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let i = ((n - 1) as f64 * f64::from(percent) / 100.0).round() as usize;
                    Quantile {
                        percent,
                        value: values[i.min(n - 1)],
                    }
                })
                .collect()
        };

        let f = &config.fields;
        Self {
            count: f.count.then_some(n),
            min: f.min.then_some(min),
            max: f.max.then_some(max),
            range: f.range.then_some(max - min),
            sum: f.sum.then_some(sum),
            mean: f.mean.then_some(mean),
            variance: f.variance.then_some(variance),
            stddev: f.stddev.then(|| variance.sqrt()),
            quantiles,
        }
    }
}

/// Statistics of the raster values under each polygon.
///
/// The result has one entry per input polygon; polygons that cover no
/// data cell, or were left out by `selection`, get `None`. On
/// cancellation the polygons not yet summarised are `None` as well.
///
/// # Errors
///
/// Returns [`ZonalError::NoFieldsSelected`] when neither a statistic nor
/// quantiles are requested, [`ZonalError::NoPolygons`] for an empty set
/// and [`ZonalError::NoIntersection`] when the polygons miss the grid.
pub fn zonal_statistics<P: Progress + ?Sized>(
    raster: &Raster,
    shapes: &[Shape],
    config: &ZonalConfig,
    selection: Selection,
    progress: &mut P,
) -> Result<Vec<Option<PolygonStatistics>>, ZonalError> {
    if !config.fields.any() && !(1..100).contains(&config.quantile_step) {
        return Err(ZonalError::NoFieldsSelected);
    }

    let mut tracked = Tracked::new(progress);
    let index = rasterize_polygons(shapes, raster.system(), selection, &mut tracked)?;
    if tracked.cancelled() {
        return Ok(vec![None; shapes.len()]);
    }

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); shapes.len()];
    for (cell, id) in raster.values().iter().zip(index.cells()) {
        if let Some(id) = id
            && !raster.is_nodata_value(*cell)
            && let Some(bucket) = values.get_mut(*id as usize)
        {
            bucket.push(*cell);
        }
    }

    let mut stats = Vec::with_capacity(shapes.len());
    for (i, bucket) in values.iter_mut().enumerate() {
        if !tracked.update(i, shapes.len()) {
            log::warn!("zonal statistics cancelled after {i} of {} polygons", shapes.len());
            break;
        }
        stats.push((!bucket.is_empty()).then(|| PolygonStatistics::compute(bucket, config)));
    }
    stats.resize(shapes.len(), None);

    log::debug!(
        "zonal statistics for {} of {} polygons",
        stats.iter().filter(|s| s.is_some()).count(),
        shapes.len(),
    );
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::GridSystem;
    use crate::progress::Unbounded;
    use crate::types::{Point, Ring};

    const NODATA: f64 = -9999.0;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Ring {
        Ring::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// One row holding 1, 2, ..., nx.
    #[allow(clippy::cast_precision_loss)]
    fn row(nx: usize) -> Raster {
        let system = GridSystem::new(nx, 1, 1.0, 0.5, 0.5).unwrap();
        Raster::from_fn(system, NODATA, |x, _| (x + 1) as f64)
    }

    #[test]
    fn statistics_of_a_block() {
        let r = row(4);
        let shapes = vec![Shape::new(0, 0.0, "a").with_part(rect(0.0, 0.0, 4.0, 1.0))];
        let config = ZonalConfig::default();
        let stats = zonal_statistics(&r, &shapes, &config, Selection::All, &mut Unbounded).unwrap();
        let s = stats[0].as_ref().unwrap();
        assert_eq!(s.count, Some(4));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.max, Some(4.0));
        assert_eq!(s.range, Some(3.0));
        assert_eq!(s.sum, Some(10.0));
        assert_eq!(s.mean, Some(2.5));
        assert!((s.variance.unwrap() - 1.25).abs() < 1e-12);
        assert!((s.stddev.unwrap() - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(s.quantiles.is_empty());
    }

    #[test]
    fn quantiles_every_step() {
        let r = row(5);
        let shapes = vec![Shape::new(0, 0.0, "a").with_part(rect(0.0, 0.0, 5.0, 1.0))];
        let config = ZonalConfig {
            fields: StatisticFields::NONE,
            quantile_step: 25,
        };
        let stats = zonal_statistics(&r, &shapes, &config, Selection::All, &mut Unbounded).unwrap();
        let s = stats[0].as_ref().unwrap();
        assert_eq!(s.count, None);
        let q: Vec<(u32, f64)> = s.quantiles.iter().map(|q| (q.percent, q.value)).collect();
        assert_eq!(q, vec![(25, 2.0), (50, 3.0), (75, 4.0)]);
    }

    #[test]
    fn nodata_cells_and_empty_polygons() {
        let mut r = row(4);
        r.set_nodata(1, 0);
        let shapes = vec![
            Shape::new(0, 0.0, "a").with_part(rect(0.0, 0.0, 2.0, 1.0)),
            Shape::new(1, 0.0, "b").with_part(rect(1.0, 0.0, 2.0, 1.0)),
            Shape::new(2, 0.0, "c").with_part(rect(2.0, 0.0, 4.0, 1.0)),
        ];
        let config = ZonalConfig::default();
        let stats = zonal_statistics(&r, &shapes, &config, Selection::All, &mut Unbounded).unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].as_ref().unwrap().count, Some(1));
        // "b" owns only the NODATA cell.
        assert!(stats[1].is_none());
        assert_eq!(stats[2].as_ref().unwrap().sum, Some(7.0));
    }

    #[test]
    fn nothing_selected_is_an_error() {
        let config = ZonalConfig {
            fields: StatisticFields::NONE,
            quantile_step: 0,
        };
        let shapes = vec![Shape::new(0, 0.0, "a").with_part(rect(0.0, 0.0, 1.0, 1.0))];
        assert_eq!(
            zonal_statistics(&row(2), &shapes, &config, Selection::All, &mut Unbounded),
            Err(ZonalError::NoFieldsSelected),
        );
    }

    #[test]
    fn rasterization_errors_carry_over() {
        let config = ZonalConfig::default();
        assert_eq!(
            zonal_statistics(&row(2), &[], &config, Selection::All, &mut Unbounded),
            Err(ZonalError::NoPolygons),
        );
        let far = vec![Shape::new(0, 0.0, "a").with_part(rect(50.0, 50.0, 51.0, 51.0))];
        assert_eq!(
            zonal_statistics(&row(2), &far, &config, Selection::All, &mut Unbounded),
            Err(ZonalError::NoIntersection),
        );
    }
}
