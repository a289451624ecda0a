//! Region labelling: raster values to region ids.
//!
//! In [`ClassSelection::All`] mode every distinct value becomes one
//! region, independent of spatial adjacency: two separate patches of the
//! same value share an id and end up as parts of the same shape.

use serde::{Deserialize, Serialize};

use crate::grid::{Raster, RegionGrid};
use crate::progress::Progress;
use crate::types::{ClassSelection, VectorizeError};

/// A named value range for display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub name: String,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
}

/// Value-range lookup table; the first matching entry wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LookupTable {
    pub entries: Vec<LookupEntry>,
}

impl LookupTable {
    /// Name of the first entry whose range contains `value`.
    #[must_use]
    pub fn name_for(&self, value: f64) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| (e.min..=e.max).contains(&value))
            .map(|e| e.name.as_str())
    }
}

/// Format a value with at most two decimals, trimming trailing zeros.
#[must_use]
pub fn format_value(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Display name for `value`: lookup table first, formatted value otherwise.
#[must_use]
pub fn class_name(value: f64, lookup: Option<&LookupTable>) -> String {
    lookup
        .and_then(|table| table.name_for(value))
        .map_or_else(|| format_value(value), str::to_string)
}

/// Attributes of one region id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: u32,
    pub value: f64,
    pub name: String,
}

/// Output of [`label_regions`].
#[derive(Debug, Clone)]
pub struct Labelled {
    pub grid: RegionGrid,
    /// Class records in id order.
    pub classes: Vec<ClassRecord>,
    /// Labelling stopped early at the caller's request.
    pub cancelled: bool,
}

/// Assign region ids to the cells of `raster`.
///
/// # Errors
///
/// Returns [`VectorizeError::NoClasses`] when no class record was
/// produced (all cells NODATA in [`ClassSelection::All`] mode). A
/// cancelled run is not an error and may return no classes. Returns
/// [`VectorizeError::InvalidConfig`] when the single class value is NaN.
#[allow(clippy::float_cmp)]
pub fn label_regions<P: Progress + ?Sized>(
    raster: &Raster,
    selection: &ClassSelection,
    lookup: Option<&LookupTable>,
    progress: &mut P,
) -> Result<Labelled, VectorizeError> {
    let system = *raster.system();
    let mut grid = RegionGrid::new(system);
    let mut classes = Vec::new();
    let mut cancelled = false;

    match *selection {
        ClassSelection::Single(target) => {
            if target.is_nan() {
                return Err(VectorizeError::InvalidConfig(
                    "single class value must not be NaN".to_string(),
                ));
            }
            classes.push(ClassRecord {
                id: 0,
                value: target,
                name: class_name(target, lookup),
            });
            for y in 0..system.ny {
                if !progress.update(y, system.ny) {
                    cancelled = true;
                    break;
                }
                for x in 0..system.nx {
                    if raster.value(x, y) == Some(target) {
                        grid.set(x, y, Some(0));
                    }
                }
            }
        }
        ClassSelection::All => {
            let mut cells: Vec<(usize, f64)> = raster
                .values()
                .iter()
                .enumerate()
                .filter(|&(_, &v)| !raster.is_nodata_value(v))
                .map(|(i, &v)| (i, v))
                .collect();
            cells.sort_by(|a, b| a.1.total_cmp(&b.1));

            let total = cells.len();
            let step = (total / 100).max(1);
            let mut current: Option<(u32, f64)> = None;
            for (n, &(index, value)) in cells.iter().enumerate() {
                if n % step == 0 && !progress.update(n, total) {
                    cancelled = true;
                    break;
                }
                let id = match current {
                    Some((id, v)) if v == value => id,
                    _ => {
                        let id = u32::try_from(classes.len()).map_err(|_| {
                            VectorizeError::InvalidConfig("too many distinct values".to_string())
                        })?;
                        classes.push(ClassRecord {
                            id,
                            value,
                            name: class_name(value, lookup),
                        });
                        current = Some((id, value));
                        id
                    }
                };
                grid.set(index % system.nx, index / system.nx, Some(id));
            }
        }
    }

    if classes.is_empty() && !cancelled {
        return Err(VectorizeError::NoClasses);
    }

    log::debug!(
        "labelled {} cells into {} classes{}",
        grid.labelled_count(),
        classes.len(),
        if cancelled { " (cancelled)" } else { "" },
    );

    Ok(Labelled {
        grid,
        classes,
        cancelled,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::GridSystem;
    use crate::progress::Unbounded;

    const NODATA: f64 = -9999.0;

    fn raster(nx: usize, values: Vec<f64>) -> Raster {
        let ny = values.len() / nx;
        Raster::new(GridSystem::new(nx, ny, 1.0, 0.5, 0.5).unwrap(), values, NODATA).unwrap()
    }

    #[test]
    fn format_value_trims_trailing_zeros() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(1.256), "1.26");
        assert_eq!(format_value(-4.10), "-4.1");
        assert_eq!(format_value(-0.001), "0");
        assert_eq!(format_value(100.0), "100");
    }

    #[test]
    fn lookup_table_first_match_wins() {
        let table = LookupTable {
            entries: vec![
                LookupEntry {
                    name: "low".to_string(),
                    min: 0.0,
                    max: 10.0,
                },
                LookupEntry {
                    name: "also low".to_string(),
                    min: 5.0,
                    max: 15.0,
                },
            ],
        };
        assert_eq!(class_name(10.0, Some(&table)), "low");
        assert_eq!(class_name(12.0, Some(&table)), "also low");
        assert_eq!(class_name(20.0, Some(&table)), "20");
        assert_eq!(class_name(20.0, None), "20");
    }

    #[test]
    fn all_mode_assigns_one_id_per_distinct_value() {
        let r = raster(3, vec![5.0, 1.0, 5.0, NODATA, 3.0, 1.0]);
        let labelled = label_regions(&r, &ClassSelection::All, None, &mut Unbounded).unwrap();
        let values: Vec<f64> = labelled.classes.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![1.0, 3.0, 5.0]);
        let ids: Vec<u32> = labelled.classes.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let g = &labelled.grid;
        // Disconnected cells with equal values share an id.
        assert_eq!(g.get(0, 0), Some(2));
        assert_eq!(g.get(2, 0), Some(2));
        assert_eq!(g.get(1, 0), Some(0));
        assert_eq!(g.get(2, 1), Some(0));
        assert_eq!(g.get(0, 1), None);
        assert!(!labelled.cancelled);
    }

    #[test]
    fn single_mode_marks_matching_cells_only() {
        let r = raster(2, vec![4.0, 2.0, 4.0, NODATA]);
        let labelled =
            label_regions(&r, &ClassSelection::Single(4.0), None, &mut Unbounded).unwrap();
        assert_eq!(labelled.classes.len(), 1);
        assert_eq!(labelled.classes[0].name, "4");
        assert_eq!(labelled.grid.labelled_count(), 2);
        assert_eq!(labelled.grid.get(1, 0), None);
    }

    #[test]
    fn single_mode_always_creates_a_class() {
        let r = raster(2, vec![1.0, 2.0]);
        let labelled =
            label_regions(&r, &ClassSelection::Single(7.0), None, &mut Unbounded).unwrap();
        assert_eq!(labelled.classes.len(), 1);
        assert_eq!(labelled.grid.labelled_count(), 0);
    }

    #[test]
    fn nan_single_value_is_rejected() {
        let r = raster(1, vec![1.0]);
        assert!(matches!(
            label_regions(&r, &ClassSelection::Single(f64::NAN), None, &mut Unbounded),
            Err(VectorizeError::InvalidConfig(_)),
        ));
    }

    #[test]
    fn all_nodata_has_no_classes() {
        let r = raster(2, vec![NODATA, f64::NAN]);
        assert!(matches!(
            label_regions(&r, &ClassSelection::All, None, &mut Unbounded),
            Err(VectorizeError::NoClasses),
        ));
    }

    #[test]
    fn cancel_before_first_class_is_not_an_error() {
        let r = raster(2, vec![1.0, 2.0, 3.0, 4.0]);
        let labelled =
            label_regions(&r, &ClassSelection::All, None, &mut |_: usize, _: usize| false).unwrap();
        assert!(labelled.cancelled);
        assert!(labelled.classes.is_empty());
        assert_eq!(labelled.grid.labelled_count(), 0);
    }

    #[test]
    fn cancelled_labelling_keeps_partial_result() {
        let r = raster(2, vec![1.0, 2.0, 3.0, 4.0]);
        let mut calls = 0;
        let mut stop_after_two = |_: usize, _: usize| {
            calls += 1;
            calls <= 2
        };
        let labelled = label_regions(&r, &ClassSelection::All, None, &mut stop_after_two).unwrap();
        assert!(labelled.cancelled);
        assert_eq!(labelled.classes.len(), 2);
        assert_eq!(labelled.grid.labelled_count(), 2);
    }
}
