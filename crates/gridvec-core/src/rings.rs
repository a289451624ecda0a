//! Grouping traced rings into output shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classify::ClassRecord;
use crate::types::{OutputMode, Shape};
use crate::walk::TracedRing;

/// Counters from island splitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    /// Shapes created, one per outer ring.
    pub outer_rings: usize,
    /// Holes attached to an outer ring.
    pub holes: usize,
    /// Holes without a containing outer ring of the same region.
    pub orphan_holes: usize,
}

fn shape_for(class: &ClassRecord) -> Shape {
    Shape::new(class.id, class.value, class.name.clone())
}

/// Build shapes from `rings` (in discovery order) for the given classes.
///
/// [`OutputMode::Multipart`] yields one shape per class that has rings,
/// in class order, with all of its rings as parts. In
/// [`OutputMode::SplitIslands`] every outer ring becomes a shape and each
/// hole joins the first outer ring of its region that contains the
/// hole's first vertex; holes with no such ring are dropped. Nesting is
/// one level deep: a hole inside an island that sits in another hole
/// still joins the enclosing outer ring when that was discovered first.
#[must_use]
pub fn assemble_shapes(
    classes: &[ClassRecord],
    rings: Vec<TracedRing>,
    mode: OutputMode,
) -> (Vec<Shape>, SplitStats) {
    let class_index: HashMap<u32, usize> =
        classes.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    let mut stats = SplitStats::default();

    match mode {
        OutputMode::Multipart => {
            let mut shapes: Vec<Option<Shape>> = vec![None; classes.len()];
            for TracedRing { region, ring } in rings {
                let Some(&i) = class_index.get(&region) else {
                    log::debug!("ring for unknown region {region} skipped");
                    continue;
                };
                shapes[i].get_or_insert_with(|| shape_for(&classes[i])).parts.push(ring);
            }
            (shapes.into_iter().flatten().collect(), stats)
        }
        OutputMode::SplitIslands => {
            let mut shapes = Vec::new();
            let mut outers_by_region: HashMap<u32, Vec<usize>> = HashMap::new();
            let mut holes = Vec::new();

            for traced in rings {
                let Some(&i) = class_index.get(&traced.region) else {
                    log::debug!("ring for unknown region {} skipped", traced.region);
                    continue;
                };
                if traced.ring.is_outer() {
                    outers_by_region.entry(traced.region).or_default().push(shapes.len());
                    shapes.push(shape_for(&classes[i]).with_part(traced.ring));
                } else {
                    holes.push(traced);
                }
            }
            stats.outer_rings = shapes.len();

            for TracedRing { region, ring } in holes {
                let Some(&anchor) = ring.first() else {
                    continue;
                };
                let owner = outers_by_region.get(&region).and_then(|candidates| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&s| {
                            shapes[s].parts.first().is_some_and(|outer| outer.contains(anchor))
                        })
                });
                if let Some(s) = owner {
                    shapes[s].parts.push(ring);
                    stats.holes += 1;
                } else {
                    stats.orphan_holes += 1;
                    log::debug!("orphan hole of region {region} dropped");
                }
            }

            (shapes, stats)
        }
    }
}
