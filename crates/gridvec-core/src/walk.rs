//! Boundary walking over an [`EdgeLattice`].
//!
//! A walk starts on a boundary side midpoint and follows open lattice
//! positions with the traced region on its right, preferring right
//! turns, then straight ahead, then left turns. Each boundary side is
//! consumed in a [`SideBitmap`] the first time it is stepped on, so no
//! side is traced twice and every walk is bounded by the number of
//! boundary sides.
//!
//! Raw walks run clockwise around regions; emitted rings are reversed so
//! outer boundaries are counter-clockwise and holes clockwise.

use serde::{Deserialize, Serialize};

use crate::direction::{self, AHEAD_OPEN, Direction, LEFT_OPEN, RIGHT_OPEN, Transition, Turn};
use crate::lattice::{EdgeLattice, LatticeCell, PositionKind, SideBitmap, centre_of, position_kind};
use crate::progress::Progress;
use crate::types::{Point, Ring};

/// Result of a single walk.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkOutcome {
    /// The walker returned to its start; the ring is counter-clockwise
    /// for outer boundaries and clockwise for holes.
    Closed(Ring),
    /// The walk closed with fewer than four vertices.
    Degenerate,
    /// The walker hit a dead end; the partial ring was discarded.
    Abandoned,
}

/// Ring traced for one region id.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedRing {
    pub region: u32,
    pub ring: Ring,
}

/// Counters for one tracing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStats {
    /// Rings that closed and were kept.
    pub rings: usize,
    /// Walks that hit a dead end.
    pub abandoned: usize,
    /// Walks that closed with too few vertices.
    pub degenerate: usize,
    /// Boundary sides consumed by all walks.
    pub sides_traced: usize,
}

#[derive(Debug, Clone, Copy)]
enum WalkState {
    AtVertex {
        pos: (isize, isize),
        heading: Direction,
    },
    Stepping {
        from: (isize, isize),
        turn: Turn,
        heading: Direction,
    },
    Closed,
    Abandoned,
}

/// Walks boundaries of one lattice, consuming sides in a shared bitmap.
pub struct BoundaryWalker<'a> {
    lattice: &'a EdgeLattice,
    visited: &'a mut SideBitmap,
    keep_all_vertices: bool,
}

impl<'a> BoundaryWalker<'a> {
    #[must_use]
    pub const fn new(
        lattice: &'a EdgeLattice,
        visited: &'a mut SideBitmap,
        keep_all_vertices: bool,
    ) -> Self {
        Self {
            lattice,
            visited,
            keep_all_vertices,
        }
    }

    /// The cell to the right of midpoint `pos` when travelling along
    /// `heading`, and that cell's side under `pos`.
    const fn side_right_of(pos: (isize, isize), heading: Direction) -> ((isize, isize), Direction) {
        let (cx, cy) = heading.right().step(pos.0, pos.1);
        (((cx - 1) / 2, (cy - 1) / 2), heading.left())
    }

    /// Whether the walker tracing `region` may step onto `candidate`.
    fn is_open_for(
        &self,
        candidate: (isize, isize),
        heading: Direction,
        region: u32,
        start: (isize, isize),
    ) -> bool {
        if !self.lattice.is_open(candidate.0, candidate.1) {
            return false;
        }
        if position_kind(candidate.0, candidate.1) != PositionKind::Midpoint || candidate == start {
            return true;
        }
        let (cx, cy) = heading.right().step(candidate.0, candidate.1);
        if self.lattice.get(cx, cy) != LatticeCell::Owner(region) {
            return false;
        }
        let ((x, y), side) = Self::side_right_of(candidate, heading);
        !self.visited.is_consumed(x, y, side)
    }

    fn open_mask(
        &self,
        pos: (isize, isize),
        heading: Direction,
        region: u32,
        start: (isize, isize),
    ) -> u8 {
        let mut mask = 0;
        for (dir, bit) in [
            (heading.right(), RIGHT_OPEN),
            (heading, AHEAD_OPEN),
            (heading.left(), LEFT_OPEN),
        ] {
            if self.is_open_for(dir.step(pos.0, pos.1), dir, region, start) {
                mask |= bit;
            }
        }
        mask
    }

    /// Trace one ring of `region` starting at side midpoint `start`,
    /// initially travelling along `heading`.
    pub fn walk(&mut self, start: (isize, isize), heading: Direction, region: u32) -> WalkOutcome {
        let ((sx, sy), side) = Self::side_right_of(start, heading);
        self.visited.consume(sx, sy, side);

        let mut vertices: Vec<Point> = Vec::new();
        let mut state = WalkState::AtVertex { pos: start, heading };

        loop {
            state = match state {
                WalkState::AtVertex { pos, heading } => {
                    let mask = self.open_mask(pos, heading, region, start);
                    match direction::next(heading, mask) {
                        Transition::Step { turn, heading } => {
                            WalkState::Stepping { from: pos, turn, heading }
                        }
                        Transition::DeadEnd => WalkState::Abandoned,
                    }
                }
                WalkState::Stepping { from, turn, heading } => {
                    let keep = match turn {
                        Turn::Right | Turn::Left => true,
                        Turn::Ahead => {
                            self.keep_all_vertices
                                && position_kind(from.0, from.1) == PositionKind::Corner
                        }
                    };
                    if keep {
                        vertices.push(self.lattice.to_world(from.0, from.1));
                    }

                    let pos = heading.step(from.0, from.1);
                    if pos == start {
                        WalkState::Closed
                    } else {
                        if position_kind(pos.0, pos.1) == PositionKind::Midpoint {
                            let ((x, y), side) = Self::side_right_of(pos, heading);
                            self.visited.consume(x, y, side);
                        }
                        WalkState::AtVertex { pos, heading }
                    }
                }
                WalkState::Closed => {
                    if vertices.len() < 4 {
                        return WalkOutcome::Degenerate;
                    }
                    vertices.reverse();
                    return WalkOutcome::Closed(Ring::new(vertices));
                }
                WalkState::Abandoned => return WalkOutcome::Abandoned,
            };
        }
    }
}

/// Trace every boundary ring of `lattice`.
///
/// Cell centres are scanned row by row; each owner cell seeds a walk
/// from every one of its boundary sides (N, E, S, W) not yet consumed,
/// so outer rings and holes are each discovered exactly once. Rings are
/// returned in discovery order. Cancellation is checked once per row and
/// returns the rings found so far.
#[allow(clippy::cast_possible_wrap)]
pub fn trace_rings<P: Progress + ?Sized>(
    lattice: &EdgeLattice,
    keep_all_vertices: bool,
    progress: &mut P,
) -> (Vec<TracedRing>, TraceStats) {
    let system = *lattice.source();
    let mut visited = SideBitmap::new(&system);
    let mut rings = Vec::new();
    let mut stats = TraceStats::default();

    'rows: for y in 0..system.ny {
        if !progress.update(y, system.ny) {
            log::warn!("ring tracing cancelled at row {y} of {}", system.ny);
            break 'rows;
        }
        for x in 0..system.nx {
            let (x, y) = (x as isize, y as isize);
            let (lx, ly) = centre_of(x, y);
            let LatticeCell::Owner(region) = lattice.get(lx, ly) else {
                continue;
            };
            for side in Direction::SIDES {
                let mid = side.step(lx, ly);
                if !lattice.is_open(mid.0, mid.1) || visited.is_consumed(x, y, side) {
                    continue;
                }
                let mut walker = BoundaryWalker::new(lattice, &mut visited, keep_all_vertices);
                match walker.walk(mid, side.right(), region) {
                    WalkOutcome::Closed(ring) => {
                        stats.rings += 1;
                        rings.push(TracedRing { region, ring });
                    }
                    WalkOutcome::Degenerate => {
                        stats.degenerate += 1;
                        log::debug!(
                            "dropped degenerate ring of region {region} at cell ({x}, {y})"
                        );
                    }
                    WalkOutcome::Abandoned => {
                        stats.abandoned += 1;
                        log::debug!("abandoned ring of region {region} at cell ({x}, {y})");
                    }
                }
            }
        }
    }

    stats.sides_traced = visited.consumed_count();
    (rings, stats)
}
