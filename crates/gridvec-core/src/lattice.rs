//! Edge lattice: a double-resolution grid marking region boundaries.
//!
//! For an `nx x ny` region grid the lattice is `(2nx + 1) x (2ny + 1)`,
//! offset by half a cell so that lattice position `(2x + 1, 2y + 1)` is
//! the centre of cell `(x, y)`. Positions with one even and one odd
//! coordinate are cell side midpoints, positions with both coordinates
//! even are cell corners.
//!
//! A side is a *boundary side* when its cell carries an id and the
//! neighbour across the side has a different id, is NODATA, or lies
//! outside the grid. For each boundary side the cell centre is marked
//! [`LatticeCell::Owner`], the midpoint and the side's starting corner
//! (clockwise travel with the region on the right) are marked
//! [`LatticeCell::Open`].
//!
//! Every lattice position derives its own value from the region grid,
//! so rows are independent and can be filled on the rayon pool.

use rayon::prelude::*;

use crate::direction::Direction;
use crate::grid::{GridSystem, RegionGrid};
use crate::types::{Point, VectorizeError};

/// Value of one lattice position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatticeCell {
    /// Not on any boundary.
    #[default]
    Empty,
    /// Centre of a cell with at least one boundary side.
    Owner(u32),
    /// Traversable boundary midpoint or corner.
    Open,
}

/// Kind of lattice position, derived from coordinate parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Centre,
    Midpoint,
    Corner,
}

/// Classify a lattice position by the parity of its coordinates.
#[must_use]
pub const fn position_kind(lx: isize, ly: isize) -> PositionKind {
    match (lx.rem_euclid(2) == 1, ly.rem_euclid(2) == 1) {
        (true, true) => PositionKind::Centre,
        (false, false) => PositionKind::Corner,
        _ => PositionKind::Midpoint,
    }
}

/// Lattice position of the centre of cell `(x, y)`.
#[must_use]
pub const fn centre_of(x: isize, y: isize) -> (isize, isize) {
    (2 * x + 1, 2 * y + 1)
}

/// Whether side `side` of cell `(x, y)` is a boundary side.
fn is_boundary_side(grid: &RegionGrid, x: isize, y: isize, side: Direction) -> bool {
    let Some(id) = grid.id_at(x, y) else {
        return false;
    };
    let (nx, ny) = side.step(x, y);
    grid.id_at(nx, ny) != Some(id)
}

/// Number of boundary sides of cell `(x, y)`.
fn boundary_side_count(grid: &RegionGrid, x: isize, y: isize) -> usize {
    Direction::SIDES
        .iter()
        .filter(|&&side| is_boundary_side(grid, x, y, side))
        .count()
}

/// Compute one lattice row; returns the number of boundary sides owned
/// by the cells centred on this row.
#[allow(clippy::cast_possible_wrap)]
fn fill_row(grid: &RegionGrid, ly: usize, row: &mut [LatticeCell]) -> usize {
    let ly = ly as isize;
    let mut edges = 0;
    for (lx, slot) in row.iter_mut().enumerate() {
        let lx = lx as isize;
        *slot = match position_kind(lx, ly) {
            PositionKind::Centre => {
                let (x, y) = ((lx - 1) / 2, (ly - 1) / 2);
                let sides = boundary_side_count(grid, x, y);
                edges += sides;
                match grid.id_at(x, y) {
                    Some(id) if sides > 0 => LatticeCell::Owner(id),
                    _ => LatticeCell::Empty,
                }
            }
            PositionKind::Midpoint => {
                // The two cells sharing this side.
                let (a, b) = if lx.rem_euclid(2) == 0 {
                    let y = (ly - 1) / 2;
                    ((lx / 2 - 1, y), (lx / 2, y))
                } else {
                    let x = (lx - 1) / 2;
                    ((x, ly / 2 - 1), (x, ly / 2))
                };
                let (ia, ib) = (grid.id_at(a.0, a.1), grid.id_at(b.0, b.1));
                if ia != ib {
                    LatticeCell::Open
                } else {
                    LatticeCell::Empty
                }
            }
            PositionKind::Corner => {
                let (cx, cy) = (lx / 2, ly / 2);
                // A corner starts the north side of the cell to its
                // south-east, the east side of the cell to its south-west,
                // the south side of the cell to its north-west and the west
                // side of the cell to its north-east.
                let starts_side = is_boundary_side(grid, cx, cy - 1, Direction::N)
                    || is_boundary_side(grid, cx - 1, cy - 1, Direction::E)
                    || is_boundary_side(grid, cx - 1, cy, Direction::S)
                    || is_boundary_side(grid, cx, cy, Direction::W);
                if starts_side {
                    LatticeCell::Open
                } else {
                    LatticeCell::Empty
                }
            }
        };
    }
    edges
}

/// The marked boundary lattice of one region grid.
#[derive(Debug, Clone)]
pub struct EdgeLattice {
    width: usize,
    height: usize,
    cells: Vec<LatticeCell>,
    source: GridSystem,
    edge_count: usize,
}

impl EdgeLattice {
    /// Mark every boundary of `grid`.
    ///
    /// With `parallel` set, rows are computed on the rayon pool; the
    /// call returns only after every row is done.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError::NoEdges`] when the grid has no boundary
    /// side at all (every cell NODATA).
    pub fn build(grid: &RegionGrid, parallel: bool) -> Result<Self, VectorizeError> {
        let source = *grid.system();
        let width = 2 * source.nx + 1;
        let height = 2 * source.ny + 1;
        let mut cells = vec![LatticeCell::Empty; width * height];

        let edge_count: usize = if parallel {
            cells
                .par_chunks_mut(width)
                .enumerate()
                .map(|(ly, row)| fill_row(grid, ly, row))
                .sum()
        } else {
            cells
                .chunks_mut(width)
                .enumerate()
                .map(|(ly, row)| fill_row(grid, ly, row))
                .sum()
        };

        if edge_count == 0 {
            return Err(VectorizeError::NoEdges);
        }

        log::debug!("edge lattice {width}x{height}: {edge_count} boundary sides");

        Ok(Self {
            width,
            height,
            cells,
            source,
            edge_count,
        })
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Total number of boundary sides.
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Grid system of the region grid the lattice was built from.
    #[must_use]
    pub const fn source(&self) -> &GridSystem {
        &self.source
    }

    /// Value at `(lx, ly)`; positions outside the lattice are `Empty`.
    #[must_use]
    pub fn get(&self, lx: isize, ly: isize) -> LatticeCell {
        match (usize::try_from(lx), usize::try_from(ly)) {
            (Ok(x), Ok(y)) if x < self.width && y < self.height => self.cells[y * self.width + x],
            _ => LatticeCell::Empty,
        }
    }

    #[must_use]
    pub fn is_open(&self, lx: isize, ly: isize) -> bool {
        self.get(lx, ly) == LatticeCell::Open
    }

    /// World coordinates of lattice position `(lx, ly)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_world(&self, lx: isize, ly: isize) -> Point {
        let half = self.source.cellsize / 2.0;
        Point::new(
            (lx as f64).mul_add(half, self.source.x_min - half),
            (ly as f64).mul_add(half, self.source.y_min - half),
        )
    }
}

/// One "consumed" bit per cell side, owned by a tracing run.
#[derive(Debug, Clone)]
pub struct SideBitmap {
    nx: usize,
    ny: usize,
    words: Vec<u64>,
    consumed: usize,
}

impl SideBitmap {
    /// An all-clear bitmap for the cells of `system`.
    #[must_use]
    pub fn new(system: &GridSystem) -> Self {
        let bits = system.cell_count() * 4;
        Self {
            nx: system.nx,
            ny: system.ny,
            words: vec![0; bits.div_ceil(64)],
            consumed: 0,
        }
    }

    fn bit(&self, x: isize, y: isize, side: Direction) -> Option<usize> {
        let x = usize::try_from(x).ok().filter(|&x| x < self.nx)?;
        let y = usize::try_from(y).ok().filter(|&y| y < self.ny)?;
        Some((y * self.nx + x) * 4 + side.code() / 2)
    }

    /// Whether `side` of cell `(x, y)` has been traced. Sides of cells
    /// outside the grid read as consumed.
    #[must_use]
    pub fn is_consumed(&self, x: isize, y: isize, side: Direction) -> bool {
        self.bit(x, y, side)
            .is_none_or(|b| self.words[b / 64] & (1 << (b % 64)) != 0)
    }

    /// Mark a side as traced; returns `false` if it already was.
    pub fn consume(&mut self, x: isize, y: isize, side: Direction) -> bool {
        let Some(b) = self.bit(x, y, side) else {
            return false;
        };
        let mask = 1 << (b % 64);
        if self.words[b / 64] & mask != 0 {
            return false;
        }
        self.words[b / 64] |= mask;
        self.consumed += 1;
        true
    }

    /// Number of sides consumed so far.
    #[must_use]
    pub const fn consumed_count(&self) -> usize {
        self.consumed
    }
}
