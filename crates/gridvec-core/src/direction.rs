//! Compass directions and the boundary walker's turn table.
//!
//! Codes run clockwise from north: `0 = N, 1 = NE, ... 7 = NW`. Even
//! codes are orthogonal, odd codes diagonal. Offsets assume y grows
//! northward.

use serde::{Deserialize, Serialize};

/// One of the eight compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    N = 0,
    NE = 1,
    E = 2,
    SE = 3,
    S = 4,
    SW = 5,
    W = 6,
    NW = 7,
}

impl Direction {
    /// All directions in code order.
    pub const ALL: [Self; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// The four cell sides, clockwise from north.
    pub const SIDES: [Self; 4] = [Self::N, Self::E, Self::S, Self::W];

    /// Direction for `code`, taken modulo 8.
    #[must_use]
    pub const fn from_code(code: usize) -> Self {
        match code % 8 {
            0 => Self::N,
            1 => Self::NE,
            2 => Self::E,
            3 => Self::SE,
            4 => Self::S,
            5 => Self::SW,
            6 => Self::W,
            _ => Self::NW,
        }
    }

    #[must_use]
    pub const fn code(self) -> usize {
        self as usize
    }

    /// Rotate clockwise by `steps` eighths of a turn.
    #[must_use]
    pub const fn rotate(self, steps: usize) -> Self {
        Self::from_code(self.code() + steps)
    }

    /// Quarter turn clockwise.
    #[must_use]
    pub const fn right(self) -> Self {
        self.rotate(2)
    }

    /// Quarter turn counter-clockwise.
    #[must_use]
    pub const fn left(self) -> Self {
        self.rotate(6)
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        self.rotate(4)
    }

    #[must_use]
    pub const fn is_orthogonal(self) -> bool {
        self.code() % 2 == 0
    }

    /// Unit step `(dx, dy)` in this direction.
    #[must_use]
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Self::N => (0, 1),
            Self::NE => (1, 1),
            Self::E => (1, 0),
            Self::SE => (1, -1),
            Self::S => (0, -1),
            Self::SW => (-1, -1),
            Self::W => (-1, 0),
            Self::NW => (-1, 1),
        }
    }

    /// Position one step from `(x, y)`.
    #[must_use]
    pub const fn step(self, x: isize, y: isize) -> (isize, isize) {
        let (dx, dy) = self.offset();
        (x + dx, y + dy)
    }
}

/// How the walker changed heading at a lattice position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Right,
    Ahead,
    Left,
}

/// Outcome of looking up the turn table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move one lattice step along `heading`.
    Step { turn: Turn, heading: Direction },
    /// No candidate is open.
    DeadEnd,
}

/// Bit set in the open mask when the position to the right is open.
pub const RIGHT_OPEN: u8 = 0b001;
/// Bit set when the position straight ahead is open.
pub const AHEAD_OPEN: u8 = 0b010;
/// Bit set when the position to the left is open.
pub const LEFT_OPEN: u8 = 0b100;

const fn transition(heading: Direction, mask: u8) -> Transition {
    if mask & RIGHT_OPEN != 0 {
        Transition::Step {
            turn: Turn::Right,
            heading: heading.right(),
        }
    } else if mask & AHEAD_OPEN != 0 {
        Transition::Step {
            turn: Turn::Ahead,
            heading,
        }
    } else if mask & LEFT_OPEN != 0 {
        Transition::Step {
            turn: Turn::Left,
            heading: heading.left(),
        }
    } else {
        Transition::DeadEnd
    }
}

const fn build_transitions() -> [[Transition; 8]; 8] {
    let mut table = [[Transition::DeadEnd; 8]; 8];
    let mut h = 0;
    while h < 8 {
        let mut mask = 0;
        while mask < 8 {
            #[allow(clippy::cast_possible_truncation)]
            let bits = mask as u8;
            table[h][mask] = transition(Direction::from_code(h), bits);
            mask += 1;
        }
        h += 1;
    }
    table
}

/// Turn table indexed by `[heading code][open mask]`.
///
/// Right turns win over going ahead, which wins over left turns; this
/// keeps the traced region on the walker's right and splits regions that
/// only touch at a corner.
pub const TRANSITIONS: [[Transition; 8]; 8] = build_transitions();

/// Look up the transition for `heading` given the open mask.
#[must_use]
pub const fn next(heading: Direction, open_mask: u8) -> Transition {
    TRANSITIONS[heading.code()][(open_mask & 0b111) as usize]
}
