use crate::game::board::State::{B, E, W};
use crate::game::error::GameError;
use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter, Write};

pub const DEFAULT_SIZE: usize = 8;
pub const MIN_SIZE: usize = 4;
pub const MAX_SIZE: usize = 16;

/// Represents a player (black or white)
#[derive(Clone, PartialEq, Eq, Copy, Debug, Hash, Encode, Decode)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn switch(&self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Black => f.write_str("Black"),
            Color::White => f.write_str("White"),
        }
    }
}

/// represents cell State: Black, White, Empty
#[derive(Clone, PartialEq, Eq, Copy, Debug, Hash)]
pub enum State {
    // black
    B,
    // white
    W,
    // empty
    E,
}

impl State {
    #[inline(always)]
    pub fn color(&self) -> Option<Color> {
        match self {
            B => Some(Color::Black),
            W => Some(Color::White),
            E => None,
        }
    }
}

impl From<Color> for State {
    #[inline(always)]
    fn from(c: Color) -> Self {
        match c {
            Color::Black => B,
            Color::White => W,
        }
    }
}

/// A square grid of cells, stored row-major.
///
/// The board only knows where discs are. Turn order, legality and
/// notifications belong to [`crate::game::Engine`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    size: usize,
    inner: Vec<State>,
}

impl Board {
    /// 8×8 board with the four center discs in the starting pattern.
    pub fn new() -> Self {
        Board::standard(DEFAULT_SIZE)
    }

    /// N×N board with the four center discs in the starting pattern.
    ///
    /// `size` must be even and within `MIN_SIZE..=MAX_SIZE`.
    pub fn with_size(size: usize) -> Result<Self, GameError> {
        check_size(size)?;
        Ok(Board::standard(size))
    }

    /// N×N board with every cell empty.
    pub fn empty(size: usize) -> Result<Self, GameError> {
        check_size(size)?;
        Ok(Board::blank(size))
    }

    /// Build a board from explicit rows, mostly useful for constructing positions.
    pub fn from_rows<R: AsRef<[State]>>(rows: &[R]) -> Result<Self, GameError> {
        let size = rows.len();
        check_size(size)?;
        let mut inner = Vec::with_capacity(size * size);
        for row in rows {
            let row = row.as_ref();
            if row.len() != size {
                return Err(GameError::InvalidSize(row.len()));
            }
            inner.extend_from_slice(row);
        }
        Ok(Board { size, inner })
    }

    /// `states` must hold exactly `size * size` cells.
    pub(crate) fn from_states(size: usize, states: Vec<State>) -> Result<Self, GameError> {
        check_size(size)?;
        if states.len() != size * size {
            return Err(GameError::InvalidSize(size));
        }
        Ok(Board {
            size,
            inner: states,
        })
    }

    fn blank(size: usize) -> Self {
        Board {
            size,
            inner: vec![E; size * size],
        }
    }

    fn standard(size: usize) -> Self {
        let mut board = Board::blank(size);
        let c = size / 2;
        board.inner[(c - 1) * size + (c - 1)] = W;
        board.inner[(c - 1) * size + c] = B;
        board.inner[c * size + (c - 1)] = B;
        board.inner[c * size + c] = W;
        board
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Result<State, GameError> {
        let idx = self.index(row, col)?;
        Ok(self.inner[idx])
    }

    /// Direct mutation, no legality checking.
    pub fn set(&mut self, row: usize, col: usize, state: State) -> Result<(), GameError> {
        let idx = self.index(row, col)?;
        self.inner[idx] = state;
        Ok(())
    }

    /// signed lookup used when walking lines, `None` off the board
    #[inline(always)]
    pub(crate) fn at(&self, row: isize, col: isize) -> Option<State> {
        let size = self.size as isize;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(self.inner[row as usize * self.size + col as usize])
        } else {
            None
        }
    }

    pub fn count(&self, state: State) -> usize {
        self.inner.iter().filter(|s| **s == state).count()
    }

    pub fn count_by_color(&self, color: Color) -> usize {
        self.count(color.into())
    }

    /// number of cells holding a disc of either color
    pub fn occupied(&self) -> usize {
        self.inner.len() - self.count(E)
    }

    pub fn is_full(&self) -> bool {
        !self.inner.contains(&E)
    }

    /// row-major view of all cells
    pub fn states(&self) -> &[State] {
        &self.inner
    }

    /// iterate over `(row, col, state)` in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, State)> + '_ {
        let size = self.size;
        self.inner
            .iter()
            .enumerate()
            .map(move |(i, s)| (i / size, i % size, *s))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[State]> {
        self.inner.chunks(self.size)
    }

    #[inline(always)]
    fn index(&self, row: usize, col: usize) -> Result<usize, GameError> {
        if row < self.size && col < self.size {
            Ok(row * self.size + col)
        } else {
            Err(out_of_range(row, col, self.size))
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

pub(crate) fn check_size(size: usize) -> Result<(), GameError> {
    if size % 2 == 0 && (MIN_SIZE..=MAX_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(GameError::InvalidSize(size))
    }
}

#[cold]
fn out_of_range(row: usize, col: usize, size: usize) -> GameError {
    GameError::OutOfRange { row, col, size }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("   ")?;
        for col in 0..self.size {
            write!(f, "{:<3}", col)?;
        }
        f.write_char('\n')?;
        for (i, row) in self.rows().enumerate() {
            write!(f, "{:<3}", i)?;
            for s in row {
                match s {
                    B => f.write_char('x')?,
                    W => f.write_char('o')?,
                    E => f.write_char('.')?,
                }
                f.write_str("  ")?;
            }
            f.write_char('\n')?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Board({}x{})\n{}", self.size, self.size, self)
    }
}
