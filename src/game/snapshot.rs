//! Fixed binary layout of a board snapshot.
//!
//! ```text
//! [VERSION: u8][N: u8][CELLS: ceil(N*N / 4) bytes]
//! ```
//!
//! Cells are row-major, two bits each, four cells per byte with the first
//! cell in the lowest bits. `00` empty, `01` black, `10` white; `11` is never
//! written. Supported sizes are even, so the cells always fill whole bytes.
//!
//! The same bytes are used on the wire and for save files.
use crate::game::board::State::{self, B, E, W};
use crate::game::board::{check_size, Board};
use std::fmt::{Display, Formatter};

pub const SNAPSHOT_VERSION: u8 = 1;

const HEADER_LEN: usize = 2;
const EMPTY_BITS: u8 = 0b00;
const BLACK_BITS: u8 = 0b01;
const WHITE_BITS: u8 = 0b10;
const CELL_MASK: u8 = 0b11;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    Empty,
    UnsupportedVersion(u8),
    InvalidSize(u8),
    Truncated { expected: usize, found: usize },
    TrailingBytes { expected: usize, found: usize },
    InvalidCell { index: usize },
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Empty => f.write_str("empty snapshot"),
            SnapshotError::UnsupportedVersion(v) => write!(f, "unsupported snapshot version {}", v),
            SnapshotError::InvalidSize(n) => write!(f, "invalid board size {} in snapshot", n),
            SnapshotError::Truncated { expected, found } => {
                write!(f, "snapshot truncated: expected {} bytes, found {}", expected, found)
            }
            SnapshotError::TrailingBytes { expected, found } => {
                write!(f, "snapshot too long: expected {} bytes, found {}", expected, found)
            }
            SnapshotError::InvalidCell { index } => write!(f, "invalid cell code at {}", index),
        }
    }
}

impl std::error::Error for SnapshotError {}

pub fn encode_board(board: &Board) -> Vec<u8> {
    let states = board.states();
    let mut out = Vec::with_capacity(HEADER_LEN + packed_len(states.len()));
    out.push(SNAPSHOT_VERSION);
    out.push(board.size() as u8);
    out.extend(states.chunks(4).map(compress_four_states));
    out
}

pub fn decode_board(bytes: &[u8]) -> Result<Board, SnapshotError> {
    let (&version, rest) = bytes.split_first().ok_or(SnapshotError::Empty)?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let (&size, payload) = rest.split_first().ok_or(SnapshotError::Truncated {
        expected: HEADER_LEN,
        found: bytes.len(),
    })?;
    check_size(size as usize).map_err(|_| SnapshotError::InvalidSize(size))?;
    let cell_count = size as usize * size as usize;
    let expected = HEADER_LEN + packed_len(cell_count);
    if bytes.len() < expected {
        return Err(SnapshotError::Truncated {
            expected,
            found: bytes.len(),
        });
    }
    if bytes.len() > expected {
        return Err(SnapshotError::TrailingBytes {
            expected,
            found: bytes.len(),
        });
    }
    let states = (0..cell_count)
        .map(|index| decode_cell(payload, index))
        .collect::<Result<Vec<State>, SnapshotError>>()?;
    Board::from_states(size as usize, states).map_err(|_| SnapshotError::InvalidSize(size))
}

#[inline(always)]
fn packed_len(cells: usize) -> usize {
    (cells + 3) / 4
}

#[inline]
fn compress_four_states(chunk: &[State]) -> u8 {
    chunk
        .iter()
        .enumerate()
        .fold(0u8, |byte, (i, s)| byte | (state_to_bits(s) << (2 * i)))
}

#[inline(always)]
fn state_to_bits(state: &State) -> u8 {
    match state {
        E => EMPTY_BITS,
        B => BLACK_BITS,
        W => WHITE_BITS,
    }
}

#[inline]
fn decode_cell(payload: &[u8], index: usize) -> Result<State, SnapshotError> {
    match (payload[index / 4] >> (2 * (index % 4))) & CELL_MASK {
        EMPTY_BITS => Ok(E),
        BLACK_BITS => Ok(B),
        WHITE_BITS => Ok(W),
        _ => Err(SnapshotError::InvalidCell { index }),
    }
}
