use crate::game::board::Color;
use std::fmt::{Display, Formatter};

/// Errors raised by the board, the move rules and the engine.
///
/// `IllegalMove` and `NoLegalMove` are expected during play and are meant to
/// be handled locally by the caller, not escalated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameError {
    /// board accessor called with a cell outside `[0, size)`
    OutOfRange { row: usize, col: usize, size: usize },
    /// board size must be even and within the supported range
    InvalidSize(usize),
    /// move refused, engine state unchanged
    IllegalMove(MoveRejection),
    /// the color has nowhere to play
    NoLegalMove(Color),
    /// a remote board does not have the local board size
    SizeMismatch { expected: usize, found: usize },
}

/// why the engine refused a move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveRejection {
    GameOver,
    NotYourTurn,
    NotLegal,
    /// pass requested while a legal move exists
    MustMove,
}

impl Display for MoveRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveRejection::GameOver => f.write_str("game is over"),
            MoveRejection::NotYourTurn => f.write_str("not your turn"),
            MoveRejection::NotLegal => f.write_str("move captures nothing"),
            MoveRejection::MustMove => f.write_str("cannot pass with a legal move available"),
        }
    }
}

impl Display for GameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameError::OutOfRange { row, col, size } => {
                write!(f, "cell ({}, {}) outside {}x{} board", row, col, size, size)
            }
            GameError::InvalidSize(size) => write!(f, "unsupported board size {}", size),
            GameError::IllegalMove(reason) => write!(f, "illegal move: {}", reason),
            GameError::NoLegalMove(color) => write!(f, "{} has no legal move", color),
            GameError::SizeMismatch { expected, found } => {
                write!(f, "expected a {0}x{0} board, found {1}x{1}", expected, found)
            }
        }
    }
}

impl std::error::Error for GameError {}
