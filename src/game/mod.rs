//! Board, capture rules and the turn engine.
//!
//! Nothing in here does I/O; the engine is driven by a single owner.
mod board;
mod engine;
mod error;
mod random_mover;
mod rules;
mod snapshot;

pub use board::{Board, Color, State, DEFAULT_SIZE, MAX_SIZE, MIN_SIZE};
pub use engine::{
    BoardUpdate, Engine, GameConfig, GameStatus, Score, SubscriberId, UpdateOrigin,
};
pub use error::{GameError, MoveRejection};
pub use random_mover::{choose_random_legal_move, RandomMover};
pub use rules::{captured_cells, has_any_legal_move, is_legal, legal_moves, DIRECTIONS};
pub use snapshot::{decode_board, encode_board, SnapshotError, SNAPSHOT_VERSION};
