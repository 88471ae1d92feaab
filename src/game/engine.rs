use crate::game::board::{Board, Color, DEFAULT_SIZE};
use crate::game::error::{GameError, MoveRejection};
use crate::game::rules::{captured_cells, has_any_legal_move, is_legal, legal_moves};
use crate::game::snapshot::{decode_board, encode_board, SnapshotError};
#[allow(unused_imports)]
use log::{debug, trace};
use std::fmt::{Debug, Display, Formatter};

/// Game parameters fixed for the lifetime of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub board_size: usize,
    /// side to move on a fresh board
    pub first_mover: Color,
}

/// 8x8, white (the human side in single machine play) moves first
impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            board_size: DEFAULT_SIZE,
            first_mover: Color::White,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
    InProgress(Color),
    Terminal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Score {
    pub black: usize,
    pub white: usize,
}

impl Score {
    pub fn of(board: &Board) -> Self {
        Score {
            black: board.count_by_color(Color::Black),
            white: board.count_by_color(Color::White),
        }
    }

    /// `None` on a tie
    pub fn winner(&self) -> Option<Color> {
        match self.black.cmp(&self.white) {
            std::cmp::Ordering::Greater => Some(Color::Black),
            std::cmp::Ordering::Less => Some(Color::White),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "White: {} - Black: {}", self.white, self.black)
    }
}

/// what produced a board update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// current state announced without any change
    Initial,
    Move { row: usize, col: usize, color: Color },
    Pass(Color),
    /// board installed from the remote peer, `mover` played it
    Remote { mover: Color },
    Reset,
}

/// Change notification payload. The board is a copy, never the live one.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardUpdate {
    pub board: Board,
    pub status: GameStatus,
    pub origin: UpdateOrigin,
}

pub type SubscriberId = u64;

type Subscriber = Box<dyn FnMut(&BoardUpdate) + Send>;

/// Turn controller owning the board.
///
/// The engine is not synchronized: exactly one owner drives it. Every state
/// change goes through `apply_move`, `pass`, `install_remote_board` or
/// `reset`, and each of them notifies subscribers synchronously.
pub struct Engine {
    board: Board,
    status: GameStatus,
    config: GameConfig,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_subscriber: SubscriberId,
}

impl Engine {
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        let board = Board::with_size(config.board_size)?;
        Ok(Engine {
            board,
            status: GameStatus::InProgress(config.first_mover),
            config,
            subscribers: Vec::new(),
            next_subscriber: 0,
        })
    }

    /// Continue a game from a saved board.
    ///
    /// If `side_to_move` cannot play the turn goes to the other side, and if
    /// neither can the game is over.
    pub fn resume(board: Board, side_to_move: Color) -> Self {
        let status = status_for_turn(&board, side_to_move);
        Engine {
            config: GameConfig {
                board_size: board.size(),
                first_mover: side_to_move,
            },
            board,
            status,
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn side_to_move(&self) -> Option<Color> {
        match self.status {
            GameStatus::InProgress(color) => Some(color),
            GameStatus::Terminal => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == GameStatus::Terminal
    }

    pub fn score(&self) -> Score {
        Score::of(&self.board)
    }

    pub fn is_legal(&self, row: usize, col: usize, color: Color) -> bool {
        is_legal(&self.board, row, col, color)
    }

    /// legal moves of the side to move, empty once the game is over
    pub fn legal_moves(&self) -> Vec<(usize, usize)> {
        match self.status {
            GameStatus::InProgress(color) => legal_moves(&self.board, color),
            GameStatus::Terminal => Vec::new(),
        }
    }

    /// Place a disc for `color` and flip every captured cell.
    ///
    /// Returns the flipped cells. On error nothing changes.
    pub fn apply_move(
        &mut self,
        row: usize,
        col: usize,
        color: Color,
    ) -> Result<Vec<(usize, usize)>, GameError> {
        match self.status {
            GameStatus::Terminal => return Err(rejected(MoveRejection::GameOver)),
            GameStatus::InProgress(side) if side != color => {
                return Err(rejected(MoveRejection::NotYourTurn))
            }
            GameStatus::InProgress(_) => {}
        }
        let captured = captured_cells(&self.board, row, col, color);
        if captured.is_empty() {
            return Err(rejected(MoveRejection::NotLegal));
        }
        self.board.set(row, col, color.into())?;
        for &(r, c) in &captured {
            self.board.set(r, c, color.into())?;
        }
        self.status = status_for_turn(&self.board, color.switch());
        #[cfg(debug_assertions)]
        trace!(
            "{} played ({}, {}) flipping {}, now {:?}",
            color,
            row,
            col,
            captured.len(),
            self.status
        );
        self.notify(UpdateOrigin::Move { row, col, color });
        Ok(captured)
    }

    /// Give up the turn. Only allowed when `color` is to move and cannot.
    pub fn pass(&mut self, color: Color) -> Result<(), GameError> {
        match self.status {
            GameStatus::Terminal => return Err(rejected(MoveRejection::GameOver)),
            GameStatus::InProgress(side) if side != color => {
                return Err(rejected(MoveRejection::NotYourTurn))
            }
            GameStatus::InProgress(_) => {}
        }
        if has_any_legal_move(&self.board, color) {
            return Err(rejected(MoveRejection::MustMove));
        }
        self.status = status_for_turn(&self.board, color.switch());
        self.notify(UpdateOrigin::Pass(color));
        Ok(())
    }

    /// Replace the board with the one the remote peer produced.
    ///
    /// No legality check is made. The turn advances as if `mover` had just
    /// played.
    pub fn install_remote_board(&mut self, board: Board, mover: Color) -> Result<(), GameError> {
        if board.size() != self.board.size() {
            return Err(GameError::SizeMismatch {
                expected: self.board.size(),
                found: board.size(),
            });
        }
        if self.is_terminal() {
            return Err(rejected(MoveRejection::GameOver));
        }
        self.board = board;
        self.status = status_for_turn(&self.board, mover.switch());
        #[cfg(debug_assertions)]
        trace!("remote board from {} installed, now {:?}", mover, self.status);
        self.notify(UpdateOrigin::Remote { mover });
        Ok(())
    }

    /// Start over on a fresh board.
    pub fn reset(&mut self) {
        // board size was validated when the engine was built
        self.board = Board::with_size(self.config.board_size).unwrap_or_default();
        self.status = GameStatus::InProgress(self.config.first_mover);
        self.notify(UpdateOrigin::Reset);
    }

    /// Notify subscribers of the current state without changing it.
    pub fn announce(&mut self) {
        self.notify(UpdateOrigin::Initial);
    }

    /// Register a change listener. Listeners run synchronously, in
    /// registration order, on the thread driving the engine.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriberId
    where
        F: FnMut(&BoardUpdate) + Send + 'static,
    {
        let id = self.next_subscriber;
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// snapshot bytes of the current board
    pub fn serialize_board(&self) -> Vec<u8> {
        encode_board(&self.board)
    }

    pub fn deserialize_board(bytes: &[u8]) -> Result<Board, SnapshotError> {
        decode_board(bytes)
    }

    fn notify(&mut self, origin: UpdateOrigin) {
        if self.subscribers.is_empty() {
            return;
        }
        let update = BoardUpdate {
            board: self.board.clone(),
            status: self.status,
            origin,
        };
        for (_, listener) in self.subscribers.iter_mut() {
            listener(&update);
        }
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("board", &self.board)
            .field("status", &self.status)
            .field("config", &self.config)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// status when it is `to_move`'s turn, accounting for forced passes
fn status_for_turn(board: &Board, to_move: Color) -> GameStatus {
    if has_any_legal_move(board, to_move) {
        GameStatus::InProgress(to_move)
    } else if has_any_legal_move(board, to_move.switch()) {
        GameStatus::InProgress(to_move.switch())
    } else {
        GameStatus::Terminal
    }
}

#[cold]
fn rejected(reason: MoveRejection) -> GameError {
    #[cfg(debug_assertions)]
    debug!("move rejected: {}", reason);
    GameError::IllegalMove(reason)
}
