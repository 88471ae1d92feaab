//! One game between the local player and an opponent.
//!
//! A single coordinator task owns the [`Engine`] and consumes typed events:
//! player commands, and in networked play the boards forwarded by a
//! background receive loop. Engine change notifications become
//! [`SessionResponse::Update`]s for the presentation layer.
use crate::config::PlayerKind;
use crate::game::{Board, BoardUpdate, Color, Engine, RandomMover, Score};
use crate::sync::peer::{PeerReceiver, PeerSender, SyncError, SyncPeer};
use crate::CHANNEL_SIZE;
use async_std::channel::{bounded, unbounded, Receiver, Sender};
use async_std::task;
use futures::{future, stream, stream_select, Stream, StreamExt};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Who is playing what in this session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub local_color: Color,
    pub local_player: PlayerKind,
    /// seed of the random mover, entropy if `None`
    pub seed: Option<u64>,
}

pub enum Opponent {
    /// random mover on this machine
    Computer,
    Remote(SyncPeer),
}

/// Sent to the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionResponse {
    Update(BoardUpdate),
    /// sent once per game, when neither side can move
    GameOver(Score),
    PeerLeft,
    PeerDisconnected(SyncError),
    /// the session task ended, no more responses follow
    Stopped,
}

/// Player side handle of a running session.
///
/// Dropping every `Commands` ends the session as if `quit` was called.
#[derive(Clone)]
pub struct Commands {
    sender: Sender<SessionCommand>,
}

impl Commands {
    /// Place a disc for the local player. Ignored unless the local player
    /// is human, it is their turn and the move is legal.
    pub async fn play(&self, row: usize, col: usize) {
        let _ = self.sender.send(SessionCommand::Play(row, col)).await;
    }

    /// Start over. Only honored against the computer.
    pub async fn new_game(&self) {
        let _ = self.sender.send(SessionCommand::NewGame).await;
    }

    /// Leave the game; the peer, if any, is told so.
    pub async fn quit(&self) {
        let _ = self.sender.send(SessionCommand::Quit).await;
    }
}

#[derive(Debug)]
enum SessionCommand {
    Play(usize, usize),
    NewGame,
    Quit,
}

#[derive(Debug)]
enum SessionEvent {
    Command(SessionCommand),
    RemoteSnapshot(Board),
    PeerLost(SyncError),
    /// every `Commands` handle is gone
    Closed,
}

/// Start the coordinator task for `engine`.
///
/// The engine may be fresh or resumed. Automated sides start moving right
/// away if it is their turn.
pub fn new_session(
    config: SessionConfig,
    mut engine: Engine,
    opponent: Opponent,
) -> (Commands, Receiver<SessionResponse>) {
    let (cmd_sender, cmd_receiver) = bounded(CHANNEL_SIZE);
    let (rsp_sender, rsp_receiver) = unbounded();
    let updates = rsp_sender.clone();
    engine.subscribe(move |update| {
        let _ = updates.try_send(SessionResponse::Update(update.clone()));
    });
    let (remote_sender, remote_receiver) = bounded(CHANNEL_SIZE);
    let (peer, remote_player) = match opponent {
        Opponent::Computer => {
            info!("session against the computer, local player is {}", config.local_color);
            drop(remote_sender);
            (None, false)
        }
        Opponent::Remote(peer) => {
            info!("session against a remote peer, local player is {}", config.local_color);
            let (sender, receiver) = peer.split();
            receive_loop(receiver, remote_sender);
            (Some(sender), true)
        }
    };
    let mover = match config.seed {
        Some(seed) => RandomMover::seeded(seed),
        None => RandomMover::new(),
    };
    let coordinator = Coordinator {
        engine,
        config,
        mover,
        peer,
        remote_player,
        responses: rsp_sender,
        game_over_reported: false,
    };
    let commands = cmd_receiver
        .map(SessionEvent::Command)
        .chain(stream::once(future::ready(SessionEvent::Closed)))
        .fuse();
    let remote = remote_receiver.fuse();
    task::spawn(coordinator.run(stream_select!(commands, remote)));
    (Commands { sender: cmd_sender }, rsp_receiver)
}

/// Forward boards from the peer until the connection ends or the
/// coordinator is gone.
fn receive_loop(mut receiver: PeerReceiver, events: Sender<SessionEvent>) {
    task::spawn(async move {
        loop {
            match receiver.receive_snapshot().await {
                Ok(board) => {
                    if events.send(SessionEvent::RemoteSnapshot(board)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = events.send(SessionEvent::PeerLost(e)).await;
                    break;
                }
            }
        }
        #[cfg(debug_assertions)]
        trace!("receive loop stopped");
    });
}

struct Coordinator {
    engine: Engine,
    config: SessionConfig,
    mover: RandomMover,
    peer: Option<PeerSender>,
    /// opponent moves arrive as snapshots instead of being computed here
    remote_player: bool,
    responses: Sender<SessionResponse>,
    game_over_reported: bool,
}

impl Coordinator {
    async fn run<S>(mut self, mut events: S)
    where
        S: Stream<Item = SessionEvent> + Unpin,
    {
        self.engine.announce();
        self.drive_automated().await;
        self.report_game_over().await;
        while let Some(event) = events.next().await {
            #[cfg(debug_assertions)]
            trace!("session event {:?}", event);
            let keep_going = match event {
                SessionEvent::Command(SessionCommand::Play(row, col)) => {
                    self.on_play(row, col).await;
                    true
                }
                SessionEvent::Command(SessionCommand::NewGame) => {
                    self.on_new_game().await;
                    true
                }
                SessionEvent::RemoteSnapshot(board) => {
                    self.on_remote_board(board).await;
                    true
                }
                SessionEvent::PeerLost(reason) => {
                    self.on_peer_lost(reason).await;
                    false
                }
                SessionEvent::Command(SessionCommand::Quit) | SessionEvent::Closed => {
                    self.on_quit().await;
                    false
                }
            };
            if !keep_going {
                break;
            }
        }
        let _ = self.responses.send(SessionResponse::Stopped).await;
        info!("session stopped");
    }

    async fn on_play(&mut self, row: usize, col: usize) {
        if self.config.local_player != PlayerKind::Human {
            debug!("play command ignored, local player is automated");
            return;
        }
        let color = self.config.local_color;
        if let Err(e) = self.engine.apply_move(row, col, color) {
            debug!("play ({}, {}) ignored: {}", row, col, e);
            return;
        }
        self.relay().await;
        self.drive_automated().await;
        self.report_game_over().await;
    }

    async fn on_new_game(&mut self) {
        if self.remote_player {
            warn!("new game is not available against a remote peer");
            return;
        }
        info!("new game");
        self.engine.reset();
        self.game_over_reported = false;
        self.drive_automated().await;
        self.report_game_over().await;
    }

    async fn on_remote_board(&mut self, board: Board) {
        let mover = self.config.local_color.switch();
        if let Err(e) = self.engine.install_remote_board(board, mover) {
            warn!("remote board ignored: {}", e);
            return;
        }
        self.drive_automated().await;
        self.report_game_over().await;
    }

    async fn on_peer_lost(&mut self, reason: SyncError) {
        self.peer = None;
        let response = match reason {
            SyncError::PeerLeft => {
                info!("peer left the game");
                SessionResponse::PeerLeft
            }
            e => {
                warn!("peer disconnected: {}", e);
                SessionResponse::PeerDisconnected(e)
            }
        };
        let _ = self.responses.send(response).await;
    }

    async fn on_quit(&mut self) {
        if let Some(peer) = self.peer.take() {
            peer.leave().await;
        }
    }

    /// Move for every automated side while it is to move.
    async fn drive_automated(&mut self) {
        while let Some(side) = self.engine.side_to_move() {
            if !self.is_automated(side) {
                break;
            }
            let result = self
                .mover
                .choose(self.engine.board(), side)
                .and_then(|(row, col)| self.engine.apply_move(row, col, side));
            if let Err(e) = result {
                error!("automated {} could not move: {}", side, e);
                break;
            }
            if side == self.config.local_color {
                self.relay().await;
            }
        }
    }

    fn is_automated(&self, side: Color) -> bool {
        if side == self.config.local_color {
            self.config.local_player == PlayerKind::Automated
        } else {
            !self.remote_player
        }
    }

    /// Send the board after a local move.
    async fn relay(&mut self) {
        if let Some(peer) = &self.peer {
            if let Err(e) = peer.send_snapshot(self.engine.board()).await {
                // the receive loop reports the lost peer
                warn!("snapshot not sent: {}", e);
            }
        }
    }

    async fn report_game_over(&mut self) {
        if self.engine.is_terminal() && !self.game_over_reported {
            self.game_over_reported = true;
            let score = self.engine.score();
            info!("game over, {}", score);
            let _ = self.responses.send(SessionResponse::GameOver(score)).await;
        }
    }
}
