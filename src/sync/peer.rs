//! Point to point board synchronization over one TCP connection.
//!
//! Both ends send a `Hello` right after the stream is up and refuse to go on
//! unless the other side agrees on protocol version, board size and first
//! mover. After that every message is a full board snapshot; the receiver
//! installs the latest one it reads.
use crate::config::{PeerOptions, Role};
use crate::game::{decode_board, encode_board, Board, GameConfig};
use crate::network::{Conn, ConnectionError, Received};
use crate::sync::messages::{PeerMessage, PROTOCOL_VERSION};
use async_std::channel::{Receiver, Sender};
use async_std::future::timeout;
use async_std::io;
use async_std::net::{TcpListener, TcpStream};
use futures::StreamExt;
#[allow(unused_imports)]
use log::{debug, error, info, trace};
use std::fmt::{Display, Formatter};
use std::net::Shutdown;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncError {
    /// could not bind, accept or dial
    Connection(String),
    /// peers disagree on the game or the hello never came
    Handshake(String),
    /// connection closed or broken
    Transport(String),
    /// payload is not a valid message or snapshot
    Decode(String),
    /// peer announced it is quitting
    PeerLeft,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Connection(e) => write!(f, "connection failed: {}", e),
            SyncError::Handshake(e) => write!(f, "handshake failed: {}", e),
            SyncError::Transport(e) => write!(f, "transport error: {}", e),
            SyncError::Decode(e) => write!(f, "malformed message: {}", e),
            SyncError::PeerLeft => f.write_str("peer left the game"),
        }
    }
}

impl std::error::Error for SyncError {}

/// A connected, handshaken peer.
pub struct SyncPeer {
    role: Role,
    game: GameConfig,
    sender: PeerSender,
    receiver: PeerReceiver,
}

/// outbound half of a [`SyncPeer`]
pub struct PeerSender {
    sender: Sender<PeerMessage>,
    tcp: TcpStream,
}

/// inbound half of a [`SyncPeer`]
pub struct PeerReceiver {
    receiver: Receiver<Received<PeerMessage>>,
    board_size: usize,
}

impl SyncPeer {
    /// Establish the connection and run the hello exchange.
    ///
    /// `Listen` binds `address:port` and accepts exactly one peer, waiting
    /// as long as it takes. `Connect` dials `address:port`, bounded by
    /// `options.connect_timeout`, which also bounds the hello exchange.
    pub async fn connect(
        role: Role,
        address: &str,
        port: u16,
        game: &GameConfig,
        options: &PeerOptions,
    ) -> Result<SyncPeer, SyncError> {
        let tcp = match role {
            Role::Listen => {
                let listener = TcpListener::bind((address, port))
                    .await
                    .map_err(|e| SyncError::Connection(e.to_string()))?;
                info!("waiting for a peer on {}:{}", address, port);
                let (tcp, remote) = listener
                    .accept()
                    .await
                    .map_err(|e| SyncError::Connection(e.to_string()))?;
                info!("peer connected from {}", remote);
                tcp
            }
            Role::Connect => {
                let dial = TcpStream::connect((address, port));
                let tcp = match options.connect_timeout {
                    Some(limit) => io::timeout(limit, dial).await,
                    None => dial.await,
                }
                .map_err(|e| SyncError::Connection(e.to_string()))?;
                info!("connected to {}:{}", address, port);
                tcp
            }
        };
        let _ = tcp.set_nodelay(true);
        let (sender, receiver, tcp) =
            Conn::open(tcp, options.ping_interval, options.max_data_size).into_parts();
        let mut peer = SyncPeer {
            role,
            game: *game,
            sender: PeerSender { sender, tcp },
            receiver: PeerReceiver {
                receiver,
                board_size: game.board_size,
            },
        };
        let handshake = peer.handshake();
        let result = match options.connect_timeout {
            Some(limit) => timeout(limit, handshake)
                .await
                .unwrap_or_else(|_| Err(SyncError::Handshake("no hello from peer".to_string()))),
            None => handshake.await,
        };
        if let Err(e) = result {
            error!("{}", e);
            peer.close();
            return Err(e);
        }
        info!("handshake with peer done, playing {}", peer.role.local_color());
        Ok(peer)
    }

    async fn handshake(&mut self) -> Result<(), SyncError> {
        let hello = PeerMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            board_size: self.game.board_size as u8,
            first_mover: self.game.first_mover,
        };
        self.sender.send(hello.clone()).await?;
        match self.receiver.next_message().await {
            Ok(reply) if reply == hello => Ok(()),
            Ok(PeerMessage::Hello {
                protocol_version,
                board_size,
                first_mover,
            }) => Err(SyncError::Handshake(format!(
                "peer wants protocol {} on {}x{} with {} first, expected protocol {} on {}x{} with {} first",
                protocol_version,
                board_size,
                board_size,
                first_mover,
                PROTOCOL_VERSION,
                self.game.board_size,
                self.game.board_size,
                self.game.first_mover
            ))),
            Ok(_) => Err(SyncError::Handshake("first message is not a hello".to_string())),
            Err(e) => Err(SyncError::Handshake(e.to_string())),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    pub async fn send_snapshot(&self, board: &Board) -> Result<(), SyncError> {
        self.sender.send_snapshot(board).await
    }

    pub async fn receive_snapshot(&mut self) -> Result<Board, SyncError> {
        self.receiver.receive_snapshot().await
    }

    /// Tell the peer we are quitting, then close.
    pub async fn leave(self) {
        self.sender.leave().await
    }

    /// Shut the stream down in both directions.
    pub fn close(&self) {
        self.sender.close()
    }

    /// Separate the halves so sending and receiving can run on
    /// different tasks.
    pub fn split(self) -> (PeerSender, PeerReceiver) {
        (self.sender, self.receiver)
    }
}

impl PeerSender {
    /// Queue the full board for the peer.
    pub async fn send_snapshot(&self, board: &Board) -> Result<(), SyncError> {
        #[cfg(debug_assertions)]
        trace!("sending snapshot, {} discs", board.occupied());
        self.send(PeerMessage::Snapshot(encode_board(board))).await
    }

    /// Send `Leave` and let the writer drain, which then shuts the
    /// stream down.
    pub async fn leave(self) {
        if self.send(PeerMessage::Leave).await.is_ok() {
            info!("left the game");
        }
    }

    /// Shut the stream down in both directions. A pending receive on the
    /// other half fails with `Transport`.
    pub fn close(&self) {
        let _ = self.tcp.shutdown(Shutdown::Both);
    }

    async fn send(&self, msg: PeerMessage) -> Result<(), SyncError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| SyncError::Transport("connection closed".to_string()))
    }
}

impl PeerReceiver {
    /// Wait for the next board from the peer. Pings are skipped.
    pub async fn receive_snapshot(&mut self) -> Result<Board, SyncError> {
        match self.next_message().await? {
            PeerMessage::Snapshot(bytes) => {
                let board = decode_board(&bytes).map_err(|e| SyncError::Decode(e.to_string()))?;
                if board.size() != self.board_size {
                    return Err(SyncError::Decode(format!(
                        "snapshot is {0}x{0}, game is {1}x{1}",
                        board.size(),
                        self.board_size
                    )));
                }
                Ok(board)
            }
            PeerMessage::Leave => Err(SyncError::PeerLeft),
            PeerMessage::Hello { .. } => Err(SyncError::Decode("unexpected hello".to_string())),
        }
    }

    async fn next_message(&mut self) -> Result<PeerMessage, SyncError> {
        loop {
            match self.receiver.next().await {
                Some(Received::Response(msg)) => return Ok(msg),
                Some(Received::Ping) => {}
                Some(Received::Error(ConnectionError::DecodeError)) => {
                    return Err(SyncError::Decode(ConnectionError::DecodeError.to_string()))
                }
                Some(Received::Error(e)) => return Err(SyncError::Transport(e.to_string())),
                Some(Received::RemoteError(e)) => {
                    return Err(SyncError::Transport(format!("peer reported {}", e)))
                }
                None => return Err(SyncError::Transport("connection closed".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod test_sync_peer {
    use super::*;
    use crate::game::{Color, Engine};
    use async_std::task;
    use futures::executor::block_on;
    use std::time::Duration;

    const LOCALHOST: &str = "127.0.0.1";

    fn options() -> PeerOptions {
        PeerOptions {
            ping_interval: None,
            ..PeerOptions::default()
        }
    }

    fn pinging() -> PeerOptions {
        PeerOptions {
            ping_interval: Some(Duration::from_millis(10)),
            ..PeerOptions::default()
        }
    }

    fn listen(
        port: u16,
        game: GameConfig,
        options: PeerOptions,
    ) -> task::JoinHandle<Result<SyncPeer, SyncError>> {
        task::spawn(async move {
            SyncPeer::connect(Role::Listen, LOCALHOST, port, &game, &options).await
        })
    }

    fn dial(port: u16, game: GameConfig, options: PeerOptions) -> Result<SyncPeer, SyncError> {
        block_on(async move {
            task::sleep(Duration::from_millis(100)).await;
            SyncPeer::connect(Role::Connect, LOCALHOST, port, &game, &options).await
        })
    }

    fn connected_pair(port: u16, options: PeerOptions) -> (SyncPeer, SyncPeer) {
        let listener = listen(port, GameConfig::default(), options.clone());
        let connector = dial(port, GameConfig::default(), options).unwrap();
        (block_on(listener).unwrap(), connector)
    }

    #[test]
    fn test_handshake_and_exchange() {
        let (mut black, mut white) = connected_pair(47201, pinging());
        assert_eq!(black.role(), Role::Listen);
        assert_eq!(white.role(), Role::Connect);

        let mut engine = Engine::new(GameConfig::default()).unwrap();
        engine.apply_move(2, 4, Color::White).unwrap();
        block_on(white.send_snapshot(engine.board())).unwrap();
        let received = block_on(black.receive_snapshot()).unwrap();
        assert_eq!(&received, engine.board());

        // let a few pings through before answering
        block_on(task::sleep(Duration::from_millis(50)));
        engine.apply_move(2, 3, Color::Black).unwrap();
        block_on(black.send_snapshot(engine.board())).unwrap();
        assert_eq!(&block_on(white.receive_snapshot()).unwrap(), engine.board());
    }

    #[test]
    fn test_snapshots_arrive_in_order() {
        let (black, white) = connected_pair(47202, options());
        let (_black_sender, mut receiver) = black.split();
        let (sender, _white_receiver) = white.split();
        let boards: Vec<Board> = [4, 6, 8, 10]
            .iter()
            .map(|&n| Board::with_size(n).unwrap())
            .collect();
        block_on(async {
            sender.send_snapshot(&boards[2]).await.unwrap();
            let mut engine = Engine::new(GameConfig::default()).unwrap();
            engine.apply_move(3, 5, Color::White).unwrap();
            sender.send_snapshot(engine.board()).await.unwrap();
            assert_eq!(receiver.receive_snapshot().await.unwrap(), boards[2]);
            assert_eq!(&receiver.receive_snapshot().await.unwrap(), engine.board());
            // wrong size is refused
            sender.send_snapshot(&boards[0]).await.unwrap();
            assert!(matches!(
                receiver.receive_snapshot().await,
                Err(SyncError::Decode(_))
            ));
        });
    }

    #[test]
    fn test_mismatched_hello() {
        let listener = listen(47203, GameConfig::default(), options());
        let small = GameConfig {
            board_size: 6,
            first_mover: Color::White,
        };
        let connector = dial(47203, small, options());
        assert!(matches!(connector, Err(SyncError::Handshake(_))));
        assert!(matches!(block_on(listener), Err(SyncError::Handshake(_))));
    }

    #[test]
    fn test_close_unblocks_receive() {
        let (_black, white) = connected_pair(47204, options());
        let (sender, mut receiver) = white.split();
        let pending = task::spawn(async move { receiver.receive_snapshot().await });
        block_on(task::sleep(Duration::from_millis(50)));
        sender.close();
        assert!(matches!(block_on(pending), Err(SyncError::Transport(_))));
    }

    #[test]
    fn test_leave_is_reported() {
        let (mut black, white) = connected_pair(47205, options());
        block_on(white.leave());
        assert_eq!(block_on(black.receive_snapshot()), Err(SyncError::PeerLeft));
    }

    #[test]
    fn test_nobody_listening() {
        let result = block_on(SyncPeer::connect(
            Role::Connect,
            LOCALHOST,
            47299,
            &GameConfig::default(),
            &options(),
        ));
        assert!(matches!(result, Err(SyncError::Connection(_))));
    }
}
