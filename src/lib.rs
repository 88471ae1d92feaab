pub mod config;
pub mod game;
pub(crate) mod network;
pub mod sync;

pub use config::{LaunchConfig, Mode, PeerOptions, PlayerKind, Role};
pub use game::*;
pub use sync::{
    new_session, Commands, Opponent, SessionConfig, SessionResponse, SyncError, SyncPeer,
};

pub(crate) const CHANNEL_SIZE: usize = 5;
