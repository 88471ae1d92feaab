//! Two player play: the peer link and the session coordinator.
mod messages;
mod peer;
mod session;

pub use messages::{PeerMessage, PROTOCOL_VERSION};
pub use peer::{PeerReceiver, PeerSender, SyncError, SyncPeer};
pub use session::{new_session, Commands, Opponent, SessionConfig, SessionResponse};
