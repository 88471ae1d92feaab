use crate::game::Color;
use anyhow::Error;
use bincode::config::Configuration;
use bincode::{config, Decode, Encode};
use bincode::{decode_from_slice, encode_to_vec};

const BIN_CONFIG: Configuration = config::standard().with_variable_int_encoding();

/// bumped on any incompatible change of `PeerMessage` or the snapshot layout
pub const PROTOCOL_VERSION: u8 = 1;

/// Everything two peers say to each other.
#[derive(Clone, PartialEq, Debug, Encode, Decode)]
pub enum PeerMessage {
    /// first message on both sides, the game both peers agree to play
    Hello {
        protocol_version: u8,
        board_size: u8,
        first_mover: Color,
    },
    /// full board after the sender's move, in snapshot layout
    Snapshot(Vec<u8>),
    /// sender is quitting on purpose
    Leave,
}

impl From<PeerMessage> for Vec<u8> {
    fn from(msg: PeerMessage) -> Self {
        encode_to_vec(msg, BIN_CONFIG).unwrap()
    }
}

impl TryFrom<Vec<u8>> for PeerMessage {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        match decode_from_slice(&value, BIN_CONFIG) {
            Ok((msg, read)) if read == value.len() => Ok(msg),
            Ok(_) => Err(Error::msg("peer message has trailing bytes")),
            Err(e) => Err(Error::msg(format!("peer message decode error: {}", e))),
        }
    }
}
