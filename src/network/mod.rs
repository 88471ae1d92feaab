//! Network Infrastructure
//!
//! Framed, checksummed message channels over a single TCP stream.
pub(crate) mod connection;
pub(crate) mod utility;
pub use connection::{Conn, ConnectionError, Received};
