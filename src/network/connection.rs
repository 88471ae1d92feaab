//! Turns a TCP stream into a typed `Sender` / `Stream` pair.
//!
//! Frames on the wire:
//!
//! ```text
//! DATA  : [0][LEN: u32 BE][PAYLOAD][CRC32(PAYLOAD): u32 BE]
//! PING  : [100]
//! ERROR : [200][CODE: u8]
//! ```
//!
//! One task writes outbound messages, one task reads and decodes inbound
//! frames, and an optional task pings the remote at a fixed interval.
//!
//! - Dropping every `Sender<Msg>` lets the writer drain, then shuts the
//!   stream down.
//! - A failed write (message or ping) shuts down both directions, so the
//!   inbound stream eventually ends.
//! - Inbound framing errors are reported locally as `Received::Error`, sent
//!   to the remote as an `ERROR` frame, and the connection is closed.
//! - `Conn::shutdown` closes both directions at once; pending reads end.
use crate::network::utility;
use async_std::channel::{bounded, Receiver, Sender};
use async_std::io::BufReader;
use async_std::net::TcpStream;
use async_std::prelude::Stream;
use async_std::task;
use crc32fast::hash as checksum;
use futures::{AsyncWriteExt, StreamExt};
#[allow(unused_imports)]
use log::{debug, trace};
use std::fmt::{Debug, Display, Formatter};
use std::io::ErrorKind;
use std::net::Shutdown;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

const NET_CHANNEL_SIZE: usize = 20;

/// Connection portal.
///
/// The first type parameter is the type of messages sent,
/// the second type parameter is the type of responses received.
pub struct Conn<Msg, Rsp> {
    sender: Sender<Msg>,
    receiver: Receiver<Received<Rsp>>,
    tcp: TcpStream,
}

/// wrapper of responses received
pub enum Received<T> {
    /// normal message received
    Response(T),
    /// ping
    Ping,
    /// local socket error
    Error(ConnectionError),
    /// remote socket error: reason for connection close
    RemoteError(ConnectionError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    /// Attempting to send or receive over-sized data payload
    MaxDataLengthExceeded,
    /// Cannot decode message type
    UnknownMessageType,
    /// checksum incorrect
    DataCorrupted,
    /// `TryFrom<Vec<u8>>` returned error
    DecodeError,
    /// Cannot decode error message
    UnknownError,
}

impl<Msg, Rsp> Conn<Msg, Rsp>
where
    Msg: Send + 'static + Into<Vec<u8>>,
    Rsp: Send + 'static + TryFrom<Vec<u8>>,
{
    /// Spawn the reader, writer and (if `ping_interval` is set) ping tasks.
    pub fn open(tcp: TcpStream, ping_interval: Option<Duration>, max_data_size: u32) -> Self {
        let (msg_sender, msg_receiver) = bounded(NET_CHANNEL_SIZE);
        let (rsp_sender, rsp_receiver) = bounded(NET_CHANNEL_SIZE);
        if let Some(ping_interval) = ping_interval {
            send_ping::<Msg>(&tcp, ping_interval);
        }
        send_messages(&tcp, msg_receiver, max_data_size);
        retrieve_messages::<Msg, Rsp>(&tcp, rsp_sender, max_data_size);
        Conn {
            sender: msg_sender,
            receiver: rsp_receiver,
            tcp,
        }
    }
}

impl<Msg, Rsp> Conn<Msg, Rsp> {
    pub fn sender(&self) -> &Sender<Msg> {
        &self.sender
    }

    /// Close both directions now.
    ///
    /// The reader task sees end of stream, so the inbound stream ends
    /// instead of waiting for the remote.
    pub fn shutdown(&self) {
        let _ = self.tcp.shutdown(Shutdown::Both);
    }

    /// Separate the outbound and inbound halves.
    ///
    /// The returned `TcpStream` handle can still be used to shut the
    /// connection down.
    pub fn into_parts(self) -> (Sender<Msg>, Receiver<Received<Rsp>>, TcpStream) {
        (self.sender, self.receiver, self.tcp)
    }
}

impl<Msg, Rsp> Stream for Conn<Msg, Rsp> {
    type Item = Received<Rsp>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

enum MessageType<Msg> {
    Data(Msg),
    Ping,
    Error(ConnectionError),
}

// message types
const DATA: u8 = 0;
const PING: u8 = 100;
const ERROR: u8 = 200;

/// This function takes the ownership of the only instance of `Sender<Rsp>`.
///
/// Dropping the receiver of responses closes the read side.
fn retrieve_messages<Msg, Rsp>(
    tcp: &TcpStream,
    rsp_sender: Sender<Received<Rsp>>,
    max_data_size: u32,
) where
    Msg: Send + 'static + Into<Vec<u8>>,
    Rsp: Send + 'static + TryFrom<Vec<u8>>,
{
    let mut tcp = tcp.clone();
    let inner = tcp.clone();
    task::spawn(async move {
        let mut reader = BufReader::new(inner);
        loop {
            match read_rsp::<Rsp>(&mut reader, max_data_size).await {
                Ok(Some(rsp)) => {
                    if rsp_sender.send(rsp).await.is_err() {
                        let _ = tcp.shutdown(Shutdown::Read);
                        break;
                    }
                }
                // no more message to read
                Ok(None) => {
                    let _ = tcp.shutdown(Shutdown::Read);
                    break;
                }
                Err(e) => {
                    debug!("closing connection on inbound error: {}", e);
                    let _ = rsp_sender.send(Received::Error(e.clone())).await;
                    let _ = write_msg::<Msg>(&mut tcp, MessageType::Error(e), 0).await;
                    let _ = tcp.shutdown(Shutdown::Both);
                    break;
                }
            }
        }
        #[cfg(debug_assertions)]
        trace!("connection reader stopped");
    });
}

/// This function takes the ownership of `Receiver<Msg>`.
///
/// Oversized messages are dropped; any other write error closes *both*
/// sides of the connection. Once all senders are gone the connection is
/// shut down.
fn send_messages<Msg>(tcp: &TcpStream, mut msg_receiver: Receiver<Msg>, max_data_size: u32)
where
    Msg: Send + 'static + Into<Vec<u8>>,
{
    let mut tcp = tcp.clone();
    task::spawn(async move {
        while let Some(msg) = msg_receiver.next().await {
            let write_result =
                write_msg(&mut tcp, MessageType::Data::<Msg>(msg), max_data_size).await;
            if let Err(e) = write_result {
                if e.kind() == ErrorKind::InvalidData {
                    debug!("outbound message exceeds {} bytes, dropped", max_data_size);
                    continue;
                }
                debug!("write failed: {}", e);
                let _ = tcp.shutdown(Shutdown::Both);
                return;
            }
        }
        let _ = tcp.shutdown(Shutdown::Both);
    });
}

/// Check if tcp connection is still alive by pinging,
/// shutdown connection when pinging fails.
fn send_ping<Msg>(tcp: &TcpStream, ping_interval: Duration)
where
    Msg: Into<Vec<u8>> + Send + 'static,
{
    let mut tcp = tcp.clone();
    task::spawn(async move {
        loop {
            task::sleep(ping_interval).await;
            if write_msg(&mut tcp, MessageType::Ping::<Msg>, 0)
                .await
                .is_err()
            {
                let _ = tcp.shutdown(Shutdown::Both);
                break;
            }
        }
    });
}

/// `Ok(Some)` if read succeed.
/// `Ok(None)` if no more data to read.
///
/// `Err()` if error occurred:
/// - DecodeError: fail to decode payload bytes
/// - MaxDataLengthExceeded: data payload too long
/// - DataCorrupted: checksum does not match
/// - UnknownMessageType: message type byte does not match
async fn read_rsp<Rsp>(
    reader: &mut BufReader<TcpStream>,
    max_data_size: u32,
) -> Result<Option<Received<Rsp>>, ConnectionError>
where
    Rsp: TryFrom<Vec<u8>> + 'static,
{
    let packet_type = match utility::read_one_byte(reader).await {
        None => return Ok(None),
        Some(pt) => pt,
    };
    match packet_type {
        DATA => {
            let size = match utility::read_be_u32(reader).await {
                None => return Ok(None),
                Some(s) => s,
            };
            if size > max_data_size {
                return Err(ConnectionError::MaxDataLengthExceeded);
            }
            let pay_load = match utility::read_n_bytes(reader, size).await {
                None => return Ok(None),
                Some(s) => s,
            };
            let check_sum = match utility::read_be_u32(reader).await {
                None => return Ok(None),
                Some(s) => s,
            };
            if checksum(&pay_load) != check_sum {
                Err(ConnectionError::DataCorrupted)
            } else {
                match Rsp::try_from(pay_load) {
                    Ok(rsp) => Ok(Some(Received::Response(rsp))),
                    Err(_) => Err(ConnectionError::DecodeError),
                }
            }
        }
        ERROR => {
            let error_code = match utility::read_one_byte(reader).await {
                None => return Ok(None),
                Some(s) => s,
            };
            Ok(Some(Received::RemoteError(
                ConnectionError::from_error_code(error_code),
            )))
        }
        PING => Ok(Some(Received::Ping)),
        _ => Err(ConnectionError::UnknownMessageType),
    }
}

/// Attempt to write message to TcpStream.
///
/// If payload too large, return `InvalidData`.
async fn write_msg<Msg>(
    tcp: &mut TcpStream,
    msg: MessageType<Msg>,
    max_data_size: u32,
) -> std::io::Result<()>
where
    Msg: Into<Vec<u8>>,
{
    match msg {
        MessageType::Data(msg) => {
            let bytes = wrap_data_payload(&msg.into(), max_data_size)?;
            tcp.write_all(&bytes).await
        }
        MessageType::Error(e) => {
            let err_code = [ERROR, e.error_code()];
            tcp.write_all(&err_code).await
        }
        MessageType::Ping => tcp.write_all(&[PING]).await,
    }
}

/// Write data bytes and checksum.
///
/// structure: `[TYPE, SIZE, PAYLOAD, CHECKSUM]`
#[inline]
fn wrap_data_payload(payload: &[u8], max_data_len: u32) -> std::io::Result<Vec<u8>> {
    let size = payload.len();
    if size > max_data_len as usize {
        return Err(std::io::Error::from(ErrorKind::InvalidData));
    }
    // type + payload size + payload + checksum
    let mut dat = Vec::with_capacity(1 + 4 + size + 4);
    dat.push(DATA);
    dat.extend((size as u32).to_be_bytes());
    dat.extend(payload);
    dat.extend(checksum(payload).to_be_bytes());
    Ok(dat)
}

impl ConnectionError {
    fn error_code(&self) -> u8 {
        match self {
            // UnknownError won't get sent
            ConnectionError::UnknownError => 100,
            ConnectionError::MaxDataLengthExceeded => 200,
            ConnectionError::UnknownMessageType => 201,
            ConnectionError::DecodeError => 202,
            ConnectionError::DataCorrupted => 203,
        }
    }

    fn from_error_code(code: u8) -> Self {
        match code {
            200 => ConnectionError::MaxDataLengthExceeded,
            201 => ConnectionError::UnknownMessageType,
            202 => ConnectionError::DecodeError,
            203 => ConnectionError::DataCorrupted,
            _ => ConnectionError::UnknownError,
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::MaxDataLengthExceeded => f.write_str("data payload too large"),
            ConnectionError::UnknownMessageType => f.write_str("unknown message type"),
            ConnectionError::DataCorrupted => f.write_str("checksum mismatch"),
            ConnectionError::DecodeError => f.write_str("cannot decode payload"),
            ConnectionError::UnknownError => f.write_str("unknown error"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl<T> Debug for Received<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Received::Response(_) => f.write_str("Received::Response"),
            Received::Ping => f.write_str("Received::Ping"),
            Received::Error(e) => write!(f, "Received::Error({:?})", e),
            Received::RemoteError(e) => write!(f, "Received::RemoteError({:?})", e),
        }
    }
}

#[cfg(test)]
mod test_network_module {
    use super::*;
    use async_std::net::TcpListener;
    use futures::executor::block_on;
    use rand::random;
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::sync::Arc;

    struct NotEmpty(Vec<u8>);

    impl TryFrom<Vec<u8>> for NotEmpty {
        type Error = ();
        fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
            if value.is_empty() {
                Err(())
            } else {
                Ok(NotEmpty(value))
            }
        }
    }

    fn test_address(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port))
    }

    fn start_server(port: u16) -> Receiver<(TcpStream, SocketAddr)> {
        let (s, conn_receiver) = bounded(1);
        task::spawn(async move {
            let server = TcpListener::bind(test_address(port)).await.unwrap();
            loop {
                let conn = server.accept().await.unwrap();
                if s.send(conn).await.is_err() {
                    break;
                }
            }
        });
        conn_receiver
    }

    fn connect(port: u16) -> TcpStream {
        block_on(async move {
            task::sleep(Duration::from_millis(100)).await;
            TcpStream::connect(test_address(port)).await
        })
        .unwrap()
    }

    fn gen_rand_bytes(number: u16, length: u8) -> Vec<Vec<u8>> {
        (0..number)
            .map(|_| (0..length).map(|_| random()).collect())
            .collect()
    }

    #[test]
    fn send_bytes_from_server_ping() {
        let mut conn = start_server(47101);
        let rand_bytes = Arc::new(gen_rand_bytes(100, 5));
        let rand_bytes_clone = rand_bytes.clone();

        task::spawn(async move {
            let (tcp, _) = conn.next().await.unwrap();
            let server: Conn<Vec<u8>, Vec<u8>> =
                Conn::open(tcp, Some(Duration::from_millis(10)), 128);
            for bytes in rand_bytes_clone.iter() {
                task::sleep(Duration::from_millis(2)).await;
                server.sender().send(bytes.clone()).await.unwrap();
            }
        });

        let mut client: Conn<Vec<u8>, Vec<u8>> =
            Conn::open(connect(47101), Some(Duration::from_millis(10)), 128);
        let responses = block_on(async move {
            let mut responses: Vec<Vec<u8>> = Vec::with_capacity(100);
            while let Some(b) = client.next().await {
                match b {
                    Received::Response(b) => responses.push(b),
                    Received::Ping => {}
                    other => panic!("error receiving message: {:?}", other),
                }
            }
            responses
        });

        assert_eq!(*rand_bytes, responses)
    }

    #[test]
    fn send_bytes_from_client() {
        let mut conn = start_server(47102);
        let rand_bytes = Arc::new(gen_rand_bytes(100, 5));
        let rand_bytes_clone = rand_bytes.clone();

        let server_future = task::spawn(async move {
            let (tcp, _) = conn.next().await.unwrap();
            let server: Conn<Vec<u8>, Vec<u8>> = Conn::open(tcp, None, 128);
            server
        });

        let client: Conn<Vec<u8>, Vec<u8>> = Conn::open(connect(47102), None, 128);
        task::spawn(async move {
            for bytes in rand_bytes_clone.iter() {
                client.sender().send(bytes.clone()).await.unwrap();
            }
        });
        let responses = block_on(async move {
            let mut responses: Vec<Vec<u8>> = Vec::with_capacity(100);
            let mut server = server_future.await;
            while let Some(b) = server.next().await {
                match b {
                    Received::Response(b) => responses.push(b),
                    other => panic!("error receiving message: {:?}", other),
                }
            }
            responses
        });

        assert_eq!(*rand_bytes, responses)
    }

    #[test]
    fn send_bytes_decode_fail() {
        let mut conn = start_server(47103);

        let server_future = task::spawn(async move {
            let (tcp, _) = conn.next().await.unwrap();
            let server: Conn<Vec<u8>, Vec<u8>> = Conn::open(tcp, None, 128);
            let _ = server.sender().send(vec![0]).await;
            let _ = server.sender().send(Vec::new()).await;
            server
        });

        let mut client: Conn<Vec<u8>, NotEmpty> = Conn::open(connect(47103), None, 128);
        let responses = block_on(async move {
            let mut responses: Vec<Received<NotEmpty>> = Vec::new();
            while let Some(b) = client.next().await {
                responses.push(b);
            }
            responses
        });

        let server_msg = block_on(async move {
            let mut server = server_future.await;
            let mut msg: Vec<Received<Vec<u8>>> = Vec::new();
            while let Some(b) = server.next().await {
                msg.push(b);
            }
            msg
        });

        assert_eq!(responses.len(), 2);
        assert_eq!(server_msg.len(), 1);
        assert!(matches!(responses[0], Received::Response(_)));
        assert!(matches!(
            responses[1],
            Received::Error(ConnectionError::DecodeError)
        ));
        assert!(matches!(
            server_msg[0],
            Received::RemoteError(ConnectionError::DecodeError)
        ));
    }

    #[test]
    fn corrupted_frame_is_rejected() {
        let mut conn = start_server(47104);

        let raw_writer = task::spawn(async move {
            let (mut tcp, _) = conn.next().await.unwrap();
            let mut frame = wrap_data_payload(&[1, 2, 3], 128).unwrap();
            let last = frame.len() - 1;
            frame[last] ^= 0xff;
            tcp.write_all(&frame).await.unwrap();
            tcp
        });

        let mut client: Conn<Vec<u8>, Vec<u8>> = Conn::open(connect(47104), None, 128);
        let first = block_on(client.next());
        assert!(matches!(
            first,
            Some(Received::Error(ConnectionError::DataCorrupted))
        ));
        assert!(block_on(client.next()).is_none());
        drop(block_on(raw_writer));
    }

    #[test]
    fn oversized_message_is_dropped() {
        let mut conn = start_server(47105);

        let server_future = task::spawn(async move {
            let (tcp, _) = conn.next().await.unwrap();
            let server: Conn<Vec<u8>, Vec<u8>> = Conn::open(tcp, None, 4);
            let _ = server.sender().send(vec![9; 16]).await;
            let _ = server.sender().send(vec![1, 2]).await;
            server
        });

        let mut client: Conn<Vec<u8>, Vec<u8>> = Conn::open(connect(47105), None, 4);
        let server = block_on(server_future);
        let first = block_on(client.next());
        assert!(matches!(first, Some(Received::Response(ref b)) if b == &vec![1, 2]));
        drop(server);
        assert!(block_on(client.next()).is_none());
    }

    #[test]
    fn shutdown_ends_inbound_stream() {
        let mut conn = start_server(47106);

        let server_future = task::spawn(async move {
            let (tcp, _) = conn.next().await.unwrap();
            let server: Conn<Vec<u8>, Vec<u8>> = Conn::open(tcp, None, 128);
            server
        });

        let mut client: Conn<Vec<u8>, Vec<u8>> = Conn::open(connect(47106), None, 128);
        let _server = block_on(server_future);
        client.shutdown();
        assert!(block_on(client.next()).is_none());
    }
}
