//! Launch options and connection tuning.
use crate::game::{Color, GameConfig};
use anyhow::{Error, Result};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

pub const USAGE: &str = "\
usage:
    reversi [local] [human|automated] [--size N]
    reversi listen <port> [human|automated] [bind address] [--size N]
    reversi connect <address> <port> [human|automated] [--size N]

The listening side plays black, the connecting side plays white.";

/// which end of the connection this process is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Listen,
    Connect,
}

impl Role {
    pub fn local_color(&self) -> Color {
        match self {
            Role::Listen => Color::Black,
            Role::Connect => Color::White,
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "listen" | "server" => Ok(Role::Listen),
            "connect" | "client" => Ok(Role::Connect),
            _ => Err(Error::msg(format!("unknown role `{}`", s))),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Listen => f.write_str("listen"),
            Role::Connect => f.write_str("connect"),
        }
    }
}

/// who picks the local moves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerKind {
    Human,
    Automated,
}

impl FromStr for PlayerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(PlayerKind::Human),
            "automated" | "auto" | "computer" => Ok(PlayerKind::Automated),
            _ => Err(Error::msg(format!("unknown player kind `{}`", s))),
        }
    }
}

/// Connection tuning for a sync peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerOptions {
    /// keep-alive ping period, `None` disables pinging
    pub ping_interval: Option<Duration>,
    /// upper bound for dialing, `None` waits as long as the OS does
    pub connect_timeout: Option<Duration>,
    /// largest accepted frame payload in bytes
    pub max_data_size: u32,
}

impl Default for PeerOptions {
    fn default() -> Self {
        PeerOptions {
            ping_interval: Some(Duration::from_secs(5)),
            connect_timeout: Some(Duration::from_secs(10)),
            max_data_size: 4 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// human or automated player against the computer
    Local,
    Network(Role),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    pub mode: Mode,
    /// bind address when listening, remote host when connecting
    pub address: String,
    pub port: u16,
    pub player: PlayerKind,
    pub game: GameConfig,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            mode: Mode::Local,
            address: DEFAULT_LISTEN_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            player: PlayerKind::Human,
            game: GameConfig::default(),
        }
    }
}

impl LaunchConfig {
    /// Parse command line arguments, program name excluded.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let (positional, board_size) = split_size_flag(args)?;
        let mut config = LaunchConfig::default();
        if let Some(size) = board_size {
            config.game.board_size = size;
        }
        let mut rest = positional.iter().map(String::as_str);
        match rest.next() {
            None => {}
            Some("local") => {
                if let Some(player) = rest.next() {
                    config.player = player.parse()?;
                }
            }
            Some(role) => {
                let role: Role = role.parse()?;
                config.mode = Mode::Network(role);
                match role {
                    Role::Listen => {
                        config.port = parse_port(rest.next())?;
                        if let Some(player) = rest.next() {
                            config.player = player.parse()?;
                        }
                        if let Some(address) = rest.next() {
                            config.address = address.to_string();
                        }
                    }
                    Role::Connect => {
                        config.address = rest
                            .next()
                            .ok_or_else(|| Error::msg("missing remote address"))?
                            .to_string();
                        config.port = parse_port(rest.next())?;
                        if let Some(player) = rest.next() {
                            config.player = player.parse()?;
                        }
                    }
                }
            }
        }
        if let Some(extra) = rest.next() {
            return Err(Error::msg(format!("unexpected argument `{}`", extra)));
        }
        Ok(config)
    }
}

fn parse_port(arg: Option<&str>) -> Result<u16> {
    let arg = arg.ok_or_else(|| Error::msg("missing port"))?;
    match arg.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::msg(format!("port must be within 1-65535, got `{}`", arg))),
    }
}

fn split_size_flag(args: &[String]) -> Result<(Vec<String>, Option<usize>)> {
    let mut positional = Vec::with_capacity(args.len());
    let mut size = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--size" || arg == "-s" {
            let value = iter
                .next()
                .ok_or_else(|| Error::msg("missing value for --size"))?;
            size = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| Error::msg(format!("invalid board size `{}`", value)))?,
            );
        } else {
            positional.push(arg.clone());
        }
    }
    Ok((positional, size))
}
