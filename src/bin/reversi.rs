use anyhow::{Error, Result};
use async_std::channel::Receiver;
use async_std::io::{stdin, BufReader, Stdin};
use async_std::task;
use async_std::task::{block_on, JoinHandle};
use futures::{AsyncBufReadExt, StreamExt};
use log::{error, info, warn, LevelFilter};
use reversi::config::USAGE;
use reversi::{
    encode_board, legal_moves, new_session, Board, BoardUpdate, Color, Commands, Engine, GameStatus,
    LaunchConfig, Mode, Opponent, PeerOptions, PlayerKind, Score, SessionConfig,
    SessionResponse, SyncPeer, UpdateOrigin,
};
use std::env;
use std::path::Path;

const SAVE_FILE: &str = "save_game.dat";

fn main() {
    env_logger::builder()
        .filter_module("reversi", LevelFilter::Info)
        .init();
    if let Err(e) = block_on(run()) {
        error!("stopped on error: {}", e);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let launch = match LaunchConfig::from_args(&args) {
        Ok(launch) => launch,
        Err(e) => {
            println!("{}\n{}", e, USAGE);
            return Err(e);
        }
    };
    let (session_config, engine, opponent) = match launch.mode {
        Mode::Local => {
            // the human side moves first in single machine play
            let local_color = launch.game.first_mover;
            let engine = match load_saved_board(launch.game.board_size) {
                Some(board) => {
                    info!("resuming saved game from {}", SAVE_FILE);
                    Engine::resume(board, local_color)
                }
                None => Engine::new(launch.game)?,
            };
            let config = SessionConfig {
                local_color,
                local_player: launch.player,
                seed: None,
            };
            (config, engine, Opponent::Computer)
        }
        Mode::Network(role) => {
            let engine = Engine::new(launch.game)?;
            let peer = SyncPeer::connect(
                role,
                &launch.address,
                launch.port,
                &launch.game,
                &PeerOptions::default(),
            )
            .await?;
            let config = SessionConfig {
                local_color: role.local_color(),
                local_player: launch.player,
                seed: None,
            };
            (config, engine, Opponent::Remote(peer))
        }
    };
    let local_game = launch.mode == Mode::Local;
    println!("you play {}", session_config.local_color);
    print_help();
    let (commands, responses) = new_session(session_config, engine, opponent);
    let _input = accept_input(stdin(), commands);
    print_session_responses(responses, session_config, local_game).await;
    Ok(())
}

fn accept_input(input: Stdin, commands: Commands) -> JoinHandle<()> {
    task::spawn(async move {
        let reader = BufReader::new(input);
        let mut lines = reader.lines();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => match parse_input(&line) {
                    Some(Input::Play(row, col)) => commands.play(row, col).await,
                    Some(Input::NewGame) => commands.new_game().await,
                    Some(Input::Quit) => {
                        commands.quit().await;
                        break;
                    }
                    None => print_help(),
                },
                Err(e) => {
                    warn!("read line error: {}", e);
                }
            }
        }
        // stdin closed
        commands.quit().await;
    })
}

enum Input {
    Play(usize, usize),
    NewGame,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim().to_lowercase();
    match line.as_str() {
        "new" | "new game" => return Some(Input::NewGame),
        "quit" | "exit" | "q" => return Some(Input::Quit),
        _ => {}
    }
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Input::Play(row, col))
}

async fn print_session_responses(
    mut responses: Receiver<SessionResponse>,
    config: SessionConfig,
    local_game: bool,
) {
    let mut last: Option<BoardUpdate> = None;
    while let Some(rsp) = responses.next().await {
        match rsp {
            SessionResponse::Update(update) => {
                print_update(&update, &config);
                if local_game && update.origin == UpdateOrigin::Reset {
                    remove_saved_board();
                }
                last = Some(update);
            }
            SessionResponse::GameOver(score) => {
                print_result(&score, config.local_color);
                if local_game {
                    remove_saved_board();
                }
            }
            SessionResponse::PeerLeft => println!("your opponent left the game"),
            SessionResponse::PeerDisconnected(e) => println!("connection to opponent lost: {}", e),
            SessionResponse::Stopped => break,
        }
    }
    if local_game {
        match last {
            Some(update) if matches!(update.status, GameStatus::InProgress(_)) => {
                save_board(&update.board)
            }
            _ => remove_saved_board(),
        }
    }
    println!("bye");
}

fn print_update(update: &BoardUpdate, config: &SessionConfig) {
    println!("\n{}", update.board);
    println!("{}", Score::of(&update.board));
    if let GameStatus::InProgress(side) = update.status {
        if side == config.local_color {
            if config.local_player == PlayerKind::Human {
                let hints: Vec<String> = legal_moves(&update.board, side)
                    .iter()
                    .map(|(row, col)| format!("{} {}", row, col))
                    .collect();
                println!("your move ({}): {}", side, hints.join(" | "));
            }
        } else {
            println!("waiting for {}", side);
        }
    }
}

fn print_result(score: &Score, local_color: Color) {
    println!("game over, {}", score);
    match score.winner() {
        Some(winner) if winner == local_color => println!("you win!"),
        Some(_) => println!("you lose."),
        None => println!("it's a tie."),
    }
}

fn print_help() {
    println!("enter `row col` to play, `new` for a new game, `quit` to leave");
}

fn load_saved_board(board_size: usize) -> Option<Board> {
    let path = Path::new(SAVE_FILE);
    if !path.exists() {
        return None;
    }
    let loaded = std::fs::read(path)
        .map_err(Error::from)
        .and_then(|bytes| Engine::deserialize_board(&bytes).map_err(Error::from));
    match loaded {
        Ok(board) if board.size() == board_size => Some(board),
        Ok(board) => {
            warn!(
                "saved game is {0}x{0}, expected {1}x{1}, starting over",
                board.size(),
                board_size
            );
            None
        }
        Err(e) => {
            warn!("cannot load {}: {}", SAVE_FILE, e);
            None
        }
    }
}

fn save_board(board: &Board) {
    let bytes = encode_board(board);
    match std::fs::write(SAVE_FILE, bytes) {
        Ok(_) => info!("game saved to {}", SAVE_FILE),
        Err(e) => error!("cannot save game: {}", e),
    }
}

fn remove_saved_board() {
    let path = Path::new(SAVE_FILE);
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("cannot remove {}: {}", SAVE_FILE, e);
        }
    }
}
