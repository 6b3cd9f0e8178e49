use clap::Parser;
use std::path::PathBuf;

use crate::gesture::Edge;
use crate::interrupt::CallState;
use crate::models::SongId;

pub mod status;
pub use status::StatusDisplay;

/// Background audio playback engine
#[derive(Debug, Parser)]
#[command(name = "bgplayer")]
#[command(about = "Background audio player with serialized playback commands")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// TOML file listing the songs to play ([[songs]] tables)
    #[arg(short, long)]
    pub library: PathBuf,

    /// Configuration file (defaults to ~/.config/bgplayer/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Interactive commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Play a song from the library, optionally from a start position
    Play { id: SongId, start_ms: u64 },
    Pause,
    Resume,
    Next,
    Prev,
    /// Show the current song, state and play list
    Status,
    /// Show the most recent playback events
    History { count: usize },
    /// Simulate a telephony call state change
    Call { state: CallState },
    /// Simulate a media button edge
    Button { edge: Edge, timestamp_ms: Option<u64> },
    /// Discard the current song and remove it from the library
    Delete,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "play" => {
                let id = match args.get(1) {
                    Some(value) => value.parse::<SongId>().map_err(|_| ParseError::InvalidArgument {
                        argument: "song id".to_string(),
                        value: value.to_string(),
                        expected: "a number".to_string(),
                    })?,
                    None => {
                        return Err(ParseError::MissingArgument {
                            command: "play".to_string(),
                            argument: "song id".to_string(),
                        })
                    }
                };
                let start_ms = match args.get(2) {
                    Some(value) => Self::parse_position(value)?,
                    None => 0,
                };
                Ok(Commands::Play { id, start_ms })
            }
            "pause" => Ok(Commands::Pause),
            "resume" => Ok(Commands::Resume),
            "next" => Ok(Commands::Next),
            "prev" | "previous" => Ok(Commands::Prev),
            "status" => Ok(Commands::Status),
            "history" => {
                let count = match args.get(1) {
                    Some(value) => value.parse::<usize>().map_err(|_| ParseError::InvalidArgument {
                        argument: "count".to_string(),
                        value: value.to_string(),
                        expected: "a number".to_string(),
                    })?,
                    None => 10,
                };
                Ok(Commands::History { count })
            }
            "call" => {
                let value = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                    command: "call".to_string(),
                    argument: "state".to_string(),
                })?;
                let state = value.parse::<CallState>().map_err(|_| ParseError::InvalidArgument {
                    argument: "call state".to_string(),
                    value: value.to_string(),
                    expected: "idle, ringing or offhook".to_string(),
                })?;
                Ok(Commands::Call { state })
            }
            "button" => {
                let edge = match args.get(1).map(|value| value.to_lowercase()) {
                    Some(value) if value == "down" => Edge::Down,
                    Some(value) if value == "up" => Edge::Up,
                    Some(value) => {
                        return Err(ParseError::InvalidArgument {
                            argument: "edge".to_string(),
                            value,
                            expected: "down or up".to_string(),
                        })
                    }
                    None => {
                        return Err(ParseError::MissingArgument {
                            command: "button".to_string(),
                            argument: "edge".to_string(),
                        })
                    }
                };
                let timestamp_ms = match args.get(2) {
                    Some(value) => Some(value.parse::<u64>().map_err(|_| {
                        ParseError::InvalidArgument {
                            argument: "timestamp".to_string(),
                            value: value.to_string(),
                            expected: "milliseconds".to_string(),
                        }
                    })?),
                    None => None,
                };
                Ok(Commands::Button { edge, timestamp_ms })
            }
            "delete" => Ok(Commands::Delete),
            "help" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    /// Parse a start position: plain milliseconds ("1500"), seconds ("90s")
    /// or minutes and seconds ("1:30", "1:30.5")
    pub fn parse_position(input: &str) -> Result<u64, ParseError> {
        let trimmed = input.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: input.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }
            minutes
                .checked_mul(60_000)
                .and_then(|ms| ms.checked_add((seconds * 1000.0).round() as u64))
                .ok_or_else(invalid)
        } else if let Some(seconds) = trimmed.strip_suffix('s') {
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if seconds < 0.0 {
                return Err(invalid());
            }
            Ok((seconds * 1000.0).round() as u64)
        } else {
            trimmed.parse::<u64>().map_err(|_| invalid())
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("bgplayer - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play <id> [start]   - Play a song (start: ms, '90s' or '1:30')");
        println!("  pause               - Pause playback");
        println!("  resume              - Resume playback or the last session");
        println!("  next                - Next song (wraps around)");
        println!("  prev                - Previous song (wraps around)");
        println!("  delete              - Discard the current song");
        println!();
        println!("Information:");
        println!("  status              - Show current song and play list");
        println!("  history [n]         - Show the last n playback events");
        println!();
        println!("Simulated Inputs:");
        println!("  call <state>        - Call state: idle, ringing, offhook");
        println!("  button <edge> [ms]  - Media button edge: down, up");
        println!();
        println!("General:");
        println!("  help                - Show this help message");
        println!("  exit, quit          - Exit the player");
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },

    #[error("Help requested")]
    HelpRequested,
}
