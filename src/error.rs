use thiserror::Error;

use crate::models::SongId;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resume point error: {0}")]
    Resume(#[from] ResumeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Engine(err) => err.user_message(),
            PlayerError::Queue(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Resume(err) => err.user_message(),
            PlayerError::Library(err) => err.user_message(),
            PlayerError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Engine(err) => err.recovery_suggestions(),
            PlayerError::Queue(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Resume(_) => vec![
                "Playback continues; only the resume point could not be stored".to_string(),
                "Check permissions of the resume file".to_string(),
            ],
            PlayerError::Library(err) => err.recovery_suggestions(),
            PlayerError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
        }
    }

    /// Check if this error allows the session to continue
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Engine(err) => err.is_recoverable(),
            PlayerError::Queue(err) => err.is_recoverable(),
            PlayerError::Config(_) => true, // Defaults are always usable
            PlayerError::Resume(_) => true,
            PlayerError::Library(_) => false,
            PlayerError::Parse(_) => false, // Parse errors require correct input
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Engine(EngineError::Load { .. }) => ErrorSeverity::Warning,
            PlayerError::Engine(EngineError::Fault(_)) => ErrorSeverity::Error,
            PlayerError::Queue(QueueError::Full { .. }) => ErrorSeverity::Info,
            PlayerError::Queue(QueueError::ShutDown) => ErrorSeverity::Warning,
            PlayerError::Queue(QueueError::Timeout { .. }) => ErrorSeverity::Warning,
            PlayerError::Queue(QueueError::Spawn(_)) => ErrorSeverity::Critical,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Resume(_) => ErrorSeverity::Warning,
            PlayerError::Library(LibraryError::SongNotFound { .. }) => ErrorSeverity::Info,
            PlayerError::Library(_) => ErrorSeverity::Error,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Errors raised by a media engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cannot load '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("Engine fault: {0}")]
    Fault(String),
}

impl EngineError {
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Load { path, .. } => {
                format!("Failed to play music: {}", path)
            }
            EngineError::Fault(msg) => {
                format!("Playback stopped unexpectedly: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            EngineError::Load { .. } => vec![
                "Check that the file still exists".to_string(),
                "Check that the file is a supported audio format".to_string(),
            ],
            EngineError::Fault(_) => vec![
                "Start playback again".to_string(),
                "Restart the player if the problem persists".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Load { .. } => false, // Requires a different file
            EngineError::Fault(_) => true,     // Next command starts from Stopped
        }
    }
}

/// Command queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Command queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("Command queue has been shut down")]
    ShutDown,

    #[error("No answer from the command queue within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("Failed to start queue worker: {0}")]
    Spawn(String),
}

impl QueueError {
    pub fn user_message(&self) -> String {
        match self {
            QueueError::Full { .. } => "Player is busy - command ignored".to_string(),
            QueueError::ShutDown => "Player has been shut down".to_string(),
            QueueError::Timeout { .. } => "Player is still busy - no answer yet".to_string(),
            QueueError::Spawn(msg) => format!("Player could not start: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            QueueError::Full { .. } => vec![
                "Wait a moment and repeat the command".to_string(),
                "Increase queue_capacity in the configuration".to_string(),
            ],
            QueueError::Timeout { .. } => vec!["Repeat the command in a moment".to_string()],
            QueueError::ShutDown | QueueError::Spawn(_) => vec!["Restart the player".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, QueueError::Full { .. } | QueueError::Timeout { .. })
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/bgplayer/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
            ConfigError::InvalidValue { field, .. } => vec![
                format!("Remove '{}' from the configuration to use its default", field),
            ],
        }
    }
}

/// Resume point persistence errors
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ResumeError {
    pub fn user_message(&self) -> String {
        match self {
            ResumeError::IoError(err) => format!("Cannot access resume file: {}", err),
            ResumeError::SerializationError(_) => "Failed to save the resume point".to_string(),
            ResumeError::DeserializationError(_) => {
                "Resume file is corrupted - last session cannot be resumed".to_string()
            }
        }
    }
}

/// Song library errors
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid library file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate song id: {id}")]
    DuplicateSong { id: SongId },

    #[error("Song not found: {id}")]
    SongNotFound { id: SongId },
}

impl LibraryError {
    pub fn user_message(&self) -> String {
        match self {
            LibraryError::IoError(err) => format!("Cannot read library file: {}", err),
            LibraryError::Parse(_) => "Library file has invalid format".to_string(),
            LibraryError::DuplicateSong { id } => {
                format!("Song id {} appears more than once in the library", id)
            }
            LibraryError::SongNotFound { id } => format!("No song with id {}", id),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            LibraryError::IoError(_) => vec!["Check the --library path".to_string()],
            LibraryError::Parse(_) => vec![
                "Each [[songs]] entry needs id, title, artist, album, duration_ms and file_path"
                    .to_string(),
            ],
            LibraryError::DuplicateSong { .. } => vec!["Give every song a unique id".to_string()],
            LibraryError::SongNotFound { .. } => {
                vec!["Use 'status' to see the songs in the play list".to_string()]
            }
        }
    }
}
