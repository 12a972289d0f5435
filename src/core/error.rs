use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the lain assistant
#[derive(Error, Debug)]
pub enum LainError {
    /// A command name was registered twice through the strict path
    #[error("Command '{0}' is already registered")]
    DuplicateCommand(String),

    /// No handler is registered under the requested name
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Connection-level failure talking to the chat endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// The chat endpoint answered with a non-success status
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// One streamed chunk could not be parsed; the stream itself continues
    #[error("Malformed stream chunk: {0}")]
    ChunkParse(String),

    /// A required command argument is absent
    #[error("Missing argument. Usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("The file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The stream was interrupted by the user
    #[error("Interrupted")]
    Cancelled,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// Failures from the git executable
    #[error("Git error: {0}")]
    Git(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for LainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LainError::Transport(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LainError::Transport(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            LainError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            LainError::Transport(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for LainError {
    fn from(err: serde_json::Error) -> Self {
        LainError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for LainError {
    fn from(err: serde_yml::Error) -> Self {
        LainError::Serialization(format!("YAML error: {}", err))
    }
}

impl From<rustyline::error::ReadlineError> for LainError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        LainError::Input(format!("Input error: {}", err))
    }
}
