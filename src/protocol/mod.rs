pub mod command;

pub use command::*;

use thiserror::Error;

pub const VFSH_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error("Path {0} is not accessible")]
    PathEscape(String),

    #[error("{0}: no such file or directory")]
    NotFound(String),

    #[error("{0} is not a file")]
    NotAFile(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("Cannot remove {0}: it contains the current directory")]
    Busy(String),

    #[error("{0}")]
    Parse(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),
}

impl ShellError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short machine-readable tag, used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            ShellError::Archive(_) => "archive",
            ShellError::PathEscape(_) => "path_escape",
            ShellError::NotFound(_) => "not_found",
            ShellError::NotAFile(_) => "not_a_file",
            ShellError::NotADirectory(_) => "not_a_directory",
            ShellError::Busy(_) => "busy",
            ShellError::Parse(_) => "parse",
            ShellError::UnknownCommand(_) => "unknown_command",
            ShellError::Io { .. } => "io",
            ShellError::Config(_) => "config",
            ShellError::Interrupted(_) => "interrupted",
        }
    }
}

pub type ShellResult<T> = Result<T, ShellError>;
