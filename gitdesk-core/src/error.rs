use std::path::PathBuf;
use thiserror::Error;

use crate::runner::{CommandResult, Invocation};

/// Errors raised by the core.
///
/// A git command that runs and exits non-zero is *not* an error at this
/// level: it comes back as an [`OperationResult`](crate::OperationResult)
/// carrying the exit code. `Tool` is only used where a failed command
/// prevents a multi-step operation from producing any result at all.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// git ran and exited non-zero.
    #[error("{message}")]
    Tool {
        code: i32,
        command: String,
        message: String,
    },

    /// A local check failed before any command was attempted.
    #[error("{message}")]
    Precondition { code: i32, message: String },

    /// The file is treated as binary by git and cannot be returned as text.
    #[error("file '{filename}' is binary and has no plain-text content")]
    BinaryFile { filename: String },

    /// A working-tree file that was expected to exist is missing.
    #[error("No such file or directory: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("unknown special ref '{0}'")]
    UnknownSpecialRef(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, GitError>;

impl GitError {
    /// Error for a command whose failure leaves nothing to report but the
    /// failure itself.
    pub fn tool(result: &CommandResult, invocation: &Invocation) -> Self {
        GitError::Tool {
            code: result.exit_code,
            command: invocation.display_command(),
            message: result.stderr.trim().to_string(),
        }
    }
}
