//! The uniform result shape returned by every facade operation.

use serde::Serialize;

use crate::error::GitError;
use crate::runner::{CommandResult, Invocation};

/// Code used for failures that did not come from a git exit status.
pub const INTERNAL_FAILURE_CODE: i32 = -1;

/// Classification of failures that are not plain git exit codes. A git exit
/// carries no kind, however the envelope was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SpawnFailure,
    BinaryFile,
    NotFound,
    InvalidRequest,
    Internal,
}

/// `{code, message, command, kind, ...payload}`.
///
/// The payload is flattened into the top-level object, so a status result
/// serializes as `{"code": 0, "files": [...]}`. A failure never carries a
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult<T = ()> {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(flatten)]
    pub payload: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn success(payload: T) -> Self {
        OperationResult {
            code: 0,
            message: None,
            command: None,
            kind: None,
            payload: Some(payload),
        }
    }

    /// Success with no payload.
    pub fn ok() -> Self {
        OperationResult {
            code: 0,
            message: None,
            command: None,
            kind: None,
            payload: None,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        OperationResult {
            code,
            message: Some(message.into()),
            command: None,
            kind: None,
            payload: None,
        }
    }

    /// Envelope for a command that exited non-zero: the code is git's, the
    /// message is its stderr.
    pub fn tool_failure(result: &CommandResult, invocation: &Invocation) -> Self {
        OperationResult {
            code: result.exit_code,
            message: Some(result.stderr.trim().to_string()),
            command: Some(invocation.display_command()),
            kind: None,
            payload: None,
        }
    }

    /// Parses stdout on success, otherwise reports the tool failure.
    pub fn from_output<F>(result: &CommandResult, invocation: &Invocation, parse: F) -> Self
    where
        F: FnOnce(&str) -> T,
    {
        if result.is_success() {
            Self::success(parse(&result.stdout))
        } else {
            Self::tool_failure(result, invocation)
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Re-types a payload-less result, keeping code and messages.
    pub fn without_payload<U>(self) -> OperationResult<U> {
        OperationResult {
            code: self.code,
            message: self.message,
            command: self.command,
            kind: self.kind,
            payload: None,
        }
    }
}

impl OperationResult<()> {
    /// Payload-less envelope for a command whose output is not interpreted.
    pub fn from_status(result: &CommandResult, invocation: &Invocation) -> Self {
        if result.is_success() {
            Self::ok()
        } else {
            Self::tool_failure(result, invocation)
        }
    }
}

impl<T> From<GitError> for OperationResult<T> {
    fn from(err: GitError) -> Self {
        let message = err.to_string();
        let (code, command, kind) = match err {
            GitError::Spawn { .. } => (INTERNAL_FAILURE_CODE, None, Some(ErrorKind::SpawnFailure)),
            GitError::Tool { code, command, .. } => (code, Some(command), None),
            GitError::Precondition { code, .. } => (code, None, None),
            GitError::BinaryFile { .. } => (INTERNAL_FAILURE_CODE, None, Some(ErrorKind::BinaryFile)),
            GitError::NotFound { .. } => (INTERNAL_FAILURE_CODE, None, Some(ErrorKind::NotFound)),
            GitError::UnknownSpecialRef(_) | GitError::InvalidRequest(_) => {
                (INTERNAL_FAILURE_CODE, None, Some(ErrorKind::InvalidRequest))
            }
            GitError::Io(_) | GitError::Settings(_) => {
                (INTERNAL_FAILURE_CODE, None, Some(ErrorKind::Internal))
            }
        };
        OperationResult {
            code,
            message: Some(message),
            command,
            kind,
            payload: None,
        }
    }
}
