//! Command Handler capability and the result envelope it returns.
//!
//! The engine never looks inside a handler: it sends a command name plus a
//! resolved JSON input and classifies whatever comes back.
mod memory;
mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::{InMemoryHandler, RecordedCall};
pub use process::ProcessHandler;

/// Single-method capability that executes a named command.
///
/// A returned `CommandResult::Failure` is a legitimate answer that
/// expectations can check; an `Err(HandlerFault)` means the handler itself
/// broke and the step is classified as `error`.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, command: &str, input: Value) -> Result<CommandResult, HandlerFault>;
}

/// Unexpected fault raised by a handler instead of a structured result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerFault {
    pub message: String,
}

impl HandlerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Structured error carried by a failed command result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl CommandError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            retryable: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of one command invocation.
///
/// Serialized in the `{success, data?, error?}` wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCommandResult", into = "WireCommandResult")]
pub enum CommandResult {
    Success { data: Option<Value> },
    Failure { error: CommandError },
}

impl CommandResult {
    pub fn success(data: Value) -> Self {
        CommandResult::Success { data: Some(data) }
    }

    pub fn empty_success() -> Self {
        CommandResult::Success { data: None }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        CommandResult::Failure {
            error: CommandError::new(code, message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            CommandResult::Success { data } => data.as_ref(),
            CommandResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&CommandError> {
        match self {
            CommandResult::Success { .. } => None,
            CommandResult::Failure { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireCommandResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CommandError>,
}

impl TryFrom<WireCommandResult> for CommandResult {
    type Error = String;

    fn try_from(wire: WireCommandResult) -> Result<Self, Self::Error> {
        if wire.success {
            return Ok(CommandResult::Success { data: wire.data });
        }
        match wire.error {
            Some(error) => Ok(CommandResult::Failure { error }),
            None => Err("failed command result must include an error object".to_string()),
        }
    }
}

impl From<CommandResult> for WireCommandResult {
    fn from(result: CommandResult) -> Self {
        match result {
            CommandResult::Success { data } => WireCommandResult {
                success: true,
                data,
                error: None,
            },
            CommandResult::Failure { error } => WireCommandResult {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}
