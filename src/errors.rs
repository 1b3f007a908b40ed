//! Operational errors and the success/failure envelope returned by the
//! top-level operations.
//!
//! Step-level problems never surface here; they are recorded in step and
//! scenario results. This module covers faults in the engine's own loading,
//! configuration, and output handling.
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Engine faults with a known remediation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no command handler configured")]
    HandlerNotConfigured,
    #[error("command handler {command:?} is unavailable: {reason}")]
    HandlerUnavailable { command: String, reason: String },
    #[error("{} already exists", .path.display())]
    FileExists { path: PathBuf },
    #[error("{} is missing required field `{field}`", .path.display())]
    MissingField { path: PathBuf, field: String },
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("{} not found", .path.display())]
    NotFound { path: PathBuf },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::HandlerNotConfigured | EngineError::HandlerUnavailable { .. } => {
                "HANDLER_NOT_CONFIGURED"
            }
            EngineError::FileExists { .. } => "FILE_EXISTS",
            EngineError::MissingField { .. } => "MISSING_FIELD",
            EngineError::Parse { .. } => "PARSE_ERROR",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            EngineError::HandlerNotConfigured => Some(
                "pass --handler \"<command line>\" or set `handler` in the config file".to_string(),
            ),
            EngineError::HandlerUnavailable { .. } => Some(
                "check that the handler program is installed and on PATH".to_string(),
            ),
            EngineError::FileExists { .. } => {
                Some("choose another output path or pass --force to overwrite".to_string())
            }
            EngineError::MissingField { field, .. } => {
                Some(format!("add a `{field}` field to the scenario document"))
            }
            EngineError::Parse { .. } => {
                Some("fix the JSON syntax of the scenario document".to_string())
            }
            EngineError::NotFound { .. } => {
                Some("check the --scenarios path and try again".to_string())
            }
            EngineError::InvalidConfig(_) => None,
        }
    }
}

/// Structured failure returned by a top-level operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationalError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl OperationalError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Classify an error chain, preferring the first known engine fault.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = error_chain_message(err);
        if let Some(engine) = err.chain().find_map(|cause| cause.downcast_ref::<EngineError>()) {
            return Self {
                code: engine.code().to_string(),
                message,
                suggestion: engine.suggestion(),
            };
        }
        if err
            .chain()
            .any(|cause| cause.downcast_ref::<std::io::Error>().is_some())
        {
            return Self::new("IO_ERROR", message);
        }
        Self::new("INTERNAL_ERROR", message)
    }
}

impl std::fmt::Display for OperationalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error[{}]: {}", self.code, self.message)
    }
}

/// Uniform result of a top-level operation.
#[derive(Debug)]
pub enum Envelope<T> {
    Success { data: T },
    Failure { error: OperationalError },
}

impl<T> Envelope<T> {
    pub fn from_result(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(data) => Envelope::Success { data },
            Err(err) => {
                tracing::debug!(error = %err, "operation failed");
                Envelope::Failure {
                    error: OperationalError::from_anyhow(&err),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Envelope::Success { data } => Some(data),
            Envelope::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&OperationalError> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Failure { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, OperationalError> {
        match self {
            Envelope::Success { data } => Ok(data),
            Envelope::Failure { error } => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 2)?;
        match self {
            Envelope::Success { data } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Envelope::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

fn error_chain_message(err: &anyhow::Error) -> String {
    err.chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn engine_error_keeps_code_through_context() {
        let err = anyhow::Error::from(EngineError::FileExists {
            path: PathBuf::from("report.xml"),
        })
        .context("write report");
        let op = OperationalError::from_anyhow(&err);
        assert_eq!(op.code, "FILE_EXISTS");
        assert!(op.message.starts_with("write report: "));
        assert!(op.suggestion.is_some());
    }

    #[test]
    fn io_errors_are_classified() {
        let err = std::fs::read("/definitely/not/here")
            .context("read scenario")
            .expect_err("missing file");
        assert_eq!(OperationalError::from_anyhow(&err).code, "IO_ERROR");
    }

    #[test]
    fn unknown_errors_are_internal() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(OperationalError::from_anyhow(&err).code, "INTERNAL_ERROR");
    }

    #[test]
    fn envelope_serializes_uniformly() {
        let ok: Envelope<u32> = Envelope::Success { data: 3 };
        let value = serde_json::to_value(&ok).expect("serialize");
        assert_eq!(value, serde_json::json!({"success": true, "data": 3}));

        let failed: Envelope<u32> =
            Envelope::from_result(Err(EngineError::HandlerNotConfigured.into()));
        let value = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(value["success"], serde_json::json!(false));
        assert_eq!(value["error"]["code"], serde_json::json!("HANDLER_NOT_CONFIGURED"));
    }
}
