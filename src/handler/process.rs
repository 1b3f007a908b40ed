//! Live handler that delegates each command to an external process.
//!
//! The configured argv gets the command name appended, receives the resolved
//! input as one JSON document on stdin, and must print one command result
//! JSON document on stdout.
use super::{CommandHandler, CommandResult, HandlerFault};
use crate::errors::EngineError;
use crate::util::truncate_string;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const MAX_STDERR_BYTES: usize = 2048;

/// Handler that runs one process per step.
#[derive(Debug, Clone)]
pub struct ProcessHandler {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessHandler {
    /// Build a handler from a shell-style command line such as
    /// `"python3 backend.py --call"`.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let argv = shell_words::split(line).map_err(|err| EngineError::HandlerUnavailable {
            command: line.to_string(),
            reason: format!("cannot parse command line: {err}"),
        })?;
        let Some((program, args)) = argv.split_first() else {
            return Err(EngineError::HandlerUnavailable {
                command: line.to_string(),
                reason: "command line is empty".to_string(),
            }
            .into());
        };
        let program = which::which(program).map_err(|err| EngineError::HandlerUnavailable {
            command: line.to_string(),
            reason: format!("cannot locate {program:?}: {err}"),
        })?;
        Ok(Self {
            program,
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl CommandHandler for ProcessHandler {
    async fn execute(&self, command: &str, input: Value) -> Result<CommandResult, HandlerFault> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                HandlerFault::new(format!("spawn {}: {err}", self.program.display()))
            })?;

        let mut payload = serde_json::to_vec(&input)
            .map_err(|err| HandlerFault::new(format!("serialize input: {err}")))?;
        payload.push(b'\n');
        if let Some(mut stdin) = child.stdin.take() {
            // A handler may exit without reading its input.
            if let Err(err) = stdin.write_all(&payload).await {
                if err.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(HandlerFault::new(format!("write handler stdin: {err}")));
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| HandlerFault::new(format!("wait for handler: {err}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        match serde_json::from_str::<CommandResult>(stdout.trim()) {
            Ok(result) => Ok(result),
            Err(err) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(HandlerFault::new(format!(
                    "handler exited with {} without a valid command result ({err}); stderr: {}",
                    output.status,
                    truncate_string(stderr.trim(), MAX_STDERR_BYTES)
                )))
            }
        }
    }
}
