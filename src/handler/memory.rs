//! In-process handler backed by registered closures.
//!
//! Used as a test double and for embedding the engine next to a command
//! registry that already lives in the same process.
use super::{CommandHandler, CommandResult, HandlerFault};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

type HandlerFuture = Pin<Box<dyn Future<Output = Result<CommandResult, HandlerFault>> + Send>>;
type AsyncCommandFn = dyn Fn(Value) -> HandlerFuture + Send + Sync;

/// Command invocation observed by an [`InMemoryHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub input: Value,
}

/// Handler that dispatches to closures registered by command name.
///
/// Unknown commands produce a structured `COMMAND_NOT_FOUND` failure, not a
/// fault, so scenarios can assert on them.
#[derive(Default)]
pub struct InMemoryHandler {
    commands: BTreeMap<String, Arc<AsyncCommandFn>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl InMemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous command.
    pub fn register<F>(&mut self, command: &str, handler: F) -> &mut Self
    where
        F: Fn(Value) -> Result<CommandResult, HandlerFault> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register_async(command, move |input| {
            let handler = Arc::clone(&handler);
            async move { handler(input) }
        })
    }

    /// Register a command whose body awaits (timers, channels, other tasks).
    pub fn register_async<F, Fut>(&mut self, command: &str, handler: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CommandResult, HandlerFault>> + Send + 'static,
    {
        let boxed: Arc<AsyncCommandFn> = Arc::new(move |input| Box::pin(handler(input)));
        self.commands.insert(command.to_string(), boxed);
        self
    }

    pub fn has(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    pub fn list_commands(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.command == command)
            .count()
    }
}

#[async_trait]
impl CommandHandler for InMemoryHandler {
    async fn execute(&self, command: &str, input: Value) -> Result<CommandResult, HandlerFault> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                command: command.to_string(),
                input: input.clone(),
            });
        let Some(handler) = self.commands.get(command).cloned() else {
            return Ok(CommandResult::failure(
                "COMMAND_NOT_FOUND",
                format!("command {command:?} is not registered"),
            ));
        };
        handler(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dispatches_and_records_calls() {
        let mut handler = InMemoryHandler::new();
        handler.register("echo", |input| Ok(CommandResult::success(input)));

        let result = handler
            .execute("echo", json!({"x": 1}))
            .await
            .expect("echo succeeds");
        assert_eq!(result.data(), Some(&json!({"x": 1})));
        assert_eq!(handler.call_count("echo"), 1);
        assert_eq!(handler.calls()[0].input, json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_command_is_structured_failure() {
        let handler = InMemoryHandler::new();
        let result = handler
            .execute("missing", Value::Null)
            .await
            .expect("unknown command is not a fault");
        assert_eq!(
            result.error().map(|e| e.code.as_str()),
            Some("COMMAND_NOT_FOUND")
        );
    }
}
