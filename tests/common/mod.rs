//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use scenario_eval::handler::{CommandResult, InMemoryHandler};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

/// Write a scenario document under `dir`, creating parent directories.
pub fn write_scenario(dir: &Path, rel: &str, scenario: &Value) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create scenario dir");
    }
    let text = serde_json::to_string_pretty(scenario).expect("serialize scenario");
    fs::write(&path, text).expect("write scenario");
    path
}

#[derive(Default)]
struct TodoState {
    next_id: u64,
    todos: BTreeMap<String, Value>,
}

/// A small stateful todo backend registered on an in-memory handler.
pub fn todo_handler() -> Arc<InMemoryHandler> {
    let state = Arc::new(Mutex::new(TodoState::default()));
    let mut handler = InMemoryHandler::new();

    let create_state = Arc::clone(&state);
    handler.register("todo-create", move |input| {
        let Some(title) = input.get("title").and_then(Value::as_str) else {
            return Ok(CommandResult::failure("VALIDATION_ERROR", "title is required"));
        };
        let mut state = create_state.lock().expect("todo state");
        state.next_id += 1;
        let id = format!("todo-{}", state.next_id);
        let todo = json!({"id": id, "title": title, "done": false});
        state.todos.insert(id, todo.clone());
        Ok(CommandResult::success(todo))
    });

    let get_state = Arc::clone(&state);
    handler.register("todo-get", move |input| {
        let id = input.get("id").and_then(Value::as_str).unwrap_or_default();
        let state = get_state.lock().expect("todo state");
        Ok(match state.todos.get(id) {
            Some(todo) => CommandResult::success(todo.clone()),
            None => CommandResult::failure("NOT_FOUND", format!("no todo {id:?}")),
        })
    });

    let complete_state = Arc::clone(&state);
    handler.register("todo-complete", move |input| {
        let id = input.get("id").and_then(Value::as_str).unwrap_or_default();
        let mut state = complete_state.lock().expect("todo state");
        Ok(match state.todos.get_mut(id) {
            Some(todo) => {
                todo["done"] = json!(true);
                CommandResult::success(todo.clone())
            }
            None => CommandResult::failure("NOT_FOUND", format!("no todo {id:?}")),
        })
    });

    let list_state = Arc::clone(&state);
    handler.register("todo-list", move |_| {
        let state = list_state.lock().expect("todo state");
        let items: Vec<Value> = state.todos.values().cloned().collect();
        Ok(CommandResult::success(json!({"count": items.len(), "items": items})))
    });

    Arc::new(handler)
}

pub fn seval_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_seval"))
}

/// Run the `seval` binary with `args`.
pub fn run_seval(args: &[&str]) -> Output {
    Command::new(seval_bin())
        .args(args)
        .env("SEVAL_LOG", "error")
        .output()
        .expect("run seval")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
