use super::*;
use crate::handler::{CommandResult, HandlerFault, InMemoryHandler};
use crate::scenarios::Scenario;
use serde_json::json;

fn prepared(value: serde_json::Value) -> PreparedScenario {
    let scenario: Scenario = serde_json::from_value(value).expect("parse scenario");
    PreparedScenario::from(scenario)
}

fn todo_handler() -> InMemoryHandler {
    let mut handler = InMemoryHandler::new();
    handler
        .register("todo-create", |input| {
            let title = input.get("title").cloned().unwrap_or(json!(""));
            Ok(CommandResult::success(json!({"id": "abc", "title": title})))
        })
        .register("todo-get", |input| match input.get("id") {
            Some(id) if id == "abc" => {
                Ok(CommandResult::success(json!({"id": "abc", "title": "X"})))
            }
            _ => Ok(CommandResult::failure("NOT_FOUND", "no such todo")),
        })
        .register("explode", |_| Err(HandlerFault::new("database unavailable")));
    handler
}

fn assert_counts_consistent(result: &ScenarioResult) {
    assert_eq!(
        result.passed_steps + result.failed_steps + result.skipped_steps,
        result.steps.len()
    );
}

#[tokio::test]
async fn chains_prev_output_into_next_input() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "create then get",
        "job": "manage-todos",
        "steps": [
            {"command": "todo-create", "input": {"title": "X"}, "expect": {"success": true}},
            {"command": "todo-get", "input": {"id": "$prev.id"}, "expect": {"success": true, "data": {"title": "X"}}}
        ]
    }));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.outcome, ScenarioOutcome::Pass);
    assert_eq!(result.passed_steps, 2);
    assert_counts_consistent(&result);
    let calls = handler.calls();
    assert_eq!(calls[1].input, json!({"id": "abc"}));
    assert_eq!(result.steps[1].resolved_input, Some(json!({"id": "abc"})));
}

#[tokio::test]
async fn failure_skips_remaining_steps_by_default() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "wrong expectation",
        "job": "manage-todos",
        "steps": [
            {"command": "todo-get", "input": {"id": "zzz"}, "expect": {"success": true}},
            {"command": "todo-create", "input": {"title": "X"}, "expect": {"success": true}},
            {"command": "todo-create", "input": {"title": "Y"}, "expect": {"success": true}}
        ]
    }));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.outcome, ScenarioOutcome::Fail);
    assert_eq!(
        (result.passed_steps, result.failed_steps, result.skipped_steps),
        (0, 1, 2)
    );
    assert_eq!(handler.call_count("todo-create"), 0);
    assert!(result
        .failure_message()
        .is_some_and(|message| message.contains("NOT_FOUND")));
    assert_counts_consistent(&result);
}

#[tokio::test]
async fn handler_fault_is_error_not_fail() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "fault",
        "job": "ops",
        "steps": [
            {"command": "explode", "expect": {"success": true}},
            {"command": "todo-create", "expect": {"success": true}}
        ]
    }));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.outcome, ScenarioOutcome::Error);
    assert_eq!(result.steps[0].outcome, StepOutcome::Error);
    assert_eq!(result.steps[1].outcome, StepOutcome::Skip);
    assert!(result.steps[0]
        .message
        .as_deref()
        .is_some_and(|message| message.contains("database unavailable")));
}

#[tokio::test]
async fn unresolved_reference_errors_without_invoking_handler() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "dangling",
        "job": "manage-todos",
        "steps": [
            {"command": "todo-get", "input": {"id": "$steps[3].id"}, "expect": {"success": true}}
        ]
    }));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.outcome, ScenarioOutcome::Error);
    assert!(handler.calls().is_empty());
    assert!(result.steps[0].resolved_input.is_none());
}

#[tokio::test]
async fn malformed_reference_fails_only_its_step() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "malformed",
        "job": "manage-todos",
        "steps": [
            {"command": "todo-create", "input": {"title": "X"}, "expect": {"success": true}},
            {"command": "todo-get", "input": {"id": "$prev."}, "expect": {"success": true}}
        ]
    }));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.steps[0].outcome, StepOutcome::Pass);
    assert_eq!(result.steps[1].outcome, StepOutcome::Error);
    assert_eq!(result.outcome, ScenarioOutcome::Error);
    assert_eq!(handler.call_count("todo-get"), 0);
}

#[tokio::test]
async fn continue_on_failure_reports_partial() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "mixed",
        "job": "manage-todos",
        "steps": [
            {"command": "todo-get", "input": {"id": "zzz"}, "expect": {"success": true}},
            {"command": "todo-create", "input": {"title": "X"}, "expect": {"success": true}}
        ]
    }));
    let options = ExecutorOptions {
        stop_on_failure: false,
    };
    let result = execute_scenario(&scenario, &handler, &options).await;

    assert_eq!(result.outcome, ScenarioOutcome::Partial);
    assert_eq!(
        (result.passed_steps, result.failed_steps, result.skipped_steps),
        (1, 1, 0)
    );
}

#[tokio::test]
async fn aliases_resolve_across_steps() {
    let handler = todo_handler();
    let scenario = prepared(json!({
        "name": "alias",
        "job": "manage-todos",
        "steps": [
            {"command": "todo-create", "input": {"title": "X"}, "expect": {"success": true}, "as": "created"},
            {"command": "todo-create", "input": {"title": "other"}, "expect": {"success": true}},
            {"command": "todo-get", "input": {"id": "$steps.created.id"}, "expect": {"success": true}}
        ]
    }));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.outcome, ScenarioOutcome::Pass);
    assert_eq!(handler.calls()[2].input, json!({"id": "abc"}));
}

#[tokio::test]
async fn empty_scenario_passes_with_zero_counts() {
    let handler = todo_handler();
    let scenario = prepared(json!({"name": "empty", "job": "noop", "steps": []}));
    let result = execute_scenario(&scenario, &handler, &ExecutorOptions::default()).await;

    assert_eq!(result.outcome, ScenarioOutcome::Pass);
    assert_eq!(
        (result.passed_steps, result.failed_steps, result.skipped_steps),
        (0, 0, 0)
    );
}

#[test]
fn interrupted_marks_in_flight_step_as_error() {
    let scenario = prepared(json!({
        "name": "slow",
        "job": "ops",
        "steps": [
            {"command": "a", "expect": {"success": true}},
            {"command": "b", "expect": {"success": true}},
            {"command": "c", "expect": {"success": true}}
        ]
    }));
    let mut first = StepResult::skipped(0, &scenario.scenario.steps[0]);
    first.outcome = StepOutcome::Pass;
    let snapshot = StepSnapshot {
        completed: vec![first],
        in_flight_input: Some(json!({"id": "slow-1"})),
    };
    let result = ScenarioResult::interrupted(
        &scenario,
        snapshot,
        "scenario timed out after 5ms",
        0,
        Duration::from_millis(5),
    );

    assert_eq!(result.outcome, ScenarioOutcome::Error);
    let outcomes: Vec<_> = result.steps.iter().map(|step| step.outcome).collect();
    assert_eq!(
        outcomes,
        vec![StepOutcome::Pass, StepOutcome::Error, StepOutcome::Skip]
    );
    assert_eq!(result.steps[1].resolved_input, Some(json!({"id": "slow-1"})));
    assert_eq!(result.steps[2].resolved_input, None);
    assert_counts_consistent(&result);
    assert_eq!(result.message.as_deref(), Some("scenario timed out after 5ms"));
}
