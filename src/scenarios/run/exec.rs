use super::validate::match_expectation;
use crate::handler::CommandHandler;
use crate::scenarios::reference::{InputTemplate, ReferenceError};
use crate::scenarios::resolve::{resolve_input, StepOutput};
use crate::scenarios::types::count_steps;
use crate::scenarios::{
    PreparedScenario, ScenarioOutcome, ScenarioResult, Step, StepOutcome, StepResult,
};
use crate::util::{duration_ms, epoch_ms};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-scenario execution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Skip the remaining steps after the first `fail` or `error`.
    pub stop_on_failure: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            stop_on_failure: true,
        }
    }
}

/// Progress of a scenario at the moment it was cut short.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StepSnapshot {
    pub(crate) completed: Vec<StepResult>,
    /// Input sent to the handler for the step that never returned.
    pub(crate) in_flight_input: Option<Value>,
}

/// Progress of an in-flight scenario, readable after its task is aborted.
#[derive(Debug, Clone, Default)]
pub(super) struct StepLog(Arc<Mutex<StepSnapshot>>);

impl StepLog {
    fn dispatch(&self, input: &Value) {
        let mut state = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.in_flight_input = Some(input.clone());
    }

    fn push(&self, result: StepResult) {
        let mut state = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.in_flight_input = None;
        state.completed.push(result);
    }

    pub(super) fn snapshot(&self) -> StepSnapshot {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Run one scenario's steps strictly in order.
pub async fn execute_scenario(
    prepared: &PreparedScenario,
    handler: &dyn CommandHandler,
    options: &ExecutorOptions,
) -> ScenarioResult {
    execute_recorded(prepared, handler, options, &StepLog::default()).await
}

pub(super) async fn execute_recorded(
    prepared: &PreparedScenario,
    handler: &dyn CommandHandler,
    options: &ExecutorOptions,
    log: &StepLog,
) -> ScenarioResult {
    let started_at = epoch_ms();
    let started = Instant::now();
    tracing::debug!(scenario = %prepared.name(), steps = prepared.step_count(), "scenario started");

    let mut outputs: Vec<StepOutput> = Vec::with_capacity(prepared.step_count());
    let mut results = Vec::with_capacity(prepared.step_count());
    let mut halted = false;
    for (index, (step, input)) in prepared.steps().enumerate() {
        if halted {
            results.push(StepResult::skipped(index, step));
            continue;
        }
        let result = run_step(index, step, input, &outputs, handler, |resolved| {
            log.dispatch(resolved)
        })
        .await;
        if result.is_failure() {
            tracing::debug!(
                scenario = %prepared.name(),
                step = index,
                command = %step.command,
                message = result.message.as_deref().unwrap_or(""),
                "step did not pass"
            );
            halted = options.stop_on_failure;
        }
        outputs.push(StepOutput {
            alias: step.alias.clone(),
            data: result.actual.as_ref().and_then(|actual| actual.data().cloned()),
        });
        log.push(result.clone());
        results.push(result);
    }

    let outcome = classify_scenario(&results, options.stop_on_failure);
    let result =
        ScenarioResult::from_steps(prepared, results, outcome, started_at, started.elapsed());
    tracing::debug!(
        scenario = %result.name,
        outcome = result.outcome.as_str(),
        duration_ms = result.duration_ms,
        "scenario finished"
    );
    result
}

/// Resolve, invoke, and match a single step.
pub async fn execute_step(
    index: usize,
    step: &Step,
    input: &Result<InputTemplate, ReferenceError>,
    outputs: &[StepOutput],
    handler: &dyn CommandHandler,
) -> StepResult {
    run_step(index, step, input, outputs, handler, |_| {}).await
}

/// `on_dispatch` sees the resolved input just before the handler is called.
async fn run_step<F>(
    index: usize,
    step: &Step,
    input: &Result<InputTemplate, ReferenceError>,
    outputs: &[StepOutput],
    handler: &dyn CommandHandler,
    on_dispatch: F,
) -> StepResult
where
    F: FnOnce(&Value),
{
    let template = match input {
        Ok(template) => template,
        Err(err) => {
            return step_result(index, step, StepOutcome::Error, None, Some(err.to_string()))
        }
    };
    let resolved = match resolve_input(template, outputs) {
        Ok(resolved) => resolved,
        Err(err) => {
            return step_result(
                index,
                step,
                StepOutcome::Error,
                None,
                Some(format!("unresolved reference {err}")),
            )
        }
    };

    on_dispatch(&resolved);
    let started = Instant::now();
    let response = handler.execute(&step.command, resolved.clone()).await;
    let elapsed = duration_ms(started.elapsed());

    let mut result = match response {
        Err(fault) => step_result(
            index,
            step,
            StepOutcome::Error,
            Some(resolved),
            Some(format!("handler fault: {fault}")),
        ),
        Ok(actual) => {
            let failures = match_expectation(&actual, &step.expect);
            let (outcome, message) = if failures.is_empty() {
                (StepOutcome::Pass, None)
            } else {
                (StepOutcome::Fail, Some(failures.join("; ")))
            };
            let mut result = step_result(index, step, outcome, Some(resolved), message);
            result.actual = Some(actual);
            result
        }
    };
    result.duration_ms = elapsed;
    result
}

fn step_result(
    index: usize,
    step: &Step,
    outcome: StepOutcome,
    resolved_input: Option<Value>,
    message: Option<String>,
) -> StepResult {
    StepResult {
        index,
        command: step.command.clone(),
        description: step.description.clone(),
        outcome,
        resolved_input,
        actual: None,
        duration_ms: 0,
        message,
    }
}

/// Overall outcome from recorded steps.
///
/// With stop-on-failure the first non-passing step decides. Otherwise any
/// `error` wins, then `partial` when at least one step passed, then `fail`.
fn classify_scenario(steps: &[StepResult], stop_on_failure: bool) -> ScenarioOutcome {
    let Some(first_failure) = steps.iter().find(|step| step.is_failure()) else {
        return ScenarioOutcome::Pass;
    };
    if stop_on_failure {
        return match first_failure.outcome {
            StepOutcome::Error => ScenarioOutcome::Error,
            _ => ScenarioOutcome::Fail,
        };
    }
    if steps.iter().any(|step| step.outcome == StepOutcome::Error) {
        ScenarioOutcome::Error
    } else if steps.iter().any(|step| step.outcome == StepOutcome::Pass) {
        ScenarioOutcome::Partial
    } else {
        ScenarioOutcome::Fail
    }
}

impl ScenarioResult {
    pub(crate) fn from_steps(
        prepared: &PreparedScenario,
        steps: Vec<StepResult>,
        outcome: ScenarioOutcome,
        started_at_epoch_ms: u128,
        elapsed: Duration,
    ) -> Self {
        let (passed_steps, failed_steps, skipped_steps) = count_steps(&steps);
        let duration_ms = duration_ms(elapsed);
        Self {
            path: prepared.source.clone(),
            name: prepared.scenario.name.clone(),
            job: prepared.scenario.job.clone(),
            outcome,
            steps,
            passed_steps,
            failed_steps,
            skipped_steps,
            started_at_epoch_ms,
            ended_at_epoch_ms: started_at_epoch_ms + u128::from(duration_ms),
            duration_ms,
            message: None,
        }
    }

    /// A scenario that never started; every step is `skip`.
    pub(crate) fn skipped(prepared: &PreparedScenario, reason: impl Into<String>) -> Self {
        let steps = prepared
            .steps()
            .enumerate()
            .map(|(index, (step, _))| StepResult::skipped(index, step))
            .collect();
        let mut result =
            Self::from_steps(prepared, steps, ScenarioOutcome::Skip, epoch_ms(), Duration::ZERO);
        result.message = Some(reason.into());
        result
    }

    /// A scenario cut short by a timeout or a panic. The step that was in
    /// flight is recorded as `error`, keeping the input it was sent, and the
    /// rest as `skip`.
    pub(crate) fn interrupted(
        prepared: &PreparedScenario,
        snapshot: StepSnapshot,
        message: impl Into<String>,
        started_at_epoch_ms: u128,
        elapsed: Duration,
    ) -> Self {
        let message = message.into();
        let StepSnapshot {
            completed: mut steps,
            mut in_flight_input,
        } = snapshot;
        let in_flight = steps.len();
        for (index, (step, _)) in prepared.steps().enumerate().skip(in_flight) {
            if index == in_flight {
                steps.push(step_result(
                    index,
                    step,
                    StepOutcome::Error,
                    in_flight_input.take(),
                    Some(message.clone()),
                ));
            } else {
                steps.push(StepResult::skipped(index, step));
            }
        }
        let mut result = Self::from_steps(
            prepared,
            steps,
            ScenarioOutcome::Error,
            started_at_epoch_ms,
            elapsed,
        );
        result.message = Some(message);
        result
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
