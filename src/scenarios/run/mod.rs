//! Scenario execution engine.
//!
//! Scenarios run in batches of at most `concurrency` tasks. Each scenario is
//! its own tokio task so a panicking or hung handler cannot take its batch
//! down with it.
mod exec;
mod validate;

pub use exec::{execute_scenario, execute_step, ExecutorOptions};
pub use validate::match_expectation;

use super::{PreparedScenario, ScenarioResult};
use crate::handler::CommandHandler;
use crate::util::{duration_ms, epoch_ms};
use exec::{execute_recorded, StepLog, StepSnapshot};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};

/// Scheduling policy for a set of scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum scenarios in flight at once; `0` is treated as `1`.
    pub concurrency: usize,
    /// Per-scenario limit. A scenario that exceeds it is aborted.
    pub timeout: Option<Duration>,
    pub fail_fast: bool,
    pub executor: ExecutorOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: None,
            fail_fast: false,
            executor: ExecutorOptions::default(),
        }
    }
}

/// Fail-fast state threaded through the batch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailFast {
    enabled: bool,
    tripped_by: Option<usize>,
}

impl FailFast {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            tripped_by: None,
        }
    }

    /// Record a completed scenario at `index`.
    pub fn observe(&mut self, index: usize, result: &ScenarioResult) {
        if self.enabled && self.tripped_by.is_none() && result.outcome.is_failing() {
            tracing::info!(scenario = %result.name, "fail-fast tripped");
            self.tripped_by = Some(index);
        }
    }

    /// Whether scenarios that have not started yet must be skipped.
    pub fn tripped(&self) -> bool {
        self.tripped_by.is_some()
    }
}

/// Run scenarios and return their results in input order.
pub async fn run_scenarios(
    scenarios: Vec<PreparedScenario>,
    handler: Arc<dyn CommandHandler>,
    options: &RunOptions,
) -> Vec<ScenarioResult> {
    run_scenarios_streaming(scenarios, handler, options, |_| {}).await
}

/// Like [`run_scenarios`], calling `on_result` as each scenario completes.
///
/// The callback sees completion order; the returned list keeps input order.
pub async fn run_scenarios_streaming<F>(
    scenarios: Vec<PreparedScenario>,
    handler: Arc<dyn CommandHandler>,
    options: &RunOptions,
    mut on_result: F,
) -> Vec<ScenarioResult>
where
    F: FnMut(&ScenarioResult),
{
    let concurrency = options.concurrency.max(1);
    let scenarios: Vec<Arc<PreparedScenario>> = scenarios.into_iter().map(Arc::new).collect();
    let mut slots: Vec<Option<ScenarioResult>> = vec![None; scenarios.len()];
    let mut fail_fast = FailFast::new(options.fail_fast);

    for (batch_index, batch) in scenarios.chunks(concurrency).enumerate() {
        let offset = batch_index * concurrency;
        if fail_fast.tripped() {
            for (position, prepared) in batch.iter().enumerate() {
                let result = ScenarioResult::skipped(
                    prepared,
                    "skipped: fail-fast tripped by an earlier scenario",
                );
                on_result(&result);
                slots[offset + position] = Some(result);
            }
            continue;
        }

        tracing::debug!(batch = batch_index, size = batch.len(), "starting batch");
        let mut tasks = JoinSet::new();
        for (position, prepared) in batch.iter().enumerate() {
            let prepared = Arc::clone(prepared);
            let handler = Arc::clone(&handler);
            let executor = options.executor;
            let timeout = options.timeout;
            tasks.spawn(async move {
                let result = run_guarded(prepared, handler, executor, timeout).await;
                (offset + position, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    fail_fast.observe(index, &result);
                    on_result(&result);
                    slots[index] = Some(result);
                }
                Err(err) => tracing::warn!(error = %err, "scenario supervisor task failed"),
            }
        }
    }

    slots
        .into_iter()
        .zip(scenarios.iter())
        .map(|(slot, prepared)| {
            slot.unwrap_or_else(|| {
                ScenarioResult::interrupted(
                    prepared,
                    StepSnapshot::default(),
                    "scenario did not report a result",
                    epoch_ms(),
                    Duration::ZERO,
                )
            })
        })
        .collect()
}

/// Run one scenario in its own task, enforcing the timeout and containing
/// panics.
async fn run_guarded(
    prepared: Arc<PreparedScenario>,
    handler: Arc<dyn CommandHandler>,
    executor: ExecutorOptions,
    timeout: Option<Duration>,
) -> ScenarioResult {
    let started_at = epoch_ms();
    let started = Instant::now();
    let log = StepLog::default();

    let task_log = log.clone();
    let task_prepared = Arc::clone(&prepared);
    let mut task = tokio::spawn(async move {
        execute_recorded(&task_prepared, handler.as_ref(), &executor, &task_log).await
    });

    let joined = match timeout {
        None => task.await,
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                let limit_ms = duration_ms(limit);
                tracing::warn!(
                    scenario = %prepared.name(),
                    timeout_ms = limit_ms,
                    "scenario timed out"
                );
                return ScenarioResult::interrupted(
                    &prepared,
                    log.snapshot(),
                    format!("scenario timed out after {limit_ms}ms"),
                    started_at,
                    started.elapsed(),
                );
            }
        },
    };

    match joined {
        Ok(result) => result,
        Err(err) => {
            let message = join_error_message(err);
            tracing::warn!(scenario = %prepared.name(), %message, "scenario task failed");
            ScenarioResult::interrupted(
                &prepared,
                log.snapshot(),
                message,
                started_at,
                started.elapsed(),
            )
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "scenario task was cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => format!("handler panicked: {}", panic_payload(payload.as_ref())),
        Err(err) => format!("scenario task failed: {err}"),
    }
}

fn panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
