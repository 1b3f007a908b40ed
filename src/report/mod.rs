//! Aggregated evaluation reports.
//!
//! A `TestReport` is built once from a result snapshot and rendered by pure
//! functions in `format`.
mod format;

pub use format::{render_junit, render_markdown, render_report, render_terminal};

use crate::scenarios::{ScenarioOutcome, ScenarioResult};
use crate::util::epoch_ms;
use serde::{Deserialize, Serialize};

/// Output format for evaluation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
    Junit,
    Markdown,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Terminal => "terminal",
            ReportFormat::Json => "json",
            ReportFormat::Junit => "junit",
            ReportFormat::Markdown => "markdown",
        }
    }
}

/// Where and how a report was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub tool_version: String,
    pub os: String,
    pub concurrency: usize,
    pub fail_fast: bool,
}

impl EnvironmentInfo {
    pub fn current(concurrency: usize, fail_fast: bool) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            os: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            concurrency,
            fail_fast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total_scenarios: usize,
    pub passed_scenarios: usize,
    /// Includes `partial` scenarios.
    pub failed_scenarios: usize,
    pub partial_scenarios: usize,
    pub error_scenarios: usize,
    pub skipped_scenarios: usize,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    /// Percentage of executed (non-skipped) scenarios that passed.
    pub pass_rate: f64,
    pub duration_ms: u64,
}

impl TestSummary {
    pub fn from_results(results: &[ScenarioResult], duration_ms: u64) -> Self {
        let mut summary = TestSummary {
            total_scenarios: results.len(),
            passed_scenarios: 0,
            failed_scenarios: 0,
            partial_scenarios: 0,
            error_scenarios: 0,
            skipped_scenarios: 0,
            total_steps: 0,
            passed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
            pass_rate: 0.0,
            duration_ms,
        };
        for result in results {
            match result.outcome {
                ScenarioOutcome::Pass => summary.passed_scenarios += 1,
                ScenarioOutcome::Partial => {
                    summary.partial_scenarios += 1;
                    summary.failed_scenarios += 1;
                }
                ScenarioOutcome::Fail => summary.failed_scenarios += 1,
                ScenarioOutcome::Error => summary.error_scenarios += 1,
                ScenarioOutcome::Skip => summary.skipped_scenarios += 1,
            }
            summary.total_steps += result.steps.len();
            summary.passed_steps += result.passed_steps;
            summary.failed_steps += result.failed_steps;
            summary.skipped_steps += result.skipped_steps;
        }
        let executed = summary.total_scenarios - summary.skipped_scenarios;
        if executed > 0 {
            summary.pass_rate = summary.passed_scenarios as f64 / executed as f64 * 100.0;
        }
        summary
    }
}

/// Immutable aggregation of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub summary: TestSummary,
    pub generated_at_epoch_ms: u128,
    pub environment: EnvironmentInfo,
    pub scenarios: Vec<ScenarioResult>,
}

impl TestReport {
    /// `0` when no scenario failed or errored, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        exit_code(&self.summary)
    }
}

pub fn build_report(
    results: Vec<ScenarioResult>,
    environment: EnvironmentInfo,
    duration_ms: u64,
) -> TestReport {
    TestReport {
        summary: TestSummary::from_results(&results, duration_ms),
        generated_at_epoch_ms: epoch_ms(),
        environment,
        scenarios: results,
    }
}

pub fn exit_code(summary: &TestSummary) -> i32 {
    if summary.failed_scenarios == 0 && summary.error_scenarios == 0 {
        0
    } else {
        1
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
