//! Command, error-code, and job coverage derived from scenario definitions.
//!
//! Coverage is recomputed from the scenario set on every request and never
//! persisted. Listings are ordered by usage (descending) then name so equal
//! inputs always render identically.
mod format;

pub use format::{
    render_coverage, render_coverage_as, render_coverage_json, render_coverage_markdown,
};

use crate::scenarios::Scenario;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Output format for coverage reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CoverageFormat {
    #[default]
    Terminal,
    Json,
    Markdown,
}

/// Caller-supplied universe of commands and error codes to measure against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownUniverse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandCoverage {
    pub command: String,
    pub scenario_count: usize,
    pub step_count: usize,
    pub used_in: Vec<String>,
    /// True when some step expects this command to fail.
    pub has_error_tests: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorCoverage {
    pub code: String,
    pub scenario_count: usize,
    pub tested_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCoverage {
    pub job: String,
    pub scenario_count: usize,
    pub tags: Vec<String>,
    pub avg_steps: f64,
}

/// Tested-versus-known arithmetic for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSummary {
    pub known: usize,
    pub tested: usize,
    pub untested: Vec<String>,
    /// Raw percentage; renderers round to one decimal.
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub total_scenarios: usize,
    pub total_steps: usize,
    pub total_commands: usize,
    pub total_errors: usize,
    pub total_jobs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<DimensionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<DimensionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub summary: CoverageSummary,
    pub commands: Vec<CommandCoverage>,
    pub errors: Vec<ErrorCoverage>,
    pub jobs: Vec<JobCoverage>,
    /// Exercised commands missing from the known list.
    pub unknown_commands: Vec<String>,
    /// Exercised error codes missing from the known list.
    pub unknown_errors: Vec<String>,
}

#[derive(Default)]
struct CommandState {
    /// Positions in the input slice; names may repeat across scenarios.
    scenarios: BTreeSet<usize>,
    steps: usize,
    has_error_tests: bool,
}

#[derive(Default)]
struct JobState {
    scenarios: usize,
    steps: usize,
    tags: BTreeSet<String>,
}

fn scenario_names(scenarios: &[Scenario], positions: &BTreeSet<usize>) -> Vec<String> {
    positions
        .iter()
        .filter_map(|&position| scenarios.get(position))
        .map(|scenario| scenario.name.clone())
        .collect()
}

/// Aggregate coverage for a scenario set.
pub fn analyze_coverage(scenarios: &[Scenario], known: &KnownUniverse) -> CoverageReport {
    let mut commands: BTreeMap<String, CommandState> = BTreeMap::new();
    let mut errors: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
    let mut jobs: BTreeMap<String, JobState> = BTreeMap::new();
    let mut total_steps = 0;

    for (position, scenario) in scenarios.iter().enumerate() {
        total_steps += scenario.steps.len();
        let job = jobs.entry(scenario.job.clone()).or_default();
        job.scenarios += 1;
        job.steps += scenario.steps.len();
        job.tags.extend(scenario.tags.iter().cloned());

        for step in &scenario.steps {
            let state = commands.entry(step.command.clone()).or_default();
            state.scenarios.insert(position);
            state.steps += 1;
            if !step.expect.success {
                state.has_error_tests = true;
                if let Some(expected) = step.expect.error.as_ref() {
                    errors
                        .entry(expected.code.clone())
                        .or_default()
                        .insert(position);
                }
            }
        }
    }

    let (command_summary, unknown_commands) =
        summarize_dimension(known.commands.as_deref(), commands.keys());
    let (error_summary, unknown_errors) =
        summarize_dimension(known.errors.as_deref(), errors.keys());

    let mut command_rows: Vec<CommandCoverage> = commands
        .into_iter()
        .map(|(command, state)| CommandCoverage {
            command,
            scenario_count: state.scenarios.len(),
            step_count: state.steps,
            used_in: scenario_names(scenarios, &state.scenarios),
            has_error_tests: state.has_error_tests,
        })
        .collect();
    command_rows.sort_by(|a, b| {
        b.scenario_count
            .cmp(&a.scenario_count)
            .then_with(|| b.step_count.cmp(&a.step_count))
            .then_with(|| a.command.cmp(&b.command))
    });

    let mut error_rows: Vec<ErrorCoverage> = errors
        .into_iter()
        .map(|(code, positions)| ErrorCoverage {
            code,
            scenario_count: positions.len(),
            tested_in: scenario_names(scenarios, &positions),
        })
        .collect();
    error_rows.sort_by(|a, b| {
        b.scenario_count
            .cmp(&a.scenario_count)
            .then_with(|| a.code.cmp(&b.code))
    });

    let mut job_rows: Vec<JobCoverage> = jobs
        .into_iter()
        .map(|(job, state)| JobCoverage {
            job,
            scenario_count: state.scenarios,
            tags: state.tags.into_iter().collect(),
            avg_steps: state.steps as f64 / state.scenarios as f64,
        })
        .collect();
    job_rows.sort_by(|a, b| {
        b.scenario_count
            .cmp(&a.scenario_count)
            .then_with(|| a.job.cmp(&b.job))
    });

    CoverageReport {
        summary: CoverageSummary {
            total_scenarios: scenarios.len(),
            total_steps,
            total_commands: command_rows.len(),
            total_errors: error_rows.len(),
            total_jobs: job_rows.len(),
            commands: command_summary,
            errors: error_summary,
        },
        commands: command_rows,
        errors: error_rows,
        jobs: job_rows,
        unknown_commands,
        unknown_errors,
    }
}

fn summarize_dimension<'a>(
    known: Option<&[String]>,
    used: impl Iterator<Item = &'a String>,
) -> (Option<DimensionSummary>, Vec<String>) {
    let used: BTreeSet<&str> = used.map(String::as_str).collect();
    let Some(known) = known else {
        return (None, Vec::new());
    };
    let known: BTreeSet<&str> = known
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    let tested = known.intersection(&used).count();
    let untested = known
        .difference(&used)
        .map(|name| name.to_string())
        .collect();
    let unknown = used
        .difference(&known)
        .map(|name| name.to_string())
        .collect();
    let coverage_percent = if known.is_empty() {
        100.0
    } else {
        tested as f64 / known.len() as f64 * 100.0
    };
    (
        Some(DimensionSummary {
            known: known.len(),
            tested,
            untested,
            coverage_percent,
        }),
        unknown,
    )
}

#[cfg(test)]
#[path = "coverage_tests.rs"]
mod tests;
