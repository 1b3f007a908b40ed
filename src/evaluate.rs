//! Top-level operations: evaluate, list, and coverage.
//!
//! Each returns an [`Envelope`] and never an `Err`; engine faults are
//! classified into an [`OperationalError`](crate::errors::OperationalError)
//! with a code and, where one is known, a suggestion.
use crate::coverage::{
    analyze_coverage, render_coverage_as, CoverageFormat, CoverageReport, KnownUniverse,
};
use crate::errors::{EngineError, Envelope};
use crate::handler::CommandHandler;
use crate::report::{build_report, render_report, EnvironmentInfo, ReportFormat, TestReport};
use crate::scenarios::{
    build_listing, load_scenarios, run_scenarios_streaming, LoadedScenario, PreparedScenario,
    RunOptions, ScenarioFilter, ScenarioListing, ScenarioResult,
};
use crate::util::{display_path, duration_ms};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Inputs for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Scenario directories or individual scenario files.
    pub sources: Vec<PathBuf>,
    pub filter: ScenarioFilter,
    pub options: RunOptions,
    pub format: ReportFormat,
    /// Write the formatted report here instead of only returning it.
    pub output: Option<PathBuf>,
    pub overwrite: bool,
}

impl EvaluationRequest {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            filter: ScenarioFilter::default(),
            options: RunOptions::default(),
            format: ReportFormat::Terminal,
            output: None,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub report: TestReport,
    pub exit_code: i32,
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// Load, run, and report on the requested scenarios.
pub async fn evaluate(
    request: &EvaluationRequest,
    handler: Option<Arc<dyn CommandHandler>>,
) -> Envelope<EvaluationOutcome> {
    evaluate_with_progress(request, handler, |_| {}).await
}

/// Like [`evaluate`], streaming each scenario result as it completes.
pub async fn evaluate_with_progress<F>(
    request: &EvaluationRequest,
    handler: Option<Arc<dyn CommandHandler>>,
    on_result: F,
) -> Envelope<EvaluationOutcome>
where
    F: FnMut(&ScenarioResult),
{
    Envelope::from_result(run_evaluation(request, handler, on_result).await)
}

async fn run_evaluation<F>(
    request: &EvaluationRequest,
    handler: Option<Arc<dyn CommandHandler>>,
    on_result: F,
) -> Result<EvaluationOutcome>
where
    F: FnMut(&ScenarioResult),
{
    let handler = handler.ok_or(EngineError::HandlerNotConfigured)?;
    validate_run_options(&request.options)?;
    if let Some(output) = request.output.as_deref() {
        ensure_writable(output, request.overwrite)?;
    }

    let loaded = load_scenarios(&request.sources, &request.filter)?;
    tracing::info!(scenarios = loaded.len(), "evaluating scenarios");
    let prepared = loaded.into_iter().map(LoadedScenario::prepare).collect();
    let report = evaluate_prepared(prepared, handler, &request.options, on_result).await;

    let formatted = render_report(&report, request.format)?;
    let output_path = match request.output.as_deref() {
        Some(output) => {
            write_output(output, &formatted, request.overwrite)?;
            Some(display_path(output, None))
        }
        None => None,
    };
    Ok(EvaluationOutcome {
        exit_code: report.exit_code(),
        report,
        formatted,
        output_path,
    })
}

/// Run already-prepared scenarios and aggregate the report.
pub async fn evaluate_prepared<F>(
    scenarios: Vec<PreparedScenario>,
    handler: Arc<dyn CommandHandler>,
    options: &RunOptions,
    on_result: F,
) -> TestReport
where
    F: FnMut(&ScenarioResult),
{
    let started = Instant::now();
    let results = run_scenarios_streaming(scenarios, handler, options, on_result).await;
    let environment = EnvironmentInfo::current(options.concurrency.max(1), options.fail_fast);
    build_report(results, environment, duration_ms(started.elapsed()))
}

fn validate_run_options(options: &RunOptions) -> Result<()> {
    if options.concurrency == 0 {
        return Err(EngineError::InvalidConfig("concurrency must be at least 1".to_string()).into());
    }
    if options.timeout.is_some_and(|timeout| timeout.is_zero()) {
        return Err(EngineError::InvalidConfig("timeout must be greater than 0".to_string()).into());
    }
    Ok(())
}

fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(EngineError::FileExists {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

fn write_output(path: &Path, text: &str, overwrite: bool) -> Result<()> {
    ensure_writable(path, overwrite)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("write report {}", path.display()))
}

/// Inputs for a scenario listing.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub sources: Vec<PathBuf>,
    pub filter: ScenarioFilter,
}

pub fn list_scenarios(request: &ListRequest) -> Envelope<ScenarioListing> {
    Envelope::from_result(
        load_scenarios(&request.sources, &request.filter).map(|loaded| build_listing(&loaded)),
    )
}

/// Inputs for a coverage analysis.
#[derive(Debug, Clone, Default)]
pub struct CoverageRequest {
    pub sources: Vec<PathBuf>,
    pub filter: ScenarioFilter,
    pub known: KnownUniverse,
    pub format: CoverageFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageOutcome {
    pub report: CoverageReport,
    pub formatted: String,
}

pub fn coverage(request: &CoverageRequest) -> Envelope<CoverageOutcome> {
    Envelope::from_result(run_coverage(request))
}

fn run_coverage(request: &CoverageRequest) -> Result<CoverageOutcome> {
    let scenarios: Vec<_> = load_scenarios(&request.sources, &request.filter)?
        .into_iter()
        .map(|loaded| loaded.scenario)
        .collect();
    let report = analyze_coverage(&scenarios, &request.known);
    let formatted = render_coverage_as(&report, request.format)?;
    Ok(CoverageOutcome { report, formatted })
}
