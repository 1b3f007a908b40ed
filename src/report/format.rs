use super::{ReportFormat, TestReport};
use crate::scenarios::{ScenarioOutcome, ScenarioResult};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Render a report in the requested format.
pub fn render_report(report: &TestReport, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Terminal => render_terminal(report),
        ReportFormat::Json => {
            let mut text =
                serde_json::to_string_pretty(report).context("serialize test report")?;
            text.push('\n');
            text
        }
        ReportFormat::Junit => render_junit(report),
        ReportFormat::Markdown => render_markdown(report),
    })
}

pub fn render_terminal(report: &TestReport) -> String {
    let mut out = String::new();
    for result in &report.scenarios {
        append_terminal_line(&mut out, result);
    }
    let summary = &report.summary;
    out.push_str(&format!(
        "\n{} scenarios: {} passed, {} failed, {} errors, {} skipped ({:.1}% pass rate) in {}ms\n",
        summary.total_scenarios,
        summary.passed_scenarios,
        summary.failed_scenarios,
        summary.error_scenarios,
        summary.skipped_scenarios,
        summary.pass_rate,
        summary.duration_ms
    ));
    out
}

fn append_terminal_line(out: &mut String, result: &ScenarioResult) {
    out.push_str(&format!(
        "{} {} ({}) {}ms\n",
        glyph(result.outcome),
        result.name,
        result.job,
        result.duration_ms
    ));
    if result.outcome == ScenarioOutcome::Pass {
        return;
    }
    match result.first_failure() {
        Some(step) => out.push_str(&format!(
            "    step {} {}: {}\n",
            step.index + 1,
            step.command,
            step.message.as_deref().unwrap_or("failed")
        )),
        None => {
            if let Some(message) = result.message.as_deref() {
                out.push_str(&format!("    {message}\n"));
            }
        }
    }
}

fn glyph(outcome: ScenarioOutcome) -> &'static str {
    match outcome {
        ScenarioOutcome::Pass => "✓",
        ScenarioOutcome::Partial => "◐",
        ScenarioOutcome::Fail => "✗",
        ScenarioOutcome::Error => "!",
        ScenarioOutcome::Skip => "-",
    }
}

/// JUnit XML with one `<testsuite>` per job.
pub fn render_junit(report: &TestReport) -> String {
    let mut suites: BTreeMap<&str, Vec<&ScenarioResult>> = BTreeMap::new();
    for result in &report.scenarios {
        suites.entry(result.job.as_str()).or_default().push(result);
    }

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let summary = &report.summary;
    out.push_str(&format!(
        "<testsuites name=\"scenario-eval\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{}\">\n",
        summary.total_scenarios,
        summary.failed_scenarios,
        summary.error_scenarios,
        summary.skipped_scenarios,
        seconds(summary.duration_ms)
    ));
    for (job, results) in &suites {
        append_testsuite(&mut out, job, results);
    }
    out.push_str("</testsuites>\n");
    out
}

fn append_testsuite(out: &mut String, job: &str, results: &[&ScenarioResult]) {
    let count = |wanted: &[ScenarioOutcome]| {
        results
            .iter()
            .filter(|result| wanted.contains(&result.outcome))
            .count()
    };
    let failures = count(&[ScenarioOutcome::Fail, ScenarioOutcome::Partial]);
    let errors = count(&[ScenarioOutcome::Error]);
    let skipped = count(&[ScenarioOutcome::Skip]);
    let duration: u64 = results.iter().map(|result| result.duration_ms).sum();
    out.push_str(&format!(
        "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{}\">\n",
        xml_escape(job),
        results.len(),
        failures,
        errors,
        skipped,
        seconds(duration)
    ));
    for result in results {
        append_testcase(out, job, result);
    }
    out.push_str("  </testsuite>\n");
}

fn append_testcase(out: &mut String, job: &str, result: &ScenarioResult) {
    let open = format!(
        "    <testcase name=\"{}\" classname=\"{}\" time=\"{}\"",
        xml_escape(&result.name),
        xml_escape(job),
        seconds(result.duration_ms)
    );
    let element = match result.outcome {
        ScenarioOutcome::Pass => {
            out.push_str(&open);
            out.push_str("/>\n");
            return;
        }
        ScenarioOutcome::Skip => {
            out.push_str(&open);
            out.push_str(">\n");
            out.push_str(&format!(
                "      <skipped message=\"{}\"/>\n",
                xml_escape(result.message.as_deref().unwrap_or("skipped"))
            ));
            out.push_str("    </testcase>\n");
            return;
        }
        ScenarioOutcome::Error => "error",
        ScenarioOutcome::Fail | ScenarioOutcome::Partial => "failure",
    };
    let message = result
        .failure_message()
        .unwrap_or_else(|| result.outcome.as_str().to_string());
    let dump = result
        .first_failure()
        .and_then(|step| serde_json::to_string_pretty(step).ok())
        .unwrap_or_default();
    out.push_str(&open);
    out.push_str(">\n");
    out.push_str(&format!(
        "      <{element} message=\"{}\" type=\"{}\">{}</{element}>\n",
        xml_escape(&message),
        result.outcome.as_str(),
        xml_escape(&dump)
    ));
    out.push_str("    </testcase>\n");
}

/// Markdown summary table followed by the non-passing scenarios.
pub fn render_markdown(report: &TestReport) -> String {
    let summary = &report.summary;
    let mut out = String::from("# Test Report\n\n");
    out.push_str("| Metric | Value |\n|---|---|\n");
    out.push_str(&format!("| Total | {} |\n", summary.total_scenarios));
    out.push_str(&format!("| Passed | {} |\n", summary.passed_scenarios));
    out.push_str(&format!("| Failed | {} |\n", summary.failed_scenarios));
    out.push_str(&format!("| Errors | {} |\n", summary.error_scenarios));
    out.push_str(&format!("| Skipped | {} |\n", summary.skipped_scenarios));
    out.push_str(&format!("| Pass rate | {:.1}% |\n", summary.pass_rate));
    out.push_str(&format!("| Duration | {}ms |\n", summary.duration_ms));

    let failing: Vec<&ScenarioResult> = report
        .scenarios
        .iter()
        .filter(|result| result.outcome.is_failing())
        .collect();
    if failing.is_empty() {
        return out;
    }
    out.push_str("\n## Failed Scenarios\n\n");
    out.push_str("| Scenario | Job | Outcome | Step | Error |\n|---|---|---|---|---|\n");
    for result in failing {
        let step = result
            .first_failure()
            .map(|step| format!("`{}`", step.command))
            .unwrap_or_else(|| "-".to_string());
        let message = result.failure_message().unwrap_or_default();
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            markdown_cell(&result.name),
            markdown_cell(&result.job),
            result.outcome.as_str(),
            step,
            markdown_cell(&message)
        ));
    }
    out
}

fn seconds(duration_ms: u64) -> String {
    format!("{:.3}", duration_ms as f64 / 1000.0)
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
