use super::{CoverageFormat, CoverageReport, DimensionSummary};
use anyhow::{Context, Result};

pub fn render_coverage_as(report: &CoverageReport, format: CoverageFormat) -> Result<String> {
    match format {
        CoverageFormat::Terminal => Ok(render_coverage(report)),
        CoverageFormat::Json => render_coverage_json(report),
        CoverageFormat::Markdown => Ok(render_coverage_markdown(report)),
    }
}

/// Plain-text coverage for terminals.
pub fn render_coverage(report: &CoverageReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;
    out.push_str(&format!(
        "Coverage: {} scenarios, {} steps, {} commands, {} error codes, {} jobs\n",
        summary.total_scenarios,
        summary.total_steps,
        summary.total_commands,
        summary.total_errors,
        summary.total_jobs
    ));
    append_dimension_line(&mut out, "commands", summary.commands.as_ref());
    append_dimension_line(&mut out, "errors", summary.errors.as_ref());

    if !report.commands.is_empty() {
        out.push_str("\nCommands:\n");
        for row in &report.commands {
            let marker = if row.has_error_tests { " (error tests)" } else { "" };
            out.push_str(&format!(
                "  {:<28} {:>3} scenarios {:>4} steps{marker}\n",
                row.command, row.scenario_count, row.step_count
            ));
        }
    }
    if !report.errors.is_empty() {
        out.push_str("\nError codes:\n");
        for row in &report.errors {
            out.push_str(&format!(
                "  {:<28} {:>3} scenarios\n",
                row.code, row.scenario_count
            ));
        }
    }
    if !report.jobs.is_empty() {
        out.push_str("\nJobs:\n");
        for row in &report.jobs {
            out.push_str(&format!(
                "  {:<28} {:>3} scenarios  avg {:.1} steps\n",
                row.job, row.scenario_count, row.avg_steps
            ));
        }
    }
    append_name_list(&mut out, "Untested commands", untested(summary.commands.as_ref()));
    append_name_list(&mut out, "Untested errors", untested(summary.errors.as_ref()));
    append_name_list(&mut out, "Unknown commands", &report.unknown_commands);
    append_name_list(&mut out, "Unknown errors", &report.unknown_errors);
    out
}

/// Markdown tables for pull requests and wikis.
pub fn render_coverage_markdown(report: &CoverageReport) -> String {
    let mut out = String::from("# Coverage Report\n\n");
    let summary = &report.summary;
    out.push_str("| Metric | Value |\n|---|---|\n");
    out.push_str(&format!("| Scenarios | {} |\n", summary.total_scenarios));
    out.push_str(&format!("| Steps | {} |\n", summary.total_steps));
    out.push_str(&format!("| Commands | {} |\n", summary.total_commands));
    out.push_str(&format!("| Error codes | {} |\n", summary.total_errors));
    out.push_str(&format!("| Jobs | {} |\n", summary.total_jobs));
    if let Some(commands) = summary.commands.as_ref() {
        out.push_str(&format!(
            "| Command coverage | {}/{} ({:.1}%) |\n",
            commands.tested, commands.known, commands.coverage_percent
        ));
    }
    if let Some(errors) = summary.errors.as_ref() {
        out.push_str(&format!(
            "| Error coverage | {}/{} ({:.1}%) |\n",
            errors.tested, errors.known, errors.coverage_percent
        ));
    }

    if !report.commands.is_empty() {
        out.push_str("\n## Commands\n\n| Command | Scenarios | Steps | Error tests |\n|---|---|---|---|\n");
        for row in &report.commands {
            out.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                row.command,
                row.scenario_count,
                row.step_count,
                if row.has_error_tests { "yes" } else { "no" }
            ));
        }
    }
    if !report.errors.is_empty() {
        out.push_str("\n## Error Codes\n\n| Code | Scenarios |\n|---|---|\n");
        for row in &report.errors {
            out.push_str(&format!("| `{}` | {} |\n", row.code, row.scenario_count));
        }
    }
    if !report.jobs.is_empty() {
        out.push_str("\n## Jobs\n\n| Job | Scenarios | Avg steps | Tags |\n|---|---|---|---|\n");
        for row in &report.jobs {
            out.push_str(&format!(
                "| {} | {} | {:.1} | {} |\n",
                row.job,
                row.scenario_count,
                row.avg_steps,
                row.tags.join(", ")
            ));
        }
    }
    let untested_commands = untested(summary.commands.as_ref());
    if !untested_commands.is_empty() {
        out.push_str("\n## Untested Commands\n\n");
        for name in untested_commands {
            out.push_str(&format!("- `{name}`\n"));
        }
    }
    let untested_errors = untested(summary.errors.as_ref());
    if !untested_errors.is_empty() {
        out.push_str("\n## Untested Errors\n\n");
        for name in untested_errors {
            out.push_str(&format!("- `{name}`\n"));
        }
    }
    out
}

pub fn render_coverage_json(report: &CoverageReport) -> Result<String> {
    let mut text = serde_json::to_string_pretty(report).context("serialize coverage report")?;
    text.push('\n');
    Ok(text)
}

fn append_dimension_line(out: &mut String, label: &str, summary: Option<&DimensionSummary>) {
    let Some(summary) = summary else {
        return;
    };
    out.push_str(&format!(
        "  {label}: {}/{} tested ({:.1}%)\n",
        summary.tested, summary.known, summary.coverage_percent
    ));
}

fn append_name_list(out: &mut String, heading: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    out.push_str(&format!("\n{heading}: {}\n", names.join(", ")));
}

fn untested(summary: Option<&DimensionSummary>) -> &[String] {
    summary
        .map(|summary| summary.untested.as_slice())
        .unwrap_or_default()
}
