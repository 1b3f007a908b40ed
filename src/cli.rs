//! CLI argument parsing for `seval`.
//!
//! The CLI is a thin transport over the library operations; flags override
//! values from an optional config file.
use clap::{Parser, Subcommand};
use scenario_eval::coverage::CoverageFormat;
use scenario_eval::report::ReportFormat;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "seval",
    version,
    about = "Run declarative command scenarios and report coverage",
    after_help = "Examples:\n  seval run --scenarios scenarios/ --handler \"./todo-backend\"\n  seval run --scenarios scenarios/ --format junit --out report.xml\n  seval list --scenarios scenarios/ --tag smoke\n  seval coverage --scenarios scenarios/ --known-commands todo-create,todo-get\n  seval init --config seval.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level (otherwise SEVAL_LOG, default warn)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    List(ListArgs),
    Coverage(CoverageArgs),
    Init(InitArgs),
}

/// Scenario selection shared by every subcommand that loads scenarios.
#[derive(clap::Args, Debug)]
pub struct SelectArgs {
    /// Scenario directories or files
    #[arg(long = "scenarios", value_name = "PATH", required = true, num_args = 1..)]
    pub scenarios: Vec<PathBuf>,

    /// Only scenarios for this job (exact, case-insensitive)
    #[arg(long, value_name = "JOB")]
    pub job: Option<String>,

    /// Only scenarios carrying this tag (repeatable; all must match)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Execute scenarios and print a report")]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Scenarios in flight at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Skip remaining scenarios after the first failing batch
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep running steps after a failing step
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Per-scenario timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Write the report to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Overwrite an existing --out file
    #[arg(long)]
    pub force: bool,

    /// Command line of the handler process; the command name is appended
    #[arg(long, value_name = "ARGV")]
    pub handler: Option<String>,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "List scenarios with their jobs and tags")]
pub struct ListArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize command, error, and job coverage")]
pub struct CoverageArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Commands the system under test exposes (comma separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub known_commands: Option<Vec<String>>,

    /// Error codes the system under test can return (comma separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub known_errors: Option<Vec<String>>,

    #[arg(long, value_enum)]
    pub format: Option<CoverageFormat>,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Write a config file with default settings")]
pub struct InitArgs {
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
