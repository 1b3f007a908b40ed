use clap::Parser;
use scenario_eval::config::{default_config, load_config, write_config, EvalConfig};
use scenario_eval::handler::{CommandHandler, ProcessHandler};
use scenario_eval::scenarios::{format_listing, ScenarioFilter};
use scenario_eval::{
    coverage, evaluate_with_progress, list_scenarios, CoverageRequest, EvaluationRequest,
    ListRequest, OperationalError,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, CoverageArgs, InitArgs, ListArgs, RootArgs, RunArgs, SelectArgs};

const OPERATIONAL_FAILURE: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Command::Run(args) => cmd_run(args).await,
        Command::List(args) => cmd_list(args),
        Command::Coverage(args) => cmd_coverage(args),
        Command::Init(args) => cmd_init(args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            if let Some(suggestion) = err.suggestion.as_deref() {
                eprintln!("hint: {suggestion}");
            }
            ExitCode::from(OPERATIONAL_FAILURE)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SEVAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode, OperationalError> {
    let config = load_optional_config(args.config.as_deref())?;
    let mut options = config.run_options();
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout = Some(Duration::from_millis(timeout_ms));
    }
    options.fail_fast |= args.fail_fast;
    if args.continue_on_failure {
        options.executor.stop_on_failure = false;
    }
    let format = args.format.unwrap_or(config.format);

    let handler: Option<Arc<dyn CommandHandler>> = match args.handler.or(config.handler) {
        Some(line) => {
            let handler = ProcessHandler::from_command_line(&line)
                .map_err(|err| OperationalError::from_anyhow(&err))?;
            Some(Arc::new(handler))
        }
        None => None,
    };

    let request = EvaluationRequest {
        sources: args.select.scenarios.clone(),
        filter: filter_from(&args.select),
        options,
        format,
        output: args.out,
        overwrite: args.force,
    };
    let outcome = evaluate_with_progress(&request, handler, |result| {
        tracing::info!(
            scenario = %result.name,
            outcome = result.outcome.as_str(),
            duration_ms = result.duration_ms,
            "scenario completed"
        );
    })
    .await
    .into_result()?;

    match outcome.output_path.as_deref() {
        Some(path) => eprintln!("wrote {} report to {path}", format.as_str()),
        None => print!("{}", outcome.formatted),
    }
    Ok(ExitCode::from(u8::try_from(outcome.exit_code).unwrap_or(1)))
}

fn cmd_list(args: ListArgs) -> Result<ExitCode, OperationalError> {
    let request = ListRequest {
        sources: args.select.scenarios.clone(),
        filter: filter_from(&args.select),
    };
    let listing = list_scenarios(&request).into_result()?;
    if args.json {
        let text = serde_json::to_string_pretty(&listing)
            .map_err(|err| OperationalError::new("INTERNAL_ERROR", err.to_string()))?;
        println!("{text}");
    } else {
        print!("{}", format_listing(&listing));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_coverage(args: CoverageArgs) -> Result<ExitCode, OperationalError> {
    let config = load_optional_config(args.config.as_deref())?;
    let mut known = config.known_universe();
    if args.known_commands.is_some() {
        known.commands = args.known_commands;
    }
    if args.known_errors.is_some() {
        known.errors = args.known_errors;
    }
    let request = CoverageRequest {
        sources: args.select.scenarios.clone(),
        filter: filter_from(&args.select),
        known,
        format: args.format.unwrap_or_default(),
    };
    let outcome = coverage(&request).into_result()?;
    print!("{}", outcome.formatted);
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(args: InitArgs) -> Result<ExitCode, OperationalError> {
    write_config(&args.config, &default_config(), args.force)
        .map_err(|err| OperationalError::from_anyhow(&err))?;
    eprintln!("wrote {}", args.config.display());
    Ok(ExitCode::SUCCESS)
}

fn load_optional_config(path: Option<&Path>) -> Result<EvalConfig, OperationalError> {
    match path {
        Some(path) => load_config(path).map_err(|err| OperationalError::from_anyhow(&err)),
        None => Ok(default_config()),
    }
}

fn filter_from(select: &SelectArgs) -> ScenarioFilter {
    ScenarioFilter {
        job: select.job.clone(),
        tags: select.tags.clone(),
    }
}
