//! Scenario documents, variable references, and the execution engine.
//!
//! Scenarios are read-only once loaded. Execution produces result values
//! that nothing mutates afterwards; coverage and reports are computed from
//! those snapshots.
mod load;
mod prepare;
pub mod reference;
pub mod resolve;
mod run;
mod types;

pub use load::{
    build_listing, discover_scenarios, format_listing, load_scenario_file, load_scenarios,
    validate_scenario, LoadedScenario, ScenarioFilter, ScenarioListing, ScenarioSummary,
};
pub use prepare::PreparedScenario;
pub use reference::{InputTemplate, ReferenceError, VarRef};
pub use resolve::{resolve_input, ResolutionError, StepOutput};
pub use run::{
    execute_scenario, execute_step, match_expectation, run_scenarios, run_scenarios_streaming,
    ExecutorOptions, FailFast, RunOptions,
};
pub use types::*;
