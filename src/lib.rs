//! Declarative scenario testing and coverage reporting.
//!
//! Scenarios are ordered command steps run against a pluggable
//! [`CommandHandler`](handler::CommandHandler). Later steps can reference
//! earlier outputs (`$prev.id`, `$steps.user.id`), results are checked
//! against partial expectations, and the outcomes feed terminal, JSON,
//! JUnit, and Markdown reports plus a coverage analysis.
pub mod config;
pub mod coverage;
pub mod errors;
pub mod evaluate;
pub mod handler;
pub mod report;
pub mod scenarios;
mod util;

pub use errors::{EngineError, Envelope, OperationalError};
pub use evaluate::{
    coverage, evaluate, evaluate_prepared, evaluate_with_progress, list_scenarios,
    CoverageOutcome, CoverageRequest, EvaluationOutcome, EvaluationRequest, ListRequest,
};
