//! JSON schema types for scenario documents and their results.
//!
//! Scenario types are read-only once loaded. Result types are built during a
//! single run and never mutated after they are appended to a report.
use crate::handler::CommandResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

fn default_input() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One test of a user-facing job: an ordered list of command steps.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub job: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureRef>,
    pub steps: Vec<Step>,
}

/// Pointer to fixture data loaded by an external collaborator before a run.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FixtureRef {
    Path(String),
    Spec {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        overrides: Option<Value>,
    },
}

/// Single command invocation and its expected outcome.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Step {
    #[serde(default)]
    pub description: String,
    pub command: String,
    #[serde(default = "default_input")]
    pub input: Value,
    pub expect: Expectation,
    /// Name later steps use in `$steps.<alias>` references.
    #[serde(default, alias = "as", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Partial description of what a step result must satisfy.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExpectedError>,
}

/// Expected error; only `code` is checked.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ExpectedError {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Classification of a single step.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Pass,
    Fail,
    Error,
    Skip,
}

/// Classification of a whole scenario.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Pass,
    Partial,
    Fail,
    Error,
    Skip,
}

impl ScenarioOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioOutcome::Pass => "pass",
            ScenarioOutcome::Partial => "partial",
            ScenarioOutcome::Fail => "fail",
            ScenarioOutcome::Error => "error",
            ScenarioOutcome::Skip => "skip",
        }
    }

    /// Whether this outcome trips fail-fast and a non-zero exit code.
    pub fn is_failing(&self) -> bool {
        matches!(
            self,
            ScenarioOutcome::Partial | ScenarioOutcome::Fail | ScenarioOutcome::Error
        )
    }
}

/// Recorded result of one step.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StepResult {
    pub index: usize,
    pub command: String,
    #[serde(default)]
    pub description: String,
    pub outcome: StepOutcome,
    /// Input actually sent to the handler, after reference resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<CommandResult>,
    pub duration_ms: u64,
    /// Mismatch or fault description for `fail`/`error` steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepResult {
    pub fn skipped(index: usize, step: &Step) -> Self {
        Self {
            index,
            command: step.command.clone(),
            description: step.description.clone(),
            outcome: StepOutcome::Skip,
            resolved_input: None,
            actual: None,
            duration_ms: 0,
            message: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StepOutcome::Fail | StepOutcome::Error)
    }
}

/// Recorded result of one scenario.
///
/// `passed_steps + failed_steps + skipped_steps == steps.len()` always holds;
/// `failed_steps` counts both `fail` and `error` steps.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScenarioResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub name: String,
    pub job: String,
    pub outcome: ScenarioOutcome,
    pub steps: Vec<StepResult>,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub started_at_epoch_ms: u128,
    pub ended_at_epoch_ms: u128,
    pub duration_ms: u64,
    /// Scenario-level note (timeout, handler panic, fail-fast skip).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScenarioResult {
    /// First step that failed or errored, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.is_failure())
    }

    /// Failure text for reports: the first failing step's message, falling
    /// back to the scenario-level note.
    pub fn failure_message(&self) -> Option<String> {
        self.first_failure()
            .and_then(|step| step.message.clone())
            .or_else(|| self.message.clone())
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Count `(passed, failed, skipped)` steps, with `error` counted as failed.
pub(crate) fn count_steps(steps: &[StepResult]) -> (usize, usize, usize) {
    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for step in steps {
        match step.outcome {
            StepOutcome::Pass => passed += 1,
            StepOutcome::Fail | StepOutcome::Error => failed += 1,
            StepOutcome::Skip => skipped += 1,
        }
    }
    (passed, failed, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scenario_parses_with_defaults_and_alias() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "create then read",
            "job": "manage-todos",
            "tags": ["smoke", "crud"],
            "steps": [
                {"command": "todo-create", "input": {"title": "x"}, "expect": {"success": true}, "as": "created"},
                {"command": "todo-get", "expect": {"success": false, "error": {"code": "NOT_FOUND"}}}
            ]
        }))
        .expect("parse scenario");
        assert_eq!(scenario.steps[0].alias.as_deref(), Some("created"));
        assert_eq!(scenario.steps[1].input, json!({}));
        assert!(scenario.tags.contains("smoke"));
        assert_eq!(
            scenario.steps[1].expect.error.as_ref().map(|e| e.code.as_str()),
            Some("NOT_FOUND")
        );
    }

    #[test]
    fn fixture_accepts_path_or_spec() {
        let short: FixtureRef = serde_json::from_value(json!("fixtures/seed.json")).expect("path");
        assert_eq!(short, FixtureRef::Path("fixtures/seed.json".to_string()));
        let long: FixtureRef =
            serde_json::from_value(json!({"file": "fixtures/seed.json"})).expect("spec");
        assert!(matches!(long, FixtureRef::Spec { .. }));
    }

    #[test]
    fn unknown_step_fields_are_rejected() {
        let parsed = serde_json::from_value::<Step>(json!({
            "command": "x",
            "expect": {"success": true},
            "unexpected": 1
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn count_steps_folds_error_into_failed() {
        let step = Step {
            description: String::new(),
            command: "c".to_string(),
            input: json!({}),
            expect: Expectation::default(),
            alias: None,
        };
        let mut results = vec![StepResult::skipped(0, &step), StepResult::skipped(1, &step)];
        results[0].outcome = StepOutcome::Error;
        assert_eq!(count_steps(&results), (0, 1, 1));
    }
}
