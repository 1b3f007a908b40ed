//! Scenarios paired with their pre-compiled step inputs.
use super::reference::{InputTemplate, ReferenceError};
use super::{Scenario, Step};

/// A scenario ready to execute: each step input is compiled once up front.
///
/// A malformed reference does not reject the scenario; the error is kept
/// next to its step and reported when that step is reached.
#[derive(Debug, Clone)]
pub struct PreparedScenario {
    pub scenario: Scenario,
    /// Display path of the document the scenario was loaded from.
    pub source: Option<String>,
    inputs: Vec<Result<InputTemplate, ReferenceError>>,
}

impl PreparedScenario {
    pub fn new(scenario: Scenario, source: Option<String>) -> Self {
        let inputs = scenario
            .steps
            .iter()
            .map(|step| InputTemplate::compile(&step.input))
            .collect();
        Self {
            scenario,
            source,
            inputs,
        }
    }

    pub fn name(&self) -> &str {
        &self.scenario.name
    }

    pub fn step_count(&self) -> usize {
        self.scenario.steps.len()
    }

    /// Steps with their compiled inputs, in declared order.
    pub fn steps(&self) -> impl Iterator<Item = (&Step, &Result<InputTemplate, ReferenceError>)> {
        self.scenario.steps.iter().zip(self.inputs.iter())
    }
}

impl From<Scenario> for PreparedScenario {
    fn from(scenario: Scenario) -> Self {
        PreparedScenario::new(scenario, None)
    }
}
