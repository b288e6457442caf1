//! Ordered replay of input batches against one simulation.
//!
//! Every scenario is one [`execute_step`](crate::simulation::execute_step)
//! call. The runner starts from the initial state and threads the state of
//! each scenario into the next one, so the result list is a reproducible
//! execution trace.

use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use grafcet_core::diagram::GrafcetDiagram;

use crate::{
    config::SimulationConfig,
    simulation::{Inputs, Simulator},
    storage::{DiagramStore, StorageError, load_diagram},
};

/// A named batch of inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub variables: IndexMap<String, Value>,
    pub transitions: IndexMap<String, bool>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_transition(mut self, label: impl Into<String>, value: bool) -> Self {
        self.transitions.insert(label.into(), value);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    fn inputs(&self) -> Inputs {
        Inputs {
            transitions: self.transitions.clone(),
            variables: self.variables.clone(),
        }
    }
}

/// One entry of an execution trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub name: String,
    /// Active steps after the scenario was applied.
    pub active_steps: Vec<String>,
    /// Variables of the actions that fired.
    pub actions: Vec<String>,
    /// Names of the transitions that fired.
    pub fired: Vec<String>,
    pub variables: IndexMap<String, Value>,
    pub transitions: IndexMap<String, bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{count} scenarios exceed the limit of {max}")]
    TooManyScenarios { count: usize, max: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A scenario file: either a bare list or `{ "scenarios": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScenarioFile {
    List(Vec<Scenario>),
    Wrapped { scenarios: Vec<Scenario> },
}

impl ScenarioFile {
    pub fn into_scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioFile::List(scenarios) | ScenarioFile::Wrapped { scenarios } => scenarios,
        }
    }
}

/// Runs scenario lists, optionally bounded in length.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    max_scenarios: Option<usize>,
}

impl ScenarioRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_scenarios(mut self, max_scenarios: Option<usize>) -> Self {
        self.max_scenarios = max_scenarios;
        self
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new().with_max_scenarios(config.max_scenarios())
    }

    /// Run `scenarios` in order from the initial state of `diagram`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::TooManyScenarios`] before running anything
    /// when the list is longer than the configured bound.
    pub fn run(
        &self,
        diagram: &GrafcetDiagram,
        scenarios: &[Scenario],
    ) -> Result<Vec<ScenarioResult>, ScenarioError> {
        if let Some(max) = self.max_scenarios {
            if scenarios.len() > max {
                return Err(ScenarioError::TooManyScenarios {
                    count: scenarios.len(),
                    max,
                });
            }
        }

        let results = replay(diagram, scenarios);
        info!(scenarios = results.len(); "Scenarios complete");
        Ok(results)
    }
}

/// Run `scenarios` in order from the initial state of `diagram`, unbounded.
pub fn run_scenarios(diagram: &GrafcetDiagram, scenarios: &[Scenario]) -> Vec<ScenarioResult> {
    replay(diagram, scenarios)
}

fn replay(diagram: &GrafcetDiagram, scenarios: &[Scenario]) -> Vec<ScenarioResult> {
    let simulator = Simulator::new(diagram);
    let mut state = simulator.init();
    let mut results = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        let outcome = simulator.step(&state, &scenario.inputs());
        debug!(
            scenario = scenario.name,
            fired:? = outcome.fired,
            active:? = outcome.state.active_steps();
            "Scenario applied"
        );
        results.push(ScenarioResult {
            name: scenario.name.clone(),
            active_steps: outcome.state.active_steps().to_vec(),
            actions: outcome
                .actions
                .into_iter()
                .map(|action| action.variable)
                .collect(),
            fired: outcome.fired,
            variables: scenario.variables.clone(),
            transitions: scenario.transitions.clone(),
            warnings: outcome
                .input_warnings
                .iter()
                .map(ToString::to_string)
                .collect(),
        });
        state = outcome.state;
    }
    results
}

/// Load a stored diagram and run `scenarios` against it.
pub fn run_from_file(
    store: &dyn DiagramStore,
    path: &Path,
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioResult>, ScenarioError> {
    let diagram = load_diagram(store, path)?;
    ScenarioRunner::new().run(&diagram, scenarios)
}
