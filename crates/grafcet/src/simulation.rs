//! Discrete-event execution of a compiled chart.
//!
//! A simulation advances only when inputs are applied. One call of
//! [`execute_step`] evaluates every enabled transition against the state it
//! was given, fires the ones whose guards hold, and returns the next state
//! together with the actions of the steps it activated.
//!
//! # Example
//!
//! ```
//! # use grafcet::{GrafcetBuilder, simulation::{Inputs, execute_step, init}};
//! let source = "Step 0 (Initial)\nTransition \"Start\"\nStep 1\n    Action \"X\"\nTransition \"Done\"\nJump 0\n";
//! let compiled = GrafcetBuilder::default().compile(source).unwrap();
//! let diagram = compiled.diagram();
//!
//! let state = init(diagram);
//! let outcome = execute_step(diagram, &state, &Inputs::new().with_transition("Start", true));
//! assert_eq!(outcome.state.active_steps(), ["step-1"]);
//! assert_eq!(outcome.actions[0].variable, "X");
//! ```

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use grafcet_core::{
    diagram::GrafcetDiagram,
    element::{ActionBlock, ActionQualifier, Step},
};
use grafcet_parser::guard::{CompareOp, GuardExpr, parse_guard};

use crate::topology::{Topology, TransitionLinks};

/// The set of active steps.
///
/// Step ids are kept in diagram order, so two states with the same active
/// steps compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    active_steps: Vec<String>,
}

impl SimulationState {
    pub fn new(active_steps: Vec<String>) -> Self {
        Self { active_steps }
    }

    pub fn active_steps(&self) -> &[String] {
        &self.active_steps
    }

    pub fn is_active(&self, step_id: &str) -> bool {
        self.active_steps.iter().any(|id| id == step_id)
    }

    pub fn is_empty(&self) -> bool {
        self.active_steps.is_empty()
    }
}

/// Input values applied by one simulation step.
///
/// `transitions` holds direct truth values keyed by transition name, id or
/// condition text. `variables` holds the values guard expressions read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inputs {
    pub transitions: IndexMap<String, bool>,
    pub variables: IndexMap<String, Value>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transition(mut self, label: impl Into<String>, value: bool) -> Self {
        self.transitions.insert(label.into(), value);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// A problem with the inputs of one simulation step.
///
/// Never fatal: the affected guard is treated as false.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationInputError {
    #[error("no transition is labelled `{0}`")]
    UnknownTransition(String),

    #[error("no guard reads variable `{0}`")]
    UnknownVariable(String),

    /// A comparison reads a variable without a value.
    #[error("guard of {transition} compares `{name}`, which has no value")]
    MissingVariable { transition: String, name: String },

    #[error("variable `{name}` is {found}, expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// An action of a step activated by a simulation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredAction {
    pub step: String,
    pub variable: String,
    pub qualifier: ActionQualifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Result of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: SimulationState,
    /// Actions of the activated steps, in activation order.
    pub actions: Vec<FiredAction>,
    /// Names of the fired transitions, in diagram order.
    pub fired: Vec<String>,
    pub input_warnings: Vec<SimulationInputError>,
}

/// The initial state of a diagram: every initial step active.
pub fn init(diagram: &GrafcetDiagram) -> SimulationState {
    SimulationState::new(
        diagram
            .initial_steps()
            .map(|step| step.id().to_string())
            .collect(),
    )
}

/// Apply one set of inputs to `state`.
///
/// Prepares the diagram on every call; use a [`Simulator`] to run many steps
/// against the same diagram.
pub fn execute_step(
    diagram: &GrafcetDiagram,
    state: &SimulationState,
    inputs: &Inputs,
) -> StepOutcome {
    Simulator::new(diagram).step(state, inputs)
}

/// A diagram prepared for simulation.
#[derive(Debug, Clone)]
pub struct Simulator<'d> {
    diagram: &'d GrafcetDiagram,
    topology: Topology<'d>,
    /// Parsed guard of each transition, aligned with the topology.
    guards: Vec<Option<GuardExpr>>,
    steps: HashMap<&'d str, &'d Step>,
    actions: HashMap<&'d str, &'d ActionBlock>,
    /// Names, ids and conditions of every transition.
    labels: HashSet<&'d str>,
    /// Variables read by at least one guard.
    variables: HashSet<String>,
}

impl<'d> Simulator<'d> {
    pub fn new(diagram: &'d GrafcetDiagram) -> Self {
        let topology = Topology::new(diagram);

        let guards: Vec<Option<GuardExpr>> = topology
            .transitions()
            .iter()
            .map(|links| {
                let condition = links.transition.condition().trim();
                if condition.is_empty() {
                    return None;
                }
                match parse_guard(condition) {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        debug!(transition = links.transition.name(), condition; "Guard does not parse, treated as false");
                        None
                    }
                }
            })
            .collect();

        let labels = topology
            .transitions()
            .iter()
            .flat_map(|links| {
                let transition = links.transition;
                [transition.name(), transition.id(), transition.condition()]
            })
            .collect();

        let variables = guards
            .iter()
            .flatten()
            .flat_map(GuardExpr::variables)
            .map(str::to_string)
            .collect();

        Self {
            diagram,
            topology,
            guards,
            steps: diagram.steps().map(|step| (step.id(), step)).collect(),
            actions: diagram.actions().map(|action| (action.id(), action)).collect(),
            labels,
            variables,
        }
    }

    pub fn diagram(&self) -> &'d GrafcetDiagram {
        self.diagram
    }

    pub fn init(&self) -> SimulationState {
        init(self.diagram)
    }

    /// Apply one set of inputs to `state`.
    pub fn step(&self, state: &SimulationState, inputs: &Inputs) -> StepOutcome {
        let mut warnings = self.check_inputs(inputs);
        let active: HashSet<&str> = state.active_steps().iter().map(String::as_str).collect();

        // Enabled transitions whose guard holds, judged on the state before
        // anything fires.
        let mut candidates = Vec::new();
        for (index, links) in self.topology.transitions().iter().enumerate() {
            let enabled =
                !links.sources.is_empty() && links.sources.iter().all(|id| active.contains(id));
            if enabled && self.guard_holds(index, links, inputs, &mut warnings) {
                candidates.push(links);
            }
        }

        // Alternative branches: the first declared one wins.
        let mut claimed = HashSet::new();
        let fired: Vec<&TransitionLinks<'d>> = candidates
            .into_iter()
            .filter(|links| match links.or_divergence {
                Some(gate) => {
                    let first = claimed.insert(gate);
                    if !first {
                        debug!(transition = links.transition.name(), gate; "Alternative branch already taken");
                    }
                    first
                }
                None => true,
            })
            .collect();

        let deactivated: HashSet<&str> = fired
            .iter()
            .flat_map(|links| links.sources.iter().copied())
            .collect();
        let mut activated: Vec<&str> = Vec::new();
        for links in &fired {
            debug!(transition = links.transition.name(), targets:? = links.targets; "Transition fired");
            for &target in &links.targets {
                let stays_active = active.contains(target) && !deactivated.contains(target);
                if !stays_active && !activated.contains(&target) {
                    activated.push(target);
                }
            }
        }

        let next = SimulationState::new(
            self.diagram
                .steps()
                .map(Step::id)
                .filter(|id| {
                    (active.contains(id) && !deactivated.contains(id)) || activated.contains(id)
                })
                .map(str::to_string)
                .collect(),
        );

        let actions = activated
            .iter()
            .filter_map(|id| self.steps.get(id))
            .flat_map(|step| step.actions())
            .filter_map(|action_id| self.actions.get(action_id.as_str()))
            .map(|action| FiredAction {
                step: action.step_id().to_string(),
                variable: action.variable().to_string(),
                qualifier: action.qualifier(),
                duration: action.duration().map(str::to_string),
            })
            .collect();

        for warning in &warnings {
            warn!(warning:%; "Simulation input ignored");
        }
        trace!(active:? = next.active_steps(); "Simulation step complete");

        StepOutcome {
            state: next,
            actions,
            fired: fired
                .iter()
                .map(|links| links.transition.name().to_string())
                .collect(),
            input_warnings: warnings,
        }
    }

    /// Input keys that no transition or guard refers to.
    fn check_inputs(&self, inputs: &Inputs) -> Vec<SimulationInputError> {
        let transitions = inputs
            .transitions
            .keys()
            .filter(|label| {
                !self.labels.contains(label.as_str()) && !self.variables.contains(label.as_str())
            })
            .map(|label| SimulationInputError::UnknownTransition(label.clone()));
        let variables = inputs
            .variables
            .keys()
            .filter(|name| !self.variables.contains(name.as_str()))
            .map(|name| SimulationInputError::UnknownVariable(name.clone()));
        transitions.chain(variables).collect()
    }

    fn guard_holds(
        &self,
        index: usize,
        links: &TransitionLinks<'d>,
        inputs: &Inputs,
        warnings: &mut Vec<SimulationInputError>,
    ) -> bool {
        let transition = links.transition;
        let direct = [transition.name(), transition.id(), transition.condition().trim()]
            .into_iter()
            .find_map(|label| inputs.transitions.get(label));
        if let Some(&value) = direct {
            return value;
        }

        let Some(guard) = self.guards.get(index).and_then(Option::as_ref) else {
            return false;
        };
        let evaluator = Evaluator {
            inputs,
            transition: transition.name(),
        };
        match evaluator.truth(guard) {
            Ok(value) => value,
            Err(err) => {
                warnings.push(err);
                false
            }
        }
    }
}

/// A guard operand after variable lookup.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Operand {
    fn type_name(&self) -> &'static str {
        match self {
            Operand::Bool(_) => "a boolean",
            Operand::Number(_) => "a number",
            Operand::Text(_) => "a string",
        }
    }
}

/// Evaluates guards of one transition against one set of inputs.
struct Evaluator<'a> {
    inputs: &'a Inputs,
    transition: &'a str,
}

impl Evaluator<'_> {
    fn truth(&self, expr: &GuardExpr) -> Result<bool, SimulationInputError> {
        match expr {
            GuardExpr::Not(inner) => Ok(!self.truth(inner)?),
            GuardExpr::And(lhs, rhs) => Ok(self.truth(lhs)? && self.truth(rhs)?),
            GuardExpr::Or(lhs, rhs) => Ok(self.truth(lhs)? || self.truth(rhs)?),
            // An input nobody set reads as false.
            GuardExpr::Variable(name) if self.is_unset(name) => Ok(false),
            _ => match self.operand(expr)? {
                Operand::Bool(value) => Ok(value),
                Operand::Number(value) => Ok(value != 0.0),
                Operand::Text(_) => Err(SimulationInputError::WrongType {
                    name: expr.to_string(),
                    expected: "a boolean",
                    found: "a string",
                }),
            },
        }
    }

    fn operand(&self, expr: &GuardExpr) -> Result<Operand, SimulationInputError> {
        match expr {
            GuardExpr::Bool(value) => Ok(Operand::Bool(*value)),
            GuardExpr::Number(value) => Ok(Operand::Number(*value)),
            GuardExpr::Text(value) => Ok(Operand::Text(value.clone())),
            GuardExpr::Variable(name) => self.lookup(name),
            GuardExpr::Compare { op, lhs, rhs } => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                compare(*op, &lhs, &rhs)
                    .map(Operand::Bool)
                    .ok_or_else(|| SimulationInputError::WrongType {
                        name: expr.to_string(),
                        expected: lhs.type_name(),
                        found: rhs.type_name(),
                    })
            }
            GuardExpr::Not(_) | GuardExpr::And(..) | GuardExpr::Or(..) => {
                self.truth(expr).map(Operand::Bool)
            }
        }
    }

    fn is_unset(&self, name: &str) -> bool {
        !self.inputs.variables.contains_key(name) && !self.inputs.transitions.contains_key(name)
    }

    /// A variable value, falling back to a transition truth value of the
    /// same name.
    fn lookup(&self, name: &str) -> Result<Operand, SimulationInputError> {
        if let Some(value) = self.inputs.variables.get(name) {
            let wrong_type = |found| SimulationInputError::WrongType {
                name: name.to_string(),
                expected: "a boolean, number or string",
                found,
            };
            return match value {
                Value::Bool(value) => Ok(Operand::Bool(*value)),
                Value::Number(number) => number
                    .as_f64()
                    .map(Operand::Number)
                    .ok_or_else(|| wrong_type("an unrepresentable number")),
                Value::String(text) => Ok(Operand::Text(text.clone())),
                Value::Null => Err(wrong_type("null")),
                Value::Array(_) => Err(wrong_type("an array")),
                Value::Object(_) => Err(wrong_type("an object")),
            };
        }
        if let Some(&value) = self.inputs.transitions.get(name) {
            return Ok(Operand::Bool(value));
        }
        Err(SimulationInputError::MissingVariable {
            transition: self.transition.to_string(),
            name: name.to_string(),
        })
    }
}

/// Compare two operands of the same type; `None` for mixed types.
fn compare(op: CompareOp, lhs: &Operand, rhs: &Operand) -> Option<bool> {
    use std::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Operand::Number(a), Operand::Number(b)) => a.partial_cmp(b),
        (Operand::Text(a), Operand::Text(b)) => Some(a.cmp(b)),
        (Operand::Bool(a), Operand::Bool(b)) => Some(a.cmp(b)),
        _ => return None,
    };
    let Some(ordering) = ordering else {
        // NaN is equal to nothing.
        return Some(op == CompareOp::Ne);
    };
    Some(match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use grafcet_parser::parse;
    use serde_json::json;

    use crate::compiler::Compiler;

    use super::*;

    fn diagram(source: &str) -> GrafcetDiagram {
        let input = parse(source).expect("source should parse");
        Compiler::default()
            .compile(input)
            .expect("source should compile")
            .resolve_jumps()
            .expect("jumps should resolve")
            .into_diagram()
    }

    fn state(ids: &[&str]) -> SimulationState {
        SimulationState::new(ids.iter().map(|id| id.to_string()).collect())
    }

    const LOOP: &str = r#"
Step 0 (Initial)
Transition "Start"
Step 1
    Action "X"
Transition "Done"
Jump 0
"#;

    const PARALLEL: &str = r#"
Step 0 (Initial)
Transition go
Divergence AND
Branch
    Step 1
        Action Pump
EndBranch
Branch
    Step 2
        Action Mixer (S)
    Transition mixed
    Step 3
EndBranch
EndDivergence
Transition join
Jump 0
"#;

    const CHOICE: &str = r#"
Step 0 (Initial)
Divergence OR
Branch
    Transition LEVEL >= 80
    Step 1
    Transition drained
EndBranch
Branch
    Transition TEMP > 50
    Step 2
        Action Cool
    Transition cooled
EndBranch
EndDivergence
Jump 0
"#;

    #[test]
    fn test_init_activates_initial_steps() {
        let diagram = diagram(LOOP);
        assert_eq!(init(&diagram), state(&["step-0"]));
    }

    #[test]
    fn test_loop_round_trip() {
        let diagram = diagram(LOOP);
        let start = execute_step(&diagram, &init(&diagram), &Inputs::new().with_transition("Start", true));
        assert_eq!(start.state, state(&["step-1"]));
        assert_eq!(start.fired, ["T0"]);
        assert_eq!(start.actions.len(), 1);
        assert_eq!(start.actions[0].variable, "X");
        assert_eq!(start.actions[0].qualifier, ActionQualifier::NonStored);

        let done = execute_step(&diagram, &start.state, &Inputs::new().with_transition("Done", true));
        assert_eq!(done.state, state(&["step-0"]));
        assert!(done.actions.is_empty());
    }

    #[test]
    fn test_transition_matched_by_name_or_id() {
        let diagram = diagram(LOOP);
        for label in ["T0", "transition-0"] {
            let outcome =
                execute_step(&diagram, &init(&diagram), &Inputs::new().with_transition(label, true));
            assert_eq!(outcome.state, state(&["step-1"]), "label {label}");
        }
    }

    #[test]
    fn test_no_guard_true_keeps_state() {
        let diagram = diagram(LOOP);
        let before = init(&diagram);
        let outcome = execute_step(&diagram, &before, &Inputs::new().with_transition("Done", true));
        assert_eq!(outcome.state, before);
        assert!(outcome.fired.is_empty());
        assert!(outcome.input_warnings.is_empty());
    }

    #[test]
    fn test_and_divergence_activates_every_branch() {
        let diagram = diagram(PARALLEL);
        let outcome = execute_step(&diagram, &init(&diagram), &Inputs::new().with_transition("go", true));
        assert_eq!(outcome.state, state(&["step-1", "step-2"]));
        let variables: Vec<&str> = outcome.actions.iter().map(|a| a.variable.as_str()).collect();
        assert_eq!(variables, ["Pump", "Mixer"]);
        assert_eq!(outcome.actions[1].qualifier, ActionQualifier::Set);
    }

    #[test]
    fn test_and_convergence_waits_for_every_branch() {
        let diagram = diagram(PARALLEL);
        let simulator = Simulator::new(&diagram);
        let join = Inputs::new().with_transition("join", true);

        let waiting = simulator.step(&state(&["step-1", "step-2"]), &join);
        assert_eq!(waiting.state, state(&["step-1", "step-2"]));

        let mixed = simulator.step(&waiting.state, &Inputs::new().with_transition("mixed", true));
        assert_eq!(mixed.state, state(&["step-1", "step-3"]));

        let joined = simulator.step(&mixed.state, &join);
        assert_eq!(joined.state, state(&["step-0"]));
    }

    #[test]
    fn test_or_divergence_takes_single_true_branch() {
        let diagram = diagram(CHOICE);
        let outcome = execute_step(
            &diagram,
            &init(&diagram),
            &Inputs::new()
                .with_variable("LEVEL", 20)
                .with_variable("TEMP", 75.5),
        );
        assert_eq!(outcome.state, state(&["step-2"]));
        assert_eq!(outcome.actions[0].variable, "Cool");
    }

    #[test]
    fn test_or_divergence_first_branch_wins() {
        let diagram = diagram(CHOICE);
        let inputs = Inputs::new().with_variable("LEVEL", 95).with_variable("TEMP", 75);
        let simulator = Simulator::new(&diagram);
        for _ in 0..3 {
            let outcome = simulator.step(&simulator.init(), &inputs);
            assert_eq!(outcome.state, state(&["step-1"]));
            assert_eq!(outcome.fired, ["T0"]);
        }
    }

    #[test]
    fn test_nested_or_divergences_share_one_choice() {
        let diagram = diagram(
            r#"
Step 0 (Initial)
Divergence OR
Branch
    Divergence OR
    Branch
        Transition a
        Step 1
        Transition a_done
    EndBranch
    Branch
        Transition b
        Step 2
        Transition b_done
    EndBranch
    EndDivergence
    Step 4
    Transition x_done
EndBranch
Branch
    Transition c
    Step 3
    Transition c_done
EndBranch
EndDivergence
Jump 0
"#,
        );
        let simulator = Simulator::new(&diagram);

        let inputs = Inputs::new().with_transition("a", true).with_transition("c", true);
        let outcome = simulator.step(&simulator.init(), &inputs);
        assert_eq!(outcome.state, state(&["step-1"]));
        assert_eq!(outcome.fired, ["T0"]);

        let inputs = Inputs::new().with_transition("b", true).with_transition("c", true);
        let outcome = simulator.step(&simulator.init(), &inputs);
        assert_eq!(outcome.state, state(&["step-2"]));
        assert_eq!(outcome.fired, ["T2"]);

        let inputs = Inputs::new().with_transition("c", true);
        let outcome = simulator.step(&simulator.init(), &inputs);
        assert_eq!(outcome.state, state(&["step-3"]));
    }

    #[test]
    fn test_missing_variable_is_false_with_warning() {
        let diagram = diagram(CHOICE);
        let outcome = execute_step(&diagram, &init(&diagram), &Inputs::new().with_variable("TEMP", 10));
        assert_eq!(outcome.state, state(&["step-0"]));
        assert_eq!(
            outcome.input_warnings,
            vec![SimulationInputError::MissingVariable {
                transition: "T0".to_string(),
                name: "LEVEL".to_string(),
            }]
        );
    }

    #[test]
    fn test_wrong_type_is_false_with_warning() {
        let diagram = diagram(CHOICE);
        let outcome = execute_step(
            &diagram,
            &init(&diagram),
            &Inputs::new()
                .with_variable("LEVEL", "high")
                .with_variable("TEMP", json!(null)),
        );
        assert_eq!(outcome.state, state(&["step-0"]));
        assert_eq!(outcome.input_warnings.len(), 2);
        assert!(
            outcome
                .input_warnings
                .iter()
                .all(|w| matches!(w, SimulationInputError::WrongType { .. }))
        );
    }

    #[test]
    fn test_unknown_inputs_are_reported() {
        let diagram = diagram(LOOP);
        let outcome = execute_step(
            &diagram,
            &init(&diagram),
            &Inputs::new()
                .with_transition("Launch", true)
                .with_variable("SPEED", 3),
        );
        assert_eq!(outcome.state, state(&["step-0"]));
        assert_eq!(
            outcome.input_warnings,
            vec![
                SimulationInputError::UnknownTransition("Launch".to_string()),
                SimulationInputError::UnknownVariable("SPEED".to_string()),
            ]
        );
    }

    #[test]
    fn test_boolean_guard_expression() {
        let diagram = diagram("Step 0 (Initial)\nTransition A AND NOT B\nStep 1\nTransition TRUE\nJump 0\n");
        let simulator = Simulator::new(&diagram);

        let blocked = simulator.step(
            &simulator.init(),
            &Inputs::new().with_variable("A", true).with_variable("B", true),
        );
        assert_eq!(blocked.state, state(&["step-0"]));

        // Variables fall back to transition truth values of the same name.
        let passed = simulator.step(
            &simulator.init(),
            &Inputs::new().with_transition("A", true).with_transition("B", false),
        );
        assert_eq!(passed.state, state(&["step-1"]));
        assert!(passed.input_warnings.is_empty());

        let back = simulator.step(&passed.state, &Inputs::new());
        assert_eq!(back.state, state(&["step-0"]));
    }

    #[test]
    fn test_compare() {
        use Operand::*;
        assert_eq!(compare(CompareOp::Ge, &Number(80.0), &Number(80.0)), Some(true));
        assert_eq!(compare(CompareOp::Lt, &Text("a".into()), &Text("b".into())), Some(true));
        assert_eq!(compare(CompareOp::Eq, &Bool(true), &Bool(false)), Some(false));
        assert_eq!(compare(CompareOp::Ne, &Number(f64::NAN), &Number(1.0)), Some(true));
        assert_eq!(compare(CompareOp::Eq, &Number(1.0), &Bool(true)), None);
    }

    #[test]
    fn test_state_json_shape() {
        let json = serde_json::to_value(state(&["step-1", "step-2"])).unwrap();
        assert_eq!(json, json!({ "activeSteps": ["step-1", "step-2"] }));
    }
}
