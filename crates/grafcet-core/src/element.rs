//! Element types of a compiled chart.
//!
//! A compiled chart is a flat collection of [`Element`]s. Every element kind
//! is a variant of one closed enum, discriminated by a `type` tag in the
//! persisted JSON form, so layout and simulation code match exhaustively over
//! the kinds instead of probing fields.
//!
//! # JSON shape
//!
//! ```json
//! { "type": "step", "id": "step-0", "number": 0, "stepType": "initial", ... }
//! { "type": "transition", "id": "transition-0", "name": "T0", "condition": "START", ... }
//! { "type": "action-block", "id": "action-1-0", "stepId": "step-1", "variable": "MOTOR", ... }
//! { "type": "gate", "id": "gate-0", "kind": "and", "role": "divergence", ... }
//! { "type": "connection", "id": "conn-0", "sourceId": "step-0", "targetId": "transition-0", ... }
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Bounds, Point, Size};

/// The kind of a step.
///
/// `Task` and `Macro` steps behave like [`StepType::Normal`] steps during
/// simulation; they only carry an optional linked sub-chart name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Active when the chart is initialized.
    Initial,
    #[default]
    Normal,
    /// Step that runs a linked task chart.
    Task,
    /// Step that expands to a linked sub-chart.
    Macro,
}

impl StepType {
    /// Returns `true` for [`StepType::Initial`].
    pub fn is_initial(self) -> bool {
        matches!(self, StepType::Initial)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepType::Initial => write!(f, "Initial"),
            StepType::Normal => write!(f, "Normal"),
            StepType::Task => write!(f, "Task"),
            StepType::Macro => write!(f, "Macro"),
        }
    }
}

/// A GRAFCET step: a state that holds execution while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    id: String,
    #[serde(default)]
    number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default)]
    step_type: StepType,
    #[serde(default)]
    position: Point,
    #[serde(default)]
    size: Size,
    /// Ids of the owned action blocks, in declaration order.
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    linked_file: Option<String>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        number: u32,
        step_type: StepType,
        position: Point,
        size: Size,
    ) -> Self {
        Self {
            id: id.into(),
            number,
            label: None,
            step_type,
            position,
            size,
            actions: Vec::new(),
            linked_file: None,
        }
    }

    /// Sets the display label of the step.
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Sets the linked sub-chart of a task or macro step.
    pub fn with_linked_file(mut self, linked_file: Option<String>) -> Self {
        self.linked_file = linked_file;
        self
    }

    /// Appends an owned action block id.
    pub fn push_action(&mut self, action_id: impl Into<String>) {
        self.actions.push(action_id.into());
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn step_type(&self) -> StepType {
        self.step_type
    }

    pub fn is_initial(&self) -> bool {
        self.step_type.is_initial()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_top_left(self.position, self.size)
    }

    /// Ids of the owned action blocks, in declaration order.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn linked_file(&self) -> Option<&str> {
        self.linked_file.as_deref()
    }
}

/// Error returned when parsing an unknown action qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action qualifier `{0}`")]
pub struct UnknownQualifier(pub String);

/// IEC 61131-3 action qualifiers.
///
/// Time-based qualifiers keep their duration as text on the [`ActionBlock`];
/// the simulator is event-driven and never starts timers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionQualifier {
    /// `N`: active while the step is active.
    #[default]
    #[serde(rename = "N")]
    NonStored,
    /// `S`: latched on until reset.
    #[serde(rename = "S")]
    Set,
    /// `R`: resets a latched action.
    #[serde(rename = "R")]
    Reset,
    /// `P`: single pulse on activation.
    #[serde(rename = "P")]
    Pulse,
    #[serde(rename = "D")]
    Delayed,
    #[serde(rename = "L")]
    Limited,
    #[serde(rename = "SD")]
    StoredDelayed,
    #[serde(rename = "DS")]
    DelayedStored,
    #[serde(rename = "SL")]
    StoredLimited,
}

impl ActionQualifier {
    /// Returns the qualifier token as written in source.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionQualifier::NonStored => "N",
            ActionQualifier::Set => "S",
            ActionQualifier::Reset => "R",
            ActionQualifier::Pulse => "P",
            ActionQualifier::Delayed => "D",
            ActionQualifier::Limited => "L",
            ActionQualifier::StoredDelayed => "SD",
            ActionQualifier::DelayedStored => "DS",
            ActionQualifier::StoredLimited => "SL",
        }
    }

    /// Returns `true` for qualifiers whose behavior depends on a duration.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            ActionQualifier::Delayed
                | ActionQualifier::Limited
                | ActionQualifier::StoredDelayed
                | ActionQualifier::DelayedStored
                | ActionQualifier::StoredLimited
        )
    }
}

impl FromStr for ActionQualifier {
    type Err = UnknownQualifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "N" => Ok(ActionQualifier::NonStored),
            "S" => Ok(ActionQualifier::Set),
            "R" => Ok(ActionQualifier::Reset),
            "P" => Ok(ActionQualifier::Pulse),
            "D" => Ok(ActionQualifier::Delayed),
            "L" => Ok(ActionQualifier::Limited),
            "SD" => Ok(ActionQualifier::StoredDelayed),
            "DS" => Ok(ActionQualifier::DelayedStored),
            "SL" => Ok(ActionQualifier::StoredLimited),
            _ => Err(UnknownQualifier(s.to_string())),
        }
    }
}

impl fmt::Display for ActionQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action block owned by exactly one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBlock {
    id: String,
    step_id: String,
    variable: String,
    #[serde(default)]
    qualifier: ActionQualifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(default)]
    position: Point,
    #[serde(default)]
    size: Size,
}

impl ActionBlock {
    pub fn new(
        id: impl Into<String>,
        step_id: impl Into<String>,
        variable: impl Into<String>,
        qualifier: ActionQualifier,
        position: Point,
        size: Size,
    ) -> Self {
        Self {
            id: id.into(),
            step_id: step_id.into(),
            variable: variable.into(),
            qualifier,
            duration: None,
            position,
            size,
        }
    }

    /// Sets the duration text of a timed qualifier.
    pub fn with_duration(mut self, duration: Option<String>) -> Self {
        self.duration = duration;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the owning step.
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Name of the controlled variable.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn qualifier(&self) -> ActionQualifier {
        self.qualifier
    }

    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_top_left(self.position, self.size)
    }
}

/// A guarded transition between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    position: Point,
    #[serde(default)]
    size: Size,
}

impl Transition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        condition: impl Into<String>,
        position: Point,
        size: Size,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition: condition.into(),
            position,
            size,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, e.g. `T3`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Guard expression text.
    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Returns `true` if `label` names this transition by id, name or guard text.
    pub fn matches_label(&self, label: &str) -> bool {
        self.id == label || self.name == label || (!label.is_empty() && self.condition == label)
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_top_left(self.position, self.size)
    }
}

/// Whether a gate splits into parallel or alternative branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    /// Parallel branches: all branches are active together.
    And,
    /// Alternative branches: exactly one branch is taken.
    Or,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::And => write!(f, "AND"),
            GateKind::Or => write!(f, "OR"),
        }
    }
}

/// Whether a gate opens or closes a set of branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateRole {
    Divergence,
    Convergence,
}

/// A divergence or convergence gate spanning a set of branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    id: String,
    kind: GateKind,
    role: GateRole,
    #[serde(default)]
    position: Point,
    #[serde(default)]
    size: Size,
    /// One connection point per branch lane, in branch order.
    #[serde(default)]
    branch_points: Vec<Point>,
}

impl Gate {
    pub fn new(
        id: impl Into<String>,
        kind: GateKind,
        role: GateRole,
        position: Point,
        size: Size,
        branch_points: Vec<Point>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            role,
            position,
            size,
            branch_points,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> GateKind {
        self.kind
    }

    pub fn role(&self) -> GateRole {
        self.role
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_top_left(self.position, self.size)
    }

    pub fn branch_points(&self) -> &[Point] {
        &self.branch_points
    }
}

/// Direction of one segment of a routed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One axis-aligned piece of a routed connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    orientation: Orientation,
    start: Point,
    end: Point,
}

impl Segment {
    /// Creates a vertical segment at `x` from `from_y` to `to_y`.
    pub fn vertical(x: f32, from_y: f32, to_y: f32) -> Self {
        Self {
            orientation: Orientation::Vertical,
            start: Point::new(x, from_y),
            end: Point::new(x, to_y),
        }
    }

    /// Creates a horizontal segment at `y` from `from_x` to `to_x`.
    pub fn horizontal(y: f32, from_x: f32, to_x: f32) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            start: Point::new(from_x, y),
            end: Point::new(to_x, y),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// The degenerate bounds covered by this segment.
    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_points(self.start, self.end)
    }

    /// Returns `true` when the segment runs along its declared axis.
    pub fn is_axis_aligned(&self) -> bool {
        match self.orientation {
            Orientation::Horizontal => self.start.y() == self.end.y(),
            Orientation::Vertical => self.start.x() == self.end.x(),
        }
    }
}

/// Whether a connection belongs to the forward flow or is a resolved jump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Flow,
    Jump,
}

/// A directed, orthogonally routed edge between two elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    id: String,
    source_id: String,
    target_id: String,
    #[serde(default)]
    kind: ConnectionKind,
    #[serde(default)]
    segments: Vec<Segment>,
}

impl Connection {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: ConnectionKind,
        segments: Vec<Segment>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            segments,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// A chart element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Element {
    Step(Step),
    Transition(Transition),
    ActionBlock(ActionBlock),
    Gate(Gate),
    Connection(Connection),
}

impl Element {
    /// Returns the element id.
    pub fn id(&self) -> &str {
        match self {
            Element::Step(step) => step.id(),
            Element::Transition(transition) => transition.id(),
            Element::ActionBlock(action) => action.id(),
            Element::Gate(gate) => gate.id(),
            Element::Connection(connection) => connection.id(),
        }
    }

    /// Returns the bounding box of positioned elements; `None` for connections.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Element::Step(step) => Some(step.bounds()),
            Element::Transition(transition) => Some(transition.bounds()),
            Element::ActionBlock(action) => Some(action.bounds()),
            Element::Gate(gate) => Some(gate.bounds()),
            Element::Connection(_) => None,
        }
    }

    pub fn as_step(&self) -> Option<&Step> {
        match self {
            Element::Step(step) => Some(step),
            _ => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            Element::Transition(transition) => Some(transition),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&ActionBlock> {
        match self {
            Element::ActionBlock(action) => Some(action),
            _ => None,
        }
    }

    pub fn as_gate(&self) -> Option<&Gate> {
        match self {
            Element::Gate(gate) => Some(gate),
            _ => None,
        }
    }

    pub fn as_connection(&self) -> Option<&Connection> {
        match self {
            Element::Connection(connection) => Some(connection),
            _ => None,
        }
    }
}
