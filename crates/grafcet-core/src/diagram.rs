//! The compiled chart document.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    element::{ActionBlock, Connection, Element, Gate, Step, Transition},
    geometry::Bounds,
};

/// Current document format version.
pub const DIAGRAM_VERSION: &str = "1.0";

/// A compiled GRAFCET chart: metadata plus a flat list of elements.
///
/// Element order is meaningful. Steps appear in declaration order and the
/// simulator keeps active-step sets in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafcetDiagram {
    #[serde(default)]
    title: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    elements: Vec<Element>,
}

fn default_version() -> String {
    DIAGRAM_VERSION.to_string()
}

impl GrafcetDiagram {
    /// Creates an empty diagram with the current format version.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: default_version(),
            elements: Vec::new(),
        }
    }

    /// Creates a diagram from an already built element list.
    pub fn from_elements(title: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            title: title.into(),
            version: default_version(),
            elements,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Looks up an element by id.
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|element| element.id() == id)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.elements.iter().filter_map(Element::as_step)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.elements.iter().filter_map(Element::as_transition)
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionBlock> {
        self.elements.iter().filter_map(Element::as_action)
    }

    pub fn gates(&self) -> impl Iterator<Item = &Gate> {
        self.elements.iter().filter_map(Element::as_gate)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.elements.iter().filter_map(Element::as_connection)
    }

    pub fn initial_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps().filter(|step| step.is_initial())
    }

    pub fn step_by_number(&self, number: u32) -> Option<&Step> {
        self.steps().find(|step| step.number() == number)
    }

    /// Returns the bounds enclosing every positioned element, or `None` for a
    /// diagram without any.
    pub fn extent(&self) -> Option<Bounds> {
        self.elements
            .iter()
            .filter_map(Element::bounds)
            .reduce(|acc, bounds| acc.merge(&bounds))
    }

    /// Returns the connections whose source or target id is not present in
    /// this diagram.
    pub fn dangling_connections(&self) -> Vec<&Connection> {
        let ids: HashSet<&str> = self.elements.iter().map(Element::id).collect();
        self.connections()
            .filter(|conn| !ids.contains(conn.source_id()) || !ids.contains(conn.target_id()))
            .collect()
    }

    /// Returns every step number used by more than one step, in ascending order.
    pub fn duplicate_step_numbers(&self) -> Vec<u32> {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for step in self.steps() {
            *counts.entry(step.number()).or_default() += 1;
        }
        let mut duplicates: Vec<u32> = counts
            .into_iter()
            .filter_map(|(number, count)| (count > 1).then_some(number))
            .collect();
        duplicates.sort_unstable();
        duplicates
    }
}
