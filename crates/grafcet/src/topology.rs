//! Step and transition topology of a compiled diagram.
//!
//! Connections link elements of every kind; the simulator and the chart
//! analysis only care which steps feed a transition and which steps it
//! activates. Gates are looked through: an AND convergence makes a
//! transition depend on the last step of every branch, an AND divergence
//! makes it activate the first step of every branch.

use std::collections::{HashMap, HashSet};

use grafcet_core::{
    diagram::GrafcetDiagram,
    element::{Element, GateKind, GateRole, Transition},
};

/// The steps around one transition.
#[derive(Debug, Clone)]
pub struct TransitionLinks<'d> {
    pub transition: &'d Transition,
    /// Steps that must all be active for the transition to be enabled.
    pub sources: Vec<&'d str>,
    /// Steps activated when the transition fires, in branch order.
    pub targets: Vec<&'d str>,
    /// The OR divergence this transition leads out of, if any. When that
    /// divergence opens a branch of another OR divergence, the outermost
    /// one: all of their leading transitions compete for the same step.
    pub or_divergence: Option<&'d str>,
}

/// Transition links of a whole diagram, in diagram order.
#[derive(Debug, Clone)]
pub struct Topology<'d> {
    transitions: Vec<TransitionLinks<'d>>,
    step_order: HashMap<&'d str, usize>,
}

impl<'d> Topology<'d> {
    pub fn new(diagram: &'d GrafcetDiagram) -> Self {
        let elements: HashMap<&str, &Element> = diagram
            .elements()
            .iter()
            .map(|element| (element.id(), element))
            .collect();

        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
        for connection in diagram.connections() {
            incoming
                .entry(connection.target_id())
                .or_default()
                .push(connection.source_id());
            outgoing
                .entry(connection.source_id())
                .or_default()
                .push(connection.target_id());
        }

        let walker = Walker {
            elements: &elements,
            incoming: &incoming,
            outgoing: &outgoing,
        };

        let transitions = diagram
            .transitions()
            .map(|transition| {
                let or_divergence = walker
                    .or_divergence_into(transition.id())
                    .map(|gate| walker.outermost_or_divergence(gate));

                TransitionLinks {
                    transition,
                    sources: walker.steps(transition.id(), Direction::Upstream),
                    targets: walker.steps(transition.id(), Direction::Downstream),
                    or_divergence,
                }
            })
            .collect();

        let step_order = diagram
            .steps()
            .enumerate()
            .map(|(index, step)| (step.id(), index))
            .collect();

        Self {
            transitions,
            step_order,
        }
    }

    pub fn transitions(&self) -> &[TransitionLinks<'d>] {
        &self.transitions
    }

    /// Position of a step in diagram order.
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.step_order.get(step_id).copied()
    }

    /// Number of steps in the diagram.
    pub fn step_count(&self) -> usize {
        self.step_order.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

struct Walker<'a, 'd> {
    elements: &'a HashMap<&'d str, &'d Element>,
    incoming: &'a HashMap<&'d str, Vec<&'d str>>,
    outgoing: &'a HashMap<&'d str, Vec<&'d str>>,
}

impl<'d> Walker<'_, 'd> {
    /// The OR divergence gate directly feeding `id`.
    fn or_divergence_into(&self, id: &str) -> Option<&'d str> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .copied()
            .find(|source| match self.elements.get(source) {
                Some(Element::Gate(gate)) => {
                    gate.kind() == GateKind::Or && gate.role() == GateRole::Divergence
                }
                _ => false,
            })
    }

    /// Follow OR divergences that open a branch of an enclosing OR
    /// divergence up to the outermost one.
    fn outermost_or_divergence(&self, mut gate: &'d str) -> &'d str {
        while let Some(parent) = self.or_divergence_into(gate) {
            gate = parent;
        }
        gate
    }

    /// The steps reached from `from`, looking through gates.
    fn steps(&self, from: &'d str, direction: Direction) -> Vec<&'d str> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        self.walk(from, direction, &mut found, &mut visited);
        found
    }

    fn walk(
        &self,
        from: &'d str,
        direction: Direction,
        found: &mut Vec<&'d str>,
        visited: &mut HashSet<&'d str>,
    ) {
        if !visited.insert(from) {
            return;
        }
        let neighbours = match direction {
            Direction::Upstream => self.incoming.get(from),
            Direction::Downstream => self.outgoing.get(from),
        };
        for &id in neighbours.into_iter().flatten() {
            match self.elements.get(id) {
                Some(Element::Step(_)) => {
                    if !found.contains(&id) {
                        found.push(id);
                    }
                }
                Some(Element::Gate(_)) => self.walk(id, direction, found, visited),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use grafcet_parser::parse;

    use crate::compiler::Compiler;

    use super::*;

    fn diagram(source: &str) -> GrafcetDiagram {
        Compiler::default()
            .compile(parse(source).expect("source should parse"))
            .expect("source should compile")
            .resolve_jumps()
            .expect("jumps should resolve")
            .into_diagram()
    }

    fn links<'a, 'd>(topology: &'a Topology<'d>, name: &str) -> &'a TransitionLinks<'d> {
        topology
            .transitions()
            .iter()
            .find(|links| links.transition.name() == name)
            .expect("transition should exist")
    }

    #[test]
    fn test_and_gates_are_looked_through() {
        let diagram = diagram(
            "Step 0 (Initial)\nTransition go\nDivergence AND\nBranch\nStep 1\nEndBranch\nBranch\nStep 2\nEndBranch\nEndDivergence\nTransition join\nJump 0\n",
        );
        let topology = Topology::new(&diagram);
        assert_eq!(links(&topology, "T0").targets, ["step-1", "step-2"]);
        assert_eq!(links(&topology, "T1").sources, ["step-1", "step-2"]);
        assert_eq!(links(&topology, "T1").targets, ["step-0"]);
        assert_eq!(topology.step_count(), 3);
    }

    #[test]
    fn test_nested_or_divergence_keys_on_outermost_gate() {
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
Step 5
Divergence OR
Branch
    Transition d
    Step 6
    Transition d_done
EndBranch
Branch
    Transition e
    Step 7
    Transition e_done
EndBranch
EndDivergence
Jump 0
"#,
        );
        let topology = Topology::new(&diagram);
        for name in ["T0", "T2", "T5"] {
            assert_eq!(links(&topology, name).or_divergence, Some("divergence-0"));
            assert_eq!(links(&topology, name).sources, ["step-0"]);
        }
        assert_eq!(links(&topology, "T4").or_divergence, None);
        assert_eq!(links(&topology, "T7").or_divergence, Some("divergence-2"));
    }
}
