//! Graph analysis of a finished chart.
//!
//! The step graph has one node per step and one edge per (source step,
//! target step) pair of every transition. The checks here never reject a
//! chart; they produce warnings:
//!
//! - `E210` a step no initial step can reach.
//! - `E211` a step no transition leaves.
//! - `E212` no path leads back to an initial step.

use std::collections::HashMap;

use log::{debug, trace};
use petgraph::{
    algo::has_path_connecting,
    graph::{DiGraph, NodeIndex},
    visit::{Dfs, Walker},
};

use grafcet_core::diagram::GrafcetDiagram;
use grafcet_parser::{
    Span,
    error::{Diagnostic, ErrorCode},
};

use crate::topology::Topology;

/// Steps connected by the transitions between them.
struct StepGraph<'d> {
    graph: DiGraph<&'d str, &'d str>,
    nodes: HashMap<&'d str, NodeIndex>,
}

impl<'d> StepGraph<'d> {
    fn new(diagram: &'d GrafcetDiagram, topology: &Topology<'d>) -> Self {
        let mut graph = DiGraph::new();
        let nodes: HashMap<&str, NodeIndex> = diagram
            .steps()
            .map(|step| (step.id(), graph.add_node(step.id())))
            .collect();

        for links in topology.transitions() {
            for source in &links.sources {
                for target in &links.targets {
                    if let (Some(&from), Some(&to)) = (nodes.get(source), nodes.get(target)) {
                        graph.add_edge(from, to, links.transition.id());
                    }
                }
            }
        }

        Self { graph, nodes }
    }

    fn node(&self, step_id: &str) -> Option<NodeIndex> {
        self.nodes.get(step_id).copied()
    }
}

/// Analyse a diagram, labelling warnings with the declaring spans.
pub(crate) fn analyze(diagram: &GrafcetDiagram, spans: &HashMap<String, Span>) -> Vec<Diagnostic> {
    let topology = Topology::new(diagram);
    let steps = StepGraph::new(diagram, &topology);
    let graph = &steps.graph;
    let initial: Vec<NodeIndex> = diagram
        .initial_steps()
        .filter_map(|step| steps.node(step.id()))
        .collect();

    let labelled = |diagnostic: Diagnostic, id: &str, message: &str| match spans.get(id) {
        Some(span) => diagnostic.with_label(*span, message),
        None => diagnostic,
    };

    let mut reachable = vec![false; graph.node_count()];
    for &start in &initial {
        for node in Dfs::new(graph, start).iter(graph) {
            reachable[node.index()] = true;
        }
    }

    let mut warnings = Vec::new();

    for step in diagram.steps() {
        let Some(node) = steps.node(step.id()) else {
            continue;
        };

        if !initial.is_empty() && !reachable[node.index()] {
            trace!(step = step.id(); "Unreachable step");
            warnings.push(labelled(
                Diagnostic::warning(format!(
                    "step {} cannot be reached from an initial step",
                    step.number()
                ))
                .with_code(ErrorCode::E210)
                .with_element(step.id()),
                step.id(),
                "unreachable",
            ));
        }

        // A transition that leads nowhere still leaves the step.
        let leaves = topology
            .transitions()
            .iter()
            .any(|links| links.sources.contains(&step.id()));
        if !leaves {
            trace!(step = step.id(); "Dead-end step");
            warnings.push(labelled(
                Diagnostic::warning(format!("no transition leaves step {}", step.number()))
                    .with_code(ErrorCode::E211)
                    .with_element(step.id())
                    .with_help("add a transition after the step or a jump back"),
                step.id(),
                "dead end",
            ));
        }
    }

    let returns = initial.iter().any(|&start| {
        graph
            .neighbors(start)
            .any(|next| has_path_connecting(graph, next, start, None))
    });
    if graph.node_count() > 1 && !returns {
        let first = diagram.initial_steps().next();
        let diagnostic = Diagnostic::warning("no path returns to an initial step")
            .with_code(ErrorCode::E212)
            .with_help("close the cycle with `Jump <n>` to the initial step");
        warnings.push(match first {
            Some(step) => labelled(
                diagnostic.with_element(step.id()),
                step.id(),
                "initial step",
            ),
            None => diagnostic,
        });
    }

    debug!(steps = graph.node_count(), warnings = warnings.len(); "Chart analysed");
    warnings
}

/// Analyse a diagram loaded from storage.
///
/// Warnings carry element ids but no source spans.
pub fn analyze_diagram(diagram: &GrafcetDiagram) -> Vec<Diagnostic> {
    analyze(diagram, &HashMap::new())
}

#[cfg(test)]
mod tests {
    use grafcet_parser::parse;

    use crate::compiler::Compiler;

    use super::*;

    fn warnings(source: &str) -> Vec<ErrorCode> {
        let input = parse(source).expect("source should parse");
        let compiled = Compiler::default()
            .compile(input)
            .expect("source should compile")
            .resolve_jumps()
            .expect("jumps should resolve");
        analyze_diagram(compiled.diagram())
            .iter()
            .filter_map(Diagnostic::code)
            .collect()
    }

    #[test]
    fn test_closed_loop_is_clean() {
        let codes = warnings("Step 0 (Initial)\nTransition a\nStep 1\nTransition b\nJump 0\n");
        assert!(codes.is_empty(), "unexpected warnings: {codes:?}");
    }

    #[test]
    fn test_dead_end_and_missing_return() {
        let codes = warnings("Step 0 (Initial)\nTransition a\nStep 1\n");
        assert_eq!(codes, vec![ErrorCode::E211, ErrorCode::E212]);
    }

    #[test]
    fn test_chain_ending_in_transition_is_not_a_dead_end() {
        let codes = warnings("Step 0 (Initial)\nTransition a\nStep 1\nTransition b\n");
        assert_eq!(codes, vec![ErrorCode::E212]);
    }

    #[test]
    fn test_unreachable_step() {
        let codes = warnings(
            "Step 0 (Initial)\nTransition a\nJump 0\nStep 4\nTransition b\nJump 0\n",
        );
        assert_eq!(codes, vec![ErrorCode::E210]);
    }

    #[test]
    fn test_parallel_branches_reach_convergence() {
        let codes = warnings(
            r#"
Step 0 (Initial)
Transition go
Divergence AND
Branch
    Step 1
EndBranch
Branch
    Step 2
EndBranch
EndDivergence
Transition join
Jump 0
"#,
        );
        assert!(codes.is_empty(), "unexpected warnings: {codes:?}");
    }

    #[test]
    fn test_single_step_has_no_return_warning() {
        let codes = warnings("Step 0 (Initial)\n");
        assert_eq!(codes, vec![ErrorCode::E211]);
    }
}
