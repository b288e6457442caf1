//! Structural validation of a parsed chart.
//!
//! The validator checks the statement tree before layout. Statements of a
//! list must alternate between step-like and transition-like members:
//!
//! | member              | entry      | exit       |
//! |---------------------|------------|------------|
//! | step                | step       | step       |
//! | transition          | transition | transition |
//! | AND divergence      | step       | step       |
//! | OR divergence       | transition | transition |
//! | jump                | step       | -          |
//!
//! Branch boundaries behave like the element on the other side of the gate:
//! an AND branch starts after a transition and ends before one, an OR branch
//! starts after a step and ends before one. Two neighbours where the exit of
//! the first has the same shape as the entry of the second break the chart.
//!
//! Element ids in diagnostics follow the numbering of the layout compiler,
//! which visits statements in the same depth-first source order.

use std::collections::HashSet;

use log::debug;

use grafcet_core::element::{GateKind, StepType};
use grafcet_parser::{
    DivergenceBlock, ParserInput, Span, Spanned, Statement,
    error::{Diagnostic, ErrorCode},
    guard::parse_guard,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Step,
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Step,
    Transition,
    Block(GateKind),
    Jump,
    BranchStart(GateKind),
    BranchEnd(GateKind),
}

/// One member of a statement list, as seen by the alternation check.
#[derive(Debug, Clone)]
struct Member {
    kind: MemberKind,
    span: Span,
    element: Option<String>,
    /// Set for a divergence without `EndDivergence`; nothing is checked
    /// after it.
    unclosed: bool,
}

impl Member {
    fn entry(&self) -> Option<Shape> {
        match self.kind {
            MemberKind::Step | MemberKind::Jump | MemberKind::Block(GateKind::And) => {
                Some(Shape::Step)
            }
            MemberKind::Transition | MemberKind::Block(GateKind::Or) => Some(Shape::Transition),
            MemberKind::BranchEnd(GateKind::And) => Some(Shape::Transition),
            MemberKind::BranchEnd(GateKind::Or) => Some(Shape::Step),
            MemberKind::BranchStart(_) => None,
        }
    }

    fn exit(&self) -> Option<Shape> {
        if self.unclosed {
            return None;
        }
        match self.kind {
            MemberKind::Step | MemberKind::Block(GateKind::And) => Some(Shape::Step),
            MemberKind::Transition | MemberKind::Block(GateKind::Or) => Some(Shape::Transition),
            MemberKind::BranchStart(GateKind::And) => Some(Shape::Transition),
            MemberKind::BranchStart(GateKind::Or) => Some(Shape::Step),
            MemberKind::Jump | MemberKind::BranchEnd(_) => None,
        }
    }

    fn new(kind: MemberKind, span: Span, element: Option<String>) -> Self {
        Self {
            kind,
            span,
            element,
            unclosed: false,
        }
    }
}

fn divergence_code(kind: GateKind) -> ErrorCode {
    match kind {
        GateKind::And => ErrorCode::E200,
        GateKind::Or => ErrorCode::E201,
    }
}

fn shape_name(shape: Shape) -> &'static str {
    match shape {
        Shape::Step => "step",
        Shape::Transition => "transition",
    }
}

/// Id of the element a jump following `prev` leaves from.
fn jump_source(prev: &Member) -> Option<String> {
    let element = prev.element.as_deref()?;
    match prev.kind {
        // The chain continues from the convergence closing the block.
        MemberKind::Block(_) => Some(element.replacen("divergence", "convergence", 1)),
        _ => Some(element.to_string()),
    }
}

fn opposite(shape: Shape) -> Shape {
    match shape {
        Shape::Step => Shape::Transition,
        Shape::Transition => Shape::Step,
    }
}

/// Validate a parsed chart.
///
/// Returns every structural diagnostic; those with error severity are fatal
/// to compilation.
pub fn validate(input: &ParserInput) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.sequence(&input.statements, None, None);

    validator.check_jump_targets();

    if !validator.has_initial {
        let span = input
            .statements
            .first()
            .map(Spanned::span)
            .unwrap_or_default();
        let message = if input.statements.is_empty() {
            "chart is empty"
        } else {
            "chart has no initial step"
        };
        validator.emit(
            Diagnostic::error(message)
                .with_code(ErrorCode::E207)
                .with_label(span, ErrorCode::E207.description())
                .with_help("mark the first step with `(Initial)`, e.g. `Step 0 (Initial)`"),
        );
    }

    debug!(
        diagnostics = validator.diagnostics.len(),
        transitions = validator.transitions,
        divergences = validator.blocks;
        "Chart validated"
    );
    validator.diagnostics
}

/// A `Jump` statement with the element it leaves from.
#[derive(Debug)]
struct JumpRef {
    target: u32,
    span: Span,
    source: Option<String>,
}

#[derive(Debug, Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
    transitions: usize,
    blocks: usize,
    has_initial: bool,
    step_numbers: HashSet<u32>,
    jumps: Vec<JumpRef>,
}

impl Validator {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Report every jump to a step number no statement declares.
    fn check_jump_targets(&mut self) {
        let dangling: Vec<Diagnostic> = self
            .jumps
            .iter()
            .filter(|jump| !self.step_numbers.contains(&jump.target))
            .map(|jump| {
                Diagnostic::error(format!("jump to undefined step {}", jump.target))
                    .with_code(ErrorCode::E205)
                    .with_label(jump.span, "no step with this number")
                    .with_element_opt(jump.source.clone())
                    .with_help("declare the step or jump to an existing step number")
            })
            .collect();
        self.diagnostics.extend(dangling);
    }

    /// Check one statement list. `start` and `end` are the branch boundaries,
    /// `None` at the top level.
    fn sequence(
        &mut self,
        statements: &[Spanned<Statement>],
        start: Option<Member>,
        end: Option<Member>,
    ) {
        let mut prev = start;

        for statement in statements {
            let member = self.member(statement);
            if let Statement::Jump(jump) = statement.inner() {
                self.jumps.push(JumpRef {
                    target: *jump.target.inner(),
                    span: jump.target.span(),
                    source: prev.as_ref().and_then(jump_source),
                });
            }
            self.check_pair(prev.as_ref(), &member);
            prev = match member.kind {
                MemberKind::Jump => None,
                _ => Some(member),
            };
        }

        match end {
            Some(end) => match &prev {
                // A branch left through a jump never reaches the convergence.
                None if end.kind == MemberKind::BranchEnd(GateKind::Or) => {}
                None => self.emit(
                    Diagnostic::error("AND branch ends with a jump")
                        .with_code(ErrorCode::E200)
                        .with_label(end.span, "branch must end with a step")
                        .with_element_opt(end.element.clone())
                        .with_help("parallel branches join again at the AND convergence"),
                ),
                Some(_) => self.check_pair(prev.as_ref(), &end),
            },
            None => {
                let last = prev
                    .as_ref()
                    .filter(|m| m.kind == MemberKind::Block(GateKind::And) && !m.unclosed);
                if let Some(last) = last {
                    self.emit(
                        Diagnostic::error("AND divergence must be followed by a transition")
                            .with_code(ErrorCode::E200)
                            .with_label(last.span, "nothing follows the AND convergence")
                            .with_element_opt(last.element.clone())
                            .with_help("add a `Transition` after `EndDivergence`"),
                    );
                }
            }
        }
    }

    /// Build the alternation member of a statement, checking its contents.
    fn member(&mut self, statement: &Spanned<Statement>) -> Member {
        let span = statement.span();
        match statement.inner() {
            Statement::Step(step) => {
                if step.step_type == StepType::Initial {
                    self.has_initial = true;
                }
                self.step_numbers.insert(step.number);
                Member::new(MemberKind::Step, span, Some(format!("step-{}", step.number)))
            }
            Statement::Transition(transition) => {
                let element = format!("transition-{}", self.transitions);
                self.transitions += 1;

                let condition = transition.condition.inner().trim();
                let parsed = if condition.is_empty() {
                    Ok(())
                } else {
                    parse_guard(condition).map(|_| ())
                };
                if let Err(err) = parsed {
                    let reason = err
                        .diagnostics()
                        .first()
                        .map(|d| d.message().to_string())
                        .unwrap_or_default();
                    self.emit(
                        Diagnostic::warning(format!("guard `{condition}` does not parse: {reason}"))
                            .with_code(ErrorCode::E209)
                            .with_label(transition.condition.span(), "not a boolean expression")
                            .with_element(element.clone())
                            .with_help(
                                "the transition only fires when its label is set directly in the inputs",
                            ),
                    );
                }

                Member::new(MemberKind::Transition, span, Some(element))
            }
            Statement::Divergence(block) => {
                let element = format!("divergence-{}", self.blocks);
                self.blocks += 1;
                self.block(block, span, &element);
                Member {
                    unclosed: block.end.is_none(),
                    ..Member::new(MemberKind::Block(block.kind), span, Some(element))
                }
            }
            Statement::Jump(_) => Member::new(MemberKind::Jump, span, None),
        }
    }

    fn block(&mut self, block: &DivergenceBlock, span: Span, element: &str) {
        match block.end {
            None => self.emit(
                Diagnostic::error(format!("{} divergence is never closed", block.kind))
                    .with_code(ErrorCode::E202)
                    .with_label(span, "opened here")
                    .with_element(element)
                    .with_help("close it with `EndDivergence`"),
            ),
            Some(end) => {
                if let Some(kind) = end.kind.filter(|kind| *kind != block.kind) {
                    self.emit(
                        Diagnostic::error(format!(
                            "`EndDivergence {kind}` closes an {} divergence",
                            block.kind
                        ))
                        .with_code(ErrorCode::E202)
                        .with_label(end.span, "mismatched kind")
                        .with_secondary_label(span, "divergence opened here")
                        .with_element(element),
                    );
                }
            }
        }

        match block.branches.len() {
            0 => self.emit(
                Diagnostic::error(format!("{} divergence has no branches", block.kind))
                    .with_code(ErrorCode::E204)
                    .with_label(span, ErrorCode::E204.description())
                    .with_element(element)
                    .with_help("add at least two `Branch` ... `EndBranch` blocks"),
            ),
            1 => self.emit(
                Diagnostic::warning(format!("{} divergence has a single branch", block.kind))
                    .with_code(ErrorCode::E208)
                    .with_label(span, ErrorCode::E208.description())
                    .with_element(element),
            ),
            _ => {}
        }

        let element = Some(element.to_string());
        for (index, branch) in block.branches.iter().enumerate() {
            if branch.statements.is_empty() {
                self.emit(
                    Diagnostic::error(format!("branch {} is empty", index + 1))
                        .with_code(ErrorCode::E204)
                        .with_label(branch.span, ErrorCode::E204.description())
                        .with_element_opt(element.clone()),
                );
                continue;
            }
            let start = Member::new(
                MemberKind::BranchStart(block.kind),
                branch.span,
                element.clone(),
            );
            let end_span = branch
                .statements
                .last()
                .map(Spanned::span)
                .unwrap_or(branch.span);
            let end = Member::new(MemberKind::BranchEnd(block.kind), end_span, element.clone());
            self.sequence(&branch.statements, Some(start), Some(end));
        }
    }

    /// Check that `next` may directly follow `prev`.
    fn check_pair(&mut self, prev: Option<&Member>, next: &Member) {
        let Some(prev) = prev else {
            self.check_chain_start(next);
            return;
        };
        let (Some(exit), Some(entry)) = (prev.exit(), next.entry()) else {
            return;
        };
        if exit != entry {
            return;
        }

        let diagnostic = match (prev.kind, next.kind) {
            (_, MemberKind::Block(kind)) => Diagnostic::error(format!(
                "{kind} divergence must be preceded by a {}",
                shape_name(opposite(entry))
            ))
            .with_code(divergence_code(kind))
            .with_label(next.span, format!("preceded by a {}", shape_name(exit)))
            .with_element_opt(next.element.clone()),
            (MemberKind::Block(kind), _) => Diagnostic::error(format!(
                "{kind} divergence must be followed by a {}",
                shape_name(opposite(exit))
            ))
            .with_code(divergence_code(kind))
            .with_label(next.span, format!("found a {}", shape_name(entry)))
            .with_secondary_label(prev.span, "divergence")
            .with_element_opt(prev.element.clone()),
            (MemberKind::BranchStart(kind), _) => Diagnostic::error(format!(
                "{kind} branch must start with a {}",
                shape_name(opposite(exit))
            ))
            .with_code(divergence_code(kind))
            .with_label(next.span, format!("branch starts with a {}", shape_name(entry)))
            .with_element_opt(prev.element.clone()),
            (_, MemberKind::BranchEnd(kind)) => Diagnostic::error(format!(
                "{kind} branch must end with a {}",
                shape_name(opposite(entry))
            ))
            .with_code(divergence_code(kind))
            .with_label(next.span, format!("branch ends with a {}", shape_name(exit)))
            .with_element_opt(next.element.clone()),
            (_, MemberKind::Jump) => Diagnostic::error("jump must follow a transition")
                .with_code(ErrorCode::E203)
                .with_label(next.span, "preceded by a step")
                .with_secondary_label(prev.span, "previous step")
                .with_help("add a `Transition` before the `Jump`"),
            _ => Diagnostic::error(format!(
                "{} directly follows a {}",
                shape_name(entry),
                shape_name(exit)
            ))
            .with_code(ErrorCode::E203)
            .with_label(next.span, format!("second {} in a row", shape_name(entry)))
            .with_secondary_label(prev.span, format!("previous {}", shape_name(exit)))
            .with_element_opt(next.element.clone())
            .with_help("steps and transitions must alternate"),
        };
        self.emit(diagnostic);
    }

    /// Check a member with nothing before it in its chain.
    fn check_chain_start(&mut self, next: &Member) {
        let diagnostic = match next.kind {
            MemberKind::Transition => Diagnostic::error("transition has no preceding step")
                .with_code(ErrorCode::E203)
                .with_label(next.span, "chain starts with a transition")
                .with_element_opt(next.element.clone())
                .with_help("charts start with a step"),
            MemberKind::Block(kind) => Diagnostic::error(format!(
                "{kind} divergence must be preceded by a {}",
                match kind {
                    GateKind::And => "transition",
                    GateKind::Or => "step",
                }
            ))
            .with_code(divergence_code(kind))
            .with_label(next.span, "nothing precedes the divergence")
            .with_element_opt(next.element.clone()),
            MemberKind::Jump => Diagnostic::error("jump has no preceding element")
                .with_code(ErrorCode::E206)
                .with_label(next.span, ErrorCode::E206.description())
                .with_help("a jump continues the chain after a transition"),
            MemberKind::Step | MemberKind::BranchStart(_) | MemberKind::BranchEnd(_) => return,
        };
        self.emit(diagnostic);
    }
}

trait DiagnosticExt {
    fn with_element_opt(self, element: Option<String>) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_element_opt(self, element: Option<String>) -> Self {
        match element {
            Some(element) => self.with_element(element),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use grafcet_parser::{error::Severity, parse};

    use super::*;

    fn diagnostics(source: &str) -> Vec<Diagnostic> {
        validate(&parse(source).expect("source should parse"))
    }

    fn types(source: &str) -> Vec<&'static str> {
        diagnostics(source)
            .iter()
            .map(Diagnostic::diagnostic_type)
            .collect()
    }

    #[test]
    fn test_valid_linear_chart() {
        let source = "Step 0 (Initial)\nTransition Start\nStep 1\nTransition Done\nJump 0\n";
        assert!(diagnostics(source).is_empty());
    }

    #[test]
    fn test_valid_divergences() {
        let source = r#"
Step 0 (Initial)
Transition go
Divergence AND
Branch
    Step 1
    Transition a
    Step 2
EndBranch
Branch
    Step 3
EndBranch
EndDivergence
Transition joined
Step 4
Divergence OR
Branch
    Transition left
    Step 5
    Transition left_done
EndBranch
Branch
    Transition right
    Jump 0
EndBranch
EndDivergence
Step 6
Transition done
Jump 0
"#;
        assert!(diagnostics(source).is_empty());
    }

    #[test]
    fn test_and_branch_ending_in_transition() {
        let source = r#"
Step 0 (Initial)
Transition go
Divergence AND
Branch
    Step 1
    Transition a_done
EndBranch
Branch
    Step 2
EndBranch
EndDivergence
Transition joined
Jump 0
"#;
        let diags = diagnostics(source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].diagnostic_type(), "and-divergence");
        assert_eq!(diags[0].message(), "AND branch must end with a step");
        assert_eq!(diags[0].element(), Some("divergence-0"));
        assert_eq!(diags[0].severity(), Severity::Error);
    }

    #[test]
    fn test_and_divergence_neighbours() {
        let source = "Step 0 (Initial)\nDivergence AND\nBranch\nStep 1\nEndBranch\nBranch\nStep 2\nEndBranch\nEndDivergence\n";
        assert_eq!(types(source), vec!["and-divergence", "and-divergence"]);
    }

    #[test]
    fn test_or_branch_rules() {
        let source = r#"
Step 0 (Initial)
Divergence OR
Branch
    Step 1
    Transition a
EndBranch
Branch
    Transition b
    Step 2
EndBranch
EndDivergence
Step 3
"#;
        let diags = diagnostics(source);
        let messages: Vec<_> = diags.iter().map(Diagnostic::message).collect();
        assert_eq!(
            messages,
            vec!["OR branch must start with a transition", "OR branch must end with a transition"]
        );
        assert!(diags.iter().all(|d| d.diagnostic_type() == "or-divergence"));
    }

    #[test]
    fn test_sequence_errors() {
        assert_eq!(
            types("Step 0 (Initial)\nStep 1\nTransition\nTransition\n"),
            vec!["sequence", "sequence"]
        );
        assert_eq!(types("Step 0 (Initial)\nJump 0\n"), vec!["sequence"]);
        assert_eq!(
            types("Transition\nStep 0 (Initial)\n"),
            vec!["sequence"]
        );
    }

    #[test]
    fn test_jump_without_source() {
        assert_eq!(types("Jump 0\nStep 0 (Initial)\n"), vec!["jump-source"]);
    }

    #[test]
    fn test_unmatched_and_empty_divergences() {
        assert_eq!(
            types("Step 0 (Initial)\nTransition\nDivergence AND\nBranch\nStep 1\n"),
            vec!["unmatched-divergence", "single-branch"]
        );
        assert_eq!(
            types("Step 0 (Initial)\nTransition\nDivergence AND\nEndDivergence OR\nTransition\n"),
            vec!["unmatched-divergence", "empty-branch"]
        );
        assert_eq!(
            types(
                "Step 0 (Initial)\nTransition\nDivergence AND\nBranch\nEndBranch\nBranch\nStep 1\nEndBranch\nEndDivergence\nTransition\n"
            ),
            vec!["empty-branch"]
        );
    }

    #[test]
    fn test_dangling_jump_reported_with_other_errors() {
        let source = "Step 0 (Initial)\nStep 1\nTransition t\nJump 9\n";
        assert_eq!(types(source), vec!["sequence", "dangling-reference"]);

        let diags = diagnostics(source);
        assert_eq!(diags[1].code(), Some(ErrorCode::E205));
        assert_eq!(diags[1].message(), "jump to undefined step 9");
        assert_eq!(diags[1].element(), Some("transition-0"));
        assert_eq!(diags[1].severity(), Severity::Error);
    }

    #[test]
    fn test_jump_targets_nested_and_later_steps() {
        let source = r#"
Step 0 (Initial)
Transition go
Jump 5
Step 5
Divergence OR
Branch
    Transition a
    Step 6
    Transition a_done
    Jump 6
EndBranch
Branch
    Transition b
    Step 7
    Transition b_done
EndBranch
EndDivergence
Step 8
Transition back
Jump 4
"#;
        let diags = diagnostics(source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message(), "jump to undefined step 4");
        assert_eq!(diags[0].element(), Some("transition-5"));
    }

    #[test]
    fn test_missing_initial_step() {
        assert_eq!(types("Step 0\nTransition\nJump 0\n"), vec!["initial-step"]);
        assert_eq!(types(""), vec!["initial-step"]);
    }

    #[test]
    fn test_unparsable_guard_is_a_warning() {
        let diags = diagnostics("Step 0 (Initial)\nTransition Start button pressed\nStep 1\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].diagnostic_type(), "guard-syntax");
        assert_eq!(diags[0].severity(), Severity::Warning);
        assert_eq!(diags[0].element(), Some("transition-0"));
    }

    #[test]
    fn test_transition_ids_follow_source_order() {
        let source = r#"
Step 0 (Initial)
Divergence OR
Branch
    Transition a
    Step 1
    Transition a_done
EndBranch
Branch
    Transition b ==
    Step 2
    Transition b_done
EndBranch
EndDivergence
Step 3
"#;
        let diags = diagnostics(source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].element(), Some("transition-2"));
    }
}
