//! Pre-layout representation of a parsed chart.
//!
//! Leaf values carry their source span through [`Spanned`]; composite
//! statements are wrapped as a whole so diagnostics can point at the line
//! that declared them.

use grafcet_core::element::{ActionQualifier, GateKind, StepType};

use crate::span::{Span, Spanned};

/// The parsed chart, handed over to the layout compiler by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserInput {
    /// Title from the `SFC "<title>"` header.
    pub title: Option<Spanned<String>>,
    pub statements: Vec<Spanned<Statement>>,
}

/// One statement of a statement list.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Step(StepDecl),
    Transition(TransitionDecl),
    Divergence(DivergenceBlock),
    Jump(JumpDecl),
}

impl Statement {
    /// Short human readable name of the statement kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Step(_) => "step",
            Statement::Transition(_) => "transition",
            Statement::Divergence(_) => "divergence",
            Statement::Jump(_) => "jump",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepDecl {
    pub number: u32,
    pub label: Option<String>,
    pub step_type: StepType,
    pub actions: Vec<Spanned<ActionDecl>>,
    pub linked_file: Option<Spanned<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDecl {
    pub variable: String,
    pub qualifier: ActionQualifier,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDecl {
    /// Explicit `T<k>` name, if given.
    pub name: Option<String>,
    /// Guard text: the string literal value, or the raw source of the rest
    /// of the line.
    pub condition: Spanned<String>,
}

/// A `Divergence ... EndDivergence` block.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceBlock {
    pub kind: GateKind,
    pub branches: Vec<Branch>,
    /// The closing `EndDivergence`, `None` when the input ended first.
    pub end: Option<DivergenceEnd>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub statements: Vec<Spanned<Statement>>,
    /// Span of the `Branch` keyword line.
    pub span: Span,
    /// `false` when the input ended before `EndBranch`.
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceEnd {
    /// Kind repeated after `EndDivergence`, if any.
    pub kind: Option<GateKind>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JumpDecl {
    pub target: Spanned<u32>,
}

impl ParserInput {
    /// Iterates over every step declaration, nested ones included, in source
    /// order.
    pub fn steps(&self) -> Vec<&Spanned<Statement>> {
        fn walk<'a>(statements: &'a [Spanned<Statement>], out: &mut Vec<&'a Spanned<Statement>>) {
            for statement in statements {
                match statement.inner() {
                    Statement::Step(_) => out.push(statement),
                    Statement::Divergence(block) => {
                        for branch in &block.branches {
                            walk(&branch.statements, out);
                        }
                    }
                    Statement::Transition(_) | Statement::Jump(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.statements, &mut out);
        out
    }
}
