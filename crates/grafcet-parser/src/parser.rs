//! Line parser for chart source tokens.
//!
//! Every non-blank line holds exactly one statement. Each line's tokens are
//! parsed on their own with winnow over a [`TokenSlice`], then a
//! [`ChartBuilder`] folds the statements into the nested [`ParserInput`]
//! tree: it assigns step numbers, attaches actions to their step and keeps a
//! stack of open divergences.
//!
//! Errors are collected per line, so one malformed line does not hide the
//! problems of the following ones.

use std::collections::{HashMap, HashSet};

use log::trace;
use winnow::{
    Parser as _,
    combinator::{alt, cut_err, opt, preceded, terminated},
    error::{ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use grafcet_core::element::{ActionQualifier, GateKind, StepType};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    parser_types::{
        ActionDecl, Branch, DivergenceBlock, DivergenceEnd, JumpDecl, ParserInput, Statement,
        StepDecl, TransitionDecl,
    },
    span::{Span, Spanned},
    tokens::{PositionedToken, Token},
};

/// Context attached to line grammar errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Context {
    /// What the parser expected at the failing position.
    Expected(&'static str),
}

type Input<'a> = TokenSlice<'a, PositionedToken<'a>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

/// How a step names itself on its declaration line.
#[derive(Debug, Clone, PartialEq)]
enum Designator {
    Number(String),
    Name(String),
}

/// One parsed line, before nesting and numbering are applied.
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Title(Spanned<String>),
    Step {
        designator: Spanned<Designator>,
        kind: Option<Spanned<String>>,
        label: Option<Spanned<String>>,
    },
    Action {
        variable: Spanned<String>,
        qualifier: Option<Spanned<String>>,
        duration: Option<Spanned<String>>,
    },
    LinkedFile(Spanned<String>),
    Divergence(GateKind),
    Branch,
    EndBranch,
    EndDivergence(Option<GateKind>),
    Jump(Spanned<String>),
}

fn token<'a>(
    input: &mut Input<'a>,
    label: &'static str,
    matches: impl Fn(&Token<'_>) -> bool,
) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| matches(&token.token).then_some(token.span))
        .context(Context::Expected(label))
        .parse_next(input)
}

fn left_paren(input: &mut Input<'_>) -> IResult<Span> {
    token(input, "`(`", |t| matches!(t, Token::LeftParen))
}

fn right_paren(input: &mut Input<'_>) -> IResult<Span> {
    token(input, "`)`", |t| matches!(t, Token::RightParen))
}

fn comma(input: &mut Input<'_>) -> IResult<Span> {
    token(input, "`,`", |t| matches!(t, Token::Comma))
}

fn identifier(input: &mut Input<'_>) -> IResult<Spanned<String>> {
    any.verify_map(|token: &PositionedToken<'_>| match &token.token {
        Token::Identifier(name) => Some(Spanned::new(name.to_string(), token.span)),
        _ => None,
    })
    .context(Context::Expected("identifier"))
    .parse_next(input)
}

fn string_literal(input: &mut Input<'_>) -> IResult<Spanned<String>> {
    any.verify_map(|token: &PositionedToken<'_>| match &token.token {
        Token::StringLiteral(s) => Some(Spanned::new(s.clone(), token.span)),
        _ => None,
    })
    .context(Context::Expected("string literal"))
    .parse_next(input)
}

fn number(input: &mut Input<'_>) -> IResult<Spanned<String>> {
    any.verify_map(|token: &PositionedToken<'_>| match &token.token {
        Token::Number(n) => Some(Spanned::new(n.to_string(), token.span)),
        _ => None,
    })
    .context(Context::Expected("number"))
    .parse_next(input)
}

fn gate_kind(input: &mut Input<'_>) -> IResult<GateKind> {
    any.verify_map(|token: &PositionedToken<'_>| match &token.token {
        Token::And => Some(GateKind::And),
        Token::Or => Some(GateKind::Or),
        _ => None,
    })
    .context(Context::Expected("`AND` or `OR`"))
    .parse_next(input)
}

/// `SFC "<title>"`
fn title_statement(input: &mut Input<'_>) -> IResult<Line> {
    string_literal.map(Line::Title).parse_next(input)
}

/// `Step <n|label> [(<kind>)] ["<label>"]`
fn step_statement(input: &mut Input<'_>) -> IResult<Line> {
    let designator = alt((
        number.map(|n| n.map(Designator::Number)),
        identifier.map(|id| id.map(Designator::Name)),
        string_literal.map(|s| s.map(Designator::Name)),
    ))
    .context(Context::Expected("step number or label"))
    .parse_next(input)?;

    let kind = opt(preceded(
        left_paren,
        cut_err(terminated(
            identifier.context(Context::Expected("step kind")),
            right_paren,
        )),
    ))
    .parse_next(input)?;

    let label = opt(string_literal).parse_next(input)?;

    Ok(Line::Step {
        designator,
        kind,
        label,
    })
}

/// `(<qualifier>[, <duration>])`
fn parenthesized_qualifier(
    input: &mut Input<'_>,
) -> IResult<(Spanned<String>, Option<Spanned<String>>)> {
    preceded(
        left_paren,
        cut_err((
            identifier.context(Context::Expected("action qualifier")),
            opt(preceded(
                comma,
                cut_err(alt((string_literal, number)).context(Context::Expected("duration"))),
            )),
            right_paren,
        )),
    )
    .map(|(qualifier, duration, _)| (qualifier, duration))
    .parse_next(input)
}

/// `Action <name|"name"> [<qualifier>|(<qualifier>[, "<duration>"])]`
fn action_statement(input: &mut Input<'_>) -> IResult<Line> {
    let variable = alt((identifier, string_literal))
        .context(Context::Expected("action name"))
        .parse_next(input)?;

    let qualifier = opt(alt((
        parenthesized_qualifier,
        identifier.map(|q| (q, None)),
    )))
    .parse_next(input)?;

    let (qualifier, duration) = match qualifier {
        Some((qualifier, duration)) => (Some(qualifier), duration),
        None => (None, None),
    };

    Ok(Line::Action {
        variable,
        qualifier,
        duration,
    })
}

/// `LinkedFile "<name>"`
fn linked_file_statement(input: &mut Input<'_>) -> IResult<Line> {
    alt((string_literal, identifier))
        .context(Context::Expected("linked file name"))
        .map(Line::LinkedFile)
        .parse_next(input)
}

/// `Jump <n>`
fn jump_statement(input: &mut Input<'_>) -> IResult<Line> {
    number
        .context(Context::Expected("target step number"))
        .map(Line::Jump)
        .parse_next(input)
}

/// Parse the tokens following a statement keyword (transitions excluded).
fn statement_body(keyword: &Token<'_>, input: &mut Input<'_>) -> IResult<Line> {
    match keyword {
        Token::Sfc => title_statement(input),
        Token::Step => step_statement(input),
        Token::Action => action_statement(input),
        Token::LinkedFile => linked_file_statement(input),
        Token::Divergence => gate_kind.map(Line::Divergence).parse_next(input),
        Token::Branch => Ok(Line::Branch),
        Token::EndBranch => Ok(Line::EndBranch),
        Token::EndDivergence => opt(gate_kind).map(Line::EndDivergence).parse_next(input),
        Token::Jump => jump_statement(input),
        _ => Err(ErrMode::Backtrack(ContextError::new())),
    }
}

fn is_statement_keyword(token: &Token<'_>) -> bool {
    matches!(
        token,
        Token::Sfc
            | Token::Step
            | Token::Action
            | Token::LinkedFile
            | Token::Transition
            | Token::Divergence
            | Token::Branch
            | Token::EndBranch
            | Token::EndDivergence
            | Token::Jump
    )
}

/// Returns `true` for identifiers of the form `T<digits>`.
fn is_transition_name(name: &str) -> bool {
    name.strip_prefix('T')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// Returns the trailing decimal digits of an identifier, e.g. `3` for `S3`.
/// The number a `Step` line states itself, directly or as a name suffix.
fn explicit_step_number(line: &[PositionedToken<'_>]) -> Option<u32> {
    let [first, designator, ..] = line else {
        return None;
    };
    if !matches!(first.token, Token::Step) {
        return None;
    }
    let text = match &designator.token {
        Token::Number(n) => *n,
        Token::Identifier(name) => numeric_suffix(name)?,
        Token::StringLiteral(name) => numeric_suffix(name)?,
        _ => return None,
    };
    text.parse().ok()
}

fn numeric_suffix(name: &str) -> Option<&str> {
    let start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    Some(&name[start..])
}

/// Convert a line grammar error into a diagnostic.
///
/// `consumed` is the number of line tokens before the failing position.
fn convert_error(
    error: ErrMode<ContextError<Context>>,
    line: &[PositionedToken<'_>],
    consumed: usize,
) -> Diagnostic {
    let expected = match &error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.context().find_map(|ctx| match ctx {
            Context::Expected(label) => Some(*label),
        }),
        ErrMode::Incomplete(_) => None,
    };

    let keyword = line.first().map(|t| t.token.to_string()).unwrap_or_default();

    match line.get(consumed) {
        Some(found) => {
            let label = match expected {
                Some(expected) => format!("expected {expected}"),
                None => "unexpected here".to_string(),
            };
            Diagnostic::error(format!("unexpected `{}` in `{keyword}` statement", found.token))
                .with_code(ErrorCode::E100)
                .with_label(found.span, label)
        }
        None => {
            let end = line.last().map(|t| t.span).unwrap_or_default();
            let mut diag = Diagnostic::error(format!("incomplete `{keyword}` statement"))
                .with_code(ErrorCode::E101)
                .with_label(Span::new(end.end()..end.end()), "statement ends here");
            if let Some(expected) = expected {
                diag = diag.with_help(format!("expected {expected}"));
            }
            diag
        }
    }
}

/// A divergence whose `EndDivergence` has not been seen yet.
#[derive(Debug)]
struct OpenDivergence {
    kind: GateKind,
    span: Span,
    branches: Vec<Branch>,
    current: Option<Branch>,
}

impl OpenDivergence {
    /// Close the divergence at end of input, keeping what was parsed.
    fn into_unclosed(mut self) -> Spanned<Statement> {
        if let Some(branch) = self.current.take() {
            self.branches.push(branch);
        }
        Spanned::new(
            Statement::Divergence(DivergenceBlock {
                kind: self.kind,
                branches: self.branches,
                end: None,
            }),
            self.span,
        )
    }
}

/// Folds parsed lines into the nested statement tree.
pub(crate) struct ChartBuilder<'src> {
    source: &'src str,
    diagnostics: DiagnosticCollector,
    title: Option<Spanned<String>>,
    root: Vec<Spanned<Statement>>,
    open: Vec<OpenDivergence>,
    step_numbers: HashMap<u32, Span>,
    highest_step: Option<u32>,
    /// Numbers written out by some `Step` line; never auto-assigned.
    reserved: HashSet<u32>,
}

impl<'src> ChartBuilder<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source,
            diagnostics: DiagnosticCollector::new(),
            title: None,
            root: Vec::new(),
            open: Vec::new(),
            step_numbers: HashMap::new(),
            highest_step: None,
            reserved: HashSet::new(),
        }
    }

    /// Parse every line of the token stream.
    pub(crate) fn build(mut self, tokens: &[PositionedToken<'src>]) -> Result<ParserInput, ParseError> {
        let lines: Vec<Vec<PositionedToken<'src>>> = tokens
            .split(|t| matches!(t.token, Token::Newline))
            .map(|line| line.iter().filter(|t| !t.is_trivia()).cloned().collect())
            .filter(|line: &Vec<_>| !line.is_empty())
            .collect();
        self.reserved = lines.iter().filter_map(|line| explicit_step_number(line)).collect();

        for line in &lines {
            self.line(line);
        }
        self.finish()
    }

    fn line(&mut self, line: &[PositionedToken<'src>]) {
        let Some(first) = line.first() else {
            return;
        };
        let line_span = line
            .iter()
            .fold(first.span, |span, token| span.union(token.span));

        if !is_statement_keyword(&first.token) {
            self.diagnostics.emit(
                Diagnostic::error(format!("expected a statement, found `{}`", first.token))
                    .with_code(ErrorCode::E102)
                    .with_label(first.span, ErrorCode::E102.description())
                    .with_help(
                        "lines start with `SFC`, `Step`, `Action`, `LinkedFile`, `Transition`, \
                         `Divergence`, `Branch`, `EndBranch`, `EndDivergence` or `Jump`",
                    ),
            );
            return;
        }

        if matches!(first.token, Token::Transition) {
            self.transition(line, line_span);
            return;
        }

        let mut input = TokenSlice::new(&line[1..]);
        let parsed = statement_body(&first.token, &mut input);
        let consumed = line.len() - input.eof_offset();

        match parsed {
            Ok(_) if consumed < line.len() => {
                let found = &line[consumed];
                self.diagnostics.emit(
                    Diagnostic::error(format!(
                        "unexpected `{}` after `{}` statement",
                        found.token, first.token
                    ))
                    .with_code(ErrorCode::E100)
                    .with_label(found.span, "expected end of line"),
                );
            }
            Ok(parsed) => {
                trace!(statement:? = parsed; "Parsed line");
                self.apply(parsed, line_span);
            }
            Err(err) => self.diagnostics.emit(convert_error(err, line, consumed)),
        }
    }

    /// `Transition [T<k>] [<guard>|"<guard>"]`
    fn transition(&mut self, line: &[PositionedToken<'src>], line_span: Span) {
        let mut rest = &line[1..];

        let name = match rest {
            [first, _, ..] => match &first.token {
                Token::Identifier(id) if is_transition_name(id) => Some(id.to_string()),
                _ => None,
            },
            _ => None,
        };
        if name.is_some() {
            rest = &rest[1..];
        }

        let condition = match rest {
            [] => Spanned::new(String::new(), Span::new(line_span.end()..line_span.end())),
            [PositionedToken {
                token: Token::StringLiteral(text),
                span,
            }] => Spanned::new(text.clone(), *span),
            [first, ..] => {
                let last = rest.last().unwrap_or(first);
                let span = first.span.union(last.span);
                let text = self.source.get(span.range()).unwrap_or_default().trim();
                Spanned::new(text.to_string(), span)
            }
        };

        self.push_statement(
            Statement::Transition(TransitionDecl { name, condition }),
            line_span,
        );
    }

    fn apply(&mut self, line: Line, span: Span) {
        match line {
            Line::Title(title) => {
                if let Some(existing) = &self.title {
                    let first = existing.span();
                    self.diagnostics.emit(
                        Diagnostic::error("chart title is declared more than once")
                            .with_code(ErrorCode::E100)
                            .with_label(span, "second `SFC` header")
                            .with_secondary_label(first, "first declared here"),
                    );
                } else {
                    self.title = Some(title);
                }
            }
            Line::Step {
                designator,
                kind,
                label,
            } => self.step(designator, kind, label, span),
            Line::Action {
                variable,
                qualifier,
                duration,
            } => self.action(variable, qualifier, duration, span),
            Line::LinkedFile(file) => self.linked_file(file, span),
            Line::Divergence(kind) => self.open_divergence(kind, span),
            Line::Branch => self.open_branch(span),
            Line::EndBranch => self.close_branch(span),
            Line::EndDivergence(kind) => self.close_divergence(kind, span),
            Line::Jump(target) => {
                if let Some(target) = self.parse_number(&target, "jump target") {
                    self.push_statement(Statement::Jump(JumpDecl { target }), span);
                }
            }
        }
    }

    fn parse_number(&mut self, text: &Spanned<String>, what: &str) -> Option<Spanned<u32>> {
        match text.parse::<u32>() {
            Ok(n) => Some(Spanned::new(n, text.span())),
            Err(_) => {
                self.diagnostics.emit(
                    Diagnostic::error(format!("invalid {what} `{}`", text.inner()))
                        .with_code(ErrorCode::E109)
                        .with_label(text.span(), "not a step number")
                        .with_help("step numbers are non-negative integers"),
                );
                None
            }
        }
    }

    /// The number an unnumbered step gets: one above the highest so far,
    /// skipping numbers other lines declare explicitly.
    fn next_free_number(&self) -> u32 {
        let mut number = self.highest_step.map_or(0, |n| n.saturating_add(1));
        while number < u32::MAX
            && (self.reserved.contains(&number) || self.step_numbers.contains_key(&number))
        {
            number += 1;
        }
        number
    }

    fn step(
        &mut self,
        designator: Spanned<Designator>,
        kind: Option<Spanned<String>>,
        label: Option<Spanned<String>>,
        span: Span,
    ) {
        let designator_span = designator.span();
        let (number, name) = match designator.into_inner() {
            Designator::Number(text) => {
                let text = Spanned::new(text, designator_span);
                let Some(number) = self.parse_number(&text, "step number") else {
                    return;
                };
                (*number.inner(), None)
            }
            Designator::Name(name) => {
                let number = match numeric_suffix(&name) {
                    Some(suffix) => {
                        let text = Spanned::new(suffix.to_string(), designator_span);
                        let Some(number) = self.parse_number(&text, "step number") else {
                            return;
                        };
                        *number.inner()
                    }
                    None => self.next_free_number(),
                };
                (number, Some(name))
            }
        };

        if let Some(first) = self.step_numbers.get(&number) {
            self.diagnostics.emit(
                Diagnostic::error(format!("step number {number} is declared more than once"))
                    .with_code(ErrorCode::E103)
                    .with_label(span, "duplicate step")
                    .with_secondary_label(*first, "first declared here")
                    .with_help("give each step a unique number"),
            );
            return;
        }

        let step_type = match kind {
            None => StepType::Normal,
            Some(kind) => match kind.to_ascii_lowercase().as_str() {
                "initial" => StepType::Initial,
                "normal" => StepType::Normal,
                "task" => StepType::Task,
                "macro" => StepType::Macro,
                _ => {
                    self.diagnostics.emit(
                        Diagnostic::error(format!("unknown step kind `{}`", kind.inner()))
                            .with_code(ErrorCode::E107)
                            .with_label(kind.span(), ErrorCode::E107.description())
                            .with_help("use `Initial`, `Task` or `Macro`"),
                    );
                    return;
                }
            },
        };

        self.step_numbers.insert(number, span);
        self.highest_step = Some(self.highest_step.map_or(number, |n| n.max(number)));

        let label = label.map(Spanned::into_inner).or(name);
        self.push_statement(
            Statement::Step(StepDecl {
                number,
                label,
                step_type,
                actions: Vec::new(),
                linked_file: None,
            }),
            span,
        );
    }

    /// The step an attachment line applies to: the last statement of the
    /// current scope, if it is a step.
    fn attachment_target(&mut self, what: &str, span: Span) -> Option<&mut StepDecl> {
        let follows_step = matches!(
            self.current_scope()
                .and_then(|scope| scope.last())
                .map(|statement| statement.inner()),
            Some(Statement::Step(_))
        );
        if !follows_step {
            self.diagnostics.emit(
                Diagnostic::error(format!("`{what}` must follow a step"))
                    .with_code(ErrorCode::E104)
                    .with_label(span, "no step to attach to")
                    .with_help(format!("place `{what}` directly below its `Step` line")),
            );
            return None;
        }
        match self.current_scope()?.last_mut()?.inner_mut() {
            Statement::Step(step) => Some(step),
            _ => None,
        }
    }

    fn action(
        &mut self,
        variable: Spanned<String>,
        qualifier: Option<Spanned<String>>,
        duration: Option<Spanned<String>>,
        span: Span,
    ) {
        let qualifier = match qualifier {
            None => ActionQualifier::default(),
            Some(q) => match q.parse::<ActionQualifier>() {
                Ok(qualifier) => qualifier,
                Err(err) => {
                    self.diagnostics.emit(
                        Diagnostic::error(err.to_string())
                            .with_code(ErrorCode::E105)
                            .with_label(q.span(), ErrorCode::E105.description())
                            .with_help("use one of N, S, R, P, D, L, SD, DS, SL"),
                    );
                    return;
                }
            },
        };

        let action = ActionDecl {
            variable: variable.into_inner(),
            qualifier,
            duration: duration.map(Spanned::into_inner),
        };
        if let Some(step) = self.attachment_target("Action", span) {
            step.actions.push(Spanned::new(action, span));
        }
    }

    fn linked_file(&mut self, file: Spanned<String>, span: Span) {
        if let Some(step) = self.attachment_target("LinkedFile", span) {
            step.linked_file = Some(file);
        }
    }

    /// The statement list new statements go to, or `None` when the innermost
    /// divergence has no open branch.
    fn current_scope(&mut self) -> Option<&mut Vec<Spanned<Statement>>> {
        match self.open.last_mut() {
            None => Some(&mut self.root),
            Some(divergence) => divergence
                .current
                .as_mut()
                .map(|branch| &mut branch.statements),
        }
    }

    fn push_statement(&mut self, statement: Statement, span: Span) {
        let kind = statement.kind_name();
        match self.current_scope() {
            Some(scope) => scope.push(Spanned::new(statement, span)),
            None => self.diagnostics.emit(
                Diagnostic::error(format!("{kind} outside of a branch"))
                    .with_code(ErrorCode::E106)
                    .with_label(span, "not inside `Branch` ... `EndBranch`")
                    .with_help("wrap the statements of each alternative in `Branch` and `EndBranch`"),
            ),
        }
    }

    fn open_divergence(&mut self, kind: GateKind, span: Span) {
        if self.current_scope().is_none() {
            self.push_statement(
                Statement::Divergence(DivergenceBlock {
                    kind,
                    branches: Vec::new(),
                    end: None,
                }),
                span,
            );
            return;
        }
        self.open.push(OpenDivergence {
            kind,
            span,
            branches: Vec::new(),
            current: None,
        });
    }

    fn nesting_error(&mut self, message: &str, span: Span, help: &str) {
        self.diagnostics.emit(
            Diagnostic::error(message)
                .with_code(ErrorCode::E106)
                .with_label(span, ErrorCode::E106.description())
                .with_help(help),
        );
    }

    fn open_branch(&mut self, span: Span) {
        match self.open.last_mut() {
            None => self.nesting_error(
                "`Branch` outside of a divergence",
                span,
                "open a divergence with `Divergence AND` or `Divergence OR` first",
            ),
            Some(divergence) if divergence.current.is_some() => self.nesting_error(
                "`Branch` inside an open branch",
                span,
                "close the previous branch with `EndBranch` first",
            ),
            Some(divergence) => {
                divergence.current = Some(Branch {
                    statements: Vec::new(),
                    span,
                    closed: false,
                });
            }
        }
    }

    fn close_branch(&mut self, span: Span) {
        let branch = self
            .open
            .last_mut()
            .and_then(|divergence| divergence.current.take().map(|b| (divergence, b)));
        match branch {
            Some((divergence, mut branch)) => {
                branch.closed = true;
                divergence.branches.push(branch);
            }
            None => self.nesting_error(
                "`EndBranch` without an open branch",
                span,
                "every `EndBranch` closes the nearest `Branch`",
            ),
        }
    }

    fn close_divergence(&mut self, kind: Option<GateKind>, span: Span) {
        match self.open.last() {
            None => {
                self.nesting_error(
                    "`EndDivergence` without an open divergence",
                    span,
                    "remove the line or add the matching `Divergence`",
                );
                return;
            }
            Some(divergence) if divergence.current.is_some() => {
                self.nesting_error(
                    "`EndDivergence` while a branch is still open",
                    span,
                    "close the branch with `EndBranch` first",
                );
                return;
            }
            Some(_) => {}
        }

        let Some(divergence) = self.open.pop() else {
            return;
        };
        let block = Statement::Divergence(DivergenceBlock {
            kind: divergence.kind,
            branches: divergence.branches,
            end: Some(DivergenceEnd { kind, span }),
        });
        self.push_statement(block, divergence.span);
    }

    fn finish(mut self) -> Result<ParserInput, ParseError> {
        // Divergences left open are kept; the validator reports them.
        while let Some(divergence) = self.open.pop() {
            let statement = divergence.into_unclosed();
            match self.current_scope() {
                Some(scope) => scope.push(statement),
                None => self.root.push(statement),
            }
        }

        self.diagnostics.finish()?;
        Ok(ParserInput {
            title: self.title,
            statements: self.root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_names() {
        assert!(is_transition_name("T0"));
        assert!(is_transition_name("T12"));
        assert!(!is_transition_name("T"));
        assert!(!is_transition_name("TA1"));
        assert!(!is_transition_name("t1"));
    }

    #[test]
    fn test_unnumbered_step_skips_numbers_declared_later() {
        let source = "Step 0 (Initial)\nTransition\nStep Fill\nTransition\nStep 1\n\
                      Transition\nStep Drain2\nTransition\nStep Rinse\n";
        let input = crate::parse(source).expect("numbers should not collide");
        let numbers: Vec<u32> = input
            .steps()
            .iter()
            .filter_map(|s| match s.inner() {
                Statement::Step(step) => Some(step.number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![0, 3, 1, 2, 4]);
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(numeric_suffix("S3"), Some("3"));
        assert_eq!(numeric_suffix("Fill_12"), Some("12"));
        assert_eq!(numeric_suffix("Idle"), None);
    }
}
