//! Transition guard expressions.
//!
//! A guard is a boolean expression over named variables:
//!
//! ```text
//! PB_START AND NOT E_STOP
//! (LEVEL >= 80 || OVERRIDE) && MODE == "auto"
//! ```
//!
//! Operator precedence, tightest first: `NOT`/`!`, comparisons
//! (`=`, `==`, `!=`, `<`, `<=`, `>`, `>=`), `AND`/`&&`, `OR`/`||`.
//! Keywords and the `TRUE`/`FALSE` literals are case-insensitive.

use std::fmt;

use winnow::{
    Parser as _,
    combinator::{alt, cut_err, opt, preceded, terminated},
    error::{ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    lexer,
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardExpr {
    Bool(bool),
    Number(f64),
    Text(String),
    Variable(String),
    Not(Box<GuardExpr>),
    And(Box<GuardExpr>, Box<GuardExpr>),
    Or(Box<GuardExpr>, Box<GuardExpr>),
    Compare {
        op: CompareOp,
        lhs: Box<GuardExpr>,
        rhs: Box<GuardExpr>,
    },
}

impl GuardExpr {
    /// Names of all referenced variables, in first-use order, without
    /// duplicates.
    pub fn variables(&self) -> Vec<&str> {
        fn walk<'a>(expr: &'a GuardExpr, out: &mut Vec<&'a str>) {
            match expr {
                GuardExpr::Variable(name) => {
                    if !out.contains(&name.as_str()) {
                        out.push(name);
                    }
                }
                GuardExpr::Not(inner) => walk(inner, out),
                GuardExpr::And(lhs, rhs)
                | GuardExpr::Or(lhs, rhs)
                | GuardExpr::Compare { lhs, rhs, .. } => {
                    walk(lhs, out);
                    walk(rhs, out);
                }
                GuardExpr::Bool(_) | GuardExpr::Number(_) | GuardExpr::Text(_) => {}
            }
        }

        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

impl fmt::Display for GuardExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardExpr::Bool(true) => write!(f, "TRUE"),
            GuardExpr::Bool(false) => write!(f, "FALSE"),
            GuardExpr::Number(n) => write!(f, "{n}"),
            GuardExpr::Text(s) => write!(f, "{s:?}"),
            GuardExpr::Variable(name) => write!(f, "{name}"),
            GuardExpr::Not(inner) => write!(f, "NOT {inner}"),
            GuardExpr::And(lhs, rhs) => write!(f, "({lhs} AND {rhs})"),
            GuardExpr::Or(lhs, rhs) => write!(f, "({lhs} OR {rhs})"),
            GuardExpr::Compare { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    Expected(&'static str),
}

type Input<'a> = TokenSlice<'a, PositionedToken<'a>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

fn is_word(token: &Token<'_>, word: &str) -> bool {
    matches!(token, Token::Identifier(id) if id.eq_ignore_ascii_case(word))
}

fn or_op(input: &mut Input<'_>) -> IResult<()> {
    any.verify(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::Or | Token::OrOr) || is_word(&token.token, "or")
    })
    .void()
    .parse_next(input)
}

fn and_op(input: &mut Input<'_>) -> IResult<()> {
    any.verify(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::And | Token::AndAnd) || is_word(&token.token, "and")
    })
    .void()
    .parse_next(input)
}

fn not_op(input: &mut Input<'_>) -> IResult<()> {
    any.verify(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::Not | Token::Bang) || is_word(&token.token, "not")
    })
    .void()
    .parse_next(input)
}

fn compare_op(input: &mut Input<'_>) -> IResult<CompareOp> {
    any.verify_map(|token: &PositionedToken<'_>| match token.token {
        Token::Assign | Token::EqEq => Some(CompareOp::Eq),
        Token::NotEq => Some(CompareOp::Ne),
        Token::Less => Some(CompareOp::Lt),
        Token::LessEq => Some(CompareOp::Le),
        Token::Greater => Some(CompareOp::Gt),
        Token::GreaterEq => Some(CompareOp::Ge),
        _ => None,
    })
    .parse_next(input)
}

fn literal_or_variable(input: &mut Input<'_>) -> IResult<GuardExpr> {
    any.verify_map(|token: &PositionedToken<'_>| match &token.token {
        Token::Number(n) => n.parse().ok().map(GuardExpr::Number),
        Token::StringLiteral(s) => Some(GuardExpr::Text(s.clone())),
        Token::Identifier(id) if id.eq_ignore_ascii_case("true") => Some(GuardExpr::Bool(true)),
        Token::Identifier(id) if id.eq_ignore_ascii_case("false") => Some(GuardExpr::Bool(false)),
        Token::Identifier(id)
            if !["and", "or", "not"]
                .iter()
                .any(|word| id.eq_ignore_ascii_case(word)) =>
        {
            Some(GuardExpr::Variable(id.to_string()))
        }
        _ => None,
    })
    .parse_next(input)
}

fn negative_number(input: &mut Input<'_>) -> IResult<GuardExpr> {
    preceded(
        any.verify(|token: &PositionedToken<'_>| matches!(token.token, Token::Minus)),
        cut_err(any.verify_map(|token: &PositionedToken<'_>| match &token.token {
            Token::Number(n) => n.parse::<f64>().ok().map(|n| GuardExpr::Number(-n)),
            _ => None,
        }))
        .context(Context::Expected("number")),
    )
    .parse_next(input)
}

fn parenthesized(input: &mut Input<'_>) -> IResult<GuardExpr> {
    preceded(
        any.verify(|token: &PositionedToken<'_>| matches!(token.token, Token::LeftParen)),
        cut_err(terminated(
            or_expr,
            any.verify(|token: &PositionedToken<'_>| matches!(token.token, Token::RightParen))
                .context(Context::Expected("`)`")),
        )),
    )
    .parse_next(input)
}

fn primary(input: &mut Input<'_>) -> IResult<GuardExpr> {
    alt((parenthesized, negative_number, literal_or_variable))
        .context(Context::Expected("variable, literal or `(`"))
        .parse_next(input)
}

fn unary(input: &mut Input<'_>) -> IResult<GuardExpr> {
    if opt(not_op).parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        return Ok(GuardExpr::Not(Box::new(inner)));
    }
    primary(input)
}

fn comparison(input: &mut Input<'_>) -> IResult<GuardExpr> {
    let lhs = unary(input)?;
    match opt(compare_op).parse_next(input)? {
        Some(op) => {
            let rhs = cut_err(unary).parse_next(input)?;
            Ok(GuardExpr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            })
        }
        None => Ok(lhs),
    }
}

fn and_expr(input: &mut Input<'_>) -> IResult<GuardExpr> {
    let mut expr = comparison(input)?;
    while opt(and_op).parse_next(input)?.is_some() {
        let rhs = cut_err(comparison).parse_next(input)?;
        expr = GuardExpr::And(Box::new(expr), Box::new(rhs));
    }
    Ok(expr)
}

fn or_expr(input: &mut Input<'_>) -> IResult<GuardExpr> {
    let mut expr = and_expr(input)?;
    while opt(or_op).parse_next(input)?.is_some() {
        let rhs = cut_err(and_expr).parse_next(input)?;
        expr = GuardExpr::Or(Box::new(expr), Box::new(rhs));
    }
    Ok(expr)
}

/// Parse a guard expression.
///
/// Spans in the returned diagnostics are relative to `text`.
///
/// # Example
///
/// ```
/// # use grafcet_parser::guard::{parse_guard, GuardExpr};
/// let guard = parse_guard("PB_START AND NOT E_STOP").unwrap();
/// assert_eq!(guard.variables(), vec!["PB_START", "E_STOP"]);
/// assert_eq!(guard.to_string(), "(PB_START AND NOT E_STOP)");
/// ```
pub fn parse_guard(text: &str) -> Result<GuardExpr, ParseError> {
    let tokens: Vec<PositionedToken<'_>> = lexer::tokenize(text)?
        .into_iter()
        .filter(|token| !token.is_trivia())
        .collect();

    if tokens.is_empty() {
        return Err(Diagnostic::error("empty guard expression")
            .with_code(ErrorCode::E108)
            .with_label(Span::new(0..text.len()), "no condition")
            .into());
    }

    let mut input = TokenSlice::new(&tokens);
    let result = or_expr(&mut input);
    let consumed = tokens.len() - input.eof_offset();

    match result {
        Ok(expr) if consumed == tokens.len() => Ok(expr),
        Ok(_) => {
            let found = &tokens[consumed];
            Err(Diagnostic::error(format!("unexpected `{}` in guard", found.token))
                .with_code(ErrorCode::E108)
                .with_label(found.span, "expected an operator or end of guard")
                .into())
        }
        Err(err) => {
            let expected = match &err {
                ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.context().find_map(|ctx| match ctx {
                    Context::Expected(label) => Some(*label),
                }),
                ErrMode::Incomplete(_) => None,
            }
            .unwrap_or("an expression");

            let diag = match tokens.get(consumed) {
                Some(found) => Diagnostic::error(format!("unexpected `{}` in guard", found.token))
                    .with_label(found.span, format!("expected {expected}")),
                None => Diagnostic::error("guard expression ends too early")
                    .with_label(Span::new(text.len()..text.len()), format!("expected {expected}")),
            };
            Err(diag.with_code(ErrorCode::E108).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<GuardExpr> {
        Box::new(GuardExpr::Variable(name.to_string()))
    }

    #[test]
    fn test_single_variable() {
        assert_eq!(
            parse_guard("Start_Button").unwrap(),
            GuardExpr::Variable("Start_Button".to_string())
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let guard = parse_guard("A OR B AND C").unwrap();
        assert_eq!(
            guard,
            GuardExpr::Or(var("A"), Box::new(GuardExpr::And(var("B"), var("C"))))
        );
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let guard = parse_guard("NOT A AND B").unwrap();
        assert_eq!(
            guard,
            GuardExpr::And(Box::new(GuardExpr::Not(var("A"))), var("B"))
        );
    }

    #[test]
    fn test_comparison_binds_tighter_than_and() {
        let guard = parse_guard("LEVEL >= 80 && MODE = \"auto\"").unwrap();
        assert_eq!(guard.to_string(), "((LEVEL >= 80) AND (MODE == \"auto\"))");
    }

    #[test]
    fn test_parentheses_and_symbols() {
        let guard = parse_guard("!(A || B)").unwrap();
        assert_eq!(
            guard,
            GuardExpr::Not(Box::new(GuardExpr::Or(var("A"), var("B"))))
        );
    }

    #[test]
    fn test_case_insensitive_keywords() {
        assert_eq!(parse_guard("true").unwrap(), GuardExpr::Bool(true));
        assert_eq!(parse_guard("FALSE").unwrap(), GuardExpr::Bool(false));
        let guard = parse_guard("a and not b").unwrap();
        assert_eq!(guard.to_string(), "(a AND NOT b)");
    }

    #[test]
    fn test_negative_number() {
        let guard = parse_guard("TEMP > -5").unwrap();
        assert_eq!(
            guard,
            GuardExpr::Compare {
                op: CompareOp::Gt,
                lhs: var("TEMP"),
                rhs: Box::new(GuardExpr::Number(-5.0)),
            }
        );
    }

    #[test]
    fn test_variables_are_deduplicated() {
        let guard = parse_guard("A AND (B OR A) AND C > 1").unwrap();
        assert_eq!(guard.variables(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_dangling_operator() {
        let err = parse_guard("A AND").unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.code(), Some(ErrorCode::E108));
        assert_eq!(diag.message(), "guard expression ends too early");
    }

    #[test]
    fn test_unclosed_parenthesis() {
        let err = parse_guard("(A OR B").unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E108));
    }

    #[test]
    fn test_trailing_tokens() {
        let err = parse_guard("A B").unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.message(), "unexpected `B` in guard");
        assert_eq!(diag.primary_span(), Some(Span::new(2..3)));
    }

    #[test]
    fn test_empty_guard() {
        assert!(parse_guard("   ").is_err());
    }
}
