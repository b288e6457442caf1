//! Token definitions for the chart language.

use std::fmt;

use crate::span::Span;

/// Token types for the chart language
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // Statement keywords
    Sfc,
    Step,
    Action,
    LinkedFile,
    Transition,
    Divergence,
    Branch,
    EndBranch,
    EndDivergence,
    Jump,

    // Guard keywords
    And,
    Or,
    Not,

    // Literals
    StringLiteral(String),
    Number(&'src str),
    Identifier(&'src str),

    // Operators
    Assign,    // =
    EqEq,      // ==
    NotEq,     // !=
    Less,      // <
    LessEq,    // <=
    Greater,   // >
    GreaterEq, // >=
    Bang,      // !
    AndAnd,    // &&
    OrOr,      // ||
    Minus,     // -

    // Punctuation
    LeftParen,  // (
    RightParen, // )
    Comma,      // ,

    // Comments
    LineComment(&'src str), // // comment

    // Whitespace
    Whitespace,
    Newline,
}

impl Token<'_> {
    /// Returns `true` for tokens that carry no meaning for the parser.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Token::Whitespace | Token::Newline | Token::LineComment(_)
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Sfc => write!(f, "SFC"),
            Token::Step => write!(f, "Step"),
            Token::Action => write!(f, "Action"),
            Token::LinkedFile => write!(f, "LinkedFile"),
            Token::Transition => write!(f, "Transition"),
            Token::Divergence => write!(f, "Divergence"),
            Token::Branch => write!(f, "Branch"),
            Token::EndBranch => write!(f, "EndBranch"),
            Token::EndDivergence => write!(f, "EndDivergence"),
            Token::Jump => write!(f, "Jump"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::StringLiteral(s) => write!(f, "\"{s}\""),
            Token::Number(n) => write!(f, "{n}"),
            Token::Identifier(id) => write!(f, "{id}"),
            Token::Assign => write!(f, "="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::LessEq => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEq => write!(f, ">="),
            Token::Bang => write!(f, "!"),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Minus => write!(f, "-"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::LineComment(c) => write!(f, "//{c}"),
            Token::Whitespace => write!(f, " "),
            Token::Newline => writeln!(f),
        }
    }
}

/// A token with position information for winnow integration
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken<'src> {
    pub token: Token<'src>,
    pub span: Span,
}

impl<'src> PositionedToken<'src> {
    pub fn new(token: Token<'src>, span: Span) -> Self {
        Self { token, span }
    }
}

impl<'src> std::ops::Deref for PositionedToken<'src> {
    type Target = Token<'src>;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl fmt::Display for PositionedToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.token.fmt(f)
    }
}
