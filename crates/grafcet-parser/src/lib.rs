//! # GRAFCET Parser
//!
//! Parser for the line-oriented GRAFCET / SFC chart language. The crate turns
//! source text into a [`ParserInput`]: the nested statement tree the layout
//! compiler consumes, with every statement annotated by its source span.
//!
//! ## Usage
//!
//! ```
//! # use grafcet_parser::{parse, error::ParseError, Statement};
//!
//! fn main() -> Result<(), ParseError> {
//!     let source = r#"
//! Step 0 (Initial)
//! Transition "Start"
//! Step 1
//!     Action "Motor" S
//! Transition "Done"
//! Jump 0
//! "#;
//!
//!     let input = parse(source)?;
//!     assert_eq!(input.statements.len(), 5);
//!     assert!(matches!(input.statements[4].inner(), Statement::Jump(_)));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod guard;
mod lexer;
mod parser;
mod parser_types;
mod span;
mod tokens;

pub use parser_types::{
    ActionDecl, Branch, DivergenceBlock, DivergenceEnd, JumpDecl, ParserInput, Statement,
    StepDecl, TransitionDecl,
};
pub use span::{Span, Spanned, line_col};

use log::{debug, info};

use error::ParseError;
use parser::ChartBuilder;

/// Parse chart source text.
///
/// The pipeline has two stages:
///
/// 1. **Tokenize** - Convert source text to tokens, collecting every lexer
///    diagnostic
/// 2. **Build** - Parse the token stream line by line into the statement
///    tree, collecting every parser diagnostic
///
/// Divergences left open at the end of input are kept in the tree with
/// `end: None`; reporting them is up to the structural validator.
///
/// # Errors
///
/// Returns a [`ParseError`] carrying all diagnostics of the failing stage.
pub fn parse(source: &str) -> Result<ParserInput, ParseError> {
    let tokens = lexer::tokenize(source)?;
    debug!(tokens = tokens.len(); "Source tokenized");

    let input = ChartBuilder::new(source).build(&tokens)?;
    info!(statements = input.statements.len(), steps = input.steps().len(); "Chart parsed");

    Ok(input)
}
