//! Structural Liquid parser.
//!
//! The `liquid` crate renders templates but keeps its parse tree private,
//! so analysis runs on this lightweight parse instead:
//! - `lexer`: text, `{{ output }}` and `{% tag %}` tokens (whitespace
//!   control, `raw`, `comment`, inline `#` comments)
//! - `parser`: block structure (`if`/`unless`/`case`/`for`/`tablerow`/
//!   `capture`) with `assign`/`for`/`capture` targets read structurally
//! - `expression`: filter chains, filter arguments and condition identifiers

mod ast;
mod expression;
mod lexer;
mod parser;

use thiserror::Error;

pub use ast::{
    Assign, Capture, Case, Conditional, ConditionalBranch, ConditionalKind, ForLoop,
    LoopCollection, LoopKind, Node, Output, Span, Tag, Token, When,
};
pub use expression::{
    has_unquoted_whitespace, identifiers, is_literal, split_filters, split_top_level, FilterArg,
    FilterCall,
};
pub use parser::parse;

/// The template source could not be parsed
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    /// The offending token, when one can be pointed at
    pub token: Option<Token>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, token: Option<Token>) -> Self {
        Self {
            message: message.into(),
            token,
        }
    }
}
