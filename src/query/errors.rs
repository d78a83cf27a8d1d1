use std::fmt;

use thiserror::Error;

use crate::query::lexer::LexError;

/// Structured errors emitted by the query parser.
///
/// Positions are 1-based and refer to the token where parsing stopped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The text could not be tokenized.
    #[error(transparent)]
    Lex(#[from] LexError),
    /// A token did not fit the grammar at this point.
    #[error("{message} at line {line}, column {column}")]
    Syntax {
        /// Description of what was expected.
        message: String,
        /// 1-based line.
        line: u32,
        /// 1-based column.
        column: u32,
    },
    /// Input ended in the middle of a construct.
    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for.
        expected: String,
    },
    /// A prefixed name used a prefix without a `PREFIX` declaration.
    #[error("undeclared prefix '{prefix}:' at line {line}, column {column}")]
    UndeclaredPrefix {
        /// Offending prefix.
        prefix: String,
        /// 1-based line.
        line: u32,
        /// 1-based column.
        column: u32,
    },
    /// A LIMIT or OFFSET value does not fit in 64 bits.
    #[error("invalid {clause} value '{value}'")]
    InvalidInteger {
        /// `LIMIT` or `OFFSET`.
        clause: &'static str,
        /// Literal text.
        value: String,
    },
}

impl ParseError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Lex(_) => "Lex",
            ParseError::Syntax { .. } => "Syntax",
            ParseError::UnexpectedEnd { .. } => "UnexpectedEnd",
            ParseError::UndeclaredPrefix { .. } => "UndeclaredPrefix",
            ParseError::InvalidInteger { .. } => "InvalidInteger",
        }
    }
}

/// Convenience wrapper that formats parse errors with their codes.
pub struct ParseErrorWithCode<'a>(pub &'a ParseError);

impl fmt::Display for ParseErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
