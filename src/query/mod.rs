#![forbid(unsafe_code)]

//! SPARQL query front-end.
//!
//! Turns query text into an algebra tree and remembers which tokens each
//! algebra node was parsed from, so diagnostics can point back at the source.

/// Relational algebra tree and query forms.
pub mod algebra;

/// Parser error types.
pub mod errors;

/// Expressions, aggregates and window functions.
pub mod expr;

/// Tokenizer with byte positions and token sequence numbers.
pub mod lexer;

/// Recursive-descent parser.
///
/// Translates text into algebra while recording per-node token provenance.
pub mod parser;

/// Algebra node to token-range mapping.
pub mod provenance;

/// Whitespace normalization and diagnostic output.
pub mod serialize;

/// RDF terms, triple patterns, and property paths.
pub mod term;

pub use algebra::{Algebra, Dataset, Query, QueryForm, SortComparator, VariableSet};
pub use errors::ParseError;
pub use expr::{Aggregation, AggregationMapping, Expression};
pub use lexer::{LexError, Lexer, PositionedToken, Token};
pub use parser::{parse, ParsedQuery, Parser};
pub use provenance::{Provenance, TokenRange};
pub use serialize::reformat;
pub use term::{Node, PropertyPath, Term, TriplePattern};
