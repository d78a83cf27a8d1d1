//! Static analysis of SPARQL queries.
//!
//! Queries are parsed into an algebra tree with token provenance, checked by
//! a set of analyzers, and reported with the offending parts of the query
//! highlighted.

#![warn(missing_docs)]

pub mod analysis;
pub mod analyzers;
pub mod cli;
/// Crate-wide error type.
pub mod error;
/// `tracing` subscriber setup.
pub mod logging;
pub mod query;
pub mod report;

pub use error::{Error, Result};
