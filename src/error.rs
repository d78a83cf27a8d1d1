use std::io;

use thiserror::Error;

use crate::analyzers::AnalyzerError;
use crate::cli::ConfigError;
use crate::query::{LexError, ParseError};
use crate::report::ReportError;

/// Result alias used by the batch commands and the binary.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the crate's top-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Query text could not be tokenized.
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    /// Query text could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// An analyzer failed.
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    /// An issue or summary could not be written.
    #[error(transparent)]
    Report(#[from] ReportError),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON output failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The tracing subscriber could not be installed.
    #[error("invalid argument: {0}")]
    Logging(String),
}
