use std::fmt;

use thiserror::Error;

use crate::report::reporter::ReportError;

/// Errors an analyzer can raise while checking one query.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The reporter rejected an issue.
    #[error(transparent)]
    Report(#[from] ReportError),
    /// The algebra did not have a shape the analyzer relies on.
    #[error("{analyzer}: {message}")]
    Invariant {
        /// Analyzer that gave up.
        analyzer: &'static str,
        /// What was wrong.
        message: String,
    },
    /// A disabled or misspelled analyzer name.
    #[error("unknown analyzer '{0}'")]
    UnknownAnalyzer(String),
}

impl AnalyzerError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            AnalyzerError::Report(_) => "Report",
            AnalyzerError::Invariant { .. } => "Invariant",
            AnalyzerError::UnknownAnalyzer(_) => "UnknownAnalyzer",
        }
    }
}

/// Convenience wrapper that formats analyzer errors with their codes.
pub struct AnalyzerErrorWithCode<'a>(pub &'a AnalyzerError);

impl fmt::Display for AnalyzerErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
