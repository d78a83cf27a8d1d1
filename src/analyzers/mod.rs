//! Query checkers and the analyzer that runs them all.

mod errors;
/// `LANG(..) = ..` comparisons.
pub mod lang_equality;
/// Sorted subqueries without a slice.
pub mod subquery_sort;
/// Filter variables no pattern binds.
pub mod unbound_filter;
/// OPTIONAL with an empty required side.
pub mod useless_optional;
/// OPTIONAL whose multiplicity is unobservable.
pub mod useless_optional_dataflow;

use std::time::Instant;

use tracing::{debug, warn};

pub use errors::{AnalyzerError, AnalyzerErrorWithCode};
pub use lang_equality::LangEquality;
pub use subquery_sort::SubquerySort;
pub use unbound_filter::UnboundFilterVariable;
pub use useless_optional::UselessOptional;
pub use useless_optional_dataflow::UselessOptionalDataflow;

use crate::query::algebra::{Algebra, Query};
use crate::report::reporter::Reporter;

/// A check run over one parsed query.
pub trait Analyzer: Send + Sync {
    /// Name used in reports, summaries and configuration.
    fn name(&self) -> &'static str;

    /// One-line explanation of what is checked.
    fn description(&self) -> &'static str;

    /// Reports every issue found in `algebra` and returns how many there were.
    ///
    /// `sparql` is the text `query` was parsed from and `algebra` is the root
    /// of its algebra.
    fn analyze(
        &self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        reporter: &mut dyn Reporter,
    ) -> Result<usize, AnalyzerError>;
}

/// Names of the built-in analyzers, in the order they run.
pub const ANALYZER_NAMES: [&str; 5] = [
    "SubqueryWithSort",
    "UnboundFilterVariable",
    "UselessOptionalAnalyzer",
    "UselessOptionalAnalyzer2",
    "LangEquals",
];

/// Looks up a built-in analyzer by name.
pub fn analyzer_by_name(name: &str) -> Option<Box<dyn Analyzer>> {
    let analyzer: Box<dyn Analyzer> = match name {
        "SubqueryWithSort" => Box::new(SubquerySort),
        "UnboundFilterVariable" => Box::new(UnboundFilterVariable),
        "UselessOptionalAnalyzer" => Box::new(UselessOptional),
        "UselessOptionalAnalyzer2" => Box::new(UselessOptionalDataflow),
        "LangEquals" => Box::new(LangEquality),
        _ => return None,
    };
    Some(analyzer)
}

/// An analyzer that raised an error on a query.
#[derive(Debug)]
pub struct AnalyzerFailure {
    /// Analyzer name.
    pub analyzer: &'static str,
    /// What went wrong.
    pub error: AnalyzerError,
}

/// Outcome of running every analyzer over one query.
#[derive(Debug, Default)]
pub struct AnalysisRun {
    /// Issues over all analyzers that completed.
    pub issues: usize,
    /// Issues per analyzer, in run order; failed analyzers are absent.
    pub counts: Vec<(&'static str, usize)>,
    /// Analyzers that failed.
    pub failures: Vec<AnalyzerFailure>,
}

impl AnalysisRun {
    /// True when every analyzer completed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs a fixed list of analyzers in order.
///
/// A failing analyzer is logged and recorded; the remaining analyzers still
/// run on the same query.
pub struct MultiAnalyzer {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl Default for MultiAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiAnalyzer {
    /// Every built-in analyzer.
    pub fn new() -> Self {
        Self {
            analyzers: ANALYZER_NAMES
                .iter()
                .filter_map(|name| analyzer_by_name(name))
                .collect(),
        }
    }

    /// Runs exactly the given analyzers.
    pub fn with_analyzers(analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        Self { analyzers }
    }

    /// Every built-in analyzer except the named ones.
    pub fn without<S: AsRef<str>>(disabled: &[S]) -> Result<Self, AnalyzerError> {
        if let Some(unknown) = disabled
            .iter()
            .map(AsRef::as_ref)
            .find(|name| !ANALYZER_NAMES.contains(name))
        {
            return Err(AnalyzerError::UnknownAnalyzer(unknown.to_owned()));
        }
        let analyzers = ANALYZER_NAMES
            .iter()
            .filter(|name| !disabled.iter().any(|d| d.as_ref() == **name))
            .filter_map(|name| analyzer_by_name(name))
            .collect();
        Ok(Self { analyzers })
    }

    /// The analyzers in run order.
    pub fn analyzers(&self) -> impl Iterator<Item = &dyn Analyzer> {
        self.analyzers.iter().map(AsRef::as_ref)
    }

    /// Runs every analyzer over one query.
    pub fn run(
        &self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        reporter: &mut dyn Reporter,
    ) -> AnalysisRun {
        let mut run = AnalysisRun::default();
        for analyzer in &self.analyzers {
            let name = analyzer.name();
            let started = Instant::now();
            debug!(analyzer = name, "analyzer started");
            match analyzer.analyze(sparql, query, algebra, reporter) {
                Ok(issues) => {
                    debug!(
                        analyzer = name,
                        issues,
                        elapsed_us = started.elapsed().as_micros() as u64,
                        "analyzer finished"
                    );
                    run.issues += issues;
                    run.counts.push((name, issues));
                }
                Err(error) => {
                    warn!(
                        analyzer = name,
                        error = %AnalyzerErrorWithCode(&error),
                        "analyzer failed"
                    );
                    run.failures.push(AnalyzerFailure {
                        analyzer: name,
                        error,
                    });
                }
            }
        }
        run
    }
}

impl Analyzer for MultiAnalyzer {
    fn name(&self) -> &'static str {
        "MultiAnalyzer"
    }

    fn description(&self) -> &'static str {
        "Runs every configured analyzer."
    }

    fn analyze(
        &self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        reporter: &mut dyn Reporter,
    ) -> Result<usize, AnalyzerError> {
        Ok(self.run(sparql, query, algebra, reporter).issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::report::recording::RecordingReporter;

    struct Failing;

    impl Analyzer for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        fn analyze(
            &self,
            _sparql: &str,
            _query: &Query,
            _algebra: &Algebra,
            _reporter: &mut dyn Reporter,
        ) -> Result<usize, AnalyzerError> {
            Err(AnalyzerError::Invariant {
                analyzer: "Failing",
                message: "boom".into(),
            })
        }
    }

    #[test]
    fn registry_matches_run_order() {
        let names: Vec<&str> = MultiAnalyzer::new().analyzers().map(|a| a.name()).collect();
        assert_eq!(names, ANALYZER_NAMES);
        assert!(analyzer_by_name("Nope").is_none());
    }

    #[test]
    fn failure_does_not_stop_later_analyzers() {
        let sparql = "SELECT * WHERE { OPTIONAL { ?s ?p ?o } }";
        let parsed = parse(sparql).expect("parse");
        let multi = MultiAnalyzer::with_analyzers(vec![
            Box::new(Failing),
            Box::new(UselessOptional),
        ]);
        let mut reporter = RecordingReporter::new();
        let run = multi.run(sparql, &parsed.query, &parsed.query.algebra, &mut reporter);
        assert_eq!(run.issues, 1);
        assert_eq!(run.counts, vec![("UselessOptionalAnalyzer", 1)]);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].error.code(), "Invariant");
        assert!(!run.is_clean());
    }

    #[test]
    fn disabling_by_name() {
        let multi = MultiAnalyzer::without(&["LangEquals"]).expect("known name");
        assert_eq!(multi.analyzers().count(), 4);
        assert!(matches!(
            MultiAnalyzer::without(&["Bogus"]),
            Err(AnalyzerError::UnknownAnalyzer(name)) if name == "Bogus"
        ));
    }
}
