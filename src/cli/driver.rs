use std::io::Write;

use tracing::{debug, info};

use crate::analyzers::{AnalysisRun, AnalyzerErrorWithCode, MultiAnalyzer};
use crate::cli::{report_failure, BatchQuery, QueryBatch};
use crate::error::Result;
use crate::query::errors::ParseErrorWithCode;
use crate::query::parser::parse;
use crate::report::reporter::Reporter;
use crate::report::summary::IssueSummary;

/// Runs a [`MultiAnalyzer`] over a batch and keeps the batch summary.
///
/// The summary is created with the driver and handed back by
/// [`BatchDriver::finish`]; analyzers never see it.
pub struct BatchDriver<'a> {
    analyzer: &'a MultiAnalyzer,
    summary: IssueSummary,
    failed: usize,
}

impl<'a> BatchDriver<'a> {
    /// Starts a batch.
    pub fn new(analyzer: &'a MultiAnalyzer) -> Self {
        Self {
            analyzer,
            summary: IssueSummary::new(),
            failed: 0,
        }
    }

    /// Parses and analyzes one query. Parse failures and analyzer failures
    /// are written to `out`; only write errors are returned.
    pub fn analyze_query<W: Write>(
        &mut self,
        query: &BatchQuery,
        reporter: &mut dyn Reporter,
        out: &mut W,
    ) -> Result<Option<AnalysisRun>> {
        let parsed = match parse(&query.text) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.failed += 1;
                report_failure(out, query, "analyze query", &ParseErrorWithCode(&err))?;
                return Ok(None);
            }
        };
        let run = self.analyzer.run(
            &query.text,
            &parsed.query,
            &parsed.query.algebra,
            reporter,
        );
        for failure in &run.failures {
            writeln!(
                out,
                "ERROR:{}: Issue running analyzer {}: {}",
                query.line,
                failure.analyzer,
                AnalyzerErrorWithCode(&failure.error)
            )?;
        }
        self.summary.add_query();
        for (name, issues) in &run.counts {
            self.summary.add_issues(name, *issues);
        }
        debug!(line = query.line, issues = run.issues, "query analyzed");
        Ok(Some(run))
    }

    /// Analyzes every query of `batch` in order.
    pub fn run<W: Write>(
        &mut self,
        batch: &QueryBatch,
        reporter: &mut dyn Reporter,
        out: &mut W,
    ) -> Result<()> {
        for query in batch {
            self.analyze_query(query, reporter, out)?;
        }
        info!(
            queries = self.summary.queries,
            failed = self.failed,
            issues = self.summary.total(),
            "batch finished"
        );
        Ok(())
    }

    /// Running tally.
    pub fn summary(&self) -> &IssueSummary {
        &self.summary
    }

    /// Queries that did not parse.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Ends the batch and returns its tally.
    pub fn finish(self) -> IssueSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::recording::RecordingReporter;
    use std::io::Cursor;

    #[test]
    fn batch_continues_past_bad_queries() {
        let input = "SELECT * WHERE { OPTIONAL { ?s ?p ?o } }\nSELECT WHERE\nSELECT * WHERE { ?s ?p ?o FILTER(?x) }\n";
        let batch = QueryBatch::from_lines(Cursor::new(input), false).expect("read");
        let analyzer = MultiAnalyzer::new();
        let mut driver = BatchDriver::new(&analyzer);
        let mut reporter = RecordingReporter::new();
        let mut out = Vec::new();
        driver.run(&batch, &mut reporter, &mut out).expect("run");
        assert_eq!(driver.failed(), 1);
        let summary = driver.finish();
        assert_eq!(summary.queries, 2);
        assert_eq!(summary.counts.get("UselessOptionalAnalyzer"), Some(&1));
        assert_eq!(summary.counts.get("UnboundFilterVariable"), Some(&1));
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.starts_with("ERROR:2: Failed to analyze query: [Syntax]"), "{printed}");
        assert!(printed.contains("FAILED:2: SELECT WHERE"), "{printed}");
    }
}
