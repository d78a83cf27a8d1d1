//! In-memory reporter.

use crate::query::algebra::{Algebra, Query};
use crate::report::highlight::{highlight, Painter};
use crate::report::reporter::{Issue, ReportError, Reporter};
use crate::report::summary::IssueSummary;

/// An issue together with its query rendered in compact form with
/// `[[..]]` markers around the highlighted text.
#[derive(Clone, Debug)]
pub struct RecordedIssue {
    /// The issue as reported.
    pub issue: Issue,
    /// Query text with markers.
    pub highlighted: String,
}

/// Keeps everything it is given; used by tests and the JSON output mode.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
    issues: Vec<RecordedIssue>,
    summaries: Vec<IssueSummary>,
}

impl RecordingReporter {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues in the order reported.
    pub fn issues(&self) -> &[RecordedIssue] {
        &self.issues
    }

    /// Issues raised by one analyzer.
    pub fn issues_from<'a>(&'a self, analyzer: &'a str) -> impl Iterator<Item = &'a RecordedIssue> {
        self.issues.iter().filter(move |r| r.issue.analyzer == analyzer)
    }

    /// Summaries received.
    pub fn summaries(&self) -> &[IssueSummary] {
        &self.summaries
    }

    /// Drops recorded issues, keeping summaries.
    pub fn take_issues(&mut self) -> Vec<RecordedIssue> {
        std::mem::take(&mut self.issues)
    }
}

impl Reporter for RecordingReporter {
    fn report_issue(
        &mut self,
        sparql: &str,
        _query: &Query,
        _algebra: &Algebra,
        issue: &Issue,
    ) -> Result<(), ReportError> {
        let highlighted = highlight(sparql, &issue.highlight, false, Painter::Markers);
        self.issues.push(RecordedIssue {
            issue: issue.clone(),
            highlighted,
        });
        Ok(())
    }

    fn report_summary(&mut self, summary: &IssueSummary) -> Result<(), ReportError> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}
