//! Issue sinks.

use std::io::{self, Write};

use nu_ansi_term::Color;
use thiserror::Error;

use crate::query::algebra::{Algebra, Query};
use crate::report::highlight::{highlight, HighlightSpec, Painter};
use crate::report::summary::IssueSummary;

/// A problem found by an analyzer.
#[derive(Clone, Debug)]
pub struct Issue {
    /// Name of the analyzer that raised it.
    pub analyzer: String,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Parts of the query to point at.
    pub highlight: HighlightSpec,
}

impl Issue {
    /// Builds an issue with no highlighting.
    pub fn new(analyzer: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            analyzer: analyzer.into(),
            code,
            message: message.into(),
            highlight: HighlightSpec::none(),
        }
    }

    /// Sets the highlighting.
    pub fn highlighting(mut self, highlight: HighlightSpec) -> Self {
        self.highlight = highlight;
        self
    }
}

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The output could not be written.
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
    /// The summary could not be encoded.
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::Io(_) => "Io",
            ReportError::Json(_) => "Json",
        }
    }
}

/// Receives issues as analyzers find them and the batch summary at the end.
pub trait Reporter {
    /// Records one issue found in `sparql`.
    fn report_issue(
        &mut self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        issue: &Issue,
    ) -> Result<(), ReportError>;

    /// Emits the end-of-batch table.
    fn report_summary(&mut self, summary: &IssueSummary) -> Result<(), ReportError>;
}

/// Summary rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryFormat {
    /// Plain text table.
    #[default]
    Text,
    /// One JSON object.
    Json,
}

/// Writes issues with highlighted queries to a stream.
pub struct ConsoleReporter<W: Write> {
    out: W,
    painter: Painter,
    pretty: bool,
    print_issues: bool,
    print_summary: bool,
    summary_format: SummaryFormat,
}

impl<W: Write> ConsoleReporter<W> {
    /// Reporter printing everything, pretty-printed.
    pub fn new(out: W, painter: Painter) -> Self {
        Self {
            out,
            painter,
            pretty: true,
            print_issues: true,
            print_summary: true,
            summary_format: SummaryFormat::Text,
        }
    }

    /// Chooses between indented and single-line query output.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Turns issue output on or off.
    pub fn print_issues(mut self, enabled: bool) -> Self {
        self.print_issues = enabled;
        self
    }

    /// Turns the summary on or off.
    pub fn print_summary(mut self, enabled: bool) -> Self {
        self.print_summary = enabled;
        self
    }

    /// Sets how the summary is rendered.
    pub fn summary_format(mut self, format: SummaryFormat) -> Self {
        self.summary_format = format;
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn label(&self) -> String {
        match self.painter {
            Painter::Ansi => Color::Red.paint("ISSUE").to_string(),
            Painter::Markers | Painter::Plain => "ISSUE".to_owned(),
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report_issue(
        &mut self,
        sparql: &str,
        _query: &Query,
        _algebra: &Algebra,
        issue: &Issue,
    ) -> Result<(), ReportError> {
        if !self.print_issues {
            return Ok(());
        }
        let label = self.label();
        writeln!(self.out, "{label}: {}: {}", issue.analyzer, issue.message)?;
        if !issue.highlight.is_empty() {
            let text = highlight(sparql, &issue.highlight, self.pretty, self.painter);
            writeln!(self.out, "{text}")?;
        }
        Ok(())
    }

    fn report_summary(&mut self, summary: &IssueSummary) -> Result<(), ReportError> {
        if !self.print_summary {
            return Ok(());
        }
        match self.summary_format {
            SummaryFormat::Text => write!(self.out, "{summary}")?,
            SummaryFormat::Json => {
                serde_json::to_writer_pretty(&mut self.out, summary)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::report::highlight::Selection;
    use crate::query::lexer::Token;

    fn output(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).expect("utf8")
    }

    #[test]
    fn issue_line_and_highlighted_query() {
        let sparql = "SELECT ?x WHERE { ?s ?p ?o FILTER(?x = 1) }";
        let parsed = parse(sparql).expect("parse");
        let issue = Issue::new("UnboundFilterVariable", "unbound-filter-var", "unbound ?x").highlighting(
            HighlightSpec::new(
                "?x",
                Selection::tokens(|t| matches!(t, Token::Variable(v) if v == "x")),
            ),
        );
        let mut reporter = ConsoleReporter::new(Vec::new(), Painter::Markers).pretty(false);
        reporter
            .report_issue(sparql, &parsed.query, &parsed.query.algebra, &issue)
            .expect("report");
        assert_eq!(
            output(reporter),
            "ISSUE: UnboundFilterVariable: unbound ?x\nSELECT [[?x]] WHERE { ?s ?p ?o FILTER ([[?x]] = 1) }\n"
        );
    }

    #[test]
    fn quiet_reporter_prints_nothing() {
        let sparql = "ASK { ?s ?p ?o }";
        let parsed = parse(sparql).expect("parse");
        let mut reporter = ConsoleReporter::new(Vec::new(), Painter::Plain)
            .print_issues(false)
            .print_summary(false);
        reporter
            .report_issue(sparql, &parsed.query, &parsed.query.algebra, &Issue::new("A", "a", "m"))
            .expect("report");
        reporter.report_summary(&IssueSummary::new()).expect("summary");
        assert!(output(reporter).is_empty());
    }

    #[test]
    fn json_summary() {
        let mut summary = IssueSummary::new();
        summary.add_query();
        summary.add_issues("LangEquals", 2);
        let mut reporter =
            ConsoleReporter::new(Vec::new(), Painter::Plain).summary_format(SummaryFormat::Json);
        reporter.report_summary(&summary).expect("summary");
        let value: serde_json::Value = serde_json::from_str(&output(reporter)).expect("json");
        assert_eq!(value["queries"], 1);
        assert_eq!(value["counts"]["LangEquals"], 2);
    }
}
