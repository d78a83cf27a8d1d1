#![forbid(unsafe_code)]

//! Batch processing behind the `sparql-analyze` binary.
//!
//! Queries come either one per line from a reader or as a single query given
//! on the command line. Each query is handled on its own: a query that fails
//! to parse is reported with its line number and the batch moves on.

/// Configuration file.
pub mod config;
/// Analyzer batch driver.
pub mod driver;
/// Path, characteristic-set and predicate reports.
pub mod reports;

use std::fmt::Display;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use clap::ValueEnum;
use percent_encoding::percent_decode_str;
use tracing::warn;

use crate::query::serialize::reformat;

pub use config::{AnalyzeConfig, ColorChoice, ConfigError};
pub use driver::BatchDriver;

/// Rendering of structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON.
    Json,
}

/// Decodes a form-encoded query: `+` becomes a space, then `%XX` escapes
/// are decoded. Invalid UTF-8 is replaced.
pub fn url_decode(text: &str) -> String {
    let spaced = text.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// One query of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchQuery {
    /// 1-based input line.
    pub line: usize,
    /// Query text.
    pub text: String,
}

/// The queries of one run, in input order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryBatch {
    queries: Vec<BatchQuery>,
}

impl QueryBatch {
    /// Reads one query per line. Empty lines and lines starting with `#`
    /// (after decoding) are skipped but still counted.
    pub fn from_lines<R: BufRead>(reader: R, decode: bool) -> io::Result<Self> {
        let mut queries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let text = if decode { url_decode(&line) } else { line };
            if text.trim().is_empty() || text.starts_with('#') {
                continue;
            }
            queries.push(BatchQuery {
                line: index + 1,
                text,
            });
        }
        Ok(Self { queries })
    }

    /// A batch holding one query.
    pub fn single(text: &str, decode: bool) -> Self {
        let text = if decode {
            url_decode(text)
        } else {
            text.to_owned()
        };
        Self {
            queries: vec![BatchQuery { line: 1, text }],
        }
    }

    /// Treats `argument` as a file path when such a file exists and as the
    /// query text otherwise.
    pub fn from_argument(argument: &str, decode: bool) -> io::Result<Self> {
        let path = Path::new(argument);
        if path.is_file() {
            let text = fs::read_to_string(path)?;
            Ok(Self::single(&text, decode))
        } else {
            Ok(Self::single(argument, decode))
        }
    }

    /// Queries in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, BatchQuery> {
        self.queries.iter()
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// True when there is nothing to process.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl<'a> IntoIterator for &'a QueryBatch {
    type Item = &'a BatchQuery;
    type IntoIter = std::slice::Iter<'a, BatchQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Prints the `ERROR:` / `FAILED:` pair for a query that could not be processed.
pub fn report_failure<W: Write>(
    out: &mut W,
    query: &BatchQuery,
    action: &str,
    error: &dyn Display,
) -> io::Result<()> {
    warn!(line = query.line, error = %error, "failed to {action}");
    writeln!(out, "ERROR:{}: Failed to {action}: {error}", query.line)?;
    let text = reformat(&query.text, false).unwrap_or_else(|_| query.text.clone());
    writeln!(out, "FAILED:{}: {text}", query.line)
}

/// `part/whole` in percent; zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decoding_handles_plus_and_escapes() {
        assert_eq!(
            url_decode("SELECT+*+WHERE+%7B+%3Fs+%3Fp+%3Fo+%7D"),
            "SELECT * WHERE { ?s ?p ?o }"
        );
        assert_eq!(url_decode("a%2Bb"), "a+b");
    }

    #[test]
    fn lines_keep_their_numbers() {
        let input = "ASK { ?s ?p ?o }\n\n# comment\nSELECT * WHERE { ?s ?p ?o }\n";
        let batch = QueryBatch::from_lines(Cursor::new(input), false).expect("read");
        let lines: Vec<usize> = batch.iter().map(|q| q.line).collect();
        assert_eq!(lines, vec![1, 4]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn decoded_comment_lines_are_skipped() {
        let batch = QueryBatch::from_lines(Cursor::new("%23+note\nASK+%7B%7D\n"), true)
            .expect("read");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.iter().next().map(|q| q.text.as_str()), Some("ASK {}"));
    }

    #[test]
    fn argument_may_name_a_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("q.rq");
        fs::write(&path, "ASK { ?s ?p ?o }").expect("write");
        let from_file =
            QueryBatch::from_argument(path.to_str().expect("utf8 path"), false).expect("read");
        assert_eq!(from_file, QueryBatch::single("ASK { ?s ?p ?o }", false));
        let inline = QueryBatch::from_argument("ASK {}", false).expect("read");
        assert_eq!(inline.iter().next().map(|q| q.text.as_str()), Some("ASK {}"));
    }

    #[test]
    fn failure_lines() {
        let mut out = Vec::new();
        let query = BatchQuery {
            line: 7,
            text: "SELECT  *  WHERE {".into(),
        };
        report_failure(&mut out, &query, "analyze query", &"boom").expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "ERROR:7: Failed to analyze query: boom\nFAILED:7: SELECT * WHERE {\n"
        );
    }
}
