use std::collections::BTreeSet;
use std::io::Write;

use serde::Serialize;

use crate::analysis::characteristic::{characteristic_sets, StarTally};
use crate::analysis::paths::{count_complex_elements, has_unbound_predicate, property_paths, PathRewriter};
use crate::cli::{percentage, report_failure, OutputFormat, QueryBatch};
use crate::error::Result;
use crate::query::errors::ParseErrorWithCode;
use crate::query::parser::{parse, ParsedQuery};
use crate::query::serialize::reformat;
use crate::query::term::PropertyPath;

/// Path counts over a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PathTally {
    /// Path patterns seen.
    pub paths: usize,
    /// Complex `+` / `*` elements over all paths.
    pub complex: usize,
}

/// Queries with a variable predicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PredicateTally {
    /// Queries with at least one variable predicate.
    pub matches: usize,
    /// Queries examined.
    pub queries: usize,
}

fn parsed_queries<'b, W: Write>(
    batch: &'b QueryBatch,
    action: &'b str,
    out: &'b mut W,
) -> impl Iterator<Item = Result<(&'b str, ParsedQuery)>> + 'b {
    batch.iter().filter_map(move |query| match parse(&query.text) {
        Ok(parsed) => Some(Ok((query.text.as_str(), parsed))),
        Err(err) => match report_failure(out, query, action, &ParseErrorWithCode(&err)) {
            Ok(()) => None,
            Err(io) => Some(Err(io.into())),
        },
    })
}

fn display_path(path: &PropertyPath, rewrite: bool) -> String {
    let path = if rewrite {
        PathRewriter::new().rewrite(path)
    } else {
        path.clone()
    };
    format!("?s {path} ?o")
}

/// Prints `PATH: ...` for every property path; returns how many there were.
pub fn list_paths<W: Write>(batch: &QueryBatch, rewrite: bool, out: &mut W) -> Result<usize> {
    let mut lines = Vec::new();
    for item in parsed_queries(batch, "extract paths from query", out) {
        let (_, parsed) = item?;
        for pattern in property_paths(&parsed.query.algebra) {
            lines.push(format!("PATH: {}", display_path(pattern.path, rewrite)));
        }
    }
    for line in &lines {
        writeln!(out, "{line}")?;
    }
    Ok(lines.len())
}

/// Prints paths with complex closures and the batch totals.
pub fn complex_paths<W: Write>(
    batch: &QueryBatch,
    rewrite: bool,
    format: OutputFormat,
    out: &mut W,
) -> Result<PathTally> {
    let mut tally = PathTally::default();
    let mut lines = Vec::new();
    for item in parsed_queries(batch, "extract paths from query", out) {
        let (_, parsed) = item?;
        for pattern in property_paths(&parsed.query.algebra) {
            let complex = count_complex_elements(pattern.path);
            tally.paths += 1;
            tally.complex += complex;
            if complex > 0 {
                lines.push(format!("COMPLEX PATH: {}", display_path(pattern.path, rewrite)));
            }
        }
    }
    match format {
        OutputFormat::Text => {
            for line in &lines {
                writeln!(out, "{line}")?;
            }
            writeln!(
                out,
                "{} complex plus/star paths in {} total path patterns",
                tally.complex, tally.paths
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &tally)?;
            writeln!(out)?;
        }
    }
    Ok(tally)
}

/// Prints every distinct predicate set used by a star in the batch.
pub fn characteristic_set_report<W: Write>(
    batch: &QueryBatch,
    format: OutputFormat,
    out: &mut W,
) -> Result<BTreeSet<Vec<String>>> {
    let mut seen = BTreeSet::new();
    for item in parsed_queries(batch, "process query", out) {
        let (_, parsed) = item?;
        for set in characteristic_sets(&parsed.query.algebra) {
            seen.insert(set.predicates().map(str::to_owned).collect::<Vec<_>>());
        }
    }
    match format {
        OutputFormat::Text => {
            for predicates in &seen {
                writeln!(out, "[{}]", predicates.join(", "))?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &seen)?;
            writeln!(out)?;
        }
    }
    Ok(seen)
}

/// Prints queries whose stars repeat a predicate and the batch share.
pub fn multi_predicates<W: Write>(
    batch: &QueryBatch,
    format: OutputFormat,
    out: &mut W,
) -> Result<StarTally> {
    let mut tally = StarTally::default();
    let mut flagged = Vec::new();
    for item in parsed_queries(batch, "process query", out) {
        let (text, parsed) = item?;
        if tally.add(&characteristic_sets(&parsed.query.algebra)) {
            flagged.push(text.to_owned());
        }
    }
    match format {
        OutputFormat::Text => {
            for text in &flagged {
                writeln!(out, "Uses multiple predicates:")?;
                writeln!(out, "{text}")?;
            }
            writeln!(
                out,
                "{}/{} ({:.1}%) stars used a predicate more than once",
                tally.multi_predicate_stars,
                tally.stars,
                tally.multi_percentage()
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &tally)?;
            writeln!(out)?;
        }
    }
    Ok(tally)
}

/// Prints queries with a variable predicate and the batch share.
pub fn unbound_predicates<W: Write>(
    batch: &QueryBatch,
    format: OutputFormat,
    out: &mut W,
) -> Result<PredicateTally> {
    let mut tally = PredicateTally::default();
    let mut flagged = Vec::new();
    for item in parsed_queries(batch, "process query", out) {
        let (text, parsed) = item?;
        tally.queries += 1;
        if has_unbound_predicate(&parsed.query.algebra) {
            tally.matches += 1;
            flagged.push(reformat(text, true).unwrap_or_else(|_| text.to_owned()));
        }
    }
    match format {
        OutputFormat::Text => {
            for text in &flagged {
                writeln!(out, "{text}")?;
            }
            writeln!(
                out,
                "{}/{} ({:.1}%) queries have an unbound predicate",
                tally.matches,
                tally.queries,
                percentage(tally.matches, tally.queries)
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &tally)?;
            writeln!(out)?;
        }
    }
    Ok(tally)
}
