//! Batch-wide issue tally.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Issue counts per analyzer over one batch.
///
/// Owned by the batch driver: created when the batch starts, fed once per
/// query, and read when the batch ends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    /// Queries analyzed.
    pub queries: usize,
    /// Issues per analyzer name.
    pub counts: BTreeMap<String, usize>,
}

impl IssueSummary {
    /// Empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one analyzed query.
    pub fn add_query(&mut self) {
        self.queries += 1;
    }

    /// Adds `issues` to `analyzer`'s count. Zero counts leave no entry.
    pub fn add_issues(&mut self, analyzer: &str, issues: usize) {
        if issues > 0 {
            *self.counts.entry(analyzer.to_owned()).or_default() += issues;
        }
    }

    /// Issues over all analyzers.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Analyzers by descending issue count, ties by name.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut rows: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

impl fmt::Display for IssueSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total();
        writeln!(f, "{} total queries analyzed.", self.queries)?;
        writeln!(
            f,
            "{total} total issues found{}",
            if total > 0 { ":" } else { "." }
        )?;
        for (name, count) in self.ranked() {
            writeln!(f, "- {count:6} {name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_by_count() {
        let mut summary = IssueSummary::new();
        summary.add_query();
        summary.add_query();
        summary.add_issues("LangEquals", 1);
        summary.add_issues("UselessOptionalAnalyzer2", 3);
        summary.add_issues("SubqueryWithSort", 0);
        assert_eq!(
            summary.to_string(),
            "2 total queries analyzed.\n4 total issues found:\n-      3 UselessOptionalAnalyzer2\n-      1 LangEquals\n"
        );
    }

    #[test]
    fn clean_batch_ends_with_period() {
        let mut summary = IssueSummary::new();
        summary.add_query();
        assert_eq!(
            summary.to_string(),
            "1 total queries analyzed.\n0 total issues found.\n"
        );
    }
}
