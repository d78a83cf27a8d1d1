use tracing::debug;

use crate::analysis::walk::WalkConfig;
use crate::analyzers::{Analyzer, AnalyzerError};
use crate::query::algebra::{Algebra, Query};
use crate::report::highlight::{HighlightSpec, Selection};
use crate::report::reporter::{Issue, Reporter};

/// Flags subqueries sorted with no LIMIT/OFFSET to make the order matter.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubquerySort;

impl SubquerySort {
    /// Stable code of the issues raised.
    pub const CODE: &'static str = "useless-sort";
}

impl Analyzer for SubquerySort {
    fn name(&self) -> &'static str {
        "SubqueryWithSort"
    }

    fn description(&self) -> &'static str {
        "Finds subqueries that have useless sorting applied."
    }

    fn analyze(
        &self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        reporter: &mut dyn Reporter,
    ) -> Result<usize, AnalyzerError> {
        let mut count = 0;
        algebra.walk(WalkConfig::default(), &mut |node| -> Result<(), AnalyzerError> {
            let Algebra::Subquery(subquery) = node else {
                return Ok(());
            };
            let Some(order) = subquery.ordering_without_slice() else {
                return Ok(());
            };
            let highlight = match order {
                Algebra::Order(input, _) => {
                    HighlightSpec::new("ORDER BY", Selection::difference(order, input))
                }
                _ => HighlightSpec::none(),
            };
            debug!(analyzer = self.name(), "subquery sorted without slice");
            let issue = Issue::new(self.name(), Self::CODE, "found subquery with useless sorting")
                .highlighting(highlight);
            reporter.report_issue(sparql, query, algebra, &issue)?;
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::report::recording::RecordingReporter;

    fn run(sparql: &str) -> RecordingReporter {
        let parsed = parse(sparql).expect("parse");
        let mut reporter = RecordingReporter::new();
        let found = SubquerySort
            .analyze(sparql, &parsed.query, &parsed.query.algebra, &mut reporter)
            .expect("analyze");
        assert_eq!(found, reporter.issues().len());
        reporter
    }

    #[test]
    fn sorted_subquery_is_flagged() {
        let reporter =
            run("SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } ORDER BY ?s } }");
        assert_eq!(reporter.issues().len(), 1);
        assert_eq!(
            reporter.issues()[0].highlighted,
            "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } [[ORDER]] [[BY]] [[?s]] } }"
        );
    }

    #[test]
    fn limit_or_no_order_is_fine() {
        for sparql in [
            "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } } }",
            "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } LIMIT 10 } }",
            "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } ORDER BY ?s LIMIT 10 } }",
            "SELECT * WHERE { ?s ?p ?o } ORDER BY ?s",
        ] {
            assert!(run(sparql).issues().is_empty(), "{sparql}");
        }
    }

    #[test]
    fn ordering_is_seen_through_nested_subqueries() {
        let reporter = run(
            "SELECT * WHERE { { SELECT * WHERE { { SELECT ?s WHERE { ?s ?p ?o } ORDER BY DESC(?o) } } } }",
        );
        assert_eq!(reporter.issues().len(), 2);
    }
}
