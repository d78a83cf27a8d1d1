use crate::analysis::walk::WalkConfig;
use crate::analyzers::{Analyzer, AnalyzerError};
use crate::query::algebra::{Algebra, Query};
use crate::report::highlight::{HighlightSpec, Selection};
use crate::report::reporter::{Issue, Reporter};

/// Flags OPTIONAL patterns with nothing on their required side.
///
/// `OPTIONAL` as the first element of a group joins against the empty
/// pattern, which always matches once, so the optional side behaves like a
/// plain pattern that may also produce the empty row.
#[derive(Clone, Copy, Debug, Default)]
pub struct UselessOptional;

impl UselessOptional {
    /// Stable code of the issues raised.
    pub const CODE: &'static str = "empty-optional-lhs";
}

impl Analyzer for UselessOptional {
    fn name(&self) -> &'static str {
        "UselessOptionalAnalyzer"
    }

    fn description(&self) -> &'static str {
        "Finds OPTIONAL patterns whose left-hand side is empty (making the OPTIONAL into just a non-OPTIONAL)."
    }

    fn analyze(
        &self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        reporter: &mut dyn Reporter,
    ) -> Result<usize, AnalyzerError> {
        let mut count = 0;
        algebra.walk(WalkConfig::subqueries_only(), &mut |node| -> Result<(), AnalyzerError> {
            if let Algebra::LeftOuterJoin(lhs, _, _) = node {
                if matches!(lhs.as_ref(), Algebra::JoinIdentity) {
                    let issue = Issue::new(
                        self.name(),
                        Self::CODE,
                        "OPTIONAL is useless as its left-hand-side argument is empty.",
                    )
                    .highlighting(HighlightSpec::new("OPTIONAL", Selection::node(node)));
                    reporter.report_issue(sparql, query, algebra, &issue)?;
                    count += 1;
                }
            }
            Ok(())
        })?;
        Ok(count)
    }
}
