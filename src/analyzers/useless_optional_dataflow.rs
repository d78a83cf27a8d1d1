use tracing::debug;

use crate::analysis::dependency::{analyze_dependencies, DependencyMap, OptionalSite};
use crate::analyzers::{Analyzer, AnalyzerError};
use crate::query::algebra::{Algebra, Query, VariableSet};
use crate::report::highlight::{HighlightSpec, Selection};
use crate::report::reporter::{Issue, Reporter};

/// Flags OPTIONAL patterns whose results nothing downstream can observe.
///
/// An OPTIONAL is reported when each variable in scope at it is either never
/// read above it or only read by consumers that deduplicate (DISTINCT,
/// grouping keys, MIN/MAX/SAMPLE, DISTINCT aggregates).
#[derive(Clone, Copy, Debug, Default)]
pub struct UselessOptionalDataflow;

impl UselessOptionalDataflow {
    /// Stable code of the issues raised.
    pub const CODE: &'static str = "useless-optional";
}

fn listed(variables: &VariableSet) -> String {
    variables
        .iter()
        .map(|v| format!("?{v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn site_message(site: &OptionalSite<'_>) -> String {
    if site.distinct.is_empty() {
        format!(
            "OPTIONAL is useless as all of the variables resulting from it ({}) are un-projected.",
            listed(&site.unprojected)
        )
    } else if site.unprojected.is_empty() {
        format!(
            "OPTIONAL is useless as all of the variables resulting from it ({}) are cardinality-agnostic.",
            listed(&site.distinct)
        )
    } else {
        format!(
            "OPTIONAL is useless as all of the variables resulting from it are either un-projected ({}) or are cardinality-agnostic ({}).",
            listed(&site.unprojected),
            listed(&site.distinct)
        )
    }
}

impl Analyzer for UselessOptionalDataflow {
    fn name(&self) -> &'static str {
        "UselessOptionalAnalyzer2"
    }

    fn description(&self) -> &'static str {
        "Finds OPTIONAL patterns which produce results which do not require the use of OPTIONAL."
    }

    fn analyze(
        &self,
        sparql: &str,
        query: &Query,
        algebra: &Algebra,
        reporter: &mut dyn Reporter,
    ) -> Result<usize, AnalyzerError> {
        let mut count = 0;
        let initial = DependencyMap::all(algebra.in_scope());
        analyze_dependencies(algebra, initial, &mut |site: OptionalSite<'_>| -> Result<(), AnalyzerError> {
            debug!(
                analyzer = self.name(),
                dependencies = ?site.dependencies,
                "reporting optional"
            );
            let issue = Issue::new(self.name(), Self::CODE, site_message(&site)).highlighting(
                HighlightSpec::new("OPTIONAL", Selection::difference(site.node, site.lhs)),
            );
            reporter.report_issue(sparql, query, algebra, &issue)?;
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }
}
