use crate::analysis::walk::WalkConfig;
use crate::analyzers::{Analyzer, AnalyzerError};
use crate::query::algebra::{Algebra, Query};
use crate::report::highlight::{HighlightSpec, Selection};
use crate::report::reporter::{Issue, Reporter};

/// Flags `LANG(..) = ..` comparisons, which miss region subtags that
/// `LANGMATCHES` would accept.
#[derive(Clone, Copy, Debug, Default)]
pub struct LangEquality;

impl LangEquality {
    /// Stable code of the issues raised.
    pub const CODE: &'static str = "lang-equality";
}

impl Analyzer for LangEquality {
    fn name(&self) -> &'static str {
        "LangEquals"
    }

    fn description(&self) -> &'static str {
        "Finds equality tests for literal language values (instead of using LANGMATCHES)."
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
            let (input, expression) = match node {
                Algebra::Filter(input, expression)
                | Algebra::Extend(input, expression, _)
                | Algebra::LeftOuterJoin(input, _, expression) => (input, expression),
                _ => return Ok(()),
            };
            if !expression.has_lang_equality_test() {
                return Ok(());
            }
            let issue = Issue::new(
                self.name(),
                Self::CODE,
                "found expr with equality test on LANG value",
            )
            .highlighting(HighlightSpec::new(
                "LANG",
                Selection::difference(node, input),
            ));
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
        let found = LangEquality
            .analyze(sparql, &parsed.query, &parsed.query.algebra, &mut reporter)
            .expect("analyze");
        assert_eq!(found, reporter.issues().len());
        reporter
    }

    fn count(sparql: &str) -> usize {
        run(sparql).issues().len()
    }

    #[test]
    fn equality_on_lang_is_flagged() {
        assert_eq!(count("SELECT * WHERE { ?s ?p ?o FILTER(LANG(?o) = \"en\") }"), 1);
        assert_eq!(count("SELECT * WHERE { ?s ?p ?o FILTER(\"en\" = lang(?o)) }"), 1);
        assert_eq!(
            count("SELECT * WHERE { ?s ?p ?o BIND(LANG(?o) = \"de\" AS ?german) }"),
            1
        );
    }

    #[test]
    fn other_comparisons_are_fine() {
        assert_eq!(
            count("SELECT * WHERE { ?s ?p ?o FILTER(LANGMATCHES(LANG(?o), \"en\")) }"),
            0
        );
        assert_eq!(count("SELECT * WHERE { ?s ?p ?o FILTER(LANG(?o) != \"en\") }"), 0);
        assert_eq!(count("SELECT * WHERE { ?s ?p ?o FILTER(?o = \"en\") }"), 0);
    }

    #[test]
    fn filter_highlight_excludes_the_pattern() {
        let reporter = run("SELECT * WHERE { ?s ?p ?o FILTER(LANG(?o) = \"en\") }");
        let highlighted = &reporter.issues()[0].highlighted;
        assert!(
            highlighted.starts_with("SELECT * WHERE { ?s ?p ?o [[FILTER]]"),
            "{highlighted}"
        );
        assert!(highlighted.contains("[[\"en\"]]"), "{highlighted}");
    }
}
