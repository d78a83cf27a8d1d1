use std::sync::Arc;

use crate::analysis::walk::WalkConfig;
use crate::analyzers::{Analyzer, AnalyzerError};
use crate::query::algebra::{Algebra, Query, VariableSet};
use crate::query::lexer::Token;
use crate::report::highlight::{HighlightSpec, Selection};
use crate::report::reporter::{Issue, Reporter};

/// Flags filter conditions that read variables no pattern below them binds.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnboundFilterVariable;

impl UnboundFilterVariable {
    /// Stable code of the issues raised.
    pub const CODE: &'static str = "unbound-filter-var";
}

fn unbound_message(unbound: &VariableSet) -> String {
    let names: Vec<String> = unbound.iter().map(|v| format!("?{v}")).collect();
    if names.len() == 1 {
        format!("Variable will be unbound in FILTER evaluation: {}", names[0])
    } else {
        format!(
            "Variables will be unbound in FILTER evaluation: {}",
            names.join(", ")
        )
    }
}

impl Analyzer for UnboundFilterVariable {
    fn name(&self) -> &'static str {
        "UnboundFilterVariable"
    }

    fn description(&self) -> &'static str {
        "Finds filter expressions which use variables not in-scope."
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
            let (expression, scope) = match node {
                Algebra::Filter(input, expression) => (expression, input.in_scope()),
                Algebra::LeftOuterJoin(lhs, rhs, expression) if !expression.is_true() => {
                    let mut scope = lhs.in_scope();
                    scope.extend(rhs.in_scope());
                    (expression, scope)
                }
                _ => return Ok(()),
            };
            let unbound: VariableSet = expression
                .variables()
                .difference(&scope)
                .cloned()
                .collect();
            if unbound.is_empty() {
                return Ok(());
            }
            let message = unbound_message(&unbound);
            let names = Arc::new(unbound);
            let highlight = HighlightSpec::new(
                "unbound",
                Selection::tokens(move |token| {
                    matches!(token, Token::Variable(name) if names.contains(name))
                }),
            );
            let issue = Issue::new(self.name(), Self::CODE, message).highlighting(highlight);
            reporter.report_issue(sparql, query, algebra, &issue)?;
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }
}
