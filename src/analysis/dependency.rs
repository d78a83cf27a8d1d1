//! Backward "how is this variable consumed" analysis.
//!
//! Starting at the root with every projected variable required in full, the
//! analysis pushes a [`DependencyMap`] down the tree. Each operator rewrites
//! the map for its children. At every OPTIONAL the map says whether any
//! consumer above can tell how many rows the OPTIONAL produced; when none can,
//! the OPTIONAL is reported to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::query::algebra::{Algebra, VariableSet};
use crate::query::expr::{AggregationMapping, Expression};

/// How much downstream consumers care about a variable's multiplicity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// Not read at all above this point.
    Unused,
    /// Only set membership matters (the consumer deduplicates).
    Distinct,
    /// Exact multiplicity matters.
    All,
}

impl Requirement {
    /// Least upper bound: `All` absorbs, `Unused` is the identity.
    pub fn merge(self, other: Requirement) -> Requirement {
        match (self, other) {
            (Requirement::All, _) | (_, Requirement::All) => Requirement::All,
            (Requirement::Unused, other) | (other, Requirement::Unused) => other,
            (Requirement::Distinct, Requirement::Distinct) => Requirement::Distinct,
        }
    }
}

/// Per-variable requirements, shared copy-on-write between call frames.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyMap {
    entries: Arc<BTreeMap<String, Requirement>>,
}

impl DependencyMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every listed variable required in full; the usual root map.
    pub fn all<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Arc::new(
                variables
                    .into_iter()
                    .map(|v| (v.into(), Requirement::All))
                    .collect(),
            ),
        }
    }

    /// Requirement recorded for `variable`, if any.
    pub fn get(&self, variable: &str) -> Option<Requirement> {
        self.entries.get(variable).copied()
    }

    /// Number of tracked variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no variable is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Requirement)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn updated(&self, update: impl FnOnce(&mut BTreeMap<String, Requirement>)) -> Self {
        let mut next = self.clone();
        update(Arc::make_mut(&mut next.entries));
        next
    }

    /// Keeps only the listed variables.
    pub fn project(&self, variables: &VariableSet) -> Self {
        if self.entries.keys().all(|k| variables.contains(k)) {
            return self.clone();
        }
        self.updated(|entries| entries.retain(|k, _| variables.contains(k)))
    }

    /// Removes the listed variables.
    pub fn without<'v>(&self, variables: impl IntoIterator<Item = &'v str>) -> Self {
        self.updated(|entries| {
            for variable in variables {
                entries.remove(variable);
            }
        })
    }

    /// Lowers every tracked variable to `Distinct`.
    pub fn all_distinct(&self) -> Self {
        self.updated(|entries| {
            for requirement in entries.values_mut() {
                *requirement = Requirement::Distinct;
            }
        })
    }

    /// Joins `requirement` into one variable.
    pub fn merging(&self, variable: &str, requirement: Requirement) -> Self {
        self.merging_all([variable], requirement)
    }

    /// Joins `requirement` into each listed variable.
    pub fn merging_all<'v>(
        &self,
        variables: impl IntoIterator<Item = &'v str>,
        requirement: Requirement,
    ) -> Self {
        self.updated(|entries| {
            for variable in variables {
                merge_into(entries, variable, requirement);
            }
        })
    }

    /// Fresh map for the input of a grouping operator.
    ///
    /// Group keys only need set membership. Variables read by an aggregate
    /// are first reset to `Unused` and then raised to whatever the aggregates
    /// reading them need, so a variable read only by a duplicate-insensitive
    /// aggregate ends at `Distinct`. `COUNT(*)` reads no variable.
    pub fn aggregating(
        groups: &[Expression],
        aggregations: &[AggregationMapping],
    ) -> Self {
        let mut entries = BTreeMap::new();
        for group in groups {
            for variable in group.mentioned_variables() {
                entries.insert(variable, Requirement::Distinct);
            }
        }
        let read: Vec<(VariableSet, Requirement)> = aggregations
            .iter()
            .map(|mapping| {
                let variables = mapping.aggregation.expression().mentioned_variables();
                let requirement = if mapping.aggregation.is_distinct() {
                    Requirement::Distinct
                } else {
                    Requirement::All
                };
                (variables, requirement)
            })
            .collect();
        for (mapping, (variables, _)) in aggregations.iter().zip(&read) {
            entries.remove(&mapping.variable);
            for variable in variables {
                entries.insert(variable.clone(), Requirement::Unused);
            }
        }
        for (variables, requirement) in &read {
            for variable in variables {
                merge_into(&mut entries, variable, *requirement);
            }
        }
        Self {
            entries: Arc::new(entries),
        }
    }
}

fn merge_into(entries: &mut BTreeMap<String, Requirement>, variable: &str, requirement: Requirement) {
    match entries.get_mut(variable) {
        Some(current) => *current = current.merge(requirement),
        None => {
            entries.insert(variable.to_owned(), requirement);
        }
    }
}

/// An OPTIONAL whose row multiplicity no consumer observes.
#[derive(Clone, Debug)]
pub struct OptionalSite<'a> {
    /// The `LeftOuterJoin` node.
    pub node: &'a Algebra,
    /// Required side.
    pub lhs: &'a Algebra,
    /// Optional side.
    pub rhs: &'a Algebra,
    /// Join condition.
    pub expression: &'a Expression,
    /// In-scope variables only needed up to set membership.
    pub distinct: VariableSet,
    /// In-scope variables nothing above reads.
    pub unprojected: VariableSet,
    /// Map in effect at the node.
    pub dependencies: DependencyMap,
}

/// Runs the analysis from `root` with the given starting map, calling
/// `on_optional` for every OPTIONAL whose multiplicity is unobservable.
///
/// Only the variables in scope at the OPTIONAL are classified. Whether the
/// required side could itself be deduplicated is not examined, so some
/// removable OPTIONALs go unreported.
///
/// Variables read by an OPTIONAL's join condition are raised to `All` on
/// both sides, even when nothing above the OPTIONAL reads them. This too
/// can only hide an OPTIONAL, never report a useful one.
pub fn analyze_dependencies<'a, E, F>(
    root: &'a Algebra,
    initial: DependencyMap,
    on_optional: &mut F,
) -> Result<(), E>
where
    F: FnMut(OptionalSite<'a>) -> Result<(), E>,
{
    propagate(root, initial, on_optional)
}

fn expression_variables(expression: &Expression) -> VariableSet {
    expression.mentioned_variables()
}

fn propagate<'a, E, F>(node: &'a Algebra, deps: DependencyMap, on_optional: &mut F) -> Result<(), E>
where
    F: FnMut(OptionalSite<'a>) -> Result<(), E>,
{
    match node {
        Algebra::JoinIdentity | Algebra::Table { .. } | Algebra::Bgp(_) | Algebra::Path { .. } => {
            Ok(())
        }
        Algebra::Distinct(input) | Algebra::Reduced(input) => {
            propagate(input, deps.all_distinct(), on_optional)
        }
        Algebra::Project(input, variables) => {
            let keep: VariableSet = variables.iter().cloned().collect();
            propagate(input, deps.project(&keep), on_optional)
        }
        Algebra::Minus(lhs, rhs) => {
            let lhs_scope = lhs.in_scope();
            let join: VariableSet = lhs_scope.intersection(&rhs.in_scope()).cloned().collect();
            propagate(lhs, deps.project(&lhs_scope), on_optional)?;
            let rhs_deps = deps
                .project(&join)
                .merging_all(join.iter().map(String::as_str), Requirement::Distinct)
                .all_distinct();
            propagate(rhs, rhs_deps, on_optional)
        }
        Algebra::Union(lhs, rhs) => {
            propagate(lhs, deps.project(&lhs.in_scope()), on_optional)?;
            propagate(rhs, deps.project(&rhs.in_scope()), on_optional)
        }
        Algebra::InnerJoin(lhs, rhs) => {
            let join = join_variables(lhs, rhs);
            let joined = deps.merging_all(join.iter().map(String::as_str), Requirement::All);
            propagate(lhs, joined.project(&lhs.in_scope()), on_optional)?;
            propagate(rhs, joined.project(&rhs.in_scope()), on_optional)
        }
        Algebra::LeftOuterJoin(lhs, rhs, expression) => {
            let scope = node.in_scope();
            let distinct: VariableSet = scope
                .iter()
                .filter(|v| deps.get(v) == Some(Requirement::Distinct))
                .cloned()
                .collect();
            let unprojected: VariableSet = scope
                .iter()
                .filter(|v| matches!(deps.get(v), None | Some(Requirement::Unused)))
                .cloned()
                .collect();
            if distinct.len() + unprojected.len() == scope.len() {
                debug!(
                    distinct = ?distinct,
                    unprojected = ?unprojected,
                    "optional multiplicity is unobservable"
                );
                on_optional(OptionalSite {
                    node,
                    lhs,
                    rhs,
                    expression,
                    distinct,
                    unprojected,
                    dependencies: deps.clone(),
                })?;
            }
            let join = join_variables(lhs, rhs);
            let condition = expression_variables(expression);
            let joined = deps
                .merging_all(join.iter().map(String::as_str), Requirement::All)
                .merging_all(condition.iter().map(String::as_str), Requirement::All);
            for side in [lhs, rhs] {
                let mut keep = side.in_scope();
                keep.extend(condition.iter().cloned());
                propagate(side, joined.project(&keep), on_optional)?;
            }
            Ok(())
        }
        Algebra::Extend(input, expression, variable) => {
            let variables = expression_variables(expression);
            let next = deps
                .without([variable.as_str()])
                .merging_all(variables.iter().map(String::as_str), Requirement::All);
            propagate(input, next, on_optional)
        }
        Algebra::Filter(input, expression) => {
            let variables = expression_variables(expression);
            let next = deps.merging_all(variables.iter().map(String::as_str), Requirement::All);
            propagate(input, next, on_optional)
        }
        Algebra::Order(input, _)
        | Algebra::Slice { input, .. }
        | Algebra::Window(input, _)
        | Algebra::Service { pattern: input, .. } => propagate(input, deps, on_optional),
        Algebra::NamedGraph(input, graph) => {
            let next = match graph.as_variable() {
                Some(variable) => deps.merging(variable, Requirement::All),
                None => deps,
            };
            propagate(input, next, on_optional)
        }
        Algebra::Aggregate {
            input,
            groups,
            aggregations,
        } => {
            let next = DependencyMap::aggregating(groups, aggregations);
            propagate(input, next, on_optional)
        }
        Algebra::Subquery(query) => propagate(&query.algebra, deps, on_optional),
    }
}

fn join_variables(lhs: &Algebra, rhs: &Algebra) -> VariableSet {
    lhs.in_scope()
        .intersection(&rhs.in_scope())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expr::Aggregation;
    use crate::query::parser::parse;

    const REQUIREMENTS: [Requirement; 3] = [
        Requirement::Unused,
        Requirement::Distinct,
        Requirement::All,
    ];

    fn set(vars: &[&str]) -> VariableSet {
        vars.iter().map(|v| v.to_string()).collect()
    }

    fn optional_sites(query: &str) -> Vec<(VariableSet, VariableSet)> {
        let parsed = parse(query).expect("parse");
        let root = &parsed.query.algebra;
        let mut sites = Vec::new();
        analyze_dependencies::<(), _>(root, DependencyMap::all(root.in_scope()), &mut |site| {
            sites.push((site.distinct, site.unprojected));
            Ok(())
        })
        .expect("analysis");
        sites
    }

    #[test]
    fn merge_table() {
        for a in REQUIREMENTS {
            assert_eq!(Requirement::All.merge(a), Requirement::All);
            assert_eq!(Requirement::Unused.merge(a), a);
            for b in REQUIREMENTS {
                assert_eq!(a.merge(b), b.merge(a));
            }
        }
        assert_eq!(
            Requirement::Distinct.merge(Requirement::Distinct),
            Requirement::Distinct
        );
    }

    #[test]
    fn operations_leave_the_original_untouched() {
        let base = DependencyMap::all(["a", "b"]);
        let lowered = base.all_distinct();
        let dropped = base.without(["a"]);
        assert_eq!(base.get("a"), Some(Requirement::All));
        assert_eq!(lowered.get("a"), Some(Requirement::Distinct));
        assert_eq!(dropped.get("a"), None);
        assert_eq!(dropped.get("b"), Some(Requirement::All));
    }

    #[test]
    fn projection_restricts_keys() {
        let base = DependencyMap::all(["a", "b", "c"]);
        let projected = base.project(&set(&["a", "c", "z"]));
        assert_eq!(projected.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn aggregating_demotes_then_repromotes() {
        let mapping = |aggregation, variable: &str| AggregationMapping {
            aggregation,
            variable: variable.into(),
        };
        let map = DependencyMap::aggregating(
            &[Expression::var("s")],
            &[
                mapping(Aggregation::Max(Expression::var("o"), false), ".agg1"),
                mapping(Aggregation::Sum(Expression::var("x"), false), ".agg2"),
            ],
        );
        assert_eq!(map.get("s"), Some(Requirement::Distinct));
        assert_eq!(map.get("o"), Some(Requirement::Distinct));
        assert_eq!(map.get("x"), Some(Requirement::All));
        assert_eq!(map.get("y"), None);
        assert_eq!(map.get(".agg1"), None);
    }

    #[test]
    fn count_star_reads_no_variable() {
        let map = DependencyMap::aggregating(
            &[Expression::var("s")],
            &[AggregationMapping {
                aggregation: Aggregation::CountAll { distinct: false },
                variable: ".agg1".into(),
            }],
        );
        assert_eq!(map.get("o"), None);
        assert_eq!(map.get("s"), Some(Requirement::Distinct));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn count_star_over_optional_is_reported() {
        let sites = optional_sites(
            "SELECT (COUNT(*) AS ?c) WHERE { ?s ?p ?o OPTIONAL { ?o a ?t } }",
        );
        assert_eq!(sites.len(), 1);
        assert!(sites[0].0.is_empty());
        assert_eq!(sites[0].1, set(&["o", "p", "s", "t"]));
    }

    #[test]
    fn grouped_optional_without_aggregate_is_reported() {
        let sites = optional_sites(
            "SELECT ?s WHERE { ?s ?p ?o OPTIONAL { ?o a ?type } } GROUP BY ?s",
        );
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].0, set(&["s"]));
        assert_eq!(sites[0].1, set(&["o", "p", "type"]));
    }

    #[test]
    fn aggregate_over_optional_variable_keeps_it() {
        let sites = optional_sites(
            "SELECT ?s (SUM(?type) AS ?t) WHERE { ?s ?p ?o OPTIONAL { ?o a ?type } } GROUP BY ?s",
        );
        assert!(sites.is_empty());
    }

    #[test]
    fn join_condition_variables_are_needed_in_full() {
        let sites = optional_sites(
            "SELECT DISTINCT ?s WHERE { ?s ?p ?o OPTIONAL { { ?x a ?t OPTIONAL { ?t ?q ?v } } FILTER(?v = 1) } }",
        );
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].0, set(&["s"]));
    }

    #[test]
    fn plain_projection_needs_every_row() {
        assert!(optional_sites("SELECT ?s WHERE { ?s ?p ?o OPTIONAL { ?o a ?type } }").is_empty());
        assert_eq!(
            optional_sites("SELECT DISTINCT ?s WHERE { ?s ?p ?o OPTIONAL { ?o a ?type } }").len(),
            1
        );
    }

    #[test]
    fn handler_error_aborts() {
        let parsed = parse("SELECT DISTINCT ?s WHERE { ?s ?p ?o OPTIONAL { ?o a ?t } OPTIONAL { ?o a ?u } }")
            .expect("parse");
        let root = &parsed.query.algebra;
        let mut calls = 0;
        let result = analyze_dependencies(root, DependencyMap::all(root.in_scope()), &mut |_| {
            calls += 1;
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 1);
    }
}
