//! Relational-algebra representation of parsed queries.
//!
//! Trees are immutable values with structural equality, so an analyzer can
//! remember "the node I flagged" by keeping a clone and comparing against it
//! during a later walk of the same tree.

use std::collections::BTreeSet;
use std::fmt;

use crate::query::expr::{AggregationMapping, Expression, WindowMapping};
use crate::query::term::{Node, PropertyPath, Term, TriplePattern};

/// Sorted set of variable names.
pub type VariableSet = BTreeSet<String>;

/// One ORDER BY key.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SortComparator {
    /// True for ascending order.
    pub ascending: bool,
    /// Sort key.
    pub expression: Expression,
}

impl fmt::Display for SortComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ascending {
            write!(f, "{}", self.expression)
        } else {
            write!(f, "DESC({})", self.expression)
        }
    }
}

/// Algebra operators.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Algebra {
    /// The empty group pattern: one solution with no bindings.
    JoinIdentity,
    /// Inline data (`VALUES`); `None` cells are `UNDEF`.
    Table {
        /// Column variables.
        variables: Vec<String>,
        /// Data rows.
        rows: Vec<Vec<Option<Term>>>,
    },
    /// Basic graph pattern.
    Bgp(Vec<TriplePattern>),
    /// Property-path pattern.
    Path {
        /// Path subject.
        subject: Node,
        /// Path expression.
        path: PropertyPath,
        /// Path object.
        object: Node,
    },
    /// Inner join.
    InnerJoin(Box<Algebra>, Box<Algebra>),
    /// OPTIONAL: left outer join with a join condition.
    LeftOuterJoin(Box<Algebra>, Box<Algebra>, Expression),
    /// MINUS.
    Minus(Box<Algebra>, Box<Algebra>),
    /// UNION.
    Union(Box<Algebra>, Box<Algebra>),
    /// FILTER / HAVING.
    Filter(Box<Algebra>, Expression),
    /// BIND or a projected expression: binds the variable to the expression's value.
    Extend(Box<Algebra>, Expression, String),
    /// Projection onto the listed variables.
    Project(Box<Algebra>, Vec<String>),
    /// DISTINCT.
    Distinct(Box<Algebra>),
    /// REDUCED.
    Reduced(Box<Algebra>),
    /// ORDER BY.
    Order(Box<Algebra>, Vec<SortComparator>),
    /// OFFSET / LIMIT.
    Slice {
        /// Input.
        input: Box<Algebra>,
        /// OFFSET value.
        offset: Option<u64>,
        /// LIMIT value.
        limit: Option<u64>,
    },
    /// GROUP BY with aggregate bindings.
    Aggregate {
        /// Input.
        input: Box<Algebra>,
        /// Grouping expressions.
        groups: Vec<Expression>,
        /// Aggregates computed per group.
        aggregations: Vec<AggregationMapping>,
    },
    /// Window function bindings.
    Window(Box<Algebra>, Vec<WindowMapping>),
    /// Nested SELECT.
    Subquery(Box<Query>),
    /// GRAPH.
    NamedGraph(Box<Algebra>, Node),
    /// SERVICE.
    Service {
        /// Remote endpoint.
        endpoint: Node,
        /// Pattern evaluated remotely.
        pattern: Box<Algebra>,
        /// SILENT flag.
        silent: bool,
    },
}

impl Algebra {
    /// Joins two patterns, eliding the join identity on either side.
    pub fn join(lhs: Algebra, rhs: Algebra) -> Algebra {
        match (lhs, rhs) {
            (Algebra::JoinIdentity, other) | (other, Algebra::JoinIdentity) => other,
            (lhs, rhs) => Algebra::InnerJoin(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Variables bound by evaluating this node.
    pub fn in_scope(&self) -> VariableSet {
        let mut out = VariableSet::new();
        self.collect_in_scope(&mut out);
        out
    }

    fn collect_in_scope(&self, out: &mut VariableSet) {
        match self {
            Algebra::JoinIdentity => {}
            Algebra::Table { variables, .. } => out.extend(variables.iter().cloned()),
            Algebra::Bgp(triples) => {
                for t in triples {
                    out.extend(t.variables().map(str::to_owned));
                }
            }
            Algebra::Path {
                subject, object, ..
            } => {
                for node in [subject, object] {
                    if let Some(name) = node.as_variable() {
                        out.insert(name.to_owned());
                    }
                }
            }
            Algebra::InnerJoin(lhs, rhs)
            | Algebra::LeftOuterJoin(lhs, rhs, _)
            | Algebra::Union(lhs, rhs) => {
                lhs.collect_in_scope(out);
                rhs.collect_in_scope(out);
            }
            Algebra::Minus(lhs, _) => lhs.collect_in_scope(out),
            Algebra::Filter(input, _)
            | Algebra::Distinct(input)
            | Algebra::Reduced(input)
            | Algebra::Order(input, _)
            | Algebra::Slice { input, .. }
            | Algebra::Service { pattern: input, .. } => input.collect_in_scope(out),
            Algebra::Extend(input, _, variable) => {
                input.collect_in_scope(out);
                out.insert(variable.clone());
            }
            Algebra::Project(_, variables) => out.extend(variables.iter().cloned()),
            Algebra::Aggregate {
                groups,
                aggregations,
                ..
            } => {
                for group in groups {
                    if let Expression::Node(Node::Variable(name)) = group {
                        out.insert(name.clone());
                    }
                }
                out.extend(aggregations.iter().map(|m| m.variable.clone()));
            }
            Algebra::Window(input, mappings) => {
                input.collect_in_scope(out);
                out.extend(mappings.iter().map(|m| m.variable.clone()));
            }
            Algebra::Subquery(query) => query.algebra.collect_in_scope(out),
            Algebra::NamedGraph(input, graph) => {
                input.collect_in_scope(out);
                if let Some(name) = graph.as_variable() {
                    out.insert(name.to_owned());
                }
            }
        }
    }

    /// Structural children, in evaluation order. Subquery bodies are not children.
    pub fn children(&self) -> Vec<&Algebra> {
        match self {
            Algebra::JoinIdentity
            | Algebra::Table { .. }
            | Algebra::Bgp(_)
            | Algebra::Path { .. }
            | Algebra::Subquery(_) => Vec::new(),
            Algebra::InnerJoin(lhs, rhs)
            | Algebra::LeftOuterJoin(lhs, rhs, _)
            | Algebra::Minus(lhs, rhs)
            | Algebra::Union(lhs, rhs) => vec![lhs.as_ref(), rhs.as_ref()],
            Algebra::Filter(input, _)
            | Algebra::Extend(input, _, _)
            | Algebra::Project(input, _)
            | Algebra::Distinct(input)
            | Algebra::Reduced(input)
            | Algebra::Order(input, _)
            | Algebra::Slice { input, .. }
            | Algebra::Aggregate { input, .. }
            | Algebra::Window(input, _)
            | Algebra::NamedGraph(input, _)
            | Algebra::Service { pattern: input, .. } => vec![input.as_ref()],
        }
    }

    /// Expressions attached directly to this node.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Algebra::LeftOuterJoin(_, _, expr)
            | Algebra::Filter(_, expr)
            | Algebra::Extend(_, expr, _) => vec![expr],
            Algebra::Order(_, comparators) => comparators.iter().map(|c| &c.expression).collect(),
            Algebra::Aggregate { groups, .. } => groups.iter().collect(),
            Algebra::Window(_, mappings) => mappings
                .iter()
                .flat_map(|m| {
                    m.application
                        .partition
                        .iter()
                        .chain(m.application.order.iter().map(|c| &c.expression))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the `Order` node that determines this pattern's output order,
    /// unless a `Slice` sits between it and the top of the pattern.
    pub fn ordering_without_slice(&self) -> Option<&Algebra> {
        match self {
            Algebra::Order(..) => Some(self),
            Algebra::Filter(input, _)
            | Algebra::Project(input, _)
            | Algebra::Extend(input, _, _)
            | Algebra::Distinct(input)
            | Algebra::Reduced(input) => input.ordering_without_slice(),
            Algebra::Subquery(query) => query.algebra.ordering_without_slice(),
            _ => None,
        }
    }

    /// Short operator name used in diagnostics.
    pub fn summary(&self) -> String {
        match self {
            Algebra::JoinIdentity => "join-identity".into(),
            Algebra::Table { variables, rows } => {
                format!("table({} vars, {} rows)", variables.len(), rows.len())
            }
            Algebra::Bgp(triples) => format!("bgp({} triples)", triples.len()),
            Algebra::Path {
                subject,
                path,
                object,
            } => format!("path({subject} {path} {object})"),
            Algebra::InnerJoin(..) => "join".into(),
            Algebra::LeftOuterJoin(..) => "leftjoin".into(),
            Algebra::Minus(..) => "minus".into(),
            Algebra::Union(..) => "union".into(),
            Algebra::Filter(_, expr) => format!("filter({expr})"),
            Algebra::Extend(_, expr, var) => format!("extend(?{var} = {expr})"),
            Algebra::Project(_, vars) => format!("project({})", join_vars(vars)),
            Algebra::Distinct(_) => "distinct".into(),
            Algebra::Reduced(_) => "reduced".into(),
            Algebra::Order(_, cmps) => {
                let keys: Vec<String> = cmps.iter().map(ToString::to_string).collect();
                format!("order({})", keys.join(", "))
            }
            Algebra::Slice { offset, limit, .. } => format!(
                "slice(offset={}, limit={})",
                offset.map_or_else(|| "-".to_string(), |v| v.to_string()),
                limit.map_or_else(|| "-".to_string(), |v| v.to_string())
            ),
            Algebra::Aggregate {
                groups,
                aggregations,
                ..
            } => {
                let groups: Vec<String> = groups.iter().map(ToString::to_string).collect();
                let aggs: Vec<String> = aggregations
                    .iter()
                    .map(|m| format!("?{} = {}", m.variable, m.aggregation))
                    .collect();
                format!("aggregate([{}], [{}])", groups.join(", "), aggs.join(", "))
            }
            Algebra::Window(_, mappings) => format!("window({} functions)", mappings.len()),
            Algebra::Subquery(_) => "subquery".into(),
            Algebra::NamedGraph(_, graph) => format!("graph({graph})"),
            Algebra::Service {
                endpoint, silent, ..
            } => {
                if *silent {
                    format!("service-silent({endpoint})")
                } else {
                    format!("service({endpoint})")
                }
            }
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        writeln!(f, "{indent}{}", self.summary())?;
        match self {
            Algebra::Bgp(triples) => {
                for t in triples {
                    writeln!(f, "{indent}  {t}")?;
                }
            }
            Algebra::Table { rows, .. } => {
                for row in rows {
                    let cells: Vec<String> = row
                        .iter()
                        .map(|c| c.as_ref().map_or_else(|| "UNDEF".into(), ToString::to_string))
                        .collect();
                    writeln!(f, "{indent}  ({})", cells.join(" "))?;
                }
            }
            Algebra::LeftOuterJoin(_, _, expr) if !expr.is_true() => {
                writeln!(f, "{indent}  on {expr}")?;
            }
            Algebra::Subquery(query) => query.algebra.fmt_tree(f, depth + 1)?,
            _ => {}
        }
        for child in self.children() {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

fn join_vars(vars: &[String]) -> String {
    vars.iter()
        .map(|v| format!("?{v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Algebra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Datasets named by FROM / FROM NAMED.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Dataset {
    /// FROM graphs.
    pub default_graphs: Vec<Term>,
    /// FROM NAMED graphs.
    pub named_graphs: Vec<Term>,
}

/// Query forms.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum QueryForm {
    /// SELECT; the projection lives in the algebra.
    Select,
    /// ASK.
    Ask,
    /// CONSTRUCT with its template.
    Construct(Vec<TriplePattern>),
    /// DESCRIBE with its targets (empty for `DESCRIBE *`).
    Describe(Vec<Node>),
}

/// A parsed query.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Query {
    /// Result form.
    pub form: QueryForm,
    /// Dataset clauses, when present.
    pub dataset: Option<Dataset>,
    /// Root of the algebra tree.
    pub algebra: Algebra,
}

impl Query {
    /// Builds a SELECT query over the given algebra.
    pub fn select(algebra: Algebra) -> Self {
        Self {
            form: QueryForm::Select,
            dataset: None,
            algebra,
        }
    }

    /// The ORDER BY that survives to this query's output without a LIMIT/OFFSET above it.
    pub fn ordering_without_slice(&self) -> Option<&Algebra> {
        self.algebra.ordering_without_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgp(s: &str, p: &str, o: &str) -> Algebra {
        Algebra::Bgp(vec![TriplePattern::new(
            Node::var(s),
            Node::Bound(Term::iri(p)),
            Node::var(o),
        )])
    }

    fn names(set: VariableSet) -> Vec<String> {
        set.into_iter().collect()
    }

    #[test]
    fn join_elides_identity() {
        let a = bgp("s", "p", "o");
        assert_eq!(Algebra::join(Algebra::JoinIdentity, a.clone()), a);
        assert_eq!(Algebra::join(a.clone(), Algebra::JoinIdentity), a);
    }

    #[test]
    fn in_scope_of_common_operators() {
        let a = bgp("s", "p", "o");
        let b = bgp("o", "q", "t");
        let opt = Algebra::LeftOuterJoin(Box::new(a.clone()), Box::new(b.clone()), Expression::true_value());
        assert_eq!(names(opt.in_scope()), vec!["o", "s", "t"]);

        let minus = Algebra::Minus(Box::new(a.clone()), Box::new(b));
        assert_eq!(names(minus.in_scope()), vec!["o", "s"]);

        let ext = Algebra::Extend(Box::new(a.clone()), Expression::var("s"), "x".into());
        assert_eq!(names(ext.in_scope()), vec!["o", "s", "x"]);

        let proj = Algebra::Project(Box::new(a), vec!["s".into()]);
        assert_eq!(names(proj.in_scope()), vec!["s"]);
    }

    #[test]
    fn ordering_is_shadowed_by_slice() {
        let order = Algebra::Order(
            Box::new(bgp("s", "p", "o")),
            vec![SortComparator {
                ascending: true,
                expression: Expression::var("s"),
            }],
        );
        let project = Algebra::Project(Box::new(order.clone()), vec!["s".into()]);
        assert_eq!(project.ordering_without_slice(), Some(&order));

        let sliced = Algebra::Slice {
            input: Box::new(project),
            offset: None,
            limit: Some(10),
        };
        assert_eq!(sliced.ordering_without_slice(), None);
    }

    #[test]
    fn display_renders_indented_tree() {
        let alg = Algebra::Distinct(Box::new(bgp("s", "http://example.org/p", "o")));
        let text = alg.to_string();
        assert!(text.starts_with("distinct\n  bgp(1 triples)\n"));
        assert!(text.contains("?s <http://example.org/p> ?o ."));
    }
}
