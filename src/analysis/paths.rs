//! Property-path and predicate utilities.

use rustc_hash::FxHashMap;

use crate::analysis::walk::WalkConfig;
use crate::query::algebra::Algebra;
use crate::query::term::{Node, PropertyPath, Term};

/// A property-path pattern found in a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathPattern<'a> {
    /// Path subject.
    pub subject: &'a Node,
    /// The path.
    pub path: &'a PropertyPath,
    /// Path object.
    pub object: &'a Node,
}

/// Every `Path` node in the query, including subqueries and `EXISTS` patterns.
pub fn property_paths(algebra: &Algebra) -> Vec<PathPattern<'_>> {
    algebra
        .nodes(WalkConfig::default())
        .into_iter()
        .filter_map(|node| match node {
            Algebra::Path {
                subject,
                path,
                object,
            } => Some(PathPattern {
                subject,
                path,
                object,
            }),
            _ => None,
        })
        .collect()
}

/// Counts `+` / `*` closures applied to anything other than a single predicate.
pub fn count_complex_elements(path: &PropertyPath) -> usize {
    match path {
        PropertyPath::Link(_) | PropertyPath::NegatedSet(_) => 0,
        PropertyPath::OneOrMore(inner) | PropertyPath::ZeroOrMore(inner) => match inner.as_ref() {
            PropertyPath::Link(_) => 0,
            other => 1 + count_complex_elements(other),
        },
        PropertyPath::Inverse(inner) | PropertyPath::ZeroOrOne(inner) => {
            count_complex_elements(inner)
        }
        PropertyPath::Sequence(lhs, rhs) | PropertyPath::Alternative(lhs, rhs) => {
            count_complex_elements(lhs) + count_complex_elements(rhs)
        }
    }
}

/// True when some triple pattern has a variable in predicate position.
pub fn has_unbound_predicate(algebra: &Algebra) -> bool {
    algebra
        .nodes(WalkConfig::default())
        .into_iter()
        .any(|node| match node {
            Algebra::Bgp(triples) => triples
                .iter()
                .any(|t| matches!(t.predicate, Node::Variable(_))),
            _ => false,
        })
}

/// Rewrites paths into a canonical shape so structurally identical paths
/// over different predicates compare equal.
///
/// IRIs become `iri1`, `iri2`, ... in first-seen order (shared across every
/// path given to the same rewriter) and the operands of `|` are sorted.
#[derive(Debug, Default)]
pub struct PathRewriter {
    names: FxHashMap<String, String>,
}

impl PathRewriter {
    /// Creates a rewriter with no IRIs seen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical form of `path`.
    pub fn rewrite(&mut self, path: &PropertyPath) -> PropertyPath {
        match path {
            PropertyPath::Link(term) => PropertyPath::Link(self.rename(term)),
            PropertyPath::Inverse(inner) => PropertyPath::Inverse(Box::new(self.rewrite(inner))),
            PropertyPath::Sequence(lhs, rhs) => {
                let lhs = self.rewrite(lhs);
                let rhs = self.rewrite(rhs);
                PropertyPath::Sequence(Box::new(lhs), Box::new(rhs))
            }
            PropertyPath::Alternative(lhs, rhs) => {
                let lhs = self.rewrite(lhs);
                let rhs = self.rewrite(rhs);
                let (first, second) = if rhs.to_string() < lhs.to_string() {
                    (rhs, lhs)
                } else {
                    (lhs, rhs)
                };
                PropertyPath::Alternative(Box::new(first), Box::new(second))
            }
            PropertyPath::NegatedSet(terms) => {
                let mut renamed: Vec<Term> = terms.iter().map(|t| self.rename(t)).collect();
                renamed.sort_by_key(ToString::to_string);
                PropertyPath::NegatedSet(renamed)
            }
            PropertyPath::ZeroOrMore(inner) => {
                PropertyPath::ZeroOrMore(Box::new(self.rewrite(inner)))
            }
            PropertyPath::OneOrMore(inner) => PropertyPath::OneOrMore(Box::new(self.rewrite(inner))),
            PropertyPath::ZeroOrOne(inner) => PropertyPath::ZeroOrOne(Box::new(self.rewrite(inner))),
        }
    }

    fn rename(&mut self, term: &Term) -> Term {
        let Term::Iri { value } = term else {
            return term.clone();
        };
        let next = self.names.len() + 1;
        let name = self
            .names
            .entry(value.clone())
            .or_insert_with(|| format!("iri{next}"));
        Term::iri(name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    fn first_path(query: &str) -> PropertyPath {
        let parsed = parse(query).expect("parse");
        let paths = property_paths(&parsed.query.algebra);
        paths.first().map(|p| p.path.clone()).expect("a path")
    }

    const PREFIX: &str = "PREFIX : <http://example.org/> ";

    #[test]
    fn complex_counts() {
        let cases = [
            (":p+", 0),
            (":p*/:q", 0),
            ("(:p/:q)+", 1),
            ("^(:p|:q)*", 1),
            ("((:p/:q)+/:r)*", 2),
            ("!(:p|:q)", 0),
            ("(:p?)+", 1),
        ];
        for (path, expected) in cases {
            let query = format!("{PREFIX}SELECT * WHERE {{ ?s {path} ?o }}");
            assert_eq!(count_complex_elements(&first_path(&query)), expected, "{path}");
        }
    }

    #[test]
    fn rewriter_canonicalizes_iris_and_alternatives() {
        let mut rewriter = PathRewriter::new();
        let a = rewriter.rewrite(&first_path(&format!("{PREFIX}ASK {{ ?s (:b|:a)/:b ?o }}")));
        assert_eq!(a.to_string(), "(<iri1>|<iri2>)/<iri1>");
        let mut rewriter = PathRewriter::new();
        let b = rewriter.rewrite(&first_path(&format!("{PREFIX}ASK {{ ?s (:x|:y)/:x ?o }}")));
        assert_eq!(a, b);
        assert!(matches!(a, PropertyPath::Sequence(ref lhs, _) if matches!(**lhs, PropertyPath::Alternative(..))));
    }

    #[test]
    fn unbound_predicates() {
        let yes = parse("SELECT * WHERE { ?s ?p ?o }").expect("parse");
        let no = parse("SELECT * WHERE { ?s <http://x/p> ?o }").expect("parse");
        assert!(has_unbound_predicate(&yes.query.algebra));
        assert!(!has_unbound_predicate(&no.query.algebra));
    }
}
