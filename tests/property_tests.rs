#![allow(missing_docs)]

use proptest::prelude::*;
use sparql_analysis::analysis::{DependencyMap, Requirement, WalkConfig};
use sparql_analysis::query::{Algebra, Expression, Node, Query, Term, TriplePattern, VariableSet};

fn arb_requirement() -> impl Strategy<Value = Requirement> {
    prop_oneof![
        Just(Requirement::Unused),
        Just(Requirement::Distinct),
        Just(Requirement::All),
    ]
}

fn arb_map() -> impl Strategy<Value = DependencyMap> {
    prop::collection::vec(("[a-f]", arb_requirement()), 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .fold(DependencyMap::new(), |map, (variable, requirement)| {
                map.merging(&variable, requirement)
            })
    })
}

fn arb_bgp() -> impl Strategy<Value = Algebra> {
    ("[a-d]", "[a-d]").prop_map(|(s, o)| {
        Algebra::Bgp(vec![TriplePattern::new(
            Node::var(s),
            Node::Bound(Term::iri("http://example.org/p")),
            Node::var(o),
        )])
    })
}

fn arb_algebra() -> impl Strategy<Value = Algebra> {
    let leaf = prop_oneof![Just(Algebra::JoinIdentity), arb_bgp()];
    leaf.prop_recursive(5, 48, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Algebra::InnerJoin(Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| {
                Algebra::LeftOuterJoin(Box::new(l), Box::new(r), Expression::true_value())
            }),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Algebra::Union(Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Algebra::Minus(Box::new(l), Box::new(r))),
            (inner.clone(), "[a-d]")
                .prop_map(|(a, v)| Algebra::Filter(Box::new(a), Expression::var(v))),
            (inner.clone(), inner.clone()).prop_map(|(a, e)| Algebra::Filter(
                Box::new(a),
                Expression::Exists {
                    pattern: Box::new(e),
                    negated: false,
                }
            )),
            inner.clone().prop_map(|a| Algebra::Distinct(Box::new(a))),
            inner
                .clone()
                .prop_map(|a| Algebra::Subquery(Box::new(Query::select(a)))),
        ]
    })
}

fn size(node: &Algebra, config: WalkConfig) -> usize {
    let mut total = 1;
    for child in node.children() {
        total += size(child, config);
    }
    if config.descend_into_subqueries {
        if let Algebra::Subquery(query) = node {
            total += size(&query.algebra, config);
        }
    }
    if config.descend_into_expressions {
        if let Algebra::Filter(_, Expression::Exists { pattern, .. }) = node {
            total += size(pattern, config);
        }
    }
    total
}

fn configs() -> impl Strategy<Value = WalkConfig> {
    (any::<bool>(), any::<bool>()).prop_map(|(subqueries, expressions)| WalkConfig {
        descend_into_subqueries: subqueries,
        descend_into_expressions: expressions,
    })
}

proptest! {
    #[test]
    fn prop_merge_is_a_join(a in arb_requirement(), b in arb_requirement()) {
        prop_assert_eq!(a.merge(b), b.merge(a));
        prop_assert_eq!(a.merge(a), a);
        prop_assert_eq!(Requirement::All.merge(a), Requirement::All);
        prop_assert_eq!(Requirement::Unused.merge(a), a);
    }

    #[test]
    fn prop_project_is_idempotent(
        map in arb_map(),
        keep in prop::collection::btree_set("[a-f]", 0..6),
    ) {
        let keep: VariableSet = keep;
        let once = map.project(&keep);
        prop_assert_eq!(once.project(&keep), once.clone());
        prop_assert!(once.iter().all(|(v, _)| keep.contains(v)));
    }

    #[test]
    fn prop_walk_visits_each_node_once_parents_first(
        tree in arb_algebra(),
        config in configs(),
    ) {
        let nodes = tree.nodes(config);
        prop_assert_eq!(nodes.len(), size(&tree, config));
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                prop_assert!(!std::ptr::eq(*a, *b));
            }
        }
        for (i, parent) in nodes.iter().enumerate() {
            for child in parent.children() {
                let position = nodes.iter().position(|n| std::ptr::eq(*n, child));
                prop_assert!(matches!(position, Some(p) if p > i));
            }
        }
    }
}
