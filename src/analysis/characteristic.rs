//! Characteristic sets: the predicates used around each subject variable.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::walk::WalkConfig;
use crate::query::algebra::Algebra;
use crate::query::term::Node;

/// The bound predicates used by one subject variable within one basic graph pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CharacteristicSet {
    /// Subject variable name.
    pub subject: String,
    /// Occurrences per predicate, keyed by the predicate's SPARQL text.
    pub predicate_counts: BTreeMap<String, usize>,
    /// True when some predicate occurs more than once.
    pub has_multiple: bool,
}

impl CharacteristicSet {
    /// Predicates in sorted order.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.predicate_counts.keys().map(String::as_str)
    }
}

/// Extracts one set per subject variable per BGP, across the whole query.
///
/// Triples with a variable predicate are ignored; stars left with no
/// predicate are dropped.
pub fn characteristic_sets(algebra: &Algebra) -> Vec<CharacteristicSet> {
    let mut out = Vec::new();
    for node in algebra.nodes(WalkConfig::default()) {
        let Algebra::Bgp(triples) = node else {
            continue;
        };
        let mut stars: BTreeMap<&str, BTreeMap<String, usize>> = BTreeMap::new();
        for triple in triples {
            let (Node::Variable(subject), Node::Bound(predicate)) =
                (&triple.subject, &triple.predicate)
            else {
                continue;
            };
            *stars
                .entry(subject)
                .or_default()
                .entry(predicate.to_string())
                .or_default() += 1;
        }
        out.extend(stars.into_iter().map(|(subject, predicate_counts)| {
            let has_multiple = predicate_counts.values().any(|&n| n > 1);
            CharacteristicSet {
                subject: subject.to_owned(),
                predicate_counts,
                has_multiple,
            }
        }));
    }
    out
}

/// Running totals over a batch of queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StarTally {
    /// Queries examined.
    pub queries: usize,
    /// Stars seen.
    pub stars: usize,
    /// Stars repeating a predicate.
    pub multi_predicate_stars: usize,
}

impl StarTally {
    /// Folds one query's sets in; returns true when any star repeats a predicate.
    pub fn add(&mut self, sets: &[CharacteristicSet]) -> bool {
        self.queries += 1;
        self.stars += sets.len();
        let multi = sets.iter().filter(|s| s.has_multiple).count();
        self.multi_predicate_stars += multi;
        multi > 0
    }

    /// Share of stars repeating a predicate, in percent.
    pub fn multi_percentage(&self) -> f64 {
        if self.stars == 0 {
            0.0
        } else {
            100.0 * self.multi_predicate_stars as f64 / self.stars as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    fn sets(query: &str) -> Vec<CharacteristicSet> {
        characteristic_sets(&parse(query).expect("parse").query.algebra)
    }

    #[test]
    fn repeated_predicate_is_flagged() {
        let found = sets(
            "PREFIX : <http://example.org/> SELECT * WHERE { ?s :p1 ?a . ?s :p1 ?b . ?s :p2 ?c }",
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].has_multiple);
        assert_eq!(found[0].predicate_counts["<http://example.org/p1>"], 2);
        assert_eq!(found[0].predicates().count(), 2);
    }

    #[test]
    fn one_star_per_subject_and_variable_predicates_ignored() {
        let found = sets(
            "PREFIX : <http://example.org/> SELECT * WHERE { ?s :p ?a . ?a :q ?b . ?b ?any ?c }",
        );
        let subjects: Vec<_> = found.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["a", "s"]);
        assert!(found.iter().all(|s| !s.has_multiple));
    }

    #[test]
    fn subqueries_contribute_their_own_stars() {
        let found = sets(
            "SELECT * WHERE { ?s <http://x/p> ?o { SELECT ?s WHERE { ?s <http://x/q> ?v } } }",
        );
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn tally_percentages() {
        let mut tally = StarTally::default();
        let flagged = sets("SELECT * WHERE { ?s <http://x/p> ?a , ?b }");
        assert!(tally.add(&flagged));
        assert!(!tally.add(&sets("SELECT * WHERE { ?s <http://x/p> ?a }")));
        assert_eq!(tally.stars, 2);
        assert!((tally.multi_percentage() - 50.0).abs() < f64::EPSILON);
    }
}
