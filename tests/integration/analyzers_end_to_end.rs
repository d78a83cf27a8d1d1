#![allow(missing_docs)]

use sparql_analysis::{
    analyzers::{
        Analyzer, LangEquality, MultiAnalyzer, SubquerySort, UnboundFilterVariable,
        UselessOptional, UselessOptionalDataflow,
    },
    query::parse,
    report::RecordingReporter,
};

fn issues(analyzer: &dyn Analyzer, sparql: &str) -> RecordingReporter {
    let parsed = parse(sparql).expect("query parses");
    let mut reporter = RecordingReporter::new();
    let found = analyzer
        .analyze(sparql, &parsed.query, &parsed.query.algebra, &mut reporter)
        .expect("analysis succeeds");
    assert_eq!(found, reporter.issues().len());
    reporter
}

fn assert_clean(analyzer: &dyn Analyzer, sparql: &str) {
    let reporter = issues(analyzer, sparql);
    assert!(
        reporter.issues().is_empty(),
        "{} flagged {sparql}: {:?}",
        analyzer.name(),
        reporter.issues()
    );
}

fn assert_flagged(analyzer: &dyn Analyzer, sparql: &str) {
    let reporter = issues(analyzer, sparql);
    assert!(
        reporter.issues_from(analyzer.name()).count() > 0,
        "{} missed {sparql}",
        analyzer.name()
    );
}

#[test]
fn subquery_sort_without_slice() {
    let unsorted = "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } } }";
    let limited = "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } LIMIT 10 } }";
    let sorted_limited =
        "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } ORDER BY ?s LIMIT 10 } }";
    let sorted = "SELECT * WHERE { ?s ?p ?o { SELECT * WHERE { ?s ?p 1 } ORDER BY ?s } }";
    let only_subquery = "SELECT * WHERE { { SELECT * WHERE { ?s ?p 1 } ORDER BY ?s } }";

    assert_clean(&SubquerySort, unsorted);
    assert_clean(&SubquerySort, limited);
    assert_clean(&SubquerySort, sorted_limited);
    assert_eq!(issues(&SubquerySort, sorted).issues().len(), 1);
    assert_flagged(&SubquerySort, only_subquery);
}

#[test]
fn filter_on_never_bound_variable() {
    let reporter = issues(
        &UnboundFilterVariable,
        "SELECT * WHERE { ?s ?p ?o FILTER(?x = 1) }",
    );
    assert_eq!(reporter.issues().len(), 1);
    assert!(reporter.issues()[0].issue.message.ends_with("?x"));
    assert_clean(
        &UnboundFilterVariable,
        "SELECT * WHERE { ?s ?p ?o FILTER(?o = 1) }",
    );
}

#[test]
fn having_on_never_bound_variable() {
    let reporter = issues(
        &UnboundFilterVariable,
        "SELECT ?s WHERE { ?s ?p ?o } GROUP BY ?s HAVING (?zzz > 1)",
    );
    assert_eq!(reporter.issues().len(), 1);
    assert!(reporter.issues()[0].issue.message.ends_with("?zzz"));
    assert_clean(
        &UnboundFilterVariable,
        "SELECT ?s WHERE { ?s ?p ?o } GROUP BY ?s HAVING (?s != <http://x/a>)",
    );
}

#[test]
fn count_star_does_not_need_optional_rows() {
    assert_eq!(
        issues(
            &UselessOptionalDataflow,
            "SELECT (COUNT(*) AS ?c) WHERE { ?s ?p ?o OPTIONAL { ?o a ?t } }",
        )
        .issues()
        .len(),
        1
    );
}

#[test]
fn optional_on_empty_pattern() {
    assert_flagged(&UselessOptional, "SELECT * WHERE { OPTIONAL { ?s ?p ?o } }");
    assert_clean(&UselessOptional, "SELECT * WHERE { ?s ?p ?o OPTIONAL { ?o ?q ?v } }");
}

#[test]
fn grouped_optional_with_and_without_sum() {
    let grouped = "SELECT ?s WHERE { ?s ?p ?o OPTIONAL { ?o a ?type } } GROUP BY ?s";
    let summed =
        "SELECT ?s (SUM(?type) AS ?t) WHERE { ?s ?p ?o OPTIONAL { ?o a ?type } } GROUP BY ?s";
    assert_eq!(issues(&UselessOptionalDataflow, grouped).issues().len(), 1);
    assert_clean(&UselessOptionalDataflow, summed);
}

#[test]
fn group_concat_keeps_optional_cardinality() {
    assert_clean(
        &UselessOptionalDataflow,
        r#"
        PREFIX ex: <http://example.org/>
        select ?s (GROUP_CONCAT(?o) AS ?o_concat) where {
            ?s ?p ?o .
            OPTIONAL {
                ?o a ?type
            }
        }
        GROUP BY ?s
        "#,
    );
}

#[test]
fn sum_next_to_distinct_group_concat_keeps_optional() {
    assert_clean(
        &UselessOptionalDataflow,
        r#"
        PREFIX ex: <http://example.org/>
        select ?s (GROUP_CONCAT(DISTINCT ?o) AS ?o_concat) (SUM(?o) AS ?o_sum) where {
            ?s ?p ?o .
            OPTIONAL {
                ?o a ?type
            }
        }
        GROUP BY ?s
        "#,
    );
}

#[test]
fn distinct_group_concat_makes_optional_useless() {
    assert_flagged(
        &UselessOptionalDataflow,
        r#"
        PREFIX ex: <http://example.org/>
        select ?s (GROUP_CONCAT(DISTINCT ?o) AS ?o_concat) where {
            ?s ?p ?o .
            OPTIONAL {
                ?o a ?type
            }
        }
        GROUP BY ?s
        "#,
    );
}

#[test]
fn grouping_key_only_projection_makes_optional_useless() {
    assert_flagged(
        &UselessOptionalDataflow,
        r#"
        PREFIX ex: <http://example.org/>
        select ?s where {
            {
                ?s ?p ?o .
                OPTIONAL {
                    ?o a ?type
                }
            }
        }
        GROUP BY ?s
        "#,
    );
    assert_flagged(
        &UselessOptionalDataflow,
        r#"
        PREFIX ex: <http://example.org/>
        select ?p where {
            {
                ?s ?p ?o .
                OPTIONAL {
                    ?o ex:type ex:German_novellist ;
                        ex:prop ?x
                }
            }
        }
        GROUP BY ?p ?o
        "#,
    );
}

#[test]
fn min_and_distinct_group_concat_are_cardinality_agnostic() {
    assert_flagged(
        &UselessOptionalDataflow,
        r#"
        PREFIX ex: <http://example.org/>
        select ?p (GROUP_CONCAT(DISTINCT ?o) AS ?o_concat) (MIN(?o) AS ?o_min) where {
            {
                ?s ?p ?o .
                OPTIONAL {
                    ?o ex:type ex:German_novellist ;
                        ex:prop ?x
                }
            }
        }
        GROUP BY ?p ?o
        "#,
    );
}

#[test]
fn lang_equality_only_for_equals() {
    assert_flagged(
        &LangEquality,
        r#"SELECT * WHERE { ?s ?p ?o FILTER(LANG(?o) = "en") }"#,
    );
    assert_clean(
        &LangEquality,
        r#"SELECT * WHERE { ?s ?p ?o FILTER(LANGMATCHES(LANG(?o), "en")) }"#,
    );
}

#[test]
fn multi_analyzer_counts_per_checker() {
    let sparql = "SELECT * WHERE { OPTIONAL { ?s ?p ?o } FILTER(?x) }";
    let parsed = parse(sparql).expect("parse");
    let mut reporter = RecordingReporter::new();
    let run = MultiAnalyzer::new().run(sparql, &parsed.query, &parsed.query.algebra, &mut reporter);
    assert!(run.is_clean());
    let count = |name: &str| {
        run.counts
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    };
    assert_eq!(count("UselessOptionalAnalyzer"), 1);
    assert_eq!(count("UnboundFilterVariable"), 1);
    assert_eq!(count("SubqueryWithSort"), 0);
    assert_eq!(run.issues, reporter.issues().len());
}
