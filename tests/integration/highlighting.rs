#![allow(missing_docs)]

use std::collections::BTreeSet;

use sparql_analysis::{
    analysis::WalkConfig,
    query::{parse, Algebra, PositionedToken, Token},
    report::{coalesce, highlight, render, resolve, singletons, HighlightSpec, Painter, Selection, TextRange},
};

fn token(index: usize, start: usize, end_inclusive: usize) -> PositionedToken {
    PositionedToken {
        token: Token::Variable(format!("v{index}")),
        start,
        end: end_inclusive + 1,
        index,
        line: 1,
        column: start as u32 + 1,
    }
}

#[test]
fn consecutive_tokens_form_one_range() {
    let tokens = vec![
        token(3, 6, 8),
        token(4, 10, 12),
        token(5, 13, 15),
        token(6, 16, 18),
        token(7, 20, 22),
        token(8, 24, 26),
        token(9, 28, 30),
    ];
    let indices: BTreeSet<usize> = [4, 5, 6, 9].into_iter().collect();
    assert_eq!(
        coalesce(&tokens, &indices),
        vec![
            TextRange { start: 10, end: 18 },
            TextRange { start: 28, end: 30 },
        ]
    );
    assert_eq!(singletons(&tokens, &indices).len(), 4);
}

fn first_optional(algebra: &Algebra) -> Algebra {
    algebra
        .nodes(WalkConfig::default())
        .into_iter()
        .find(|node| matches!(node, Algebra::LeftOuterJoin(..)))
        .expect("optional")
        .clone()
}

#[test]
fn node_selection_spans_the_whole_subtree() {
    let sparql = "SELECT * WHERE { ?s ?p ?o OPTIONAL { ?o ?q ?v } }";
    let parsed = parse(sparql).expect("parse");
    let optional = first_optional(&parsed.query.algebra);
    let spec = HighlightSpec::new("OPTIONAL", Selection::node(&optional));
    let resolved = resolve(sparql, &spec, false).expect("resolve");
    assert_eq!(resolved.ranges.len(), 1);
    let painted = render(&resolved.text, &resolved.ranges, Painter::Markers);
    assert!(painted.contains("[[?s ?p ?o OPTIONAL { ?o ?q ?v }]]"), "{painted}");
}

#[test]
fn difference_isolates_the_optional_clause() {
    let sparql = "SELECT * WHERE { ?s ?p ?o OPTIONAL { ?o ?q ?v } }";
    let parsed = parse(sparql).expect("parse");
    let optional = first_optional(&parsed.query.algebra);
    let Algebra::LeftOuterJoin(lhs, _, _) = &optional else {
        panic!("expected optional");
    };
    let spec = HighlightSpec::new("OPTIONAL", Selection::difference(&optional, lhs));
    assert_eq!(
        highlight(sparql, &spec, false, Painter::Markers),
        "SELECT * WHERE { ?s ?p ?o [[OPTIONAL]] [[{]] [[?o]] [[?q]] [[?v]] [[}]] }"
    );
}

#[test]
fn token_selection_marks_each_occurrence() {
    let spec = HighlightSpec::new(
        "variable",
        Selection::tokens(|t| matches!(t, Token::Variable(name) if name == "x")),
    );
    let painted = highlight(
        "SELECT ?x WHERE { ?s ?p ?x }",
        &spec,
        false,
        Painter::Markers,
    );
    assert_eq!(painted, "SELECT [[?x]] WHERE { ?s ?p [[?x]] }");
}

#[test]
fn unlexable_text_is_printed_unhighlighted() {
    let source = "SELECT * WHERE { ?s ?p \"unterminated }";
    let spec = HighlightSpec::new("all", Selection::tokens(|_| true));
    assert_eq!(highlight(source, &spec, false, Painter::Markers), source);
}

#[test]
fn plain_painter_leaves_text_alone() {
    let spec = HighlightSpec::new("all", Selection::tokens(|_| true));
    assert_eq!(
        highlight("ASK { ?s ?p ?o }", &spec, false, Painter::Plain),
        "ASK { ?s ?p ?o }"
    );
}
