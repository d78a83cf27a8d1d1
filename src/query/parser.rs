//! Recursive-descent SPARQL 1.1 parser.
//!
//! The parser translates surface syntax straight into [`Algebra`] and records,
//! for every node it builds, the token ranges the node came from. Aggregates
//! and window functions are lowered to hidden `.aggN` / `.windowN` variables
//! bound by the `Aggregate` / `Window` node and exposed to the projection
//! through `Extend`.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::query::algebra::{Algebra, Dataset, Query, QueryForm, SortComparator};
use crate::query::errors::ParseError;
use crate::query::expr::{
    Aggregation, AggregationMapping, BinaryOp, Expression, Function, UnaryOp, WindowApplication,
    WindowFunction, WindowMapping,
};
use crate::query::lexer::{Lexer, PositionedToken, Token};
use crate::query::provenance::{Provenance, TokenRange};
use crate::query::term::{Node, PropertyPath, Term, TriplePattern, RDF_FIRST, RDF_NIL, RDF_REST, RDF_TYPE};

const AGGREGATES: [&str; 7] = ["COUNT", "SUM", "AVG", "MIN", "MAX", "SAMPLE", "GROUP_CONCAT"];
const RANKING: [&str; 3] = ["ROW_NUMBER", "RANK", "DENSE_RANK"];
/// Keywords that may be followed by `(` without starting a function call.
const CLAUSE_KEYWORDS: [&str; 10] = [
    "HAVING", "ORDER", "GROUP", "LIMIT", "OFFSET", "VALUES", "ASC", "DESC", "WHERE", "BIND",
];

/// A parsed query with the provenance of its algebra nodes.
#[derive(Clone, Debug)]
pub struct ParsedQuery {
    /// The query.
    pub query: Query,
    /// Token ranges per algebra node.
    pub provenance: Provenance,
}

/// Parses a complete query.
pub fn parse(text: &str) -> Result<ParsedQuery, ParseError> {
    Parser::new(text)?.parse_query()
}

#[derive(Default)]
struct AggregateScope {
    aggregations: Vec<AggregationMapping>,
    windows: Vec<WindowMapping>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SelectModifier {
    Distinct,
    Reduced,
}

enum Projection {
    Variable(String),
    Bound {
        expression: Expression,
        variable: String,
        span: TokenRange,
    },
}

struct SelectClause {
    span: TokenRange,
    modifier: Option<(SelectModifier, usize)>,
    /// `None` for `SELECT *`.
    projection: Option<Vec<Projection>>,
}

struct GroupCondition {
    expression: Expression,
    alias: Option<String>,
    span: TokenRange,
}

#[derive(Default)]
struct Modifiers {
    group: Option<(Vec<GroupCondition>, TokenRange)>,
    having: Option<(Vec<Expression>, TokenRange)>,
    order: Option<(Vec<SortComparator>, TokenRange)>,
    limit: Option<(u64, TokenRange)>,
    offset: Option<(u64, TokenRange)>,
}

enum Verb {
    Node(Node),
    Path(PropertyPath),
}

type PathTriple = (Node, PropertyPath, Node);

/// Parser over one query string.
pub struct Parser {
    tokens: Vec<PositionedToken>,
    pos: usize,
    base: Option<String>,
    prefixes: FxHashMap<String, String>,
    provenance: Provenance,
    scopes: Vec<AggregateScope>,
    blank_nodes: usize,
}

impl Parser {
    /// Tokenizes `text` and prepares to parse it.
    pub fn new(text: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: Lexer::tokenize(text)?,
            pos: 0,
            base: None,
            prefixes: FxHashMap::default(),
            provenance: Provenance::new(),
            scopes: Vec::new(),
            blank_nodes: 0,
        })
    }

    /// Parses the whole token stream as one query.
    pub fn parse_query(mut self) -> Result<ParsedQuery, ParseError> {
        self.parse_prologue()?;
        let query = match self.keyword().as_deref() {
            Some("SELECT") => self.parse_select_query(true)?,
            Some("ASK") => self.parse_ask()?,
            Some("CONSTRUCT") => self.parse_construct()?,
            Some("DESCRIBE") => self.parse_describe()?,
            _ => return Err(self.unexpected("SELECT, ASK, CONSTRUCT or DESCRIBE")),
        };
        if self.pos < self.tokens.len() {
            return Err(self.unexpected("end of query"));
        }
        trace!(nodes = self.provenance.len(), "parsed query");
        Ok(ParsedQuery {
            query,
            provenance: self.provenance,
        })
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|t| &t.token)
    }

    fn keyword(&self) -> Option<String> {
        match self.peek() {
            Some(Token::Keyword(word)) => Some(word.clone()),
            _ => None,
        }
    }

    fn peek_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(word))
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek_keyword(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn location(&self) -> (u32, u32) {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or((1, 1), |t| (t.line, t.column))
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(found) => ParseError::Syntax {
                message: format!("expected {expected}, found '{}'", found.token),
                line: found.line,
                column: found.column,
            },
            None => ParseError::UnexpectedEnd {
                expected: expected.to_owned(),
            },
        }
    }

    fn span_from(&self, start: usize) -> TokenRange {
        TokenRange::new(start, self.pos.saturating_sub(1).max(start))
    }

    fn join_recorded(&mut self, lhs: Algebra, rhs: Algebra, span: TokenRange) -> Algebra {
        let joined = Algebra::join(lhs, rhs);
        if matches!(joined, Algebra::InnerJoin(..)) {
            self.provenance.record(&joined, [span]);
        }
        joined
    }

    fn fresh_blank(&mut self) -> Node {
        self.blank_nodes += 1;
        Node::Bound(Term::Blank {
            value: format!(".b{}", self.blank_nodes),
        })
    }

    fn current_scope(&mut self) -> &mut AggregateScope {
        if self.scopes.is_empty() {
            self.scopes.push(AggregateScope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    // ---- prologue and IRIs ----

    fn parse_prologue(&mut self) -> Result<(), ParseError> {
        loop {
            if self.eat_keyword("BASE") {
                let iri = self.expect_iri_ref()?;
                self.base = Some(iri);
            } else if self.eat_keyword("PREFIX") {
                let prefix = match self.peek().cloned() {
                    Some(Token::PrefixedName { prefix, local }) if local.is_empty() => prefix,
                    _ => return Err(self.unexpected("prefix declaration")),
                };
                self.pos += 1;
                let iri = self.expect_iri_ref()?;
                self.prefixes.insert(prefix, iri);
            } else {
                return Ok(());
            }
        }
    }

    fn expect_iri_ref(&mut self) -> Result<String, ParseError> {
        match self.peek().cloned() {
            Some(Token::Iri(iri)) => {
                self.pos += 1;
                Ok(self.resolve(&iri))
            }
            _ => Err(self.unexpected("IRI")),
        }
    }

    fn try_iri(&mut self) -> Result<Option<String>, ParseError> {
        match self.peek().cloned() {
            Some(Token::Iri(iri)) => {
                self.pos += 1;
                Ok(Some(self.resolve(&iri)))
            }
            Some(Token::PrefixedName { prefix, local }) => {
                let Some(namespace) = self.prefixes.get(&prefix) else {
                    let (line, column) = self.location();
                    return Err(ParseError::UndeclaredPrefix {
                        prefix,
                        line,
                        column,
                    });
                };
                let iri = format!("{namespace}{local}");
                self.pos += 1;
                Ok(Some(iri))
            }
            _ => Ok(None),
        }
    }

    fn expect_iri(&mut self) -> Result<String, ParseError> {
        match self.try_iri()? {
            Some(iri) => Ok(iri),
            None => Err(self.unexpected("IRI")),
        }
    }

    fn resolve(&self, iri: &str) -> String {
        let Some(base) = self.base.as_deref() else {
            return iri.to_owned();
        };
        if has_scheme(iri) {
            return iri.to_owned();
        }
        if iri.is_empty() {
            return base.to_owned();
        }
        if iri.starts_with('#') {
            let stem = base.split('#').next().unwrap_or(base);
            return format!("{stem}{iri}");
        }
        match base.rfind('/') {
            Some(idx) => format!("{}{iri}", &base[..=idx]),
            None => format!("{base}{iri}"),
        }
    }

    // ---- query forms ----

    fn parse_select_query(&mut self, top_level: bool) -> Result<Query, ParseError> {
        self.scopes.push(AggregateScope::default());
        let select = self.parse_select_clause()?;
        let dataset = if top_level { self.parse_dataset()? } else { None };
        self.eat_keyword("WHERE");
        let pattern = self.parse_group()?;
        let modifiers = self.parse_modifiers()?;
        let values = self.parse_trailing_values()?;
        let scope = self.scopes.pop().unwrap_or_default();
        let algebra = self.finish(pattern, Some(select), modifiers, values, scope);
        Ok(Query {
            form: QueryForm::Select,
            dataset,
            algebra,
        })
    }

    fn parse_ask(&mut self) -> Result<Query, ParseError> {
        self.expect_keyword("ASK")?;
        self.scopes.push(AggregateScope::default());
        let dataset = self.parse_dataset()?;
        self.eat_keyword("WHERE");
        let pattern = self.parse_group()?;
        let modifiers = self.parse_modifiers()?;
        let values = self.parse_trailing_values()?;
        let scope = self.scopes.pop().unwrap_or_default();
        let algebra = self.finish(pattern, None, modifiers, values, scope);
        Ok(Query {
            form: QueryForm::Ask,
            dataset,
            algebra,
        })
    }

    fn parse_construct(&mut self) -> Result<Query, ParseError> {
        self.expect_keyword("CONSTRUCT")?;
        self.scopes.push(AggregateScope::default());
        let (template, pattern, dataset) = if self.peek() == Some(&Token::LBrace) {
            let template = self.parse_construct_template()?;
            let dataset = self.parse_dataset()?;
            self.eat_keyword("WHERE");
            let pattern = self.parse_group()?;
            (template, pattern, dataset)
        } else {
            let dataset = self.parse_dataset()?;
            self.expect_keyword("WHERE")?;
            let start = self.pos;
            let template = self.parse_construct_template()?;
            let pattern = Algebra::Bgp(template.clone());
            let span = self.span_from(start);
            self.provenance.record(&pattern, [span]);
            (template, pattern, dataset)
        };
        let modifiers = self.parse_modifiers()?;
        let values = self.parse_trailing_values()?;
        let scope = self.scopes.pop().unwrap_or_default();
        let algebra = self.finish(pattern, None, modifiers, values, scope);
        Ok(Query {
            form: QueryForm::Construct(template),
            dataset,
            algebra,
        })
    }

    fn parse_construct_template(&mut self) -> Result<Vec<TriplePattern>, ParseError> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut triples = Vec::new();
        let mut paths = Vec::new();
        while self.at_triple_start() {
            self.parse_triples_same_subject(&mut triples, &mut paths)?;
            if !self.eat(&Token::Dot) {
                break;
            }
        }
        if !paths.is_empty() {
            return Err(self.unexpected("plain predicate in CONSTRUCT template"));
        }
        self.expect(&Token::RBrace, "'}'")?;
        Ok(triples)
    }

    fn parse_describe(&mut self) -> Result<Query, ParseError> {
        self.expect_keyword("DESCRIBE")?;
        self.scopes.push(AggregateScope::default());
        let mut targets = Vec::new();
        if !self.eat(&Token::Star) {
            loop {
                match self.peek() {
                    Some(Token::Variable(_) | Token::Iri(_) | Token::PrefixedName { .. }) => {
                        targets.push(self.parse_var_or_iri()?);
                    }
                    _ => break,
                }
            }
            if targets.is_empty() {
                return Err(self.unexpected("variable, IRI or '*'"));
            }
        }
        let dataset = self.parse_dataset()?;
        let has_where = self.eat_keyword("WHERE");
        let pattern = if has_where || self.peek() == Some(&Token::LBrace) {
            self.parse_group()?
        } else {
            Algebra::JoinIdentity
        };
        let modifiers = self.parse_modifiers()?;
        let values = self.parse_trailing_values()?;
        let scope = self.scopes.pop().unwrap_or_default();
        let algebra = self.finish(pattern, None, modifiers, values, scope);
        Ok(Query {
            form: QueryForm::Describe(targets),
            dataset,
            algebra,
        })
    }

    fn parse_dataset(&mut self) -> Result<Option<Dataset>, ParseError> {
        let mut dataset = Dataset::default();
        let mut seen = false;
        while self.eat_keyword("FROM") {
            seen = true;
            if self.eat_keyword("NAMED") {
                dataset.named_graphs.push(Term::iri(self.expect_iri()?));
            } else {
                dataset.default_graphs.push(Term::iri(self.expect_iri()?));
            }
        }
        Ok(seen.then_some(dataset))
    }

    fn parse_select_clause(&mut self) -> Result<SelectClause, ParseError> {
        let start = self.pos;
        self.expect_keyword("SELECT")?;
        let modifier = if self.peek_keyword("DISTINCT") {
            self.pos += 1;
            Some((SelectModifier::Distinct, self.pos - 1))
        } else if self.peek_keyword("REDUCED") {
            self.pos += 1;
            Some((SelectModifier::Reduced, self.pos - 1))
        } else {
            None
        };
        let projection = if self.eat(&Token::Star) {
            None
        } else {
            let mut items = Vec::new();
            loop {
                match self.peek().cloned() {
                    Some(Token::Variable(name)) => {
                        self.pos += 1;
                        items.push(Projection::Variable(name));
                    }
                    Some(Token::LParen) => {
                        let item_start = self.pos;
                        self.pos += 1;
                        let expression = self.parse_expression()?;
                        self.expect_keyword("AS")?;
                        let variable = self.expect_variable()?;
                        self.expect(&Token::RParen, "')'")?;
                        items.push(Projection::Bound {
                            expression,
                            variable,
                            span: self.span_from(item_start),
                        });
                    }
                    _ => break,
                }
            }
            if items.is_empty() {
                return Err(self.unexpected("projection"));
            }
            Some(items)
        };
        Ok(SelectClause {
            span: self.span_from(start),
            modifier,
            projection,
        })
    }

    fn parse_modifiers(&mut self) -> Result<Modifiers, ParseError> {
        let mut modifiers = Modifiers::default();
        if self.peek_keyword("GROUP") {
            let start = self.pos;
            self.pos += 1;
            self.expect_keyword("BY")?;
            let mut conditions = Vec::new();
            loop {
                let cond_start = self.pos;
                match self.peek() {
                    Some(Token::LParen) => {
                        self.pos += 1;
                        let expression = self.parse_expression()?;
                        let alias = if self.eat_keyword("AS") {
                            Some(self.expect_variable()?)
                        } else {
                            None
                        };
                        self.expect(&Token::RParen, "')'")?;
                        conditions.push(GroupCondition {
                            expression,
                            alias,
                            span: self.span_from(cond_start),
                        });
                    }
                    Some(Token::Variable(_)) => {
                        let expression = self.parse_primary()?;
                        conditions.push(GroupCondition {
                            expression,
                            alias: None,
                            span: self.span_from(cond_start),
                        });
                    }
                    _ if self.at_call() => {
                        let expression = self.parse_primary()?;
                        conditions.push(GroupCondition {
                            expression,
                            alias: None,
                            span: self.span_from(cond_start),
                        });
                    }
                    _ => break,
                }
            }
            if conditions.is_empty() {
                return Err(self.unexpected("group condition"));
            }
            modifiers.group = Some((conditions, self.span_from(start)));
        }
        if self.peek_keyword("HAVING") {
            let start = self.pos;
            self.pos += 1;
            let mut constraints = vec![self.parse_constraint()?];
            while self.peek() == Some(&Token::LParen) || self.at_call() {
                constraints.push(self.parse_constraint()?);
            }
            modifiers.having = Some((constraints, self.span_from(start)));
        }
        if self.peek_keyword("ORDER") {
            let start = self.pos;
            self.pos += 1;
            self.expect_keyword("BY")?;
            let comparators = self.parse_order_conditions()?;
            if comparators.is_empty() {
                return Err(self.unexpected("order condition"));
            }
            modifiers.order = Some((comparators, self.span_from(start)));
        }
        for _ in 0..2 {
            if self.peek_keyword("LIMIT") && modifiers.limit.is_none() {
                let start = self.pos;
                self.pos += 1;
                let value = self.expect_count("LIMIT")?;
                modifiers.limit = Some((value, self.span_from(start)));
            } else if self.peek_keyword("OFFSET") && modifiers.offset.is_none() {
                let start = self.pos;
                self.pos += 1;
                let value = self.expect_count("OFFSET")?;
                modifiers.offset = Some((value, self.span_from(start)));
            }
        }
        Ok(modifiers)
    }

    fn expect_count(&mut self, clause: &'static str) -> Result<u64, ParseError> {
        match self.peek().cloned() {
            Some(Token::Integer(text)) => {
                self.pos += 1;
                text.parse()
                    .map_err(|_| ParseError::InvalidInteger { clause, value: text })
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    fn parse_order_conditions(&mut self) -> Result<Vec<SortComparator>, ParseError> {
        let mut comparators = Vec::new();
        loop {
            if self.peek_keyword("ASC") || self.peek_keyword("DESC") {
                let ascending = self.peek_keyword("ASC");
                self.pos += 1;
                self.expect(&Token::LParen, "'('")?;
                let expression = self.parse_expression()?;
                self.expect(&Token::RParen, "')'")?;
                comparators.push(SortComparator {
                    ascending,
                    expression,
                });
            } else if matches!(self.peek(), Some(Token::Variable(_))) {
                let expression = self.parse_primary()?;
                comparators.push(SortComparator {
                    ascending: true,
                    expression,
                });
            } else if self.peek() == Some(&Token::LParen) || self.at_call() {
                let expression = self.parse_constraint()?;
                comparators.push(SortComparator {
                    ascending: true,
                    expression,
                });
            } else {
                return Ok(comparators);
            }
        }
    }

    fn parse_trailing_values(&mut self) -> Result<Option<(Algebra, TokenRange)>, ParseError> {
        if !self.peek_keyword("VALUES") {
            return Ok(None);
        }
        let start = self.pos;
        let table = self.parse_values()?;
        Ok(Some((table, self.span_from(start))))
    }

    /// Assembles a query's algebra in evaluation order.
    fn finish(
        &mut self,
        pattern: Algebra,
        select: Option<SelectClause>,
        modifiers: Modifiers,
        values: Option<(Algebra, TokenRange)>,
        scope: AggregateScope,
    ) -> Algebra {
        let mut algebra = pattern;
        if let Some((table, span)) = values {
            algebra = self.join_recorded(algebra, table, span);
        }

        let grouped = modifiers.group.is_some()
            || modifiers.having.is_some()
            || !scope.aggregations.is_empty();
        if grouped {
            let mut groups = Vec::new();
            let mut group_spans = Vec::new();
            if let Some((conditions, span)) = modifiers.group {
                group_spans.push(span);
                for condition in conditions {
                    match condition.alias {
                        Some(alias) => {
                            algebra = Algebra::Extend(
                                Box::new(algebra),
                                condition.expression,
                                alias.clone(),
                            );
                            self.provenance.record(&algebra, [condition.span]);
                            groups.push(Expression::var(alias));
                        }
                        None => groups.push(condition.expression),
                    }
                }
            }
            algebra = Algebra::Aggregate {
                input: Box::new(algebra),
                groups,
                aggregations: scope.aggregations,
            };
            self.provenance.record(&algebra, group_spans);
            if let Some((constraints, span)) = modifiers.having {
                for constraint in constraints {
                    algebra = Algebra::Filter(Box::new(algebra), constraint);
                    self.provenance.record(&algebra, [span]);
                }
            }
        }

        let projection = select.as_ref().and_then(|s| s.projection.as_ref());
        if !scope.windows.is_empty() {
            let hidden: Vec<&str> = scope.windows.iter().map(|w| w.variable.as_str()).collect();
            let spans: Vec<TokenRange> = projection
                .into_iter()
                .flatten()
                .filter_map(|item| match item {
                    Projection::Bound {
                        expression, span, ..
                    } if expression
                        .variables()
                        .iter()
                        .any(|v| hidden.contains(&v.as_str())) =>
                    {
                        Some(*span)
                    }
                    _ => None,
                })
                .collect();
            algebra = Algebra::Window(Box::new(algebra), scope.windows);
            self.provenance.record(&algebra, spans);
        }

        for item in projection.into_iter().flatten() {
            if let Projection::Bound {
                expression,
                variable,
                span,
            } = item
            {
                algebra = Algebra::Extend(Box::new(algebra), expression.clone(), variable.clone());
                self.provenance.record(&algebra, [*span]);
            }
        }

        if let Some((comparators, span)) = modifiers.order {
            algebra = Algebra::Order(Box::new(algebra), comparators);
            self.provenance.record(&algebra, [span]);
        }

        if let Some(select) = select {
            let variables: Vec<String> = match &select.projection {
                None => algebra
                    .in_scope()
                    .into_iter()
                    .filter(|v| !v.starts_with('.'))
                    .collect(),
                Some(items) => items
                    .iter()
                    .map(|item| match item {
                        Projection::Variable(name) => name.clone(),
                        Projection::Bound { variable, .. } => variable.clone(),
                    })
                    .collect(),
            };
            algebra = Algebra::Project(Box::new(algebra), variables);
            self.provenance.record(&algebra, [select.span]);
            if let Some((modifier, index)) = select.modifier {
                algebra = match modifier {
                    SelectModifier::Distinct => Algebra::Distinct(Box::new(algebra)),
                    SelectModifier::Reduced => Algebra::Reduced(Box::new(algebra)),
                };
                self.provenance.record(&algebra, [TokenRange::single(index)]);
            }
        }

        if modifiers.limit.is_some() || modifiers.offset.is_some() {
            let spans: Vec<TokenRange> = modifiers
                .limit
                .iter()
                .chain(modifiers.offset.iter())
                .map(|(_, span)| *span)
                .collect();
            algebra = Algebra::Slice {
                input: Box::new(algebra),
                offset: modifiers.offset.map(|(v, _)| v),
                limit: modifiers.limit.map(|(v, _)| v),
            };
            self.provenance.record(&algebra, spans);
        }
        algebra
    }

    // ---- graph patterns ----

    /// Parses `{ ... }`: a sub-select or a group of pattern elements.
    fn parse_group(&mut self) -> Result<Algebra, ParseError> {
        let start = self.pos;
        self.expect(&Token::LBrace, "'{'")?;
        if self.peek_keyword("SELECT") {
            let query = self.parse_select_query(false)?;
            self.expect(&Token::RBrace, "'}'")?;
            let node = Algebra::Subquery(Box::new(query));
            let span = self.span_from(start);
            self.provenance.record(&node, [span]);
            return Ok(node);
        }

        let mut acc = Algebra::JoinIdentity;
        let mut filters = Vec::new();
        loop {
            let clause = self.pos;
            match self.peek() {
                None => return Err(self.unexpected("'}'")),
                Some(Token::RBrace) => break,
                Some(Token::Dot) => self.pos += 1,
                Some(Token::LBrace) => {
                    let element = self.parse_group_or_union()?;
                    let span = self.span_from(clause);
                    acc = self.join_recorded(acc, element, span);
                }
                Some(Token::Keyword(_)) if !self.at_triple_start() => {
                    acc = self.parse_keyword_element(acc, clause, &mut filters)?;
                }
                Some(_) if self.at_triple_start() => {
                    let block = self.parse_triples_block()?;
                    let span = self.span_from(clause);
                    acc = self.join_recorded(acc, block, span);
                }
                Some(_) => return Err(self.unexpected("graph pattern")),
            }
        }
        self.pos += 1;

        for (expression, span) in filters {
            acc = Algebra::Filter(Box::new(acc), expression);
            self.provenance.record(&acc, [span]);
        }
        Ok(acc)
    }

    fn parse_keyword_element(
        &mut self,
        acc: Algebra,
        clause: usize,
        filters: &mut Vec<(Expression, TokenRange)>,
    ) -> Result<Algebra, ParseError> {
        let keyword = self.keyword().unwrap_or_default();
        let next = match keyword.as_str() {
            "FILTER" => {
                self.pos += 1;
                let expression = self.parse_constraint()?;
                filters.push((expression, self.span_from(clause)));
                acc
            }
            "OPTIONAL" => {
                self.pos += 1;
                let inner = self.parse_group()?;
                let (rhs, expression) = lift_filters(inner);
                let node = Algebra::LeftOuterJoin(Box::new(acc), Box::new(rhs), expression);
                let span = self.span_from(clause);
                self.provenance.record(&node, [span]);
                node
            }
            "MINUS" => {
                self.pos += 1;
                let inner = self.parse_group()?;
                let node = Algebra::Minus(Box::new(acc), Box::new(inner));
                let span = self.span_from(clause);
                self.provenance.record(&node, [span]);
                node
            }
            "BIND" => {
                self.pos += 1;
                self.expect(&Token::LParen, "'('")?;
                let expression = self.parse_expression()?;
                self.expect_keyword("AS")?;
                let variable = self.expect_variable()?;
                self.expect(&Token::RParen, "')'")?;
                let node = Algebra::Extend(Box::new(acc), expression, variable);
                let span = self.span_from(clause);
                self.provenance.record(&node, [span]);
                node
            }
            "VALUES" => {
                let table = self.parse_values()?;
                let span = self.span_from(clause);
                self.join_recorded(acc, table, span)
            }
            "GRAPH" => {
                self.pos += 1;
                let graph = self.parse_var_or_iri()?;
                let inner = self.parse_group()?;
                let node = Algebra::NamedGraph(Box::new(inner), graph);
                let span = self.span_from(clause);
                self.provenance.record(&node, [span]);
                self.join_recorded(acc, node, span)
            }
            "SERVICE" => {
                self.pos += 1;
                let silent = self.eat_keyword("SILENT");
                let endpoint = self.parse_var_or_iri()?;
                let pattern = self.parse_group()?;
                let node = Algebra::Service {
                    endpoint,
                    pattern: Box::new(pattern),
                    silent,
                };
                let span = self.span_from(clause);
                self.provenance.record(&node, [span]);
                self.join_recorded(acc, node, span)
            }
            _ => return Err(self.unexpected("graph pattern")),
        };
        Ok(next)
    }

    fn parse_group_or_union(&mut self) -> Result<Algebra, ParseError> {
        let start = self.pos;
        let mut acc = self.parse_group()?;
        while self.eat_keyword("UNION") {
            let rhs = self.parse_group()?;
            acc = Algebra::Union(Box::new(acc), Box::new(rhs));
            let span = self.span_from(start);
            self.provenance.record(&acc, [span]);
        }
        Ok(acc)
    }

    fn parse_values(&mut self) -> Result<Algebra, ParseError> {
        let start = self.pos;
        self.expect_keyword("VALUES")?;
        let mut variables = Vec::new();
        let mut rows = Vec::new();
        if let Some(Token::Variable(name)) = self.peek().cloned() {
            self.pos += 1;
            variables.push(name);
            self.expect(&Token::LBrace, "'{'")?;
            while !self.eat(&Token::RBrace) {
                rows.push(vec![self.parse_data_value()?]);
            }
        } else {
            self.expect(&Token::LParen, "'(' or variable")?;
            while !self.eat(&Token::RParen) {
                variables.push(self.expect_variable()?);
            }
            self.expect(&Token::LBrace, "'{'")?;
            while !self.eat(&Token::RBrace) {
                self.expect(&Token::LParen, "'('")?;
                let mut row = Vec::with_capacity(variables.len());
                while !self.eat(&Token::RParen) {
                    row.push(self.parse_data_value()?);
                }
                if row.len() != variables.len() {
                    return Err(self.unexpected(&format!("{} values per row", variables.len())));
                }
                rows.push(row);
            }
        }
        let table = Algebra::Table { variables, rows };
        let span = self.span_from(start);
        self.provenance.record(&table, [span]);
        Ok(table)
    }

    fn parse_data_value(&mut self) -> Result<Option<Term>, ParseError> {
        if self.eat_keyword("UNDEF") {
            return Ok(None);
        }
        self.parse_term().map(Some)
    }

    // ---- triples ----

    fn at_triple_start(&self) -> bool {
        match self.peek() {
            Some(
                Token::Variable(_)
                | Token::Iri(_)
                | Token::PrefixedName { .. }
                | Token::BlankLabel(_)
                | Token::LBracket
                | Token::LParen
                | Token::String(_)
                | Token::Integer(_)
                | Token::Decimal(_)
                | Token::Double(_),
            ) => true,
            Some(Token::Keyword(word)) => word == "TRUE" || word == "FALSE",
            _ => false,
        }
    }

    fn at_verb_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Variable(_)
                    | Token::Iri(_)
                    | Token::PrefixedName { .. }
                    | Token::A
                    | Token::Caret
                    | Token::Bang
                    | Token::LParen
            )
        )
    }

    fn parse_triples_block(&mut self) -> Result<Algebra, ParseError> {
        let start = self.pos;
        let mut triples = Vec::new();
        let mut paths = Vec::new();
        loop {
            self.parse_triples_same_subject(&mut triples, &mut paths)?;
            if !self.eat(&Token::Dot) || !self.at_triple_start() {
                break;
            }
        }
        let span = self.span_from(start);
        let mut acc = Algebra::JoinIdentity;
        if !triples.is_empty() {
            let bgp = Algebra::Bgp(triples);
            self.provenance.record(&bgp, [span]);
            acc = bgp;
        }
        for (subject, path, object) in paths {
            let node = Algebra::Path {
                subject,
                path,
                object,
            };
            self.provenance.record(&node, [span]);
            acc = self.join_recorded(acc, node, span);
        }
        Ok(acc)
    }

    fn parse_triples_same_subject(
        &mut self,
        triples: &mut Vec<TriplePattern>,
        paths: &mut Vec<PathTriple>,
    ) -> Result<(), ParseError> {
        let (subject, needs_properties) = match self.peek() {
            Some(Token::LBracket) => {
                let (node, had_properties) = self.parse_blank_node_list(triples, paths)?;
                (node, !had_properties)
            }
            Some(Token::LParen) => (self.parse_collection(triples, paths)?, false),
            _ => (self.parse_var_or_term()?, true),
        };
        if needs_properties || self.at_verb_start() {
            self.parse_property_list(&subject, triples, paths)?;
        }
        Ok(())
    }

    fn parse_property_list(
        &mut self,
        subject: &Node,
        triples: &mut Vec<TriplePattern>,
        paths: &mut Vec<PathTriple>,
    ) -> Result<(), ParseError> {
        loop {
            let verb = self.parse_verb()?;
            loop {
                let object = self.parse_object(triples, paths)?;
                match &verb {
                    Verb::Node(predicate) => {
                        triples.push(TriplePattern::new(subject.clone(), predicate.clone(), object))
                    }
                    Verb::Path(path) => paths.push((subject.clone(), path.clone(), object)),
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            if !self.eat(&Token::Semicolon) {
                return Ok(());
            }
            while self.eat(&Token::Semicolon) {}
            if !self.at_verb_start() {
                return Ok(());
            }
        }
    }

    fn parse_verb(&mut self) -> Result<Verb, ParseError> {
        if let Some(Token::Variable(name)) = self.peek().cloned() {
            self.pos += 1;
            return Ok(Verb::Node(Node::Variable(name)));
        }
        match self.parse_path()? {
            PropertyPath::Link(term) => Ok(Verb::Node(Node::Bound(term))),
            path => Ok(Verb::Path(path)),
        }
    }

    fn parse_object(
        &mut self,
        triples: &mut Vec<TriplePattern>,
        paths: &mut Vec<PathTriple>,
    ) -> Result<Node, ParseError> {
        match self.peek() {
            Some(Token::LBracket) => Ok(self.parse_blank_node_list(triples, paths)?.0),
            Some(Token::LParen) => self.parse_collection(triples, paths),
            _ => self.parse_var_or_term(),
        }
    }

    /// `[ ... ]`; returns the fresh node and whether it carried properties.
    fn parse_blank_node_list(
        &mut self,
        triples: &mut Vec<TriplePattern>,
        paths: &mut Vec<PathTriple>,
    ) -> Result<(Node, bool), ParseError> {
        self.expect(&Token::LBracket, "'['")?;
        let node = self.fresh_blank();
        if self.eat(&Token::RBracket) {
            return Ok((node, false));
        }
        self.parse_property_list(&node, triples, paths)?;
        self.expect(&Token::RBracket, "']'")?;
        Ok((node, true))
    }

    fn parse_collection(
        &mut self,
        triples: &mut Vec<TriplePattern>,
        paths: &mut Vec<PathTriple>,
    ) -> Result<Node, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let mut items = Vec::new();
        while !self.eat(&Token::RParen) {
            items.push(self.parse_object(triples, paths)?);
        }
        let nil = Node::Bound(Term::iri(RDF_NIL));
        if items.is_empty() {
            return Ok(nil);
        }
        let head = self.fresh_blank();
        let mut current = head.clone();
        let count = items.len();
        for (i, item) in items.into_iter().enumerate() {
            triples.push(TriplePattern::new(
                current.clone(),
                Node::Bound(Term::iri(RDF_FIRST)),
                item,
            ));
            let next = if i + 1 == count {
                nil.clone()
            } else {
                self.fresh_blank()
            };
            triples.push(TriplePattern::new(
                current,
                Node::Bound(Term::iri(RDF_REST)),
                next.clone(),
            ));
            current = next;
        }
        Ok(head)
    }

    fn parse_path(&mut self) -> Result<PropertyPath, ParseError> {
        let mut path = self.parse_path_sequence()?;
        while self.eat(&Token::Pipe) {
            let rhs = self.parse_path_sequence()?;
            path = PropertyPath::Alternative(Box::new(path), Box::new(rhs));
        }
        Ok(path)
    }

    fn parse_path_sequence(&mut self) -> Result<PropertyPath, ParseError> {
        let mut path = self.parse_path_element()?;
        while self.eat(&Token::Slash) {
            let rhs = self.parse_path_element()?;
            path = PropertyPath::Sequence(Box::new(path), Box::new(rhs));
        }
        Ok(path)
    }

    fn parse_path_element(&mut self) -> Result<PropertyPath, ParseError> {
        let inverse = self.eat(&Token::Caret);
        let primary = self.parse_path_primary()?;
        let path = match self.peek() {
            Some(Token::Star) => {
                self.pos += 1;
                PropertyPath::ZeroOrMore(Box::new(primary))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                PropertyPath::OneOrMore(Box::new(primary))
            }
            Some(Token::Question) => {
                self.pos += 1;
                PropertyPath::ZeroOrOne(Box::new(primary))
            }
            _ => primary,
        };
        Ok(if inverse {
            PropertyPath::Inverse(Box::new(path))
        } else {
            path
        })
    }

    fn parse_path_primary(&mut self) -> Result<PropertyPath, ParseError> {
        if self.eat(&Token::A) {
            return Ok(PropertyPath::Link(Term::iri(RDF_TYPE)));
        }
        if self.eat(&Token::LParen) {
            let path = self.parse_path()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(path);
        }
        if self.eat(&Token::Bang) {
            let mut terms = Vec::new();
            if self.eat(&Token::LParen) {
                loop {
                    terms.push(self.parse_negated_member()?);
                    if !self.eat(&Token::Pipe) {
                        break;
                    }
                }
                self.expect(&Token::RParen, "')'")?;
            } else {
                terms.push(self.parse_negated_member()?);
            }
            return Ok(PropertyPath::NegatedSet(terms));
        }
        match self.try_iri()? {
            Some(iri) => Ok(PropertyPath::Link(Term::iri(iri))),
            None => Err(self.unexpected("predicate or property path")),
        }
    }

    fn parse_negated_member(&mut self) -> Result<Term, ParseError> {
        self.eat(&Token::Caret);
        if self.eat(&Token::A) {
            return Ok(Term::iri(RDF_TYPE));
        }
        Ok(Term::iri(self.expect_iri()?))
    }

    // ---- terms ----

    fn expect_variable(&mut self) -> Result<String, ParseError> {
        match self.peek().cloned() {
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("variable")),
        }
    }

    fn parse_var_or_iri(&mut self) -> Result<Node, ParseError> {
        if let Some(Token::Variable(name)) = self.peek().cloned() {
            self.pos += 1;
            return Ok(Node::Variable(name));
        }
        Ok(Node::Bound(Term::iri(self.expect_iri()?)))
    }

    fn parse_var_or_term(&mut self) -> Result<Node, ParseError> {
        match self.peek().cloned() {
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(Node::Variable(name))
            }
            Some(Token::BlankLabel(label)) => {
                self.pos += 1;
                Ok(Node::Bound(Term::Blank { value: label }))
            }
            _ => Ok(Node::Bound(self.parse_term()?)),
        }
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        if let Some(iri) = self.try_iri()? {
            return Ok(Term::iri(iri));
        }
        let token = self.peek().cloned();
        match token {
            Some(Token::String(value)) => {
                self.pos += 1;
                self.finish_literal(value)
            }
            Some(Token::Integer(_) | Token::Decimal(_) | Token::Double(_)) => {
                self.pos += 1;
                Ok(numeric_term(token, ""))
            }
            Some(sign @ (Token::Plus | Token::Minus))
                if matches!(
                    self.peek_at(1),
                    Some(Token::Integer(_) | Token::Decimal(_) | Token::Double(_))
                ) =>
            {
                let number = self.peek_at(1).cloned();
                self.pos += 2;
                Ok(numeric_term(number, if sign == Token::Minus { "-" } else { "+" }))
            }
            Some(Token::Keyword(word)) if word == "TRUE" || word == "FALSE" => {
                self.pos += 1;
                Ok(Term::xsd(word.to_ascii_lowercase(), "boolean"))
            }
            Some(Token::BlankLabel(label)) => {
                self.pos += 1;
                Ok(Term::Blank { value: label })
            }
            _ => Err(self.unexpected("RDF term")),
        }
    }

    fn finish_literal(&mut self, value: String) -> Result<Term, ParseError> {
        if let Some(Token::LangTag(tag)) = self.peek().cloned() {
            self.pos += 1;
            return Ok(Term::Literal {
                value,
                language: Some(tag),
                datatype: None,
            });
        }
        if self.eat(&Token::DoubleCaret) {
            let datatype = self.expect_iri()?;
            return Ok(Term::Literal {
                value,
                language: None,
                datatype: Some(datatype),
            });
        }
        Ok(Term::string(value))
    }

    // ---- expressions ----

    fn at_call(&self) -> bool {
        match self.peek() {
            Some(Token::Keyword(word)) => {
                (word == "NOT" && self.peek_at(1).is_some_and(|t| t.is_keyword("EXISTS")))
                    || (word == "EXISTS" && self.peek_at(1) == Some(&Token::LBrace))
                    || (self.peek_at(1) == Some(&Token::LParen)
                        && !CLAUSE_KEYWORDS.contains(&word.as_str()))
            }
            Some(Token::Iri(_) | Token::PrefixedName { .. }) => {
                self.peek_at(1) == Some(&Token::LParen)
            }
            _ => false,
        }
    }

    /// FILTER / HAVING / ORDER BY constraint: bracketed expression or call.
    fn parse_constraint(&mut self) -> Result<Expression, ParseError> {
        if self.eat(&Token::LParen) {
            let expression = self.parse_expression()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(expression);
        }
        if self.at_call() {
            return self.parse_primary();
        }
        Err(self.unexpected("constraint"))
    }

    /// Parses an expression.
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expression::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_relational()?;
            lhs = Expression::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::Keyword(word)) if word == "IN" => {
                self.pos += 1;
                return self.finish_in(lhs, false);
            }
            Some(Token::Keyword(word))
                if word == "NOT" && self.peek_at(1).is_some_and(|t| t.is_keyword("IN")) =>
            {
                self.pos += 2;
                return self.finish_in(lhs, true);
            }
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        Ok(Expression::binary(op, lhs, rhs))
    }

    fn finish_in(&mut self, operand: Expression, negated: bool) -> Result<Expression, ParseError> {
        let list = self.parse_arguments()?;
        Ok(Expression::In {
            operand: Box::new(operand),
            list,
            negated,
        })
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expression::Unary(op, Box::new(operand)))
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let expression = self.parse_expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expression)
            }
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(Expression::var(name))
            }
            Some(Token::Iri(_) | Token::PrefixedName { .. }) => {
                let iri = self.expect_iri()?;
                if self.peek() == Some(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expression::Call(Function::Iri(iri), args))
                } else {
                    Ok(Expression::term(Term::iri(iri)))
                }
            }
            Some(Token::Keyword(word)) => self.parse_keyword_expression(&word),
            Some(_) => Ok(Expression::term(self.parse_term()?)),
            None => Err(self.unexpected("expression")),
        }
    }

    fn parse_keyword_expression(&mut self, word: &str) -> Result<Expression, ParseError> {
        match word {
            "TRUE" | "FALSE" => Ok(Expression::term(self.parse_term()?)),
            "EXISTS" => {
                self.pos += 1;
                let pattern = self.parse_group()?;
                Ok(Expression::Exists {
                    pattern: Box::new(pattern),
                    negated: false,
                })
            }
            "NOT" if self.peek_at(1).is_some_and(|t| t.is_keyword("EXISTS")) => {
                self.pos += 2;
                let pattern = self.parse_group()?;
                Ok(Expression::Exists {
                    pattern: Box::new(pattern),
                    negated: true,
                })
            }
            _ if AGGREGATES.contains(&word) => {
                self.pos += 1;
                let aggregation = self.parse_aggregate(word)?;
                if self.peek_keyword("OVER") {
                    let application = self.parse_window(WindowFunction::Aggregation(aggregation))?;
                    Ok(self.bind_window(application))
                } else {
                    Ok(self.bind_aggregate(aggregation))
                }
            }
            _ if RANKING.contains(&word) => {
                self.pos += 1;
                self.expect(&Token::LParen, "'('")?;
                self.expect(&Token::RParen, "')'")?;
                let function = match word {
                    "ROW_NUMBER" => WindowFunction::RowNumber,
                    "RANK" => WindowFunction::Rank,
                    _ => WindowFunction::DenseRank,
                };
                let application = self.parse_window(function)?;
                Ok(self.bind_window(application))
            }
            _ if self.peek_at(1) == Some(&Token::LParen) => {
                self.pos += 1;
                let args = self.parse_arguments()?;
                Ok(Expression::Call(Function::Builtin(word.to_owned()), args))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(args)
    }

    fn parse_aggregate(&mut self, name: &str) -> Result<Aggregation, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let distinct = self.eat_keyword("DISTINCT");
        if name == "COUNT" && self.eat(&Token::Star) {
            self.expect(&Token::RParen, "')'")?;
            return Ok(Aggregation::CountAll { distinct });
        }
        let expression = self.parse_expression()?;
        let aggregation = match name {
            "COUNT" => Aggregation::Count(expression, distinct),
            "SUM" => Aggregation::Sum(expression, distinct),
            "AVG" => Aggregation::Avg(expression, distinct),
            "MIN" => Aggregation::Min(expression, distinct),
            "MAX" => Aggregation::Max(expression, distinct),
            "SAMPLE" => Aggregation::Sample(expression, distinct),
            _ => {
                let mut separator = " ".to_owned();
                if self.eat(&Token::Semicolon) {
                    self.expect_keyword("SEPARATOR")?;
                    self.expect(&Token::Eq, "'='")?;
                    match self.peek().cloned() {
                        Some(Token::String(value)) => {
                            self.pos += 1;
                            separator = value;
                        }
                        _ => return Err(self.unexpected("separator string")),
                    }
                }
                Aggregation::GroupConcat {
                    expression,
                    separator,
                    distinct,
                }
            }
        };
        self.expect(&Token::RParen, "')'")?;
        Ok(aggregation)
    }

    fn parse_window(&mut self, function: WindowFunction) -> Result<WindowApplication, ParseError> {
        self.expect_keyword("OVER")?;
        self.expect(&Token::LParen, "'('")?;
        let mut partition = Vec::new();
        if self.eat_keyword("PARTITION") {
            self.expect_keyword("BY")?;
            while self.peek() != Some(&Token::RParen) && !self.peek_keyword("ORDER") {
                partition.push(self.parse_expression()?);
            }
        }
        let mut order = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            order = self.parse_order_conditions()?;
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(WindowApplication {
            function,
            partition,
            order,
        })
    }

    fn bind_aggregate(&mut self, aggregation: Aggregation) -> Expression {
        let scope = self.current_scope();
        if let Some(existing) = scope
            .aggregations
            .iter()
            .find(|m| m.aggregation == aggregation)
        {
            return Expression::var(existing.variable.clone());
        }
        let variable = format!(".agg{}", scope.aggregations.len() + 1);
        scope.aggregations.push(AggregationMapping {
            aggregation,
            variable: variable.clone(),
        });
        Expression::var(variable)
    }

    fn bind_window(&mut self, application: WindowApplication) -> Expression {
        let scope = self.current_scope();
        if let Some(existing) = scope.windows.iter().find(|m| m.application == application) {
            return Expression::var(existing.variable.clone());
        }
        let variable = format!(".window{}", scope.windows.len() + 1);
        scope.windows.push(WindowMapping {
            application,
            variable: variable.clone(),
        });
        Expression::var(variable)
    }
}

/// Moves a FILTER chain at the top of an OPTIONAL's group into the join condition.
fn lift_filters(mut pattern: Algebra) -> (Algebra, Expression) {
    let mut conditions = Vec::new();
    while let Algebra::Filter(input, expression) = pattern {
        conditions.push(expression);
        pattern = *input;
    }
    conditions.reverse();
    let expression = conditions
        .into_iter()
        .reduce(|lhs, rhs| Expression::binary(BinaryOp::And, lhs, rhs))
        .unwrap_or_else(Expression::true_value);
    (pattern, expression)
}

fn numeric_term(token: Option<Token>, sign: &str) -> Term {
    match token {
        Some(Token::Decimal(text)) => Term::xsd(format!("{sign}{text}"), "decimal"),
        Some(Token::Double(text)) => Term::xsd(format!("{sign}{text}"), "double"),
        Some(Token::Integer(text)) => Term::xsd(format!("{sign}{text}"), "integer"),
        _ => Term::xsd(format!("{sign}0"), "integer"),
    }
}

fn has_scheme(iri: &str) -> bool {
    iri.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
