//! Expressions attached to filters, extensions, joins, and aggregates.

use std::collections::BTreeSet;
use std::fmt;

use crate::query::algebra::{Algebra, SortComparator, VariableSet};
use crate::query::term::{Node, Term};

/// Prefix operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `+`
    Plus,
}

/// Infix operators, in SPARQL precedence groups.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl BinaryOp {
    /// Surface syntax of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Callee of a function application.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Function {
    /// Built-in function keyword, uppercased (`LANG`, `REGEX`, ...).
    Builtin(String),
    /// Extension function named by IRI.
    Iri(String),
}

impl Function {
    /// Returns true when the callee is the named built-in.
    pub fn is_builtin(&self, name: &str) -> bool {
        matches!(self, Function::Builtin(b) if b == name)
    }
}

/// A SPARQL expression tree.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Expression {
    /// Variable reference or bound term.
    Node(Node),
    /// Prefix operator application.
    Unary(UnaryOp, Box<Expression>),
    /// Infix operator application.
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    /// `lhs IN (..)` / `lhs NOT IN (..)`.
    In {
        /// Tested operand.
        operand: Box<Expression>,
        /// Candidate values.
        list: Vec<Expression>,
        /// `NOT IN` when true.
        negated: bool,
    },
    /// Function application.
    Call(Function, Vec<Expression>),
    /// `EXISTS { .. }` / `NOT EXISTS { .. }`.
    Exists {
        /// Embedded graph pattern.
        pattern: Box<Algebra>,
        /// `NOT EXISTS` when true.
        negated: bool,
    },
}

impl Expression {
    /// Variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Node(Node::Variable(name.into()))
    }

    /// Bound-term constant.
    pub fn term(term: Term) -> Self {
        Expression::Node(Node::Bound(term))
    }

    /// The constant `true`, used as the expression of a plain OPTIONAL.
    pub fn true_value() -> Self {
        Expression::term(Term::true_value())
    }

    /// Returns true for the literal `true` constant.
    pub fn is_true(&self) -> bool {
        matches!(self, Expression::Node(Node::Bound(t)) if *t == Term::true_value())
    }

    /// Builds a binary expression.
    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// Direct sub-expressions, in source order.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Node(_) | Expression::Exists { .. } => Vec::new(),
            Expression::Unary(_, inner) => vec![inner.as_ref()],
            Expression::Binary(_, lhs, rhs) => vec![lhs.as_ref(), rhs.as_ref()],
            Expression::In { operand, list, .. } => {
                let mut out = vec![operand.as_ref()];
                out.extend(list);
                out
            }
            Expression::Call(_, args) => args.iter().collect(),
        }
    }

    /// Free variables outside embedded `EXISTS` patterns.
    pub fn variables(&self) -> VariableSet {
        let mut out = BTreeSet::new();
        self.collect_variables(false, &mut out);
        out
    }

    /// Free variables plus the in-scope variables of embedded `EXISTS` patterns.
    pub fn mentioned_variables(&self) -> VariableSet {
        let mut out = BTreeSet::new();
        self.collect_variables(true, &mut out);
        out
    }

    fn collect_variables(&self, with_patterns: bool, out: &mut VariableSet) {
        match self {
            Expression::Node(Node::Variable(name)) => {
                out.insert(name.clone());
            }
            Expression::Exists { pattern, .. } if with_patterns => {
                out.extend(pattern.in_scope());
            }
            other => {
                for child in other.children() {
                    child.collect_variables(with_patterns, out);
                }
            }
        }
    }

    /// Visits this expression and every sub-expression in pre-order.
    ///
    /// Patterns embedded by `EXISTS` are not entered; use the algebra walk for those.
    pub fn walk<E, F>(&self, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(&Expression) -> Result<(), E>,
    {
        visit(self)?;
        for child in self.children() {
            child.walk(visit)?;
        }
        Ok(())
    }

    /// Algebra trees embedded in this expression (via `EXISTS`), outermost first.
    pub fn embedded_patterns(&self) -> Vec<&Algebra> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a Algebra>) {
        if let Expression::Exists { pattern, .. } = self {
            out.push(pattern);
        }
        for child in self.children() {
            child.collect_patterns(out);
        }
    }

    /// True when some `=` in the tree compares against a `LANG(..)` call.
    pub fn has_lang_equality_test(&self) -> bool {
        self.walk(&mut |expr| match expr {
            Expression::Binary(BinaryOp::Eq, lhs, rhs)
                if lhs.is_lang_call() || rhs.is_lang_call() =>
            {
                Err(())
            }
            _ => Ok(()),
        })
        .is_err()
    }

    fn is_lang_call(&self) -> bool {
        matches!(self, Expression::Call(f, _) if f.is_builtin("LANG"))
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Binary(..) | Expression::In { .. } => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Node(node) => write!(f, "{node}"),
            Expression::Unary(op, inner) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                };
                write!(f, "{symbol}")?;
                inner.fmt_operand(f)
            }
            Expression::Binary(op, lhs, rhs) => {
                lhs.fmt_operand(f)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f)
            }
            Expression::In {
                operand,
                list,
                negated,
            } => {
                operand.fmt_operand(f)?;
                write!(f, "{}", if *negated { " NOT IN (" } else { " IN (" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expression::Call(function, args) => {
                match function {
                    Function::Builtin(name) => write!(f, "{name}(")?,
                    Function::Iri(iri) => write!(f, "<{iri}>(")?,
                }
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Exists { pattern, negated } => {
                let keyword = if *negated { "NOT EXISTS" } else { "EXISTS" };
                write!(f, "{keyword} {{ {} }}", pattern.summary())
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Set functions usable in grouped queries.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Aggregation {
    /// `COUNT(*)` / `COUNT(DISTINCT *)`
    CountAll {
        /// DISTINCT-qualified.
        distinct: bool,
    },
    /// `COUNT(expr)`
    Count(Expression, bool),
    /// `SUM(expr)`
    Sum(Expression, bool),
    /// `AVG(expr)`
    Avg(Expression, bool),
    /// `MIN(expr)`
    Min(Expression, bool),
    /// `MAX(expr)`
    Max(Expression, bool),
    /// `SAMPLE(expr)`
    Sample(Expression, bool),
    /// `GROUP_CONCAT(expr; SEPARATOR=..)`
    GroupConcat {
        /// Concatenated expression.
        expression: Expression,
        /// Separator, defaulting to a single space.
        separator: String,
        /// DISTINCT-qualified.
        distinct: bool,
    },
}

impl Aggregation {
    /// True when the aggregate's value does not depend on the multiplicity of its input.
    ///
    /// MIN, MAX and SAMPLE are insensitive regardless of a DISTINCT qualifier.
    pub fn is_distinct(&self) -> bool {
        match self {
            Aggregation::CountAll { distinct }
            | Aggregation::Count(_, distinct)
            | Aggregation::Sum(_, distinct)
            | Aggregation::Avg(_, distinct)
            | Aggregation::GroupConcat { distinct, .. } => *distinct,
            Aggregation::Min(..) | Aggregation::Max(..) | Aggregation::Sample(..) => true,
        }
    }

    /// The aggregated expression; `COUNT(*)` aggregates the constant `true`.
    pub fn expression(&self) -> Expression {
        match self {
            Aggregation::CountAll { .. } => Expression::true_value(),
            Aggregation::Count(e, _)
            | Aggregation::Sum(e, _)
            | Aggregation::Avg(e, _)
            | Aggregation::Min(e, _)
            | Aggregation::Max(e, _)
            | Aggregation::Sample(e, _)
            | Aggregation::GroupConcat { expression: e, .. } => e.clone(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Aggregation::CountAll { .. } | Aggregation::Count(..) => "COUNT",
            Aggregation::Sum(..) => "SUM",
            Aggregation::Avg(..) => "AVG",
            Aggregation::Min(..) => "MIN",
            Aggregation::Max(..) => "MAX",
            Aggregation::Sample(..) => "SAMPLE",
            Aggregation::GroupConcat { .. } => "GROUP_CONCAT",
        }
    }

    fn has_distinct_keyword(&self) -> bool {
        match self {
            Aggregation::CountAll { distinct }
            | Aggregation::Count(_, distinct)
            | Aggregation::Sum(_, distinct)
            | Aggregation::Avg(_, distinct)
            | Aggregation::Min(_, distinct)
            | Aggregation::Max(_, distinct)
            | Aggregation::Sample(_, distinct)
            | Aggregation::GroupConcat { distinct, .. } => *distinct,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        if self.has_distinct_keyword() {
            write!(f, "DISTINCT ")?;
        }
        match self {
            Aggregation::CountAll { .. } => write!(f, "*")?,
            Aggregation::GroupConcat {
                expression,
                separator,
                ..
            } => {
                write!(f, "{expression}")?;
                if separator != " " {
                    write!(f, "; SEPARATOR={}", Term::string(separator.as_str()))?;
                }
            }
            other => write!(f, "{}", other.expression())?,
        }
        write!(f, ")")
    }
}

/// Binding of an aggregate's result to a (hidden) variable.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AggregationMapping {
    /// The aggregate.
    pub aggregation: Aggregation,
    /// Variable receiving the aggregate's value.
    pub variable: String,
}

/// Ranking or aggregate function evaluated over a window.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum WindowFunction {
    /// `ROW_NUMBER()`
    RowNumber,
    /// `RANK()`
    Rank,
    /// `DENSE_RANK()`
    DenseRank,
    /// Aggregate evaluated per window frame.
    Aggregation(Aggregation),
}

/// `fn() OVER (PARTITION BY .. ORDER BY ..)`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct WindowApplication {
    /// Function evaluated per partition.
    pub function: WindowFunction,
    /// Partition expressions.
    pub partition: Vec<Expression>,
    /// Ordering within each partition.
    pub order: Vec<SortComparator>,
}

impl WindowApplication {
    /// Variables read by the window's function, partitioning, and ordering.
    pub fn variables(&self) -> VariableSet {
        let mut out = VariableSet::new();
        if let WindowFunction::Aggregation(agg) = &self.function {
            out.extend(agg.expression().variables());
        }
        for expr in &self.partition {
            out.extend(expr.variables());
        }
        for cmp in &self.order {
            out.extend(cmp.expression.variables());
        }
        out
    }
}

/// Binding of a window function's result to a (hidden) variable.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct WindowMapping {
    /// The window application.
    pub application: WindowApplication,
    /// Variable receiving the value.
    pub variable: String,
}
