//! RDF terms, pattern nodes, and property paths.

use std::fmt;

use serde::Serialize;

/// IRI of `rdf:type`, the expansion of the `a` keyword.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
/// IRI of `rdf:first`.
pub const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
/// IRI of `rdf:rest`.
pub const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
/// IRI of `rdf:nil`.
pub const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
/// Namespace of the XML Schema datatypes.
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// A concrete RDF term.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    /// Absolute (or unresolved relative) IRI.
    Iri {
        /// IRI text without angle brackets.
        value: String,
    },
    /// Literal with an optional language tag or datatype.
    Literal {
        /// Lexical form.
        value: String,
        /// Language tag, lowercased.
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        /// Datatype IRI for typed literals.
        #[serde(skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
    /// Blank node label.
    Blank {
        /// Label without the `_:` prefix.
        value: String,
    },
}

impl Term {
    /// Builds an IRI term.
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri {
            value: value.into(),
        }
    }

    /// Builds a plain string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    /// Builds a literal typed with an XML Schema datatype (`integer`, `boolean`, ...).
    pub fn xsd(value: impl Into<String>, local: &str) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: Some(format!("{XSD}{local}")),
        }
    }

    /// The boolean literal `true`.
    pub fn true_value() -> Self {
        Term::xsd("true", "boolean")
    }

    /// Returns the lexical value of the term.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri { value } | Term::Literal { value, .. } | Term::Blank { value } => value,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri { value } if value == RDF_TYPE => write!(f, "a"),
            Term::Iri { value } => write!(f, "<{value}>"),
            Term::Blank { value } => write!(f, "_:{value}"),
            Term::Literal {
                value,
                language,
                datatype,
            } => {
                if let Some(dt) = datatype.as_deref() {
                    match dt.strip_prefix(XSD) {
                        Some("integer" | "decimal" | "boolean") => return write!(f, "{value}"),
                        _ => {}
                    }
                }
                write!(f, "\"")?;
                for ch in value.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\r' => write!(f, "\\r")?,
                        '\t' => write!(f, "\\t")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "\"")?;
                if let Some(lang) = language {
                    write!(f, "@{lang}")
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{dt}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A position inside a triple pattern: either a variable or a bound term.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Node {
    /// Variable name without the leading `?`.
    Variable(String),
    /// Concrete term.
    Bound(Term),
}

impl Node {
    /// Builds a variable node.
    pub fn var(name: impl Into<String>) -> Self {
        Node::Variable(name.into())
    }

    /// Returns the variable name when the node is a variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Node::Variable(name) => Some(name),
            Node::Bound(_) => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Variable(name) => write!(f, "?{name}"),
            Node::Bound(term) => write!(f, "{term}"),
        }
    }
}

/// A single triple pattern of a basic graph pattern.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TriplePattern {
    /// Subject position.
    pub subject: Node,
    /// Predicate position.
    pub predicate: Node,
    /// Object position.
    pub object: Node,
}

impl TriplePattern {
    /// Builds a triple pattern.
    pub fn new(subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Iterates over the variables used by the pattern.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(Node::as_variable)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// SPARQL 1.1 property path expression.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PropertyPath {
    /// A single predicate IRI.
    Link(Term),
    /// `^path`
    Inverse(Box<PropertyPath>),
    /// `a/b`
    Sequence(Box<PropertyPath>, Box<PropertyPath>),
    /// `a|b`
    Alternative(Box<PropertyPath>, Box<PropertyPath>),
    /// `!(a|b)`
    NegatedSet(Vec<Term>),
    /// `path*`
    ZeroOrMore(Box<PropertyPath>),
    /// `path+`
    OneOrMore(Box<PropertyPath>),
    /// `path?`
    ZeroOrOne(Box<PropertyPath>),
}

impl PropertyPath {
    /// Binding strength: `|` is loosest, primaries are tightest.
    fn precedence(&self) -> u8 {
        match self {
            PropertyPath::Alternative(..) => 0,
            PropertyPath::Sequence(..) => 1,
            PropertyPath::Inverse(_) => 2,
            PropertyPath::ZeroOrMore(_) | PropertyPath::OneOrMore(_) | PropertyPath::ZeroOrOne(_) => 3,
            PropertyPath::Link(_) | PropertyPath::NegatedSet(_) => 4,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPath::Link(term) => write!(f, "{term}"),
            PropertyPath::Inverse(inner) => {
                write!(f, "^")?;
                inner.fmt_operand(f, 3)
            }
            PropertyPath::Sequence(lhs, rhs) => {
                lhs.fmt_operand(f, 1)?;
                write!(f, "/")?;
                rhs.fmt_operand(f, 2)
            }
            PropertyPath::Alternative(lhs, rhs) => {
                lhs.fmt_operand(f, 0)?;
                write!(f, "|")?;
                rhs.fmt_operand(f, 1)
            }
            PropertyPath::NegatedSet(terms) => {
                write!(f, "!(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{term}")?;
                }
                write!(f, ")")
            }
            PropertyPath::ZeroOrMore(inner) => {
                inner.fmt_operand(f, 4)?;
                write!(f, "*")
            }
            PropertyPath::OneOrMore(inner) => {
                inner.fmt_operand(f, 4)?;
                write!(f, "+")
            }
            PropertyPath::ZeroOrOne(inner) => {
                inner.fmt_operand(f, 4)?;
                write!(f, "?")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_boolean_literals_print_bare() {
        assert_eq!(Term::xsd("42", "integer").to_string(), "42");
        assert_eq!(Term::true_value().to_string(), "true");
        assert_eq!(
            Term::xsd("1.5e3", "double").to_string(),
            format!("\"1.5e3\"^^<{XSD}double>")
        );
    }

    #[test]
    fn literal_escapes_quotes() {
        let term = Term::Literal {
            value: "say \"hi\"".into(),
            language: Some("en".into()),
            datatype: None,
        };
        assert_eq!(term.to_string(), "\"say \\\"hi\\\"\"@en");
    }

    #[test]
    fn path_display_parenthesizes_compound_operands() {
        let p = Term::iri("http://example.org/p");
        let q = Term::iri("http://example.org/q");
        let path = PropertyPath::OneOrMore(Box::new(PropertyPath::Sequence(
            Box::new(PropertyPath::Link(p)),
            Box::new(PropertyPath::Inverse(Box::new(PropertyPath::Link(q)))),
        )));
        assert_eq!(
            path.to_string(),
            "(<http://example.org/p>/^<http://example.org/q>)+"
        );
    }

    #[test]
    fn path_display_keeps_needed_parentheses_only() {
        let link = |name: &str| Box::new(PropertyPath::Link(Term::iri(format!("http://x/{name}"))));
        let alternative = PropertyPath::Alternative(link("a"), link("b"));
        let sequence = PropertyPath::Sequence(
            Box::new(PropertyPath::Sequence(link("a"), link("b"))),
            Box::new(PropertyPath::Inverse(Box::new(PropertyPath::ZeroOrOne(link("c"))))),
        );
        assert_eq!(sequence.to_string(), "<http://x/a>/<http://x/b>/^<http://x/c>?");
        assert_eq!(
            PropertyPath::Inverse(Box::new(alternative.clone())).to_string(),
            "^(<http://x/a>|<http://x/b>)"
        );
        assert_eq!(
            PropertyPath::OneOrMore(Box::new(PropertyPath::Inverse(link("a")))).to_string(),
            "(^<http://x/a>)+"
        );
        assert_eq!(
            PropertyPath::Sequence(Box::new(alternative), link("c")).to_string(),
            "(<http://x/a>|<http://x/b>)/<http://x/c>"
        );
    }
}
