//! Text output: whitespace normalization of query text and diagnostic dumps.

use std::fmt;

use crate::query::algebra::{Query, QueryForm};
use crate::query::lexer::{LexError, Lexer, Token};

/// Keywords that start a new line in pretty mode.
const BREAK_BEFORE: &[&str] = &[
    "PREFIX", "BASE", "SELECT", "ASK", "CONSTRUCT", "DESCRIBE", "FROM", "WHERE", "OPTIONAL",
    "MINUS", "UNION", "FILTER", "BIND", "VALUES", "GRAPH", "SERVICE", "GROUP", "HAVING", "ORDER",
    "LIMIT", "OFFSET",
];

/// Re-emits `text` with normalized whitespace.
///
/// The token stream is untouched: the output lexes to the same tokens in the
/// same order, so token indices recorded against `text` stay valid for the
/// returned string. Comments are dropped. In pretty mode every group gets
/// its own indented block and each triple its own line.
pub fn reformat(text: &str, pretty: bool) -> Result<String, LexError> {
    let tokens = Lexer::tokenize(text)?;
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut depth = 0usize;
    let mut line_start = true;
    let mut previous: Option<&Token> = None;

    for positioned in &tokens {
        let token = &positioned.token;
        if pretty {
            match token {
                Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    break_line(&mut out, &mut line_start);
                }
                Token::Keyword(word) if BREAK_BEFORE.contains(&word.as_str()) => {
                    break_line(&mut out, &mut line_start);
                }
                _ => {}
            }
        }
        if line_start {
            if pretty {
                out.push_str(&"  ".repeat(depth));
            }
        } else if needs_space(previous, token) {
            out.push(' ');
        }
        out.push_str(&text[positioned.start..positioned.end]);
        line_start = false;

        if pretty {
            match token {
                Token::LBrace => {
                    depth += 1;
                    break_line(&mut out, &mut line_start);
                }
                Token::Dot if depth > 0 => break_line(&mut out, &mut line_start),
                Token::RBrace => break_line(&mut out, &mut line_start),
                _ => {}
            }
        }
        previous = Some(token);
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    Ok(out)
}

fn break_line(out: &mut String, line_start: &mut bool) {
    if *line_start {
        return;
    }
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out.push('\n');
    *line_start = true;
}

fn needs_space(previous: Option<&Token>, current: &Token) -> bool {
    if matches!(
        current,
        Token::Comma
            | Token::Semicolon
            | Token::RParen
            | Token::LangTag(_)
            | Token::DoubleCaret
            | Token::Question
    ) {
        return false;
    }
    !matches!(previous, None | Some(Token::LParen | Token::DoubleCaret))
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.form {
            QueryForm::Select => writeln!(f, "SELECT")?,
            QueryForm::Ask => writeln!(f, "ASK")?,
            QueryForm::Construct(template) => {
                writeln!(f, "CONSTRUCT {{")?;
                for triple in template {
                    writeln!(f, "  {triple}")?;
                }
                writeln!(f, "}}")?;
            }
            QueryForm::Describe(targets) => {
                let targets: Vec<String> = targets.iter().map(ToString::to_string).collect();
                writeln!(f, "DESCRIBE {}", targets.join(" "))?;
            }
        }
        if let Some(dataset) = &self.dataset {
            for graph in &dataset.default_graphs {
                writeln!(f, "FROM {graph}")?;
            }
            for graph in &dataset.named_graphs {
                writeln!(f, "FROM NAMED {graph}")?;
            }
        }
        write!(f, "{}", self.algebra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token> {
        Lexer::tokenize(text)
            .expect("lex")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn compact_mode_normalizes_whitespace() {
        let text = "SELECT  ?s\nWHERE{?s ?p \"x\"@en , ?o.  FILTER( ?o != 1 )}";
        assert_eq!(
            reformat(text, false).expect("reformat"),
            "SELECT ?s WHERE { ?s ?p \"x\"@en, ?o . FILTER (?o != 1) }"
        );
    }

    #[test]
    fn pretty_mode_indents_groups() {
        let text = "SELECT * WHERE { ?s ?p ?o . OPTIONAL { ?o ?q ?r } }";
        let pretty = reformat(text, true).expect("reformat");
        assert_eq!(
            pretty,
            "SELECT *\nWHERE {\n  ?s ?p ?o .\n  OPTIONAL {\n    ?o ?q ?r\n  }\n}"
        );
    }

    #[test]
    fn token_stream_is_preserved() {
        let text = "PREFIX ex: <http://example.org/> SELECT (COUNT(*) AS ?n) WHERE { ?s ex:p+/^ex:q? ?o ; ex:r \"1\"^^<http://www.w3.org/2001/XMLSchema#int> } GROUP BY ?s # note\nLIMIT 5";
        for pretty in [false, true] {
            let out = reformat(text, pretty).expect("reformat");
            assert_eq!(kinds(&out), kinds(text), "pretty={pretty}: {out}");
        }
    }
}
