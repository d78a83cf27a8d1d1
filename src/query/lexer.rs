//! SPARQL tokenizer with source positions.
//!
//! Every token records its half-open byte range in the source and a 0-based
//! sequence number. Parser provenance is expressed in sequence numbers, so
//! highlighting only needs to re-lex a text to map those back to offsets.

use std::fmt;

use thiserror::Error;

/// Lexical token kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `<...>`, without the angle brackets.
    Iri(String),
    /// `prefix:local`; either side may be empty.
    PrefixedName {
        /// Namespace prefix.
        prefix: String,
        /// Local part.
        local: String,
    },
    /// `?name` or `$name`, without the sigil.
    Variable(String),
    /// `_:label`, without the `_:`.
    BlankLabel(String),
    /// String literal contents with escapes resolved.
    String(String),
    /// `@tag` following a string literal.
    LangTag(String),
    /// Unsigned integer literal.
    Integer(String),
    /// Unsigned decimal literal.
    Decimal(String),
    /// Unsigned double literal.
    Double(String),
    /// Bare word, uppercased (`SELECT`, `OPTIONAL`, `LANG`, `TRUE`, ...).
    Keyword(String),
    /// The `a` shorthand for `rdf:type`.
    A,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `^^`
    DoubleCaret,
    /// `?` as a path modifier.
    Question,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `!`
    Bang,
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
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
}

impl Token {
    /// True for a keyword token with the given (uppercase) spelling.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Keyword(k) if k == word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Iri(iri) => write!(f, "<{iri}>"),
            Token::PrefixedName { prefix, local } => write!(f, "{prefix}:{local}"),
            Token::Variable(name) => write!(f, "?{name}"),
            Token::BlankLabel(label) => write!(f, "_:{label}"),
            Token::String(value) => write!(f, "{value:?}"),
            Token::LangTag(tag) => write!(f, "@{tag}"),
            Token::Integer(v) | Token::Decimal(v) | Token::Double(v) => write!(f, "{v}"),
            Token::Keyword(word) => write!(f, "{word}"),
            Token::A => write!(f, "a"),
            other => write!(f, "{}", other.symbol()),
        }
    }
}

impl Token {
    fn symbol(&self) -> &'static str {
        match self {
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::DoubleCaret => "^^",
            Token::Question => "?",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Bang => "!",
            Token::Eq => "=",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            _ => "",
        }
    }
}

/// A token with its location in the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionedToken {
    /// Token kind and payload.
    pub token: Token,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// 0-based sequence number within the token stream.
    pub index: usize,
    /// 1-based line of `start`.
    pub line: u32,
    /// 1-based column (in characters) of `start`.
    pub column: u32,
}

/// Malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct LexError {
    /// Human-readable description.
    pub message: String,
    /// Byte offset where lexing failed.
    pub offset: usize,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// Streaming tokenizer over a query string.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    index: usize,
    previous_was_string: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer positioned at the start of `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            index: 0,
            previous_was_string: false,
        }
    }

    /// Tokenizes the whole input.
    pub fn tokenize(src: &str) -> Result<Vec<PositionedToken>, LexError> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Produces the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<PositionedToken>, LexError> {
        self.skip_trivia();
        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let (start, line, column) = (self.pos, self.line, self.column);
        let token = match ch {
            '<' => self.lex_angle(),
            '?' | '$' => self.lex_variable_or_question(),
            '"' | '\'' => self.lex_string(ch)?,
            '@' if self.previous_was_string => self.lex_lang_tag()?,
            '_' if self.peek_at(1) == Some(':') => self.lex_blank_label(),
            '0'..='9' => self.lex_number(),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
            ':' => self.lex_prefixed(String::new())?,
            c if is_name_start(c) => self.lex_word()?,
            _ => self.lex_symbol(ch)?,
        };
        self.previous_was_string = matches!(token, Token::String(_));
        let positioned = PositionedToken {
            token,
            start,
            end: self.pos,
            index: self.index,
            line,
            column,
        };
        self.index += 1;
        Ok(Some(positioned))
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
        self.src[start..self.pos].to_owned()
    }

    /// `<` starts an IRI when a `>` closes it before any character an IRI may not hold.
    fn lex_angle(&mut self) -> Token {
        let rest = &self.src[self.pos + 1..];
        let close = rest
            .char_indices()
            .find(|&(_, c)| c == '>' || c.is_whitespace() || "<\"{}|^`\\".contains(c));
        if let Some((offset, '>')) = close {
            let iri = rest[..offset].to_owned();
            for _ in 0..iri.chars().count() + 2 {
                self.advance();
            }
            return Token::Iri(iri);
        }
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            Token::Le
        } else {
            Token::Lt
        }
    }

    fn lex_variable_or_question(&mut self) -> Token {
        if self.peek_at(1).is_some_and(is_var_char) {
            self.advance();
            Token::Variable(self.take_while(is_var_char))
        } else {
            self.advance();
            Token::Question
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, LexError> {
        let long = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        for _ in 0..if long { 3 } else { 1 } {
            self.advance();
        }
        let mut value = String::new();
        loop {
            let Some(ch) = self.advance() else {
                return Err(self.error("unterminated string literal"));
            };
            match ch {
                '\\' => {
                    let escaped = self
                        .advance()
                        .ok_or_else(|| self.error("unterminated escape sequence"))?;
                    value.push(self.unescape(escaped)?);
                }
                c if c == quote && !long => break,
                c if c == quote && self.peek() == Some(quote) && self.peek_at(1) == Some(quote) => {
                    self.advance();
                    self.advance();
                    break;
                }
                '\n' | '\r' if !long => return Err(self.error("newline in string literal")),
                c => value.push(c),
            }
        }
        Ok(Token::String(value))
    }

    fn unescape(&mut self, escaped: char) -> Result<char, LexError> {
        Ok(match escaped {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '"' | '\'' | '\\' => escaped,
            'u' | 'U' => {
                let width = if escaped == 'u' { 4 } else { 8 };
                let mut hex = String::with_capacity(width);
                for _ in 0..width {
                    match self.advance() {
                        Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                        _ => return Err(self.error("malformed unicode escape")),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid unicode scalar in escape"))?
            }
            other => return Err(self.error(format!("unknown escape '\\{other}'"))),
        })
    }

    fn lex_lang_tag(&mut self) -> Result<Token, LexError> {
        self.advance();
        let tag = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-');
        if tag.is_empty() {
            return Err(self.error("empty language tag"));
        }
        Ok(Token::LangTag(tag.to_ascii_lowercase()))
    }

    fn lex_blank_label(&mut self) -> Token {
        self.advance();
        self.advance();
        Token::BlankLabel(self.take_local_name())
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        let mut kind = 0u8;
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.take_while(|c| c.is_ascii_digit());
            kind = 1;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.take_while(|c| c.is_ascii_digit());
                kind = 2;
            }
        }
        let text = self.src[start..self.pos].to_owned();
        match kind {
            0 => Token::Integer(text),
            1 => Token::Decimal(text),
            _ => Token::Double(text),
        }
    }

    fn lex_word(&mut self) -> Result<Token, LexError> {
        let word = self.take_while(is_name_char);
        // A trailing '.' ends the triple, not the name.
        let word = self.give_back_dots(word);
        if self.peek() == Some(':') {
            return self.lex_prefixed(word);
        }
        if word == "a" {
            return Ok(Token::A);
        }
        Ok(Token::Keyword(word.to_ascii_uppercase()))
    }

    fn lex_prefixed(&mut self, prefix: String) -> Result<Token, LexError> {
        self.advance();
        let local = self.take_local_name();
        Ok(Token::PrefixedName { prefix, local })
    }

    fn take_local_name(&mut self) -> String {
        let mut local = String::new();
        loop {
            match self.peek() {
                Some(c) if is_name_char(c) || c == ':' => {
                    self.advance();
                    local.push(c);
                }
                Some('%')
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_hexdigit())
                        && self.peek_at(2).is_some_and(|c| c.is_ascii_hexdigit()) =>
                {
                    for _ in 0..3 {
                        if let Some(c) = self.advance() {
                            local.push(c);
                        }
                    }
                }
                Some('\\') if self.peek_at(1).is_some_and(|c| !c.is_whitespace()) => {
                    self.advance();
                    if let Some(c) = self.advance() {
                        local.push(c);
                    }
                }
                _ => break,
            }
        }
        self.give_back_dots(local)
    }

    /// Un-consumes trailing dots, which terminate triples rather than names.
    fn give_back_dots(&mut self, mut name: String) -> String {
        while name.ends_with('.') {
            name.pop();
            self.pos -= 1;
            self.column -= 1;
        }
        name
    }

    fn lex_symbol(&mut self, ch: char) -> Result<Token, LexError> {
        let next = self.peek_at(1);
        let (token, width) = match (ch, next) {
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            (';', _) => (Token::Semicolon, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('|', _) => (Token::Pipe, 1),
            ('^', Some('^')) => (Token::DoubleCaret, 2),
            ('^', _) => (Token::Caret, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('!', Some('=')) => (Token::Ne, 2),
            ('!', _) => (Token::Bang, 1),
            ('=', _) => (Token::Eq, 1),
            ('>', Some('=')) => (Token::Ge, 2),
            ('>', _) => (Token::Gt, 1),
            ('&', Some('&')) => (Token::AndAnd, 2),
            (other, _) => return Err(self.error(format!("unexpected character '{other}'"))),
        };
        for _ in 0..width {
            self.advance();
        }
        Ok(token)
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '\u{b7}'
}

fn is_var_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\u{b7}'
}
