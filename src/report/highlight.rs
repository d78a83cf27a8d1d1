//! Highlight range arithmetic and rendering.
//!
//! Highlights are expressed against token indices. Algebra-node selections
//! are resolved through the parser's provenance; token-kind selections are
//! matched directly against the re-lexed text. Every resolution re-lexes the
//! text that will actually be printed, so offsets always match the output.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use nu_ansi_term::Color;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::walk::WalkConfig;
use crate::query::algebra::Algebra;
use crate::query::errors::ParseError;
use crate::query::lexer::{LexError, Lexer, PositionedToken, Token};
use crate::query::parser::parse;
use crate::query::provenance::TokenRange;
use crate::query::serialize::reformat;

const PALETTE: [Color; 5] = [
    Color::Red,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Magenta,
];

/// Inclusive byte range of highlighted text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextRange {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset of the last byte.
    pub end: usize,
}

impl TextRange {
    /// Range spanning one token.
    pub fn of_token(token: &PositionedToken) -> Self {
        Self {
            start: token.start,
            end: token.end.saturating_sub(1).max(token.start),
        }
    }
}

/// Predicate picking algebra nodes.
pub type NodePredicate = Arc<dyn Fn(&Algebra) -> bool + Send + Sync>;
/// Predicate picking tokens.
pub type TokenPredicate = Arc<dyn Fn(&Token) -> bool + Send + Sync>;

/// What a highlight group covers.
#[derive(Clone)]
pub enum Selection {
    /// Every token any matching node was parsed from.
    Nodes(NodePredicate),
    /// Every token matching the predicate.
    Tokens(TokenPredicate),
    /// Tokens of the `include` nodes that do not belong to any `exclude` node.
    Difference {
        /// Nodes contributing tokens.
        include: NodePredicate,
        /// Nodes whose tokens are removed again.
        exclude: NodePredicate,
    },
}

impl Selection {
    /// Selects nodes structurally equal to `node`.
    pub fn node(node: &Algebra) -> Self {
        Selection::Nodes(equal_to(node))
    }

    /// Selects the syntax of `include` that is not part of `exclude`.
    pub fn difference(include: &Algebra, exclude: &Algebra) -> Self {
        Selection::Difference {
            include: equal_to(include),
            exclude: equal_to(exclude),
        }
    }

    /// Selects tokens by predicate.
    pub fn tokens<F>(predicate: F) -> Self
    where
        F: Fn(&Token) -> bool + Send + Sync + 'static,
    {
        Selection::Tokens(Arc::new(predicate))
    }

    fn needs_provenance(&self) -> bool {
        !matches!(self, Selection::Tokens(_))
    }
}

fn equal_to(node: &Algebra) -> NodePredicate {
    let target = node.clone();
    Arc::new(move |candidate| *candidate == target)
}

/// One named, colored group of highlighted text.
#[derive(Clone)]
pub struct HighlightGroup {
    /// Short label shown with the group.
    pub label: String,
    /// What the group covers.
    pub selection: Selection,
}

/// The parts of a query an issue points at.
///
/// Groups are painted with successive palette colors.
#[derive(Clone, Default)]
pub struct HighlightSpec {
    groups: Vec<HighlightGroup>,
}

impl HighlightSpec {
    /// No highlighting.
    pub fn none() -> Self {
        Self::default()
    }

    /// A spec with a single group.
    pub fn new(label: impl Into<String>, selection: Selection) -> Self {
        Self::none().with(label, selection)
    }

    /// Adds another group.
    pub fn with(mut self, label: impl Into<String>, selection: Selection) -> Self {
        self.groups.push(HighlightGroup {
            label: label.into(),
            selection,
        });
        self
    }

    /// Groups in color order.
    pub fn groups(&self) -> &[HighlightGroup] {
        &self.groups
    }

    /// True when nothing is highlighted.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Debug for HighlightSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.groups.iter().map(|g| &g.label))
            .finish()
    }
}

/// Highlight ranges could not be computed for a query.
#[derive(Debug, Error)]
pub enum RangeResolutionError {
    /// The query no longer parses.
    #[error("failed to re-parse query: {0}")]
    Parse(#[from] ParseError),
    /// The text to print could not be tokenized.
    #[error("failed to re-lex query: {0}")]
    Lex(#[from] LexError),
}

/// Text to print together with the ranges to paint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedHighlights {
    /// Reformatted query text.
    pub text: String,
    /// Ranges in `text`, each with the index of its group.
    pub ranges: Vec<(TextRange, usize)>,
}

/// Builds the smallest set of ranges covering the tokens whose indices are
/// listed, joining tokens with consecutive indices.
pub fn coalesce(tokens: &[PositionedToken], indices: &BTreeSet<usize>) -> Vec<TextRange> {
    let mut ranges: Vec<TextRange> = Vec::new();
    let mut previous: Option<usize> = None;
    for token in tokens.iter().filter(|t| indices.contains(&t.index)) {
        let range = TextRange::of_token(token);
        match (previous, ranges.last_mut()) {
            (Some(p), Some(last)) if p + 1 == token.index => last.end = range.end,
            _ => ranges.push(range),
        }
        previous = Some(token.index);
    }
    ranges
}

/// One range per listed token, never joined.
pub fn singletons(tokens: &[PositionedToken], indices: &BTreeSet<usize>) -> Vec<TextRange> {
    tokens
        .iter()
        .filter(|t| indices.contains(&t.index))
        .map(TextRange::of_token)
        .collect()
}

/// Token indices covered by a set of token ranges.
pub fn expand(ranges: &BTreeSet<TokenRange>) -> BTreeSet<usize> {
    ranges.iter().flat_map(|r| r.indices()).collect()
}

/// Resolves `spec` against `source`, reformatting the text to print first.
pub fn resolve(
    source: &str,
    spec: &HighlightSpec,
    pretty: bool,
) -> Result<ResolvedHighlights, RangeResolutionError> {
    let text = reformat(source, pretty)?;
    if spec.is_empty() {
        return Ok(ResolvedHighlights {
            text,
            ranges: Vec::new(),
        });
    }
    let parsed = if spec.groups.iter().any(|g| g.selection.needs_provenance()) {
        Some(parse(source)?)
    } else {
        None
    };
    let tokens = Lexer::tokenize(&text)?;

    let covered = |predicate: &NodePredicate| -> BTreeSet<usize> {
        let mut indices = BTreeSet::new();
        if let Some(parsed) = &parsed {
            let nodes = parsed.query.algebra.nodes(WalkConfig::subqueries_only());
            for node in nodes.into_iter().filter(|n| predicate(n)) {
                indices.extend(expand(&parsed.provenance.token_ranges(node)));
            }
        }
        indices
    };

    let mut ranges = Vec::new();
    for (group, highlight) in spec.groups.iter().enumerate() {
        let found = match &highlight.selection {
            Selection::Nodes(predicate) => coalesce(&tokens, &covered(predicate)),
            Selection::Tokens(predicate) => {
                let indices = tokens
                    .iter()
                    .filter(|t| predicate(&t.token))
                    .map(|t| t.index)
                    .collect();
                coalesce(&tokens, &indices)
            }
            Selection::Difference { include, exclude } => {
                let excluded = covered(exclude);
                let indices: BTreeSet<usize> =
                    covered(include).difference(&excluded).copied().collect();
                singletons(&tokens, &indices)
            }
        };
        debug!(group = %highlight.label, ranges = found.len(), "resolved highlight group");
        ranges.extend(found.into_iter().map(|r| (r, group)));
    }
    Ok(ResolvedHighlights { text, ranges })
}

/// How highlighted text is marked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Painter {
    /// ANSI colors, one per group.
    Ansi,
    /// `[[` and `]]` around each range.
    Markers,
    /// Leave the text as is.
    Plain,
}

impl Painter {
    /// Marks `text` as belonging to `group`.
    pub fn paint(self, group: usize, text: &str) -> String {
        match self {
            Painter::Ansi => PALETTE[group % PALETTE.len()].paint(text).to_string(),
            Painter::Markers => format!("[[{text}]]"),
            Painter::Plain => text.to_owned(),
        }
    }
}

/// Replaces every range with its painted form, last range first.
///
/// A range overlapping one already painted, or not on character boundaries,
/// is left unpainted.
pub fn render(text: &str, ranges: &[(TextRange, usize)], painter: Painter) -> String {
    let mut ordered: Vec<&(TextRange, usize)> = ranges.iter().collect();
    ordered.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = text.to_owned();
    let mut limit = text.len();
    for (range, group) in ordered {
        let end = range.end + 1;
        if end > limit || !text.is_char_boundary(range.start) || !text.is_char_boundary(end) {
            debug!(start = range.start, end = range.end, "skipping overlapping highlight");
            continue;
        }
        let painted = painter.paint(*group, &text[range.start..end]);
        out.replace_range(range.start..end, &painted);
        limit = range.start;
    }
    out
}

/// Reformats and paints `source`; prints it unhighlighted when the ranges
/// cannot be resolved.
pub fn highlight(source: &str, spec: &HighlightSpec, pretty: bool, painter: Painter) -> String {
    match resolve(source, spec, pretty) {
        Ok(resolved) => render(&resolved.text, &resolved.ranges, painter),
        Err(err) => {
            warn!(error = %err, "printing query without highlights");
            reformat(source, pretty).unwrap_or_else(|_| source.to_owned())
        }
    }
}
