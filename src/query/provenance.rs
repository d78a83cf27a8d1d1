//! Token provenance recorded by the parser.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::query::algebra::Algebra;

/// Inclusive range of token sequence numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenRange {
    /// First token index.
    pub first: usize,
    /// Last token index (inclusive).
    pub last: usize,
}

impl TokenRange {
    /// Builds a range; the bounds are swapped if given in reverse.
    pub fn new(first: usize, last: usize) -> Self {
        if first <= last {
            Self { first, last }
        } else {
            Self {
                first: last,
                last: first,
            }
        }
    }

    /// Range covering a single token.
    pub fn single(index: usize) -> Self {
        Self {
            first: index,
            last: index,
        }
    }

    /// Iterates over every token index in the range.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        self.first..=self.last
    }
}

/// Map from algebra nodes to the token ranges they were parsed from.
///
/// Entries are keyed structurally: two equal subtrees parsed from different
/// places in the query share one entry holding both origins.
#[derive(Clone, Debug, Default)]
pub struct Provenance {
    ranges: FxHashMap<Algebra, BTreeSet<TokenRange>>,
}

impl Provenance {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `own` ranges for `node`, together with everything already
    /// recorded for its structural children.
    pub fn record(&mut self, node: &Algebra, own: impl IntoIterator<Item = TokenRange>) {
        let mut ranges: BTreeSet<TokenRange> = own.into_iter().collect();
        for child in node.children() {
            if let Some(child_ranges) = self.ranges.get(child) {
                ranges.extend(child_ranges.iter().copied());
            }
        }
        if ranges.is_empty() {
            return;
        }
        self.ranges.entry(node.clone()).or_default().extend(ranges);
    }

    /// Token ranges `node` was parsed from; empty for nodes with no source syntax.
    pub fn token_ranges(&self, node: &Algebra) -> BTreeSet<TokenRange> {
        self.ranges.get(node).cloned().unwrap_or_default()
    }

    /// Number of distinct nodes with recorded provenance.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
