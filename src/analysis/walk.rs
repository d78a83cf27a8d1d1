//! Pre-order traversal over algebra trees.

use std::convert::Infallible;

use crate::query::algebra::Algebra;

/// Controls which nested trees a walk enters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkConfig {
    /// Enter the algebra of `Subquery` nodes.
    pub descend_into_subqueries: bool,
    /// Enter patterns embedded in expressions (`EXISTS { .. }`).
    pub descend_into_expressions: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            descend_into_subqueries: true,
            descend_into_expressions: true,
        }
    }
}

impl WalkConfig {
    /// Visits only the current query's own operators.
    pub const fn shallow() -> Self {
        Self {
            descend_into_subqueries: false,
            descend_into_expressions: false,
        }
    }

    /// Enters subqueries but not expression-embedded patterns.
    pub const fn subqueries_only() -> Self {
        Self {
            descend_into_subqueries: true,
            descend_into_expressions: false,
        }
    }
}

impl Algebra {
    /// Calls `visit` on this node and then on every descendant allowed by
    /// `config`, parents before children, children in evaluation order.
    ///
    /// Structural children are visited before a node's subquery body and
    /// before patterns embedded in its expressions. The first error returned
    /// by `visit` stops the walk and is handed back to the caller.
    pub fn walk<'a, E, F>(&'a self, config: WalkConfig, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(&'a Algebra) -> Result<(), E>,
    {
        visit(self)?;
        for child in self.children() {
            child.walk(config, visit)?;
        }
        if config.descend_into_subqueries {
            if let Algebra::Subquery(query) = self {
                query.algebra.walk(config, visit)?;
            }
        }
        if config.descend_into_expressions {
            for expression in self.expressions() {
                for pattern in expression.embedded_patterns() {
                    pattern.walk(config, visit)?;
                }
            }
        }
        Ok(())
    }

    /// Every node reached by [`Algebra::walk`], in visiting order.
    pub fn nodes(&self, config: WalkConfig) -> Vec<&Algebra> {
        let mut out = Vec::new();
        let visited: Result<(), Infallible> = self.walk(config, &mut |node| {
            out.push(node);
            Ok(())
        });
        match visited {
            Ok(()) => out,
            Err(never) => match never {},
        }
    }
}
