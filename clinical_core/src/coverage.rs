//! Static coverage check of a decision tree.
//!
//! Walks every path a traversal could take from a set of root identifiers
//! without drawing randomness: all selectable branches of every branch set
//! and both outcomes of every diagnostic. A scenario passing this check can
//! never fail a traversal with a missing node.

use crate::tree::{BranchSet, DecisionTree, Node, MAX_TRAVERSAL_STEPS};
use crate::{CmId, DiagnosticResult, Error, Result};
use std::collections::BTreeSet;

/// Summary of a successful coverage check
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageReport {
    pub roots: usize,
    /// Number of distinct root-to-leaf paths
    pub paths: usize,
    /// Masked ids of the leaves reached
    pub leaves_reached: BTreeSet<CmId>,
    /// Registered nodes no path visits
    pub unused_nodes: Vec<CmId>,
}

impl BranchSet {
    /// Branches some draw in `[0, 1)` can select.
    ///
    /// The first branch is always selectable (a draw of 0.0 picks it);
    /// later branches need a cumulative probability above their
    /// predecessor's.
    pub fn selectable(&self) -> impl Iterator<Item = &crate::tree::Branch> {
        let branches = self.branches();
        branches
            .iter()
            .enumerate()
            .filter(move |(i, b)| *i == 0 || b.cum_p > branches[i - 1].cum_p)
            .map(|(_, b)| b)
    }
}

impl DecisionTree {
    /// Explore every path from `roots`.
    ///
    /// Fails with [`Error::MissingNode`] for the first lookup that has no
    /// node, or [`Error::TraversalLimit`] when a path is longer than
    /// [`MAX_TRAVERSAL_STEPS`] nodes.
    pub fn check_coverage(&self, roots: &[CmId]) -> Result<CoverageReport> {
        let mut report = CoverageReport {
            roots: roots.len(),
            ..CoverageReport::default()
        };
        let mut visited = BTreeSet::new();

        for &root in roots {
            let mut stack = vec![(root, 0usize)];

            while let Some((id, depth)) = stack.pop() {
                if id.result() == DiagnosticResult::Undetermined {
                    stack.push((id.with_result(DiagnosticResult::Negative), depth));
                    stack.push((id.with_result(DiagnosticResult::Positive), depth));
                    continue;
                }
                if depth >= MAX_TRAVERSAL_STEPS {
                    return Err(Error::TraversalLimit {
                        id: root,
                        steps: MAX_TRAVERSAL_STEPS,
                    });
                }

                let masked = id.masked(self.mask());
                visited.insert(masked);
                match self.lookup(id)? {
                    Node::Leaf(_) => {
                        report.paths += 1;
                        report.leaves_reached.insert(masked);
                    }
                    Node::BranchSet(set) => {
                        for branch in set.selectable() {
                            stack.push((id | branch.outcome, depth + 1));
                        }
                    }
                }
            }
        }

        let mut unused: Vec<CmId> = self
            .nodes()
            .keys()
            .filter(|id| !visited.contains(id))
            .copied()
            .collect();
        unused.sort();
        if !unused.is_empty() {
            tracing::warn!("{} tree nodes are never visited: {:?}", unused.len(), unused);
        }
        report.unused_nodes = unused;

        tracing::info!(
            "Coverage check passed: {} roots, {} paths, {} leaves reached",
            report.roots,
            report.paths,
            report.leaves_reached.len()
        );
        Ok(report)
    }
}
