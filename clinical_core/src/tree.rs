//! Probabilistic case-management decision tree.
//!
//! The tree is a registry from masked [`CmId`]s to nodes. Branch sets pick an
//! outcome with one uniform draw and OR it into the identifier; leaves end the
//! traversal with a treatment. Traversal resolves diagnostic placeholders
//! before every lookup.

use crate::diagnostic::DiagnosticTest;
use crate::rng::UniformSource;
use crate::scenario::{BranchSetConfig, TreeConfig};
use crate::treatment::CaseTreatment;
use crate::{CmId, DiagnosticResult, Error, Result};
use std::collections::{HashMap, HashSet};

/// Accepted deviation of a branch set's probability sum from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 0.001;

/// Upper bound on nodes visited by a single traversal.
///
/// Outcomes only ever add bits to the identifier, so a legal tree reaches a
/// leaf long before this; hitting it means the configuration loops.
pub const MAX_TRAVERSAL_STEPS: usize = 64;

/// One outcome of a branch set
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Branch {
    pub outcome: CmId,
    /// Running sum of probabilities up to and including this branch
    pub cum_p: f64,
}

/// Internal node choosing between outcomes by a single draw.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchSet {
    branches: Vec<Branch>,
}

impl BranchSet {
    /// Accumulate configured probabilities into cumulative ones.
    ///
    /// The sum must lie within [`PROBABILITY_TOLERANCE`] of 1.0; the last
    /// cumulative probability is then set to exactly 1.0 so every draw in
    /// `[0, 1)` selects a branch.
    pub fn from_config(config: &BranchSetConfig, mask: CmId) -> Result<Self> {
        let id = config.id;
        if config.branches.is_empty() {
            return Err(Error::InvalidBranchSet {
                id,
                reason: "no branches".into(),
            });
        }

        let mut branches = Vec::with_capacity(config.branches.len());
        let mut accumulated = 0.0;
        for branch in &config.branches {
            if !(branch.p.is_finite() && branch.p >= 0.0) {
                return Err(Error::InvalidBranchSet {
                    id,
                    reason: format!("outcome {} has probability {}", branch.outcome, branch.p),
                });
            }
            if (id | branch.outcome).masked(mask) == id {
                return Err(Error::InvalidBranchSet {
                    id,
                    reason: format!(
                        "outcome {} adds no bits under mask {} and would revisit this node",
                        branch.outcome, mask
                    ),
                });
            }

            accumulated += branch.p;
            branches.push(Branch {
                outcome: branch.outcome,
                cum_p: accumulated,
            });
        }

        if !(1.0 - PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE).contains(&accumulated) {
            return Err(Error::BranchProbability {
                id,
                sum: accumulated,
            });
        }
        // Rounding may push a running sum just past 1.0 ahead of trailing
        // zero-probability branches; keep the sequence non-decreasing.
        for branch in &mut branches {
            branch.cum_p = branch.cum_p.min(1.0);
        }
        if let Some(last) = branches.last_mut() {
            last.cum_p = 1.0;
        }

        Ok(Self { branches })
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// First branch whose cumulative probability reaches `draw`.
    pub fn select(&self, draw: f64) -> &Branch {
        debug_assert!((0.0..1.0).contains(&draw), "draw {} outside [0, 1)", draw);
        let last = self.branches.len() - 1;
        let index = self
            .branches
            .iter()
            .position(|b| b.cum_p >= draw)
            .unwrap_or(last);
        &self.branches[index]
    }
}

/// A registered tree node
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    BranchSet(BranchSet),
    Leaf(CaseTreatment),
}

/// Outcome of a traversal: the final identifier and the leaf reached.
#[derive(Clone, Copy, Debug)]
pub struct Resolution<'t> {
    pub id: CmId,
    pub treatment: &'t CaseTreatment,
}

/// Immutable registry of decision nodes plus the lookup mask.
#[derive(Clone, Debug)]
pub struct DecisionTree {
    mask: CmId,
    nodes: HashMap<CmId, Node>,
}

impl DecisionTree {
    /// Build the registry from a scenario definition.
    ///
    /// Every node key is stored as configured. Lookups mask the query, so a
    /// key with bits outside the mask could never be found and is rejected,
    /// as is a key carrying the UNDETERMINED result placeholder.
    pub fn build(config: &TreeConfig) -> Result<Self> {
        let mask = config.mask;
        let known_drugs: HashSet<&str> = config.drugs.iter().map(String::as_str).collect();
        let mut nodes = HashMap::with_capacity(config.branch_sets.len() + config.leaves.len());

        for set in &config.branch_sets {
            check_key(set.id, mask)?;
            let node = Node::BranchSet(BranchSet::from_config(set, mask)?);
            if nodes.insert(set.id, node).is_some() {
                return Err(Error::DuplicateNode(set.id));
            }
        }

        for leaf in &config.leaves {
            check_key(leaf.id, mask)?;
            let node = Node::Leaf(CaseTreatment::from_config(leaf, &known_drugs)?);
            if nodes.insert(leaf.id, node).is_some() {
                return Err(Error::DuplicateNode(leaf.id));
            }
        }

        tracing::info!(
            "Built case-management tree: {} branch sets, {} leaves, mask {}",
            config.branch_sets.len(),
            config.leaves.len(),
            mask
        );

        Ok(Self { mask, nodes })
    }

    pub fn mask(&self) -> CmId {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    pub fn branch_set_count(&self) -> usize {
        self.len() - self.leaf_count()
    }

    /// Node for `id` after masking.
    pub fn lookup(&self, id: CmId) -> Result<&Node> {
        let masked = id.masked(self.mask);
        self.nodes
            .get(&masked)
            .ok_or(Error::MissingNode { id, masked })
    }

    /// Walk the tree from `id` until a leaf is reached.
    ///
    /// Draws exactly one value from `rng` per branch set visited, plus
    /// whatever `diagnostic` draws for each UNDETERMINED placeholder.
    /// `density` is handed to the diagnostic test.
    pub fn resolve<'t>(
        &'t self,
        id: CmId,
        density: f64,
        rng: &mut dyn UniformSource,
        diagnostic: &dyn DiagnosticTest,
    ) -> Result<Resolution<'t>> {
        let start = id;
        let mut id = id;

        for _ in 0..MAX_TRAVERSAL_STEPS {
            if id.result() == DiagnosticResult::Undetermined {
                let result = if diagnostic.is_positive(density, rng) {
                    DiagnosticResult::Positive
                } else {
                    DiagnosticResult::Negative
                };
                id = id.with_result(result);
                tracing::debug!("Diagnostic at density {}: {:?} -> {}", density, result, id);
            }

            match self.lookup(id)? {
                Node::Leaf(treatment) => {
                    tracing::debug!("Reached leaf {} from {}", id, start);
                    return Ok(Resolution { id, treatment });
                }
                Node::BranchSet(set) => {
                    let draw = rng.uniform();
                    let branch = set.select(draw);
                    tracing::debug!("Branch at {}: draw {:.6} -> outcome {}", id, draw, branch.outcome);
                    id |= branch.outcome;
                }
            }
        }

        Err(Error::TraversalLimit {
            id: start,
            steps: MAX_TRAVERSAL_STEPS,
        })
    }

    pub(crate) fn nodes(&self) -> &HashMap<CmId, Node> {
        &self.nodes
    }
}

fn check_key(id: CmId, mask: CmId) -> Result<()> {
    if id.masked(mask) != id || id.result() == DiagnosticResult::Undetermined {
        return Err(Error::UnreachableNode { id, mask });
    }
    Ok(())
}
