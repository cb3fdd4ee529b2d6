//! Error types for the clinical_core library.

use crate::CmId;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for clinical_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Branch probabilities of a branch set don't add up to 1.0
    #[error("Branch probabilities for node {id} add up to {sum}, expected 1.0 (±0.001)")]
    BranchProbability { id: CmId, sum: f64 },

    /// Branch set is structurally invalid
    #[error("Invalid branch set {id}: {reason}")]
    InvalidBranchSet { id: CmId, reason: String },

    /// Leaf medication is invalid
    #[error("Invalid medication in leaf {id}: {reason}")]
    InvalidMedication { id: CmId, reason: String },

    /// Leaf references a drug the scenario doesn't describe
    #[error("Leaf {id} references undescribed drug '{drug}'")]
    UnknownDrug { id: CmId, drug: String },

    /// Two nodes registered under the same id
    #[error("Node {0} is registered more than once")]
    DuplicateNode(CmId),

    /// Node key can never be produced by a masked lookup
    #[error("Node {id} can never be reached under mask {mask}")]
    UnreachableNode { id: CmId, mask: CmId },

    /// No node registered for a reachable identifier
    #[error("No node for id {masked} (unmasked: {id})")]
    MissingNode { id: CmId, masked: CmId },

    /// Traversal did not reach a leaf within the step limit
    #[error("Traversal from {id} did not reach a leaf within {steps} steps")]
    TraversalLimit { id: CmId, steps: usize },

    /// Caller broke the execution contract
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error stems from the scenario definition rather than IO
    /// or a caller bug.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::BranchProbability { .. }
                | Error::InvalidBranchSet { .. }
                | Error::InvalidMedication { .. }
                | Error::UnknownDrug { .. }
                | Error::DuplicateNode(_)
                | Error::UnreachableNode { .. }
                | Error::MissingNode { .. }
                | Error::TraversalLimit { .. }
        )
    }
}
