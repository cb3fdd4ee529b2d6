//! Parasitological diagnostic tests.
//!
//! The decision tree asks for a test by setting the result sub-field of an
//! identifier to UNDETERMINED; traversal then calls a [`DiagnosticTest`].

use crate::rng::UniformSource;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Test turning a parasite density into a binary outcome.
pub trait DiagnosticTest {
    /// `density` is in parasites per µL and must be non-negative.
    /// Stochastic tests draw from `rng`; deterministic tests must not touch
    /// it.
    fn is_positive(&self, density: f64, rng: &mut dyn UniformSource) -> bool;
}

/// Configurable diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Positive iff `density >= detection_limit`. A limit of 0 always tests
    /// positive.
    Deterministic { detection_limit: f64 },
    /// Positive with probability
    /// `1 - specificity + specificity * density / (density + detection_limit)`.
    /// Here `detection_limit` is the density with a half chance of detection.
    Stochastic {
        detection_limit: f64,
        specificity: f64,
    },
}

impl Diagnostic {
    pub fn deterministic(detection_limit: f64) -> Result<Self> {
        let diagnostic = Diagnostic::Deterministic { detection_limit };
        diagnostic.validate()?;
        Ok(diagnostic)
    }

    pub fn stochastic(detection_limit: f64, specificity: f64) -> Result<Self> {
        let diagnostic = Diagnostic::Stochastic {
            detection_limit,
            specificity,
        };
        diagnostic.validate()?;
        Ok(diagnostic)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Diagnostic::Deterministic { detection_limit } => {
                if !(detection_limit.is_finite() && detection_limit >= 0.0) {
                    return Err(Error::Config(format!(
                        "diagnostic detection limit must be >= 0, got {}",
                        detection_limit
                    )));
                }
            }
            Diagnostic::Stochastic {
                detection_limit,
                specificity,
            } => {
                if !(detection_limit.is_finite() && detection_limit > 0.0) {
                    return Err(Error::Config(format!(
                        "stochastic diagnostic needs a positive detection limit, got {}",
                        detection_limit
                    )));
                }
                if !(0.0..=1.0).contains(&specificity) {
                    return Err(Error::Config(format!(
                        "diagnostic specificity must lie in [0, 1], got {}",
                        specificity
                    )));
                }
            }
        }
        Ok(())
    }

    /// Probability of a positive outcome at `density`.
    pub fn p_positive(&self, density: f64) -> f64 {
        match *self {
            Diagnostic::Deterministic { detection_limit } => {
                if density >= detection_limit {
                    1.0
                } else {
                    0.0
                }
            }
            Diagnostic::Stochastic {
                detection_limit,
                specificity,
            } => 1.0 - specificity + specificity * density / (density + detection_limit),
        }
    }
}

impl Default for Diagnostic {
    fn default() -> Self {
        Diagnostic::Deterministic {
            detection_limit: 40.0,
        }
    }
}

impl DiagnosticTest for Diagnostic {
    fn is_positive(&self, density: f64, rng: &mut dyn UniformSource) -> bool {
        debug_assert!(density >= 0.0, "negative parasite density {}", density);
        match self {
            Diagnostic::Deterministic { detection_limit } => density >= *detection_limit,
            Diagnostic::Stochastic { .. } => rng.uniform() < self.p_positive(density),
        }
    }
}
