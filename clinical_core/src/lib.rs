#![forbid(unsafe_code)]

//! Core of the stochastic case-management decision engine.
//!
//! This crate provides:
//! - Decision identifiers and their bit protocol
//! - The probabilistic decision tree (registry, traversal, coverage check)
//! - Leaf treatments and medication queues
//! - Case-management execution for one sick individual
//! - Random sources and diagnostic tests consumed by traversal
//! - Scenario loading, configuration, logging and CSV traces

pub mod types;
pub mod error;
pub mod decision;
pub mod rng;
pub mod diagnostic;
pub mod scenario;
pub mod treatment;
pub mod tree;
pub mod coverage;
pub mod reference;
pub mod engine;
pub mod config;
pub mod logging;
pub mod trace;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use coverage::CoverageReport;
pub use diagnostic::{Diagnostic, DiagnosticTest};
pub use engine::CaseManagement;
pub use reference::get_reference_tree;
pub use rng::{ScriptedDraws, SimRng, UniformSource};
pub use scenario::{load_tree, TreeConfig};
pub use treatment::CaseTreatment;
pub use tree::{DecisionTree, Node, Resolution};
