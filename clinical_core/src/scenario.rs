//! Case-management tree configuration and scenario file loading.
//!
//! A scenario tree is a set of branch sets, a set of leaves and one mask.
//! Files are TOML (`.toml`) or JSON (`.json`):
//!
//! ```toml
//! mask = 0x334F
//! drugs = ["AR", "CQ"]
//!
//! [[branch_set]]
//! id = 0x3
//! branches = [{ outcome = 0x1000, p = 0.6 }, { outcome = 0x3000, p = 0.4 }]
//!
//! [[leaf]]
//! id = 0x3003
//! medicate = []
//! ```

use crate::{CmId, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete case-management tree definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TreeConfig {
    /// Bits significant for node lookup
    pub mask: CmId,

    /// Drugs the scenario describes; leaves may only reference these.
    /// Empty means unchecked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drugs: Vec<String>,

    #[serde(rename = "branch_set", default)]
    pub branch_sets: Vec<BranchSetConfig>,

    #[serde(rename = "leaf", default)]
    pub leaves: Vec<LeafConfig>,
}

/// Probabilistic node definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BranchSetConfig {
    pub id: CmId,
    pub branches: Vec<BranchConfig>,
}

/// One outcome of a branch set with its (non-cumulative) probability
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BranchConfig {
    pub outcome: CmId,
    pub p: f64,
}

/// Terminal node definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LeafConfig {
    pub id: CmId,
    #[serde(default)]
    pub medicate: Vec<MedicateConfig>,
}

/// One medication of a leaf protocol
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicateConfig {
    pub drug: String,
    /// mg
    pub qty: f64,
    /// Hours after the start of the step
    #[serde(default)]
    pub time: f64,
    /// Infusion duration in hours, absent for oral doses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Load a tree definition from a `.toml` or `.json` file
pub fn load_tree(path: &Path) -> Result<TreeConfig> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let tree: TreeConfig = match extension.as_deref() {
        Some("toml") => toml::from_str(&contents)?,
        Some("json") => serde_json::from_str(&contents)?,
        _ => {
            return Err(Error::Config(format!(
                "Unsupported scenario file {:?} (expected .toml or .json)",
                path
            )))
        }
    };

    tracing::info!(
        "Loaded scenario tree from {:?}: {} branch sets, {} leaves, mask {}",
        path,
        tree.branch_sets.len(),
        tree.leaves.len(),
        tree.mask
    );
    Ok(tree)
}

/// Write a tree definition as TOML or JSON depending on the extension
pub fn save_tree(tree: &TreeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::to_string_pretty(tree)?,
        _ => toml::to_string_pretty(tree)
            .map_err(|e| Error::Config(format!("Failed to serialize tree: {}", e)))?,
    };
    std::fs::write(path, contents)?;
    tracing::info!("Saved scenario tree to {:?}", path);
    Ok(())
}
