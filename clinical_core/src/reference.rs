//! Built-in reference case-management tree.
//!
//! Care-seeking is a two-bit field on top of the fixed identifier layout:
//! official care, self-treatment, or no care. Official care for
//! uncomplicated malaria and non-malaria fever goes through a
//! parasitological test first; severe cases are treated without one.
//! Children (age ≤ 5) get paediatric doses.

use crate::scenario::{BranchConfig, BranchSetConfig, LeafConfig, MedicateConfig, TreeConfig};
use crate::{CmId, PgState};
use once_cell::sync::Lazy;

pub const CARE_OFFICIAL: CmId = CmId(0x1000);
pub const CARE_SELF: CmId = CmId(0x2000);
pub const CARE_NONE: CmId = CmId(0x3000);
pub const CARE_MASK: CmId = CmId(0x3000);

/// Lookup mask of the reference tree
pub const REFERENCE_MASK: CmId = CmId(
    CmId::MORBIDITY_MASK.0 | CmId::AGE_OVER5.0 | CmId::RESULT_MASK.0 | CARE_MASK.0,
);

/// Cached reference tree - built once and reused
static REFERENCE_TREE: Lazy<TreeConfig> = Lazy::new(build_reference_tree);

/// Get a reference to the cached reference tree
pub fn get_reference_tree() -> &'static TreeConfig {
    &REFERENCE_TREE
}

/// Build the reference tree definition
///
/// **Note**: prefer `get_reference_tree()`; this is for tests and for
/// deriving modified scenarios.
pub fn build_reference_tree() -> TreeConfig {
    let mut branch_sets = Vec::new();
    let mut leaves = Vec::new();
    let tested_official = CARE_OFFICIAL | CmId::RESULT_DETERMINE;

    for age in [CmId::NONE, CmId::AGE_OVER5] {
        let adult = age == CmId::AGE_OVER5;

        // Uncomplicated malaria, first case: first-line ACT after a positive test
        let uc1 = morbidity(PgState::UNCOMPLICATED) | age;
        branch_sets.push(branch_set(
            uc1,
            &[(tested_official, 0.6), (CARE_SELF, 0.15), (CARE_NONE, 0.25)],
        ));
        leaves.push(leaf(uc1 | CARE_OFFICIAL | CmId::RESULT_POSITIVE, artemether_lumefantrine(adult)));
        leaves.push(leaf(uc1 | CARE_OFFICIAL | CmId::RESULT_NEGATIVE, vec![]));
        leaves.push(leaf(uc1 | CARE_SELF, chloroquine(adult)));
        leaves.push(leaf(uc1 | CARE_NONE, vec![]));

        // Uncomplicated malaria, second case: second-line treatment
        let uc2 = morbidity(PgState::UNCOMPLICATED_SECOND) | age;
        branch_sets.push(branch_set(
            uc2,
            &[(tested_official, 0.7), (CARE_SELF, 0.1), (CARE_NONE, 0.2)],
        ));
        leaves.push(leaf(uc2 | CARE_OFFICIAL | CmId::RESULT_POSITIVE, artesunate_mefloquine(adult)));
        leaves.push(leaf(uc2 | CARE_OFFICIAL | CmId::RESULT_NEGATIVE, vec![]));
        leaves.push(leaf(uc2 | CARE_SELF, chloroquine(adult)));
        leaves.push(leaf(uc2 | CARE_NONE, vec![]));

        // Severe malaria: hospital quinine, no test
        let severe = morbidity(PgState::SEVERE) | age;
        branch_sets.push(branch_set(severe, &[(CARE_OFFICIAL, 0.48), (CARE_NONE, 0.52)]));
        leaves.push(leaf(severe | CARE_OFFICIAL, quinine_iv(adult)));
        leaves.push(leaf(severe | CARE_NONE, vec![]));

        // Non-malaria fever: treated only if the test finds parasites
        let fever = morbidity(PgState::NON_MALARIA_FEVER) | age;
        branch_sets.push(branch_set(fever, &[(tested_official, 0.4), (CARE_NONE, 0.6)]));
        leaves.push(leaf(fever | CARE_OFFICIAL | CmId::RESULT_POSITIVE, artemether_lumefantrine(adult)));
        leaves.push(leaf(fever | CARE_OFFICIAL | CmId::RESULT_NEGATIVE, vec![]));
        leaves.push(leaf(fever | CARE_NONE, vec![]));
    }

    TreeConfig {
        mask: REFERENCE_MASK,
        drugs: ["AR", "LF", "AS", "MQ", "CQ", "QN"]
            .into_iter()
            .map(String::from)
            .collect(),
        branch_sets,
        leaves,
    }
}

fn morbidity(state: PgState) -> CmId {
    CmId(state.0 & PgState::MORBIDITY_MASK.0)
}

fn branch_set(id: CmId, branches: &[(CmId, f64)]) -> BranchSetConfig {
    BranchSetConfig {
        id,
        branches: branches
            .iter()
            .map(|&(outcome, p)| BranchConfig { outcome, p })
            .collect(),
    }
}

fn leaf(id: CmId, medicate: Vec<MedicateConfig>) -> LeafConfig {
    LeafConfig { id, medicate }
}

fn oral(drug: &str, qty: f64, time: f64) -> MedicateConfig {
    MedicateConfig {
        drug: drug.into(),
        qty,
        time,
        duration: None,
    }
}

// Six doses over three days: 1 tablet (20/120 mg) for children, 4 for adults
fn artemether_lumefantrine(adult: bool) -> Vec<MedicateConfig> {
    let tablets = if adult { 4.0 } else { 1.0 };
    [0.0, 8.0, 24.0, 36.0, 48.0, 60.0]
        .into_iter()
        .flat_map(|time| {
            [
                oral("AR", 20.0 * tablets, time),
                oral("LF", 120.0 * tablets, time),
            ]
        })
        .collect()
}

fn artesunate_mefloquine(adult: bool) -> Vec<MedicateConfig> {
    let scale = if adult { 1.0 } else { 0.25 };
    let mut doses = vec![oral("MQ", 1000.0 * scale, 0.0)];
    doses.extend([0.0, 24.0, 48.0].map(|time| oral("AS", 200.0 * scale, time)));
    doses
}

fn chloroquine(adult: bool) -> Vec<MedicateConfig> {
    let scale = if adult { 1.0 } else { 0.25 };
    vec![
        oral("CQ", 600.0 * scale, 0.0),
        oral("CQ", 600.0 * scale, 24.0),
        oral("CQ", 300.0 * scale, 48.0),
    ]
}

fn quinine_iv(adult: bool) -> Vec<MedicateConfig> {
    let qty = if adult { 600.0 } else { 150.0 };
    [0.0, 8.0, 16.0]
        .map(|time| MedicateConfig {
            drug: "QN".into(),
            qty,
            time,
            duration: Some(4.0),
        })
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DecisionTree;
    use crate::Error;

    #[test]
    fn test_reference_tree_builds() {
        let tree = DecisionTree::build(get_reference_tree()).unwrap();
        assert_eq!(tree.branch_set_count(), 8);
        assert_eq!(tree.leaf_count(), 26);
        assert_eq!(tree.mask(), CmId(0x334F));
    }

    #[test]
    fn test_reference_tree_covers_legal_roots() {
        let tree = DecisionTree::build(get_reference_tree()).unwrap();
        let report = tree.check_coverage(&CmId::legal_roots()).unwrap();

        assert_eq!(report.roots, 8);
        assert_eq!(report.leaves_reached.len(), 26);
        assert!(report.unused_nodes.is_empty());
    }

    #[test]
    fn test_removed_leaf_breaks_coverage() {
        let mut config = build_reference_tree();
        let removed = CmId(0x3) | CARE_OFFICIAL | CmId::RESULT_NEGATIVE;
        config.leaves.retain(|l| l.id != removed);

        let tree = DecisionTree::build(&config).unwrap();
        let err = tree.check_coverage(&CmId::legal_roots()).unwrap_err();

        assert!(matches!(err, Error::MissingNode { masked, .. } if masked == removed));
    }

    #[test]
    fn test_children_get_smaller_doses() {
        let child = artemether_lumefantrine(false);
        let adult = artemether_lumefantrine(true);

        assert_eq!(child.len(), 12);
        assert_eq!(child.len(), adult.len());
        for (c, a) in child.iter().zip(&adult) {
            assert_eq!(c.drug, a.drug);
            assert!(c.qty < a.qty);
        }
    }
}
