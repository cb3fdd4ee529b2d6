//! Case-management execution.
//!
//! The population loop calls [`CaseManagement::execute`] once for every
//! individual who is sick in a step:
//! 1. Build the initial decision id from the morbidity state and age
//! 2. Traverse the tree, running diagnostics where the tree asks for them
//! 3. Replace the individual's medication queue with the leaf's protocol

use crate::diagnostic::DiagnosticTest;
use crate::rng::UniformSource;
use crate::scenario::TreeConfig;
use crate::tree::{DecisionTree, Resolution};
use crate::{CaseInput, CmId, MedicateQueue, Result};

/// Scenario-wide case management: the immutable decision tree.
///
/// Built once at scenario start and shared read-only by every call; it holds
/// no per-individual state.
#[derive(Clone, Debug)]
pub struct CaseManagement {
    tree: DecisionTree,
}

impl CaseManagement {
    /// Wrap an already built tree. Coverage gaps surface at the first
    /// traversal that hits them.
    pub fn new(tree: DecisionTree) -> Self {
        Self { tree }
    }

    /// Build the tree and check that every legal classification resolves.
    pub fn from_scenario(config: &TreeConfig) -> Result<Self> {
        let tree = DecisionTree::build(config)?;
        tree.check_coverage(&CmId::legal_roots())?;
        Ok(Self { tree })
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Decide and queue the treatment for one sick individual.
    ///
    /// Returns the final decision id for reporting. On error the queue is
    /// left untouched.
    pub fn execute(
        &self,
        queue: &mut MedicateQueue,
        case: &CaseInput,
        rng: &mut dyn UniformSource,
        diagnostic: &dyn DiagnosticTest,
    ) -> Result<CmId> {
        let resolution = self.decide(case, rng, diagnostic)?;
        resolution.treatment.apply(queue, resolution.id);
        Ok(resolution.id)
    }

    /// Resolve a case without touching any queue.
    pub fn decide(
        &self,
        case: &CaseInput,
        rng: &mut dyn UniformSource,
        diagnostic: &dyn DiagnosticTest,
    ) -> Result<Resolution<'_>> {
        let id = CmId::for_case(case)?;
        tracing::debug!(
            "Case management for state {:#x}, age {:.1}: start {}",
            case.state.0,
            case.age_years,
            id
        );
        self.tree.resolve(id, case.density, rng, diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostic;
    use crate::reference::{get_reference_tree, CARE_MASK, CARE_NONE, CARE_OFFICIAL, CARE_SELF};
    use crate::rng::{ScriptedDraws, SimRng};
    use crate::scenario::{BranchConfig, BranchSetConfig, LeafConfig, MedicateConfig};
    use crate::{DiagnosticResult, Error, MedicateData, PgState};

    fn reference() -> CaseManagement {
        CaseManagement::from_scenario(get_reference_tree()).unwrap()
    }

    fn case(state: PgState, age_years: f64, density: f64) -> CaseInput {
        CaseInput {
            state,
            age_years,
            density,
        }
    }

    fn microscopy() -> Diagnostic {
        Diagnostic::Deterministic {
            detection_limit: 40.0,
        }
    }

    #[test]
    fn test_positive_child_gets_paediatric_act() {
        crate::logging::init_test();
        let cm = reference();
        let mut queue = Vec::new();
        let mut draws = ScriptedDraws::new(vec![0.1]);

        let id = cm
            .execute(
                &mut queue,
                &case(PgState::UNCOMPLICATED, 3.0, 2_000.0),
                &mut draws,
                &microscopy(),
            )
            .unwrap();

        assert_eq!(id, CmId(0x3) | CARE_OFFICIAL | CmId::RESULT_POSITIVE);
        assert_eq!(queue.len(), 12);
        assert_eq!(queue[0].drug, "AR");
        assert_eq!(queue[0].qty, 20.0);
        assert_eq!(queue[1].drug, "LF");
    }

    #[test]
    fn test_negative_test_means_no_treatment() {
        let cm = reference();
        let mut queue = Vec::new();
        let mut draws = ScriptedDraws::new(vec![0.1]);

        let id = cm
            .execute(
                &mut queue,
                &case(PgState::NON_MALARIA_FEVER, 30.0, 0.0),
                &mut draws,
                &microscopy(),
            )
            .unwrap();

        assert_eq!(id.result(), DiagnosticResult::Negative);
        assert!(id.contains(CmId::AGE_OVER5));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_severe_case_skips_diagnostic() {
        struct Panicking;
        impl DiagnosticTest for Panicking {
            fn is_positive(&self, _: f64, _: &mut dyn UniformSource) -> bool {
                panic!("severe pathway must not test");
            }
        }

        let cm = reference();
        let mut queue = Vec::new();
        let mut draws = ScriptedDraws::new(vec![0.2]);

        let id = cm
            .execute(&mut queue, &case(PgState::SEVERE, 40.0, 1e5), &mut draws, &Panicking)
            .unwrap();

        assert_eq!(id, CmId(0x47) | CARE_OFFICIAL);
        assert!(queue.iter().all(|m| m.drug == "QN" && m.duration_hours == Some(4.0)));
    }

    #[test]
    fn test_care_pathways_follow_draws() {
        let cm = reference();
        let mut queue = Vec::new();
        // 0.6 official | 0.15 self | 0.25 none
        let mut draws = ScriptedDraws::new(vec![0.65, 0.8]);
        let input = case(PgState::UNCOMPLICATED, 10.0, 0.0);

        let self_treated = cm
            .execute(&mut queue, &input, &mut draws, &microscopy())
            .unwrap();
        assert_eq!(self_treated & CARE_MASK, CARE_SELF);
        assert!(queue.iter().all(|m| m.drug == "CQ"));

        let untreated = cm
            .execute(&mut queue, &input, &mut draws, &microscopy())
            .unwrap();
        assert_eq!(untreated & CARE_MASK, CARE_NONE);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_branch_draw_precedes_diagnostic_draw() {
        let cm = reference();
        // p(positive | density 100) = 0.55
        let diagnostic = Diagnostic::stochastic(100.0, 0.9).unwrap();
        let input = case(PgState::UNCOMPLICATED, 10.0, 100.0);
        let mut queue = Vec::new();

        let mut draws = ScriptedDraws::new(vec![0.1, 0.54]);
        let positive = cm.execute(&mut queue, &input, &mut draws, &diagnostic).unwrap();
        assert_eq!(positive, CmId(0x43) | CARE_OFFICIAL | CmId::RESULT_POSITIVE);
        assert_eq!(draws.consumed(), 2);
        assert!(!queue.is_empty());

        let mut draws = ScriptedDraws::new(vec![0.1, 0.56]);
        let negative = cm.execute(&mut queue, &input, &mut draws, &diagnostic).unwrap();
        assert_eq!(negative, CmId(0x43) | CARE_OFFICIAL | CmId::RESULT_NEGATIVE);
        assert_eq!(draws.consumed(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_identical_draws_identical_results() {
        let cm = reference();
        let input = case(PgState::UNCOMPLICATED_SECOND, 7.0, 150.0);
        let diagnostic = Diagnostic::stochastic(100.0, 0.9).unwrap();

        let run = || {
            let mut rng = SimRng::new(99);
            let mut queue = Vec::new();
            let ids: Vec<CmId> = (0..50)
                .map(|_| cm.execute(&mut queue, &input, &mut rng, &diagnostic).unwrap())
                .collect();
            (ids, queue)
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_final_id_never_undetermined() {
        let cm = reference();
        let diagnostic = Diagnostic::stochastic(100.0, 0.9).unwrap();
        let mut rng = SimRng::new(5);
        let mut queue = Vec::new();

        for i in 0..2_000 {
            let state = PgState::LEGAL_SICK_STATES[i % 4];
            let input = case(state, (i % 12) as f64, (i * 13 % 400) as f64);
            let id = cm.execute(&mut queue, &input, &mut rng, &diagnostic).unwrap();
            assert_ne!(id.result(), DiagnosticResult::Undetermined);
        }
    }

    #[test]
    fn test_missing_node_leaves_queue_untouched() {
        let config = TreeConfig {
            mask: CmId(0x334F),
            drugs: vec![],
            branch_sets: vec![BranchSetConfig {
                id: CmId(0x3),
                branches: vec![
                    BranchConfig {
                        outcome: CmId(0x1000),
                        p: 0.7,
                    },
                    BranchConfig {
                        outcome: CmId(0x3000),
                        p: 0.3,
                    },
                ],
            }],
            leaves: vec![LeafConfig {
                id: CmId(0x1003),
                medicate: vec![MedicateConfig {
                    drug: "AR".into(),
                    qty: 80.0,
                    time: 0.0,
                    duration: None,
                }],
            }],
        };
        let cm = CaseManagement::new(DecisionTree::build(&config).unwrap());
        let pending = MedicateData {
            drug: "CQ".into(),
            qty: 600.0,
            time_hours: 0.0,
            duration_hours: None,
        };
        let mut queue = vec![pending.clone()];
        let mut draws = ScriptedDraws::new(vec![0.9]);

        let err = cm
            .execute(
                &mut queue,
                &case(PgState::UNCOMPLICATED, 3.0, 0.0),
                &mut draws,
                &microscopy(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MissingNode {
                id: CmId(0x3003),
                masked: CmId(0x3003)
            }
        ));
        assert!(err.is_configuration());
        assert_eq!(queue, vec![pending]);

        // Coverage checking would have caught it up front.
        assert!(CaseManagement::from_scenario(&config).is_err());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_non_sick_case_is_contract_violation() {
        let cm = reference();
        let mut queue = Vec::new();
        let mut draws = ScriptedDraws::default();

        let err = cm
            .execute(&mut queue, &case(PgState::NONE, 3.0, 0.0), &mut draws, &microscopy())
            .unwrap_err();

        assert!(matches!(err, Error::Contract(_)));
        assert!(!err.is_configuration());
        assert_eq!(draws.consumed(), 0);
    }

    #[test]
    fn test_substreams_independent_of_order() {
        let cm = reference();
        let diagnostic = Diagnostic::stochastic(100.0, 0.9).unwrap();
        let inputs: Vec<CaseInput> = (0..64)
            .map(|i| case(PgState::LEGAL_SICK_STATES[i % 4], (i % 9) as f64, (i * 37 % 500) as f64))
            .collect();

        let resolve = |i: usize| {
            let mut rng = SimRng::substream(2024, i as u64);
            let mut queue = Vec::new();
            let id = cm.execute(&mut queue, &inputs[i], &mut rng, &diagnostic).unwrap();
            (id, queue)
        };

        let forward: Vec<_> = (0..inputs.len()).map(resolve).collect();
        let mut backward: Vec<_> = (0..inputs.len()).rev().map(resolve).collect();
        backward.reverse();
        assert_eq!(forward, backward);

        let parallel: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..inputs.len())
                .map(|i| scope.spawn(move || resolve(i)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(forward, parallel);
    }
}
