//! Leaf treatments and their expansion into medication queues.

use crate::scenario::LeafConfig;
use crate::{CmId, Error, MedicateData, MedicateQueue, Result};
use std::collections::HashSet;

/// Separators of the packed medication column in [`crate::trace`].
pub const RESERVED_DRUG_CHARS: [char; 4] = [';', ':', '@', '+'];

/// Ordered medication protocol held by a tree leaf.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaseTreatment {
    medications: Vec<MedicateData>,
}

impl CaseTreatment {
    pub fn new(medications: Vec<MedicateData>) -> Self {
        Self { medications }
    }

    /// Build from a leaf definition, checking every medication.
    ///
    /// When `known_drugs` is non-empty every drug must be listed in it.
    pub fn from_config(leaf: &LeafConfig, known_drugs: &HashSet<&str>) -> Result<Self> {
        let mut medications = Vec::with_capacity(leaf.medicate.len());

        for med in &leaf.medicate {
            if med.drug.is_empty() {
                return Err(Error::InvalidMedication {
                    id: leaf.id,
                    reason: "empty drug code".into(),
                });
            }
            if let Some(c) = med.drug.chars().find(|c| RESERVED_DRUG_CHARS.contains(c)) {
                return Err(Error::InvalidMedication {
                    id: leaf.id,
                    reason: format!("drug code '{}' contains reserved character '{}'", med.drug, c),
                });
            }
            if !known_drugs.is_empty() && !known_drugs.contains(med.drug.as_str()) {
                return Err(Error::UnknownDrug {
                    id: leaf.id,
                    drug: med.drug.clone(),
                });
            }
            if !(med.qty.is_finite() && med.qty > 0.0) {
                return Err(Error::InvalidMedication {
                    id: leaf.id,
                    reason: format!("{}: quantity {} must be positive", med.drug, med.qty),
                });
            }
            if !(med.time.is_finite() && med.time >= 0.0) {
                return Err(Error::InvalidMedication {
                    id: leaf.id,
                    reason: format!("{}: time offset {} must be >= 0", med.drug, med.time),
                });
            }
            if let Some(duration) = med.duration {
                if !(duration.is_finite() && duration > 0.0) {
                    return Err(Error::InvalidMedication {
                        id: leaf.id,
                        reason: format!("{}: duration {} must be positive", med.drug, duration),
                    });
                }
            }

            medications.push(MedicateData {
                drug: med.drug.clone(),
                qty: med.qty,
                time_hours: med.time,
                duration_hours: med.duration,
            });
        }

        Ok(Self { medications })
    }

    pub fn medications(&self) -> &[MedicateData] {
        &self.medications
    }

    /// A leaf without medications ("no treatment")
    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
    }

    /// Replace the pending medications in `queue` with this protocol.
    ///
    /// Any previously queued events are dropped, never appended to.
    pub fn apply(&self, queue: &mut MedicateQueue, final_id: CmId) {
        queue.clear();
        queue.extend(self.medications.iter().cloned());
        tracing::trace!(
            "Queued {} medications for decision {}",
            self.medications.len(),
            final_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::MedicateConfig;

    fn med(drug: &str, qty: f64) -> MedicateData {
        MedicateData {
            drug: drug.into(),
            qty,
            time_hours: 0.0,
            duration_hours: None,
        }
    }

    fn leaf_config(medicate: Vec<MedicateConfig>) -> LeafConfig {
        LeafConfig {
            id: CmId(0x1203),
            medicate,
        }
    }

    #[test]
    fn test_apply_preserves_order() {
        let treatment = CaseTreatment::new(vec![med("AR", 80.0), med("LF", 480.0)]);
        let mut queue = Vec::new();

        treatment.apply(&mut queue, CmId(0x1203));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].drug, "AR");
        assert_eq!(queue[1].drug, "LF");
    }

    #[test]
    fn test_apply_replaces_queue() {
        let first = CaseTreatment::new(vec![med("CQ", 250.0), med("CQ", 250.0)]);
        let second = CaseTreatment::new(vec![med("QN", 600.0)]);
        let mut queue = Vec::new();

        first.apply(&mut queue, CmId(0x2003));
        second.apply(&mut queue, CmId(0x1207));

        assert_eq!(queue, vec![med("QN", 600.0)]);
    }

    #[test]
    fn test_empty_leaf_clears_queue() {
        let mut queue = vec![med("CQ", 250.0)];
        CaseTreatment::default().apply(&mut queue, CmId(0x3003));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_from_config_converts_units() {
        let leaf = leaf_config(vec![MedicateConfig {
            drug: "QN".into(),
            qty: 600.0,
            time: 12.0,
            duration: Some(4.0),
        }]);

        let treatment = CaseTreatment::from_config(&leaf, &HashSet::new()).unwrap();

        assert_eq!(
            treatment.medications(),
            &[MedicateData {
                drug: "QN".into(),
                qty: 600.0,
                time_hours: 12.0,
                duration_hours: Some(4.0),
            }]
        );
    }

    #[test]
    fn test_from_config_rejects_unknown_drug() {
        let leaf = leaf_config(vec![MedicateConfig {
            drug: "XX".into(),
            qty: 10.0,
            time: 0.0,
            duration: None,
        }]);
        let known: HashSet<&str> = ["AR", "LF"].into_iter().collect();

        let err = CaseTreatment::from_config(&leaf, &known).unwrap_err();
        assert!(matches!(err, Error::UnknownDrug { ref drug, .. } if drug == "XX"));
    }

    #[test]
    fn test_from_config_rejects_separator_characters() {
        for drug in ["AR;LF", "AR:1", "QN@8", "AS+MQ"] {
            let leaf = leaf_config(vec![MedicateConfig {
                drug: drug.into(),
                qty: 10.0,
                time: 0.0,
                duration: None,
            }]);
            let result = CaseTreatment::from_config(&leaf, &HashSet::new());
            assert!(
                matches!(result, Err(Error::InvalidMedication { .. })),
                "accepted drug code {}",
                drug
            );
        }
    }

    #[test]
    fn test_from_config_rejects_bad_quantities() {
        for (qty, time, duration) in [(0.0, 0.0, None), (10.0, -1.0, None), (10.0, 0.0, Some(0.0))]
        {
            let leaf = leaf_config(vec![MedicateConfig {
                drug: "AR".into(),
                qty,
                time,
                duration,
            }]);
            let result = CaseTreatment::from_config(&leaf, &HashSet::new());
            assert!(
                matches!(result, Err(Error::InvalidMedication { .. })),
                "accepted qty={} time={} duration={:?}",
                qty,
                time,
                duration
            );
        }
    }
}
