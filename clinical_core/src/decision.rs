//! Decision identifier bit protocol.
//!
//! Layout of a [`CmId`]:
//! - `0x000F` morbidity bits, shared with [`PgState`]
//! - `0x0040` age over the threshold
//! - `0x0300` diagnostic result sub-field (none / negative / positive / determine)
//!
//! Everything else belongs to the scenario's branch outcomes.

use crate::{CaseInput, CmId, DiagnosticResult, Error, PgState, Result};

/// Age above which [`CmId::AGE_OVER5`] is set (strictly greater).
pub const AGE_THRESHOLD_YEARS: f64 = 5.0;

impl CmId {
    pub const NONE: CmId = CmId(0);
    pub const MORBIDITY_MASK: CmId = CmId(0x0F);
    pub const AGE_OVER5: CmId = CmId(0x40);
    pub const RESULT_NEGATIVE: CmId = CmId(0x100);
    pub const RESULT_POSITIVE: CmId = CmId(0x200);
    pub const RESULT_DETERMINE: CmId = CmId(0x300);
    pub const RESULT_MASK: CmId = CmId(0x300);

    /// Build the identifier a traversal starts from.
    ///
    /// Morbidity bits are copied verbatim and [`CmId::AGE_OVER5`] is set when
    /// `age_years` exceeds [`AGE_THRESHOLD_YEARS`].
    ///
    /// The caller must only pass sick states. Debug builds reject other states
    /// with [`Error::Contract`]; release builds skip the check and build an id
    /// that will normally miss every tree node.
    pub fn initial(state: PgState, age_years: f64) -> Result<CmId> {
        if cfg!(debug_assertions) && !state.is_sick() {
            return Err(Error::Contract(format!(
                "case management invoked for non-sick state {:#x}",
                state.0
            )));
        }

        let mut id = CmId(state.0 & PgState::MORBIDITY_MASK.0);
        if age_years > AGE_THRESHOLD_YEARS {
            id |= CmId::AGE_OVER5;
        }
        Ok(id)
    }

    /// Shorthand for [`CmId::initial`] on a [`CaseInput`].
    pub fn for_case(case: &CaseInput) -> Result<CmId> {
        Self::initial(case.state, case.age_years)
    }

    pub fn masked(self, mask: CmId) -> CmId {
        self & mask
    }

    pub fn contains(self, bits: CmId) -> bool {
        self.0 & bits.0 == bits.0
    }

    pub fn result(self) -> DiagnosticResult {
        match self & CmId::RESULT_MASK {
            CmId::RESULT_NEGATIVE => DiagnosticResult::Negative,
            CmId::RESULT_POSITIVE => DiagnosticResult::Positive,
            CmId::RESULT_DETERMINE => DiagnosticResult::Undetermined,
            _ => DiagnosticResult::None,
        }
    }

    /// Replace the diagnostic sub-field.
    pub fn with_result(self, result: DiagnosticResult) -> CmId {
        let cleared = self & !CmId::RESULT_MASK;
        match result {
            DiagnosticResult::None => cleared,
            DiagnosticResult::Negative => cleared | CmId::RESULT_NEGATIVE,
            DiagnosticResult::Positive => cleared | CmId::RESULT_POSITIVE,
            DiagnosticResult::Undetermined => cleared | CmId::RESULT_DETERMINE,
        }
    }

    /// Root identifiers produced by every legal sick classification, in both
    /// age bands.
    pub fn legal_roots() -> Vec<CmId> {
        PgState::LEGAL_SICK_STATES
            .iter()
            .flat_map(|state| {
                let base = CmId(state.0 & PgState::MORBIDITY_MASK.0);
                [base, base | CmId::AGE_OVER5]
            })
            .collect()
    }
}

// Morbidity bits are shared between the two bitfields.
const _: () = assert!(CmId::MORBIDITY_MASK.0 == PgState::MORBIDITY_MASK.0);
const _: () = assert!(CmId::MORBIDITY_MASK.0 & CmId::AGE_OVER5.0 == 0);
const _: () = assert!(CmId::MORBIDITY_MASK.0 & CmId::RESULT_MASK.0 == 0);
