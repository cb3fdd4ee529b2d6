//! Core domain types for the case-management engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Morbidity state supplied by the pathogenesis model
//! - Decision identifiers (the packed bitfield walked through the tree)
//! - Case inputs handed in by the population loop
//! - Medication events handed out to the drug model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

// ============================================================================
// Morbidity State
// ============================================================================

/// Morbidity classification of an individual for the current step.
///
/// Bit layout is shared with [`CmId`]: the bits under
/// [`PgState::MORBIDITY_MASK`] are copied verbatim into the initial decision
/// identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PgState(pub u32);

impl PgState {
    pub const NONE: PgState = PgState(0);
    pub const SICK: PgState = PgState(0x1);
    pub const MALARIA: PgState = PgState(0x2);
    pub const COMPLICATED: PgState = PgState(0x4);
    pub const SECOND_CASE: PgState = PgState(0x8);
    /// Not part of the morbidity classification; never copied into ids.
    pub const INDIRECT_MORTALITY: PgState = PgState(0x10);
    pub const MORBIDITY_MASK: PgState = PgState(0xF);

    pub const NON_MALARIA_FEVER: PgState = PgState(0x1);
    pub const UNCOMPLICATED: PgState = PgState(0x1 | 0x2);
    pub const UNCOMPLICATED_SECOND: PgState = PgState(0x1 | 0x2 | 0x8);
    pub const SEVERE: PgState = PgState(0x1 | 0x2 | 0x4);

    /// Every sick classification the pathogenesis model can produce.
    pub const LEGAL_SICK_STATES: [PgState; 4] = [
        PgState::NON_MALARIA_FEVER,
        PgState::UNCOMPLICATED,
        PgState::UNCOMPLICATED_SECOND,
        PgState::SEVERE,
    ];

    pub fn is_sick(self) -> bool {
        self.0 & Self::SICK.0 != 0
    }

    pub fn contains(self, other: PgState) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PgState {
    type Output = PgState;

    fn bitor(self, rhs: PgState) -> PgState {
        PgState(self.0 | rhs.0)
    }
}

// ============================================================================
// Decision Identifier
// ============================================================================

/// Case-management decision identifier.
///
/// A packed bitfield: morbidity bits, the age-category bit, the diagnostic
/// result sub-field, plus whatever outcome bits the scenario's branch sets
/// add. The bit protocol lives in [`crate::decision`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CmId(pub u32);

impl fmt::Display for CmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl BitOr for CmId {
    type Output = CmId;

    fn bitor(self, rhs: CmId) -> CmId {
        CmId(self.0 | rhs.0)
    }
}

impl BitOrAssign for CmId {
    fn bitor_assign(&mut self, rhs: CmId) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CmId {
    type Output = CmId;

    fn bitand(self, rhs: CmId) -> CmId {
        CmId(self.0 & rhs.0)
    }
}

impl Not for CmId {
    type Output = CmId;

    fn not(self) -> CmId {
        CmId(!self.0)
    }
}

/// State of the diagnostic sub-field of a [`CmId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticResult {
    /// No test requested or performed
    None,
    Negative,
    Positive,
    /// Placeholder: a test must be run before lookup
    Undetermined,
}

// ============================================================================
// Case Input and Medication Types
// ============================================================================

/// Clinical inputs for one sick individual in one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaseInput {
    pub state: PgState,
    pub age_years: f64,
    /// Parasite density (parasites/µL) handed to the diagnostic test; never
    /// negative
    pub density: f64,
}

/// A queued medication event, consumed by the drug model on the
/// individual's next drug-update step.
///
/// Quantities are per-protocol; body-mass scaling is the drug model's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicateData {
    /// Drug code (e.g. "AR", "CQ")
    pub drug: String,
    /// Quantity in mg
    pub qty: f64,
    /// Offset from the start of the step, in hours
    pub time_hours: f64,
    /// Infusion duration in hours; `None` for an oral dose
    pub duration_hours: Option<f64>,
}

/// Pending medications for one individual.
pub type MedicateQueue = Vec<MedicateData>;
