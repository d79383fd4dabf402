//! Reference Values
//!
//! Expected energies the solver must reproduce at every process count.

use serde::{Deserialize, Serialize};

/// Which of the two reported energies a value refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyField {
    /// Correlation energy, `E(corr,CCSD)` in the default solver output
    Correlation,
    /// Total energy, `E(CCSD)` in the default solver output
    Total,
}

impl EnergyField {
    /// Fields in the order they are extracted and compared
    pub const ALL: [EnergyField; 2] = [EnergyField::Correlation, EnergyField::Total];

    /// Human-readable field name used in diagnostics
    pub fn describe(self) -> &'static str {
        match self {
            EnergyField::Correlation => "correlation energy",
            EnergyField::Total => "total energy",
        }
    }
}

impl std::fmt::Display for EnergyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Pair of energies, either extracted from solver output or used as reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Energies {
    /// Correlation energy
    pub correlation: f64,
    /// Total energy
    pub total: f64,
}

impl Energies {
    /// Value of the given field
    pub fn get(&self, field: EnergyField) -> f64 {
        match field {
            EnergyField::Correlation => self.correlation,
            EnergyField::Total => self.total,
        }
    }
}

/// Fixed expected energies injected into the harness.
///
/// A new reference system only needs a new value here, never a change to
/// the comparison logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValues {
    /// Expected correlation energy
    pub correlation_energy: f64,
    /// Expected total energy
    pub total_energy: f64,
}

impl ReferenceValues {
    /// Reference for the bundled CCSD test system
    pub const CCSD: ReferenceValues = ReferenceValues {
        correlation_energy: -0.008225832259,
        total_energy: -2.862598243,
    };

    /// Create a reference pair
    pub fn new(correlation_energy: f64, total_energy: f64) -> Self {
        Self {
            correlation_energy,
            total_energy,
        }
    }

    /// Expected value for a field
    pub fn expected(&self, field: EnergyField) -> f64 {
        match field {
            EnergyField::Correlation => self.correlation_energy,
            EnergyField::Total => self.total_energy,
        }
    }
}

impl Default for ReferenceValues {
    fn default() -> Self {
        Self::CCSD
    }
}

impl From<ReferenceValues> for Energies {
    fn from(reference: ReferenceValues) -> Self {
        Energies {
            correlation: reference.correlation_energy,
            total: reference.total_energy,
        }
    }
}
