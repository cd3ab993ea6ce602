//! Reaction record and stoichiometry entries.

use crate::model::ids::{EntityKind, PrimeId};
use crate::model::RecordValidationError;
use serde::{Deserialize, Serialize};

/// Signed participation of one species in a reaction.
///
/// Negative coefficients are reactants, positive ones products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stoichiometry {
    pub species: PrimeId,
    /// Informational copy of the species key carried on `speciesLink`.
    pub preferred_key: Option<String>,
    pub coefficient: i32,
}

impl Stoichiometry {
    pub fn new(species: PrimeId, coefficient: i32) -> Self {
        Self {
            species,
            preferred_key: None,
            coefficient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub prime_id: PrimeId,
    pub copyright: Option<String>,
    pub stoichiometry: Vec<Stoichiometry>,
}

impl Reaction {
    pub fn new(prime_id: PrimeId) -> Self {
        Self {
            prime_id,
            copyright: None,
            stoichiometry: Vec::new(),
        }
    }

    pub fn reactants(&self) -> impl Iterator<Item = &Stoichiometry> {
        self.stoichiometry.iter().filter(|entry| entry.coefficient < 0)
    }

    pub fn products(&self) -> impl Iterator<Item = &Stoichiometry> {
        self.stoichiometry.iter().filter(|entry| entry.coefficient > 0)
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.stoichiometry.is_empty() {
            return Err(RecordValidationError::new(
                "reactants",
                "reaction needs at least one species link",
            ));
        }
        for entry in &self.stoichiometry {
            if entry.coefficient == 0 {
                return Err(RecordValidationError::new(
                    "speciesLink",
                    format!("coefficient for {} must be non-zero", entry.species),
                ));
            }
            if entry.species.kind() != EntityKind::Species {
                return Err(RecordValidationError::new(
                    "speciesLink",
                    format!("{} is not a species identifier", entry.species),
                ));
            }
        }
        Ok(())
    }
}
