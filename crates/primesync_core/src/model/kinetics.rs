//! Kinetics models and their rate entries.

use crate::model::ids::{EntityKind, PrimeId};
use crate::model::{require_text, RecordValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateParameter {
    pub name: String,
    pub value: f64,
    pub units: Option<String>,
}

/// Rate-expression parameters, transported without evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateExpression {
    /// Expression family, e.g. `arrhenius`.
    pub form: Option<String>,
    pub parameters: Vec<RateParameter>,
}

/// Rate data for one reaction, citing one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kinetics {
    pub reaction: PrimeId,
    pub source: PrimeId,
    pub rate: RateExpression,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinModel {
    pub prime_id: PrimeId,
    pub name: Option<String>,
    pub kinetics: Vec<Kinetics>,
}

impl KinModel {
    pub fn new(prime_id: PrimeId) -> Self {
        Self {
            prime_id,
            name: None,
            kinetics: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        for entry in &self.kinetics {
            if entry.reaction.kind() != EntityKind::Reaction {
                return Err(RecordValidationError::new(
                    "reactionPrimeID",
                    format!("{} is not a reaction identifier", entry.reaction),
                ));
            }
            if entry.source.kind() != EntityKind::Bibliography {
                return Err(RecordValidationError::new(
                    "bibliography",
                    format!("{} is not a bibliography identifier", entry.source),
                ));
            }
            for parameter in &entry.rate.parameters {
                require_text("parameter", &parameter.name)?;
                if !parameter.value.is_finite() {
                    return Err(RecordValidationError::new(
                        "parameter",
                        format!("value of `{}` must be finite", parameter.name),
                    ));
                }
            }
        }
        Ok(())
    }
}
