//! Typed records for bibliography, species, reaction and kinetics data.
//!
//! # Responsibility
//! - Define the canonical record shapes shared by codec, repository and
//!   services.
//! - Own record-level validation so encode and persistence agree on what a
//!   complete record is.
//!
//! # Invariants
//! - Every top-level record is identified by a stable `PrimeId`.
//! - Optional fields use `Option`; `Some("")` means present but blank.

pub mod ids;
pub mod kinetics;
pub mod reaction;
pub mod source;
pub mod species;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level validation failure on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordValidationError {
    /// Field (or element) name that failed validation.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl RecordValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid field `{}`: {}", self.field, self.reason)
    }
}

impl Error for RecordValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), RecordValidationError> {
    if value.trim().is_empty() {
        return Err(RecordValidationError::new(field, "must not be blank"));
    }
    Ok(())
}
