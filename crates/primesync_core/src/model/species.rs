//! Chemical species record and elemental composition.
//!
//! # Invariants
//! - Composition counts are strictly positive.
//! - Composition iterates in element-symbol order, so encoded output is
//!   reproducible regardless of the atom order it was built from.

use crate::model::ids::PrimeId;
use crate::model::{require_text, RecordValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static ELEMENT_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]{0,2}$").expect("valid element symbol regex"));

/// Preferred lookup key, usually the formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredKey {
    pub value: String,
    /// `group` attribute, e.g. `prime`.
    pub group: Option<String>,
    /// `type` attribute, e.g. `formula`.
    pub key_type: Option<String>,
}

impl PreferredKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            group: None,
            key_type: None,
        }
    }
}

/// Typed chemical name not covered by the dedicated identifier fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedIdentifier {
    pub id_type: String,
    pub value: String,
}

/// Elemental composition: symbol -> atom count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition(BTreeMap<String, u32>);

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups an atom list by element symbol.
    pub fn from_atoms<I, S>(atoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for atom in atoms {
            *counts.entry(atom.as_ref().to_string()).or_insert(0) += 1;
        }
        Self(counts)
    }

    /// Adds `count` atoms of `symbol`.
    pub fn add(&mut self, symbol: impl Into<String>, count: u32) {
        *self.0.entry(symbol.into()).or_insert(0) += count;
    }

    pub fn get(&self, symbol: &str) -> Option<u32> {
        self.0.get(symbol).copied()
    }

    /// Entries in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(symbol, count)| (symbol.as_str(), *count))
    }

    /// Number of distinct elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of atoms.
    pub fn atom_count(&self) -> u64 {
        self.0.values().map(|count| u64::from(*count)).sum()
    }

    /// Reconstructs the atom multiset in symbol order.
    pub fn atoms(&self) -> Vec<&str> {
        self.0
            .iter()
            .flat_map(|(symbol, count)| std::iter::repeat(symbol.as_str()).take(*count as usize))
            .collect()
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        for (symbol, count) in &self.0 {
            if !is_element_symbol(symbol) {
                return Err(RecordValidationError::new(
                    "chemicalComposition",
                    format!("`{symbol}` is not an element symbol"),
                ));
            }
            if *count == 0 {
                return Err(RecordValidationError::new(
                    "chemicalComposition",
                    format!("count for `{symbol}` must be positive"),
                ));
            }
        }
        Ok(())
    }
}

/// Returns whether `value` is shaped like an element symbol (`H`, `Cl`, `Uuo`).
pub fn is_element_symbol(value: &str) -> bool {
    ELEMENT_SYMBOL_RE.is_match(value)
}

/// Chemical substance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub prime_id: PrimeId,
    pub copyright: Option<String>,
    /// Bibliography entry the species data was taken from.
    pub content: Option<PrimeId>,
    pub preferred_key: PreferredKey,
    pub cas_number: Option<String>,
    pub formula: Option<String>,
    pub inchi: Option<String>,
    /// Untyped alternate names in document order.
    pub names: Vec<String>,
    pub other_identifiers: Vec<TypedIdentifier>,
    pub composition: Composition,
}

impl Species {
    pub fn new(prime_id: PrimeId, preferred_key: impl Into<String>) -> Self {
        Self {
            prime_id,
            copyright: None,
            content: None,
            preferred_key: PreferredKey::new(preferred_key),
            cas_number: None,
            formula: None,
            inchi: None,
            names: Vec::new(),
            other_identifiers: Vec::new(),
            composition: Composition::new(),
        }
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        require_text("preferredKey", &self.preferred_key.value)?;
        for identifier in &self.other_identifiers {
            require_text("chemicalIdentifier", &identifier.id_type)?;
        }
        self.composition.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::{is_element_symbol, Composition};

    #[test]
    fn hydroxyl_composition_groups_and_reconstructs() {
        let composition = Composition::from_atoms(["O", "H"]);
        assert_eq!(composition.len(), 2);
        assert_eq!(composition.atom_count(), 2);
        assert_eq!(composition.atoms(), vec!["H", "O"]);
    }

    #[test]
    fn grouping_is_order_independent() {
        let first = Composition::from_atoms(["C", "H", "H", "O", "H", "H"]);
        let second = Composition::from_atoms(["H", "H", "H", "H", "O", "C"]);
        assert_eq!(first, second);
        assert_eq!(first.get("H"), Some(4));
        let entries: Vec<_> = first.iter().collect();
        assert_eq!(entries, vec![("C", 1), ("H", 4), ("O", 1)]);
    }

    #[test]
    fn symbol_shape_check() {
        assert!(is_element_symbol("Cl"));
        assert!(!is_element_symbol("cl"));
        assert!(!is_element_symbol(""));
        assert!(Composition::from_atoms(["x"]).validate().is_err());
    }
}
