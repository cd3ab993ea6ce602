//! Entity kinds and PrIMe external identifiers.
//!
//! # Responsibility
//! - Name the four top-level entity kinds carried by the interchange format.
//! - Represent external identifiers (`sNNNNNNNN`, `rNNNNNNNN`, `bNNNNNNNN`,
//!   `kNNNNNNNN`) as typed values instead of loose strings.
//!
//! # Invariants
//! - A `PrimeId` number is always in `1..=PrimeId::MAX_NUMBER`.
//! - The textual form is the kind prefix followed by exactly eight digits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static PRIME_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([bskr])([0-9]{8})$").expect("valid prime id regex"));

/// Top-level entity kind of one interchange document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Bibliography item (`Source`).
    Bibliography,
    /// Chemical species.
    Species,
    /// Reaction composed of stoichiometry entries.
    Reaction,
    /// Kinetics model aggregating kinetics entries.
    KineticsModel,
}

impl EntityKind {
    /// All kinds in import dependency order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Bibliography,
        EntityKind::Species,
        EntityKind::Reaction,
        EntityKind::KineticsModel,
    ];

    /// Identifier prefix letter.
    pub fn prefix(self) -> char {
        match self {
            Self::Bibliography => 'b',
            Self::Species => 's',
            Self::Reaction => 'r',
            Self::KineticsModel => 'k',
        }
    }

    /// Stable lowercase name used in logs, configs and failure records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bibliography => "bibliography",
            Self::Species => "species",
            Self::Reaction => "reaction",
            Self::KineticsModel => "kinetics_model",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "b" => Some(Self::Bibliography),
            "s" => Some(Self::Species),
            "r" => Some(Self::Reaction),
            "k" => Some(Self::KineticsModel),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized entity kind names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityKind(pub String);

impl Display for UnknownEntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown entity kind `{}`; expected bibliography|species|reaction|kinetics_model",
            self.0
        )
    }
}

impl Error for UnknownEntityKind {}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bibliography" | "source" => Ok(Self::Bibliography),
            "species" => Ok(Self::Species),
            "reaction" | "reactions" => Ok(Self::Reaction),
            "kinetics_model" | "model" | "models" => Ok(Self::KineticsModel),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// External identifier rejected by pattern validation.
///
/// Carries the offending string for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedIdentifier {
    /// Raw rejected value.
    pub value: String,
    /// Kind the caller expected, when known.
    pub expected: Option<EntityKind>,
}

impl Display for MalformedIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.expected {
            Some(kind) => write!(
                f,
                "malformed {kind} identifier `{}`; expected `{}` followed by 8 digits",
                self.value,
                kind.prefix()
            ),
            None => write!(f, "malformed identifier `{}`", self.value),
        }
    }
}

impl Error for MalformedIdentifier {}

/// Typed PrIMe external identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrimeId {
    kind: EntityKind,
    number: u32,
}

impl PrimeId {
    /// Largest number representable with eight digits.
    pub const MAX_NUMBER: u32 = 99_999_999;

    /// Builds an identifier from kind and number.
    pub fn new(kind: EntityKind, number: u32) -> Result<Self, MalformedIdentifier> {
        if number == 0 || number > Self::MAX_NUMBER {
            return Err(MalformedIdentifier {
                value: format!("{}{number}", kind.prefix()),
                expected: Some(kind),
            });
        }
        Ok(Self { kind, number })
    }

    /// Parses an identifier that must belong to `kind`.
    pub fn parse(kind: EntityKind, value: &str) -> Result<Self, MalformedIdentifier> {
        let parsed = Self::parse_any(value).map_err(|err| MalformedIdentifier {
            expected: Some(kind),
            ..err
        })?;
        if parsed.kind != kind {
            return Err(MalformedIdentifier {
                value: value.to_string(),
                expected: Some(kind),
            });
        }
        Ok(parsed)
    }

    /// Parses an identifier of any kind, inferring the kind from its prefix.
    pub fn parse_any(value: &str) -> Result<Self, MalformedIdentifier> {
        let malformed = || MalformedIdentifier {
            value: value.to_string(),
            expected: None,
        };
        let captures = PRIME_ID_RE.captures(value).ok_or_else(malformed)?;
        let kind = EntityKind::from_prefix(&captures[1]).ok_or_else(malformed)?;
        let number = captures[2].parse::<u32>().map_err(|_| malformed())?;
        if number == 0 {
            return Err(malformed());
        }
        Ok(Self { kind, number })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl Display for PrimeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:08}", self.kind.prefix(), self.number)
    }
}

impl TryFrom<String> for PrimeId {
    type Error = MalformedIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_any(&value)
    }
}

impl From<PrimeId> for String {
    fn from(value: PrimeId) -> Self {
        value.to_string()
    }
}
