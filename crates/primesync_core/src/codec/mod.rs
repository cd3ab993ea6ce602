//! Schema codec between typed records and interchange XML.
//!
//! # Responsibility
//! - Map each top-level record kind to and from its element tree.
//! - Report unresolved cross-references to the caller instead of resolving
//!   them here.
//!
//! # Invariants
//! - Pure: no I/O besides reading the given bytes.
//! - Encoded children follow one canonical order per kind.
//! - Optional elements that are absent decode to `None`; present but empty
//!   decode to `Some("")`.

mod bibliography;
mod kinetics;
mod reaction;
mod species;
pub mod xml;

pub use xml::Element;

use crate::model::ids::{EntityKind, MalformedIdentifier, PrimeId};
use crate::model::kinetics::KinModel;
use crate::model::reaction::Reaction;
use crate::model::source::Source;
use crate::model::species::Species;
use crate::model::RecordValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Interchange namespace URI.
pub const PRIME_NS: &str = "http://purl.org/NET/prime/";
/// XML Schema instance namespace URI.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Base URL for per-kind XSD files.
pub const SCHEMA_BASE: &str = "http://warehouse.primekinetics.org/schema/";

const PRIME_ID_ATTR: &str = "primeID";

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input is not well-formed XML. `position` is a byte offset.
    MalformedDocument { message: String, position: u64 },
    /// A required field is absent or a field value is invalid.
    SchemaViolation { field: String, reason: String },
    MalformedIdentifier(MalformedIdentifier),
    /// Serializer failure.
    Write(String),
}

impl CodecError {
    pub(crate) fn violation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDocument { message, position } => {
                write!(f, "malformed document at byte {position}: {message}")
            }
            Self::SchemaViolation { field, reason } => {
                write!(f, "schema violation on `{field}`: {reason}")
            }
            Self::MalformedIdentifier(err) => write!(f, "{err}"),
            Self::Write(message) => write!(f, "failed to write document: {message}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedIdentifier(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MalformedIdentifier> for CodecError {
    fn from(value: MalformedIdentifier) -> Self {
        Self::MalformedIdentifier(value)
    }
}

impl From<RecordValidationError> for CodecError {
    fn from(value: RecordValidationError) -> Self {
        Self::SchemaViolation {
            field: value.field.to_string(),
            reason: value.reason,
        }
    }
}

/// External reference a decoded record depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Normalized author name.
    Author(String),
    Species(PrimeId),
    Reaction(PrimeId),
    Source(PrimeId),
}

/// Decoded record plus the references the caller must resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub record: T,
    pub references: Vec<Reference>,
}

/// Per-kind mapping between a record and its document body.
pub trait PrimeDocument: Sized {
    const KIND: EntityKind;
    /// Root element local name.
    const ROOT: &'static str;
    /// XSD file name under `SCHEMA_BASE`.
    const SCHEMA_FILE: &'static str;

    fn prime_id(&self) -> PrimeId;
    /// Appends children in canonical order. The root is already built.
    fn encode_body(&self, root: &mut Element) -> CodecResult<()>;
    /// Reads children of a root whose kind and `primeID` are already checked.
    fn decode_body(prime_id: PrimeId, root: &Element) -> CodecResult<Decoded<Self>>;
}

/// Schema location URL for `kind`.
pub fn schema_location(kind: EntityKind) -> String {
    let file = match kind {
        EntityKind::Bibliography => Source::SCHEMA_FILE,
        EntityKind::Species => Species::SCHEMA_FILE,
        EntityKind::Reaction => Reaction::SCHEMA_FILE,
        EntityKind::KineticsModel => KinModel::SCHEMA_FILE,
    };
    format!("{SCHEMA_BASE}{file}")
}

/// Root element name for `kind`.
pub fn root_element(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Bibliography => Source::ROOT,
        EntityKind::Species => Species::ROOT,
        EntityKind::Reaction => Reaction::ROOT,
        EntityKind::KineticsModel => KinModel::ROOT,
    }
}

/// Maps a root element to its entity kind.
pub fn detect_kind(root: &Element) -> Option<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .find(|kind| root_element(*kind) == root.name)
}

/// Builds the full element tree for `record`.
pub fn encode<D: PrimeDocument>(record: &D) -> CodecResult<Element> {
    let mut root = Element::new(D::ROOT)
        .with_attr("xmlns", PRIME_NS)
        .with_attr("xmlns:xsi", XSI_NS)
        .with_attr("xsi:schemaLocation", schema_location(D::KIND))
        .with_attr(PRIME_ID_ATTR, record.prime_id().to_string());
    record.encode_body(&mut root)?;
    Ok(root)
}

/// Encodes `record` to indented document bytes.
pub fn encode_to_bytes<D: PrimeDocument>(record: &D) -> CodecResult<Vec<u8>> {
    xml::write(&encode(record)?)
}

/// Decodes a root element as kind `D`.
pub fn decode<D: PrimeDocument>(root: &Element) -> CodecResult<Decoded<D>> {
    if !root.is_prime() {
        return Err(CodecError::violation(
            "xmlns",
            format!("root must be in namespace {PRIME_NS}"),
        ));
    }
    if root.name != D::ROOT {
        return Err(CodecError::violation(
            "root",
            format!("expected <{}>, found <{}>", D::ROOT, root.name),
        ));
    }
    let raw_id = root
        .attr(PRIME_ID_ATTR)
        .ok_or_else(|| CodecError::violation(PRIME_ID_ATTR, "missing"))?;
    let prime_id = PrimeId::parse(D::KIND, raw_id.trim())?;
    D::decode_body(prime_id, root)
}

/// Parses bytes and decodes them as kind `D`.
pub fn decode_bytes<D: PrimeDocument>(bytes: &[u8]) -> CodecResult<Decoded<D>> {
    decode(&xml::parse(bytes)?)
}

/// Any decoded top-level document.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedDocument {
    Source(Decoded<Source>),
    Species(Decoded<Species>),
    Reaction(Decoded<Reaction>),
    KinModel(Decoded<KinModel>),
}

impl DecodedDocument {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Source(_) => EntityKind::Bibliography,
            Self::Species(_) => EntityKind::Species,
            Self::Reaction(_) => EntityKind::Reaction,
            Self::KinModel(_) => EntityKind::KineticsModel,
        }
    }

    pub fn prime_id(&self) -> PrimeId {
        match self {
            Self::Source(decoded) => decoded.record.prime_id,
            Self::Species(decoded) => decoded.record.prime_id,
            Self::Reaction(decoded) => decoded.record.prime_id,
            Self::KinModel(decoded) => decoded.record.prime_id,
        }
    }

    pub fn references(&self) -> &[Reference] {
        match self {
            Self::Source(decoded) => &decoded.references,
            Self::Species(decoded) => &decoded.references,
            Self::Reaction(decoded) => &decoded.references,
            Self::KinModel(decoded) => &decoded.references,
        }
    }
}

/// Decodes a root element of any supported kind.
pub fn decode_element(root: &Element) -> CodecResult<DecodedDocument> {
    match detect_kind(root) {
        Some(EntityKind::Bibliography) => decode(root).map(DecodedDocument::Source),
        Some(EntityKind::Species) => decode(root).map(DecodedDocument::Species),
        Some(EntityKind::Reaction) => decode(root).map(DecodedDocument::Reaction),
        Some(EntityKind::KineticsModel) => decode(root).map(DecodedDocument::KinModel),
        None => Err(CodecError::violation(
            "root",
            format!("unsupported root element <{}>", root.name),
        )),
    }
}

/// Parses and decodes a document of any supported kind.
pub fn decode_document(bytes: &[u8]) -> CodecResult<DecodedDocument> {
    decode_element(&xml::parse(bytes)?)
}

/// Text of at most one child `name`: absent -> `None`, empty -> `Some("")`.
pub(crate) fn optional_child_text(root: &Element, name: &str) -> CodecResult<Option<String>> {
    let mut matches = root.children_named(name);
    let first = matches.next();
    if matches.next().is_some() {
        return Err(CodecError::violation(name, "appears more than once"));
    }
    Ok(first.map(|element| element.text_or_empty().to_string()))
}

/// Text of exactly one non-blank child `name`.
pub(crate) fn required_child_text(root: &Element, name: &str) -> CodecResult<String> {
    match optional_child_text(root, name)? {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(CodecError::violation(name, "must not be blank")),
        None => Err(CodecError::violation(name, "missing")),
    }
}

/// Parses a `PrimeId` attribute of `element`, reporting the attribute on failure.
pub(crate) fn required_id_attr(
    element: &Element,
    attr: &str,
    kind: EntityKind,
) -> CodecResult<PrimeId> {
    let raw = element.attr(attr).ok_or_else(|| {
        CodecError::violation(format!("{}@{attr}", element.name), "missing")
    })?;
    Ok(PrimeId::parse(kind, raw.trim())?)
}
