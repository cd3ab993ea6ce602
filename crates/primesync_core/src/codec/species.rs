//! `<chemicalSpecies>` documents.
//!
//! Child order: `copyright`?, `content`?, `preferredKey`, `chemicalIdentifier`,
//! `chemicalComposition`. Inside `chemicalIdentifier` names are written as
//! CAS, formula, untyped names, other typed names, InChI. Composition atoms
//! are written in element-symbol order.

use super::{
    optional_child_text, required_child_text, required_id_attr, CodecError, CodecResult,
    Decoded, Element, PrimeDocument, Reference,
};
use crate::model::ids::{EntityKind, PrimeId};
use crate::model::species::{is_element_symbol, Composition, Species, TypedIdentifier};

const CAS_TYPE: &str = "CASRegistryNumber";
const FORMULA_TYPE: &str = "formula";
const INCHI_TYPE: &str = "InChI";

impl PrimeDocument for Species {
    const KIND: EntityKind = EntityKind::Species;
    const ROOT: &'static str = "chemicalSpecies";
    const SCHEMA_FILE: &'static str = "species.xsd";

    fn prime_id(&self) -> PrimeId {
        self.prime_id
    }

    fn encode_body(&self, root: &mut Element) -> CodecResult<()> {
        self.validate()?;

        if let Some(copyright) = &self.copyright {
            root.push(Element::new("copyright").with_text(copyright.as_str()));
        }
        if let Some(source) = &self.content {
            root.push(Element::new("content").with_attr("bibliography", source.to_string()));
        }

        let mut key = Element::new("preferredKey");
        if let Some(group) = &self.preferred_key.group {
            key.set_attr("group", group.as_str());
        }
        if let Some(key_type) = &self.preferred_key.key_type {
            key.set_attr("type", key_type.as_str());
        }
        root.push(key.with_text(self.preferred_key.value.as_str()));

        let mut identifiers = Element::new("chemicalIdentifier");
        if let Some(cas) = &self.cas_number {
            identifiers.push(typed_name(CAS_TYPE, cas));
        }
        if let Some(formula) = &self.formula {
            identifiers.push(typed_name(FORMULA_TYPE, formula));
        }
        for name in &self.names {
            identifiers.push(Element::new("name").with_text(name.as_str()));
        }
        for other in &self.other_identifiers {
            identifiers.push(typed_name(&other.id_type, &other.value));
        }
        if let Some(inchi) = &self.inchi {
            identifiers.push(typed_name(INCHI_TYPE, inchi));
        }
        root.push(identifiers);

        root.push(encode_composition(&self.composition));
        Ok(())
    }

    fn decode_body(prime_id: PrimeId, root: &Element) -> CodecResult<Decoded<Self>> {
        let key_element = single_child(root, "preferredKey")?;
        let key_value = required_child_text(root, "preferredKey")?;
        let mut species = Species::new(prime_id, key_value);
        species.preferred_key.group = key_element
            .and_then(|element| element.attr("group"))
            .map(str::to_string);
        species.preferred_key.key_type = key_element
            .and_then(|element| element.attr("type"))
            .map(str::to_string);
        species.copyright = optional_child_text(root, "copyright")?;

        let mut references = Vec::new();
        if let Some(content) = single_child(root, "content")? {
            let source = required_id_attr(content, "bibliography", EntityKind::Bibliography)?;
            species.content = Some(source);
            references.push(Reference::Source(source));
        }

        if let Some(identifiers) = single_child(root, "chemicalIdentifier")? {
            for name in identifiers.children_named("name") {
                let value = name.text_or_empty().to_string();
                match name.attr("type") {
                    Some(CAS_TYPE) => set_once(&mut species.cas_number, value, CAS_TYPE)?,
                    Some(FORMULA_TYPE) => set_once(&mut species.formula, value, FORMULA_TYPE)?,
                    Some(INCHI_TYPE) => set_once(&mut species.inchi, value, INCHI_TYPE)?,
                    Some(other) => species.other_identifiers.push(TypedIdentifier {
                        id_type: other.to_string(),
                        value,
                    }),
                    None => species.names.push(value),
                }
            }
        }

        if let Some(composition) = single_child(root, "chemicalComposition")? {
            species.composition = decode_composition(composition)?;
        }

        Ok(Decoded {
            record: species,
            references,
        })
    }
}

/// Writes one `<atom symbol="X">n</atom>` per distinct element.
pub(crate) fn encode_composition(composition: &Composition) -> Element {
    let mut block = Element::new("chemicalComposition");
    for (symbol, count) in composition.iter() {
        block.push(
            Element::new("atom")
                .with_attr("symbol", symbol)
                .with_text(count.to_string()),
        );
    }
    block
}

pub(crate) fn decode_composition(block: &Element) -> CodecResult<Composition> {
    let mut composition = Composition::new();
    for atom in block.children_named("atom") {
        let symbol = atom
            .attr("symbol")
            .map(str::trim)
            .ok_or_else(|| CodecError::violation("atom@symbol", "missing"))?;
        if !is_element_symbol(symbol) {
            return Err(CodecError::violation(
                "atom@symbol",
                format!("`{symbol}` is not an element symbol"),
            ));
        }
        if composition.get(symbol).is_some() {
            return Err(CodecError::violation(
                "atom@symbol",
                format!("`{symbol}` listed more than once"),
            ));
        }
        let raw = atom.text_or_empty().trim();
        let count = match raw.parse::<u32>() {
            Ok(count) if count > 0 => count,
            _ => {
                return Err(CodecError::violation(
                    "atom",
                    format!("count `{raw}` for `{symbol}` must be a positive integer"),
                ))
            }
        };
        composition.add(symbol, count);
    }
    Ok(composition)
}

fn typed_name(id_type: &str, value: &str) -> Element {
    Element::new("name").with_attr("type", id_type).with_text(value)
}

fn single_child<'a>(root: &'a Element, name: &'a str) -> CodecResult<Option<&'a Element>> {
    let mut matches = root.children_named(name);
    let first = matches.next();
    if matches.next().is_some() {
        return Err(CodecError::violation(name, "appears more than once"));
    }
    Ok(first)
}

fn set_once(slot: &mut Option<String>, value: String, id_type: &str) -> CodecResult<()> {
    if slot.is_some() {
        return Err(CodecError::violation(
            format!("name[type={id_type}]"),
            "appears more than once",
        ));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::codec::{decode_bytes, encode, encode_to_bytes, CodecError, Reference};
    use crate::model::ids::{EntityKind, PrimeId};
    use crate::model::species::{Composition, Species};

    const HYDROXYL: &[u8] = br#"<?xml version="1.0" encoding="utf-8"?>
<chemicalSpecies xmlns="http://purl.org/NET/prime/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" primeID="s00010102" xsi:schemaLocation="http://warehouse.primekinetics.org/schema/species.xsd">
  <copyright>primekinetics.org 2005</copyright>
  <content bibliography="b00014319"/>
  <preferredKey group="prime" type="formula">OH</preferredKey>
  <chemicalIdentifier>
    <name type="CASRegistryNumber">3352-57-6</name>
    <name>hydroxyl radical</name>
    <name>hydroxyl</name>
    <name type="InChI">InChI=1/HO/h1H</name>
  </chemicalIdentifier>
  <chemicalComposition>
    <atom symbol="O">1</atom>
    <atom symbol="H">1</atom>
  </chemicalComposition>
</chemicalSpecies>"#;

    #[test]
    fn decodes_hydroxyl_radical() {
        let decoded = decode_bytes::<Species>(HYDROXYL).unwrap();
        let source = PrimeId::new(EntityKind::Bibliography, 14319).unwrap();
        assert_eq!(decoded.references, vec![Reference::Source(source)]);
        let species = decoded.record;
        assert_eq!(species.content, Some(source));
        assert_eq!(species.preferred_key.value, "OH");
        assert_eq!(species.preferred_key.group.as_deref(), Some("prime"));
        assert_eq!(species.cas_number.as_deref(), Some("3352-57-6"));
        assert_eq!(species.inchi.as_deref(), Some("InChI=1/HO/h1H"));
        assert_eq!(species.formula, None);
        assert_eq!(species.names, vec!["hydroxyl radical", "hydroxyl"]);
        assert_eq!(species.composition, Composition::from_atoms(["O", "H"]));
    }

    #[test]
    fn composition_block_has_one_entry_per_element_in_symbol_order() {
        let mut species = Species::new(PrimeId::new(EntityKind::Species, 10102).unwrap(), "OH");
        species.composition = Composition::from_atoms(["O", "H"]);
        let root = encode(&species).unwrap();
        let block = root.children_named("chemicalComposition").next().unwrap();
        let entries: Vec<(&str, &str)> = block
            .children_named("atom")
            .map(|atom| (atom.attr("symbol").unwrap(), atom.text_or_empty()))
            .collect();
        assert_eq!(entries, vec![("H", "1"), ("O", "1")]);
    }

    #[test]
    fn content_link_is_written_after_copyright() {
        let mut species = Species::new(PrimeId::new(EntityKind::Species, 10102).unwrap(), "OH");
        species.copyright = Some("primekinetics.org 2005".into());
        species.content = Some(PrimeId::new(EntityKind::Bibliography, 14319).unwrap());
        let root = encode(&species).unwrap();
        let order: Vec<&str> = root.children.iter().map(|child| child.name.as_str()).collect();
        assert_eq!(
            order,
            vec!["copyright", "content", "preferredKey", "chemicalIdentifier", "chemicalComposition"]
        );
        assert_eq!(root.children[1].attr("bibliography"), Some("b00014319"));
    }

    #[test]
    fn content_with_foreign_identifier_is_rejected() {
        let err = decode_bytes::<Species>(
            br#"<chemicalSpecies xmlns="http://purl.org/NET/prime/" primeID="s00000001"><content bibliography="s00014319"/><preferredKey>H</preferredKey></chemicalSpecies>"#,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::MalformedIdentifier(_)), "{err}");
    }

    #[test]
    fn missing_preferred_key_is_schema_violation() {
        let err = decode_bytes::<Species>(
            br#"<chemicalSpecies xmlns="http://purl.org/NET/prime/" primeID="s00000001"/>"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodecError::SchemaViolation {
                field: "preferredKey".into(),
                reason: "missing".into()
            }
        );
    }

    #[test]
    fn non_positive_or_duplicate_atoms_are_rejected() {
        for body in [
            r#"<atom symbol="H">0</atom>"#,
            r#"<atom symbol="H">-2</atom>"#,
            r#"<atom symbol="H">1</atom><atom symbol="H">1</atom>"#,
            r#"<atom>1</atom>"#,
        ] {
            let doc = format!(
                r#"<chemicalSpecies xmlns="http://purl.org/NET/prime/" primeID="s00000001"><preferredKey>H</preferredKey><chemicalComposition>{body}</chemicalComposition></chemicalSpecies>"#
            );
            let err = decode_bytes::<Species>(doc.as_bytes()).unwrap_err();
            assert!(matches!(err, CodecError::SchemaViolation { .. }), "{body}: {err}");
        }
    }

    #[test]
    fn encode_rejects_blank_preferred_key() {
        let species = Species::new(PrimeId::new(EntityKind::Species, 1).unwrap(), " ");
        assert!(matches!(
            encode_to_bytes(&species),
            Err(CodecError::SchemaViolation { ref field, .. }) if field == "preferredKey"
        ));
    }
}
