//! `<reaction>` documents.
//!
//! Child order: `copyright`?, `reactants`. Every stoichiometry entry is one
//! `speciesLink` inside `reactants`; the sign of its text is the role.

use super::{
    optional_child_text, required_id_attr, CodecError, CodecResult, Decoded, Element,
    PrimeDocument, Reference,
};
use crate::model::ids::{EntityKind, PrimeId};
use crate::model::reaction::{Reaction, Stoichiometry};

impl PrimeDocument for Reaction {
    const KIND: EntityKind = EntityKind::Reaction;
    const ROOT: &'static str = "reaction";
    const SCHEMA_FILE: &'static str = "reaction.xsd";

    fn prime_id(&self) -> PrimeId {
        self.prime_id
    }

    fn encode_body(&self, root: &mut Element) -> CodecResult<()> {
        self.validate()?;
        if let Some(copyright) = &self.copyright {
            root.push(Element::new("copyright").with_text(copyright.as_str()));
        }

        let mut reactants = Element::new("reactants");
        for entry in &self.stoichiometry {
            let mut link = Element::new("speciesLink");
            if let Some(key) = &entry.preferred_key {
                link.set_attr("preferredKey", key.as_str());
            }
            link.set_attr("primeID", entry.species.to_string());
            reactants.push(link.with_text(entry.coefficient.to_string()));
        }
        root.push(reactants);
        Ok(())
    }

    fn decode_body(prime_id: PrimeId, root: &Element) -> CodecResult<Decoded<Self>> {
        let mut reaction = Reaction::new(prime_id);
        reaction.copyright = optional_child_text(root, "copyright")?;
        let mut references = Vec::new();

        for block in root.children_named("reactants") {
            for link in block.children_named("speciesLink") {
                let species = required_id_attr(link, "primeID", EntityKind::Species)?;
                let raw = link.text_or_empty().trim();
                let coefficient = match raw.parse::<i32>() {
                    Ok(value) if value != 0 => value,
                    _ => {
                        return Err(CodecError::violation(
                            "speciesLink",
                            format!("coefficient `{raw}` for {species} must be a non-zero integer"),
                        ))
                    }
                };
                references.push(Reference::Species(species));
                reaction.stoichiometry.push(Stoichiometry {
                    species,
                    preferred_key: link.attr("preferredKey").map(str::to_string),
                    coefficient,
                });
            }
        }

        if reaction.stoichiometry.is_empty() {
            return Err(CodecError::violation(
                "reactants",
                "reaction needs at least one species link",
            ));
        }

        Ok(Decoded {
            record: reaction,
            references,
        })
    }
}
