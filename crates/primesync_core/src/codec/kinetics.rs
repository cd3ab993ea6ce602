//! `<kineticsModel>` documents.
//!
//! Child order: `name`?, then one `kinetics` per entry carrying
//! `reactionPrimeID` and `bibliography` attributes, a `rateExpression`
//! block of `parameter`s, and an optional `comment`.

use super::{
    optional_child_text, required_id_attr, CodecError, CodecResult, Decoded, Element,
    PrimeDocument, Reference,
};
use crate::model::ids::{EntityKind, PrimeId};
use crate::model::kinetics::{KinModel, Kinetics, RateExpression, RateParameter};

impl PrimeDocument for KinModel {
    const KIND: EntityKind = EntityKind::KineticsModel;
    const ROOT: &'static str = "kineticsModel";
    const SCHEMA_FILE: &'static str = "kineticsModel.xsd";

    fn prime_id(&self) -> PrimeId {
        self.prime_id
    }

    fn encode_body(&self, root: &mut Element) -> CodecResult<()> {
        self.validate()?;
        if let Some(name) = &self.name {
            root.push(Element::new("name").with_text(name.as_str()));
        }
        for entry in &self.kinetics {
            let mut kinetics = Element::new("kinetics")
                .with_attr("reactionPrimeID", entry.reaction.to_string())
                .with_attr("bibliography", entry.source.to_string());

            let mut rate = Element::new("rateExpression");
            if let Some(form) = &entry.rate.form {
                rate.set_attr("form", form.as_str());
            }
            for parameter in &entry.rate.parameters {
                let mut element = Element::new("parameter").with_attr("name", parameter.name.as_str());
                if let Some(units) = &parameter.units {
                    element.set_attr("units", units.as_str());
                }
                rate.push(element.with_text(parameter.value.to_string()));
            }
            kinetics.push(rate);

            if let Some(comment) = &entry.comment {
                kinetics.push(Element::new("comment").with_text(comment.as_str()));
            }
            root.push(kinetics);
        }
        Ok(())
    }

    fn decode_body(prime_id: PrimeId, root: &Element) -> CodecResult<Decoded<Self>> {
        let mut model = KinModel::new(prime_id);
        model.name = optional_child_text(root, "name")?;
        let mut references = Vec::new();

        for element in root.children_named("kinetics") {
            let reaction = required_id_attr(element, "reactionPrimeID", EntityKind::Reaction)?;
            let source = required_id_attr(element, "bibliography", EntityKind::Bibliography)?;

            let mut rate = RateExpression::default();
            let mut blocks = element.children_named("rateExpression");
            if let Some(block) = blocks.next() {
                rate.form = block.attr("form").map(str::to_string);
                for parameter in block.children_named("parameter") {
                    rate.parameters.push(decode_parameter(parameter)?);
                }
            }
            if blocks.next().is_some() {
                return Err(CodecError::violation("rateExpression", "appears more than once"));
            }

            references.push(Reference::Reaction(reaction));
            references.push(Reference::Source(source));
            model.kinetics.push(Kinetics {
                reaction,
                source,
                rate,
                comment: optional_child_text(element, "comment")?,
            });
        }

        Ok(Decoded {
            record: model,
            references,
        })
    }
}

fn decode_parameter(element: &Element) -> CodecResult<RateParameter> {
    let name = element
        .attr("name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CodecError::violation("parameter@name", "missing"))?;
    let raw = element.text_or_empty().trim();
    let value = match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            return Err(CodecError::violation(
                "parameter",
                format!("value `{raw}` of `{name}` is not a finite number"),
            ))
        }
    };
    Ok(RateParameter {
        name: name.to_string(),
        value,
        units: element.attr("units").map(str::to_string),
    })
}
