//! `<bibliography>` documents.
//!
//! Child order: `author`*, `title`, then the optional text fields from
//! `OPTIONAL_FIELDS` in table order. DOI has no interchange element and is
//! neither read nor written.

use super::{
    optional_child_text, required_child_text, CodecError, CodecResult, Decoded, Element,
    PrimeDocument, Reference,
};
use crate::model::ids::{EntityKind, PrimeId};
use crate::model::source::{normalize_author_name, Source};

/// Optional single-text child mapped onto one `Source` field.
struct TextField {
    element: &'static str,
    get: fn(&Source) -> Option<String>,
    set: fn(&mut Source, String) -> CodecResult<()>,
}

const OPTIONAL_FIELDS: &[TextField] = &[
    TextField {
        element: "journal",
        get: |source| source.journal.clone(),
        set: |source, value| {
            source.journal = Some(value);
            Ok(())
        },
    },
    TextField {
        element: "year",
        get: |source| source.year.map(|year| year.to_string()),
        // A blank `<year/>` carries no year and is read as absent.
        set: |source, value| {
            if value.trim().is_empty() {
                source.year = None;
                return Ok(());
            }
            let year = value.trim().parse::<i32>().map_err(|_| {
                CodecError::violation("year", format!("`{value}` is not a year"))
            })?;
            source.year = Some(year);
            Ok(())
        },
    },
    TextField {
        element: "volume",
        get: |source| source.volume.clone(),
        set: |source, value| {
            source.volume = Some(value);
            Ok(())
        },
    },
    TextField {
        element: "pages",
        get: |source| source.pages.clone(),
        set: |source, value| {
            source.pages = Some(value);
            Ok(())
        },
    },
];

impl PrimeDocument for Source {
    const KIND: EntityKind = EntityKind::Bibliography;
    const ROOT: &'static str = "bibliography";
    const SCHEMA_FILE: &'static str = "bibliography.xsd";

    fn prime_id(&self) -> PrimeId {
        self.prime_id
    }

    fn encode_body(&self, root: &mut Element) -> CodecResult<()> {
        self.validate()?;
        for author in &self.authors {
            root.push(Element::new("author").with_text(normalize_author_name(author)));
        }
        root.push(Element::new("title").with_text(self.title.as_str()));
        for field in OPTIONAL_FIELDS {
            if let Some(value) = (field.get)(self) {
                root.push(Element::new(field.element).with_text(value));
            }
        }
        Ok(())
    }

    fn decode_body(prime_id: PrimeId, root: &Element) -> CodecResult<Decoded<Self>> {
        let title = required_child_text(root, "title")?;
        let mut source = Source::new(prime_id, title);
        let mut references = Vec::new();

        for author in root.children_named("author") {
            let name = normalize_author_name(author.text_or_empty());
            if name.is_empty() {
                return Err(CodecError::violation("author", "must not be blank"));
            }
            references.push(Reference::Author(name.clone()));
            source.authors.push(name);
        }

        for field in OPTIONAL_FIELDS {
            if let Some(value) = optional_child_text(root, field.element)? {
                (field.set)(&mut source, value)?;
            }
        }

        Ok(Decoded {
            record: source,
            references,
        })
    }
}
