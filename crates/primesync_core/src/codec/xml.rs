//! Owned XML element tree over `quick-xml`.
//!
//! # Responsibility
//! - Parse interchange bytes into a namespace-resolved `Element` tree.
//! - Write an `Element` tree back as indented, declaration-prefixed XML.
//!
//! # Invariants
//! - Parsing never returns a partial tree: truncated input is an error.
//! - Leaf text is kept exactly as written; an element without text has
//!   `text == None`.
//! - Whitespace-only text between child elements is layout and is dropped.

use super::{CodecError, CodecResult, PRIME_NS};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;

const INDENT_WIDTH: usize = 2;

/// One XML element with resolved namespace and raw-keyed attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Local name without prefix.
    pub name: String,
    /// Resolved namespace URI, if bound.
    pub namespace: Option<String>,
    /// Attributes keyed by their qualified name as written (`xsi:schemaLocation`).
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an element in the interchange namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(PRIME_NS.to_string()),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Whether this element belongs to the interchange namespace.
    pub fn is_prime(&self) -> bool {
        self.namespace.as_deref() == Some(PRIME_NS)
    }

    /// Interchange-namespace children with local name `name`.
    ///
    /// Yielded elements borrow from `self` only, so they may outlive `name`.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children
            .iter()
            .filter(move |child| child.is_prime() && child.name == name)
    }

    /// Text content, with "present but empty" mapped to `""`.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Parses a complete document into its root element.
pub fn parse(bytes: &[u8]) -> CodecResult<Element> {
    let mut reader = NsReader::from_reader(bytes);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let step = match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(start))) => open_element(&ns, &start, position).map(|element| {
                stack.push(element);
                false
            }),
            Ok((ns, Event::Empty(start))) => open_element(&ns, &start, position)
                .and_then(|element| attach(&mut stack, &mut root, element, position))
                .map(|()| false),
            Ok((_, Event::End(_))) => match stack.pop() {
                Some(mut element) => {
                    drop_layout_text(&mut element);
                    attach(&mut stack, &mut root, element, position).map(|()| false)
                }
                None => Err(malformed("unexpected closing tag", position)),
            },
            Ok((_, Event::Text(text))) => match text.unescape() {
                Ok(value) => append_text(&mut stack, &value, position).map(|()| false),
                Err(err) => Err(malformed(err, position)),
            },
            Ok((_, Event::CData(data))) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                append_text(&mut stack, &value, position).map(|()| false)
            }
            Ok((_, Event::Eof)) => Ok(true),
            Ok(_) => Ok(false),
            Err(err) => Err(CodecError::MalformedDocument {
                message: err.to_string(),
                position,
            }),
        };
        buf.clear();

        match step {
            Ok(true) => break,
            Ok(false) => {}
            Err(CodecError::MalformedDocument { message, position }) => {
                return Err(CodecError::MalformedDocument {
                    message,
                    position: position.max(reader.error_position() as u64),
                });
            }
            Err(other) => return Err(other),
        }
    }

    let end = reader.buffer_position() as u64;
    if let Some(open) = stack.last() {
        return Err(malformed(
            format!("unexpected end of document inside <{}>", open.name),
            end,
        ));
    }
    root.ok_or_else(|| malformed("document has no root element", end))
}

/// Serializes a root element with XML declaration and 2-space indentation.
pub fn write(root: &Element) -> CodecResult<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    write_element(&mut writer, root)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> CodecResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_none() && element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    if let Some(text) = element.text.as_deref() {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

fn open_element(ns: &ResolveResult<'_>, start: &BytesStart<'_>, position: u64) -> CodecResult<Element> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let namespace = match ns {
        ResolveResult::Bound(namespace) => {
            Some(String::from_utf8_lossy(namespace.as_ref()).into_owned())
        }
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(malformed(
                format!(
                    "unbound namespace prefix `{}` on <{name}>",
                    String::from_utf8_lossy(prefix)
                ),
                position,
            ));
        }
    };

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| malformed(err, position))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| malformed(err, position))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        namespace,
        attributes,
        text: None,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> CodecResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(malformed("multiple root elements", position));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [Element], value: &str, position: u64) -> CodecResult<()> {
    let Some(current) = stack.last_mut() else {
        if value.trim().is_empty() {
            return Ok(());
        }
        return Err(malformed("text outside of root element", position));
    };
    match current.text.as_mut() {
        Some(existing) => existing.push_str(value),
        None => current.text = Some(value.to_string()),
    }
    Ok(())
}

/// Clears indentation whitespace collected around the children of a container.
fn drop_layout_text(element: &mut Element) {
    let layout = !element.children.is_empty()
        && element
            .text
            .as_deref()
            .is_some_and(|text| text.trim().is_empty());
    if layout {
        element.text = None;
    }
}

fn malformed(message: impl ToString, position: u64) -> CodecError {
    CodecError::MalformedDocument {
        message: message.to_string(),
        position,
    }
}

fn write_error(err: impl ToString) -> CodecError {
    CodecError::Write(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse, write, Element};
    use crate::codec::{CodecError, PRIME_NS};

    #[test]
    fn parse_resolves_default_namespace_and_attributes() {
        let root = parse(
            br#"<?xml version="1.0"?>
<bibliography xmlns="http://purl.org/NET/prime/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" primeID="b00000001">
  <author> W. Tsang </author>
  <journal/>
  <other xmlns="urn:elsewhere">x</other>
</bibliography>"#,
        )
        .unwrap();
        assert_eq!(root.name, "bibliography");
        assert_eq!(root.namespace.as_deref(), Some(PRIME_NS));
        assert_eq!(root.attr("primeID"), Some("b00000001"));
        assert_eq!(root.text, None);
        assert_eq!(root.children_named("author").next().unwrap().text.as_deref(), Some(" W. Tsang "));
        assert_eq!(root.children_named("journal").next().unwrap().text, None);
        assert_eq!(root.children_named("other").count(), 0);
    }

    #[test]
    fn truncated_document_is_malformed() {
        let err = parse(b"<bibliography xmlns=\"http://purl.org/NET/prime/\"><title>Rate").unwrap_err();
        match err {
            CodecError::MalformedDocument { message, position } => {
                assert!(message.contains("title"), "{message}");
                assert!(position > 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatched_and_empty_documents_are_malformed() {
        assert!(matches!(
            parse(b"<a><b></a>"),
            Err(CodecError::MalformedDocument { .. })
        ));
        assert!(matches!(parse(b""), Err(CodecError::MalformedDocument { .. })));
        assert!(matches!(
            parse(b"<a/><b/>"),
            Err(CodecError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn write_indents_and_keeps_text_inline() {
        let mut root = Element::new("reaction").with_attr("primeID", "r00000011");
        let mut reactants = Element::new("reactants");
        reactants.push(
            Element::new("speciesLink")
                .with_attr("primeID", "s00000275")
                .with_text("-1"),
        );
        root.push(reactants);
        root.push(Element::new("content"));

        let text = String::from_utf8(write(&root).unwrap()).unwrap();
        assert_eq!(
            text,
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<reaction primeID=\"r00000011\">\n",
                "  <reactants>\n",
                "    <speciesLink primeID=\"s00000275\">-1</speciesLink>\n",
                "  </reactants>\n",
                "  <content/>\n",
                "</reaction>\n",
            )
        );
    }

    #[test]
    fn escaped_text_survives_write_and_parse() {
        let root = Element::new("name")
            .with_attr("xmlns", PRIME_NS)
            .with_text("A & B <c>");
        let parsed = parse(&write(&root).unwrap()).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("A & B <c>"));
    }

    #[test]
    fn leaf_whitespace_survives_write_and_parse() {
        let mut root = Element::new("chemicalIdentifier").with_attr("xmlns", PRIME_NS);
        root.push(Element::new("name").with_text(" hydroxyl "));
        root.push(Element::new("name").with_text("OH\t"));

        let parsed = parse(&write(&root).unwrap()).unwrap();
        assert_eq!(parsed.text, None);
        let names: Vec<&str> = parsed
            .children_named("name")
            .map(|name| name.text_or_empty())
            .collect();
        assert_eq!(names, vec![" hydroxyl ", "OH\t"]);
    }

    fn first_named<'a>(root: &'a Element, name: &str) -> Option<&'a Element> {
        root.children_named(name).next()
    }

    #[test]
    fn matched_children_outlive_the_lookup_name() {
        let mut root = Element::new("reaction");
        root.push(Element::new("content"));
        let found = {
            let name = String::from("content");
            first_named(&root, &name)
        };
        assert_eq!(found.map(|element| element.name.as_str()), Some("content"));
    }
}
