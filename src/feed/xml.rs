//! A minimal typed XML tree.
//!
//! Feed documents arrive from the open internet, so extraction must never
//! depend on probing dynamic node shapes. This module materializes the
//! document once into explicit element/text nodes; `parser` then reads it
//! with plain, total functions.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Nesting ceiling for hostile documents. Real feeds stay in single digits.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Error)]
pub enum XmlError {
    /// The underlying XML stream is malformed.
    #[error("malformed XML: {0}")]
    Malformed(#[from] quick_xml::Error),
    /// The document contains no root element.
    #[error("document has no root element")]
    NoRoot,
    /// Element nesting exceeds the depth ceiling.
    #[error("element nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// One element: name as written in the document (prefix included, so
/// `content:encoded` stays `content:encoded`), attributes in document order,
/// and child nodes.
#[derive(Debug, Clone)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    fn new(name: String) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// First attribute with the given name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children_named(name).next()
    }

    /// All direct child elements with the given name, in document order.
    pub fn children_named<'s, 'n>(
        &'s self,
        name: &'n str,
    ) -> impl Iterator<Item = &'s XmlElement> + use<'s, 'n> {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Depth-first search for an element with the given name, starting at
    /// (and including) this element.
    pub fn find_named(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(el) => el.find_named(name),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text and CDATA content of direct children, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }
}

/// Parses a document into its root element.
pub fn parse_document(text: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep);
                }
                stack.push(element_from_start(&start));
            }
            Event::Empty(start) => {
                let element = element_from_start(&start);
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                // quick-xml verifies start/end name pairing before we get here
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    // Unknown entities (feeds love &nbsp;) fall back to the
                    // raw bytes instead of failing the document.
                    let unescaped = match text.unescape() {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    parent.children.push(XmlNode::Text(unescaped));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(&cdata).into_owned();
                    parent.children.push(XmlNode::Text(raw));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes
            _ => {}
        }
    }

    root.ok_or(XmlError::NoRoot)
}

fn element_from_start(start: &BytesStart<'_>) -> XmlElement {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::new(name);
    // Attributes that fail to decode are skipped rather than failing the
    // document; feeds in the wild contain plenty of sloppy markup.
    for attr in start.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if let Ok(value) = attr.unescape_value() {
            element.attrs.push((key, value.into_owned()));
        }
    }
    element
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    }
}
