use anyhow::{Result, anyhow};
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use std::io::{BufRead, Cursor};

use crate::error::EwsError;
use crate::xml::local_name;

/// An element of a parsed XML document.
///
/// Names and attribute keys are stored without their namespace prefix; EWS
/// never reuses a local name across namespaces inside the same parent, so the
/// prefix is kept only for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub prefix: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child called `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// Depth-first search below this node.
    pub fn descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Follow a path of child names.
    pub fn path(&self, names: &[&str]) -> Option<&XmlNode> {
        let mut current = self;
        for name in names {
            current = current.child(name)?;
        }
        Some(current)
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

fn node_from_start(event: &BytesStart<'_>) -> Result<XmlNode> {
    let qname = event.name();
    let raw = qname.as_ref();
    let name = String::from_utf8_lossy(local_name(raw)).into_owned();
    let prefix = qname
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());

    let mut attributes = Vec::new();
    for attr in event.attributes().with_checks(false) {
        let attr = attr.map_err(|e| EwsError::Xml(format!("invalid attribute: {e}")))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| EwsError::Xml(format!("invalid attribute value: {e}")))?
            .into_owned();
        attributes.push((String::from_utf8_lossy(local_name(key)).into_owned(), value));
    }

    Ok(XmlNode {
        prefix,
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn parse_with<R: BufRead>(reader: R) -> Result<XmlNode> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut stack: Vec<XmlNode> = Vec::with_capacity(16);
    let mut root: Option<XmlNode> = None;

    let mut attach = |node: XmlNode, stack: &mut Vec<XmlNode>| match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                root = Some(node);
            }
        }
    };

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(node_from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let node = node_from_start(&e)?;
                attach(node, &mut stack);
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&decode_text(e.as_ref())?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(current) = stack.last_mut() {
                    if let Some(ch) = e.resolve_char_ref().ok().flatten() {
                        current.text.push(ch);
                    } else {
                        let entity = String::from_utf8_lossy(&e).into_owned();
                        match resolve_predefined_entity(&entity) {
                            Some(resolved) => current.text.push_str(resolved),
                            None => {
                                return Err(EwsError::Xml(format!("unknown entity &{entity};")).into());
                            }
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                let Some(node) = stack.pop() else {
                    return Err(EwsError::Xml("unbalanced end tag".into()).into());
                };
                attach(node, &mut stack);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EwsError::Xml(format!("XML error: {e}")).into()),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(EwsError::Xml("unexpected end of document".into()).into());
    }
    root.ok_or_else(|| anyhow!(EwsError::Xml("document has no root element".into())))
}

/// Parse a complete document and return its root element.
pub fn parse_document(body: &[u8]) -> Result<XmlNode> {
    parse_with(Cursor::new(body))
}

pub fn decode_text(raw: &[u8]) -> Result<String> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(unescape(s)
            .map_err(|err| anyhow!("XML decode error: {err}"))?
            .into_owned()),
        Err(_) => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}
