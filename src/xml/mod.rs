//! XML plumbing shared by the SOAP, property and Autodiscover layers.

pub mod reader;
pub mod writer;

pub use reader::{XmlNode, decode_text, parse_document};
pub use writer::EwsXmlWriter;

/// SOAP 1.1 envelope namespace.
pub const SOAP_NS_URI: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// EWS types namespace, bound to the `t` prefix.
pub const TYPES_NS_URI: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
/// EWS messages namespace, bound to the `m` prefix.
pub const MESSAGES_NS_URI: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Strip the namespace prefix of a qualified name.
pub fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    }
}
