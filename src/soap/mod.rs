//! SOAP envelope construction and decoding.

pub mod envelope;
pub mod fault;

use anyhow::Result;

use crate::error::EwsError;
use crate::version::ServerVersionInfo;
use crate::xml::{XmlNode, parse_document};

pub use envelope::{ConnectingIdType, EnvelopeHeaders, ImpersonatedUserId, write_envelope};
pub use fault::SoapFault;

/// A decoded SOAP response.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    pub server_version: Option<ServerVersionInfo>,
    pub header: Option<XmlNode>,
    pub body: XmlNode,
}

impl SoapEnvelope {
    /// The operation response element inside `Body`.
    pub fn content(&self) -> Option<&XmlNode> {
        self.body.children.first()
    }
}

/// Decode a SOAP document. A `Fault` body is returned as [`EwsError::SoapFault`].
pub fn parse_envelope(bytes: &[u8]) -> Result<SoapEnvelope> {
    let mut root = parse_document(bytes)?;
    if root.name != "Envelope" {
        return Err(EwsError::Xml(format!("expected SOAP Envelope, found {}", root.name)).into());
    }

    let header_idx = root.children.iter().position(|c| c.name == "Header");
    let header = header_idx.map(|idx| root.children.remove(idx));
    let body_idx = root
        .children
        .iter()
        .position(|c| c.name == "Body")
        .ok_or_else(|| EwsError::Xml("SOAP envelope has no Body".into()))?;
    let body = root.children.swap_remove(body_idx);

    if let Some(fault) = body.child("Fault") {
        return Err(EwsError::from(SoapFault::from_node(fault)).into());
    }

    let server_version = header
        .as_ref()
        .and_then(|h| h.descendant("ServerVersionInfo"))
        .map(ServerVersionInfo::from_node);

    Ok(SoapEnvelope {
        server_version,
        header,
        body,
    })
}

/// Try to pull a fault out of an error response body.
pub fn extract_fault(bytes: &[u8]) -> Option<SoapFault> {
    let root = parse_document(bytes).ok()?;
    let fault = root.path(&["Body", "Fault"])?;
    Some(SoapFault::from_node(fault))
}
