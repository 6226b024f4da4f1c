use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::version::ExchangeVersion;
use crate::xml::{EwsXmlWriter, MESSAGES_NS_URI, SOAP_NS_URI, TYPES_NS_URI};

/// How the impersonated account is identified in `ExchangeImpersonation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectingIdType {
    PrincipalName,
    SmtpAddress,
    Sid,
}

impl ConnectingIdType {
    fn element_name(self) -> &'static str {
        match self {
            ConnectingIdType::PrincipalName => "PrincipalName",
            ConnectingIdType::SmtpAddress => "PrimarySmtpAddress",
            ConnectingIdType::Sid => "SID",
        }
    }
}

/// The account a service account acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonatedUserId {
    pub id_type: ConnectingIdType,
    pub id: String,
}

impl ImpersonatedUserId {
    pub fn smtp(address: impl Into<String>) -> Self {
        Self {
            id_type: ConnectingIdType::SmtpAddress,
            id: address.into(),
        }
    }
}

/// Header values for an outgoing EWS envelope.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeHeaders<'a> {
    pub version: ExchangeVersion,
    pub impersonation: Option<&'a ImpersonatedUserId>,
    pub time_zone_id: Option<&'a str>,
}

/// Serialize a complete SOAP document whose body is produced by `body`.
pub fn write_envelope<F>(headers: &EnvelopeHeaders<'_>, body: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut EwsXmlWriter) -> Result<()>,
{
    let mut w = EwsXmlWriter::new();
    w.write_declaration()?;
    w.start_element("soap", "Envelope")?;
    w.namespace("soap", SOAP_NS_URI)?;
    w.namespace("t", TYPES_NS_URI)?;
    w.namespace("m", MESSAGES_NS_URI)?;

    w.start_element("soap", "Header")?;
    w.start_element("t", "RequestServerVersion")?;
    w.attribute("Version", headers.version.as_str())?;
    w.end_element()?;

    if let Some(user) = headers.impersonation {
        w.start_element("t", "ExchangeImpersonation")?;
        w.start_element("t", "ConnectingSID")?;
        w.write_element_value("t", user.id_type.element_name(), &user.id)?;
        w.end_element()?;
        w.end_element()?;
    }

    if let Some(tz) = headers.time_zone_id {
        w.start_element("t", "TimeZoneContext")?;
        w.start_element("t", "TimeZoneDefinition")?;
        w.attribute("Id", tz)?;
        w.end_element()?;
        w.end_element()?;
    }
    w.end_element()?;

    w.start_element("soap", "Body")?;
    body(&mut w)?;
    w.end_element()?;

    w.end_element()?;
    w.finish()
}
