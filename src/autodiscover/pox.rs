//! Legacy "plain old XML" Autodiscover (`autodiscover.xml`).
//!
//! Responses are decoded with a streaming parser that keeps a stack of the
//! elements it cares about and matches on path suffixes, so unknown blocks
//! (`PublicFolderInformation`, `AlternativeMailbox`, ...) cost nothing.

use anyhow::{Result, anyhow};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;

use crate::autodiscover::types::{
    AutodiscoverError, AutodiscoverOutcome, GetUserSettingsResponse, UserSettingName,
};
use crate::xml::{EwsXmlWriter, decode_text, local_name};

pub const POX_REQUEST_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/requestschema/2006";
pub const POX_RESPONSE_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a";

pub fn write_pox_request(email: &str) -> Result<Vec<u8>> {
    let mut w = EwsXmlWriter::new();
    w.write_declaration()?;
    w.start_element("", "Autodiscover")?;
    w.namespace("", POX_REQUEST_SCHEMA)?;
    w.start_element("", "Request")?;
    w.write_element_value("", "EMailAddress", email)?;
    w.write_element_value("", "AcceptableResponseSchema", POX_RESPONSE_SCHEMA)?;
    w.end_element()?;
    w.end_element()?;
    w.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoxElement {
    Response,
    User,
    DisplayName,
    LegacyDn,
    DeploymentId,
    Account,
    Action,
    RedirectAddr,
    RedirectUrl,
    Protocol,
    Type,
    Server,
    EwsUrl,
    AsUrl,
    EcpUrl,
    OabUrl,
    Internal,
    External,
    OwaUrl,
    Error,
    ErrorCode,
    Message,
    Other,
}

fn pox_element_from_bytes(raw: &[u8]) -> PoxElement {
    match local_name(raw) {
        b"Response" => PoxElement::Response,
        b"User" => PoxElement::User,
        b"DisplayName" => PoxElement::DisplayName,
        b"LegacyDN" => PoxElement::LegacyDn,
        b"DeploymentId" => PoxElement::DeploymentId,
        b"Account" => PoxElement::Account,
        b"Action" => PoxElement::Action,
        b"RedirectAddr" => PoxElement::RedirectAddr,
        b"RedirectUrl" => PoxElement::RedirectUrl,
        b"Protocol" => PoxElement::Protocol,
        b"Type" => PoxElement::Type,
        b"Server" => PoxElement::Server,
        b"EwsUrl" => PoxElement::EwsUrl,
        b"ASUrl" => PoxElement::AsUrl,
        b"EcpUrl" => PoxElement::EcpUrl,
        b"OABUrl" => PoxElement::OabUrl,
        b"Internal" => PoxElement::Internal,
        b"External" => PoxElement::External,
        b"OWAUrl" => PoxElement::OwaUrl,
        b"Error" => PoxElement::Error,
        b"ErrorCode" => PoxElement::ErrorCode,
        b"Message" => PoxElement::Message,
        _ => PoxElement::Other,
    }
}

/// One `<Protocol>` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoxProtocol {
    pub protocol_type: String,
    pub server: Option<String>,
    pub ews_url: Option<String>,
    pub as_url: Option<String>,
    pub ecp_url: Option<String>,
    pub oab_url: Option<String>,
    pub internal_owa_urls: Vec<String>,
    pub external_owa_urls: Vec<String>,
}

/// Everything the POX parser extracts from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoxResponse {
    pub display_name: Option<String>,
    pub legacy_dn: Option<String>,
    pub deployment_id: Option<String>,
    pub action: Option<String>,
    pub redirect_addr: Option<String>,
    pub redirect_url: Option<String>,
    pub protocols: Vec<PoxProtocol>,
    pub error: Option<AutodiscoverError>,
}

impl PoxResponse {
    pub(crate) fn into_outcome(self) -> Result<AutodiscoverOutcome> {
        if let Some(error) = self.error {
            return Ok(AutodiscoverOutcome::Error(error));
        }
        match self.action.as_deref() {
            Some("redirectAddr") => self
                .redirect_addr
                .map(AutodiscoverOutcome::RedirectAddress)
                .ok_or_else(|| anyhow!("redirectAddr action without RedirectAddr")),
            Some("redirectUrl") => self
                .redirect_url
                .map(AutodiscoverOutcome::RedirectUrl)
                .ok_or_else(|| anyhow!("redirectUrl action without RedirectUrl")),
            Some("settings") | None => Ok(AutodiscoverOutcome::Settings(self.into_settings())),
            Some(other) => Err(anyhow!("unknown Autodiscover action {other}")),
        }
    }

    fn into_settings(self) -> GetUserSettingsResponse {
        let mut out = GetUserSettingsResponse::default();
        let mut put = |name: UserSettingName, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                out.settings.entry(name).or_insert(value);
            }
        };
        put(UserSettingName::UserDisplayName, self.display_name);
        put(UserSettingName::UserDN, self.legacy_dn);
        put(UserSettingName::UserDeploymentId, self.deployment_id);

        for protocol in self.protocols {
            // Exchange 2007 RTM hosts availability on the EWS endpoint and omits EwsUrl.
            let ews_url = protocol.ews_url.or(protocol.as_url);
            let internal_owa = (!protocol.internal_owa_urls.is_empty())
                .then(|| protocol.internal_owa_urls.join(";"));
            let external_owa = (!protocol.external_owa_urls.is_empty())
                .then(|| protocol.external_owa_urls.join(";"));
            match protocol.protocol_type.as_str() {
                "EXCH" => {
                    put(UserSettingName::InternalEwsUrl, ews_url);
                    put(UserSettingName::InternalMailboxServer, protocol.server);
                    put(UserSettingName::InternalEcpUrl, protocol.ecp_url);
                    put(UserSettingName::InternalOabUrl, protocol.oab_url);
                }
                "EXPR" => {
                    put(UserSettingName::ExternalEwsUrl, ews_url);
                    put(UserSettingName::ExternalMailboxServer, protocol.server);
                    put(UserSettingName::ExternalEcpUrl, protocol.ecp_url);
                    put(UserSettingName::ExternalOabUrl, protocol.oab_url);
                }
                "WEB" => {
                    put(UserSettingName::InternalWebClientUrls, internal_owa);
                    put(UserSettingName::ExternalWebClientUrls, external_owa);
                }
                _ => {}
            }
        }
        out
    }
}

struct PoxParser {
    stack: Vec<PoxElement>,
    text: String,
    protocol: Option<PoxProtocol>,
    error_code: Option<String>,
    error_message: Option<String>,
    out: PoxResponse,
}

fn path_ends_with(stack: &[PoxElement], needle: &[PoxElement]) -> bool {
    stack.len() >= needle.len() && stack[stack.len() - needle.len()..] == needle[..]
}

impl PoxParser {
    fn new() -> Self {
        Self {
            stack: Vec::with_capacity(16),
            text: String::new(),
            protocol: None,
            error_code: None,
            error_message: None,
            out: PoxResponse::default(),
        }
    }

    fn on_start(&mut self, raw: &[u8]) {
        let element = pox_element_from_bytes(raw);
        self.stack.push(element);
        self.text.clear();
        if element == PoxElement::Protocol && self.path_ends_with(&[PoxElement::Account, PoxElement::Protocol]) {
            self.protocol = Some(PoxProtocol::default());
        }
    }

    fn on_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn on_end(&mut self) {
        let value = std::mem::take(&mut self.text);
        let value = value.trim();
        self.assign(value);

        match self.stack.pop() {
            Some(PoxElement::Protocol) => {
                if let Some(protocol) = self.protocol.take() {
                    self.out.protocols.push(protocol);
                }
            }
            Some(PoxElement::Error) => {
                let code = self.error_code.take().unwrap_or_else(|| "Error".to_string());
                let message = self.error_message.take().unwrap_or_default();
                self.out.error = Some(AutodiscoverError::new(code, message));
            }
            _ => {}
        }
    }

    fn assign(&mut self, value: &str) {
        use PoxElement as E;

        if value.is_empty() {
            return;
        }
        let owned = Some(value.to_string());

        if self.path_ends_with(&[E::User, E::DisplayName]) {
            self.out.display_name = owned;
        } else if self.path_ends_with(&[E::User, E::LegacyDn]) {
            self.out.legacy_dn = owned;
        } else if self.path_ends_with(&[E::User, E::DeploymentId]) {
            self.out.deployment_id = owned;
        } else if self.path_ends_with(&[E::Account, E::Action]) {
            self.out.action = owned;
        } else if self.path_ends_with(&[E::Account, E::RedirectAddr]) {
            self.out.redirect_addr = owned;
        } else if self.path_ends_with(&[E::Account, E::RedirectUrl]) {
            self.out.redirect_url = owned;
        } else if self.path_ends_with(&[E::Error, E::ErrorCode]) {
            self.error_code = owned;
        } else if self.path_ends_with(&[E::Error, E::Message]) {
            self.error_message = owned;
        } else if let Some(protocol) = self.protocol.as_mut() {
            let stack = &self.stack;
            if path_ends_with(stack, &[E::Protocol, E::Type]) {
                protocol.protocol_type = value.to_string();
            } else if path_ends_with(stack, &[E::Protocol, E::Server]) {
                protocol.server = owned;
            } else if path_ends_with(stack, &[E::Protocol, E::EwsUrl]) {
                protocol.ews_url = owned;
            } else if path_ends_with(stack, &[E::Protocol, E::AsUrl]) {
                protocol.as_url = owned;
            } else if path_ends_with(stack, &[E::Protocol, E::EcpUrl]) {
                protocol.ecp_url = owned;
            } else if path_ends_with(stack, &[E::Protocol, E::OabUrl]) {
                protocol.oab_url = owned;
            } else if path_ends_with(stack, &[E::Internal, E::OwaUrl]) {
                protocol.internal_owa_urls.push(value.to_string());
            } else if path_ends_with(stack, &[E::External, E::OwaUrl]) {
                protocol.external_owa_urls.push(value.to_string());
            }
        }
    }

    fn path_ends_with(&self, needle: &[PoxElement]) -> bool {
        path_ends_with(&self.stack, needle)
    }
}

/// Parse a POX Autodiscover response body.
pub fn parse_pox_response(body: &[u8]) -> Result<PoxResponse> {
    let mut xml = Reader::from_reader(body);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(4 * 1024);
    let mut parser = PoxParser::new();
    let mut saw_root = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if !saw_root && local_name(e.name().as_ref()) != b"Autodiscover" {
                    return Err(anyhow!("not an Autodiscover document"));
                }
                saw_root = true;
                parser.on_start(e.name().as_ref());
            }
            Ok(Event::Empty(e)) => {
                parser.on_start(e.name().as_ref());
                parser.on_end();
            }
            Ok(Event::Text(e)) => {
                let text = decode_text(e.as_ref())?;
                parser.on_text(&text);
            }
            Ok(Event::CData(e)) => {
                parser.on_text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(ch) = e.resolve_char_ref().ok().flatten() {
                    parser.on_text(ch.encode_utf8(&mut [0; 4]));
                } else {
                    let entity = String::from_utf8_lossy(&e).into_owned();
                    let resolved = resolve_predefined_entity(&entity)
                        .ok_or_else(|| anyhow!("unknown entity &{entity};"))?;
                    parser.on_text(resolved);
                }
            }
            Ok(Event::End(_)) => parser.on_end(),
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(anyhow!("empty Autodiscover response"));
    }
    Ok(parser.out)
}
