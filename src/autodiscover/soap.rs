//! `GetUserSettings` over the SOAP Autodiscover endpoint (`autodiscover.svc`).

use anyhow::{Result, anyhow};
use hyper::Uri;
use tracing::trace;

use crate::autodiscover::types::{
    AutodiscoverError, AutodiscoverOutcome, GetUserSettingsResponse, UserSettingError,
    UserSettingName,
};
use crate::soap::parse_envelope;
use crate::version::ExchangeVersion;
use crate::xml::{EwsXmlWriter, SOAP_NS_URI, XmlNode};

pub const AUTODISCOVER_NS_URI: &str = "http://schemas.microsoft.com/exchange/2010/Autodiscover";
const WSA_NS_URI: &str = "http://www.w3.org/2005/08/addressing";
const XSI_NS_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const GET_USER_SETTINGS_ACTION: &str =
    "http://schemas.microsoft.com/exchange/2010/Autodiscover/Autodiscover/GetUserSettings";

/// Serialize a `GetUserSettingsRequestMessage` addressed to `url`.
pub fn write_get_user_settings_request(
    url: &Uri,
    email: &str,
    settings: &[UserSettingName],
    version: ExchangeVersion,
) -> Result<Vec<u8>> {
    let mut w = EwsXmlWriter::new();
    w.write_declaration()?;
    w.start_element("soap", "Envelope")?;
    w.namespace("soap", SOAP_NS_URI)?;
    w.namespace("a", AUTODISCOVER_NS_URI)?;
    w.namespace("wsa", WSA_NS_URI)?;
    w.namespace("xsi", XSI_NS_URI)?;

    w.start_element("soap", "Header")?;
    w.write_element_value("a", "RequestedServerVersion", version.as_str())?;
    w.write_element_value("wsa", "Action", GET_USER_SETTINGS_ACTION)?;
    w.write_element_value("wsa", "To", &url.to_string())?;
    w.end_element()?;

    w.start_element("soap", "Body")?;
    w.start_element("a", "GetUserSettingsRequestMessage")?;
    w.start_element("a", "Request")?;
    w.start_element("a", "Users")?;
    w.start_element("a", "User")?;
    w.write_element_value("a", "Mailbox", email)?;
    w.end_element()?;
    w.end_element()?;
    w.start_element("a", "RequestedSettings")?;
    for setting in settings {
        w.write_element_value("a", "Setting", setting.as_str())?;
    }
    w.end_element()?;
    w.end_element()?;
    w.end_element()?;
    w.end_element()?;

    w.end_element()?;
    w.finish()
}

/// Decode a `GetUserSettingsResponseMessage`.
///
/// A SOAP fault is returned as an error; Autodiscover error codes become
/// [`AutodiscoverOutcome::Error`].
pub(crate) fn parse_get_user_settings_response(body: &[u8]) -> Result<AutodiscoverOutcome> {
    let envelope = parse_envelope(body)?;
    let message = envelope
        .content()
        .filter(|node| node.name == "GetUserSettingsResponseMessage")
        .ok_or_else(|| anyhow!("expected GetUserSettingsResponseMessage"))?;
    let response = message
        .child("Response")
        .ok_or_else(|| anyhow!("GetUserSettingsResponseMessage has no Response"))?;

    if let Some(error) = error_of(response) {
        return Ok(AutodiscoverOutcome::Error(error));
    }

    let user = response
        .path(&["UserResponses", "UserResponse"])
        .ok_or_else(|| anyhow!("GetUserSettings response has no UserResponse"))?;
    let code = user.child_text("ErrorCode").unwrap_or("NoError");
    let redirect_target = user
        .child_text("RedirectTarget")
        .filter(|target| !target.is_empty())
        .map(str::to_string);

    match code {
        "NoError" => Ok(AutodiscoverOutcome::Settings(read_user_response(
            user,
            redirect_target,
        ))),
        "RedirectAddress" => redirect_target
            .map(AutodiscoverOutcome::RedirectAddress)
            .ok_or_else(|| anyhow!("RedirectAddress without a RedirectTarget")),
        "RedirectUrl" => redirect_target
            .map(AutodiscoverOutcome::RedirectUrl)
            .ok_or_else(|| anyhow!("RedirectUrl without a RedirectTarget")),
        _ => Ok(AutodiscoverOutcome::Error(AutodiscoverError::new(
            code,
            user.child_text("ErrorMessage").unwrap_or_default(),
        ))),
    }
}

fn error_of(response: &XmlNode) -> Option<AutodiscoverError> {
    match response.child_text("ErrorCode") {
        None | Some("NoError") => None,
        Some(code) => Some(AutodiscoverError::new(
            code,
            response.child_text("ErrorMessage").unwrap_or_default(),
        )),
    }
}

fn read_user_response(user: &XmlNode, redirect_target: Option<String>) -> GetUserSettingsResponse {
    let mut out = GetUserSettingsResponse {
        redirect_target,
        ..GetUserSettingsResponse::default()
    };

    if let Some(settings) = user.child("UserSettings") {
        for setting in settings.children_named("UserSetting") {
            let Some(raw_name) = setting.child_text("Name") else {
                continue;
            };
            let Ok(name) = raw_name.parse::<UserSettingName>() else {
                trace!(setting = raw_name, "ignoring unsupported user setting");
                continue;
            };
            if let Some(value) = setting_value(setting) {
                out.settings.insert(name, value);
            }
        }
    }

    if let Some(errors) = user.child("UserSettingErrors") {
        for error in errors.children_named("UserSettingError") {
            out.errors.push(UserSettingError {
                setting_name: error.child_text("SettingName").unwrap_or_default().to_string(),
                error_code: error.child_text("ErrorCode").unwrap_or_default().to_string(),
                message: error.child_text("ErrorMessage").unwrap_or_default().to_string(),
            });
        }
    }
    out
}

// StringSetting carries `Value`; WebClientUrlCollectionSetting carries a list of urls.
fn setting_value(setting: &XmlNode) -> Option<String> {
    if let Some(value) = setting.child_text("Value") {
        return Some(value.to_string());
    }
    let urls: Vec<&str> = setting
        .child("WebClientUrls")?
        .children_named("WebClientUrl")
        .filter_map(|url| url.child_text("Url"))
        .collect();
    (!urls.is_empty()).then(|| urls.join(";"))
}
