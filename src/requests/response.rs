use anyhow::{Result, anyhow};
use thiserror::Error;
use tracing::warn;

use crate::error::EwsError;
use crate::xml::XmlNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseClass {
    #[default]
    Success,
    Warning,
    Error,
}

impl ResponseClass {
    fn parse(raw: &str) -> Self {
        match raw {
            "Error" => ResponseClass::Error,
            "Warning" => ResponseClass::Warning,
            _ => ResponseClass::Success,
        }
    }
}

/// An `Error` class response message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct ServiceResponseError {
    pub code: String,
    pub message: String,
    pub message_xml: Vec<(String, String)>,
}

/// Status block shared by every EWS response message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceResult {
    pub class: ResponseClass,
    pub code: String,
    pub message_text: Option<String>,
    pub message_xml: Vec<(String, String)>,
}

impl ServiceResult {
    pub fn from_node(message: &XmlNode) -> Self {
        let message_xml = message
            .child("MessageXml")
            .map(|xml| {
                xml.children
                    .iter()
                    .map(|entry| {
                        let key = entry.attribute("Name").unwrap_or(&entry.name);
                        (key.to_string(), entry.trimmed_text().to_string())
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            class: message
                .attribute("ResponseClass")
                .map(ResponseClass::parse)
                .unwrap_or_default(),
            code: message
                .child_text("ResponseCode")
                .unwrap_or("NoError")
                .to_string(),
            message_text: message.child_text("MessageText").map(str::to_string),
            message_xml,
        }
    }

    pub fn is_success(&self) -> bool {
        self.class != ResponseClass::Error
    }

    /// Turn an `Error` class into [`ServiceResponseError`]; warnings are logged.
    pub fn into_result(self) -> Result<Self, ServiceResponseError> {
        match self.class {
            ResponseClass::Error => Err(ServiceResponseError {
                code: self.code,
                message: self.message_text.unwrap_or_default(),
                message_xml: self.message_xml,
            }),
            ResponseClass::Warning => {
                warn!(
                    code = %self.code,
                    message = self.message_text.as_deref().unwrap_or(""),
                    "EWS response warning"
                );
                Ok(self)
            }
            ResponseClass::Success => Ok(self),
        }
    }
}

/// The `*ResponseMessage` elements of an operation response.
pub fn response_messages(content: &XmlNode) -> Result<&[XmlNode]> {
    content
        .child("ResponseMessages")
        .map(|messages| messages.children.as_slice())
        .ok_or_else(|| anyhow!("{} has no ResponseMessages", content.name))
}

/// Walk the response messages, failing on the first `Error` class.
pub fn checked_messages(content: &XmlNode) -> Result<Vec<&XmlNode>> {
    let mut out = Vec::new();
    for message in response_messages(content)? {
        ServiceResult::from_node(message)
            .into_result()
            .map_err(EwsError::from)?;
        out.push(message);
    }
    Ok(out)
}
