//! Structured property values.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::xml::{EwsXmlWriter, XmlNode};

/// Identifier of a store object: `Id` plus the optional `ChangeKey` version stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceId {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_key: Option<String>,
}

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_key: None,
        }
    }

    pub fn with_change_key(id: impl Into<String>, change_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_key: Some(change_key.into()),
        }
    }

    pub fn from_node(node: &XmlNode) -> Option<Self> {
        let id = node.attribute("Id")?;
        Some(Self {
            id: id.to_string(),
            change_key: node.attribute("ChangeKey").map(str::to_string),
        })
    }

    /// `<t:{element} Id=".." ChangeKey=".."/>`
    pub fn write(&self, w: &mut EwsXmlWriter, element: &str) -> Result<()> {
        w.start_element("t", element)?;
        w.attribute("Id", &self.id)?;
        if let Some(change_key) = &self.change_key {
            w.attribute("ChangeKey", change_key)?;
        }
        w.end_element()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    #[default]
    #[serde(rename = "HTML")]
    Html,
    Text,
}

impl BodyType {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyType::Html => "HTML",
            BodyType::Text => "Text",
        }
    }

    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("text") {
            BodyType::Text
        } else {
            BodyType::Html
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageBody {
    pub body_type: BodyType,
    pub value: String,
    #[serde(default)]
    pub is_truncated: bool,
}

impl MessageBody {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            body_type: BodyType::Text,
            value: value.into(),
            is_truncated: false,
        }
    }

    pub fn html(value: impl Into<String>) -> Self {
        Self {
            body_type: BodyType::Html,
            value: value.into(),
            is_truncated: false,
        }
    }

    pub fn from_node(node: &XmlNode) -> Self {
        Self {
            body_type: node
                .attribute("BodyType")
                .map(BodyType::parse)
                .unwrap_or_default(),
            value: node.text.clone(),
            is_truncated: node.attribute("IsTruncated") == Some("true"),
        }
    }

    pub fn write(&self, w: &mut EwsXmlWriter, element: &str) -> Result<()> {
        w.start_element("t", element)?;
        w.attribute("BodyType", self.body_type.as_str())?;
        if !self.value.is_empty() {
            w.text(&self.value)?;
        }
        w.end_element()
    }
}

/// A mailbox as EWS describes it inside `<t:Mailbox>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailbox_type: Option<String>,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            email_address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email_address: Some(address.into()),
            ..Default::default()
        }
    }

    /// Read the fields of a `<t:Mailbox>` element.
    pub fn from_mailbox(node: &XmlNode) -> Self {
        let text = |name: &str| node.child_text(name).map(str::to_string);
        Self {
            name: text("Name"),
            email_address: text("EmailAddress"),
            routing_type: text("RoutingType"),
            mailbox_type: text("MailboxType"),
        }
    }

    /// Write `<t:Mailbox>...</t:Mailbox>` in schema order.
    pub fn write_mailbox(&self, w: &mut EwsXmlWriter) -> Result<()> {
        w.start_element("t", "Mailbox")?;
        if let Some(name) = &self.name {
            w.write_element_value("t", "Name", name)?;
        }
        if let Some(address) = &self.email_address {
            w.write_element_value("t", "EmailAddress", address)?;
        }
        if let Some(routing) = &self.routing_type {
            w.write_element_value("t", "RoutingType", routing)?;
        }
        if let Some(kind) = &self.mailbox_type {
            w.write_element_value("t", "MailboxType", kind)?;
        }
        w.end_element()
    }
}

/// A meeting participant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attendee {
    pub mailbox: EmailAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
}

impl Attendee {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            mailbox: EmailAddress::new(address),
            response_type: None,
        }
    }

    pub fn from_node(node: &XmlNode) -> Self {
        Self {
            mailbox: node
                .child("Mailbox")
                .map(EmailAddress::from_mailbox)
                .unwrap_or_default(),
            response_type: node.child_text("ResponseType").map(str::to_string),
        }
    }

    pub fn write(&self, w: &mut EwsXmlWriter) -> Result<()> {
        w.start_element("t", "Attendee")?;
        self.mailbox.write_mailbox(w)?;
        if let Some(response) = &self.response_type {
            w.write_element_value("t", "ResponseType", response)?;
        }
        w.end_element()
    }
}
