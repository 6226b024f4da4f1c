use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as Json;

use crate::error::EwsError;
use crate::properties::complex::{Attendee, EmailAddress, MessageBody, ServiceId};
use crate::properties::definition::{PropertyDefinition, PropertyKind};
use crate::xml::{EwsXmlWriter, XmlNode};

/// A typed value held by a [`PropertyBag`](crate::properties::PropertyBag).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    DateTime(DateTime<Utc>),
    Enum(String),
    ItemId(ServiceId),
    FolderId(ServiceId),
    Body(MessageBody),
    EmailAddress(EmailAddress),
    EmailAddresses(Vec<EmailAddress>),
    Attendees(Vec<Attendee>),
    StringList(Vec<String>),
}

pub(crate) static EMPTY_EMAIL_ADDRESSES: PropertyValue = PropertyValue::EmailAddresses(Vec::new());
pub(crate) static EMPTY_ATTENDEES: PropertyValue = PropertyValue::Attendees(Vec::new());
pub(crate) static EMPTY_STRING_LIST: PropertyValue = PropertyValue::StringList(Vec::new());

fn invalid(def: &PropertyDefinition, reason: impl Into<String>) -> anyhow::Error {
    EwsError::InvalidPropertyValue {
        name: def.xml_name,
        reason: reason.into(),
    }
    .into()
}

/// Parse an `xs:dateTime`. Exchange omits the offset on some values; those are UTC.
pub fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_date_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl PropertyValue {
    pub fn matches_kind(&self, kind: PropertyKind) -> bool {
        matches!(
            (self, kind),
            (PropertyValue::String(_), PropertyKind::String)
                | (PropertyValue::Boolean(_), PropertyKind::Boolean)
                | (PropertyValue::Integer(_), PropertyKind::Integer)
                | (PropertyValue::DateTime(_), PropertyKind::DateTime)
                | (PropertyValue::Enum(_), PropertyKind::Enum(_))
                | (PropertyValue::ItemId(_), PropertyKind::ItemId)
                | (PropertyValue::FolderId(_), PropertyKind::FolderId)
                | (PropertyValue::Body(_), PropertyKind::Body)
                | (PropertyValue::EmailAddress(_), PropertyKind::EmailAddress)
                | (PropertyValue::EmailAddresses(_), PropertyKind::EmailAddressCollection)
                | (PropertyValue::Attendees(_), PropertyKind::Attendees)
                | (PropertyValue::StringList(_), PropertyKind::StringList)
        )
    }

    /// Check kind and, for enumerations, the token.
    pub fn validate(&self, def: &PropertyDefinition) -> Result<()> {
        if !self.matches_kind(def.kind) {
            return Err(invalid(def, format!("expected {:?}", def.kind)));
        }
        if let (PropertyValue::Enum(token), PropertyKind::Enum(allowed)) = (self, def.kind)
            && !allowed.contains(&token.as_str())
        {
            return Err(invalid(def, format!("{token:?} is not one of {allowed:?}")));
        }
        Ok(())
    }

    /// Empty value for collection kinds flagged `AUTO_INSTANTIATE_ON_READ`.
    pub(crate) fn empty_collection(kind: PropertyKind) -> Option<&'static PropertyValue> {
        match kind {
            PropertyKind::EmailAddressCollection => Some(&EMPTY_EMAIL_ADDRESSES),
            PropertyKind::Attendees => Some(&EMPTY_ATTENDEES),
            PropertyKind::StringList => Some(&EMPTY_STRING_LIST),
            _ => None,
        }
    }

    /// Decode the property element `node` (e.g. `<t:Subject>`).
    pub fn read_from_xml(def: &PropertyDefinition, node: &XmlNode) -> Result<Self> {
        let text = node.trimmed_text();
        let value = match def.kind {
            PropertyKind::String => PropertyValue::String(node.text.clone()),
            PropertyKind::Boolean => match text {
                "true" | "1" => PropertyValue::Boolean(true),
                "false" | "0" => PropertyValue::Boolean(false),
                other => return Err(invalid(def, format!("{other:?} is not a boolean"))),
            },
            PropertyKind::Integer => PropertyValue::Integer(
                text.parse()
                    .map_err(|_| invalid(def, format!("{text:?} is not an integer")))?,
            ),
            PropertyKind::DateTime => PropertyValue::DateTime(
                parse_date_time(text)
                    .ok_or_else(|| invalid(def, format!("{text:?} is not a date-time")))?,
            ),
            // Servers may add enum members faster than this table; keep what we get.
            PropertyKind::Enum(_) => PropertyValue::Enum(text.to_string()),
            PropertyKind::ItemId => PropertyValue::ItemId(
                ServiceId::from_node(node).ok_or_else(|| invalid(def, "missing Id attribute"))?,
            ),
            PropertyKind::FolderId => PropertyValue::FolderId(
                ServiceId::from_node(node).ok_or_else(|| invalid(def, "missing Id attribute"))?,
            ),
            PropertyKind::Body => PropertyValue::Body(MessageBody::from_node(node)),
            PropertyKind::EmailAddress => PropertyValue::EmailAddress(
                node.child("Mailbox")
                    .map(EmailAddress::from_mailbox)
                    .unwrap_or_default(),
            ),
            PropertyKind::EmailAddressCollection => PropertyValue::EmailAddresses(
                node.children_named("Mailbox")
                    .map(EmailAddress::from_mailbox)
                    .collect(),
            ),
            PropertyKind::Attendees => PropertyValue::Attendees(
                node.children_named("Attendee")
                    .map(Attendee::from_node)
                    .collect(),
            ),
            PropertyKind::StringList => PropertyValue::StringList(
                node.children_named("String")
                    .map(|s| s.text.clone())
                    .collect(),
            ),
        };
        Ok(value)
    }

    /// Encode as `<t:{xml_name}>...</t:{xml_name}>`.
    pub fn write_to_xml(&self, def: &PropertyDefinition, w: &mut EwsXmlWriter) -> Result<()> {
        match self {
            PropertyValue::String(s) | PropertyValue::Enum(s) => {
                w.write_element_value("t", def.xml_name, s)
            }
            PropertyValue::Boolean(b) => {
                w.write_element_value("t", def.xml_name, if *b { "true" } else { "false" })
            }
            PropertyValue::Integer(i) => w.write_element_value("t", def.xml_name, &i.to_string()),
            PropertyValue::DateTime(dt) => {
                w.write_element_value("t", def.xml_name, &format_date_time(dt))
            }
            PropertyValue::ItemId(id) | PropertyValue::FolderId(id) => id.write(w, def.xml_name),
            PropertyValue::Body(body) => body.write(w, def.xml_name),
            PropertyValue::EmailAddress(address) => {
                w.start_element("t", def.xml_name)?;
                address.write_mailbox(w)?;
                w.end_element()
            }
            PropertyValue::EmailAddresses(addresses) => {
                w.start_element("t", def.xml_name)?;
                for address in addresses {
                    address.write_mailbox(w)?;
                }
                w.end_element()
            }
            PropertyValue::Attendees(attendees) => {
                w.start_element("t", def.xml_name)?;
                for attendee in attendees {
                    attendee.write(w)?;
                }
                w.end_element()
            }
            PropertyValue::StringList(values) => {
                w.start_element("t", def.xml_name)?;
                for value in values {
                    w.write_element_value("t", "String", value)?;
                }
                w.end_element()
            }
        }
    }

    pub fn to_json(&self) -> Result<Json> {
        let json = match self {
            PropertyValue::String(s) | PropertyValue::Enum(s) => Json::String(s.clone()),
            PropertyValue::Boolean(b) => Json::Bool(*b),
            PropertyValue::Integer(i) => Json::from(*i),
            PropertyValue::DateTime(dt) => Json::String(format_date_time(dt)),
            PropertyValue::ItemId(id) | PropertyValue::FolderId(id) => serde_json::to_value(id)?,
            PropertyValue::Body(body) => serde_json::to_value(body)?,
            PropertyValue::EmailAddress(address) => serde_json::to_value(address)?,
            PropertyValue::EmailAddresses(addresses) => serde_json::to_value(addresses)?,
            PropertyValue::Attendees(attendees) => serde_json::to_value(attendees)?,
            PropertyValue::StringList(values) => serde_json::to_value(values)?,
        };
        Ok(json)
    }

    pub fn from_json(def: &PropertyDefinition, json: &Json) -> Result<Self> {
        let as_str = || {
            json.as_str()
                .ok_or_else(|| invalid(def, format!("expected a JSON string, got {json}")))
        };
        let value = match def.kind {
            PropertyKind::String => PropertyValue::String(as_str()?.to_string()),
            PropertyKind::Enum(_) => PropertyValue::Enum(as_str()?.to_string()),
            PropertyKind::Boolean => PropertyValue::Boolean(
                json.as_bool()
                    .ok_or_else(|| invalid(def, format!("expected a JSON boolean, got {json}")))?,
            ),
            PropertyKind::Integer => PropertyValue::Integer(
                json.as_i64()
                    .ok_or_else(|| invalid(def, format!("expected a JSON integer, got {json}")))?,
            ),
            PropertyKind::DateTime => {
                let raw = as_str()?;
                PropertyValue::DateTime(
                    parse_date_time(raw)
                        .ok_or_else(|| invalid(def, format!("{raw:?} is not a date-time")))?,
                )
            }
            PropertyKind::ItemId => PropertyValue::ItemId(from_json_value(def, json)?),
            PropertyKind::FolderId => PropertyValue::FolderId(from_json_value(def, json)?),
            PropertyKind::Body => PropertyValue::Body(from_json_value(def, json)?),
            PropertyKind::EmailAddress => PropertyValue::EmailAddress(from_json_value(def, json)?),
            PropertyKind::EmailAddressCollection => {
                PropertyValue::EmailAddresses(from_json_value(def, json)?)
            }
            PropertyKind::Attendees => PropertyValue::Attendees(from_json_value(def, json)?),
            PropertyKind::StringList => PropertyValue::StringList(from_json_value(def, json)?),
        };
        Ok(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) | PropertyValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_service_id(&self) -> Option<&ServiceId> {
        match self {
            PropertyValue::ItemId(id) | PropertyValue::FolderId(id) => Some(id),
            _ => None,
        }
    }
}

fn from_json_value<T: serde::de::DeserializeOwned>(def: &PropertyDefinition, json: &Json) -> Result<T> {
    serde_json::from_value(json.clone()).map_err(|e| invalid(def, e.to_string()))
}
