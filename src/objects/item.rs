use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use crate::objects::{ServiceObject, get_bool, get_date_time, get_id, get_str};
use crate::properties::schema::{calendar, contact, item as props, message};
use crate::properties::{
    APPOINTMENT_SCHEMA, Attendee, CONTACT_SCHEMA, EmailAddress, ITEM_SCHEMA, MESSAGE_SCHEMA,
    MessageBody, PropertyBag, PropertyDefinition, PropertyValue, Schema, ServiceId,
    json_type_name,
};
use crate::version::ExchangeVersion;
use crate::xml::XmlNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemKind {
    #[default]
    Item,
    Message,
    CalendarItem,
    Contact,
    Task,
}

impl ItemKind {
    pub fn element_name(self) -> &'static str {
        match self {
            ItemKind::Item => "Item",
            ItemKind::Message => "Message",
            ItemKind::CalendarItem => "CalendarItem",
            ItemKind::Contact => "Contact",
            ItemKind::Task => "Task",
        }
    }

    /// Meeting messages are read as plain messages.
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "Item" => Some(ItemKind::Item),
            "Message" | "MeetingRequest" | "MeetingResponse" | "MeetingCancellation" => {
                Some(ItemKind::Message)
            }
            "CalendarItem" => Some(ItemKind::CalendarItem),
            "Contact" => Some(ItemKind::Contact),
            "Task" => Some(ItemKind::Task),
            _ => None,
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            ItemKind::Item | ItemKind::Task => &ITEM_SCHEMA,
            ItemKind::Message => &MESSAGE_SCHEMA,
            ItemKind::CalendarItem => &APPOINTMENT_SCHEMA,
            ItemKind::Contact => &CONTACT_SCHEMA,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
    bag: PropertyBag,
}

impl Item {
    pub fn new(kind: ItemKind, version: ExchangeVersion) -> Self {
        Self {
            kind,
            bag: PropertyBag::new(version),
        }
    }

    pub fn from_xml(
        node: &XmlNode,
        version: ExchangeVersion,
        requested: &[&'static PropertyDefinition],
    ) -> Result<Self> {
        let kind = ItemKind::from_element_name(&node.name)
            .ok_or_else(|| anyhow!("{} is not an item element", node.name))?;
        let mut bag = PropertyBag::existing(version);
        bag.load_from_xml(node, kind.schema(), true, requested)?;
        Ok(Self { kind, bag })
    }

    pub fn from_json(json: &Json, version: ExchangeVersion) -> Result<Self> {
        let kind = json_type_name(json)
            .and_then(ItemKind::from_element_name)
            .ok_or_else(|| anyhow!("JSON document is not an item"))?;
        // Without a server id the object was never saved.
        let mut bag = if json.get(props::ITEM_ID.xml_name).is_some() {
            PropertyBag::existing(version)
        } else {
            PropertyBag::new(version)
        };
        bag.load_from_json(json, kind.schema())?;
        Ok(Self { kind, bag })
    }

    pub fn id(&self) -> Result<Option<&ServiceId>> {
        get_id(self, &props::ITEM_ID)
    }

    pub fn parent_folder_id(&self) -> Result<Option<&ServiceId>> {
        get_id(self, &props::PARENT_FOLDER_ID)
    }

    pub fn item_class(&self) -> Result<Option<&str>> {
        get_str(self, &props::ITEM_CLASS)
    }

    pub fn subject(&self) -> Result<Option<&str>> {
        get_str(self, &props::SUBJECT)
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) -> Result<()> {
        self.set(&props::SUBJECT, PropertyValue::String(subject.into()))
    }

    pub fn body(&self) -> Result<Option<&MessageBody>> {
        Ok(match self.get(&props::BODY)? {
            Some(PropertyValue::Body(body)) => Some(body),
            _ => None,
        })
    }

    pub fn set_body(&mut self, body: MessageBody) -> Result<()> {
        self.set(&props::BODY, PropertyValue::Body(body))
    }

    pub fn categories(&self) -> Result<&[String]> {
        Ok(match self.get(&props::CATEGORIES)? {
            Some(PropertyValue::StringList(values)) => values.as_slice(),
            _ => &[],
        })
    }

    pub fn set_categories(&mut self, categories: Vec<String>) -> Result<()> {
        self.set(&props::CATEGORIES, PropertyValue::StringList(categories))
    }

    pub fn add_category(&mut self, category: impl Into<String>) -> Result<()> {
        let category = category.into();
        self.bag_mut().modify(&props::CATEGORIES, |value| {
            if let PropertyValue::StringList(values) = value {
                values.push(category);
            }
        })
    }

    pub fn importance(&self) -> Result<Option<&str>> {
        get_str(self, &props::IMPORTANCE)
    }

    pub fn set_importance(&mut self, importance: &str) -> Result<()> {
        self.set(&props::IMPORTANCE, PropertyValue::Enum(importance.to_string()))
    }

    pub fn sensitivity(&self) -> Result<Option<&str>> {
        get_str(self, &props::SENSITIVITY)
    }

    pub fn set_sensitivity(&mut self, sensitivity: &str) -> Result<()> {
        self.set(&props::SENSITIVITY, PropertyValue::Enum(sensitivity.to_string()))
    }

    pub fn date_time_received(&self) -> Result<Option<DateTime<Utc>>> {
        get_date_time(self, &props::DATE_TIME_RECEIVED)
    }

    pub fn date_time_sent(&self) -> Result<Option<DateTime<Utc>>> {
        get_date_time(self, &props::DATE_TIME_SENT)
    }

    pub fn has_attachments(&self) -> Result<Option<bool>> {
        get_bool(self, &props::HAS_ATTACHMENTS)
    }

    // Message

    pub fn is_read(&self) -> Result<Option<bool>> {
        get_bool(self, &message::IS_READ)
    }

    pub fn set_is_read(&mut self, read: bool) -> Result<()> {
        self.set(&message::IS_READ, PropertyValue::Boolean(read))
    }

    pub fn from_address(&self) -> Result<Option<&EmailAddress>> {
        Ok(match self.get(&message::FROM)? {
            Some(PropertyValue::EmailAddress(address)) => Some(address),
            _ => None,
        })
    }

    pub fn set_from_address(&mut self, address: EmailAddress) -> Result<()> {
        self.set(&message::FROM, PropertyValue::EmailAddress(address))
    }

    fn addresses(&self, def: &'static PropertyDefinition) -> Result<&[EmailAddress]> {
        Ok(match self.get(def)? {
            Some(PropertyValue::EmailAddresses(values)) => values.as_slice(),
            _ => &[],
        })
    }

    fn push_address(&mut self, def: &'static PropertyDefinition, address: EmailAddress) -> Result<()> {
        let def = self.property(def)?;
        self.bag_mut().modify(def, |value| {
            if let PropertyValue::EmailAddresses(values) = value {
                values.push(address);
            }
        })
    }

    pub fn to_recipients(&self) -> Result<&[EmailAddress]> {
        self.addresses(&message::TO_RECIPIENTS)
    }

    pub fn add_to_recipient(&mut self, address: EmailAddress) -> Result<()> {
        self.push_address(&message::TO_RECIPIENTS, address)
    }

    pub fn cc_recipients(&self) -> Result<&[EmailAddress]> {
        self.addresses(&message::CC_RECIPIENTS)
    }

    pub fn add_cc_recipient(&mut self, address: EmailAddress) -> Result<()> {
        self.push_address(&message::CC_RECIPIENTS, address)
    }

    // Calendar

    pub fn start(&self) -> Result<Option<DateTime<Utc>>> {
        get_date_time(self, &calendar::START)
    }

    pub fn set_start(&mut self, start: DateTime<Utc>) -> Result<()> {
        self.set(&calendar::START, PropertyValue::DateTime(start))
    }

    pub fn end(&self) -> Result<Option<DateTime<Utc>>> {
        get_date_time(self, &calendar::END)
    }

    pub fn set_end(&mut self, end: DateTime<Utc>) -> Result<()> {
        self.set(&calendar::END, PropertyValue::DateTime(end))
    }

    pub fn location(&self) -> Result<Option<&str>> {
        get_str(self, &calendar::LOCATION)
    }

    pub fn set_location(&mut self, location: impl Into<String>) -> Result<()> {
        self.set(&calendar::LOCATION, PropertyValue::String(location.into()))
    }

    pub fn required_attendees(&self) -> Result<&[Attendee]> {
        Ok(match self.get(&calendar::REQUIRED_ATTENDEES)? {
            Some(PropertyValue::Attendees(values)) => values.as_slice(),
            _ => &[],
        })
    }

    pub fn add_required_attendee(&mut self, attendee: Attendee) -> Result<()> {
        let def = self.property(&calendar::REQUIRED_ATTENDEES)?;
        self.bag_mut().modify(def, |value| {
            if let PropertyValue::Attendees(values) = value {
                values.push(attendee);
            }
        })
    }

    // Contact

    pub fn given_name(&self) -> Result<Option<&str>> {
        get_str(self, &contact::GIVEN_NAME)
    }

    pub fn set_given_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.set(&contact::GIVEN_NAME, PropertyValue::String(name.into()))
    }

    pub fn surname(&self) -> Result<Option<&str>> {
        get_str(self, &contact::SURNAME)
    }

    pub fn set_surname(&mut self, name: impl Into<String>) -> Result<()> {
        self.set(&contact::SURNAME, PropertyValue::String(name.into()))
    }
}

impl ServiceObject for Item {
    fn schema(&self) -> &'static Schema {
        self.kind.schema()
    }

    fn xml_element_name(&self) -> &'static str {
        self.kind.element_name()
    }

    fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }
}
