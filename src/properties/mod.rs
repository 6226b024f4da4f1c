//! Schema-driven property bag shared by folders and items.
//!
//! A [`Schema`] lists the [`PropertyDefinition`]s of an object type in wire
//! order. A [`PropertyBag`] holds the typed [`PropertyValue`]s of one object,
//! tracks which of them were loaded from the server and which changed locally,
//! and writes them back as create or update XML.

pub mod bag;
pub mod complex;
pub mod definition;
pub mod schema;
pub mod value;

pub use bag::{JSON_TYPE_KEY, PropertyBag, json_type_name};
pub use complex::{Attendee, BodyType, EmailAddress, MessageBody, ServiceId};
pub use definition::{PropertyDefinition, PropertyFlags, PropertyKind};
pub use schema::{
    APPOINTMENT_SCHEMA, CONTACT_SCHEMA, FOLDER_SCHEMA, ITEM_SCHEMA, MESSAGE_SCHEMA, Schema,
};
pub use value::{PropertyValue, format_date_time, parse_date_time};
