//! Folders and items: typed views over a [`PropertyBag`].

pub mod folder;
pub mod folder_id;
pub mod item;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use crate::error::EwsError;
use crate::properties::{PropertyBag, PropertyDefinition, PropertyValue, Schema, ServiceId};

pub use folder::{Folder, FolderKind};
pub use folder_id::{FolderIdentity, WellKnownFolderName};
pub use item::{Item, ItemKind};

/// Behaviour shared by every object backed by a property bag.
pub trait ServiceObject {
    fn schema(&self) -> &'static Schema;

    /// Element name used on the wire, e.g. `CalendarItem`.
    fn xml_element_name(&self) -> &'static str;

    fn bag(&self) -> &PropertyBag;

    fn bag_mut(&mut self) -> &mut PropertyBag;

    fn is_new(&self) -> bool {
        self.bag().is_new()
    }

    fn is_dirty(&self) -> bool {
        self.bag().is_dirty()
    }

    fn to_json(&self) -> Result<Json> {
        self.bag().to_json(self.xml_element_name())
    }

    /// Resolve `def` against this object's schema.
    fn property(&self, def: &'static PropertyDefinition) -> Result<&'static PropertyDefinition> {
        if self.schema().contains(def) {
            Ok(def)
        } else {
            Err(EwsError::UnknownProperty(format!(
                "{} on {}",
                def.field_uri,
                self.xml_element_name()
            ))
            .into())
        }
    }

    fn get(&self, def: &'static PropertyDefinition) -> Result<Option<&PropertyValue>> {
        let def = self.property(def)?;
        self.bag().get(def)
    }

    fn set(&mut self, def: &'static PropertyDefinition, value: PropertyValue) -> Result<()> {
        let def = self.property(def)?;
        self.bag_mut().set(def, value)
    }

    fn delete(&mut self, def: &'static PropertyDefinition) -> Result<()> {
        let def = self.property(def)?;
        self.bag_mut().delete(def)
    }
}

pub(crate) fn get_str<'a, T: ServiceObject + ?Sized>(
    obj: &'a T,
    def: &'static PropertyDefinition,
) -> Result<Option<&'a str>> {
    Ok(obj.get(def)?.and_then(PropertyValue::as_str))
}

pub(crate) fn get_bool<T: ServiceObject + ?Sized>(
    obj: &T,
    def: &'static PropertyDefinition,
) -> Result<Option<bool>> {
    Ok(obj.get(def)?.and_then(PropertyValue::as_bool))
}

pub(crate) fn get_i64<T: ServiceObject + ?Sized>(
    obj: &T,
    def: &'static PropertyDefinition,
) -> Result<Option<i64>> {
    Ok(obj.get(def)?.and_then(PropertyValue::as_i64))
}

pub(crate) fn get_date_time<T: ServiceObject + ?Sized>(
    obj: &T,
    def: &'static PropertyDefinition,
) -> Result<Option<DateTime<Utc>>> {
    Ok(obj.get(def)?.and_then(PropertyValue::as_date_time))
}

pub(crate) fn get_id<'a, T: ServiceObject + ?Sized>(
    obj: &'a T,
    def: &'static PropertyDefinition,
) -> Result<Option<&'a ServiceId>> {
    Ok(obj.get(def)?.and_then(PropertyValue::as_service_id))
}
