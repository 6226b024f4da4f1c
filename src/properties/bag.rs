use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::{Result, anyhow};
use serde_json::{Map, Value as Json};
use tracing::trace;

use crate::error::EwsError;
use crate::properties::definition::{PropertyDefinition, PropertyFlags};
use crate::properties::schema::Schema;
use crate::properties::value::PropertyValue;
use crate::version::ExchangeVersion;
use crate::xml::{EwsXmlWriter, XmlNode};

/// Key under which the object type travels in JSON documents.
pub const JSON_TYPE_KEY: &str = "__type";

/// Property values of one service object plus their change log.
///
/// Properties are keyed by field URI. A property is in at most one of the
/// added, changed and deleted sets at any time.
#[derive(Debug, Clone)]
pub struct PropertyBag {
    values: HashMap<&'static str, (&'static PropertyDefinition, PropertyValue)>,
    loaded: HashSet<&'static str>,
    added: BTreeSet<&'static str>,
    changed: BTreeSet<&'static str>,
    deleted: BTreeSet<&'static str>,
    is_new: bool,
    version: ExchangeVersion,
}

impl PropertyBag {
    /// Bag for an object that does not exist on the server yet.
    pub fn new(version: ExchangeVersion) -> Self {
        Self {
            values: HashMap::new(),
            loaded: HashSet::new(),
            added: BTreeSet::new(),
            changed: BTreeSet::new(),
            deleted: BTreeSet::new(),
            is_new: true,
            version,
        }
    }

    /// Bag for an object that will be filled from a server response.
    pub fn existing(version: ExchangeVersion) -> Self {
        Self {
            is_new: false,
            ..Self::new(version)
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn version(&self) -> ExchangeVersion {
        self.version
    }

    /// Called once the server has created the object.
    pub fn mark_saved(&mut self) {
        self.is_new = false;
        self.clear_change_log();
    }

    fn check_version(&self, def: &PropertyDefinition) -> Result<()> {
        if def.is_supported_by(self.version) {
            Ok(())
        } else {
            Err(EwsError::PropertyVersion {
                name: def.xml_name,
                required: def.version,
            }
            .into())
        }
    }

    /// Current value of `def`.
    ///
    /// `Ok(None)` means the property is known to be unset. Reading a property
    /// that was never loaded on an existing object fails with
    /// [`EwsError::PropertyNotLoaded`].
    pub fn get(&self, def: &'static PropertyDefinition) -> Result<Option<&PropertyValue>> {
        self.check_version(def)?;
        if let Some((_, value)) = self.values.get(def.field_uri) {
            return Ok(Some(value));
        }
        if !self.is_new && !self.loaded.contains(def.field_uri) {
            return Err(EwsError::PropertyNotLoaded(def.xml_name).into());
        }
        if def.has_flag(PropertyFlags::AUTO_INSTANTIATE_ON_READ) {
            return Ok(PropertyValue::empty_collection(def.kind));
        }
        Ok(None)
    }

    pub fn contains(&self, def: &PropertyDefinition) -> bool {
        self.values.contains_key(def.field_uri)
    }

    pub fn is_loaded(&self, def: &PropertyDefinition) -> bool {
        self.loaded.contains(def.field_uri) || self.values.contains_key(def.field_uri)
    }

    fn check_writable(&self, def: &PropertyDefinition) -> Result<()> {
        self.check_version(def)?;
        let required = if self.is_new {
            PropertyFlags::CAN_SET
        } else {
            PropertyFlags::CAN_UPDATE
        };
        if def.has_flag(required) {
            Ok(())
        } else {
            Err(EwsError::PropertyReadOnly(def.xml_name).into())
        }
    }

    fn record_change(&mut self, def: &PropertyDefinition, existed: bool) {
        let uri = def.field_uri;
        if self.deleted.remove(uri) {
            self.changed.insert(uri);
        } else if self.added.contains(uri) {
            // still a local addition
        } else if existed {
            self.changed.insert(uri);
        } else {
            self.added.insert(uri);
        }
    }

    /// Assign `value` to `def`.
    pub fn set(&mut self, def: &'static PropertyDefinition, value: PropertyValue) -> Result<()> {
        self.check_writable(def)?;
        value.validate(def)?;

        let existed = match self.values.get(def.field_uri) {
            Some((_, current)) if *current == value => return Ok(()),
            Some(_) => true,
            None => false,
        };
        self.record_change(def, existed);
        self.values.insert(def.field_uri, (def, value));
        self.loaded.insert(def.field_uri);
        Ok(())
    }

    /// Store a value assigned by the server (ids, change keys). Bypasses the
    /// write checks and the change log.
    pub(crate) fn set_server_value(&mut self, def: &'static PropertyDefinition, value: PropertyValue) {
        self.values.insert(def.field_uri, (def, value));
        self.loaded.insert(def.field_uri);
    }

    /// Treat `def` as loaded even though the server sent no value for it.
    pub(crate) fn mark_loaded(&mut self, def: &PropertyDefinition) {
        self.loaded.insert(def.field_uri);
    }

    /// Edit a collection, creating it first when it is unset. Nothing is
    /// stored unless the edited value validates.
    pub fn modify<F>(&mut self, def: &'static PropertyDefinition, edit: F) -> Result<()>
    where
        F: FnOnce(&mut PropertyValue),
    {
        self.check_writable(def)?;
        if !def.has_flag(PropertyFlags::REUSE_INSTANCE) {
            return Err(anyhow!("property {} cannot be edited in place", def.xml_name));
        }
        let existed = self.values.contains_key(def.field_uri);
        let mut value = match self.values.get(def.field_uri) {
            Some((_, current)) => current.clone(),
            None => PropertyValue::empty_collection(def.kind)
                .cloned()
                .ok_or_else(|| anyhow!("property {} is not a collection", def.xml_name))?,
        };
        edit(&mut value);
        value.validate(def)?;
        self.record_change(def, existed);
        self.values.insert(def.field_uri, (def, value));
        self.loaded.insert(def.field_uri);
        Ok(())
    }

    /// Remove the value of `def`.
    pub fn delete(&mut self, def: &'static PropertyDefinition) -> Result<()> {
        self.check_version(def)?;
        if !def.has_flag(PropertyFlags::CAN_DELETE) {
            return Err(EwsError::PropertyNotDeletable(def.xml_name).into());
        }
        let uri = def.field_uri;
        self.values.remove(uri);
        self.changed.remove(uri);
        if self.added.remove(uri) || self.is_new {
            return Ok(());
        }
        self.deleted.insert(uri);
        self.loaded.insert(uri);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        !(self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty())
    }

    pub fn added_properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.added.iter().copied()
    }

    pub fn changed_properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.changed.iter().copied()
    }

    pub fn deleted_properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.deleted.iter().copied()
    }

    pub fn clear_change_log(&mut self) {
        self.added.clear();
        self.changed.clear();
        self.deleted.clear();
    }

    /// Load property elements from an object element such as `<t:Message>`.
    ///
    /// Unknown elements are skipped. Properties listed in `requested` are
    /// marked loaded even when the server omitted them, which is how EWS
    /// reports an unset value.
    pub fn load_from_xml(
        &mut self,
        node: &XmlNode,
        schema: &Schema,
        clear: bool,
        requested: &[&'static PropertyDefinition],
    ) -> Result<()> {
        if clear {
            self.values.clear();
            self.loaded.clear();
        }
        for child in &node.children {
            let Some(def) = schema.find(&child.name) else {
                trace!(element = %child.name, schema = schema.name, "skipping unknown property element");
                continue;
            };
            let value = PropertyValue::read_from_xml(def, child)?;
            self.values.insert(def.field_uri, (def, value));
            self.loaded.insert(def.field_uri);
        }
        for def in requested {
            self.loaded.insert(def.field_uri);
        }
        self.is_new = false;
        self.clear_change_log();
        Ok(())
    }

    /// Write every assigned, settable property in schema order.
    pub fn write_to_xml_for_create(&self, w: &mut EwsXmlWriter, schema: &Schema) -> Result<()> {
        for def in schema.iter() {
            if !def.has_flag(PropertyFlags::CAN_SET) || !def.is_supported_by(self.version) {
                continue;
            }
            if let Some((_, value)) = self.values.get(def.field_uri) {
                value.write_to_xml(def, w)?;
            }
        }
        Ok(())
    }

    /// Write the `Updates` children for this bag's change log.
    ///
    /// Returns the number of field updates written.
    pub fn write_to_xml_for_update(
        &self,
        w: &mut EwsXmlWriter,
        schema: &Schema,
        object_element: &str,
        set_tag: &str,
        delete_tag: &str,
    ) -> Result<usize> {
        let mut written = 0;
        for def in schema.iter() {
            let uri = def.field_uri;
            if self.added.contains(uri) || self.changed.contains(uri) {
                let Some((_, value)) = self.values.get(uri) else {
                    continue;
                };
                w.start_element("t", set_tag)?;
                write_field_uri(w, def)?;
                w.start_element("t", object_element)?;
                value.write_to_xml(def, w)?;
                w.end_element()?;
                w.end_element()?;
                written += 1;
            } else if self.deleted.contains(uri) {
                w.start_element("t", delete_tag)?;
                write_field_uri(w, def)?;
                w.end_element()?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// JSON object keyed by XML names plus the [`JSON_TYPE_KEY`] discriminator.
    pub fn to_json(&self, type_name: &str) -> Result<Json> {
        let mut map = Map::new();
        map.insert(JSON_TYPE_KEY.to_string(), Json::String(type_name.to_string()));
        for (def, value) in self.values.values() {
            map.insert(def.xml_name.to_string(), value.to_json()?);
        }
        Ok(Json::Object(map))
    }

    /// Replace the bag contents with a document produced by [`to_json`](Self::to_json).
    pub fn load_from_json(&mut self, json: &Json, schema: &Schema) -> Result<()> {
        let map = json
            .as_object()
            .ok_or_else(|| anyhow!("expected a JSON object for {}", schema.name))?;
        let mut values = HashMap::with_capacity(map.len());
        for (key, raw) in map {
            if key == JSON_TYPE_KEY {
                continue;
            }
            let def = schema
                .find(key)
                .ok_or_else(|| EwsError::UnknownProperty(key.clone()))?;
            values.insert(def.field_uri, (def, PropertyValue::from_json(def, raw)?));
        }
        self.loaded = values.keys().copied().collect();
        self.values = values;
        self.clear_change_log();
        Ok(())
    }
}

/// The `__type` discriminator of a JSON object document.
pub fn json_type_name(json: &Json) -> Option<&str> {
    json.get(JSON_TYPE_KEY).and_then(Json::as_str)
}

fn write_field_uri(w: &mut EwsXmlWriter, def: &PropertyDefinition) -> Result<()> {
    w.start_element("t", "FieldURI")?;
    w.attribute("FieldURI", def.field_uri)?;
    w.end_element()
}
