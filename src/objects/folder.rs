use anyhow::{Result, anyhow};
use serde_json::Value as Json;

use crate::objects::{ServiceObject, get_i64, get_id, get_str};
use crate::properties::schema::folder as props;
use crate::properties::{
    FOLDER_SCHEMA, PropertyBag, PropertyDefinition, PropertyValue, Schema, ServiceId,
    json_type_name,
};
use crate::version::ExchangeVersion;
use crate::xml::XmlNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FolderKind {
    #[default]
    Folder,
    CalendarFolder,
    ContactsFolder,
    TasksFolder,
    SearchFolder,
}

impl FolderKind {
    pub fn element_name(self) -> &'static str {
        match self {
            FolderKind::Folder => "Folder",
            FolderKind::CalendarFolder => "CalendarFolder",
            FolderKind::ContactsFolder => "ContactsFolder",
            FolderKind::TasksFolder => "TasksFolder",
            FolderKind::SearchFolder => "SearchFolder",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "Folder" => Some(FolderKind::Folder),
            "CalendarFolder" => Some(FolderKind::CalendarFolder),
            "ContactsFolder" => Some(FolderKind::ContactsFolder),
            "TasksFolder" => Some(FolderKind::TasksFolder),
            "SearchFolder" => Some(FolderKind::SearchFolder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Folder {
    pub kind: FolderKind,
    bag: PropertyBag,
}

impl Folder {
    /// A folder that has not been created yet.
    pub fn new(kind: FolderKind, version: ExchangeVersion) -> Self {
        Self {
            kind,
            bag: PropertyBag::new(version),
        }
    }

    /// Decode a folder element, inferring the kind from its name.
    pub fn from_xml(
        node: &XmlNode,
        version: ExchangeVersion,
        requested: &[&'static PropertyDefinition],
    ) -> Result<Self> {
        let kind = FolderKind::from_element_name(&node.name)
            .ok_or_else(|| anyhow!("{} is not a folder element", node.name))?;
        let mut bag = PropertyBag::existing(version);
        bag.load_from_xml(node, &FOLDER_SCHEMA, true, requested)?;
        Ok(Self { kind, bag })
    }

    pub fn from_json(json: &Json, version: ExchangeVersion) -> Result<Self> {
        let kind = json_type_name(json)
            .and_then(FolderKind::from_element_name)
            .ok_or_else(|| anyhow!("JSON document is not a folder"))?;
        // Without a server id the object was never saved.
        let mut bag = if json.get(props::FOLDER_ID.xml_name).is_some() {
            PropertyBag::existing(version)
        } else {
            PropertyBag::new(version)
        };
        bag.load_from_json(json, &FOLDER_SCHEMA)?;
        Ok(Self { kind, bag })
    }

    pub fn id(&self) -> Result<Option<&ServiceId>> {
        get_id(self, &props::FOLDER_ID)
    }

    pub fn parent_folder_id(&self) -> Result<Option<&ServiceId>> {
        get_id(self, &props::PARENT_FOLDER_ID)
    }

    pub fn display_name(&self) -> Result<Option<&str>> {
        get_str(self, &props::DISPLAY_NAME)
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.set(&props::DISPLAY_NAME, PropertyValue::String(name.into()))
    }

    pub fn folder_class(&self) -> Result<Option<&str>> {
        get_str(self, &props::FOLDER_CLASS)
    }

    pub fn set_folder_class(&mut self, class: impl Into<String>) -> Result<()> {
        self.set(&props::FOLDER_CLASS, PropertyValue::String(class.into()))
    }

    pub fn total_count(&self) -> Result<Option<i64>> {
        get_i64(self, &props::TOTAL_COUNT)
    }

    pub fn unread_count(&self) -> Result<Option<i64>> {
        get_i64(self, &props::UNREAD_COUNT)
    }

    pub fn child_folder_count(&self) -> Result<Option<i64>> {
        get_i64(self, &props::CHILD_FOLDER_COUNT)
    }
}

impl ServiceObject for Folder {
    fn schema(&self) -> &'static Schema {
        &FOLDER_SCHEMA
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
