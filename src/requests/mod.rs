//! EWS operations.
//!
//! Each operation is a plain struct implementing [`ServiceRequest`]: it writes
//! its element into the SOAP body and decodes the matching response element.
//! [`ExchangeService`](crate::ExchangeService) owns the envelope, the HTTP
//! round trip and fault handling.

pub mod availability;
pub mod folder;
pub mod item;
pub mod response;

use anyhow::{Result, anyhow};

use crate::error::EwsError;
use crate::properties::{BodyType, PropertyDefinition, PropertyFlags, Schema};
use crate::version::ExchangeVersion;
use crate::xml::{EwsXmlWriter, XmlNode};

pub use availability::{
    AttendeeAvailability, AttendeeInfo, AttendeeType, CalendarEvent, FreeBusyViewType,
    GetUserAvailability,
};
pub use folder::{
    CreateFolder, DeleteFolder, FindFolder, FindFoldersResults, FolderTraversal, FolderView,
    GetFolder, UpdateFolder,
};
pub use item::{
    AffectedTaskOccurrences, CalendarView, ConflictResolutionMode, CreateItem, DeleteItem,
    FindItem, FindItemsResults, GetItem, ItemTraversal, ItemView, MessageDisposition,
    SendInvitationsMode, UpdateItem, ViewKind,
};
pub use response::{ResponseClass, ServiceResponseError, ServiceResult};

/// Values a request needs while it is written or decoded.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub version: ExchangeVersion,
}

/// One EWS operation.
pub trait ServiceRequest: Send + Sync {
    type Response: Send;

    /// Operation element name, e.g. `GetItem`.
    const NAME: &'static str;

    fn min_version(&self) -> ExchangeVersion {
        ExchangeVersion::Exchange2007Sp1
    }

    /// Write `<m:{NAME}>...</m:{NAME}>`.
    fn write_body(&self, w: &mut EwsXmlWriter, ctx: &RequestContext) -> Result<()>;

    /// Decode the `{NAME}Response` element.
    fn parse_response(&self, content: &XmlNode, ctx: &RequestContext) -> Result<Self::Response>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasePropertySet {
    IdOnly,
    #[default]
    Default,
    AllProperties,
}

impl BasePropertySet {
    pub fn as_str(self) -> &'static str {
        match self {
            BasePropertySet::IdOnly => "IdOnly",
            BasePropertySet::Default => "Default",
            BasePropertySet::AllProperties => "AllProperties",
        }
    }
}

/// Which properties a Get/Find operation returns.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    pub base: BasePropertySet,
    pub additional: Vec<&'static PropertyDefinition>,
    pub body_type: Option<BodyType>,
}

impl PropertySet {
    pub fn id_only() -> Self {
        Self {
            base: BasePropertySet::IdOnly,
            ..Default::default()
        }
    }

    pub fn first_class() -> Self {
        Self::default()
    }

    pub fn all_properties() -> Self {
        Self {
            base: BasePropertySet::AllProperties,
            ..Default::default()
        }
    }

    pub fn with(mut self, def: &'static PropertyDefinition) -> Self {
        self.additional.push(def);
        self
    }

    pub fn with_body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = Some(body_type);
        self
    }

    fn check(&self, version: ExchangeVersion, for_find: bool) -> Result<()> {
        for def in &self.additional {
            if !def.is_supported_by(version) {
                return Err(EwsError::PropertyVersion {
                    name: def.xml_name,
                    required: def.version,
                }
                .into());
            }
            if for_find && !def.has_flag(PropertyFlags::CAN_FIND) {
                return Err(anyhow!("{} cannot be requested by a find operation", def.field_uri));
            }
        }
        Ok(())
    }

    /// `<m:ItemShape>` or `<m:FolderShape>`.
    pub fn write(
        &self,
        w: &mut EwsXmlWriter,
        element: &str,
        version: ExchangeVersion,
        for_find: bool,
    ) -> Result<()> {
        self.check(version, for_find)?;
        w.start_element("m", element)?;
        w.write_element_value("t", "BaseShape", self.base.as_str())?;
        if let Some(body_type) = self.body_type {
            w.write_element_value("t", "BodyType", body_type.as_str())?;
        }
        if !self.additional.is_empty() {
            w.start_element("t", "AdditionalProperties")?;
            for def in &self.additional {
                w.start_element("t", "FieldURI")?;
                w.attribute("FieldURI", def.field_uri)?;
                w.end_element()?;
            }
            w.end_element()?;
        }
        w.end_element()
    }

    /// Definitions the server is expected to return for `schema`.
    pub fn requested(
        &self,
        schema: &Schema,
        version: ExchangeVersion,
        for_find: bool,
    ) -> Vec<&'static PropertyDefinition> {
        let mut out: Vec<&'static PropertyDefinition> = match self.base {
            BasePropertySet::IdOnly => schema.iter().take(1).collect(),
            BasePropertySet::Default | BasePropertySet::AllProperties => schema
                .first_class()
                .filter(|d| d.is_supported_by(version))
                .filter(|d| !for_find || d.has_flag(PropertyFlags::CAN_FIND))
                .collect(),
        };
        for def in &self.additional {
            if schema.contains(def) && !out.iter().any(|d| std::ptr::eq(*d, *def)) {
                out.push(def);
            }
        }
        out
    }
}

/// How deleted objects are disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    HardDelete,
    SoftDelete,
    #[default]
    MoveToDeletedItems,
}

impl DeleteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeleteMode::HardDelete => "HardDelete",
            DeleteMode::SoftDelete => "SoftDelete",
            DeleteMode::MoveToDeletedItems => "MoveToDeletedItems",
        }
    }
}

/// Where an indexed view starts counting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetBasePoint {
    #[default]
    Beginning,
    End,
}

impl OffsetBasePoint {
    pub fn as_str(self) -> &'static str {
        match self {
            OffsetBasePoint::Beginning => "Beginning",
            OffsetBasePoint::End => "End",
        }
    }
}

/// Paging attributes of a `RootFolder` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PagingInfo {
    pub total_items_in_view: u32,
    pub includes_last_item_in_range: bool,
    pub next_offset: Option<u32>,
}

impl PagingInfo {
    fn from_root_folder(root: &XmlNode) -> Self {
        Self {
            total_items_in_view: root
                .attribute("TotalItemsInView")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            includes_last_item_in_range: root.attribute("IncludesLastItemInRange") == Some("true"),
            next_offset: root
                .attribute("IndexedPagingOffset")
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// `<m:{element}>` around the ids written by `write_id`.
pub(crate) fn write_id_list<T, F>(
    w: &mut EwsXmlWriter,
    element: &str,
    ids: &[T],
    mut write_id: F,
) -> Result<()>
where
    F: FnMut(&mut EwsXmlWriter, &T) -> Result<()>,
{
    if ids.is_empty() {
        return Err(anyhow!("{element} needs at least one id"));
    }
    w.start_element("m", element)?;
    for id in ids {
        write_id(w, id)?;
    }
    w.end_element()
}
