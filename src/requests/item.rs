use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

use crate::objects::{FolderIdentity, Item, ItemKind, ServiceObject};
use crate::properties::{ServiceId, format_date_time};
use crate::requests::response::checked_messages;
use crate::requests::{
    DeleteMode, OffsetBasePoint, PagingInfo, PropertySet, RequestContext, ServiceRequest,
    write_id_list,
};
use crate::version::ExchangeVersion;
use crate::xml::{EwsXmlWriter, XmlNode};

fn items_in<'a>(parent: &'a XmlNode) -> impl Iterator<Item = &'a XmlNode> + 'a {
    parent
        .child("Items")
        .into_iter()
        .flat_map(|items| items.children.iter())
}

/// Decode an item element with the requested set of its own schema.
fn read_item(node: &XmlNode, shape: &PropertySet, ctx: &RequestContext, for_find: bool) -> Result<Item> {
    let kind = ItemKind::from_element_name(&node.name).unwrap_or_default();
    let requested = shape.requested(kind.schema(), ctx.version, for_find);
    Item::from_xml(node, ctx.version, &requested)
}

/// First `ItemId` of every response message, `None` when the server kept none
/// (e.g. a message sent without saving a copy).
fn returned_item_ids(content: &XmlNode) -> Result<Vec<Option<ServiceId>>> {
    Ok(checked_messages(content)?
        .into_iter()
        .map(|message| {
            items_in(message)
                .next()
                .and_then(|item| item.child("ItemId"))
                .and_then(ServiceId::from_node)
        })
        .collect())
}

fn write_item_ids(w: &mut EwsXmlWriter, ids: &[ServiceId]) -> Result<()> {
    write_id_list(w, "ItemIds", ids, |w, id| id.write(w, "ItemId"))
}

#[derive(Debug, Clone)]
pub struct GetItem {
    pub item_ids: Vec<ServiceId>,
    pub shape: PropertySet,
}

impl ServiceRequest for GetItem {
    type Response = Vec<Item>;
    const NAME: &'static str = "GetItem";

    fn write_body(&self, w: &mut EwsXmlWriter, ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        self.shape.write(w, "ItemShape", ctx.version, false)?;
        write_item_ids(w, &self.item_ids)?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, ctx: &RequestContext) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        for message in checked_messages(content)? {
            for node in items_in(message) {
                out.push(read_item(node, &self.shape, ctx, false)?);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemTraversal {
    #[default]
    Shallow,
    SoftDeleted,
    Associated,
}

impl ItemTraversal {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemTraversal::Shallow => "Shallow",
            ItemTraversal::SoftDeleted => "SoftDeleted",
            ItemTraversal::Associated => "Associated",
        }
    }
}

/// `IndexedPageItemView` paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemView {
    pub page_size: u32,
    pub offset: u32,
    pub base_point: OffsetBasePoint,
}

impl ItemView {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            offset: 0,
            base_point: OffsetBasePoint::Beginning,
        }
    }
}

/// Expands recurring meetings into the occurrences inside `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarView {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_entries: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Indexed(ItemView),
    Calendar(CalendarView),
}

#[derive(Debug, Clone)]
pub struct FindItemsResults {
    pub items: Vec<Item>,
    pub paging: PagingInfo,
}

#[derive(Debug, Clone)]
pub struct FindItem {
    pub parent_folder_ids: Vec<FolderIdentity>,
    pub shape: PropertySet,
    pub traversal: ItemTraversal,
    pub view: ViewKind,
    /// AQS search string.
    pub query_string: Option<String>,
}

impl FindItem {
    pub fn new(parent: impl Into<FolderIdentity>, view: ViewKind) -> Self {
        Self {
            parent_folder_ids: vec![parent.into()],
            shape: PropertySet::first_class(),
            traversal: ItemTraversal::Shallow,
            view,
            query_string: None,
        }
    }
}

impl ServiceRequest for FindItem {
    type Response = FindItemsResults;
    const NAME: &'static str = "FindItem";

    fn min_version(&self) -> ExchangeVersion {
        if self.query_string.is_some() {
            ExchangeVersion::Exchange2010
        } else {
            ExchangeVersion::Exchange2007Sp1
        }
    }

    fn write_body(&self, w: &mut EwsXmlWriter, ctx: &RequestContext) -> Result<()> {
        if matches!(self.view, ViewKind::Calendar(_)) && self.traversal != ItemTraversal::Shallow {
            return Err(anyhow!("a calendar view only supports shallow traversal"));
        }
        w.start_element("m", Self::NAME)?;
        w.attribute("Traversal", self.traversal.as_str())?;
        self.shape.write(w, "ItemShape", ctx.version, true)?;
        match &self.view {
            ViewKind::Indexed(view) => {
                w.start_element("m", "IndexedPageItemView")?;
                w.attribute("MaxEntriesReturned", &view.page_size.to_string())?;
                w.attribute("Offset", &view.offset.to_string())?;
                w.attribute("BasePoint", view.base_point.as_str())?;
                w.end_element()?;
            }
            ViewKind::Calendar(view) => {
                if view.end <= view.start {
                    return Err(anyhow!("calendar view must end after it starts"));
                }
                w.start_element("m", "CalendarView")?;
                if let Some(max) = view.max_entries {
                    w.attribute("MaxEntriesReturned", &max.to_string())?;
                }
                w.attribute("StartDate", &format_date_time(&view.start))?;
                w.attribute("EndDate", &format_date_time(&view.end))?;
                w.end_element()?;
            }
        }
        write_id_list(w, "ParentFolderIds", &self.parent_folder_ids, |w, id| id.write(w))?;
        if let Some(query) = &self.query_string {
            w.write_element_value("m", "QueryString", query)?;
        }
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, ctx: &RequestContext) -> Result<FindItemsResults> {
        let messages = checked_messages(content)?;
        let root = messages
            .first()
            .and_then(|m| m.child("RootFolder"))
            .ok_or_else(|| anyhow!("FindItem response has no RootFolder"))?;
        let items = items_in(root)
            .map(|node| read_item(node, &self.shape, ctx, true))
            .collect::<Result<Vec<_>>>()?;
        Ok(FindItemsResults {
            items,
            paging: PagingInfo::from_root_folder(root),
        })
    }
}

/// What happens to a message after `CreateItem`/`UpdateItem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    SaveOnly,
    SendOnly,
    SendAndSaveCopy,
}

impl MessageDisposition {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageDisposition::SaveOnly => "SaveOnly",
            MessageDisposition::SendOnly => "SendOnly",
            MessageDisposition::SendAndSaveCopy => "SendAndSaveCopy",
        }
    }
}

/// Meeting invitation / cancellation behaviour of calendar operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendInvitationsMode {
    SendToNone,
    SendOnlyToAll,
    SendOnlyToChanged,
    SendToAllAndSaveCopy,
    SendToChangedAndSaveCopy,
}

impl SendInvitationsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SendInvitationsMode::SendToNone => "SendToNone",
            SendInvitationsMode::SendOnlyToAll => "SendOnlyToAll",
            SendInvitationsMode::SendOnlyToChanged => "SendOnlyToChanged",
            SendInvitationsMode::SendToAllAndSaveCopy => "SendToAllAndSaveCopy",
            SendInvitationsMode::SendToChangedAndSaveCopy => "SendToChangedAndSaveCopy",
        }
    }

    fn is_update_only(self) -> bool {
        matches!(
            self,
            SendInvitationsMode::SendOnlyToChanged | SendInvitationsMode::SendToChangedAndSaveCopy
        )
    }
}

#[derive(Debug, Clone)]
pub struct CreateItem<'a> {
    pub items: Vec<&'a Item>,
    /// Target folder for saved items; the server default folder when unset.
    pub saved_item_folder: Option<FolderIdentity>,
    pub message_disposition: Option<MessageDisposition>,
    pub send_meeting_invitations: Option<SendInvitationsMode>,
}

impl<'a> CreateItem<'a> {
    pub fn new(items: Vec<&'a Item>) -> Self {
        Self {
            items,
            saved_item_folder: None,
            message_disposition: None,
            send_meeting_invitations: None,
        }
    }
}

impl ServiceRequest for CreateItem<'_> {
    type Response = Vec<Option<ServiceId>>;
    const NAME: &'static str = "CreateItem";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        if self.items.is_empty() {
            return Err(anyhow!("CreateItem needs at least one item"));
        }
        w.start_element("m", Self::NAME)?;
        if let Some(disposition) = self.message_disposition {
            w.attribute("MessageDisposition", disposition.as_str())?;
        }
        if let Some(mode) = self.send_meeting_invitations {
            if mode.is_update_only() {
                return Err(anyhow!("{} is only valid for updates", mode.as_str()));
            }
            w.attribute("SendMeetingInvitations", mode.as_str())?;
        }
        if let Some(folder) = &self.saved_item_folder {
            w.start_element("m", "SavedItemFolderId")?;
            folder.write(w)?;
            w.end_element()?;
        }
        w.start_element("m", "Items")?;
        for item in &self.items {
            if !item.is_new() {
                return Err(anyhow!("item already exists on the server"));
            }
            w.start_element("t", item.xml_element_name())?;
            item.bag().write_to_xml_for_create(w, item.schema())?;
            w.end_element()?;
        }
        w.end_element()?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<Self::Response> {
        returned_item_ids(content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictResolutionMode {
    NeverOverwrite,
    #[default]
    AutoResolve,
    AlwaysOverwrite,
}

impl ConflictResolutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictResolutionMode::NeverOverwrite => "NeverOverwrite",
            ConflictResolutionMode::AutoResolve => "AutoResolve",
            ConflictResolutionMode::AlwaysOverwrite => "AlwaysOverwrite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateItem<'a> {
    pub items: Vec<&'a Item>,
    pub conflict_resolution: ConflictResolutionMode,
    pub message_disposition: Option<MessageDisposition>,
    pub send_meeting_invitations_or_cancellations: Option<SendInvitationsMode>,
    pub saved_item_folder: Option<FolderIdentity>,
}

impl<'a> UpdateItem<'a> {
    pub fn new(items: Vec<&'a Item>) -> Self {
        Self {
            items,
            conflict_resolution: ConflictResolutionMode::AutoResolve,
            message_disposition: None,
            send_meeting_invitations_or_cancellations: None,
            saved_item_folder: None,
        }
    }
}

impl ServiceRequest for UpdateItem<'_> {
    type Response = Vec<Option<ServiceId>>;
    const NAME: &'static str = "UpdateItem";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        w.attribute("ConflictResolution", self.conflict_resolution.as_str())?;
        if let Some(disposition) = self.message_disposition {
            w.attribute("MessageDisposition", disposition.as_str())?;
        }
        if let Some(mode) = self.send_meeting_invitations_or_cancellations {
            w.attribute("SendMeetingInvitationsOrCancellations", mode.as_str())?;
        }
        if let Some(folder) = &self.saved_item_folder {
            w.start_element("m", "SavedItemFolderId")?;
            folder.write(w)?;
            w.end_element()?;
        }
        w.start_element("m", "ItemChanges")?;
        for item in &self.items {
            let id = item
                .id()?
                .ok_or_else(|| anyhow!("cannot update an item without an id"))?;
            w.start_element("t", "ItemChange")?;
            id.write(w, "ItemId")?;
            w.start_element("t", "Updates")?;
            item.bag().write_to_xml_for_update(
                w,
                item.schema(),
                item.xml_element_name(),
                "SetItemField",
                "DeleteItemField",
            )?;
            w.end_element()?;
            w.end_element()?;
        }
        w.end_element()?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<Self::Response> {
        returned_item_ids(content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffectedTaskOccurrences {
    AllOccurrences,
    SpecifiedOccurrenceOnly,
}

impl AffectedTaskOccurrences {
    pub fn as_str(self) -> &'static str {
        match self {
            AffectedTaskOccurrences::AllOccurrences => "AllOccurrences",
            AffectedTaskOccurrences::SpecifiedOccurrenceOnly => "SpecifiedOccurrenceOnly",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeleteItem {
    pub item_ids: Vec<ServiceId>,
    pub delete_mode: DeleteMode,
    pub send_meeting_cancellations: Option<SendInvitationsMode>,
    pub affected_task_occurrences: Option<AffectedTaskOccurrences>,
}

impl DeleteItem {
    pub fn new(item_ids: Vec<ServiceId>, delete_mode: DeleteMode) -> Self {
        Self {
            item_ids,
            delete_mode,
            send_meeting_cancellations: None,
            affected_task_occurrences: None,
        }
    }
}

impl ServiceRequest for DeleteItem {
    type Response = ();
    const NAME: &'static str = "DeleteItem";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        w.attribute("DeleteType", self.delete_mode.as_str())?;
        if let Some(mode) = self.send_meeting_cancellations {
            if mode.is_update_only() {
                return Err(anyhow!("{} is only valid for updates", mode.as_str()));
            }
            w.attribute("SendMeetingCancellations", mode.as_str())?;
        }
        if let Some(affected) = self.affected_task_occurrences {
            w.attribute("AffectedTaskOccurrences", affected.as_str())?;
        }
        write_item_ids(w, &self.item_ids)?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<()> {
        checked_messages(content)?;
        Ok(())
    }
}

