use anyhow::{Result, anyhow};

use crate::objects::{Folder, FolderIdentity, ServiceObject};
use crate::properties::{FOLDER_SCHEMA, ServiceId};
use crate::requests::response::checked_messages;
use crate::requests::{
    DeleteMode, OffsetBasePoint, PagingInfo, PropertySet, RequestContext, ServiceRequest,
    write_id_list,
};
use crate::xml::{EwsXmlWriter, XmlNode};

fn folders_in<'a>(message: &'a XmlNode) -> impl Iterator<Item = &'a XmlNode> + 'a {
    message
        .child("Folders")
        .into_iter()
        .flat_map(|folders| folders.children.iter())
}

fn returned_folder_ids(content: &XmlNode) -> Result<Vec<ServiceId>> {
    let mut ids = Vec::new();
    for message in checked_messages(content)? {
        for folder in folders_in(message) {
            if let Some(id) = folder.child("FolderId").and_then(ServiceId::from_node) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

#[derive(Debug, Clone)]
pub struct GetFolder {
    pub folder_ids: Vec<FolderIdentity>,
    pub shape: PropertySet,
}

impl ServiceRequest for GetFolder {
    type Response = Vec<Folder>;
    const NAME: &'static str = "GetFolder";

    fn write_body(&self, w: &mut EwsXmlWriter, ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        self.shape.write(w, "FolderShape", ctx.version, false)?;
        write_id_list(w, "FolderIds", &self.folder_ids, |w, id| id.write(w))?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, ctx: &RequestContext) -> Result<Vec<Folder>> {
        let requested = self.shape.requested(&FOLDER_SCHEMA, ctx.version, false);
        let mut out = Vec::new();
        for message in checked_messages(content)? {
            for node in folders_in(message) {
                out.push(Folder::from_xml(node, ctx.version, &requested)?);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderTraversal {
    #[default]
    Shallow,
    Deep,
    SoftDeleted,
}

impl FolderTraversal {
    pub fn as_str(self) -> &'static str {
        match self {
            FolderTraversal::Shallow => "Shallow",
            FolderTraversal::Deep => "Deep",
            FolderTraversal::SoftDeleted => "SoftDeleted",
        }
    }
}

/// `IndexedPageFolderView` paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderView {
    pub page_size: u32,
    pub offset: u32,
    pub base_point: OffsetBasePoint,
}

impl FolderView {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            offset: 0,
            base_point: OffsetBasePoint::Beginning,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FindFoldersResults {
    pub folders: Vec<Folder>,
    pub paging: PagingInfo,
}

#[derive(Debug, Clone)]
pub struct FindFolder {
    pub parent: FolderIdentity,
    pub shape: PropertySet,
    pub traversal: FolderTraversal,
    pub view: FolderView,
}

impl ServiceRequest for FindFolder {
    type Response = FindFoldersResults;
    const NAME: &'static str = "FindFolder";

    fn write_body(&self, w: &mut EwsXmlWriter, ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        w.attribute("Traversal", self.traversal.as_str())?;
        self.shape.write(w, "FolderShape", ctx.version, true)?;
        w.start_element("m", "IndexedPageFolderView")?;
        w.attribute("MaxEntriesReturned", &self.view.page_size.to_string())?;
        w.attribute("Offset", &self.view.offset.to_string())?;
        w.attribute("BasePoint", self.view.base_point.as_str())?;
        w.end_element()?;
        write_id_list(w, "ParentFolderIds", std::slice::from_ref(&self.parent), |w, id| {
            id.write(w)
        })?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, ctx: &RequestContext) -> Result<FindFoldersResults> {
        let requested = self.shape.requested(&FOLDER_SCHEMA, ctx.version, true);
        let messages = checked_messages(content)?;
        let root = messages
            .first()
            .and_then(|m| m.child("RootFolder"))
            .ok_or_else(|| anyhow!("FindFolder response has no RootFolder"))?;
        let folders = folders_in(root)
            .map(|node| Folder::from_xml(node, ctx.version, &requested))
            .collect::<Result<Vec<_>>>()?;
        Ok(FindFoldersResults {
            folders,
            paging: PagingInfo::from_root_folder(root),
        })
    }
}

/// Create new folders below `parent`.
#[derive(Debug, Clone)]
pub struct CreateFolder<'a> {
    pub parent: FolderIdentity,
    pub folders: Vec<&'a Folder>,
}

impl ServiceRequest for CreateFolder<'_> {
    type Response = Vec<ServiceId>;
    const NAME: &'static str = "CreateFolder";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        w.start_element("m", "ParentFolderId")?;
        self.parent.write(w)?;
        w.end_element()?;
        w.start_element("m", "Folders")?;
        for folder in &self.folders {
            if !folder.is_new() {
                return Err(anyhow!("folder already exists on the server"));
            }
            w.start_element("t", folder.xml_element_name())?;
            folder.bag().write_to_xml_for_create(w, folder.schema())?;
            w.end_element()?;
        }
        w.end_element()?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<Vec<ServiceId>> {
        returned_folder_ids(content)
    }
}

/// Push the change log of existing folders.
#[derive(Debug, Clone)]
pub struct UpdateFolder<'a> {
    pub folders: Vec<&'a Folder>,
}

impl ServiceRequest for UpdateFolder<'_> {
    type Response = Vec<ServiceId>;
    const NAME: &'static str = "UpdateFolder";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        w.start_element("m", "FolderChanges")?;
        for folder in &self.folders {
            let id = folder
                .id()?
                .ok_or_else(|| anyhow!("cannot update a folder without an id"))?;
            w.start_element("t", "FolderChange")?;
            id.write(w, "FolderId")?;
            w.start_element("t", "Updates")?;
            folder.bag().write_to_xml_for_update(
                w,
                folder.schema(),
                folder.xml_element_name(),
                "SetFolderField",
                "DeleteFolderField",
            )?;
            w.end_element()?;
            w.end_element()?;
        }
        w.end_element()?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<Vec<ServiceId>> {
        returned_folder_ids(content)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteFolder {
    pub folder_ids: Vec<FolderIdentity>,
    pub delete_mode: DeleteMode,
}

impl ServiceRequest for DeleteFolder {
    type Response = ();
    const NAME: &'static str = "DeleteFolder";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        w.start_element("m", Self::NAME)?;
        w.attribute("DeleteType", self.delete_mode.as_str())?;
        write_id_list(w, "FolderIds", &self.folder_ids, |w, id| id.write(w))?;
        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<()> {
        checked_messages(content)?;
        Ok(())
    }
}
