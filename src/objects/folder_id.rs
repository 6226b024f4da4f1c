use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::properties::ServiceId;
use crate::xml::EwsXmlWriter;

/// Folders every mailbox has, addressed by `DistinguishedFolderId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellKnownFolderName {
    Calendar,
    Contacts,
    DeletedItems,
    Drafts,
    Inbox,
    Journal,
    Notes,
    Outbox,
    SentItems,
    Tasks,
    MsgFolderRoot,
    Root,
    JunkEmail,
    SearchFolders,
    VoiceMail,
}

impl WellKnownFolderName {
    pub fn as_str(self) -> &'static str {
        match self {
            WellKnownFolderName::Calendar => "calendar",
            WellKnownFolderName::Contacts => "contacts",
            WellKnownFolderName::DeletedItems => "deleteditems",
            WellKnownFolderName::Drafts => "drafts",
            WellKnownFolderName::Inbox => "inbox",
            WellKnownFolderName::Journal => "journal",
            WellKnownFolderName::Notes => "notes",
            WellKnownFolderName::Outbox => "outbox",
            WellKnownFolderName::SentItems => "sentitems",
            WellKnownFolderName::Tasks => "tasks",
            WellKnownFolderName::MsgFolderRoot => "msgfolderroot",
            WellKnownFolderName::Root => "root",
            WellKnownFolderName::JunkEmail => "junkemail",
            WellKnownFolderName::SearchFolders => "searchfolders",
            WellKnownFolderName::VoiceMail => "voicemail",
        }
    }
}

impl fmt::Display for WellKnownFolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellKnownFolderName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        const ALL: [WellKnownFolderName; 15] = [
            WellKnownFolderName::Calendar,
            WellKnownFolderName::Contacts,
            WellKnownFolderName::DeletedItems,
            WellKnownFolderName::Drafts,
            WellKnownFolderName::Inbox,
            WellKnownFolderName::Journal,
            WellKnownFolderName::Notes,
            WellKnownFolderName::Outbox,
            WellKnownFolderName::SentItems,
            WellKnownFolderName::Tasks,
            WellKnownFolderName::MsgFolderRoot,
            WellKnownFolderName::Root,
            WellKnownFolderName::JunkEmail,
            WellKnownFolderName::SearchFolders,
            WellKnownFolderName::VoiceMail,
        ];
        ALL.into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown well-known folder {s:?}"))
    }
}

/// How a request names a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderIdentity {
    Id(ServiceId),
    /// A well-known folder, optionally in another mailbox.
    Distinguished {
        name: WellKnownFolderName,
        mailbox: Option<String>,
    },
}

impl FolderIdentity {
    pub fn well_known(name: WellKnownFolderName) -> Self {
        FolderIdentity::Distinguished { name, mailbox: None }
    }

    pub fn in_mailbox(name: WellKnownFolderName, mailbox: impl Into<String>) -> Self {
        FolderIdentity::Distinguished {
            name,
            mailbox: Some(mailbox.into()),
        }
    }

    /// `<t:FolderId/>` or `<t:DistinguishedFolderId/>`.
    pub fn write(&self, w: &mut EwsXmlWriter) -> Result<()> {
        match self {
            FolderIdentity::Id(id) => id.write(w, "FolderId"),
            FolderIdentity::Distinguished { name, mailbox } => {
                w.start_element("t", "DistinguishedFolderId")?;
                w.attribute("Id", name.as_str())?;
                if let Some(address) = mailbox {
                    w.start_element("t", "Mailbox")?;
                    w.write_element_value("t", "EmailAddress", address)?;
                    w.end_element()?;
                }
                w.end_element()
            }
        }
    }
}

impl From<WellKnownFolderName> for FolderIdentity {
    fn from(name: WellKnownFolderName) -> Self {
        FolderIdentity::well_known(name)
    }
}

impl From<ServiceId> for FolderIdentity {
    fn from(id: ServiceId) -> Self {
        FolderIdentity::Id(id)
    }
}
