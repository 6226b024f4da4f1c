//! Static property schemas for folders and the item family.
//!
//! Definitions are listed in the order the EWS types schema declares the
//! elements; serialization walks them in that order.

use std::sync::LazyLock;

use crate::properties::definition::{PropertyDefinition, PropertyFlags as F, PropertyKind as K};
use crate::version::ExchangeVersion;

const COLLECTION: F = F::CAN_SET
    .union(F::CAN_UPDATE)
    .union(F::CAN_DELETE)
    .union(F::AUTO_INSTANTIATE_ON_READ)
    .union(F::REUSE_INSTANCE);

pub const SENSITIVITY: &[&str] = &["Normal", "Personal", "Private", "Confidential"];
pub const IMPORTANCE: &[&str] = &["Low", "Normal", "High"];
pub const FREE_BUSY: &[&str] = &["Free", "Tentative", "Busy", "OOF", "WorkingElsewhere", "NoData"];
pub const CALENDAR_ITEM_TYPE: &[&str] = &["Single", "Occurrence", "Exception", "RecurringMaster"];
pub const RESPONSE_TYPE: &[&str] = &[
    "Unknown",
    "Organizer",
    "Tentative",
    "Accept",
    "Decline",
    "NoResponseReceived",
];

pub mod folder {
    use super::*;

    pub static FOLDER_ID: PropertyDefinition =
        PropertyDefinition::new("FolderId", "folder:FolderId", K::FolderId, F::CAN_FIND);
    pub static PARENT_FOLDER_ID: PropertyDefinition =
        PropertyDefinition::new("ParentFolderId", "folder:ParentFolderId", K::FolderId, F::CAN_FIND);
    pub static FOLDER_CLASS: PropertyDefinition =
        PropertyDefinition::new("FolderClass", "folder:FolderClass", K::String, F::EDITABLE);
    pub static DISPLAY_NAME: PropertyDefinition = PropertyDefinition::new(
        "DisplayName",
        "folder:DisplayName",
        K::String,
        F::EDITABLE_DELETABLE,
    );
    pub static TOTAL_COUNT: PropertyDefinition =
        PropertyDefinition::new("TotalCount", "folder:TotalCount", K::Integer, F::CAN_FIND);
    pub static CHILD_FOLDER_COUNT: PropertyDefinition = PropertyDefinition::new(
        "ChildFolderCount",
        "folder:ChildFolderCount",
        K::Integer,
        F::CAN_FIND,
    );
    pub static UNREAD_COUNT: PropertyDefinition =
        PropertyDefinition::new("UnreadCount", "folder:UnreadCount", K::Integer, F::CAN_FIND);
}

pub mod item {
    use super::*;

    pub static ITEM_ID: PropertyDefinition =
        PropertyDefinition::new("ItemId", "item:ItemId", K::ItemId, F::CAN_FIND);
    pub static PARENT_FOLDER_ID: PropertyDefinition =
        PropertyDefinition::new("ParentFolderId", "item:ParentFolderId", K::FolderId, F::CAN_FIND);
    pub static ITEM_CLASS: PropertyDefinition =
        PropertyDefinition::new("ItemClass", "item:ItemClass", K::String, F::EDITABLE);
    pub static SUBJECT: PropertyDefinition =
        PropertyDefinition::new("Subject", "item:Subject", K::String, F::EDITABLE_DELETABLE);
    pub static SENSITIVITY: PropertyDefinition = PropertyDefinition::new(
        "Sensitivity",
        "item:Sensitivity",
        K::Enum(super::SENSITIVITY),
        F::EDITABLE,
    );
    pub static BODY: PropertyDefinition = PropertyDefinition::new(
        "Body",
        "item:Body",
        K::Body,
        F::CAN_SET.union(F::CAN_UPDATE).union(F::CAN_DELETE),
    );
    pub static DATE_TIME_RECEIVED: PropertyDefinition = PropertyDefinition::new(
        "DateTimeReceived",
        "item:DateTimeReceived",
        K::DateTime,
        F::CAN_FIND,
    );
    pub static SIZE: PropertyDefinition =
        PropertyDefinition::new("Size", "item:Size", K::Integer, F::CAN_FIND);
    pub static CATEGORIES: PropertyDefinition = PropertyDefinition::new(
        "Categories",
        "item:Categories",
        K::StringList,
        super::COLLECTION.union(F::CAN_FIND),
    );
    pub static IMPORTANCE: PropertyDefinition = PropertyDefinition::new(
        "Importance",
        "item:Importance",
        K::Enum(super::IMPORTANCE),
        F::EDITABLE,
    );
    pub static IN_REPLY_TO: PropertyDefinition =
        PropertyDefinition::new("InReplyTo", "item:InReplyTo", K::String, F::EDITABLE_DELETABLE);
    pub static IS_DRAFT: PropertyDefinition =
        PropertyDefinition::new("IsDraft", "item:IsDraft", K::Boolean, F::CAN_FIND);
    pub static DATE_TIME_SENT: PropertyDefinition =
        PropertyDefinition::new("DateTimeSent", "item:DateTimeSent", K::DateTime, F::CAN_FIND);
    pub static DATE_TIME_CREATED: PropertyDefinition = PropertyDefinition::new(
        "DateTimeCreated",
        "item:DateTimeCreated",
        K::DateTime,
        F::CAN_FIND,
    );
    pub static REMINDER_IS_SET: PropertyDefinition =
        PropertyDefinition::new("ReminderIsSet", "item:ReminderIsSet", K::Boolean, F::EDITABLE);
    pub static REMINDER_MINUTES_BEFORE_START: PropertyDefinition = PropertyDefinition::new(
        "ReminderMinutesBeforeStart",
        "item:ReminderMinutesBeforeStart",
        K::Integer,
        F::EDITABLE,
    );
    pub static DISPLAY_TO: PropertyDefinition =
        PropertyDefinition::new("DisplayTo", "item:DisplayTo", K::String, F::CAN_FIND);
    pub static HAS_ATTACHMENTS: PropertyDefinition =
        PropertyDefinition::new("HasAttachments", "item:HasAttachments", K::Boolean, F::CAN_FIND);
    pub static LAST_MODIFIED_TIME: PropertyDefinition = PropertyDefinition::new(
        "LastModifiedTime",
        "item:LastModifiedTime",
        K::DateTime,
        F::CAN_FIND,
    )
    .since(ExchangeVersion::Exchange2010);
    pub static UNIQUE_BODY: PropertyDefinition = PropertyDefinition::new(
        "UniqueBody",
        "item:UniqueBody",
        K::Body,
        F::MUST_BE_EXPLICITLY_LOADED,
    )
    .since(ExchangeVersion::Exchange2010);
}

pub mod message {
    use super::*;

    pub static SENDER: PropertyDefinition = PropertyDefinition::new(
        "Sender",
        "message:Sender",
        K::EmailAddress,
        F::EDITABLE_DELETABLE,
    );
    pub static TO_RECIPIENTS: PropertyDefinition = PropertyDefinition::new(
        "ToRecipients",
        "message:ToRecipients",
        K::EmailAddressCollection,
        super::COLLECTION,
    );
    pub static CC_RECIPIENTS: PropertyDefinition = PropertyDefinition::new(
        "CcRecipients",
        "message:CcRecipients",
        K::EmailAddressCollection,
        super::COLLECTION,
    );
    pub static BCC_RECIPIENTS: PropertyDefinition = PropertyDefinition::new(
        "BccRecipients",
        "message:BccRecipients",
        K::EmailAddressCollection,
        super::COLLECTION,
    );
    pub static IS_READ_RECEIPT_REQUESTED: PropertyDefinition = PropertyDefinition::new(
        "IsReadReceiptRequested",
        "message:IsReadReceiptRequested",
        K::Boolean,
        F::EDITABLE,
    );
    pub static CONVERSATION_TOPIC: PropertyDefinition = PropertyDefinition::new(
        "ConversationTopic",
        "message:ConversationTopic",
        K::String,
        F::CAN_FIND,
    );
    pub static FROM: PropertyDefinition = PropertyDefinition::new(
        "From",
        "message:From",
        K::EmailAddress,
        F::EDITABLE_DELETABLE,
    );
    pub static INTERNET_MESSAGE_ID: PropertyDefinition = PropertyDefinition::new(
        "InternetMessageId",
        "message:InternetMessageId",
        K::String,
        F::CAN_FIND,
    );
    pub static IS_READ: PropertyDefinition =
        PropertyDefinition::new("IsRead", "message:IsRead", K::Boolean, F::EDITABLE);
}

pub mod calendar {
    use super::*;

    pub static UID: PropertyDefinition =
        PropertyDefinition::new("UID", "calendar:UID", K::String, F::EDITABLE_DELETABLE);
    pub static START: PropertyDefinition =
        PropertyDefinition::new("Start", "calendar:Start", K::DateTime, F::EDITABLE);
    pub static END: PropertyDefinition =
        PropertyDefinition::new("End", "calendar:End", K::DateTime, F::EDITABLE);
    pub static IS_ALL_DAY_EVENT: PropertyDefinition = PropertyDefinition::new(
        "IsAllDayEvent",
        "calendar:IsAllDayEvent",
        K::Boolean,
        F::EDITABLE,
    );
    pub static LEGACY_FREE_BUSY_STATUS: PropertyDefinition = PropertyDefinition::new(
        "LegacyFreeBusyStatus",
        "calendar:LegacyFreeBusyStatus",
        K::Enum(super::FREE_BUSY),
        F::EDITABLE,
    );
    pub static LOCATION: PropertyDefinition = PropertyDefinition::new(
        "Location",
        "calendar:Location",
        K::String,
        F::EDITABLE_DELETABLE,
    );
    pub static IS_MEETING: PropertyDefinition =
        PropertyDefinition::new("IsMeeting", "calendar:IsMeeting", K::Boolean, F::CAN_FIND);
    pub static IS_CANCELLED: PropertyDefinition =
        PropertyDefinition::new("IsCancelled", "calendar:IsCancelled", K::Boolean, F::CAN_FIND);
    pub static CALENDAR_ITEM_TYPE: PropertyDefinition = PropertyDefinition::new(
        "CalendarItemType",
        "calendar:CalendarItemType",
        K::Enum(super::CALENDAR_ITEM_TYPE),
        F::CAN_FIND,
    );
    pub static MY_RESPONSE_TYPE: PropertyDefinition = PropertyDefinition::new(
        "MyResponseType",
        "calendar:MyResponseType",
        K::Enum(super::RESPONSE_TYPE),
        F::CAN_FIND,
    );
    pub static ORGANIZER: PropertyDefinition =
        PropertyDefinition::new("Organizer", "calendar:Organizer", K::EmailAddress, F::CAN_FIND);
    pub static REQUIRED_ATTENDEES: PropertyDefinition = PropertyDefinition::new(
        "RequiredAttendees",
        "calendar:RequiredAttendees",
        K::Attendees,
        super::COLLECTION,
    );
    pub static OPTIONAL_ATTENDEES: PropertyDefinition = PropertyDefinition::new(
        "OptionalAttendees",
        "calendar:OptionalAttendees",
        K::Attendees,
        super::COLLECTION,
    );
}

pub mod contact {
    use super::*;

    pub static FILE_AS: PropertyDefinition =
        PropertyDefinition::new("FileAs", "contacts:FileAs", K::String, F::EDITABLE_DELETABLE);
    pub static DISPLAY_NAME: PropertyDefinition = PropertyDefinition::new(
        "DisplayName",
        "contacts:DisplayName",
        K::String,
        F::EDITABLE_DELETABLE,
    );
    pub static GIVEN_NAME: PropertyDefinition = PropertyDefinition::new(
        "GivenName",
        "contacts:GivenName",
        K::String,
        F::EDITABLE_DELETABLE,
    );
    pub static COMPANY_NAME: PropertyDefinition = PropertyDefinition::new(
        "CompanyName",
        "contacts:CompanyName",
        K::String,
        F::EDITABLE_DELETABLE,
    );
    pub static JOB_TITLE: PropertyDefinition =
        PropertyDefinition::new("JobTitle", "contacts:JobTitle", K::String, F::EDITABLE_DELETABLE);
    pub static SURNAME: PropertyDefinition =
        PropertyDefinition::new("Surname", "contacts:Surname", K::String, F::EDITABLE_DELETABLE);
}

/// An ordered set of property definitions for one object type.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    definitions: Vec<&'static PropertyDefinition>,
}

impl Schema {
    pub fn new(name: &'static str, definitions: Vec<&'static PropertyDefinition>) -> Self {
        Self { name, definitions }
    }

    /// `base` followed by `extra`, keeping both orders.
    fn extend(name: &'static str, base: &Schema, extra: &[&'static PropertyDefinition]) -> Self {
        let mut definitions = base.definitions.clone();
        definitions.extend_from_slice(extra);
        Self { name, definitions }
    }

    pub fn find(&self, xml_name: &str) -> Option<&'static PropertyDefinition> {
        self.definitions
            .iter()
            .copied()
            .find(|d| d.xml_name == xml_name)
    }

    pub fn find_by_uri(&self, field_uri: &str) -> Option<&'static PropertyDefinition> {
        self.definitions
            .iter()
            .copied()
            .find(|d| d.field_uri == field_uri)
    }

    pub fn contains(&self, def: &PropertyDefinition) -> bool {
        self.definitions.iter().any(|d| std::ptr::eq(*d, def))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static PropertyDefinition> + '_ {
        self.definitions.iter().copied()
    }

    /// Definitions loaded by the `Default` and `AllProperties` shapes.
    pub fn first_class(&self) -> impl Iterator<Item = &'static PropertyDefinition> + '_ {
        self.iter().filter(|d| d.is_first_class())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

pub static FOLDER_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    use folder::*;
    Schema::new(
        "Folder",
        vec![
            &FOLDER_ID,
            &PARENT_FOLDER_ID,
            &FOLDER_CLASS,
            &DISPLAY_NAME,
            &TOTAL_COUNT,
            &CHILD_FOLDER_COUNT,
            &UNREAD_COUNT,
        ],
    )
});

pub static ITEM_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    use item::*;
    Schema::new(
        "Item",
        vec![
            &ITEM_ID,
            &PARENT_FOLDER_ID,
            &ITEM_CLASS,
            &SUBJECT,
            &SENSITIVITY,
            &BODY,
            &DATE_TIME_RECEIVED,
            &SIZE,
            &CATEGORIES,
            &IMPORTANCE,
            &IN_REPLY_TO,
            &IS_DRAFT,
            &DATE_TIME_SENT,
            &DATE_TIME_CREATED,
            &REMINDER_IS_SET,
            &REMINDER_MINUTES_BEFORE_START,
            &DISPLAY_TO,
            &HAS_ATTACHMENTS,
            &LAST_MODIFIED_TIME,
            &UNIQUE_BODY,
        ],
    )
});

pub static MESSAGE_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    use message::*;
    Schema::extend(
        "Message",
        &ITEM_SCHEMA,
        &[
            &SENDER,
            &TO_RECIPIENTS,
            &CC_RECIPIENTS,
            &BCC_RECIPIENTS,
            &IS_READ_RECEIPT_REQUESTED,
            &CONVERSATION_TOPIC,
            &FROM,
            &INTERNET_MESSAGE_ID,
            &IS_READ,
        ],
    )
});

pub static APPOINTMENT_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    use calendar::*;
    Schema::extend(
        "CalendarItem",
        &ITEM_SCHEMA,
        &[
            &UID,
            &START,
            &END,
            &IS_ALL_DAY_EVENT,
            &LEGACY_FREE_BUSY_STATUS,
            &LOCATION,
            &IS_MEETING,
            &IS_CANCELLED,
            &CALENDAR_ITEM_TYPE,
            &MY_RESPONSE_TYPE,
            &ORGANIZER,
            &REQUIRED_ATTENDEES,
            &OPTIONAL_ATTENDEES,
        ],
    )
});

pub static CONTACT_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    use contact::*;
    Schema::extend(
        "Contact",
        &ITEM_SCHEMA,
        &[
            &FILE_AS,
            &DISPLAY_NAME,
            &GIVEN_NAME,
            &COMPANY_NAME,
            &JOB_TITLE,
            &SURNAME,
        ],
    )
});
