use crate::util::{LiveServer, unique_name};
use chrono::{Duration, Utc};
use fast_ews_rs::properties::EmailAddress;
use fast_ews_rs::requests::{
    AttendeeInfo, CalendarView, ConflictResolutionMode, DeleteMode, FolderTraversal, FolderView,
    FreeBusyViewType, ItemView, PropertySet,
};
use fast_ews_rs::{Folder, FolderKind, Item, ItemKind, ServiceObject, WellKnownFolderName};

macro_rules! live_server {
    () => {
        match LiveServer::from_env() {
            Some(server) => server,
            None => {
                println!("EWS_E2E_URL / EWS_E2E_USER / EWS_E2E_PASSWORD not set, skipping");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_bind_inbox() {
    let server = live_server!();
    let service = server.service();

    let inbox = service
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::first_class())
        .await
        .expect("Failed to bind the inbox");
    assert!(inbox.id().expect("id is first class").is_some());
    assert!(inbox.total_count().expect("count is first class").is_some());
    assert!(service.server_info().is_some());
}

#[tokio::test]
async fn test_folder_lifecycle() {
    let server = live_server!();
    let service = server.service();
    let version = service.config().requested_version;

    let name = unique_name("e2e_folder");
    let mut folder = Folder::new(FolderKind::Folder, version);
    folder.set_display_name(name.as_str()).expect("DisplayName is settable");
    service
        .create_folder(&mut folder, WellKnownFolderName::MsgFolderRoot)
        .await
        .expect("Failed to create folder");

    let renamed = format!("{name}_renamed");
    folder.set_display_name(renamed.as_str()).expect("DisplayName is updatable");
    service.update_folder(&mut folder).await.expect("Failed to rename folder");

    let found = service
        .find_folders(
            WellKnownFolderName::MsgFolderRoot,
            FolderTraversal::Shallow,
            FolderView::new(200),
        )
        .await
        .expect("Failed to list folders");
    assert!(
        found
            .folders
            .iter()
            .any(|f| f.display_name().ok().flatten() == Some(renamed.as_str()))
    );

    let id = folder.id().expect("id known").cloned().expect("id assigned");
    service
        .delete_folder(id, DeleteMode::HardDelete)
        .await
        .expect("Failed to delete folder");
}

#[tokio::test]
async fn test_draft_lifecycle() {
    let server = live_server!();
    let service = server.service();
    let version = service.config().requested_version;

    let subject = unique_name("e2e_draft");
    let mut draft = Item::new(ItemKind::Message, version);
    draft.set_subject(subject.as_str()).expect("Subject is settable");
    draft
        .add_to_recipient(EmailAddress::new(server.user.as_str()))
        .expect("ToRecipients is settable");
    service
        .create_item(&mut draft, Some(WellKnownFolderName::Drafts.into()), None, None)
        .await
        .expect("Failed to save draft");
    assert!(!draft.is_new());

    draft
        .set_subject(format!("{subject} (edited)"))
        .expect("Subject is updatable");
    service
        .update_item(&mut draft, ConflictResolutionMode::AutoResolve)
        .await
        .expect("Failed to update draft");

    let id = draft.id().expect("id known").cloned().expect("id assigned");
    let fetched = service
        .bind_item(id.clone(), PropertySet::first_class())
        .await
        .expect("Failed to bind draft");
    assert_eq!(
        fetched.subject().expect("Subject is first class"),
        Some(format!("{subject} (edited)").as_str())
    );

    let page = service
        .find_items(WellKnownFolderName::Drafts, ItemView::new(50), None)
        .await
        .expect("Failed to list drafts");
    assert!(page.items.iter().any(|item| item.id().ok().flatten() == Some(&id)));

    service
        .delete_items(vec![id], DeleteMode::HardDelete)
        .await
        .expect("Failed to delete draft");
}

#[tokio::test]
async fn test_calendar_and_availability() {
    let server = live_server!();
    let service = server.service();

    let start = Utc::now();
    let end = start + Duration::days(7);
    service
        .find_appointments(
            WellKnownFolderName::Calendar,
            CalendarView {
                start,
                end,
                max_entries: Some(100),
            },
        )
        .await
        .expect("Failed to expand calendar view");

    let availability = service
        .get_user_availability(
            vec![AttendeeInfo::new(server.user.as_str())],
            start,
            end,
            FreeBusyViewType::FreeBusyMerged,
        )
        .await
        .expect("Failed to query availability");
    assert_eq!(availability.len(), 1);
}
