use crate::support::{EWS_URL, MockTransport, soap_fault, soap_response, test_config};
use chrono::{TimeZone, Utc};
use fast_ews_rs::properties::EmailAddress;
use fast_ews_rs::requests::{
    CalendarView, ConflictResolutionMode, DeleteMode, FolderTraversal, FolderView, FreeBusyViewType,
    GetItem, ItemView, PropertySet, AttendeeInfo,
};
use fast_ews_rs::soap::ImpersonatedUserId;
use fast_ews_rs::{
    ClientConfig, EwsError, ExchangeCredentials, ExchangeService, ExchangeVersion, Folder,
    FolderKind, Item, ItemKind, ServiceId, ServiceObject, WellKnownFolderName,
};
use hyper::{StatusCode, header};
use std::sync::Arc;

fn service(transport: &Arc<MockTransport>, config: ClientConfig) -> ExchangeService {
    let mut service = ExchangeService::with_transport(transport.clone(), config);
    service.set_url(EWS_URL).unwrap();
    service.set_credentials(ExchangeCredentials::basic("jane@contoso.com", "secret"));
    service
}

/// A one-message operation response.
fn response(operation: &str, inner: &str) -> String {
    soap_response(&format!(
        r#"<m:{operation}Response><m:ResponseMessages>
             <m:{operation}ResponseMessage ResponseClass="Success">
               <m:ResponseCode>NoError</m:ResponseCode>{inner}
             </m:{operation}ResponseMessage>
           </m:ResponseMessages></m:{operation}Response>"#
    ))
}

fn error_response(operation: &str, code: &str) -> String {
    soap_response(&format!(
        r#"<m:{operation}Response><m:ResponseMessages>
             <m:{operation}ResponseMessage ResponseClass="Error">
               <m:MessageText>Request failed.</m:MessageText>
               <m:ResponseCode>{code}</m:ResponseCode>
             </m:{operation}ResponseMessage>
           </m:ResponseMessages></m:{operation}Response>"#
    ))
}

fn inbox_response() -> String {
    response(
        "GetFolder",
        r#"<m:Folders><t:Folder>
             <t:FolderId Id="INBOX1" ChangeKey="AQ"/>
             <t:DisplayName>Inbox</t:DisplayName>
             <t:TotalCount>3</t:TotalCount>
             <t:ChildFolderCount>0</t:ChildFolderCount>
             <t:UnreadCount>1</t:UnreadCount>
           </t:Folder></m:Folders>"#,
    )
}

#[tokio::test]
async fn test_request_headers_and_envelope() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &inbox_response());

    let inbox = service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::first_class())
        .await
        .expect("GetFolder succeeds");
    assert_eq!(inbox.display_name().unwrap(), Some("Inbox"));
    assert_eq!(inbox.unread_count().unwrap(), Some(1));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.url, EWS_URL);
    assert_eq!(
        sent.headers.get(header::CONTENT_TYPE).unwrap(),
        "text/xml; charset=utf-8"
    );
    assert!(
        sent.headers
            .get(header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("Basic ")
    );
    assert!(sent.headers.contains_key(header::USER_AGENT));
    assert!(sent.headers.contains_key(header::ACCEPT_ENCODING));
    assert!(sent.body.contains(r#"<t:RequestServerVersion Version="Exchange2013_SP1"/>"#));
    assert!(sent.body.contains(r#"<t:DistinguishedFolderId Id="inbox"/>"#));
}

#[tokio::test]
async fn test_server_version_is_recorded() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &inbox_response());

    let service = service(&transport, test_config());
    assert!(service.server_info().is_none());
    service
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .unwrap();

    let info = service.server_info().expect("recorded from the SOAP header");
    assert_eq!(info.major_version, 15);
    assert_eq!(info.minor_build_number, 2);
    // Clones share what the original saw.
    assert_eq!(service.clone().server_info(), Some(info));
}

#[tokio::test]
async fn test_impersonation_and_time_zone_are_sent() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &inbox_response());

    let mut service = service(&transport, test_config());
    service.set_impersonated_user(Some(ImpersonatedUserId::smtp("room1@contoso.com")));
    service.set_time_zone_id(Some("Pacific Standard Time".into()));
    service
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .unwrap();

    let body = transport.last_body();
    assert!(body.contains("<t:PrimarySmtpAddress>room1@contoso.com</t:PrimarySmtpAddress>"));
    assert!(body.contains(r#"<t:TimeZoneDefinition Id="Pacific Standard Time"/>"#));
}

#[tokio::test]
async fn test_unauthorized_is_typed() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 401, "");

    let err = service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect_err("credentials rejected");
    assert!(matches!(EwsError::find(&err), Some(EwsError::Unauthorized)));
}

#[tokio::test]
async fn test_busy_server_is_retried() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 500, &soap_fault("ErrorServerBusy", Some(30_000)));
    transport.respond(EWS_URL, 200, &inbox_response());

    let started = std::time::Instant::now();
    let inbox = service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::first_class())
        .await
        .expect("second attempt succeeds");

    assert_eq!(inbox.display_name().unwrap(), Some("Inbox"));
    assert_eq!(transport.requests().len(), 2);
    // The 30 s hint is clamped by max_backoff_ms.
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn test_busy_retries_are_bounded() {
    let transport = MockTransport::new();
    for _ in 0..5 {
        transport.respond(EWS_URL, 500, &soap_fault("ErrorServerBusy", None));
    }
    let config = ClientConfig {
        max_backoff_retries: 2,
        ..test_config()
    };

    let err = service(&transport, config)
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect_err("server stays busy");

    assert_eq!(transport.requests().len(), 3);
    match EwsError::find(&err) {
        Some(EwsError::SoapFault(fault)) => assert!(fault.is_server_busy()),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_other_faults_are_not_retried() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 500, &soap_fault("ErrorInvalidRequest", None));
    transport.respond(EWS_URL, 200, &inbox_response());

    let err = service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect_err("invalid request");

    assert_eq!(transport.requests().len(), 1);
    match EwsError::find(&err) {
        Some(EwsError::SoapFault(fault)) => {
            assert_eq!(fault.response_code.as_deref(), Some("ErrorInvalidRequest"))
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_fault_inside_success_status_is_handled() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &soap_fault("ErrorServerBusy", Some(10)));
    transport.respond(EWS_URL, 200, &inbox_response());

    service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect("busy fault in a 200 is retried too");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_http_error_without_fault() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 503, "Service Unavailable");

    let err = service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect_err("gateway error");
    match EwsError::find(&err) {
        Some(EwsError::HttpStatus { status, body }) => {
            assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let transport = MockTransport::new();
    transport.fail(EWS_URL, "connection reset by peer");

    let err = service(&transport, test_config())
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect_err("network down");
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn test_request_newer_than_requested_version() {
    let transport = MockTransport::new();
    let config = ClientConfig {
        requested_version: ExchangeVersion::Exchange2007Sp1,
        ..test_config()
    };

    let err = service(&transport, config)
        .find_items(WellKnownFolderName::Inbox, ItemView::new(10), Some("from:bob".into()))
        .await
        .expect_err("AQS needs Exchange 2010");
    assert!(matches!(
        EwsError::find(&err),
        Some(EwsError::RequestVersion {
            request: "FindItem",
            required: ExchangeVersion::Exchange2010
        })
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_missing_url_is_reported() {
    let transport = MockTransport::new();
    let service = ExchangeService::with_transport(transport.clone(), test_config());

    let err = service
        .bind_folder(WellKnownFolderName::Inbox, PropertySet::id_only())
        .await
        .expect_err("no URL");
    assert!(err.to_string().contains("EWS URL is not set"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_service_response_error_is_typed() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &error_response("GetItem", "ErrorItemNotFound"));

    let err = service(&transport, test_config())
        .bind_item(ServiceId::new("gone"), PropertySet::first_class())
        .await
        .expect_err("item missing");
    match EwsError::find(&err) {
        Some(EwsError::ServiceResponse(resp)) => assert_eq!(resp.code, "ErrorItemNotFound"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_create_then_update_sends_only_changes() {
    let transport = MockTransport::new();
    transport.respond(
        EWS_URL,
        200,
        &response(
            "CreateItem",
            r#"<m:Items><t:Message><t:ItemId Id="MSG1" ChangeKey="CK1"/></t:Message></m:Items>"#,
        ),
    );
    transport.respond(
        EWS_URL,
        200,
        &response(
            "UpdateItem",
            r#"<m:Items><t:Message><t:ItemId Id="MSG1" ChangeKey="CK2"/></t:Message></m:Items>"#,
        ),
    );

    let service = service(&transport, test_config());
    let mut draft = Item::new(ItemKind::Message, ExchangeVersion::Exchange2013Sp1);
    draft.set_subject("Quarterly numbers").unwrap();
    draft.add_to_recipient(EmailAddress::new("bob@contoso.com")).unwrap();

    service
        .create_item(&mut draft, Some(WellKnownFolderName::Drafts.into()), None, None)
        .await
        .expect("created");
    assert!(!draft.is_new());
    assert!(!draft.is_dirty());
    assert_eq!(draft.id().unwrap(), Some(&ServiceId::with_change_key("MSG1", "CK1")));
    let create_body = transport.last_body();
    assert!(create_body.contains("<t:Subject>Quarterly numbers</t:Subject>"));
    assert!(create_body.contains(r#"<t:DistinguishedFolderId Id="drafts"/>"#));

    draft.set_subject("Quarterly numbers (final)").unwrap();
    service
        .update_item(&mut draft, ConflictResolutionMode::AutoResolve)
        .await
        .expect("updated");

    let update_body = transport.last_body();
    assert!(update_body.contains(
        r#"<m:UpdateItem ConflictResolution="AutoResolve" MessageDisposition="SaveOnly">"#
    ));
    assert!(update_body.contains(r#"<t:ItemId Id="MSG1" ChangeKey="CK1"/>"#));
    assert!(update_body.contains(r#"<t:FieldURI FieldURI="item:Subject"/>"#));
    assert!(!update_body.contains("ToRecipients"));
    assert!(!draft.is_dirty());
    assert_eq!(draft.id().unwrap(), Some(&ServiceId::with_change_key("MSG1", "CK2")));

    // Nothing changed: nothing is sent.
    service
        .update_item(&mut draft, ConflictResolutionMode::AutoResolve)
        .await
        .unwrap();
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_send_message_requires_a_new_item() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &response("CreateItem", "<m:Items/>"));

    let service = service(&transport, test_config());
    let mut mail = Item::new(ItemKind::Message, ExchangeVersion::Exchange2013Sp1);
    mail.set_subject("Hi").unwrap();
    mail.add_to_recipient(EmailAddress::new("bob@contoso.com")).unwrap();
    service.send_message(&mut mail, true).await.expect("sent");

    let body = transport.last_body();
    assert!(body.contains(r#"MessageDisposition="SendAndSaveCopy""#));
    assert!(body.contains(r#"<t:DistinguishedFolderId Id="sentitems"/>"#));
    // The server keeps no id for a sent message.
    assert_eq!(mail.id().unwrap(), None);

    assert!(service.send_message(&mut mail, false).await.is_err());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_calendar_update_sends_no_invitations() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &response("UpdateItem", "<m:Items/>"));

    let node = fast_ews_rs::xml::parse_document(
        br#"<t:CalendarItem xmlns:t="t"><t:ItemId Id="CAL1" ChangeKey="K"/><t:Location>A</t:Location></t:CalendarItem>"#,
    )
    .unwrap();
    let mut meeting = Item::from_xml(&node, ExchangeVersion::Exchange2013Sp1, &[]).unwrap();
    meeting.set_location("B").unwrap();

    service(&transport, test_config())
        .update_item(&mut meeting, ConflictResolutionMode::AlwaysOverwrite)
        .await
        .unwrap();
    let body = transport.last_body();
    assert!(body.contains(r#"SendMeetingInvitationsOrCancellations="SendToNone""#));
    assert!(!body.contains("MessageDisposition"));
    // No id came back; the old one is kept.
    assert_eq!(meeting.id().unwrap().map(|id| id.id.as_str()), Some("CAL1"));
}

#[tokio::test]
async fn test_folder_create_update_and_delete() {
    let transport = MockTransport::new();
    transport.respond(
        EWS_URL,
        200,
        &response("CreateFolder", r#"<m:Folders><t:Folder><t:FolderId Id="NEWF" ChangeKey="1"/></t:Folder></m:Folders>"#),
    );
    transport.respond(
        EWS_URL,
        200,
        &response("UpdateFolder", r#"<m:Folders><t:Folder><t:FolderId Id="NEWF" ChangeKey="2"/></t:Folder></m:Folders>"#),
    );
    transport.respond(EWS_URL, 200, &response("DeleteFolder", ""));

    let service = service(&transport, test_config());
    let mut folder = Folder::new(FolderKind::Folder, ExchangeVersion::Exchange2013Sp1);
    folder.set_display_name("Projects").unwrap();
    service
        .create_folder(&mut folder, WellKnownFolderName::MsgFolderRoot)
        .await
        .unwrap();
    assert!(transport.last_body().contains("<m:Folders><t:Folder><t:DisplayName>Projects</t:DisplayName></t:Folder></m:Folders>"));
    assert_eq!(folder.id().unwrap().map(|id| id.id.as_str()), Some("NEWF"));

    // A clean folder is not sent.
    service.update_folder(&mut folder).await.unwrap();
    assert_eq!(transport.requests().len(), 1);

    folder.set_display_name("Projects 2024").unwrap();
    service.update_folder(&mut folder).await.unwrap();
    let body = transport.last_body();
    assert!(body.contains("<t:SetFolderField><t:FieldURI FieldURI=\"folder:DisplayName\"/>"));
    assert_eq!(
        folder.id().unwrap().and_then(|id| id.change_key.as_deref()),
        Some("2")
    );

    let id = folder.id().unwrap().cloned().unwrap();
    service.delete_folder(id, DeleteMode::HardDelete).await.unwrap();
    assert!(transport.last_body().contains(r#"<m:DeleteFolder DeleteType="HardDelete">"#));
}

#[tokio::test]
async fn test_find_folders_and_appointments() {
    let transport = MockTransport::new();
    transport.respond(
        EWS_URL,
        200,
        &response(
            "FindFolder",
            r#"<m:RootFolder TotalItemsInView="1" IncludesLastItemInRange="true"><t:Folders>
                 <t:CalendarFolder><t:FolderId Id="CAL"/><t:DisplayName>Calendar</t:DisplayName></t:CalendarFolder>
               </t:Folders></m:RootFolder>"#,
        ),
    );
    transport.respond(
        EWS_URL,
        200,
        &response(
            "FindItem",
            r#"<m:RootFolder TotalItemsInView="1" IncludesLastItemInRange="true"><t:Items>
                 <t:CalendarItem><t:ItemId Id="OCC1"/><t:Subject>Standup</t:Subject>
                   <t:Start>2024-06-03T09:00:00Z</t:Start><t:End>2024-06-03T09:15:00Z</t:End>
                 </t:CalendarItem>
               </t:Items></m:RootFolder>"#,
        ),
    );

    let service = service(&transport, test_config());
    let folders = service
        .find_folders(WellKnownFolderName::Root, FolderTraversal::Deep, FolderView::new(50))
        .await
        .unwrap();
    assert_eq!(folders.folders[0].kind, FolderKind::CalendarFolder);

    let start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
    let found = service
        .find_appointments(
            WellKnownFolderName::Calendar,
            CalendarView {
                start,
                end: start + chrono::Duration::days(1),
                max_entries: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].kind, ItemKind::CalendarItem);
    assert_eq!(
        found.items[0].start().unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap())
    );
    assert!(transport.last_body().contains("<m:CalendarView StartDate="));
}

#[tokio::test]
async fn test_delete_items_and_availability() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &response("DeleteItem", ""));
    transport.respond(
        EWS_URL,
        200,
        &soap_response(
            r#"<GetUserAvailabilityResponse xmlns="http://schemas.microsoft.com/exchange/services/2006/messages">
                 <FreeBusyResponseArray><FreeBusyResponse>
                   <ResponseMessage ResponseClass="Success"><ResponseCode>NoError</ResponseCode></ResponseMessage>
                   <FreeBusyView><t:MergedFreeBusy>0020</t:MergedFreeBusy></FreeBusyView>
                 </FreeBusyResponse></FreeBusyResponseArray>
               </GetUserAvailabilityResponse>"#,
        ),
    );

    let service = service(&transport, test_config());
    service
        .delete_items(vec![ServiceId::new("A")], DeleteMode::MoveToDeletedItems)
        .await
        .unwrap();
    assert!(transport.last_body().contains(r#"DeleteType="MoveToDeletedItems""#));

    let start = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
    let availability = service
        .get_user_availability(
            vec![AttendeeInfo::new("bob@contoso.com")],
            start,
            start + chrono::Duration::hours(2),
            FreeBusyViewType::FreeBusyMerged,
        )
        .await
        .unwrap();
    assert_eq!(availability[0].merged_free_busy.as_deref(), Some("0020"));
}

#[tokio::test]
async fn test_execute_many_keeps_input_order() {
    let transport = MockTransport::new();
    let item = |id: &str| {
        response(
            "GetItem",
            &format!(r#"<m:Items><t:Message><t:ItemId Id="{id}"/><t:Subject>{id}</t:Subject></t:Message></m:Items>"#),
        )
    };
    // Scripted in reverse so ordering cannot come from the queue.
    transport.respond_when(EWS_URL, r#"Id="C""#, 200, &item("C"));
    transport.respond_when(EWS_URL, r#"Id="B""#, 200, &error_response("GetItem", "ErrorItemNotFound"));
    transport.respond_when(EWS_URL, r#"Id="A""#, 200, &item("A"));

    let requests: Vec<GetItem> = ["A", "B", "C"]
        .into_iter()
        .map(|id| GetItem {
            item_ids: vec![ServiceId::new(id)],
            shape: PropertySet::first_class(),
        })
        .collect();

    let results = service(&transport, test_config())
        .execute_many(&requests, 2)
        .await;

    assert_eq!(results.len(), 3);
    let subject = |r: &anyhow::Result<Vec<Item>>| {
        r.as_ref()
            .ok()
            .and_then(|items| items.first())
            .and_then(|item| item.subject().ok().flatten().map(str::to_string))
    };
    assert_eq!(subject(&results[0]).as_deref(), Some("A"));
    assert!(results[1].is_err());
    assert_eq!(subject(&results[2]).as_deref(), Some("C"));
}

#[tokio::test]
async fn test_created_folder_without_returned_id() {
    let transport = MockTransport::new();
    transport.respond(EWS_URL, 200, &response("CreateFolder", "<m:Folders/>"));

    let mut folder = Folder::new(FolderKind::Folder, ExchangeVersion::Exchange2013Sp1);
    folder.set_display_name("Archive").unwrap();
    service(&transport, test_config())
        .create_folder(&mut folder, WellKnownFolderName::MsgFolderRoot)
        .await
        .expect("created");

    assert!(!folder.is_new());
    assert_eq!(folder.id().expect("id counts as loaded"), None);
}
