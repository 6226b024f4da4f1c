use anyhow::{Result, anyhow};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream::FuturesOrdered};
use hyper::{HeaderMap, StatusCode, Uri, header};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

use crate::autodiscover::{AutodiscoverService, UserSettingName};
use crate::common::{HttpRequest, HttpTransport, HyperTransport, add_accept_encoding};
use crate::config::ClientConfig;
use crate::credentials::ExchangeCredentials;
use crate::error::EwsError;
use crate::objects::{Folder, FolderIdentity, Item, ItemKind, ServiceObject, WellKnownFolderName};
use crate::properties::schema::{folder as folder_props, item as item_props};
use crate::properties::{PropertyValue, ServiceId};
use crate::requests::{
    AttendeeAvailability, AttendeeInfo, CalendarView, ConflictResolutionMode, CreateFolder,
    CreateItem, DeleteFolder, DeleteItem, DeleteMode, FindFolder, FindFoldersResults, FindItem,
    FindItemsResults, FolderTraversal, FolderView, FreeBusyViewType, GetFolder, GetItem,
    GetUserAvailability, ItemView, MessageDisposition, PropertySet, RequestContext,
    SendInvitationsMode, ServiceRequest, UpdateFolder, UpdateItem, ViewKind,
};
use crate::soap::{EnvelopeHeaders, ImpersonatedUserId, extract_fault, parse_envelope, write_envelope};
use crate::version::ServerVersionInfo;

/// Back-off used when a busy server does not say how long to wait.
const DEFAULT_BUSY_BACKOFF_MS: u64 = 1_000;

/// Headers every EWS and Autodiscover request carries.
pub(crate) fn standard_headers(
    config: &ClientConfig,
    credentials: Option<&ExchangeCredentials>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, header::HeaderValue::from_str(&config.user_agent)?);
    if let Some(credentials) = credentials {
        headers.insert(header::AUTHORIZATION, credentials.authorization()?);
    }
    if config.accept_gzip {
        add_accept_encoding(&mut headers);
    }
    Ok(headers)
}

/// Build the transport described by `config`.
pub(crate) fn default_transport(config: &ClientConfig) -> Result<Arc<dyn HttpTransport>> {
    let mut transport = HyperTransport::new(config.timeout())?;
    transport.set_request_compression(config.request_compression);
    transport.set_accept_compression(config.accept_gzip);
    Ok(Arc::new(transport))
}

/// Client for one EWS endpoint.
///
/// Cloning is cheap; clones share the transport and the last seen
/// `ServerVersionInfo`.
#[derive(Clone)]
pub struct ExchangeService {
    transport: Arc<dyn HttpTransport>,
    url: Option<Uri>,
    credentials: Option<ExchangeCredentials>,
    config: ClientConfig,
    impersonated_user: Option<ImpersonatedUserId>,
    time_zone_id: Option<String>,
    server_info: Arc<RwLock<Option<ServerVersionInfo>>>,
}

impl ExchangeService {
    /// Service over the default hyper transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = default_transport(&config)?;
        Ok(Self::with_transport(transport, config))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            url: None,
            credentials: None,
            config,
            impersonated_user: None,
            time_zone_id: None,
            server_info: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_url(&mut self, url: &str) -> Result<()> {
        self.url = Some(url.parse()?);
        Ok(())
    }

    pub fn url(&self) -> Option<&Uri> {
        self.url.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: ExchangeCredentials) {
        self.credentials = Some(credentials);
    }

    pub fn set_impersonated_user(&mut self, user: Option<ImpersonatedUserId>) {
        self.impersonated_user = user;
    }

    /// Windows time zone id sent in `TimeZoneContext`.
    pub fn set_time_zone_id(&mut self, id: Option<String>) {
        self.time_zone_id = id;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Version info from the most recent successful response.
    pub fn server_info(&self) -> Option<ServerVersionInfo> {
        self.server_info.read().ok().and_then(|guard| guard.clone())
    }

    fn context(&self) -> RequestContext {
        RequestContext {
            version: self.config.requested_version,
        }
    }

    fn record_server_info(&self, info: ServerVersionInfo) {
        if let Ok(mut guard) = self.server_info.write() {
            *guard = Some(info);
        }
    }

    /// Run one operation: envelope, POST, fault handling, response decoding.
    pub async fn execute<R: ServiceRequest>(&self, request: &R) -> Result<R::Response> {
        let ctx = self.context();
        let required = request.min_version();
        if ctx.version < required {
            return Err(EwsError::RequestVersion {
                request: R::NAME,
                required,
            }
            .into());
        }
        let url = self
            .url
            .clone()
            .ok_or_else(|| anyhow!("EWS URL is not set; call set_url or autodiscover_url"))?;

        let headers = EnvelopeHeaders {
            version: ctx.version,
            impersonation: self.impersonated_user.as_ref(),
            time_zone_id: self.time_zone_id.as_deref(),
        };
        let body = Bytes::from(write_envelope(&headers, |w| request.write_body(w, &ctx))?);
        if self.config.trace_payloads {
            trace!(operation = R::NAME, payload = %String::from_utf8_lossy(&body), "EWS request body");
        }
        let base_headers = standard_headers(&self.config, self.credentials.as_ref())?;

        let mut attempt = 0;
        loop {
            let mut req = HttpRequest::post_xml(url.clone(), body.clone());
            for (name, value) in base_headers.iter() {
                req.headers.insert(name.clone(), value.clone());
            }

            debug!(operation = R::NAME, %url, attempt, "sending EWS request");
            let resp = self.transport.execute(req).await?;
            if self.config.trace_payloads {
                trace!(operation = R::NAME, status = %resp.status, payload = %resp.text(), "EWS response body");
            }

            let fault = match resp.status {
                StatusCode::UNAUTHORIZED => return Err(EwsError::Unauthorized.into()),
                status if status.is_success() => match parse_envelope(&resp.body) {
                    Ok(envelope) => {
                        if let Some(info) = envelope.server_version.clone() {
                            self.record_server_info(info);
                        }
                        let content = envelope
                            .content()
                            .ok_or_else(|| anyhow!("{} response has an empty SOAP body", R::NAME))?;
                        return request.parse_response(content, &ctx);
                    }
                    Err(err) => match err.downcast::<EwsError>() {
                        Ok(EwsError::SoapFault(fault)) => *fault,
                        Ok(other) => return Err(other.into()),
                        Err(err) => return Err(err),
                    },
                },
                status => match extract_fault(&resp.body) {
                    Some(fault) => fault,
                    None => {
                        return Err(EwsError::HttpStatus {
                            status,
                            body: resp.text(),
                        }
                        .into());
                    }
                },
            };

            if fault.is_server_busy() && attempt < self.config.max_backoff_retries {
                let delay = self
                    .config
                    .backoff(fault.back_off_ms().unwrap_or(DEFAULT_BUSY_BACKOFF_MS));
                warn!(
                    operation = R::NAME,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "server busy, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            warn!(operation = R::NAME, code = %fault.code, response_code = ?fault.response_code, "SOAP fault");
            return Err(EwsError::from(fault).into());
        }
    }

    /// Run many operations with at most `max_concurrency` in flight; results
    /// keep the input order.
    pub async fn execute_many<R: ServiceRequest>(
        &self,
        requests: &[R],
        max_concurrency: usize,
    ) -> Vec<Result<R::Response>> {
        let sem = Semaphore::new(max_concurrency.max(1));
        let mut tasks = FuturesOrdered::new();

        for request in requests {
            let sem = &sem;
            tasks.push_back(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|_| anyhow!("batch semaphore closed"))?;
                self.execute(request).await
            });
        }

        let mut out = Vec::with_capacity(requests.len());
        while let Some(result) = tasks.next().await {
            out.push(result);
        }
        out
    }

    // ----------- Folders -----------

    pub async fn bind_folder(
        &self,
        id: impl Into<FolderIdentity>,
        shape: PropertySet,
    ) -> Result<Folder> {
        let request = GetFolder {
            folder_ids: vec![id.into()],
            shape,
        };
        self.execute(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("GetFolder returned no folder"))
    }

    pub async fn find_folders(
        &self,
        parent: impl Into<FolderIdentity>,
        traversal: FolderTraversal,
        view: FolderView,
    ) -> Result<FindFoldersResults> {
        let request = FindFolder {
            parent: parent.into(),
            shape: PropertySet::first_class(),
            traversal,
            view,
        };
        self.execute(&request).await
    }

    /// Create `folder` below `parent` and store the id the server assigned.
    pub async fn create_folder(
        &self,
        folder: &mut Folder,
        parent: impl Into<FolderIdentity>,
    ) -> Result<()> {
        let ids = {
            let request = CreateFolder {
                parent: parent.into(),
                folders: vec![&*folder],
            };
            self.execute(&request).await?
        };
        if let Some(id) = ids.into_iter().next() {
            folder
                .bag_mut()
                .set_server_value(&folder_props::FOLDER_ID, PropertyValue::FolderId(id));
        }
        folder.bag_mut().mark_saved();
        folder.bag_mut().mark_loaded(&folder_props::FOLDER_ID);
        info!(kind = folder.xml_element_name(), "folder created");
        Ok(())
    }

    /// Push local changes of `folder`; a clean folder is not sent.
    pub async fn update_folder(&self, folder: &mut Folder) -> Result<()> {
        if !folder.is_dirty() {
            return Ok(());
        }
        let ids = {
            let request = UpdateFolder {
                folders: vec![&*folder],
            };
            self.execute(&request).await?
        };
        if let Some(id) = ids.into_iter().next() {
            folder
                .bag_mut()
                .set_server_value(&folder_props::FOLDER_ID, PropertyValue::FolderId(id));
        }
        folder.bag_mut().clear_change_log();
        Ok(())
    }

    pub async fn delete_folder(
        &self,
        id: impl Into<FolderIdentity>,
        delete_mode: DeleteMode,
    ) -> Result<()> {
        let request = DeleteFolder {
            folder_ids: vec![id.into()],
            delete_mode,
        };
        self.execute(&request).await
    }

    // ----------- Items -----------

    pub async fn bind_item(&self, id: ServiceId, shape: PropertySet) -> Result<Item> {
        let request = GetItem {
            item_ids: vec![id],
            shape,
        };
        self.execute(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("GetItem returned no item"))
    }

    pub async fn find_items(
        &self,
        parent: impl Into<FolderIdentity>,
        view: ItemView,
        query_string: Option<String>,
    ) -> Result<FindItemsResults> {
        let mut request = FindItem::new(parent, ViewKind::Indexed(view));
        request.query_string = query_string;
        self.execute(&request).await
    }

    /// Occurrences of calendar items inside the view window.
    pub async fn find_appointments(
        &self,
        calendar: impl Into<FolderIdentity>,
        view: CalendarView,
    ) -> Result<FindItemsResults> {
        let request = FindItem::new(calendar, ViewKind::Calendar(view));
        self.execute(&request).await
    }

    fn store_item_id(item: &mut Item, id: Option<ServiceId>) {
        if let Some(id) = id {
            item.bag_mut()
                .set_server_value(&item_props::ITEM_ID, PropertyValue::ItemId(id));
        }
    }

    pub async fn create_item(
        &self,
        item: &mut Item,
        folder: Option<FolderIdentity>,
        message_disposition: Option<MessageDisposition>,
        send_meeting_invitations: Option<SendInvitationsMode>,
    ) -> Result<()> {
        let ids = {
            let mut request = CreateItem::new(vec![&*item]);
            request.saved_item_folder = folder;
            request.message_disposition = message_disposition;
            request.send_meeting_invitations = send_meeting_invitations;
            self.execute(&request).await?
        };
        Self::store_item_id(item, ids.into_iter().next().flatten());
        item.bag_mut().mark_saved();
        // Sent messages come back without an id.
        item.bag_mut().mark_loaded(&item_props::ITEM_ID);
        Ok(())
    }

    /// Send a new message, optionally keeping a copy in Sent Items.
    pub async fn send_message(&self, item: &mut Item, save_copy: bool) -> Result<()> {
        if !item.is_new() {
            return Err(anyhow!("only new messages can be sent"));
        }
        let disposition = if save_copy {
            MessageDisposition::SendAndSaveCopy
        } else {
            MessageDisposition::SendOnly
        };
        let folder = save_copy.then(|| FolderIdentity::well_known(WellKnownFolderName::SentItems));
        self.create_item(item, folder, Some(disposition), None).await
    }

    pub async fn update_item(
        &self,
        item: &mut Item,
        conflict_resolution: ConflictResolutionMode,
    ) -> Result<()> {
        if !item.is_dirty() {
            return Ok(());
        }
        let ids = {
            let mut request = UpdateItem::new(vec![&*item]);
            request.conflict_resolution = conflict_resolution;
            match item.kind {
                ItemKind::Message => request.message_disposition = Some(MessageDisposition::SaveOnly),
                ItemKind::CalendarItem => {
                    request.send_meeting_invitations_or_cancellations =
                        Some(SendInvitationsMode::SendToNone)
                }
                _ => {}
            }
            self.execute(&request).await?
        };
        Self::store_item_id(item, ids.into_iter().next().flatten());
        item.bag_mut().clear_change_log();
        Ok(())
    }

    pub async fn delete_items(&self, ids: Vec<ServiceId>, delete_mode: DeleteMode) -> Result<()> {
        self.execute(&DeleteItem::new(ids, delete_mode)).await
    }

    pub async fn get_user_availability(
        &self,
        attendees: Vec<AttendeeInfo>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        requested_view: FreeBusyViewType,
    ) -> Result<Vec<AttendeeAvailability>> {
        let mut request = GetUserAvailability::new(attendees, start, end);
        request.requested_view = requested_view;
        self.execute(&request).await
    }

    // ----------- Autodiscover -----------

    /// Locate the EWS endpoint for `email` and use it for subsequent calls.
    pub async fn autodiscover_url(&mut self, email: &str) -> Result<Uri> {
        let mut autodiscover =
            AutodiscoverService::with_transport(self.transport.clone(), self.config.clone());
        if let Some(credentials) = &self.credentials {
            autodiscover.set_credentials(credentials.clone());
        }
        let response = autodiscover
            .get_user_settings(
                email,
                &[
                    UserSettingName::ExternalEwsUrl,
                    UserSettingName::InternalEwsUrl,
                ],
            )
            .await?;
        let url: Uri = response
            .ews_url()
            .ok_or_else(|| anyhow!("Autodiscover returned no EWS URL for {email}"))?
            .parse()?;
        info!(%email, %url, "EWS endpoint discovered");
        self.url = Some(url.clone());
        Ok(url)
    }
}
