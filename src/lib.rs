//! Fast Exchange Web Services (EWS) client library for Rust.
//!
//! This library speaks the EWS SOAP protocol over hyper 1.x, rustls and tokio,
//! and locates endpoints through Autodiscover.
//!
//! # Features
//!
//! - Autodiscover over SOAP and legacy POX, with validated manual redirects,
//!   address redirection, an HTTP redirect probe and pluggable DNS SRV lookup
//! - Schema-driven property bags with change tracking, written back as
//!   minimal `SetItemField` / `DeleteItemField` updates
//! - JSON round-tripping of folders and items
//! - Throttling-aware request pipeline (`ErrorServerBusy` back-off)
//! - HTTP/2, connection pooling and transparent br/zstd/gzip decompression
//! - Batch execution with bounded concurrency
//!
//! # Examples
//!
//! ## Discover the endpoint and read the inbox
//!
//! ```no_run
//! use fast_ews_rs::{ClientConfig, ExchangeCredentials, ExchangeService, WellKnownFolderName};
//! use fast_ews_rs::requests::ItemView;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut service = ExchangeService::new(ClientConfig::from_env())?;
//!     service.set_credentials(ExchangeCredentials::basic("jane@contoso.com", "secret"));
//!
//!     let url = service.autodiscover_url("jane@contoso.com").await?;
//!     println!("EWS endpoint: {url}");
//!
//!     let page = service
//!         .find_items(WellKnownFolderName::Inbox, ItemView::new(25), None)
//!         .await?;
//!     for item in &page.items {
//!         println!("{:?}", item.subject()?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Create and update an item
//!
//! ```no_run
//! use fast_ews_rs::{ExchangeService, Item, ItemKind};
//! use fast_ews_rs::properties::EmailAddress;
//! use fast_ews_rs::requests::ConflictResolutionMode;
//! use anyhow::Result;
//!
//! # async fn example(service: ExchangeService) -> Result<()> {
//! let mut draft = Item::new(ItemKind::Message, service.config().requested_version);
//! draft.set_subject("Quarterly numbers")?;
//! draft.add_to_recipient(EmailAddress::new("bob@contoso.com"))?;
//! service.create_item(&mut draft, None, None, None).await?;
//!
//! // Only the changed field is sent.
//! draft.set_subject("Quarterly numbers (final)")?;
//! service.update_item(&mut draft, ConflictResolutionMode::AutoResolve).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Autodiscover on its own
//!
//! ```no_run
//! use fast_ews_rs::{AutodiscoverService, ClientConfig, ExchangeCredentials, UserSettingName};
//! use anyhow::Result;
//!
//! # async fn example() -> Result<()> {
//! let mut autodiscover = AutodiscoverService::new(ClientConfig::default())?;
//! autodiscover.set_credentials(ExchangeCredentials::basic("jane@contoso.com", "secret"));
//! autodiscover.set_redirection_url_validator(|uri| {
//!     uri.scheme_str() == Some("https") && uri.host().is_some_and(|h| h.ends_with("contoso.com"))
//! });
//!
//! let settings = autodiscover
//!     .get_user_settings("jane@contoso.com", &[UserSettingName::ExternalEwsUrl])
//!     .await?;
//! println!("{:?}", settings.ews_url());
//! # Ok(())
//! # }
//! ```
//!
//! ## Matching on errors
//!
//! Every API returns `anyhow::Result`. Conditions worth reacting to travel as
//! [`EwsError`] inside the error:
//!
//! ```no_run
//! use fast_ews_rs::{EwsError, ExchangeService, WellKnownFolderName};
//! use fast_ews_rs::requests::PropertySet;
//!
//! # async fn example(service: ExchangeService) {
//! match service.bind_folder(WellKnownFolderName::Calendar, PropertySet::first_class()).await {
//!     Ok(folder) => println!("{:?}", folder.display_name()),
//!     Err(err) => match EwsError::find(&err) {
//!         Some(EwsError::Unauthorized) => eprintln!("check the credentials"),
//!         Some(EwsError::ServiceResponse(resp)) => eprintln!("server said {}", resp.code),
//!         _ => eprintln!("{err:#}"),
//!     },
//! }
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Network
//! attempts and redirect hops are logged at `debug`, throttling and faults at
//! `warn`. Request and response bodies are logged at `trace` only when
//! [`ClientConfig::trace_payloads`] is set.

pub mod autodiscover;
pub mod common;
pub mod config;
pub mod credentials;
pub mod error;
pub mod objects;
pub mod properties;
pub mod requests;
pub mod service;
pub mod soap;
pub mod version;
pub mod xml;

pub use autodiscover::{AutodiscoverService, GetUserSettingsResponse, UserSettingName};
pub use common::{ContentEncoding, HttpRequest, HttpResponse, HttpTransport, HyperTransport};
pub use config::ClientConfig;
pub use credentials::ExchangeCredentials;
pub use error::EwsError;
pub use objects::{
    Folder, FolderIdentity, FolderKind, Item, ItemKind, ServiceObject, WellKnownFolderName,
};
pub use properties::{PropertyBag, PropertyValue, ServiceId};
pub use service::ExchangeService;
pub use version::{ExchangeVersion, ServerVersionInfo};

// Short path used by the compression docs.
pub mod compression {
    pub use crate::common::compression::*;
}
