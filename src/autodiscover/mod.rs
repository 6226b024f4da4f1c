//! Autodiscover: from an SMTP address to the mailbox's EWS endpoint.
//!
//! Both the SOAP (`autodiscover.svc`) and the legacy POX
//! (`autodiscover.xml`) protocols are spoken. Redirections, whether HTTP 3xx,
//! `RedirectUrl` or `RedirectAddress`, are followed by [`AutodiscoverService`]
//! itself so every hop can be validated and counted.

pub mod client;
pub mod dns;
pub mod pox;
pub mod soap;
pub mod types;

pub use client::AutodiscoverService;
pub use dns::{SrvRecord, SrvResolver, select_srv_host};
pub use pox::{PoxProtocol, PoxResponse, parse_pox_response, write_pox_request};
pub use soap::write_get_user_settings_request;
pub use types::{
    AutodiscoverError, GetUserSettingsResponse, RedirectionUrlValidator, UserSettingError,
    UserSettingName, https_only_validator,
};
