use hyper::Uri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// An Autodiscover `ErrorCode` other than `NoError` or a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Autodiscover error {code}: {message}")]
pub struct AutodiscoverError {
    pub code: String,
    pub message: String,
}

impl AutodiscoverError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Decides whether a redirection target may be contacted.
pub type RedirectionUrlValidator = Arc<dyn Fn(&Uri) -> bool + Send + Sync>;

/// Accepts `https` targets only.
pub fn https_only_validator() -> RedirectionUrlValidator {
    Arc::new(|uri: &Uri| uri.scheme_str() == Some("https"))
}

/// Settings that can be requested through `GetUserSettings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserSettingName {
    UserDisplayName,
    UserDN,
    UserDeploymentId,
    InternalMailboxServer,
    InternalRpcClientServer,
    InternalEcpUrl,
    InternalEwsUrl,
    #[serde(rename = "InternalOABUrl")]
    InternalOabUrl,
    InternalWebClientUrls,
    ExternalMailboxServer,
    ExternalEcpUrl,
    ExternalEwsUrl,
    #[serde(rename = "ExternalOABUrl")]
    ExternalOabUrl,
    ExternalWebClientUrls,
    ActiveDirectoryServer,
    CasVersion,
    EwsSupportedSchemas,
    MobileMailboxPolicy,
}

impl UserSettingName {
    pub const ALL: [UserSettingName; 18] = [
        UserSettingName::UserDisplayName,
        UserSettingName::UserDN,
        UserSettingName::UserDeploymentId,
        UserSettingName::InternalMailboxServer,
        UserSettingName::InternalRpcClientServer,
        UserSettingName::InternalEcpUrl,
        UserSettingName::InternalEwsUrl,
        UserSettingName::InternalOabUrl,
        UserSettingName::InternalWebClientUrls,
        UserSettingName::ExternalMailboxServer,
        UserSettingName::ExternalEcpUrl,
        UserSettingName::ExternalEwsUrl,
        UserSettingName::ExternalOabUrl,
        UserSettingName::ExternalWebClientUrls,
        UserSettingName::ActiveDirectoryServer,
        UserSettingName::CasVersion,
        UserSettingName::EwsSupportedSchemas,
        UserSettingName::MobileMailboxPolicy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UserSettingName::UserDisplayName => "UserDisplayName",
            UserSettingName::UserDN => "UserDN",
            UserSettingName::UserDeploymentId => "UserDeploymentId",
            UserSettingName::InternalMailboxServer => "InternalMailboxServer",
            UserSettingName::InternalRpcClientServer => "InternalRpcClientServer",
            UserSettingName::InternalEcpUrl => "InternalEcpUrl",
            UserSettingName::InternalEwsUrl => "InternalEwsUrl",
            UserSettingName::InternalOabUrl => "InternalOABUrl",
            UserSettingName::InternalWebClientUrls => "InternalWebClientUrls",
            UserSettingName::ExternalMailboxServer => "ExternalMailboxServer",
            UserSettingName::ExternalEcpUrl => "ExternalEcpUrl",
            UserSettingName::ExternalEwsUrl => "ExternalEwsUrl",
            UserSettingName::ExternalOabUrl => "ExternalOABUrl",
            UserSettingName::ExternalWebClientUrls => "ExternalWebClientUrls",
            UserSettingName::ActiveDirectoryServer => "ActiveDirectoryServer",
            UserSettingName::CasVersion => "CasVersion",
            UserSettingName::EwsSupportedSchemas => "EwsSupportedSchemas",
            UserSettingName::MobileMailboxPolicy => "MobileMailboxPolicy",
        }
    }
}

impl fmt::Display for UserSettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserSettingName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserSettingName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown user setting {s}"))
    }
}

/// A per-setting failure reported next to otherwise successful settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettingError {
    pub setting_name: String,
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetUserSettingsResponse {
    /// Address the settings belong to, after any address redirection.
    pub email: String,
    pub redirect_target: Option<String>,
    pub settings: BTreeMap<UserSettingName, String>,
    pub errors: Vec<UserSettingError>,
}

impl GetUserSettingsResponse {
    pub fn get(&self, name: UserSettingName) -> Option<&str> {
        self.settings.get(&name).map(String::as_str)
    }

    /// EWS endpoint, preferring the external URL.
    pub fn ews_url(&self) -> Option<&str> {
        self.get(UserSettingName::ExternalEwsUrl)
            .or_else(|| self.get(UserSettingName::InternalEwsUrl))
    }
}

/// What one Autodiscover endpoint answered.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AutodiscoverOutcome {
    Settings(GetUserSettingsResponse),
    RedirectAddress(String),
    RedirectUrl(String),
    Error(AutodiscoverError),
}
