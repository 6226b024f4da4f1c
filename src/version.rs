use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::xml::XmlNode;

/// Schema versions a request can target via `RequestServerVersion`.
///
/// Ordering follows release order, so `version >= ExchangeVersion::Exchange2010`
/// reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ExchangeVersion {
    #[serde(rename = "Exchange2007_SP1")]
    Exchange2007Sp1,
    #[serde(rename = "Exchange2010")]
    Exchange2010,
    #[serde(rename = "Exchange2010_SP1")]
    Exchange2010Sp1,
    #[serde(rename = "Exchange2010_SP2")]
    Exchange2010Sp2,
    #[serde(rename = "Exchange2013")]
    Exchange2013,
    #[default]
    #[serde(rename = "Exchange2013_SP1")]
    Exchange2013Sp1,
}

impl ExchangeVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeVersion::Exchange2007Sp1 => "Exchange2007_SP1",
            ExchangeVersion::Exchange2010 => "Exchange2010",
            ExchangeVersion::Exchange2010Sp1 => "Exchange2010_SP1",
            ExchangeVersion::Exchange2010Sp2 => "Exchange2010_SP2",
            ExchangeVersion::Exchange2013 => "Exchange2013",
            ExchangeVersion::Exchange2013Sp1 => "Exchange2013_SP1",
        }
    }
}

impl fmt::Display for ExchangeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let version = match s.trim() {
            "Exchange2007_SP1" => ExchangeVersion::Exchange2007Sp1,
            "Exchange2010" => ExchangeVersion::Exchange2010,
            "Exchange2010_SP1" => ExchangeVersion::Exchange2010Sp1,
            "Exchange2010_SP2" => ExchangeVersion::Exchange2010Sp2,
            "Exchange2013" => ExchangeVersion::Exchange2013,
            "Exchange2013_SP1" => ExchangeVersion::Exchange2013Sp1,
            other => return Err(anyhow!("unknown Exchange version {other:?}")),
        };
        Ok(version)
    }
}

/// Build information returned in the `ServerVersionInfo` SOAP header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVersionInfo {
    pub major_version: u32,
    pub minor_version: u32,
    pub major_build_number: u32,
    pub minor_build_number: u32,
    /// Schema version string, absent on Exchange 2007 RTM.
    pub version: Option<String>,
}

impl ServerVersionInfo {
    pub fn from_node(node: &XmlNode) -> Self {
        let number = |name: &str| {
            node.attribute(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_default()
        };
        Self {
            major_version: number("MajorVersion"),
            minor_version: number("MinorVersion"),
            major_build_number: number("MajorBuildNumber"),
            minor_build_number: number("MinorBuildNumber"),
            version: node.attribute("Version").map(str::to_string),
        }
    }

    /// The highest schema version this server understands, when it says so.
    pub fn exchange_version(&self) -> Option<ExchangeVersion> {
        self.version.as_deref().and_then(|v| v.parse().ok())
    }
}
