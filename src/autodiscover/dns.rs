use anyhow::Result;
use async_trait::async_trait;

/// One `SRV` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// Pluggable `SRV` lookup used for `_autodiscover._tcp.{domain}`.
///
/// The crate ships no resolver; plug in whichever DNS client the application
/// already uses.
#[async_trait]
pub trait SrvResolver: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>>;
}

/// Autodiscover host from an SRV answer set: port 443 only, lowest priority,
/// then highest weight.
pub fn select_srv_host(records: &[SrvRecord]) -> Option<String> {
    records
        .iter()
        .filter(|r| r.port == 443 && !r.target.trim_end_matches('.').is_empty())
        .min_by(|a, b| a.priority.cmp(&b.priority).then(b.weight.cmp(&a.weight)))
        .map(|r| r.target.trim_end_matches('.').to_string())
}
