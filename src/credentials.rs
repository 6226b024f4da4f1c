use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use hyper::header::HeaderValue;
use std::fmt;

/// Credentials sent with every EWS and Autodiscover request.
#[derive(Clone, PartialEq, Eq)]
pub enum ExchangeCredentials {
    Basic { username: String, password: String },
    /// An OAuth access token.
    Bearer(String),
}

impl ExchangeCredentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        ExchangeCredentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        ExchangeCredentials::Bearer(token.into())
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> Result<HeaderValue> {
        let raw = match self {
            ExchangeCredentials::Basic { username, password } => {
                format!("Basic {}", B64.encode(format!("{username}:{password}")))
            }
            ExchangeCredentials::Bearer(token) => format!("Bearer {token}"),
        };
        let mut value = HeaderValue::from_str(&raw)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeCredentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            ExchangeCredentials::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}
