use hyper::StatusCode;
use thiserror::Error;

use crate::autodiscover::types::AutodiscoverError;
use crate::requests::response::ServiceResponseError;
use crate::soap::fault::SoapFault;
use crate::version::ExchangeVersion;

/// Errors callers may want to match on.
///
/// Public APIs return `anyhow::Result`; these variants travel inside the
/// `anyhow::Error` and can be recovered with `err.downcast_ref::<EwsError>()`.
#[derive(Debug, Error)]
pub enum EwsError {
    #[error("the server rejected the supplied credentials (HTTP 401)")]
    Unauthorized,

    #[error("request failed with HTTP status {status}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("SOAP fault {}: {}", .0.code, .0.string)]
    SoapFault(Box<SoapFault>),

    #[error(transparent)]
    ServiceResponse(#[from] ServiceResponseError),

    #[error(transparent)]
    Autodiscover(#[from] AutodiscoverError),

    #[error("property {0} has not been loaded")]
    PropertyNotLoaded(&'static str),

    #[error("property {0} is read-only in this context")]
    PropertyReadOnly(&'static str),

    #[error("property {0} cannot be deleted")]
    PropertyNotDeletable(&'static str),

    #[error("property {name} requires {required} or later")]
    PropertyVersion {
        name: &'static str,
        required: ExchangeVersion,
    },

    #[error("{request} requires {required} or later")]
    RequestVersion {
        request: &'static str,
        required: ExchangeVersion,
    },

    #[error("invalid value for property {name}: {reason}")]
    InvalidPropertyValue { name: &'static str, reason: String },

    #[error("unknown property {0}")]
    UnknownProperty(String),

    #[error("maximum number of redirections exceeded")]
    RedirectLimit,

    #[error("request timed out")]
    Timeout,

    #[error("malformed XML: {0}")]
    Xml(String),
}

impl From<SoapFault> for EwsError {
    fn from(fault: SoapFault) -> Self {
        EwsError::SoapFault(Box::new(fault))
    }
}

impl EwsError {
    /// Find an [`EwsError`] anywhere in an `anyhow` error chain.
    pub fn find(err: &anyhow::Error) -> Option<&EwsError> {
        err.chain().find_map(|cause| cause.downcast_ref::<EwsError>())
    }
}
