use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri, header};
use tokio::time::{Duration, timeout};
use tracing::debug;

use crate::common::compression::{
    ContentEncoding, add_accept_encoding, add_content_encoding, compress_payload, decompress_body,
    detect_encodings,
};
use crate::common::http::{HyperClient, build_hyper_client};
use crate::error::EwsError;

/// A fully buffered outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// `POST` with a `text/xml` body, the content type every SOAP endpoint expects.
    pub fn post_xml(uri: Uri, body: impl Into<Bytes>) -> Self {
        let mut req = Self::new(Method::POST, uri);
        req.headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/xml; charset=utf-8"),
        );
        req.body = Some(body.into());
        req
    }

    pub fn with_header(mut self, name: header::HeaderName, value: header::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A fully aggregated, already decompressed HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// The URL the request was sent to, used to resolve relative redirects.
    pub url: Uri,
}

impl HttpResponse {
    pub fn is_redirect(&self) -> bool {
        matches!(
            self.status,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::SEE_OTHER
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        )
    }

    /// The `Location` header resolved against the request URL.
    pub fn location(&self) -> Option<Uri> {
        let raw = self.headers.get(header::LOCATION)?.to_str().ok()?;
        resolve_reference(&self.url, raw.trim()).ok()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Resolve a URI reference (absolute, scheme-relative, absolute-path or relative-path)
/// against `base`.
pub fn resolve_reference(base: &Uri, reference: &str) -> Result<Uri> {
    if reference.is_empty() {
        return Err(anyhow!("empty URI reference"));
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(reference.parse()?);
    }

    let scheme = base.scheme_str().unwrap_or("https");
    if let Some(rest) = reference.strip_prefix("//") {
        return Ok(format!("{scheme}://{rest}").parse()?);
    }

    let authority = base
        .authority()
        .ok_or_else(|| anyhow!("base URI {base} has no authority"))?;

    let path = if reference.starts_with('/') {
        reference.to_string()
    } else {
        let base_path = base.path();
        let dir = match base_path.rfind('/') {
            Some(idx) => &base_path[..=idx],
            None => "/",
        };
        format!("{dir}{reference}")
    };

    Ok(format!("{scheme}://{authority}{path}").parse()?)
}

/// The seam between the protocol logic and the network.
///
/// Implementations must not follow redirects: the Autodiscover chain validates
/// every hop itself.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] built on **hyper 1.x** + **rustls**.
///
/// Cloning is cheap and reuses the same connection pool.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    default_timeout: Duration,
    request_compression: ContentEncoding,
    accept_compression: bool,
}

impl HyperTransport {
    pub fn new(default_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_hyper_client()?,
            default_timeout,
            request_compression: ContentEncoding::Identity,
            accept_compression: true,
        })
    }

    /// Compress outgoing bodies with the given encoding. Most Exchange
    /// deployments only accept identity request bodies, so this is opt-in.
    pub fn set_request_compression(&mut self, encoding: ContentEncoding) {
        self.request_compression = encoding;
    }

    pub fn request_compression(&self) -> ContentEncoding {
        self.request_compression
    }

    /// Toggle the `Accept-Encoding` negotiation for responses.
    pub fn set_accept_compression(&mut self, enabled: bool) {
        self.accept_compression = enabled;
    }

    fn normalize_decompressed_headers(
        headers: &mut HeaderMap,
        encodings: &[ContentEncoding],
        body_len: usize,
    ) {
        if encodings.is_empty() {
            return;
        }

        headers.remove(header::CONTENT_ENCODING);
        if let Ok(value) = header::HeaderValue::from_str(&body_len.to_string()) {
            headers.insert(header::CONTENT_LENGTH, value);
        } else {
            headers.remove(header::CONTENT_LENGTH);
        }
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            uri,
            mut headers,
            body,
        } = request;

        if self.accept_compression {
            add_accept_encoding(&mut headers);
        }

        let payload = match body {
            Some(body) if self.request_compression != ContentEncoding::Identity => {
                match compress_payload(body.clone(), self.request_compression).await {
                    Ok(compressed) => {
                        add_content_encoding(&mut headers, self.request_compression);
                        compressed
                    }
                    Err(_) => body,
                }
            }
            Some(body) => body,
            None => Bytes::new(),
        };

        let mut req_builder = Request::builder().method(method.clone()).uri(uri.clone());
        for (k, v) in headers.iter() {
            req_builder = req_builder.header(k, v);
        }
        let req = req_builder.body(Full::new(payload))?;

        debug!(%method, %uri, "sending request");
        let resp = timeout(self.default_timeout, self.client.request(req))
            .await
            .map_err(|_| EwsError::Timeout)??;

        let encodings = detect_encodings(resp.headers());
        let (mut parts, body) = resp.into_parts();
        let decompressed = decompress_body(body, &encodings).await?;
        Self::normalize_decompressed_headers(&mut parts.headers, &encodings, decompressed.len());

        debug!(%uri, status = %parts.status, bytes = decompressed.len(), "response received");
        Ok(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body: decompressed,
            url: uri,
        })
    }
}
