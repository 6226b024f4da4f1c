//! Compression utilities for HTTP content encoding.
//!
//! Exchange front-ends (IIS) compress SOAP responses when asked to; this module
//! negotiates that and transparently decodes the result.

use anyhow::Result;
use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZstdDecoder};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::BodyStream;
use hyper::body::Body;
use hyper::{HeaderMap, header, http};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

/// Supported content encodings.
///
/// These values correspond to the `Content-Encoding` header and are used by
/// the decompression functions to decide how to wrap the body reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Identity,
    Br,
    Gzip,
    Zstd,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Br => "br",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Zstd => "zstd",
        }
    }
}

/// Detect the response `Content-Encoding` header and return the ordered chain of encodings.
///
/// The vector is ordered from outermost encoding to innermost (as received). When empty, the
/// payload is identity encoded.
pub fn detect_encodings(headers: &HeaderMap) -> Vec<ContentEncoding> {
    let Some(val) = headers.get(header::CONTENT_ENCODING) else {
        return Vec::new();
    };

    let Ok(raw) = val.to_str() else {
        return Vec::new();
    };

    raw.split(',')
        .filter_map(|token| {
            let enc = token.trim().to_ascii_lowercase();
            Some(match enc.as_str() {
                "br" => ContentEncoding::Br,
                "gzip" | "x-gzip" => ContentEncoding::Gzip,
                "zstd" | "zst" => ContentEncoding::Zstd,
                _ => return None,
            })
        })
        .collect()
}

/// Insert an `Accept-Encoding` header (`br, zstd, gzip`) if not already present.
pub fn add_accept_encoding(h: &mut HeaderMap) {
    if !h.contains_key(header::ACCEPT_ENCODING) {
        h.insert(
            header::ACCEPT_ENCODING,
            http::HeaderValue::from_static("br, zstd, gzip"),
        );
    }
}

fn wrap_decoders(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    encodings: &[ContentEncoding],
) -> Box<dyn AsyncBufRead + Unpin + Send> {
    let mut current = reader;
    for encoding in encodings.iter().rev() {
        current = match encoding {
            ContentEncoding::Identity => current,
            ContentEncoding::Br => Box::new(BufReader::new(BrotliDecoder::new(current))),
            ContentEncoding::Gzip => Box::new(BufReader::new(GzipDecoder::new(current))),
            ContentEncoding::Zstd => Box::new(BufReader::new(ZstdDecoder::new(current))),
        };
    }
    current
}

/// Aggregate and decompress a response body according to the encoding chain.
///
/// Accepts any hyper body so that both `Incoming` and in-memory `Full` bodies
/// go through the same path.
pub async fn decompress_body<B>(body: B, encodings: &[ContentEncoding]) -> Result<Bytes>
where
    B: Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = BodyStream::new(body)
        .map_ok(|frame| frame.into_data().unwrap_or_default())
        .map_err(std::io::Error::other);
    let reader: Box<dyn AsyncBufRead + Unpin + Send> =
        Box::new(BufReader::new(StreamReader::new(stream)));

    let mut decoder = wrap_decoders(reader, encodings);
    let mut out = Vec::with_capacity(32 * 1024);
    decoder.read_to_end(&mut out).await?;

    Ok(Bytes::from(out))
}

/// Decompress an already aggregated payload.
pub async fn decompress_bytes(data: Bytes, encodings: &[ContentEncoding]) -> Result<Bytes> {
    if encodings.is_empty() {
        return Ok(data);
    }
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(BufReader::new(Cursor::new(data)));
    let mut decoder = wrap_decoders(reader, encodings);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).await?;
    Ok(Bytes::from(out))
}

/// Compress a byte payload using the specified encoding.
///
/// Returns the original data untouched for [`ContentEncoding::Identity`].
///
/// # Example
///
/// ```
/// use fast_ews_rs::compression::{compress_payload, ContentEncoding};
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let data = Bytes::from("<soap:Envelope/>");
/// let compressed = compress_payload(data, ContentEncoding::Gzip).await?;
/// # Ok(())
/// # }
/// ```
pub async fn compress_payload(data: Bytes, encoding: ContentEncoding) -> Result<Bytes> {
    match encoding {
        ContentEncoding::Identity => Ok(data),
        ContentEncoding::Br => {
            use async_compression::tokio::bufread::BrotliEncoder;

            let mut encoder = BrotliEncoder::new(BufReader::new(Cursor::new(data)));
            let mut compressed = Vec::new();
            encoder.read_to_end(&mut compressed).await?;
            Ok(Bytes::from(compressed))
        }
        ContentEncoding::Gzip => {
            use async_compression::tokio::bufread::GzipEncoder;

            let mut encoder = GzipEncoder::new(BufReader::new(Cursor::new(data)));
            let mut compressed = Vec::new();
            encoder.read_to_end(&mut compressed).await?;
            Ok(Bytes::from(compressed))
        }
        ContentEncoding::Zstd => {
            use async_compression::tokio::bufread::ZstdEncoder;

            let mut encoder = ZstdEncoder::new(BufReader::new(Cursor::new(data)));
            let mut compressed = Vec::new();
            encoder.read_to_end(&mut compressed).await?;
            Ok(Bytes::from(compressed))
        }
    }
}

/// Add a `Content-Encoding` header for an outgoing request body.
///
/// ```
/// use fast_ews_rs::compression::{add_content_encoding, ContentEncoding};
/// use hyper::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// add_content_encoding(&mut headers, ContentEncoding::Gzip);
/// assert_eq!(headers.get("Content-Encoding").unwrap(), "gzip");
/// ```
pub fn add_content_encoding(headers: &mut HeaderMap, encoding: ContentEncoding) {
    if encoding != ContentEncoding::Identity
        && let Ok(value) = http::HeaderValue::from_str(encoding.as_str())
    {
        headers.insert(header::CONTENT_ENCODING, value);
    }
}
