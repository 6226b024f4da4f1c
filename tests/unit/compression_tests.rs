use bytes::Bytes;
use fast_ews_rs::compression::*;
use hyper::{HeaderMap, header};

const ENVELOPE: &str = r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types" xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"><soap:Header><t:RequestServerVersion Version="Exchange2013_SP1"/></soap:Header><soap:Body><m:FindItem Traversal="Shallow"><m:ItemShape><t:BaseShape>Default</t:BaseShape></m:ItemShape><m:IndexedPageItemView MaxEntriesReturned="50" Offset="0" BasePoint="Beginning"/><m:ParentFolderIds><t:DistinguishedFolderId Id="inbox"/></m:ParentFolderIds></m:FindItem></soap:Body></soap:Envelope>"#;

#[tokio::test]
async fn test_compress_payload_identity() {
    let data = Bytes::from(ENVELOPE);
    let compressed = compress_payload(data.clone(), ContentEncoding::Identity)
        .await
        .expect("Identity compression should succeed");
    assert_eq!(compressed, data);
}

#[tokio::test]
async fn test_soap_body_survives_each_encoding() {
    let data = Bytes::from(ENVELOPE.repeat(4));
    for encoding in [ContentEncoding::Gzip, ContentEncoding::Br, ContentEncoding::Zstd] {
        let compressed = compress_payload(data.clone(), encoding)
            .await
            .expect("compression should succeed");
        assert!(
            compressed.len() < data.len(),
            "{encoding:?}: {} >= {}",
            compressed.len(),
            data.len()
        );

        let restored = decompress_bytes(compressed, &[encoding])
            .await
            .expect("decompression should succeed");
        assert_eq!(restored, data, "{encoding:?} changed the payload");
    }
}

#[tokio::test]
async fn test_decompress_without_encodings_is_passthrough() {
    let data = Bytes::from(ENVELOPE);
    let restored = decompress_bytes(data.clone(), &[])
        .await
        .expect("identity passthrough");
    assert_eq!(restored, data);
}

#[tokio::test]
async fn test_compress_empty_data() {
    let empty = Bytes::new();
    for encoding in [ContentEncoding::Gzip, ContentEncoding::Br, ContentEncoding::Zstd] {
        let compressed = compress_payload(empty.clone(), encoding)
            .await
            .unwrap_or_else(|e| panic!("compression with {encoding:?} failed: {e}"));
        let restored = decompress_bytes(compressed, &[encoding])
            .await
            .expect("empty payload should decompress");
        assert!(restored.is_empty());
    }
}

#[test]
fn test_detect_encodings_reads_header_chain() {
    let mut headers = HeaderMap::new();
    assert!(detect_encodings(&headers).is_empty());

    headers.insert(header::CONTENT_ENCODING, "x-gzip, br, deflate".parse().unwrap());
    assert_eq!(
        detect_encodings(&headers),
        vec![ContentEncoding::Gzip, ContentEncoding::Br]
    );
}

#[test]
fn test_accept_encoding_is_not_overwritten() {
    let mut headers = HeaderMap::new();
    add_accept_encoding(&mut headers);
    assert_eq!(headers.get(header::ACCEPT_ENCODING).unwrap(), "br, zstd, gzip");

    let mut custom = HeaderMap::new();
    custom.insert(header::ACCEPT_ENCODING, "gzip".parse().unwrap());
    add_accept_encoding(&mut custom);
    assert_eq!(custom.get(header::ACCEPT_ENCODING).unwrap(), "gzip");
}

#[test]
fn test_identity_adds_no_content_encoding() {
    let mut headers = HeaderMap::new();
    add_content_encoding(&mut headers, ContentEncoding::Identity);
    assert!(headers.get(header::CONTENT_ENCODING).is_none());

    add_content_encoding(&mut headers, ContentEncoding::Zstd);
    assert_eq!(headers.get(header::CONTENT_ENCODING).unwrap(), "zstd");
}
