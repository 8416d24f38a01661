// src/handler/mod.rs
//! Intercept, record, forward.

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use std::net::IpAddr;
use tracing::{debug, error, warn, Span};

use crate::record::CallRecord;
use crate::registry::Registry;
use crate::upstream::{ForwardError, ForwardResponse, Forwarder};
use crate::xmlrpc::{decode_call, DecodeError};

/// Largest gzipped call the proxy inflates to inspect. Bigger calls are
/// still forwarded, just not recorded.
pub const MAX_DECOMPRESSED_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub enum HandleError {
    Decompress(String),
    Decode(DecodeError),
    Forward(ForwardError),
}

impl HandleError {
    /// Whether the call itself was unreadable (as opposed to the master
    /// failing to answer it).
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, HandleError::Decompress(_) | HandleError::Decode(_))
    }
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleError::Decompress(e) => write!(f, "decompress error: {}", e),
            HandleError::Decode(e) => write!(f, "decode error: {}", e),
            HandleError::Forward(e) => write!(f, "forward failed: {}", e),
        }
    }
}

impl std::error::Error for HandleError {}

pub(crate) fn is_gzipped(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

/// Inflate a gzipped body. `Ok(None)` means it inflates past
/// `MAX_DECOMPRESSED_SIZE` and should not be inspected.
pub(crate) fn decompress_if_gzipped(
    body: &Bytes,
    is_gzipped: bool,
) -> Result<Option<Bytes>, HandleError> {
    if !is_gzipped {
        return Ok(Some(body.clone()));
    }

    debug!(compressed_size = body.len(), "decompressing gzipped call");
    let decoder = GzDecoder::new(body.as_ref());
    let mut decompressed = Vec::with_capacity(body.len().saturating_mul(2));
    let bytes_read = decoder
        .take((MAX_DECOMPRESSED_SIZE + 1) as u64)
        .read_to_end(&mut decompressed)
        .map_err(|e| {
            error!(error = %e, "gzip decompression failed");
            HandleError::Decompress(e.to_string())
        })?;
    if bytes_read > MAX_DECOMPRESSED_SIZE {
        warn!(
            compressed_size = body.len(),
            max = MAX_DECOMPRESSED_SIZE,
            "decompressed size exceeds limit"
        );
        return Ok(None);
    }
    Ok(Some(Bytes::from(decompressed)))
}

/// Handle one inbound master call.
///
/// The call is decoded and recorded on arrival, before the master is asked,
/// so a node's calls reach its state in the order the proxy accepted them
/// and a call is recorded whether or not the master answers. The original
/// bytes are forwarded, never a re-encoding. Undecodable calls are rejected
/// without being forwarded or recorded. There is no size limit on calls;
/// gzipped calls too large to inflate are forwarded unrecorded.
#[tracing::instrument(
    name = "intercept",
    skip(headers, body, registry, forwarder),
    fields(
        method = tracing::field::Empty,
        recorded = tracing::field::Empty,
    )
)]
pub async fn intercept<F: Forwarder + ?Sized>(
    headers: HeaderMap,
    body: Bytes,
    origin: Option<IpAddr>,
    registry: &Registry,
    forwarder: &F,
) -> Result<ForwardResponse, HandleError> {
    let Some(plain) = decompress_if_gzipped(&body, is_gzipped(&headers))? else {
        return forwarder
            .forward(headers, body)
            .await
            .map_err(HandleError::Forward);
    };
    let call = decode_call(&plain).map_err(|e| {
        debug!(error = %e, body_size = plain.len(), "rejecting undecodable call");
        HandleError::Decode(e)
    })?;

    let span = Span::current();
    span.record("method", call.method.as_str());

    let mut recorded = 0usize;
    for inner in call.flatten() {
        if let Some(record) = CallRecord::from_call(&inner, origin) {
            registry.record_call(&record);
            recorded += 1;
        }
    }
    span.record("recorded", recorded);

    forwarder
        .forward(headers, body)
        .await
        .map_err(HandleError::Forward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeFilter;
    use crate::xmlrpc::{encode_call, encode_response, Value};
    use axum::http::StatusCode;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::sync::Mutex;

    /// Answers every call with a fixed body and remembers what it was sent.
    struct StubMaster {
        answer: Result<Bytes, ()>,
        seen: Mutex<Vec<Bytes>>,
    }

    impl StubMaster {
        fn answering(body: &str) -> Self {
            Self {
                answer: Ok(Bytes::from(body.to_string())),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn down() -> Self {
            Self {
                answer: Err(()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Forwarder for StubMaster {
        async fn forward(&self, _headers: HeaderMap, body: Bytes) -> Result<ForwardResponse, ForwardError> {
            self.seen.lock().unwrap().push(body);
            match &self.answer {
                Ok(answer) => Ok(ForwardResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: answer.clone(),
                }),
                Err(()) => Err(ForwardError::Unreachable("connection refused".to_string())),
            }
        }
    }

    fn call(method: &str, args: &[&str]) -> Bytes {
        let params: Vec<Value> = args.iter().map(|s| Value::from(*s)).collect();
        Bytes::from(encode_call(method, &params))
    }

    #[tokio::test]
    async fn forwards_original_bytes_and_records() {
        let registry = Registry::default();
        let answer = encode_response(&Value::Array(vec![Value::Int(1), Value::from("ok"), Value::Array(vec![])]));
        let master = StubMaster::answering(&answer);
        let body = call("registerPublisher", &["/alice", "/scan", "sensor_msgs/LaserScan", "http://a:1/"]);

        let response = intercept(HeaderMap::new(), body.clone(), None, &registry, &master)
            .await
            .unwrap();

        assert_eq!(response.body, Bytes::from(answer));
        assert_eq!(master.seen.lock().unwrap().as_slice(), &[body]);
        let snapshot = registry.snapshot(&NodeFilter::all());
        assert!(snapshot["/alice"].publishers.contains_key("/scan"));
    }

    #[tokio::test]
    async fn unreachable_master_still_records() {
        let registry = Registry::default();
        let master = StubMaster::down();

        let err = intercept(
            HeaderMap::new(),
            call("registerService", &["/alice", "/echo", "rosrpc://a:2", "http://a:1/"]),
            None,
            &registry,
            &master,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HandleError::Forward(ForwardError::Unreachable(_))));
        assert!(!err.is_protocol_fault());
        let snapshot = registry.snapshot(&NodeFilter::all());
        assert!(snapshot["/alice"].services_provided.contains_key("/echo"));
    }

    #[tokio::test]
    async fn garbage_is_neither_forwarded_nor_recorded() {
        let registry = Registry::default();
        let master = StubMaster::answering("unused");

        let err = intercept(
            HeaderMap::new(),
            Bytes::from_static(b"<methodCall><oops"),
            None,
            &registry,
            &master,
        )
        .await
        .unwrap_err();

        assert!(err.is_protocol_fault());
        assert!(master.seen.lock().unwrap().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unknown_procedures_are_forwarded_but_not_recorded() {
        let registry = Registry::default();
        let master = StubMaster::answering("<methodResponse/>");

        intercept(HeaderMap::new(), call("getSystemState", &["/alice"]), None, &registry, &master)
            .await
            .unwrap();

        assert_eq!(master.seen.lock().unwrap().len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn gzipped_calls_are_decoded_and_forwarded_compressed() {
        let registry = Registry::default();
        let master = StubMaster::answering("<methodResponse/>");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&call("setParam", &["/alice", "/alice/rate", "10"]))
            .unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

        intercept(headers, compressed.clone(), None, &registry, &master)
            .await
            .unwrap();

        assert_eq!(master.seen.lock().unwrap()[0], compressed);
        let snapshot = registry.snapshot(&NodeFilter::all());
        assert_eq!(
            snapshot["/alice"].parameters["/alice/rate"].value,
            Some(Value::from("10"))
        );
    }

    #[tokio::test]
    async fn gzipped_call_past_the_inflate_limit_is_forwarded_unrecorded() {
        let registry = Registry::default();
        let master = StubMaster::answering("<methodResponse/>");

        let description = "x".repeat(MAX_DECOMPRESSED_SIZE + 1);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(&call("setParam", &["/loader", "/robot_description", description.as_str()]))
            .unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

        intercept(headers, compressed.clone(), None, &registry, &master)
            .await
            .unwrap();

        assert_eq!(master.seen.lock().unwrap().as_slice(), &[compressed]);
        assert!(registry.is_empty());
    }
}
