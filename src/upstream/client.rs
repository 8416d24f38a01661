// src/upstream/client.rs
use crate::upstream::forwarder::{ForwardError, ForwardResponse, Forwarder};
use crate::xmlrpc::{decode_response, encode_call, MethodResponse, Value};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller id the proxy uses for its own calls to the master.
pub const PROXY_CALLER_ID: &str = "/autodoc_proxy";

/// Request headers copied onto the forwarded call.
const FORWARDED_REQUEST_HEADERS: &[HeaderName] = &[
    header::CONTENT_TYPE,
    header::CONTENT_ENCODING,
    header::ACCEPT_ENCODING,
    header::USER_AGENT,
];

/// Response headers relayed back to the caller.
const RELAYED_RESPONSE_HEADERS: &[HeaderName] = &[header::CONTENT_TYPE, header::CONTENT_ENCODING];

/// HTTP client bound to the real master.
///
/// Calls are never retried: master calls are not idempotent and a retry
/// would be visible to the caller.
pub struct UpstreamClient {
    client: Client,
    master_uri: String,
}

impl UpstreamClient {
    /// Create a new client for the given master URI.
    /// Returns an error if the HTTP client fails to build.
    pub fn new(master_uri: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            master_uri: master_uri.into(),
        })
    }

    pub fn master_uri(&self) -> &str {
        &self.master_uri
    }

    /// Ask the master for its pid, proving it is up and speaks XML-RPC.
    pub async fn master_pid(&self) -> Result<i64, ForwardError> {
        let body = encode_call("getPid", &[Value::from(PROXY_CALLER_ID)]);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/xml"));

        let response = self.forward(headers, Bytes::from(body)).await?;
        if !response.status.is_success() {
            return Err(ForwardError::BadResponse(format!("HTTP {}", response.status)));
        }

        match decode_response(&response.body) {
            // [code, statusMessage, pid]
            Ok(MethodResponse::Success(Value::Array(items))) => match items.get(2) {
                Some(Value::Int(pid)) => Ok(*pid),
                _ => Err(ForwardError::BadResponse("getPid returned no pid".to_string())),
            },
            Ok(MethodResponse::Success(other)) => Err(ForwardError::BadResponse(format!(
                "getPid returned {}",
                other.type_name()
            ))),
            Ok(MethodResponse::Fault { code, message }) => Err(ForwardError::BadResponse(
                format!("fault {}: {}", code, message),
            )),
            Err(e) => Err(ForwardError::BadResponse(e.to_string())),
        }
    }
}

fn classify(e: reqwest::Error) -> ForwardError {
    if e.is_timeout() {
        ForwardError::Timeout
    } else if e.is_connect() {
        ForwardError::Unreachable(e.to_string())
    } else {
        ForwardError::Network(e.to_string())
    }
}

fn copy_headers(from: &HeaderMap, names: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in names {
        for value in from.get_all(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[async_trait::async_trait]
impl Forwarder for UpstreamClient {
    #[tracing::instrument(
        name = "forward",
        skip(self, headers, body),
        fields(master = %self.master_uri, bytes = body.len())
    )]
    async fn forward(&self, headers: HeaderMap, body: Bytes) -> Result<ForwardResponse, ForwardError> {
        let response = self
            .client
            .post(&self.master_uri)
            .headers(copy_headers(&headers, FORWARDED_REQUEST_HEADERS))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let err = classify(e);
                warn!(error = %err, "forwarding to master failed");
                err
            })?;

        let status = response.status();
        let headers = copy_headers(response.headers(), RELAYED_RESPONSE_HEADERS);
        let body = response.bytes().await.map_err(|e| {
            let err = classify(e);
            warn!(error = %err, "reading master response failed");
            err
        })?;

        debug!(status = status.as_u16(), bytes = body.len(), "master answered");
        Ok(ForwardResponse {
            status,
            headers,
            body,
        })
    }
}
