// src/upstream/forwarder.rs
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use std::fmt;

/// Errors that can occur when relaying a call to the master
#[derive(Debug)]
pub enum ForwardError {
    Timeout,
    Unreachable(String),
    Network(String),
    BadResponse(String),
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardError::Timeout => write!(f, "master did not answer in time"),
            ForwardError::Unreachable(msg) => write!(f, "master unreachable: {}", msg),
            ForwardError::Network(msg) => write!(f, "network error: {}", msg),
            ForwardError::BadResponse(msg) => write!(f, "unexpected master response: {}", msg),
        }
    }
}

impl std::error::Error for ForwardError {}

/// The master's answer, exactly as received.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Trait for relaying raw calls to the master (abstracts the HTTP client)
#[async_trait::async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, headers: HeaderMap, body: Bytes) -> Result<ForwardResponse, ForwardError>;
}
