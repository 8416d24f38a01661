// src/upstream/mod.rs
pub mod client;
pub mod forwarder;

pub use client::{UpstreamClient, DEFAULT_TIMEOUT, PROXY_CALLER_ID};
pub use forwarder::{ForwardError, ForwardResponse, Forwarder};
