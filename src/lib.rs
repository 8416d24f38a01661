// src/lib.rs
//! Interception proxy for the ROS master: every XML-RPC call is relayed
//! unchanged while the calling node's interface is recorded, and the
//! collected interfaces are written out as documentation on shutdown.

pub mod aggregator;
pub mod cli;
pub mod export;
pub mod handler;
pub mod record;
pub mod registry;
pub mod server;
pub mod upstream;
pub mod xmlrpc;

// Re-export tracing for use in other modules
pub use tracing;

// Re-export for tests
pub use aggregator::{NodeState, TrackingRules, UnregisterPolicy};
pub use export::{write_docs, DocFormat};
pub use handler::{intercept, HandleError};
pub use record::CallRecord;
pub use registry::{NodeFilter, Registry, Snapshot};
pub use server::{build_router, build_router_with_forwarder, serve};
pub use upstream::{ForwardError, ForwardResponse, Forwarder, UpstreamClient};
