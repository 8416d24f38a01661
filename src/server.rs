// src/server.rs
use axum::{
    body::Bytes as AxumBytes,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::handler::{intercept, HandleError};
use crate::registry::{NodeFilter, Registry, Snapshot};
use crate::upstream::{ForwardError, Forwarder, UpstreamClient};
use crate::xmlrpc::{encode_fault, FAULT_PARSE_ERROR};

/// Initialize tracing subscriber.
/// Uses RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(filter)
        .init();
}

#[derive(Clone)]
pub struct ProxyState {
    pub registry: Arc<Registry>,
    pub forwarder: Arc<dyn Forwarder>,
}

/// Router that relays master calls to `master_uri`.
pub fn build_router(
    master_uri: String,
    timeout: Duration,
    registry: Arc<Registry>,
) -> Result<Router, String> {
    let client = UpstreamClient::new(master_uri, timeout)?;
    Ok(build_router_with_forwarder(Arc::new(client), registry))
}

pub fn build_router_with_forwarder(forwarder: Arc<dyn Forwarder>, registry: Arc<Registry>) -> Router {
    let state = ProxyState {
        registry,
        forwarder,
    };

    // ROS clients post to the bare master URI; /RPC2 is the generic XML-RPC path.
    // The master accepts calls of any size, so the proxy does too.
    Router::new()
        .route("/", post(handle_call_axum))
        .route("/RPC2", post(handle_call_axum))
        .route("/health", get(|| async { "ok" }))
        .route("/nodes", get(handle_nodes_axum))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Serve `app` until `shutdown` resolves, then let in-flight calls finish.
pub async fn serve<S>(listener: TcpListener, app: Router, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down proxy");
}

async fn handle_call_axum(
    State(state): State<ProxyState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Response {
    let origin = connect_info.map(|ConnectInfo(addr)| addr.ip());

    match intercept(
        headers,
        body,
        origin,
        state.registry.as_ref(),
        state.forwarder.as_ref(),
    )
    .await
    {
        Ok(upstream) => (upstream.status, upstream.headers, upstream.body).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_nodes_axum(State(state): State<ProxyState>) -> Json<Snapshot> {
    Json(state.registry.snapshot(&NodeFilter::all()))
}

fn error_response(err: HandleError) -> Response {
    match err {
        // XML-RPC faults travel as successful HTTP responses
        HandleError::Decompress(_) | HandleError::Decode(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml")],
            encode_fault(FAULT_PARSE_ERROR, &err.to_string()),
        )
            .into_response(),
        HandleError::Forward(e) => {
            warn!(error = %e, "transport fault relayed to caller");
            let status = match e {
                ForwardError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, e.to_string()).into_response()
        }
    }
}
