#![allow(dead_code)] // Test helpers appear unused when compiled independently

use autodoc_proxy::registry::Registry;
use autodoc_proxy::server::{build_router, serve};
use autodoc_proxy::xmlrpc::{decode_call, encode_response, Value};
use autodoc_proxy::TrackingRules;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);

pub const MASTER_PID: i64 = 4242;

#[derive(Clone)]
struct MasterState {
    bodies: Arc<Mutex<Vec<Bytes>>>,
}

/// In-process stand-in for the ROS master. Answers every call with
/// `[1, "ok", <result>]` and keeps the raw request bodies it received.
pub struct MockMaster {
    bodies: Arc<Mutex<Vec<Bytes>>>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockMaster {
    pub async fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().await.clone()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Running proxy in front of some master URI.
pub struct ProxyHandle {
    pub url: String,
    pub registry: Arc<Registry>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProxyHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Find an available TCP port
pub async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

/// Spawn the mock master, return (handle, base URL)
pub async fn spawn_mock_master() -> (MockMaster, String) {
    let state = MasterState {
        bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let bodies = state.bodies.clone();

    let app = Router::new()
        .route("/", post(answer))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::disable())
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock master listener");
    let port = listener.local_addr().unwrap().port();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("mock master server error: {}", err);
        }
    });

    (
        MockMaster {
            bodies,
            shutdown_tx,
            handle,
        },
        format!("http://127.0.0.1:{}", port),
    )
}

/// Spawn a master that accepts calls but answers only after `delay`.
pub async fn spawn_slow_master(delay: Duration) -> (MockMaster, String) {
    let state = MasterState {
        bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let bodies = state.bodies.clone();

    let app = Router::new()
        .route(
            "/",
            post(move |state: State<MasterState>, body: Bytes| async move {
                tokio::time::sleep(delay).await;
                answer(state, body).await
            }),
        )
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind slow master listener");
    let port = listener.local_addr().unwrap().port();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("slow master server error: {}", err);
        }
    });

    (
        MockMaster {
            bodies,
            shutdown_tx,
            handle,
        },
        format!("http://127.0.0.1:{}", port),
    )
}

/// Spawn the proxy in front of `master_uri`.
pub async fn spawn_proxy(master_uri: &str, rules: TrackingRules) -> ProxyHandle {
    spawn_proxy_with_timeout(master_uri, rules, Duration::from_secs(5)).await
}

/// Spawn the proxy with a specific upstream timeout.
pub async fn spawn_proxy_with_timeout(
    master_uri: &str,
    rules: TrackingRules,
    timeout: Duration,
) -> ProxyHandle {
    let registry = Arc::new(Registry::new(rules));
    let app = build_router(master_uri.to_string(), timeout, registry.clone())
        .expect("failed to build proxy router");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind proxy listener");
    let port = listener.local_addr().unwrap().port();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(err) = serve(listener, app, shutdown).await {
            eprintln!("proxy server error: {}", err);
        }
    });

    ProxyHandle {
        url: format!("http://127.0.0.1:{}", port),
        registry,
        shutdown_tx,
        handle,
    }
}

/// Post an XML-RPC body and return (status, content-type, body).
pub async fn post_xml(client: &Client, url: &str, body: String) -> (StatusCode, String, Bytes) {
    let response = client
        .post(url)
        .header(header::CONTENT_TYPE, "text/xml")
        .body(body)
        .send()
        .await
        .expect("request failed");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.bytes().await.expect("failed to read body");
    (status, content_type, body)
}

/// Wait for a server to respond to /health
pub async fn wait_for_health(client: &Client, base_url: &str) {
    poll_until(|| async {
        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .ok()
            .map(|_| ())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} to be healthy", base_url));
}

pub async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}

async fn answer(State(state): State<MasterState>, body: Bytes) -> impl IntoResponse {
    state.bodies.lock().await.push(body.clone());

    let result = match decode_call(&body) {
        Ok(call) if call.method == "getPid" => Value::Int(MASTER_PID),
        Ok(call) if call.method == "registerService" => Value::Int(1),
        Ok(call) if call.method.starts_with("register") => Value::Array(Vec::new()),
        Ok(call) if call.method == "lookupService" => Value::from("rosrpc://127.0.0.1:5000"),
        Ok(_) => Value::Int(0),
        Err(_) => return (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, "text/plain")], "bad request".to_string()),
    };

    let response = Value::Array(vec![Value::Int(1), Value::from("ok"), result]);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        encode_response(&response),
    )
}
