use anyhow::{bail, Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::config::{Config, Settings};
use crate::cli::RunArgs;
use crate::export::write_docs;
use crate::registry::{NodeFilter, Registry, Snapshot};
use crate::server::{build_router_with_forwarder, serve, shutdown_signal};
use crate::upstream::UpstreamClient;

pub async fn execute_run(args: RunArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let settings = Settings::resolve(&args, config)?;

    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen))?;

    let written = run_proxy(settings, listener, shutdown_signal()).await?;
    for path in &written {
        eprintln!("  wrote {}", path.display());
    }
    Ok(())
}

/// Proxy on `listener` until `shutdown` resolves, then document what was seen.
pub async fn run_proxy<S>(settings: Settings, listener: TcpListener, shutdown: S) -> Result<Vec<PathBuf>>
where
    S: Future<Output = ()> + Send + 'static,
{
    // Fail before proxying anything rather than after the user's session
    if !settings.output_dir.is_dir() {
        bail!(
            "output directory does not exist: {}",
            settings.output_dir.display()
        );
    }

    let client = UpstreamClient::new(settings.master_uri.clone(), settings.upstream_timeout)
        .map_err(anyhow::Error::msg)?;

    if settings.check_master {
        let pid = client
            .master_pid()
            .await
            .with_context(|| format!("failed to communicate with the ROS master at {}", settings.master_uri))?;
        info!(master = %settings.master_uri, pid, "master is reachable");
    }

    let registry = Arc::new(Registry::new(settings.rules.clone()));
    let app = build_router_with_forwarder(Arc::new(client), registry.clone());

    let local = listener.local_addr()?;
    info!(
        listen = %local,
        master = %settings.master_uri,
        "proxy running; point ROS_MASTER_URI at http://<this host>:{}",
        local.port()
    );

    serve(listener, app, shutdown).await.context("proxy server failed")?;

    let snapshot = registry.snapshot(&settings.nodes);
    info!(
        observed = registry.len(),
        documented = snapshot.len(),
        "proxy stopped"
    );

    let missing = unobserved(&settings.nodes, &snapshot);
    for node in &missing {
        warn!(node = %node, "requested node was never observed; no page written");
    }

    if snapshot.is_empty() {
        if !settings.nodes.is_empty() {
            let wanted: Vec<&str> = settings.nodes.names().collect();
            bail!(
                "none of the requested nodes were observed: {}",
                wanted.join(", ")
            );
        }
        warn!("no nodes were observed; nothing to document");
    }

    let written = write_docs(&snapshot, &settings.output_dir, settings.format)?;
    Ok(written)
}

/// Requested node names with no entry in `snapshot`.
fn unobserved<'a>(filter: &'a NodeFilter, snapshot: &Snapshot) -> Vec<&'a str> {
    filter
        .names()
        .filter(|name| !snapshot.contains_key(*name))
        .collect()
}
