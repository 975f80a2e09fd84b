//! JIT Access server.
//!
//! Serves the access-request endpoint and runs the reclaimer loop in the
//! same process. Configuration comes from `JIT_*` environment variables;
//! the process refuses to start if the target resource is not set.

mod http;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use jit_access::{
    AllowListStore, FileStore, GrantIssuer, GrantReclaimer, ReclaimScheduler, ServiceConfig,
};

/// JIT Access server: time-boxed firewall grants over HTTP.
#[derive(Parser, Debug)]
#[command(name = "jit-access-server", version, about = "JIT Access server")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:7071")]
    bind: SocketAddr,

    /// Rule store directory (overrides JIT_STORE_DIR)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Serve requests without running the reclaimer
    #[arg(long)]
    no_reclaimer: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Library crates log through `log`; the subscriber picks those up too.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServiceConfig::from_env().context("loading configuration")?;
    if let Some(dir) = args.store_dir {
        config.store_dir = dir;
    }

    let store: Arc<dyn AllowListStore> = Arc::new(
        FileStore::open(&config.store_dir, &config.target)
            .with_context(|| format!("opening rule store at {}", config.store_dir.display()))?,
    );
    let issuer = Arc::new(GrantIssuer::new(
        store.clone(),
        config.target.clone(),
        config.access,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (report_tx, report_rx) = watch::channel(None);
    let reclaimer = if args.no_reclaimer {
        tracing::warn!("reclaimer disabled; expired grants will not be revoked by this process");
        None
    } else {
        let reclaimer = GrantReclaimer::new(store).with_store_timeout(config.reclaim.store_timeout);
        Some(
            ReclaimScheduler::new(Arc::new(reclaimer), config.reclaim.interval)
                .with_reports(report_tx)
                .spawn(shutdown_rx),
        )
    };

    let app = http::router(http::AppState {
        issuer,
        last_scan: report_rx,
    });
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!(
        bind = %args.bind,
        server = %config.target.server_name,
        ttl_secs = config.access.ttl.as_secs(),
        "jit-access-server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving HTTP")?;

    shutdown_tx.send_replace(true);
    if let Some(handle) = reclaimer {
        let scans = handle.await.context("joining reclaimer")?;
        tracing::info!(scans, "reclaimer joined");
    }
    Ok(())
}
