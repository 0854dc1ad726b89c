//! Field Operations Dashboard (fops-dash) - main entry point
//!
//! Loads configuration, generates the geography and entity collections,
//! starts the dashboard runtime with its stream supervisor and status
//! poller, and serves the HTTP API until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fops_common::config::{DashboardConfig, CONFIG_ENV_VAR};
use fops_common::context::DashboardContext;
use fops_common::events::EventBus;
use fops_dash::dispatch::DecisionDispatcher;
use fops_dash::poller::run_status_poller;
use fops_dash::runtime::spawn_runtime;
use fops_dash::transport::{run_supervisor, SseTransport};
use fops_dash::{build_router, AppState};

/// Command-line arguments for fops-dash
///
/// Flags override the matching config file values.
#[derive(Parser, Debug)]
#[command(name = "fops-dash")]
#[command(about = "Field operations dashboard service")]
#[command(version)]
struct Args {
    /// Config file path (TOML)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5790
    #[arg(short, long, env = "FOPS_BIND")]
    bind: Option<String>,

    /// Seed for synthetic data generation
    #[arg(long)]
    seed: Option<u64>,

    /// Upstream event stream URL (SSE)
    #[arg(long, env = "FOPS_STREAM_URL")]
    stream_url: Option<String>,

    /// Manager status endpoint URL
    #[arg(long, env = "FOPS_STATUS_URL")]
    status_url: Option<String>,
}

impl Args {
    fn apply_to(&self, config: &mut DashboardConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(seed) = self.seed {
            config.generation.seed = seed;
        }
        if let Some(url) = &self.stream_url {
            config.stream.url = Some(url.clone());
        }
        if let Some(url) = &self.status_url {
            config.status.url = Some(url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fops_dash=info,fops_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting fops-dash v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config =
        DashboardConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    let context = Arc::new(
        DashboardContext::build(&config).context("Failed to build dashboard collections")?,
    );

    let bus = EventBus::new(config.feed.bus_capacity);
    let cancel = CancellationToken::new();
    let client = reqwest::Client::new();

    let dispatcher = config.feed.decision_webhook.as_ref().map(|url| {
        info!("Decisions will be posted to {}", url);
        DecisionDispatcher::new(client.clone(), url.clone())
    });

    let (runtime, runtime_task) = spawn_runtime(
        config.feed.gate_limits(),
        bus.clone(),
        dispatcher,
        cancel.child_token(),
    );

    let mut workers = Vec::new();

    match &config.stream.url {
        Some(url) => {
            info!("Connecting to event stream at {}", url);
            let transport = SseTransport::new(client.clone(), url.clone());
            workers.push(tokio::spawn(run_supervisor(
                transport,
                runtime.clone(),
                config.stream.reconnect_policy(),
                cancel.child_token(),
            )));
        }
        None => info!("No event stream configured; feed will only show local notices"),
    }

    if let Some(url) = &config.status.url {
        info!(
            "Polling manager status at {} every {:?}",
            url,
            config.status.poll_interval()
        );
        workers.push(tokio::spawn(run_status_poller(
            client.clone(),
            url.clone(),
            config.status.poll_interval(),
            runtime.clone(),
            cancel.child_token(),
        )));
    }

    let app = build_router(AppState::new(context, runtime, bus));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    if let Err(e) = runtime_task.await {
        warn!("Dashboard runtime ended abnormally: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
