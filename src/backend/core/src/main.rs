//! Jobscope Server - Main entry point
//!
//! Reads a scheduler event stream, keeps the model current, and serves the
//! timeline API.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use jobscope_core::{
    api::{self, AppState},
    clock::{Clock, SystemClock},
    config::Config,
    ingest::{Ingestor, JsonLinesSource, ModelStore},
    telemetry,
    timeline::{LayoutParams, TimelineLayoutEngine},
    view::LiveView,
};

#[derive(Debug, Parser)]
#[command(name = "jobscope-server", version, about = "Jobscope live scheduler timeline server")]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "JOBSCOPE_CONFIG")]
    config: Option<String>,

    /// Event stream to read; `-` for stdin. Overrides `ingest.source`.
    #[arg(short, long)]
    source: Option<String>,

    /// Port to listen on. Overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };
    if let Some(source) = args.source {
        config.ingest.source = source;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize telemetry
    let telemetry = telemetry::init_telemetry(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %config.ingest.source,
        "Starting Jobscope Server"
    );

    let cancel = CancellationToken::new();
    let store = ModelStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = TimelineLayoutEngine::new(config.timeline.geometry);

    // Start ingestion
    let ingestor = Ingestor::new(store.clone());
    let ingest_task = if config.ingest.reads_stdin() {
        ingestor.spawn(JsonLinesSource::stdin(), cancel.child_token())
    } else {
        let source = JsonLinesSource::open(&config.ingest.source).await?;
        ingestor.spawn(source, cancel.child_token())
    };

    // Start the live view
    let params = LayoutParams::overview(config.timeline.default_width, config.timeline.default_interval)
        .with_interval_px(config.timeline.interval_px)
        .with_min_intervals(config.timeline.min_intervals);
    let live_view = LiveView::new(store.clone(), engine, clock.clone(), config.view.clone(), params)
        .spawn(cancel.child_token());

    // Build router
    let state = AppState::new(store)
        .with_clock(clock)
        .with_metrics(telemetry.metrics.clone())
        .with_timeline(config.timeline.clone())
        .with_live_view(live_view.client());
    let app = api::build_router(state);

    // Start server
    let addr: SocketAddr = config.server.bind_address().parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // Cleanup
    cancel.cancel();
    live_view.shutdown().await;
    match ingest_task.await {
        Ok(Ok(summary)) => tracing::info!(
            messages = summary.messages,
            sessions = summary.sessions,
            "Ingestion finished"
        ),
        Ok(Err(err)) => err.log(),
        Err(err) => tracing::warn!(error = %err, "Ingest task failed"),
    }
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for a shutdown signal, then cancel background tasks.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
