//! CDD Server
//!
//! This binary serves the clinical data dictionary REST API out of the
//! refreshable metadata cache, refreshing from Graphite on a schedule and
//! mirroring the dictionary through the two-region attribute store.

mod api;
mod refresh;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use cdd_dictionary::{DictionaryService, MetadataCache};
use cdd_graphite::{GraphiteConfig, GraphiteSource};
use cdd_store::AttributeStore;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;

#[derive(Parser, Debug)]
#[command(name = "cdd-server")]
#[command(about = "Clinical Data Dictionary Service")]
#[command(version)]
struct Args {
    /// Listen address for the REST API
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Graphite SPARQL endpoint URL
    #[arg(long, env = "GRAPHITE_URL")]
    graphite_url: String,

    /// Graphite basic auth username
    #[arg(long, env = "GRAPHITE_USERNAME", default_value = "")]
    graphite_username: String,

    /// Graphite basic auth password
    #[arg(long, env = "GRAPHITE_PASSWORD", default_value = "")]
    graphite_password: String,

    /// Namespace bound to the cdd: prefix in dictionary queries
    #[arg(long, default_value = "")]
    cdd_namespace_prefix: String,

    /// Concept scheme (graph) id holding the dictionary
    #[arg(long, default_value = "")]
    cdd_graph_id: String,

    /// Graphite request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Data directory for the live and backup dictionary regions
    #[arg(long, default_value = "/var/lib/cdd")]
    data_dir: std::path::PathBuf,

    /// Run without persistent storage (no live mirror, no backup recovery)
    #[arg(long, default_value_t = false)]
    no_persistence: bool,

    /// Seconds between scheduled dictionary refreshes
    #[arg(long, default_value_t = 3600)]
    refresh_interval_secs: u64,

    /// Seconds between dictionary backups
    #[arg(long, default_value_t = 86400)]
    backup_interval_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CDD Server");
    info!("Graphite endpoint: {}", args.graphite_url);

    // Metadata source
    let config = GraphiteConfig::new(args.graphite_url.clone())
        .with_username(args.graphite_username.clone())
        .with_password(args.graphite_password.clone())
        .with_namespace_prefix(args.cdd_namespace_prefix.clone())
        .with_graph_id(args.cdd_graph_id.clone())
        .with_timeout_secs(args.request_timeout_secs);
    let source = Arc::new(GraphiteSource::new(config).context("configure graphite source")?);

    // Refreshable cache, persistence-backed unless disabled
    let mut cache = MetadataCache::new(source);
    if args.no_persistence {
        info!("Persistence disabled, dictionary is memory-only");
    } else {
        let store = Arc::new(AttributeStore::new(&args.data_dir).context("open attribute store")?);
        cache = cache.with_store(store);
    }
    let cache = Arc::new(cache);

    let state = Arc::new(AppState {
        service: DictionaryService::new(Arc::clone(&cache)),
        cache: Arc::clone(&cache),
    });

    // Background refresh (the immediate first tick is the startup fetch)
    // and the scheduled backup trigger
    tokio::spawn(refresh::refresh_loop(
        Arc::clone(&cache),
        Duration::from_secs(args.refresh_interval_secs),
    ));
    tokio::spawn(refresh::backup_loop(
        Arc::clone(&cache),
        Duration::from_secs(args.backup_interval_secs),
    ));

    // Consumers hit the endpoints both with and without a trailing slash,
    // so both spellings are registered explicitly.
    let app = Router::new()
        .route("/api", get(api::list_metadata))
        .route("/api", post(api::resolve_metadata))
        .route("/api/", get(api::list_metadata))
        .route("/api/", post(api::resolve_metadata))
        .route("/api/cancerStudies", get(api::list_cancer_studies))
        .route("/api/refreshCache", get(api::refresh_cache))
        .route("/api/{column_header}", get(api::get_metadata))
        .route("/api/{column_header}/", get(api::get_metadata))
        .route("/health", get(api::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Parse listen address
    let addr: SocketAddr = args
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", args.listen, e))?;

    info!("Starting REST API server on {}", addr);

    // Start server
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("CDD Server shut down gracefully");

    Ok(())
}
