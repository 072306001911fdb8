#![allow(clippy::doc_markdown)]
//! `SimState` Server - REST API for the `SimState` agent state engine.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simstate_core::{
    Coordinator, DecisionMaker, InMemoryStore, JsonFileStore, LoggingConfig, ObserveDecider,
    PersistenceBackend, SimConfig, StateStore,
};
use simstate_server::{router, AppState, HttpDecider};

/// SimState Server - agent state and memory for LLM-driven simulations
#[derive(Parser, Debug)]
#[command(name = "simstate-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "simstate.toml", env = "SIMSTATE_CONFIG")]
    config: String,

    /// Host address to bind to (overrides config)
    #[arg(long, env = "SIMSTATE_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "SIMSTATE_PORT")]
    port: Option<u16>,

    /// Directory for JSON agent snapshots; selects the json_file backend
    #[arg(short, long, env = "SIMSTATE_DATA_DIR")]
    data_dir: Option<String>,

    /// URL of the HTTP decision backend (overrides config)
    #[arg(long, env = "SIMSTATE_DECIDER_URL")]
    decider_url: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| format!("{},tower_http=debug", logging.level)),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_store(config: &SimConfig) -> anyhow::Result<Option<Arc<dyn StateStore>>> {
    let store: Option<Arc<dyn StateStore>> = match config.persistence.backend {
        PersistenceBackend::None => None,
        PersistenceBackend::Memory => Some(Arc::new(InMemoryStore::new())),
        PersistenceBackend::JsonFile => {
            Some(Arc::new(JsonFileStore::open(&config.persistence.data_dir)?))
        }
    };
    Ok(store)
}

fn build_decider(config: &SimConfig) -> anyhow::Result<Arc<dyn DecisionMaker>> {
    let server = &config.server;
    if server.decider_url.is_empty() {
        tracing::warn!("No decider URL configured, agents will only observe");
        return Ok(Arc::new(ObserveDecider));
    }
    let decider = HttpDecider::new(
        &server.decider_url,
        Duration::from_millis(server.decider_timeout_ms),
    )?;
    Ok(Arc::new(decider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = SimConfig::load_from_path(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.persistence.backend = PersistenceBackend::JsonFile;
        config.persistence.data_dir = data_dir;
    }
    if let Some(url) = args.decider_url {
        config.server.decider_url = url;
    }
    config.validate()?;

    init_tracing(&config.logging);
    tracing::info!("Starting SimState server...");
    tracing::info!("Persistence backend: {:?}", config.persistence.backend);

    let store = build_store(&config)?;
    let decider = build_decider(&config)?;
    let pending_timeout = config.coordinator.pending_timeout();
    let cors_enabled = config.server.cors_enabled;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let persistent = store.is_some();
    let mut builder = Coordinator::builder(config, decider);
    if let Some(store) = store {
        builder = builder.store(store);
    }
    let coordinator = builder.build()?;
    if persistent {
        match coordinator.load_all().await {
            Ok(loaded) => tracing::info!("Rehydrated {} agents", loaded),
            Err(e) => tracing::warn!("Could not rehydrate agents: {}", e),
        }
    }
    let state = Arc::new(AppState { coordinator });

    // Sweep plans that were never confirmed.
    let sweeper = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(pending_timeout.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let expired = sweeper.coordinator.expire_stale_plans();
            if !expired.is_empty() {
                tracing::info!("Expired {} stale plans", expired.len());
            }
        }
    });

    let mut app = router(state).layer(TraceLayer::new_for_http());
    if cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("SimState server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
