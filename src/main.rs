use guardian_supervisor::{
    api::{build_router, AppState},
    config::Config,
    pipeline::DecisionPipeline,
    policy::{seed_default_rules, AllowlistRegistry, PolicyLoader},
    scorer::create_scorer,
    state::create_store,
    streams::StreamBus,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guardian_supervisor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Guardian Supervisor v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if let Err(e) = guardian_supervisor::metrics::init_metrics() {
        tracing::warn!("Failed to initialize metrics: {}", e);
    }

    // Initialize storage backend
    tracing::info!("Storage backend: {:?}", config.state.backend);
    let store = create_store(&config.state).await?;

    // Seed the default rule set on an empty policy store
    if config.policy.seed_defaults {
        let seeded = seed_default_rules(&store).await?;
        if seeded > 0 {
            tracing::info!(count = seeded, "Seeded default policies");
        }
    }

    // Compose the pipeline
    let allowlists = Arc::new(AllowlistRegistry::from_config(&config.policy));
    let loader = PolicyLoader::new(store.clone(), allowlists);
    let scorer = create_scorer(&config.llm);
    let pipeline = Arc::new(
        DecisionPipeline::new(store.clone(), loader, scorer)
            .with_sync_approvals(config.processing.sync_create_approvals),
    );

    // Stream broker (connected lazily; outages surface as 503s)
    let bus = Arc::new(StreamBus::new(&config.streams.url)?);

    let state = AppState::new(pipeline, store, bus, config.streams.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
