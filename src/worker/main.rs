use guardian_supervisor::{
    config::Config,
    pipeline::DecisionPipeline,
    policy::{seed_default_rules, AllowlistRegistry, PolicyLoader},
    scorer::create_scorer,
    state::create_store,
    streams::{GuardianWorker, StreamBus},
};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guardian_supervisor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Guardian worker v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = guardian_supervisor::metrics::init_metrics() {
        tracing::warn!("Failed to initialize metrics: {}", e);
    }

    // Store must be reachable at startup; exit non-zero otherwise
    tracing::info!("Storage backend: {:?}", config.state.backend);
    let store = create_store(&config.state).await?;

    if config.policy.seed_defaults {
        let seeded = seed_default_rules(&store).await?;
        if seeded > 0 {
            tracing::info!(count = seeded, "Seeded default policies");
        }
    }

    let allowlists = Arc::new(AllowlistRegistry::from_config(&config.policy));
    let loader = PolicyLoader::new(store.clone(), allowlists);
    let scorer = create_scorer(&config.llm);
    let pipeline = Arc::new(DecisionPipeline::new(store, loader, scorer));

    let bus = Arc::new(StreamBus::new(&config.streams.url)?);
    let worker = GuardianWorker::new(bus, pipeline, config.streams.clone());

    // Broker must be reachable at startup; exit non-zero otherwise
    worker.bootstrap().await?;

    // SIGINT and SIGTERM both drain the in-flight batch before exit
    let mut sigterm = signal(SignalKind::terminate())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupt received"),
            _ = sigterm.recv() => tracing::info!("Terminate received"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;

    tracing::info!("Guardian worker stopped");
    Ok(())
}
