//! Worker binary wiring storage, the league resolver scheduler, and its
//! activity monitor together.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domino_league_back::{
    clock::SystemClock,
    config::AppConfig,
    services::{activity::ActivityMonitor, scheduler::ResolverScheduler},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let state = AppState::new();

    spawn_storage(state.clone()).await;

    let scheduler = ResolverScheduler::new(
        state.clone(),
        Arc::new(SystemClock),
        config.scheduler.clone(),
    );
    let monitor = ActivityMonitor::new(scheduler.clone(), config.activity.clone());
    scheduler.start();
    monitor.start();
    info!("league worker started");

    shutdown_signal().await;
    info!("shutdown signal received");
    monitor.stop();
    scheduler.stop();

    Ok(())
}

/// Start the MongoDB storage supervisor, or install the in-memory store when
/// the backend feature is disabled.
#[cfg(feature = "mongo-store")]
async fn spawn_storage(state: domino_league_back::state::SharedState) {
    use domino_league_back::dao::{
        mongodb::{MongoConfig, MongoLeagueStore},
        storage::StorageError,
        store::LeagueStore,
    };
    use domino_league_back::services::storage_supervisor;

    tokio::spawn(storage_supervisor::run(state, || async {
        let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
        let store = MongoLeagueStore::connect(config)
            .await
            .map_err(StorageError::from)?;
        Ok(Arc::new(store) as Arc<dyn LeagueStore>)
    }));
}

/// Start the MongoDB storage supervisor, or install the in-memory store when
/// the backend feature is disabled.
#[cfg(not(feature = "mongo-store"))]
async fn spawn_storage(state: domino_league_back::state::SharedState) {
    use domino_league_back::dao::memory::MemoryLeagueStore;
    use tracing::warn;

    warn!("mongo-store feature disabled; using volatile in-memory storage");
    state
        .install_store(Arc::new(MemoryLeagueStore::new()))
        .await;
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the worker down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
