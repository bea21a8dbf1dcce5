use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{storage::StorageError, store::LeagueStore},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, keep it healthy, and hold the shared
/// state in degraded mode whenever the backend is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn LeagueStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    if store.health_check().await.is_ok() {
                        if state.is_degraded().await {
                            info!("storage healthy again; leaving degraded mode");
                            state.update_degraded(false);
                        }
                        sleep(HEALTH_POLL_INTERVAL).await;
                        continue;
                    }

                    if reconnect_with_backoff(&state, store.as_ref()).await {
                        state.update_degraded(false);
                        sleep(HEALTH_POLL_INTERVAL).await;
                    } else {
                        warn!("exhausted storage reconnect attempts; staying in degraded mode");
                        state.clear_store().await;
                        break;
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Try to revive a failing backend a bounded number of times. Flips the
/// state to degraded on the first failed attempt so consumers stop issuing
/// writes while the backoff runs.
async fn reconnect_with_backoff(state: &SharedState, store: &dyn LeagueStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::{
            models::{GameEntity, LeagueEntity, LeagueSeasonEntity, SeasonEntity},
            storage::StorageResult,
            watch::GameUpdates,
        },
        league::AssociationStatus,
        state::AppState,
    };

    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyStore {
        healthy: Arc<AtomicBool>,
    }

    impl LeagueStore for FlakyStore {
        fn find_game(&self, _id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            Box::pin(async { Ok(None) })
        }
        fn save_game(&self, _game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn watch_game(&self, _id: Uuid) -> BoxFuture<'static, StorageResult<GameUpdates>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "no watch".into(),
                    std::io::Error::other("down"),
                ))
            })
        }
        fn find_league(
            &self,
            _id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<LeagueEntity>>> {
            Box::pin(async { Ok(None) })
        }
        fn save_league(&self, _league: LeagueEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn league_seasons_by_status(
            &self,
            _status: AssociationStatus,
        ) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
        fn list_league_seasons(
            &self,
        ) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
        fn seasons_by_ids(
            &self,
            _ids: Vec<Uuid>,
        ) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
        fn delete_league_season(&self, _id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            let healthy = self.healthy.load(Ordering::SeqCst);
            Box::pin(async move {
                if healthy {
                    Ok(())
                } else {
                    Err(StorageError::unavailable(
                        "ping failed".into(),
                        std::io::Error::other("down"),
                    ))
                }
            })
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "reconnect failed".into(),
                    std::io::Error::other("down"),
                ))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_backend_degrades_the_state() {
        let state = AppState::new();
        let healthy = Arc::new(AtomicBool::new(true));
        let store_flag = healthy.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let healthy = store_flag.clone();
            async move {
                Ok(Arc::new(FlakyStore { healthy }) as Arc<dyn LeagueStore>)
            }
        }));

        let mut degraded = state.degraded_watcher();
        // The first connect installs the store and clears the flag; the
        // backend stays healthy, so the flag holds at false until observed.
        degraded
            .wait_for(|flag| !*flag)
            .await
            .expect("supervisor dropped the state");
        assert!(state.store().await.is_some());

        // Failing health checks and reconnects push it back to degraded.
        healthy.store(false, Ordering::SeqCst);
        degraded
            .wait_for(|flag| *flag)
            .await
            .expect("supervisor dropped the state");

        supervisor.abort();
    }
}
