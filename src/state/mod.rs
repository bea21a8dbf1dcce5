//! Shared process state: the installed storage backend and degraded flag.

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::dao::store::LeagueStore;

/// Cheaply clonable handle to the process-wide state.
pub type SharedState = Arc<AppState>;

/// Central application state holding the storage handle.
///
/// The process starts in degraded mode until the storage supervisor installs
/// a backend; services and the scheduler check the handle on every use and
/// skip or fail gracefully while it is absent.
pub struct AppState {
    store: RwLock<Option<Arc<dyn LeagueStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply. Starts degraded.
    pub fn new() -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// Build a state with a backend already installed (tests, local runs).
    pub fn with_store(store: Arc<dyn LeagueStore>) -> SharedState {
        let state = Self::new();
        {
            let mut guard = state.store.try_write().expect("fresh state is uncontended");
            *guard = Some(store);
        }
        state.update_degraded(false);
        state
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn LeagueStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new storage backend and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn LeagueStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current backend and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub(crate) fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
