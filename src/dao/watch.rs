//! Change-notification channel from the store adapter to consumers.
//!
//! Backends publish updated game documents into a per-game broadcast hub;
//! subscribers either drain raw updates or wrap them in a debounced stream
//! whose quiet window is a parameter, not an ad hoc timer.

use std::time::Duration;

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::dao::models::GameEntity;

/// Subscription to change notifications for a single game document.
pub struct GameUpdates {
    receiver: broadcast::Receiver<GameEntity>,
}

impl GameUpdates {
    /// Wrap a broadcast receiver obtained from an [`UpdateHub`].
    pub fn new(receiver: broadcast::Receiver<GameEntity>) -> Self {
        Self { receiver }
    }

    /// Next update, or `None` once the publishing side is gone.
    ///
    /// A slow subscriber that lags behind the channel capacity skips to the
    /// most recent updates rather than erroring out.
    pub async fn next(&mut self) -> Option<GameEntity> {
        loop {
            match self.receiver.recv().await {
                Ok(entity) => return Some(entity),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "game update subscriber lagged; catching up");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Collapse bursts of updates, yielding only the latest document once no
    /// further update arrived within `window`.
    pub fn debounced(mut self, window: Duration) -> impl Stream<Item = GameEntity> + Send {
        async_stream::stream! {
            while let Some(mut latest) = self.next().await {
                loop {
                    match timeout(window, self.next()).await {
                        Ok(Some(update)) => latest = update,
                        Ok(None) => {
                            yield latest;
                            return;
                        }
                        Err(_) => break,
                    }
                }
                yield latest;
            }
        }
    }
}

/// Per-game broadcast hub used by storage backends to fan out updates.
pub struct UpdateHub {
    channels: DashMap<Uuid, broadcast::Sender<GameEntity>>,
    capacity: usize,
}

impl UpdateHub {
    /// Construct a hub whose per-game channels buffer `capacity` updates.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Register a subscriber for the given game id.
    pub fn subscribe(&self, id: Uuid) -> GameUpdates {
        let sender = self
            .channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        GameUpdates::new(sender.subscribe())
    }

    /// Publish an updated document to all current subscribers, ignoring
    /// delivery errors.
    pub fn publish(&self, game: &GameEntity) {
        if let Some(sender) = self.channels.get(&game.id) {
            let _ = sender.send(game.clone());
        }
    }

    /// Number of live subscribers for the given game id.
    pub fn subscriber_count(&self, id: Uuid) -> usize {
        self.channels
            .get(&id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
