//! In-memory storage backend used by tests and store-less local runs.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameEntity, LeagueEntity, LeagueSeasonEntity, SeasonEntity},
        storage::{StorageError, StorageResult},
        store::LeagueStore,
        watch::{GameUpdates, UpdateHub},
    },
    league::AssociationStatus,
};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// In-memory implementation of [`LeagueStore`] over concurrent maps.
///
/// Behaves like the document store it stands in for: per-document atomic
/// writes with a revision check, and change notification through an
/// [`UpdateHub`].
#[derive(Clone)]
pub struct MemoryLeagueStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    games: DashMap<Uuid, GameEntity>,
    leagues: DashMap<Uuid, LeagueEntity>,
    seasons: DashMap<Uuid, SeasonEntity>,
    league_seasons: DashMap<Uuid, LeagueSeasonEntity>,
    updates: UpdateHub,
}

impl MemoryLeagueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                games: DashMap::new(),
                leagues: DashMap::new(),
                seasons: DashMap::new(),
                league_seasons: DashMap::new(),
                updates: UpdateHub::new(UPDATE_CHANNEL_CAPACITY),
            }),
        }
    }

    /// Seed a season document directly (test/admin path, no revision check).
    pub fn put_season(&self, season: SeasonEntity) {
        self.inner.seasons.insert(season.id, season);
    }

    /// Seed an association row directly (test/admin path, no revision check).
    pub fn put_league_season(&self, association: LeagueSeasonEntity) {
        self.inner
            .league_seasons
            .insert(association.id, association);
    }

    /// Seed a league document directly (test/admin path, no revision check).
    pub fn put_league(&self, league: LeagueEntity) {
        self.inner.leagues.insert(league.id, league);
    }

    /// Remove a season document, leaving any association rows orphaned.
    pub fn remove_season(&self, id: Uuid) {
        self.inner.seasons.remove(&id);
    }

    /// Remove a league document, leaving any association rows orphaned.
    pub fn remove_league(&self, id: Uuid) {
        self.inner.leagues.remove(&id);
    }

    fn checked_save_game(&self, mut game: GameEntity) -> StorageResult<()> {
        // The entry guard makes the read-check-write atomic per document.
        match self.inner.games.entry(game.id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().revision != game.revision {
                    return Err(StorageError::Conflict { id: game.id });
                }
                game.revision += 1;
                occupied.insert(game.clone());
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                game.revision += 1;
                vacant.insert(game.clone());
            }
        }
        self.inner.updates.publish(&game);
        Ok(())
    }

    fn checked_save_league(&self, mut league: LeagueEntity) -> StorageResult<()> {
        match self.inner.leagues.entry(league.id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().revision != league.revision {
                    return Err(StorageError::Conflict { id: league.id });
                }
                league.revision += 1;
                occupied.insert(league);
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                league.revision += 1;
                vacant.insert(league);
            }
        }
        Ok(())
    }
}

impl Default for MemoryLeagueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LeagueStore for MemoryLeagueStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.games.get(&id).map(|entry| entry.clone())) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.checked_save_game(game) })
    }

    fn watch_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<GameUpdates>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.updates.subscribe(id)) })
    }

    fn find_league(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LeagueEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.leagues.get(&id).map(|entry| entry.clone())) })
    }

    fn save_league(&self, league: LeagueEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.checked_save_league(league) })
    }

    fn league_seasons_by_status(
        &self,
        status: AssociationStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .league_seasons
                .iter()
                .filter(|entry| entry.status == status)
                .map(|entry| entry.clone())
                .collect())
        })
    }

    fn list_league_seasons(&self) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .league_seasons
                .iter()
                .map(|entry| entry.clone())
                .collect())
        })
    }

    fn seasons_by_ids(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(ids
                .into_iter()
                .filter_map(|id| store.inner.seasons.get(&id).map(|entry| entry.clone()))
                .collect())
        })
    }

    fn delete_league_season(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.league_seasons.remove(&id);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::game::{Game, GameSettings, Participants};

    fn game_entity() -> GameEntity {
        let now = datetime!(2025-06-01 12:00 UTC);
        let game = Game::new(
            Participants::Singles {
                creator: Uuid::new_v4(),
                opponent: Uuid::new_v4(),
            },
            GameSettings { points_to_win: 100 },
            now,
        );
        GameEntity::from_game(game, 0)
    }

    #[tokio::test]
    async fn save_bumps_revision_and_rejects_stale_writers() {
        let store = MemoryLeagueStore::new();
        let entity = game_entity();
        let id = entity.id;

        store.save_game(entity.clone()).await.unwrap();
        let stored = store.find_game(id).await.unwrap().unwrap();
        assert_eq!(stored.revision, 1);

        // A second writer with the same original snapshot loses the race.
        let err = store.save_game(entity).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { id: conflict } if conflict == id));
    }

    #[tokio::test]
    async fn saved_games_are_published_to_watchers() {
        let store = MemoryLeagueStore::new();
        let entity = game_entity();
        let mut updates = store.watch_game(entity.id).await.unwrap();

        store.save_game(entity.clone()).await.unwrap();
        let update = updates.next().await.unwrap();
        assert_eq!(update.id, entity.id);
        assert_eq!(update.revision, 1);
    }
}
