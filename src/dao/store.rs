//! Document-store adapter trait consumed by the engine.

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameEntity, LeagueEntity, LeagueSeasonEntity, SeasonEntity},
        storage::StorageResult,
        watch::GameUpdates,
    },
    league::AssociationStatus,
};

/// Abstraction over the persistence layer for games, leagues, seasons, and
/// their associations.
///
/// Saves of games and leagues are revision-checked: a stale revision yields
/// `StorageError::Conflict` and the caller must re-read. Everything else is
/// a plain document read, query, or delete.
pub trait LeagueStore: Send + Sync {
    /// Load a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Save a game, rejecting stale revisions.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Subscribe to change notifications for a game document.
    fn watch_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<GameUpdates>>;
    /// Load a league by id.
    fn find_league(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LeagueEntity>>>;
    /// Save a league, rejecting stale revisions.
    fn save_league(&self, league: LeagueEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// All league/season association rows with the given status.
    fn league_seasons_by_status(
        &self,
        status: AssociationStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>>;
    /// All league/season association rows regardless of status.
    fn list_league_seasons(&self) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>>;
    /// Seasons matching the given ids; missing ids are silently absent.
    fn seasons_by_ids(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>>;
    /// Remove an association row, typically during orphan cleanup.
    fn delete_league_season(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness probe of the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a lost backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
