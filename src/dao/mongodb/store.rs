//! MongoDB implementation of the [`LeagueStore`] adapter.
//!
//! Ids and timestamps are stored as strings (uuid and RFC 3339 forms), so
//! filters compare plain string fields. Revision-checked saves use the
//! stored `revision` in the replace filter; a zero match count with an
//! existing document means another writer won.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
};
use crate::{
    dao::{
        models::{GameEntity, LeagueEntity, LeagueSeasonEntity, SeasonEntity},
        storage::{StorageError, StorageResult},
        store::LeagueStore,
        watch::{GameUpdates, UpdateHub},
    },
    league::AssociationStatus,
};

const GAME_COLLECTION: &str = "games";
const LEAGUE_COLLECTION: &str = "leagues";
const SEASON_COLLECTION: &str = "seasons";
const LEAGUE_SEASON_COLLECTION: &str = "league_seasons";

const UPDATE_CHANNEL_CAPACITY: usize = 16;
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// MongoDB-backed [`LeagueStore`].
#[derive(Clone)]
pub struct MongoLeagueStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    updates: UpdateHub,
    pollers: DashMap<Uuid, ()>,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn id_filter(id: Uuid) -> Document {
    doc! {"id": id.to_string()}
}

impl MongoLeagueStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            updates: UpdateHub::new(UPDATE_CHANNEL_CAPACITY),
            pollers: DashMap::new(),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        for collection_name in [
            GAME_COLLECTION,
            LEAGUE_COLLECTION,
            SEASON_COLLECTION,
            LEAGUE_SEASON_COLLECTION,
        ] {
            let collection = database.collection::<Document>(collection_name);
            let index = IndexModel::builder()
                .keys(doc! {"id": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection_name}_id_idx")))
                        .unique(Some(true))
                        .build(),
                )
                .build();
            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: "id",
                    source,
                })?;
        }

        // The scheduler filters associations by status on every run.
        let associations = database.collection::<Document>(LEAGUE_SEASON_COLLECTION);
        let status_index = IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("league_season_status_idx".to_owned()))
                    .build(),
            )
            .build();
        associations
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: LEAGUE_SEASON_COLLECTION,
                index: "status",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn game_collection(&self) -> Collection<GameEntity> {
        self.database().await.collection(GAME_COLLECTION)
    }

    async fn league_collection(&self) -> Collection<LeagueEntity> {
        self.database().await.collection(LEAGUE_COLLECTION)
    }

    async fn season_collection(&self) -> Collection<SeasonEntity> {
        self.database().await.collection(SEASON_COLLECTION)
    }

    async fn league_season_collection(&self) -> Collection<LeagueSeasonEntity> {
        self.database().await.collection(LEAGUE_SEASON_COLLECTION)
    }

    async fn save_game_checked(&self, mut game: GameEntity) -> StorageResult<()> {
        let id = game.id;
        let expected = game.revision;
        game.revision += 1;

        let collection = self.game_collection().await;
        let filter = doc! {"id": id.to_string(), "revision": expected as i64};
        let result = collection.replace_one(filter, &game).await.map_err(|source| {
            StorageError::from(MongoDaoError::SaveDocument {
                collection: GAME_COLLECTION,
                id,
                source,
            })
        })?;

        if result.matched_count == 0 {
            let existing = collection.find_one(id_filter(id)).await.map_err(|source| {
                StorageError::from(MongoDaoError::LoadDocument {
                    collection: GAME_COLLECTION,
                    id,
                    source,
                })
            })?;
            if existing.is_some() || expected != 0 {
                return Err(StorageError::Conflict { id });
            }
            collection.insert_one(&game).await.map_err(|source| {
                StorageError::from(MongoDaoError::SaveDocument {
                    collection: GAME_COLLECTION,
                    id,
                    source,
                })
            })?;
        }

        self.inner.updates.publish(&game);
        Ok(())
    }

    async fn save_league_checked(&self, mut league: LeagueEntity) -> StorageResult<()> {
        let id = league.id;
        let expected = league.revision;
        league.revision += 1;

        let collection = self.league_collection().await;
        let filter = doc! {"id": id.to_string(), "revision": expected as i64};
        let result = collection
            .replace_one(filter, &league)
            .await
            .map_err(|source| {
                StorageError::from(MongoDaoError::SaveDocument {
                    collection: LEAGUE_COLLECTION,
                    id,
                    source,
                })
            })?;

        if result.matched_count == 0 {
            let existing = collection.find_one(id_filter(id)).await.map_err(|source| {
                StorageError::from(MongoDaoError::LoadDocument {
                    collection: LEAGUE_COLLECTION,
                    id,
                    source,
                })
            })?;
            if existing.is_some() || expected != 0 {
                return Err(StorageError::Conflict { id });
            }
            collection.insert_one(&league).await.map_err(|source| {
                StorageError::from(MongoDaoError::SaveDocument {
                    collection: LEAGUE_COLLECTION,
                    id,
                    source,
                })
            })?;
        }

        Ok(())
    }

    async fn find_game_by_id(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let collection = self.game_collection().await;
        collection
            .find_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadDocument {
                collection: GAME_COLLECTION,
                id,
                source,
            })
    }

    /// Subscribe to a game and lazily start a poll task that publishes
    /// revision changes until the last subscriber is gone.
    fn subscribe_game(&self, id: Uuid) -> GameUpdates {
        let updates = self.inner.updates.subscribe(id);

        if self
            .inner
            .pollers
            .insert(id, ())
            .is_none()
        {
            let store = self.clone();
            tokio::spawn(async move {
                let mut last_revision: Option<u64> = None;
                loop {
                    sleep(WATCH_POLL_INTERVAL).await;
                    if store.inner.updates.subscriber_count(id) == 0 {
                        store.inner.pollers.remove(&id);
                        return;
                    }
                    match store.find_game_by_id(id).await {
                        Ok(Some(entity)) => {
                            if last_revision != Some(entity.revision) {
                                last_revision = Some(entity.revision);
                                store.inner.updates.publish(&entity);
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(game = %id, error = %err, "game watch poll failed");
                        }
                    }
                }
            });
        }

        updates
    }
}

impl LeagueStore for MongoLeagueStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game_by_id(id).await.map_err(Into::into) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game_checked(game).await })
    }

    fn watch_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<GameUpdates>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.subscribe_game(id)) })
    }

    fn find_league(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LeagueEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.league_collection().await;
            collection
                .find_one(id_filter(id))
                .await
                .map_err(|source| {
                    MongoDaoError::LoadDocument {
                        collection: LEAGUE_COLLECTION,
                        id,
                        source,
                    }
                    .into()
                })
        })
    }

    fn save_league(&self, league: LeagueEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_league_checked(league).await })
    }

    fn league_seasons_by_status(
        &self,
        status: AssociationStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.league_season_collection().await;
            collection
                .find(doc! {"status": status.as_str()})
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: LEAGUE_SEASON_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| {
                    MongoDaoError::Query {
                        collection: LEAGUE_SEASON_COLLECTION,
                        source,
                    }
                    .into()
                })
        })
    }

    fn list_league_seasons(&self) -> BoxFuture<'static, StorageResult<Vec<LeagueSeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.league_season_collection().await;
            collection
                .find(doc! {})
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: LEAGUE_SEASON_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| {
                    MongoDaoError::Query {
                        collection: LEAGUE_SEASON_COLLECTION,
                        source,
                    }
                    .into()
                })
        })
    }

    fn seasons_by_ids(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            let collection = store.season_collection().await;
            collection
                .find(doc! {"id": {"$in": id_strings}})
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: SEASON_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| {
                    MongoDaoError::Query {
                        collection: SEASON_COLLECTION,
                        source,
                    }
                    .into()
                })
        })
    }

    fn delete_league_season(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.league_season_collection().await;
            collection
                .delete_one(id_filter(id))
                .await
                .map_err(|source| MongoDaoError::DeleteDocument {
                    collection: LEAGUE_SEASON_COLLECTION,
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
