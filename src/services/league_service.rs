//! League status resolution against storage, and association housekeeping.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dao::store::LeagueStore,
    error::ServiceError,
    league::{AssociationStatus, LeagueStatus, SeasonStatus, SeasonWindow, resolver},
};

/// Service recomputing league statuses from their season windows.
pub struct LeagueService {
    store: Arc<dyn LeagueStore>,
    clock: Arc<dyn Clock>,
}

impl LeagueService {
    /// Build a service over the given store and clock.
    pub fn new(store: Arc<dyn LeagueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Distinct leagues that currently have an active season association and
    /// therefore need periodic status resolution.
    pub async fn leagues_to_refresh(&self) -> Result<Vec<Uuid>, ServiceError> {
        let associations = self
            .store
            .league_seasons_by_status(AssociationStatus::Active)
            .await?;
        let mut seen = HashSet::new();
        let mut leagues = Vec::new();
        for association in associations {
            if seen.insert(association.league_id) {
                leagues.push(association.league_id);
            }
        }
        Ok(leagues)
    }

    /// Recompute one league's status and persist it if it changed.
    ///
    /// Returns the new status when a write happened, `None` when the resolved
    /// status already matches. Archived seasons contribute no window.
    pub async fn refresh_league(
        &self,
        league_id: Uuid,
    ) -> Result<Option<LeagueStatus>, ServiceError> {
        let league = self
            .store
            .find_league(league_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("league `{league_id}`")))?;
        if league.status == LeagueStatus::Canceled {
            debug!(league = %league_id, "canceled league skipped");
            return Ok(None);
        }

        let windows = self.season_windows(league_id).await?;
        let now = self.clock.now();
        let resolved = resolver::resolve(&windows, league.status, now);
        if resolved == league.status {
            return Ok(None);
        }

        let mut updated = league;
        info!(
            league = %league_id,
            from = updated.status.as_str(),
            to = resolved.as_str(),
            "league status resolved"
        );
        updated.status = resolved;
        updated.last_status_update = Some(now);
        updated.updated_at = now;
        self.store.save_league(updated).await?;
        Ok(Some(resolved))
    }

    /// Season windows driving this league's status.
    async fn season_windows(&self, league_id: Uuid) -> Result<Vec<SeasonWindow>, ServiceError> {
        let associations = self
            .store
            .league_seasons_by_status(AssociationStatus::Active)
            .await?;
        let season_ids: Vec<Uuid> = associations
            .into_iter()
            .filter(|association| association.league_id == league_id)
            .map(|association| association.season_id)
            .collect();
        if season_ids.is_empty() {
            return Ok(Vec::new());
        }

        let seasons = self.store.seasons_by_ids(season_ids).await?;
        let mut windows = Vec::with_capacity(seasons.len());
        for season in seasons {
            if season.status == SeasonStatus::Archived {
                continue;
            }
            windows.push(SeasonWindow::new(
                season.id,
                season.start_date,
                season.end_date,
            )?);
        }
        Ok(windows)
    }

    /// Delete association rows whose league or season no longer exists.
    ///
    /// Returns the number of rows removed. Best effort: an undeletable row is
    /// logged and left for the next pass.
    pub async fn cleanup_orphans(&self) -> Result<usize, ServiceError> {
        let associations = self.store.list_league_seasons().await?;
        if associations.is_empty() {
            return Ok(0);
        }

        let season_ids: Vec<Uuid> = associations
            .iter()
            .map(|association| association.season_id)
            .collect();
        let existing_seasons: HashSet<Uuid> = self
            .store
            .seasons_by_ids(season_ids)
            .await?
            .into_iter()
            .map(|season| season.id)
            .collect();

        let mut league_exists: HashMap<Uuid, bool> = HashMap::new();
        let mut removed = 0;
        for association in associations {
            let league_present = match league_exists.get(&association.league_id) {
                Some(present) => *present,
                None => {
                    let present = self
                        .store
                        .find_league(association.league_id)
                        .await?
                        .is_some();
                    league_exists.insert(association.league_id, present);
                    present
                }
            };
            if league_present && existing_seasons.contains(&association.season_id) {
                continue;
            }

            match self.store.delete_league_season(association.id).await {
                Ok(()) => {
                    info!(
                        association = %association.id,
                        league = %association.league_id,
                        season = %association.season_id,
                        "orphaned association removed"
                    );
                    removed += 1;
                }
                Err(err) => {
                    warn!(
                        association = %association.id,
                        error = %err,
                        "failed to remove orphaned association"
                    );
                }
            }
        }
        Ok(removed)
    }
}
