//! Adaptive background scheduler driving periodic league status resolution.
//!
//! One instance is constructed at startup and shared by handle; there is no
//! process-global scheduler. Runs are skipped while storage is degraded,
//! leagues are refreshed in small batches, and the pause between runs backs
//! off after a streak of runs that changed nothing.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    services::league_service::LeagueService,
    state::SharedState,
};

/// Tuning knobs of the resolver scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Base pause between runs.
    pub interval: Duration,
    /// Leagues refreshed per batch within a run.
    pub batch_size: usize,
    /// Pause between batches within a run.
    pub batch_delay: Duration,
    /// Zero-update runs tolerated before one backed-off cycle.
    pub max_no_update_cycles: u32,
    /// Orphan cleanup happens every this many completed runs.
    pub cleanup_every_runs: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 10,
            batch_delay: Duration::from_millis(250),
            max_no_update_cycles: 5,
            cleanup_every_runs: 24,
        }
    }
}

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Monotonic run number.
    pub run: u64,
    /// Leagues whose status changed.
    pub updated: usize,
    /// Leagues whose refresh failed.
    pub errors: usize,
    /// Leagues considered in this run.
    pub total: usize,
}

#[derive(Default)]
struct SchedulerStats {
    run_count: u64,
    consecutive_no_update_cycles: u32,
    last_successful_run: Option<OffsetDateTime>,
}

struct SchedulerControl {
    options: SchedulerOptions,
    shutdown: Option<watch::Sender<bool>>,
}

/// Background scheduler resolving league statuses on an adaptive cadence.
pub struct ResolverScheduler {
    state: SharedState,
    clock: Arc<dyn Clock>,
    control: Mutex<SchedulerControl>,
    stats: Mutex<SchedulerStats>,
    reports: watch::Sender<Option<RunReport>>,
}

impl ResolverScheduler {
    /// Build a stopped scheduler with the given options.
    pub fn new(state: SharedState, clock: Arc<dyn Clock>, options: SchedulerOptions) -> Arc<Self> {
        let (reports, _rx) = watch::channel(None);
        Arc::new(Self {
            state,
            clock,
            control: Mutex::new(SchedulerControl {
                options,
                shutdown: None,
            }),
            stats: Mutex::new(SchedulerStats::default()),
            reports,
        })
    }

    /// Start the run loop. Calling `start` on a running scheduler is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut control = self.control.lock().expect("scheduler control poisoned");
        if control.shutdown.is_some() {
            debug!("scheduler already running");
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        control.shutdown = Some(shutdown_tx);
        let interval = control.options.interval;
        drop(control);

        info!(interval = ?interval, "scheduler started");
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx).await;
        });
    }

    /// Stop the run loop. The in-flight run, if any, finishes first.
    pub fn stop(&self) {
        let mut control = self.control.lock().expect("scheduler control poisoned");
        if let Some(shutdown) = control.shutdown.take() {
            let _ = shutdown.send(true);
            info!("scheduler stopped");
        }
    }

    /// Replace the options. Restarts the loop only when the interval changed;
    /// batch tuning takes effect on the next run either way.
    pub fn update_options(self: &Arc<Self>, options: SchedulerOptions) {
        let restart = {
            let mut control = self.control.lock().expect("scheduler control poisoned");
            let interval_changed = control.options.interval != options.interval;
            control.options = options;
            interval_changed && control.shutdown.is_some()
        };
        if restart {
            debug!("scheduler interval changed, restarting run loop");
            self.stop();
            self.start();
        }
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> SchedulerOptions {
        self.control
            .lock()
            .expect("scheduler control poisoned")
            .options
            .clone()
    }

    /// Whether the run loop is currently active.
    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .expect("scheduler control poisoned")
            .shutdown
            .is_some()
    }

    /// Subscribe to per-run reports.
    pub fn reports(&self) -> watch::Receiver<Option<RunReport>> {
        self.reports.subscribe()
    }

    /// Instant the last completed run finished, if any.
    pub fn last_successful_run(&self) -> Option<OffsetDateTime> {
        self.stats
            .lock()
            .expect("scheduler stats poisoned")
            .last_successful_run
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            // Re-read on every iteration so option changes reach the next
            // run without a restart.
            let options = self.options();
            self.run_once(&options).await;

            let delay = {
                let mut stats = self.stats.lock().expect("scheduler stats poisoned");
                let (delay, reset_counter) = delay_after_run(
                    options.interval,
                    stats.consecutive_no_update_cycles,
                    options.max_no_update_cycles,
                );
                stats.consecutive_no_update_cycles = reset_counter;
                delay
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("scheduler run loop exiting");
                        return;
                    }
                }
            }
        }
    }

    /// Execute one resolution run. Returns `None` when storage is degraded
    /// and the run was skipped.
    pub async fn run_once(&self, options: &SchedulerOptions) -> Option<RunReport> {
        let Some(store) = self.state.store().await else {
            debug!("storage degraded, skipping scheduler run");
            return None;
        };
        let service = LeagueService::new(store, self.clock.clone());

        let leagues = match service.leagues_to_refresh().await {
            Ok(leagues) => leagues,
            Err(err) => {
                warn!(error = %err, "failed to list leagues for resolution");
                return None;
            }
        };

        let total = leagues.len();
        let mut updated = 0;
        let mut errors = 0;
        let mut batches = leagues.chunks(options.batch_size.max(1)).peekable();
        while let Some(batch) = batches.next() {
            for league_id in batch {
                match service.refresh_league(*league_id).await {
                    Ok(Some(status)) => {
                        debug!(league = %league_id, status = status.as_str(), "league updated");
                        updated += 1;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(league = %league_id, error = %err, "league refresh failed");
                        errors += 1;
                    }
                }
            }
            if batches.peek().is_some() {
                tokio::time::sleep(options.batch_delay).await;
            }
        }

        let report = {
            let mut stats = self.stats.lock().expect("scheduler stats poisoned");
            stats.run_count += 1;
            if updated > 0 {
                stats.consecutive_no_update_cycles = 0;
            } else {
                stats.consecutive_no_update_cycles =
                    stats.consecutive_no_update_cycles.saturating_add(1);
            }
            stats.last_successful_run = Some(self.clock.now());
            RunReport {
                run: stats.run_count,
                updated,
                errors,
                total,
            }
        };

        if options.cleanup_every_runs > 0 && report.run % options.cleanup_every_runs == 0 {
            match service.cleanup_orphans().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "orphaned associations cleaned up"),
                Err(err) => warn!(error = %err, "orphan cleanup failed"),
            }
        }

        debug!(
            run = report.run,
            updated = report.updated,
            errors = report.errors,
            total = report.total,
            "scheduler run finished"
        );
        self.reports.send_replace(Some(report));
        Some(report)
    }
}

/// Pause before the next run, given the streak of runs that changed nothing.
///
/// Once the streak reaches `max`, a single doubled pause is taken and the
/// streak resets, so a quiet system settles into one long cycle per streak
/// instead of drifting ever slower.
fn delay_after_run(interval: Duration, consecutive_no_updates: u32, max: u32) -> (Duration, u32) {
    if max > 0 && consecutive_no_updates >= max {
        (interval * 2, 0)
    } else {
        (interval, consecutive_no_updates)
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration as TimeDuration, macros::datetime};
    use uuid::Uuid;

    use super::*;
    use crate::{
        clock::ManualClock,
        dao::{
            memory::MemoryLeagueStore,
            models::{LeagueEntity, LeagueSeasonEntity, SeasonEntity},
            store::LeagueStore,
        },
        league::{AssociationStatus, LeagueStatus, SeasonStatus},
        state::AppState,
    };

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn seeded_store() -> (Arc<MemoryLeagueStore>, Uuid) {
        let store = Arc::new(MemoryLeagueStore::new());
        let league = LeagueEntity {
            id: Uuid::new_v4(),
            name: "friday night".into(),
            status: LeagueStatus::Upcoming,
            last_status_update: None,
            revision: 0,
            created_at: NOW - TimeDuration::days(30),
            updated_at: NOW - TimeDuration::days(30),
        };
        let season = SeasonEntity {
            id: Uuid::new_v4(),
            league_id: None,
            name: "summer".into(),
            start_date: NOW - TimeDuration::days(1),
            end_date: NOW + TimeDuration::days(10),
            status: SeasonStatus::Active,
            created_at: NOW - TimeDuration::days(30),
        };
        store.put_league_season(LeagueSeasonEntity {
            id: Uuid::new_v4(),
            league_id: league.id,
            season_id: season.id,
            status: AssociationStatus::Active,
            created_at: NOW - TimeDuration::days(30),
        });
        store.put_season(season);
        let league_id = league.id;
        store.put_league(league);
        (store, league_id)
    }

    fn scheduler_over(store: Arc<MemoryLeagueStore>) -> Arc<ResolverScheduler> {
        ResolverScheduler::new(
            AppState::with_store(store),
            Arc::new(ManualClock::new(NOW)),
            SchedulerOptions::default(),
        )
    }

    #[test]
    fn backoff_doubles_once_then_resets() {
        let interval = Duration::from_secs(60);
        // Below the streak limit the base interval is kept.
        for streak in 0..5 {
            assert_eq!(delay_after_run(interval, streak, 5), (interval, streak));
        }
        // At the limit: one doubled pause, streak reset.
        assert_eq!(delay_after_run(interval, 5, 5), (interval * 2, 0));
        // The run after the reset is back on the base interval.
        assert_eq!(delay_after_run(interval, 0, 5), (interval, 0));
    }

    #[tokio::test]
    async fn run_counts_updates_and_errors() {
        let (store, league_id) = seeded_store();
        // Second association points at a league that does not exist.
        store.put_league_season(LeagueSeasonEntity {
            id: Uuid::new_v4(),
            league_id: Uuid::new_v4(),
            season_id: Uuid::new_v4(),
            status: AssociationStatus::Active,
            created_at: NOW,
        });
        let scheduler = scheduler_over(store.clone());

        let report = scheduler
            .run_once(&SchedulerOptions::default())
            .await
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.errors, 1);

        let league = store.find_league(league_id).await.unwrap().unwrap();
        assert_eq!(league.status, LeagueStatus::Active);
        assert_eq!(scheduler.last_successful_run(), Some(NOW));
    }

    #[tokio::test]
    async fn degraded_storage_skips_the_run() {
        let scheduler = ResolverScheduler::new(
            AppState::new(),
            Arc::new(ManualClock::new(NOW)),
            SchedulerOptions::default(),
        );
        assert!(scheduler
            .run_once(&SchedulerOptions::default())
            .await
            .is_none());
        assert_eq!(scheduler.last_successful_run(), None);
    }

    #[tokio::test]
    async fn cleanup_runs_on_its_cadence() {
        let (store, _league_id) = seeded_store();
        // Orphan row: its season never existed.
        let orphan = LeagueSeasonEntity {
            id: Uuid::new_v4(),
            league_id: Uuid::new_v4(),
            season_id: Uuid::new_v4(),
            status: AssociationStatus::Archived,
            created_at: NOW,
        };
        store.put_league_season(orphan.clone());
        let scheduler = scheduler_over(store.clone());

        let options = SchedulerOptions {
            cleanup_every_runs: 1,
            ..SchedulerOptions::default()
        };
        scheduler.run_once(&options).await.unwrap();

        let remaining = store.list_league_seasons().await.unwrap();
        assert!(remaining.iter().all(|row| row.id != orphan.id));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_emits_reports_until_stopped() {
        let (store, _league_id) = seeded_store();
        let scheduler = scheduler_over(store);
        let mut reports = scheduler.reports();

        scheduler.start();
        // Idempotent second start.
        scheduler.start();
        assert!(scheduler.is_running());

        reports.changed().await.unwrap();
        let first = (*reports.borrow_and_update()).unwrap();
        assert_eq!(first.run, 1);
        assert_eq!(first.updated, 1);

        reports.changed().await.unwrap();
        let second = (*reports.borrow_and_update()).unwrap();
        assert_eq!(second.run, 2);
        assert_eq!(second.updated, 0);

        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn option_changes_reach_the_next_run_without_restart() {
        let (store, _league_id) = seeded_store();
        // Orphan row whose league and season never existed.
        let orphan = LeagueSeasonEntity {
            id: Uuid::new_v4(),
            league_id: Uuid::new_v4(),
            season_id: Uuid::new_v4(),
            status: AssociationStatus::Archived,
            created_at: NOW,
        };
        store.put_league_season(orphan.clone());
        let scheduler = scheduler_over(store.clone());
        let mut reports = scheduler.reports();
        scheduler.start();

        // First run on the default cadence (24): no cleanup yet.
        reports.changed().await.unwrap();
        let remaining = store.list_league_seasons().await.unwrap();
        assert!(remaining.iter().any(|row| row.id == orphan.id));

        // Same interval, so no restart happens; the new cleanup cadence
        // must still be picked up by the next run.
        scheduler.update_options(SchedulerOptions {
            cleanup_every_runs: 1,
            ..SchedulerOptions::default()
        });
        reports.changed().await.unwrap();
        assert_eq!((*reports.borrow_and_update()).unwrap().run, 2);

        let remaining = store.list_league_seasons().await.unwrap();
        assert!(remaining.iter().all(|row| row.id != orphan.id));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_restarts_the_loop() {
        let (store, _league_id) = seeded_store();
        let scheduler = scheduler_over(store);
        scheduler.start();

        scheduler.update_options(SchedulerOptions {
            interval: Duration::from_secs(5),
            ..SchedulerOptions::default()
        });
        assert!(scheduler.is_running());

        let mut reports = scheduler.reports();
        reports.changed().await.unwrap();
        assert!(reports.borrow_and_update().is_some());
        scheduler.stop();
    }
}
