//! Activity- and visibility-aware wrappers around the scheduler.
//!
//! User actions tighten the resolution cadence; half an hour of silence
//! relaxes it again. Hiding the client stops the scheduler outright instead
//! of letting it spin for nobody.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::watch, time::Instant};
use tracing::{debug, info};

use crate::services::scheduler::ResolverScheduler;

/// Tuning knobs of the activity monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityOptions {
    /// Scheduler interval while the user is active.
    pub active_interval: Duration,
    /// Scheduler interval after the inactivity timeout fires.
    pub inactive_interval: Duration,
    /// Activity events closer together than this are coalesced.
    pub min_event_gap: Duration,
    /// Silence longer than this switches to the inactive interval.
    pub inactivity_timeout: Duration,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_secs(60),
            inactive_interval: Duration::from_secs(300),
            min_event_gap: Duration::from_secs(5),
            inactivity_timeout: Duration::from_secs(30 * 60),
        }
    }
}

struct ActivityInner {
    last_event: Option<Instant>,
    shutdown: Option<watch::Sender<bool>>,
}

/// Switches the scheduler interval based on recent user activity.
pub struct ActivityMonitor {
    scheduler: Arc<ResolverScheduler>,
    options: ActivityOptions,
    inner: Mutex<ActivityInner>,
    activity: watch::Sender<Instant>,
}

impl ActivityMonitor {
    /// Build a monitor over the given scheduler.
    pub fn new(scheduler: Arc<ResolverScheduler>, options: ActivityOptions) -> Arc<Self> {
        let (activity, _rx) = watch::channel(Instant::now());
        Arc::new(Self {
            scheduler,
            options,
            inner: Mutex::new(ActivityInner {
                last_event: None,
                shutdown: None,
            }),
            activity,
        })
    }

    /// Start the inactivity watchdog. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock().expect("activity state poisoned");
        if inner.shutdown.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        inner.shutdown = Some(shutdown_tx);
        drop(inner);

        let monitor = self.clone();
        tokio::spawn(async move {
            monitor.watchdog(shutdown_rx).await;
        });
    }

    /// Stop the watchdog.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().expect("activity state poisoned");
        if let Some(shutdown) = inner.shutdown.take() {
            let _ = shutdown.send(true);
        }
    }

    /// Record a user action. Events inside the coalescing gap are dropped;
    /// a recorded event tightens the scheduler interval and re-arms the
    /// inactivity watchdog. Returns whether the event was recorded.
    pub fn record_activity(&self) -> bool {
        let now = Instant::now();
        {
            let mut inner = self.inner.lock().expect("activity state poisoned");
            if let Some(last) = inner.last_event {
                if now.duration_since(last) < self.options.min_event_gap {
                    return false;
                }
            }
            inner.last_event = Some(now);
        }
        self.apply_interval(self.options.active_interval);
        let _ = self.activity.send(now);
        true
    }

    fn apply_interval(&self, interval: Duration) {
        let mut options = self.scheduler.options();
        if options.interval != interval {
            info!(interval = ?interval, "switching scheduler cadence");
            options.interval = interval;
            self.scheduler.update_options(options);
        }
    }

    async fn watchdog(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut activity = self.activity.subscribe();
        loop {
            let deadline = *activity.borrow_and_update() + self.options.inactivity_timeout;
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("inactivity timeout reached");
                    self.apply_interval(self.options.inactive_interval);
                    // Park until the next user action re-arms the timer.
                    tokio::select! {
                        changed = activity.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        _ = shutdown.changed() => return,
                    }
                }
                changed = activity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = shutdown.changed() => return,
            }
        }
    }
}

/// Starts and stops the scheduler as the client becomes visible or hidden.
pub struct VisibilityGate {
    scheduler: Arc<ResolverScheduler>,
}

impl VisibilityGate {
    /// Build a gate over the given scheduler.
    pub fn new(scheduler: Arc<ResolverScheduler>) -> Self {
        Self { scheduler }
    }

    /// Apply a visibility change. Hidden stops the scheduler, visible starts
    /// it again; both directions are idempotent.
    pub fn set_visible(&self, visible: bool) {
        if visible {
            debug!("client visible, resuming scheduler");
            self.scheduler.start();
        } else {
            debug!("client hidden, pausing scheduler");
            self.scheduler.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{
        clock::ManualClock, dao::memory::MemoryLeagueStore,
        services::scheduler::SchedulerOptions, state::AppState,
    };

    fn scheduler() -> Arc<ResolverScheduler> {
        ResolverScheduler::new(
            AppState::with_store(Arc::new(MemoryLeagueStore::new())),
            Arc::new(ManualClock::new(datetime!(2025-06-01 12:00 UTC))),
            SchedulerOptions::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_events_are_coalesced() {
        let monitor = ActivityMonitor::new(scheduler(), ActivityOptions::default());
        assert!(monitor.record_activity());
        assert!(!monitor.record_activity());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(monitor.record_activity());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_relaxes_the_cadence_and_activity_restores_it() {
        let options = ActivityOptions::default();
        let scheduler = scheduler();
        let monitor = ActivityMonitor::new(scheduler.clone(), options.clone());
        monitor.start();
        monitor.record_activity();
        assert_eq!(scheduler.options().interval, options.active_interval);

        tokio::time::sleep(options.inactivity_timeout + Duration::from_secs(1)).await;
        assert_eq!(scheduler.options().interval, options.inactive_interval);

        tokio::time::sleep(options.min_event_gap).await;
        monitor.record_activity();
        assert_eq!(scheduler.options().interval, options.active_interval);
        monitor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_gate_toggles_the_scheduler() {
        let scheduler = scheduler();
        let gate = VisibilityGate::new(scheduler.clone());

        gate.set_visible(true);
        assert!(scheduler.is_running());
        gate.set_visible(false);
        assert!(!scheduler.is_running());
        // Idempotent in both directions.
        gate.set_visible(false);
        assert!(!scheduler.is_running());
        gate.set_visible(true);
        assert!(scheduler.is_running());
        scheduler.stop();
    }
}
