//! League domain types: statuses, season windows, and the status resolver.

pub mod resolver;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub use self::resolver::resolve;

/// Lifecycle status of a league. Owned by the resolver/scheduler pair once
/// seasons are attached; `Canceled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeagueStatus {
    /// No season window has opened yet.
    Upcoming,
    /// A season window covers the current instant.
    Active,
    /// Every season window lies in the past.
    Completed,
    /// Abandoned by its organizer; never auto-managed again.
    Canceled,
}

impl LeagueStatus {
    /// Stable string form used in store filters and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeagueStatus::Upcoming => "upcoming",
            LeagueStatus::Active => "active",
            LeagueStatus::Completed => "completed",
            LeagueStatus::Canceled => "canceled",
        }
    }
}

/// Lifecycle status of a season document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    /// Season currently running.
    Active,
    /// Season scheduled for the future.
    Upcoming,
    /// Season finished.
    Completed,
    /// Season kept for history only; excluded from resolution.
    Archived,
}

impl SeasonStatus {
    /// Stable string form used in store filters and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonStatus::Active => "active",
            SeasonStatus::Upcoming => "upcoming",
            SeasonStatus::Completed => "completed",
            SeasonStatus::Archived => "archived",
        }
    }
}

/// Status of a league/season association row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStatus {
    /// The association is in force and drives the league status.
    Active,
    /// The associated season has run its course.
    Completed,
    /// Kept for history only.
    Archived,
}

impl AssociationStatus {
    /// Stable string form used in store filters and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationStatus::Active => "active",
            AssociationStatus::Completed => "completed",
            AssociationStatus::Archived => "archived",
        }
    }
}

/// A season date range used to time-box a league's `Active` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonWindow {
    /// Identifier of the season this window came from; ties are broken by it.
    pub id: Uuid,
    /// Inclusive start of the window.
    pub start: OffsetDateTime,
    /// Inclusive end of the window.
    pub end: OffsetDateTime,
}

/// A season whose dates do not form a valid interval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("season `{id}` has a malformed window: start {start} is after end {end}")]
pub struct MalformedWindow {
    /// Season the window came from.
    pub id: Uuid,
    /// Claimed start.
    pub start: OffsetDateTime,
    /// Claimed end.
    pub end: OffsetDateTime,
}

impl SeasonWindow {
    /// Build a window, rejecting intervals whose start lies after their end.
    pub fn new(
        id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Self, MalformedWindow> {
        if start > end {
            return Err(MalformedWindow { id, start, end });
        }
        Ok(Self { id, start, end })
    }

    /// Whether the window covers the given instant (inclusive bounds).
    pub fn contains(&self, now: OffsetDateTime) -> bool {
        self.start <= now && now <= self.end
    }
}
