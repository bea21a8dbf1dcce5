//! Persisted document shapes shared across storage backends.
//!
//! Timestamps serialise as RFC 3339 strings so the same entity shape works
//! for JSON fixtures and BSON documents. `GameEntity` and `LeagueEntity`
//! carry a revision that backends check on save, realising the
//! `put -> Ok | Conflict` contract of the store adapter.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    game::{Game, GameSettings, GameStatus, Participants, ScoreRecord},
    league::{AssociationStatus, LeagueStatus, SeasonStatus},
};

/// Persisted form of a [`Game`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Who plays the game.
    pub participants: Participants,
    /// Score threshold for a valid submission.
    pub points_to_win: i32,
    /// Participant whose turn it is to submit scores.
    pub active_player: Option<Uuid>,
    /// Submitted or confirmed scores.
    pub scores: Option<ScoreRecord>,
    /// Participant expected to confirm.
    pub confirmed_by: Option<Uuid>,
    /// Winning participant once completed.
    pub winner: Option<Uuid>,
    /// Reason supplied when the invitation was declined.
    pub rejection_reason: Option<String>,
    /// Optimistic-concurrency revision, bumped by the store on save.
    pub revision: u64,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GameEntity {
    /// Persisted form of a runtime game at the given revision.
    pub fn from_game(game: Game, revision: u64) -> Self {
        Self {
            id: game.id,
            status: game.status,
            participants: game.participants,
            points_to_win: game.settings.points_to_win,
            active_player: game.active_player,
            scores: game.scores,
            confirmed_by: game.confirmed_by,
            winner: game.winner,
            rejection_reason: game.rejection_reason,
            revision,
            created_at: game.created_at,
            updated_at: game.updated_at,
        }
    }
}

impl From<GameEntity> for Game {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            status: value.status,
            participants: value.participants,
            settings: GameSettings {
                points_to_win: value.points_to_win,
            },
            active_player: value.active_player,
            scores: value.scores,
            confirmed_by: value.confirmed_by,
            winner: value.winner,
            rejection_reason: value.rejection_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Persisted form of a league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current status, owned by the resolver/scheduler pair once seasons
    /// are attached.
    pub status: LeagueStatus,
    /// When the resolver last changed the status.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_status_update: Option<OffsetDateTime>,
    /// Optimistic-concurrency revision, bumped by the store on save.
    pub revision: u64,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Persisted form of a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning league; `None` marks a global season.
    pub league_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Inclusive start of the season window.
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    /// Inclusive end of the season window.
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    /// Season lifecycle status.
    pub status: SeasonStatus,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Join row associating a season with a league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueSeasonEntity {
    /// Stable identifier of the join row itself.
    pub id: Uuid,
    /// League side of the association.
    pub league_id: Uuid,
    /// Season side of the association.
    pub season_id: Uuid,
    /// Whether the association is still in force.
    pub status: AssociationStatus,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
