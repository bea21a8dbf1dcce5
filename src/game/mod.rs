//! Runtime model for a domino game: participants, scores, and settings.

pub mod machine;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub use self::machine::{GameEvent, GuardViolation, Transition, TransitionError, ValidationError};

/// Lifecycle status of a game. `Rejected` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Invitation sent, waiting for the invited side to answer.
    Invited,
    /// Invitation accepted, game not started yet.
    Accepted,
    /// Invitation declined; terminal.
    Rejected,
    /// Game underway, the active player owes a score submission.
    InProgress,
    /// Scores submitted, waiting for the other side to confirm.
    WaitingConfirmation,
    /// Scores confirmed and winner settled; terminal.
    Completed,
}

impl GameStatus {
    /// Stable string form used in store filters and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Invited => "invited",
            GameStatus::Accepted => "accepted",
            GameStatus::Rejected => "rejected",
            GameStatus::InProgress => "in_progress",
            GameStatus::WaitingConfirmation => "waiting_confirmation",
            GameStatus::Completed => "completed",
        }
    }

    /// Whether the status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Rejected | GameStatus::Completed)
    }
}

/// Which side of the game a participant plays on.
///
/// The creator side is `team1` for doubles; the invited side is the opponent
/// (or `team2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The side that created the invitation.
    Creator,
    /// The invited side.
    Opponent,
}

impl Side {
    /// The other side of the table.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Creator => Side::Opponent,
            Side::Opponent => Side::Creator,
        }
    }
}

/// Participants of a game, resolved once at read time instead of probing
/// optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Participants {
    /// Head-to-head game between two players.
    Singles {
        /// Player who created the invitation.
        creator: Uuid,
        /// Invited player.
        opponent: Uuid,
    },
    /// 2v2 game. The first member of each list is the team lead.
    Doubles {
        /// Creator-side team, lead first.
        team1: Vec<Uuid>,
        /// Invited-side team, lead first.
        team2: Vec<Uuid>,
    },
}

impl Participants {
    /// Which side the given actor plays on, if any.
    pub fn side_of(&self, actor: Uuid) -> Option<Side> {
        match self {
            Participants::Singles { creator, opponent } => {
                if *creator == actor {
                    Some(Side::Creator)
                } else if *opponent == actor {
                    Some(Side::Opponent)
                } else {
                    None
                }
            }
            Participants::Doubles { team1, team2 } => {
                if team1.contains(&actor) {
                    Some(Side::Creator)
                } else if team2.contains(&actor) {
                    Some(Side::Opponent)
                } else {
                    None
                }
            }
        }
    }

    /// Whether the actor participates in the game at all.
    pub fn contains(&self, actor: Uuid) -> bool {
        self.side_of(actor).is_some()
    }

    /// Lead participant of a side: the player itself for singles, the first
    /// team member for doubles.
    ///
    /// Team member lists are validated non-empty at creation, so the lead is
    /// always present.
    pub fn lead(&self, side: Side) -> Uuid {
        match (self, side) {
            (Participants::Singles { creator, .. }, Side::Creator) => *creator,
            (Participants::Singles { opponent, .. }, Side::Opponent) => *opponent,
            (Participants::Doubles { team1, .. }, Side::Creator) => team1[0],
            (Participants::Doubles { team2, .. }, Side::Opponent) => team2[0],
        }
    }
}

/// Submitted scores, tagged by game mode so the shape is resolved once
/// instead of probing `creator` vs `team1` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ScoreRecord {
    /// Scores for a singles game.
    Traditional {
        /// Points scored by the creator.
        creator: i32,
        /// Points scored by the opponent.
        opponent: i32,
    },
    /// Scores for a doubles game.
    Team {
        /// Points scored by the creator-side team.
        team1: i32,
        /// Points scored by the invited-side team.
        team2: i32,
    },
}

impl ScoreRecord {
    /// Points of the creator side.
    pub fn creator_points(&self) -> i32 {
        match self {
            ScoreRecord::Traditional { creator, .. } => *creator,
            ScoreRecord::Team { team1, .. } => *team1,
        }
    }

    /// Points of the invited side.
    pub fn opponent_points(&self) -> i32 {
        match self {
            ScoreRecord::Traditional { opponent, .. } => *opponent,
            ScoreRecord::Team { team2, .. } => *team2,
        }
    }

    /// Higher of the two submitted scores.
    pub fn max_points(&self) -> i32 {
        self.creator_points().max(self.opponent_points())
    }

    /// True when either score is below zero.
    pub fn has_negative(&self) -> bool {
        self.creator_points() < 0 || self.opponent_points() < 0
    }

    /// Whether the record shape matches the game mode.
    pub fn matches(&self, participants: &Participants) -> bool {
        matches!(
            (self, participants),
            (ScoreRecord::Traditional { .. }, Participants::Singles { .. })
                | (ScoreRecord::Team { .. }, Participants::Doubles { .. })
        )
    }

    /// Side with the higher score, or `None` on a tie.
    pub fn winning_side(&self) -> Option<Side> {
        match self.creator_points().cmp(&self.opponent_points()) {
            std::cmp::Ordering::Greater => Some(Side::Creator),
            std::cmp::Ordering::Less => Some(Side::Opponent),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Per-game settings agreed at invitation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Score threshold at least one side must reach for a submission to be
    /// accepted. Always positive.
    pub points_to_win: i32,
}

/// A single domino game and its mutable lifecycle fields.
///
/// Invariants: `scores` is `Some` only in `WaitingConfirmation` and
/// `Completed`; `winner` is `Some` only in `Completed`; `active_player` is
/// one of the participants while `InProgress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Stable identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Who plays the game.
    pub participants: Participants,
    /// Agreed settings.
    pub settings: GameSettings,
    /// Participant whose turn it is to submit scores.
    pub active_player: Option<Uuid>,
    /// Submitted scores awaiting confirmation, or confirmed final scores.
    pub scores: Option<ScoreRecord>,
    /// Participant expected to confirm the submitted scores.
    pub confirmed_by: Option<Uuid>,
    /// Winning participant (side lead), `None` until completed or on a tie.
    pub winner: Option<Uuid>,
    /// Reason supplied when the invitation was declined.
    pub rejection_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    pub updated_at: OffsetDateTime,
}

impl Game {
    /// Build a fresh game in the `Invited` state.
    pub fn new(participants: Participants, settings: GameSettings, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: GameStatus::Invited,
            participants,
            settings,
            active_player: None,
            scores: None,
            confirmed_by: None,
            winner: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
