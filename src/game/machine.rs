//! Pure lifecycle state machine for a single game.
//!
//! Transitions never touch storage: callers load the current game, apply an
//! event here, and persist the result. Guard failures come back as values so
//! concurrent conflicting calls from two actors are rejected instead of
//! racing; the store's per-document write is the final arbiter.

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::game::{Game, GameStatus, ScoreRecord, Side};

/// Events that can be applied to a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Invited side accepts the invitation.
    Accept,
    /// Invited side declines the invitation.
    Reject {
        /// Free-form reason stored on the game.
        reason: String,
    },
    /// Any participant starts an accepted game.
    Start,
    /// The active player submits the final scores of a round.
    SubmitScore(ScoreRecord),
    /// The designated confirmer agrees with or disputes the submitted scores.
    Confirm {
        /// `true` to confirm, `false` to dispute.
        accepted: bool,
    },
}

impl GameEvent {
    /// Stable event name used in error codes and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Accept => "accept",
            GameEvent::Reject { .. } => "reject",
            GameEvent::Start => "start",
            GameEvent::SubmitScore(_) => "submit_score",
            GameEvent::Confirm { .. } => "confirm",
        }
    }
}

/// Input rejected before any state change; the caller can correct it and retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A submitted score is below zero.
    #[error("scores must not be negative")]
    NegativeScore,
    /// Neither submitted score reaches the winning threshold.
    #[error("no score reaches the winning threshold of {points_to_win}")]
    ThresholdNotMet {
        /// Threshold configured for this game.
        points_to_win: i32,
    },
    /// Score record shape does not match the game mode.
    #[error("score record shape does not match the game participants")]
    ScoreShapeMismatch,
}

impl ValidationError {
    /// Stable reason code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NegativeScore => "negative_score",
            ValidationError::ThresholdNotMet { .. } => "threshold_not_met",
            ValidationError::ScoreShapeMismatch => "score_shape_mismatch",
        }
    }
}

/// Precondition failure: wrong actor or wrong current state. The caller
/// should re-fetch the game before retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    /// The actor does not participate in this game.
    #[error("actor `{actor}` is not a participant of this game")]
    NotAParticipant {
        /// Actor that issued the event.
        actor: Uuid,
    },
    /// The actor participates but is not authorized for this event now.
    #[error("actor `{actor}` may not {event} in the current turn")]
    WrongActor {
        /// Actor that issued the event.
        actor: Uuid,
        /// Event name the actor attempted.
        event: &'static str,
    },
    /// The event cannot be applied in the current status.
    #[error("cannot {event} while the game is {status}", status = .status.as_str())]
    WrongState {
        /// Status the game was in.
        status: GameStatus,
        /// Event name that was attempted.
        event: &'static str,
    },
}

impl GuardViolation {
    /// Stable reason code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            GuardViolation::NotAParticipant { .. } => "not_a_participant",
            GuardViolation::WrongActor { .. } => "wrong_actor",
            GuardViolation::WrongState { .. } => "wrong_state",
        }
    }
}

/// Error returned when an event cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Input rejected before any state change.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Precondition on the transition failed.
    #[error(transparent)]
    Guard(#[from] GuardViolation),
}

impl TransitionError {
    /// Stable reason code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::Validation(err) => err.code(),
            TransitionError::Guard(err) => err.code(),
        }
    }
}

/// A successfully applied transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Status before the event.
    pub from: GameStatus,
    /// Status after the event.
    pub to: GameStatus,
    /// The updated game.
    pub game: Game,
}

/// Apply `event` issued by `actor` to `game`, returning the updated game.
///
/// Pure: the input game is untouched and no I/O happens. Authorization is
/// centralised here; an actor outside the game is rejected uniformly before
/// any per-transition guard runs.
pub fn apply_event(
    game: &Game,
    actor: Uuid,
    event: GameEvent,
    now: OffsetDateTime,
) -> Result<Transition, TransitionError> {
    let side = game
        .participants
        .side_of(actor)
        .ok_or(GuardViolation::NotAParticipant { actor })?;

    let from = game.status;
    let mut next = game.clone();

    match (from, event) {
        (GameStatus::Invited, GameEvent::Accept) => {
            require_side(side, Side::Opponent, actor, "accept")?;
            next.status = GameStatus::Accepted;
        }
        (GameStatus::Invited, GameEvent::Reject { reason }) => {
            require_side(side, Side::Opponent, actor, "reject")?;
            next.status = GameStatus::Rejected;
            next.rejection_reason = Some(reason);
        }
        (GameStatus::Accepted, GameEvent::Start) => {
            // Any participant may kick the game off; turn ownership defaults
            // to the creator-side lead unless already assigned.
            next.status = GameStatus::InProgress;
            if next.active_player.is_none() {
                next.active_player = Some(next.participants.lead(Side::Creator));
            }
        }
        (GameStatus::InProgress, GameEvent::SubmitScore(record)) => {
            if game.active_player != Some(actor) {
                return Err(GuardViolation::WrongActor {
                    actor,
                    event: "submit_score",
                }
                .into());
            }
            if !record.matches(&game.participants) {
                return Err(ValidationError::ScoreShapeMismatch.into());
            }
            if record.has_negative() {
                return Err(ValidationError::NegativeScore.into());
            }
            if record.max_points() < game.settings.points_to_win {
                return Err(ValidationError::ThresholdNotMet {
                    points_to_win: game.settings.points_to_win,
                }
                .into());
            }
            next.status = GameStatus::WaitingConfirmation;
            next.scores = Some(record);
            next.confirmed_by = Some(next.participants.lead(side.opposite()));
        }
        (GameStatus::WaitingConfirmation, GameEvent::Confirm { accepted }) => {
            if game.confirmed_by != Some(actor) {
                return Err(GuardViolation::WrongActor {
                    actor,
                    event: "confirm",
                }
                .into());
            }
            if accepted {
                next.status = GameStatus::Completed;
                // scores are Some by the WaitingConfirmation invariant
                next.winner = next
                    .scores
                    .and_then(|record| record.winning_side())
                    .map(|winning| next.participants.lead(winning));
            } else {
                // Dispute: discard the submission and let the same active
                // player submit again.
                next.status = GameStatus::InProgress;
                next.scores = None;
                next.confirmed_by = None;
            }
        }
        (status, event) => {
            return Err(GuardViolation::WrongState {
                status,
                event: event.name(),
            }
            .into());
        }
    }

    next.updated_at = now;
    Ok(Transition {
        from,
        to: next.status,
        game: next,
    })
}

fn require_side(
    side: Side,
    expected: Side,
    actor: Uuid,
    event: &'static str,
) -> Result<(), GuardViolation> {
    if side == expected {
        Ok(())
    } else {
        Err(GuardViolation::WrongActor { actor, event })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::game::{GameSettings, Participants};

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn singles_game() -> (Game, Uuid, Uuid) {
        let creator = Uuid::new_v4();
        let opponent = Uuid::new_v4();
        let game = Game::new(
            Participants::Singles { creator, opponent },
            GameSettings { points_to_win: 100 },
            NOW,
        );
        (game, creator, opponent)
    }

    fn apply(game: &Game, actor: Uuid, event: GameEvent) -> Game {
        apply_event(game, actor, event, NOW).unwrap().game
    }

    #[test]
    fn full_happy_path_to_completion() {
        let (game, creator, opponent) = singles_game();

        let game = apply(&game, opponent, GameEvent::Accept);
        assert_eq!(game.status, GameStatus::Accepted);

        let game = apply(&game, creator, GameEvent::Start);
        assert_eq!(game.status, GameStatus::InProgress);
        assert_eq!(game.active_player, Some(creator));

        let game = apply(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 100,
                opponent: 80,
            }),
        );
        assert_eq!(game.status, GameStatus::WaitingConfirmation);
        assert_eq!(game.confirmed_by, Some(opponent));

        let game = apply(&game, opponent, GameEvent::Confirm { accepted: true });
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.winner, Some(creator));
        assert!(game.scores.is_some());
    }

    #[test]
    fn dispute_returns_to_in_progress_with_same_turn() {
        let (game, creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, opponent, GameEvent::Start);
        let game = apply(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 100,
                opponent: 80,
            }),
        );

        let game = apply(&game, opponent, GameEvent::Confirm { accepted: false });
        assert_eq!(game.status, GameStatus::InProgress);
        assert_eq!(game.scores, None);
        assert_eq!(game.confirmed_by, None);
        assert_eq!(game.active_player, Some(creator));
    }

    #[test]
    fn creator_cannot_answer_own_invitation() {
        let (game, creator, _opponent) = singles_game();
        let err = apply_event(&game, creator, GameEvent::Accept, NOW).unwrap_err();
        assert_eq!(err.code(), "wrong_actor");
    }

    #[test]
    fn outsider_is_rejected_uniformly() {
        let (game, _creator, _opponent) = singles_game();
        let stranger = Uuid::new_v4();
        let err = apply_event(&game, stranger, GameEvent::Accept, NOW).unwrap_err();
        assert_eq!(err.code(), "not_a_participant");
    }

    #[test]
    fn rejection_stores_the_reason() {
        let (game, _creator, opponent) = singles_game();
        let game = apply(
            &game,
            opponent,
            GameEvent::Reject {
                reason: "out of town".into(),
            },
        );
        assert_eq!(game.status, GameStatus::Rejected);
        assert_eq!(game.rejection_reason.as_deref(), Some("out of town"));
    }

    #[test]
    fn terminal_states_admit_no_events() {
        let (game, _creator, opponent) = singles_game();
        let game = apply(
            &game,
            opponent,
            GameEvent::Reject {
                reason: "no".into(),
            },
        );
        let err = apply_event(&game, opponent, GameEvent::Accept, NOW).unwrap_err();
        assert_eq!(err.code(), "wrong_state");
    }

    #[test]
    fn only_active_player_may_submit() {
        let (game, _creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, opponent, GameEvent::Start);

        let err = apply_event(
            &game,
            opponent,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 100,
                opponent: 80,
            }),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "wrong_actor");
    }

    #[test]
    fn submission_below_threshold_is_rejected_without_state_change() {
        let (game, creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, creator, GameEvent::Start);

        let err = apply_event(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 90,
                opponent: 80,
            }),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "threshold_not_met");
        assert_eq!(game.status, GameStatus::InProgress);
        assert_eq!(game.scores, None);
    }

    #[test]
    fn negative_scores_are_rejected() {
        let (game, creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, creator, GameEvent::Start);

        let err = apply_event(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 120,
                opponent: -5,
            }),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "negative_score");
    }

    #[test]
    fn score_shape_must_match_game_mode() {
        let (game, creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, creator, GameEvent::Start);

        let err = apply_event(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Team {
                team1: 100,
                team2: 80,
            }),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "score_shape_mismatch");
    }

    #[test]
    fn tied_scores_complete_without_a_winner() {
        let (game, creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, creator, GameEvent::Start);
        let game = apply(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 100,
                opponent: 100,
            }),
        );
        let game = apply(&game, opponent, GameEvent::Confirm { accepted: true });
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.winner, None);
    }

    #[test]
    fn only_designated_confirmer_may_confirm() {
        let (game, creator, opponent) = singles_game();
        let game = apply(&game, opponent, GameEvent::Accept);
        let game = apply(&game, creator, GameEvent::Start);
        let game = apply(
            &game,
            creator,
            GameEvent::SubmitScore(ScoreRecord::Traditional {
                creator: 100,
                opponent: 80,
            }),
        );

        let err =
            apply_event(&game, creator, GameEvent::Confirm { accepted: true }, NOW).unwrap_err();
        assert_eq!(err.code(), "wrong_actor");
    }

    #[test]
    fn doubles_turn_and_confirmation_flow() {
        let team1: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let team2: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let game = Game::new(
            Participants::Doubles {
                team1: team1.clone(),
                team2: team2.clone(),
            },
            GameSettings { points_to_win: 100 },
            NOW,
        );

        // Any member of the invited team may accept.
        let game = apply(&game, team2[1], GameEvent::Accept);
        let game = apply(&game, team1[0], GameEvent::Start);
        assert_eq!(game.active_player, Some(team1[0]));

        let game = apply(
            &game,
            team1[0],
            GameEvent::SubmitScore(ScoreRecord::Team {
                team1: 80,
                team2: 120,
            }),
        );
        // The opposing team lead confirms.
        assert_eq!(game.confirmed_by, Some(team2[0]));

        let game = apply(&game, team2[0], GameEvent::Confirm { accepted: true });
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.winner, Some(team2[0]));
    }
}
