//! Fire-and-forget notification collaborator.
//!
//! Invoked after a transition has been persisted, typically to refresh
//! external badge counts. A failing notifier must never roll back the
//! transition, so the trait is infallible and implementations swallow and
//! log their own errors.

use tracing::info;
use uuid::Uuid;

use crate::game::{GameStatus, Transition};

/// What happened to a game, from the point of view of the people to notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The invitation was accepted.
    InviteAccepted,
    /// The invitation was declined.
    InviteRejected,
    /// Scores were submitted and await confirmation.
    ScoreSubmitted,
    /// The game completed with confirmed scores.
    GameCompleted,
}

/// A notification about a single game.
#[derive(Debug, Clone)]
pub struct GameNotification {
    /// What happened.
    pub kind: NotificationKind,
    /// Game the notification refers to.
    pub game_id: Uuid,
}

/// Collaborator notified after successful transitions.
pub trait Notifier: Send + Sync {
    /// Deliver a notification. Must not block the caller on failures.
    fn notify(&self, notification: GameNotification);
}

/// Default notifier that only logs, for worker processes without an
/// external badge service.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: GameNotification) {
        info!(
            game = %notification.game_id,
            kind = ?notification.kind,
            "game notification"
        );
    }
}

/// The notification a persisted transition should produce, if any.
///
/// A disputed confirmation returns the game to play without notifying
/// anyone; so does starting a game.
pub fn notification_for(transition: &Transition) -> Option<GameNotification> {
    let kind = match (transition.from, transition.to) {
        (GameStatus::Invited, GameStatus::Accepted) => NotificationKind::InviteAccepted,
        (GameStatus::Invited, GameStatus::Rejected) => NotificationKind::InviteRejected,
        (GameStatus::InProgress, GameStatus::WaitingConfirmation) => {
            NotificationKind::ScoreSubmitted
        }
        (GameStatus::WaitingConfirmation, GameStatus::Completed) => {
            NotificationKind::GameCompleted
        }
        _ => return None,
    };
    Some(GameNotification {
        kind,
        game_id: transition.game.id,
    })
}
