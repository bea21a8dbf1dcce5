//! Game operations: invitations, turns, and the two-party score
//! confirmation protocol.
//!
//! Each operation is load, apply a pure event, save with the revision read.
//! A stale revision comes back as [`ServiceError::Conflict`] from the store,
//! so two actors racing on the same game cannot both win.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    clock::Clock,
    dao::{models::GameEntity, store::LeagueStore},
    error::ServiceError,
    game::{Game, GameEvent, GameSettings, Participants, ScoreRecord, machine},
    services::notifier::{Notifier, notification_for},
};

/// Request to create a new game invitation.
#[derive(Debug, Clone)]
pub struct CreateGameRequest {
    /// Who plays the game.
    pub participants: Participants,
    /// Score threshold for a valid submission.
    pub points_to_win: i32,
}

/// Service driving the lifecycle of individual games.
pub struct GameService {
    store: Arc<dyn LeagueStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl GameService {
    /// Build a service over the given store, clock, and notifier.
    pub fn new(
        store: Arc<dyn LeagueStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    /// Create a game invitation in the `Invited` state.
    pub async fn create_invite(&self, request: CreateGameRequest) -> Result<Game, ServiceError> {
        validate_request(&request)?;
        let game = Game::new(
            request.participants,
            GameSettings {
                points_to_win: request.points_to_win,
            },
            self.clock.now(),
        );
        self.store
            .save_game(GameEntity::from_game(game.clone(), 0))
            .await?;
        debug!(game = %game.id, "game invitation created");
        Ok(game)
    }

    /// Invited side accepts the invitation.
    pub async fn accept_invite(&self, game_id: Uuid, actor: Uuid) -> Result<Game, ServiceError> {
        self.dispatch(game_id, actor, GameEvent::Accept).await
    }

    /// Invited side declines the invitation with a reason.
    pub async fn reject_invite(
        &self,
        game_id: Uuid,
        actor: Uuid,
        reason: String,
    ) -> Result<Game, ServiceError> {
        self.dispatch(game_id, actor, GameEvent::Reject { reason })
            .await
    }

    /// Any participant starts an accepted game.
    pub async fn start_game(&self, game_id: Uuid, actor: Uuid) -> Result<Game, ServiceError> {
        self.dispatch(game_id, actor, GameEvent::Start).await
    }

    /// The active player submits final scores for confirmation.
    pub async fn submit_score(
        &self,
        game_id: Uuid,
        actor: Uuid,
        record: ScoreRecord,
    ) -> Result<Game, ServiceError> {
        self.dispatch(game_id, actor, GameEvent::SubmitScore(record))
            .await
    }

    /// The designated confirmer confirms or disputes the submitted scores.
    pub async fn confirm_score(
        &self,
        game_id: Uuid,
        actor: Uuid,
        accepted: bool,
    ) -> Result<Game, ServiceError> {
        self.dispatch(game_id, actor, GameEvent::Confirm { accepted })
            .await
    }

    /// Load the game, apply the event, persist at the revision read, notify.
    async fn dispatch(
        &self,
        game_id: Uuid,
        actor: Uuid,
        event: GameEvent,
    ) -> Result<Game, ServiceError> {
        let entity = self
            .store
            .find_game(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;
        let revision = entity.revision;
        let game: Game = entity.into();

        let transition = machine::apply_event(&game, actor, event, self.clock.now())?;
        self.store
            .save_game(GameEntity::from_game(transition.game.clone(), revision))
            .await?;
        debug!(
            game = %game_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "game transition persisted"
        );

        if let Some(notification) = notification_for(&transition) {
            self.notifier.notify(notification);
        }
        Ok(transition.game)
    }
}

fn validate_request(request: &CreateGameRequest) -> Result<(), ServiceError> {
    if request.points_to_win <= 0 {
        return Err(ServiceError::validation(
            "invalid_points_to_win",
            format!("points_to_win must be positive, got {}", request.points_to_win),
        ));
    }
    match &request.participants {
        Participants::Singles { creator, opponent } => {
            if creator == opponent {
                return Err(ServiceError::validation(
                    "duplicate_participant",
                    "a player cannot invite themselves",
                ));
            }
        }
        Participants::Doubles { team1, team2 } => {
            if team1.is_empty() || team2.is_empty() {
                return Err(ServiceError::validation(
                    "empty_team",
                    "both teams need at least one player",
                ));
            }
            let mut seen = std::collections::HashSet::new();
            for player in team1.iter().chain(team2.iter()) {
                if !seen.insert(*player) {
                    return Err(ServiceError::validation(
                        "duplicate_participant",
                        format!("player `{player}` appears more than once"),
                    ));
                }
            }
        }
    }
    Ok(())
}
