//! Outcome dispatch: from game outcomes to acknowledgements and follow-up
//! messages.
//!
//! Each subscription gets one handler from this module. A handler applies
//! the message to the shared game state, publishes whatever the outcome
//! calls for, and returns the [`AckType`] that settles the delivery.

use std::time::{SystemTime, UNIX_EPOCH};

use peril_game::{MoveOutcome, SharedGame, WarOutcome};
use peril_protocol::routing::{self, EXCHANGE_PERIL_TOPIC};
use peril_protocol::{
    ArmyMove, BincodeCodec, GameLog, JsonCodec, PlayerSnapshot, PlayingState,
    RecognitionOfWar,
};
use peril_pubsub::{publish, Handler};
use peril_transport::{AckType, Broker};

use crate::sink::GameLogSink;

/// How a move outcome settles its delivery.
///
/// `MakeWar` acks once the declaration is out; if publishing it fails the
/// move handler requeues instead.
pub fn ack_for_move(outcome: &MoveOutcome) -> AckType {
    match outcome {
        MoveOutcome::Safe => AckType::Ack,
        MoveOutcome::MakeWar(_) => AckType::Ack,
        MoveOutcome::SamePlayer => AckType::NackDiscard,
    }
}

/// How a war outcome settles its delivery.
///
/// Uninvolved players put the declaration back on the shared queue so an
/// involved player can take it.
pub fn ack_for_war(outcome: &WarOutcome) -> AckType {
    match outcome {
        WarOutcome::NotInvolved => AckType::NackRequeue,
        WarOutcome::NoUnits => AckType::NackDiscard,
        WarOutcome::OpponentWon { .. } => AckType::Ack,
        WarOutcome::YouWon { .. } => AckType::Ack,
        WarOutcome::Draw { .. } => AckType::Ack,
    }
}

/// Milliseconds since the Unix epoch, for game-log timestamps.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Applies pause broadcasts.
pub struct PauseHandler {
    game: SharedGame,
}

impl PauseHandler {
    pub fn new(game: SharedGame) -> Self {
        Self { game }
    }
}

impl Handler<PlayingState> for PauseHandler {
    async fn handle(&mut self, state: PlayingState) -> AckType {
        self.game.lock().await.set_paused(state);
        AckType::Ack
    }
}

/// Applies observed moves and declares war when one lands on local units.
pub struct MoveHandler<B> {
    game: SharedGame,
    owner: PlayerSnapshot,
    broker: B,
}

impl<B: Broker> MoveHandler<B> {
    pub fn new(game: SharedGame, owner: PlayerSnapshot, broker: B) -> Self {
        Self {
            game,
            owner,
            broker,
        }
    }
}

impl<B: Broker> Handler<ArmyMove> for MoveHandler<B> {
    async fn handle(&mut self, mv: ArmyMove) -> AckType {
        let outcome = self.game.lock().await.apply_move(&mv);

        if let MoveOutcome::MakeWar(declaration) = &outcome {
            let key = routing::war_key(&self.owner.username);
            if let Err(e) = publish(
                &self.broker,
                &JsonCodec,
                EXCHANGE_PERIL_TOPIC,
                &key,
                declaration,
            )
            .await
            {
                tracing::warn!(
                    player = %mv.player,
                    routing_key = %key,
                    error = %e,
                    "war declaration not published, requeueing move"
                );
                return AckType::NackRequeue;
            }
            tracing::info!(
                attacker = %declaration.attacker,
                territory = %declaration.territory,
                "war declared"
            );
        }

        let ack = ack_for_move(&outcome);
        tracing::debug!(player = %mv.player, %outcome, %ack, "move handled");
        ack
    }
}

/// Resolves war declarations and reports fought battles to the game log.
pub struct WarHandler<B> {
    game: SharedGame,
    owner: PlayerSnapshot,
    broker: B,
}

impl<B: Broker> WarHandler<B> {
    pub fn new(game: SharedGame, owner: PlayerSnapshot, broker: B) -> Self {
        Self {
            game,
            owner,
            broker,
        }
    }
}

impl<B: Broker> Handler<RecognitionOfWar> for WarHandler<B> {
    async fn handle(&mut self, war: RecognitionOfWar) -> AckType {
        let outcome = self.game.lock().await.resolve_war(&war);
        let ack = ack_for_war(&outcome);

        let Some(message) = outcome.log_message(war.territory) else {
            tracing::debug!(
                attacker = %war.attacker,
                defender = %war.defender,
                %outcome,
                %ack,
                "war not resolved here"
            );
            return ack;
        };

        let log = GameLog {
            timestamp_ms: now_ms(),
            username: self.owner.username.clone(),
            message,
        };
        let key = routing::game_log_key(&self.owner.username);
        match publish(&self.broker, &BincodeCodec, EXCHANGE_PERIL_TOPIC, &key, &log)
            .await
        {
            Ok(()) => ack,
            Err(e) => {
                tracing::warn!(
                    routing_key = %key,
                    error = %e,
                    "game log not published, requeueing war"
                );
                AckType::NackRequeue
            }
        }
    }
}

/// Writes game-log messages to a sink (server side).
pub struct GameLogHandler<S> {
    sink: S,
}

impl<S: GameLogSink> GameLogHandler<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: GameLogSink> Handler<GameLog> for GameLogHandler<S> {
    async fn handle(&mut self, log: GameLog) -> AckType {
        match self.sink.write(&log) {
            Ok(()) => AckType::Ack,
            Err(e) => {
                tracing::warn!(
                    username = %log.username,
                    error = %e,
                    "game log write failed, requeueing"
                );
                AckType::NackRequeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peril_protocol::{Army, Territory};

    fn war() -> RecognitionOfWar {
        RecognitionOfWar {
            attacker: PlayerSnapshot::new("alice"),
            defender: PlayerSnapshot::new("bob"),
            territory: Territory::Asia,
            attacking: Army::new(1, 0, 0),
            defending: Army::new(1, 0, 0),
        }
    }

    #[test]
    fn test_ack_for_move() {
        assert_eq!(ack_for_move(&MoveOutcome::Safe), AckType::Ack);
        assert_eq!(ack_for_move(&MoveOutcome::MakeWar(war())), AckType::Ack);
        assert_eq!(ack_for_move(&MoveOutcome::SamePlayer), AckType::NackDiscard);
    }

    #[test]
    fn test_ack_for_war() {
        let alice = PlayerSnapshot::new("alice");
        let bob = PlayerSnapshot::new("bob");
        assert_eq!(ack_for_war(&WarOutcome::NotInvolved), AckType::NackRequeue);
        assert_eq!(ack_for_war(&WarOutcome::NoUnits), AckType::NackDiscard);
        for outcome in [
            WarOutcome::YouWon {
                winner: alice.clone(),
                loser: bob.clone(),
            },
            WarOutcome::OpponentWon {
                winner: bob.clone(),
                loser: alice.clone(),
            },
            WarOutcome::Draw {
                attacker: alice.clone(),
                defender: bob.clone(),
            },
        ] {
            assert_eq!(ack_for_war(&outcome), AckType::Ack);
        }
    }

    #[test]
    fn test_ack_mapping_is_deterministic() {
        let outcome = MoveOutcome::SamePlayer;
        assert_eq!(ack_for_move(&outcome), ack_for_move(&outcome.clone()));
        assert_eq!(
            ack_for_war(&WarOutcome::NoUnits),
            ack_for_war(&WarOutcome::NoUnits)
        );
    }

    #[test]
    fn test_now_ms_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
