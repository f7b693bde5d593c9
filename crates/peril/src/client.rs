//! The player runtime.
//!
//! A [`PlayerClient`] owns one player's game state and the three
//! subscriptions that keep it up to date (pause, moves, war), and turns
//! typed [`PlayerCommand`]s into state changes and published messages.

use rand::seq::IndexedRandom;

use peril_game::{GameState, PlayerCommand, SharedGame, PLAYER_HELP};
use peril_protocol::routing::{
    self, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, PAUSE_KEY, WAR_QUEUE,
};
use peril_protocol::{BincodeCodec, GameLog, JsonCodec, PlayerSnapshot};
use peril_pubsub::{
    declare_peril_topology, publish, subscribe, QueueDurability, Subscription,
};
use peril_transport::Broker;

use crate::dispatch::{now_ms, MoveHandler, PauseHandler, WarHandler};
use crate::PerilError;

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print this and keep reading.
    Print(String),
    /// Stop reading and shut down.
    Quit,
}

/// Lines published by `spam`.
const MALICIOUS_LOGS: &[&str] = &[
    "Never interrupt your enemy when he is making a mistake.",
    "The hardest thing of all for a soldier is to retreat.",
    "A soldier will fight long and hard for a bit of colored ribbon.",
    "It is well that war is so terrible, otherwise we should grow too fond of it.",
    "The art of war is simple enough. Find out where your enemy is.",
    "All warfare is based on deception.",
];

/// One connected player.
pub struct PlayerClient<B: Broker> {
    broker: B,
    owner: PlayerSnapshot,
    game: SharedGame,
    subscriptions: Vec<Subscription>,
}

impl<B: Broker> PlayerClient<B> {
    /// Declares the topology, subscribes to pause, move and war traffic,
    /// and returns a client ready for commands.
    ///
    /// # Errors
    /// Any declaration or subscription failure. Nothing keeps running if
    /// this fails part-way, since the caller closes the broker.
    pub async fn start(
        broker: B,
        username: impl Into<String>,
    ) -> Result<Self, PerilError> {
        let owner = PlayerSnapshot::new(username);
        let game = GameState::new(owner.clone()).into_shared();
        declare_peril_topology(&broker).await?;

        let pause = subscribe(
            &broker,
            JsonCodec,
            EXCHANGE_PERIL_DIRECT,
            &routing::pause_queue(&owner.username),
            PAUSE_KEY,
            QueueDurability::Transient,
            PauseHandler::new(game.clone()),
        )
        .await?;

        let moves = subscribe(
            &broker,
            JsonCodec,
            EXCHANGE_PERIL_TOPIC,
            &routing::army_moves_queue(&owner.username),
            &routing::army_moves_binding(),
            QueueDurability::Transient,
            MoveHandler::new(game.clone(), owner.clone(), broker.clone()),
        )
        .await?;

        let war = subscribe(
            &broker,
            JsonCodec,
            EXCHANGE_PERIL_TOPIC,
            WAR_QUEUE,
            &routing::war_binding(),
            QueueDurability::Durable,
            WarHandler::new(game.clone(), owner.clone(), broker.clone()),
        )
        .await?;

        tracing::info!(player = %owner, "player joined");
        Ok(Self {
            broker,
            owner,
            game,
            subscriptions: vec![pause, moves, war],
        })
    }

    pub fn owner(&self) -> &PlayerSnapshot {
        &self.owner
    }

    /// The shared game state the listeners update.
    pub fn game(&self) -> SharedGame {
        self.game.clone()
    }

    /// Runs one typed command.
    pub async fn execute(&self, command: PlayerCommand) -> Result<Reply, PerilError> {
        match command {
            PlayerCommand::Spawn {
                territory,
                rank,
                count,
            } => {
                let army = self.game.lock().await.spawn(territory, rank, count)?;
                Ok(Reply::Print(format!(
                    "spawned {count} {rank} in {territory}, you now have {army} there"
                )))
            }
            PlayerCommand::Move {
                from,
                to,
                count,
                rank,
            } => {
                let mv = self.game.lock().await.move_units(from, to, count, rank)?;
                let key = routing::army_moves_key(&self.owner.username);
                if let Err(e) =
                    publish(&self.broker, &JsonCodec, EXCHANGE_PERIL_TOPIC, &key, &mv).await
                {
                    self.game.lock().await.revert_move(&mv);
                    return Err(e.into());
                }
                tracing::info!(
                    player = %self.owner,
                    %from,
                    %to,
                    units = %mv.units,
                    "move published"
                );
                Ok(Reply::Print(format!("moved {} from {from} to {to}", mv.units)))
            }
            PlayerCommand::Status => {
                Ok(Reply::Print(self.game.lock().await.status().to_string()))
            }
            PlayerCommand::Help => Ok(Reply::Print(PLAYER_HELP.to_string())),
            PlayerCommand::Spam(n) => {
                self.spam(n).await?;
                Ok(Reply::Print(format!("published {n} malicious logs")))
            }
            PlayerCommand::Quit => Ok(Reply::Quit),
        }
    }

    /// Parses and runs one console line. Blank lines print nothing.
    pub async fn execute_line(&self, line: &str) -> Result<Option<Reply>, PerilError> {
        match PlayerCommand::parse(line)? {
            Some(command) => self.execute(command).await.map(Some),
            None => Ok(None),
        }
    }

    /// Floods the game log with `n` random lines.
    pub async fn spam(&self, n: u32) -> Result<(), PerilError> {
        let key = routing::game_log_key(&self.owner.username);
        for _ in 0..n {
            let message = {
                let mut rng = rand::rng();
                MALICIOUS_LOGS.choose(&mut rng).copied().unwrap_or_default()
            };
            let log = GameLog {
                timestamp_ms: now_ms(),
                username: self.owner.username.clone(),
                message: message.to_string(),
            };
            publish(&self.broker, &BincodeCodec, EXCHANGE_PERIL_TOPIC, &key, &log)
                .await?;
        }
        Ok(())
    }

    /// Closes the broker connection and waits for every listener to end.
    pub async fn shutdown(self) -> Result<(), PerilError> {
        self.broker.close().await?;
        for subscription in self.subscriptions {
            let queue = subscription.queue().queue.clone();
            subscription.join().await?;
            tracing::debug!(player = %self.owner, %queue, "listener stopped");
        }
        tracing::info!(player = %self.owner, "player left");
        Ok(())
    }
}
