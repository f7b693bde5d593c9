//! The game server runtime.
//!
//! The server owns the pause flag (it broadcasts [`PlayingState`]) and
//! drains the shared game-log queue into a [`GameLogSink`].

use peril_game::{ServerCommand, SERVER_HELP};
use peril_protocol::routing::{
    self, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_QUEUE, PAUSE_KEY,
};
use peril_protocol::{BincodeCodec, JsonCodec, PlayingState};
use peril_pubsub::{
    declare_peril_topology, publish, subscribe, QueueDurability, Subscription,
};
use peril_transport::Broker;

use crate::client::Reply;
use crate::dispatch::GameLogHandler;
use crate::sink::GameLogSink;
use crate::PerilError;

/// A running game server.
pub struct GameServer<B: Broker> {
    broker: B,
    game_logs: Subscription,
}

impl<B: Broker> GameServer<B> {
    /// Declares the topology and starts writing game logs to `sink`.
    pub async fn start<S: GameLogSink>(broker: B, sink: S) -> Result<Self, PerilError> {
        declare_peril_topology(&broker).await?;

        let game_logs = subscribe(
            &broker,
            BincodeCodec,
            EXCHANGE_PERIL_TOPIC,
            GAME_LOG_QUEUE,
            &routing::game_log_binding(),
            QueueDurability::Durable,
            GameLogHandler::new(sink),
        )
        .await?;

        tracing::info!(id = %broker.id(), "game server started");
        Ok(Self { broker, game_logs })
    }

    /// Broadcasts the pause flag to every player.
    pub async fn set_paused(&self, is_paused: bool) -> Result<(), PerilError> {
        publish(
            &self.broker,
            &JsonCodec,
            EXCHANGE_PERIL_DIRECT,
            PAUSE_KEY,
            &PlayingState { is_paused },
        )
        .await?;
        tracing::info!(paused = is_paused, "playing state broadcast");
        Ok(())
    }

    pub async fn execute(&self, command: ServerCommand) -> Result<Reply, PerilError> {
        match command {
            ServerCommand::Pause => {
                self.set_paused(true).await?;
                Ok(Reply::Print("game paused".to_string()))
            }
            ServerCommand::Resume => {
                self.set_paused(false).await?;
                Ok(Reply::Print("game resumed".to_string()))
            }
            ServerCommand::Help => Ok(Reply::Print(SERVER_HELP.to_string())),
            ServerCommand::Quit => Ok(Reply::Quit),
        }
    }

    /// Parses and runs one console line. Blank lines print nothing.
    pub async fn execute_line(&self, line: &str) -> Result<Option<Reply>, PerilError> {
        match ServerCommand::parse(line)? {
            Some(command) => self.execute(command).await.map(Some),
            None => Ok(None),
        }
    }

    /// Closes the broker connection and waits for the log listener to end.
    pub async fn shutdown(self) -> Result<(), PerilError> {
        self.broker.close().await?;
        self.game_logs.join().await?;
        tracing::info!("game server stopped");
        Ok(())
    }
}
