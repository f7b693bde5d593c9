//! # Peril
//!
//! A multiplayer strategy game whose players never talk to each other
//! directly: every move, war declaration and log line travels through a
//! message broker.
//!
//! This crate ties the layers together:
//!
//! ```text
//! transport (broker) → protocol (codecs) → pubsub (typed queues) → game (rules)
//!                                                 ↑
//!                                   dispatch (outcome → ack / publish)
//! ```
//!
//! - [`PlayerClient`]: one player's state, subscriptions and commands
//! - [`GameServer`]: pause broadcasts and the game log
//! - [`dispatch`]: the handlers that turn outcomes into acknowledgements
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peril::prelude::*;
//!
//! # async fn run() -> Result<(), PerilError> {
//! let broker = MemoryBroker::new();
//! let server = GameServer::start(broker.connect(), MemorySink::new()).await?;
//! let alice = PlayerClient::start(broker.connect(), "alice").await?;
//!
//! alice.execute_line("spawn europe infantry 10").await?;
//! server.set_paused(true).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
mod client;
mod config;
pub mod dispatch;
mod error;
mod server;
mod sink;

pub use client::{PlayerClient, Reply};
pub use config::PerilConfig;
pub use error::PerilError;
pub use server::GameServer;
pub use sink::{format_line, FileSink, GameLogSink, MemorySink, TracingSink};

pub mod prelude {
    pub use crate::{
        GameServer, MemorySink, PerilConfig, PerilError, PlayerClient, Reply,
    };
    pub use peril_game::{GameState, MoveOutcome, PlayerCommand, WarOutcome};
    pub use peril_protocol::{Army, Rank, Territory};
    pub use peril_transport::{AckType, Broker, MemoryBroker};
}
