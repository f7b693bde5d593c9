//! Game rules for Peril.
//!
//! Each process owns one [`GameState`]. Inbound messages are turned into
//! outcomes ([`MoveOutcome`], [`WarOutcome`]) that the caller maps to
//! acknowledgements and follow-up messages; typed commands are parsed into
//! [`PlayerCommand`] / [`ServerCommand`].
//!
//! # Key types
//!
//! - [`GameState`]: territories, units and the pause flag
//! - [`SharedGame`]: the state behind a Tokio mutex
//! - [`MoveOutcome`] / [`WarOutcome`]: closed results of inbound messages
//! - [`GameError`]: why a local command was rejected

mod command;
mod error;
mod outcome;
mod state;

pub use command::{PlayerCommand, ServerCommand, PLAYER_HELP, SERVER_HELP};
pub use error::GameError;
pub use outcome::{MoveOutcome, WarOutcome};
pub use state::{GameState, SharedGame, Status};
