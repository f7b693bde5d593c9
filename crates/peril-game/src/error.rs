//! Error types for the game layer.

use peril_protocol::{Rank, Territory};

/// Why a local command was rejected.
///
/// Inbound messages never produce a `GameError`; they always resolve to an
/// outcome. These errors come only from commands typed by the local player.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    /// The server has paused the game; moves wait until it resumes.
    #[error("the game is paused")]
    Paused,

    #[error("unknown territory '{0}'")]
    UnknownTerritory(String),

    #[error("unknown rank '{0}'")]
    UnknownRank(String),

    /// A unit count that is zero or not a number.
    #[error("invalid unit count '{0}'")]
    InvalidCount(String),

    #[error("cannot move from {0} to itself")]
    SameTerritory(Territory),

    #[error("not enough {rank} in {territory}: requested {requested}, have {available}")]
    InsufficientUnits {
        territory: Territory,
        rank: Rank,
        requested: u32,
        available: u32,
    },

    /// The command line did not match the command's usage.
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command '{0}', try 'help'")]
    UnknownCommand(String),
}
