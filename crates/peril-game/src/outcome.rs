//! Results of applying inbound messages to a [`GameState`](crate::GameState).

use std::fmt;

use peril_protocol::{PlayerSnapshot, RecognitionOfWar, Territory};

/// What an observed army move means for the local player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Nothing to contest; the move was recorded.
    Safe,
    /// The move lands on the local player's units. Carries the declaration
    /// to publish.
    MakeWar(RecognitionOfWar),
    /// The local player's own move echoed back.
    SamePlayer,
}

/// What a war declaration means for the local player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarOutcome {
    /// The local player is neither the attacker nor the defender.
    NotInvolved,
    /// The local player has nothing left in the contested territory.
    NoUnits,
    OpponentWon {
        winner: PlayerSnapshot,
        loser: PlayerSnapshot,
    },
    YouWon {
        winner: PlayerSnapshot,
        loser: PlayerSnapshot,
    },
    Draw {
        attacker: PlayerSnapshot,
        defender: PlayerSnapshot,
    },
}

impl WarOutcome {
    /// The game-log line for a fought battle, or `None` if there was none.
    pub fn log_message(&self, territory: Territory) -> Option<String> {
        match self {
            Self::NotInvolved | Self::NoUnits => None,
            Self::OpponentWon { winner, loser } | Self::YouWon { winner, loser } => {
                Some(format!("{winner} won a war against {loser} in {territory}"))
            }
            Self::Draw { attacker, defender } => Some(format!(
                "a war between {attacker} and {defender} in {territory} resulted in a draw"
            )),
        }
    }
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::MakeWar(_) => write!(f, "make-war"),
            Self::SamePlayer => write!(f, "same-player"),
        }
    }
}

impl fmt::Display for WarOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInvolved => write!(f, "not-involved"),
            Self::NoUnits => write!(f, "no-units"),
            Self::OpponentWon { .. } => write!(f, "opponent-won"),
            Self::YouWon { .. } => write!(f, "you-won"),
            Self::Draw { .. } => write!(f, "draw"),
        }
    }
}
