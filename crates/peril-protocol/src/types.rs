//! Core wire types: everything that travels through the broker.
//!
//! These are the structures that get encoded by a [`Codec`](crate::Codec),
//! published to an exchange, and decoded on the other side. They must stay
//! encodable by both the self-describing JSON codec and the binary one, so
//! they only use plain structs and unit enums (no internally tagged enums).

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of a player as carried inside messages.
///
/// Two snapshots are the same player iff their usernames are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub username: String,
}

impl PlayerSnapshot {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl fmt::Display for PlayerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// A territory on the world map.
///
/// Serialized as its lowercase name (`"europe"`) in JSON.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Territory {
    Americas,
    Europe,
    Africa,
    Asia,
    Australia,
    Antarctica,
}

impl Territory {
    /// Every territory, in map order.
    pub const ALL: [Territory; 6] = [
        Self::Americas,
        Self::Europe,
        Self::Africa,
        Self::Asia,
        Self::Australia,
        Self::Antarctica,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Americas => "americas",
            Self::Europe => "europe",
            Self::Africa => "africa",
            Self::Asia => "asia",
            Self::Australia => "australia",
            Self::Antarctica => "antarctica",
        }
    }
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Territory {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("unknown territory '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// A unit type. Each rank has a fixed combat power.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Infantry,
    Cavalry,
    Artillery,
}

impl Rank {
    pub const ALL: [Rank; 3] = [Self::Infantry, Self::Cavalry, Self::Artillery];

    /// Combat power contributed by one unit of this rank.
    pub fn power(self) -> u64 {
        match self {
            Self::Infantry => 1,
            Self::Cavalry => 5,
            Self::Artillery => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Infantry => "infantry",
            Self::Cavalry => "cavalry",
            Self::Artillery => "artillery",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("unknown rank '{s}'")))
    }
}

/// A unit composition: how many units of each rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Army {
    pub infantry: u32,
    pub cavalry: u32,
    pub artillery: u32,
}

impl Army {
    pub const EMPTY: Army = Army {
        infantry: 0,
        cavalry: 0,
        artillery: 0,
    };

    pub fn new(infantry: u32, cavalry: u32, artillery: u32) -> Self {
        Self {
            infantry,
            cavalry,
            artillery,
        }
    }

    /// An army of `count` units of a single rank.
    pub fn of(rank: Rank, count: u32) -> Self {
        let mut army = Self::EMPTY;
        *army.count_mut(rank) = count;
        army
    }

    pub fn count(&self, rank: Rank) -> u32 {
        match rank {
            Rank::Infantry => self.infantry,
            Rank::Cavalry => self.cavalry,
            Rank::Artillery => self.artillery,
        }
    }

    fn count_mut(&mut self, rank: Rank) -> &mut u32 {
        match rank {
            Rank::Infantry => &mut self.infantry,
            Rank::Cavalry => &mut self.cavalry,
            Rank::Artillery => &mut self.artillery,
        }
    }

    /// Head count across all ranks.
    pub fn total(&self) -> u64 {
        Rank::ALL.iter().map(|r| u64::from(self.count(*r))).sum()
    }

    /// Weighted combat power.
    pub fn power(&self) -> u64 {
        Rank::ALL
            .iter()
            .map(|r| u64::from(self.count(*r)) * r.power())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Removes `other`, or returns `None` if any rank would go negative.
    pub fn checked_sub(&self, other: &Army) -> Option<Army> {
        Some(Army {
            infantry: self.infantry.checked_sub(other.infantry)?,
            cavalry: self.cavalry.checked_sub(other.cavalry)?,
            artillery: self.artillery.checked_sub(other.artillery)?,
        })
    }

    /// Removes `other`, clamping each rank at zero.
    pub fn saturating_sub(&self, other: &Army) -> Army {
        Army {
            infantry: self.infantry.saturating_sub(other.infantry),
            cavalry: self.cavalry.saturating_sub(other.cavalry),
            artillery: self.artillery.saturating_sub(other.artillery),
        }
    }
}

impl Add for Army {
    type Output = Army;

    fn add(self, rhs: Army) -> Army {
        Army {
            infantry: self.infantry.saturating_add(rhs.infantry),
            cavalry: self.cavalry.saturating_add(rhs.cavalry),
            artillery: self.artillery.saturating_add(rhs.artillery),
        }
    }
}

impl AddAssign for Army {
    fn add_assign(&mut self, rhs: Army) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Army {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} infantry, {} cavalry, {} artillery",
            self.infantry, self.cavalry, self.artillery
        )
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A player moved units between territories.
///
/// Published on `army_moves.<username>`; every player's move queue
/// receives it, the mover's own included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyMove {
    pub player: PlayerSnapshot,
    pub from: Territory,
    pub to: Territory,
    pub units: Army,
}

/// A defender's acknowledgement that a move into its territory means war.
///
/// Both forces travel with the declaration so whichever involved process
/// consumes it resolves the same battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOfWar {
    pub attacker: PlayerSnapshot,
    pub defender: PlayerSnapshot,
    pub territory: Territory,
    pub attacking: Army,
    pub defending: Army,
}

/// Session-wide pause flag, broadcast by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingState {
    pub is_paused: bool,
}

/// A line for the server's game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub username: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_territory_serializes_lowercase() {
        let json = serde_json::to_string(&Territory::Americas).unwrap();
        assert_eq!(json, "\"americas\"");
    }

    #[test]
    fn test_territory_parse_ignores_case() {
        assert_eq!("Europe".parse::<Territory>().unwrap(), Territory::Europe);
        assert!("atlantis".parse::<Territory>().is_err());
    }

    #[test]
    fn test_rank_parse_and_power() {
        assert_eq!("cavalry".parse::<Rank>().unwrap(), Rank::Cavalry);
        assert!("dragon".parse::<Rank>().is_err());
        assert_eq!(Rank::Infantry.power(), 1);
        assert_eq!(Rank::Cavalry.power(), 5);
        assert_eq!(Rank::Artillery.power(), 10);
    }

    #[test]
    fn test_army_totals_and_power() {
        let army = Army::new(3, 2, 1);
        assert_eq!(army.total(), 6);
        assert_eq!(army.power(), 3 + 10 + 10);
        assert!(!army.is_empty());
        assert!(Army::EMPTY.is_empty());
    }

    #[test]
    fn test_army_checked_sub() {
        let army = Army::new(10, 1, 0);
        assert_eq!(army.checked_sub(&Army::of(Rank::Infantry, 4)), Some(Army::new(6, 1, 0)));
        assert_eq!(army.checked_sub(&Army::of(Rank::Artillery, 1)), None);
    }

    #[test]
    fn test_army_saturating_sub_clamps() {
        let army = Army::new(2, 0, 0);
        assert_eq!(army.saturating_sub(&Army::new(5, 1, 0)), Army::EMPTY);
    }

    #[test]
    fn test_army_move_json_shape() {
        let mv = ArmyMove {
            player: PlayerSnapshot::new("alice"),
            from: Territory::Europe,
            to: Territory::Africa,
            units: Army::of(Rank::Infantry, 4),
        };
        let json: serde_json::Value = serde_json::to_value(&mv).unwrap();
        assert_eq!(json["player"]["username"], "alice");
        assert_eq!(json["from"], "europe");
        assert_eq!(json["to"], "africa");
        assert_eq!(json["units"]["infantry"], 4);
    }

    #[test]
    fn test_playing_state_json_shape() {
        let json = serde_json::to_string(&PlayingState { is_paused: true }).unwrap();
        assert_eq!(json, r#"{"is_paused":true}"#);
    }

    #[test]
    fn test_decode_unknown_territory_fails() {
        let bad = r#"{"player":{"username":"a"},"from":"mars","to":"asia",
                      "units":{"infantry":1,"cavalry":0,"artillery":0}}"#;
        assert!(serde_json::from_str::<ArmyMove>(bad).is_err());
    }
}
