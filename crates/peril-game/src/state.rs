//! The per-process game state machine.
//!
//! A [`GameState`] holds the local player's authoritative units plus this
//! process's view of everyone else's armies, learned from observed moves.
//! Inbound messages go through [`apply_move`](GameState::apply_move),
//! [`resolve_war`](GameState::resolve_war) and
//! [`set_paused`](GameState::set_paused); each returns an outcome and never
//! fails. Local commands ([`spawn`](GameState::spawn),
//! [`move_units`](GameState::move_units)) are validated and may be
//! rejected with a [`GameError`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use peril_protocol::{
    Army, ArmyMove, PlayerSnapshot, PlayingState, Rank, RecognitionOfWar,
    Territory,
};

use crate::{GameError, MoveOutcome, WarOutcome};

/// Game state shared between the command loop and the listeners.
///
/// Lock it for the state transition only; never hold it across a publish.
pub type SharedGame = Arc<tokio::sync::Mutex<GameState>>;

/// Territory → username → units.
type UnitMap = BTreeMap<Territory, BTreeMap<String, Army>>;

#[derive(Debug, Clone)]
pub struct GameState {
    owner: PlayerSnapshot,
    paused: bool,
    units: UnitMap,
}

impl GameState {
    /// A fresh, unpaused game with no units anywhere.
    pub fn new(owner: PlayerSnapshot) -> Self {
        Self {
            owner,
            paused: false,
            units: UnitMap::new(),
        }
    }

    /// Wraps the state for sharing across tasks.
    pub fn into_shared(self) -> SharedGame {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn owner(&self) -> &PlayerSnapshot {
        &self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Units `username` holds in `territory`, as far as this process knows.
    pub fn units_of(&self, username: &str, territory: Territory) -> Army {
        self.units
            .get(&territory)
            .and_then(|players| players.get(username))
            .copied()
            .unwrap_or_default()
    }

    /// Replaces a player's units in a territory. Empty armies are removed.
    fn set_units(&mut self, username: &str, territory: Territory, army: Army) {
        if army.is_empty() {
            if let Some(players) = self.units.get_mut(&territory) {
                players.remove(username);
                if players.is_empty() {
                    self.units.remove(&territory);
                }
            }
        } else {
            self.units
                .entry(territory)
                .or_default()
                .insert(username.to_string(), army);
        }
    }

    fn local_units(&self, territory: Territory) -> Army {
        self.units_of(&self.owner.username, territory)
    }

    // -----------------------------------------------------------------------
    // Inbound messages
    // -----------------------------------------------------------------------

    /// Applies a move observed on the move topic.
    pub fn apply_move(&mut self, mv: &ArmyMove) -> MoveOutcome {
        if mv.player == self.owner {
            return MoveOutcome::SamePlayer;
        }
        // Nothing leaves or arrives anywhere.
        if mv.from == mv.to {
            return MoveOutcome::Safe;
        }

        let defending = self.local_units(mv.to);
        if !defending.is_empty() {
            return MoveOutcome::MakeWar(RecognitionOfWar {
                attacker: mv.player.clone(),
                defender: self.owner.clone(),
                territory: mv.to,
                attacking: mv.units,
                defending,
            });
        }

        let mover = mv.player.username.as_str();
        let source = self.units_of(mover, mv.from).saturating_sub(&mv.units);
        let destination = self.units_of(mover, mv.to) + mv.units;
        self.set_units(mover, mv.from, source);
        self.set_units(mover, mv.to, destination);

        tracing::debug!(
            player = %mv.player,
            from = %mv.from,
            to = %mv.to,
            units = %mv.units,
            "recorded foreign move"
        );
        MoveOutcome::Safe
    }

    /// Resolves a war declaration if the local player is part of it.
    ///
    /// The local side fights with its current units in the territory; the
    /// other side fights with the army carried in the declaration. Higher
    /// power wins, then higher head count, otherwise it is a draw.
    pub fn resolve_war(&mut self, war: &RecognitionOfWar) -> WarOutcome {
        let local_is_attacker = war.attacker == self.owner;
        if !local_is_attacker && war.defender != self.owner {
            return WarOutcome::NotInvolved;
        }

        let local = self.local_units(war.territory);
        if local.is_empty() {
            return WarOutcome::NoUnits;
        }

        let (attacking, defending) = if local_is_attacker {
            (local, war.defending)
        } else {
            (war.attacking, local)
        };
        let attacker = war.attacker.username.as_str();
        let defender = war.defender.username.as_str();

        let verdict = attacking
            .power()
            .cmp(&defending.power())
            .then_with(|| attacking.total().cmp(&defending.total()));

        let outcome = match verdict {
            Ordering::Greater => {
                self.set_units(defender, war.territory, Army::EMPTY);
                self.set_units(attacker, war.territory, attacking);
                self.perspective(&war.attacker, &war.defender)
            }
            Ordering::Less => {
                self.set_units(attacker, war.territory, Army::EMPTY);
                self.set_units(defender, war.territory, defending);
                self.perspective(&war.defender, &war.attacker)
            }
            Ordering::Equal => {
                self.set_units(attacker, war.territory, Army::EMPTY);
                self.set_units(defender, war.territory, Army::EMPTY);
                WarOutcome::Draw {
                    attacker: war.attacker.clone(),
                    defender: war.defender.clone(),
                }
            }
        };

        tracing::info!(
            attacker,
            defender,
            territory = %war.territory,
            %outcome,
            "war resolved"
        );
        outcome
    }

    fn perspective(&self, winner: &PlayerSnapshot, loser: &PlayerSnapshot) -> WarOutcome {
        let (winner, loser) = (winner.clone(), loser.clone());
        if winner == self.owner {
            WarOutcome::YouWon { winner, loser }
        } else {
            WarOutcome::OpponentWon { winner, loser }
        }
    }

    /// Overwrites the pause flag with the server's broadcast.
    pub fn set_paused(&mut self, state: PlayingState) {
        self.paused = state.is_paused;
        tracing::info!(paused = self.paused, "playing state changed");
    }

    // -----------------------------------------------------------------------
    // Local commands
    // -----------------------------------------------------------------------

    /// Adds `count` new units of `rank` to the local player in `territory`.
    ///
    /// Returns the local player's units there afterwards.
    pub fn spawn(
        &mut self,
        territory: Territory,
        rank: Rank,
        count: u32,
    ) -> Result<Army, GameError> {
        if count == 0 {
            return Err(GameError::InvalidCount(count.to_string()));
        }
        let army = self.local_units(territory) + Army::of(rank, count);
        let owner = self.owner.username.clone();
        self.set_units(&owner, territory, army);
        Ok(army)
    }

    /// Moves local units and returns the message announcing the move.
    ///
    /// The local state changes immediately; other processes learn about it
    /// once the returned move is published. A move that never gets published
    /// is undone with [`revert_move`](Self::revert_move).
    pub fn move_units(
        &mut self,
        from: Territory,
        to: Territory,
        count: u32,
        rank: Rank,
    ) -> Result<ArmyMove, GameError> {
        if self.paused {
            return Err(GameError::Paused);
        }
        if from == to {
            return Err(GameError::SameTerritory(from));
        }
        if count == 0 {
            return Err(GameError::InvalidCount(count.to_string()));
        }

        let moving = Army::of(rank, count);
        let source = self.local_units(from);
        let remaining =
            source
                .checked_sub(&moving)
                .ok_or(GameError::InsufficientUnits {
                    territory: from,
                    rank,
                    requested: count,
                    available: source.count(rank),
                })?;
        let destination = self.local_units(to) + moving;

        let owner = self.owner.username.clone();
        self.set_units(&owner, from, remaining);
        self.set_units(&owner, to, destination);

        Ok(ArmyMove {
            player: self.owner.clone(),
            from,
            to,
            units: moving,
        })
    }

    /// Undoes a local move that could not be announced.
    ///
    /// Only units still in the destination go back, so anything lost to a
    /// war in the meantime stays lost.
    pub fn revert_move(&mut self, mv: &ArmyMove) {
        let present = self.local_units(mv.to);
        let remaining = present.saturating_sub(&mv.units);
        let returning = present.saturating_sub(&remaining);
        let mut source = self.local_units(mv.from);
        source += returning;

        let owner = self.owner.username.clone();
        self.set_units(&owner, mv.to, remaining);
        self.set_units(&owner, mv.from, source);
        tracing::debug!(from = %mv.from, to = %mv.to, units = %returning, "move reverted");
    }

    /// Snapshot of the local player's position.
    pub fn status(&self) -> Status {
        let territories = self
            .units
            .iter()
            .filter_map(|(territory, players)| {
                players
                    .get(&self.owner.username)
                    .map(|army| (*territory, *army))
            })
            .collect();
        Status {
            owner: self.owner.clone(),
            paused: self.paused,
            territories,
        }
    }
}

/// The local player's units and the pause flag, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub owner: PlayerSnapshot,
    pub paused: bool,
    pub territories: Vec<(Territory, Army)>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "player: {}", self.owner)?;
        if self.paused {
            writeln!(f, "the game is paused")?;
        }
        if self.territories.is_empty() {
            return write!(f, "no units");
        }
        for (i, (territory, army)) in self.territories.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {territory}: {army}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(owner: &str) -> GameState {
        GameState::new(PlayerSnapshot::new(owner))
    }

    #[test]
    fn test_new_game_is_empty() {
        let g = game("alice");
        assert!(!g.is_paused());
        assert!(g.status().territories.is_empty());
        assert_eq!(g.units_of("alice", Territory::Asia), Army::EMPTY);
    }

    #[test]
    fn test_spawn_accumulates() {
        let mut g = game("alice");
        g.spawn(Territory::Asia, Rank::Infantry, 3).unwrap();
        let army = g.spawn(Territory::Asia, Rank::Cavalry, 1).unwrap();
        assert_eq!(army, Army::new(3, 1, 0));
        assert_eq!(g.units_of("alice", Territory::Asia), Army::new(3, 1, 0));
    }

    #[test]
    fn test_spawn_zero_rejected() {
        let mut g = game("alice");
        assert!(matches!(
            g.spawn(Territory::Asia, Rank::Infantry, 0),
            Err(GameError::InvalidCount(_))
        ));
    }

    #[test]
    fn test_spawn_allowed_while_paused() {
        let mut g = game("alice");
        g.set_paused(PlayingState { is_paused: true });
        assert!(g.spawn(Territory::Asia, Rank::Infantry, 1).is_ok());
    }

    #[test]
    fn test_empty_territory_leaves_status() {
        let mut g = game("alice");
        g.spawn(Territory::Asia, Rank::Infantry, 2).unwrap();
        g.move_units(Territory::Asia, Territory::Europe, 2, Rank::Infantry)
            .unwrap();
        assert_eq!(
            g.status().territories,
            vec![(Territory::Europe, Army::new(2, 0, 0))]
        );
    }

    #[test]
    fn test_status_display() {
        let mut g = game("alice");
        assert_eq!(g.status().to_string(), "player: alice\nno units");
        g.spawn(Territory::Europe, Rank::Artillery, 1).unwrap();
        g.set_paused(PlayingState { is_paused: true });
        assert_eq!(
            g.status().to_string(),
            "player: alice\nthe game is paused\n  europe: 0 infantry, 0 cavalry, 1 artillery"
        );
    }

    #[test]
    fn test_set_paused_last_writer_wins() {
        let mut g = game("alice");
        g.set_paused(PlayingState { is_paused: true });
        g.set_paused(PlayingState { is_paused: true });
        assert!(g.is_paused());
        g.set_paused(PlayingState { is_paused: false });
        assert!(!g.is_paused());
    }
}
