//! Parsing of the typed commands for players and the server.

use peril_protocol::{Rank, Territory};

use crate::GameError;

pub const PLAYER_HELP: &str = "\
Possible commands:
  spawn <territory> <rank> [count]   add new units (default 1)
  move <from> <to> <count> [rank]    move units (default rank infantry)
  status                             show your units
  spam <n>                           publish n malicious game-log lines
  help                               show this text
  quit                               leave the game
territories: americas, europe, africa, asia, australia, antarctica
ranks: infantry, cavalry, artillery";

pub const SERVER_HELP: &str = "\
Possible commands:
  pause    pause the game for every player
  resume   resume the game
  help     show this text
  quit     stop the server";

const SPAWN_USAGE: &str = "spawn <territory> <rank> [count]";
const MOVE_USAGE: &str = "move <from> <to> <count> [rank]";
const SPAM_USAGE: &str = "spam <n>";

/// A command typed by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Spawn {
        territory: Territory,
        rank: Rank,
        count: u32,
    },
    Move {
        from: Territory,
        to: Territory,
        count: u32,
        rank: Rank,
    },
    Status,
    Help,
    Spam(u32),
    Quit,
}

impl PlayerCommand {
    /// Parses one input line. A blank line yields `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, GameError> {
        let words: Vec<String> =
            line.split_whitespace().map(str::to_lowercase).collect();
        let Some((command, args)) = words.split_first() else {
            return Ok(None);
        };

        let parsed = match (command.as_str(), args) {
            ("spawn", [territory, rank]) => Self::Spawn {
                territory: territory_arg(territory)?,
                rank: rank_arg(rank)?,
                count: 1,
            },
            ("spawn", [territory, rank, count]) => Self::Spawn {
                territory: territory_arg(territory)?,
                rank: rank_arg(rank)?,
                count: count_arg(count)?,
            },
            ("spawn", _) => return Err(GameError::Usage(SPAWN_USAGE)),
            ("move", [from, to, count]) => Self::Move {
                from: territory_arg(from)?,
                to: territory_arg(to)?,
                count: count_arg(count)?,
                rank: Rank::Infantry,
            },
            ("move", [from, to, count, rank]) => Self::Move {
                from: territory_arg(from)?,
                to: territory_arg(to)?,
                count: count_arg(count)?,
                rank: rank_arg(rank)?,
            },
            ("move", _) => return Err(GameError::Usage(MOVE_USAGE)),
            ("spam", [n]) => Self::Spam(count_arg(n)?),
            ("spam", _) => return Err(GameError::Usage(SPAM_USAGE)),
            ("status", []) => Self::Status,
            ("status", _) => return Err(GameError::Usage("status")),
            ("help", []) => Self::Help,
            ("help", _) => return Err(GameError::Usage("help")),
            ("quit", []) => Self::Quit,
            ("quit", _) => return Err(GameError::Usage("quit")),
            (other, _) => return Err(GameError::UnknownCommand(other.to_string())),
        };
        Ok(Some(parsed))
    }
}

/// A command typed at the server console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Pause,
    Resume,
    Help,
    Quit,
}

impl ServerCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, GameError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let (parsed, usage) = match command.to_lowercase().as_str() {
            "pause" => (Self::Pause, "pause"),
            "resume" => (Self::Resume, "resume"),
            "help" => (Self::Help, "help"),
            "quit" => (Self::Quit, "quit"),
            other => return Err(GameError::UnknownCommand(other.to_string())),
        };
        if words.next().is_some() {
            return Err(GameError::Usage(usage));
        }
        Ok(Some(parsed))
    }
}

fn territory_arg(word: &str) -> Result<Territory, GameError> {
    word.parse()
        .map_err(|_| GameError::UnknownTerritory(word.to_string()))
}

fn rank_arg(word: &str) -> Result<Rank, GameError> {
    word.parse().map_err(|_| GameError::UnknownRank(word.to_string()))
}

fn count_arg(word: &str) -> Result<u32, GameError> {
    match word.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(GameError::InvalidCount(word.to_string())),
    }
}
