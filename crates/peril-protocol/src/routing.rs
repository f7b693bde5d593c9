//! Exchange names, queue names, and routing keys.
//!
//! Every process must agree on these strings, so they live next to the
//! wire types rather than in the client or server.

/// Direct exchange carrying pause/resume broadcasts.
pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";
/// Topic exchange carrying moves, war declarations and game logs.
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";
/// Fanout exchange that receives discarded messages.
pub const EXCHANGE_PERIL_DLX: &str = "peril_dlx";
/// Durable queue bound to [`EXCHANGE_PERIL_DLX`].
pub const QUEUE_DEAD_LETTERS: &str = "peril_dlq";

pub const PAUSE_KEY: &str = "pause";
pub const ARMY_MOVES_PREFIX: &str = "army_moves";
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";
pub const GAME_LOG_SLUG: &str = "game_log";

/// Shared durable queue for war declarations; competing consumers.
pub const WAR_QUEUE: &str = "war";
/// Shared durable queue the server drains into its log.
pub const GAME_LOG_QUEUE: &str = "game_logs";

/// Per-player transient queue for pause broadcasts.
pub fn pause_queue(username: &str) -> String {
    format!("{PAUSE_KEY}.{username}")
}

/// Per-player transient queue for army moves.
pub fn army_moves_queue(username: &str) -> String {
    format!("{ARMY_MOVES_PREFIX}.{username}")
}

/// Routing key for a move published by `username`.
pub fn army_moves_key(username: &str) -> String {
    format!("{ARMY_MOVES_PREFIX}.{username}")
}

/// Binding key matching every player's moves.
pub fn army_moves_binding() -> String {
    format!("{ARMY_MOVES_PREFIX}.*")
}

/// Routing key for a war declaration published by `username`.
pub fn war_key(username: &str) -> String {
    format!("{WAR_RECOGNITIONS_PREFIX}.{username}")
}

pub fn war_binding() -> String {
    format!("{WAR_RECOGNITIONS_PREFIX}.*")
}

/// Routing key for a game log line about `username`.
pub fn game_log_key(username: &str) -> String {
    format!("{GAME_LOG_SLUG}.{username}")
}

pub fn game_log_binding() -> String {
    format!("{GAME_LOG_SLUG}.*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_player_names() {
        assert_eq!(pause_queue("alice"), "pause.alice");
        assert_eq!(army_moves_queue("alice"), "army_moves.alice");
        assert_eq!(army_moves_key("bob"), "army_moves.bob");
        assert_eq!(war_key("bob"), "war.bob");
        assert_eq!(game_log_key("carol"), "game_log.carol");
    }

    #[test]
    fn test_bindings_are_single_word_wildcards() {
        assert_eq!(army_moves_binding(), "army_moves.*");
        assert_eq!(war_binding(), "war.*");
        assert_eq!(game_log_binding(), "game_log.*");
    }
}
