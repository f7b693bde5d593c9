//! Binding-key matching for the exchange kinds.

use crate::ExchangeKind;

/// Returns `true` if a message published with `routing_key` reaches a queue
/// bound to an exchange of `kind` with `binding_key`.
///
/// Topic keys are dot-separated words. In the binding key `*` matches
/// exactly one word and `#` matches zero or more words.
pub fn routing_key_matches(
    kind: ExchangeKind,
    binding_key: &str,
    routing_key: &str,
) -> bool {
    match kind {
        ExchangeKind::Fanout => true,
        ExchangeKind::Direct => binding_key == routing_key,
        ExchangeKind::Topic => {
            let pattern: Vec<&str> = binding_key.split('.').collect();
            let words: Vec<&str> = routing_key.split('.').collect();
            topic_matches(&pattern, &words)
        }
    }
}

fn topic_matches(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((&"#", rest)) => {
            // `#` swallows any number of words, including none.
            (0..=words.len()).any(|skip| topic_matches(rest, &words[skip..]))
        }
        Some((&head, rest)) => match words.split_first() {
            Some((&word, remaining)) if head == "*" || head == word => {
                topic_matches(rest, remaining)
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_requires_exact_key() {
        assert!(routing_key_matches(ExchangeKind::Direct, "pause", "pause"));
        assert!(!routing_key_matches(ExchangeKind::Direct, "pause", "pause.x"));
        assert!(!routing_key_matches(ExchangeKind::Direct, "*", "pause"));
    }

    #[test]
    fn test_fanout_ignores_keys() {
        assert!(routing_key_matches(ExchangeKind::Fanout, "", "war.alice"));
    }

    #[test]
    fn test_topic_star_matches_exactly_one_word() {
        let k = ExchangeKind::Topic;
        assert!(routing_key_matches(k, "army_moves.*", "army_moves.alice"));
        assert!(!routing_key_matches(k, "army_moves.*", "army_moves"));
        assert!(!routing_key_matches(k, "army_moves.*", "army_moves.a.b"));
        assert!(!routing_key_matches(k, "army_moves.*", "war.alice"));
    }

    #[test]
    fn test_topic_hash_matches_zero_or_more_words() {
        let k = ExchangeKind::Topic;
        assert!(routing_key_matches(k, "game_log.#", "game_log"));
        assert!(routing_key_matches(k, "game_log.#", "game_log.bob.extra"));
        assert!(routing_key_matches(k, "#", "anything.at.all"));
        assert!(routing_key_matches(k, "#.alice", "war.alice"));
        assert!(!routing_key_matches(k, "#.alice", "war.bob"));
    }

    #[test]
    fn test_topic_literal_words_must_match() {
        let k = ExchangeKind::Topic;
        assert!(routing_key_matches(k, "war.alice", "war.alice"));
        assert!(!routing_key_matches(k, "war.alice", "war.bob"));
    }
}
