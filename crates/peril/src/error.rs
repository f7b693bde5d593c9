//! Unified error type for Peril.

use peril_game::GameError;
use peril_protocol::ProtocolError;
use peril_pubsub::PubSubError;
use peril_transport::BrokerError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PerilError {
    /// A broker-level error (connect, declare, publish, consume).
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// An encode or decode error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A topology or publish error from the pub/sub layer.
    #[error(transparent)]
    PubSub(#[from] PubSubError),

    /// A rejected player command.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Reading the console or writing the game log failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PerilError {
    /// Returns `true` for errors the player caused by typing a bad command.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Game(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_broker_error() {
        let err = BrokerError::ConnectionClosed("gone".into());
        let peril_err: PerilError = err.into();
        assert!(matches!(peril_err, PerilError::Broker(_)));
        assert!(peril_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let peril_err: PerilError = err.into();
        assert!(matches!(peril_err, PerilError::Protocol(_)));
    }

    #[test]
    fn test_from_pubsub_error() {
        let err = PubSubError::ListenerPanicked { queue: "war".into() };
        let peril_err: PerilError = err.into();
        assert!(matches!(peril_err, PerilError::PubSub(_)));
    }

    #[test]
    fn test_from_game_error_is_user_error() {
        let peril_err: PerilError = GameError::Paused.into();
        assert!(peril_err.is_user_error());
        assert_eq!(peril_err.to_string(), "the game is paused");
    }
}
