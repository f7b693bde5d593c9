//! Error types for the pub/sub layer.

use peril_protocol::ProtocolError;
use peril_transport::BrokerError;

/// Errors returned by [`publish`](crate::publish),
/// [`subscribe`](crate::subscribe) and the topology helpers.
///
/// Failures inside a running listener are never returned here; they are
/// logged and the listener keeps going.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// The broker rejected a declaration, bind, publish or consume.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The value could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A listener task panicked.
    #[error("listener on queue '{queue}' panicked")]
    ListenerPanicked { queue: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_broker_error() {
        let err: PubSubError =
            BrokerError::ConnectionClosed("conn-1".into()).into();
        assert!(matches!(err, PubSubError::Broker(_)));
        assert!(err.to_string().contains("conn-1"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: PubSubError =
            ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, PubSubError::Protocol(_)));
    }
}
