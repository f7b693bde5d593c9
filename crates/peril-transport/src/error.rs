/// Errors that can occur talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Establishing the broker connection failed.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The connection (or the channel carrying an operation) is closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// An exchange or queue named by the operation does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// `"exchange"` or `"queue"`.
        kind: &'static str,
        /// The missing entity's name.
        name: String,
    },

    /// A redeclaration conflicts with the entity that already exists.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An exclusive queue is owned by another connection.
    #[error("resource locked: {0}")]
    ResourceLocked(String),

    /// The delivery tag does not name an outstanding delivery.
    #[error("unknown delivery tag {0}")]
    UnknownDelivery(u64),

    /// An error reported by the AMQP client.
    #[cfg(feature = "amqp")]
    #[error("amqp: {0}")]
    Amqp(#[from] lapin::Error),
}
