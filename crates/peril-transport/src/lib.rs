//! Broker abstraction layer for Peril.
//!
//! Provides the [`Broker`] and [`Consumer`] traits that abstract over the
//! exchange/queue/ack primitives of a message broker, plus two
//! implementations:
//!
//! - [`MemoryBroker`]: an in-process broker with the same routing,
//!   exclusivity and dead-letter rules. Used by tests and single-process runs.
//! - `AmqpBroker`: RabbitMQ (AMQP 0-9-1) via `lapin`.
//!
//! # Feature Flags
//!
//! - `amqp` (default): AMQP broker via `lapin`

#[cfg(feature = "amqp")]
mod amqp;
mod error;
mod memory;
mod routing;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBroker, AmqpConsumer};
pub use error::BrokerError;
pub use memory::{MemoryBroker, MemoryConnection, MemoryConsumer};
pub use routing::routing_key_matches;

use std::fmt;
use std::future::Future;

/// Opaque identifier for a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How an exchange matches routing keys against queue bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Binding key must equal the routing key.
    Direct,
    /// Dot-separated words; `*` matches one word, `#` zero or more.
    Topic,
    /// Every bound queue receives every message.
    Fanout,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Topic => write!(f, "topic"),
            Self::Fanout => write!(f, "fanout"),
        }
    }
}

/// Flags a queue is declared with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueOptions {
    /// Survives a broker restart.
    pub durable: bool,
    /// Deleted once its last consumer goes away.
    pub auto_delete: bool,
    /// Usable only by the declaring connection; deleted when it closes.
    pub exclusive: bool,
    /// Where rejected-without-requeue messages are routed.
    pub dead_letter_exchange: Option<String>,
}

/// An outbound message: payload plus the content type that selects the
/// decoder on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            body,
        }
    }
}

/// Identifies one outstanding delivery on a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryTag(pub u64);

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A message handed to a consumer. It stays outstanding until settled.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub exchange: String,
    pub routing_key: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// `true` if the broker delivered this message before and it was
    /// requeued.
    pub redelivered: bool,
}

/// How a consumer settles a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckType {
    /// Processed; remove from the queue.
    Ack,
    /// Transient failure; put it back for redelivery.
    NackRequeue,
    /// Permanently invalid; drop it (dead-lettered when configured).
    NackDiscard,
}

impl fmt::Display for AckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => write!(f, "ack"),
            Self::NackRequeue => write!(f, "nack-requeue"),
            Self::NackDiscard => write!(f, "nack-discard"),
        }
    }
}

/// A connection to a message broker.
///
/// Handles are cheap to clone and share one underlying connection. All
/// futures are `Send` so callers can drive them from spawned tasks.
pub trait Broker: Clone + Send + Sync + 'static {
    /// The consumer type produced by [`consume`](Self::consume).
    type Consumer: Consumer;

    /// Returns the identifier of this connection.
    fn id(&self) -> ConnectionId;

    /// Declares an exchange. Idempotent for an identical kind.
    fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Declares a queue. Idempotent for identical options.
    fn declare_queue(
        &self,
        name: &str,
        options: &QueueOptions,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Binds a queue to an exchange under a routing key pattern.
    fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Publishes a message. Having no matching queue is not an error.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Starts consuming from a queue with manual acknowledgement.
    fn consume(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<Self::Consumer, BrokerError>> + Send;

    /// Closes the connection. Consumers opened on it stop yielding.
    fn close(&self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// Receives deliveries from one queue.
pub trait Consumer: Send + 'static {
    /// Waits for the next delivery.
    ///
    /// Returns `Ok(None)` once the connection is closed or the queue is gone.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Delivery>, BrokerError>> + Send;

    /// Acknowledges or rejects an outstanding delivery.
    fn settle(
        &mut self,
        tag: DeliveryTag,
        action: AckType,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;
}
