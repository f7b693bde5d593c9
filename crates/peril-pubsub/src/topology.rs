//! Queue declaration and binding.
//!
//! All queues in a Peril deployment are declared through
//! [`declare_and_bind`], which turns a [`QueueDurability`] policy into
//! concrete broker flags and always attaches the shared dead-letter
//! exchange.

use std::fmt;

use peril_protocol::routing::{
    EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_DLX, EXCHANGE_PERIL_TOPIC,
    QUEUE_DEAD_LETTERS,
};
use peril_transport::{Broker, ExchangeKind, QueueOptions};

use crate::PubSubError;

/// Lifetime policy for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueDurability {
    /// Survives broker restarts and outlives its consumers. Shared queues
    /// (war declarations, game logs) use this.
    Durable,
    /// Private to the declaring connection and removed once nobody
    /// consumes it. Per-player queues use this.
    Transient,
}

impl QueueDurability {
    /// Broker flags for this policy, dead-lettering to `dead_letter_exchange`.
    pub fn options(self, dead_letter_exchange: &str) -> QueueOptions {
        let durable = self == Self::Durable;
        QueueOptions {
            durable,
            auto_delete: !durable,
            exclusive: !durable,
            dead_letter_exchange: Some(dead_letter_exchange.to_string()),
        }
    }
}

impl fmt::Display for QueueDurability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => write!(f, "durable"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// A queue that exists on the broker and is bound to an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQueue {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
    pub durability: QueueDurability,
}

/// Declares `queue_name` with the given policy and binds it to `exchange`
/// under `routing_key`.
///
/// Idempotent: repeating the call with the same arguments changes nothing.
///
/// # Errors
/// Fails if the exchange is missing, if the queue already exists with
/// different flags, or if it is exclusive to another connection. Callers
/// treat all of these as fatal at startup.
pub async fn declare_and_bind<B: Broker>(
    broker: &B,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    durability: QueueDurability,
) -> Result<BoundQueue, PubSubError> {
    broker
        .declare_queue(queue_name, &durability.options(EXCHANGE_PERIL_DLX))
        .await?;
    broker.bind_queue(queue_name, exchange, routing_key).await?;

    tracing::debug!(
        exchange,
        queue = queue_name,
        routing_key,
        %durability,
        "queue declared and bound"
    );

    Ok(BoundQueue {
        exchange: exchange.to_string(),
        queue: queue_name.to_string(),
        routing_key: routing_key.to_string(),
        durability,
    })
}

/// Declares the exchanges every Peril process relies on, plus the
/// dead-letter queue.
pub async fn declare_peril_topology<B: Broker>(
    broker: &B,
) -> Result<(), PubSubError> {
    broker
        .declare_exchange(EXCHANGE_PERIL_DIRECT, ExchangeKind::Direct)
        .await?;
    broker
        .declare_exchange(EXCHANGE_PERIL_TOPIC, ExchangeKind::Topic)
        .await?;
    broker
        .declare_exchange(EXCHANGE_PERIL_DLX, ExchangeKind::Fanout)
        .await?;

    // The dead-letter queue itself has nowhere further to go.
    let dlq = QueueOptions {
        durable: true,
        ..QueueOptions::default()
    };
    broker.declare_queue(QUEUE_DEAD_LETTERS, &dlq).await?;
    broker
        .bind_queue(QUEUE_DEAD_LETTERS, EXCHANGE_PERIL_DLX, "")
        .await?;

    tracing::info!(id = %broker.id(), "peril topology declared");
    Ok(())
}
