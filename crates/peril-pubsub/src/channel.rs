//! Typed publish and subscribe.
//!
//! [`publish`] turns a value into a broker [`Message`] with a [`Codec`];
//! [`subscribe`] does the reverse for every delivery on a queue and hands
//! the value to a [`Handler`], whose [`AckType`] decides what the broker
//! does with the message.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use peril_protocol::Codec;
use peril_transport::{AckType, Broker, Consumer, Message};

use crate::{declare_and_bind, BoundQueue, PubSubError, QueueDurability};

/// Processes one decoded message and says how to settle it.
///
/// Closures `FnMut(T) -> AckType` are handlers. Handlers that need to
/// await (for example, to publish a follow-up message before settling)
/// implement the trait directly.
pub trait Handler<T>: Send + 'static {
    fn handle(&mut self, value: T) -> impl Future<Output = AckType> + Send;
}

impl<T, F> Handler<T> for F
where
    T: Send + 'static,
    F: FnMut(T) -> AckType + Send + 'static,
{
    async fn handle(&mut self, value: T) -> AckType {
        self(value)
    }
}

/// Encodes `value` and publishes it to `exchange` under `routing_key`.
///
/// The codec's content type travels with the payload.
///
/// # Errors
/// Fails only on a local encode error or a broker error. A publish that
/// matches no queue succeeds.
pub async fn publish<B, K, T>(
    broker: &B,
    codec: &K,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PubSubError>
where
    B: Broker,
    K: Codec,
    T: Serialize + Sync,
{
    let body = codec.encode(value)?;
    let message = Message::new(codec.content_type(), body);
    broker.publish(exchange, routing_key, message).await?;
    tracing::trace!(exchange, routing_key, "published");
    Ok(())
}

/// A running listener started by [`subscribe`].
///
/// Dropping a `Subscription` leaves the listener running; it stops when
/// its consumer ends (the connection closes or the queue is deleted) or
/// when [`abort`](Self::abort) is called.
#[derive(Debug)]
pub struct Subscription {
    queue: BoundQueue,
    task: JoinHandle<()>,
}

impl Subscription {
    /// The queue this listener consumes.
    pub fn queue(&self) -> &BoundQueue {
        &self.queue
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the listener. Its in-flight delivery, if any, is requeued by
    /// the broker.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Waits for the listener to end.
    ///
    /// An aborted listener counts as a clean stop.
    pub async fn join(self) -> Result<(), PubSubError> {
        match self.task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(_) => Err(PubSubError::ListenerPanicked {
                queue: self.queue.queue,
            }),
        }
    }
}

/// Declares and binds `queue_name`, then starts a background listener that
/// decodes each delivery with `codec` and passes it to `handler`.
///
/// Deliveries are handled one at a time in queue order. A delivery that
/// fails to decode is logged and acknowledged, so it is never redelivered.
///
/// # Errors
/// Returns an error if the queue cannot be declared, bound or consumed.
/// Nothing is spawned in that case.
pub async fn subscribe<B, K, T, H>(
    broker: &B,
    codec: K,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    durability: QueueDurability,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    B: Broker,
    K: Codec,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    let queue =
        declare_and_bind(broker, exchange, queue_name, routing_key, durability)
            .await?;
    let consumer = broker.consume(queue_name).await?;

    tracing::info!(
        exchange,
        queue = queue_name,
        routing_key,
        "subscribed"
    );

    let task = tokio::spawn(listen::<_, _, T, _>(
        consumer,
        codec,
        queue_name.to_string(),
        handler,
    ));

    Ok(Subscription { queue, task })
}

/// Delivery loop for one subscription.
async fn listen<C, K, T, H>(mut consumer: C, codec: K, queue: String, mut handler: H)
where
    C: Consumer,
    K: Codec,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    loop {
        let delivery = match consumer.recv().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tracing::debug!(%queue, "consumer ended, listener stopping");
                break;
            }
            Err(e) => {
                tracing::warn!(%queue, error = %e, "receive failed, listener stopping");
                break;
            }
        };

        let decoded = codec
            .decode_checked::<T>(delivery.content_type.as_deref(), &delivery.body);
        let action = match decoded {
            Ok(value) => handler.handle(value).await,
            Err(e) => {
                tracing::warn!(
                    %queue,
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "dropping undecodable message"
                );
                AckType::Ack
            }
        };

        tracing::debug!(
            %queue,
            routing_key = %delivery.routing_key,
            redelivered = delivery.redelivered,
            outcome = %action,
            "delivery settled"
        );

        if let Err(e) = consumer.settle(delivery.tag, action).await {
            tracing::warn!(
                %queue,
                routing_key = %delivery.routing_key,
                outcome = %action,
                error = %e,
                "settling delivery failed"
            );
        }
    }
}
