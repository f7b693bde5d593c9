//! In-process broker with the same routing and acknowledgement rules as the
//! AMQP one.
//!
//! One [`MemoryBroker`] plays the role of the broker server; each call to
//! [`MemoryBroker::connect`] opens a [`MemoryConnection`] that implements
//! [`Broker`]. Exclusive queues belong to the connection that declared them,
//! auto-delete queues vanish with their last consumer, and rejected messages
//! follow the queue's dead-letter exchange.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::{
    routing_key_matches, AckType, Broker, BrokerError, ConnectionId, Consumer,
    Delivery, DeliveryTag, ExchangeKind, Message, QueueOptions,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Counter for telling consumers apart when returning unacked messages.
static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
struct Queued {
    exchange: String,
    routing_key: String,
    message: Message,
    redelivered: bool,
}

#[derive(Debug)]
struct QueueState {
    options: QueueOptions,
    /// Owning connection of an exclusive queue.
    owner: Option<ConnectionId>,
    /// Bumped on every (re)creation so stale consumers notice deletion.
    generation: u64,
    ready: VecDeque<Queued>,
    /// Outstanding deliveries by tag, with the consumer holding each one.
    unacked: HashMap<u64, (u64, Queued)>,
    consumers: usize,
    notify: Arc<Notify>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    exchange: String,
    queue: String,
    routing_key: String,
}

#[derive(Debug, Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    open: HashSet<ConnectionId>,
    closed: HashSet<ConnectionId>,
    next_tag: u64,
    next_generation: u64,
}

impl BrokerState {
    fn ensure_open(&self, conn: ConnectionId) -> Result<(), BrokerError> {
        if self.closed.contains(&conn) {
            return Err(BrokerError::ConnectionClosed(conn.to_string()));
        }
        Ok(())
    }

    /// Delivers a message to every queue bound to `exchange` under a
    /// matching key. Returns how many queues received it.
    fn route(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<usize, BrokerError> {
        let kind = *self.exchanges.get(exchange).ok_or_else(|| {
            BrokerError::NotFound {
                kind: "exchange",
                name: exchange.to_string(),
            }
        })?;

        let mut targets: Vec<String> = self
            .bindings
            .iter()
            .filter(|b| {
                b.exchange == exchange
                    && routing_key_matches(kind, &b.routing_key, routing_key)
            })
            .map(|b| b.queue.clone())
            .collect();
        // A queue bound twice under matching keys still gets one copy.
        targets.sort();
        targets.dedup();

        for name in &targets {
            if let Some(queue) = self.queues.get_mut(name) {
                queue.ready.push_back(Queued {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    message: message.clone(),
                    redelivered: false,
                });
                queue.notify.notify_waiters();
            }
        }
        Ok(targets.len())
    }

    fn delete_queue(&mut self, name: &str) {
        if let Some(queue) = self.queues.remove(name) {
            queue.notify.notify_waiters();
            tracing::debug!(queue = name, "queue deleted");
        }
        self.bindings.retain(|b| b.queue != name);
    }
}

/// An in-memory broker shared by any number of connections.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Creates an empty broker with no exchanges or queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new connection to this broker.
    pub fn connect(&self) -> MemoryConnection {
        let id =
            ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        lock(&self.state).open.insert(id);
        tracing::debug!(%id, "memory broker connection opened");
        MemoryConnection {
            id,
            state: Arc::clone(&self.state),
        }
    }

    /// Number of messages waiting for delivery, or `None` if the queue does
    /// not exist.
    pub fn ready_count(&self, queue: &str) -> Option<usize> {
        lock(&self.state).queues.get(queue).map(|q| q.ready.len())
    }

    /// Number of delivered-but-unsettled messages, or `None` if the queue
    /// does not exist.
    pub fn unacked_count(&self, queue: &str) -> Option<usize> {
        lock(&self.state).queues.get(queue).map(|q| q.unacked.len())
    }

    /// Returns `true` if the queue currently exists.
    pub fn queue_exists(&self, queue: &str) -> bool {
        lock(&self.state).queues.contains_key(queue)
    }

    /// Payloads waiting in a queue, oldest first.
    pub fn peek(&self, queue: &str) -> Vec<Message> {
        lock(&self.state)
            .queues
            .get(queue)
            .map(|q| q.ready.iter().map(|m| m.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Simulates a broker restart: every open connection is dropped,
    /// transient queues disappear, durable queues keep their messages
    /// (unsettled ones become ready again).
    pub fn restart(&self) {
        let mut state = lock(&self.state);
        let open: Vec<ConnectionId> = state.open.drain().collect();
        state.closed.extend(open);

        let transient: Vec<String> = state
            .queues
            .iter()
            .filter(|(_, q)| !q.options.durable)
            .map(|(name, _)| name.clone())
            .collect();
        for name in transient {
            state.delete_queue(&name);
        }

        let mut generation = state.next_generation;
        for queue in state.queues.values_mut() {
            let mut unacked: Vec<_> = queue.unacked.drain().collect();
            unacked.sort_by_key(|(tag, _)| *tag);
            for (_, (_, mut item)) in unacked.into_iter().rev() {
                item.redelivered = true;
                queue.ready.push_front(item);
            }
            queue.consumers = 0;
            // Consumers from before the restart see their queue vanish.
            generation += 1;
            queue.generation = generation;
            queue.notify.notify_waiters();
        }
        state.next_generation = generation;
        tracing::info!("memory broker restarted");
    }
}

/// A single connection to a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryConnection {
    id: ConnectionId,
    state: Arc<Mutex<BrokerState>>,
}

impl Broker for MemoryConnection {
    type Consumer = MemoryConsumer;

    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        state.ensure_open(self.id)?;
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => {
                Err(BrokerError::PreconditionFailed(format!(
                    "exchange '{name}' is {existing}, not {kind}"
                )))
            }
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                tracing::debug!(exchange = name, %kind, "exchange declared");
                Ok(())
            }
        }
    }

    async fn declare_queue(
        &self,
        name: &str,
        options: &QueueOptions,
    ) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        state.ensure_open(self.id)?;

        if let Some(existing) = state.queues.get(name) {
            if let Some(owner) = existing.owner {
                if owner != self.id {
                    return Err(BrokerError::ResourceLocked(format!(
                        "queue '{name}' is exclusive to {owner}"
                    )));
                }
            }
            if existing.options != *options {
                return Err(BrokerError::PreconditionFailed(format!(
                    "queue '{name}' already declared with {:?}",
                    existing.options
                )));
            }
            return Ok(());
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        state.queues.insert(
            name.to_string(),
            QueueState {
                options: options.clone(),
                owner: options.exclusive.then_some(self.id),
                generation,
                ready: VecDeque::new(),
                unacked: HashMap::new(),
                consumers: 0,
                notify: Arc::new(Notify::new()),
            },
        );
        tracing::debug!(queue = name, ?options, "queue declared");
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        state.ensure_open(self.id)?;

        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::NotFound {
                kind: "exchange",
                name: exchange.to_string(),
            });
        }
        let owner = state
            .queues
            .get(queue)
            .ok_or_else(|| BrokerError::NotFound {
                kind: "queue",
                name: queue.to_string(),
            })?
            .owner;
        if owner.is_some_and(|owner| owner != self.id) {
            return Err(BrokerError::ResourceLocked(format!(
                "queue '{queue}' is exclusive to another connection"
            )));
        }

        let binding = Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
            tracing::debug!(queue, exchange, routing_key, "queue bound");
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        state.ensure_open(self.id)?;
        let delivered = state.route(exchange, routing_key, &message)?;
        tracing::trace!(exchange, routing_key, queues = delivered, "published");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<MemoryConsumer, BrokerError> {
        let mut state = lock(&self.state);
        state.ensure_open(self.id)?;

        let q = state.queues.get_mut(queue).ok_or_else(|| {
            BrokerError::NotFound {
                kind: "queue",
                name: queue.to_string(),
            }
        })?;
        if q.owner.is_some_and(|owner| owner != self.id) {
            return Err(BrokerError::ResourceLocked(format!(
                "queue '{queue}' is exclusive to another connection"
            )));
        }
        q.consumers += 1;

        Ok(MemoryConsumer {
            id: NEXT_CONSUMER_ID.fetch_add(1, Ordering::Relaxed),
            connection: self.id,
            queue: queue.to_string(),
            generation: q.generation,
            notify: Arc::clone(&q.notify),
            state: Arc::clone(&self.state),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        if !state.closed.insert(self.id) {
            return Ok(());
        }
        state.open.remove(&self.id);
        let owned: Vec<String> = state
            .queues
            .iter()
            .filter(|(_, q)| q.owner == Some(self.id))
            .map(|(name, _)| name.clone())
            .collect();
        for name in owned {
            state.delete_queue(&name);
        }
        for queue in state.queues.values() {
            queue.notify.notify_waiters();
        }
        tracing::debug!(id = %self.id, "memory broker connection closed");
        Ok(())
    }
}

/// Consumer side of a [`MemoryConnection`].
///
/// Dropping it cancels the consumer: its unsettled deliveries return to
/// the queue and an auto-delete queue without consumers is removed.
#[derive(Debug)]
pub struct MemoryConsumer {
    id: u64,
    connection: ConnectionId,
    queue: String,
    generation: u64,
    notify: Arc<Notify>,
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryConsumer {
    /// Pops the next ready message, if any.
    fn try_next(&self) -> Next {
        let mut state = lock(&self.state);
        if state.closed.contains(&self.connection) {
            return Next::Finished;
        }
        state.next_tag += 1;
        let tag = state.next_tag;

        let queue = match state.queues.get_mut(&self.queue) {
            Some(q) if q.generation == self.generation => q,
            _ => return Next::Finished,
        };
        let Some(item) = queue.ready.pop_front() else {
            return Next::Empty;
        };
        queue.unacked.insert(tag, (self.id, item.clone()));

        Next::Delivery(Delivery {
            tag: DeliveryTag(tag),
            exchange: item.exchange,
            routing_key: item.routing_key,
            content_type: Some(item.message.content_type),
            body: item.message.body,
            redelivered: item.redelivered,
        })
    }
}

enum Next {
    Delivery(Delivery),
    Empty,
    Finished,
}

impl Consumer for MemoryConsumer {
    async fn recv(&mut self) -> Result<Option<Delivery>, BrokerError> {
        let notify = Arc::clone(&self.notify);
        loop {
            // Register interest before looking, so a publish that lands
            // between the check and the await still wakes us.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_next() {
                Next::Delivery(delivery) => return Ok(Some(delivery)),
                Next::Finished => return Ok(None),
                Next::Empty => notified.await,
            }
        }
    }

    async fn settle(
        &mut self,
        tag: DeliveryTag,
        action: AckType,
    ) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        state.ensure_open(self.connection)?;

        let queue = match state.queues.get_mut(&self.queue) {
            Some(q) if q.generation == self.generation => q,
            _ => return Err(BrokerError::UnknownDelivery(tag.0)),
        };
        let (_, mut item) = queue
            .unacked
            .remove(&tag.0)
            .ok_or(BrokerError::UnknownDelivery(tag.0))?;

        match action {
            AckType::Ack => {}
            AckType::NackRequeue => {
                item.redelivered = true;
                queue.ready.push_front(item);
                queue.notify.notify_waiters();
            }
            AckType::NackDiscard => {
                if let Some(dlx) = queue.options.dead_letter_exchange.clone() {
                    if let Err(e) =
                        state.route(&dlx, &item.routing_key, &item.message)
                    {
                        tracing::warn!(
                            queue = %self.queue,
                            dead_letter_exchange = %dlx,
                            error = %e,
                            "dead-lettering failed, message dropped"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        let Some(queue) = state.queues.get_mut(&self.queue) else {
            return;
        };
        if queue.generation != self.generation {
            return;
        }

        let mut returned: Vec<(u64, Queued)> = Vec::new();
        queue.unacked.retain(|tag, (consumer, item)| {
            if *consumer == self.id {
                returned.push((*tag, item.clone()));
                false
            } else {
                true
            }
        });
        returned.sort_by_key(|(tag, _)| *tag);
        for (_, mut item) in returned.into_iter().rev() {
            item.redelivered = true;
            queue.ready.push_front(item);
        }

        queue.consumers = queue.consumers.saturating_sub(1);
        if queue.consumers == 0 && queue.options.auto_delete {
            let name = self.queue.clone();
            state.delete_queue(&name);
        } else {
            queue.notify.notify_waiters();
        }
    }
}

fn lock(state: &Mutex<BrokerState>) -> MutexGuard<'_, BrokerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
