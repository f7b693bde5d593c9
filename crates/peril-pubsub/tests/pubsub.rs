//! Integration tests for typed publish/subscribe over the in-memory broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peril_protocol::routing::{
    EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, QUEUE_DEAD_LETTERS,
};
use peril_protocol::{
    Army, ArmyMove, BincodeCodec, Codec, GameLog, JsonCodec, PlayerSnapshot,
    PlayingState, Territory,
};
use peril_pubsub::{
    declare_and_bind, declare_peril_topology, publish, subscribe, Handler,
    PubSubError, QueueDurability,
};
use peril_transport::{
    AckType, Broker, BrokerError, MemoryBroker, MemoryConnection, Message,
};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

async fn setup() -> (MemoryBroker, MemoryConnection) {
    let broker = MemoryBroker::new();
    let conn = broker.connect();
    declare_peril_topology(&conn).await.unwrap();
    (broker, conn)
}

/// A handler that forwards every value to a channel and acks.
fn forward<T: Send + 'static>(tx: mpsc::UnboundedSender<T>) -> impl Handler<T> {
    move |value: T| {
        let _ = tx.send(value);
        AckType::Ack
    }
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("handler should be called")
        .expect("channel open")
}

/// Polls until the queue has nothing ready and nothing outstanding.
async fn wait_drained(broker: &MemoryBroker, queue: &str) {
    for _ in 0..200 {
        if broker.ready_count(queue) == Some(0)
            && broker.unacked_count(queue) == Some(0)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue '{queue}' never drained");
}

fn sample_move(username: &str) -> ArmyMove {
    ArmyMove {
        player: PlayerSnapshot::new(username),
        from: Territory::Europe,
        to: Territory::Asia,
        units: Army::new(4, 0, 0),
    }
}

// =========================================================================
// Publish / subscribe
// =========================================================================

#[tokio::test]
async fn test_json_value_reaches_handler() {
    let (_broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_DIRECT,
        "pause.alice",
        "pause",
        QueueDurability::Transient,
        forward::<PlayingState>(tx),
    )
    .await
    .unwrap();

    publish(&conn, &JsonCodec, EXCHANGE_PERIL_DIRECT, "pause", &PlayingState { is_paused: true })
        .await
        .unwrap();

    assert_eq!(next(&mut rx).await, PlayingState { is_paused: true });
}

#[tokio::test]
async fn test_bincode_value_reaches_handler() {
    let (_broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    subscribe(
        &conn,
        BincodeCodec,
        EXCHANGE_PERIL_TOPIC,
        "game_logs",
        "game_log.*",
        QueueDurability::Durable,
        forward::<GameLog>(tx),
    )
    .await
    .unwrap();

    let log = GameLog {
        timestamp_ms: 42,
        username: "bob".into(),
        message: "bob won".into(),
    };
    publish(&conn, &BincodeCodec, EXCHANGE_PERIL_TOPIC, "game_log.bob", &log)
        .await
        .unwrap();

    assert_eq!(next(&mut rx).await, log);
}

#[tokio::test]
async fn test_topic_fan_out_to_every_player() {
    let broker = MemoryBroker::new();
    let alice = broker.connect();
    let bob = broker.connect();
    declare_peril_topology(&alice).await.unwrap();

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    for (conn, queue, tx) in [
        (&alice, "army_moves.alice", tx_a),
        (&bob, "army_moves.bob", tx_b),
    ] {
        subscribe(
            conn,
            JsonCodec,
            EXCHANGE_PERIL_TOPIC,
            queue,
            "army_moves.*",
            QueueDurability::Transient,
            forward::<ArmyMove>(tx),
        )
        .await
        .unwrap();
    }

    let mv = sample_move("alice");
    publish(&alice, &JsonCodec, EXCHANGE_PERIL_TOPIC, "army_moves.alice", &mv)
        .await
        .unwrap();

    assert_eq!(next(&mut rx_a).await, mv);
    assert_eq!(next(&mut rx_b).await, mv);
}

#[tokio::test]
async fn test_publish_without_queue_succeeds() {
    let (_broker, conn) = setup().await;
    publish(&conn, &JsonCodec, EXCHANGE_PERIL_TOPIC, "war.nobody", &sample_move("x"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_publish_records_content_type() {
    let (broker, conn) = setup().await;
    declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, "war", "war.*", QueueDurability::Durable)
        .await
        .unwrap();

    publish(&conn, &JsonCodec, EXCHANGE_PERIL_TOPIC, "war.bob", &sample_move("bob"))
        .await
        .unwrap();

    let queued = broker.peek("war");
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].content_type, JsonCodec.content_type());
}

#[tokio::test]
async fn test_publish_to_missing_exchange_fails() {
    let broker = MemoryBroker::new();
    let conn = broker.connect();
    let err = publish(&conn, &JsonCodec, "nope", "key", &PlayingState { is_paused: false })
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::Broker(BrokerError::NotFound { .. })));
}

// =========================================================================
// Acknowledgement outcomes
// =========================================================================

#[tokio::test]
async fn test_corrupt_payload_is_acked_and_not_redelivered() {
    let (broker, conn) = setup().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let counter = Arc::clone(&calls);
    subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_TOPIC,
        "army_moves.alice",
        "army_moves.*",
        QueueDurability::Transient,
        move |mv: ArmyMove| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(mv);
            AckType::Ack
        },
    )
    .await
    .unwrap();

    conn.publish(
        EXCHANGE_PERIL_TOPIC,
        "army_moves.mallory",
        Message::new("application/json", b"{not json".to_vec()),
    )
    .await
    .unwrap();
    let mv = sample_move("bob");
    publish(&conn, &JsonCodec, EXCHANGE_PERIL_TOPIC, "army_moves.bob", &mv)
        .await
        .unwrap();

    // The good message behind the bad one still arrives.
    assert_eq!(next(&mut rx).await, mv);
    wait_drained(&broker, "army_moves.alice").await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(broker.peek(QUEUE_DEAD_LETTERS).is_empty());
}

#[tokio::test]
async fn test_wrong_content_type_is_dropped() {
    let (broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_DIRECT,
        "pause.alice",
        "pause",
        QueueDurability::Transient,
        forward::<PlayingState>(tx),
    )
    .await
    .unwrap();

    publish(&conn, &BincodeCodec, EXCHANGE_PERIL_DIRECT, "pause", &PlayingState { is_paused: true })
        .await
        .unwrap();
    wait_drained(&broker, "pause.alice").await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_nack_discard_dead_letters() {
    let (broker, conn) = setup().await;

    subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_TOPIC,
        "army_moves.alice",
        "army_moves.*",
        QueueDurability::Transient,
        |_: ArmyMove| AckType::NackDiscard,
    )
    .await
    .unwrap();

    publish(&conn, &JsonCodec, EXCHANGE_PERIL_TOPIC, "army_moves.alice", &sample_move("alice"))
        .await
        .unwrap();
    wait_drained(&broker, "army_moves.alice").await;

    let dead = broker.peek(QUEUE_DEAD_LETTERS);
    assert_eq!(dead.len(), 1);
    let decoded: ArmyMove = JsonCodec.decode(&dead[0].body).unwrap();
    assert_eq!(decoded, sample_move("alice"));
}

#[tokio::test]
async fn test_nack_requeue_redelivers() {
    let (_broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut attempts = 0;

    subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_TOPIC,
        "war",
        "war.*",
        QueueDurability::Durable,
        move |_: ArmyMove| {
            attempts += 1;
            let _ = tx.send(attempts);
            if attempts == 1 {
                AckType::NackRequeue
            } else {
                AckType::Ack
            }
        },
    )
    .await
    .unwrap();

    publish(&conn, &JsonCodec, EXCHANGE_PERIL_TOPIC, "war.bob", &sample_move("bob"))
        .await
        .unwrap();

    assert_eq!(next(&mut rx).await, 1);
    assert_eq!(next(&mut rx).await, 2);
}

/// A handler that awaits before deciding.
struct Echo {
    conn: MemoryConnection,
}

impl Handler<PlayingState> for Echo {
    async fn handle(&mut self, state: PlayingState) -> AckType {
        let log = GameLog {
            timestamp_ms: 0,
            username: "server".into(),
            message: format!("paused={}", state.is_paused),
        };
        let key = "game_log.server";
        match publish(&self.conn, &BincodeCodec, EXCHANGE_PERIL_TOPIC, key, &log).await {
            Ok(()) => AckType::Ack,
            Err(_) => AckType::NackRequeue,
        }
    }
}

#[tokio::test]
async fn test_async_handler_can_publish_before_settling() {
    let (_broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    subscribe(
        &conn,
        BincodeCodec,
        EXCHANGE_PERIL_TOPIC,
        "game_logs",
        "game_log.*",
        QueueDurability::Durable,
        forward::<GameLog>(tx),
    )
    .await
    .unwrap();
    subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_DIRECT,
        "pause.server",
        "pause",
        QueueDurability::Transient,
        Echo { conn: conn.clone() },
    )
    .await
    .unwrap();

    publish(&conn, &JsonCodec, EXCHANGE_PERIL_DIRECT, "pause", &PlayingState { is_paused: false })
        .await
        .unwrap();

    assert_eq!(next(&mut rx).await.message, "paused=false");
}

// =========================================================================
// Topology and lifecycle
// =========================================================================

#[tokio::test]
async fn test_declare_and_bind_is_idempotent() {
    let (broker, conn) = setup().await;
    for _ in 0..2 {
        let bound =
            declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, "war", "war.*", QueueDurability::Durable)
                .await
                .unwrap();
        assert_eq!(bound.queue, "war");
        assert_eq!(bound.exchange, EXCHANGE_PERIL_TOPIC);
        assert_eq!(bound.routing_key, "war.*");
    }
    assert!(broker.queue_exists("war"));
}

#[tokio::test]
async fn test_conflicting_durability_is_rejected() {
    let (_broker, conn) = setup().await;
    declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, "war", "war.*", QueueDurability::Durable)
        .await
        .unwrap();
    let durability = QueueDurability::Transient;
    let err = declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, "war", "war.*", durability)
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::Broker(BrokerError::PreconditionFailed(_))));
}

#[tokio::test]
async fn test_transient_queue_is_exclusive() {
    let broker = MemoryBroker::new();
    let first = broker.connect();
    let second = broker.connect();
    declare_peril_topology(&first).await.unwrap();

    let durability = QueueDurability::Transient;
    declare_and_bind(&first, EXCHANGE_PERIL_DIRECT, "pause.alice", "pause", durability)
        .await
        .unwrap();
    let err = subscribe(
        &second,
        JsonCodec,
        EXCHANGE_PERIL_DIRECT,
        "pause.alice",
        "pause",
        QueueDurability::Transient,
        |_: PlayingState| AckType::Ack,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PubSubError::Broker(BrokerError::ResourceLocked(_))));
}

#[tokio::test]
async fn test_closing_connection_ends_listener() {
    let (broker, conn) = setup().await;
    let sub = subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_DIRECT,
        "pause.alice",
        "pause",
        QueueDurability::Transient,
        |_: PlayingState| AckType::Ack,
    )
    .await
    .unwrap();
    assert_eq!(sub.queue().queue, "pause.alice");

    conn.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), sub.join())
        .await
        .expect("listener should stop")
        .unwrap();
    assert!(!broker.queue_exists("pause.alice"));
}

#[tokio::test]
async fn test_abort_stops_listener() {
    let (_broker, conn) = setup().await;
    let sub = subscribe(
        &conn,
        JsonCodec,
        EXCHANGE_PERIL_TOPIC,
        "war",
        "war.*",
        QueueDurability::Durable,
        |_: ArmyMove| AckType::Ack,
    )
    .await
    .unwrap();

    assert!(!sub.is_finished());
    sub.abort();
    sub.join().await.unwrap();
}
