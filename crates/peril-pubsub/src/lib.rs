//! Typed publish/subscribe for Peril.
//!
//! Sits between the broker contract in `peril-transport` and the codecs in
//! `peril-protocol`:
//!
//! - [`declare_and_bind`] / [`declare_peril_topology`] create queues and
//!   exchanges under a [`QueueDurability`] policy.
//! - [`publish`] encodes a value and hands it to the broker.
//! - [`subscribe`] starts a background listener that decodes deliveries,
//!   runs a [`Handler`], and settles each one with the handler's
//!   [`AckType`](peril_transport::AckType).
//!
//! ```text
//! publish(value) → Codec → Broker ─► queue
//! queue ─► listener → Codec → Handler → ack/nack
//! ```

mod channel;
mod error;
mod topology;

pub use channel::{publish, subscribe, Handler, Subscription};
pub use error::PubSubError;
pub use topology::{
    declare_and_bind, declare_peril_topology, BoundQueue, QueueDurability,
};
