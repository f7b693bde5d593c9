//! Wire protocol for Peril.
//!
//! This crate defines the "language" every Peril process speaks over the
//! broker:
//!
//! - **Types** ([`ArmyMove`], [`RecognitionOfWar`], [`PlayingState`],
//!   [`GameLog`], etc.), the message structures that travel on the wire.
//! - **Codecs** ([`Codec`] trait, [`JsonCodec`], [`BincodeCodec`]), how
//!   those messages are converted to and from bytes.
//! - **Routing** ([`routing`]), the exchange, queue and key names.
//! - **Errors** ([`ProtocolError`]), what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the broker (raw bytes) and the game
//! (rules). It knows nothing about connections or acknowledgements.
//!
//! ```text
//! Transport (bytes) → Protocol (typed message) → Game (outcome)
//! ```

mod codec;
mod error;
pub mod routing;
mod types;

pub use codec::Codec;
#[cfg(feature = "bincode")]
pub use codec::BincodeCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Army, ArmyMove, GameLog, PlayerSnapshot, PlayingState, Rank,
    RecognitionOfWar, Territory,
};
