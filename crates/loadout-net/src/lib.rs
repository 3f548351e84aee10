//! Loadout Net - Replication channel for the equipment core
//!
//! Defines the three message shapes the core exchanges with its networking
//! collaborator (client commands, authority broadcasts, and the targeted
//! late-join sync), a JSON wire codec, and an in-memory hub that delivers
//! frames between one authority and any number of observers.

pub mod channel;
pub mod codec;
pub mod error;
pub mod message;

pub use channel::{AuthorityChannel, AuthorityEndpoint, LocalHub, ObserverChannel, ObserverEndpoint};
pub use codec::{decode, encode};
pub use error::NetError;
pub use message::{
    AmmoSnapshot, Broadcast, Command, CommandEnvelope, ItemSnapshot, LateJoinSync, ServerMessage,
};
