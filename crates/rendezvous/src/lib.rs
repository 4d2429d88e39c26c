//! Rendezvous peer discovery over a Kademlia DHT.
//!
//! Nodes sharing a rendezvous string derive the same [`key::RendezvousKey`],
//! announce themselves as its providers, and find each other by looking the key
//! up. Initiators then keep a line-based ping exchange running with every peer
//! they found, while every node answers inbound pings.

pub mod bootstrap;
pub mod config;
pub mod discovery;
pub mod key;
pub mod overlay;
pub mod ping;
pub mod session;

#[cfg(test)]
#[path = "tests/memory.rs"]
pub(crate) mod memory;

pub use config::{Mode, SessionConfig, Timeouts, DEFAULT_RENDEZVOUS};
pub use key::RendezvousKey;
pub use overlay::Overlay;
pub use session::{Session, SessionReport};
