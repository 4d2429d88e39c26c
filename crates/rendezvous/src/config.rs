#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;

use core::time::Duration;

use meetpoint_network::config::IPFS_BOOT_NODES;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

pub const DEFAULT_RENDEZVOUS: &str = "meet me here";

/// Whether the node only answers pings or also goes looking for peers to ping.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Listener,
    Initiator,
}

/// Settings for one discovery session, fixed at startup and shared by reference.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub rendezvous: String,
    pub mode: Mode,
    pub bootstrap: Vec<String>,
    pub timeouts: Timeouts,
}

impl SessionConfig {
    /// A session joining through the public IPFS bootstrap nodes.
    #[must_use]
    pub fn new(rendezvous: impl Into<String>, mode: Mode) -> Self {
        Self {
            rendezvous: rendezvous.into(),
            mode,
            bootstrap: IPFS_BOOT_NODES.iter().map(|&addr| addr.to_owned()).collect(),
            timeouts: Timeouts::default(),
        }
    }

    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: Vec<String>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[serde_as]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Deadline for advertising ourselves as a provider.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub announce: Duration,

    /// Deadline for each provider lookup.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub lookup: Duration,

    /// Delay between provider lookups.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,

    /// Delay between ping rounds on a stream.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ping_interval: Duration,

    /// Deadline for connecting to a single bootstrap node.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub dial: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            announce: Duration::from_secs(10),
            lookup: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            ping_interval: Duration::from_secs(1),
            dial: Duration::from_secs(10),
        }
    }
}
