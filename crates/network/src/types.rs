use core::fmt;

use libp2p::core::transport;
pub use libp2p::identity::PeerId;
pub use libp2p::{Multiaddr, StreamProtocol};

#[derive(Debug)]
pub enum NetworkEvent {
    ListeningOn {
        listener_id: transport::ListenerId,
        address: Multiaddr,
    },
    PeerConnected {
        peer_id: PeerId,
        address: Multiaddr,
    },
    PeerDisconnected {
        peer_id: PeerId,
    },
}

/// A remote node as reported by the DHT: its id and every address the swarm knows for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerDescriptor {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl PeerDescriptor {
    #[must_use]
    pub const fn new(peer_id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        Self { peer_id, addrs }
    }

    /// A descriptor without addresses cannot be dialed.
    #[must_use]
    pub fn is_dialable(&self) -> bool {
        !self.addrs.is_empty()
    }
}

impl fmt::Display for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: [", self.peer_id)?;

        for (idx, addr) in self.addrs.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{addr}")?;
        }

        f.write_str("]}")
    }
}
