#[cfg(test)]
#[path = "../tests/discovery/state.rs"]
mod tests;

use std::collections::{btree_map, BTreeMap, HashSet};

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use tracing::trace;

/// DiscoveryState is the address book of every peer the swarm has learned about.
/// It is fed by connection establishment, identify, Kademlia and mDNS, and is the
/// source of the addresses attached to providers returned from DHT lookups.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryState {
    peers: BTreeMap<PeerId, PeerInfo>,
}

impl DiscoveryState {
    pub(crate) fn add_peer_addr(
        &mut self,
        peer_id: PeerId,
        addr: &Multiaddr,
        mechanism: PeerDiscoveryMechanism,
    ) {
        let addr = strip_peer_id(addr);

        if self.peers.entry(peer_id).or_default().addrs.insert(addr.clone()) {
            trace!(%peer_id, %addr, ?mechanism, "Learned peer address");
        }
    }

    pub(crate) fn remove_peer_addr(&mut self, peer_id: &PeerId, addr: &Multiaddr) {
        if let btree_map::Entry::Occupied(mut entry) = self.peers.entry(*peer_id) {
            let _ = entry.get_mut().addrs.remove(&strip_peer_id(addr));

            if entry.get().addrs.is_empty() {
                drop(entry.remove());
            }
        }
    }

    pub(crate) fn get_peer_info(&self, peer_id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(peer_id)
    }

    /// Known addresses of a peer, preferred address first. Empty for unknown peers.
    pub(crate) fn addrs_of(&self, peer_id: &PeerId) -> Vec<Multiaddr> {
        self.get_peer_info(peer_id)
            .map(PeerInfo::sorted_addrs)
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PeerInfo {
    addrs: HashSet<Multiaddr>,
}

impl PeerInfo {
    fn sorted_addrs(&self) -> Vec<Multiaddr> {
        let mut addrs: Vec<_> = self.addrs.iter().cloned().collect();

        // QUIC before TCP, then lexicographic so the order is stable across calls.
        addrs.sort_by_cached_key(|addr| (!is_udp(addr), addr.to_string()));

        addrs
    }
}

/// Where an address was learned from, for logging.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum PeerDiscoveryMechanism {
    Connection,
    Identify,
    Kad,
    Mdns,
}

fn is_udp(addr: &Multiaddr) -> bool {
    addr.iter().any(|p| matches!(p, Protocol::Udp(_)))
}

fn strip_peer_id(addr: &Multiaddr) -> Multiaddr {
    let mut addr = addr.clone();

    if matches!(addr.iter().last(), Some(Protocol::P2p(_))) {
        let _ = addr.pop();
    }

    addr
}
