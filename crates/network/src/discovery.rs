use std::collections::HashSet;

use libp2p::PeerId;
use tracing::debug;

pub(crate) mod state;

use super::EventLoop;
use crate::types::PeerDescriptor;

#[derive(Debug)]
pub(crate) struct Discovery {
    pub(crate) state: state::DiscoveryState,
}

impl Discovery {
    pub(crate) fn new() -> Self {
        Self {
            state: state::DiscoveryState::default(),
        }
    }
}

impl EventLoop {
    // Attaches every known address to the providers returned by a DHT lookup.
    // Providers without a known address still get returned, and a closest-peers
    // lookup is started for them so their addresses are known by the next lookup.
    pub(crate) fn resolve_providers(&mut self, providers: HashSet<PeerId>) -> Vec<PeerDescriptor> {
        let mut descriptors: Vec<_> = providers
            .into_iter()
            .map(|peer_id| PeerDescriptor {
                peer_id,
                addrs: self.discovery.state.addrs_of(&peer_id),
            })
            .collect();

        descriptors.sort_by_key(|descriptor| descriptor.peer_id);

        let local_peer_id = *self.swarm.local_peer_id();

        for descriptor in &descriptors {
            if descriptor.addrs.is_empty() && descriptor.peer_id != local_peer_id {
                debug!(peer_id=%descriptor.peer_id, "Provider has no known address, looking it up");

                let _ = self
                    .swarm
                    .behaviour_mut()
                    .kad
                    .get_closest_peers(descriptor.peer_id);
            }
        }

        descriptors
    }
}
