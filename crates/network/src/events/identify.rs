use libp2p::identify::Event;
use owo_colors::OwoColorize;
use tracing::debug;

use super::{EventHandler, EventLoop};
use crate::discovery::state::PeerDiscoveryMechanism;

impl EventHandler<Event> for EventLoop {
    async fn handle(&mut self, event: Event) {
        debug!("{}: {:?}", "identify".yellow(), event);

        if let Event::Received { peer_id, info, .. } = event {
            for addr in info.listen_addrs {
                self.discovery
                    .state
                    .add_peer_addr(peer_id, &addr, PeerDiscoveryMechanism::Identify);

                let _ = self.swarm.behaviour_mut().kad.add_address(&peer_id, addr);
            }
        }
    }
}
