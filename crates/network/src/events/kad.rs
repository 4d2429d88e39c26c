use eyre::eyre;
use libp2p::kad::{Event, GetClosestPeersOk, GetProvidersOk, QueryId, QueryResult};
use owo_colors::OwoColorize;
use tracing::debug;

use super::{EventHandler, EventLoop};
use crate::discovery::state::PeerDiscoveryMechanism;

impl EventHandler<Event> for EventLoop {
    async fn handle(&mut self, event: Event) {
        debug!("{}: {:?}", "kad".yellow(), event);

        match event {
            Event::OutboundQueryProgressed {
                id,
                result: QueryResult::Bootstrap(result),
                ..
            } => {
                if let Some(sender) = self.pending_bootstrap.remove(&id) {
                    drop(sender.send(result.map(|_| None).map_err(Into::into)));
                }
            }
            Event::OutboundQueryProgressed {
                id,
                result: QueryResult::StartProviding(result),
                ..
            } => {
                if let Some(sender) = self.pending_start_providing.remove(&id) {
                    drop(sender.send(result.map(|_| ()).map_err(Into::into)));
                }
            }
            Event::OutboundQueryProgressed {
                id,
                result: QueryResult::GetProviders(result),
                step,
                ..
            } => match result {
                Ok(GetProvidersOk::FoundProviders { providers, .. }) => {
                    let local_peer_id = *self.swarm.local_peer_id();

                    let Some(pending) = self.pending_get_providers.get_mut(&id) else {
                        return;
                    };

                    pending.providers.extend(providers);

                    // Our own record is answered from the local store first; keep
                    // querying until someone else shows up or the query ends.
                    let found_remote = pending.providers.iter().any(|p| *p != local_peer_id);

                    if found_remote || step.last {
                        self.complete_get_providers(id);
                    }
                }
                Ok(GetProvidersOk::FinishedWithNoAdditionalRecord { .. }) => {
                    self.complete_get_providers(id);
                }
                Err(err) => {
                    if let Some(pending) = self.pending_get_providers.remove(&id) {
                        // A timed out lookup may still have collected providers.
                        if pending.providers.is_empty() {
                            drop(pending.sender.send(Err(eyre!(err))));
                        } else {
                            let providers = self.resolve_providers(pending.providers);
                            drop(pending.sender.send(Ok(providers)));
                        }
                    }
                }
            },
            Event::OutboundQueryProgressed {
                result: QueryResult::GetClosestPeers(Ok(GetClosestPeersOk { peers, .. })),
                ..
            } => {
                for peer in peers {
                    for addr in &peer.addrs {
                        self.discovery
                            .state
                            .add_peer_addr(peer.peer_id, addr, PeerDiscoveryMechanism::Kad);
                    }
                }
            }
            Event::RoutingUpdated {
                peer, addresses, ..
            } => {
                for addr in addresses.iter() {
                    self.discovery
                        .state
                        .add_peer_addr(peer, addr, PeerDiscoveryMechanism::Kad);
                }
            }
            Event::RoutablePeer { peer, address } | Event::PendingRoutablePeer { peer, address } => {
                self.discovery
                    .state
                    .add_peer_addr(peer, &address, PeerDiscoveryMechanism::Kad);
            }
            _ => {}
        }
    }
}

impl EventLoop {
    fn complete_get_providers(&mut self, id: QueryId) {
        let Some(pending) = self.pending_get_providers.remove(&id) else {
            return;
        };

        let providers = self.resolve_providers(pending.providers);
        drop(pending.sender.send(Ok(providers)));

        if let Some(mut query) = self.swarm.behaviour_mut().kad.query_mut(&id) {
            query.finish();
        }
    }
}
