use eyre::eyre;
use libp2p::swarm::SwarmEvent;
use owo_colors::OwoColorize;
use tracing::{debug, error, info, trace};

use super::{BehaviourEvent, EventLoop};
use crate::discovery::state::PeerDiscoveryMechanism;
use crate::types::NetworkEvent;

mod identify;
mod kad;
mod mdns;
mod ping;

pub(crate) trait EventHandler<E> {
    async fn handle(&mut self, event: E);
}

impl EventLoop {
    pub(super) async fn handle_swarm_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(event) => match event {
                BehaviourEvent::Identify(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Kad(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Mdns(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Ping(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Stream(_) => {}
            },
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                let local_peer_id = *self.swarm.local_peer_id();
                info!("Listening on {}/p2p/{}", address, local_peer_id);

                self.emit(NetworkEvent::ListeningOn {
                    listener_id,
                    address,
                })
                .await;
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                ..
            } => {
                debug!(%peer_id, ?endpoint, "Connection established");

                let address = endpoint.get_remote_address().clone();

                if endpoint.is_dialer() {
                    self.discovery.state.add_peer_addr(
                        peer_id,
                        &address,
                        PeerDiscoveryMechanism::Connection,
                    );
                }

                if let Some(sender) = self.pending_dial.remove(&connection_id) {
                    let _ = sender.send(Ok(Some(())));
                }

                self.emit(NetworkEvent::PeerConnected { peer_id, address })
                    .await;
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                cause,
                ..
            } => {
                debug!(%peer_id, ?cause, num_established, "Connection closed");

                if num_established == 0 {
                    self.emit(NetworkEvent::PeerDisconnected { peer_id }).await;
                }
            }
            SwarmEvent::OutgoingConnectionError {
                connection_id,
                peer_id,
                error,
                ..
            } => {
                debug!(?peer_id, %error, "Outgoing connection failed");

                if let Some(sender) = self.pending_dial.remove(&connection_id) {
                    let _ = sender.send(Err(eyre!(error)));
                }
            }
            SwarmEvent::NewExternalAddrOfPeer { peer_id, address } => {
                self.discovery
                    .state
                    .add_peer_addr(peer_id, &address, PeerDiscoveryMechanism::Kad);
            }
            SwarmEvent::ListenerError { listener_id, error } => {
                error!(?listener_id, %error, "Listener failed");
            }
            event => trace!("{}: {:?}", "swarm".yellow(), event),
        }
    }

    async fn emit(&mut self, event: NetworkEvent) {
        if self.event_sender.send(event).await.is_err() {
            trace!("Network event receiver dropped");
        }
    }
}
