#[cfg(test)]
#[path = "tests/lib.rs"]
mod tests;

use core::time::Duration;
use std::collections::{HashMap, HashSet};

use client::NetworkClient;
use config::{NetworkConfig, IPFS_KAD_PROTOCOL};
use eyre::{eyre, Result as EyreResult};
use futures_util::StreamExt;
use libp2p::identify::{Behaviour as IdentifyBehaviour, Config as IdentifyConfig};
use libp2p::kad::store::MemoryStore;
use libp2p::kad::{Behaviour as KadBehaviour, Config as KadConfig, Mode, QueryId, RecordKey};
use libp2p::mdns::tokio::Behaviour as MdnsTokioBehaviour;
use libp2p::mdns::{Behaviour as MdnsBehaviour, Config as MdnsConfig};
use libp2p::multiaddr::Protocol;
use libp2p::noise::Config as NoiseConfig;
use libp2p::ping::Behaviour as PingBehaviour;
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::dial_opts::{DialOpts, PeerCondition};
use libp2p::swarm::{ConnectionId, NetworkBehaviour, Swarm};
use libp2p::tcp::Config as TcpConfig;
use libp2p::tls::Config as TlsConfig;
use libp2p::yamux::Config as YamuxConfig;
use libp2p::{Multiaddr, PeerId, SwarmBuilder};
use libp2p_stream::Behaviour as StreamBehaviour;
use tokio::sync::{mpsc, oneshot};
use tokio::{select, spawn};
use tracing::{info, warn};

use crate::discovery::Discovery;
use crate::types::{NetworkEvent, PeerDescriptor};

pub mod client;
pub mod config;
mod discovery;
mod events;
pub mod stream;
pub mod types;

const PROTOCOL_VERSION: &str = concat!("/", env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(NetworkBehaviour)]
struct Behaviour {
    identify: IdentifyBehaviour,
    kad: KadBehaviour<MemoryStore>,
    mdns: Toggle<MdnsTokioBehaviour>,
    ping: PingBehaviour,
    stream: StreamBehaviour,
}

/// Builds the host, spawns its event loop and starts listening.
///
/// The returned client is the only way to drive the swarm; the receiver carries
/// connection and listener notifications.
pub async fn run(
    config: &NetworkConfig,
) -> EyreResult<(NetworkClient, mpsc::Receiver<NetworkEvent>)> {
    let peer_id = config.identity.public().to_peer_id();

    let (client, event_receiver, event_loop) = init(peer_id, config)?;

    drop(spawn(event_loop.run()));

    for addr in &config.swarm.listen {
        client.listen_on(addr.clone()).await?;
    }

    Ok((client, event_receiver))
}

fn init(
    peer_id: PeerId,
    config: &NetworkConfig,
) -> EyreResult<(NetworkClient, mpsc::Receiver<NetworkEvent>, EventLoop)> {
    let swarm = SwarmBuilder::with_existing_identity(config.identity.clone())
        .with_tokio()
        .with_tcp(
            TcpConfig::default(),
            (TlsConfig::new, NoiseConfig::new),
            YamuxConfig::default,
        )?
        .with_quic()
        .with_dns()?
        .with_behaviour(|key| Behaviour {
            identify: IdentifyBehaviour::new(
                IdentifyConfig::new(PROTOCOL_VERSION.to_owned(), key.public())
                    .with_push_listen_addr_updates(true),
            ),
            kad: {
                let kad_config = KadConfig::new(IPFS_KAD_PROTOCOL);

                let mut kad =
                    KadBehaviour::with_config(peer_id, MemoryStore::new(peer_id), kad_config);

                kad.set_mode(config.discovery.kad_server.then_some(Mode::Server));

                kad
            },
            mdns: config
                .discovery
                .mdns
                .then_some(())
                .and_then(|()| MdnsBehaviour::new(MdnsConfig::default(), peer_id).ok())
                .into(),
            ping: PingBehaviour::default(),
            stream: StreamBehaviour::new(),
        })?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(Duration::from_secs(60)))
        .build();

    let control = swarm.behaviour().stream.new_control();

    let (command_sender, command_receiver) = mpsc::channel(32);
    let (event_sender, event_receiver) = mpsc::channel(32);

    let client = NetworkClient::new(peer_id, command_sender, control);

    let discovery = Discovery::new();

    let event_loop = EventLoop::new(swarm, command_receiver, event_sender, discovery);

    Ok((client, event_receiver, event_loop))
}

pub(crate) struct EventLoop {
    swarm: Box<Swarm<Behaviour>>,
    command_receiver: mpsc::Receiver<Command>,
    event_sender: mpsc::Sender<NetworkEvent>,
    discovery: Discovery,
    pending_dial: HashMap<ConnectionId, oneshot::Sender<EyreResult<Option<()>>>>,
    pending_bootstrap: HashMap<QueryId, oneshot::Sender<EyreResult<Option<()>>>>,
    pending_start_providing: HashMap<QueryId, oneshot::Sender<EyreResult<()>>>,
    pending_get_providers: HashMap<QueryId, PendingProviders>,
}

/// Providers collected so far for an in-flight lookup.
#[derive(Debug)]
pub(crate) struct PendingProviders {
    sender: oneshot::Sender<EyreResult<Vec<PeerDescriptor>>>,
    providers: HashSet<PeerId>,
}

impl EventLoop {
    fn new(
        swarm: Swarm<Behaviour>,
        command_receiver: mpsc::Receiver<Command>,
        event_sender: mpsc::Sender<NetworkEvent>,
        discovery: Discovery,
    ) -> Self {
        Self {
            swarm: Box::new(swarm),
            command_receiver,
            event_sender,
            discovery,
            pending_dial: HashMap::default(),
            pending_bootstrap: HashMap::default(),
            pending_start_providing: HashMap::default(),
            pending_get_providers: HashMap::default(),
        }
    }

    pub(crate) async fn run(mut self) {
        #[expect(clippy::redundant_pub_crate, reason = "Needed for Tokio code")]
        loop {
            select! {
                event = self.swarm.next() => {
                    let Some(event) = event else { break };
                    self.handle_swarm_event(event).await;
                },
                command = self.command_receiver.recv() => {
                    let Some(c) = command else { break };
                    self.handle_command(c);
                }
            }
        }

        info!("Network event loop stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ListenOn { addr, sender } => {
                let _ = match self.swarm.listen_on(addr) {
                    Ok(_) => sender.send(Ok(())),
                    Err(e) => sender.send(Err(eyre!(e))),
                };
            }
            Command::Dial { peer_addr, sender } => self.dial(peer_addr, sender),
            Command::Bootstrap { sender } => match self.swarm.behaviour_mut().kad.bootstrap() {
                Ok(query_id) => {
                    drop(self.pending_bootstrap.insert(query_id, sender));
                }
                Err(err) => {
                    let _ = sender.send(Err(eyre!(err)));
                }
            },
            Command::StartProviding { key, sender } => {
                match self.swarm.behaviour_mut().kad.start_providing(key) {
                    Ok(query_id) => {
                        drop(self.pending_start_providing.insert(query_id, sender));
                    }
                    Err(err) => {
                        let _ = sender.send(Err(eyre!(err)));
                    }
                }
            }
            Command::GetProviders { key, sender } => {
                let query_id = self.swarm.behaviour_mut().kad.get_providers(key);
                drop(self.pending_get_providers.insert(
                    query_id,
                    PendingProviders {
                        sender,
                        providers: HashSet::new(),
                    },
                ));
            }
            Command::AddAddresses {
                peer_id,
                addrs,
                sender,
            } => {
                for addr in addrs {
                    let _ = self.swarm.behaviour_mut().kad.add_address(&peer_id, addr);
                }
                let _ = sender.send(());
            }
            Command::PeerCount { sender } => {
                let _ = sender.send(self.swarm.connected_peers().count());
            }
        }
    }

    fn dial(&mut self, mut peer_addr: Multiaddr, sender: oneshot::Sender<EyreResult<Option<()>>>) {
        let Some(Protocol::P2p(peer_id)) = peer_addr.pop() else {
            let _ = sender.send(Err(eyre!("No peer ID in address: {}", peer_addr)));
            return;
        };

        if self.swarm.is_connected(&peer_id) {
            let _ = sender.send(Ok(Some(())));
            return;
        }

        // Callers that gave up on an earlier dial no longer need an answer.
        self.pending_dial.retain(|_, sender| !sender.is_closed());

        let _ = self
            .swarm
            .behaviour_mut()
            .kad
            .add_address(&peer_id, peer_addr.clone());

        // Every request gets its own attempt, even while another dial to the
        // same peer is still in flight over a different address.
        let opts = DialOpts::peer_id(peer_id)
            .addresses(vec![peer_addr])
            .condition(PeerCondition::Always)
            .build();
        let connection_id = opts.connection_id();

        match self.swarm.dial(opts) {
            Ok(()) => {
                drop(self.pending_dial.insert(connection_id, sender));
            }
            Err(e) => {
                warn!(%peer_id, %e, "Failed to start dial");
                let _ = sender.send(Err(eyre!(e)));
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    ListenOn {
        addr: Multiaddr,
        sender: oneshot::Sender<EyreResult<()>>,
    },
    Dial {
        peer_addr: Multiaddr,
        sender: oneshot::Sender<EyreResult<Option<()>>>,
    },
    Bootstrap {
        sender: oneshot::Sender<EyreResult<Option<()>>>,
    },
    StartProviding {
        key: RecordKey,
        sender: oneshot::Sender<EyreResult<()>>,
    },
    GetProviders {
        key: RecordKey,
        sender: oneshot::Sender<EyreResult<Vec<PeerDescriptor>>>,
    },
    AddAddresses {
        peer_id: PeerId,
        addrs: Vec<Multiaddr>,
        sender: oneshot::Sender<()>,
    },
    PeerCount {
        sender: oneshot::Sender<usize>,
    },
}
