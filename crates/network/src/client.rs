use eyre::{bail, Result as EyreResult, WrapErr};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use libp2p::kad::RecordKey;
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use libp2p_stream::Control;
use tokio::sync::{mpsc, oneshot};

use crate::stream::Stream;
use crate::types::PeerDescriptor;
use crate::Command;

/// Cheap, cloneable handle to the swarm event loop.
///
/// Swarm operations are sent as commands and answered over a oneshot channel.
/// Streams are opened and accepted directly through the stream behaviour's control.
#[derive(Clone)]
pub struct NetworkClient {
    peer_id: PeerId,
    sender: mpsc::Sender<Command>,
    control: Control,
}

impl core::fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

impl NetworkClient {
    pub(crate) const fn new(peer_id: PeerId, sender: mpsc::Sender<Command>, control: Control) -> Self {
        Self {
            peer_id,
            sender,
            control,
        }
    }

    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> EyreResult<T> {
        let (sender, receiver) = oneshot::channel();

        self.sender
            .send(command(sender))
            .await
            .wrap_err("Command receiver dropped")?;

        receiver.await.wrap_err("Command sender dropped")
    }

    pub async fn listen_on(&self, addr: Multiaddr) -> EyreResult<()> {
        self.request(|sender| Command::ListenOn { addr, sender })
            .await?
    }

    /// Dials a `/p2p/`-terminated address and resolves once a connection to that peer exists.
    pub async fn dial(&self, peer_addr: Multiaddr) -> EyreResult<Option<()>> {
        self.request(|sender| Command::Dial { peer_addr, sender })
            .await?
    }

    pub async fn bootstrap(&self) -> EyreResult<()> {
        let _ = self.request(|sender| Command::Bootstrap { sender }).await??;
        Ok(())
    }

    pub async fn start_providing(&self, key: RecordKey) -> EyreResult<()> {
        self.request(|sender| Command::StartProviding { key, sender })
            .await?
    }

    pub async fn get_providers(&self, key: RecordKey) -> EyreResult<Vec<PeerDescriptor>> {
        self.request(|sender| Command::GetProviders { key, sender })
            .await?
    }

    pub async fn connected_peers(&self) -> EyreResult<usize> {
        self.request(|sender| Command::PeerCount { sender }).await
    }

    /// Opens a stream to `peer`, registering its addresses with the DHT first so
    /// the swarm can dial it when no connection exists yet.
    pub async fn open_stream(
        &self,
        peer: &PeerDescriptor,
        protocol: StreamProtocol,
    ) -> EyreResult<Stream> {
        self.request(|sender| Command::AddAddresses {
            peer_id: peer.peer_id,
            addrs: peer.addrs.clone(),
            sender,
        })
        .await?;

        let mut control = self.control.clone();

        let stream = match control.open_stream(peer.peer_id, protocol).await {
            Ok(stream) => stream,
            Err(err) => {
                bail!("Failed to open stream: {:?}", err);
            }
        };

        Ok(Stream::new(stream))
    }

    /// Registers `protocol` and returns every inbound stream opened for it.
    pub fn accept(&self, protocol: StreamProtocol) -> EyreResult<BoxStream<'static, (PeerId, Stream)>> {
        let mut control = self.control.clone();

        let incoming = match control.accept(protocol) {
            Ok(incoming) => incoming,
            Err(err) => {
                bail!("Failed to setup control for stream protocol: {:?}", err);
            }
        };

        Ok(incoming
            .map(|(peer_id, stream)| (peer_id, Stream::new(stream)))
            .boxed())
    }
}
