use async_trait::async_trait;
use eyre::Result as EyreResult;
use futures_util::stream::BoxStream;
use libp2p::kad::RecordKey;
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use meetpoint_network::client::NetworkClient;
use meetpoint_network::stream::Stream;
use meetpoint_network::types::PeerDescriptor;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::key::RendezvousKey;

pub type IncomingStreams<S> = BoxStream<'static, (PeerId, S)>;

/// What the rendezvous protocol needs from the peer-to-peer host and its DHT.
///
/// Deadlines are applied by the callers, so implementations may block for as
/// long as the underlying network does.
#[async_trait]
pub trait Overlay: Clone + Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn local_peer_id(&self) -> PeerId;

    /// Connects to the peer named by the trailing `/p2p/` component of `addr`.
    async fn connect(&self, addr: Multiaddr) -> EyreResult<()>;

    /// Refreshes the DHT routing table from the peers connected so far.
    async fn refresh_routing(&self) -> EyreResult<()>;

    async fn provide(&self, key: &RendezvousKey) -> EyreResult<()>;

    async fn find_providers(&self, key: &RendezvousKey) -> EyreResult<Vec<PeerDescriptor>>;

    async fn open_stream(
        &self,
        peer: &PeerDescriptor,
        protocol: StreamProtocol,
    ) -> EyreResult<Self::Stream>;

    /// Registers a handler for `protocol`; every inbound stream is yielded with its origin.
    fn on_stream(&self, protocol: StreamProtocol) -> EyreResult<IncomingStreams<Self::Stream>>;
}

#[async_trait]
impl Overlay for NetworkClient {
    type Stream = Stream;

    fn local_peer_id(&self) -> PeerId {
        self.peer_id()
    }

    async fn connect(&self, addr: Multiaddr) -> EyreResult<()> {
        let _ = self.dial(addr).await?;
        Ok(())
    }

    async fn refresh_routing(&self) -> EyreResult<()> {
        self.bootstrap().await
    }

    async fn provide(&self, key: &RendezvousKey) -> EyreResult<()> {
        self.start_providing(RecordKey::new(key)).await
    }

    async fn find_providers(&self, key: &RendezvousKey) -> EyreResult<Vec<PeerDescriptor>> {
        self.get_providers(RecordKey::new(key)).await
    }

    async fn open_stream(
        &self,
        peer: &PeerDescriptor,
        protocol: StreamProtocol,
    ) -> EyreResult<Self::Stream> {
        Self::open_stream(self, peer, protocol).await
    }

    fn on_stream(&self, protocol: StreamProtocol) -> EyreResult<IncomingStreams<Self::Stream>> {
        self.accept(protocol)
    }
}
