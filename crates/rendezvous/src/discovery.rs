#[cfg(test)]
#[path = "tests/discovery.rs"]
mod tests;

use core::time::Duration;

use async_stream::stream;
use eyre::{eyre, Result as EyreResult, WrapErr};
use futures_util::Stream;
use libp2p::PeerId;
use meetpoint_network::types::PeerDescriptor;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::key::RendezvousKey;
use crate::overlay::Overlay;

/// Advertises this node as a provider of `key`.
///
/// Missing the deadline is reported as an error like any other failure; a node
/// that was never announced cannot be found, so callers treat it as fatal.
pub async fn announce<O: Overlay>(
    overlay: &O,
    key: &RendezvousKey,
    deadline: Duration,
) -> EyreResult<()> {
    info!("announcing ourselves...: {}", overlay.local_peer_id());

    timeout(deadline, overlay.provide(key))
        .await
        .map_err(|_| eyre!("announce timed out after {:?}", deadline))?
        .wrap_err_with(|| format!("failed to announce rendezvous key {key}"))?;

    debug!(%key, "Announced rendezvous key");

    Ok(())
}

/// Whether a stream may be opened to `peer`: never ourselves, never a peer without addresses.
#[must_use]
pub fn is_usable(local_peer_id: &PeerId, peer: &PeerDescriptor) -> bool {
    peer.peer_id != *local_peer_id && peer.is_dialable()
}

pub fn usable_peers(local_peer_id: &PeerId, peers: Vec<PeerDescriptor>) -> Vec<PeerDescriptor> {
    peers
        .into_iter()
        .filter(|peer| is_usable(local_peer_id, peer))
        .collect()
}

/// A single bounded provider lookup, already filtered down to usable peers.
pub async fn lookup<O: Overlay>(
    overlay: &O,
    key: &RendezvousKey,
    deadline: Duration,
) -> EyreResult<Vec<PeerDescriptor>> {
    let providers = timeout(deadline, overlay.find_providers(key))
        .await
        .map_err(|_| eyre!("provider lookup timed out after {:?}", deadline))??;

    Ok(usable_peers(&overlay.local_peer_id(), providers))
}

/// Polls the DHT for providers of `key` every `poll_interval`, forever.
///
/// Each successful poll yields the complete usable provider set seen by that
/// lookup, without deduplication across polls. A failed poll is logged and the
/// next one still happens one interval later. Dropping the stream stops polling.
pub fn discover<O: Overlay>(
    overlay: O,
    key: RendezvousKey,
    poll_interval: Duration,
    lookup_timeout: Duration,
) -> impl Stream<Item = Vec<PeerDescriptor>> + Send + 'static {
    stream! {
        loop {
            sleep(poll_interval).await;

            info!("searching for other peers...");

            match lookup(&overlay, &key, lookup_timeout).await {
                Ok(peers) => {
                    debug!(%key, count = peers.len(), "Provider lookup finished");
                    yield peers;
                }
                Err(err) => warn!(%key, "Failed to find providers: {:?}", err),
            }
        }
    }
}
