#[cfg(test)]
#[path = "tests/bootstrap.rs"]
mod tests;

use core::time::Duration;

use eyre::{bail, eyre, Result as EyreResult, WrapErr};
use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::overlay::Overlay;

/// Outcome of one pass over the bootstrap list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BootstrapReport {
    pub connected: Vec<PeerId>,
    pub failed: usize,
}

impl BootstrapReport {
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.connected.is_empty()
    }
}

/// Parses a bootstrap entry, which must name its peer in a trailing `/p2p/` component.
pub fn parse_peer_address(addr: &str) -> EyreResult<(PeerId, Multiaddr)> {
    let multiaddr: Multiaddr = addr
        .parse()
        .wrap_err_with(|| format!("invalid multiaddr: {addr}"))?;

    let Some(Protocol::P2p(peer_id)) = multiaddr.iter().last() else {
        bail!("address does not end with a /p2p/ component: {addr}");
    };

    Ok((peer_id, multiaddr))
}

/// Dials every bootstrap entry, each under its own deadline, and returns once all of them
/// have succeeded or failed. A bad entry never prevents the others from being tried.
pub async fn connect_all<O: Overlay>(
    overlay: &O,
    addrs: &[String],
    dial_timeout: Duration,
) -> BootstrapReport {
    let mut report = BootstrapReport::default();

    for addr in addrs {
        match connect_one(overlay, addr, dial_timeout).await {
            Ok(peer_id) => {
                info!("Connection established with bootstrap node: {}", peer_id);
                report.connected.push(peer_id);
            }
            Err(err) => {
                warn!(%addr, "Failed to connect to bootstrap node: {:?}", err);
                report.failed += 1;
            }
        }
    }

    if report.is_isolated() {
        warn!(
            "Could not reach any of the {} bootstrap nodes, peers will not be found",
            addrs.len()
        );
        return report;
    }

    if let Err(err) = overlay.refresh_routing().await {
        debug!(%err, "Routing table refresh did not complete");
    }

    report
}

async fn connect_one<O: Overlay>(
    overlay: &O,
    addr: &str,
    dial_timeout: Duration,
) -> EyreResult<PeerId> {
    let (peer_id, multiaddr) = parse_peer_address(addr)?;

    timeout(dial_timeout, overlay.connect(multiaddr))
        .await
        .map_err(|_| eyre!("timed out after {:?}", dial_timeout))??;

    Ok(peer_id)
}
