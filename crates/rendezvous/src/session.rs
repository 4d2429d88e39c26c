#[cfg(test)]
#[path = "tests/session.rs"]
mod tests;

use core::future::pending;
use std::collections::{HashMap, HashSet};

use eyre::{Result as EyreResult, WrapErr};
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{pin_mut, FutureExt, StreamExt};
use libp2p::PeerId;
use meetpoint_network::types::PeerDescriptor;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::bootstrap::{connect_all, BootstrapReport};
use crate::config::{Mode, SessionConfig};
use crate::discovery::{announce, discover};
use crate::key::RendezvousKey;
use crate::overlay::{IncomingStreams, Overlay};
use crate::ping::{self, PING_PROTOCOL};

/// What a session achieved before it was shut down.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub key: RendezvousKey,
    pub bootstrap: BootstrapReport,
    /// Peers an initiator opened a ping stream to, in the order they were found.
    pub connected: Vec<PeerId>,
}

/// Drives one node through joining, announcing and (as an initiator) finding
/// and pinging its peers, until `shutdown` is cancelled.
#[derive(Debug)]
pub struct Session<O> {
    overlay: O,
    config: SessionConfig,
    shutdown: CancellationToken,
    peer_loss: Option<mpsc::Receiver<PeerId>>,
}

impl<O: Overlay> Session<O> {
    #[must_use]
    pub const fn new(overlay: O, config: SessionConfig, shutdown: CancellationToken) -> Self {
        Self {
            overlay,
            config,
            shutdown,
            peer_loss: None,
        }
    }

    /// Peers received on `peer_loss` have their ping loop stopped.
    #[must_use]
    pub fn with_peer_loss(mut self, peer_loss: mpsc::Receiver<PeerId>) -> Self {
        self.peer_loss = Some(peer_loss);
        self
    }

    /// Runs the session to completion.
    ///
    /// Only a failure to register the ping handler or to announce is returned
    /// as an error. Every other failure is logged and the session carries on.
    pub async fn run(self) -> EyreResult<SessionReport> {
        let Self {
            overlay,
            config,
            shutdown,
            mut peer_loss,
        } = self;

        let token = shutdown.child_token();
        let tracker = TaskTracker::new();

        let incoming = overlay
            .on_stream(PING_PROTOCOL)
            .wrap_err("failed to register the ping handler")?;

        drop(tracker.spawn(accept_streams(incoming, tracker.clone(), token.clone())));

        let bootstrap = connect_all(&overlay, &config.bootstrap, config.timeouts.dial).await;

        let key = RendezvousKey::derive(&config.rendezvous);

        info!(%key, rendezvous = %config.rendezvous, "Derived rendezvous key");

        let result = match announce(&overlay, &key, config.timeouts.announce).await {
            Ok(()) => {
                let connected = match config.mode {
                    Mode::Listener => {
                        info!("Listening for pings");
                        token.cancelled().await;
                        Vec::new()
                    }
                    Mode::Initiator => {
                        let mut initiator = Initiator {
                            overlay: &overlay,
                            config: &config,
                            token: &token,
                            tracker: &tracker,
                            loops: HashMap::new(),
                            attempted: HashSet::new(),
                            connected: Vec::new(),
                        };

                        initiator.run(&key, &mut peer_loss).await;
                        initiator.connected
                    }
                };

                Ok(SessionReport {
                    key,
                    bootstrap,
                    connected,
                })
            }
            Err(err) => Err(err),
        };

        token.cancel();
        _ = tracker.close();
        tracker.wait().await;

        debug!("Session finished");

        result
    }
}

struct Initiator<'a, O> {
    overlay: &'a O,
    config: &'a SessionConfig,
    token: &'a CancellationToken,
    tracker: &'a TaskTracker,
    loops: HashMap<PeerId, CancellationToken>,
    attempted: HashSet<PeerId>,
    connected: Vec<PeerId>,
}

type Opening<S> = BoxFuture<'static, (PeerDescriptor, Result<EyreResult<S>, Elapsed>)>;

impl<O: Overlay> Initiator<'_, O> {
    async fn run(&mut self, key: &RendezvousKey, peer_loss: &mut Option<mpsc::Receiver<PeerId>>) {
        let timeouts = self.config.timeouts;

        {
            let discovery = discover(
                self.overlay.clone(),
                *key,
                timeouts.poll_interval,
                timeouts.lookup,
            );
            pin_mut!(discovery);

            // Opens run side by side, so one slow peer never holds up the rest.
            let mut opening = FuturesUnordered::<Opening<O::Stream>>::new();
            let mut pending_opens = HashSet::new();

            while self.loops.is_empty() {
                select! {
                    () = self.token.cancelled() => return,
                    peer = lost_peer(peer_loss) => self.stop(&peer),
                    Some((peer, opened)) = opening.next(), if !opening.is_empty() => {
                        _ = pending_opens.remove(&peer.peer_id);

                        let stream = match opened {
                            Ok(Ok(stream)) => stream,
                            Ok(Err(err)) => {
                                warn!(peer_id = %peer.peer_id, "new stream: {:?}", err);
                                continue;
                            }
                            Err(_) => {
                                warn!(peer_id = %peer.peer_id, dial = ?timeouts.dial, "new stream: timed out");
                                continue;
                            }
                        };

                        self.start(peer.peer_id, stream);

                        info!("Connected to: {}", peer);
                    }
                    Some(peers) = discovery.next() => {
                        for peer in peers {
                            if self.attempted.contains(&peer.peer_id)
                                || !pending_opens.insert(peer.peer_id)
                            {
                                continue;
                            }

                            let overlay = self.overlay.clone();

                            opening.push(
                                async move {
                                    let open = overlay.open_stream(&peer, PING_PROTOCOL);
                                    let opened = timeout(timeouts.dial, open).await;

                                    (peer, opened)
                                }
                                .boxed(),
                            );
                        }
                    }
                }
            }
        }

        debug!(peers = self.loops.len(), "Stopped searching for peers");

        loop {
            select! {
                () = self.token.cancelled() => return,
                peer = lost_peer(peer_loss) => self.stop(&peer),
            }
        }
    }

    fn start(&mut self, peer_id: PeerId, stream: O::Stream) {
        let interval = self.config.timeouts.ping_interval;
        let peer_token = self.token.child_token();

        drop(
            self.tracker
                .spawn(ping::initiate(peer_id, stream, interval, peer_token.clone())),
        );

        drop(self.loops.insert(peer_id, peer_token));
        _ = self.attempted.insert(peer_id);
        self.connected.push(peer_id);
    }

    fn stop(&mut self, peer_id: &PeerId) {
        if let Some(token) = self.loops.remove(peer_id) {
            info!(%peer_id, "Peer lost, stopping its ping loop");
            token.cancel();
        }
    }
}

async fn lost_peer(peer_loss: &mut Option<mpsc::Receiver<PeerId>>) -> PeerId {
    loop {
        let Some(receiver) = peer_loss.as_mut() else {
            return pending().await;
        };

        if let Some(peer_id) = receiver.recv().await {
            return peer_id;
        }

        *peer_loss = None;
    }
}

async fn accept_streams<S>(
    mut incoming: IncomingStreams<S>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    loop {
        let (peer, stream) = select! {
            () = shutdown.cancelled() => break,
            next = incoming.next() => match next {
                Some(next) => next,
                None => break,
            },
        };

        let shutdown = shutdown.clone();

        drop(tracker.spawn(async move {
            if let Err(err) = ping::serve(peer, stream, shutdown).await {
                warn!(%peer, "Failed to answer ping: {:?}", err);
            }
        }));
    }

    debug!("Stopped accepting ping streams");
}
