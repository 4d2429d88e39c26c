use core::time::Duration;

use futures_util::SinkExt;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;

use super::*;
use crate::discovery::lookup;
use crate::memory::{MemoryNetwork, ProvideBehaviour};
use crate::ping::{PingCodec, PING, PONG};

fn config(network: &MemoryNetwork, rendezvous: &str, mode: Mode) -> SessionConfig {
    SessionConfig::new(rendezvous, mode).with_bootstrap(vec![network.bootstrap_node()])
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(60), async {
        while !condition() {
            sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_initiator_pings_discovered_peer() {
    let network = MemoryNetwork::new();
    let responder = network.node();
    let initiator = network.node();
    let key = RendezvousKey::derive("meet me here");

    let mut incoming = responder.on_stream(PING_PROTOCOL).unwrap();
    responder.provide(&key).await.unwrap();

    let shutdown = CancellationToken::new();
    let session = tokio::spawn(
        Session::new(
            initiator.clone(),
            config(&network, "meet me here", Mode::Initiator),
            shutdown.clone(),
        )
        .run(),
    );

    let (peer, stream) = incoming.next().await.unwrap();

    assert_eq!(peer, initiator.local_peer_id());

    let mut framed = Framed::new(stream, PingCodec::new());

    assert_eq!(framed.next().await.unwrap().unwrap(), PING);
    framed.send(PONG).await.unwrap();

    shutdown.cancel();

    let report = session.await.unwrap().unwrap();

    assert_eq!(report.key, key);
    assert_eq!(report.bootstrap.connected.len(), 1);
    assert_eq!(report.connected, vec![responder.local_peer_id()]);
}

#[tokio::test(start_paused = true)]
async fn test_listener_answers_ping() {
    let network = MemoryNetwork::new();
    let listener = network.node();
    let initiator = network.node();
    let key = RendezvousKey::derive("meet me here");

    let shutdown = CancellationToken::new();
    let session = tokio::spawn(
        Session::new(
            listener.clone(),
            config(&network, "meet me here", Mode::Listener),
            shutdown.clone(),
        )
        .run(),
    );

    let peer = loop {
        let peers = lookup(&initiator, &key, Duration::from_secs(10))
            .await
            .unwrap();

        if let Some(peer) = peers.into_iter().next() {
            break peer;
        }

        sleep(Duration::from_secs(1)).await;
    };

    assert_eq!(peer.peer_id, listener.local_peer_id());
    assert!(peer.is_dialable());

    let stream = initiator.open_stream(&peer, PING_PROTOCOL).await.unwrap();
    let mut framed = Framed::new(stream, PingCodec::new());

    assert_eq!(ping::exchange(&mut framed).await.unwrap(), PONG);

    shutdown.cancel();

    let report = session.await.unwrap().unwrap();

    assert!(report.connected.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_two_nodes_meet_on_same_rendezvous() {
    let network = MemoryNetwork::new();
    let listener = network.node();
    let initiator = network.node();
    let shutdown = CancellationToken::new();

    let listening = tokio::spawn(
        Session::new(
            listener.clone(),
            config(&network, "meet me here", Mode::Listener),
            shutdown.clone(),
        )
        .run(),
    );
    let initiating = tokio::spawn(
        Session::new(
            initiator.clone(),
            config(&network, "meet me here", Mode::Initiator),
            shutdown.clone(),
        )
        .run(),
    );

    let expected = (initiator.local_peer_id(), listener.local_peer_id());
    wait_until(|| network.opened().contains(&expected)).await;

    sleep(Duration::from_secs(3)).await;

    shutdown.cancel();

    let listened = listening.await.unwrap().unwrap();
    let initiated = initiating.await.unwrap().unwrap();

    assert!(listened.connected.is_empty());
    assert_eq!(initiated.connected, vec![listener.local_peer_id()]);
    assert_eq!(listened.key, initiated.key);

    // One stream per peer, polling stops once a peer was found.
    assert_eq!(network.opened(), vec![expected]);
}

#[tokio::test(start_paused = true)]
async fn test_different_rendezvous_never_meet() {
    let network = MemoryNetwork::new();
    let listener = network.node();
    let initiator = network.node();
    let shutdown = CancellationToken::new();

    let listening = tokio::spawn(
        Session::new(
            listener,
            config(&network, "meet me here", Mode::Listener),
            shutdown.clone(),
        )
        .run(),
    );
    let initiating = tokio::spawn(
        Session::new(
            initiator,
            config(&network, "meet me there", Mode::Initiator),
            shutdown.clone(),
        )
        .run(),
    );

    sleep(Duration::from_secs(30)).await;

    assert!(network.opened().is_empty());
    assert!(network.lookups().len() >= 20);

    shutdown.cancel();

    let listened = listening.await.unwrap().unwrap();
    let initiated = initiating.await.unwrap().unwrap();

    assert_ne!(listened.key, initiated.key);
    assert!(initiated.connected.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_announce_failure_is_fatal() {
    let network = MemoryNetwork::new();
    let node = network.node();
    network.set_provide(ProvideBehaviour::Fail);

    let result = Session::new(
        node,
        config(&network, "meet me here", Mode::Initiator),
        CancellationToken::new(),
    )
    .run()
    .await;

    assert!(result.is_err());
    assert!(network.lookups().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_announce_timeout_is_fatal() {
    let network = MemoryNetwork::new();
    let node = network.node();
    network.set_provide(ProvideBehaviour::Hang);

    let result = Session::new(
        node,
        config(&network, "meet me here", Mode::Listener),
        CancellationToken::new(),
    )
    .run()
    .await;

    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_failed_stream_leaves_peer_eligible() {
    let network = MemoryNetwork::new();
    let responder = network.node();
    let initiator = network.node();
    let key = RendezvousKey::derive("meet me here");

    // Provided, but nothing answers the ping protocol yet.
    responder.provide(&key).await.unwrap();

    let shutdown = CancellationToken::new();
    let session = tokio::spawn(
        Session::new(
            initiator,
            config(&network, "meet me here", Mode::Initiator),
            shutdown.clone(),
        )
        .run(),
    );

    wait_until(|| network.lookups().len() >= 2).await;

    assert!(network.opened().is_empty());

    let mut incoming = responder.on_stream(PING_PROTOCOL).unwrap();
    let (_, stream) = incoming.next().await.unwrap();
    let mut framed = Framed::new(stream, PingCodec::new());

    assert_eq!(framed.next().await.unwrap().unwrap(), PING);

    shutdown.cancel();

    let report = session.await.unwrap().unwrap();

    assert_eq!(report.connected, vec![responder.local_peer_id()]);
}

#[tokio::test(start_paused = true)]
async fn test_peer_loss_stops_ping_loop() {
    let network = MemoryNetwork::new();
    let responder = network.node();
    let initiator = network.node();
    let key = RendezvousKey::derive("meet me here");

    let mut incoming = responder.on_stream(PING_PROTOCOL).unwrap();
    responder.provide(&key).await.unwrap();

    let (lost, peer_loss) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let session = tokio::spawn(
        Session::new(
            initiator,
            config(&network, "meet me here", Mode::Initiator),
            shutdown.clone(),
        )
        .with_peer_loss(peer_loss)
        .run(),
    );

    let (_, stream) = incoming.next().await.unwrap();
    let mut framed = Framed::new(stream, PingCodec::new());

    assert_eq!(framed.next().await.unwrap().unwrap(), PING);
    framed.send(PONG).await.unwrap();

    lost.send(responder.local_peer_id()).await.unwrap();

    // The loop is gone, so its stream closes instead of pinging again.
    assert!(framed.next().await.is_none());
    assert!(!session.is_finished());

    shutdown.cancel();

    let report = session.await.unwrap().unwrap();

    assert_eq!(report.connected, vec![responder.local_peer_id()]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_stream_open_hangs() {
    let network = MemoryNetwork::new();
    let responder = network.node();
    let initiator = network.node();
    let key = RendezvousKey::derive("meet me here");

    let _incoming = responder.on_stream(PING_PROTOCOL).unwrap();
    responder.provide(&key).await.unwrap();
    network.stall_streams(responder.local_peer_id());

    let shutdown = CancellationToken::new();
    let session = tokio::spawn(
        Session::new(
            initiator,
            config(&network, "meet me here", Mode::Initiator),
            shutdown.clone(),
        )
        .run(),
    );

    wait_until(|| !network.lookups().is_empty()).await;

    shutdown.cancel();

    // Well inside the dial timeout, so only cancellation can end the session.
    let report = timeout(Duration::from_secs(1), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(report.connected.is_empty());
    assert!(network.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_peer_does_not_hold_up_others() {
    let network = MemoryNetwork::new();
    let stalled = network.node();
    let responder = network.node();
    let initiator = network.node();
    let key = RendezvousKey::derive("meet me here");

    let _stalled_incoming = stalled.on_stream(PING_PROTOCOL).unwrap();
    stalled.provide(&key).await.unwrap();
    network.stall_streams(stalled.local_peer_id());

    let mut incoming = responder.on_stream(PING_PROTOCOL).unwrap();
    responder.provide(&key).await.unwrap();

    let shutdown = CancellationToken::new();
    let session = tokio::spawn(
        Session::new(
            initiator.clone(),
            config(&network, "meet me here", Mode::Initiator),
            shutdown.clone(),
        )
        .run(),
    );

    let (peer, stream) = timeout(Duration::from_secs(5), incoming.next())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(peer, initiator.local_peer_id());

    let mut framed = Framed::new(stream, PingCodec::new());

    assert_eq!(framed.next().await.unwrap().unwrap(), PING);

    shutdown.cancel();

    let report = session.await.unwrap().unwrap();

    assert_eq!(report.connected, vec![responder.local_peer_id()]);
}
