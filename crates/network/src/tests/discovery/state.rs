use super::*;

#[test]
fn test_addrs_of_unknown_peer_is_empty() {
    let state = DiscoveryState::default();

    assert!(state.addrs_of(&PeerId::random()).is_empty());
}

#[test]
fn test_add_peer_addr_strips_peer_id() {
    let mut state = DiscoveryState::default();
    let peer_id = PeerId::random();
    let addr: Multiaddr = "/ip4/10.0.0.1/tcp/4001".parse().unwrap();
    let with_peer = addr.clone().with(Protocol::P2p(peer_id));

    state.add_peer_addr(peer_id, &with_peer, PeerDiscoveryMechanism::Identify);
    state.add_peer_addr(peer_id, &addr, PeerDiscoveryMechanism::Connection);

    assert_eq!(state.addrs_of(&peer_id), vec![addr]);
}

#[test]
fn test_addrs_of_orders_quic_first() {
    let mut state = DiscoveryState::default();
    let peer_id = PeerId::random();
    let tcp_addr_1: Multiaddr = "/ip4/10.0.0.1/tcp/4001".parse().unwrap();
    let tcp_addr_2: Multiaddr = "/ip4/10.0.0.1/tcp/4002".parse().unwrap();
    let quic_addr: Multiaddr = "/ip4/10.0.0.1/udp/4001/quic-v1".parse().unwrap();

    state.add_peer_addr(peer_id, &tcp_addr_2, PeerDiscoveryMechanism::Kad);
    state.add_peer_addr(peer_id, &tcp_addr_1, PeerDiscoveryMechanism::Kad);
    assert_eq!(
        state.addrs_of(&peer_id),
        vec![tcp_addr_1.clone(), tcp_addr_2.clone()]
    );

    state.add_peer_addr(peer_id, &quic_addr, PeerDiscoveryMechanism::Kad);
    assert_eq!(
        state.addrs_of(&peer_id),
        vec![quic_addr, tcp_addr_1, tcp_addr_2]
    );
}

#[test]
fn test_remove_last_addr_forgets_peer() {
    let mut state = DiscoveryState::default();
    let peer_id = PeerId::random();
    let addr_1: Multiaddr = "/ip4/192.168.1.5/tcp/2428".parse().unwrap();
    let addr_2: Multiaddr = "/ip4/192.168.1.5/udp/2428/quic-v1".parse().unwrap();

    state.add_peer_addr(peer_id, &addr_1, PeerDiscoveryMechanism::Mdns);
    state.add_peer_addr(peer_id, &addr_2, PeerDiscoveryMechanism::Mdns);

    state.remove_peer_addr(&peer_id, &addr_2);
    assert_eq!(state.addrs_of(&peer_id), vec![addr_1.clone()]);

    state.remove_peer_addr(&peer_id, &addr_1);
    assert!(state.get_peer_info(&peer_id).is_none());
}
