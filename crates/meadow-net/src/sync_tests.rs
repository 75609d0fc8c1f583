//! Unit tests for room synchronization driven over the loopback transport.

use std::time::Duration;

use crossbeam_channel::unbounded;
use glam::Vec3;

use crate::channel::PeerChannel;
use crate::loopback::LoopbackHub;
use crate::messages::STATE_EVENT;
use crate::snapshot::{AnimState, EntitySnapshot, PeerId};
use crate::sync::{ConnectionState, LeaveReason, NetEvent, NetworkSync, SyncConfig};

fn ms(t: u64) -> Duration {
    Duration::from_millis(t)
}

fn client(hub: &LoopbackHub, id: &str, name: &str) -> NetworkSync {
    let config = SyncConfig {
        display_name: name.to_string(),
        ..SyncConfig::default()
    };
    NetworkSync::new(config, Box::new(hub.channel(PeerId::new(id))))
}

fn joins(events: &[NetEvent]) -> Vec<PeerId> {
    events
        .iter()
        .filter_map(|e| match e {
            NetEvent::PeerJoined { peer, .. } => Some(peer.clone()),
            _ => None,
        })
        .collect()
}

fn leaves(events: &[NetEvent]) -> Vec<(PeerId, LeaveReason)> {
    events
        .iter()
        .filter_map(|e| match e {
            NetEvent::PeerLeft { peer, reason } => Some((peer.clone(), *reason)),
            _ => None,
        })
        .collect()
}

fn snapshot_at(id: &str, sent_at_ms: u64, x: f32) -> EntitySnapshot {
    EntitySnapshot::new(
        PeerId::new(id),
        Vec3::new(x, 0.0, 0.0),
        0.0,
        AnimState::Walk,
        sent_at_ms,
    )
}

#[test]
fn test_connect_is_idempotent() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");

    a.connect(ms(0));
    a.connect(ms(10));

    assert_eq!(a.connection_state(), ConnectionState::Connected);
    assert_eq!(hub.members(&a.config().room_id), vec![PeerId::new("a")]);
    let connected = a
        .drain_events()
        .into_iter()
        .filter(|e| *e == NetEvent::ConnectionChanged(ConnectionState::Connected))
        .count();
    assert_eq!(connected, 1);
}

#[test]
fn test_presence_join_and_leave_fire_once() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    let mut b = client(&hub, "b", "Birch");
    a.connect(ms(0));
    b.connect(ms(0));

    a.poll(ms(16));
    let events = a.drain_events();
    assert_eq!(joins(&events), vec![PeerId::new("b")]);
    assert!(events.contains(&NetEvent::PeerJoined {
        peer: PeerId::new("b"),
        display_name: Some("Birch".to_string()),
    }));
    assert_eq!(a.display_name(&PeerId::new("b")), Some("Birch"));

    a.poll(ms(32));
    assert!(joins(&a.drain_events()).is_empty(), "no repeat join");

    b.disconnect();
    a.poll(ms(48));
    a.poll(ms(64));
    assert_eq!(
        leaves(&a.drain_events()),
        vec![(PeerId::new("b"), LeaveReason::Presence)]
    );
    assert!(!a.has_peer(&PeerId::new("b")));
}

#[test]
fn test_first_broadcast_is_implicit_join() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");

    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 0, 1.0), ms(0));
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 100, 2.0), ms(100));

    let events = a.drain_events();
    assert_eq!(joins(&events), vec![PeerId::new("c")]);
    assert_eq!(a.peer_count(), 1);
}

#[test]
fn test_own_broadcast_ignored() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.ingest_broadcast(PeerId::new("a"), snapshot_at("a", 0, 1.0), ms(0));
    assert_eq!(a.peer_count(), 0);
    assert!(a.drain_events().is_empty());
}

#[test]
fn test_broadcast_throttled_to_interval() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    let mut b = client(&hub, "b", "Birch");
    a.connect(ms(0));
    b.connect(ms(0));

    let mut sent = 0;
    for t in (0..1_000).step_by(10) {
        if a.broadcast_local_state(ms(t), Vec3::ZERO, 0.0, AnimState::Idle) {
            sent += 1;
        }
    }
    assert_eq!(sent, 10, "one send per 100 ms window");

    b.poll(ms(1_000));
    let buffered = b.query_peer(&PeerId::new("a"), ms(1_000));
    assert!(buffered.is_some(), "receiver buffered the broadcasts");
}

#[test]
fn test_broadcast_requires_connection() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    assert!(!a.broadcast_local_state(ms(0), Vec3::ZERO, 0.0, AnimState::Idle));
}

#[test]
fn test_silent_peer_culled_exactly_once() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 0, 1.0), ms(0));
    a.drain_events();

    assert!(a.cull_stale_peers(ms(10_000)).is_empty(), "not yet past timeout");
    assert_eq!(a.cull_stale_peers(ms(10_001)), vec![PeerId::new("c")]);
    assert!(a.cull_stale_peers(ms(20_000)).is_empty());

    assert_eq!(
        leaves(&a.drain_events()),
        vec![(PeerId::new("c"), LeaveReason::Timeout)]
    );
    assert!(a.query_peer(&PeerId::new("c"), ms(20_000)).is_none());
    assert!(a.interpolated_peers(ms(20_000)).is_empty());
}

#[test]
fn test_remote_motion_interpolated_at_render_time() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    let mut b = client(&hub, "b", "Birch");
    a.connect(ms(0));
    b.connect(ms(0));

    a.broadcast_local_state(ms(0), Vec3::new(0.0, 0.0, 0.0), 0.0, AnimState::Walk);
    b.poll(ms(0));
    a.broadcast_local_state(ms(100), Vec3::new(10.0, 0.0, 0.0), 0.5, AnimState::Run);
    b.poll(ms(100));

    // Default delay is 100 ms, so now=150 samples t=50.
    let seen = b.query_peer(&PeerId::new("a"), ms(150)).unwrap();
    assert!(
        (seen.position.x - 5.0).abs() < 1e-4,
        "expected x=5, got {}",
        seen.position.x
    );
    assert_eq!(seen.anim, AnimState::Run);

    let all = b.interpolated_peers(ms(150));
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, PeerId::new("a"));
}

#[test]
fn test_packets_drained_together_keep_sender_spacing() {
    let hub = LoopbackHub::new();
    let config = SyncConfig {
        interpolation_delay: ms(200),
        ..SyncConfig::default()
    };
    let mut a = NetworkSync::new(config, Box::new(hub.channel(PeerId::new("a"))));
    let c = PeerId::new("c");

    // Sent at 0, 100 and 200; the last two arrive in the same tick.
    a.ingest_broadcast(c.clone(), snapshot_at("c", 0, 0.0), ms(10));
    a.ingest_broadcast(c.clone(), snapshot_at("c", 100, 10.0), ms(215));
    a.ingest_broadcast(c.clone(), snapshot_at("c", 200, 20.0), ms(215));

    let at = |now: u64| a.query_peer(&c, ms(now)).unwrap().position.x;
    assert!((at(260) - 5.0).abs() < 1e-4, "got {}", at(260));
    assert!((at(310) - 10.0).abs() < 1e-4, "middle sample shown: {}", at(310));
    assert!((at(360) - 15.0).abs() < 1e-4, "got {}", at(360));

    let mut prev = at(215);
    for now in 216..=420 {
        let x = at(now);
        assert!(x - prev <= 0.11, "jump of {} at t={now}", x - prev);
        prev = x;
    }
    assert_eq!(prev, 20.0);
}

#[test]
fn test_silence_measured_by_receive_time() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    let timeout = a.config().peer_timeout.as_millis() as u64;
    // Sender clock far behind ours: stamps map forward, culling does not care.
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 5, 1.0), ms(1_000));
    assert!(a.cull_stale_peers(ms(1_000 + timeout)).is_empty());
    assert_eq!(
        a.cull_stale_peers(ms(1_001 + timeout)),
        vec![PeerId::new("c")]
    );
}

#[test]
fn test_out_of_order_packet_dropped() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 200, 2.0), ms(0));
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 100, 1.0), ms(50));

    let seen = a.query_peer(&PeerId::new("c"), ms(10_000)).unwrap();
    assert_eq!(seen.position.x, 2.0, "stale packet must not overwrite");
    assert_eq!(seen.timestamp_ms, 0, "mapped onto the local clock");
}

#[test]
fn test_malformed_payload_dropped() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.connect(ms(0));

    let (tx, _rx) = unbounded();
    let mut raw = hub.channel(PeerId::new("mallory"));
    raw.connect(&a.config().room_id, tx).unwrap();
    raw.send(STATE_EVENT, &[0xFF, 0x00, 0x01]).unwrap();

    a.poll(ms(16));
    assert_eq!(a.peer_count(), 0);
}

#[test]
fn test_transport_drop_reconnects_after_fixed_delay() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.connect(ms(0));
    a.drain_events();

    hub.drop_peer(&PeerId::new("a"));
    a.poll(ms(1_000));
    assert_eq!(a.connection_state(), ConnectionState::Reconnecting);

    a.poll(ms(2_999));
    assert_eq!(a.connection_state(), ConnectionState::Reconnecting);

    a.poll(ms(3_000));
    assert_eq!(a.connection_state(), ConnectionState::Connected);
    assert_eq!(
        a.drain_events(),
        vec![
            NetEvent::ConnectionChanged(ConnectionState::Reconnecting),
            NetEvent::ConnectionChanged(ConnectionState::Connected),
        ]
    );
}

#[test]
fn test_failed_reconnect_reschedules() {
    let hub = LoopbackHub::new();
    hub.set_offline(true);
    let mut a = client(&hub, "a", "Ash");

    a.connect(ms(0));
    assert_eq!(a.connection_state(), ConnectionState::Reconnecting);

    a.poll(ms(2_000));
    assert_eq!(
        a.connection_state(),
        ConnectionState::Reconnecting,
        "attempt while offline fails"
    );

    hub.set_offline(false);
    a.poll(ms(3_000));
    assert_eq!(a.connection_state(), ConnectionState::Reconnecting);
    a.poll(ms(4_000));
    assert_eq!(a.connection_state(), ConnectionState::Connected);
}

#[test]
fn test_transport_fault_keeps_peers_until_culled() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.connect(ms(0));
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 0, 1.0), ms(0));

    hub.drop_peer(&PeerId::new("a"));
    a.poll(ms(100));
    assert!(a.has_peer(&PeerId::new("c")), "solo play keeps last known peers");
}

#[test]
fn test_disconnect_clears_peers_and_ignores_faults() {
    let hub = LoopbackHub::new();
    let mut a = client(&hub, "a", "Ash");
    a.connect(ms(0));
    a.ingest_broadcast(PeerId::new("c"), snapshot_at("c", 0, 1.0), ms(0));
    a.ingest_broadcast(PeerId::new("d"), snapshot_at("d", 0, 1.0), ms(0));
    a.drain_events();

    a.disconnect();
    assert_eq!(
        leaves(&a.drain_events()),
        vec![
            (PeerId::new("c"), LeaveReason::Disconnect),
            (PeerId::new("d"), LeaveReason::Disconnect),
        ]
    );

    a.poll(ms(10_000));
    assert_eq!(a.connection_state(), ConnectionState::Disconnected);
}
