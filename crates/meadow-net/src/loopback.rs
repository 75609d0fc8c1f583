//! In-process room transport.
//!
//! A [`LoopbackHub`] plays the part of the hosted realtime service: any
//! number of [`LoopbackChannel`]s connect to it, track presence, and
//! broadcast to each other without a network. The hub also exposes fault
//! injection (going offline, dropping a client) so reconnect handling can be
//! exercised deterministically.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::channel::{ChannelError, ChannelEvent, EventSink, PeerChannel, PresenceEntry};
use crate::snapshot::PeerId;

#[derive(Debug)]
struct Member {
    sink: EventSink,
    presence: Option<Vec<u8>>,
    presence_subscribed: bool,
    events: FxHashSet<String>,
}

#[derive(Debug, Default)]
struct Room {
    members: BTreeMap<PeerId, Member>,
}

impl Room {
    fn presence_set(&self) -> Vec<PresenceEntry> {
        self.members
            .iter()
            .filter_map(|(peer, m)| {
                m.presence.as_ref().map(|meta| PresenceEntry {
                    peer: peer.clone(),
                    meta: meta.clone(),
                })
            })
            .collect()
    }

    /// Sends the current presence set to every presence subscriber.
    fn sync_presence(&mut self) {
        let peers = self.presence_set();
        self.members.retain(|_, m| {
            !m.presence_subscribed
                || m.sink
                    .send(ChannelEvent::PresenceSync {
                        peers: peers.clone(),
                    })
                    .is_ok()
        });
    }
}

#[derive(Debug, Default)]
struct HubState {
    rooms: FxHashMap<String, Room>,
    offline: bool,
}

/// Shared in-memory realtime service. Cloning yields another handle to the
/// same hub.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    /// Create an empty, online hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel for `peer` bound to this hub.
    pub fn channel(&self, peer: PeerId) -> LoopbackChannel {
        LoopbackChannel {
            hub: self.clone(),
            id: peer,
            room: None,
        }
    }

    /// While offline, connect attempts are rejected.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Simulate the service dropping `peer`: it receives
    /// [`ChannelEvent::Closed`] and disappears from its room.
    pub fn drop_peer(&self, peer: &PeerId) {
        let mut state = self.lock();
        for room in state.rooms.values_mut() {
            if let Some(member) = room.members.remove(peer) {
                let _ = member.sink.send(ChannelEvent::Closed);
                room.sync_presence();
            }
        }
    }

    /// Peers currently connected to `room_id`.
    pub fn members(&self, room_id: &str) -> Vec<PeerId> {
        self.lock()
            .rooms
            .get(room_id)
            .map(|room| room.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One client's handle onto a [`LoopbackHub`].
#[derive(Debug)]
pub struct LoopbackChannel {
    hub: LoopbackHub,
    id: PeerId,
    room: Option<String>,
}

impl LoopbackChannel {
    /// Runs `f` on this client's membership, failing if it is gone.
    fn with_member<T>(
        &mut self,
        f: impl FnOnce(&mut Room, &PeerId) -> T,
    ) -> Result<T, ChannelError> {
        let room_id = self.room.as_ref().ok_or(ChannelError::NotConnected)?;
        let mut state = self.hub.lock();
        let Some(room) = state.rooms.get_mut(room_id) else {
            self.room = None;
            return Err(ChannelError::Closed);
        };
        if !room.members.contains_key(&self.id) {
            self.room = None;
            return Err(ChannelError::Closed);
        }
        Ok(f(room, &self.id))
    }
}

impl PeerChannel for LoopbackChannel {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    fn connect(&mut self, room_id: &str, sink: EventSink) -> Result<(), ChannelError> {
        let mut state = self.hub.lock();
        if state.offline {
            return Err(ChannelError::Rejected("service unavailable".to_string()));
        }
        let room = state.rooms.entry(room_id.to_string()).or_default();
        if self.room.as_deref() == Some(room_id) && room.members.contains_key(&self.id) {
            return Ok(());
        }
        room.members.insert(
            self.id.clone(),
            Member {
                sink,
                presence: None,
                presence_subscribed: false,
                events: FxHashSet::default(),
            },
        );
        self.room = Some(room_id.to_string());
        Ok(())
    }

    fn subscribe_presence(&mut self) -> Result<(), ChannelError> {
        self.with_member(|room, id| {
            let peers = room.presence_set();
            if let Some(member) = room.members.get_mut(id) {
                member.presence_subscribed = true;
                let _ = member.sink.send(ChannelEvent::PresenceSync { peers });
            }
        })
    }

    fn subscribe_broadcast(&mut self, event: &str) -> Result<(), ChannelError> {
        self.with_member(|room, id| {
            if let Some(member) = room.members.get_mut(id) {
                member.events.insert(event.to_string());
            }
        })
    }

    fn send(&mut self, event: &str, payload: &[u8]) -> Result<(), ChannelError> {
        self.with_member(|room, id| {
            for (peer, member) in room.members.iter() {
                if peer == id || !member.events.contains(event) {
                    continue;
                }
                let _ = member.sink.send(ChannelEvent::Broadcast {
                    from: id.clone(),
                    event: event.to_string(),
                    payload: payload.to_vec(),
                });
            }
        })
    }

    fn track(&mut self, meta: &[u8]) -> Result<(), ChannelError> {
        self.with_member(|room, id| {
            if let Some(member) = room.members.get_mut(id) {
                member.presence = Some(meta.to_vec());
            }
            room.sync_presence();
        })
    }

    fn close(&mut self) {
        let Some(room_id) = self.room.take() else {
            return;
        };
        let mut state = self.hub.lock();
        if let Some(room) = state.rooms.get_mut(&room_id)
            && room.members.remove(&self.id).is_some()
        {
            room.sync_presence();
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{Receiver, unbounded};

    use super::*;

    fn joined(hub: &LoopbackHub, name: &str) -> (LoopbackChannel, Receiver<ChannelEvent>) {
        let (tx, rx) = unbounded();
        let mut channel = hub.channel(PeerId::new(name));
        channel.connect("glade", tx).unwrap();
        channel.subscribe_presence().unwrap();
        channel.subscribe_broadcast("ping").unwrap();
        channel.track(name.as_bytes()).unwrap();
        (channel, rx)
    }

    fn last_presence(rx: &Receiver<ChannelEvent>) -> Vec<PeerId> {
        rx.try_iter()
            .filter_map(|e| match e {
                ChannelEvent::PresenceSync { peers } => {
                    Some(peers.into_iter().map(|p| p.peer).collect::<Vec<_>>())
                }
                _ => None,
            })
            .last()
            .unwrap_or_default()
    }

    #[test]
    fn test_broadcast_reaches_others_only() {
        let hub = LoopbackHub::new();
        let (mut a, rx_a) = joined(&hub, "a");
        let (_b, rx_b) = joined(&hub, "b");
        rx_a.try_iter().count();

        a.send("ping", &[7]).unwrap();

        let got: Vec<_> = rx_b
            .try_iter()
            .filter(|e| matches!(e, ChannelEvent::Broadcast { .. }))
            .collect();
        assert_eq!(
            got,
            vec![ChannelEvent::Broadcast {
                from: PeerId::new("a"),
                event: "ping".to_string(),
                payload: vec![7],
            }]
        );
        assert_eq!(rx_a.try_iter().count(), 0, "sender must not hear itself");
    }

    #[test]
    fn test_presence_sync_tracks_membership() {
        let hub = LoopbackHub::new();
        let (_a, rx_a) = joined(&hub, "a");
        let (mut b, _rx_b) = joined(&hub, "b");
        assert_eq!(last_presence(&rx_a), vec![PeerId::new("a"), PeerId::new("b")]);

        b.close();
        assert_eq!(last_presence(&rx_a), vec![PeerId::new("a")]);
    }

    #[test]
    fn test_offline_hub_rejects_connect() {
        let hub = LoopbackHub::new();
        hub.set_offline(true);
        let (tx, _rx) = unbounded();
        let mut channel = hub.channel(PeerId::new("a"));
        assert!(matches!(
            channel.connect("glade", tx),
            Err(ChannelError::Rejected(_))
        ));
    }

    #[test]
    fn test_dropped_peer_gets_closed_and_send_fails() {
        let hub = LoopbackHub::new();
        let (mut a, rx_a) = joined(&hub, "a");
        hub.drop_peer(&PeerId::new("a"));

        assert!(rx_a.try_iter().any(|e| e == ChannelEvent::Closed));
        assert_eq!(a.send("ping", &[]), Err(ChannelError::Closed));
        assert_eq!(a.send("ping", &[]), Err(ChannelError::NotConnected));
    }

    #[test]
    fn test_connect_twice_keeps_one_membership() {
        let hub = LoopbackHub::new();
        let (mut a, _rx) = joined(&hub, "a");
        let (tx, _rx2) = unbounded();
        a.connect("glade", tx).unwrap();
        assert_eq!(hub.members("glade"), vec![PeerId::new("a")]);
    }
}
