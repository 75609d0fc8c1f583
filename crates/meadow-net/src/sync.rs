//! Room-level state synchronization for remote avatars.
//!
//! [`NetworkSync`] owns the single room subscription, a [`StateBuffer`] per
//! remote peer, the outbound broadcast throttle, stale-peer culling, and the
//! reconnect timer. It is driven from the frame loop with the simulation
//! clock (`now`, time since simulation start) and never blocks: inbound
//! transport events are queued by the channel and drained in [`poll`].
//!
//! [`poll`]: NetworkSync::poll

use std::collections::hash_map::Entry;
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use glam::Vec3;
use meadow_config::NetworkConfig;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace, warn};

use crate::buffer::StateBuffer;
use crate::channel::{ChannelError, ChannelEvent, PeerChannel, PresenceEntry};
use crate::messages::{
    Message, PlayerState, Presence, STATE_EVENT, deserialize_message, serialize_message,
};
use crate::reconnection::{ReconnectConfig, ReconnectSchedule};
use crate::snapshot::{AnimState, EntitySnapshot, PeerId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing and identity settings for [`NetworkSync`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Shared room every client subscribes to.
    pub room_id: String,
    /// Name published through presence.
    pub display_name: String,
    /// Minimum spacing between outbound broadcasts.
    pub broadcast_interval: Duration,
    /// Offset subtracted from "now" when sampling peer buffers.
    pub interpolation_delay: Duration,
    /// Snapshots retained per peer.
    pub buffer_capacity: usize,
    /// Silence after which a peer is culled.
    pub peer_timeout: Duration,
    /// Reconnect timer settings.
    pub reconnect: ReconnectConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

impl From<&NetworkConfig> for SyncConfig {
    fn from(net: &NetworkConfig) -> Self {
        Self {
            room_id: net.room_id.clone(),
            display_name: net.display_name.clone(),
            broadcast_interval: Duration::from_millis(net.broadcast_interval_ms),
            interpolation_delay: Duration::from_millis(net.interpolation_delay_ms),
            buffer_capacity: net.buffer_capacity,
            peer_timeout: Duration::from_millis(net.peer_timeout_ms),
            reconnect: ReconnectConfig {
                delay: Duration::from_millis(net.reconnect_delay_ms),
                jitter: net.reconnect_jitter,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Admits at most one send per interval; calls inside the window are
/// dropped, never queued.
#[derive(Debug, Clone)]
pub struct BroadcastThrottle {
    interval: Duration,
    last_sent: Option<Duration>,
}

impl BroadcastThrottle {
    /// Create a throttle that has never sent.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Returns `true` and records `now` if a send is allowed.
    pub fn try_acquire(&mut self, now: Duration) -> bool {
        let open = self
            .last_sent
            .is_none_or(|last| now.saturating_sub(last) >= self.interval);
        if open {
            self.last_sent = Some(now);
        }
        open
    }
}

// ---------------------------------------------------------------------------
// State & events
// ---------------------------------------------------------------------------

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or intentionally disconnected.
    Disconnected,
    /// Room subscription is open.
    Connected,
    /// A fault occurred; a reconnect attempt is scheduled.
    Reconnecting,
}

/// Why a peer was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// It disappeared from the room's presence set.
    Presence,
    /// Nothing was heard from it within the timeout.
    Timeout,
    /// The local client disconnected.
    Disconnect,
}

/// Notification produced by [`NetworkSync`], drained once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// A peer appeared (via presence or its first broadcast).
    PeerJoined {
        /// The new peer.
        peer: PeerId,
        /// Name from its presence metadata, if known.
        display_name: Option<String>,
    },
    /// A peer and its buffer were removed.
    PeerLeft {
        /// The departed peer.
        peer: PeerId,
        /// What removed it.
        reason: LeaveReason,
    },
    /// The connection state changed.
    ConnectionChanged(ConnectionState),
}

#[derive(Debug)]
struct RemotePeer {
    buffer: StateBuffer,
    display_name: Option<String>,
    last_heard_ms: u64,
    last_sent_at_ms: Option<u64>,
    clock_offset_ms: Option<i64>,
}

impl RemotePeer {
    fn new(capacity: usize, display_name: Option<String>, now_ms: u64) -> Self {
        Self {
            buffer: StateBuffer::new(capacity),
            display_name,
            last_heard_ms: now_ms,
            last_sent_at_ms: None,
            clock_offset_ms: None,
        }
    }

    /// Map a sender timestamp onto the local clock.
    ///
    /// The offset is the smallest `received - sent` seen so far, so the
    /// least-delayed packet defines the mapping and later packets keep the
    /// sender's spacing. The result never precedes the newest stored stamp.
    fn local_stamp(&mut self, sent_at_ms: u64, now_ms: u64) -> u64 {
        let sent = i64::try_from(sent_at_ms).unwrap_or(i64::MAX);
        let recv = i64::try_from(now_ms).unwrap_or(i64::MAX);
        let sample = recv.saturating_sub(sent);
        let offset = self.clock_offset_ms.map_or(sample, |o| o.min(sample));
        self.clock_offset_ms = Some(offset);
        let stamp = u64::try_from(sent.saturating_add(offset).max(0)).unwrap_or(0);
        match self.buffer.newest() {
            Some(newest) => stamp.max(newest.timestamp_ms),
            None => stamp,
        }
    }
}

fn as_millis(t: Duration) -> u64 {
    u64::try_from(t.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// NetworkSync
// ---------------------------------------------------------------------------

/// Owner of the room subscription and every remote peer's state buffer.
pub struct NetworkSync {
    config: SyncConfig,
    channel: Box<dyn PeerChannel>,
    state: ConnectionState,
    inbox: Option<Receiver<ChannelEvent>>,
    peers: FxHashMap<PeerId, RemotePeer>,
    presence: FxHashSet<PeerId>,
    throttle: BroadcastThrottle,
    reconnect: ReconnectSchedule,
    events: Vec<NetEvent>,
    wanted: bool,
}

impl NetworkSync {
    /// Wrap `channel`; nothing is opened until [`NetworkSync::connect`].
    pub fn new(config: SyncConfig, channel: Box<dyn PeerChannel>) -> Self {
        let throttle = BroadcastThrottle::new(config.broadcast_interval);
        let reconnect = ReconnectSchedule::new(config.reconnect.clone());
        Self {
            config,
            channel,
            state: ConnectionState::Disconnected,
            inbox: None,
            peers: FxHashMap::default(),
            presence: FxHashSet::default(),
            throttle,
            reconnect,
            events: Vec::new(),
            wanted: false,
        }
    }

    /// Identifier of the local client in the room.
    pub fn local_id(&self) -> &PeerId {
        self.channel.local_id()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Settings this instance runs with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Open the room subscription. No-op while connected.
    ///
    /// Failure is not returned: it arms the reconnect timer and the local
    /// simulation carries on solo.
    pub fn connect(&mut self, now: Duration) {
        if self.state == ConnectionState::Connected {
            return;
        }
        self.wanted = true;
        match self.open_subscription() {
            Ok(()) => {
                info!(
                    room = %self.config.room_id,
                    peer = %self.channel.local_id(),
                    "Joined room"
                );
                self.reconnect.cancel();
                self.set_state(ConnectionState::Connected);
            }
            Err(e) => self.handle_fault(now, &e.to_string()),
        }
    }

    fn open_subscription(&mut self) -> Result<(), ChannelError> {
        let (sink, inbox) = unbounded();
        self.inbox = Some(inbox);
        self.channel.connect(&self.config.room_id, sink)?;
        self.channel.subscribe_presence()?;
        self.channel.subscribe_broadcast(STATE_EVENT)?;

        let presence = Message::Presence(Presence {
            display_name: self.config.display_name.clone(),
        });
        let meta = serialize_message(&presence)
            .map_err(|e| ChannelError::Rejected(format!("presence encoding: {e}")))?;
        self.channel.track(&meta)
    }

    /// Close the subscription, forget every peer, and cancel any pending
    /// reconnect.
    pub fn disconnect(&mut self) {
        self.wanted = false;
        self.channel.close();
        self.inbox = None;
        self.reconnect.cancel();
        self.presence.clear();
        let mut gone: Vec<PeerId> = self.peers.drain().map(|(id, _)| id).collect();
        gone.sort();
        for peer in gone {
            self.events.push(NetEvent::PeerLeft {
                peer,
                reason: LeaveReason::Disconnect,
            });
        }
        if self.state != ConnectionState::Disconnected {
            info!(room = %self.config.room_id, "Left room");
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Drain queued transport events and fire a due reconnect attempt.
    pub fn poll(&mut self, now: Duration) {
        let pending: Vec<ChannelEvent> = self
            .inbox
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default();

        for event in pending {
            match event {
                ChannelEvent::PresenceSync { peers } => self.apply_presence(peers, now),
                ChannelEvent::Broadcast {
                    from,
                    event,
                    payload,
                } => self.handle_broadcast(from, &event, &payload, now),
                ChannelEvent::Closed => self.handle_fault(now, "channel closed"),
                ChannelEvent::Error(reason) => self.handle_fault(now, &reason),
            }
        }

        if self.reconnect.take_due(now) {
            info!(attempt = self.reconnect.attempts(), "Reconnecting to room");
            self.connect(now);
        }
    }

    fn handle_fault(&mut self, now: Duration, reason: &str) {
        if !self.wanted {
            debug!(reason, "Ignoring transport fault while disconnected");
            return;
        }
        self.schedule_reconnect(now, reason);
    }

    fn schedule_reconnect(&mut self, now: Duration, reason: &str) {
        self.channel.close();
        let due = self.reconnect.schedule(now);
        warn!(
            reason,
            retry_in_ms = as_millis(due.saturating_sub(now)),
            "Room transport fault"
        );
        self.set_state(ConnectionState::Reconnecting);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.events.push(NetEvent::ConnectionChanged(state));
        }
    }

    fn apply_presence(&mut self, entries: Vec<PresenceEntry>, now: Duration) {
        let local = self.channel.local_id().clone();
        let mut names: FxHashMap<PeerId, Option<String>> = FxHashMap::default();
        for entry in entries {
            if entry.peer == local {
                continue;
            }
            let name = match deserialize_message(&entry.meta) {
                Ok(Message::Presence(p)) => Some(p.display_name),
                _ => None,
            };
            names.insert(entry.peer, name);
        }
        let current: FxHashSet<PeerId> = names.keys().cloned().collect();

        let mut joined: Vec<PeerId> = current.difference(&self.presence).cloned().collect();
        let mut left: Vec<PeerId> = self.presence.difference(&current).cloned().collect();
        joined.sort();
        left.sort();

        let now_ms = as_millis(now);
        for peer in joined {
            let display_name = names.remove(&peer).flatten();
            match self.peers.entry(peer.clone()) {
                Entry::Occupied(mut e) => e.get_mut().display_name = display_name,
                Entry::Vacant(v) => {
                    info!(%peer, "Peer joined");
                    v.insert(RemotePeer::new(
                        self.config.buffer_capacity,
                        display_name.clone(),
                        now_ms,
                    ));
                    self.events.push(NetEvent::PeerJoined { peer, display_name });
                }
            }
        }
        for peer in left {
            if self.peers.remove(&peer).is_some() {
                info!(%peer, "Peer left");
                self.events.push(NetEvent::PeerLeft {
                    peer,
                    reason: LeaveReason::Presence,
                });
            }
        }
        self.presence = current;
    }

    fn handle_broadcast(&mut self, from: PeerId, event: &str, payload: &[u8], now: Duration) {
        if event != STATE_EVENT {
            trace!(event, "Ignoring unknown broadcast");
            return;
        }
        match deserialize_message(payload) {
            Ok(Message::PlayerState(state)) => {
                let snapshot = EntitySnapshot::new(
                    from.clone(),
                    state.position,
                    state.facing,
                    state.anim,
                    state.sent_at_ms,
                );
                self.ingest_broadcast(from, snapshot, now);
            }
            Ok(other) => debug!(peer = %from, ?other, "Unexpected payload on state event"),
            Err(e) => debug!(peer = %from, error = %e, "Dropping malformed state payload"),
        }
    }

    /// Append a peer's snapshot to its buffer, creating the peer on first
    /// contact.
    ///
    /// `snapshot.timestamp_ms` is the sender's clock. Anything older than the
    /// newest already seen is dropped. The stored copy is re-stamped onto the
    /// local clock through a per-peer offset, so packets drained together
    /// keep the spacing they were sent with. Culling uses the receive time.
    pub fn ingest_broadcast(&mut self, peer: PeerId, snapshot: EntitySnapshot, now: Duration) {
        if &peer == self.channel.local_id() {
            return;
        }
        let now_ms = as_millis(now);
        let remote = match self.peers.entry(peer.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                info!(%peer, "Peer joined (first broadcast)");
                self.events.push(NetEvent::PeerJoined {
                    peer: peer.clone(),
                    display_name: None,
                });
                v.insert(RemotePeer::new(self.config.buffer_capacity, None, now_ms))
            }
        };

        if remote
            .last_sent_at_ms
            .is_some_and(|last| snapshot.timestamp_ms < last)
        {
            debug!(%peer, sent_at = snapshot.timestamp_ms, "Dropping out-of-order snapshot");
            return;
        }
        remote.last_sent_at_ms = Some(snapshot.timestamp_ms);
        remote.last_heard_ms = now_ms;
        let timestamp_ms = remote.local_stamp(snapshot.timestamp_ms, now_ms);
        remote.buffer.push(EntitySnapshot {
            id: peer,
            timestamp_ms,
            ..snapshot
        });
    }

    /// Broadcast the local avatar state if the throttle allows it.
    ///
    /// Returns `true` if a message was handed to the transport.
    pub fn broadcast_local_state(
        &mut self,
        now: Duration,
        position: Vec3,
        facing: f32,
        anim: AnimState,
    ) -> bool {
        if self.state != ConnectionState::Connected || !self.throttle.try_acquire(now) {
            return false;
        }
        let msg = Message::PlayerState(PlayerState {
            position,
            facing,
            anim,
            sent_at_ms: as_millis(now),
        });
        let bytes = match serialize_message(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode local state");
                return false;
            }
        };
        match self.channel.send(STATE_EVENT, &bytes) {
            Ok(()) => true,
            Err(e) => {
                self.handle_fault(now, &e.to_string());
                false
            }
        }
    }

    /// Remove every peer not heard from within the timeout.
    ///
    /// Returns the culled peers; each also produces one
    /// [`NetEvent::PeerLeft`].
    pub fn cull_stale_peers(&mut self, now: Duration) -> Vec<PeerId> {
        let now_ms = as_millis(now);
        let timeout_ms = as_millis(self.config.peer_timeout);
        let mut stale: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, p)| now_ms.saturating_sub(p.last_heard_ms) > timeout_ms)
            .map(|(id, _)| id.clone())
            .collect();
        stale.sort();
        for peer in &stale {
            self.peers.remove(peer);
            info!(%peer, "Culled silent peer");
            self.events.push(NetEvent::PeerLeft {
                peer: peer.clone(),
                reason: LeaveReason::Timeout,
            });
        }
        stale
    }

    /// Interpolated state of one peer at `now - interpolation_delay`.
    pub fn query_peer(&self, peer: &PeerId, now: Duration) -> Option<EntitySnapshot> {
        let render_ms = as_millis(now.saturating_sub(self.config.interpolation_delay));
        self.peers.get(peer)?.buffer.query(render_ms)
    }

    /// Interpolated state of every visible peer, ordered by id.
    pub fn interpolated_peers(&self, now: Duration) -> Vec<EntitySnapshot> {
        let render_ms = as_millis(now.saturating_sub(self.config.interpolation_delay));
        let mut out: Vec<EntitySnapshot> = self
            .peers
            .values()
            .filter_map(|p| p.buffer.query(render_ms))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Presence name of `peer`, if it published one.
    pub fn display_name(&self, peer: &PeerId) -> Option<&str> {
        self.peers.get(peer)?.display_name.as_deref()
    }

    /// Returns `true` if `peer` has a registry entry.
    pub fn has_peer(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    /// Number of known remote peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Take all notifications produced since the last call.
    pub fn drain_events(&mut self) -> Vec<NetEvent> {
        std::mem::take(&mut self.events)
    }
}
