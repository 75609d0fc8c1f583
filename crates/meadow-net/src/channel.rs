//! Contract of the publish/subscribe transport a room runs on.
//!
//! Transports deliver everything inbound as [`ChannelEvent`]s pushed into
//! the [`EventSink`] handed over at connect time. Delivery may happen on any
//! thread and between frames; the sink only queues, and
//! [`crate::NetworkSync::poll`] drains the queue at the top of the next tick.

use crossbeam_channel::Sender;

use crate::snapshot::PeerId;

/// Queue end a transport pushes inbound events into.
pub type EventSink = Sender<ChannelEvent>;

/// One peer as reported by a presence sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    /// Peer the presence belongs to.
    pub peer: PeerId,
    /// Opaque metadata the peer attached with `track`.
    pub meta: Vec<u8>,
}

/// Inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Complete set of tracked peers after any presence change.
    PresenceSync {
        /// Every tracked peer in the room, the receiver included.
        peers: Vec<PresenceEntry>,
    },
    /// A broadcast from another peer.
    Broadcast {
        /// Sending peer.
        from: PeerId,
        /// Event name the payload was sent under.
        event: String,
        /// Encoded payload.
        payload: Vec<u8>,
    },
    /// The transport closed the subscription.
    Closed,
    /// The transport hit an error; the subscription is unusable.
    Error(String),
}

/// Errors returned by transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Operation requires an open subscription.
    #[error("channel is not connected")]
    NotConnected,
    /// The transport closed underneath the caller.
    #[error("channel closed")]
    Closed,
    /// The transport refused the operation.
    #[error("channel rejected request: {0}")]
    Rejected(String),
}

/// Room-scoped publish/subscribe transport.
///
/// Implementations keep at most one active subscription per room; calling
/// [`PeerChannel::connect`] while connected to the same room is a no-op.
/// Delivery is best-effort and unordered.
pub trait PeerChannel {
    /// Identifier this client is known by in the room.
    fn local_id(&self) -> &PeerId;

    /// Open the room subscription; inbound events go to `sink`.
    fn connect(&mut self, room_id: &str, sink: EventSink) -> Result<(), ChannelError>;

    /// Start receiving [`ChannelEvent::PresenceSync`] events.
    fn subscribe_presence(&mut self) -> Result<(), ChannelError>;

    /// Start receiving broadcasts sent under `event`.
    fn subscribe_broadcast(&mut self, event: &str) -> Result<(), ChannelError>;

    /// Broadcast `payload` under `event` to every other subscriber.
    fn send(&mut self, event: &str, payload: &[u8]) -> Result<(), ChannelError>;

    /// Publish this client's presence metadata.
    fn track(&mut self, meta: &[u8]) -> Result<(), ChannelError>;

    /// Drop the subscription. Safe to call when not connected.
    fn close(&mut self);
}
