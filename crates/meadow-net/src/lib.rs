//! Peer state synchronization: snapshot model, interpolation buffers, wire
//! messages, the peer channel contract, and the [`NetworkSync`] driver.

pub mod buffer;
pub mod channel;
pub mod loopback;
pub mod messages;
pub mod reconnection;
pub mod snapshot;
pub mod sync;

#[cfg(test)]
mod sync_tests;

pub use buffer::{DEFAULT_BUFFER_CAPACITY, StateBuffer};
pub use channel::{ChannelError, ChannelEvent, EventSink, PeerChannel, PresenceEntry};
pub use loopback::{LoopbackChannel, LoopbackHub};
pub use messages::{
    Message, MessageError, PROTOCOL_VERSION, PlayerState, Presence, STATE_EVENT,
    deserialize_message, serialize_message,
};
pub use reconnection::{ReconnectConfig, ReconnectSchedule};
pub use snapshot::{AnimState, EntitySnapshot, PeerId};
pub use sync::{
    BroadcastThrottle, ConnectionState, LeaveReason, NetEvent, NetworkSync, SyncConfig,
};
