//! Broadcast payload types and serialization.
//!
//! All payloads are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::snapshot::AnimState;

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

/// Broadcast event name carrying avatar state.
pub const STATE_EVENT: &str = "player-state";

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level payload exchanged over the peer channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    /// Periodic avatar state broadcast.
    PlayerState(PlayerState),
    /// Presence metadata attached via `track`.
    Presence(Presence),
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Avatar transform broadcast by the owning client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    /// World-space position.
    pub position: Vec3,
    /// Yaw around +Y in radians.
    pub facing: f32,
    /// Current animation.
    pub anim: AnimState,
    /// Sender's simulation clock when the state was captured (ms).
    pub sent_at_ms: u64,
}

/// Presence metadata describing a connected peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Presence {
    /// Name shown above the avatar.
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Payload was empty (no version byte).
    #[error("empty payload: no version byte")]
    EmptyPayload,

    /// Version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard encoding or decoding failed.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into bytes: `[version_byte, ...postcard_bytes]`.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, MessageError> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize bytes produced by [`serialize_message`].
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let (&version, body) = data.split_first().ok_or(MessageError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_state_roundtrip() {
        let msg = Message::PlayerState(PlayerState {
            position: Vec3::new(12.5, 0.75, -3.0),
            facing: 1.25,
            anim: AnimState::Run,
            sent_at_ms: 98_765,
        });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            deserialize_message(&[]),
            Err(MessageError::EmptyPayload)
        ));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let msg = Message::Presence(Presence {
            display_name: "heron".to_string(),
        });
        let mut bytes = serialize_message(&msg).unwrap();
        bytes[0] = PROTOCOL_VERSION + 1;
        assert!(matches!(
            deserialize_message(&bytes),
            Err(MessageError::UnsupportedVersion(v)) if v == PROTOCOL_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let msg = Message::PlayerState(PlayerState {
            position: Vec3::ONE,
            facing: 0.0,
            anim: AnimState::Idle,
            sent_at_ms: 1,
        });
        let bytes = serialize_message(&msg).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            deserialize_message(truncated),
            Err(MessageError::Postcard(_))
        ));
    }
}
