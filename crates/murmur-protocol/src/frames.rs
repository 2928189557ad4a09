//! Frame types for the Murmur signaling protocol.
//!
//! Frames are the fundamental unit of communication between clients and the
//! relay. Each frame is serialized using MessagePack for efficient binary
//! encoding. Negotiation payloads (session descriptions, connectivity
//! candidates) are carried as opaque byte blobs; the relay never looks
//! inside them.

use crate::region::Region;
use serde::{Deserialize, Serialize};

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FrameType {
    JoinQueue = 0x01,
    LeaveRoom = 0x02,
    Signal = 0x03,
    Welcome = 0x04,
    Matched = 0x05,
    PeerDisconnected = 0x06,
    Ping = 0x07,
    Pong = 0x08,
}

impl From<FrameType> for u8 {
    fn from(ft: FrameType) -> u8 {
        ft as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x01 => Ok(FrameType::JoinQueue),
            0x02 => Ok(FrameType::LeaveRoom),
            0x03 => Ok(FrameType::Signal),
            0x04 => Ok(FrameType::Welcome),
            0x05 => Ok(FrameType::Matched),
            0x06 => Ok(FrameType::PeerDisconnected),
            0x07 => Ok(FrameType::Ping),
            0x08 => Ok(FrameType::Pong),
            _ => Err("Invalid frame type"),
        }
    }
}

/// Kinds of negotiation envelope the relay forwards between paired peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum SignalKind {
    /// Session description proposed by the initiator.
    Offer = 0,
    /// Session description produced in response by the responder.
    Answer = 1,
    /// Connectivity candidate, exchanged in both directions.
    IceCandidate = 2,
}

impl From<SignalKind> for u8 {
    fn from(sk: SignalKind) -> u8 {
        sk as u8
    }
}

impl TryFrom<u8> for SignalKind {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SignalKind::Offer),
            1 => Ok(SignalKind::Answer),
            2 => Ok(SignalKind::IceCandidate),
            _ => Err("Invalid signal kind"),
        }
    }
}

/// A protocol frame.
///
/// `JoinQueue`, `LeaveRoom` and client-originated `Signal` frames travel
/// client-to-relay; `Welcome`, `Matched`, `PeerDisconnected` and
/// relay-forwarded `Signal` frames travel relay-to-client. `Ping`/`Pong`
/// are valid in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Request pairing within a region.
    #[serde(rename = "join-queue")]
    JoinQueue {
        /// Matching scope: `global` or a country code.
        region: Region,
    },

    /// Leave the current room (and queue, if still waiting).
    #[serde(rename = "leave-room")]
    LeaveRoom,

    /// An addressed, opaque negotiation envelope.
    ///
    /// Clients set `to`; the relay rewrites the address into `from` on
    /// delivery so the recipient knows who sent it.
    #[serde(rename = "signal")]
    Signal {
        /// Recipient connection ID (client-to-relay direction).
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        /// Sender connection ID (relay-to-client direction).
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        /// Envelope kind.
        kind: SignalKind,
        /// Opaque negotiation payload.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Connection established handshake from the relay.
    #[serde(rename = "welcome")]
    Welcome {
        /// Unique connection identifier assigned to this client.
        connection_id: String,
        /// Negotiated protocol version.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u32,
    },

    /// Pairing completed notification.
    #[serde(rename = "matched")]
    Matched {
        /// The paired peer's connection ID.
        peer_id: String,
        /// Whether this side proposes the first negotiation offer.
        initiator: bool,
    },

    /// The room partner left, disconnected, or failed negotiation.
    #[serde(rename = "peer-disconnected")]
    PeerDisconnected,

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
}

impl Frame {
    /// Get the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::JoinQueue { .. } => FrameType::JoinQueue,
            Frame::LeaveRoom => FrameType::LeaveRoom,
            Frame::Signal { .. } => FrameType::Signal,
            Frame::Welcome { .. } => FrameType::Welcome,
            Frame::Matched { .. } => FrameType::Matched,
            Frame::PeerDisconnected => FrameType::PeerDisconnected,
            Frame::Ping { .. } => FrameType::Ping,
            Frame::Pong { .. } => FrameType::Pong,
        }
    }

    /// Create a new JoinQueue frame.
    #[must_use]
    pub fn join_queue(region: Region) -> Self {
        Frame::JoinQueue { region }
    }

    /// Create an outbound (client-to-relay) Signal frame.
    #[must_use]
    pub fn signal_to(to: impl Into<String>, kind: SignalKind, payload: impl Into<Vec<u8>>) -> Self {
        Frame::Signal {
            to: Some(to.into()),
            from: None,
            kind,
            payload: payload.into(),
        }
    }

    /// Create a delivered (relay-to-client) Signal frame.
    #[must_use]
    pub fn signal_from(
        from: impl Into<String>,
        kind: SignalKind,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Frame::Signal {
            to: None,
            from: Some(from.into()),
            kind,
            payload: payload.into(),
        }
    }

    /// Create a new Welcome frame.
    #[must_use]
    pub fn welcome(connection_id: impl Into<String>, version: u8, heartbeat: u32) -> Self {
        Frame::Welcome {
            connection_id: connection_id.into(),
            version,
            heartbeat,
        }
    }

    /// Create a new Matched frame.
    #[must_use]
    pub fn matched(peer_id: impl Into<String>, initiator: bool) -> Self {
        Frame::Matched {
            peer_id: peer_id.into(),
            initiator,
        }
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Frame::Ping { timestamp: None }
    }

    /// Create a new Pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type() {
        let join = Frame::join_queue(Region::global());
        assert_eq!(join.frame_type(), FrameType::JoinQueue);

        let signal = Frame::signal_to("conn-2", SignalKind::Offer, b"sdp".to_vec());
        assert_eq!(signal.frame_type(), FrameType::Signal);
    }

    #[test]
    fn test_signal_kind_conversion() {
        assert_eq!(SignalKind::try_from(0), Ok(SignalKind::Offer));
        assert_eq!(SignalKind::try_from(1), Ok(SignalKind::Answer));
        assert_eq!(SignalKind::try_from(2), Ok(SignalKind::IceCandidate));
        assert!(SignalKind::try_from(3).is_err());
    }

    #[test]
    fn test_signal_addressing() {
        let outbound = Frame::signal_to("conn-2", SignalKind::Answer, b"x".to_vec());
        match outbound {
            Frame::Signal { to, from, .. } => {
                assert_eq!(to.as_deref(), Some("conn-2"));
                assert!(from.is_none());
            }
            _ => unreachable!(),
        }

        let delivered = Frame::signal_from("conn-1", SignalKind::Answer, b"x".to_vec());
        match delivered {
            Frame::Signal { to, from, .. } => {
                assert!(to.is_none());
                assert_eq!(from.as_deref(), Some("conn-1"));
            }
            _ => unreachable!(),
        }
    }
}
