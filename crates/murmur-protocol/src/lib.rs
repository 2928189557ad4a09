//! # murmur-protocol
//!
//! Wire protocol definitions for the Murmur anonymous pairing relay.
//!
//! This crate defines the signaling protocol spoken between clients and the
//! relay: frame types, the MessagePack codec, matching regions, and protocol
//! versioning.
//!
//! ## Frame Types
//!
//! - `JoinQueue` / `LeaveRoom` - Matchmaking lifecycle
//! - `Matched` / `PeerDisconnected` - Pairing notifications
//! - `Signal` - Opaque offer/answer/ICE-candidate envelopes
//! - `Welcome` / `Ping` / `Pong` - Handshake and keepalive
//!
//! ## Example
//!
//! ```rust
//! use murmur_protocol::{codec, Frame, Region};
//!
//! let frame = Frame::join_queue(Region::global());
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;
pub mod region;
pub mod version;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{Frame, FrameType, SignalKind};
pub use region::Region;
pub use version::{Version, PROTOCOL_VERSION};
