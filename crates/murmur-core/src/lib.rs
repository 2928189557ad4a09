//! # murmur-core
//!
//! Matchmaking and room management for the Murmur signaling relay.
//!
//! This crate provides the server-side core:
//!
//! - **RegionQueues** - Per-region FIFO queues of waiting connections
//! - **RoomTable** - Symmetric pairing table with idempotent teardown
//! - **Lobby** - Atomic pop-or-push matchmaking plus envelope relaying
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Connection │────▶│    Lobby    │────▶│ RegionQueues │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  RoomTable  │
//!                     └─────────────┘
//! ```
//!
//! All shared state is owned by the lobby; region queues live behind a map
//! sharded by region so the pop-or-push pairing step is atomic per region.

pub mod connection;
pub mod lobby;
pub mod queue;
pub mod rooms;

pub use connection::ConnectionId;
pub use lobby::{JoinOutcome, Lobby, LobbyStats};
pub use queue::{QueueEntry, RegionQueues};
pub use rooms::{PairingError, RoomTable};
