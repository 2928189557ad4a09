//! # murmur-client
//!
//! Client-side session logic for Murmur: the lifecycle state machine, the
//! async driver that executes its commands, and the WebSocket channel to
//! the relay.
//!
//! The state machine in [`session`] is pure and synchronous; all I/O lives
//! in the [`driver`], which wires the machine to a [`transport`]
//! implementation and a [`relay`] connection.
//!
//! ```rust,ignore
//! use murmur_client::{LoggingAnalyzer, RelayChannel, SessionDriver};
//! use std::sync::Arc;
//!
//! let (relay, events) = RelayChannel::connect("ws://localhost:3001/ws").await?;
//! let (driver, handle, updates) =
//!     SessionDriver::new(transport, Arc::new(relay), Arc::new(LoggingAnalyzer));
//! RelayChannel::forward(events, handle.clone());
//! tokio::spawn(driver.run());
//! handle.start(murmur_protocol::Region::global());
//! ```

pub mod driver;
pub mod feedback;
pub mod relay;
pub mod session;
pub mod transport;

pub use driver::{SessionDriver, SessionHandle, SessionUpdate, SignalSink};
pub use feedback::{FeedbackAnalyzer, FeedbackReport, LoggingAnalyzer};
pub use relay::{RelayChannel, RelayError};
pub use session::{
    ChatEntry, ChatSender, ClientSession, Role, SessionCommand, SessionError, SessionEvent,
    SessionState,
};
pub use transport::{
    LocalCapture, PeerEvent, PeerSession, PeerTransport, RemoteMedia, TransportError,
};
