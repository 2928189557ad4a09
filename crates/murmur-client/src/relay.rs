//! WebSocket channel to the relay.
//!
//! Owns the socket behind two tasks: a writer draining an outbound frame
//! queue and a reader decoding inbound frames into session events. Frame
//! sends are fire-and-forget; any socket failure surfaces exactly once as a
//! `RelayLost` event on the inbound stream.

use crate::driver::{SessionHandle, SignalSink};
use crate::session::SessionEvent;
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use murmur_protocol::{codec, Frame, ProtocolError, PROTOCOL_VERSION};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, warn};

/// Relay channel errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The WebSocket connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(#[from] WsError),

    /// Frame encoding or decoding failed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Outbound half of a live relay connection.
///
/// Cloneable; every clone feeds the same writer task. Hand it to the
/// session driver as its [`SignalSink`], then route the returned event
/// stream into the driver with [`RelayChannel::forward`].
#[derive(Clone)]
pub struct RelayChannel {
    outbound: mpsc::UnboundedSender<Frame>,
}

impl RelayChannel {
    /// Connect to the relay at `url` and start pumping frames.
    ///
    /// Returns the outbound channel plus the stream of session events the
    /// relay produces. The stream ends after a single `RelayLost`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connect`] if the WebSocket handshake fails.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), RelayError> {
        let (ws_stream, _response) = connect_async(url).await?;
        debug!(url, "Connected to relay");

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<SessionEvent>();

        // Writer: drain the queue onto the socket. A failed write just ends
        // the task; the reader observes the broken socket and reports it.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let data = match codec::encode(&frame) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "Dropping unencodable frame");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Binary(data.to_vec())).await {
                    debug!(error = %e, "Relay write failed");
                    break;
                }
            }
        });

        // Reader: reassemble length-prefixed frames from binary messages and
        // translate them into session events.
        let pong_tx = outbound_tx.clone();
        tokio::spawn(async move {
            let mut read_buffer = BytesMut::with_capacity(4096);

            loop {
                match read.next().await {
                    Some(Ok(Message::Binary(data))) => {
                        read_buffer.extend_from_slice(&data);
                        loop {
                            match codec::decode_from(&mut read_buffer) {
                                Ok(Some(frame)) => {
                                    dispatch_frame(frame, &events_tx, &pong_tx);
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(error = %e, "Undecodable relay traffic");
                                    let _ = events_tx.send(SessionEvent::RelayLost);
                                    return;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_)) | Ok(Message::Pong(_))) => {
                        // Transport-level keepalive, handled by tungstenite.
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Relay connection closed");
                        let _ = events_tx.send(SessionEvent::RelayLost);
                        return;
                    }
                    Some(Ok(other)) => {
                        warn!(?other, "Ignoring non-binary relay message");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Relay read failed");
                        let _ = events_tx.send(SessionEvent::RelayLost);
                        return;
                    }
                }
            }
        });

        Ok((
            Self {
                outbound: outbound_tx,
            },
            events_rx,
        ))
    }

    /// Spawn a task forwarding relay events into the driver.
    pub fn forward(mut events: mpsc::UnboundedReceiver<SessionEvent>, handle: SessionHandle) {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handle.dispatch(event);
            }
        });
    }
}

fn dispatch_frame(
    frame: Frame,
    events: &mpsc::UnboundedSender<SessionEvent>,
    outbound: &mpsc::UnboundedSender<Frame>,
) {
    match frame {
        Frame::Welcome {
            connection_id,
            version,
            heartbeat,
        } => {
            if version != PROTOCOL_VERSION.major {
                warn!(
                    server = version,
                    client = PROTOCOL_VERSION.major,
                    "Protocol version mismatch"
                );
            }
            debug!(%connection_id, heartbeat, "Relay session established");
        }
        Frame::Matched { peer_id, initiator } => {
            let _ = events.send(SessionEvent::Matched {
                peer: peer_id,
                initiator,
            });
        }
        Frame::Signal {
            from: Some(from),
            kind,
            payload,
            ..
        } => {
            let _ = events.send(SessionEvent::SignalReceived {
                from,
                kind,
                payload,
            });
        }
        Frame::Signal { from: None, .. } => {
            warn!("Ignoring relayed envelope without sender");
        }
        Frame::PeerDisconnected => {
            let _ = events.send(SessionEvent::PeerDisconnected);
        }
        Frame::Ping { timestamp } => {
            let _ = outbound.send(Frame::pong(timestamp));
        }
        Frame::Pong { .. } => {}
        other => {
            warn!(frame_type = ?other.frame_type(), "Unexpected frame from relay");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_protocol::SignalKind;

    #[test]
    fn test_matched_frame_becomes_session_event() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();

        dispatch_frame(Frame::matched("peer-9", true), &events_tx, &outbound_tx);

        match events_rx.try_recv() {
            Ok(SessionEvent::Matched { peer, initiator }) => {
                assert_eq!(peer, "peer-9");
                assert!(initiator);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_ping_answered_without_touching_the_session() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

        dispatch_frame(Frame::Ping { timestamp: Some(42) }, &events_tx, &outbound_tx);

        assert!(events_rx.try_recv().is_err());
        assert!(matches!(
            outbound_rx.try_recv(),
            Ok(Frame::Pong {
                timestamp: Some(42)
            })
        ));
    }

    #[test]
    fn test_envelope_without_sender_is_dropped() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();

        let frame = Frame::Signal {
            to: None,
            from: None,
            kind: SignalKind::Offer,
            payload: b"sdp".to_vec(),
        };
        dispatch_frame(frame, &events_tx, &outbound_tx);

        assert!(events_rx.try_recv().is_err());
    }
}
