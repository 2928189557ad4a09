//! Connection handlers for the Murmur relay.
//!
//! One logical flow per connection: a WebSocket carries length-prefixed
//! signaling frames both ways, and a `tokio::select!` loop multiplexes the
//! socket with the lobby's outbound channel for this connection.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use murmur_core::{ConnectionId, JoinOutcome, Lobby};
use murmur_protocol::{codec, Frame, PROTOCOL_VERSION};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The matchmaking lobby.
    pub lobby: Lobby,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            lobby: Lobby::new(),
            config,
        }
    }
}

/// Run the HTTP/WebSocket relay server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = Router::new()
        .route(&config.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Murmur relay listening on {}", addr);
    info!("Signaling endpoint: ws://{}{}", addr, config.websocket_path);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.lobby.stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": stats.connections,
        "waiting": stats.waiting,
        "rooms": stats.rooms,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection from accept to cleanup.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    if state.lobby.stats().connections >= state.config.limits.max_connections {
        warn!("Connection limit reached, refusing new client");
        metrics::record_error("connection_limit");
        return;
    }

    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    // Register with the lobby before anything else so matchmaking
    // notifications have somewhere to go.
    let mut outbound = state.lobby.register(&connection_id);

    // Handshake: tell the client who it is.
    let welcome = Frame::welcome(
        connection_id.as_str(),
        PROTOCOL_VERSION.major,
        state.config.heartbeat.interval_ms as u32,
    );
    if let Ok(data) = codec::encode(&welcome) {
        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
            error!(connection = %connection_id, "Failed to send Welcome frame");
            state.lobby.disconnect(&connection_id);
            return;
        }
    }

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    loop {
        tokio::select! {
            biased;

            // Frames the lobby addressed to this connection
            Some(frame) = outbound.recv() => {
                if send_frame(&mut sender, &frame).await.is_err() {
                    break;
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        read_buffer.extend_from_slice(&data);

                        if read_buffer.len() > state.config.limits.max_frame_size {
                            warn!(connection = %connection_id, "Frame exceeds size limit, closing");
                            metrics::record_error("frame_too_large");
                            break;
                        }

                        loop {
                            match codec::decode_from(&mut read_buffer) {
                                Ok(Some(frame)) => {
                                    if let Err(e) = handle_frame(
                                        &frame,
                                        &connection_id,
                                        &state,
                                        &mut sender,
                                    ).await {
                                        error!(connection = %connection_id, error = %e, "Frame handling error");
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    // Malformed traffic is logged, never
                                    // surfaced back to the client.
                                    warn!(connection = %connection_id, error = %e, "Undecodable frame, discarding buffer");
                                    metrics::record_error("protocol");
                                    read_buffer.clear();
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Ok(Message::Text(_))) => {
                        warn!(connection = %connection_id, "Ignoring text frame on binary protocol");
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Composite cleanup on every exit path: queue, room (notifying the
    // peer), and the outbound channel.
    state.lobby.disconnect(&connection_id);
    let stats = state.lobby.stats();
    metrics::set_lobby_gauges(stats.waiting, stats.rooms);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Handle a decoded frame.
async fn handle_frame(
    frame: &Frame,
    connection_id: &ConnectionId,
    state: &Arc<AppState>,
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
) -> Result<()> {
    match frame {
        Frame::JoinQueue { region } => {
            debug!(connection = %connection_id, region = %region, "Join request");

            let outcome = state.lobby.join_queue(connection_id, region);
            if matches!(outcome, JoinOutcome::Matched { .. }) {
                metrics::record_match();
            }
            let stats = state.lobby.stats();
            metrics::set_lobby_gauges(stats.waiting, stats.rooms);
        }

        Frame::LeaveRoom => {
            debug!(connection = %connection_id, "Leave request");

            state.lobby.leave(connection_id);
            let stats = state.lobby.stats();
            metrics::set_lobby_gauges(stats.waiting, stats.rooms);
        }

        Frame::Signal {
            to: Some(to),
            kind,
            payload,
            ..
        } => {
            let to = ConnectionId::from(to.as_str());
            let delivered = state
                .lobby
                .relay(connection_id, &to, *kind, payload.clone());
            metrics::record_envelope(&format!("{kind:?}"), delivered);
        }

        Frame::Signal { to: None, .. } => {
            // Unaddressed envelopes have nowhere to go; no acknowledgment
            // channel exists, so just drop them.
            warn!(connection = %connection_id, "Signal frame without recipient");
            metrics::record_error("unaddressed_signal");
        }

        Frame::Ping { timestamp } => {
            send_frame(sender, &Frame::pong(*timestamp)).await?;
        }

        Frame::Pong { .. } => {
            // Keepalive reply, nothing to do
        }

        _ => {
            warn!(connection = %connection_id, frame_type = ?frame.frame_type(), "Unexpected frame type from client");
            metrics::record_error("unexpected_frame");
        }
    }

    Ok(())
}

/// Send a frame to the WebSocket.
async fn send_frame(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<()> {
    let data = codec::encode(frame)?;
    sender.send(Message::Binary(data.to_vec())).await?;
    Ok(())
}
