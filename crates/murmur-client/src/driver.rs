//! Async driver for the session state machine.
//!
//! The driver owns the machine, the peer-transport collaborator, and the
//! signal sink. It executes [`SessionCommand`]s, spawning transport
//! operations and feeding their completions back into the machine as
//! generation-tagged events. Completions for a superseded session come back
//! tagged with the old generation and the machine discards them, so the
//! driver never has to cancel an in-flight transport future.
//!
//! Transport operations may suspend for arbitrarily long, so none of them
//! run on the driver's own event loop: capture acquisition and session
//! binding are spawned, and everything touching a bound session runs on a
//! per-session task fed through an op channel. User intents stay
//! processable while an operation hangs; skipping or ending simply aborts
//! the session task, dropping the session and whatever it was doing.

use crate::feedback::FeedbackAnalyzer;
use crate::session::{
    ChatEntry, ClientSession, Generation, Role, SessionCommand, SessionEvent, SessionState,
};
use crate::transport::{LocalCapture, PeerEvent, PeerSession, PeerTransport, RemoteMedia};
use murmur_protocol::Frame;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outbound signaling seam.
///
/// Fire-and-forget: delivery failures are not reported here; a lost relay
/// surfaces as a `RelayLost` event on the driver's inbox instead.
pub trait SignalSink: Send + Sync {
    /// Send a frame towards the relay.
    fn send(&self, frame: Frame);
}

/// What the presentation layer observes.
#[derive(Debug)]
pub enum SessionUpdate {
    /// The lifecycle state changed.
    State(SessionState),
    /// A line was appended to the chat log.
    Chat(ChatEntry),
    /// The remote media stream became available.
    RemoteMedia(Box<dyn RemoteMedia>),
}

/// Handle for feeding the driver: user intents and inbound signaling.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl SessionHandle {
    /// Feed a raw session event. Used by the relay channel and tests.
    pub fn dispatch(&self, event: SessionEvent) {
        let _ = self.tx.send(DriverEvent::Session(event));
    }

    /// Begin searching in `region`.
    pub fn start(&self, region: murmur_protocol::Region) {
        self.dispatch(SessionEvent::Start { region });
    }

    /// Send a chat message to the current peer.
    pub fn send_message(&self, text: impl Into<String>) {
        self.dispatch(SessionEvent::SendMessage { text: text.into() });
    }

    /// Skip to the next stranger in the same region.
    pub fn next(&self) {
        self.dispatch(SessionEvent::Next);
    }

    /// End the session and move to feedback.
    pub fn end(&self) {
        self.dispatch(SessionEvent::End);
    }

    /// Retry after an error.
    pub fn retry(&self) {
        self.dispatch(SessionEvent::Retry);
    }

    /// Submit feedback text.
    pub fn submit_feedback(&self, text: impl Into<String>) {
        self.dispatch(SessionEvent::SubmitFeedback { text: text.into() });
    }

    /// Skip the feedback prompt.
    pub fn skip_feedback(&self) {
        self.dispatch(SessionEvent::SkipFeedback);
    }
}

/// Driver inbox items: machine events plus internal transport completions
/// that carry resources the machine itself never holds.
enum DriverEvent {
    Session(SessionEvent),
    CaptureAcquired {
        generation: Generation,
        capture: Arc<dyn LocalCapture>,
    },
    SessionBound {
        generation: Generation,
        role: Role,
        session: Box<dyn PeerSession>,
        events: mpsc::UnboundedReceiver<PeerEvent>,
    },
}

/// Operations forwarded to the per-session task.
enum SessionOp {
    AcceptOffer { sdp: Vec<u8> },
    AcceptAnswer { sdp: Vec<u8> },
    ApplyCandidate { payload: Vec<u8> },
    SendChat { text: String },
}

/// Owns the machine and executes its commands against the transport.
pub struct SessionDriver {
    machine: ClientSession,
    transport: Arc<dyn PeerTransport>,
    sink: Arc<dyn SignalSink>,
    analyzer: Arc<dyn FeedbackAnalyzer>,
    inbox: mpsc::UnboundedReceiver<DriverEvent>,
    inbox_tx: mpsc::UnboundedSender<DriverEvent>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    capture: Option<Arc<dyn LocalCapture>>,
    /// Op channel into the session task, tagged with its generation.
    session_ops: Option<(Generation, mpsc::UnboundedSender<SessionOp>)>,
    session_task: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
    /// Session-bound commands that arrived before the bind completed.
    pending: Vec<SessionCommand>,
}

impl SessionDriver {
    /// Create a driver plus its handle and the presentation update stream.
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        sink: Arc<dyn SignalSink>,
        analyzer: Arc<dyn FeedbackAnalyzer>,
    ) -> (
        Self,
        SessionHandle,
        mpsc::UnboundedReceiver<SessionUpdate>,
    ) {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let driver = Self {
            machine: ClientSession::new(),
            transport,
            sink,
            analyzer,
            inbox,
            inbox_tx: inbox_tx.clone(),
            updates: updates_tx,
            capture: None,
            session_ops: None,
            session_task: None,
            pump_task: None,
            pending: Vec::new(),
        };
        (driver, SessionHandle { tx: inbox_tx }, updates_rx)
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.inbox.recv().await {
            self.dispatch(event);
        }

        // Final disconnect: nothing may outlive the session owner.
        self.drop_session();
        self.capture = None;
        debug!("Session driver stopped");
    }

    fn dispatch(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Session(event) => self.feed_machine(event),

            DriverEvent::CaptureAcquired {
                generation,
                capture,
            } => {
                // A superseded acquisition must not displace the capture a
                // newer session may already hold; dropping it releases the
                // device.
                if generation != self.machine.generation() {
                    debug!(generation, "Dropping superseded capture");
                    return;
                }
                self.capture = Some(capture);
                self.feed_machine(SessionEvent::CaptureReady { generation });
            }

            DriverEvent::SessionBound {
                generation,
                role,
                session,
                events,
            } => self.on_session_bound(generation, role, session, events),
        }
    }

    fn feed_machine(&mut self, event: SessionEvent) {
        let prev_state = self.machine.state().clone();
        let prev_chat = self.machine.chat_log().len();

        let commands = self.machine.apply(event);

        if self.machine.state() != &prev_state {
            let _ = self
                .updates
                .send(SessionUpdate::State(self.machine.state().clone()));
        }
        if self.machine.chat_log().len() > prev_chat {
            for entry in &self.machine.chat_log()[prev_chat..] {
                let _ = self.updates.send(SessionUpdate::Chat(entry.clone()));
            }
        }

        for command in commands {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::AcquireCapture { generation } => {
                let transport = Arc::clone(&self.transport);
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    match transport.acquire_capture().await {
                        Ok(capture) => {
                            let _ = tx.send(DriverEvent::CaptureAcquired {
                                generation,
                                capture,
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Capture acquisition failed");
                            let _ =
                                tx.send(DriverEvent::Session(SessionEvent::CaptureFailed {
                                    generation,
                                }));
                        }
                    }
                });
            }

            SessionCommand::BindSession {
                generation, role, ..
            } => {
                // The previous session, if any, is already superseded.
                self.drop_session();

                let Some(capture) = self.capture.clone() else {
                    warn!("Bind requested without capture");
                    let _ = self.inbox_tx.send(DriverEvent::Session(
                        SessionEvent::NegotiationFailed { generation },
                    ));
                    return;
                };

                let transport = Arc::clone(&self.transport);
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    match transport.create_session(capture).await {
                        Ok((session, events)) => {
                            let _ = tx.send(DriverEvent::SessionBound {
                                generation,
                                role,
                                session,
                                events,
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Session bind failed");
                            let _ = tx.send(DriverEvent::Session(
                                SessionEvent::NegotiationFailed { generation },
                            ));
                        }
                    }
                });
            }

            SessionCommand::AcceptOffer { generation, sdp } => {
                self.forward_op(
                    generation,
                    SessionOp::AcceptOffer { sdp },
                    |generation, sdp| SessionCommand::AcceptOffer { generation, sdp },
                );
            }

            SessionCommand::AcceptAnswer { generation, sdp } => {
                self.forward_op(
                    generation,
                    SessionOp::AcceptAnswer { sdp },
                    |generation, sdp| SessionCommand::AcceptAnswer { generation, sdp },
                );
            }

            SessionCommand::ApplyCandidate {
                generation,
                payload,
            } => {
                self.forward_op(
                    generation,
                    SessionOp::ApplyCandidate { payload },
                    |generation, payload| SessionCommand::ApplyCandidate {
                        generation,
                        payload,
                    },
                );
            }

            SessionCommand::SendChat { generation, text } => {
                if let Some((bound, ops)) = &self.session_ops {
                    if *bound == generation {
                        let _ = ops.send(SessionOp::SendChat { text });
                    }
                }
            }

            SessionCommand::SendJoinQueue { region } => {
                self.sink.send(Frame::join_queue(region));
            }

            SessionCommand::SendLeaveRoom => {
                self.sink.send(Frame::LeaveRoom);
            }

            SessionCommand::SendSignal { to, kind, payload } => {
                self.sink.send(Frame::signal_to(to, kind, payload));
            }

            SessionCommand::ReleaseSession => {
                self.drop_session();
            }

            SessionCommand::ReleaseCapture => {
                self.capture = None;
            }

            SessionCommand::AnalyzeFeedback { text } => {
                let analyzer = Arc::clone(&self.analyzer);
                tokio::spawn(async move {
                    let report = analyzer.analyze(&text).await;
                    info!(summary = %report.summary, "Feedback analyzed");
                });
            }
        }
    }

    /// Hand an op to the session task, or park the command until the bind
    /// completes. The rebuild closure recreates the command for the pending
    /// queue; commands for a superseded generation are dropped.
    fn forward_op(
        &mut self,
        generation: Generation,
        op: SessionOp,
        rebuild: impl FnOnce(Generation, Vec<u8>) -> SessionCommand,
    ) {
        if let Some((bound, ops)) = &self.session_ops {
            if *bound == generation {
                let _ = ops.send(op);
                return;
            }
        }
        if generation == self.machine.generation() {
            let payload = match op {
                SessionOp::AcceptOffer { sdp }
                | SessionOp::AcceptAnswer { sdp } => sdp,
                SessionOp::ApplyCandidate { payload } => payload,
                SessionOp::SendChat { .. } => return,
            };
            self.pending.push(rebuild(generation, payload));
        }
    }

    fn on_session_bound(
        &mut self,
        generation: Generation,
        role: Role,
        mut session: Box<dyn PeerSession>,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        if generation != self.machine.generation() {
            debug!(generation, "Dropping superseded session bind");
            tokio::spawn(async move { session.close().await });
            return;
        }

        // Pump session-originated events back in, tagged with the binding
        // generation so late ones are recognized as stale.
        let tx = self.inbox_tx.clone();
        let updates = self.updates.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let forwarded = match event {
                    PeerEvent::CandidateGathered(payload) => {
                        DriverEvent::Session(SessionEvent::CandidateGathered {
                            generation,
                            payload,
                        })
                    }
                    PeerEvent::ChatMessage(text) => {
                        DriverEvent::Session(SessionEvent::ChatReceived { generation, text })
                    }
                    PeerEvent::ConnectivityLost => {
                        DriverEvent::Session(SessionEvent::TransportClosed { generation })
                    }
                    PeerEvent::RemoteMedia(media) => {
                        let _ = updates.send(SessionUpdate::RemoteMedia(media));
                        continue;
                    }
                };
                if tx.send(forwarded).is_err() {
                    break;
                }
            }
        });

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let task = spawn_session_task(generation, role, session, ops_rx, self.inbox_tx.clone());

        self.session_ops = Some((generation, ops_tx));
        self.session_task = Some(task);
        self.pump_task = Some(pump);

        // Anything that arrived while the bind was in flight runs now.
        let pending = std::mem::take(&mut self.pending);
        for command in pending {
            self.execute(command);
        }
    }

    /// Abort the session task and its pump. Aborting drops the session
    /// mid-operation, which is exactly what preempting a hung negotiation
    /// requires; the transport reclaims its resources on drop.
    fn drop_session(&mut self) {
        if let Some(pump) = self.pump_task.take() {
            pump.abort();
        }
        if let Some(task) = self.session_task.take() {
            task.abort();
        }
        self.session_ops = None;
        self.pending.clear();
    }
}

/// Run one session's operations off the driver loop.
///
/// For the initiator the task first opens the data channel and produces the
/// offer, then serves ops in order. Every completion re-enters the driver
/// tagged with this session's generation.
fn spawn_session_task(
    generation: Generation,
    role: Role,
    mut session: Box<dyn PeerSession>,
    mut ops: mpsc::UnboundedReceiver<SessionOp>,
    tx: mpsc::UnboundedSender<DriverEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if role == Role::Initiator {
            let result = async {
                session.open_data_channel().await?;
                session.create_offer().await
            }
            .await;
            let event = match result {
                Ok(sdp) => SessionEvent::OfferReady { generation, sdp },
                Err(e) => {
                    warn!(error = %e, "Offer production failed");
                    SessionEvent::NegotiationFailed { generation }
                }
            };
            let _ = tx.send(DriverEvent::Session(event));
        }

        while let Some(op) = ops.recv().await {
            match op {
                SessionOp::AcceptOffer { sdp } => {
                    let event = match session.accept_offer(&sdp).await {
                        Ok(answer) => SessionEvent::AnswerReady {
                            generation,
                            sdp: answer,
                        },
                        Err(e) => {
                            warn!(error = %e, "Applying remote offer failed");
                            SessionEvent::NegotiationFailed { generation }
                        }
                    };
                    let _ = tx.send(DriverEvent::Session(event));
                }
                SessionOp::AcceptAnswer { sdp } => {
                    let event = match session.accept_answer(&sdp).await {
                        Ok(()) => SessionEvent::NegotiationComplete { generation },
                        Err(e) => {
                            warn!(error = %e, "Applying remote answer failed");
                            SessionEvent::NegotiationFailed { generation }
                        }
                    };
                    let _ = tx.send(DriverEvent::Session(event));
                }
                SessionOp::ApplyCandidate { payload } => {
                    if let Err(e) = session.apply_candidate(&payload).await {
                        // Candidate application failures are tolerated; the
                        // pair may still connect over another candidate.
                        debug!(error = %e, "Candidate application failed");
                    }
                }
                SessionOp::SendChat { text } => {
                    if let Err(e) = session.send_text(&text).await {
                        warn!(error = %e, "Chat send failed");
                        let _ = tx.send(DriverEvent::Session(SessionEvent::TransportClosed {
                            generation,
                        }));
                    }
                }
            }
        }

        session.close().await;
    })
}
