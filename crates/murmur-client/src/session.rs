//! The client session lifecycle state machine.
//!
//! The machine is pure and synchronous: it consumes [`SessionEvent`]s and
//! emits [`SessionCommand`]s, never touching the transport or the relay
//! itself. The async driver executes commands and feeds completions back in
//! as events.
//!
//! Every transport completion carries the generation of the session that
//! issued it. The machine bumps its generation whenever a transport session
//! begins or ends, so a completion belonging to a superseded session (the
//! user already skipped or ended) is recognized as stale and discarded
//! instead of being applied to the new session.

use murmur_protocol::{Region, SignalKind};
use thiserror::Error;
use tracing::{debug, trace};

/// Monotonic tag identifying which transport session issued an operation.
pub type Generation = u64;

/// Negotiation role assigned at pairing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Proposes the first negotiation offer.
    Initiator,
    /// Awaits the remote offer and answers it.
    Responder,
}

/// Terminal errors that land the machine in the `Error` state.
///
/// Negotiation failures are deliberately absent: they are treated like a
/// peer disconnect and route to `Feedback` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Local capture acquisition failed; user-retriable.
    #[error("local media unavailable")]
    LocalMediaUnavailable,
    /// The signaling channel was lost while searching or negotiating.
    #[error("signaling relay unreachable")]
    RelayUnreachable,
}

/// Lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing active.
    Idle,
    /// Waiting for a match in `region`.
    Searching { region: Region },
    /// Paired; exchanging descriptions and candidates with `peer`.
    Negotiating { peer: String, role: Role },
    /// Description exchange complete; chat flows over the data channel.
    Connected { peer: String },
    /// Session over; collecting user feedback.
    Feedback,
    /// Terminal error; user may retry.
    Error { cause: SessionError },
}

/// Who authored a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSender {
    Me,
    Peer,
}

/// One line of the ordered chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender: ChatSender,
    pub text: String,
}

/// Inputs to the machine: user intents, signaling traffic, and
/// generation-tagged transport completions.
#[derive(Debug)]
pub enum SessionEvent {
    // User intents
    Start { region: Region },
    SendMessage { text: String },
    Next,
    End,
    Retry,
    SubmitFeedback { text: String },
    SkipFeedback,

    // Signaling inbound
    Matched { peer: String, initiator: bool },
    SignalReceived {
        from: String,
        kind: SignalKind,
        payload: Vec<u8>,
    },
    PeerDisconnected,
    RelayLost,

    // Transport completions
    CaptureReady { generation: Generation },
    CaptureFailed { generation: Generation },
    OfferReady { generation: Generation, sdp: Vec<u8> },
    AnswerReady { generation: Generation, sdp: Vec<u8> },
    NegotiationComplete { generation: Generation },
    NegotiationFailed { generation: Generation },
    CandidateGathered { generation: Generation, payload: Vec<u8> },
    ChatReceived { generation: Generation, text: String },
    TransportClosed { generation: Generation },
}

/// Effects the driver must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Acquire local capture from the peer transport.
    AcquireCapture { generation: Generation },
    /// Bind a new per-peer transport session. For the initiator the driver
    /// also opens the data channel and produces the offer.
    BindSession {
        generation: Generation,
        peer: String,
        role: Role,
    },
    /// Apply a remote offer and produce an answer.
    AcceptOffer { generation: Generation, sdp: Vec<u8> },
    /// Apply the remote answer.
    AcceptAnswer { generation: Generation, sdp: Vec<u8> },
    /// Apply a remote connectivity candidate.
    ApplyCandidate { generation: Generation, payload: Vec<u8> },
    /// Send a chat message over the data channel.
    SendChat { generation: Generation, text: String },
    /// Send a join request to the relay.
    SendJoinQueue { region: Region },
    /// Send a leave-room to the relay.
    SendLeaveRoom,
    /// Send a signaling envelope to the peer through the relay.
    SendSignal {
        to: String,
        kind: SignalKind,
        payload: Vec<u8>,
    },
    /// Release the per-peer transport session (keeps capture).
    ReleaseSession,
    /// Release local capture.
    ReleaseCapture,
    /// Hand feedback text to the analyzer, fire-and-forget.
    AnalyzeFeedback { text: String },
}

/// The per-client lifecycle state machine.
#[derive(Debug)]
pub struct ClientSession {
    state: SessionState,
    generation: Generation,
    capture_held: bool,
    /// Region of the current or most recent search; "next" re-enters
    /// `Searching` with the same region.
    region: Option<Region>,
    chat: Vec<ChatEntry>,
}

impl ClientSession {
    /// Create a machine in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            capture_held: false,
            region: None,
            chat: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether local capture is currently held.
    #[must_use]
    pub fn capture_held(&self) -> bool {
        self.capture_held
    }

    /// The ordered chat log of the current session.
    #[must_use]
    pub fn chat_log(&self) -> &[ChatEntry] {
        &self.chat
    }

    /// Feed one event through the machine, returning the commands the
    /// driver must execute, in order.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<SessionCommand> {
        trace!(state = ?self.state, event = ?event, "Applying event");
        match event {
            SessionEvent::Start { region } => self.on_start(region),
            SessionEvent::SendMessage { text } => self.on_send_message(text),
            SessionEvent::Next => self.on_next(),
            SessionEvent::End => self.on_end(),
            SessionEvent::Retry => self.on_retry(),
            SessionEvent::SubmitFeedback { text } => self.on_feedback_done(Some(text)),
            SessionEvent::SkipFeedback => self.on_feedback_done(None),

            SessionEvent::Matched { peer, initiator } => self.on_matched(peer, initiator),
            SessionEvent::SignalReceived {
                from,
                kind,
                payload,
            } => self.on_signal(from, kind, payload),
            SessionEvent::PeerDisconnected => self.on_session_lost(),
            SessionEvent::RelayLost => self.on_relay_lost(),

            SessionEvent::CaptureReady { generation } => self.on_capture_ready(generation),
            SessionEvent::CaptureFailed { generation } => self.on_capture_failed(generation),
            SessionEvent::OfferReady { generation, sdp } => self.on_offer_ready(generation, sdp),
            SessionEvent::AnswerReady { generation, sdp } => self.on_answer_ready(generation, sdp),
            SessionEvent::NegotiationComplete { generation } => {
                self.on_negotiation_complete(generation)
            }
            SessionEvent::NegotiationFailed { generation }
            | SessionEvent::TransportClosed { generation } => {
                if self.is_stale(generation) {
                    return Vec::new();
                }
                self.on_session_lost()
            }
            SessionEvent::CandidateGathered {
                generation,
                payload,
            } => self.on_candidate_gathered(generation, payload),
            SessionEvent::ChatReceived { generation, text } => {
                self.on_chat_received(generation, text)
            }
        }
    }

    fn is_stale(&self, generation: Generation) -> bool {
        if generation != self.generation {
            debug!(
                completion = generation,
                current = self.generation,
                "Discarding stale completion"
            );
            true
        } else {
            false
        }
    }

    /// The peer id if a session is active.
    fn current_peer(&self) -> Option<&str> {
        match &self.state {
            SessionState::Negotiating { peer, .. } | SessionState::Connected { peer } => {
                Some(peer.as_str())
            }
            _ => None,
        }
    }

    fn on_start(&mut self, region: Region) -> Vec<SessionCommand> {
        if self.state != SessionState::Idle {
            return Vec::new();
        }

        self.generation += 1;
        self.region = Some(region.clone());
        self.state = SessionState::Searching {
            region: region.clone(),
        };

        if self.capture_held {
            vec![SessionCommand::SendJoinQueue { region }]
        } else {
            vec![SessionCommand::AcquireCapture {
                generation: self.generation,
            }]
        }
    }

    fn on_capture_ready(&mut self, generation: Generation) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            // Whoever acquired this is no longer wanted; the driver frees it.
            return vec![SessionCommand::ReleaseCapture];
        }
        let SessionState::Searching { region } = &self.state else {
            return vec![SessionCommand::ReleaseCapture];
        };

        self.capture_held = true;
        vec![SessionCommand::SendJoinQueue {
            region: region.clone(),
        }]
    }

    fn on_capture_failed(&mut self, generation: Generation) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            return Vec::new();
        }

        self.state = SessionState::Error {
            cause: SessionError::LocalMediaUnavailable,
        };
        Vec::new()
    }

    fn on_matched(&mut self, peer: String, initiator: bool) -> Vec<SessionCommand> {
        if !matches!(self.state, SessionState::Searching { .. }) {
            debug!(peer = %peer, "Ignoring match notification outside Searching");
            return Vec::new();
        }

        let role = if initiator {
            Role::Initiator
        } else {
            Role::Responder
        };

        // A new transport session begins here.
        self.generation += 1;
        self.chat.clear();
        self.state = SessionState::Negotiating {
            peer: peer.clone(),
            role,
        };

        vec![SessionCommand::BindSession {
            generation: self.generation,
            peer,
            role,
        }]
    }

    fn on_signal(
        &mut self,
        from: String,
        kind: SignalKind,
        payload: Vec<u8>,
    ) -> Vec<SessionCommand> {
        // Envelopes from anyone but the current peer are stale or hostile.
        if self.current_peer() != Some(from.as_str()) {
            debug!(from = %from, kind = ?kind, "Ignoring envelope from non-peer");
            return Vec::new();
        }

        match (kind, &self.state) {
            (
                SignalKind::Offer,
                SessionState::Negotiating {
                    role: Role::Responder,
                    ..
                },
            ) => vec![SessionCommand::AcceptOffer {
                generation: self.generation,
                sdp: payload,
            }],
            (
                SignalKind::Answer,
                SessionState::Negotiating {
                    role: Role::Initiator,
                    ..
                },
            ) => vec![SessionCommand::AcceptAnswer {
                generation: self.generation,
                sdp: payload,
            }],
            (SignalKind::IceCandidate, _) => vec![SessionCommand::ApplyCandidate {
                generation: self.generation,
                payload,
            }],
            (kind, state) => {
                debug!(kind = ?kind, state = ?state, "Ignoring unexpected envelope");
                Vec::new()
            }
        }
    }

    fn on_offer_ready(&mut self, generation: Generation, sdp: Vec<u8>) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            return Vec::new();
        }
        let SessionState::Negotiating {
            peer,
            role: Role::Initiator,
        } = &self.state
        else {
            return Vec::new();
        };

        vec![SessionCommand::SendSignal {
            to: peer.clone(),
            kind: SignalKind::Offer,
            payload: sdp,
        }]
    }

    fn on_answer_ready(&mut self, generation: Generation, sdp: Vec<u8>) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            return Vec::new();
        }
        let SessionState::Negotiating {
            peer,
            role: Role::Responder,
        } = &self.state
        else {
            return Vec::new();
        };
        let peer = peer.clone();

        // Producing the answer completes the responder's description
        // exchange; connectivity establishment continues in the background.
        self.state = SessionState::Connected { peer: peer.clone() };
        vec![SessionCommand::SendSignal {
            to: peer,
            kind: SignalKind::Answer,
            payload: sdp,
        }]
    }

    fn on_negotiation_complete(&mut self, generation: Generation) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            return Vec::new();
        }
        if let SessionState::Negotiating {
            peer,
            role: Role::Initiator,
        } = &self.state
        {
            self.state = SessionState::Connected { peer: peer.clone() };
        }
        Vec::new()
    }

    fn on_candidate_gathered(
        &mut self,
        generation: Generation,
        payload: Vec<u8>,
    ) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            return Vec::new();
        }
        // Candidates keep trickling after Connected; forward them as long as
        // the session is alive.
        match self.current_peer() {
            Some(peer) => vec![SessionCommand::SendSignal {
                to: peer.to_string(),
                kind: SignalKind::IceCandidate,
                payload,
            }],
            None => Vec::new(),
        }
    }

    fn on_chat_received(&mut self, generation: Generation, text: String) -> Vec<SessionCommand> {
        if self.is_stale(generation) {
            return Vec::new();
        }
        if matches!(self.state, SessionState::Connected { .. }) {
            self.chat.push(ChatEntry {
                sender: ChatSender::Peer,
                text,
            });
        }
        Vec::new()
    }

    fn on_send_message(&mut self, text: String) -> Vec<SessionCommand> {
        if !matches!(self.state, SessionState::Connected { .. }) {
            return Vec::new();
        }

        self.chat.push(ChatEntry {
            sender: ChatSender::Me,
            text: text.clone(),
        });
        vec![SessionCommand::SendChat {
            generation: self.generation,
            text,
        }]
    }

    fn on_next(&mut self) -> Vec<SessionCommand> {
        let region = match &self.state {
            SessionState::Negotiating { .. } | SessionState::Connected { .. } => {
                match self.last_region() {
                    Some(region) => region,
                    None => return Vec::new(),
                }
            }
            _ => return Vec::new(),
        };

        // Supersede the current session; its late completions become stale.
        self.generation += 1;
        self.chat.clear();
        self.state = SessionState::Searching {
            region: region.clone(),
        };

        vec![
            SessionCommand::SendLeaveRoom,
            SessionCommand::ReleaseSession,
            SessionCommand::SendJoinQueue { region },
        ]
    }

    fn on_end(&mut self) -> Vec<SessionCommand> {
        match self.state {
            SessionState::Searching { .. }
            | SessionState::Negotiating { .. }
            | SessionState::Connected { .. } => {
                self.generation += 1;
                self.state = SessionState::Feedback;
                vec![SessionCommand::SendLeaveRoom, SessionCommand::ReleaseSession]
            }
            _ => Vec::new(),
        }
    }

    /// Transport failure or peer-disconnected while a session is active.
    fn on_session_lost(&mut self) -> Vec<SessionCommand> {
        match self.state {
            SessionState::Negotiating { .. } | SessionState::Connected { .. } => {
                self.generation += 1;
                self.state = SessionState::Feedback;
                vec![SessionCommand::ReleaseSession]
            }
            _ => Vec::new(),
        }
    }

    fn on_relay_lost(&mut self) -> Vec<SessionCommand> {
        match self.state {
            SessionState::Searching { .. } => {
                self.generation += 1;
                self.state = SessionState::Error {
                    cause: SessionError::RelayUnreachable,
                };
                Vec::new()
            }
            SessionState::Negotiating { .. } => {
                self.generation += 1;
                self.state = SessionState::Error {
                    cause: SessionError::RelayUnreachable,
                };
                vec![SessionCommand::ReleaseSession]
            }
            // Once connected the media path is peer-to-peer; losing the
            // relay costs nothing until the next join.
            _ => Vec::new(),
        }
    }

    fn on_retry(&mut self) -> Vec<SessionCommand> {
        if !matches!(self.state, SessionState::Error { .. }) {
            return Vec::new();
        }
        self.to_idle(None)
    }

    fn on_feedback_done(&mut self, feedback: Option<String>) -> Vec<SessionCommand> {
        if self.state != SessionState::Feedback {
            return Vec::new();
        }
        self.to_idle(feedback)
    }

    /// Transition into `Idle`, releasing capture and emitting the optional
    /// feedback analysis.
    fn to_idle(&mut self, feedback: Option<String>) -> Vec<SessionCommand> {
        self.generation += 1;
        self.state = SessionState::Idle;
        self.chat.clear();

        let mut commands = Vec::new();
        if self.capture_held {
            self.capture_held = false;
            commands.push(SessionCommand::ReleaseCapture);
        }
        if let Some(text) = feedback {
            commands.push(SessionCommand::AnalyzeFeedback { text });
        }
        commands
    }

    /// The region of the current or most recent search.
    fn last_region(&self) -> Option<Region> {
        self.region.clone()
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> Region {
        Region::global()
    }

    /// Drive a machine from Idle into Searching with capture held.
    fn searching(session: &mut ClientSession) {
        let commands = session.apply(SessionEvent::Start { region: global() });
        assert_eq!(
            commands,
            vec![SessionCommand::AcquireCapture {
                generation: session.generation()
            }]
        );
        let commands = session.apply(SessionEvent::CaptureReady {
            generation: session.generation(),
        });
        assert_eq!(
            commands,
            vec![SessionCommand::SendJoinQueue { region: global() }]
        );
    }

    #[test]
    fn test_negotiation_happy_path() {
        let mut a = ClientSession::new();
        let mut b = ClientSession::new();
        searching(&mut a);
        searching(&mut b);

        // B was waiting; A joins and initiates.
        let commands = a.apply(SessionEvent::Matched {
            peer: "b".into(),
            initiator: true,
        });
        let gen_a = a.generation();
        assert_eq!(
            commands,
            vec![SessionCommand::BindSession {
                generation: gen_a,
                peer: "b".into(),
                role: Role::Initiator,
            }]
        );

        let commands = b.apply(SessionEvent::Matched {
            peer: "a".into(),
            initiator: false,
        });
        let gen_b = b.generation();
        assert_eq!(
            commands,
            vec![SessionCommand::BindSession {
                generation: gen_b,
                peer: "a".into(),
                role: Role::Responder,
            }]
        );

        // A's offer is produced and sent through the relay.
        let commands = a.apply(SessionEvent::OfferReady {
            generation: gen_a,
            sdp: b"offer".to_vec(),
        });
        assert_eq!(
            commands,
            vec![SessionCommand::SendSignal {
                to: "b".into(),
                kind: SignalKind::Offer,
                payload: b"offer".to_vec(),
            }]
        );

        // B receives it, applies it, answers.
        let commands = b.apply(SessionEvent::SignalReceived {
            from: "a".into(),
            kind: SignalKind::Offer,
            payload: b"offer".to_vec(),
        });
        assert_eq!(
            commands,
            vec![SessionCommand::AcceptOffer {
                generation: gen_b,
                sdp: b"offer".to_vec(),
            }]
        );
        let commands = b.apply(SessionEvent::AnswerReady {
            generation: gen_b,
            sdp: b"answer".to_vec(),
        });
        assert_eq!(
            commands,
            vec![SessionCommand::SendSignal {
                to: "a".into(),
                kind: SignalKind::Answer,
                payload: b"answer".to_vec(),
            }]
        );
        assert_eq!(b.state(), &SessionState::Connected { peer: "a".into() });

        // A applies the answer and finalizes.
        let commands = a.apply(SessionEvent::SignalReceived {
            from: "b".into(),
            kind: SignalKind::Answer,
            payload: b"answer".to_vec(),
        });
        assert_eq!(
            commands,
            vec![SessionCommand::AcceptAnswer {
                generation: gen_a,
                sdp: b"answer".to_vec(),
            }]
        );
        a.apply(SessionEvent::NegotiationComplete { generation: gen_a });
        assert_eq!(a.state(), &SessionState::Connected { peer: "b".into() });
    }

    #[test]
    fn test_mid_negotiation_failure_reaches_feedback_once() {
        let mut a = ClientSession::new();
        searching(&mut a);
        a.apply(SessionEvent::Matched {
            peer: "b".into(),
            initiator: true,
        });
        let bind_gen = a.generation();

        // Peer-disconnected and the transport close race; the first wins.
        let commands = a.apply(SessionEvent::PeerDisconnected);
        assert_eq!(commands, vec![SessionCommand::ReleaseSession]);
        assert_eq!(a.state(), &SessionState::Feedback);

        let commands = a.apply(SessionEvent::TransportClosed {
            generation: bind_gen,
        });
        assert!(commands.is_empty());
        assert_eq!(a.state(), &SessionState::Feedback);
    }

    #[test]
    fn test_stale_offer_completion_is_discarded_after_next() {
        let mut a = ClientSession::new();
        searching(&mut a);
        a.apply(SessionEvent::Matched {
            peer: "b".into(),
            initiator: true,
        });
        let old_gen = a.generation();

        // User skips before the offer production completes.
        let commands = a.apply(SessionEvent::Next);
        assert_eq!(
            commands,
            vec![
                SessionCommand::SendLeaveRoom,
                SessionCommand::ReleaseSession,
                SessionCommand::SendJoinQueue { region: global() },
            ]
        );
        assert_eq!(a.state(), &SessionState::Searching { region: global() });

        // The superseded session's offer must not leak into the new one.
        let commands = a.apply(SessionEvent::OfferReady {
            generation: old_gen,
            sdp: b"late".to_vec(),
        });
        assert!(commands.is_empty());
        assert_eq!(a.state(), &SessionState::Searching { region: global() });
    }

    #[test]
    fn test_capture_failure_is_retriable() {
        let mut a = ClientSession::new();
        a.apply(SessionEvent::Start { region: global() });
        let commands = a.apply(SessionEvent::CaptureFailed {
            generation: a.generation(),
        });
        assert!(commands.is_empty());
        assert_eq!(
            a.state(),
            &SessionState::Error {
                cause: SessionError::LocalMediaUnavailable
            }
        );

        // Retry goes back to Idle; nothing to release.
        let commands = a.apply(SessionEvent::Retry);
        assert!(commands.is_empty());
        assert_eq!(a.state(), &SessionState::Idle);

        // And a fresh start re-acquires capture.
        let commands = a.apply(SessionEvent::Start { region: global() });
        assert_eq!(
            commands,
            vec![SessionCommand::AcquireCapture {
                generation: a.generation()
            }]
        );
    }

    #[test]
    fn test_capture_persists_across_next_cycles() {
        let mut a = ClientSession::new();
        searching(&mut a);
        a.apply(SessionEvent::Matched {
            peer: "b".into(),
            initiator: false,
        });
        assert!(a.capture_held());

        let commands = a.apply(SessionEvent::Next);
        assert!(!commands.contains(&SessionCommand::ReleaseCapture));
        assert!(a.capture_held());

        // Re-entering Searching with capture skips re-acquisition.
        assert_eq!(a.state(), &SessionState::Searching { region: global() });

        let commands = a.apply(SessionEvent::End);
        assert_eq!(
            commands,
            vec![SessionCommand::SendLeaveRoom, SessionCommand::ReleaseSession]
        );
        assert_eq!(a.state(), &SessionState::Feedback);

        // Capture is released only on the transition into Idle.
        let commands = a.apply(SessionEvent::SubmitFeedback {
            text: "great call".into(),
        });
        assert_eq!(
            commands,
            vec![
                SessionCommand::ReleaseCapture,
                SessionCommand::AnalyzeFeedback {
                    text: "great call".into()
                },
            ]
        );
        assert_eq!(a.state(), &SessionState::Idle);
        assert!(!a.capture_held());
    }

    #[test]
    fn test_chat_log_ordering_and_staleness() {
        let mut a = ClientSession::new();
        searching(&mut a);
        a.apply(SessionEvent::Matched {
            peer: "b".into(),
            initiator: false,
        });
        let gen = a.generation();
        a.apply(SessionEvent::SignalReceived {
            from: "b".into(),
            kind: SignalKind::Offer,
            payload: b"offer".to_vec(),
        });
        a.apply(SessionEvent::AnswerReady {
            generation: gen,
            sdp: b"answer".to_vec(),
        });
        assert_eq!(a.state(), &SessionState::Connected { peer: "b".into() });

        a.apply(SessionEvent::SendMessage { text: "hi".into() });
        a.apply(SessionEvent::ChatReceived {
            generation: gen,
            text: "hello".into(),
        });
        // A line from a previous session must not appear.
        a.apply(SessionEvent::ChatReceived {
            generation: gen - 1,
            text: "ghost".into(),
        });

        let log: Vec<(&ChatSender, &str)> = a
            .chat_log()
            .iter()
            .map(|e| (&e.sender, e.text.as_str()))
            .collect();
        assert_eq!(
            log,
            vec![(&ChatSender::Me, "hi"), (&ChatSender::Peer, "hello")]
        );
    }

    #[test]
    fn test_relay_lost_while_searching() {
        let mut a = ClientSession::new();
        searching(&mut a);

        let commands = a.apply(SessionEvent::RelayLost);
        assert!(commands.is_empty());
        assert_eq!(
            a.state(),
            &SessionState::Error {
                cause: SessionError::RelayUnreachable
            }
        );
    }

    #[test]
    fn test_envelope_from_non_peer_is_ignored() {
        let mut a = ClientSession::new();
        searching(&mut a);
        a.apply(SessionEvent::Matched {
            peer: "b".into(),
            initiator: false,
        });

        let commands = a.apply(SessionEvent::SignalReceived {
            from: "mallory".into(),
            kind: SignalKind::Offer,
            payload: b"evil".to_vec(),
        });
        assert!(commands.is_empty());
        assert_eq!(
            a.state(),
            &SessionState::Negotiating {
                peer: "b".into(),
                role: Role::Responder
            }
        );
    }
}
