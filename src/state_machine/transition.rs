//! Pure state transition function
//!
//! Given the same state and event this always yields the same new state and
//! effects. All I/O happens in the runtime executor.

use super::event::Side;
use super::state::{BridgeState, NegotiatedParams, PeerConnectionState, Session};
use super::{Effect, Event};
use crate::db::Speaker;
use crate::protocol::{AgentInbound, AgentOutbound, StartMetadata, TelephonyInbound, TelephonyOutbound};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: BridgeState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: BridgeState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Bridge is closed, ignoring {0}")]
    BridgeClosed(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(state: &BridgeState, event: Event) -> Result<TransitionResult, TransitionError> {
    if state.is_terminal() {
        return Err(TransitionError::BridgeClosed(event_label(&event)));
    }

    match event {
        Event::TelephonyFrame(frame) => Ok(on_telephony_frame(state, frame)),
        Event::TelephonyClosed { reason } => {
            let note = match reason {
                Some(reason) => format!("Client disconnected ({reason})"),
                None => "Client disconnected".to_string(),
            };
            Ok(begin_closing(state, Side::Telephony, &[note]))
        }
        Event::AgentConnected => on_agent_connected(state),
        Event::AgentSetupFailed { reason } => Ok(begin_closing(
            state,
            Side::Agent,
            &[format!("Setup error: {reason}")],
        )),
        Event::AgentFrame(frame) => Ok(on_agent_frame(state, frame)),
        Event::AgentClosed { reason } => {
            let note = match reason {
                Some(reason) => format!("Disconnected ({reason})"),
                None => "Disconnected".to_string(),
            };
            Ok(begin_closing(state, Side::Agent, &[note]))
        }
        Event::Malformed { side, error } => Ok(note(
            state,
            side,
            format!("Error processing message: {error}"),
        )),
        Event::TeardownComplete => match state {
            BridgeState::Closing { session } => {
                let result = TransitionResult::new(BridgeState::Closed);
                Ok(match session {
                    Some(session) => result.with_effect(Effect::FlushLog {
                        call_id: session.call_id.clone(),
                    }),
                    None => result,
                })
            }
            other => Err(TransitionError::InvalidTransition(format!(
                "teardown completed while {}",
                other.name()
            ))),
        },
    }
}

// ============================================================
// Telephony frames
// ============================================================

fn on_telephony_frame(state: &BridgeState, frame: TelephonyInbound) -> TransitionResult {
    match (state, frame) {
        (BridgeState::AwaitingStreamStart { peer }, TelephonyInbound::Start(start)) => {
            activate(state, *peer, start)
        }

        (BridgeState::AwaitingStreamStart { .. }, TelephonyInbound::Media { .. }) => {
            unchanged(state).with_effect(Effect::dropped(
                Side::Telephony,
                "media before stream start",
            ))
        }

        (BridgeState::Active { session }, TelephonyInbound::Media { audio }) => {
            if session.peer == PeerConnectionState::Open {
                unchanged(state).with_effect(Effect::SendToAgent(AgentOutbound::UserAudio { audio }))
            } else {
                unchanged(state).with_effect(Effect::dropped(
                    Side::Telephony,
                    "caller audio while agent connection is not open",
                ))
            }
        }

        (BridgeState::Active { session }, TelephonyInbound::Start(start)) => {
            unchanged(state).with_effects([
                Effect::log(&session.call_id, Speaker::TelephonySystem, "Received event: start"),
                Effect::log(
                    &session.call_id,
                    Speaker::TelephonySystem,
                    format!("Ignoring duplicate stream start for StreamSid: {}", start.stream_sid),
                ),
            ])
        }

        (BridgeState::AwaitingStreamStart { .. } | BridgeState::Active { .. }, TelephonyInbound::Stop) => {
            let notes = match state.session() {
                Some(session) => vec![
                    "Received event: stop".to_string(),
                    format!("Stream {} ended", session.stream_id),
                ],
                None => vec!["Received event: stop".to_string()],
            };
            begin_closing(state, Side::Telephony, &notes)
        }

        (BridgeState::AwaitingStreamStart { .. } | BridgeState::Active { .. }, TelephonyInbound::Unrecognized { event }) => {
            let result = note(state, Side::Telephony, format!("Received event: {event}"));
            let extra = note(state, Side::Telephony, format!("Unhandled event: {event}"));
            result.with_effects(extra.effects)
        }

        (_, frame) => unchanged(state).with_effect(Effect::dropped(
            Side::Telephony,
            format!("{} frame while {}", frame.tag(), state.name()),
        )),
    }
}

/// Stream start: the session comes into existence
fn activate(state: &BridgeState, peer: PeerConnectionState, start: StartMetadata) -> TransitionResult {
    if start.call_sid.is_empty() || start.stream_sid.is_empty() {
        return unchanged(state).with_effect(Effect::diagnostic(
            Side::Telephony,
            "Ignoring stream start without call or stream identifiers",
        ));
    }

    let negotiated_params =
        NegotiatedParams::from_custom_parameters(start.custom_parameters.unwrap_or_default());
    let session = Session {
        call_id: start.call_sid,
        stream_id: start.stream_sid,
        negotiated_params,
        peer,
    };
    let call_id = session.call_id.as_str();

    let mut effects = vec![
        Effect::RegisterSession(session.clone()),
        Effect::log(call_id, Speaker::TelephonySystem, "Received event: start"),
        Effect::log(
            call_id,
            Speaker::TelephonySystem,
            format!(
                "Stream started - StreamSid: {}, CallSid: {}",
                session.stream_id, session.call_id
            ),
        ),
    ];
    if !session.negotiated_params.is_empty() {
        let params = serde_json::to_string(&session.negotiated_params).unwrap_or_default();
        effects.push(Effect::log(
            call_id,
            Speaker::TelephonySystem,
            format!("Start parameters: {params}"),
        ));
    }
    if peer == PeerConnectionState::Open {
        effects.extend(initiation_effects(&session));
    }

    TransitionResult::new(BridgeState::Active { session }).with_effects(effects)
}

fn initiation_effects(session: &Session) -> [Effect; 2] {
    let params = &session.negotiated_params;
    [
        Effect::log(
            &session.call_id,
            Speaker::AiSystem,
            format!("Sending initial config with prompt: {}", params.prompt()),
        ),
        Effect::SendToAgent(AgentOutbound::Initiation {
            prompt: params.prompt().to_string(),
            first_message: params.first_message().to_string(),
        }),
    ]
}

// ============================================================
// Conversational-AI frames
// ============================================================

fn on_agent_connected(state: &BridgeState) -> Result<TransitionResult, TransitionError> {
    match state {
        BridgeState::AwaitingStreamStart {
            peer: PeerConnectionState::Connecting,
        } => Ok(TransitionResult::new(BridgeState::AwaitingStreamStart {
            peer: PeerConnectionState::Open,
        })
        .with_effect(Effect::diagnostic(Side::Agent, "Connected to Conversational AI"))),

        BridgeState::Active { session } if session.peer == PeerConnectionState::Connecting => {
            let session = Session {
                peer: PeerConnectionState::Open,
                ..session.clone()
            };
            let mut effects = vec![
                Effect::UpdateSession(session.clone()),
                Effect::log(&session.call_id, Speaker::AiSystem, "Connected to Conversational AI"),
            ];
            effects.extend(initiation_effects(&session));
            Ok(TransitionResult::new(BridgeState::Active { session }).with_effects(effects))
        }

        // Setup finished after teardown began: discard the late connection.
        BridgeState::Closing { .. } => Ok(unchanged(state).with_effect(Effect::CloseAgent)),

        other => Err(TransitionError::InvalidTransition(format!(
            "agent connected while {} with peer {:?}",
            other.name(),
            other.peer()
        ))),
    }
}

fn on_agent_frame(state: &BridgeState, frame: AgentInbound) -> TransitionResult {
    match state {
        BridgeState::Active { session } => on_active_agent_frame(state, session, frame),
        BridgeState::AwaitingStreamStart { peer } => match frame {
            AgentInbound::Audio { .. } => unchanged(state)
                .with_effect(Effect::diagnostic(Side::Agent, "Received audio but no StreamSid yet")),
            AgentInbound::Ping { event_id } if *peer == PeerConnectionState::Open => {
                unchanged(state).with_effect(Effect::SendToAgent(AgentOutbound::Pong { event_id }))
            }
            other => unchanged(state).with_effect(Effect::diagnostic(
                Side::Agent,
                describe_agent_frame(&other),
            )),
        },
        BridgeState::Closing { .. } | BridgeState::Closed => unchanged(state).with_effect(
            Effect::dropped(Side::Agent, format!("{} frame while {}", frame.tag(), state.name())),
        ),
    }
}

fn on_active_agent_frame(state: &BridgeState, session: &Session, frame: AgentInbound) -> TransitionResult {
    let call_id = session.call_id.as_str();
    match frame {
        AgentInbound::Audio { chunk } => unchanged(state).with_effect(Effect::SendToTelephony(
            TelephonyOutbound::Media {
                stream_sid: session.stream_id.clone(),
                payload: chunk,
            },
        )),
        AgentInbound::Interruption => unchanged(state).with_effects([
            Effect::log(call_id, Speaker::AiSystem, "Interruption: clearing playback"),
            Effect::SendToTelephony(TelephonyOutbound::Clear {
                stream_sid: session.stream_id.clone(),
            }),
        ]),
        AgentInbound::Ping { event_id } => {
            if session.peer == PeerConnectionState::Open {
                unchanged(state).with_effect(Effect::SendToAgent(AgentOutbound::Pong { event_id }))
            } else {
                unchanged(state).with_effect(Effect::dropped(Side::Agent, "ping while peer not open"))
            }
        }
        AgentInbound::AgentUtterance { text } => unchanged(state).with_effect(Effect::log(
            call_id,
            Speaker::AiSystem,
            format!("Agent response: {text}"),
        )),
        AgentInbound::UserTranscript { text } => {
            unchanged(state).with_effect(Effect::log(call_id, Speaker::EndUser, text))
        }
        other => unchanged(state).with_effect(Effect::log(
            call_id,
            Speaker::AiSystem,
            describe_agent_frame(&other),
        )),
    }
}

fn describe_agent_frame(frame: &AgentInbound) -> String {
    match frame {
        AgentInbound::ConnectionMetadata {
            conversation_id: Some(id),
        } => format!("Received initiation metadata (conversation {id})"),
        AgentInbound::ConnectionMetadata { conversation_id: None } => {
            "Received initiation metadata".to_string()
        }
        AgentInbound::Audio { .. } => "Received audio".to_string(),
        AgentInbound::Interruption => "Received interruption before stream start".to_string(),
        AgentInbound::Ping { .. } => "Received ping".to_string(),
        AgentInbound::AgentUtterance { text } => format!("Agent response: {text}"),
        AgentInbound::UserTranscript { text } => format!("User transcript: {text}"),
        AgentInbound::Unrecognized { kind } => format!("Unhandled message type: {kind}"),
    }
}

// ============================================================
// Termination
// ============================================================

/// Either side signalled termination: enter `Closing` and close the other side.
fn begin_closing(state: &BridgeState, initiator: Side, notes: &[String]) -> TransitionResult {
    let mut effects: Vec<Effect> = notes
        .iter()
        .map(|message| note_effect(state, initiator, message.clone()))
        .collect();

    let (session, peer, already_closing) = match state {
        BridgeState::AwaitingStreamStart { peer } => (None, *peer, false),
        BridgeState::Active { session } => (Some(session.clone()), session.peer, false),
        BridgeState::Closing { session } => (session.clone(), state.peer(), true),
        BridgeState::Closed => (None, PeerConnectionState::Closed, true),
    };

    let new_peer = match initiator {
        Side::Agent => PeerConnectionState::Closed,
        Side::Telephony if peer.is_live() => PeerConnectionState::Closing,
        Side::Telephony => peer,
    };
    let session = session.map(|s| Session { peer: new_peer, ..s });
    if let Some(session) = session.as_ref().filter(|_| new_peer != peer) {
        effects.push(Effect::UpdateSession(session.clone()));
    }

    if !already_closing {
        match initiator {
            Side::Telephony if peer.is_live() => effects.push(Effect::CloseAgent),
            Side::Telephony => {}
            Side::Agent => effects.push(Effect::CloseTelephony),
        }
        effects.push(Effect::CancelReaders);
        effects.push(Effect::FinishTeardown);
    }

    TransitionResult::new(BridgeState::Closing { session }).with_effects(effects)
}

// ============================================================
// Helpers
// ============================================================

fn unchanged(state: &BridgeState) -> TransitionResult {
    TransitionResult::new(state.clone())
}

/// Log a line against the session when there is one, otherwise diagnostically
fn note(state: &BridgeState, side: Side, message: String) -> TransitionResult {
    unchanged(state).with_effect(note_effect(state, side, message))
}

fn note_effect(state: &BridgeState, side: Side, message: String) -> Effect {
    match state.call_id() {
        Some(call_id) => Effect::log(call_id, speaker_for(side), message),
        None => Effect::diagnostic(side, message),
    }
}

fn speaker_for(side: Side) -> Speaker {
    match side {
        Side::Telephony => Speaker::TelephonySystem,
        Side::Agent => Speaker::AiSystem,
    }
}

fn event_label(event: &Event) -> &'static str {
    match event {
        Event::TelephonyFrame(_) => "telephony frame",
        Event::TelephonyClosed { .. } => "telephony close",
        Event::AgentConnected => "agent connected",
        Event::AgentSetupFailed { .. } => "agent setup failure",
        Event::AgentFrame(_) => "agent frame",
        Event::AgentClosed { .. } => "agent close",
        Event::Malformed { .. } => "malformed frame",
        Event::TeardownComplete => "teardown completion",
    }
}
