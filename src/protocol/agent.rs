//! Conversational-AI streaming protocol (ElevenLabs Conversational AI)

use super::ProtocolError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

/// A decoded frame from the conversational-AI side
#[derive(Debug, Clone, PartialEq)]
pub enum AgentInbound {
    /// `conversation_initiation_metadata`
    ConnectionMetadata { conversation_id: Option<String> },
    /// `audio`; `chunk` is base64 audio for playback
    Audio { chunk: String },
    /// `interruption`: the caller barged in
    Interruption,
    /// `ping`; the id is echoed back verbatim in the pong
    Ping { event_id: Value },
    /// `agent_response`
    AgentUtterance { text: String },
    /// `user_transcript`
    UserTranscript { text: String },
    Unrecognized { kind: String },
}

#[derive(Deserialize)]
struct MetadataEvent {
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct AudioChunk {
    #[serde(default)]
    chunk: Option<String>,
}

#[derive(Deserialize)]
struct AudioEvent {
    #[serde(default)]
    audio_base_64: Option<String>,
}

#[derive(Deserialize)]
struct PingEvent {
    #[serde(default)]
    event_id: Option<Value>,
}

#[derive(Deserialize)]
struct AgentResponseEvent {
    #[serde(default)]
    agent_response: Option<String>,
}

#[derive(Deserialize)]
struct UserTranscriptionEvent {
    #[serde(default)]
    user_transcript: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireInbound {
    ConversationInitiationMetadata {
        #[serde(default)]
        conversation_initiation_metadata_event: Option<MetadataEvent>,
    },
    Audio {
        #[serde(default)]
        audio: Option<AudioChunk>,
        #[serde(default)]
        audio_event: Option<AudioEvent>,
    },
    Interruption,
    Ping {
        #[serde(default)]
        ping_event: Option<PingEvent>,
    },
    AgentResponse {
        #[serde(default)]
        agent_response_event: Option<AgentResponseEvent>,
    },
    UserTranscript {
        #[serde(default)]
        user_transcription_event: Option<UserTranscriptionEvent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl AgentInbound {
    /// Decode one JSON text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let decoded = match serde_json::from_str::<WireInbound>(text)? {
            WireInbound::ConversationInitiationMetadata {
                conversation_initiation_metadata_event,
            } => Self::ConnectionMetadata {
                conversation_id: conversation_initiation_metadata_event
                    .and_then(|event| event.conversation_id),
            },
            WireInbound::Audio { audio, audio_event } => {
                // Two payload shapes exist; the direct chunk wins when both are present.
                let chunk = audio
                    .and_then(|a| a.chunk)
                    .or_else(|| audio_event.and_then(|e| e.audio_base_64))
                    .ok_or(ProtocolError::MissingField("audio.chunk"))?;
                Self::Audio { chunk }
            }
            WireInbound::Interruption => Self::Interruption,
            WireInbound::Ping { ping_event } => {
                let event_id = ping_event
                    .and_then(|p| p.event_id)
                    .filter(|id| !id.is_null())
                    .ok_or(ProtocolError::MissingField("ping_event.event_id"))?;
                Self::Ping { event_id }
            }
            WireInbound::AgentResponse {
                agent_response_event,
            } => Self::AgentUtterance {
                text: agent_response_event
                    .and_then(|e| e.agent_response)
                    .unwrap_or_default(),
            },
            WireInbound::UserTranscript {
                user_transcription_event,
            } => Self::UserTranscript {
                text: user_transcription_event
                    .and_then(|e| e.user_transcript)
                    .unwrap_or_default(),
            },
            WireInbound::Other => {
                let envelope: Envelope = serde_json::from_str(text)?;
                Self::Unrecognized {
                    kind: envelope.kind,
                }
            }
        };
        Ok(decoded)
    }

    /// The wire tag this frame arrived with
    pub fn tag(&self) -> &str {
        match self {
            Self::ConnectionMetadata { .. } => "conversation_initiation_metadata",
            Self::Audio { .. } => "audio",
            Self::Interruption => "interruption",
            Self::Ping { .. } => "ping",
            Self::AgentUtterance { .. } => "agent_response",
            Self::UserTranscript { .. } => "user_transcript",
            Self::Unrecognized { kind } => kind,
        }
    }
}

/// A frame sent to the conversational-AI side
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutbound {
    /// First message of a conversation: prompt and opening line overrides
    Initiation {
        prompt: String,
        first_message: String,
    },
    /// Caller audio, raw bytes (base64-encoded on the wire)
    UserAudio { audio: Vec<u8> },
    /// Keepalive reply
    Pong { event_id: Value },
}

impl AgentOutbound {
    pub fn encode(&self) -> String {
        match self {
            Self::Initiation {
                prompt,
                first_message,
            } => json!({
                "type": "conversation_initiation_client_data",
                "conversation_config_override": {
                    "agent": {
                        "prompt": { "prompt": prompt },
                        "first_message": first_message
                    }
                }
            }),
            Self::UserAudio { audio } => json!({
                "user_audio_chunk": STANDARD.encode(audio)
            }),
            Self::Pong { event_id } => json!({
                "type": "pong",
                "event_id": event_id
            }),
        }
        .to_string()
    }
}
