//! Telephony media-stream protocol (Twilio Media Streams)
//!
//! Inbound tags: `start`, `media`, `stop`. Everything else (`connected`,
//! `mark`, ...) decodes to [`TelephonyInbound::Unrecognized`].
//! Outbound tags: `media` (playback frame) and `clear` (flush playback).

use super::ProtocolError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

/// Metadata carried by the `start` event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    pub stream_sid: String,
    pub call_sid: String,
    /// Parameters the call initiator attached to the stream
    #[serde(default)]
    pub custom_parameters: Option<BTreeMap<String, String>>,
}

/// A decoded frame from the telephony side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyInbound {
    Start(StartMetadata),
    /// Caller audio, already base64-decoded
    Media { audio: Vec<u8> },
    Stop,
    Unrecognized { event: String },
}

#[derive(Deserialize)]
struct MediaBody {
    payload: String,
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireInbound {
    Start { start: StartMetadata },
    Media { media: MediaBody },
    Stop,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
}

impl TelephonyInbound {
    /// Decode one JSON text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        match serde_json::from_str::<WireInbound>(text)? {
            WireInbound::Start { start } => Ok(Self::Start(start)),
            WireInbound::Media { media } => {
                let audio = STANDARD.decode(media.payload.as_bytes())?;
                Ok(Self::Media { audio })
            }
            WireInbound::Stop => Ok(Self::Stop),
            WireInbound::Other => {
                let envelope: Envelope = serde_json::from_str(text)?;
                Ok(Self::Unrecognized {
                    event: envelope.event,
                })
            }
        }
    }

    /// The wire tag this frame arrived with
    pub fn tag(&self) -> &str {
        match self {
            Self::Start(_) => "start",
            Self::Media { .. } => "media",
            Self::Stop => "stop",
            Self::Unrecognized { event } => event,
        }
    }
}

/// A frame sent to the telephony side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyOutbound {
    /// Audio to play to the caller; `payload` is base64
    Media { stream_sid: String, payload: String },
    /// Discard any buffered playback (barge-in)
    Clear { stream_sid: String },
}

impl TelephonyOutbound {
    pub fn stream_sid(&self) -> &str {
        match self {
            Self::Media { stream_sid, .. } | Self::Clear { stream_sid } => stream_sid,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Media {
                stream_sid,
                payload,
            } => json!({
                "event": "media",
                "streamSid": stream_sid,
                "media": { "payload": payload }
            }),
            Self::Clear { stream_sid } => json!({
                "event": "clear",
                "streamSid": stream_sid
            }),
        }
        .to_string()
    }
}
