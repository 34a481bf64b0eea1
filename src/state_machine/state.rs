//! Bridge state types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prompt used when the call initiator supplied none
pub const DEFAULT_PROMPT: &str = "you are a gary from the phone store";

/// Opening line used when the call initiator supplied none
pub const DEFAULT_FIRST_MESSAGE: &str = "hey there! how can I help you today?";

/// Connection state of the conversational-AI side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerConnectionState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

impl PeerConnectionState {
    /// A close request still makes sense for the peer
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Parameters the call initiator attached to the media stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NegotiatedParams {
    pub prompt: Option<String>,
    pub first_message: Option<String>,
    /// Any other custom parameters, kept for the log
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl NegotiatedParams {
    pub fn from_custom_parameters(mut params: BTreeMap<String, String>) -> Self {
        let prompt = params.remove("prompt").filter(|p| !p.trim().is_empty());
        let first_message = params
            .remove("first_message")
            .filter(|m| !m.trim().is_empty());
        Self {
            prompt,
            first_message,
            extra: params,
        }
    }

    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    pub fn first_message(&self) -> &str {
        self.first_message.as_deref().unwrap_or(DEFAULT_FIRST_MESSAGE)
    }

    pub fn is_empty(&self) -> bool {
        self.prompt.is_none() && self.first_message.is_none() && self.extra.is_empty()
    }
}

/// The live record of one in-progress call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub call_id: String,
    pub stream_id: String,
    pub negotiated_params: NegotiatedParams,
    pub peer: PeerConnectionState,
}

/// Bridge lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeState {
    /// Telephony connected, stream metadata not yet announced
    AwaitingStreamStart { peer: PeerConnectionState },

    /// Both identifiers known; traffic is relayed
    Active { session: Session },

    /// Termination requested by either side; peers are being closed
    Closing { session: Option<Session> },

    /// Terminal
    Closed,
}

impl Default for BridgeState {
    fn default() -> Self {
        BridgeState::AwaitingStreamStart {
            peer: PeerConnectionState::Connecting,
        }
    }
}

impl BridgeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Closed)
    }

    /// Call identifier, once the telephony side has announced it
    pub fn call_id(&self) -> Option<&str> {
        self.session().map(|s| s.call_id.as_str())
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            BridgeState::Active { session } => Some(session),
            BridgeState::Closing { session } => session.as_ref(),
            BridgeState::AwaitingStreamStart { .. } | BridgeState::Closed => None,
        }
    }

    pub fn peer(&self) -> PeerConnectionState {
        match self {
            BridgeState::AwaitingStreamStart { peer } => *peer,
            BridgeState::Active { session } => session.peer,
            BridgeState::Closing { session } => session
                .as_ref()
                .map_or(PeerConnectionState::Closing, |s| s.peer),
            BridgeState::Closed => PeerConnectionState::Closed,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            BridgeState::AwaitingStreamStart { .. } => "awaiting_stream_start",
            BridgeState::Active { .. } => "active",
            BridgeState::Closing { .. } => "closing",
            BridgeState::Closed => "closed",
        }
    }
}
