//! Events that can occur during a bridged call

use crate::protocol::{AgentInbound, TelephonyInbound};

/// Which peer an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Telephony,
    Agent,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Telephony => "telephony",
            Side::Agent => "agent",
        }
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Telephony events
    TelephonyFrame(TelephonyInbound),
    TelephonyClosed {
        reason: Option<String>,
    },

    // Conversational-AI events
    AgentConnected,
    AgentSetupFailed {
        reason: String,
    },
    AgentFrame(AgentInbound),
    AgentClosed {
        reason: Option<String>,
    },

    /// A frame from either side that could not be decoded
    Malformed {
        side: Side,
        error: String,
    },

    /// Peers have been closed and reader loops cancelled
    TeardownComplete,
}
