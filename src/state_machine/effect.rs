//! Effects produced by state transitions

use super::event::Side;
use super::state::Session;
use crate::db::Speaker;
use crate::protocol::{AgentOutbound, TelephonyOutbound};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Record the session in the registry
    RegisterSession(Session),

    /// Refresh the registry's copy after the peer state changed
    UpdateSession(Session),

    /// Append a line to the call's conversation log
    AppendLog {
        call_id: String,
        speaker: Speaker,
        message: String,
    },

    /// Process-wide diagnostic line for events not attached to a session
    Diagnostic { side: Side, message: String },

    /// A frame was discarded; logged at debug level only
    Dropped { side: Side, reason: String },

    /// Best-effort send to the conversational-AI side
    SendToAgent(AgentOutbound),

    /// Best-effort send to the telephony side
    SendToTelephony(TelephonyOutbound),

    /// Close the conversational-AI connection (or abandon its setup)
    CloseAgent,

    /// Close the telephony connection
    CloseTelephony,

    /// Stop both inbound loops
    CancelReaders,

    /// Feed `TeardownComplete` back once the preceding effects ran
    FinishTeardown,

    /// Flush the call's conversation log and drop the session
    FlushLog { call_id: String },
}

impl Effect {
    pub fn log(call_id: &str, speaker: Speaker, message: impl Into<String>) -> Self {
        Effect::AppendLog {
            call_id: call_id.to_string(),
            speaker,
            message: message.into(),
        }
    }

    pub fn diagnostic(side: Side, message: impl Into<String>) -> Self {
        Effect::Diagnostic {
            side,
            message: message.into(),
        }
    }

    pub fn dropped(side: Side, reason: impl Into<String>) -> Self {
        Effect::Dropped {
            side,
            reason: reason.into(),
        }
    }
}
