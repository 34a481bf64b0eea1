//! API request and response types

use crate::db::{ConversationSummary, LogEntry};
use crate::evaluation::{CandidateAction, Goals};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response for the health check
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
}

/// Response with the calls currently bridged
#[derive(Debug, Serialize)]
pub struct ActiveCallsResponse {
    pub active_calls: Vec<String>,
}

/// Response with the flushed conversations
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// Response with one flushed conversation log
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Vec<LogEntry>,
}

/// Request to pick the next conversational move
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextActionRequest {
    #[serde(default)]
    pub conversation_history: Value,
    #[serde(default)]
    pub goals: Goals,
    /// Raw so element errors can name the offending index
    #[serde(default)]
    pub candidates: Option<Value>,
    #[serde(default)]
    pub rollouts_per_candidate: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextActionResponse {
    pub success: bool,
    pub best_action: CandidateAction,
    #[serde(rename = "highestEV")]
    pub highest_ev: f64,
}

/// Request to place an outbound call
#[derive(Debug, Deserialize)]
pub struct OutboundCallRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub first_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallResponse {
    pub success: bool,
    pub message: String,
    pub call_sid: String,
}

/// Query of the TwiML endpoint; missing values become empty strings
#[derive(Debug, Default, Deserialize)]
pub struct TwimlParams {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub first_message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Error response of the call and evaluation endpoints
#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

impl FailureResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}
