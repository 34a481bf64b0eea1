//! Database schema and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversations (
    call_id TEXT PRIMARY KEY,
    entry_count INTEGER NOT NULL,
    flushed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_flushed ON conversations(flushed_at DESC);

CREATE TABLE IF NOT EXISTS conversation_entries (
    call_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    speaker TEXT NOT NULL,
    message TEXT NOT NULL,

    PRIMARY KEY (call_id, sequence_id),
    FOREIGN KEY (call_id) REFERENCES conversations(call_id) ON DELETE CASCADE
);
";

/// Who produced a conversation log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Speaker {
    TelephonySystem,
    AiSystem,
    EndUser,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::TelephonySystem => "TELEPHONY_SYSTEM",
            Speaker::AiSystem => "AI_SYSTEM",
            Speaker::EndUser => "END_USER",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Speaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TELEPHONY_SYSTEM" => Ok(Speaker::TelephonySystem),
            "AI_SYSTEM" => Ok(Speaker::AiSystem),
            "END_USER" => Ok(Speaker::EndUser),
            other => Err(format!("unknown speaker: {other}")),
        }
    }
}

/// One line of a call's conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub message: String,
}

impl LogEntry {
    /// Entry stamped with the current time
    pub fn now(speaker: Speaker, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            speaker,
            message: message.into(),
        }
    }
}

/// A flushed conversation as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub call_id: String,
    pub entry_count: i64,
    pub flushed_at: DateTime<Utc>,
}
