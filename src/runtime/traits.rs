//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the bridge executor with mock peers and stores.

use crate::db::{ConversationSummary, Database, DbError, LogEntry};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Socket-level failures on either peer
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// Failures while establishing the conversational-AI connection
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Conversational AI not configured: missing {0}")]
    NotConfigured(&'static str),
    #[error("Signed URL request failed: {0}")]
    SignedUrl(String),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Setup timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures writing or reading flushed conversation logs
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
}

/// A frame read from a peer, already reduced to what the bridge cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close(Option<String>),
}

/// Write half of a peer connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

pub type FrameStream = BoxStream<'static, Result<InboundFrame, TransportError>>;

/// Both halves of one peer connection
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub stream: FrameStream,
}

/// Opens the conversational-AI side of a call
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self) -> Result<Link, SetupError>;
}

/// Durable sink for flushed conversation logs
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save_conversation(&self, call_id: &str, entries: &[LogEntry]) -> Result<(), StoreError>;

    /// `None` when the call was never flushed
    async fn load_conversation(&self, call_id: &str) -> Result<Option<Vec<LogEntry>>, StoreError>;

    /// Flushed conversations, most recent first
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AgentConnector + ?Sized> AgentConnector for Arc<T> {
    async fn connect(&self) -> Result<Link, SetupError> {
        (**self).connect().await
    }
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn save_conversation(&self, call_id: &str, entries: &[LogEntry]) -> Result<(), StoreError> {
        (**self).save_conversation(call_id, entries).await
    }

    async fn load_conversation(&self, call_id: &str) -> Result<Option<Vec<LogEntry>>, StoreError> {
        (**self).load_conversation(call_id).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        (**self).list_conversations().await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a conversation store
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for DatabaseStore {
    async fn save_conversation(&self, call_id: &str, entries: &[LogEntry]) -> Result<(), StoreError> {
        self.db.save_conversation(call_id, entries)?;
        Ok(())
    }

    async fn load_conversation(&self, call_id: &str) -> Result<Option<Vec<LogEntry>>, StoreError> {
        match self.db.get_conversation(call_id) {
            Ok(entries) => Ok(Some(entries)),
            Err(DbError::ConversationNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        Ok(self.db.list_conversations()?)
    }
}
