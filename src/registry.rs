//! In-memory registry of live calls
//!
//! The only state shared between bridges. Each call owns a disjoint entry
//! keyed by call id; removing the entry is what flushes its conversation log.

use crate::db::LogEntry;
use crate::runtime::{ConversationStore, StoreError};
use crate::state_machine::Session;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session plus the log lines accumulated for it
#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    pub session: Option<Session>,
    pub entries: Vec<LogEntry>,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    store: Arc<dyn ConversationStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub async fn get(&self, call_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(call_id)
            .and_then(|record| record.session.clone())
    }

    /// Insert or replace the session for its call id, keeping existing log lines
    pub async fn upsert(&self, session: Session) {
        let call_id = session.call_id.clone();
        let mut sessions = self.sessions.write().await;
        sessions.entry(call_id).or_default().session = Some(session);
    }

    /// Append one line to the call's log, in arrival order
    pub async fn append(&self, call_id: &str, entry: LogEntry) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(call_id.to_string())
            .or_default()
            .entries
            .push(entry);
    }

    /// Snapshot of the log accumulated so far
    pub async fn entries(&self, call_id: &str) -> Vec<LogEntry> {
        self.sessions
            .read()
            .await
            .get(call_id)
            .map(|record| record.entries.clone())
            .unwrap_or_default()
    }

    /// Evict the call and flush its log to the store.
    ///
    /// Returns `Ok(None)` for an unknown call id. The entry is evicted even
    /// when the flush fails.
    pub async fn remove(&self, call_id: &str) -> Result<Option<Session>, StoreError> {
        let record = self.sessions.write().await.remove(call_id);
        let Some(record) = record else {
            return Ok(None);
        };

        self.store.save_conversation(call_id, &record.entries).await?;
        tracing::info!(
            call_id = %call_id,
            entries = record.entries.len(),
            "Conversation log flushed"
        );
        Ok(record.session)
    }

    /// Call ids currently bridged, sorted
    pub async fn active_calls(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, record)| record.session.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
