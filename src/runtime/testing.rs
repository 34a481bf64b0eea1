//! Mock implementations for testing
//!
//! These mocks enable integration testing of the call bridge without sockets.

use super::traits::*;
use crate::db::{ConversationSummary, DbError, LogEntry};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Mock peer connection
// ============================================================================

/// What the bridge wrote to a mock peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Close,
}

struct RecordingSink {
    tx: mpsc::UnboundedSender<Sent>,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.tx
            .send(Sent::Text(text))
            .map_err(|_| TransportError::WebSocket("peer gone".to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx
            .send(Sent::Close)
            .map_err(|_| TransportError::WebSocket("peer gone".to_string()))
    }
}

/// The far end of a mock connection, driven by the test
pub struct MockPeer {
    to_bridge: mpsc::UnboundedSender<Result<InboundFrame, TransportError>>,
    from_bridge: mpsc::UnboundedReceiver<Sent>,
}

/// Create a connected pair: the `Link` for the bridge and the test's end
pub fn mock_link() -> (Link, MockPeer) {
    let (to_bridge, inbound_rx) = mpsc::unbounded_channel();
    let (sent_tx, from_bridge) = mpsc::unbounded_channel();

    let stream = futures::stream::unfold(inbound_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    })
    .boxed();

    let link = Link {
        sink: Box::new(RecordingSink { tx: sent_tx }),
        stream,
    };
    (
        link,
        MockPeer {
            to_bridge,
            from_bridge,
        },
    )
}

#[allow(dead_code)]
impl MockPeer {
    pub fn send_json(&self, value: &Value) {
        self.send_text(value.to_string());
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_bridge.send(Ok(InboundFrame::Text(text.into())));
    }

    /// Peer closes its socket
    pub fn close(&self) {
        let _ = self.to_bridge.send(Ok(InboundFrame::Close(None)));
    }

    pub fn fail(&self, error: &str) {
        let _ = self
            .to_bridge
            .send(Err(TransportError::WebSocket(error.to_string())));
    }

    /// Next thing the bridge wrote, waiting up to two seconds
    pub async fn next_sent(&mut self) -> Option<Sent> {
        tokio::time::timeout(Duration::from_secs(2), self.from_bridge.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next text frame parsed as JSON; panics on anything else
    pub async fn next_json(&mut self) -> Value {
        match self.next_sent().await {
            Some(Sent::Text(text)) => serde_json::from_str(&text).expect("bridge sent invalid JSON"),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    /// Wait for the bridge to close this side
    pub async fn expect_close(&mut self) {
        loop {
            match self.next_sent().await {
                Some(Sent::Close) => return,
                Some(Sent::Text(_)) => continue,
                None => panic!("bridge did not close the connection"),
            }
        }
    }

    /// Whatever the bridge has written so far, without waiting
    pub fn drain(&mut self) -> Vec<Sent> {
        let mut sent = Vec::new();
        while let Ok(item) = self.from_bridge.try_recv() {
            sent.push(item);
        }
        sent
    }
}

// ============================================================================
// Scripted agent connector
// ============================================================================

enum Script {
    Ready(Link),
    Fail(String),
    Hang,
}

/// Connector that plays back one scripted outcome
pub struct ScriptedConnector {
    script: Mutex<Option<Script>>,
    attempts: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedConnector {
    /// Connects immediately; returns the test's end of the AI connection
    pub fn ready() -> (Self, MockPeer) {
        let (link, peer) = mock_link();
        (Self::with(Script::Ready(link)), peer)
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with(Script::Fail(reason.into()))
    }

    /// Never completes; only the setup timeout ends it
    pub fn hanging() -> Self {
        Self::with(Script::Hang)
    }

    fn with(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Link, SetupError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().take();
        match script {
            Some(Script::Ready(link)) => Ok(link),
            Some(Script::Fail(reason)) => Err(SetupError::Connect(reason)),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(SetupError::Connect("script exhausted".to_string())),
        }
    }
}

// ============================================================================
// In-memory conversation store
// ============================================================================

/// In-memory conversation store
pub struct InMemoryStore {
    saved: Mutex<HashMap<String, Vec<LogEntry>>>,
    saves: AtomicUsize,
    fail: bool,
}

#[allow(dead_code)]
impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(HashMap::new()),
            saves: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Every save fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn saved(&self, call_id: &str) -> Option<Vec<LogEntry>> {
        self.saved.lock().unwrap().get(call_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn save_conversation(&self, call_id: &str, entries: &[LogEntry]) -> Result<(), StoreError> {
        if self.fail {
            return Err(DbError::Sqlite(rusqlite::Error::InvalidQuery).into());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.saved
            .lock()
            .unwrap()
            .insert(call_id.to_string(), entries.to_vec());
        Ok(())
    }

    async fn load_conversation(&self, call_id: &str) -> Result<Option<Vec<LogEntry>>, StoreError> {
        Ok(self.saved(call_id))
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let saved = self.saved.lock().unwrap();
        let mut summaries: Vec<_> = saved
            .iter()
            .map(|(call_id, entries)| ConversationSummary {
                call_id: call_id.clone(),
                entry_count: i64::try_from(entries.len()).unwrap_or(i64::MAX),
                flushed_at: chrono::Utc::now(),
            })
            .collect();
        summaries.sort_by(|a, b| a.call_id.cmp(&b.call_id));
        Ok(summaries)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Speaker;
    use crate::registry::SessionRegistry;
    use crate::runtime::CallBridge;
    use crate::state_machine::PeerConnectionState;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::task::JoinHandle;

    struct TestBridge {
        store: Arc<InMemoryStore>,
        registry: Arc<SessionRegistry>,
        telephony: MockPeer,
        task: JoinHandle<()>,
    }

    impl TestBridge {
        async fn wait_finished(&mut self) {
            tokio::time::timeout(Duration::from_secs(2), &mut self.task)
                .await
                .expect("bridge did not stop")
                .expect("bridge panicked");
        }
    }

    fn start_bridge(connector: ScriptedConnector, setup_timeout: Duration) -> TestBridge {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(SessionRegistry::new(store.clone()));
        start_bridge_on(&registry, store, connector, setup_timeout)
    }

    fn start_bridge_on(
        registry: &Arc<SessionRegistry>,
        store: Arc<InMemoryStore>,
        connector: ScriptedConnector,
        setup_timeout: Duration,
    ) -> TestBridge {
        let (link, telephony) = mock_link();
        let bridge = CallBridge::new(registry.clone(), Arc::new(connector), setup_timeout);
        let task = tokio::spawn(bridge.run(link));
        TestBridge {
            store,
            registry: registry.clone(),
            telephony,
            task,
        }
    }

    fn start_frame(call_sid: &str, stream_sid: &str) -> Value {
        json!({
            "event": "start",
            "start": {
                "streamSid": stream_sid,
                "callSid": call_sid,
                "customParameters": { "prompt": "You are Hope", "first_message": "Hi Vladimir" }
            }
        })
    }

    fn messages(entries: &[LogEntry]) -> Vec<String> {
        entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Caller audio in, agent audio out, then the caller hangs up
    #[tokio::test]
    async fn test_full_call_relays_and_flushes() {
        let (connector, mut agent) = ScriptedConnector::ready();
        let mut bridge = start_bridge(connector, Duration::from_secs(2));

        bridge.telephony.send_json(&start_frame("C1", "S1"));

        let init = agent.next_json().await;
        assert_eq!(init["type"], "conversation_initiation_client_data");
        assert_eq!(init["conversation_config_override"]["agent"]["prompt"]["prompt"], "You are Hope");
        assert_eq!(init["conversation_config_override"]["agent"]["first_message"], "Hi Vladimir");

        agent.send_json(&json!({"type": "audio", "audio": {"chunk": "QUJD"}}));
        assert_eq!(
            bridge.telephony.next_json().await,
            json!({"event": "media", "streamSid": "S1", "media": {"payload": "QUJD"}})
        );

        bridge
            .telephony
            .send_json(&json!({"event": "media", "media": {"payload": "AAEC"}}));
        assert_eq!(agent.next_json().await, json!({"user_audio_chunk": "AAEC"}));

        agent.send_json(&json!({"type": "ping", "ping_event": {"event_id": 42}}));
        assert_eq!(agent.next_json().await, json!({"type": "pong", "event_id": 42}));

        agent.send_json(&json!({"type": "interruption"}));
        assert_eq!(
            bridge.telephony.next_json().await,
            json!({"event": "clear", "streamSid": "S1"})
        );

        agent.send_json(&json!({
            "type": "user_transcript",
            "user_transcription_event": {"user_transcript": "my phone is broken"}
        }));
        agent.send_json(&json!({
            "type": "agent_response",
            "agent_response_event": {"agent_response": "Sorry to hear that"}
        }));
        // Let the transcripts land before the caller hangs up
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(bridge.registry.active_calls().await, vec!["C1"]);
        let live = bridge.registry.get("C1").await.unwrap();
        assert_eq!(live.peer, PeerConnectionState::Open);
        bridge.telephony.send_json(&json!({"event": "stop"}));

        agent.expect_close().await;
        bridge.wait_finished().await;

        assert!(bridge.registry.get("C1").await.is_none());
        let saved = bridge.store.saved("C1").unwrap();
        let lines = messages(&saved);
        assert!(lines.contains(&"Stream started - StreamSid: S1, CallSid: C1".to_string()));
        assert!(lines.contains(&"Agent response: Sorry to hear that".to_string()));
        assert!(lines.contains(&"Stream S1 ended".to_string()));
        let transcript = saved
            .iter()
            .find(|e| e.message == "my phone is broken")
            .unwrap();
        assert_eq!(transcript.speaker, Speaker::EndUser);
        assert_eq!(bridge.store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_setup_failure_closes_telephony() {
        let mut bridge = start_bridge(
            ScriptedConnector::failing("signed url rejected"),
            Duration::from_secs(2),
        );

        bridge.telephony.expect_close().await;
        bridge.wait_finished().await;
        // No stream start: nothing to flush
        assert_eq!(bridge.store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_setup_timeout_closes_telephony() {
        let mut bridge = start_bridge(ScriptedConnector::hanging(), Duration::from_millis(50));
        bridge.telephony.send_json(&start_frame("C9", "S9"));

        bridge.telephony.expect_close().await;
        bridge.wait_finished().await;

        let saved = bridge.store.saved("C9").unwrap();
        assert!(saved
            .iter()
            .any(|e| e.speaker == Speaker::AiSystem && e.message.starts_with("Setup error:")));
    }

    #[tokio::test]
    async fn test_agent_disconnect_closes_telephony_and_flushes() {
        let (connector, mut agent) = ScriptedConnector::ready();
        let mut bridge = start_bridge(connector, Duration::from_secs(2));
        bridge.telephony.send_json(&start_frame("C2", "S2"));
        agent.next_json().await;

        agent.close();
        bridge.telephony.expect_close().await;
        bridge.wait_finished().await;

        let lines = messages(&bridge.store.saved("C2").unwrap());
        assert!(lines.contains(&"Disconnected".to_string()));
    }

    #[tokio::test]
    async fn test_telephony_disconnect_closes_agent() {
        let (connector, mut agent) = ScriptedConnector::ready();
        let mut bridge = start_bridge(connector, Duration::from_secs(2));
        bridge.telephony.send_json(&start_frame("C3", "S3"));
        agent.next_json().await;

        bridge.telephony.fail("connection reset");
        agent.expect_close().await;
        bridge.wait_finished().await;

        let lines = messages(&bridge.store.saved("C3").unwrap());
        assert!(lines.iter().any(|l| l.starts_with("Client disconnected")));
    }

    #[tokio::test]
    async fn test_agent_audio_before_start_is_dropped() {
        let (connector, mut agent) = ScriptedConnector::ready();
        let mut bridge = start_bridge(connector, Duration::from_secs(2));

        agent.send_json(&json!({"type": "audio", "audio": {"chunk": "QUJD"}}));
        tokio::time::sleep(Duration::from_millis(50)).await;

        bridge.telephony.send_json(&start_frame("C4", "S4"));
        agent.next_json().await;
        assert!(bridge.telephony.drain().is_empty());

        bridge.telephony.send_json(&json!({"event": "stop"}));
        bridge.wait_finished().await;
        let lines = messages(&bridge.store.saved("C4").unwrap());
        assert!(!lines.iter().any(|l| l.contains("QUJD")));
        assert!(!lines.iter().any(|l| l.contains("no StreamSid")));
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_stop_the_bridge() {
        let (connector, mut agent) = ScriptedConnector::ready();
        let mut bridge = start_bridge(connector, Duration::from_secs(2));
        bridge.telephony.send_json(&start_frame("C5", "S5"));
        agent.next_json().await;

        agent.send_text("{not json");
        bridge
            .telephony
            .send_json(&json!({"event": "media", "media": {"payload": "***"}}));
        agent.send_json(&json!({"type": "audio", "audio": {"chunk": "QUJD"}}));

        assert_eq!(
            bridge.telephony.next_json().await,
            json!({"event": "media", "streamSid": "S5", "media": {"payload": "QUJD"}})
        );

        bridge.telephony.send_json(&json!({"event": "stop"}));
        bridge.wait_finished().await;
        let saved = bridge.store.saved("C5").unwrap();
        let errors: Vec<_> = saved
            .iter()
            .filter(|e| e.message.starts_with("Error processing message"))
            .collect();
        assert_eq!(errors.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_isolated() {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(SessionRegistry::new(store.clone()));

        let (connector_a, mut agent_a) = ScriptedConnector::ready();
        let (connector_b, mut agent_b) = ScriptedConnector::ready();
        let mut a = start_bridge_on(&registry, store.clone(), connector_a, Duration::from_secs(2));
        let mut b = start_bridge_on(&registry, store.clone(), connector_b, Duration::from_secs(2));

        a.telephony.send_json(&start_frame("CA", "SA"));
        b.telephony.send_json(&start_frame("CB", "SB"));
        agent_a.next_json().await;
        agent_b.next_json().await;

        for i in 0..3 {
            agent_a.send_json(&json!({
                "type": "agent_response",
                "agent_response_event": {"agent_response": format!("a{i}")}
            }));
            agent_b.send_json(&json!({
                "type": "agent_response",
                "agent_response_event": {"agent_response": format!("b{i}")}
            }));
        }
        agent_a.send_json(&json!({"type": "audio", "audio": {"chunk": "QQ=="}}));
        agent_b.send_json(&json!({"type": "audio", "audio": {"chunk": "Qg=="}}));

        assert_eq!(a.telephony.next_json().await["streamSid"], "SA");
        assert_eq!(b.telephony.next_json().await["streamSid"], "SB");

        a.telephony.send_json(&json!({"event": "stop"}));
        b.telephony.send_json(&json!({"event": "stop"}));
        a.wait_finished().await;
        b.wait_finished().await;

        let responses = |call_id: &str| -> Vec<String> {
            messages(&store.saved(call_id).unwrap())
                .into_iter()
                .filter(|m| m.starts_with("Agent response: "))
                .collect()
        };
        assert_eq!(
            responses("CA"),
            vec!["Agent response: a0", "Agent response: a1", "Agent response: a2"]
        );
        assert_eq!(
            responses("CB"),
            vec!["Agent response: b0", "Agent response: b1", "Agent response: b2"]
        );
        assert!(registry.active_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_hangup_during_setup_abandons_connection() {
        let connector = Arc::new(ScriptedConnector::hanging());
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(SessionRegistry::new(store.clone()));
        let (link, telephony) = mock_link();
        let bridge = CallBridge::new(registry, connector.clone(), Duration::from_secs(30));
        let task = tokio::spawn(bridge.run(link));

        telephony.send_json(&start_frame("C6", "S6"));
        telephony.send_json(&json!({"event": "stop"}));

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("bridge waited for the setup timeout")
            .unwrap();
        assert_eq!(connector.attempts(), 1);
        assert!(store.saved("C6").is_some());
    }
}
