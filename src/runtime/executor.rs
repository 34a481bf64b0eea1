//! Call bridge executor
//!
//! Owns the I/O for one call: two reader tasks feed typed events into a
//! single channel, the pure state machine decides, and this loop performs the
//! resulting effects.

use super::traits::{AgentConnector, FrameSink, FrameStream, InboundFrame, Link, SetupError};
use crate::db::LogEntry;
use crate::protocol::{AgentInbound, TelephonyInbound};
use crate::registry::SessionRegistry;
use crate::state_machine::{transition, BridgeState, Effect, Event, Side};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the per-call event channel
const EVENT_BUFFER: usize = 256;

/// Frames queued per peer before sends start dropping
const OUTBOUND_BUFFER: usize = 256;

/// How long a close request may wait behind queued frames
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type SetupHandle = JoinHandle<Result<Link, SetupError>>;

/// Bridges one telephony media stream to one conversational-AI session
pub struct CallBridge {
    connection_id: String,
    state: BridgeState,
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn AgentConnector>,
    setup_timeout: Duration,
    setup: Option<SetupHandle>,
    telephony: Option<Outbound>,
    agent: Option<Outbound>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    /// Cancelled on entry to `Closing`; stops both reader tasks
    readers: CancellationToken,
}

impl CallBridge {
    pub fn new(
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn AgentConnector>,
        setup_timeout: Duration,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            state: BridgeState::default(),
            registry,
            connector,
            setup_timeout,
            setup: None,
            telephony: None,
            agent: None,
            event_rx,
            event_tx,
            readers: CancellationToken::new(),
        }
    }

    /// Run the bridge until both sides are torn down
    pub async fn run(mut self, telephony: Link) {
        tracing::info!(connection_id = %self.connection_id, "Telephony client connected");

        let Link { sink, stream } = telephony;
        self.telephony = Some(Outbound::spawn(Side::Telephony, sink));
        self.spawn_reader(Side::Telephony, stream);

        // The AI side is dialled speculatively, before the stream announces itself
        let connector = Arc::clone(&self.connector);
        let timeout = self.setup_timeout;
        self.setup = Some(tokio::spawn(async move {
            tokio::time::timeout(timeout, connector.connect())
                .await
                .unwrap_or(Err(SetupError::Timeout(timeout)))
        }));

        while !self.state.is_terminal() {
            tokio::select! {
                result = setup_finished(&mut self.setup) => {
                    let event = match result {
                        Ok(link) => {
                            self.attach_agent(link);
                            Event::AgentConnected
                        }
                        Err(e) => {
                            tracing::warn!(
                                connection_id = %self.connection_id,
                                error = %e,
                                "Conversational AI setup failed"
                            );
                            Event::AgentSetupFailed { reason: e.to_string() }
                        }
                    };
                    self.process_event(event).await;
                }
                Some(event) = self.event_rx.recv() => {
                    self.process_event(event).await;
                }
            }
        }

        if let Some(setup) = self.setup.take() {
            setup.abort();
        }
        tracing::info!(
            connection_id = %self.connection_id,
            call_id = self.state.call_id().unwrap_or_default(),
            "Call bridge stopped"
        );
    }

    fn attach_agent(&mut self, link: Link) {
        tracing::info!(connection_id = %self.connection_id, "Conversational AI connected");
        let Link { sink, stream } = link;
        self.agent = Some(Outbound::spawn(Side::Agent, sink));
        self.spawn_reader(Side::Agent, stream);
    }

    fn spawn_reader(&self, side: Side, mut stream: FrameStream) {
        let event_tx = self.event_tx.clone();
        let cancel = self.readers.clone();
        let connection_id = self.connection_id.clone();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    next = stream.next() => next,
                };

                let (event, done) = match next {
                    Some(Ok(InboundFrame::Text(text))) => (decode(side, &text), false),
                    Some(Ok(InboundFrame::Close(reason))) => (closed(side, reason), true),
                    Some(Err(e)) => (closed(side, Some(e.to_string())), true),
                    None => (closed(side, None), true),
                };
                if event_tx.send(event).await.is_err() || done {
                    break;
                }
            }
            tracing::debug!(connection_id = %connection_id, side = side.as_str(), "Reader stopped");
        });
    }

    async fn process_event(&mut self, event: Event) {
        // Chained events (teardown completion) are handled before the next inbound frame
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(connection_id = %self.connection_id, error = %e, "Event ignored");
                    continue;
                }
            };

            if result.new_state.name() != self.state.name() {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    from = self.state.name(),
                    to = result.new_state.name(),
                    "State transition"
                );
            }
            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::RegisterSession(session) => {
                tracing::info!(
                    connection_id = %self.connection_id,
                    call_id = %session.call_id,
                    stream_id = %session.stream_id,
                    "Session registered"
                );
                self.registry.upsert(session).await;
                None
            }

            Effect::UpdateSession(session) => {
                tracing::debug!(
                    call_id = %session.call_id,
                    peer = ?session.peer,
                    "Session updated"
                );
                self.registry.upsert(session).await;
                None
            }

            Effect::AppendLog {
                call_id,
                speaker,
                message,
            } => {
                tracing::info!(call_id = %call_id, speaker = %speaker, "{message}");
                self.registry
                    .append(&call_id, LogEntry::now(speaker, message))
                    .await;
                None
            }

            Effect::Diagnostic { side, message } => {
                tracing::info!(
                    connection_id = %self.connection_id,
                    side = side.as_str(),
                    "{message}"
                );
                None
            }

            Effect::Dropped { side, reason } => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    side = side.as_str(),
                    reason = %reason,
                    "Frame dropped"
                );
                None
            }

            Effect::SendToAgent(message) => {
                match &self.agent {
                    Some(agent) => agent.send(message.encode()),
                    None => tracing::debug!(
                        connection_id = %self.connection_id,
                        "No conversational AI connection, message dropped"
                    ),
                }
                None
            }

            Effect::SendToTelephony(message) => {
                if let Some(telephony) = &self.telephony {
                    telephony.send(message.encode());
                }
                None
            }

            Effect::CloseAgent => {
                if let Some(setup) = self.setup.take() {
                    tracing::info!(connection_id = %self.connection_id, "Abandoning conversational AI setup");
                    setup.abort();
                }
                if let Some(agent) = &self.agent {
                    agent.close().await;
                }
                None
            }

            Effect::CloseTelephony => {
                if let Some(telephony) = &self.telephony {
                    telephony.close().await;
                }
                None
            }

            Effect::CancelReaders => {
                self.readers.cancel();
                None
            }

            Effect::FinishTeardown => Some(Event::TeardownComplete),

            Effect::FlushLog { call_id } => {
                match self.registry.remove(&call_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => tracing::debug!(call_id = %call_id, "Nothing to flush"),
                    Err(e) => tracing::error!(
                        call_id = %call_id,
                        error = %e,
                        "Failed to flush conversation log"
                    ),
                }
                None
            }
        }
    }
}

/// Resolves when the pending setup task finishes; pends forever if there is none
async fn setup_finished(setup: &mut Option<SetupHandle>) -> Result<Link, SetupError> {
    let Some(handle) = setup else {
        return std::future::pending().await;
    };
    let result = match handle.await {
        Ok(result) => result,
        Err(e) => Err(SetupError::Connect(e.to_string())),
    };
    *setup = None;
    result
}

fn decode(side: Side, text: &str) -> Event {
    let decoded = match side {
        Side::Telephony => TelephonyInbound::decode(text).map(Event::TelephonyFrame),
        Side::Agent => AgentInbound::decode(text).map(Event::AgentFrame),
    };
    decoded.unwrap_or_else(|e| Event::Malformed {
        side,
        error: e.to_string(),
    })
}

fn closed(side: Side, reason: Option<String>) -> Event {
    match side {
        Side::Telephony => Event::TelephonyClosed { reason },
        Side::Agent => Event::AgentClosed { reason },
    }
}

// ============================================================================
// Outbound writers
// ============================================================================

enum Outgoing {
    Frame(String),
    Close,
}

/// Handle to a peer's writer task
///
/// Frames are queued without blocking the bridge; a full queue drops the frame.
struct Outbound {
    side: Side,
    tx: mpsc::Sender<Outgoing>,
}

impl Outbound {
    fn spawn(side: Side, mut sink: Box<dyn FrameSink>) -> Self {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(async move {
            while let Some(outgoing) = rx.recv().await {
                match outgoing {
                    Outgoing::Frame(text) => {
                        if let Err(e) = sink.send_text(text).await {
                            tracing::debug!(side = side.as_str(), error = %e, "Send failed");
                        }
                    }
                    Outgoing::Close => {
                        if let Err(e) = sink.close().await {
                            tracing::debug!(side = side.as_str(), error = %e, "Close failed");
                        }
                        break;
                    }
                }
            }
        });
        Self { side, tx }
    }

    fn send(&self, text: String) {
        if let Err(e) = self.tx.try_send(Outgoing::Frame(text)) {
            tracing::warn!(side = self.side.as_str(), error = %e, "Outbound frame dropped");
        }
    }

    async fn close(&self) {
        if self
            .tx
            .send_timeout(Outgoing::Close, CLOSE_TIMEOUT)
            .await
            .is_err()
        {
            tracing::debug!(side = self.side.as_str(), "Peer already closed");
        }
    }
}
