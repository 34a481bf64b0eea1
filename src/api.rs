//! HTTP API for parley
//!
//! Health and inspection routes, the action evaluator, outbound call
//! placement, TwiML, and the Twilio media stream WebSocket.

mod handlers;
mod media_stream;
mod twiml;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::Config;
use crate::evaluation::ActionEvaluator;
use crate::outbound::CallInitiator;
use crate::registry::SessionRegistry;
use crate::runtime::AgentConnector;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub connector: Arc<dyn AgentConnector>,
    pub evaluator: Arc<ActionEvaluator>,
    /// `None` when Twilio credentials are not configured
    pub initiator: Option<Arc<dyn CallInitiator>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn AgentConnector>,
        evaluator: ActionEvaluator,
        initiator: Option<Arc<dyn CallInitiator>>,
    ) -> Self {
        Self {
            registry,
            connector,
            evaluator: Arc::new(evaluator),
            initiator,
            config: Arc::new(config),
        }
    }
}
