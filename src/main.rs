//! parley - Twilio to ElevenLabs voice bridge
//!
//! Relays call audio between Twilio Media Streams and an ElevenLabs
//! Conversational AI agent, keeps per-call conversation logs, and serves a
//! Monte Carlo next-action evaluator.

mod api;
mod config;
mod convai;
mod db;
mod evaluation;
mod outbound;
mod protocol;
mod registry;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::Config;
use convai::ConvaiConnector;
use db::Database;
use evaluation::{ActionEvaluator, UniformEstimator};
use outbound::{CallInitiator, TwilioCallInitiator};
use registry::SessionRegistry;
use runtime::DatabaseStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env();
    config.warn_missing();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    let registry = Arc::new(SessionRegistry::new(Arc::new(DatabaseStore::new(db))));

    // Collaborators
    let connector = Arc::new(ConvaiConnector::new(
        config.elevenlabs_api_key.clone(),
        config.elevenlabs_agent_id.clone(),
    ));
    let evaluator = ActionEvaluator::new(UniformEstimator)
        .with_max_parallelism(config.eval_max_parallelism)
        .with_limits(config.eval_max_candidates, config.eval_max_rollouts);
    let initiator = config
        .twilio
        .clone()
        .map(|twilio| Arc::new(TwilioCallInitiator::new(twilio)) as Arc<dyn CallInitiator>);

    let port = config.port;
    let state = AppState::new(config, registry, connector, evaluator, initiator);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
