//! Twilio media stream WebSocket endpoint

use super::AppState;
use crate::runtime::{telephony_link, CallBridge};
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use std::sync::Arc;

/// Upgrade and hand the socket to a fresh bridge for the lifetime of the call
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let bridge = CallBridge::new(
            Arc::clone(&state.registry),
            Arc::clone(&state.connector),
            state.config.agent_setup_timeout,
        );
        bridge.run(telephony_link(socket)).await;
    })
}
