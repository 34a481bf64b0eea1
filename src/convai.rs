//! ElevenLabs Conversational AI connector
//!
//! Each call fetches a fresh signed URL, then dials it over WebSocket.

use crate::runtime::{agent_link, AgentConnector, Link, SetupError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

pub struct ConvaiConnector {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    agent_id: Option<String>,
}

impl ConvaiConnector {
    pub fn new(api_key: Option<String>, agent_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: ELEVENLABS_API_BASE.to_string(),
            api_key,
            agent_id,
        }
    }

    async fn signed_url(&self) -> Result<String, SetupError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SetupError::NotConfigured("ELEVENLABS_API_KEY"))?;
        let agent_id = self
            .agent_id
            .as_deref()
            .ok_or(SetupError::NotConfigured("ELEVENLABS_AGENT_ID"))?;

        let response = self
            .client
            .get(format!("{}/v1/convai/conversation/get_signed_url", self.base_url))
            .query(&[("agent_id", agent_id)])
            .header("xi-api-key", api_key)
            .send()
            .await
            .map_err(|e| SetupError::SignedUrl(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SetupError::SignedUrl(format!("HTTP {status}: {body}")));
        }

        let body: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| SetupError::SignedUrl(e.to_string()))?;
        Ok(body.signed_url)
    }
}

#[async_trait]
impl AgentConnector for ConvaiConnector {
    async fn connect(&self) -> Result<Link, SetupError> {
        let url = self.signed_url().await?;
        tracing::debug!("Signed URL obtained, connecting to Conversational AI");

        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SetupError::Connect(e.to_string()))?;
        Ok(agent_link(socket))
    }
}
