//! Outbound call placement through the Twilio REST API

use crate::config::TwilioConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("Twilio request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Twilio rejected the call ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Places a phone call whose media is driven by the TwiML at `twiml_url`
#[async_trait]
pub trait CallInitiator: Send + Sync {
    /// Returns the provider's call id
    async fn initiate(&self, to: &str, twiml_url: &str) -> Result<String, InitiateError>;
}

#[async_trait]
impl<T: CallInitiator + ?Sized> CallInitiator for Arc<T> {
    async fn initiate(&self, to: &str, twiml_url: &str) -> Result<String, InitiateError> {
        (**self).initiate(to, twiml_url).await
    }
}

#[derive(Debug, Deserialize)]
struct CreatedCall {
    sid: String,
}

pub struct TwilioCallInitiator {
    client: Client,
    base_url: String,
    config: TwilioConfig,
}

impl TwilioCallInitiator {
    pub fn new(config: TwilioConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: TWILIO_API_BASE.to_string(),
            config,
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.base_url, self.config.account_sid
        )
    }
}

#[async_trait]
impl CallInitiator for TwilioCallInitiator {
    async fn initiate(&self, to: &str, twiml_url: &str) -> Result<String, InitiateError> {
        let form = [
            ("From", self.config.phone_number.as_str()),
            ("To", to),
            ("Url", twiml_url),
        ];
        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InitiateError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let call: CreatedCall = response.json().await?;
        tracing::info!(call_sid = %call.sid, to, "Outbound call created");
        Ok(call.sid)
    }
}
