//! Process configuration, read once from the environment at startup

use crate::evaluation::{DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_ROLLOUTS};
use std::path::PathBuf;
use std::time::Duration;

/// Twilio REST credentials and caller id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_agent_id: Option<String>,
    /// Present only when all three Twilio variables are set
    pub twilio: Option<TwilioConfig>,
    /// Host used in TwiML stream URLs instead of the request's `Host`
    pub public_host: Option<String>,
    pub agent_setup_timeout: Duration,
    pub eval_max_parallelism: usize,
    /// Largest candidate pool `/next-action` accepts
    pub eval_max_candidates: usize,
    /// Largest `rolloutsPerCandidate` `/next-action` accepts
    pub eval_max_rollouts: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("PARLEY_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.parley/parley.db"))
            },
            PathBuf::from,
        );

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(phone_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                phone_number,
            }),
            _ => None,
        };

        Self {
            port: get("PARLEY_PORT").and_then(|p| p.parse().ok()).unwrap_or(8000),
            db_path,
            elevenlabs_api_key: get("ELEVENLABS_API_KEY"),
            elevenlabs_agent_id: get("ELEVENLABS_AGENT_ID"),
            twilio,
            public_host: get("PARLEY_PUBLIC_HOST"),
            agent_setup_timeout: Duration::from_secs(
                get("PARLEY_AGENT_SETUP_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            eval_max_parallelism: get("PARLEY_EVAL_MAX_PARALLELISM")
                .and_then(|n| n.parse().ok())
                .unwrap_or(4_usize)
                .max(1),
            eval_max_candidates: get("PARLEY_EVAL_MAX_CANDIDATES")
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_MAX_CANDIDATES)
                .max(1),
            eval_max_rollouts: get("PARLEY_EVAL_MAX_ROLLOUTS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_MAX_ROLLOUTS)
                .max(1),
        }
    }

    /// Log which integrations are usable; missing credentials are not fatal
    pub fn warn_missing(&self) {
        if self.elevenlabs_api_key.is_none() || self.elevenlabs_agent_id.is_none() {
            tracing::warn!(
                "ELEVENLABS_API_KEY or ELEVENLABS_AGENT_ID not set. Calls will fail to reach the agent."
            );
        }
        if self.twilio.is_none() {
            tracing::warn!(
                "Twilio credentials incomplete. Set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_PHONE_NUMBER to place calls."
            );
        }
    }
}
