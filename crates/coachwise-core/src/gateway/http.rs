// HTTP implementation of the network gateway.
//
// Fetches JSON from the coachwise API with a per-request timeout, retries
// transient failures with exponential backoff, and classifies everything else
// into `FetchError` so the live state never sees a raw transport error.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::gateway::{FetchError, NetworkGateway};
use crate::model::analytics::{CaptainSuggestion, CashCowRecommendation};
use crate::model::team::TeamPayload;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const CAPTAINS_PATH: &str = "/captains";
const CASH_COWS_PATH: &str = "/cash-cows";

/// Longest error-body excerpt carried into a `ServerError`.
const MAX_ERROR_BODY: usize = 200;

/// Backoff doubles per attempt up to this many doublings.
const MAX_BACKOFF_SHIFT: u32 = 6;

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    team_id: String,
    session_token: Option<String>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl HttpGateway {
    /// Build a gateway from the application config.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            team_id: config.api.team_id.clone(),
            session_token: config
                .credentials
                .session_token
                .clone()
                .filter(|t| !t.is_empty()),
            max_attempts: config.api.max_attempts.max(1),
            backoff_base: config.api.backoff_base(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/teams/{}{}", self.base_url, self.team_id, suffix)
    }

    /// GET `suffix` and decode the body, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(&self, suffix: &str) -> Result<T, FetchError> {
        let url = self.url(suffix);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(&url).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let backoff = backoff_delay(self.backoff_base, attempt);
                    warn!(attempt, ?backoff, error = %err, url = %url, "fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut request = self.http.get(url).header("accept", "application/json");
        if let Some(token) = &self.session_token {
            request = request.bearer_auth(token);
        }

        let res = request.send().await.map_err(classify_transport)?;
        let status = res.status();
        let body = res.bytes().await.map_err(classify_transport)?;
        debug!(url, %status, bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::DecodeError(e.to_string()))
    }
}

#[async_trait]
impl NetworkGateway for HttpGateway {
    async fn fetch_team(&self) -> Result<TeamPayload, FetchError> {
        let payload: TeamPayload = self.get_json("").await?;
        payload.validate().map_err(FetchError::DecodeError)?;
        Ok(payload)
    }

    async fn fetch_captain_suggestions(&self) -> Result<Vec<CaptainSuggestion>, FetchError> {
        let suggestions: Vec<CaptainSuggestion> = self.get_json(CAPTAINS_PATH).await?;
        for s in &suggestions {
            s.validate().map_err(FetchError::DecodeError)?;
        }
        Ok(suggestions)
    }

    async fn fetch_cash_cow_recommendations(
        &self,
    ) -> Result<Vec<CashCowRecommendation>, FetchError> {
        let recs: Vec<CashCowRecommendation> = self.get_json(CASH_COWS_PATH).await?;
        for r in &recs {
            r.validate().map_err(FetchError::DecodeError)?;
        }
        Ok(recs)
    }
}

/// Pause after failed attempt `attempt` (1-based) before trying again.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT))
}

// ---------------------------------------------------------------------------
// Error classification helpers
// ---------------------------------------------------------------------------

/// Map a reqwest transport error onto the failure taxonomy.
fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_decode() || err.is_body() {
        FetchError::DecodeError(err.to_string())
    } else {
        FetchError::NetworkUnreachable(err.to_string())
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
