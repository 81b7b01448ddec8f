// Network gateway contract consumed by the live state, plus the failure
// taxonomy every fetch resolves to when it does not succeed.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::analytics::{CaptainSuggestion, CashCowRecommendation};
use crate::model::team::TeamPayload;
use crate::protocol::ConnectivityState;

pub use http::HttpGateway;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a fetch failed. `Clone` so one in-flight outcome can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("malformed response: {0}")]
    DecodeError(String),
}

impl FetchError {
    /// Connectivity state to show after this failure.
    pub fn connectivity(&self) -> ConnectivityState {
        match self {
            FetchError::NetworkUnreachable(_) | FetchError::Timeout => {
                ConnectivityState::Disconnected
            }
            FetchError::ServerError { .. } | FetchError::DecodeError(_) => ConnectivityState::Error,
        }
    }

    /// Message suitable for the error card or banner.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::NetworkUnreachable(_) => {
                "You're offline. Showing your last synced team.".to_string()
            }
            FetchError::Timeout => {
                "The server took too long to respond. Pull to try again.".to_string()
            }
            FetchError::ServerError { status, .. } => {
                format!("The server hit a problem ({status}). Please try again shortly.")
            }
            FetchError::DecodeError(_) => {
                "Received data we couldn't read. Your last synced team is still shown.".to_string()
            }
        }
    }

    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NetworkUnreachable(_) | FetchError::Timeout => true,
            FetchError::ServerError { status, .. } => *status >= 500,
            FetchError::DecodeError(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// Remote source of team and analytics data.
///
/// Each call resolves exactly once. Any retrying happens inside the
/// implementation; callers only see the final outcome.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    async fn fetch_team(&self) -> Result<TeamPayload, FetchError>;

    async fn fetch_captain_suggestions(&self) -> Result<Vec<CaptainSuggestion>, FetchError>;

    async fn fetch_cash_cow_recommendations(
        &self,
    ) -> Result<Vec<CashCowRecommendation>, FetchError>;
}
