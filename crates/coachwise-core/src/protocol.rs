// Types published from the live state to the view layer.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::analytics::{CaptainSuggestion, CashCowRecommendation};
use crate::model::player::PlayerRecord;
use crate::model::team::TeamSnapshot;

/// Connection status shown in the offline banner and pull indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    Connecting,
    /// Server reachable, but no team data has landed yet.
    Connected,
    /// Team data is fresh from the server.
    Live,
    Error,
}

impl ConnectivityState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityState::Disconnected => "Offline",
            ConnectivityState::Connecting => "Syncing",
            ConnectivityState::Connected => "Connected",
            ConnectivityState::Live => "Live",
            ConnectivityState::Error => "Error",
        }
    }
}

/// The independently refreshed parts of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Domain {
    Team,
    Captains,
    CashCows,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Domain::Team => "team",
            Domain::Captains => "captains",
            Domain::CashCows => "cash_cows",
        })
    }
}

/// The most recent refresh failure, tagged with the domain that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    pub domain: Domain,
    pub message: String,
    /// The failure meant the server could not be reached.
    pub offline: bool,
}

/// How the view layer should surface the current error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPresentation {
    None,
    /// Offline with nothing recent to show.
    OfflineBanner,
    /// Dismissible card carrying the error message.
    InlineCard(String),
}

/// Everything the view layer renders, captured in one consistent value.
///
/// Data sections are shared behind `Arc`, so cloning a snapshot is cheap and a
/// clone can be modified (via `Arc::make_mut`) without touching the live
/// state.
#[derive(Debug, Clone, Default)]
pub struct AppSnapshot {
    pub team: Arc<TeamSnapshot>,
    pub captains: Arc<Vec<CaptainSuggestion>>,
    pub cash_cows: Arc<Vec<CashCowRecommendation>>,
    pub connectivity: ConnectivityState,
    pub last_error: Option<ErrorNotice>,
    pub is_refreshing: bool,
    pub is_loading_captains: bool,
    pub is_loading_cash_cows: bool,
    /// The most recent team refresh succeeded.
    pub team_current: bool,
    /// Completion time of the most recent successful refresh of any domain.
    pub last_success: Option<DateTime<Utc>>,
}

impl AppSnapshot {
    pub fn is_connected(&self) -> bool {
        matches!(
            self.connectivity,
            ConnectivityState::Connected | ConnectivityState::Live
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }

    pub fn is_loading(&self, domain: Domain) -> bool {
        match domain {
            Domain::Team => self.is_refreshing,
            Domain::Captains => self.is_loading_captains,
            Domain::CashCows => self.is_loading_cash_cows,
        }
    }

    pub fn any_in_flight(&self) -> bool {
        self.is_refreshing || self.is_loading_captains || self.is_loading_cash_cows
    }

    /// Resolve a captain suggestion to the player it refers to, if that player
    /// is in the current team.
    pub fn captain_player(&self, suggestion: &CaptainSuggestion) -> Option<&PlayerRecord> {
        self.team.player(&suggestion.player_id)
    }

    /// Decide between the offline banner and the inline error card.
    ///
    /// The banner shows while disconnected unless a refresh succeeded within
    /// `stale_after` of `now`; otherwise any recorded error shows as a card.
    pub fn error_presentation(&self, now: DateTime<Utc>, stale_after: Duration) -> ErrorPresentation {
        let recent_success = self
            .last_success
            .is_some_and(|at| now.signed_duration_since(at) <= stale_after);

        if self.connectivity == ConnectivityState::Disconnected && !recent_success {
            return ErrorPresentation::OfflineBanner;
        }
        match &self.last_error {
            Some(notice) => ErrorPresentation::InlineCard(notice.message.clone()),
            None => ErrorPresentation::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn default_snapshot_starts_disconnected_and_empty() {
        let snap = AppSnapshot::default();
        assert_eq!(snap.connectivity, ConnectivityState::Disconnected);
        assert!(!snap.is_connected());
        assert!(snap.team.players.is_empty());
        assert!(snap.captains.is_empty());
        assert!(snap.cash_cows.is_empty());
        assert!(!snap.any_in_flight());
        assert_eq!(snap.error_message(), None);
    }

    #[test]
    fn offline_without_recent_success_shows_banner() {
        let snap = AppSnapshot::default();
        assert_eq!(
            snap.error_presentation(at(0), Duration::minutes(5)),
            ErrorPresentation::OfflineBanner
        );

        let stale = AppSnapshot {
            last_success: Some(at(0)),
            last_error: Some(ErrorNotice {
                domain: Domain::Team,
                message: "offline".into(),
                offline: true,
            }),
            ..AppSnapshot::default()
        };
        assert_eq!(
            stale.error_presentation(at(600), Duration::minutes(5)),
            ErrorPresentation::OfflineBanner
        );
    }

    #[test]
    fn offline_with_recent_success_shows_card() {
        let snap = AppSnapshot {
            last_success: Some(at(0)),
            last_error: Some(ErrorNotice {
                domain: Domain::Team,
                message: "You're offline".into(),
                offline: true,
            }),
            ..AppSnapshot::default()
        };
        assert_eq!(
            snap.error_presentation(at(60), Duration::minutes(5)),
            ErrorPresentation::InlineCard("You're offline".into())
        );
    }

    #[test]
    fn live_without_error_presents_nothing() {
        let snap = AppSnapshot {
            connectivity: ConnectivityState::Live,
            last_success: Some(at(0)),
            ..AppSnapshot::default()
        };
        assert_eq!(
            snap.error_presentation(at(10_000), Duration::minutes(5)),
            ErrorPresentation::None
        );
    }

    #[test]
    fn clone_is_copy_on_write() {
        let published = AppSnapshot::default();
        let mut copy = published.clone();
        Arc::make_mut(&mut copy.captains).push(CaptainSuggestion {
            player_id: "p1".into(),
            opponent: "Geelong".into(),
            confidence: 70,
            projected_points: 110,
            form_rating: 0.5,
            fixture_rating: 0.5,
        });
        assert!(published.captains.is_empty());
        assert_eq!(copy.captains.len(), 1);
    }
}
