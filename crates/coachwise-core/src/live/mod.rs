// Live application state: the single owner of the team snapshot, the captain
// and cash-cow sequences, and connectivity.
//
// Views read copies of the published `AppSnapshot` (via `snapshot()` or a
// `watch` subscription) and ask for refreshes. Each refresh fetches one domain
// through the injected gateway and merges the result as one whole-section
// replace; failures only touch connectivity and the error notice. Refreshes of
// the same domain are deduplicated, refreshes of different domains overlap.

mod inflight;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::gateway::{FetchError, NetworkGateway};
use crate::model::analytics::{CaptainSuggestion, CashCowRecommendation};
use crate::model::player::DerivationRules;
use crate::model::team::{TeamPayload, TeamSnapshot};
use crate::protocol::{AppSnapshot, ConnectivityState, Domain, ErrorNotice};

use inflight::InFlight;
pub use inflight::RefreshOutcome;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default bound on one gateway call before it is reported as a timeout.
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(35);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Tunables for the live state.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub fetch_deadline: Duration,
    pub rules: DerivationRules,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fetch_deadline: DEFAULT_FETCH_DEADLINE,
            rules: DerivationRules::default(),
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_deadline: config.sync.fetch_deadline(),
            rules: config.derivation_rules(),
        }
    }
}

/// Per-domain outcomes of [`LiveAppState::refresh_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub team: RefreshOutcome,
    pub captains: RefreshOutcome,
    pub cash_cows: RefreshOutcome,
}

impl RefreshReport {
    pub fn is_all_ok(&self) -> bool {
        self.team.is_ok() && self.captains.is_ok() && self.cash_cows.is_ok()
    }

    pub fn failures(&self) -> Vec<(Domain, &FetchError)> {
        [
            (Domain::Team, &self.team),
            (Domain::Captains, &self.captains),
            (Domain::CashCows, &self.cash_cows),
        ]
        .into_iter()
        .filter_map(|(domain, outcome)| outcome.as_ref().err().map(|e| (domain, e)))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// LiveAppState
// ---------------------------------------------------------------------------

/// Handle to the live state. Cheap to clone; every clone drives the same
/// state.
#[derive(Clone)]
pub struct LiveAppState {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn NetworkGateway>,
    settings: SyncSettings,
    snapshot_tx: watch::Sender<AppSnapshot>,
    team_flight: InFlight,
    captains_flight: InFlight,
    cash_cows_flight: InFlight,
}

impl LiveAppState {
    /// Create an empty, disconnected state fetching through `gateway`.
    pub fn new(gateway: Arc<dyn NetworkGateway>, settings: SyncSettings) -> Self {
        let (snapshot_tx, _rx) = watch::channel(AppSnapshot::default());
        LiveAppState {
            inner: Arc::new(Inner {
                gateway,
                settings,
                snapshot_tx,
                team_flight: InFlight::default(),
                captains_flight: InFlight::default(),
                cash_cows_flight: InFlight::default(),
            }),
        }
    }

    /// A copy of the current snapshot. Changing it never affects the live
    /// state.
    pub fn snapshot(&self) -> AppSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot changes. The receiver is notified after every
    /// merge, failure, and flag change.
    pub fn subscribe(&self) -> watch::Receiver<AppSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Refresh the team snapshot.
    pub async fn refresh_data(&self) -> RefreshOutcome {
        self.refresh(Domain::Team).await
    }

    /// Refresh the captain suggestions.
    pub async fn refresh_captains(&self) -> RefreshOutcome {
        self.refresh(Domain::Captains).await
    }

    /// Refresh the cash-cow recommendations.
    pub async fn refresh_cash_cows(&self) -> RefreshOutcome {
        self.refresh(Domain::CashCows).await
    }

    /// Refresh all three domains concurrently.
    pub async fn refresh_all(&self) -> RefreshReport {
        let (team, captains, cash_cows) = tokio::join!(
            self.refresh_data(),
            self.refresh_captains(),
            self.refresh_cash_cows()
        );
        RefreshReport {
            team,
            captains,
            cash_cows,
        }
    }

    /// Dismiss the current error notice. Connectivity and data are untouched,
    /// and subscribers are not woken when there was nothing to clear.
    pub fn clear_error(&self) {
        let cleared = self
            .inner
            .snapshot_tx
            .send_if_modified(|snap| snap.last_error.take().is_some());
        if cleared {
            debug!("error notice cleared");
        }
    }

    /// Run [`refresh_all`](Self::refresh_all) every `every`, starting now.
    /// Abort the returned handle to stop. A zero interval disables the
    /// cadence and nothing is spawned.
    pub fn spawn_auto_refresh(&self, every: Duration) -> Option<JoinHandle<()>> {
        if every.is_zero() {
            debug!("auto refresh disabled");
            return None;
        }
        let state = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = state.refresh_all().await;
                if report.is_all_ok() {
                    debug!("scheduled refresh complete");
                } else {
                    for (domain, err) in report.failures() {
                        debug!(%domain, error = %err, "scheduled refresh failed");
                    }
                }
            }
        }))
    }

    /// Whether a refresh of `domain` is currently running.
    pub async fn is_in_flight(&self, domain: Domain) -> bool {
        self.inner.flight(domain).is_pending().await
    }

    async fn refresh(&self, domain: Domain) -> RefreshOutcome {
        let inner = self.inner.clone();
        let (pending, joined) = self
            .inner
            .flight(domain)
            .join_or_start(move || run_refresh(inner, domain).boxed())
            .await;
        if joined {
            debug!(%domain, "joining in-flight refresh");
        }
        pending.await
    }
}

// ---------------------------------------------------------------------------
// Refresh pipeline
// ---------------------------------------------------------------------------

/// Fetch one domain and publish the outcome. Always terminates: the gateway
/// call is bounded by the fetch deadline.
async fn run_refresh(inner: Arc<Inner>, domain: Domain) -> RefreshOutcome {
    inner.begin(domain);

    // Nothing reaches a merge without passing validation, whatever the gateway.
    let outcome = match domain {
        Domain::Team => inner
            .bounded(domain, inner.gateway.fetch_team())
            .await
            .and_then(|payload| checked(payload, TeamPayload::validate))
            .map(|payload| inner.merge_team(payload)),
        Domain::Captains => inner
            .bounded(domain, inner.gateway.fetch_captain_suggestions())
            .await
            .and_then(|suggestions| {
                checked(suggestions, |all| {
                    all.iter().try_for_each(CaptainSuggestion::validate)
                })
            })
            .map(|suggestions| inner.merge_captains(suggestions)),
        Domain::CashCows => inner
            .bounded(domain, inner.gateway.fetch_cash_cow_recommendations())
            .await
            .and_then(|recs| {
                checked(recs, |all| {
                    all.iter().try_for_each(CashCowRecommendation::validate)
                })
            })
            .map(|recs| inner.merge_cash_cows(recs)),
    };

    if let Err(err) = &outcome {
        inner.record_failure(domain, err);
    }

    inner.flight(domain).clear().await;
    outcome
}

/// Pass `value` through when `validate` accepts it; a rejection is a decode
/// failure like any other malformed response.
fn checked<T>(
    value: T,
    validate: impl FnOnce(&T) -> Result<(), String>,
) -> Result<T, FetchError> {
    validate(&value).map_err(FetchError::DecodeError)?;
    Ok(value)
}

impl Inner {
    fn flight(&self, domain: Domain) -> &InFlight {
        match domain {
            Domain::Team => &self.team_flight,
            Domain::Captains => &self.captains_flight,
            Domain::CashCows => &self.cash_cows_flight,
        }
    }

    async fn bounded<T, F>(&self, domain: Domain, fetch: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        match tokio::time::timeout(self.settings.fetch_deadline, fetch).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%domain, deadline = ?self.settings.fetch_deadline, "gateway call exceeded deadline");
                Err(FetchError::Timeout)
            }
        }
    }

    fn begin(&self, domain: Domain) {
        info!(%domain, "refresh started");
        self.snapshot_tx.send_modify(|snap| {
            set_loading(snap, domain, true);
            snap.connectivity = ConnectivityState::Connecting;
        });
    }

    fn merge_team(&self, payload: TeamPayload) {
        let now = Utc::now();
        let players = payload.players.len();
        let rules = self.settings.rules;
        self.snapshot_tx.send_modify(|snap| {
            let team = TeamSnapshot::from_payload(payload, &snap.team, &rules, now);
            snap.team = Arc::new(team);
            finish_success(snap, Domain::Team, now);
        });
        info!(domain = %Domain::Team, players, "team snapshot replaced");
    }

    fn merge_captains(&self, suggestions: Vec<CaptainSuggestion>) {
        let now = Utc::now();
        let count = suggestions.len();
        self.snapshot_tx.send_modify(|snap| {
            snap.captains = Arc::new(suggestions);
            finish_success(snap, Domain::Captains, now);
        });
        info!(domain = %Domain::Captains, count, "captain suggestions replaced");
    }

    fn merge_cash_cows(&self, recs: Vec<CashCowRecommendation>) {
        let now = Utc::now();
        let count = recs.len();
        self.snapshot_tx.send_modify(|snap| {
            snap.cash_cows = Arc::new(recs);
            finish_success(snap, Domain::CashCows, now);
        });
        info!(domain = %Domain::CashCows, count, "cash cow recommendations replaced");
    }

    fn record_failure(&self, domain: Domain, err: &FetchError) {
        warn!(%domain, error = %err, "refresh failed; keeping previous data");
        let notice = ErrorNotice {
            domain,
            message: err.user_message(),
            offline: err.connectivity() == ConnectivityState::Disconnected,
        };
        self.snapshot_tx.send_modify(|snap| {
            set_loading(snap, domain, false);
            if domain == Domain::Team {
                snap.team_current = false;
            }
            snap.connectivity = err.connectivity();
            snap.last_error = Some(notice);
        });
    }
}

fn set_loading(snap: &mut AppSnapshot, domain: Domain, loading: bool) {
    match domain {
        Domain::Team => snap.is_refreshing = loading,
        Domain::Captains => snap.is_loading_captains = loading,
        Domain::CashCows => snap.is_loading_cash_cows = loading,
    }
}

/// Flags and connectivity after a successful merge of `domain`.
///
/// Only a current team shows as `Live`. Any success proves the server is
/// reachable, so offline notices from other domains are dropped too.
fn finish_success(snap: &mut AppSnapshot, domain: Domain, now: DateTime<Utc>) {
    set_loading(snap, domain, false);
    if domain == Domain::Team {
        snap.team_current = true;
    }
    if snap
        .last_error
        .as_ref()
        .is_some_and(|e| e.domain == domain || e.offline)
    {
        snap.last_error = None;
    }
    snap.connectivity = if snap.team_current {
        ConnectivityState::Live
    } else {
        ConnectivityState::Connected
    };
    snap.last_success = Some(now);
}
