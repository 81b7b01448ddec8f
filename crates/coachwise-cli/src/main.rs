// Coachwise sync entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the HTTP gateway and the live state
// 4. Start auto refresh, or refresh once when it is disabled
// 5. Print a status line whenever the snapshot changes
// 6. Wait for Ctrl+C, then stop the background tasks

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info};

use coachwise_core::config;
use coachwise_core::gateway::HttpGateway;
use coachwise_core::live::{LiveAppState, SyncSettings};
use coachwise_core::protocol::{AppSnapshot, ErrorPresentation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Coachwise starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: api={}, team={}, auto_refresh={}s",
        config.api.base_url, config.api.team_id, config.sync.auto_refresh_secs
    );

    // 3. Gateway and live state
    let gateway = HttpGateway::from_config(&config).context("failed to build HTTP client")?;
    let state = LiveAppState::new(Arc::new(gateway), SyncSettings::from_config(&config));
    let stale_after = config.sync.stale_after();

    // 5. Watch for snapshot changes (subscribe before the first refresh)
    let mut rx = state.subscribe();
    let watch_handle = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            println!("{}", status_line(&snap, stale_after));
        }
    });

    // 4. Refresh
    let auto = config
        .sync
        .auto_refresh()
        .and_then(|every| state.spawn_auto_refresh(every));
    let refresh_handle = match auto {
        Some(handle) => {
            info!("Auto refresh every {}s", config.sync.auto_refresh_secs);
            handle
        }
        None => {
            let state = state.clone();
            tokio::spawn(async move {
                let report = state.refresh_all().await;
                for (domain, err) in report.failures() {
                    error!("Initial {} refresh failed: {}", domain, err);
                }
            })
        }
    };

    // 6. Run until interrupted
    info!("Coachwise ready. Press Ctrl+C to quit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    refresh_handle.abort();
    watch_handle.abort();

    info!("Coachwise shut down cleanly");
    Ok(())
}

/// One-line summary of a snapshot for the terminal.
fn status_line(snap: &AppSnapshot, stale_after: chrono::Duration) -> String {
    let mut line = format!(
        "[{}] score {} | rank {} | {} players | {} captain picks | {} cash cows",
        snap.connectivity.label(),
        snap.team.score,
        snap.team.rank,
        snap.team.players.len(),
        snap.captains.len(),
        snap.cash_cows.len(),
    );
    if snap.any_in_flight() {
        line.push_str(" | syncing");
    }
    match snap.error_presentation(Utc::now(), stale_after) {
        ErrorPresentation::None => {}
        ErrorPresentation::OfflineBanner => line.push_str(" | OFFLINE"),
        ErrorPresentation::InlineCard(message) => {
            line.push_str(" | ");
            line.push_str(&message);
        }
    }
    line
}

/// Initialize tracing to log to a file (not the terminal, which shows status).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("coachwise.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coachwise_core=info,coachwise=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
