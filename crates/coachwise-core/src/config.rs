// Configuration loading and parsing (coachwise.toml, credentials.toml).

use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::gateway::http::backoff_delay;
use crate::model::player::{DerivationRules, DEFAULT_CASH_COW_MIN_GENERATED};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub display: DisplayConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    pub fn derivation_rules(&self) -> DerivationRules {
        DerivationRules {
            cash_cow_min_generated: self.display.cash_cow_min_generated,
        }
    }
}

// ---------------------------------------------------------------------------
// coachwise.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire coachwise.toml file.
#[derive(Debug, Clone, Deserialize)]
struct CoachwiseFile {
    api: ApiConfig,
    sync: SyncConfig,
    #[serde(default)]
    display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub team_id: String,
    pub request_timeout_secs: u64,
    /// Attempts per fetch, including the first.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Longest a gateway call can take when every attempt times out:
    /// each attempt's timeout plus the backoff between attempts.
    pub fn worst_case_fetch(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let backoff: Duration = (1..attempts)
            .map(|attempt| backoff_delay(self.backoff_base(), attempt))
            .fold(Duration::ZERO, Duration::saturating_add);
        self.request_timeout()
            .saturating_mul(attempts)
            .saturating_add(backoff)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on a single gateway call as seen by the live state.
    pub fetch_deadline_secs: u64,
    /// Seconds between automatic refreshes; 0 disables them.
    pub auto_refresh_secs: u64,
    /// How long a successful refresh keeps the offline banner away.
    pub stale_after_secs: u64,
}

impl SyncConfig {
    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }

    pub fn auto_refresh(&self) -> Option<Duration> {
        (self.auto_refresh_secs > 0).then(|| Duration::from_secs(self.auto_refresh_secs))
    }

    /// Values beyond what chrono can represent saturate.
    pub fn stale_after(&self) -> chrono::TimeDelta {
        i64::try_from(self.stale_after_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub cash_cow_min_generated: i64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cash_cow_min_generated: DEFAULT_CASH_COW_MIN_GENERATED,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub session_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/coachwise.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- coachwise.toml (required) ---
    let main_path = config_dir.join("coachwise.toml");
    let main_text = read_file(&main_path)?;
    let file: CoachwiseFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        api: file.api,
        sync: file.sync,
        display: file.display,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if config_dir.exists() {
            return Ok(Vec::new());
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither {} nor {} exists",
                defaults_dir.display(),
                config_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot create {}: {e}", config_dir.display()),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot read {}: {e}", defaults_dir.display()),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("cannot read entry in {}: {e}", defaults_dir.display()),
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if !path.is_file() || path.extension().is_some_and(|ext| ext == "example") {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("cannot read {}: {e}", path.display()),
                })?;
                dest.write_all(&content)
                    .map_err(|e| ConfigError::DefaultsCopyError {
                        message: format!("cannot write {}: {e}", target.display()),
                    })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("cannot create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let api = &config.api;
    let required: &[(&str, &str)] = &[
        ("api.base_url", api.base_url.as_str()),
        ("api.team_id", api.team_id.as_str()),
    ];
    for (name, val) in required {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "api.base_url".into(),
            message: format!("must be an http(s) URL, got {}", api.base_url),
        });
    }

    let positive: &[(&str, u64)] = &[
        ("api.request_timeout_secs", api.request_timeout_secs),
        ("api.max_attempts", api.max_attempts as u64),
        ("sync.fetch_deadline_secs", config.sync.fetch_deadline_secs),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let budget = api.worst_case_fetch();
    if config.sync.fetch_deadline() < budget {
        return Err(ConfigError::ValidationError {
            field: "sync.fetch_deadline_secs".into(),
            message: format!(
                "{}s cuts off the gateway's retries, which can take up to {:.1}s",
                config.sync.fetch_deadline_secs,
                budget.as_secs_f64()
            ),
        });
    }

    if config.display.cash_cow_min_generated < 0 {
        return Err(ConfigError::ValidationError {
            field: "display.cash_cow_min_generated".into(),
            message: format!("must be >= 0, got {}", config.display.cash_cow_min_generated),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
