//! Runtime configuration for the cloudops jobs.
//!
//! Everything comes from the process environment (a `.env` file is loaded by the
//! binary before any of this runs). Each loader also has a `from_lookup` form that
//! takes a key -> value function, so callers can feed a map instead of the real env.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_BUILD_WINDOW: usize = 10;
pub const DEFAULT_PROVIDER: &str = "scaleway";
pub const DEFAULT_ZONE: &str = "fr-par-1";
pub const DEFAULT_SCALEWAY_API_URL: &str = "https://api.scaleway.com";
/// PromQL sent to the Cockpit metrics endpoint; `{instance_id}` is substituted per server.
pub const DEFAULT_CPU_QUERY: &str =
    r#"avg_over_time(instance_server_cpu_usage_percent{resource_id="{instance_id}"}[1h])"#;
pub const DEFAULT_CPU_THRESHOLD: f64 = 5.0;
pub const DEFAULT_IDLE_WINDOW_DAYS: i64 = 2;
pub const DEFAULT_METRIC_PERIOD_SECS: u32 = 3600;
pub const DEFAULT_BACKUP_TAG: &str = "Backup=True";
pub const DEFAULT_RETENTION_DAYS: i64 = 7;
/// Upper bound for any day-count setting (about a century).
pub const MAX_DAYS: i64 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get(lookup: Lookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required(lookup: Lookup, key: &'static str) -> Result<String, ConfigError> {
    get(lookup, key).ok_or(ConfigError::Missing(key))
}

/// Prefer `{key}_FILE` (Docker/K8s secrets), fall back to `{key}`.
fn secret(lookup: Lookup, key: &str) -> Option<String> {
    get(lookup, &format!("{key}_FILE"))
        .and_then(|path| fs::read_to_string(path).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| get(lookup, key))
}

fn required_secret(lookup: Lookup, key: &'static str) -> Result<String, ConfigError> {
    secret(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parsed<T>(lookup: Lookup, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = get(lookup, key) else {
        return Ok(default);
    };
    match raw.parse::<T>() {
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// -----------------------------------------------------------------------------
// CI server
// -----------------------------------------------------------------------------

#[derive(Clone)]
pub struct JenkinsConfig {
    pub base_url: String,
    pub job: String,
    pub username: String,
    pub api_token: String,
    /// How many of the most recent builds are examined.
    pub build_window: usize,
}

impl JenkinsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, ConfigError> {
        let base_url = required(lookup, "JENKINS_URL")?
            .trim_end_matches('/')
            .to_string();
        let build_window = parsed(lookup, "CI_BUILD_WINDOW", DEFAULT_BUILD_WINDOW)?;
        if build_window == 0 {
            return Err(invalid("CI_BUILD_WINDOW", build_window, "must be at least 1"));
        }
        Ok(Self {
            base_url,
            job: required(lookup, "JENKINS_JOB")?,
            username: required(lookup, "JENKINS_USER")?,
            api_token: required_secret(lookup, "JENKINS_API_TOKEN")?,
            build_window,
        })
    }
}

impl fmt::Debug for JenkinsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsConfig")
            .field("base_url", &self.base_url)
            .field("job", &self.job)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .field("build_window", &self.build_window)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Cloud provider
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Lowercased provider code (`scaleway`, `mock`).
    pub name: String,
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Self {
        let name = get(lookup, "PROVIDER")
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
            .to_lowercase();
        Self { name }
    }
}

#[derive(Clone)]
pub struct ScalewaySettings {
    pub project_id: String,
    pub secret_key: String,
    pub api_url: String,
    /// Cockpit metrics data source URL. Only the idle reaper needs it.
    pub metrics_url: Option<String>,
    pub metrics_token: Option<String>,
    pub cpu_query: String,
}

impl ScalewaySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: required(lookup, "SCALEWAY_PROJECT_ID")?,
            secret_key: required_secret(lookup, "SCALEWAY_SECRET_KEY")?,
            api_url: get(lookup, "SCALEWAY_API_URL")
                .unwrap_or_else(|| DEFAULT_SCALEWAY_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            metrics_url: get(lookup, "SCALEWAY_METRICS_URL")
                .map(|s| s.trim_end_matches('/').to_string()),
            metrics_token: secret(lookup, "SCALEWAY_METRICS_TOKEN"),
            cpu_query: get(lookup, "SCALEWAY_CPU_QUERY")
                .unwrap_or_else(|| DEFAULT_CPU_QUERY.to_string()),
        })
    }
}

impl fmt::Debug for ScalewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalewaySettings")
            .field("project_id", &self.project_id)
            .field("secret_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("metrics_url", &self.metrics_url)
            .field("metrics_token", &self.metrics_token.as_ref().map(|_| "<redacted>"))
            .field("cpu_query", &self.cpu_query)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Jobs
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ReaperConfig {
    pub zone: String,
    /// Percent CPU. Instances strictly below it are stopped.
    pub cpu_threshold: f64,
    pub window_days: i64,
    pub period_secs: u32,
    pub dry_run: bool,
}

impl ReaperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, ConfigError> {
        let cpu_threshold = parsed(lookup, "IDLE_CPU_THRESHOLD", DEFAULT_CPU_THRESHOLD)?;
        if !cpu_threshold.is_finite() || cpu_threshold < 0.0 {
            return Err(invalid(
                "IDLE_CPU_THRESHOLD",
                cpu_threshold,
                "must be a non-negative percentage",
            ));
        }
        let window_days = parsed(lookup, "IDLE_WINDOW_DAYS", DEFAULT_IDLE_WINDOW_DAYS)?;
        if !(1..=MAX_DAYS).contains(&window_days) {
            return Err(invalid(
                "IDLE_WINDOW_DAYS",
                window_days,
                &format!("must be between 1 and {MAX_DAYS}"),
            ));
        }
        Ok(Self {
            zone: get(lookup, "CLOUD_ZONE").unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            cpu_threshold,
            window_days,
            period_secs: DEFAULT_METRIC_PERIOD_SECS,
            dry_run: false,
        })
    }
}

/// Which snapshots the retention phase is allowed to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionScope {
    /// Only snapshots carrying the `CreatedOn` tag written by the backup phase.
    #[default]
    Managed,
    /// Every snapshot owned by the caller, whoever created it.
    AllOwned,
}

impl FromStr for RetentionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "managed" => Ok(RetentionScope::Managed),
            "all" | "all_owned" | "all-owned" => Ok(RetentionScope::AllOwned),
            other => Err(format!("unknown retention scope '{other}' (expected managed|all)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupConfig {
    pub zone: String,
    /// `key=value` tag selecting the instances to back up.
    pub backup_tag: String,
    pub retention_days: i64,
    pub retention_scope: RetentionScope,
    pub dry_run: bool,
    pub skip_retention: bool,
}

impl BackupConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, ConfigError> {
        let retention_days = parsed(lookup, "BACKUP_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        if !(0..=MAX_DAYS).contains(&retention_days) {
            return Err(invalid(
                "BACKUP_RETENTION_DAYS",
                retention_days,
                &format!("must be between 0 and {MAX_DAYS}"),
            ));
        }
        Ok(Self {
            zone: get(lookup, "CLOUD_ZONE").unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            backup_tag: get(lookup, "BACKUP_TAG").unwrap_or_else(|| DEFAULT_BACKUP_TAG.to_string()),
            retention_days,
            retention_scope: parsed(lookup, "BACKUP_RETENTION_SCOPE", RetentionScope::default())?,
            dry_run: false,
            skip_retention: false,
        })
    }
}
