//! Configuration loading for the ReelAgents client core.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `REELAGENTS_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::telemetry::LogFormat;

const ENV_PREFIX: &str = "REELAGENTS_";

/// Application configuration derived from `REELAGENTS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_anon_key: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_publishable_key: Option<String>,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_query_cache_capacity")]
    pub query_cache_capacity: usize,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_landing_path")]
    pub default_landing_path: String,
    #[serde(default)]
    pub job_poll: JobPollConfig,
}

/// Async job polling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct JobPollConfig {
    /// Delay between two status queries for the same job (default: 2000)
    ///
    /// Environment variable: `REELAGENTS_JOB_POLL_INTERVAL_MS`
    #[serde(default = "default_job_poll_interval_ms")]
    pub interval_ms: u64,

    /// Optional ceiling on status queries per job. Unset polls until a terminal status.
    ///
    /// Environment variable: `REELAGENTS_JOB_POLL_MAX_ATTEMPTS`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for JobPollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_job_poll_interval_ms(),
            max_attempts: None,
        }
    }
}

impl JobPollConfig {
    /// Validate polling bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=60_000).contains(&self.interval_ms) {
            return Err(ConfigError::InvalidJobPollInterval {
                value: self.interval_ms,
            });
        }

        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidJobPollMaxAttempts);
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            supabase_url: None,
            supabase_anon_key: None,
            api_base_url: default_api_base_url(),
            stripe_publishable_key: None,
            http_timeout_ms: default_http_timeout_ms(),
            query_cache_capacity: default_query_cache_capacity(),
            login_path: default_login_path(),
            default_landing_path: default_landing_path(),
            job_poll: JobPollConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parsed base URL of the application REST API.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "API_BASE_URL",
            value: self.api_base_url.clone(),
            source,
        })
    }

    /// Parsed base URL of the hosted backend, if configured.
    pub fn supabase_base(&self) -> Result<Option<Url>, ConfigError> {
        self.supabase_url
            .as_deref()
            .map(|value| {
                Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                    field: "SUPABASE_URL",
                    value: value.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Whether the payment helpers can be used.
    pub fn payments_enabled(&self) -> bool {
        self.stripe_publishable_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.supabase_anon_key.is_some() {
            config.supabase_anon_key = Some("[REDACTED]".to_string());
        }
        if config.stripe_publishable_key.is_some() {
            config.stripe_publishable_key = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Hosted backend credentials are only optional for local and test profiles
        if !matches!(self.profile.as_str(), "local" | "test") {
            if self.supabase_url.is_none() {
                return Err(ConfigError::MissingSupabaseUrl);
            }
            if self.supabase_anon_key.is_none() {
                return Err(ConfigError::MissingSupabaseAnonKey);
            }
        }

        self.api_base()?;
        self.supabase_base()?;

        if self.log_format.parse::<LogFormat>().is_err() {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.query_cache_capacity == 0 {
            return Err(ConfigError::InvalidQueryCacheCapacity);
        }

        if self.http_timeout_ms == 0 {
            return Err(ConfigError::InvalidHttpTimeout);
        }

        for (field, path) in [
            ("LOGIN_PATH", &self.login_path),
            ("DEFAULT_LANDING_PATH", &self.default_landing_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidRoutePath {
                    field,
                    value: path.clone(),
                });
            }
        }

        self.job_poll.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_query_cache_capacity() -> usize {
    64
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_landing_path() -> String {
    "/dashboard".to_string()
}

fn default_job_poll_interval_ms() -> u64 {
    2000
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("hosted backend URL is missing; set REELAGENTS_SUPABASE_URL")]
    MissingSupabaseUrl,
    #[error("hosted backend anon key is missing; set REELAGENTS_SUPABASE_ANON_KEY")]
    MissingSupabaseAnonKey,
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("invalid value for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("job poll interval must be between 100 and 60000 milliseconds, got {value}")]
    InvalidJobPollInterval { value: u64 },
    #[error("job poll max attempts must be at least 1 when set")]
    InvalidJobPollMaxAttempts,
    #[error("query cache capacity must be at least 1")]
    InvalidQueryCacheCapacity,
    #[error("http timeout must be positive")]
    InvalidHttpTimeout,
    #[error("{field} must be an absolute path, got '{value}'")]
    InvalidRoutePath { field: &'static str, value: String },
}

/// Loads configuration using layered `.env` files and `REELAGENTS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration: `.env`, `.env.local`, `.env.{profile}`,
    /// `.env.{profile}.local`, then the process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let supabase_url = take_string(&mut layered, "SUPABASE_URL");
        let supabase_anon_key = take_string(&mut layered, "SUPABASE_ANON_KEY");
        let api_base_url =
            take_string(&mut layered, "API_BASE_URL").unwrap_or_else(default_api_base_url);
        let stripe_publishable_key = take_string(&mut layered, "STRIPE_PUBLISHABLE_KEY");
        let http_timeout_ms = take_number(&mut layered, "HTTP_TIMEOUT_MS")?
            .unwrap_or_else(default_http_timeout_ms);
        let query_cache_capacity = take_number(&mut layered, "QUERY_CACHE_CAPACITY")?
            .unwrap_or_else(default_query_cache_capacity);
        let login_path = take_string(&mut layered, "LOGIN_PATH").unwrap_or_else(default_login_path);
        let default_landing_path =
            take_string(&mut layered, "DEFAULT_LANDING_PATH").unwrap_or_else(default_landing_path);

        let job_poll = JobPollConfig {
            interval_ms: take_number(&mut layered, "JOB_POLL_INTERVAL_MS")?
                .unwrap_or_else(default_job_poll_interval_ms),
            max_attempts: take_number(&mut layered, "JOB_POLL_MAX_ATTEMPTS")?,
        };

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            supabase_url,
            supabase_anon_key,
            api_base_url,
            stripe_publishable_key,
            http_timeout_ms,
            query_cache_capacity,
            login_path,
            default_landing_path,
            job_poll,
        };

        config.validate()?;

        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes a key, treating blank values as absent.
fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_number<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    take_string(layered, key)
        .map(|value| {
            value.parse().map_err(|_| ConfigError::InvalidNumber {
                field: key,
                value: value.clone(),
            })
        })
        .transpose()
}
