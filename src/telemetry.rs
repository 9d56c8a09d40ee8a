//! # Telemetry
//!
//! Library code only emits `tracing` events; installing a subscriber is left to
//! the host. [`init_tracing`] does it for the CLI: one line per event on stderr,
//! filtered by `RUST_LOG` or the configured level, with the HTTP stack capped at
//! `warn` so request plumbing does not drown client events.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::warn;
use tracing_log::LogTracer;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, fmt, layer::Layer, layer::SubscriberExt};

use crate::config::AppConfig;

/// Crates whose debug output is transport noise from the client's point of view
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("unknown log format `{0}`; expected `json` or `pretty`")]
    UnknownFormat(String),
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = TelemetryInitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(TelemetryInitError::UnknownFormat(other.to_string())),
        }
    }
}

/// `level` for everything, except transport crates which stay at `warn`.
fn default_directives(level: &str) -> String {
    QUIET_TARGETS
        .iter()
        .fold(level.to_string(), |directives, target| {
            format!("{directives},{target}=warn")
        })
}

fn env_filter(level: &str) -> Result<EnvFilter, TelemetryInitError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_directives(level))?),
    }
}

/// Install the global subscriber and bridge `log` records into it.
///
/// Returns `Ok(false)` when a previous call already installed it. Fails if the
/// host installed its own subscriber first.
pub fn init_tracing(config: &AppConfig) -> Result<bool, TelemetryInitError> {
    if INSTALLED.load(Ordering::SeqCst) {
        return Ok(false);
    }

    let format: LogFormat = config.log_format.parse()?;
    let filter = env_filter(&config.log_level)?;
    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))?;
    INSTALLED.store(true, Ordering::SeqCst);

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        warn!(error = %err, "Another logger owns the `log` facade; its records bypass tracing");
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_crates_are_capped_at_warn() {
        assert_eq!(
            default_directives("debug"),
            "debug,hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn"
        );
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }

    #[test]
    fn parses_configured_formats_only() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!(
            "yaml".parse::<LogFormat>(),
            Err(TelemetryInitError::UnknownFormat(format)) if format == "yaml"
        ));
    }

    #[test]
    fn second_init_is_a_no_op() {
        let config = AppConfig {
            log_format: "pretty".to_string(),
            ..Default::default()
        };

        assert!(init_tracing(&config).unwrap());
        assert!(!init_tracing(&config).unwrap());
    }
}
