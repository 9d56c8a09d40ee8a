//! # Error Handling
//!
//! Unified client error type. Every variant renders as the message string the
//! presentation layer shows inline, so hook state can carry `error.to_string()`.

use thiserror::Error;

use crate::config::ConfigError;

/// Fallback message when a REST call fails without an `error` field in the body.
pub const REQUEST_FAILED: &str = "Request failed";
/// Fallback message when a job or operation fails without a message.
pub const OPERATION_FAILED: &str = "Operation failed";
/// Fallback message when a transport error carries no description.
pub const NETWORK_ERROR: &str = "Network error";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure before a response was received
    #[error("{0}")]
    Network(String),

    /// Non-success response from the application REST API
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Relational store rejected or failed a query
    #[error("{0}")]
    Storage(String),

    /// Identity provider call failed
    #[error("{0}")]
    Identity(String),

    /// Profile carries no tenant linkage; fatal for tenant-scoped writes
    #[error("Company ID not found")]
    CompanyIdNotFound,

    /// Payload could not be decoded into the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Polling gave up after the configured number of attempts
    #[error("job {job_id} did not finish after {attempts} status checks")]
    PollLimitReached { job_id: String, attempts: u32 },

    /// Payment helpers used without a publishable key configured
    #[error("payments are disabled; no publishable key configured")]
    PaymentsDisabled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn api<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Replace a server rejection's message with `message`; transport and
    /// decode errors pass through unchanged.
    pub(crate) fn with_failure_message(self, message: &str) -> Self {
        match self {
            Self::Api { status, .. } => Self::api(status, message),
            other => other,
        }
    }

    /// Whether this failure came from the transport rather than the server.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Text carried in hook state and rendered inline.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_decode() {
            ClientError::Decode(message)
        } else if message.is_empty() {
            ClientError::Network(NETWORK_ERROR.to_string())
        } else {
            ClientError::Network(message)
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
