//! Relational store over the hosted backend's PostgREST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use super::{RelationalStore, RowQuery};
use crate::config::{AppConfig, ConfigError};
use crate::error::{ClientError, REQUEST_FAILED};
use crate::session_store::SessionStore;

#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostgrestStore {
    http: Client,
    rest_url: String,
    anon_key: String,
    session: SessionStore,
}

impl PostgrestStore {
    pub fn new(
        base_url: &Url,
        anon_key: impl Into<String>,
        session: SessionStore,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", base_url.as_str().trim_end_matches('/')),
            anon_key: anon_key.into(),
            session,
        })
    }

    pub fn from_config(config: &AppConfig, session: SessionStore) -> Result<Self, ClientError> {
        let base_url = config
            .supabase_base()?
            .ok_or(ConfigError::MissingSupabaseUrl)?;
        let anon_key = config
            .supabase_anon_key
            .clone()
            .ok_or(ConfigError::MissingSupabaseAnonKey)?;
        Self::new(&base_url, anon_key, session, config.http_timeout())
    }
}

#[async_trait]
impl RelationalStore for PostgrestStore {
    async fn select(&self, query: &RowQuery) -> Result<Vec<JsonValue>, ClientError> {
        let url = Url::parse_with_params(
            &format!("{}/{}", self.rest_url, query.table()),
            query.to_query_pairs(),
        )?;
        // Row-level security sees the signed-in user; anonymous reads use the anon key
        let bearer = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());

        debug!(table = query.table(), "Selecting rows");
        let response = self
            .http
            .get(url)
            .header("apikey", &self.anon_key)
            .header(ACCEPT, "application/json")
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<PostgrestError>(&body)
                .ok()
                .and_then(|error| error.message)
                .unwrap_or_else(|| REQUEST_FAILED.to_string());
            warn!(table = query.table(), status = status.as_u16(), error = %message, "Select failed");
            return Err(ClientError::Storage(message));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
