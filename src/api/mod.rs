//! # REST API Client
//!
//! Thin JSON client for the application backend. Every request carries
//! `Authorization: Bearer <token>` when the session store holds a session.
//! Non-2xx responses become [`ClientError::Api`] with the body's `error` field,
//! or `"Request failed"` when the body has none.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::AppConfig;
use crate::error::{ClientError, REQUEST_FAILED};
use crate::jobs::JobStatusSource;
use crate::models::{
    Agent, AsyncJob, Campaign, CompanyId, CreateCampaignRequest, CreateCampaignResponse,
    CreateDigitalTwinRequest, CreateDigitalTwinResponse, DigitalTwin, JobStatusReport,
};
use crate::session_store::SessionStore;

pub mod stripe;

pub use stripe::{
    AccountLinkRequest, AccountLinkResponse, AccountType, CheckoutSessionRequest,
    CheckoutSessionResponse, ConnectAccountRequest, ConnectAccountResponse,
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Body of `GET /api/campaigns`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CampaignList {
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub count: usize,
}

/// Body of `GET /api/campaigns/{id}/certified-agents`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CertifiedAgentList {
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub count: usize,
}

const CERTIFIED_AGENTS_FAILED: &str = "Failed to fetch certified agents";

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: &Url, session: SessionStore, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(config: &AppConfig, session: SessionStore) -> Result<Self, ClientError> {
        Self::new(&config.api_base()?, session, config.http_timeout())
    }

    /// Paths are appended to the base URL verbatim, keeping any base path prefix.
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        match self.session.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.error)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| REQUEST_FAILED.to_string());
            warn!(status = status.as_u16(), error = %message, "API request rejected");
            return Err(ClientError::api(status.as_u16(), message));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!(%url, "GET");
        self.send(self.request(Method::GET, url)).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        self.send(self.request(Method::POST, url).json(body)).await
    }

    fn company_query(&self, path: &str, company_id: CompanyId) -> Result<Url, ClientError> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("company_id", &company_id.to_string());
        Ok(url)
    }

    /// Starts training; the returned job id is polled for completion.
    #[instrument(skip_all, fields(company_id = %request.company_id))]
    pub async fn create_digital_twin(
        &self,
        request: &CreateDigitalTwinRequest,
    ) -> Result<CreateDigitalTwinResponse, ClientError> {
        self.post("/api/digital-twins/create", request).await
    }

    pub async fn list_digital_twins(&self, company_id: CompanyId) -> Result<Vec<DigitalTwin>, ClientError> {
        self.get(self.company_query("/api/digital-twins", company_id)?)
            .await
    }

    #[instrument(skip_all, fields(company_id = %request.company_id))]
    pub async fn create_campaign(
        &self,
        request: &CreateCampaignRequest,
    ) -> Result<CreateCampaignResponse, ClientError> {
        self.post("/api/campaigns/create", request).await
    }

    pub async fn list_campaigns(&self, company_id: CompanyId) -> Result<CampaignList, ClientError> {
        self.get(self.company_query("/api/campaigns", company_id)?)
            .await
    }

    /// `base` with `id` and `action` appended as path segments.
    fn resource(&self, base: &str, id: &str, action: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint(base)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(id)
            .push(action);
        Ok(url)
    }

    /// Certified agents available to hire for a campaign. A blank campaign id
    /// yields an empty list without a request.
    #[instrument(skip(self))]
    pub async fn list_certified_agents(
        &self,
        campaign_id: &str,
    ) -> Result<CertifiedAgentList, ClientError> {
        if campaign_id.trim().is_empty() {
            return Ok(CertifiedAgentList::default());
        }

        let url = self.resource("/api/campaigns", campaign_id, "certified-agents")?;
        self.get(url)
            .await
            .map_err(|err| err.with_failure_message(CERTIFIED_AGENTS_FAILED))
    }

    /// `GET /api/jobs/{id}/status`
    pub async fn job_status(&self, job_id: &str) -> Result<AsyncJob, ClientError> {
        let url = self.resource("/api/jobs", job_id, "status")?;

        let report: JobStatusReport = self.get(url).await?;
        Ok(AsyncJob::from_report(job_id, report))
    }
}

#[async_trait]
impl JobStatusSource for ApiClient {
    async fn job_status(&self, job_id: &str) -> Result<AsyncJob, ClientError> {
        ApiClient::job_status(self, job_id).await
    }
}
