//! Campaign list and create.

use tracing::{info, instrument};

use super::{RealtimeGuard, TenantQuery};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{Campaign, CreateCampaignRequest, CreateCampaignResponse, NewCampaign};
use crate::session_store::SessionStore;

#[derive(Clone)]
pub struct Campaigns {
    query: TenantQuery<Campaign>,
    api: ApiClient,
    session: SessionStore,
}

impl Campaigns {
    pub fn new(query: TenantQuery<Campaign>, api: ApiClient, session: SessionStore) -> Self {
        Self { query, api, session }
    }

    pub fn query(&self) -> &TenantQuery<Campaign> {
        &self.query
    }

    pub async fn list(&self) -> Result<Vec<Campaign>, ClientError> {
        self.query.fetch().await
    }

    pub fn watch(&self) -> Option<RealtimeGuard> {
        self.query.watch()
    }

    /// Create without an optimistic row; the list refreshes once the server confirms.
    #[instrument(skip_all, fields(name = %campaign.name))]
    pub async fn create(&self, campaign: NewCampaign) -> Result<CreateCampaignResponse, ClientError> {
        let company_id = self
            .session
            .company_id()
            .ok_or(ClientError::CompanyIdNotFound)?;

        let request = CreateCampaignRequest {
            campaign,
            company_id,
        };
        let response = self.api.create_campaign(&request).await?;

        info!(campaign_id = %response.campaign.id, %company_id, "Campaign created");
        self.query.cache().invalidate(&self.query.key());
        Ok(response)
    }
}
